//! Built-in templates (spec §4.3): deterministic multi-step flows that
//! don't need an LLM in the loop, selected by the planner's rule table.

pub mod batch_extract;
pub mod login_session;
pub mod multi_tab_compare;

pub use batch_extract::run_batch_extract;
pub use login_session::run_login_session;
pub use multi_tab_compare::run_multi_tab_compare;
