//! Browser Session & Tab Manager (spec §4.1): owns Chrome process
//! lifecycle, tab bookkeeping, cookie synchronization, and the per-tab
//! event ring buffers the tool bus reads from.

pub mod cookie_store;
pub mod driver;
pub mod error;
pub mod event_tracker;
pub mod session;
pub mod tab;

pub use cookie_store::{Cookie, CookieStore};
pub use driver::{ConnectionMode, Driver};
pub use error::BrowserError;
pub use event_tracker::{EventTracker, LoadState};
pub use session::{SessionManager, MAX_TABS_PER_SESSION};
pub use tab::Tab;
