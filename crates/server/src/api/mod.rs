//! API endpoint handlers for agentbrowse-server.

pub mod agent_runs;
pub mod health;
pub mod task_runs;

pub use agent_runs::{agent_run_events_handler, create_agent_run_handler, resolve_agent_input_handler};
pub use health::health_handler;
pub use task_runs::{cancel_task_run_handler, create_task_run_handler, get_artifact_handler, get_task_run_handler};
