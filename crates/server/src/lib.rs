//! agentbrowse-server — the HTTP/SSE transport (spec §6) binding the
//! agent loop and task runner to a network API.
//!
//! # Architecture
//!
//! - **HTTP/SSE server**: built on Warp with the async Tokio runtime.
//! - **Authentication**: bearer-token validation with per-token rate
//!   limiting.
//! - **Agent runs**: `POST /api/v1/agent-runs` spawns an `AgentLoop`;
//!   its events are replayed and streamed over SSE, and a suspended
//!   `ask_human` is resumed via `POST .../input`.
//! - **Task runs**: `POST /api/v1/task-runs` plans a goal into
//!   template/agent_goal steps and submits it to the run manager;
//!   status is polled and large results are read back in chunks from
//!   the artifact store.
//!
//! # Example
//!
//! ```rust,no_run
//! use agentbrowse_server::Config;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::dev_default();
//!     agentbrowse_server::server::run(config).await.unwrap();
//! }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod server;
pub mod sse;
pub mod state;

pub use config::Config;
pub use error::{ErrorResponse, ServerError};
pub use state::AppState;
