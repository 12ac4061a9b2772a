//! Shared data model for the browsing agent platform.
//!
//! This crate has no behavior of its own: it defines the ids, the closed
//! error taxonomy, the event schema streamed to subscribers, and the tool
//! parameter schemas the agent loop registers with the LLM. Every other
//! crate in the workspace depends on this one and none of its siblings.

pub mod error;
pub mod events;
pub mod ids;
pub mod tools;

pub use error::{ErrorCode, ToolError};
pub use events::AgentEvent;
pub use ids::{ArtifactId, RunId, SessionId, TabId};
pub use tools::{ToolCall, ToolName, ToolResult};
