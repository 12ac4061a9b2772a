//! Converts the shared `AgentEvent` wire type into SSE frames. Kept in
//! the server crate rather than `agentbrowse-types`, which stays
//! transport-free.

use agentbrowse_types::events::AgentEvent;

pub fn event_to_sse(event: &AgentEvent) -> warp::sse::Event {
    let data = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
    warp::sse::Event::default().data(data)
}
