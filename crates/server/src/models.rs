//! Request/response payloads for agentbrowse-server's HTTP API.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// POST /api/v1/agent-runs
#[derive(Debug, Clone, Deserialize)]
pub struct AgentRunRequest {
    /// Existing browser session to drive. A new headless session is
    /// created when omitted.
    #[serde(default)]
    pub session_id: Option<Uuid>,

    /// Natural-language goal handed to the agent loop.
    pub task: String,

    #[serde(default)]
    pub max_iterations: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentRunResponse {
    pub run_id: Uuid,
    pub session_id: Uuid,
}

/// POST /api/v1/agent-runs/:id/input — resolves a suspended `ask_human`.
#[derive(Debug, Clone, Deserialize)]
pub struct ResolveInputRequest {
    pub request_id: String,
    pub response: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolveInputResponse {
    pub resolved: bool,
}

/// POST /api/v1/task-runs
#[derive(Debug, Clone, Deserialize)]
pub struct TaskRunRequest {
    /// Browser session the run's templates/agent goals operate in.
    #[serde(default)]
    pub session_id: Option<Uuid>,

    pub goal: String,

    #[serde(default = "default_inputs")]
    pub inputs: serde_json::Value,

    #[serde(default)]
    pub constraints: Option<serde_json::Value>,

    #[serde(default)]
    pub output_schema: Option<serde_json::Value>,

    #[serde(default)]
    pub max_retries: Option<u32>,

    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_inputs() -> serde_json::Value {
    serde_json::json!({})
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskRunResponse {
    pub run_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArtifactChunkResponse {
    pub offset: usize,
    pub length: usize,
    pub total_len: usize,
    /// Base64-encoded bytes (artifacts are opaque JSON blobs, not always
    /// valid UTF-8 once chunked mid-codepoint).
    pub data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ArtifactQuery {
    #[serde(default)]
    pub offset: Option<usize>,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Health/readiness response (spec's supplemented health endpoint).
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub active_sessions: usize,
    pub active_runs: usize,
    pub counters: SummaryCounters,
}

/// Structured, metrics-free summary counters (spec's supplemented
/// ambient feature — not an observability layer, just what
/// `health.rs` already tracked in the teacher).
#[derive(Debug, Clone, Default, Serialize)]
pub struct SummaryCounters {
    pub sessions_created: u64,
    pub runs_succeeded: u64,
    pub runs_partial_success: u64,
    pub runs_failed: u64,
    pub runs_canceled: u64,
}
