//! Agent loop error taxonomy (spec §7, §4.2 public contract).

use agentbrowse_types::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("agent loop is already running")]
    AlreadyRunning,

    #[error("no input is pending for request {0}")]
    NoPendingInput(String),

    #[error("llm call failed: {0}")]
    LlmFailed(String),

    #[error("browser error: {0}")]
    Browser(#[from] agentbrowse_browser_session::BrowserError),

    #[error("site memory error: {0}")]
    SiteMemory(#[from] agentbrowse_site_memory::SiteMemoryError),

    #[error("aborted: {0}")]
    Aborted(String),

    #[error("{0}")]
    Other(String),
}

impl AgentError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            AgentError::AlreadyRunning => ErrorCode::InvalidRequest,
            AgentError::NoPendingInput(_) => ErrorCode::InvalidRequest,
            AgentError::LlmFailed(_) => ErrorCode::ExecutionError,
            AgentError::Browser(e) => e.error_code(),
            AgentError::SiteMemory(_) => ErrorCode::ExecutionError,
            AgentError::Aborted(_) => ErrorCode::ExecutionError,
            AgentError::Other(_) => ErrorCode::ExecutionError,
        }
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;
