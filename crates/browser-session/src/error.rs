//! Error types for the browser session layer.

use agentbrowse_types::ErrorCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BrowserError {
    #[error("Failed to launch or connect to Chrome: {0}")]
    ConnectionFailed(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Tab not found: {0}")]
    TabNotFound(String),

    #[error("Maximum tabs ({0}) reached for session")]
    MaxTabsReached(usize),

    #[error("Page crashed: {0}")]
    PageCrashed(String),

    #[error("Other error: {0}")]
    Other(String),
}

impl BrowserError {
    /// Maps to the shared error taxonomy (spec §7) so tool-bus callers
    /// can build a `ToolError` without re-classifying the message.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            BrowserError::ConnectionFailed(_) => ErrorCode::NavigationTimeout,
            BrowserError::NavigationFailed(_) => ErrorCode::NavigationTimeout,
            BrowserError::ElementNotFound(_) => ErrorCode::ElementNotFound,
            BrowserError::SessionNotFound(_) => ErrorCode::SessionNotFound,
            BrowserError::TabNotFound(_) => ErrorCode::TabNotFound,
            BrowserError::MaxTabsReached(_) => ErrorCode::InvalidRequest,
            BrowserError::PageCrashed(_) => ErrorCode::PageCrashed,
            BrowserError::Other(_) => ErrorCode::ExecutionError,
        }
    }
}

pub type Result<T> = std::result::Result<T, BrowserError>;
