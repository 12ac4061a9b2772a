//! The closed error taxonomy from spec §7.
//!
//! `ErrorCode` is shared by every crate so a tool-call failure inside the
//! agent loop, a run failure inside the task runner, and an HTTP error
//! response from the server all carry the same vocabulary.

use serde::{Deserialize, Serialize};

/// Closed set of error codes. Every failure that can cross a component
/// boundary is tagged with exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Input
    InvalidParameter,
    InvalidRequest,
    // Resource
    SessionNotFound,
    ElementNotFound,
    TabNotFound,
    RunNotFound,
    ArtifactNotFound,
    TemplateNotFound,
    // Browser
    NavigationTimeout,
    PageCrashed,
    PageLoadTimeout,
    // Policy
    TrustLevelNotAllowed,
    TplLoginFieldNotFound,
    // Execution
    ExecutionError,
    RunTimeout,
    RunCanceled,
}

impl ErrorCode {
    /// Whether this class of error is worth retrying automatically.
    /// Used by the agent loop's recovery policy (spec §4.2) to decide
    /// between `retry` and `abort` without re-deriving the classification
    /// from free-text messages every time.
    pub fn is_transient(self) -> bool {
        matches!(self, ErrorCode::NavigationTimeout | ErrorCode::PageLoadTimeout)
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| "UNKNOWN".to_string());
        write!(f, "{s}")
    }
}

/// A structured tool-call failure returned to the LLM as a tool-result
/// message rather than raised out of the agent loop (spec §7: "Tool
/// errors are classified by pattern and returned as structured results").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ToolError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl std::fmt::Display for ToolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ToolError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_serializes_screaming_snake_case() {
        let json = serde_json::to_string(&ErrorCode::SessionNotFound).unwrap();
        assert_eq!(json, "\"SESSION_NOT_FOUND\"");
    }

    #[test]
    fn navigation_timeout_is_transient() {
        assert!(ErrorCode::NavigationTimeout.is_transient());
        assert!(!ErrorCode::ElementNotFound.is_transient());
    }

    #[test]
    fn tool_error_display_includes_code_and_message() {
        let err = ToolError::new(ErrorCode::ElementNotFound, "no element #42");
        assert_eq!(err.to_string(), "ELEMENT_NOT_FOUND: no element #42");
    }
}
