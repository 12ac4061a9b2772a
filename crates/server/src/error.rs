//! Error types for agentbrowse-server
//!
//! Each variant maps to an HTTP status code and to one of the shared
//! `agentbrowse_types::ErrorCode` values, so a client sees the same
//! vocabulary whether the failure originated in the HTTP layer, the
//! agent loop, or the task runner.

use agentbrowse_types::ErrorCode;
use serde::{Deserialize, Serialize};
use warp::http::StatusCode;
use warp::reject::Reject;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Run not found: {0}")]
    RunNotFound(String),

    #[error("Artifact not found: {0}")]
    ArtifactNotFound(String),

    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error("Execution error: {0}")]
    ExecutionError(String),

    #[error("Request timeout: {0}")]
    Timeout(String),

    #[error("Concurrency limit reached: {0}")]
    ConcurrencyLimitReached(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Reject for ServerError {}

/// Structured error response sent to API clients.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<u64>,
}

impl ServerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::AuthFailed(_) => StatusCode::UNAUTHORIZED,
            ServerError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ServerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            ServerError::RunNotFound(_) => StatusCode::NOT_FOUND,
            ServerError::ArtifactNotFound(_) => StatusCode::NOT_FOUND,
            ServerError::TemplateNotFound(_) => StatusCode::NOT_FOUND,
            ServerError::ExecutionError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ServerError::ConcurrencyLimitReached(_) => StatusCode::TOO_MANY_REQUESTS,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Maps onto the closed error taxonomy shared across the workspace
    /// (spec §7) rather than inventing a parallel HTTP-only vocabulary.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            ServerError::AuthFailed(_) | ServerError::RateLimited(_) => ErrorCode::InvalidRequest,
            ServerError::InvalidRequest(_) => ErrorCode::InvalidRequest,
            ServerError::SessionNotFound(_) => ErrorCode::SessionNotFound,
            ServerError::RunNotFound(_) => ErrorCode::RunNotFound,
            ServerError::ArtifactNotFound(_) => ErrorCode::ArtifactNotFound,
            ServerError::TemplateNotFound(_) => ErrorCode::TemplateNotFound,
            ServerError::ExecutionError(_) => ErrorCode::ExecutionError,
            ServerError::Timeout(_) => ErrorCode::RunTimeout,
            ServerError::ConcurrencyLimitReached(_) => ErrorCode::InvalidRequest,
            ServerError::Internal(_) | ServerError::Config(_) => ErrorCode::ExecutionError,
        }
    }

    pub fn to_error_response(&self, session_id: Option<String>) -> ErrorResponse {
        let retry_after = match self {
            ServerError::RateLimited(_) | ServerError::ConcurrencyLimitReached(_) => Some(60),
            _ => None,
        };

        ErrorResponse {
            code: self.error_code().to_string(),
            message: self.to_string(),
            session_id,
            timestamp: chrono::Utc::now().to_rfc3339(),
            retry_after_seconds: retry_after,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_failed_maps_to_unauthorized() {
        let err = ServerError::AuthFailed("invalid token".to_string());
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn run_not_found_maps_to_shared_error_code() {
        let err = ServerError::RunNotFound("abc".to_string());
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.error_code(), ErrorCode::RunNotFound);
    }

    #[test]
    fn rate_limited_has_retry_after() {
        let err = ServerError::RateLimited("too many".to_string());
        let response = err.to_error_response(None);
        assert_eq!(response.retry_after_seconds, Some(60));
    }

    #[test]
    fn error_response_json_round_trips() {
        let err = ServerError::SessionNotFound("s1".to_string());
        let response = err.to_error_response(Some("s1".to_string()));
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("SESSION_NOT_FOUND"));
        assert!(json.contains("s1"));
    }
}
