//! Task runner error taxonomy (spec §7): run executor errors mark the run
//! `failed` with the error record, they never crash the Run Manager.

use agentbrowse_types::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum RunnerError {
    #[error("run {0} not found")]
    RunNotFound(String),

    #[error("artifact {0} not found")]
    ArtifactNotFound(String),

    #[error("template {0} not found")]
    TemplateNotFound(String),

    #[error("trust level does not allow {0}")]
    TrustLevelNotAllowed(String),

    #[error("login field not found: {0}")]
    TplLoginFieldNotFound(String),

    #[error("at most {max} concurrent runs are allowed")]
    ConcurrencyLimitReached { max: usize },

    #[error("run exceeded its {0}s timeout")]
    RunTimeout(u64),

    #[error("run was canceled")]
    RunCanceled,

    #[error("{0}")]
    ExecutionError(String),
}

impl RunnerError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            RunnerError::RunNotFound(_) => ErrorCode::RunNotFound,
            RunnerError::ArtifactNotFound(_) => ErrorCode::ArtifactNotFound,
            RunnerError::TemplateNotFound(_) => ErrorCode::TemplateNotFound,
            RunnerError::TrustLevelNotAllowed(_) => ErrorCode::TrustLevelNotAllowed,
            RunnerError::TplLoginFieldNotFound(_) => ErrorCode::TplLoginFieldNotFound,
            RunnerError::ConcurrencyLimitReached { .. } => ErrorCode::InvalidRequest,
            RunnerError::RunTimeout(_) => ErrorCode::RunTimeout,
            RunnerError::RunCanceled => ErrorCode::RunCanceled,
            RunnerError::ExecutionError(_) => ErrorCode::ExecutionError,
        }
    }
}

pub type Result<T> = std::result::Result<T, RunnerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concurrency_limit_maps_to_invalid_request() {
        let err = RunnerError::ConcurrencyLimitReached { max: 5 };
        assert_eq!(err.error_code(), ErrorCode::InvalidRequest);
    }

    #[test]
    fn run_timeout_maps_to_run_timeout_code() {
        let err = RunnerError::RunTimeout(600);
        assert_eq!(err.error_code(), ErrorCode::RunTimeout);
    }
}
