//! Run state (spec §3 Run, §4.3, §8 "once terminal status is set,
//! subsequent attempts to mutate status are no-ops").

use agentbrowse_types::{ArtifactId, RunId, SessionId, ToolError};
use serde::{Deserialize, Serialize};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    Running,
    Succeeded,
    PartialSuccess,
    Failed,
    Canceled,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunStatus::Succeeded | RunStatus::PartialSuccess | RunStatus::Failed | RunStatus::Canceled
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunProgress {
    pub done_steps: u32,
    pub total_steps: u32,
    pub message: Option<String>,
}

/// Wall-clock cost of the run (spec §3 "metrics (elapsed ms)").
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RunMetrics {
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,
    pub template_id: Option<String>,
    pub session_id: Option<SessionId>,
    pub owns_session: bool,
    pub status: RunStatus,
    pub progress: Option<RunProgress>,
    pub metrics: Option<RunMetrics>,
    pub result: Option<serde_json::Value>,
    pub error: Option<ToolError>,
    pub artifacts: Vec<ArtifactId>,
    #[serde(skip)]
    created_at: Option<Instant>,
}

impl Run {
    pub fn new(id: RunId, template_id: Option<String>, session_id: Option<SessionId>, owns_session: bool) -> Self {
        Self {
            id,
            template_id,
            session_id,
            owns_session,
            status: RunStatus::Queued,
            progress: None,
            metrics: None,
            result: None,
            error: None,
            artifacts: Vec::new(),
            created_at: Some(Instant::now()),
        }
    }

    /// Moves the run into `Running`. A no-op once the run is terminal.
    pub fn start(&mut self) {
        if !self.status.is_terminal() {
            self.status = RunStatus::Running;
        }
    }

    pub fn report_progress(&mut self, progress: RunProgress) {
        if !self.status.is_terminal() {
            self.progress = Some(progress);
        }
    }

    /// Sets a terminal status. Subsequent calls after the run is already
    /// terminal are no-ops, so status transitions are monotonic (spec §8).
    pub fn finish(&mut self, status: RunStatus, result: Option<serde_json::Value>, error: Option<ToolError>) {
        if self.status.is_terminal() {
            return;
        }
        self.status = status;
        self.result = result;
        self.error = error;
        let elapsed_ms = self.created_at.map(|t| t.elapsed().as_millis() as u64).unwrap_or(0);
        self.metrics = Some(RunMetrics { elapsed_ms });
    }
}

/// Derives a terminal status from an executor's result value (spec §4.3
/// "transitions to a terminal status derived from the executor's result").
pub fn derive_terminal_status(result: &serde_json::Value) -> RunStatus {
    if let Some(summary) = result.get("summary") {
        let succeeded = summary.get("succeeded").and_then(|v| v.as_u64());
        let total = summary.get("total").and_then(|v| v.as_u64());
        if let (Some(succeeded), Some(total)) = (succeeded, total) {
            if total == 0 {
                return RunStatus::Failed;
            }
            if succeeded == total {
                return RunStatus::Succeeded;
            }
            let ratio = succeeded as f64 / total as f64;
            return if ratio >= 0.5 {
                RunStatus::PartialSuccess
            } else {
                RunStatus::Failed
            };
        }
    }
    if let Some(success) = result.get("success").and_then(|v| v.as_bool()) {
        return if success {
            RunStatus::Succeeded
        } else {
            RunStatus::Failed
        };
    }
    RunStatus::Succeeded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_after_terminal_is_a_no_op() {
        let mut run = Run::new(RunId::new(), None, None, false);
        run.finish(RunStatus::Succeeded, Some(serde_json::json!({"a": 1})), None);
        run.finish(
            RunStatus::Failed,
            None,
            Some(agentbrowse_types::ToolError::new(agentbrowse_types::ErrorCode::ExecutionError, "late error")),
        );
        assert_eq!(run.status, RunStatus::Succeeded);
        assert_eq!(run.result, Some(serde_json::json!({"a": 1})));
        assert!(run.error.is_none());
    }

    #[test]
    fn finish_records_elapsed_ms_metrics() {
        let mut run = Run::new(RunId::new(), None, None, false);
        run.finish(RunStatus::Succeeded, None, None);
        assert!(run.metrics.is_some());
    }

    #[test]
    fn start_after_terminal_is_a_no_op() {
        let mut run = Run::new(RunId::new(), None, None, false);
        run.finish(RunStatus::Canceled, None, None);
        run.start();
        assert_eq!(run.status, RunStatus::Canceled);
    }

    #[test]
    fn summary_ratio_derives_partial_success() {
        let result = serde_json::json!({"summary": {"succeeded": 2, "total": 3}});
        assert_eq!(derive_terminal_status(&result), RunStatus::PartialSuccess);
    }

    #[test]
    fn summary_all_succeeded_derives_succeeded() {
        let result = serde_json::json!({"summary": {"succeeded": 3, "total": 3}});
        assert_eq!(derive_terminal_status(&result), RunStatus::Succeeded);
    }

    #[test]
    fn summary_below_half_derives_failed() {
        let result = serde_json::json!({"summary": {"succeeded": 1, "total": 3}});
        assert_eq!(derive_terminal_status(&result), RunStatus::Failed);
    }

    #[test]
    fn boolean_success_field_derives_status() {
        assert_eq!(
            derive_terminal_status(&serde_json::json!({"success": true})),
            RunStatus::Succeeded
        );
        assert_eq!(
            derive_terminal_status(&serde_json::json!({"success": false})),
            RunStatus::Failed
        );
    }

    #[test]
    fn bare_result_defaults_to_succeeded() {
        assert_eq!(
            derive_terminal_status(&serde_json::json!({"anything": 1})),
            RunStatus::Succeeded
        );
    }
}
