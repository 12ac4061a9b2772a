//! Run Manager (spec §4.3, §5): submits an executor function under a
//! concurrency semaphore (default 5), applies a wall-clock timeout
//! (capped at 600 s), tracks progress, derives a terminal status from
//! the executor's result, and expires runs 30 min after they go
//! terminal.

use crate::artifact::ArtifactStore;
use crate::error::{Result, RunnerError};
use crate::run::{self, Run, RunProgress, RunStatus};
use agentbrowse_types::{ErrorCode, RunId, SessionId, ToolError};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Semaphore};

pub const DEFAULT_CONCURRENCY: usize = 5;
pub const MAX_RUN_TIMEOUT: Duration = Duration::from_secs(600);
pub const RUN_TTL_AFTER_TERMINAL: Duration = Duration::from_secs(30 * 60);

/// Identifying metadata recorded on a `Run` at submission time (spec §3
/// Run: template identifier, session identifier, owns-session flag).
#[derive(Debug, Clone, Default)]
pub struct RunMeta {
    pub template_id: Option<String>,
    pub session_id: SessionId,
    pub owns_session: bool,
}

/// Cooperative cancellation: executors poll `is_canceled()` between
/// steps rather than being preempted (spec §5 "non-preemptive").
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

struct RunState {
    run: Run,
    terminal_at: Option<Instant>,
    cancel: CancelToken,
}

#[derive(Clone)]
pub struct RunManager {
    semaphore: Arc<Semaphore>,
    runs: Arc<Mutex<HashMap<RunId, RunState>>>,
    artifacts: Arc<ArtifactStore>,
}

/// Handed to an executor so it can report progress and observe
/// cancellation without holding a reference to the whole manager.
#[derive(Clone)]
pub struct RunHandle {
    run_id: RunId,
    cancel: CancelToken,
    manager: RunManager,
}

impl RunHandle {
    pub fn is_canceled(&self) -> bool {
        self.cancel.is_canceled()
    }

    pub async fn report_progress(&self, done_steps: u32, total_steps: u32, message: Option<String>) {
        self.manager
            .report_progress(&self.run_id, RunProgress {
                done_steps,
                total_steps,
                message,
            })
            .await;
    }
}

impl RunManager {
    pub fn new(concurrency: usize, artifacts: Arc<ArtifactStore>) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(concurrency.max(1))),
            runs: Arc::new(Mutex::new(HashMap::new())),
            artifacts,
        }
    }

    /// Submits `executor` for background execution. Returns
    /// `ConcurrencyLimitReached` immediately (no queuing) if every slot
    /// is occupied by a non-terminal run, matching the resource policy's
    /// "return 429-equivalent" rule rather than silently queuing.
    pub async fn submit<F, Fut>(&self, meta: RunMeta, executor: F, timeout: Option<Duration>) -> Result<RunId>
    where
        F: FnOnce(RunHandle) -> Fut + Send + 'static,
        Fut: Future<Output = Value> + Send + 'static,
    {
        let permit = Arc::clone(&self.semaphore)
            .try_acquire_owned()
            .map_err(|_| RunnerError::ConcurrencyLimitReached {
                max: DEFAULT_CONCURRENCY,
            })?;

        let run_id = RunId::new();
        let cancel = CancelToken::new();
        let mut run = Run::new(run_id, meta.template_id, Some(meta.session_id), meta.owns_session);
        run.start();

        self.runs.lock().await.insert(
            run_id,
            RunState {
                run,
                terminal_at: None,
                cancel: cancel.clone(),
            },
        );

        let manager = self.clone();
        let timeout = timeout.unwrap_or(MAX_RUN_TIMEOUT).min(MAX_RUN_TIMEOUT);
        let handle = RunHandle {
            run_id,
            cancel: cancel.clone(),
            manager: manager.clone(),
        };

        tokio::spawn(async move {
            let _permit = permit;
            let outcome = tokio::time::timeout(timeout, executor(handle)).await;
            match outcome {
                Ok(value) => {
                    let status = run::derive_terminal_status(&value);
                    manager.finish(&run_id, status, Some(value), None).await;
                }
                Err(_) => {
                    let message = format!("run exceeded its {}s timeout", timeout.as_secs());
                    manager
                        .finish(
                            &run_id,
                            RunStatus::Failed,
                            None,
                            Some(ToolError::new(ErrorCode::RunTimeout, message)),
                        )
                        .await;
                }
            }
        });

        Ok(run_id)
    }

    /// Requests cancellation. The run only transitions to `Canceled`
    /// once its executor observes the token between steps and returns.
    pub async fn cancel(&self, run_id: &RunId) -> Result<()> {
        let runs = self.runs.lock().await;
        let state = runs
            .get(run_id)
            .ok_or_else(|| RunnerError::RunNotFound(run_id.to_string()))?;
        state.cancel.cancel();
        Ok(())
    }

    pub async fn get(&self, run_id: &RunId) -> Result<Run> {
        let runs = self.runs.lock().await;
        runs.get(run_id)
            .map(|s| s.run.clone())
            .ok_or_else(|| RunnerError::RunNotFound(run_id.to_string()))
    }

    async fn report_progress(&self, run_id: &RunId, progress: RunProgress) {
        let mut runs = self.runs.lock().await;
        if let Some(state) = runs.get_mut(run_id) {
            state.run.report_progress(progress);
        }
    }

    /// Finalizes a run. On any terminal status, the executor's result
    /// (if present) is serialized to JSON and saved as the run's primary
    /// artifact (spec §3 Artifact handling), regardless of whether the
    /// run landed as canceled underneath it.
    async fn finish(&self, run_id: &RunId, status: RunStatus, result: Option<Value>, error: Option<ToolError>) {
        let mut runs = self.runs.lock().await;
        if let Some(state) = runs.get_mut(run_id) {
            let canceled = state.cancel.is_canceled();
            let (final_status, final_error) = if canceled {
                (RunStatus::Canceled, Some(ToolError::new(ErrorCode::RunCanceled, "run was canceled")))
            } else {
                (status, error)
            };
            if let Some(value) = &result {
                let artifact_id = self.artifacts.put(value);
                state.run.artifacts.push(artifact_id);
            }
            state.run.finish(final_status, result, final_error);
            state.terminal_at = Some(Instant::now());
        }
    }

    /// Removes runs whose terminal status was reached more than
    /// [`RUN_TTL_AFTER_TERMINAL`] ago. Safe to call on a timer or on
    /// demand, mirroring the artifact store's sweep style.
    pub async fn sweep_expired(&self) {
        let mut runs = self.runs.lock().await;
        runs.retain(|_, state| match state.terminal_at {
            Some(at) => at.elapsed() < RUN_TTL_AFTER_TERMINAL,
            None => true,
        });
    }

    pub async fn active_count(&self) -> usize {
        let runs = self.runs.lock().await;
        runs.values().filter(|s| !s.run.status.is_terminal()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn manager(concurrency: usize) -> RunManager {
        RunManager::new(concurrency, Arc::new(ArtifactStore::new()))
    }

    #[tokio::test]
    async fn submit_runs_executor_and_derives_status() {
        let manager = manager(DEFAULT_CONCURRENCY);
        let run_id = manager
            .submit(RunMeta::default(), |_handle| async { json!({"success": true}) }, None)
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        let run = manager.get(&run_id).await.unwrap();
        assert_eq!(run.status, RunStatus::Succeeded);
    }

    #[tokio::test]
    async fn concurrency_cap_of_one_rejects_a_second_submit() {
        let manager = manager(1);
        let _first = manager
            .submit(
                RunMeta::default(),
                |_handle| async {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    json!({"success": true})
                },
                None,
            )
            .await
            .unwrap();

        let second = manager
            .submit(RunMeta::default(), |_handle| async { json!({"success": true}) }, None)
            .await;
        assert!(matches!(second, Err(RunnerError::ConcurrencyLimitReached { .. })));
    }

    #[tokio::test]
    async fn timeout_is_capped_and_marks_run_failed() {
        let manager = manager(DEFAULT_CONCURRENCY);
        let run_id = manager
            .submit(
                RunMeta::default(),
                |_handle| async {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    json!({"success": true})
                },
                Some(Duration::from_millis(5)),
            )
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        let run = manager.get(&run_id).await.unwrap();
        assert_eq!(run.status, RunStatus::Failed);
        assert!(run.error.unwrap().message.contains("timeout"));
    }

    #[tokio::test]
    async fn canceled_run_finishes_as_canceled_even_with_a_success_result() {
        let manager = manager(DEFAULT_CONCURRENCY);
        let run_id = manager
            .submit(
                RunMeta::default(),
                |handle| async move {
                    tokio::time::sleep(Duration::from_millis(30)).await;
                    let _ = handle.is_canceled();
                    json!({"success": true})
                },
                None,
            )
            .await
            .unwrap();

        manager.cancel(&run_id).await.unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;
        let run = manager.get(&run_id).await.unwrap();
        assert_eq!(run.status, RunStatus::Canceled);
        assert_eq!(run.error.unwrap().code, ErrorCode::RunCanceled);
    }

    #[tokio::test]
    async fn finished_run_result_is_saved_as_an_artifact() {
        let manager = manager(DEFAULT_CONCURRENCY);
        let run_id = manager
            .submit(RunMeta::default(), |_handle| async { json!({"success": true, "price": 9}) }, None)
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        let run = manager.get(&run_id).await.unwrap();
        assert_eq!(run.artifacts.len(), 1);
        let bytes = manager.artifacts.get(&run.artifacts[0], 0, 1024).unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value, json!({"success": true, "price": 9}));
    }

    #[tokio::test]
    async fn unknown_run_id_is_not_found() {
        let manager = manager(DEFAULT_CONCURRENCY);
        let err = manager.get(&RunId::new()).await.unwrap_err();
        assert!(matches!(err, RunnerError::RunNotFound(_)));
    }
}
