//! Task-run endpoints: plan a goal into template/agent_goal steps,
//! submit it to the run manager, and expose status + artifact reads.

use crate::error::ServerError;
use crate::models::{
    ArtifactChunkResponse, ArtifactQuery, TaskRunRequest, TaskRunResponse,
};
use crate::state::AppState;
use agentbrowse_agent_loop::{AgentLoop, LlmClient};
use agentbrowse_browser_session::SessionManager;
use agentbrowse_site_memory::CardStore;
use agentbrowse_task_runner::{
    planner, repair::repair_until_pass, templates, Budget, Run, RunMeta, RunStatus, Step, TaskSpec,
};
use agentbrowse_types::{ArtifactId, RunId, SessionId};
use base64::Engine;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;
use warp::{reject, reply, Reply};

const DEFAULT_MAX_RETRIES: u32 = 1;

fn urls_from_inputs(inputs: &Value) -> Vec<String> {
    inputs
        .get("urls")
        .and_then(|v| v.as_array())
        .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

async fn execute_step(
    step: Step,
    sessions: &SessionManager,
    session_id: SessionId,
    llm: &LlmClient,
    card_store: &Option<Arc<CardStore>>,
) -> Value {
    match step {
        Step::Template { template_id, inputs } => match template_id.as_str() {
            "batch_extract" => {
                let urls = urls_from_inputs(&inputs);
                let outcomes = templates::run_batch_extract(sessions, session_id, &urls, None).await;
                let succeeded = outcomes.iter().filter(|o| o.success).count();
                let failed = outcomes.len() - succeeded;
                json!({
                    "summary": {"succeeded": succeeded, "failed": failed, "total": outcomes.len()},
                    "results": outcomes,
                })
            }
            "multi_tab_compare" => {
                let urls = urls_from_inputs(&inputs);
                match templates::run_multi_tab_compare(sessions, session_id, &urls, None).await {
                    Ok(result) => json!({"success": true, "result": result}),
                    Err(e) => json!({"success": false, "error": e}),
                }
            }
            "login_session" => {
                let login_input = templates::login_session::LoginInput {
                    url: inputs.get("url").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                    username: inputs.get("username").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                    password: inputs.get("password").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                    username_selector: inputs.get("username_selector").and_then(|v| v.as_str()).map(String::from),
                    password_selector: inputs.get("password_selector").and_then(|v| v.as_str()).map(String::from),
                    submit_selector: inputs.get("submit_selector").and_then(|v| v.as_str()).map(String::from),
                    success_selector: inputs.get("success_selector").and_then(|v| v.as_str()).map(String::from),
                    success_url_contains: inputs
                        .get("success_url_contains")
                        .and_then(|v| v.as_str())
                        .map(String::from),
                };
                match templates::run_login_session(sessions, session_id, &login_input).await {
                    Ok(result) => json!({"success": true, "result": result}),
                    Err(e) => json!({"success": false, "error": e}),
                }
            }
            other => json!({"success": false, "error": format!("unknown template {other}")}),
        },
        Step::AgentGoal { goal } => {
            let agent = AgentLoop::new(session_id, sessions.clone(), llm.clone(), card_store.clone());
            let outcome = agent.run(goal).await;
            agent.cleanup().await;
            json!({
                "success": outcome.success,
                "result": outcome.result,
                "error": outcome.error,
            })
        }
    }
}

/// POST /api/v1/task-runs
pub async fn create_task_run_handler(
    request: TaskRunRequest,
    state: AppState,
) -> Result<impl Reply, warp::Rejection> {
    if request.goal.trim().is_empty() {
        return Err(reject::custom(crate::auth::AuthRejection(
            ServerError::InvalidRequest("goal must not be empty".to_string()),
        )));
    }

    let session_id = match request.session_id {
        Some(id) => SessionId::from(id),
        None => state.new_headless_session().await.map_err(|e| {
            reject::custom(crate::auth::AuthRejection(ServerError::ExecutionError(
                e.to_string(),
            )))
        })?,
    };

    let task_spec = TaskSpec {
        goal: request.goal.clone(),
        inputs: request.inputs.clone(),
        constraints: request.constraints.clone(),
        output_schema: request.output_schema.clone(),
        budget: Budget {
            max_retries: request.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            timeout_secs: request.timeout_secs,
        },
    };

    let sessions = state.sessions.clone();
    let llm = state.llm_client();
    let card_store = state.card_store.clone();
    let timeout = request.timeout_secs.map(std::time::Duration::from_secs);

    let steps = planner::plan_with_llm_fallback(&task_spec, Some(&llm)).await;
    let template_id = steps.iter().find_map(|s| match s {
        Step::Template { template_id, .. } => Some(template_id.clone()),
        Step::AgentGoal { .. } => None,
    });
    let meta = RunMeta {
        template_id,
        session_id,
        owns_session: request.session_id.is_none(),
    };

    let run_id = state
        .run_manager
        .submit(
            meta,
            move |_handle| async move {
                let mut last_result = json!({"success": false, "error": "no steps planned"});
                for step in steps {
                    last_result = execute_step(step, &sessions, session_id, &llm, &card_store).await;
                }

                if let Some(schema) = task_spec.output_schema.clone() {
                    let goal = task_spec.goal.clone();
                    let max_retries = task_spec.budget.max_retries;
                    let sessions = sessions.clone();
                    let llm = llm.clone();
                    let card_store = card_store.clone();
                    let (result, _verification) = repair_until_pass(
                        &schema,
                        last_result,
                        &goal,
                        max_retries,
                        |step| execute_step(step, &sessions, session_id, &llm, &card_store),
                    )
                    .await;
                    result
                } else {
                    last_result
                }
            },
            timeout,
        )
        .await
        .map_err(|e| {
            reject::custom(crate::auth::AuthRejection(match e {
                agentbrowse_task_runner::RunnerError::ConcurrencyLimitReached { .. } => {
                    ServerError::ConcurrencyLimitReached(e.to_string())
                }
                other => ServerError::ExecutionError(other.to_string()),
            }))
        })?;

    Ok(reply::json(&TaskRunResponse { run_id: run_id.0 }))
}

/// GET /api/v1/task-runs/:id
pub async fn get_task_run_handler(id: Uuid, state: AppState) -> Result<impl Reply, warp::Rejection> {
    let run: Run = state
        .run_manager
        .get(&RunId::from(id))
        .await
        .map_err(|e| reject::custom(crate::auth::AuthRejection(ServerError::RunNotFound(e.to_string()))))?;

    if run.status.is_terminal() {
        match run.status {
            RunStatus::Succeeded => state.counters.runs_succeeded.fetch_add(1, std::sync::atomic::Ordering::Relaxed),
            RunStatus::PartialSuccess => state
                .counters
                .runs_partial_success
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed),
            RunStatus::Failed => state.counters.runs_failed.fetch_add(1, std::sync::atomic::Ordering::Relaxed),
            RunStatus::Canceled => state.counters.runs_canceled.fetch_add(1, std::sync::atomic::Ordering::Relaxed),
            _ => 0,
        };
    }

    Ok(reply::json(&run))
}

/// DELETE /api/v1/task-runs/:id — requests cooperative cancellation.
pub async fn cancel_task_run_handler(id: Uuid, state: AppState) -> Result<impl Reply, warp::Rejection> {
    state
        .run_manager
        .cancel(&RunId::from(id))
        .await
        .map_err(|e| reject::custom(crate::auth::AuthRejection(ServerError::RunNotFound(e.to_string()))))?;

    Ok(reply::with_status(warp::reply(), warp::http::StatusCode::ACCEPTED))
}

/// GET /api/v1/artifacts/:id?offset=&limit=
pub async fn get_artifact_handler(
    id: Uuid,
    query: ArtifactQuery,
    state: AppState,
) -> Result<impl Reply, warp::Rejection> {
    let artifact_id = ArtifactId::from(id);
    let offset = query.offset.unwrap_or(0);
    let limit = query.limit.unwrap_or(usize::MAX);

    let total_len = state
        .artifacts
        .len(&artifact_id)
        .map_err(|e| reject::custom(crate::auth::AuthRejection(ServerError::ArtifactNotFound(e.to_string()))))?;

    let bytes = state
        .artifacts
        .get(&artifact_id, offset, limit)
        .map_err(|e| reject::custom(crate::auth::AuthRejection(ServerError::ArtifactNotFound(e.to_string()))))?;

    let response = ArtifactChunkResponse {
        offset,
        length: bytes.len(),
        total_len,
        data: base64::engine::general_purpose::STANDARD.encode(&bytes),
    };

    Ok(reply::json(&response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[tokio::test]
    async fn create_task_run_rejects_empty_goal() {
        let state = AppState::new(Arc::new(Config::dev_default()));
        let request = TaskRunRequest {
            session_id: None,
            goal: "".to_string(),
            inputs: json!({}),
            constraints: None,
            output_schema: None,
            max_retries: None,
            timeout_secs: None,
        };
        let result = create_task_run_handler(request, state).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn get_task_run_handler_rejects_unknown_run() {
        let state = AppState::new(Arc::new(Config::dev_default()));
        let result = get_task_run_handler(Uuid::new_v4(), state).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn get_artifact_handler_rejects_unknown_artifact() {
        let state = AppState::new(Arc::new(Config::dev_default()));
        let result = get_artifact_handler(Uuid::new_v4(), ArtifactQuery::default(), state).await;
        assert!(result.is_err());
    }
}
