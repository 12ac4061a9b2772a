//! Agent-run endpoints: spawn an `AgentLoop`, stream its events over
//! SSE, and resume it when it is suspended on `ask_human`.

use crate::error::ServerError;
use crate::models::{AgentRunRequest, AgentRunResponse, ResolveInputRequest, ResolveInputResponse};
use crate::sse::event_to_sse;
use crate::state::AppState;
use agentbrowse_agent_loop::AgentLoop;
use agentbrowse_types::SessionId;
use std::convert::Infallible;
use std::sync::Arc;
use uuid::Uuid;
use warp::{reject, reply, Reply};

/// POST /api/v1/agent-runs
pub async fn create_agent_run_handler(
    request: AgentRunRequest,
    state: AppState,
) -> Result<impl Reply, warp::Rejection> {
    if request.task.trim().is_empty() {
        return Err(reject::custom(crate::auth::AuthRejection(
            ServerError::InvalidRequest("task must not be empty".to_string()),
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

    let agent_loop = Arc::new({
        let mut a = AgentLoop::new(
            session_id,
            state.sessions.clone(),
            state.llm_client(),
            state.card_store.clone(),
        );
        if let Some(max_iter) = request.max_iterations {
            a = a.with_max_iterations(max_iter);
        } else {
            a = a.with_max_iterations(state.config.runs.agent_max_iterations);
        }
        a
    });

    let run_id = Uuid::new_v4();
    state.register_agent_run(run_id, agent_loop.clone()).await;

    let counters = state.counters.clone();
    let task = request.task.clone();
    tokio::spawn(async move {
        let outcome = agent_loop.run(task).await;
        if outcome.success {
            counters
                .runs_succeeded
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        } else {
            counters
                .runs_failed
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        }
        agent_loop.cleanup().await;
    });

    Ok(reply::json(&AgentRunResponse {
        run_id,
        session_id: session_id.0,
    }))
}

/// GET /api/v1/agent-runs/:id/events — replays buffered events then
/// streams live ones until `done` (spec §6 SSE ordering).
pub async fn agent_run_events_handler(
    run_id: Uuid,
    state: AppState,
) -> Result<impl Reply, warp::Rejection> {
    let agent_loop = state.get_agent_run(&run_id).await.ok_or_else(|| {
        reject::custom(crate::auth::AuthRejection(ServerError::RunNotFound(
            run_id.to_string(),
        )))
    })?;

    let (buffered, mut live) = agent_loop.subscribe();

    let sse_stream = async_stream::stream! {
        for event in &buffered {
            yield Ok::<_, Infallible>(event_to_sse(event));
            if event.is_terminal() {
                return;
            }
        }
        while let Ok(event) = live.recv().await {
            let terminal = event.is_terminal();
            yield Ok::<_, Infallible>(event_to_sse(&event));
            if terminal {
                break;
            }
        }
    };

    Ok(warp::sse::reply(warp::sse::keep_alive().stream(sse_stream)))
}

/// POST /api/v1/agent-runs/:id/input — resumes a suspended `ask_human`.
pub async fn resolve_agent_input_handler(
    run_id: Uuid,
    request: ResolveInputRequest,
    state: AppState,
) -> Result<impl Reply, warp::Rejection> {
    let agent_loop = state.get_agent_run(&run_id).await.ok_or_else(|| {
        reject::custom(crate::auth::AuthRejection(ServerError::RunNotFound(
            run_id.to_string(),
        )))
    })?;

    let resolved = agent_loop
        .resolve_input(&request.request_id, request.response)
        .await;

    Ok(reply::json(&ResolveInputResponse { resolved }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[tokio::test]
    async fn create_agent_run_rejects_empty_task() {
        let state = AppState::new(Arc::new(Config::dev_default()));
        let request = AgentRunRequest {
            session_id: None,
            task: "   ".to_string(),
            max_iterations: None,
        };
        let result = create_agent_run_handler(request, state).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn agent_run_events_handler_rejects_unknown_run() {
        let state = AppState::new(Arc::new(Config::dev_default()));
        let result = agent_run_events_handler(Uuid::new_v4(), state).await;
        assert!(result.is_err());
    }
}
