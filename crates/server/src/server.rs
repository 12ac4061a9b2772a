//! Server execution logic
//!
//! Builds the route tree and runs the Warp server, including the
//! graceful-shutdown path that drains in-flight runs before exiting.

use crate::api::{
    agent_runs::{agent_run_events_handler, create_agent_run_handler, resolve_agent_input_handler},
    health::health_handler,
    task_runs::{cancel_task_run_handler, create_task_run_handler, get_artifact_handler, get_task_run_handler},
};
use crate::auth::{with_auth, AuthState};
use crate::state::AppState;
use crate::Config;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;
use warp::Filter;

/// Runs the server with the given configuration, blocking until a
/// shutdown signal (SIGINT/SIGTERM) is received. In-flight runs are
/// given a grace period to reach a terminal status before the process
/// exits.
pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!("Starting agentbrowse server");
    info!("  Host: {}", config.server.host);
    info!("  Port: {}", config.server.port);
    info!("  Dev mode: {}", config.server.dev_mode);
    info!("  TLS enabled: {}", config.server.enable_tls);
    info!("  Auth required: {}", config.auth.require_auth);
    info!("  Max concurrent runs: {}", config.runs.max_concurrent_runs);

    let config = Arc::new(config);
    let state = AppState::new(config.clone());
    let auth_state = Arc::new(AuthState::new(
        config.valid_tokens(),
        config.auth.require_auth,
        config.auth.rate_limit_per_minute,
    ));

    let routes = build_routes(state.clone(), auth_state);
    let routes = routes.with(warp::trace::request());

    let cors = if config.server.dev_mode {
        warp::cors()
            .allow_any_origin()
            .allow_methods(vec!["GET", "POST", "DELETE", "OPTIONS"])
            .allow_headers(vec!["content-type", "authorization"])
    } else {
        warp::cors()
            .allow_origin("https://yourdomain.com")
            .allow_methods(vec!["GET", "POST", "DELETE"])
            .allow_headers(vec!["content-type", "authorization"])
    };
    let routes = routes.with(cors);

    let addr: SocketAddr = config.bind_address().parse()?;

    if config.server.enable_tls {
        info!("Starting server with TLS");
        return Err("TLS support not yet implemented".into());
    }

    info!("Server listening on {}", addr);
    let (_, server) = warp::serve(routes).bind_with_graceful_shutdown(addr, wait_for_shutdown_signal());

    server.await;

    drain_in_flight_runs(&state).await;
    Ok(())
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        if let Ok(mut sig) = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            sig.recv().await;
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}

const SHUTDOWN_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);
const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Gives in-flight runs a bounded grace period to reach a terminal
/// status rather than killing them mid-flight on shutdown.
async fn drain_in_flight_runs(state: &AppState) {
    let deadline = tokio::time::Instant::now() + SHUTDOWN_DRAIN_TIMEOUT;
    while state.run_manager.active_count().await > 0 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(SHUTDOWN_POLL_INTERVAL).await;
    }
    let remaining = state.run_manager.active_count().await;
    if remaining > 0 {
        tracing::warn!("shutting down with {} run(s) still active", remaining);
    }
}

fn build_routes(
    state: AppState,
    auth_state: Arc<AuthState>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let health = warp::path!("api" / "v1" / "health")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(health_handler);

    let create_agent_run = warp::path!("api" / "v1" / "agent-runs")
        .and(warp::post())
        .and(with_auth(auth_state.clone()))
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(|_token: String, request, state| create_agent_run_handler(request, state));

    let agent_run_events = warp::path!("api" / "v1" / "agent-runs" / Uuid / "events")
        .and(warp::get())
        .and(with_auth(auth_state.clone()))
        .and(with_state(state.clone()))
        .and_then(|run_id: Uuid, _token: String, state| agent_run_events_handler(run_id, state));

    let agent_run_input = warp::path!("api" / "v1" / "agent-runs" / Uuid / "input")
        .and(warp::post())
        .and(with_auth(auth_state.clone()))
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(|run_id: Uuid, _token: String, request, state| {
            resolve_agent_input_handler(run_id, request, state)
        });

    let create_task_run = warp::path!("api" / "v1" / "task-runs")
        .and(warp::post())
        .and(with_auth(auth_state.clone()))
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(|_token: String, request, state| create_task_run_handler(request, state));

    let get_task_run = warp::path!("api" / "v1" / "task-runs" / Uuid)
        .and(warp::get())
        .and(with_auth(auth_state.clone()))
        .and(with_state(state.clone()))
        .and_then(|run_id: Uuid, _token: String, state| get_task_run_handler(run_id, state));

    let cancel_task_run = warp::path!("api" / "v1" / "task-runs" / Uuid)
        .and(warp::delete())
        .and(with_auth(auth_state.clone()))
        .and(with_state(state.clone()))
        .and_then(|run_id: Uuid, _token: String, state| cancel_task_run_handler(run_id, state));

    let get_artifact = warp::path!("api" / "v1" / "artifacts" / Uuid)
        .and(warp::get())
        .and(with_auth(auth_state))
        .and(warp::query::<crate::models::ArtifactQuery>())
        .and(with_state(state))
        .and_then(|artifact_id: Uuid, _token: String, query, state| {
            get_artifact_handler(artifact_id, query, state)
        });

    health
        .or(create_agent_run)
        .or(agent_run_events)
        .or(agent_run_input)
        .or(create_task_run)
        .or(get_task_run)
        .or(cancel_task_run)
        .or(get_artifact)
}

fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}
