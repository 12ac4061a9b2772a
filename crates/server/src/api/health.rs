//! Health check endpoint
//!
//! Reports server status, uptime, active session/run counts, and the
//! structured summary counters (spec's supplemented ambient feature).
//! Unauthenticated, intended for load balancers and monitoring.

use crate::models::HealthResponse;
use crate::state::AppState;
use warp::{reply, Reply};

pub async fn health_handler(state: AppState) -> Result<impl Reply, warp::Rejection> {
    let response = HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
        active_sessions: state.active_session_count().await,
        active_runs: state.run_manager.active_count().await,
        counters: state.counters.snapshot(),
    };

    Ok(reply::json(&response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::sync::Arc;

    #[tokio::test]
    async fn health_handler_reports_zero_activity_on_a_fresh_state() {
        let state = AppState::new(Arc::new(Config::dev_default()));
        let result = health_handler(state).await;
        assert!(result.is_ok());
    }
}
