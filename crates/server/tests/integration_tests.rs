//! Integration tests for agentbrowse-server
//!
//! These exercise the warp filter layer (routing, auth, JSON
//! (de)serialization) on top of the handler-level unit tests that live
//! alongside each module.
//!
//! To run these tests:
//! ```bash
//! cargo test -p agentbrowse-server --test integration_tests
//! ```

use agentbrowse_server::api::health::health_handler;
use agentbrowse_server::auth::{with_auth, AuthState};
use agentbrowse_server::models::{AgentRunRequest, TaskRunRequest};
use agentbrowse_server::state::AppState;
use agentbrowse_server::Config;
use serde_json::json;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::test::request;
use warp::Filter;

fn dev_state() -> AppState {
    AppState::new(Arc::new(Config::dev_default()))
}

#[tokio::test]
async fn test_health_endpoint() {
    let state = dev_state();
    let filter = warp::path!("api" / "v1" / "health")
        .and(warp::get())
        .and(warp::any().map(move || state.clone()))
        .and_then(health_handler);

    let response = request().method("GET").path("/api/v1/health").reply(&filter).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = serde_json::from_slice(response.body()).expect("valid json");
    assert_eq!(body["status"], "healthy");
    assert!(body.get("uptime_seconds").is_some());
    assert!(body.get("counters").is_some());
}

#[tokio::test]
async fn test_auth_with_valid_token() {
    let tokens = vec!["test-token-123".to_string()];
    let auth_state = Arc::new(AuthState::new(tokens, true, 100));

    let filter = warp::path("test")
        .and(with_auth(auth_state))
        .map(|token: String| warp::reply::json(&token));

    let response = request()
        .method("GET")
        .path("/test")
        .header("authorization", "Bearer test-token-123")
        .reply(&filter)
        .await;

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_auth_with_invalid_token() {
    let tokens = vec!["test-token-123".to_string()];
    let auth_state = Arc::new(AuthState::new(tokens, true, 100));

    let filter = warp::path("test")
        .and(with_auth(auth_state))
        .map(|token: String| warp::reply::json(&token))
        .recover(handle_rejection);

    let response = request()
        .method("GET")
        .path("/test")
        .header("authorization", "Bearer wrong-token")
        .reply(&filter)
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_without_header() {
    let tokens = vec!["test-token-123".to_string()];
    let auth_state = Arc::new(AuthState::new(tokens, true, 100));

    let filter = warp::path("test")
        .and(with_auth(auth_state))
        .map(|token: String| warp::reply::json(&token))
        .recover(handle_rejection);

    let response = request().method("GET").path("/test").reply(&filter).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

/// Test configuration loading defaults
#[test]
fn test_config_loading() {
    let config = Config::dev_default();

    assert_eq!(config.server.host, "127.0.0.1");
    assert!(config.server.dev_mode);
    assert!(!config.server.enable_tls);
}

/// Test configuration validation - TLS without cert
#[test]
fn test_config_validation_tls_without_cert() {
    let mut config = Config::dev_default();
    config.server.enable_tls = true;
    config.server.dev_mode = false;

    let result = config.validate();
    assert!(result.is_err());
}

/// Test create_agent_run request round-trips through JSON the way the
/// HTTP body filter expects it.
#[test]
fn test_agent_run_request_deserializes_from_json() {
    let body = json!({"task": "log into example.com"});
    let request: AgentRunRequest = serde_json::from_value(body).expect("valid request body");
    assert_eq!(request.task, "log into example.com");
    assert!(request.session_id.is_none());
    assert!(request.max_iterations.is_none());
}

/// Test create_task_run request defaults `inputs` to an empty object
/// when the caller omits it (spec: template steps tolerate missing
/// inputs).
#[test]
fn test_task_run_request_defaults_missing_inputs() {
    let body = json!({"goal": "compare pricing pages"});
    let request: TaskRunRequest = serde_json::from_value(body).expect("valid request body");
    assert_eq!(request.goal, "compare pricing pages");
    assert_eq!(request.inputs, json!({}));
}

/// Helper function to handle rejections for testing
async fn handle_rejection(err: warp::Rejection) -> Result<impl warp::Reply, std::convert::Infallible> {
    use agentbrowse_server::ServerError;

    let (code, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found".to_string())
    } else if let Some(rejection) = err.find::<agentbrowse_server::auth::AuthRejection>() {
        let e: &ServerError = &rejection.0;
        (e.status_code(), e.to_string())
    } else {
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
    };

    Ok(warp::reply::with_status(message, code))
}
