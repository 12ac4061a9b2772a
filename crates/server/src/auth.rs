//! Authentication and rate limiting middleware
//!
//! Provides bearer token authentication and per-token rate limiting for
//! API endpoints. Dev mode allows requests with no token at all.

use crate::error::ServerError;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use warp::{reject, Filter, Rejection};

/// Tracks valid tokens and per-token request counts for rate limiting.
#[derive(Clone)]
pub struct AuthState {
    valid_tokens: Vec<String>,
    require_auth: bool,
    rate_limit: u32,
    request_history: Arc<Mutex<HashMap<String, Vec<std::time::Instant>>>>,
}

impl AuthState {
    pub fn new(valid_tokens: Vec<String>, require_auth: bool, rate_limit: u32) -> Self {
        Self {
            valid_tokens,
            require_auth,
            rate_limit,
            request_history: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn validate_token(&self, token: &str) -> Result<String, ServerError> {
        if !self.require_auth {
            return Ok(token.to_string());
        }

        if self.valid_tokens.contains(&token.to_string()) {
            Ok(token.to_string())
        } else {
            Err(ServerError::AuthFailed("Invalid token".to_string()))
        }
    }

    pub async fn check_rate_limit(&self, token: &str) -> Result<(), ServerError> {
        let mut history = self.request_history.lock().await;
        let now = std::time::Instant::now();
        let one_minute_ago = now - std::time::Duration::from_secs(60);

        let requests = history.entry(token.to_string()).or_insert_with(Vec::new);
        requests.retain(|&timestamp| timestamp > one_minute_ago);

        if requests.len() >= self.rate_limit as usize {
            return Err(ServerError::RateLimited(format!(
                "Rate limit of {} requests per minute exceeded",
                self.rate_limit
            )));
        }

        requests.push(now);
        Ok(())
    }

    pub async fn clear_rate_limit(&self, token: &str) {
        let mut history = self.request_history.lock().await;
        history.remove(token);
    }

    pub async fn get_request_count(&self, token: &str) -> usize {
        let history = self.request_history.lock().await;
        let now = std::time::Instant::now();
        let one_minute_ago = now - std::time::Duration::from_secs(60);

        history
            .get(token)
            .map(|requests| requests.iter().filter(|&&t| t > one_minute_ago).count())
            .unwrap_or(0)
    }
}

#[derive(Debug)]
pub struct AuthRejection(pub ServerError);

impl reject::Reject for AuthRejection {}

fn extract_bearer_token(auth_header: String) -> Result<String, Rejection> {
    if let Some(token) = auth_header.strip_prefix("Bearer ") {
        Ok(token.to_string())
    } else {
        Err(reject::custom(AuthRejection(ServerError::AuthFailed(
            "Invalid Authorization header format".to_string(),
        ))))
    }
}

/// Warp filter that validates bearer tokens and enforces rate limits,
/// returning the validated token to downstream handlers.
pub fn with_auth(
    auth_state: Arc<AuthState>,
) -> impl Filter<Extract = (String,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization").and_then(
        move |auth_header: Option<String>| {
            let auth_state = auth_state.clone();
            async move {
                let token = if let Some(header) = auth_header {
                    extract_bearer_token(header)?
                } else if !auth_state.require_auth {
                    String::new()
                } else {
                    return Err(reject::custom(AuthRejection(ServerError::AuthFailed(
                        "Missing Authorization header".to_string(),
                    ))));
                };

                auth_state
                    .validate_token(&token)
                    .map_err(|e| reject::custom(AuthRejection(e)))?;

                auth_state
                    .check_rate_limit(&token)
                    .await
                    .map_err(|e| reject::custom(AuthRejection(e)))?;

                Ok::<String, Rejection>(token)
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_auth_state() -> AuthState {
        AuthState::new(
            vec!["valid-token-1".to_string(), "valid-token-2".to_string()],
            true,
            5,
        )
    }

    #[test]
    fn validate_token_accepts_known_token() {
        let auth_state = create_test_auth_state();
        assert!(auth_state.validate_token("valid-token-1").is_ok());
    }

    #[test]
    fn validate_token_rejects_unknown_token() {
        let auth_state = create_test_auth_state();
        assert!(auth_state.validate_token("invalid-token").is_err());
    }

    #[test]
    fn validate_token_skips_check_when_auth_disabled() {
        let auth_state = AuthState::new(vec![], false, 10);
        assert!(auth_state.validate_token("any-token").is_ok());
    }

    #[tokio::test]
    async fn rate_limit_rejects_after_the_cap() {
        let auth_state = create_test_auth_state();
        let token = "valid-token-1";
        for _ in 0..5 {
            auth_state.check_rate_limit(token).await.unwrap();
        }
        assert!(auth_state.check_rate_limit(token).await.is_err());
    }

    #[tokio::test]
    async fn rate_limit_is_tracked_per_token() {
        let auth_state = create_test_auth_state();
        for _ in 0..5 {
            auth_state.check_rate_limit("valid-token-1").await.unwrap();
        }
        assert!(auth_state.check_rate_limit("valid-token-2").await.is_ok());
    }

    #[tokio::test]
    async fn clear_rate_limit_resets_the_count() {
        let auth_state = create_test_auth_state();
        let token = "valid-token-1";
        for _ in 0..5 {
            auth_state.check_rate_limit(token).await.unwrap();
        }
        auth_state.clear_rate_limit(token).await;
        assert!(auth_state.check_rate_limit(token).await.is_ok());
    }

    #[test]
    fn extract_bearer_token_requires_the_prefix() {
        assert!(extract_bearer_token("Bearer abc".to_string()).is_ok());
        assert!(extract_bearer_token("abc".to_string()).is_err());
    }
}
