//! `batch_extract` template (spec §4.3): fetch title + text content for
//! a list of URLs with a sliding concurrency window, one tab per URL,
//! retrying navigation-timeout/page-crash failures exactly once.

use agentbrowse_browser_session::{driver, BrowserError, SessionManager};
use agentbrowse_types::{ErrorCode, SessionId};
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Semaphore;

pub const DEFAULT_CONCURRENCY: usize = 3;
pub const MAX_CONCURRENCY: usize = 5;
const MAX_CONTENT_LENGTH: usize = 20_000;

#[derive(Debug, Clone, Serialize)]
pub struct ExtractOutcome {
    pub url: String,
    pub success: bool,
    pub title: Option<String>,
    pub content: Option<String>,
    pub error: Option<String>,
}

/// Runs the extraction across `urls`, at most `concurrency` (clamped to
/// `[1, MAX_CONCURRENCY]`, defaulting to `DEFAULT_CONCURRENCY`) tabs
/// open at a time.
pub async fn run_batch_extract(
    sessions: &SessionManager,
    session_id: SessionId,
    urls: &[String],
    concurrency: Option<usize>,
) -> Vec<ExtractOutcome> {
    let permits = concurrency.unwrap_or(DEFAULT_CONCURRENCY).clamp(1, MAX_CONCURRENCY);
    let semaphore = Arc::new(Semaphore::new(permits));

    let mut tasks = FuturesUnordered::new();
    for url in urls.iter().cloned() {
        let semaphore = Arc::clone(&semaphore);
        tasks.push(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore never closed while tasks are queued");
            extract_one(sessions, session_id, url).await
        });
    }

    let mut outcomes = Vec::with_capacity(urls.len());
    while let Some(outcome) = tasks.next().await {
        outcomes.push(outcome);
    }
    outcomes
}

async fn extract_one(sessions: &SessionManager, session_id: SessionId, url: String) -> ExtractOutcome {
    match extract_attempt(sessions, session_id, &url).await {
        Ok((title, content)) => success(url, title, content),
        Err(e) if is_retryable(&e) => match extract_attempt(sessions, session_id, &url).await {
            Ok((title, content)) => success(url, title, content),
            Err(e) => failure(url, e),
        },
        Err(e) => failure(url, e),
    }
}

async fn extract_attempt(
    sessions: &SessionManager,
    session_id: SessionId,
    url: &str,
) -> agentbrowse_browser_session::error::Result<(String, String)> {
    let tab_id = sessions.create_tab(session_id, url).await?;
    let result = sessions
        .with_tab(session_id, tab_id, |page| async move {
            driver::navigate(&page, url).await?;
            let _ = driver::execute_javascript(
                &page,
                "new Promise(r => setTimeout(() => r(document.readyState), 300))",
            )
            .await;
            let title = driver::title(&page).await.unwrap_or_default();
            let mut content = driver::page_text(&page).await.unwrap_or_default();
            content.truncate(MAX_CONTENT_LENGTH);
            Ok((title, content))
        })
        .await;
    let _ = sessions.close_tab(session_id, tab_id).await;
    result
}

fn is_retryable(e: &BrowserError) -> bool {
    matches!(e.error_code(), ErrorCode::NavigationTimeout | ErrorCode::PageCrashed)
}

fn success(url: String, title: String, content: String) -> ExtractOutcome {
    ExtractOutcome {
        url,
        success: true,
        title: Some(title),
        content: Some(content),
        error: None,
    }
}

fn failure(url: String, e: BrowserError) -> ExtractOutcome {
    ExtractOutcome {
        url,
        success: false,
        title: None,
        content: None,
        error: Some(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn navigation_failed_is_retryable() {
        assert!(is_retryable(&BrowserError::NavigationFailed("timeout".to_string())));
    }

    #[test]
    fn page_crashed_is_retryable() {
        assert!(is_retryable(&BrowserError::PageCrashed("oom".to_string())));
    }

    #[test]
    fn element_not_found_is_not_retryable() {
        assert!(!is_retryable(&BrowserError::ElementNotFound("#x".to_string())));
    }
}
