use agentbrowse_browser_session::{BrowserError, CookieStore, SessionManager};
use agentbrowse_types::{SessionId, TabId};

#[tokio::test]
async fn operations_on_unknown_session_fail_with_session_not_found() {
    let manager = SessionManager::new(CookieStore::new());
    let bogus = SessionId::new();

    assert!(matches!(
        manager.list_tabs(bogus).await,
        Err(BrowserError::SessionNotFound(_))
    ));
    assert!(matches!(
        manager.create_tab(bogus, "about:blank").await,
        Err(BrowserError::SessionNotFound(_))
    ));
    assert!(matches!(
        manager.close_tab(bogus, TabId::new()).await,
        Err(BrowserError::SessionNotFound(_))
    ));
    assert!(matches!(
        manager.close(bogus).await,
        Err(BrowserError::SessionNotFound(_))
    ));
}

#[tokio::test]
async fn sweep_on_empty_registry_is_a_no_op() {
    let manager = SessionManager::new(CookieStore::new());
    manager.sweep_once().await;
    assert_eq!(manager.session_count().await, 0);
}

#[tokio::test]
async fn close_all_on_empty_registry_is_a_no_op() {
    let manager = SessionManager::new(CookieStore::new());
    manager.close_all().await;
    assert_eq!(manager.session_count().await, 0);
}
