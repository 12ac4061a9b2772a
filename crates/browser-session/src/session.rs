//! Session and tab lifecycle (spec §4.1 "Browser Session & Tab Manager").
//!
//! A `Session` owns one `Driver` (one Chrome process or debug-port
//! connection) and a bounded set of `Tab`s. The `SessionManager` is the
//! process-wide registry of sessions; it also runs the background sweep
//! that expires idle sessions and idle headless browsers.

use crate::cookie_store::CookieStore;
use crate::driver::{self, ConnectionMode, Driver};
use crate::error::{BrowserError, Result};
use crate::tab::Tab;
use agentbrowse_types::{SessionId, TabId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

pub const MAX_TABS_PER_SESSION: usize = 20;

/// Headful sessions (real, human-visible Chrome windows) are kept alive
/// much longer than headless ones: a human may be mid-task in the window
/// for an hour before the agent touches it again.
const HEADFUL_IDLE_EXPIRY: Duration = Duration::from_secs(60 * 60);
const HEADLESS_IDLE_EXPIRY: Duration = Duration::from_secs(10 * 60);
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const IDLE_BROWSER_CLOSE_DELAY: Duration = Duration::from_secs(120);

pub struct Session {
    pub id: SessionId,
    pub headful: bool,
    driver: Driver,
    tabs: HashMap<TabId, Tab>,
    active_tab: Option<TabId>,
    last_activity: Instant,
}

impl Session {
    fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    fn idle_expiry(&self) -> Duration {
        if self.headful {
            HEADFUL_IDLE_EXPIRY
        } else {
            HEADLESS_IDLE_EXPIRY
        }
    }

    fn is_expired(&self) -> bool {
        self.last_activity.elapsed() >= self.idle_expiry()
    }
}

/// Thread-safe registry of live sessions (spec §3 "Session Manager").
#[derive(Clone)]
pub struct SessionManager {
    sessions: Arc<Mutex<HashMap<SessionId, Session>>>,
    cookie_store: CookieStore,
}

impl SessionManager {
    pub fn new(cookie_store: CookieStore) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            cookie_store,
        }
    }

    /// Creates a new session backed by a freshly launched Chrome process.
    pub async fn create(&self, headless: bool) -> Result<SessionId> {
        let driver = Driver::new(ConnectionMode::Sandboxed {
            chrome_path: None,
            no_sandbox: false,
            headless,
        })
        .await?;
        self.register(driver, !headless).await
    }

    /// Creates a session attached to an already-running Chrome exposing a
    /// debug port — always treated as headful (spec §4.1 "headful
    /// sessions are operator-visible Chrome windows").
    pub async fn create_headful(&self, debug_port: u16) -> Result<SessionId> {
        let driver = Driver::connect_debug_port(debug_port).await?;
        self.register(driver, true).await
    }

    async fn register(&self, driver: Driver, headful: bool) -> Result<SessionId> {
        let id = SessionId::new();
        let session = Session {
            id,
            headful,
            driver,
            tabs: HashMap::new(),
            active_tab: None,
            last_activity: Instant::now(),
        };
        self.sessions.lock().await.insert(id, session);
        self.create_tab(id, "about:blank").await?;
        log::info!("session {id} created (headful={headful})");
        Ok(id)
    }

    pub async fn create_tab(&self, session_id: SessionId, url: &str) -> Result<TabId> {
        let mut sessions = self.sessions.lock().await;
        let session = sessions
            .get_mut(&session_id)
            .ok_or_else(|| BrowserError::SessionNotFound(session_id.to_string()))?;

        if session.tabs.len() >= MAX_TABS_PER_SESSION {
            return Err(BrowserError::MaxTabsReached(MAX_TABS_PER_SESSION));
        }

        let page = session.driver.new_page(url).await?;
        let mut tab = Tab::new(page);
        tab.set_last_known_url(url.to_string());
        let tab_id = tab.id;
        session.tabs.insert(tab_id, tab);
        session.active_tab = Some(tab_id);
        session.touch();
        Ok(tab_id)
    }

    pub async fn switch_tab(&self, session_id: SessionId, tab_id: TabId) -> Result<()> {
        let mut sessions = self.sessions.lock().await;
        let session = sessions
            .get_mut(&session_id)
            .ok_or_else(|| BrowserError::SessionNotFound(session_id.to_string()))?;
        if !session.tabs.contains_key(&tab_id) {
            return Err(BrowserError::TabNotFound(tab_id.to_string()));
        }
        session.active_tab = Some(tab_id);
        session.touch();
        Ok(())
    }

    pub async fn close_tab(&self, session_id: SessionId, tab_id: TabId) -> Result<()> {
        let mut sessions = self.sessions.lock().await;
        let session = sessions
            .get_mut(&session_id)
            .ok_or_else(|| BrowserError::SessionNotFound(session_id.to_string()))?;
        session
            .tabs
            .remove(&tab_id)
            .ok_or_else(|| BrowserError::TabNotFound(tab_id.to_string()))?;
        if session.active_tab == Some(tab_id) {
            session.active_tab = session.tabs.keys().next().copied();
        }
        session.touch();
        Ok(())
    }

    pub async fn list_tabs(&self, session_id: SessionId) -> Result<Vec<TabId>> {
        let sessions = self.sessions.lock().await;
        let session = sessions
            .get(&session_id)
            .ok_or_else(|| BrowserError::SessionNotFound(session_id.to_string()))?;
        Ok(session.tabs.keys().copied().collect())
    }

    pub async fn active_tab_id(&self, session_id: SessionId) -> Result<TabId> {
        let sessions = self.sessions.lock().await;
        let session = sessions
            .get(&session_id)
            .ok_or_else(|| BrowserError::SessionNotFound(session_id.to_string()))?;
        session
            .active_tab
            .ok_or_else(|| BrowserError::TabNotFound("no active tab".to_string()))
    }

    /// Runs `f` against the session's active page, with cookies for the
    /// page's current domain injected beforehand and harvested afterward
    /// (spec §4.1 "Cookie discipline": every navigating operation syncs
    /// the cookie jar around itself).
    pub async fn with_active_page<F, Fut, T>(&self, session_id: SessionId, f: F) -> Result<T>
    where
        F: FnOnce(chromiumoxide::page::Page) -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let page = {
            let mut sessions = self.sessions.lock().await;
            let session = sessions
                .get_mut(&session_id)
                .ok_or_else(|| BrowserError::SessionNotFound(session_id.to_string()))?;
            let tab_id = session
                .active_tab
                .ok_or_else(|| BrowserError::TabNotFound("no active tab".to_string()))?;
            let tab = session
                .tabs
                .get(&tab_id)
                .ok_or_else(|| BrowserError::TabNotFound(tab_id.to_string()))?;
            session.touch();
            tab.page.clone()
        };

        if let Ok(url) = driver::current_url(&page).await {
            let cookies = self.cookie_store.get_for_url(&url).await;
            if !cookies.is_empty() {
                let _ = driver::inject_cookies(&page, &cookies).await;
            }
        }

        let result = f(page.clone()).await;

        if let Ok(cookies) = driver::harvest_cookies(&page).await {
            if !cookies.is_empty() {
                self.cookie_store.merge(cookies).await;
            }
        }

        result
    }

    /// Like [`Self::with_active_page`] but against a specific tab rather
    /// than the session's active one, so concurrent callers (e.g. a
    /// batch template running one tab per URL) don't trample each
    /// other's idea of "the" active tab.
    pub async fn with_tab<F, Fut, T>(&self, session_id: SessionId, tab_id: TabId, f: F) -> Result<T>
    where
        F: FnOnce(chromiumoxide::page::Page) -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let page = {
            let mut sessions = self.sessions.lock().await;
            let session = sessions
                .get_mut(&session_id)
                .ok_or_else(|| BrowserError::SessionNotFound(session_id.to_string()))?;
            let tab = session
                .tabs
                .get(&tab_id)
                .ok_or_else(|| BrowserError::TabNotFound(tab_id.to_string()))?;
            session.touch();
            tab.page.clone()
        };

        if let Ok(url) = driver::current_url(&page).await {
            let cookies = self.cookie_store.get_for_url(&url).await;
            if !cookies.is_empty() {
                let _ = driver::inject_cookies(&page, &cookies).await;
            }
        }

        let result = f(page.clone()).await;

        if let Ok(cookies) = driver::harvest_cookies(&page).await {
            if !cookies.is_empty() {
                self.cookie_store.merge(cookies).await;
            }
        }

        result
    }

    /// Registers a page the browser opened on its own (`window.open`,
    /// target=_blank link) as a first-class tab (spec §4.1 "Popup
    /// handling": unsolicited pages become tabs rather than being lost).
    pub async fn register_popup_as_tab(
        &self,
        session_id: SessionId,
        page: chromiumoxide::page::Page,
    ) -> Result<TabId> {
        let mut sessions = self.sessions.lock().await;
        let session = sessions
            .get_mut(&session_id)
            .ok_or_else(|| BrowserError::SessionNotFound(session_id.to_string()))?;
        if session.tabs.len() >= MAX_TABS_PER_SESSION {
            return Err(BrowserError::MaxTabsReached(MAX_TABS_PER_SESSION));
        }
        let tab = Tab::new(page);
        let tab_id = tab.id;
        session.tabs.insert(tab_id, tab);
        session.touch();
        Ok(tab_id)
    }

    pub async fn update_activity(&self, session_id: SessionId) -> Result<()> {
        let mut sessions = self.sessions.lock().await;
        let session = sessions
            .get_mut(&session_id)
            .ok_or_else(|| BrowserError::SessionNotFound(session_id.to_string()))?;
        session.touch();
        Ok(())
    }

    /// Harvests cookies from every tab in every session into the shared
    /// cookie store, used on graceful shutdown so headful window state
    /// survives a server restart (spec §4.1 "Cookie discipline").
    pub async fn save_all_cookies(&self) {
        let sessions = self.sessions.lock().await;
        for session in sessions.values() {
            for tab in session.tabs.values() {
                if let Ok(cookies) = driver::harvest_cookies(&tab.page).await {
                    if !cookies.is_empty() {
                        self.cookie_store.merge(cookies).await;
                    }
                }
            }
        }
        self.cookie_store.flush_now().await;
    }

    /// Headful sessions are driven by a human as well as the agent;
    /// periodically re-harvesting their cookies (rather than only around
    /// tool calls) keeps the store current even between agent turns.
    pub async fn sync_headful_cookies(&self) {
        let sessions = self.sessions.lock().await;
        for session in sessions.values().filter(|s| s.headful) {
            for tab in session.tabs.values() {
                if let Ok(cookies) = driver::harvest_cookies(&tab.page).await {
                    if !cookies.is_empty() {
                        self.cookie_store.merge(cookies).await;
                    }
                }
            }
        }
    }

    pub async fn close(&self, session_id: SessionId) -> Result<()> {
        let session = {
            let mut sessions = self.sessions.lock().await;
            sessions
                .remove(&session_id)
                .ok_or_else(|| BrowserError::SessionNotFound(session_id.to_string()))?
        };
        for tab in session.tabs.values() {
            if let Ok(cookies) = driver::harvest_cookies(&tab.page).await {
                if !cookies.is_empty() {
                    self.cookie_store.merge(cookies).await;
                }
            }
        }
        session.driver.close().await?;
        log::info!("session {session_id} closed");
        Ok(())
    }

    pub async fn close_all(&self) {
        let ids: Vec<SessionId> = self.sessions.lock().await.keys().copied().collect();
        for id in ids {
            let _ = self.close(id).await;
        }
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// One sweep pass: expires idle sessions. Intended to run every
    /// `SWEEP_INTERVAL` from `spawn_sweeper`; exposed separately so tests
    /// can drive it deterministically instead of waiting on a timer.
    pub async fn sweep_once(&self) {
        let expired: Vec<SessionId> = {
            let sessions = self.sessions.lock().await;
            sessions
                .values()
                .filter(|s| s.is_expired())
                .map(|s| s.id)
                .collect()
        };
        for id in expired {
            log::info!("session {id} idle-expired, closing");
            let _ = self.close(id).await;
        }
    }

    /// Spawns the background lifecycle sweeper. Only one sweep runs at a
    /// time: the interval tick is `await`ed serially inside the loop
    /// rather than spawned per-tick, so a slow sweep can never overlap
    /// the next one (spec §4.1 "single-flight sweep").
    pub fn spawn_sweeper(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                interval.tick().await;
                manager.sweep_once().await;
            }
        })
    }

    /// Spawns the idle-browser-close timer: a session with zero tabs left
    /// open (every tab explicitly closed, session itself not yet closed)
    /// has its underlying Chrome process torn down after a grace period
    /// rather than immediately, in case the caller is about to open a
    /// fresh tab in the same session (spec §4.1 "idle browser close").
    pub fn spawn_idle_browser_closer(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(IDLE_BROWSER_CLOSE_DELAY);
            loop {
                interval.tick().await;
                let empty: Vec<SessionId> = {
                    let sessions = manager.sessions.lock().await;
                    sessions
                        .values()
                        .filter(|s| s.tabs.is_empty())
                        .map(|s| s.id)
                        .collect()
                };
                for id in empty {
                    let _ = manager.close(id).await;
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_session_returns_session_not_found() {
        let manager = SessionManager::new(CookieStore::new());
        let result = manager.list_tabs(SessionId::new()).await;
        assert!(matches!(result, Err(BrowserError::SessionNotFound(_))));
    }

    #[tokio::test]
    async fn switch_to_unknown_tab_returns_tab_not_found() {
        let manager = SessionManager::new(CookieStore::new());
        let result = manager.switch_tab(SessionId::new(), TabId::new()).await;
        assert!(matches!(result, Err(BrowserError::SessionNotFound(_))));
    }
}
