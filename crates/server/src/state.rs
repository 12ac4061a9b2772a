//! Shared application state injected into route handlers (spec §6
//! "Transport": request handlers call the core's typed methods).

use crate::config::Config;
use agentbrowse_agent_loop::{AgentLoop, LlmClient};
use agentbrowse_browser_session::{CookieStore, SessionManager};
use agentbrowse_site_memory::CardStore;
use agentbrowse_task_runner::{ArtifactStore, RunManager};
use agentbrowse_types::SessionId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Metrics-free summary counters, reported by the health endpoint only
/// (spec's supplemented ambient feature).
#[derive(Default)]
pub struct Counters {
    pub sessions_created: AtomicU64,
    pub runs_succeeded: AtomicU64,
    pub runs_partial_success: AtomicU64,
    pub runs_failed: AtomicU64,
    pub runs_canceled: AtomicU64,
}

impl Counters {
    pub fn snapshot(&self) -> crate::models::SummaryCounters {
        crate::models::SummaryCounters {
            sessions_created: self.sessions_created.load(Ordering::Relaxed),
            runs_succeeded: self.runs_succeeded.load(Ordering::Relaxed),
            runs_partial_success: self.runs_partial_success.load(Ordering::Relaxed),
            runs_failed: self.runs_failed.load(Ordering::Relaxed),
            runs_canceled: self.runs_canceled.load(Ordering::Relaxed),
        }
    }
}

/// Process-wide state shared across every handler. Cloning is cheap —
/// every field is an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sessions: SessionManager,
    pub card_store: Option<Arc<CardStore>>,
    llm: LlmClient,
    pub run_manager: RunManager,
    pub artifacts: Arc<ArtifactStore>,
    /// Agent loops keyed by run id, so the SSE and resume-input routes
    /// can find the loop a given run is driving.
    pub agent_runs: Arc<Mutex<HashMap<Uuid, Arc<AgentLoop>>>>,
    pub counters: Arc<Counters>,
    start_time: Instant,
}

impl AppState {
    pub fn new(config: Arc<Config>) -> Self {
        let sessions = SessionManager::new(CookieStore::new());
        let card_store = CardStore::new(None).ok().map(Arc::new);
        let llm = LlmClient::new(agentbrowse_agent_loop::LlmConfig {
            base_url: config.llm.base_url.clone(),
            api_key: config.llm.api_key.clone(),
            model: config.llm.model.clone(),
        });
        let artifacts = Arc::new(ArtifactStore::new());

        Self {
            config: config.clone(),
            sessions,
            card_store,
            llm,
            run_manager: RunManager::new(config.runs.max_concurrent_runs, artifacts.clone()),
            artifacts,
            agent_runs: Arc::new(Mutex::new(HashMap::new())),
            counters: Arc::new(Counters::default()),
            start_time: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn llm_client(&self) -> LlmClient {
        self.llm.clone()
    }

    pub async fn register_agent_run(&self, run_id: Uuid, agent_loop: Arc<AgentLoop>) {
        self.agent_runs.lock().await.insert(run_id, agent_loop);
    }

    pub async fn get_agent_run(&self, run_id: &Uuid) -> Option<Arc<AgentLoop>> {
        self.agent_runs.lock().await.get(run_id).cloned()
    }

    pub async fn active_session_count(&self) -> usize {
        self.sessions.session_count().await
    }

    pub async fn new_headless_session(&self) -> agentbrowse_browser_session::error::Result<SessionId> {
        let id = self.sessions.create(true).await?;
        self.counters.sessions_created.fetch_add(1, Ordering::Relaxed);
        Ok(id)
    }
}
