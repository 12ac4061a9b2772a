//! Process-wide cookie store (spec §3 "Cookie Store", §4.1 "Cookie
//! discipline").
//!
//! Cookies are keyed by domain, and within a domain by `(name, path)` so
//! that re-harvesting the same cookie merges rather than duplicates it.
//! The store caps the number of domains it tracks and evicts the oldest
//! on overflow (FIFO), and can persist to a JSON file with a debounced
//! write so a burst of navigations doesn't hammer the filesystem.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// A single cookie record, shaped close to what `Network.getAllCookies`
/// returns over CDP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
    /// Unix seconds; `None` means a session cookie.
    #[serde(default)]
    pub expires: Option<f64>,
}

fn default_path() -> String {
    "/".to_string()
}

impl Cookie {
    fn key(&self) -> (String, String) {
        (self.name.clone(), self.path.clone())
    }
}

const DEFAULT_MAX_DOMAINS: usize = 200;
const DEBOUNCE: Duration = Duration::from_secs(5);

struct DomainEntry {
    cookies: HashMap<(String, String), Cookie>,
    inserted_at: Instant,
}

struct Inner {
    domains: HashMap<String, DomainEntry>,
    insertion_order: Vec<String>,
    max_domains: usize,
    persist_path: Option<PathBuf>,
    last_write: Option<Instant>,
    dirty: bool,
}

/// Shared, lock-protected cookie store. One instance per process (spec
/// §3: "a process-wide mapping from domain -> set of cookies").
#[derive(Clone)]
pub struct CookieStore {
    inner: Arc<Mutex<Inner>>,
}

impl CookieStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_DOMAINS)
    }

    pub fn with_capacity(max_domains: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                domains: HashMap::new(),
                insertion_order: Vec::new(),
                max_domains,
                persist_path: None,
                last_write: None,
                dirty: false,
            })),
        }
    }

    pub fn with_persistence(max_domains: usize, path: PathBuf) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                domains: HashMap::new(),
                insertion_order: Vec::new(),
                max_domains,
                persist_path: Some(path),
                last_write: None,
                dirty: false,
            })),
        }
    }

    /// Merges a batch of freshly-harvested cookies into the store,
    /// keyed by `(name, path)` within each cookie's domain so the most
    /// recent save for a given key wins (spec §8 round-trip property).
    pub async fn merge(&self, cookies: Vec<Cookie>) {
        let mut inner = self.inner.lock().await;
        for cookie in cookies {
            let domain = cookie.domain.clone();
            if !inner.domains.contains_key(&domain) {
                inner.evict_if_needed();
                inner.insertion_order.push(domain.clone());
                inner.domains.insert(
                    domain.clone(),
                    DomainEntry {
                        cookies: HashMap::new(),
                        inserted_at: Instant::now(),
                    },
                );
            }
            let entry = inner.domains.get_mut(&domain).unwrap();
            entry.cookies.insert(cookie.key(), cookie);
        }
        inner.dirty = true;
        drop(inner);
        self.maybe_flush().await;
    }

    /// Returns every cookie whose domain matches `url`'s hostname,
    /// following exact-domain, parent-domain, and leading-dot rules
    /// (spec §3 "Cookie Store").
    pub async fn get_for_url(&self, url: &str) -> Vec<Cookie> {
        let host = match extract_host(url) {
            Some(h) => h,
            None => return Vec::new(),
        };
        let inner = self.inner.lock().await;
        let mut out = Vec::new();
        for (domain, entry) in inner.domains.iter() {
            if domain_matches(domain, &host) {
                out.extend(entry.cookies.values().cloned());
            }
        }
        out
    }

    /// All stored cookies across every domain — used before navigation
    /// to inject the full cookie jar so cross-domain SSO redirects keep
    /// state (spec §4.1 "Cookie discipline").
    pub async fn all(&self) -> Vec<Cookie> {
        let inner = self.inner.lock().await;
        inner
            .domains
            .values()
            .flat_map(|e| e.cookies.values().cloned())
            .collect()
    }

    pub async fn domain_count(&self) -> usize {
        self.inner.lock().await.domains.len()
    }

    /// Flushes to the persistence path if one is configured and at
    /// least `DEBOUNCE` has elapsed since the last write. Write failures
    /// are swallowed (spec §4.1 "Failure semantics").
    async fn maybe_flush(&self) {
        let mut inner = self.inner.lock().await;
        let Some(path) = inner.persist_path.clone() else {
            return;
        };
        if !inner.dirty {
            return;
        }
        if let Some(last) = inner.last_write {
            if last.elapsed() < DEBOUNCE {
                return;
            }
        }
        let snapshot: HashMap<String, Vec<Cookie>> = inner
            .domains
            .iter()
            .map(|(domain, entry)| (domain.clone(), entry.cookies.values().cloned().collect()))
            .collect();
        inner.last_write = Some(Instant::now());
        inner.dirty = false;
        drop(inner);

        if let Ok(json) = serde_json::to_vec_pretty(&snapshot) {
            let _ = tokio::fs::write(&path, json).await;
        }
    }

    /// Forces a flush regardless of debounce, used on graceful shutdown.
    pub async fn flush_now(&self) {
        let mut inner = self.inner.lock().await;
        inner.last_write = None;
        inner.dirty = true;
        drop(inner);
        self.maybe_flush().await;
    }

    pub async fn load_from_file(&self, path: &std::path::Path) -> std::io::Result<()> {
        let bytes = tokio::fs::read(path).await?;
        let snapshot: HashMap<String, Vec<Cookie>> =
            serde_json::from_slice(&bytes).unwrap_or_default();
        let mut inner = self.inner.lock().await;
        for (domain, cookies) in snapshot {
            let mut map = HashMap::new();
            for c in cookies {
                map.insert(c.key(), c);
            }
            inner.insertion_order.push(domain.clone());
            inner.domains.insert(
                domain,
                DomainEntry {
                    cookies: map,
                    inserted_at: Instant::now(),
                },
            );
        }
        Ok(())
    }
}

impl Default for CookieStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Inner {
    fn evict_if_needed(&mut self) {
        while self.domains.len() >= self.max_domains && !self.insertion_order.is_empty() {
            let oldest = self.insertion_order.remove(0);
            self.domains.remove(&oldest);
        }
    }
}

/// Extracts the hostname portion of a URL without pulling in a full URL
/// parser dependency — good enough for the `scheme://host[:port]/...`
/// shapes the browser driver ever passes in.
fn extract_host(url: &str) -> Option<String> {
    let without_scheme = url.split("://").nth(1).unwrap_or(url);
    let host_and_rest = without_scheme.split('/').next().unwrap_or(without_scheme);
    let host = host_and_rest.split(':').next().unwrap_or(host_and_rest);
    if host.is_empty() {
        None
    } else {
        Some(host.to_lowercase())
    }
}

/// Exact-domain and parent-domain matching, including leading-dot
/// cookies (`.example.com` matches `www.example.com`).
fn domain_matches(cookie_domain: &str, host: &str) -> bool {
    let cd = cookie_domain.trim_start_matches('.').to_lowercase();
    let host = host.to_lowercase();
    if cd == host {
        return true;
    }
    // Leading-dot / parent-domain: host's suffix after a dot equals cd.
    host.ends_with(&format!(".{cd}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cookie(name: &str, domain: &str, value: &str) -> Cookie {
        Cookie {
            name: name.to_string(),
            value: value.to_string(),
            domain: domain.to_string(),
            path: "/".to_string(),
            secure: false,
            http_only: false,
            expires: None,
        }
    }

    #[tokio::test]
    async fn merge_then_get_for_url_matches_exact_domain() {
        let store = CookieStore::new();
        store
            .merge(vec![cookie("session", "example.com", "abc")])
            .await;
        let found = store.get_for_url("https://example.com/path").await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].value, "abc");
    }

    #[tokio::test]
    async fn leading_dot_cookie_matches_subdomain() {
        let store = CookieStore::new();
        store
            .merge(vec![cookie("sso", ".example.com", "v1")])
            .await;
        let found = store.get_for_url("https://accounts.example.com/login").await;
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn most_recent_save_for_same_key_wins() {
        let store = CookieStore::new();
        store
            .merge(vec![cookie("session", "example.com", "first")])
            .await;
        store
            .merge(vec![cookie("session", "example.com", "second")])
            .await;
        let found = store.get_for_url("https://example.com").await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].value, "second");
    }

    #[tokio::test]
    async fn fifo_eviction_at_capacity() {
        let store = CookieStore::with_capacity(2);
        store.merge(vec![cookie("a", "one.com", "1")]).await;
        store.merge(vec![cookie("a", "two.com", "1")]).await;
        store.merge(vec![cookie("a", "three.com", "1")]).await;
        assert_eq!(store.domain_count().await, 2);
        assert!(store.get_for_url("https://one.com").await.is_empty());
    }

    #[tokio::test]
    async fn unrelated_domain_is_not_matched() {
        let store = CookieStore::new();
        store.merge(vec![cookie("a", "example.com", "1")]).await;
        assert!(store.get_for_url("https://evil-example.com").await.is_empty());
    }
}
