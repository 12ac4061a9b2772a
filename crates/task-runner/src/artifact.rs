//! Artifact store (spec §4.3, §6): in-memory only, TTL-expiring, with
//! chunk-readable access so large JSON results don't have to be shipped in
//! one frame over SSE/HTTP.

use agentbrowse_types::ArtifactId;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{Result, RunnerError};

pub const ARTIFACT_TTL_HOURS: i64 = 24;

/// Per-chunk cap (spec §3 Artifact): a single `get` call never returns
/// more than this many bytes, regardless of the requested `limit`.
pub const MAX_CHUNK_BYTES: usize = 256 * 1024;

struct Entry {
    bytes: Vec<u8>,
    expires_at: DateTime<Utc>,
}

/// In-memory artifact store. Entries are pruned lazily on `sweep` /
/// `get`, mirroring the session/cookie store's own sweep-on-access style
/// rather than running a background task per artifact.
#[derive(Default)]
pub struct ArtifactStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl ArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serializes `value` to JSON and stores it, returning a fresh id.
    pub fn put(&self, value: &serde_json::Value) -> ArtifactId {
        let id = ArtifactId::new();
        let bytes = serde_json::to_vec(value).unwrap_or_default();
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            id.to_string(),
            Entry {
                bytes,
                expires_at: Utc::now() + Duration::hours(ARTIFACT_TTL_HOURS),
            },
        );
        id
    }

    /// Reads up to `limit` bytes starting at `offset`, clamped to
    /// [`MAX_CHUNK_BYTES`] per call. Round-tripping the full range across
    /// repeated calls reconstructs the payload byte-for-byte (spec §8).
    pub fn get(&self, id: &ArtifactId, offset: usize, limit: usize) -> Result<Vec<u8>> {
        let mut entries = self.entries.lock().unwrap();
        let key = id.to_string();
        let entry = entries.get(&key).ok_or_else(|| RunnerError::ArtifactNotFound(key.clone()))?;
        if entry.expires_at <= Utc::now() {
            entries.remove(&key);
            return Err(RunnerError::ArtifactNotFound(key));
        }
        let limit = limit.min(MAX_CHUNK_BYTES);
        let end = (offset + limit).min(entry.bytes.len());
        if offset >= entry.bytes.len() {
            return Ok(Vec::new());
        }
        Ok(entry.bytes[offset..end].to_vec())
    }

    pub fn len(&self, id: &ArtifactId) -> Result<usize> {
        let entries = self.entries.lock().unwrap();
        let key = id.to_string();
        entries
            .get(&key)
            .map(|e| e.bytes.len())
            .ok_or_else(|| RunnerError::ArtifactNotFound(key))
    }

    /// Removes every expired entry. Safe to call on a timer or on demand.
    pub fn sweep(&self) {
        let now = Utc::now();
        let mut entries = self.entries.lock().unwrap();
        entries.retain(|_, entry| entry.expires_at > now);
    }
}
