//! Per-tab ring buffers for network, console, dialog, popup, and download
//! events (spec §3 "Event Tracker", §6 `get_network_logs`/`get_console_logs`),
//! plus the page-stability predicate the `wait_for_stable` tool relies on.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

const NETWORK_CAPACITY: usize = 200;
const CONSOLE_CAPACITY: usize = 100;
const DIALOG_CAPACITY: usize = 20;
const POPUP_CAPACITY: usize = 10;
const DOWNLOAD_CAPACITY: usize = 50;

/// A ring buffer that drops its oldest entry once full, so a long-running
/// tab never grows its event history unbounded (spec §5 "Resource model").
struct RingBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> RingBuffer<T> {
    fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn push(&mut self, item: T) {
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkEvent {
    pub method: String,
    pub url: String,
    pub status: Option<u16>,
    pub resource_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleEvent {
    pub level: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogEvent {
    pub kind: String,
    pub message: String,
    pub default_value: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopupEvent {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadEvent {
    pub url: String,
    pub suggested_filename: String,
    pub state: String,
}

/// The page's load lifecycle as CDP reports it, used by the stability
/// predicate below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadState {
    Loading,
    DomContentLoaded,
    Loaded,
}

/// Tracks everything observed on one tab since it was opened (or since
/// the last navigation that the session layer chooses to reset it on).
pub struct EventTracker {
    network: RingBuffer<NetworkEvent>,
    console: RingBuffer<ConsoleEvent>,
    dialogs: RingBuffer<DialogEvent>,
    popups: RingBuffer<PopupEvent>,
    downloads: RingBuffer<DownloadEvent>,
    load_state: LoadState,
    last_dom_mutation: Instant,
    last_network_activity: Instant,
    pending_dialog: Option<DialogEvent>,
}

impl EventTracker {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            network: RingBuffer::new(NETWORK_CAPACITY),
            console: RingBuffer::new(CONSOLE_CAPACITY),
            dialogs: RingBuffer::new(DIALOG_CAPACITY),
            popups: RingBuffer::new(POPUP_CAPACITY),
            downloads: RingBuffer::new(DOWNLOAD_CAPACITY),
            load_state: LoadState::Loading,
            last_dom_mutation: now,
            last_network_activity: now,
            pending_dialog: None,
        }
    }

    pub fn record_network(&mut self, event: NetworkEvent) {
        self.last_network_activity = Instant::now();
        self.network.push(event);
    }

    pub fn record_console(&mut self, event: ConsoleEvent) {
        self.console.push(event);
    }

    pub fn record_dialog(&mut self, event: DialogEvent) {
        self.pending_dialog = Some(event.clone());
        self.dialogs.push(event);
    }

    pub fn clear_pending_dialog(&mut self) {
        self.pending_dialog = None;
    }

    pub fn pending_dialog(&self) -> Option<&DialogEvent> {
        self.pending_dialog.as_ref()
    }

    pub fn record_popup(&mut self, event: PopupEvent) {
        self.popups.push(event);
    }

    pub fn record_download(&mut self, event: DownloadEvent) {
        self.downloads.push(event);
    }

    pub fn record_dom_mutation(&mut self) {
        self.last_dom_mutation = Instant::now();
    }

    pub fn set_load_state(&mut self, state: LoadState) {
        self.load_state = state;
        if state == LoadState::Loaded {
            self.last_dom_mutation = Instant::now();
        }
    }

    pub fn load_state(&self) -> LoadState {
        self.load_state
    }

    pub fn network_logs(&self) -> Vec<NetworkEvent> {
        self.network.iter().cloned().collect()
    }

    pub fn console_logs(&self) -> Vec<ConsoleEvent> {
        self.console.iter().cloned().collect()
    }

    pub fn dialogs(&self) -> Vec<DialogEvent> {
        self.dialogs.iter().cloned().collect()
    }

    pub fn popups(&self) -> Vec<PopupEvent> {
        self.popups.iter().cloned().collect()
    }

    pub fn downloads(&self) -> Vec<DownloadEvent> {
        self.downloads.iter().cloned().collect()
    }

    pub fn network_count(&self) -> usize {
        self.network.len()
    }

    /// `wait_for_stable` is satisfied once the page has reached `Loaded`
    /// and at least `quiet_for` has passed with no DOM mutation and no
    /// new network activity (spec §6 `wait_for_stable`).
    pub fn is_stable(&self, quiet_for: Duration) -> bool {
        self.load_state == LoadState::Loaded
            && self.last_dom_mutation.elapsed() >= quiet_for
            && self.last_network_activity.elapsed() >= quiet_for
    }
}

impl Default for EventTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_buffer_drops_oldest_at_capacity() {
        let mut tracker = EventTracker::new();
        for i in 0..(NETWORK_CAPACITY + 10) {
            tracker.record_network(NetworkEvent {
                method: "GET".to_string(),
                url: format!("https://example.com/{i}"),
                status: Some(200),
                resource_type: "document".to_string(),
            });
        }
        assert_eq!(tracker.network_count(), NETWORK_CAPACITY);
        let first = tracker.network_logs().into_iter().next().unwrap();
        assert_eq!(first.url, "https://example.com/10");
    }

    #[test]
    fn not_stable_before_loaded() {
        let tracker = EventTracker::new();
        assert!(!tracker.is_stable(Duration::from_millis(0)));
    }

    #[test]
    fn stable_once_loaded_and_quiet() {
        let mut tracker = EventTracker::new();
        tracker.set_load_state(LoadState::Loaded);
        assert!(tracker.is_stable(Duration::from_millis(0)));
    }

    #[test]
    fn dom_mutation_resets_stability_window() {
        let mut tracker = EventTracker::new();
        tracker.set_load_state(LoadState::Loaded);
        tracker.record_dom_mutation();
        assert!(!tracker.is_stable(Duration::from_secs(60)));
    }

    #[test]
    fn dialog_becomes_pending_until_cleared() {
        let mut tracker = EventTracker::new();
        assert!(tracker.pending_dialog().is_none());
        tracker.record_dialog(DialogEvent {
            kind: "alert".to_string(),
            message: "hi".to_string(),
            default_value: None,
        });
        assert!(tracker.pending_dialog().is_some());
        tracker.clear_pending_dialog();
        assert!(tracker.pending_dialog().is_none());
    }
}
