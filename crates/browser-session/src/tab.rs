//! A single browser tab: one CDP `Page` plus the `EventTracker` watching
//! it (spec §3 "Tab").

use crate::event_tracker::EventTracker;
use agentbrowse_types::TabId;
use chromiumoxide::page::Page;
use std::time::Instant;

pub struct Tab {
    pub id: TabId,
    pub page: Page,
    pub tracker: EventTracker,
    last_known_url: String,
    opened_at: Instant,
}

impl Tab {
    pub fn new(page: Page) -> Self {
        Self {
            id: TabId::new(),
            page,
            tracker: EventTracker::new(),
            last_known_url: String::new(),
            opened_at: Instant::now(),
        }
    }

    pub fn set_last_known_url(&mut self, url: String) {
        self.last_known_url = url;
    }

    pub fn last_known_url(&self) -> &str {
        &self.last_known_url
    }

    pub fn age(&self) -> std::time::Duration {
        self.opened_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tabs_get_distinct_ids() {
        // Construction requires a live Page in practice; this test only
        // exercises the id-generation path via TabId directly since a
        // real Page needs a running browser.
        let a = TabId::new();
        let b = TabId::new();
        assert_ne!(a, b);
    }
}
