//! Event bus for a single run (spec §5, §6): every `AgentEvent` emitted
//! during a run is buffered, and a late subscriber receives the full
//! buffered replay atomically before any live event — "replay → attach"
//! under one lock, no interleaving.

use agentbrowse_types::events::AgentEvent;
use std::sync::Mutex;
use tokio::sync::broadcast;

const REPLAY_BUFFER_CAPACITY: usize = 256;

pub struct EventBus {
    buffer: Mutex<Vec<AgentEvent>>,
    sender: broadcast::Sender<AgentEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _rx) = broadcast::channel(REPLAY_BUFFER_CAPACITY);
        Self {
            buffer: Mutex::new(Vec::new()),
            sender,
        }
    }

    pub fn publish(&self, event: AgentEvent) {
        let buffer = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
        // Hold the buffer lock across both the push and the broadcast send so
        // `subscribe` can never observe a send that happened between its
        // snapshot and its `sender.subscribe()` call.
        let mut buffer = buffer;
        buffer.push(event.clone());
        let _ = self.sender.send(event);
    }

    /// Buffered events so far, plus a receiver for everything published
    /// from this point on.
    pub fn subscribe(&self) -> (Vec<AgentEvent>, broadcast::Receiver<AgentEvent>) {
        let buffer = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
        let snapshot = buffer.clone();
        let receiver = self.sender.subscribe();
        (snapshot, receiver)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn late_subscriber_gets_buffered_events_before_live_ones() {
        let bus = EventBus::new();
        bus.publish(AgentEvent::SessionCreated {
            session_id: "s1".to_string(),
        });
        bus.publish(AgentEvent::Thinking { iteration: 1 });

        let (buffered, mut rx) = bus.subscribe();
        assert_eq!(buffered.len(), 2);

        bus.publish(AgentEvent::Thinking { iteration: 2 });
        let live = rx.try_recv().unwrap();
        assert!(matches!(live, AgentEvent::Thinking { iteration: 2 }));
    }

    #[test]
    fn subscribe_before_any_publish_yields_empty_buffer() {
        let bus = EventBus::new();
        let (buffered, _rx) = bus.subscribe();
        assert!(buffered.is_empty());
    }
}
