//! The three standard notification sinks.

use std::sync::Arc;

use tracing::debug;

use super::{Event, NotificationSink, SocketBridge};
use crate::error::Result;
use crate::storage::ListingStore;

/// Appends events to a bounded store stream.
pub struct EventLogSink {
    store: Arc<dyn ListingStore>,
    stream_key: String,
    max_len: usize,
}

impl EventLogSink {
    /// Creates a sink writing to `stream_key`, keeping the newest `max_len`
    /// entries.
    pub fn new(store: Arc<dyn ListingStore>, stream_key: String, max_len: usize) -> Self {
        Self {
            store,
            stream_key,
            max_len,
        }
    }
}

impl NotificationSink for EventLogSink {
    fn name(&self) -> &'static str {
        "event_log"
    }

    fn deliver(&self, event: &Event) -> Result<()> {
        let id = self
            .store
            .stream_append(&self.stream_key, &event.to_stream_fields())?;
        self.store.stream_trim(&self.stream_key, self.max_len)?;
        debug!(entry = %id, "Event logged");
        Ok(())
    }
}

/// Publishes events as JSON on a pub/sub channel.
pub struct PubSubSink {
    store: Arc<dyn ListingStore>,
    channel: String,
}

impl PubSubSink {
    /// Creates a sink publishing on `channel`.
    pub fn new(store: Arc<dyn ListingStore>, channel: String) -> Self {
        Self { store, channel }
    }
}

impl NotificationSink for PubSubSink {
    fn name(&self) -> &'static str {
        "pubsub"
    }

    fn deliver(&self, event: &Event) -> Result<()> {
        let payload = serde_json::to_string(event)?;
        let receivers = self.store.publish(&self.channel, &payload)?;
        debug!(channel = %self.channel, receivers, "Event published");
        Ok(())
    }
}

/// Pushes events to live-socket clients through a [`SocketBridge`].
pub struct SocketSink {
    bridge: Arc<dyn SocketBridge>,
    group: String,
}

impl SocketSink {
    /// Creates a sink broadcasting to `group`.
    pub fn new(bridge: Arc<dyn SocketBridge>, group: String) -> Self {
        Self { bridge, group }
    }
}

impl NotificationSink for SocketSink {
    fn name(&self) -> &'static str {
        "socket"
    }

    fn deliver(&self, event: &Event) -> Result<()> {
        self.bridge.broadcast(&self.group, &event.to_json()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::notify::{ChannelBridge, EventAction, ListingSnapshot};
    use crate::storage::RedbStore;
    use tempfile::tempdir;

    fn open_store() -> (Arc<RedbStore>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = Arc::new(RedbStore::open(dir.path().join("test.db"), &Config::default()).unwrap());
        (store, dir)
    }

    fn event(id: &str) -> Event {
        Event::new(EventAction::Created, ListingSnapshot::id_only(id))
    }

    #[test]
    fn test_event_log_sink_trims() {
        let (store, _dir) = open_store();
        let sink = EventLogSink::new(store.clone(), "log".into(), 3);
        for i in 0..5 {
            sink.deliver(&event(&i.to_string())).unwrap();
        }

        assert_eq!(store.stream_len("log").unwrap(), 3);
        let newest = store.stream_recent("log", 1).unwrap();
        assert_eq!(newest[0].field("action"), Some("created"));
        assert_eq!(newest[0].field("id"), Some("4"));
    }

    #[test]
    fn test_pubsub_sink_publishes_json() {
        let (store, _dir) = open_store();
        let rx = store.subscribe("chan").unwrap();
        PubSubSink::new(store.clone(), "chan".into())
            .deliver(&event("9"))
            .unwrap();

        let message: serde_json::Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(message["action"], "created");
        assert_eq!(message["lodging"]["id"], "9");
    }

    #[test]
    fn test_socket_sink_broadcasts_to_group() {
        let bridge = Arc::new(ChannelBridge::new());
        let rx = bridge.subscribe("room");
        SocketSink::new(bridge.clone(), "room".into())
            .deliver(&event("3"))
            .unwrap();

        let payload = rx.try_recv().unwrap();
        assert_eq!(payload["lodging"]["id"], "3");
    }
}
