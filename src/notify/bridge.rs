//! Live-socket bridge.
//!
//! The socket server itself lives outside this crate. The service only
//! needs one call, "send this JSON to everyone in group G", which is what
//! [`SocketBridge`] models.

use std::collections::HashMap;
use std::sync::Mutex;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::warn;

use crate::error::{LodgingError, Result};

/// Pushes JSON payloads to every client of a socket group.
pub trait SocketBridge: Send + Sync {
    /// Broadcasts `payload` to `group`. A group without clients is not an
    /// error.
    fn broadcast(&self, group: &str, payload: &serde_json::Value) -> Result<()>;
}

/// Queue length per client used by [`ChannelBridge::new`].
pub const DEFAULT_CLIENT_CAPACITY: usize = 1024;

/// In-process [`SocketBridge`] backed by bounded crossbeam channels.
///
/// Each [`subscribe`](Self::subscribe) call stands for one connected
/// client; dropping the receiver disconnects it. A client whose queue is
/// full misses the payload.
#[derive(Debug)]
pub struct ChannelBridge {
    groups: Mutex<HashMap<String, Vec<Sender<serde_json::Value>>>>,
    capacity: usize,
}

impl Default for ChannelBridge {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CLIENT_CAPACITY)
    }
}

impl ChannelBridge {
    /// Creates a bridge with no clients.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a bridge queueing at most `capacity` payloads per client.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            groups: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Connects a client to `group`.
    pub fn subscribe(&self, group: &str) -> Receiver<serde_json::Value> {
        let (tx, rx) = bounded(self.capacity);
        // A poisoned lock still holds a usable map
        let mut groups = self.groups.lock().unwrap_or_else(|e| e.into_inner());
        groups.entry(group.to_string()).or_default().push(tx);
        rx
    }

    /// Number of connected clients in `group`.
    pub fn client_count(&self, group: &str) -> usize {
        let groups = self.groups.lock().unwrap_or_else(|e| e.into_inner());
        groups.get(group).map_or(0, Vec::len)
    }
}

impl SocketBridge for ChannelBridge {
    fn broadcast(&self, group: &str, payload: &serde_json::Value) -> Result<()> {
        let mut groups = self
            .groups
            .lock()
            .map_err(|_| LodgingError::task("socket bridge lock poisoned"))?;
        if let Some(clients) = groups.get_mut(group) {
            clients.retain(|tx| match tx.try_send(payload.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    warn!(group, "Socket client lagging; payload dropped");
                    true
                }
                Err(TrySendError::Disconnected(_)) => false,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_broadcast_reaches_group_only() {
        let bridge = ChannelBridge::new();
        let a = bridge.subscribe("lodgings");
        let other = bridge.subscribe("elsewhere");

        bridge.broadcast("lodgings", &json!({"n": 1})).unwrap();

        assert_eq!(a.try_recv().unwrap(), json!({"n": 1}));
        assert!(other.try_recv().is_err());
    }

    #[test]
    fn test_empty_group_is_ok() {
        let bridge = ChannelBridge::new();
        assert!(bridge.broadcast("nobody", &json!({})).is_ok());
    }

    #[test]
    fn test_disconnected_clients_are_dropped() {
        let bridge = ChannelBridge::new();
        let kept = bridge.subscribe("g");
        drop(bridge.subscribe("g"));
        assert_eq!(bridge.client_count("g"), 2);

        bridge.broadcast("g", &json!(1)).unwrap();
        assert_eq!(bridge.client_count("g"), 1);
        assert_eq!(kept.try_recv().unwrap(), json!(1));
    }

    #[test]
    fn test_full_client_misses_payloads() {
        let bridge = ChannelBridge::with_capacity(1);
        let slow = bridge.subscribe("g");

        bridge.broadcast("g", &json!("first")).unwrap();
        bridge.broadcast("g", &json!("second")).unwrap();

        assert_eq!(bridge.client_count("g"), 1);
        assert_eq!(slow.try_recv().unwrap(), json!("first"));
        assert!(slow.try_recv().is_err());
    }
}
