//! In-process publish/subscribe registry.
//!
//! Each subscriber owns a bounded crossbeam channel. Publishing never
//! blocks: a subscriber whose channel is full misses the message, and a
//! subscriber whose receiver was dropped is unregistered on the next
//! publish to its topic.

use std::collections::HashMap;
use std::sync::Mutex;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::warn;

use crate::error::{Result, StorageError};

#[derive(Debug)]
pub(crate) struct PubSub {
    topics: Mutex<HashMap<String, Vec<Sender<String>>>>,
    capacity: usize,
}

impl PubSub {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub(crate) fn subscribe(&self, topic: &str) -> Result<Receiver<String>> {
        let (tx, rx) = bounded(self.capacity);
        let mut topics = self
            .topics
            .lock()
            .map_err(|_| StorageError::transaction("pub/sub registry lock poisoned"))?;
        topics.entry(topic.to_string()).or_default().push(tx);
        Ok(rx)
    }

    /// Returns the number of subscribers the message was queued for.
    pub(crate) fn publish(&self, topic: &str, message: &str) -> Result<usize> {
        let mut topics = self
            .topics
            .lock()
            .map_err(|_| StorageError::transaction("pub/sub registry lock poisoned"))?;

        let Some(senders) = topics.get_mut(topic) else {
            return Ok(0);
        };

        let mut delivered = 0;
        senders.retain(|tx| match tx.try_send(message.to_string()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                warn!(topic, "Subscriber lagging; message dropped");
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });

        if senders.is_empty() {
            topics.remove(topic);
        }
        Ok(delivered)
    }
}
