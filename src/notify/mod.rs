//! Change-event fan-out.
//!
//! Every committed mutation produces one [`Event`], delivered in order to
//! each configured [`NotificationSink`]:
//!
//! ```text
//! FanOut::broadcast(action, snapshot)
//!     ├── EventLogSink   → append to the bounded event log, trim to N
//!     ├── PubSubSink     → publish JSON on the change channel
//!     └── SocketSink     → SocketBridge::broadcast(group, JSON)
//! ```
//!
//! Sinks are independent: a failing sink is logged and listed in the
//! [`FanOutReport`], later sinks still run, and the mutation that produced
//! the event stays committed.
//!
//! # Event schema
//!
//! ```json
//! { "action": "created", "lodging": { "id": "42", "title": "Loft", "price": 120.0 } }
//! ```

mod bridge;
mod sinks;

pub use bridge::{ChannelBridge, SocketBridge};
pub use sinks::{EventLogSink, PubSubSink, SocketSink};

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::Result;
use crate::listing::{fields, Listing};
use crate::storage::ListingStore;

/// Kind of change an event reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventAction {
    /// A listing was created.
    Created,
    /// A listing was updated.
    Updated,
    /// A listing was deleted.
    Deleted,
}

impl EventAction {
    /// Wire name of the action.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
        }
    }
}

impl fmt::Display for EventAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Listing fields carried by an event. Only `id` is guaranteed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ListingSnapshot {
    /// Listing identifier.
    pub id: String,
    /// Title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Price.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    /// Image URL.
    #[serde(
        rename = "imageUrl",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub image_url: Option<String>,
}

impl ListingSnapshot {
    /// A snapshot carrying only the id.
    pub fn id_only(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            description: None,
            price: None,
            image_url: None,
        }
    }

    /// Present fields as flat `(name, value)` strings, `id` first.
    pub fn string_fields(&self) -> Vec<(String, String)> {
        let mut out = vec![(fields::ID.to_string(), self.id.clone())];
        if let Some(title) = &self.title {
            out.push((fields::TITLE.to_string(), title.clone()));
        }
        if let Some(description) = &self.description {
            out.push((fields::DESCRIPTION.to_string(), description.clone()));
        }
        if let Some(price) = self.price {
            out.push((fields::PRICE.to_string(), price.to_string()));
        }
        if let Some(url) = &self.image_url {
            out.push((fields::IMAGE_URL.to_string(), url.clone()));
        }
        out
    }
}

impl From<&Listing> for ListingSnapshot {
    fn from(listing: &Listing) -> Self {
        Self {
            id: listing.id.to_string(),
            title: Some(listing.title.clone()),
            description: Some(listing.description.clone()),
            price: Some(listing.price),
            image_url: Some(listing.image_url.clone()),
        }
    }
}

/// One change notification.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// What happened.
    pub action: EventAction,
    /// The listing it happened to.
    pub lodging: ListingSnapshot,
}

impl Event {
    /// Creates an event.
    pub fn new(action: EventAction, lodging: ListingSnapshot) -> Self {
        Self { action, lodging }
    }

    /// Flattened record for the event log: `action`, then the snapshot's
    /// present fields.
    pub fn to_stream_fields(&self) -> Vec<(String, String)> {
        let mut out = vec![("action".to_string(), self.action.to_string())];
        out.extend(self.lodging.string_fields());
        out
    }

    /// JSON form sent to subscribers and sockets.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// A destination for change events.
pub trait NotificationSink: Send + Sync {
    /// Short name used in logs and reports.
    fn name(&self) -> &'static str;

    /// Delivers one event.
    fn deliver(&self, event: &Event) -> Result<()>;
}

/// A sink that failed to deliver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SinkFailure {
    /// Sink name.
    pub sink: &'static str,
    /// Rendered error.
    pub error: String,
}

/// Outcome of one fan-out.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FanOutReport {
    /// Sinks that accepted the event, in delivery order.
    pub delivered: Vec<&'static str>,
    /// Sinks that failed, in delivery order.
    pub failed: Vec<SinkFailure>,
}

impl FanOutReport {
    /// Returns true if every sink accepted the event.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Ordered list of independent sinks.
pub struct FanOut {
    sinks: Vec<Box<dyn NotificationSink>>,
}

impl FanOut {
    /// Creates a fan-out over `sinks`, delivered in the given order.
    pub fn new(sinks: Vec<Box<dyn NotificationSink>>) -> Self {
        Self { sinks }
    }

    /// The standard sink order: event log, pub/sub, live sockets.
    pub fn standard(
        store: Arc<dyn ListingStore>,
        bridge: Arc<dyn SocketBridge>,
        config: &Config,
    ) -> Self {
        Self::new(vec![
            Box::new(EventLogSink::new(
                store.clone(),
                config.stream_key.clone(),
                config.stream_max_len,
            )),
            Box::new(PubSubSink::new(store, config.channel.clone())),
            Box::new(SocketSink::new(bridge, config.channel.clone())),
        ])
    }

    /// Builds the event and delivers it to every sink.
    pub fn broadcast(&self, action: EventAction, lodging: ListingSnapshot) -> FanOutReport {
        self.dispatch(&Event::new(action, lodging))
    }

    /// Delivers `event` to every sink, collecting failures.
    pub fn dispatch(&self, event: &Event) -> FanOutReport {
        let mut report = FanOutReport::default();
        for sink in &self.sinks {
            match sink.deliver(event) {
                Ok(()) => report.delivered.push(sink.name()),
                Err(err) => {
                    warn!(
                        sink = sink.name(),
                        action = %event.action,
                        id = %event.lodging.id,
                        error = %err,
                        "Notification sink failed"
                    );
                    report.failed.push(SinkFailure {
                        sink: sink.name(),
                        error: err.to_string(),
                    });
                }
            }
        }
        debug!(
            action = %event.action,
            delivered = report.delivered.len(),
            failed = report.failed.len(),
            "Event fanned out"
        );
        report
    }

    /// Number of sinks.
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Returns true if there are no sinks.
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl fmt::Debug for FanOut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.sinks.iter().map(|s| s.name()).collect();
        f.debug_struct("FanOut").field("sinks", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LodgingError;
    use std::sync::Mutex;

    struct Recording {
        name: &'static str,
        seen: Arc<Mutex<Vec<&'static str>>>,
        fail: bool,
    }

    impl NotificationSink for Recording {
        fn name(&self) -> &'static str {
            self.name
        }

        fn deliver(&self, _event: &Event) -> Result<()> {
            self.seen.lock().unwrap().push(self.name);
            if self.fail {
                return Err(LodgingError::task("sink offline"));
            }
            Ok(())
        }
    }

    fn snapshot() -> ListingSnapshot {
        ListingSnapshot {
            id: "42".into(),
            title: Some("Loft".into()),
            description: None,
            price: Some(120.5),
            image_url: Some("http://img".into()),
        }
    }

    #[test]
    fn test_event_json_shape() {
        let event = Event::new(EventAction::Created, snapshot());
        let json = event.to_json().unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "action": "created",
                "lodging": {"id": "42", "title": "Loft", "price": 120.5, "imageUrl": "http://img"}
            })
        );
    }

    #[test]
    fn test_stream_fields_flatten_present_values() {
        let event = Event::new(EventAction::Deleted, snapshot());
        let fields = event.to_stream_fields();
        assert_eq!(fields[0], ("action".to_string(), "deleted".to_string()));
        assert_eq!(fields[1], ("id".to_string(), "42".to_string()));
        assert!(fields.iter().any(|(k, v)| k == "price" && v == "120.5"));
        assert!(!fields.iter().any(|(k, _)| k == "description"));
    }

    #[test]
    fn test_snapshot_from_listing() {
        let listing = Listing {
            id: "7".into(),
            title: "Cabin".into(),
            description: "Woods".into(),
            price: 80.0,
            image_url: "http://x".into(),
        };
        let snap = ListingSnapshot::from(&listing);
        assert_eq!(snap.id, "7");
        assert_eq!(snap.description.as_deref(), Some("Woods"));
    }

    #[test]
    fn test_failing_sink_does_not_stop_later_sinks() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = |name, fail| -> Box<dyn NotificationSink> {
            Box::new(Recording {
                name,
                seen: seen.clone(),
                fail,
            })
        };
        let fan_out = FanOut::new(vec![sink("a", false), sink("b", true), sink("c", false)]);

        let report = fan_out.broadcast(EventAction::Updated, snapshot());

        assert_eq!(*seen.lock().unwrap(), vec!["a", "b", "c"]);
        assert_eq!(report.delivered, vec!["a", "c"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].sink, "b");
        assert!(!report.is_complete());
    }

    #[test]
    fn test_action_names() {
        assert_eq!(EventAction::Created.to_string(), "created");
        assert_eq!(
            serde_json::to_value(EventAction::Updated).unwrap(),
            serde_json::json!("updated")
        );
    }
}
