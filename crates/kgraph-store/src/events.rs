//! Mutation events.
//!
//! Every successful write publishes a [`GraphEvent`] on a broadcast channel.
//! The analytics layer subscribes to it to keep its cache coherent without
//! the storage layer knowing analytics exists.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Capacity of the event channel. Slow subscribers that fall behind see a
/// `Lagged` error and must treat all state as stale.
const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(tag = "type", content = "data")]
pub enum GraphEvent {
    /// Triples were ingested into a graph.
    GraphSaved { tenant_id: String, graph_id: String },
    /// A relation of a graph was edited by hand.
    GraphUpdated { tenant_id: String, graph_id: String },
    /// A graph and its relations were removed.
    GraphDeleted { tenant_id: String, graph_id: String },
    /// An entity was edited; every graph of the tenant may be affected.
    EntityEdited { tenant_id: String },
    /// The registry swapped to a different backend.
    BackendSwitched,
}

impl GraphEvent {
    pub fn tenant_id(&self) -> Option<&str> {
        match self {
            Self::GraphSaved { tenant_id, .. }
            | Self::GraphUpdated { tenant_id, .. }
            | Self::GraphDeleted { tenant_id, .. }
            | Self::EntityEdited { tenant_id } => Some(tenant_id),
            Self::BackendSwitched => None,
        }
    }

    pub fn graph_id(&self) -> Option<&str> {
        match self {
            Self::GraphSaved { graph_id, .. }
            | Self::GraphUpdated { graph_id, .. }
            | Self::GraphDeleted { graph_id, .. } => Some(graph_id),
            Self::EntityEdited { .. } | Self::BackendSwitched => None,
        }
    }
}

/// Type alias for the event sender.
pub type EventSender = broadcast::Sender<GraphEvent>;

/// Type alias for the event receiver.
pub type EventReceiver = broadcast::Receiver<GraphEvent>;

/// Create a new event channel with default capacity.
pub fn create_event_channel() -> EventSender {
    let (tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
    tx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_scope_accessors() {
        let saved = GraphEvent::GraphSaved { tenant_id: "t".into(), graph_id: "g".into() };
        assert_eq!(saved.tenant_id(), Some("t"));
        assert_eq!(saved.graph_id(), Some("g"));

        let edited = GraphEvent::EntityEdited { tenant_id: "t".into() };
        assert_eq!(edited.graph_id(), None);
        assert_eq!(GraphEvent::BackendSwitched.tenant_id(), None);
    }

    #[test]
    fn events_serialise_with_type_tag() {
        let event = GraphEvent::GraphDeleted { tenant_id: "t".into(), graph_id: "g".into() };
        let json = serde_json::to_value(event).unwrap();
        assert_eq!(json["type"], "GraphDeleted");
        assert_eq!(json["data"]["graph_id"], "g");
    }

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let tx = create_event_channel();
        let mut rx = tx.subscribe();
        tx.send(GraphEvent::BackendSwitched).unwrap();
        assert_eq!(rx.recv().await.unwrap(), GraphEvent::BackendSwitched);
    }
}
