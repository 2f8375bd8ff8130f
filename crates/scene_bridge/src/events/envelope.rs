//! Engine-to-host event envelopes

use crate::foundation::ids::{CallbackId, NodeId, SceneId};
use crate::foundation::time::timestamp_millis;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Route an envelope takes to its handler
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "channel", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum EventChannel {
    /// Generic result channel, resolved by callback id
    Callback {
        /// Target callback
        callback_id: CallbackId,
    },
    /// Node-scoped event, resolved by (node, event name)
    NodeEvent {
        /// Source node
        node_id: NodeId,
        /// Event name, e.g. `onClick`
        event_name: String,
    },
    /// Scene-scoped event, resolved by (scene, event name)
    SceneEvent {
        /// Source scene
        scene_id: SceneId,
        /// Event name, e.g. `onTrackingUpdated`
        event_name: String,
    },
}

impl fmt::Display for EventChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Callback { callback_id } => write!(f, "callback {callback_id}"),
            Self::NodeEvent { node_id, event_name } => write!(f, "node {node_id}/{event_name}"),
            Self::SceneEvent { scene_id, event_name } => write!(f, "scene {scene_id}/{event_name}"),
        }
    }
}

/// One event produced by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Routing information
    #[serde(flatten)]
    pub channel: EventChannel,
    /// Event data
    #[serde(default)]
    pub payload: Value,
    /// Milliseconds since the Unix epoch when the engine emitted it
    #[serde(default)]
    pub timestamp: u64,
}

impl EventEnvelope {
    /// Envelope stamped with the current time
    pub fn new(channel: EventChannel, payload: Value) -> Self {
        Self {
            channel,
            payload,
            timestamp: timestamp_millis(),
        }
    }

    /// Result for a pending callback
    pub fn callback(callback_id: CallbackId, payload: Value) -> Self {
        Self::new(EventChannel::Callback { callback_id }, payload)
    }

    /// Node-scoped event
    pub fn node_event(node_id: NodeId, event_name: impl Into<String>, payload: Value) -> Self {
        Self::new(
            EventChannel::NodeEvent {
                node_id,
                event_name: event_name.into(),
            },
            payload,
        )
    }

    /// Scene-scoped event
    pub fn scene_event(scene_id: SceneId, event_name: impl Into<String>, payload: Value) -> Self {
        Self::new(
            EventChannel::SceneEvent {
                scene_id,
                event_name: event_name.into(),
            },
            payload,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_json_shape() {
        let mut envelope = EventEnvelope::node_event(NodeId::from("node_1"), "onClick", json!({"x": 1}));
        envelope.timestamp = 42;

        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({
                "channel": "nodeEvent",
                "nodeId": "node_1",
                "eventName": "onClick",
                "payload": {"x": 1},
                "timestamp": 42
            })
        );
    }

    #[test]
    fn test_decode_callback_without_timestamp() {
        let envelope: EventEnvelope = serde_json::from_value(json!({
            "channel": "callback",
            "callbackId": "callback_3",
            "payload": [1, 2, 3]
        }))
        .unwrap();

        assert_eq!(
            envelope.channel,
            EventChannel::Callback { callback_id: CallbackId::from("callback_3") }
        );
        assert_eq!(envelope.timestamp, 0);
    }

    #[test]
    fn test_new_envelopes_are_stamped() {
        let envelope = EventEnvelope::callback(CallbackId::from("c"), Value::Null);
        assert!(envelope.timestamp > 0);
    }
}
