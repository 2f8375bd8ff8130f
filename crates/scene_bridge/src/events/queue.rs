//! Engine-to-host hand-off
//!
//! The engine may emit from any thread. Envelopes wait in an mpsc channel
//! until the host drains them with `pump_events`.

use super::envelope::EventEnvelope;
use crate::engine::EngineError;
use crate::foundation::ids::{CallbackId, NodeId, SceneId};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::mpsc;

/// Create a connected sender/queue pair
pub fn event_channel() -> (EventSender, EventQueue) {
    let (tx, rx) = mpsc::channel();
    (EventSender { tx }, EventQueue { rx: Mutex::new(rx) })
}

/// Engine-side producer handle
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<EventEnvelope>,
}

impl EventSender {
    /// Enqueue an envelope
    pub fn emit(&self, envelope: EventEnvelope) -> Result<(), EngineError> {
        self.tx.send(envelope).map_err(|_| EngineError::Disconnected)
    }

    /// Answer a pending callback
    pub fn emit_callback(&self, callback_id: CallbackId, payload: Value) -> Result<(), EngineError> {
        self.emit(EventEnvelope::callback(callback_id, payload))
    }

    /// Emit a node-scoped event
    pub fn emit_node_event(&self, node_id: NodeId, event_name: &str, payload: Value) -> Result<(), EngineError> {
        self.emit(EventEnvelope::node_event(node_id, event_name, payload))
    }

    /// Emit a scene-scoped event
    pub fn emit_scene_event(&self, scene_id: SceneId, event_name: &str, payload: Value) -> Result<(), EngineError> {
        self.emit(EventEnvelope::scene_event(scene_id, event_name, payload))
    }
}

/// Host-side consumer
#[derive(Debug)]
pub struct EventQueue {
    rx: Mutex<mpsc::Receiver<EventEnvelope>>,
}

impl EventQueue {
    /// Take up to `limit` queued envelopes in arrival order without blocking
    pub fn drain(&self, limit: usize) -> Vec<EventEnvelope> {
        let rx = self.rx.lock();
        let mut drained = Vec::new();
        while drained.len() < limit {
            match rx.try_recv() {
                Ok(envelope) => drained.push(envelope),
                Err(_) => break,
            }
        }
        drained
    }

    /// Discard everything currently queued, returning how many were dropped
    pub fn discard(&self) -> usize {
        let rx = self.rx.lock();
        rx.try_iter().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_drain_preserves_order_and_limit() {
        let (sender, queue) = event_channel();
        for i in 0..5 {
            sender.emit_callback(CallbackId::from("c"), json!(i)).unwrap();
        }

        let first: Vec<_> = queue.drain(3).into_iter().map(|e| e.payload).collect();
        assert_eq!(first, vec![json!(0), json!(1), json!(2)]);
        assert_eq!(queue.drain(10).len(), 2);
        assert!(queue.drain(10).is_empty());
    }

    #[test]
    fn test_emit_from_other_threads() {
        let (sender, queue) = event_channel();
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let sender = sender.clone();
                std::thread::spawn(move || {
                    sender
                        .emit_node_event(NodeId::from(format!("node_{i}")), "onClick", json!(i))
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(queue.drain(usize::MAX).len(), 4);
    }

    #[test]
    fn test_emit_after_queue_dropped_reports_disconnect() {
        let (sender, queue) = event_channel();
        drop(queue);
        assert_eq!(
            sender.emit_scene_event(SceneId::from("s"), "onTrackingUpdated", json!(null)),
            Err(EngineError::Disconnected)
        );
    }
}
