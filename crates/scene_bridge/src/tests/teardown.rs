//! Bridge teardown scenarios

use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::events::{handler, EventEnvelope, ListenerTarget, ReplyError};
use crate::foundation::ids::{CallbackId, NodeId, SceneId};
use crate::foundation::props::PropMap;
use crate::lifecycle::MountedNode;
use crate::resources::MaterialDefinition;
use crate::scene::NodeType;
use crate::{Bridge, DispatchOutcome, MemoryStats};
use futures::executor::block_on;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_teardown_destroys_live_scenes_and_clears_registries() {
        let (bridge, log, _sender) = Bridge::headless(BridgeConfig::default()).unwrap();
        let a = SceneId::from("a");
        let b = SceneId::from("b");
        let gone = SceneId::from("gone");
        for scene in [&a, &b, &gone] {
            bridge.create_scene(scene.clone(), "scene", PropMap::new()).unwrap();
        }
        bridge.destroy_scene(&gone).unwrap();
        bridge.new_callback(handler(|_| {})).unwrap();
        bridge.create_material("red", MaterialDefinition::default()).unwrap();
        log.clear();

        bridge.teardown();

        assert_eq!(log.names(), vec!["destroyScene", "destroyScene"]);
        assert!(bridge.is_torn_down());
        assert!(!bridge.is_event_system_ready());
        assert!(!bridge.is_ready());
        let stats = bridge.memory_stats();
        assert_eq!(stats, MemoryStats { commands_submitted: stats.commands_submitted, ..MemoryStats::default() });
    }

    #[test]
    fn test_teardown_is_idempotent() {
        let (bridge, log, _sender) = Bridge::headless(BridgeConfig::default()).unwrap();
        bridge.create_scene(SceneId::from("main"), "arScene", PropMap::new()).unwrap();

        bridge.teardown();
        let after_first = log.len();
        bridge.teardown();

        assert_eq!(log.len(), after_first);
    }

    #[test]
    fn test_commands_after_teardown_fail() {
        let (bridge, log, _sender) = Bridge::headless(BridgeConfig::default()).unwrap();
        let node = bridge.spawn_node(NodeType::Box, PropMap::new()).unwrap();
        bridge.teardown();
        log.clear();

        assert_eq!(bridge.create_node(NodeId::from("late"), "box", PropMap::new()), Err(BridgeError::TornDown));
        assert_eq!(bridge.update_node(&node, PropMap::new()), Err(BridgeError::TornDown));
        assert_eq!(bridge.delete_node(&node), Err(BridgeError::TornDown));
        assert_eq!(
            bridge.create_scene(SceneId::from("late"), "scene", PropMap::new()),
            Err(BridgeError::TornDown)
        );
        assert_eq!(bridge.register_callback(CallbackId::from("cb"), handler(|_| {})), Err(BridgeError::TornDown));
        assert_eq!(
            bridge.register_listener(ListenerTarget::Node(node), "onClick", handler(|_| {})),
            Err(BridgeError::TornDown)
        );
        assert_eq!(bridge.perform_memory_cleanup(), Err(BridgeError::TornDown));
        assert_eq!(bridge.get_scene_state(&SceneId::from("late")), None);
        assert!(log.is_empty());
    }

    #[test]
    fn test_pending_replies_resolve_torn_down() {
        let (bridge, _log, _sender) = Bridge::headless(BridgeConfig::default()).unwrap();
        let pending = bridge.get_camera_position();

        bridge.teardown();

        assert_eq!(block_on(pending), Err(ReplyError::TornDown));
        assert_eq!(block_on(bridge.is_vr_supported()), Err(ReplyError::TornDown));
    }

    #[test]
    fn test_events_after_teardown_are_dropped() {
        let (bridge, _log, sender) = Bridge::headless(BridgeConfig::default()).unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let id = bridge
            .new_callback(handler(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();

        bridge.teardown();
        sender.emit_callback(id.clone(), json!(1)).unwrap();
        sender.emit_callback(id.clone(), json!(2)).unwrap();

        assert_eq!(bridge.dispatch(&EventEnvelope::callback(id, json!(0))), DispatchOutcome::Dropped);
        let report = bridge.pump_events();
        assert_eq!((report.delivered, report.dropped), (0, 2));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_mounted_nodes_outliving_bridge_release_quietly() {
        let (bridge, log, _sender) = Bridge::headless(BridgeConfig::default()).unwrap();
        let bridge = Arc::new(bridge);
        let scene = SceneId::from("main");
        bridge.create_scene(scene.clone(), "scene", PropMap::new()).unwrap();
        let parent = MountedNode::mount_in_scene(&bridge, &scene, NodeType::Node, PropMap::new()).unwrap();
        let child = parent.mount_child(NodeType::Box, PropMap::new()).unwrap();

        bridge.teardown();
        let after_teardown = log.len();
        drop(child);
        drop(parent);

        assert_eq!(log.len(), after_teardown);
        assert_eq!(bridge.memory_stats().nodes, 0);
    }

    #[test]
    fn test_unmount_order_child_first() {
        let (bridge, log, _sender) = Bridge::headless(BridgeConfig::default()).unwrap();
        let bridge = Arc::new(bridge);
        let scene = SceneId::from("main");
        let root = bridge.create_scene(scene.clone(), "scene", PropMap::new()).unwrap();
        let parent = MountedNode::mount_in_scene(&bridge, &scene, NodeType::Node, PropMap::new()).unwrap();
        let child = parent.mount_child(NodeType::Box, PropMap::new()).unwrap();
        log.clear();

        drop(child);
        drop(parent);

        assert_eq!(log.names(), vec!["removeChild", "deleteNode", "removeChild", "deleteNode"]);
        assert!(bridge.node(&root).unwrap().children.is_empty());
        assert_eq!(bridge.memory_stats().nodes, 1);
    }
}
