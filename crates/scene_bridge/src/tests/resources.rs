//! Named resource scenarios: materials, animations and AR targets

use crate::config::BridgeConfig;
use crate::engine::{CommandLog, EngineCapabilities, EngineCommand, PlaneAlignment};
use crate::error::BridgeError;
use crate::events::{handler, EventSender};
use crate::foundation::ids::CallbackId;
use crate::foundation::props::{props_from_json, PropMap};
use crate::resources::{AnimationDefinition, AnimationOptions, AnimationRunState, ArTrackingTarget, MaterialDefinition};
use crate::scene::NodeType;
use crate::Bridge;
use indexmap::IndexMap;
use nalgebra::Vector3;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Bridge, CommandLog, EventSender) {
        Bridge::headless(BridgeConfig::default()).unwrap()
    }

    fn material(value: serde_json::Value) -> MaterialDefinition {
        MaterialDefinition::from_json("test", value).unwrap()
    }

    fn spin() -> AnimationDefinition {
        AnimationDefinition::new(props_from_json(json!({"rotateY": "+=90"})).unwrap()).with_duration(250.0)
    }

    fn targets(entries: Vec<(&str, ArTrackingTarget)>) -> IndexMap<String, ArTrackingTarget> {
        entries.into_iter().map(|(name, target)| (name.to_string(), target)).collect()
    }

    fn image(width: f32) -> ArTrackingTarget {
        ArTrackingTarget::Image {
            source: json!({"uri": "poster.png"}),
            orientation: Default::default(),
            physical_width: Some(width),
        }
    }

    fn object() -> ArTrackingTarget {
        ArTrackingTarget::Object { source: json!({"uri": "mug.arobject"}), scale: None }
    }

    fn finish_callback(log: &CommandLog) -> CallbackId {
        log.snapshot()
            .into_iter()
            .rev()
            .find_map(|command| match command {
                EngineCommand::ExecuteAnimation { options, .. } => options.on_finish,
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn test_material_update_merges_fields() {
        let (bridge, log, _sender) = setup();
        bridge
            .create_material("red", material(json!({"diffuseColor": "#ff0000", "roughness": 0.5})))
            .unwrap();

        bridge.update_material("red", material(json!({"roughness": 0.2}))).unwrap();

        let merged = bridge.material("red").unwrap();
        assert_eq!(merged.diffuse_color.as_deref(), Some("#ff0000"));
        assert_eq!(merged.roughness, Some(0.2));
        assert_eq!(log.names(), vec!["createMaterial", "updateMaterial"]);
    }

    #[test]
    fn test_invalid_material_is_not_sent() {
        let (bridge, log, _sender) = setup();
        let bad = MaterialDefinition { metalness: Some(1.5), ..Default::default() };

        assert!(matches!(bridge.create_material("shiny", bad), Err(BridgeError::Validation { .. })));
        assert!(bridge.material("shiny").is_none());
        assert!(log.is_empty());
    }

    #[test]
    fn test_delete_material_follows_engine_capability() {
        let (bridge, log, _sender) =
            Bridge::headless_with(BridgeConfig::default(), |engine| engine.with_capabilities(EngineCapabilities::AR))
                .unwrap();
        bridge.create_material("red", material(json!({"diffuseColor": "red"}))).unwrap();
        log.clear();

        bridge.delete_material("red").unwrap();
        bridge.delete_material("red").unwrap();

        assert!(bridge.material("red").is_none());
        assert!(log.is_empty());

        let (bridge, log, _sender) = setup();
        bridge.create_material("red", material(json!({"diffuseColor": "red"}))).unwrap();
        bridge.delete_material("red").unwrap();
        assert_eq!(log.names(), vec!["createMaterial", "deleteMaterial"]);
    }

    #[test]
    fn test_animation_run_lifecycle() {
        let (bridge, log, sender) = setup();
        let node = bridge.spawn_node(NodeType::Box, PropMap::new()).unwrap();
        bridge.create_animation("spin", spin()).unwrap();
        let finished = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&finished);

        bridge
            .execute_animation(
                &node,
                "spin",
                AnimationOptions::default().on_finish(handler(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                })),
            )
            .unwrap();
        assert_eq!(bridge.animation_state(&node, "spin"), Some(AnimationRunState::Running));
        assert_eq!(bridge.active_listener_count(), 1);

        bridge.pause_animation(&node, "spin").unwrap();
        bridge.pause_animation(&node, "spin").unwrap();
        assert_eq!(bridge.animation_state(&node, "spin"), Some(AnimationRunState::Paused));
        bridge.resume_animation(&node, "spin").unwrap();

        sender.emit_callback(finish_callback(&log), json!({})).unwrap();
        assert_eq!(bridge.pump_events().delivered, 1);
        assert_eq!(finished.load(Ordering::SeqCst), 1);

        assert_eq!(bridge.animation_state(&node, "spin"), None);
        assert_eq!(bridge.active_listener_count(), 0);
        bridge.pause_animation(&node, "spin").unwrap();
        bridge.stop_animation(&node, "spin").unwrap();
        assert_eq!(
            log.names(),
            vec!["createNode", "createAnimation", "executeAnimation", "pauseAnimation", "resumeAnimation"]
        );
    }

    #[test]
    fn test_finished_run_releases_start_callback() {
        let (bridge, log, sender) = setup();
        let node = bridge.spawn_node(NodeType::Box, PropMap::new()).unwrap();
        bridge.create_animation("spin", spin()).unwrap();

        bridge
            .execute_animation(&node, "spin", AnimationOptions::default().on_start(handler(|_| {})))
            .unwrap();
        assert_eq!(bridge.active_listener_count(), 2);

        let on_finish = finish_callback(&log);
        sender.emit_callback(on_finish.clone(), json!({})).unwrap();
        sender.emit_callback(on_finish, json!({})).unwrap();
        let report = bridge.pump_events();

        assert_eq!((report.delivered, report.dropped), (1, 1));
        assert_eq!(bridge.animation_state(&node, "spin"), None);
        assert_eq!(bridge.active_listener_count(), 0);
        assert_eq!(bridge.memory_stats().animation_runs, 0);
    }

    #[test]
    fn test_looping_run_survives_finish_events() {
        let (bridge, log, sender) = setup();
        let node = bridge.spawn_node(NodeType::Box, PropMap::new()).unwrap();
        bridge.create_animation("spin", spin()).unwrap();
        let laps = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&laps);

        bridge
            .execute_animation(
                &node,
                "spin",
                AnimationOptions::default().looping(true).on_finish(handler(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                })),
            )
            .unwrap();
        let on_finish = finish_callback(&log);
        sender.emit_callback(on_finish.clone(), json!({})).unwrap();
        sender.emit_callback(on_finish, json!({})).unwrap();

        assert_eq!(bridge.pump_events().delivered, 2);
        assert_eq!(laps.load(Ordering::SeqCst), 2);
        assert_eq!(bridge.animation_state(&node, "spin"), Some(AnimationRunState::Running));
    }

    #[test]
    fn test_stale_finish_does_not_end_restarted_run() {
        let (bridge, log, sender) = setup();
        let node = bridge.spawn_node(NodeType::Box, PropMap::new()).unwrap();
        bridge.create_animation("spin", spin()).unwrap();
        bridge.execute_animation(&node, "spin", AnimationOptions::default()).unwrap();
        let first = finish_callback(&log);

        bridge.execute_animation(&node, "spin", AnimationOptions::default()).unwrap();
        sender.emit_callback(first, json!({})).unwrap();

        assert_eq!(bridge.pump_events().dropped, 1);
        assert_eq!(bridge.animation_state(&node, "spin"), Some(AnimationRunState::Running));
    }

    #[test]
    fn test_execute_requires_node_and_animation() {
        let (bridge, log, _sender) = setup();
        let node = bridge.spawn_node(NodeType::Box, PropMap::new()).unwrap();
        log.clear();

        assert_eq!(
            bridge.execute_animation(&node, "spin", AnimationOptions::default().on_start(handler(|_| {}))),
            Err(BridgeError::UnknownAnimation("spin".to_string()))
        );
        assert!(log.is_empty());
        assert_eq!(bridge.active_listener_count(), 0);
    }

    #[test]
    fn test_deleting_node_releases_run_callbacks() {
        let (bridge, _log, _sender) = setup();
        let node = bridge.spawn_node(NodeType::Sphere, PropMap::new()).unwrap();
        bridge.create_animation("spin", spin()).unwrap();
        bridge
            .execute_animation(
                &node,
                "spin",
                AnimationOptions::default()
                    .looping(true)
                    .on_start(handler(|_| {}))
                    .on_finish(handler(|_| {})),
            )
            .unwrap();
        assert_eq!(bridge.active_listener_count(), 2);

        bridge.delete_node(&node).unwrap();

        assert_eq!(bridge.active_listener_count(), 0);
        assert_eq!(bridge.memory_stats().animation_runs, 0);
    }

    #[test]
    fn test_restarting_run_releases_previous_callbacks() {
        let (bridge, _log, _sender) = setup();
        let node = bridge.spawn_node(NodeType::Box, PropMap::new()).unwrap();
        bridge.create_animation("spin", spin()).unwrap();

        for _ in 0..3 {
            bridge
                .execute_animation(&node, "spin", AnimationOptions::default().on_finish(handler(|_| {})))
                .unwrap();
        }

        assert_eq!(bridge.active_listener_count(), 1);
        assert_eq!(bridge.memory_stats().animation_runs, 1);
    }

    #[test]
    fn test_ar_target_sets_by_kind() {
        let (bridge, log, _sender) = setup();

        bridge.set_ar_image_targets(targets(vec![("poster", image(0.3))])).unwrap();
        bridge.set_ar_object_targets(targets(vec![("mug", object())])).unwrap();
        assert!(matches!(
            bridge.set_ar_image_targets(targets(vec![("mug", object())])),
            Err(BridgeError::Validation { .. })
        ));

        assert!(bridge.ar_target("poster").unwrap().is_image());
        assert_eq!(bridge.memory_stats().ar_targets, 2);
        assert_eq!(log.names(), vec!["setArImageTargets", "setArObjectTargets"]);

        bridge.set_ar_image_targets(IndexMap::new()).unwrap();
        assert!(bridge.ar_target("poster").is_none());
        assert!(bridge.ar_target("mug").is_some());
    }

    #[test]
    fn test_ar_target_registry_syncs_engine() {
        let (bridge, log, _sender) = setup();

        bridge
            .register_ar_targets(targets(vec![("poster", image(0.5)), ("mug", object())]))
            .unwrap();
        assert_eq!(log.names(), vec!["setArImageTargets", "setArObjectTargets"]);
        log.clear();

        bridge.delete_ar_target("poster").unwrap();
        bridge.delete_ar_target("poster").unwrap();
        match &log.snapshot()[..] {
            [EngineCommand::SetArImageTargets { targets }] => assert!(targets.is_empty()),
            other => panic!("unexpected commands {other:?}"),
        }
        log.clear();

        bridge.clear_ar_targets().unwrap();
        assert_eq!(log.names(), vec!["setArImageTargets", "setArObjectTargets"]);
        assert_eq!(bridge.memory_stats().ar_targets, 0);
    }

    #[test]
    fn test_ar_target_switching_kind_leaves_old_set() {
        let (bridge, log, _sender) = setup();
        bridge.register_ar_targets(targets(vec![("t", image(0.3))])).unwrap();
        log.clear();

        bridge.register_ar_targets(targets(vec![("t", object())])).unwrap();

        let commands = log.snapshot();
        assert_eq!(commands[0], EngineCommand::SetArImageTargets { targets: IndexMap::new() });
        match &commands[1] {
            EngineCommand::SetArObjectTargets { targets } => assert!(targets.contains_key("t")),
            other => panic!("unexpected command {other:?}"),
        }
        assert_eq!(commands.len(), 2);
        assert!(!bridge.ar_target("t").unwrap().is_image());
        assert_eq!(bridge.memory_stats().ar_targets, 1);

        log.clear();
        bridge.set_ar_image_targets(targets(vec![("t", image(0.2))])).unwrap();
        assert_eq!(log.names(), vec!["setArImageTargets", "setArObjectTargets"]);
        assert!(bridge.ar_target("t").unwrap().is_image());
    }

    #[test]
    fn test_refused_ar_sync_leaves_registry_untouched() {
        let (bridge, log, _sender) =
            Bridge::headless_with(BridgeConfig::default(), |engine| engine.rejecting("setArImageTargets")).unwrap();

        assert!(matches!(
            bridge.register_ar_targets(targets(vec![("t", image(0.3))])),
            Err(BridgeError::Engine(_))
        ));
        assert!(bridge.ar_target("t").is_none());

        bridge.register_ar_targets(targets(vec![("mug", object())])).unwrap();
        assert!(matches!(bridge.clear_ar_targets(), Err(BridgeError::Engine(_))));
        assert!(bridge.ar_target("mug").is_some());
        assert_eq!(log.names(), vec!["setArObjectTargets"]);
        assert_eq!(bridge.memory_stats().commands_submitted, 1);
    }

    #[test]
    fn test_refused_object_sync_keeps_accepted_image_set() {
        let (bridge, log, _sender) = Bridge::headless_with(BridgeConfig::default(), |engine| {
            engine.rejecting_after("setArObjectTargets", 1)
        })
        .unwrap();
        bridge
            .register_ar_targets(targets(vec![("poster", image(0.5)), ("mug", object())]))
            .unwrap();

        assert!(matches!(bridge.delete_ar_target("mug"), Err(BridgeError::Engine(_))));
        assert!(bridge.ar_target("mug").is_some());

        assert!(matches!(
            bridge.register_ar_targets(targets(vec![("sign", image(0.1)), ("cup", object())])),
            Err(BridgeError::Engine(_))
        ));
        assert!(bridge.ar_target("sign").is_some());
        assert!(bridge.ar_target("cup").is_none());
        assert_eq!(
            log.names(),
            vec!["setArImageTargets", "setArObjectTargets", "setArImageTargets"]
        );
    }

    #[test]
    fn test_tracking_and_camera_commands() {
        let (bridge, log, _sender) = setup();

        bridge.set_ar_plane_detection(true, PlaneAlignment::Vertical).unwrap();
        bridge.recenter_tracking().unwrap();
        bridge.set_world_origin(Vector3::new(0.0, 1.5, 0.0)).unwrap();

        let commands = log.snapshot();
        assert_eq!(
            commands[0],
            EngineCommand::SetArPlaneDetection { enabled: true, alignment: PlaneAlignment::Vertical }
        );
        assert_eq!(commands[1], EngineCommand::RecenterTracking);
        assert_eq!(commands[2], EngineCommand::SetWorldOrigin { origin: [0.0, 1.5, 0.0] });
    }
}
