//! Scene bridge demo
//!
//! Drives a headless engine through a small AR scene: a clickable box with a
//! label, a spin animation and an image marker. A worker thread plays the
//! engine and emits events that the main thread pumps.
//!
//! Pass a `.toml` or `.ron` bridge config as the first argument to override
//! the defaults.

use futures::executor::block_on;
use indexmap::IndexMap;
use scene_bridge::foundation::logging;
use scene_bridge::foundation::props::props_from_json;
use scene_bridge::prelude::*;
use serde_json::json;
use std::error::Error;
use std::sync::Arc;
use std::thread;

fn load_config() -> Result<BridgeConfig, Box<dyn Error>> {
    match std::env::args().nth(1) {
        Some(path) => {
            log::info!("Loading bridge config from {}", path);
            Ok(BridgeConfig::load_from_file(path)?)
        }
        None => Ok(BridgeConfig::default()),
    }
}

fn props(value: serde_json::Value) -> PropMap {
    props_from_json(value).unwrap_or_default()
}

fn register_resources(bridge: &Bridge) -> Result<(), Box<dyn Error>> {
    bridge.create_material(
        "brass",
        MaterialDefinition::from_json(
            "brass",
            json!({"diffuseColor": "#b5a642", "lightingModel": "Physical", "roughness": 0.35, "metalness": 0.9}),
        )?,
    )?;
    bridge.create_animation(
        "spin",
        AnimationDefinition::from_json("spin", json!({"properties": {"rotateY": "+=90"}, "duration": 500}))?,
    )?;

    let mut targets = IndexMap::new();
    targets.insert(
        "poster".to_string(),
        ArTrackingTarget::from_json(
            "poster",
            json!({"type": "Image", "source": {"uri": "poster.png"}, "physicalWidth": 0.4}),
        )?,
    );
    bridge.set_ar_image_targets(targets)?;
    bridge.set_ar_plane_detection(true, PlaneAlignment::Horizontal)?;
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    logging::init();

    let (bridge, commands, engine_events) = Bridge::headless(load_config()?)?;
    let bridge = Arc::new(bridge);
    log::info!("Scene bridge v{} ready: {}", Bridge::version(), bridge.is_ready());

    register_resources(&bridge)?;

    let scene = SceneId::from("main");
    bridge.create_scene(scene.clone(), "arScene", props(json!({"displayPointCloud": true})))?;
    bridge.activate_scene(&scene)?;
    bridge.register_listener(
        ListenerTarget::Scene(scene.clone()),
        "onAnchorFound",
        handler(|anchor| log::info!("Anchor found: {}", anchor)),
    )?;

    let mut cube = MountedNode::mount_in_scene(
        &bridge,
        &scene,
        NodeType::Box,
        props(json!({"position": [0, 0, -1], "scale": 0.2, "materials": ["brass"]})),
    )?;
    let label = cube.mount_child(NodeType::Text, props(json!({"text": "tap me", "position": [0, 0.2, 0]})))?;

    let spinner = Arc::downgrade(&bridge);
    let cube_id = cube.id().clone();
    cube.set_handlers(HandlerSet::new().with(
        "onClick",
        handler(move |payload| {
            log::info!("Cube clicked at {}", payload);
            if let Some(bridge) = spinner.upgrade() {
                if let Err(e) = bridge.execute_animation(&cube_id, "spin", AnimationOptions::default()) {
                    log::warn!("Could not start spin: {}", e);
                }
            }
        }),
    ))?;

    // Stand-in for the native side: events arrive from another thread.
    let engine = {
        let events = engine_events.clone();
        let cube_id = cube.id().clone();
        let scene = scene.clone();
        thread::spawn(move || -> Result<(), EngineError> {
            events.emit_scene_event(scene, "onAnchorFound", json!({"anchorId": "plane-1", "type": "plane"}))?;
            for x in 0..3 {
                events.emit_node_event(cube_id.clone(), "onClick", json!({"position": [x, 0, -1]}))?;
            }
            events.emit_node_event(NodeId::from("node_unknown"), "onHover", json!(true))?;
            Ok(())
        })
    };
    match engine.join() {
        Ok(result) => result?,
        Err(_) => log::error!("Engine thread panicked"),
    }

    let report = bridge.pump_events();
    log::info!(
        "Pumped {} events: {} delivered, {} dropped, {} failed",
        report.total(),
        report.delivered,
        report.dropped,
        report.failed
    );

    bridge.set_camera_position(Vec3::new(0.0, 1.6, 0.0))?;
    let position = bridge.get_camera_position();
    bridge.pump_events();
    match block_on(position) {
        Ok(position) => log::info!("Camera at {:?}", position),
        Err(e) => log::warn!("Camera query failed: {}", e),
    }

    cube.set_props(props(json!({"position": [0, 0, -1.5], "scale": 0.2, "materials": ["brass"]})))?;
    log::info!("Memory: {}", serde_json::to_string_pretty(&bridge.memory_stats())?);

    drop(label);
    cube.unmount()?;
    bridge.destroy_scene(&scene)?;
    log::info!("Purged {} destroyed scenes", bridge.perform_memory_cleanup()?);
    bridge.teardown();

    log::info!("Engine received {} commands: {:?}", commands.len(), commands.names());
    Ok(())
}
