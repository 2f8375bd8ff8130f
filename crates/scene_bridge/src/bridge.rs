//! # Bridge
//!
//! One `Bridge` owns the mirrored registries for one engine instance. It is
//! `Send + Sync` and meant to be shared through an `Arc`:
//!
//! - Commands validate against the mirror, go to the engine, and only then
//!   update the mirror, so a refused command leaves no trace
//! - Engine events wait in the event queue until [`Bridge::pump_events`]
//!   runs them on the calling thread
//! - Handlers run with no bridge lock held and may call back into the bridge
//!
//! Lock order is `state` before `handlers`. Dispatch takes `handlers` first
//! and only locks `state` after letting go of it.

use crate::config::{BridgeConfig, ConfigError, OrphanPolicy};
use crate::engine::{
    CommandChannel, CommandLog, EngineCapabilities, EngineCommand, HeadlessEngine, NativeEngine, PlaneAlignment,
};
use crate::error::{BridgeError, BridgeResult};
use crate::events::{
    event_channel, handler, invoke, reply_handler, CallbackRegistry, DispatchReport, EventChannel, EventEnvelope, EventQueue,
    EventSender, Handler, ListenerChange, ListenerTable, ListenerTarget, Reply, ReplyError,
};
use crate::foundation::ids::{CallbackId, IdAllocator, NodeId, SceneId};
use crate::foundation::math::{from_wire, to_wire, Vec3};
use crate::foundation::props::PropMap;
use crate::resources::{
    AnimationDefinition, AnimationOptions, AnimationRunOptions, AnimationRunState, AnimationRuns, ArTargetRegistry,
    ArTrackingTarget, MaterialDefinition, NamedRegistry,
};
use crate::scene::{NodeRegistry, NodeSnapshot, NodeType, PropSchema, SceneRegistry, SceneState, SceneType};
use futures::future::{Future, FutureExt};
use indexmap::IndexMap;
use log::{debug, info, trace, warn};
use parking_lot::{Mutex, MutexGuard};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};

/// How a single envelope was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A handler ran and succeeded
    Delivered,
    /// No handler was registered
    Dropped,
    /// The handler returned an error or panicked
    Failed,
}

/// Registry sizes reported by [`Bridge::memory_stats`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryStats {
    /// Registered nodes, scene roots included
    pub nodes: usize,
    /// Scenes that are not destroyed
    pub scenes: usize,
    /// Destroyed scenes awaiting cleanup
    pub destroyed_scenes: usize,
    /// Registered materials
    pub materials: usize,
    /// Registered animations
    pub animations: usize,
    /// Tracked animation runs
    pub animation_runs: usize,
    /// Registered AR tracking targets
    pub ar_targets: usize,
    /// Registered callbacks
    pub callbacks: usize,
    /// Registered scoped listeners
    pub listeners: usize,
    /// Currently active scene
    pub active_scene: Option<SceneId>,
    /// Commands the engine accepted since construction
    pub commands_submitted: u64,
}

struct BridgeState {
    channel: CommandChannel,
    nodes: NodeRegistry,
    scenes: SceneRegistry,
    materials: NamedRegistry<MaterialDefinition>,
    animations: NamedRegistry<AnimationDefinition>,
    runs: AnimationRuns,
    ar_targets: ArTargetRegistry,
}

#[derive(Default)]
struct HandlerState {
    callbacks: CallbackRegistry,
    listeners: ListenerTable,
}

/// Host-side mirror of one engine
pub struct Bridge {
    config: BridgeConfig,
    allocator: IdAllocator,
    state: Mutex<BridgeState>,
    handlers: Mutex<HandlerState>,
    queue: EventQueue,
    torn_down: AtomicBool,
}

impl Bridge {
    /// Create a bridge driving `engine` and draining `queue`
    pub fn new(config: BridgeConfig, engine: Box<dyn NativeEngine>, queue: EventQueue) -> Result<Self, ConfigError> {
        config.validate()?;
        info!(
            "Bridge v{} starting (orphan policy {:?}, strict props {})",
            Self::version(),
            config.orphan_policy,
            config.strict_props
        );

        Ok(Self {
            allocator: IdAllocator::new(config.node_id_prefix.clone(), config.callback_id_prefix.clone()),
            state: Mutex::new(BridgeState {
                channel: CommandChannel::new(engine),
                nodes: NodeRegistry::new(),
                scenes: SceneRegistry::new(),
                materials: NamedRegistry::new(),
                animations: NamedRegistry::new(),
                runs: AnimationRuns::new(),
                ar_targets: ArTargetRegistry::new(),
            }),
            handlers: Mutex::new(HandlerState::default()),
            queue,
            torn_down: AtomicBool::new(false),
            config,
        })
    }

    /// Bridge over a [`HeadlessEngine`]
    ///
    /// Returns the command log and an event sender for feeding engine events.
    pub fn headless(config: BridgeConfig) -> Result<(Self, CommandLog, EventSender), ConfigError> {
        Self::headless_with(config, |engine| engine)
    }

    /// Like [`Bridge::headless`], with a chance to adjust the engine first
    pub fn headless_with(
        config: BridgeConfig,
        customize: impl FnOnce(HeadlessEngine) -> HeadlessEngine,
    ) -> Result<(Self, CommandLog, EventSender), ConfigError> {
        let (sender, queue) = event_channel();
        let engine = customize(HeadlessEngine::new(sender.clone()));
        let log = engine.log();
        let bridge = Self::new(config, Box::new(engine), queue)?;
        Ok((bridge, log, sender))
    }

    /// Active configuration
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Fresh node id, without creating anything
    pub fn allocate_id(&self) -> NodeId {
        self.allocator.allocate()
    }

    fn live(&self) -> BridgeResult<MutexGuard<'_, BridgeState>> {
        let state = self.state.lock();
        if self.torn_down.load(Ordering::Acquire) {
            return Err(BridgeError::TornDown);
        }
        Ok(state)
    }

    fn schema(&self, node_type: NodeType) -> PropSchema {
        PropSchema::new(node_type, self.config.strict_props)
    }

    // ---------------------------------------------------------------------
    // Nodes
    // ---------------------------------------------------------------------

    /// Create a detached node with a caller-chosen id
    pub fn create_node(&self, id: NodeId, node_type: &str, mut props: PropMap) -> BridgeResult<()> {
        let mut state = self.live()?;
        let node_type: NodeType = node_type.parse()?;
        if state.nodes.contains(&id) {
            return Err(BridgeError::DuplicateId(id.to_string()));
        }
        self.schema(node_type).validate(&id, &mut props)?;

        state.channel.send(EngineCommand::CreateNode {
            node_id: id.clone(),
            node_type,
            props: props.clone(),
        })?;
        state.nodes.insert(id.clone(), node_type, props)?;
        debug!("Created {} {}", node_type, id);
        Ok(())
    }

    /// Allocate an id and create a detached node
    pub fn spawn_node(&self, node_type: NodeType, props: PropMap) -> BridgeResult<NodeId> {
        let id = self.allocate_id();
        self.create_node(id.clone(), node_type.as_str(), props)?;
        Ok(id)
    }

    /// Merge a prop patch into a node; `null` values unset keys
    pub fn update_node(&self, id: &NodeId, mut patch: PropMap) -> BridgeResult<()> {
        let mut state = self.live()?;
        let node_type = state
            .nodes
            .node_type(id)
            .ok_or_else(|| BridgeError::UnknownNode(id.clone()))?;
        if patch.is_empty() {
            return Ok(());
        }
        self.schema(node_type).validate(id, &mut patch)?;

        state.channel.send(EngineCommand::UpdateNode {
            node_id: id.clone(),
            props: patch.clone(),
        })?;
        state.nodes.update(id, &patch)
    }

    /// Delete a node
    ///
    /// Detaches it from its parent first. Live children follow the configured
    /// orphan policy. Deleting an unknown node does nothing.
    pub fn delete_node(&self, id: &NodeId) -> BridgeResult<()> {
        let mut state = self.live()?;
        let Some(node) = state.nodes.get(id) else {
            debug!("delete_node: {} is not registered, ignoring", id);
            return Ok(());
        };
        if state.scenes.scene_of_root(id).is_some() {
            return Err(BridgeError::validation(id, "scene roots are released by destroy_scene"));
        }
        if self.config.orphan_policy == OrphanPolicy::Reject && !node.children.is_empty() {
            return Err(BridgeError::HasChildren(id.clone()));
        }

        // Each accepted command lands in the mirror before the next goes out
        if let Some(parent) = &node.parent {
            state.channel.send(EngineCommand::RemoveChild {
                parent_id: parent.clone(),
                child_id: id.clone(),
            })?;
            state.nodes.detach(parent, id)?;
        }
        state.channel.send(EngineCommand::DeleteNode { node_id: id.clone() })?;

        if let Some(removed) = state.nodes.remove(id, self.config.orphan_policy)? {
            if !removed.orphaned.is_empty() {
                warn!("Deleted {} with {} live children; they are now detached", id, removed.orphaned.len());
            }
        }
        let callbacks = state.runs.remove_node(id);
        self.release_handlers(&[id.clone()], None, callbacks);
        Ok(())
    }

    /// Append `child` under `parent`
    ///
    /// Re-attaching to the same parent does nothing.
    pub fn add_child(&self, parent: &NodeId, child: &NodeId) -> BridgeResult<()> {
        let mut state = self.live()?;
        if !state.nodes.attach(parent, child)? {
            debug!("add_child: {} is already under {}", child, parent);
            return Ok(());
        }
        let sent = state.channel.send(EngineCommand::AddChild {
            parent_id: parent.clone(),
            child_id: child.clone(),
        });
        if let Err(e) = sent {
            state.nodes.detach(parent, child)?;
            return Err(e.into());
        }
        Ok(())
    }

    /// Detach `child` from `parent`
    ///
    /// Detaching a node that is not a child of `parent` does nothing.
    pub fn remove_child(&self, parent: &NodeId, child: &NodeId) -> BridgeResult<()> {
        let mut state = self.live()?;
        if !state.nodes.detach(parent, child)? {
            debug!("remove_child: {} is not a child of {}", child, parent);
            return Ok(());
        }
        let sent = state.channel.send(EngineCommand::RemoveChild {
            parent_id: parent.clone(),
            child_id: child.clone(),
        });
        if let Err(e) = sent {
            state.nodes.attach(parent, child)?;
            return Err(e.into());
        }
        Ok(())
    }

    /// Snapshot of a registered node
    pub fn node(&self, id: &NodeId) -> Option<NodeSnapshot> {
        self.state.lock().nodes.get(id)
    }

    /// Check the mirrored tree's parent/child invariants
    pub fn verify_integrity(&self) -> Result<(), String> {
        self.state.lock().nodes.verify_integrity()
    }

    // ---------------------------------------------------------------------
    // Scenes
    // ---------------------------------------------------------------------

    /// Create a scene and its root node, returning the root id
    pub fn create_scene(&self, id: SceneId, scene_type: &str, props: PropMap) -> BridgeResult<NodeId> {
        let mut state = self.live()?;
        let scene_type: SceneType = scene_type.parse()?;
        if state.scenes.get(&id).is_some() {
            return Err(BridgeError::DuplicateId(id.to_string()));
        }
        let root = self.allocator.allocate();

        state.channel.send(EngineCommand::CreateScene {
            scene_id: id.clone(),
            root_id: root.clone(),
            scene_type,
            props: props.clone(),
        })?;
        state.nodes.insert(root.clone(), scene_type.root_node_type(), PropMap::new())?;
        state.scenes.insert(id.clone(), scene_type, root.clone(), props)?;
        debug!("Created scene {} with root {}", id, root);
        Ok(root)
    }

    /// Merge a prop patch into a scene
    pub fn update_scene(&self, id: &SceneId, patch: PropMap) -> BridgeResult<()> {
        let mut state = self.live()?;
        state.scenes.check(id, "update")?;
        state.channel.send(EngineCommand::UpdateScene {
            scene_id: id.clone(),
            props: patch.clone(),
        })?;
        state.scenes.update(id, &patch)
    }

    /// Make a scene the active one, deactivating the previous active scene
    pub fn activate_scene(&self, id: &SceneId) -> BridgeResult<()> {
        let mut state = self.live()?;
        if state.scenes.check(id, "activate")? == SceneState::Active {
            debug!("activate_scene: {} is already active", id);
            return Ok(());
        }

        if let Some(previous) = state.scenes.active().cloned() {
            state.channel.send(EngineCommand::DeactivateScene { scene_id: previous.clone() })?;
            state.scenes.deactivate(&previous)?;
        }
        state.channel.send(EngineCommand::ActivateScene { scene_id: id.clone() })?;
        state.scenes.activate(id)?;
        Ok(())
    }

    /// Deactivate an active scene; other states are left alone
    pub fn deactivate_scene(&self, id: &SceneId) -> BridgeResult<()> {
        let mut state = self.live()?;
        let current = state.scenes.check(id, "deactivate")?;
        if current != SceneState::Active {
            debug!("deactivate_scene: {} is {}, nothing to do", id, current);
            return Ok(());
        }
        state.channel.send(EngineCommand::DeactivateScene { scene_id: id.clone() })?;
        state.scenes.deactivate(id)?;
        Ok(())
    }

    /// Destroy a scene and release every node below its root
    ///
    /// Unknown and already destroyed scenes are ignored.
    pub fn destroy_scene(&self, id: &SceneId) -> BridgeResult<()> {
        let mut state = self.live()?;
        match state.scenes.get(id).map(|scene| scene.state) {
            None => {
                debug!("destroy_scene: {} is not registered, ignoring", id);
                return Ok(());
            }
            Some(SceneState::Destroyed) => {
                debug!("destroy_scene: {} is already destroyed", id);
                return Ok(());
            }
            Some(_) => {}
        }

        state.channel.send(EngineCommand::DestroyScene { scene_id: id.clone() })?;

        let Some(root) = state.scenes.destroy(id) else {
            return Ok(());
        };
        let released = state.nodes.subtree_post_order(&root);
        let mut callbacks = Vec::new();
        for node in &released {
            state.nodes.remove(node, OrphanPolicy::Detach)?;
            callbacks.extend(state.runs.remove_node(node));
        }
        debug!("Destroyed scene {} ({} nodes released)", id, released.len());
        self.release_handlers(&released, Some(id), callbacks);
        Ok(())
    }

    /// State of a scene, `None` if it was never created or has been purged
    pub fn get_scene_state(&self, id: &SceneId) -> Option<SceneState> {
        self.state.lock().scenes.state(id)
    }

    /// Root node of a live scene
    pub fn scene_root(&self, id: &SceneId) -> Option<NodeId> {
        self.state
            .lock()
            .scenes
            .get(id)
            .filter(|scene| scene.state != SceneState::Destroyed)
            .map(|scene| scene.root.clone())
    }

    // ---------------------------------------------------------------------
    // Materials and animations
    // ---------------------------------------------------------------------

    /// Register or overwrite a material
    pub fn create_material(&self, name: &str, definition: MaterialDefinition) -> BridgeResult<()> {
        definition.validate(name)?;
        let mut state = self.live()?;
        state.channel.send(EngineCommand::CreateMaterial {
            name: name.to_string(),
            definition: definition.clone(),
        })?;
        if state.materials.upsert(name, definition).is_some() {
            debug!("Material {} overwritten", name);
        }
        Ok(())
    }

    /// Merge fields into a material, creating it if needed
    pub fn update_material(&self, name: &str, update: MaterialDefinition) -> BridgeResult<()> {
        update.validate(name)?;
        let mut state = self.live()?;
        state.channel.send(EngineCommand::UpdateMaterial {
            name: name.to_string(),
            definition: update.clone(),
        })?;
        match state.materials.get_mut(name) {
            Some(existing) => existing.merge(&update),
            None => {
                debug!("update_material: {} was not registered, storing as new", name);
                state.materials.upsert(name, update);
            }
        }
        Ok(())
    }

    /// Forget a material
    ///
    /// Without engine support for releasing materials the engine keeps its
    /// copy and only the registry entry goes away.
    pub fn delete_material(&self, name: &str) -> BridgeResult<()> {
        let mut state = self.live()?;
        if !state.materials.contains(name) {
            debug!("delete_material: {} is not registered, ignoring", name);
            return Ok(());
        }
        if state.channel.capabilities().contains(EngineCapabilities::MATERIAL_UNDEFINE) {
            state.channel.send(EngineCommand::DeleteMaterial { name: name.to_string() })?;
        } else {
            warn!("Engine cannot release materials; {} stays loaded engine-side", name);
        }
        state.materials.remove(name);
        Ok(())
    }

    /// Registered material
    pub fn material(&self, name: &str) -> Option<MaterialDefinition> {
        self.state.lock().materials.get(name).cloned()
    }

    /// Register or overwrite an animation
    pub fn create_animation(&self, name: &str, definition: AnimationDefinition) -> BridgeResult<()> {
        definition.validate(name)?;
        let mut state = self.live()?;
        state.channel.send(EngineCommand::CreateAnimation {
            name: name.to_string(),
            definition: definition.clone(),
        })?;
        state.animations.upsert(name, definition);
        Ok(())
    }

    /// Registered animation
    pub fn animation(&self, name: &str) -> Option<AnimationDefinition> {
        self.state.lock().animations.get(name).cloned()
    }

    /// Run a registered animation on a node
    ///
    /// Start/finish handlers become callbacks owned by the run and are
    /// released when it stops or the node is deleted. A run that does not
    /// loop ends when the engine reports it finished.
    pub fn execute_animation(&self, node: &NodeId, name: &str, options: AnimationOptions) -> BridgeResult<()> {
        let mut state = self.live()?;
        if !state.nodes.contains(node) {
            return Err(BridgeError::UnknownNode(node.clone()));
        }
        let Some(definition) = state.animations.get(name) else {
            return Err(BridgeError::UnknownAnimation(name.to_string()));
        };
        let looping = options.looping.or(definition.looping).unwrap_or(false);

        let mut run = AnimationRunOptions {
            looping: options.looping,
            delay: options.delay,
            on_start: None,
            on_finish: None,
        };
        {
            let mut handlers = self.handlers.lock();
            if let Some(on_start) = options.on_start {
                let id = self.allocator.allocate_callback();
                handlers.callbacks.register(id.clone(), on_start);
                run.on_start = Some(id);
            }
            if looping {
                if let Some(on_finish) = options.on_finish {
                    let id = self.allocator.allocate_callback();
                    handlers.callbacks.register(id.clone(), on_finish);
                    run.on_finish = Some(id);
                }
            } else {
                let id = self.allocator.allocate_callback();
                let on_finish = options.on_finish.unwrap_or_else(|| handler(|_| {}));
                handlers.callbacks.register_once(id.clone(), on_finish);
                run.on_finish = Some(id);
            }
        }
        let callbacks = run.callbacks();
        let finish = if looping { None } else { run.on_finish.clone() };

        let sent = state.channel.send(EngineCommand::ExecuteAnimation {
            node_id: node.clone(),
            name: name.to_string(),
            options: run,
        });
        if let Err(e) = sent {
            self.release_callbacks(callbacks);
            return Err(e.into());
        }

        let replaced = state.runs.start(node, name, callbacks, finish);
        self.release_callbacks(replaced);
        Ok(())
    }

    /// Stop a run; stopping a run that is not tracked does nothing
    pub fn stop_animation(&self, node: &NodeId, name: &str) -> BridgeResult<()> {
        let mut state = self.live()?;
        if state.runs.state(node, name).is_none() {
            debug!("stop_animation: {} is not running on {}", name, node);
            return Ok(());
        }
        state.channel.send(EngineCommand::StopAnimation {
            node_id: node.clone(),
            name: name.to_string(),
        })?;
        if let Some(callbacks) = state.runs.stop(node, name) {
            self.release_callbacks(callbacks);
        }
        Ok(())
    }

    /// Pause a running animation
    pub fn pause_animation(&self, node: &NodeId, name: &str) -> BridgeResult<()> {
        self.transition_run(node, name, AnimationRunState::Running)
    }

    /// Resume a paused animation
    pub fn resume_animation(&self, node: &NodeId, name: &str) -> BridgeResult<()> {
        self.transition_run(node, name, AnimationRunState::Paused)
    }

    fn transition_run(&self, node: &NodeId, name: &str, from: AnimationRunState) -> BridgeResult<()> {
        let mut state = self.live()?;
        let current = state.runs.state(node, name);
        if current != Some(from) {
            debug!("{} on {} is {:?}, expected {:?}; ignoring", name, node, current, from);
            return Ok(());
        }

        let node_id = node.clone();
        let name_owned = name.to_string();
        let command = match from {
            AnimationRunState::Running => EngineCommand::PauseAnimation { node_id, name: name_owned },
            AnimationRunState::Paused => EngineCommand::ResumeAnimation { node_id, name: name_owned },
        };
        state.channel.send(command)?;
        match from {
            AnimationRunState::Running => state.runs.pause(node, name),
            AnimationRunState::Paused => state.runs.resume(node, name),
        };
        Ok(())
    }

    /// Run state of an animation on a node
    pub fn animation_state(&self, node: &NodeId, name: &str) -> Option<AnimationRunState> {
        self.state.lock().runs.state(node, name)
    }

    // ---------------------------------------------------------------------
    // AR and camera
    // ---------------------------------------------------------------------

    /// Toggle AR plane detection
    pub fn set_ar_plane_detection(&self, enabled: bool, alignment: PlaneAlignment) -> BridgeResult<()> {
        self.live()?
            .channel
            .send(EngineCommand::SetArPlaneDetection { enabled, alignment })?;
        Ok(())
    }

    /// Replace the image marker set
    pub fn set_ar_image_targets(&self, targets: IndexMap<String, ArTrackingTarget>) -> BridgeResult<()> {
        self.replace_ar_targets(targets, true)
    }

    /// Replace the object marker set
    pub fn set_ar_object_targets(&self, targets: IndexMap<String, ArTrackingTarget>) -> BridgeResult<()> {
        self.replace_ar_targets(targets, false)
    }

    fn replace_ar_targets(&self, targets: IndexMap<String, ArTrackingTarget>, images: bool) -> BridgeResult<()> {
        if let Some((name, _)) = targets.iter().find(|(_, target)| target.is_image() != images) {
            let expected = if images { "an image target" } else { "an object target" };
            return Err(BridgeError::validation(format!("tracking target {name}"), format!("expected {expected}")));
        }
        let mut state = self.live()?;
        let (_, moves_objects) = state.ar_targets.kinds_touched(&targets);
        let mut staged = state.ar_targets.clone();
        staged.clear_kind(images);
        staged.register(targets);
        Self::sync_ar_targets(&mut state, &staged, images, !images || moves_objects)
    }

    /// Add or overwrite tracking targets of either kind
    pub fn register_ar_targets(&self, targets: IndexMap<String, ArTrackingTarget>) -> BridgeResult<()> {
        let mut state = self.live()?;
        let (images, objects) = state.ar_targets.kinds_touched(&targets);
        let mut staged = state.ar_targets.clone();
        staged.register(targets);
        Self::sync_ar_targets(&mut state, &staged, images, objects)
    }

    /// Remove one tracking target
    pub fn delete_ar_target(&self, name: &str) -> BridgeResult<()> {
        let mut state = self.live()?;
        let mut staged = state.ar_targets.clone();
        let Some(removed) = staged.remove(name) else {
            debug!("delete_ar_target: {} is not registered, ignoring", name);
            return Ok(());
        };
        let images = removed.is_image();
        Self::sync_ar_targets(&mut state, &staged, images, !images)
    }

    /// Remove every tracking target
    pub fn clear_ar_targets(&self) -> BridgeResult<()> {
        let mut state = self.live()?;
        Self::sync_ar_targets(&mut state, &ArTargetRegistry::new(), true, true)
    }

    /// Registered tracking target
    pub fn ar_target(&self, name: &str) -> Option<ArTrackingTarget> {
        self.state.lock().ar_targets.get(name).cloned()
    }

    fn ar_target_command(images: bool, targets: IndexMap<String, ArTrackingTarget>) -> EngineCommand {
        if images {
            EngineCommand::SetArImageTargets { targets }
        } else {
            EngineCommand::SetArObjectTargets { targets }
        }
    }

    /// Send `staged`'s set for each touched kind, adopting a kind once the
    /// engine accepts it
    fn sync_ar_targets(
        state: &mut BridgeState,
        staged: &ArTargetRegistry,
        images: bool,
        objects: bool,
    ) -> BridgeResult<()> {
        for (kind, touched) in [(true, images), (false, objects)] {
            if !touched {
                continue;
            }
            let targets = if kind { staged.image_targets() } else { staged.object_targets() };
            state.channel.send(Self::ar_target_command(kind, targets))?;
            state.ar_targets.adopt_kind(staged, kind);
        }
        Ok(())
    }

    /// Reset tracking to the device's current pose
    pub fn recenter_tracking(&self) -> BridgeResult<()> {
        self.live()?.channel.send(EngineCommand::RecenterTracking)?;
        Ok(())
    }

    /// Move the world origin
    pub fn set_world_origin(&self, origin: Vec3) -> BridgeResult<()> {
        self.live()?
            .channel
            .send(EngineCommand::SetWorldOrigin { origin: to_wire(&origin) })?;
        Ok(())
    }

    /// Move the camera
    pub fn set_camera_position(&self, position: Vec3) -> BridgeResult<()> {
        self.live()?
            .channel
            .send(EngineCommand::SetCameraPosition { position: to_wire(&position) })?;
        Ok(())
    }

    /// Rotate the camera (Euler angles in degrees)
    pub fn set_camera_rotation(&self, rotation: Vec3) -> BridgeResult<()> {
        self.live()?
            .channel
            .send(EngineCommand::SetCameraRotation { rotation: to_wire(&rotation) })?;
        Ok(())
    }

    /// Current camera position, once the engine answers
    pub fn get_camera_position(&self) -> impl Future<Output = Result<Vec3, ReplyError>> {
        self.query::<[f32; 3]>(|reply| EngineCommand::GetCameraPosition { reply })
            .map(|answer| answer.map(from_wire))
    }

    /// Current camera rotation, once the engine answers
    pub fn get_camera_rotation(&self) -> impl Future<Output = Result<Vec3, ReplyError>> {
        self.query::<[f32; 3]>(|reply| EngineCommand::GetCameraRotation { reply })
            .map(|answer| answer.map(from_wire))
    }

    fn query<T>(&self, command: impl FnOnce(CallbackId) -> EngineCommand) -> Reply<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let mut state = match self.live() {
            Ok(state) => state,
            Err(_) => return Reply::failed(ReplyError::TornDown),
        };
        let id = self.allocator.allocate_callback();
        let (handler, reply) = reply_handler::<T>();
        self.handlers.lock().callbacks.register_once(id.clone(), handler);

        if let Err(e) = state.channel.send(command(id.clone())) {
            self.handlers.lock().callbacks.unregister(&id);
            return Reply::failed(e.into());
        }
        reply
    }

    // ---------------------------------------------------------------------
    // Handlers
    // ---------------------------------------------------------------------

    /// Register a handler for a callback id, replacing any previous one
    pub fn register_callback(&self, id: CallbackId, handler: Handler) -> BridgeResult<()> {
        let _state = self.live()?;
        if self.handlers.lock().callbacks.register(id.clone(), handler) {
            trace!("Callback {} replaced", id);
        }
        Ok(())
    }

    /// Allocate a callback id and register `handler` for it
    pub fn new_callback(&self, handler: Handler) -> BridgeResult<CallbackId> {
        let id = self.allocator.allocate_callback();
        self.register_callback(id.clone(), handler)?;
        Ok(id)
    }

    /// Remove a callback; unknown ids are ignored
    pub fn unregister_callback(&self, id: &CallbackId) {
        if self.handlers.lock().callbacks.unregister(id).is_none() {
            trace!("unregister_callback: {} was not registered", id);
        }
    }

    /// Register a scoped listener, replacing any handler for the same key
    ///
    /// The engine is told to forward the event the first time a key gets a
    /// handler.
    pub fn register_listener(&self, target: ListenerTarget, event_name: &str, handler: Handler) -> BridgeResult<()> {
        let mut state = self.live()?;
        match &target {
            ListenerTarget::Node(id) if !state.nodes.contains(id) => {
                return Err(BridgeError::UnknownNode(id.clone()));
            }
            ListenerTarget::Scene(id) => {
                state.scenes.check(id, "listen")?;
            }
            ListenerTarget::Node(_) => {}
        }

        let change = self
            .handlers
            .lock()
            .listeners
            .register(target.clone(), event_name, handler);
        if change == ListenerChange::Replaced {
            trace!("Listener {}/{} replaced", target, event_name);
            return Ok(());
        }

        let sent = state.channel.send(EngineCommand::RegisterEventListener {
            target: target.clone(),
            event_name: event_name.to_string(),
        });
        if let Err(e) = sent {
            self.handlers.lock().listeners.unregister(&target, event_name);
            return Err(e.into());
        }
        Ok(())
    }

    /// Remove a scoped listener; missing keys are ignored
    pub fn unregister_listener(&self, target: &ListenerTarget, event_name: &str) -> BridgeResult<()> {
        let mut state = self.live()?;
        if self.handlers.lock().listeners.unregister(target, event_name).is_none() {
            debug!("unregister_listener: no handler for {}/{}", target, event_name);
            return Ok(());
        }
        state.channel.send(EngineCommand::UnregisterEventListener {
            target: target.clone(),
            event_name: event_name.to_string(),
        })?;
        Ok(())
    }

    fn release_callbacks(&self, callbacks: Vec<CallbackId>) {
        if callbacks.is_empty() {
            return;
        }
        let mut handlers = self.handlers.lock();
        for id in &callbacks {
            handlers.callbacks.unregister(id);
        }
    }

    fn release_handlers(&self, nodes: &[NodeId], scene: Option<&SceneId>, callbacks: Vec<CallbackId>) {
        let mut handlers = self.handlers.lock();
        let mut released = 0;
        for node in nodes {
            released += handlers.listeners.release_target(&ListenerTarget::Node(node.clone())).len();
        }
        if let Some(scene) = scene {
            released += handlers.listeners.release_target(&ListenerTarget::Scene(scene.clone())).len();
        }
        for id in &callbacks {
            handlers.callbacks.unregister(id);
        }
        if released > 0 || !callbacks.is_empty() {
            trace!("Released {} listeners and {} callbacks", released, callbacks.len());
        }
    }

    // ---------------------------------------------------------------------
    // Events
    // ---------------------------------------------------------------------

    /// Run the handler for one envelope on the calling thread
    pub fn dispatch(&self, envelope: &EventEnvelope) -> DispatchOutcome {
        if self.torn_down.load(Ordering::Acquire) {
            return DispatchOutcome::Dropped;
        }

        let handler = {
            let mut handlers = self.handlers.lock();
            match &envelope.channel {
                EventChannel::Callback { callback_id } => handlers.callbacks.take_for_dispatch(callback_id),
                EventChannel::NodeEvent { node_id, event_name } => handlers
                    .listeners
                    .get(&ListenerTarget::Node(node_id.clone()), event_name),
                EventChannel::SceneEvent { scene_id, event_name } => handlers
                    .listeners
                    .get(&ListenerTarget::Scene(scene_id.clone()), event_name),
            }
        };

        let Some(handler) = handler else {
            if self.config.warn_on_dropped_events {
                warn!("No handler for {}, dropping event", envelope.channel);
            } else {
                debug!("No handler for {}, dropping event", envelope.channel);
            }
            return DispatchOutcome::Dropped;
        };

        if let EventChannel::Callback { callback_id } = &envelope.channel {
            self.finish_run(callback_id);
        }

        match invoke(&handler, &envelope.payload) {
            Ok(()) => DispatchOutcome::Delivered,
            Err(e) => {
                warn!("Handler for {} failed: {}", envelope.channel, e);
                DispatchOutcome::Failed
            }
        }
    }

    fn finish_run(&self, callback: &CallbackId) {
        let mut state = self.state.lock();
        if let Some((node, name, callbacks)) = state.runs.finish(callback) {
            debug!("{} finished on {}", name, node);
            self.release_callbacks(callbacks);
        }
    }

    /// Dispatch queued engine events, at most `max_events_per_pump` of them
    pub fn pump_events(&self) -> DispatchReport {
        let mut report = DispatchReport::default();
        if self.torn_down.load(Ordering::Acquire) {
            report.dropped = self.queue.discard();
            return report;
        }

        for envelope in self.queue.drain(self.config.max_events_per_pump) {
            match self.dispatch(&envelope) {
                DispatchOutcome::Delivered => report.delivered += 1,
                DispatchOutcome::Dropped => report.dropped += 1,
                DispatchOutcome::Failed => report.failed += 1,
            }
        }
        if report.total() > 0 {
            trace!("Pumped events: {:?}", report);
        }
        report
    }

    /// Whether events can still be delivered
    pub fn is_event_system_ready(&self) -> bool {
        !self.torn_down.load(Ordering::Acquire)
    }

    /// Registered callbacks plus scoped listeners
    pub fn active_listener_count(&self) -> usize {
        let handlers = self.handlers.lock();
        handlers.callbacks.len() + handlers.listeners.len()
    }

    // ---------------------------------------------------------------------
    // Utilities
    // ---------------------------------------------------------------------

    /// Whether the bridge is live and the engine has finished loading
    pub fn is_ready(&self) -> bool {
        self.live().map(|state| state.channel.is_ready()).unwrap_or(false)
    }

    /// Crate version
    pub fn version() -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    /// Registry sizes
    pub fn memory_stats(&self) -> MemoryStats {
        let state = self.state.lock();
        let handlers = self.handlers.lock();
        let live = state.scenes.live_count();
        MemoryStats {
            nodes: state.nodes.len(),
            scenes: live,
            destroyed_scenes: state.scenes.len() - live,
            materials: state.materials.len(),
            animations: state.animations.len(),
            animation_runs: state.runs.len(),
            ar_targets: state.ar_targets.len(),
            callbacks: handlers.callbacks.len(),
            listeners: handlers.listeners.len(),
            active_scene: state.scenes.active().cloned(),
            commands_submitted: state.channel.submitted(),
        }
    }

    /// Purge destroyed scene records and let the engine free its caches
    ///
    /// Returns how many scene records were purged.
    pub fn perform_memory_cleanup(&self) -> BridgeResult<usize> {
        let mut state = self.live()?;
        state.channel.send(EngineCommand::PerformMemoryCleanup)?;
        let purged = state.scenes.purge_destroyed();
        if purged > 0 {
            info!("Memory cleanup purged {} destroyed scenes", purged);
        }
        Ok(purged)
    }

    /// Whether the engine runs on this platform
    pub fn is_platform_supported(&self) -> bool {
        self.state
            .lock()
            .channel
            .capabilities()
            .contains(EngineCapabilities::PLATFORM)
    }

    /// Whether AR is available, once the engine answers
    pub fn is_ar_supported(&self) -> Reply<bool> {
        self.query(|reply| EngineCommand::QueryArSupport { reply })
    }

    /// Whether VR is available, once the engine answers
    pub fn is_vr_supported(&self) -> Reply<bool> {
        self.query(|reply| EngineCommand::QueryVrSupport { reply })
    }

    /// Whether [`Bridge::teardown`] has run
    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::Acquire)
    }

    /// Release everything and refuse further commands
    ///
    /// Live scenes are destroyed engine-side on a best-effort basis. Pending
    /// replies resolve with [`ReplyError::TornDown`]. Calling this again does
    /// nothing.
    pub fn teardown(&self) {
        let mut state = self.state.lock();
        if self.torn_down.swap(true, Ordering::AcqRel) {
            return;
        }

        let scenes = state.scenes.live_ids();
        for id in &scenes {
            if let Err(e) = state.channel.send(EngineCommand::DestroyScene { scene_id: id.clone() }) {
                warn!("Engine refused to release scene {} during teardown: {}", id, e);
            }
        }

        let stats = (state.nodes.len(), scenes.len());
        state.nodes.clear();
        state.scenes.clear();
        state.materials.clear();
        state.animations.clear();
        state.runs.clear();
        state.ar_targets.clear();
        drop(state);

        let released = {
            let mut handlers = self.handlers.lock();
            let count = handlers.callbacks.len() + handlers.listeners.len();
            handlers.callbacks.clear();
            handlers.listeners.clear();
            count
        };
        let discarded = self.queue.discard();
        info!(
            "Bridge torn down: {} nodes, {} scenes, {} handlers released, {} queued events discarded",
            stats.0, stats.1, released, discarded
        );
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("config", &self.config)
            .field("torn_down", &self.is_torn_down())
            .finish_non_exhaustive()
    }
}
