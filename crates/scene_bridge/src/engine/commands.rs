//! Host-to-engine command vocabulary

use crate::events::ListenerTarget;
use crate::foundation::ids::{CallbackId, NodeId, SceneId};
use crate::foundation::props::PropMap;
use crate::resources::{AnimationDefinition, AnimationRunOptions, ArTrackingTarget, MaterialDefinition};
use crate::scene::{NodeType, SceneType};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Orientation of planes the AR session should detect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlaneAlignment {
    /// Floors and tables
    #[default]
    Horizontal,
    /// Walls
    Vertical,
    /// Both orientations
    Both,
}

/// One imperative engine call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum EngineCommand {
    /// Create a scene container
    CreateScene {
        /// Scene id
        scene_id: SceneId,
        /// Node id of the scene root
        root_id: NodeId,
        /// Scene kind
        scene_type: SceneType,
        /// Initial props
        props: PropMap,
    },
    /// Patch scene props
    UpdateScene {
        /// Scene id
        scene_id: SceneId,
        /// Changed keys
        props: PropMap,
    },
    /// Release a scene and everything below its root
    DestroyScene {
        /// Scene id
        scene_id: SceneId,
    },
    /// Present a scene
    ActivateScene {
        /// Scene id
        scene_id: SceneId,
    },
    /// Stop presenting a scene
    DeactivateScene {
        /// Scene id
        scene_id: SceneId,
    },

    /// Create a detached node
    CreateNode {
        /// Node id
        node_id: NodeId,
        /// Node kind
        node_type: NodeType,
        /// Initial props
        props: PropMap,
    },
    /// Patch node props; `null` unsets a key
    UpdateNode {
        /// Node id
        node_id: NodeId,
        /// Changed keys
        props: PropMap,
    },
    /// Release a node
    DeleteNode {
        /// Node id
        node_id: NodeId,
    },
    /// Append a child
    AddChild {
        /// Parent node
        parent_id: NodeId,
        /// Child node
        child_id: NodeId,
    },
    /// Detach a child
    RemoveChild {
        /// Parent node
        parent_id: NodeId,
        /// Child node
        child_id: NodeId,
    },

    /// Start forwarding an event for a target
    RegisterEventListener {
        /// Node or scene
        target: ListenerTarget,
        /// Engine event name, e.g. `onClick`
        event_name: String,
    },
    /// Stop forwarding an event for a target
    UnregisterEventListener {
        /// Node or scene
        target: ListenerTarget,
        /// Engine event name
        event_name: String,
    },

    /// Register or overwrite a material
    CreateMaterial {
        /// Material name
        name: String,
        /// Full definition
        definition: MaterialDefinition,
    },
    /// Merge fields into a material
    UpdateMaterial {
        /// Material name
        name: String,
        /// Fields to overlay
        definition: MaterialDefinition,
    },
    /// Release a material
    DeleteMaterial {
        /// Material name
        name: String,
    },

    /// Register or overwrite an animation
    CreateAnimation {
        /// Animation name
        name: String,
        /// Full definition
        definition: AnimationDefinition,
    },
    /// Run an animation on a node
    ExecuteAnimation {
        /// Animated node
        node_id: NodeId,
        /// Animation name
        name: String,
        /// Per-run overrides
        options: AnimationRunOptions,
    },
    /// Stop a run
    StopAnimation {
        /// Animated node
        node_id: NodeId,
        /// Animation name
        name: String,
    },
    /// Pause a run
    PauseAnimation {
        /// Animated node
        node_id: NodeId,
        /// Animation name
        name: String,
    },
    /// Resume a paused run
    ResumeAnimation {
        /// Animated node
        node_id: NodeId,
        /// Animation name
        name: String,
    },

    /// Toggle AR plane detection
    SetArPlaneDetection {
        /// Detection on or off
        enabled: bool,
        /// Plane orientation filter
        alignment: PlaneAlignment,
    },
    /// Replace the image marker set
    SetArImageTargets {
        /// Targets by name
        targets: IndexMap<String, ArTrackingTarget>,
    },
    /// Replace the object marker set
    SetArObjectTargets {
        /// Targets by name
        targets: IndexMap<String, ArTrackingTarget>,
    },
    /// Reset the tracking origin to the device pose
    RecenterTracking,
    /// Move the world origin
    SetWorldOrigin {
        /// New origin `[x, y, z]`
        origin: [f32; 3],
    },

    /// Query the camera position; answered on `reply`
    GetCameraPosition {
        /// Callback receiving `[x, y, z]`
        reply: CallbackId,
    },
    /// Move the camera
    SetCameraPosition {
        /// `[x, y, z]`
        position: [f32; 3],
    },
    /// Query the camera rotation; answered on `reply`
    GetCameraRotation {
        /// Callback receiving Euler angles in degrees
        reply: CallbackId,
    },
    /// Rotate the camera
    SetCameraRotation {
        /// Euler angles in degrees
        rotation: [f32; 3],
    },

    /// Let the engine release cached resources
    PerformMemoryCleanup,
    /// Ask whether AR is available; answered on `reply`
    QueryArSupport {
        /// Callback receiving a boolean
        reply: CallbackId,
    },
    /// Ask whether VR is available; answered on `reply`
    QueryVrSupport {
        /// Callback receiving a boolean
        reply: CallbackId,
    },
}

impl EngineCommand {
    /// Command name as it appears in the `op` tag
    pub const fn name(&self) -> &'static str {
        match self {
            Self::CreateScene { .. } => "createScene",
            Self::UpdateScene { .. } => "updateScene",
            Self::DestroyScene { .. } => "destroyScene",
            Self::ActivateScene { .. } => "activateScene",
            Self::DeactivateScene { .. } => "deactivateScene",
            Self::CreateNode { .. } => "createNode",
            Self::UpdateNode { .. } => "updateNode",
            Self::DeleteNode { .. } => "deleteNode",
            Self::AddChild { .. } => "addChild",
            Self::RemoveChild { .. } => "removeChild",
            Self::RegisterEventListener { .. } => "registerEventListener",
            Self::UnregisterEventListener { .. } => "unregisterEventListener",
            Self::CreateMaterial { .. } => "createMaterial",
            Self::UpdateMaterial { .. } => "updateMaterial",
            Self::DeleteMaterial { .. } => "deleteMaterial",
            Self::CreateAnimation { .. } => "createAnimation",
            Self::ExecuteAnimation { .. } => "executeAnimation",
            Self::StopAnimation { .. } => "stopAnimation",
            Self::PauseAnimation { .. } => "pauseAnimation",
            Self::ResumeAnimation { .. } => "resumeAnimation",
            Self::SetArPlaneDetection { .. } => "setArPlaneDetection",
            Self::SetArImageTargets { .. } => "setArImageTargets",
            Self::SetArObjectTargets { .. } => "setArObjectTargets",
            Self::RecenterTracking => "recenterTracking",
            Self::SetWorldOrigin { .. } => "setWorldOrigin",
            Self::GetCameraPosition { .. } => "getCameraPosition",
            Self::SetCameraPosition { .. } => "setCameraPosition",
            Self::GetCameraRotation { .. } => "getCameraRotation",
            Self::SetCameraRotation { .. } => "setCameraRotation",
            Self::PerformMemoryCleanup => "performMemoryCleanup",
            Self::QueryArSupport { .. } => "queryArSupport",
            Self::QueryVrSupport { .. } => "queryVrSupport",
        }
    }

    /// Node a command is about, if any
    pub fn target_node(&self) -> Option<&NodeId> {
        match self {
            Self::CreateNode { node_id, .. }
            | Self::UpdateNode { node_id, .. }
            | Self::DeleteNode { node_id }
            | Self::ExecuteAnimation { node_id, .. }
            | Self::StopAnimation { node_id, .. }
            | Self::PauseAnimation { node_id, .. }
            | Self::ResumeAnimation { node_id, .. } => Some(node_id),
            Self::AddChild { child_id, .. } | Self::RemoveChild { child_id, .. } => Some(child_id),
            Self::RegisterEventListener { target: ListenerTarget::Node(node_id), .. }
            | Self::UnregisterEventListener { target: ListenerTarget::Node(node_id), .. } => Some(node_id),
            _ => None,
        }
    }

    /// Callback the engine must answer, for query commands
    pub fn reply_callback(&self) -> Option<&CallbackId> {
        match self {
            Self::GetCameraPosition { reply }
            | Self::GetCameraRotation { reply }
            | Self::QueryArSupport { reply }
            | Self::QueryVrSupport { reply } => Some(reply),
            _ => None,
        }
    }
}
