//! Scene registry and activation state machine
//!
//! `Created -> Active <-> Inactive -> Destroyed`, with `Destroyed` terminal.
//! At most one scene is active at a time. Destroyed scenes stay behind as
//! tombstones so their state can still be queried, until a memory cleanup
//! purges them.

use crate::error::{BridgeError, BridgeResult};
use crate::foundation::ids::{NodeId, SceneId};
use crate::foundation::props::{merge_patch, PropMap};
use crate::scene::NodeType;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of top-level scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SceneType {
    /// Plain 3D/VR scene
    #[serde(rename = "scene")]
    Scene,
    /// AR scene driven by device tracking
    #[serde(rename = "arScene")]
    ArScene,
}

impl SceneType {
    /// Node type of the scene's root node
    pub const fn root_node_type(self) -> NodeType {
        match self {
            Self::Scene => NodeType::Scene,
            Self::ArScene => NodeType::ArScene,
        }
    }
}

impl FromStr for SceneType {
    type Err = BridgeError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "scene" => Ok(Self::Scene),
            "arScene" => Ok(Self::ArScene),
            other => Err(BridgeError::InvalidType(other.to_string())),
        }
    }
}

/// Scene activation state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SceneState {
    /// Registered, never activated
    Created,
    /// Currently presented
    Active,
    /// Previously active, now paused
    Inactive,
    /// Released; terminal
    Destroyed,
}

impl SceneState {
    /// Lowercase name used on the wire
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Destroyed => "destroyed",
        }
    }
}

impl fmt::Display for SceneState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registered scene
#[derive(Debug, Clone)]
pub struct SceneEntry {
    /// Scene id
    pub id: SceneId,
    /// Scene kind
    pub scene_type: SceneType,
    /// Activation state
    pub state: SceneState,
    /// Root node owning the scene's subtree
    pub root: NodeId,
    /// Scene-level props
    pub props: PropMap,
}

/// Result of an activation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activation {
    /// Scene was already active
    AlreadyActive,
    /// Scene became active, possibly displacing another one
    Activated {
        /// Scene that was deactivated to make room
        displaced: Option<SceneId>,
    },
}

/// Registry of scenes
#[derive(Debug, Default)]
pub struct SceneRegistry {
    scenes: IndexMap<SceneId, SceneEntry>,
    active: Option<SceneId>,
}

impl SceneRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new scene in the `Created` state
    pub fn insert(&mut self, id: SceneId, scene_type: SceneType, root: NodeId, props: PropMap) -> BridgeResult<()> {
        if self.scenes.contains_key(&id) {
            return Err(BridgeError::DuplicateId(id.to_string()));
        }
        self.scenes.insert(
            id.clone(),
            SceneEntry {
                id,
                scene_type,
                state: SceneState::Created,
                root,
                props,
            },
        );
        Ok(())
    }

    /// Look up a scene, including tombstones
    pub fn get(&self, id: &SceneId) -> Option<&SceneEntry> {
        self.scenes.get(id)
    }

    /// Current state, `None` for unknown scenes
    pub fn state(&self, id: &SceneId) -> Option<SceneState> {
        self.scenes.get(id).map(|scene| scene.state)
    }

    /// Currently active scene
    pub fn active(&self) -> Option<&SceneId> {
        self.active.as_ref()
    }

    /// Number of scene records, tombstones included
    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    /// Whether no scene is registered
    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    /// Number of scenes that are not destroyed
    pub fn live_count(&self) -> usize {
        self.scenes
            .values()
            .filter(|scene| scene.state != SceneState::Destroyed)
            .count()
    }

    /// Scene whose root is `root`
    pub fn scene_of_root(&self, root: &NodeId) -> Option<&SceneId> {
        self.scenes
            .values()
            .find(|scene| scene.state != SceneState::Destroyed && &scene.root == root)
            .map(|scene| &scene.id)
    }

    /// State of a scene that accepts `operation`
    ///
    /// Fails for unknown scenes and for destroyed ones.
    pub fn check(&self, id: &SceneId, operation: &'static str) -> BridgeResult<SceneState> {
        match self.scenes.get(id).map(|scene| scene.state) {
            None => Err(BridgeError::UnknownScene(id.clone())),
            Some(SceneState::Destroyed) => Err(BridgeError::InvalidSceneTransition {
                scene: id.clone(),
                state: SceneState::Destroyed,
                operation,
            }),
            Some(state) => Ok(state),
        }
    }

    fn live_mut(&mut self, id: &SceneId, operation: &'static str) -> BridgeResult<&mut SceneEntry> {
        let scene = self
            .scenes
            .get_mut(id)
            .ok_or_else(|| BridgeError::UnknownScene(id.clone()))?;
        if scene.state == SceneState::Destroyed {
            return Err(BridgeError::InvalidSceneTransition {
                scene: id.clone(),
                state: SceneState::Destroyed,
                operation,
            });
        }
        Ok(scene)
    }

    /// Merge a patch into scene props
    pub fn update(&mut self, id: &SceneId, patch: &PropMap) -> BridgeResult<()> {
        let scene = self.live_mut(id, "update")?;
        merge_patch(&mut scene.props, patch);
        Ok(())
    }

    /// Activate a scene, deactivating whichever scene was active
    pub fn activate(&mut self, id: &SceneId) -> BridgeResult<Activation> {
        if self.live_mut(id, "activate")?.state == SceneState::Active {
            return Ok(Activation::AlreadyActive);
        }

        let displaced = self.active.take();
        if let Some(previous) = &displaced {
            if let Some(scene) = self.scenes.get_mut(previous) {
                scene.state = SceneState::Inactive;
            }
        }

        self.live_mut(id, "activate")?.state = SceneState::Active;
        self.active = Some(id.clone());
        Ok(Activation::Activated { displaced })
    }

    /// Deactivate an active scene
    ///
    /// Returns `false` when the scene was not active.
    pub fn deactivate(&mut self, id: &SceneId) -> BridgeResult<bool> {
        let scene = self.live_mut(id, "deactivate")?;
        if scene.state != SceneState::Active {
            return Ok(false);
        }
        scene.state = SceneState::Inactive;
        self.active = None;
        Ok(true)
    }

    /// Mark a scene destroyed
    ///
    /// Returns the root node to release, or `None` when the scene is unknown
    /// or already destroyed.
    pub fn destroy(&mut self, id: &SceneId) -> Option<NodeId> {
        let scene = self.scenes.get_mut(id)?;
        if scene.state == SceneState::Destroyed {
            return None;
        }
        scene.state = SceneState::Destroyed;
        if self.active.as_ref() == Some(id) {
            self.active = None;
        }
        Some(scene.root.clone())
    }

    /// Drop destroyed tombstones, returning how many were purged
    pub fn purge_destroyed(&mut self) -> usize {
        let before = self.scenes.len();
        self.scenes.retain(|_, scene| scene.state != SceneState::Destroyed);
        before - self.scenes.len()
    }

    /// Ids of every scene that is not destroyed
    pub fn live_ids(&self) -> Vec<SceneId> {
        self.scenes
            .values()
            .filter(|scene| scene.state != SceneState::Destroyed)
            .map(|scene| scene.id.clone())
            .collect()
    }

    /// Remove every scene
    pub fn clear(&mut self) {
        self.scenes.clear();
        self.active = None;
    }
}
