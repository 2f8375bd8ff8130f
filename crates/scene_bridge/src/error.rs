//! Bridge-level errors

use crate::engine::EngineError;
use crate::foundation::ids::{NodeId, SceneId};
use crate::scene::SceneState;
use thiserror::Error;

/// Result alias for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors surfaced synchronously to the command caller
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BridgeError {
    /// Node or scene type outside the supported vocabulary
    #[error("Invalid node type: {0}")]
    InvalidType(String),

    /// Props or definitions that do not fit their schema
    #[error("Validation failed for {target}: {reason}")]
    Validation {
        /// What was being validated (node id, material name, ...)
        target: String,
        /// Why it was rejected
        reason: String,
    },

    /// An entity with this id is already registered
    #[error("Duplicate id: {0}")]
    DuplicateId(String),

    /// Node is not registered
    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),

    /// Scene is not registered
    #[error("Unknown scene: {0}")]
    UnknownScene(SceneId),

    /// Animation name was never registered
    #[error("Unknown animation: {0}")]
    UnknownAnimation(String),

    /// Child already has a different parent
    #[error("Node {child} is already attached to {parent}")]
    AlreadyAttached {
        /// Child that was being attached
        child: NodeId,
        /// Its current parent
        parent: NodeId,
    },

    /// Attaching would make a node its own ancestor
    #[error("Attaching {child} under {parent} would create a cycle")]
    Cycle {
        /// Requested parent
        parent: NodeId,
        /// Requested child
        child: NodeId,
    },

    /// Node still has children and the orphan policy rejects the delete
    #[error("Node {0} still has attached children")]
    HasChildren(NodeId),

    /// Scene state machine does not allow the requested operation
    #[error("Scene {scene} cannot {operation} while {state:?}")]
    InvalidSceneTransition {
        /// Scene the operation targeted
        scene: SceneId,
        /// Current state
        state: SceneState,
        /// Requested operation
        operation: &'static str,
    },

    /// The engine refused or failed a command
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// The bridge has been torn down
    #[error("Bridge has been torn down")]
    TornDown,
}

impl BridgeError {
    /// Shorthand for a validation failure
    pub fn validation(target: impl ToString, reason: impl Into<String>) -> Self {
        Self::Validation {
            target: target.to_string(),
            reason: reason.into(),
        }
    }
}
