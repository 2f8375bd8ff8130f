//! Mirrored scene graph
//!
//! The bridge keeps its own copy of every node and scene it has told the
//! engine about, so it can validate commands before they are submitted and
//! release whole subtrees on teardown.
//!
//! ## Architecture
//!
//! ```text
//! Host tree (declarative)
//!      ↓
//! NodeRegistry / SceneRegistry (mirror)
//!      ↓
//! Command channel (engine)
//! ```

mod node_registry;
mod node_type;
mod scene_registry;

pub use node_registry::{NodeRegistry, NodeSnapshot, RemovedNode};
pub use node_type::{NodeType, PropKind, PropSchema};
pub use scene_registry::{Activation, SceneEntry, SceneRegistry, SceneState, SceneType};
