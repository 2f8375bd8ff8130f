//! # Scene Bridge
//!
//! Mirrors a declarative node tree into an imperative 3D/AR engine and
//! delivers engine events back to host handlers.
//!
//! ## Features
//!
//! - **Node and scene mirror**: validated create/update/delete, parent/child
//!   links, scene activation state machine
//! - **Command channel**: every change becomes a serde-tagged
//!   [`EngineCommand`](engine::EngineCommand) submitted in order
//! - **Event dispatch**: callback and listener registries with at most one
//!   handler per key, drained on the host thread
//! - **Lifecycle binding**: RAII node handles that delete exactly once
//! - **Named resources**: materials, animations and AR tracking targets
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scene_bridge::prelude::*;
//! use std::sync::Arc;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (bridge, _log, _engine_events) = Bridge::headless(BridgeConfig::default())?;
//!     let bridge = Arc::new(bridge);
//!
//!     let scene = SceneId::from("main");
//!     bridge.create_scene(scene.clone(), "arScene", PropMap::new())?;
//!     bridge.activate_scene(&scene)?;
//!
//!     let mut cube = MountedNode::mount_in_scene(&bridge, &scene, NodeType::Box, PropMap::new())?;
//!     cube.set_handlers(HandlerSet::new().with("onClick", handler(|payload| {
//!         println!("clicked: {payload}");
//!     })))?;
//!
//!     let report = bridge.pump_events();
//!     println!("{} events delivered", report.delivered);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod engine;
pub mod events;
pub mod foundation;
pub mod lifecycle;
pub mod resources;
pub mod scene;

mod bridge;
mod error;

#[cfg(test)]
mod tests;

pub use bridge::{Bridge, DispatchOutcome, MemoryStats};
pub use error::{BridgeError, BridgeResult};

/// Common imports for bridge users
pub mod prelude {
    pub use crate::{
        Bridge, BridgeError, BridgeResult, MemoryStats,
        config::{BridgeConfig, Config, OrphanPolicy},
        engine::{EngineCapabilities, EngineCommand, EngineError, HeadlessEngine, NativeEngine, PlaneAlignment},
        events::{
            event_channel, fallible_handler, handler, DispatchReport, EventEnvelope, EventSender, Handler,
            HandlerError, ListenerTarget, ReplyError,
        },
        foundation::{
            ids::{CallbackId, NodeId, SceneId},
            math::Vec3,
            props::PropMap,
        },
        lifecycle::{HandlerSet, MountedNode},
        resources::{AnimationDefinition, AnimationOptions, ArTrackingTarget, MaterialDefinition},
        scene::{NodeType, SceneState},
    };
}
