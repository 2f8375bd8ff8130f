//! Named engine resources
//!
//! Materials, animations and AR tracking targets are registered by name and
//! referenced from node props. Re-registering a name overwrites it.

mod animations;
mod ar_targets;
mod materials;
mod registry;

pub use animations::{
    AnimationDefinition, AnimationOptions, AnimationRunOptions, AnimationRunState, AnimationRuns, Easing,
};
pub use ar_targets::{ArTargetRegistry, ArTrackingTarget, ImageOrientation};
pub use materials::{LightingModel, MaterialDefinition, WrapMode};
pub use registry::NamedRegistry;
