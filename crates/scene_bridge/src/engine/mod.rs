//! Native engine abstraction
//!
//! The bridge never talks to a concrete renderer. Every host command is
//! turned into an [`EngineCommand`] and submitted through a [`NativeEngine`]
//! implementation; the engine answers only through an
//! [`EventSender`](crate::events::EventSender).

mod channel;
mod commands;
mod headless;

pub use channel::CommandChannel;
pub use commands::{EngineCommand, PlaneAlignment};
pub use headless::{CommandLog, HeadlessEngine};

use bitflags::bitflags;
use thiserror::Error;

/// Failures reported by an engine while accepting a command
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The engine is not available on this platform or not yet loaded
    #[error("Engine unavailable: {0}")]
    Unavailable(String),

    /// The engine refused a specific command
    #[error("Engine rejected {command}: {reason}")]
    Rejected {
        /// Name of the refused command
        command: &'static str,
        /// Engine-provided reason
        reason: String,
    },

    /// The engine side of the channel has gone away
    #[error("Engine disconnected")]
    Disconnected,
}

bitflags! {
    /// Optional features an engine may provide
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EngineCapabilities: u32 {
        /// AR session support
        const AR = 1 << 0;
        /// VR/stereo rendering support
        const VR = 1 << 1;
        /// Engine can release a material definition by name
        const MATERIAL_UNDEFINE = 1 << 2;
        /// Engine runs on the current platform at all
        const PLATFORM = 1 << 3;
    }
}

/// Imperative rendering engine the bridge mirrors into
///
/// Implementations may hand commands to another thread; `submit` only has
/// to accept the command, not apply it.
pub trait NativeEngine: Send {
    /// Accept one command
    fn submit(&mut self, command: EngineCommand) -> Result<(), EngineError>;

    /// Features this engine provides
    fn capabilities(&self) -> EngineCapabilities;

    /// Whether the engine has finished loading
    fn is_ready(&self) -> bool {
        true
    }
}
