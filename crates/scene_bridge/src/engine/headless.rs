//! Headless engine
//!
//! Applies nothing, records every accepted command and answers queries
//! straight away through the event channel. Used by tests and the demo.

use super::{EngineCapabilities, EngineCommand, EngineError, NativeEngine};
use crate::events::EventSender;
use log::debug;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

/// Shared view of the commands a [`HeadlessEngine`] accepted
#[derive(Debug, Clone, Default)]
pub struct CommandLog {
    commands: Arc<Mutex<Vec<EngineCommand>>>,
}

impl CommandLog {
    /// Every command accepted so far, in order
    pub fn snapshot(&self) -> Vec<EngineCommand> {
        self.commands.lock().clone()
    }

    /// Names of the accepted commands, in order
    pub fn names(&self) -> Vec<&'static str> {
        self.commands.lock().iter().map(EngineCommand::name).collect()
    }

    /// Number of accepted commands
    pub fn len(&self) -> usize {
        self.commands.lock().len()
    }

    /// Whether nothing was accepted
    pub fn is_empty(&self) -> bool {
        self.commands.lock().is_empty()
    }

    /// Forget everything recorded so far
    pub fn clear(&self) {
        self.commands.lock().clear();
    }

    fn push(&self, command: EngineCommand) {
        self.commands.lock().push(command);
    }
}

/// Engine stand-in without a renderer
pub struct HeadlessEngine {
    log: CommandLog,
    events: EventSender,
    capabilities: EngineCapabilities,
    // command name -> how many more are accepted before refusing
    rejected: HashMap<&'static str, usize>,
    camera_position: [f32; 3],
    camera_rotation: [f32; 3],
    ready: bool,
}

impl HeadlessEngine {
    /// Engine answering through `events`, with every capability
    pub fn new(events: EventSender) -> Self {
        Self {
            log: CommandLog::default(),
            events,
            capabilities: EngineCapabilities::all(),
            rejected: HashMap::new(),
            camera_position: [0.0; 3],
            camera_rotation: [0.0; 3],
            ready: true,
        }
    }

    /// Restrict the advertised capabilities
    pub fn with_capabilities(mut self, capabilities: EngineCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Refuse every command with this name
    pub fn rejecting(self, command: &'static str) -> Self {
        self.rejecting_after(command, 0)
    }

    /// Accept `accepted` commands with this name, then refuse the rest
    pub fn rejecting_after(mut self, command: &'static str, accepted: usize) -> Self {
        self.rejected.insert(command, accepted);
        self
    }

    /// Report the engine as still loading
    pub fn not_ready(mut self) -> Self {
        self.ready = false;
        self
    }

    /// Handle to the recorded commands
    pub fn log(&self) -> CommandLog {
        self.log.clone()
    }

    fn answer(&mut self, command: &EngineCommand) -> Result<(), EngineError> {
        match command {
            EngineCommand::SetCameraPosition { position } => self.camera_position = *position,
            EngineCommand::SetCameraRotation { rotation } => self.camera_rotation = *rotation,
            EngineCommand::GetCameraPosition { reply } => {
                self.events.emit_callback(reply.clone(), json!(self.camera_position))?;
            }
            EngineCommand::GetCameraRotation { reply } => {
                self.events.emit_callback(reply.clone(), json!(self.camera_rotation))?;
            }
            EngineCommand::QueryArSupport { reply } => {
                let supported = self.capabilities.contains(EngineCapabilities::AR);
                self.events.emit_callback(reply.clone(), json!(supported))?;
            }
            EngineCommand::QueryVrSupport { reply } => {
                let supported = self.capabilities.contains(EngineCapabilities::VR);
                self.events.emit_callback(reply.clone(), json!(supported))?;
            }
            _ => {}
        }
        Ok(())
    }
}

impl NativeEngine for HeadlessEngine {
    fn submit(&mut self, command: EngineCommand) -> Result<(), EngineError> {
        if let Some(allowance) = self.rejected.get_mut(command.name()) {
            if *allowance == 0 {
                return Err(EngineError::Rejected {
                    command: command.name(),
                    reason: "rejected by headless engine".to_string(),
                });
            }
            *allowance -= 1;
        }
        debug!("headless: {}", command.name());
        self.answer(&command)?;
        self.log.push(command);
        Ok(())
    }

    fn capabilities(&self) -> EngineCapabilities {
        self.capabilities
    }

    fn is_ready(&self) -> bool {
        self.ready
    }
}
