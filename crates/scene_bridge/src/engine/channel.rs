//! Ordered command submission

use super::{EngineCapabilities, EngineCommand, EngineError, NativeEngine};
use log::{debug, trace};

/// Host side of the command path
///
/// Commands reach the engine in the order they are sent.
pub struct CommandChannel {
    engine: Box<dyn NativeEngine>,
    submitted: u64,
}

impl CommandChannel {
    /// Wrap an engine
    pub fn new(engine: Box<dyn NativeEngine>) -> Self {
        Self { engine, submitted: 0 }
    }

    /// Submit one command
    pub fn send(&mut self, command: EngineCommand) -> Result<(), EngineError> {
        trace!("-> {} {:?}", command.name(), command.target_node());
        let name = command.name();
        self.engine.submit(command).map_err(|e| {
            debug!("Engine refused {}: {}", name, e);
            e
        })?;
        self.submitted += 1;
        Ok(())
    }

    /// Engine feature set
    pub fn capabilities(&self) -> EngineCapabilities {
        self.engine.capabilities()
    }

    /// Whether the engine has finished loading
    pub fn is_ready(&self) -> bool {
        self.engine.is_ready()
    }

    /// Commands accepted so far
    pub fn submitted(&self) -> u64 {
        self.submitted
    }
}

impl std::fmt::Debug for CommandChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandChannel")
            .field("submitted", &self.submitted)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::HeadlessEngine;
    use crate::events::event_channel;
    use crate::foundation::ids::NodeId;

    #[test]
    fn test_counts_only_accepted_commands() {
        let (sender, _queue) = event_channel();
        let engine = HeadlessEngine::new(sender).rejecting("deleteNode");
        let log = engine.log();
        let mut channel = CommandChannel::new(Box::new(engine));

        channel.send(EngineCommand::RecenterTracking).unwrap();
        assert!(channel.send(EngineCommand::DeleteNode { node_id: NodeId::from("a") }).is_err());
        channel.send(EngineCommand::PerformMemoryCleanup).unwrap();

        assert_eq!(channel.submitted(), 2);
        assert_eq!(channel.submitted(), log.len() as u64);
    }
}
