//! Event system
//!
//! Key principles:
//! - The engine is the only producer; it emits [`EventEnvelope`]s through a
//!   cloneable [`EventSender`] from whatever thread it runs on
//! - The host drains the queue with `Bridge::pump_events`, the only point
//!   where engine events reach host code
//! - Handlers are resolved by opaque id: callback id for the generic channel,
//!   (target, event name) for scoped channels
//! - At most one handler per key; registering again replaces

mod callbacks;
mod envelope;
mod listeners;
mod queue;
mod reply;

pub use callbacks::{fallible_handler, handler, CallbackRegistry, Handler, HandlerError};
pub use envelope::{EventChannel, EventEnvelope};
pub use listeners::{ListenerChange, ListenerTable, ListenerTarget};
pub use queue::{event_channel, EventQueue, EventSender};
pub use reply::{Reply, ReplyError};

pub(crate) use callbacks::invoke;
pub(crate) use reply::reply_handler;

use serde::Serialize;

/// Outcome of one `pump_events` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    /// Envelopes whose handler ran successfully
    pub delivered: usize,
    /// Envelopes with no registered handler
    pub dropped: usize,
    /// Envelopes whose handler returned an error or panicked
    pub failed: usize,
}

impl DispatchReport {
    /// Total envelopes taken from the queue
    pub fn total(&self) -> usize {
        self.delivered + self.dropped + self.failed
    }

    /// Fold another report into this one
    pub fn absorb(&mut self, other: DispatchReport) {
        self.delivered += other.delivered;
        self.dropped += other.dropped;
        self.failed += other.failed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_totals() {
        let mut report = DispatchReport { delivered: 2, dropped: 1, failed: 0 };
        report.absorb(DispatchReport { delivered: 0, dropped: 0, failed: 3 });
        assert_eq!(report.total(), 6);
        assert_eq!(report.failed, 3);
    }
}
