//! Scoped event listeners

use super::Handler;
use crate::foundation::ids::{NodeId, SceneId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Owner of a scoped listener
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ListenerTarget {
    /// Node-scoped
    Node(NodeId),
    /// Scene-scoped
    Scene(SceneId),
}

impl fmt::Display for ListenerTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node(id) => write!(f, "node {id}"),
            Self::Scene(id) => write!(f, "scene {id}"),
        }
    }
}

impl From<NodeId> for ListenerTarget {
    fn from(id: NodeId) -> Self {
        Self::Node(id)
    }
}

impl From<SceneId> for ListenerTarget {
    fn from(id: SceneId) -> Self {
        Self::Scene(id)
    }
}

/// What a registration did to the table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerChange {
    /// The key had no handler before
    Added,
    /// An existing handler was swapped out
    Replaced,
}

/// One handler per (target, event name)
#[derive(Default)]
pub struct ListenerTable {
    entries: HashMap<(ListenerTarget, String), Handler>,
}

impl ListenerTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing the previous one for the same key
    pub fn register(&mut self, target: ListenerTarget, event_name: &str, handler: Handler) -> ListenerChange {
        match self.entries.insert((target, event_name.to_string()), handler) {
            Some(_) => ListenerChange::Replaced,
            None => ListenerChange::Added,
        }
    }

    /// Remove the handler for a key; missing keys are ignored
    pub fn unregister(&mut self, target: &ListenerTarget, event_name: &str) -> Option<Handler> {
        self.entries.remove(&(target.clone(), event_name.to_string()))
    }

    /// Handler for a key
    pub fn get(&self, target: &ListenerTarget, event_name: &str) -> Option<Handler> {
        self.entries
            .get(&(target.clone(), event_name.to_string()))
            .cloned()
    }

    /// Event names registered for `target`
    pub fn events_of(&self, target: &ListenerTarget) -> Vec<String> {
        self.entries
            .keys()
            .filter(|(owner, _)| owner == target)
            .map(|(_, event_name)| event_name.clone())
            .collect()
    }

    /// Drop every handler of `target`, returning the released event names
    pub fn release_target(&mut self, target: &ListenerTarget) -> Vec<String> {
        let released = self.events_of(target);
        for event_name in &released {
            self.entries.remove(&(target.clone(), event_name.clone()));
        }
        released
    }

    /// Number of live listeners
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every key, for teardown
    pub fn keys(&self) -> Vec<(ListenerTarget, String)> {
        self.entries.keys().cloned().collect()
    }

    /// Remove every handler
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl fmt::Debug for ListenerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerTable")
            .field("len", &self.entries.len())
            .finish()
    }
}
