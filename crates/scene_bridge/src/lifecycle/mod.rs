//! Lifecycle binding
//!
//! A [`MountedNode`] ties one engine node to the lifetime of a host value.
//! Mounting creates and attaches the node, prop and handler changes become
//! minimal patches, and unmounting (explicitly or on drop) deletes it
//! exactly once.

use crate::bridge::Bridge;
use crate::error::{BridgeError, BridgeResult};
use crate::events::{Handler, ListenerTarget};
use crate::foundation::ids::{NodeId, SceneId};
use crate::foundation::props::{diff_props, PropMap};
use crate::scene::NodeType;
use indexmap::IndexMap;
use log::{debug, warn};
use std::fmt;
use std::sync::Arc;

/// Event handlers of one node, keyed by event name
#[derive(Clone, Default)]
pub struct HandlerSet {
    handlers: IndexMap<String, Handler>,
}

impl HandlerSet {
    /// Empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handler (builder pattern)
    pub fn with(mut self, event_name: impl Into<String>, handler: Handler) -> Self {
        self.insert(event_name, handler);
        self
    }

    /// Add or replace a handler
    pub fn insert(&mut self, event_name: impl Into<String>, handler: Handler) {
        self.handlers.insert(event_name.into(), handler);
    }

    /// Remove a handler
    pub fn remove(&mut self, event_name: &str) -> Option<Handler> {
        self.handlers.shift_remove(event_name)
    }

    /// Handler for an event
    pub fn get(&self, event_name: &str) -> Option<&Handler> {
        self.handlers.get(event_name)
    }

    /// Number of handlers
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Event names in insertion order
    pub fn events(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }
}

impl fmt::Debug for HandlerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.handlers.keys()).finish()
    }
}

/// Engine node owned by a host value
///
/// Dropping it deletes the node. Call [`MountedNode::unmount`] instead to
/// observe teardown errors.
pub struct MountedNode {
    bridge: Arc<Bridge>,
    id: NodeId,
    props: PropMap,
    handlers: HandlerSet,
    released: bool,
}

impl MountedNode {
    /// Create a node and attach it under `parent`
    ///
    /// If attaching fails the node is deleted again before returning.
    pub fn mount(bridge: &Arc<Bridge>, node_type: NodeType, props: PropMap, parent: Option<&NodeId>) -> BridgeResult<Self> {
        let id = bridge.spawn_node(node_type, props.clone())?;
        if let Some(parent) = parent {
            if let Err(e) = bridge.add_child(parent, &id) {
                if let Err(cleanup) = bridge.delete_node(&id) {
                    warn!("Could not release {} after failed mount: {}", id, cleanup);
                }
                return Err(e);
            }
        }
        debug!("Mounted {} {}", node_type, id);
        Ok(Self {
            bridge: Arc::clone(bridge),
            id,
            props,
            handlers: HandlerSet::new(),
            released: false,
        })
    }

    /// Mount directly under a scene's root node
    pub fn mount_in_scene(bridge: &Arc<Bridge>, scene: &SceneId, node_type: NodeType, props: PropMap) -> BridgeResult<Self> {
        let root = bridge
            .scene_root(scene)
            .ok_or_else(|| BridgeError::UnknownScene(scene.clone()))?;
        Self::mount(bridge, node_type, props, Some(&root))
    }

    /// Mount a child under this node
    pub fn mount_child(&self, node_type: NodeType, props: PropMap) -> BridgeResult<MountedNode> {
        Self::mount(&self.bridge, node_type, props, Some(&self.id))
    }

    /// Engine id of the node
    pub fn id(&self) -> &NodeId {
        &self.id
    }

    /// Props as last declared by the host
    pub fn props(&self) -> &PropMap {
        &self.props
    }

    /// Current handlers
    pub fn handlers(&self) -> &HandlerSet {
        &self.handlers
    }

    /// Re-render with a new prop set
    ///
    /// Only changed keys are sent; keys missing from `next` are unset.
    pub fn set_props(&mut self, next: PropMap) -> BridgeResult<()> {
        let patch = diff_props(&self.props, &next);
        if patch.is_empty() {
            return Ok(());
        }
        self.bridge.update_node(&self.id, patch)?;
        self.props = next;
        Ok(())
    }

    /// Re-render with a new handler set
    ///
    /// Each changed handler replaces the old one in a single registration,
    /// so both are never live at once. Handlers missing from `next` are
    /// unregistered.
    pub fn set_handlers(&mut self, next: HandlerSet) -> BridgeResult<()> {
        let target = ListenerTarget::Node(self.id.clone());

        for (event_name, handler) in &next.handlers {
            let unchanged = self
                .handlers
                .get(event_name)
                .is_some_and(|current| Arc::ptr_eq(current, handler));
            if !unchanged {
                self.bridge
                    .register_listener(target.clone(), event_name, Arc::clone(handler))?;
            }
        }
        for event_name in self.handlers.events() {
            if next.get(event_name).is_none() {
                self.bridge.unregister_listener(&target, event_name)?;
            }
        }

        self.handlers = next;
        Ok(())
    }

    /// Delete the node now
    pub fn unmount(mut self) -> BridgeResult<()> {
        self.release()
    }

    fn release(&mut self) -> BridgeResult<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        // Deleting detaches from the parent and drops the node's listeners.
        self.bridge.delete_node(&self.id)
    }
}

impl Drop for MountedNode {
    fn drop(&mut self) {
        match self.release() {
            Ok(()) => {}
            Err(BridgeError::TornDown) => debug!("{} dropped after bridge teardown", self.id),
            Err(e) => warn!("Failed to release {} on drop: {}", self.id, e),
        }
    }
}

impl fmt::Debug for MountedNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MountedNode")
            .field("id", &self.id)
            .field("props", &self.props)
            .field("handlers", &self.handlers)
            .field("released", &self.released)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BridgeConfig;
    use crate::engine::EngineCommand;
    use crate::events::handler;
    use crate::foundation::props::props_from_json;
    use serde_json::json;

    fn props(value: serde_json::Value) -> PropMap {
        props_from_json(value).unwrap()
    }

    fn setup() -> (Arc<Bridge>, crate::engine::CommandLog) {
        let (bridge, log, _sender) = Bridge::headless(BridgeConfig::default()).unwrap();
        (Arc::new(bridge), log)
    }

    #[test]
    fn test_mount_creates_and_attaches() {
        let (bridge, log) = setup();
        let parent = bridge.spawn_node(NodeType::Node, PropMap::new()).unwrap();
        log.clear();

        let mounted = MountedNode::mount(&bridge, NodeType::Box, props(json!({"width": 1})), Some(&parent)).unwrap();

        assert_eq!(log.names(), vec!["createNode", "addChild"]);
        assert_eq!(bridge.node(mounted.id()).unwrap().parent, Some(parent));
    }

    #[test]
    fn test_drop_deletes_exactly_once() {
        let (bridge, log) = setup();
        let parent = bridge.spawn_node(NodeType::Node, PropMap::new()).unwrap();
        let mounted = MountedNode::mount(&bridge, NodeType::Sphere, PropMap::new(), Some(&parent)).unwrap();
        let id = mounted.id().clone();
        log.clear();

        mounted.unmount().unwrap();

        assert_eq!(log.names(), vec!["removeChild", "deleteNode"]);
        assert!(bridge.node(&id).is_none());
        assert!(bridge.node(&parent).unwrap().children.is_empty());
    }

    #[test]
    fn test_set_props_sends_minimal_patch() {
        let (bridge, log) = setup();
        let mut mounted =
            MountedNode::mount(&bridge, NodeType::Text, props(json!({"text": "a", "width": 2})), None).unwrap();
        log.clear();

        mounted.set_props(props(json!({"text": "b", "width": 2}))).unwrap();
        mounted.set_props(props(json!({"text": "b", "width": 2}))).unwrap();
        mounted.set_props(props(json!({"text": "b"}))).unwrap();

        let patches: Vec<_> = log
            .snapshot()
            .into_iter()
            .filter_map(|command| match command {
                EngineCommand::UpdateNode { props, .. } => Some(props),
                _ => None,
            })
            .collect();
        assert_eq!(patches, vec![props(json!({"text": "b"})), props(json!({"width": null}))]);
        assert!(!bridge.node(mounted.id()).unwrap().props.contains_key("width"));
    }

    #[test]
    fn test_handler_swap_is_atomic_and_registers_once() {
        let (bridge, log) = setup();
        let mut mounted = MountedNode::mount(&bridge, NodeType::Box, PropMap::new(), None).unwrap();
        log.clear();

        let first = handler(|_| {});
        mounted.set_handlers(HandlerSet::new().with("onClick", Arc::clone(&first))).unwrap();
        mounted.set_handlers(HandlerSet::new().with("onClick", Arc::clone(&first))).unwrap();
        mounted.set_handlers(HandlerSet::new().with("onClick", handler(|_| {}))).unwrap();

        assert_eq!(log.names(), vec!["registerEventListener"]);
        assert_eq!(bridge.active_listener_count(), 1);

        mounted.set_handlers(HandlerSet::new()).unwrap();
        assert_eq!(log.names(), vec!["registerEventListener", "unregisterEventListener"]);
        assert_eq!(bridge.active_listener_count(), 0);
    }

    #[test]
    fn test_drop_after_teardown_is_quiet() {
        let (bridge, _log) = setup();
        let mounted = MountedNode::mount(&bridge, NodeType::Box, PropMap::new(), None).unwrap();
        bridge.teardown();
        drop(mounted);
        assert!(bridge.is_torn_down());
    }

    #[test]
    fn test_failed_attach_rolls_back() {
        let (bridge, log) = setup();
        let missing = NodeId::from("node_missing");

        let err = MountedNode::mount(&bridge, NodeType::Box, PropMap::new(), Some(&missing)).unwrap_err();

        assert_eq!(err, BridgeError::UnknownNode(missing));
        assert_eq!(log.names(), vec!["createNode", "deleteNode"]);
        assert_eq!(bridge.memory_stats().nodes, 0);
    }
}
