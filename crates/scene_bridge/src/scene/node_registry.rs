//! Node registry - bridge-side mirror of engine node identity
//!
//! Nodes live in a generational arena. The parent link is a non-owning key
//! and the ordered child list is owned by the parent entry, so the mirror has
//! no ownership cycles. Public lookups go through the `NodeId -> NodeKey`
//! index.

use crate::config::OrphanPolicy;
use crate::error::{BridgeError, BridgeResult};
use crate::foundation::collections::{NodeArena, NodeKey};
use crate::foundation::ids::NodeId;
use crate::foundation::props::{merge_patch, PropMap};
use crate::scene::NodeType;
use std::collections::HashMap;

/// Arena entry of one node
#[derive(Debug, Clone)]
struct NodeEntry {
    id: NodeId,
    node_type: NodeType,
    props: PropMap,
    parent: Option<NodeKey>,
    children: Vec<NodeKey>,
}

/// Read-only view of a registered node
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSnapshot {
    /// Node id
    pub id: NodeId,
    /// Node type
    pub node_type: NodeType,
    /// Current merged props
    pub props: PropMap,
    /// Parent id, if attached
    pub parent: Option<NodeId>,
    /// Child ids in insertion order
    pub children: Vec<NodeId>,
}

/// What a successful removal changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedNode {
    /// Parent the node was detached from first
    pub detached_from: Option<NodeId>,
    /// Children left without a parent
    pub orphaned: Vec<NodeId>,
}

/// Registry of mirrored nodes
#[derive(Debug, Default)]
pub struct NodeRegistry {
    nodes: NodeArena<NodeEntry>,
    index: HashMap<NodeId, NodeKey>,
}

impl NodeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether no node is registered
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether `id` is registered
    pub fn contains(&self, id: &NodeId) -> bool {
        self.index.contains_key(id)
    }

    fn key_of(&self, id: &NodeId) -> BridgeResult<NodeKey> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| BridgeError::UnknownNode(id.clone()))
    }

    fn id_of(&self, key: NodeKey) -> NodeId {
        self.nodes[key].id.clone()
    }

    /// Snapshot of a node
    pub fn get(&self, id: &NodeId) -> Option<NodeSnapshot> {
        let key = *self.index.get(id)?;
        let entry = &self.nodes[key];
        Some(NodeSnapshot {
            id: entry.id.clone(),
            node_type: entry.node_type,
            props: entry.props.clone(),
            parent: entry.parent.map(|p| self.id_of(p)),
            children: entry.children.iter().map(|c| self.id_of(*c)).collect(),
        })
    }

    /// Type of a node
    pub fn node_type(&self, id: &NodeId) -> Option<NodeType> {
        self.index.get(id).map(|key| self.nodes[*key].node_type)
    }

    /// Parent of a node
    pub fn parent_of(&self, id: &NodeId) -> Option<NodeId> {
        let key = *self.index.get(id)?;
        self.nodes[key].parent.map(|p| self.id_of(p))
    }

    /// Children of a node in insertion order
    pub fn children_of(&self, id: &NodeId) -> Vec<NodeId> {
        self.index
            .get(id)
            .map(|key| self.nodes[*key].children.iter().map(|c| self.id_of(*c)).collect())
            .unwrap_or_default()
    }

    /// Register a node with no parent and no children
    pub fn insert(&mut self, id: NodeId, node_type: NodeType, props: PropMap) -> BridgeResult<()> {
        if self.index.contains_key(&id) {
            return Err(BridgeError::DuplicateId(id.to_string()));
        }
        let key = self.nodes.insert(NodeEntry {
            id: id.clone(),
            node_type,
            props,
            parent: None,
            children: Vec::new(),
        });
        self.index.insert(id, key);
        Ok(())
    }

    /// Merge a patch into a node's props
    pub fn update(&mut self, id: &NodeId, patch: &PropMap) -> BridgeResult<()> {
        let key = self.key_of(id)?;
        merge_patch(&mut self.nodes[key].props, patch);
        Ok(())
    }

    /// Attach `child` under `parent`
    ///
    /// Returns `false` when the child is already attached to that parent.
    pub fn attach(&mut self, parent: &NodeId, child: &NodeId) -> BridgeResult<bool> {
        let parent_key = self.key_of(parent)?;
        let child_key = self.key_of(child)?;

        match self.nodes[child_key].parent {
            Some(current) if current == parent_key => return Ok(false),
            Some(current) => {
                return Err(BridgeError::AlreadyAttached {
                    child: child.clone(),
                    parent: self.id_of(current),
                });
            }
            None => {}
        }

        // Walk up from the parent; meeting the child means a cycle.
        let mut cursor = Some(parent_key);
        while let Some(key) = cursor {
            if key == child_key {
                return Err(BridgeError::Cycle {
                    parent: parent.clone(),
                    child: child.clone(),
                });
            }
            cursor = self.nodes[key].parent;
        }

        self.nodes[child_key].parent = Some(parent_key);
        self.nodes[parent_key].children.push(child_key);
        Ok(true)
    }

    /// Detach `child` from `parent`
    ///
    /// Returns `false` when `child` was not a child of `parent`.
    pub fn detach(&mut self, parent: &NodeId, child: &NodeId) -> BridgeResult<bool> {
        let parent_key = self.key_of(parent)?;
        let child_key = self.key_of(child)?;

        if self.nodes[child_key].parent != Some(parent_key) {
            return Ok(false);
        }
        self.nodes[child_key].parent = None;
        self.nodes[parent_key].children.retain(|c| *c != child_key);
        Ok(true)
    }

    /// Remove a node, detaching it from its parent first
    ///
    /// `Ok(None)` means the node was already gone.
    pub fn remove(&mut self, id: &NodeId, policy: OrphanPolicy) -> BridgeResult<Option<RemovedNode>> {
        let Some(key) = self.index.get(id).copied() else {
            return Ok(None);
        };

        if policy == OrphanPolicy::Reject && !self.nodes[key].children.is_empty() {
            return Err(BridgeError::HasChildren(id.clone()));
        }

        let detached_from = self.nodes[key].parent.map(|parent_key| {
            self.nodes[parent_key].children.retain(|c| *c != key);
            self.id_of(parent_key)
        });

        let children = std::mem::take(&mut self.nodes[key].children);
        let orphaned = children
            .into_iter()
            .map(|child_key| {
                self.nodes[child_key].parent = None;
                self.id_of(child_key)
            })
            .collect();

        self.nodes.remove(key);
        self.index.remove(id);
        Ok(Some(RemovedNode { detached_from, orphaned }))
    }

    /// Ids of `root` and all its descendants, children before parents
    pub fn subtree_post_order(&self, root: &NodeId) -> Vec<NodeId> {
        let Some(root_key) = self.index.get(root).copied() else {
            return Vec::new();
        };
        let mut order = Vec::new();
        let mut stack = vec![(root_key, false)];
        while let Some((key, expanded)) = stack.pop() {
            if expanded {
                order.push(self.id_of(key));
                continue;
            }
            stack.push((key, true));
            for child in self.nodes[key].children.iter().rev() {
                stack.push((*child, false));
            }
        }
        order
    }

    /// Remove every node
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.index.clear();
    }

    /// Check the parent/child invariants, returning the first violation
    pub fn verify_integrity(&self) -> Result<(), String> {
        if self.index.len() != self.nodes.len() {
            return Err(format!("index has {} ids for {} nodes", self.index.len(), self.nodes.len()));
        }
        for (key, entry) in &self.nodes {
            if self.index.get(&entry.id) != Some(&key) {
                return Err(format!("{} is not indexed", entry.id));
            }
            if let Some(parent) = entry.parent {
                let Some(parent_entry) = self.nodes.get(parent) else {
                    return Err(format!("{} references a deleted parent", entry.id));
                };
                if parent_entry.children.iter().filter(|c| **c == key).count() != 1 {
                    return Err(format!("{} is not listed exactly once by its parent", entry.id));
                }
            }
            for child in &entry.children {
                match self.nodes.get(*child) {
                    Some(child_entry) if child_entry.parent == Some(key) => {}
                    _ => return Err(format!("{} lists a child that does not point back", entry.id)),
                }
            }
            let mut cursor = entry.parent;
            let mut steps = 0;
            while let Some(up) = cursor {
                steps += 1;
                if up == key || steps > self.nodes.len() {
                    return Err(format!("{} is part of a cycle", entry.id));
                }
                cursor = self.nodes.get(up).and_then(|e| e.parent);
            }
        }
        Ok(())
    }
}
