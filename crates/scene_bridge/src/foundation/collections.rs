//! Specialized collection types

use slotmap::SlotMap;

slotmap::new_key_type! {
    /// Generational arena key of a registered node
    ///
    /// Keys are only meaningful inside the registry that issued them; a key
    /// left over from a deleted node never resolves to a newer node.
    pub struct NodeKey;
}

/// Arena storing values addressed by [`NodeKey`]
pub type NodeArena<T> = SlotMap<NodeKey, T>;
