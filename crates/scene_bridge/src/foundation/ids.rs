//! Identity allocation
//!
//! Node, scene and callback identifiers are opaque strings. Allocated ids are
//! a debug prefix plus a process-wide monotonically increasing serial, so two
//! allocators (even on different bridge instances) never hand out the same id.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_NODE_SERIAL: AtomicU64 = AtomicU64::new(1);
static NEXT_CALLBACK_SERIAL: AtomicU64 = AtomicU64::new(1);

/// Defines a cheap-to-clone string identifier type.
macro_rules! define_string_id {
    ($type_name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $type_name(Arc<str>);

        impl $type_name {
            /// Wrap an existing identifier string
            pub fn new(raw: impl Into<Arc<str>>) -> Self {
                Self(raw.into())
            }

            /// Borrow the identifier as a string slice
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $type_name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($type_name), "({})"), self.0)
            }
        }

        impl fmt::Display for $type_name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $type_name {
            fn from(raw: &str) -> Self {
                Self::new(raw)
            }
        }

        impl From<String> for $type_name {
            fn from(raw: String) -> Self {
                Self::new(raw)
            }
        }

        impl Borrow<str> for $type_name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

define_string_id!(NodeId, "Identifier of a mirrored engine node.");
define_string_id!(SceneId, "Identifier of a top-level scene container.");
define_string_id!(CallbackId, "Opaque token correlating an engine result with a host handler.");

/// Issues fresh node and callback identifiers
#[derive(Debug, Clone)]
pub struct IdAllocator {
    node_prefix: String,
    callback_prefix: String,
}

impl IdAllocator {
    /// Create an allocator with the given debug prefixes
    pub fn new(node_prefix: impl Into<String>, callback_prefix: impl Into<String>) -> Self {
        Self {
            node_prefix: node_prefix.into(),
            callback_prefix: callback_prefix.into(),
        }
    }

    /// Allocate a node id that has never been issued in this process
    pub fn allocate(&self) -> NodeId {
        let serial = NEXT_NODE_SERIAL.fetch_add(1, Ordering::Relaxed);
        NodeId::new(format!("{}{}", self.node_prefix, serial))
    }

    /// Allocate a callback id that has never been issued in this process
    pub fn allocate_callback(&self) -> CallbackId {
        let serial = NEXT_CALLBACK_SERIAL.fetch_add(1, Ordering::Relaxed);
        CallbackId::new(format!("{}{}", self.callback_prefix, serial))
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new("node_", "callback_")
    }
}
