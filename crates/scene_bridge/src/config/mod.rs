//! Configuration system
//!
//! Bridge settings are plain serde structs with defaults, loadable from
//! `.toml` or `.ron` files.

pub use serde::{Serialize, Deserialize};
use std::path::Path;

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(ConfigError::Io)?;

        // Try different formats
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_str(&contents),
            Some("ron") => ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string())),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }

    /// Parse configuration from TOML text
    fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Save configuration to file
    fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?,
            Some("ron") => ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?,
            _ => return Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// A value is out of its allowed range
    #[error("Invalid value for {field}: {reason}")]
    Invalid {
        /// Offending field
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },
}

/// What `delete_node` does with children that are still attached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrphanPolicy {
    /// Delete the node and leave its children registered without a parent
    #[default]
    Detach,
    /// Refuse the delete until every child has been removed
    Reject,
}

/// # Bridge Configuration
///
/// Identity prefixes, teardown policy and event pump limits for one
/// [`Bridge`](crate::Bridge) instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Debug prefix of allocated node ids
    pub node_id_prefix: String,
    /// Debug prefix of allocated callback ids
    pub callback_id_prefix: String,
    /// Handling of live children when their parent is deleted
    pub orphan_policy: OrphanPolicy,
    /// Reject prop keys the node type does not declare
    pub strict_props: bool,
    /// Upper bound of envelopes dispatched by one `pump_events` call
    pub max_events_per_pump: usize,
    /// Log dropped envelopes at warn level instead of debug
    pub warn_on_dropped_events: bool,
}

impl BridgeConfig {
    /// Check value ranges that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_events_per_pump == 0 {
            return Err(ConfigError::Invalid {
                field: "max_events_per_pump",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.node_id_prefix.is_empty() {
            return Err(ConfigError::Invalid {
                field: "node_id_prefix",
                reason: "must not be empty".to_string(),
            });
        }
        if self.node_id_prefix == self.callback_id_prefix {
            return Err(ConfigError::Invalid {
                field: "callback_id_prefix",
                reason: "must differ from node_id_prefix".to_string(),
            });
        }
        Ok(())
    }

    /// Set the orphan policy
    pub fn with_orphan_policy(mut self, policy: OrphanPolicy) -> Self {
        self.orphan_policy = policy;
        self
    }

    /// Enable or disable strict prop validation
    pub fn with_strict_props(mut self, strict: bool) -> Self {
        self.strict_props = strict;
        self
    }

    /// Set the per-pump envelope limit
    pub fn with_max_events_per_pump(mut self, limit: usize) -> Self {
        self.max_events_per_pump = limit;
        self
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            node_id_prefix: "node_".to_string(),
            callback_id_prefix: "callback_".to_string(),
            orphan_policy: OrphanPolicy::Detach,
            strict_props: false,
            max_events_per_pump: 1024,
            warn_on_dropped_events: true,
        }
    }
}

impl Config for BridgeConfig {}
