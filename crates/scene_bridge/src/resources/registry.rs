//! Name-keyed definition store

use indexmap::IndexMap;

/// Definitions keyed by unique name, in registration order
///
/// Registering an existing name overwrites the previous definition in place.
#[derive(Debug, Clone)]
pub struct NamedRegistry<T> {
    entries: IndexMap<String, T>,
}

impl<T> NamedRegistry<T> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self { entries: IndexMap::new() }
    }

    /// Insert or overwrite a definition, returning the previous one
    pub fn upsert(&mut self, name: impl Into<String>, definition: T) -> Option<T> {
        self.entries.insert(name.into(), definition)
    }

    /// Look up a definition
    pub fn get(&self, name: &str) -> Option<&T> {
        self.entries.get(name)
    }

    /// Mutable lookup
    pub fn get_mut(&mut self, name: &str) -> Option<&mut T> {
        self.entries.get_mut(name)
    }

    /// Whether `name` is registered
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Remove a definition
    pub fn remove(&mut self, name: &str) -> Option<T> {
        self.entries.shift_remove(name)
    }

    /// Keep only the definitions matching `keep`
    pub fn retain(&mut self, mut keep: impl FnMut(&str, &T) -> bool) {
        self.entries.retain(|name, definition| keep(name, definition));
    }

    /// Iterate in registration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries.iter().map(|(name, definition)| (name.as_str(), definition))
    }

    /// Number of definitions
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every definition
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<T> Default for NamedRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}
