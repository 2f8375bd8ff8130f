//! Ordered property bags and patch semantics
//!
//! Props are an insertion-ordered `String -> serde_json::Value` map. Patches
//! merge per key with last-write-wins; a `null` value unsets the key.

use indexmap::IndexMap;
use serde_json::Value;

/// Ordered property bag sent to the engine
pub type PropMap = IndexMap<String, Value>;

/// Apply `patch` onto `target`, key by key
///
/// Applying `u1` then `u2` gives the same result as applying
/// `compose_patches(u1, u2)` once.
pub fn merge_patch(target: &mut PropMap, patch: &PropMap) {
    for (key, value) in patch {
        if value.is_null() {
            target.shift_remove(key);
        } else {
            target.insert(key.clone(), value.clone());
        }
    }
}

/// Combine two patches into one equivalent patch
pub fn compose_patches(first: &PropMap, second: &PropMap) -> PropMap {
    let mut composed = first.clone();
    for (key, value) in second {
        composed.insert(key.clone(), value.clone());
    }
    composed
}

/// Minimal patch turning `old` into `new`
///
/// Changed or added keys carry their new value, removed keys carry `null`.
pub fn diff_props(old: &PropMap, new: &PropMap) -> PropMap {
    let mut patch = PropMap::new();
    for (key, value) in new {
        if old.get(key) != Some(value) {
            patch.insert(key.clone(), value.clone());
        }
    }
    for key in old.keys() {
        if !new.contains_key(key) {
            patch.insert(key.clone(), Value::Null);
        }
    }
    patch
}

/// Build a prop map from a JSON object; anything else yields `None`
pub fn props_from_json(value: Value) -> Option<PropMap> {
    match value {
        Value::Object(map) => Some(map.into_iter().collect()),
        _ => None,
    }
}
