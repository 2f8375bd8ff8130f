//! AR tracking targets

use super::NamedRegistry;
use crate::error::{BridgeError, BridgeResult};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which way an image target is expected to face
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ImageOrientation {
    /// Upright
    #[default]
    Up,
    /// Upside down
    Down,
    /// Rotated left
    Left,
    /// Rotated right
    Right,
}

/// Image or object the AR session should recognize
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum ArTrackingTarget {
    /// Planar image marker
    Image {
        /// Image source, `{"uri": ...}` or a bundled asset number
        source: Value,
        /// Expected orientation
        #[serde(default)]
        orientation: ImageOrientation,
        /// Real-world width in meters
        #[serde(default, skip_serializing_if = "Option::is_none")]
        physical_width: Option<f32>,
    },
    /// Scanned 3D object
    Object {
        /// Object scan source
        source: Value,
        /// Scale applied to the scan
        #[serde(default, skip_serializing_if = "Option::is_none")]
        scale: Option<[f32; 3]>,
    },
}

impl ArTrackingTarget {
    /// Decode a target from host JSON
    pub fn from_json(name: &str, value: Value) -> BridgeResult<Self> {
        let target: Self = serde_json::from_value(value)
            .map_err(|e| BridgeError::validation(format!("tracking target {name}"), e.to_string()))?;
        if let Self::Image { physical_width: Some(width), .. } = target {
            if width <= 0.0 || !width.is_finite() {
                return Err(BridgeError::validation(
                    format!("tracking target {name}"),
                    format!("physicalWidth must be positive, got {width}"),
                ));
            }
        }
        Ok(target)
    }

    /// Whether this is an image marker
    pub fn is_image(&self) -> bool {
        matches!(self, Self::Image { .. })
    }
}

/// Registered tracking targets
#[derive(Debug, Clone, Default)]
pub struct ArTargetRegistry {
    targets: NamedRegistry<ArTrackingTarget>,
}

impl ArTargetRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or overwrite targets
    pub fn register(&mut self, targets: IndexMap<String, ArTrackingTarget>) {
        for (name, target) in targets {
            self.targets.upsert(name, target);
        }
    }

    /// Which kind sets change if `targets` are registered, as `(images, objects)`
    ///
    /// A name that switches kind changes both sets.
    pub fn kinds_touched(&self, targets: &IndexMap<String, ArTrackingTarget>) -> (bool, bool) {
        let mut touched = (false, false);
        for (name, target) in targets {
            let previous = self.get(name).map(ArTrackingTarget::is_image);
            for image in std::iter::once(target.is_image()).chain(previous) {
                if image {
                    touched.0 = true;
                } else {
                    touched.1 = true;
                }
            }
        }
        touched
    }

    /// Replace the targets of one kind with `staged`'s targets of that kind
    pub fn adopt_kind(&mut self, staged: &Self, images: bool) {
        self.clear_kind(images);
        self.register(staged.filtered(images));
    }

    /// Look up a target
    pub fn get(&self, name: &str) -> Option<&ArTrackingTarget> {
        self.targets.get(name)
    }

    /// Remove a target
    pub fn remove(&mut self, name: &str) -> Option<ArTrackingTarget> {
        self.targets.remove(name)
    }

    /// Remove every target of one kind
    pub fn clear_kind(&mut self, images: bool) {
        self.targets.retain(|_, target| target.is_image() != images);
    }

    /// Every image target, in registration order
    pub fn image_targets(&self) -> IndexMap<String, ArTrackingTarget> {
        self.filtered(true)
    }

    /// Every object target, in registration order
    pub fn object_targets(&self) -> IndexMap<String, ArTrackingTarget> {
        self.filtered(false)
    }

    fn filtered(&self, images: bool) -> IndexMap<String, ArTrackingTarget> {
        self.targets
            .iter()
            .filter(|(_, target)| target.is_image() == images)
            .map(|(name, target)| (name.to_string(), target.clone()))
            .collect()
    }

    /// Number of registered targets
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Whether no target is registered
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Remove every target
    pub fn clear(&mut self) {
        self.targets.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_tagged_targets() {
        let image = ArTrackingTarget::from_json(
            "poster",
            json!({"type": "Image", "source": {"uri": "poster.png"}, "orientation": "Left", "physicalWidth": 0.3}),
        )
        .unwrap();
        let object = ArTrackingTarget::from_json(
            "mug",
            json!({"type": "Object", "source": {"uri": "mug.arobject"}, "scale": [1, 1, 1]}),
        )
        .unwrap();

        assert!(image.is_image());
        assert!(!object.is_image());
        assert!(matches!(image, ArTrackingTarget::Image { orientation: ImageOrientation::Left, .. }));
    }

    #[test]
    fn test_rejects_non_positive_width() {
        assert!(ArTrackingTarget::from_json(
            "poster",
            json!({"type": "Image", "source": 3, "physicalWidth": 0}),
        )
        .is_err());
    }

    #[test]
    fn test_registry_splits_by_kind() {
        let mut registry = ArTargetRegistry::new();
        let mut targets = IndexMap::new();
        targets.insert(
            "poster".to_string(),
            ArTrackingTarget::Image { source: json!(1), orientation: ImageOrientation::Up, physical_width: None },
        );
        targets.insert(
            "mug".to_string(),
            ArTrackingTarget::Object { source: json!(2), scale: None },
        );
        registry.register(targets);

        assert_eq!(registry.image_targets().len(), 1);
        assert!(registry.object_targets().contains_key("mug"));
        registry.clear_kind(true);
        assert!(registry.image_targets().is_empty());
        assert!(registry.remove("mug").is_some());
        assert!(registry.object_targets().is_empty());
    }

    fn poster() -> ArTrackingTarget {
        ArTrackingTarget::Image { source: json!(1), orientation: ImageOrientation::Up, physical_width: None }
    }

    fn mug() -> ArTrackingTarget {
        ArTrackingTarget::Object { source: json!(2), scale: None }
    }

    fn one(name: &str, target: ArTrackingTarget) -> IndexMap<String, ArTrackingTarget> {
        IndexMap::from([(name.to_string(), target)])
    }

    #[test]
    fn test_switching_kind_touches_both_sets() {
        let mut registry = ArTargetRegistry::new();
        registry.register(one("t", poster()));

        assert_eq!(registry.kinds_touched(&one("t", poster())), (true, false));
        assert_eq!(registry.kinds_touched(&one("t", mug())), (true, true));
        assert_eq!(registry.kinds_touched(&one("new", mug())), (false, true));
    }

    #[test]
    fn test_adopt_kind_leaves_other_kind_alone() {
        let mut live = ArTargetRegistry::new();
        live.register(one("t", poster()));
        live.register(one("mug", mug()));
        let mut staged = live.clone();
        staged.register(one("t", mug()));

        live.adopt_kind(&staged, true);

        assert!(live.get("t").is_none());
        assert!(live.get("mug").is_some());
        live.adopt_kind(&staged, false);
        assert!(!live.get("t").unwrap().is_image());
        assert_eq!(live.len(), 2);
    }
}
