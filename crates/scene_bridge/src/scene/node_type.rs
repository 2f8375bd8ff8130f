//! Node type vocabulary and per-type prop schemas
//!
//! Component modules build props freely; the bridge checks them here at the
//! `create_node`/`update_node` boundary so malformed values never reach the
//! engine.

use crate::error::{BridgeError, BridgeResult};
use crate::foundation::props::PropMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Defines the node vocabulary with its wire names.
macro_rules! node_types {
    ($( $variant:ident => $wire:literal ),+ $(,)?) => {
        /// Fixed vocabulary of engine node types
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum NodeType {
            $(
                #[doc = concat!("`", $wire, "`")]
                #[serde(rename = $wire)]
                $variant,
            )+
        }

        impl NodeType {
            /// Every supported node type
            pub const ALL: &'static [NodeType] = &[$(NodeType::$variant),+];

            /// Wire name understood by the engine
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(NodeType::$variant => $wire,)+
                }
            }
        }

        impl FromStr for NodeType {
            type Err = BridgeError;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                match raw {
                    $($wire => Ok(NodeType::$variant),)+
                    other => Err(BridgeError::InvalidType(other.to_string())),
                }
            }
        }
    };
}

node_types! {
    Box => "box",
    Sphere => "sphere",
    Text => "text",
    Image => "image",
    AnimatedImage => "animatedImage",
    AnimatedComponent => "animatedComponent",
    Object => "object",
    Scene => "scene",
    ArScene => "arScene",
    Camera => "camera",
    ArCamera => "arCamera",
    OrbitCamera => "orbitCamera",
    Light => "light",
    AmbientLight => "ambientLight",
    DirectionalLight => "directionalLight",
    SpotLight => "spotLight",
    OmniLight => "omniLight",
    Sound => "sound",
    SoundField => "soundField",
    SpatialSound => "spatialSound",
    Video => "video",
    MaterialVideo => "materialVideo",
    Portal => "portal",
    PortalScene => "portalScene",
    Plane => "plane",
    ArPlane => "arPlane",
    ArImageMarker => "arImageMarker",
    ArObjectMarker => "arObjectMarker",
    Quad => "quad",
    Polygon => "polygon",
    Polyline => "polyline",
    Geometry => "geometry",
    Particle => "particle",
    FlexView => "flexView",
    Surface => "surface",
    Image360 => "360Image",
    Video360 => "360Video",
    SkyBox => "skyBox",
    LightingEnvironment => "lightingEnvironment",
    Button => "button",
    Controller => "controller",
    Node => "node",
}

impl NodeType {
    /// Light sources
    pub const fn is_light(self) -> bool {
        matches!(
            self,
            Self::Light | Self::AmbientLight | Self::DirectionalLight | Self::SpotLight | Self::OmniLight
        )
    }

    /// Nodes anchored to AR tracking
    pub const fn is_ar_anchor(self) -> bool {
        matches!(self, Self::ArPlane | Self::ArImageMarker | Self::ArObjectMarker)
    }

    /// Types used as scene roots
    pub const fn is_scene_root(self) -> bool {
        matches!(self, Self::Scene | Self::ArScene)
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shape a prop value must have
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropKind {
    /// Any JSON number
    Number,
    /// Number in `0.0..=1.0`
    UnitInterval,
    /// Boolean flag
    Bool,
    /// String
    Text,
    /// Array of three numbers
    Vec3,
    /// Array of strings
    TextList,
    /// A string or an array of strings
    TextOrList,
    /// JSON object
    Object,
    /// JSON array of anything
    List,
    /// Unchecked (asset sources may be a uri object or a bundled asset number)
    Any,
}

impl PropKind {
    fn accepts(self, value: &Value) -> bool {
        match self {
            Self::Number => value.is_number(),
            Self::UnitInterval => value.as_f64().is_some_and(|v| (0.0..=1.0).contains(&v)),
            Self::Bool => value.is_boolean(),
            Self::Text => value.is_string(),
            Self::Vec3 => value
                .as_array()
                .is_some_and(|items| items.len() == 3 && items.iter().all(Value::is_number)),
            Self::TextList => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string)),
            Self::TextOrList => value.is_string() || Self::TextList.accepts(value),
            Self::Object => value.is_object(),
            Self::List => value.is_array(),
            Self::Any => true,
        }
    }

    const fn describe(self) -> &'static str {
        match self {
            Self::Number => "a number",
            Self::UnitInterval => "a number between 0 and 1",
            Self::Bool => "a boolean",
            Self::Text => "a string",
            Self::Vec3 => "an array of three numbers",
            Self::TextList => "an array of strings",
            Self::TextOrList => "a string or an array of strings",
            Self::Object => "an object",
            Self::List => "an array",
            Self::Any => "any value",
        }
    }
}

type KeySpec = (&'static str, PropKind);

const COMMON_KEYS: &[KeySpec] = &[
    ("position", PropKind::Vec3),
    ("rotation", PropKind::Vec3),
    ("scale", PropKind::Vec3),
    ("rotationPivot", PropKind::Vec3),
    ("scalePivot", PropKind::Vec3),
    ("opacity", PropKind::UnitInterval),
    ("visible", PropKind::Bool),
    ("transformBehaviors", PropKind::TextList),
    ("animation", PropKind::Object),
    ("materials", PropKind::TextOrList),
    ("renderingOrder", PropKind::Number),
    ("lightReceivingBitMask", PropKind::Number),
    ("shadowCastingBitMask", PropKind::Number),
    ("highAccuracyEvents", PropKind::Bool),
    ("ignoreEventHandling", PropKind::Bool),
    ("dragType", PropKind::Text),
    ("dragPlane", PropKind::Object),
    ("physicsBody", PropKind::Object),
    ("canClick", PropKind::Bool),
    ("canHover", PropKind::Bool),
    ("canTouch", PropKind::Bool),
    ("canScroll", PropKind::Bool),
    ("canSwipe", PropKind::Bool),
    ("canDrag", PropKind::Bool),
    ("canFuse", PropKind::Bool),
    ("canPinch", PropKind::Bool),
    ("canRotate", PropKind::Bool),
    ("timeToFuse", PropKind::Number),
];

const BOX_KEYS: &[KeySpec] = &[
    ("width", PropKind::Number),
    ("height", PropKind::Number),
    ("length", PropKind::Number),
];

const SPHERE_KEYS: &[KeySpec] = &[
    ("radius", PropKind::Number),
    ("widthSegmentCount", PropKind::Number),
    ("heightSegmentCount", PropKind::Number),
    ("facesOutward", PropKind::Bool),
];

const TEXT_KEYS: &[KeySpec] = &[
    ("text", PropKind::Text),
    ("width", PropKind::Number),
    ("height", PropKind::Number),
    ("color", PropKind::Text),
    ("style", PropKind::Object),
    ("extrusionDepth", PropKind::Number),
    ("maxLines", PropKind::Number),
    ("textClipMode", PropKind::Text),
    ("textLineBreakMode", PropKind::Text),
];

const LIGHT_KEYS: &[KeySpec] = &[
    ("color", PropKind::Text),
    ("intensity", PropKind::Number),
    ("temperature", PropKind::Number),
    ("influenceBitMask", PropKind::Number),
    ("direction", PropKind::Vec3),
    ("castsShadow", PropKind::Bool),
    ("innerAngle", PropKind::Number),
    ("outerAngle", PropKind::Number),
    ("attenuationStartDistance", PropKind::Number),
    ("attenuationEndDistance", PropKind::Number),
    ("shadowOpacity", PropKind::UnitInterval),
];

const MEDIA_KEYS: &[KeySpec] = &[
    ("source", PropKind::Any),
    ("width", PropKind::Number),
    ("height", PropKind::Number),
    ("loop", PropKind::Bool),
    ("paused", PropKind::Bool),
    ("muted", PropKind::Bool),
    ("volume", PropKind::UnitInterval),
    ("placeholderSource", PropKind::Any),
    ("format", PropKind::Text),
    ("type", PropKind::Text),
    ("resources", PropKind::List),
];

const AR_ANCHOR_KEYS: &[KeySpec] = &[
    ("anchorId", PropKind::Text),
    ("alignment", PropKind::Text),
    ("minHeight", PropKind::Number),
    ("minWidth", PropKind::Number),
    ("target", PropKind::Text),
    ("pauseUpdates", PropKind::Bool),
];

const SURFACE_KEYS: &[KeySpec] = &[
    ("width", PropKind::Number),
    ("height", PropKind::Number),
    ("arShadowReceiver", PropKind::Bool),
];

const SHAPE_KEYS: &[KeySpec] = &[
    ("vertices", PropKind::List),
    ("holes", PropKind::List),
    ("points", PropKind::List),
    ("thickness", PropKind::Number),
    ("closed", PropKind::Bool),
];

const CAMERA_KEYS: &[KeySpec] = &[
    ("active", PropKind::Bool),
    ("fieldOfView", PropKind::Number),
    ("focalPoint", PropKind::Vec3),
];

const SCENE_KEYS: &[KeySpec] = &[
    ("displayPointCloud", PropKind::Bool),
    ("anchorDetectionTypes", PropKind::TextOrList),
    ("postProcessEffects", PropKind::TextList),
    ("soundRoom", PropKind::Object),
    ("physicsWorld", PropKind::Object),
];

const FLEX_KEYS: &[KeySpec] = &[
    ("width", PropKind::Number),
    ("height", PropKind::Number),
    ("style", PropKind::Object),
    ("backgroundColor", PropKind::Text),
];

const PARTICLE_KEYS: &[KeySpec] = &[
    ("duration", PropKind::Number),
    ("delay", PropKind::Number),
    ("loop", PropKind::Bool),
    ("run", PropKind::Bool),
    ("fixedToEmitter", PropKind::Bool),
    ("image", PropKind::Object),
    ("spawnBehavior", PropKind::Object),
    ("particleAppearance", PropKind::Object),
    ("particlePhysics", PropKind::Object),
];

const BUTTON_KEYS: &[KeySpec] = &[
    ("source", PropKind::Any),
    ("hoverSource", PropKind::Any),
    ("clickSource", PropKind::Any),
    ("gazeSource", PropKind::Any),
    ("width", PropKind::Number),
    ("height", PropKind::Number),
];

const GEOMETRY_KEYS: &[KeySpec] = &[
    ("vertices", PropKind::List),
    ("normals", PropKind::List),
    ("texcoords", PropKind::List),
    ("triangleIndices", PropKind::List),
];

const NO_KEYS: &[KeySpec] = &[];

fn type_keys(node_type: NodeType) -> &'static [KeySpec] {
    match node_type {
        NodeType::Box => BOX_KEYS,
        NodeType::Sphere => SPHERE_KEYS,
        NodeType::Text => TEXT_KEYS,
        t if t.is_light() => LIGHT_KEYS,
        NodeType::Image
        | NodeType::AnimatedImage
        | NodeType::Object
        | NodeType::Sound
        | NodeType::SoundField
        | NodeType::SpatialSound
        | NodeType::Video
        | NodeType::MaterialVideo
        | NodeType::Image360
        | NodeType::Video360
        | NodeType::SkyBox
        | NodeType::LightingEnvironment => MEDIA_KEYS,
        t if t.is_ar_anchor() => AR_ANCHOR_KEYS,
        NodeType::Plane | NodeType::Quad | NodeType::Surface => SURFACE_KEYS,
        NodeType::Polygon | NodeType::Polyline => SHAPE_KEYS,
        NodeType::Camera | NodeType::ArCamera | NodeType::OrbitCamera => CAMERA_KEYS,
        t if t.is_scene_root() => SCENE_KEYS,
        NodeType::PortalScene | NodeType::Portal => SCENE_KEYS,
        NodeType::FlexView => FLEX_KEYS,
        NodeType::Particle => PARTICLE_KEYS,
        NodeType::Button => BUTTON_KEYS,
        NodeType::Geometry => GEOMETRY_KEYS,
        _ => NO_KEYS,
    }
}

/// Validated prop schema of one node type
#[derive(Debug, Clone, Copy)]
pub struct PropSchema {
    node_type: NodeType,
    strict: bool,
}

impl PropSchema {
    /// Schema for `node_type`; `strict` rejects undeclared keys
    pub const fn new(node_type: NodeType, strict: bool) -> Self {
        Self { node_type, strict }
    }

    /// Expected kind of `key`, if declared for this type
    pub fn kind_of(&self, key: &str) -> Option<PropKind> {
        type_keys(self.node_type)
            .iter()
            .chain(COMMON_KEYS)
            .find(|(name, _)| *name == key)
            .map(|(_, kind)| *kind)
    }

    /// Normalize and validate a full prop set or a patch
    ///
    /// A uniform `scale` number is widened to `[s, s, s]`. `null` values are
    /// accepted for any declared key since they unset it.
    pub fn validate(&self, target: &impl fmt::Display, props: &mut PropMap) -> BridgeResult<()> {
        if let Some(scale) = props.get_mut("scale") {
            if let Some(uniform) = scale.as_f64() {
                *scale = serde_json::json!([uniform, uniform, uniform]);
            }
        }

        for (key, value) in props.iter() {
            match self.kind_of(key) {
                Some(_) if value.is_null() => {}
                Some(kind) if !kind.accepts(value) => {
                    return Err(BridgeError::validation(
                        target,
                        format!("prop `{key}` of {} must be {}", self.node_type, kind.describe()),
                    ));
                }
                Some(_) => {}
                None if self.strict => {
                    return Err(BridgeError::validation(
                        target,
                        format!("prop `{key}` is not declared for {}", self.node_type),
                    ));
                }
                None => log::trace!("Passing undeclared prop `{}` for {} through", key, self.node_type),
            }
        }
        Ok(())
    }
}
