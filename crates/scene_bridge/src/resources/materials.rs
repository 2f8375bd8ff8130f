//! Material definitions

use crate::error::{BridgeError, BridgeResult};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Shading model applied by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LightingModel {
    /// Unlit, flat color
    Constant,
    /// Diffuse only
    Lambert,
    /// Blinn-Phong specular
    Blinn,
    /// Phong specular
    Phong,
    /// Physically based
    Physical,
}

/// Texture coordinate wrapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WrapMode {
    /// Clamp to edge
    Clamp,
    /// Tile
    Repeat,
    /// Tile mirrored
    Mirror,
}

/// Named material as registered with the engine
///
/// Every field is optional; unset fields fall back to the engine default.
/// Texture sources stay opaque (`{"uri": ...}` or a bundled asset number).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MaterialDefinition {
    /// Base color, e.g. `"#ff0000"`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diffuse_color: Option<String>,
    /// Base color texture
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diffuse_texture: Option<Value>,
    /// PBR roughness, `0.0..=1.0`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roughness: Option<f32>,
    /// PBR metalness, `0.0..=1.0`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metalness: Option<f32>,
    /// Roughness texture
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roughness_map: Option<Value>,
    /// Metalness texture
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metalness_map: Option<Value>,
    /// Normal map
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normal_map: Option<Value>,
    /// Shading model
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lighting_model: Option<LightingModel>,
    /// Specular exponent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shininess: Option<f32>,
    /// Fresnel falloff exponent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fresnel_exponent: Option<f32>,
    /// Opacity multiplier, `0.0..=1.0`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transparency: Option<f32>,
    /// Horizontal wrap mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wrap_s: Option<WrapMode>,
    /// Vertical wrap mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wrap_t: Option<WrapMode>,
    /// Custom shader name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shader: Option<String>,
    /// Uniforms for the custom shader
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shader_params: Option<IndexMap<String, Value>>,
}

impl MaterialDefinition {
    /// Decode a definition from host JSON
    pub fn from_json(name: &str, value: Value) -> BridgeResult<Self> {
        let definition: Self = serde_json::from_value(value)
            .map_err(|e| BridgeError::validation(format!("material {name}"), e.to_string()))?;
        definition.validate(name)?;
        Ok(definition)
    }

    /// Check scalar ranges
    pub fn validate(&self, name: &str) -> BridgeResult<()> {
        let unit_range = [
            ("roughness", self.roughness),
            ("metalness", self.metalness),
            ("transparency", self.transparency),
        ];
        for (field, value) in unit_range {
            if let Some(v) = value {
                if !(0.0..=1.0).contains(&v) {
                    return Err(BridgeError::validation(
                        format!("material {name}"),
                        format!("{field} must be within 0..=1, got {v}"),
                    ));
                }
            }
        }
        if let Some(shininess) = self.shininess {
            if shininess < 0.0 || !shininess.is_finite() {
                return Err(BridgeError::validation(
                    format!("material {name}"),
                    format!("shininess must be a non-negative number, got {shininess}"),
                ));
            }
        }
        Ok(())
    }

    /// Overlay every field set in `update`
    ///
    /// Shader params merge per key.
    pub fn merge(&mut self, update: &Self) {
        macro_rules! overlay {
            ($($field:ident),+) => {
                $(if update.$field.is_some() {
                    self.$field = update.$field.clone();
                })+
            };
        }
        overlay!(
            diffuse_color,
            diffuse_texture,
            roughness,
            metalness,
            roughness_map,
            metalness_map,
            normal_map,
            lighting_model,
            shininess,
            fresnel_exponent,
            transparency,
            wrap_s,
            wrap_t,
            shader
        );

        if let Some(params) = &update.shader_params {
            let merged = self.shader_params.get_or_insert_with(IndexMap::new);
            for (key, value) in params {
                merged.insert(key.clone(), value.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_camel_case_fields() {
        let definition = MaterialDefinition::from_json(
            "red",
            json!({"diffuseColor": "#ff0000", "lightingModel": "Physical", "wrapS": "Mirror"}),
        )
        .unwrap();

        assert_eq!(definition.diffuse_color.as_deref(), Some("#ff0000"));
        assert_eq!(definition.lighting_model, Some(LightingModel::Physical));
        assert_eq!(definition.wrap_s, Some(WrapMode::Mirror));
        assert_eq!(definition.wrap_t, None);
    }

    #[test]
    fn test_rejects_unknown_field_and_bad_range() {
        assert!(matches!(
            MaterialDefinition::from_json("m", json!({"glow": 1})),
            Err(BridgeError::Validation { .. })
        ));
        assert!(matches!(
            MaterialDefinition::from_json("m", json!({"roughness": 1.5})),
            Err(BridgeError::Validation { .. })
        ));
    }

    #[test]
    fn test_merge_overlays_set_fields_only() {
        let mut base = MaterialDefinition::from_json(
            "m",
            json!({"diffuseColor": "#fff", "roughness": 0.2, "shaderParams": {"a": 1}}),
        )
        .unwrap();
        let update = MaterialDefinition::from_json(
            "m",
            json!({"roughness": 0.8, "shaderParams": {"b": 2}}),
        )
        .unwrap();

        base.merge(&update);

        assert_eq!(base.diffuse_color.as_deref(), Some("#fff"));
        assert_eq!(base.roughness, Some(0.8));
        let params = base.shader_params.unwrap();
        assert_eq!(params.get("a"), Some(&json!(1)));
        assert_eq!(params.get("b"), Some(&json!(2)));
    }

    #[test]
    fn test_serializes_without_unset_fields() {
        let definition = MaterialDefinition {
            metalness: Some(0.5),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&definition).unwrap(), json!({"metalness": 0.5}));
    }
}
