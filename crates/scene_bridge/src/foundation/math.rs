//! Math utilities and types
//!
//! Camera and world-origin values travel to the engine as plain `[f32; 3]`
//! arrays; the host-facing API uses nalgebra vectors.

pub use nalgebra::Vector3;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// Convert a vector into the engine wire layout
pub fn to_wire(v: &Vec3) -> [f32; 3] {
    [v.x, v.y, v.z]
}

/// Convert an engine wire array into a vector
pub fn from_wire(raw: [f32; 3]) -> Vec3 {
    Vec3::new(raw[0], raw[1], raw[2])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_wire_round_trip_keeps_components() {
        let v = Vec3::new(1.5, -2.0, 0.25);
        assert_eq!(from_wire(to_wire(&v)), v);
    }

    #[test]
    fn test_reply_payload_decodes_to_vector() {
        let raw: [f32; 3] = serde_json::from_str("[0.1, 2, -3.5]").unwrap();
        let v = from_wire(raw);
        assert_relative_eq!(v.x, 0.1);
        assert_relative_eq!(v.y, 2.0);
        assert_relative_eq!(v.z, -3.5);

        assert!(serde_json::from_str::<[f32; 3]>("[1, 2]").is_err());
    }
}
