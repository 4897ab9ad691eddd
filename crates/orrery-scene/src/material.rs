//! Geometry and surface descriptions attached to mesh nodes.

use crate::assets::TextureHandle;
use glam::Vec3;

/// Procedural shape of a mesh. Tessellation happens in the renderer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Geometry {
    Sphere {
        radius: f32,
        width_segments: u32,
        height_segments: u32,
    },
    /// Icosahedron with each face subdivided `detail` times, projected onto
    /// the sphere of `radius`.
    Icosahedron { radius: f32, detail: u32 },
}

/// Which faces of a mesh are drawn.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Side {
    #[default]
    Front,
    /// Inside faces only; used for the star backdrop seen from within.
    Back,
    Double,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Material {
    /// Unlit colour, optionally modulated by a texture.
    Basic {
        color: Vec3,
        map: Option<TextureHandle>,
        side: Side,
        transparent: bool,
    },
    /// Ambient plus point-light shading with optional bump mapping.
    Phong {
        color: Vec3,
        map: Option<TextureHandle>,
        bump_map: Option<TextureHandle>,
        bump_scale: f32,
        shininess: f32,
        transparent: bool,
    },
}

impl Material {
    pub fn is_transparent(&self) -> bool {
        match self {
            Material::Basic { transparent, .. } | Material::Phong { transparent, .. } => {
                *transparent
            }
        }
    }

    pub fn color(&self) -> Vec3 {
        match self {
            Material::Basic { color, .. } | Material::Phong { color, .. } => *color,
        }
    }

    pub fn map(&self) -> Option<TextureHandle> {
        match self {
            Material::Basic { map, .. } | Material::Phong { map, .. } => *map,
        }
    }

    pub fn side(&self) -> Side {
        match self {
            Material::Basic { side, .. } => *side,
            Material::Phong { .. } => Side::Front,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MeshDesc {
    pub geometry: Geometry,
    pub material: Material,
}

/// Decode a `0xRRGGBB` sRGB colour into linear RGB.
pub fn hex_color(rgb: u32) -> Vec3 {
    let channel = |shift: u32| {
        let c = ((rgb >> shift) & 0xff) as f32 / 255.0;
        if c <= 0.04045 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    };
    Vec3::new(channel(16), channel(8), channel(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_color_extremes() {
        assert_eq!(hex_color(0x000000), Vec3::ZERO);
        assert!((hex_color(0xffffff) - Vec3::ONE).length() < 1e-6);
    }

    #[test]
    fn test_hex_color_orange_channels() {
        let orange = hex_color(0xFFA500);
        assert!((orange.x - 1.0).abs() < 1e-6);
        assert!(orange.y > 0.3 && orange.y < 0.4);
        assert_eq!(orange.z, 0.0);
    }

    #[test]
    fn test_phong_is_front_sided() {
        let m = Material::Phong {
            color: Vec3::ONE,
            map: None,
            bump_map: None,
            bump_scale: 0.0,
            shininess: 30.0,
            transparent: false,
        };
        assert_eq!(m.side(), Side::Front);
        assert!(!m.is_transparent());
    }
}
