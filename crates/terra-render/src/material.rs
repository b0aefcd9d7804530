//! Surface descriptions consumed by render backends.
//!
//! Colors are sRGB-encoded; backends linearize them.

use glam::Vec3;

use crate::backend::TextureId;

/// Which faces are rasterized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Side {
    #[default]
    Front,
    Back,
    Double,
}

/// Color target blending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Blending {
    /// Standard alpha blending (opaque when the material is not transparent).
    #[default]
    Normal,
    /// Source scaled by alpha and added to the destination.
    Additive,
}

/// Lit material with optional color, normal, bump and emissive maps.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardMaterial {
    pub color: Vec3,
    pub map: Option<TextureId>,
    pub normal_map: Option<TextureId>,
    pub normal_scale: f32,
    pub bump_map: Option<TextureId>,
    pub bump_scale: f32,
    pub emissive: Vec3,
    pub emissive_map: Option<TextureId>,
    pub emissive_intensity: f32,
    pub roughness: f32,
    pub metalness: f32,
    pub opacity: f32,
    pub transparent: bool,
    pub depth_write: bool,
    pub side: Side,
}

impl Default for StandardMaterial {
    fn default() -> Self {
        Self {
            color: Vec3::ONE,
            map: None,
            normal_map: None,
            normal_scale: 1.0,
            bump_map: None,
            bump_scale: 1.0,
            emissive: Vec3::ZERO,
            emissive_map: None,
            emissive_intensity: 1.0,
            roughness: 1.0,
            metalness: 0.0,
            opacity: 1.0,
            transparent: false,
            depth_write: true,
            side: Side::Front,
        }
    }
}

/// Unlit material.
#[derive(Debug, Clone, PartialEq)]
pub struct BasicMaterial {
    pub color: Vec3,
    pub map: Option<TextureId>,
    pub opacity: f32,
    pub transparent: bool,
    pub depth_write: bool,
    pub side: Side,
    pub blending: Blending,
}

impl Default for BasicMaterial {
    fn default() -> Self {
        Self {
            color: Vec3::ONE,
            map: None,
            opacity: 1.0,
            transparent: false,
            depth_write: true,
            side: Side::Front,
            blending: Blending::Normal,
        }
    }
}

/// Fresnel rim glow rendered on the back faces of a slightly larger shell.
#[derive(Debug, Clone, PartialEq)]
pub struct AtmosphereMaterial {
    pub rayleigh_color: Vec3,
    pub mie_color: Vec3,
    pub fresnel_power: f32,
    pub rayleigh_intensity: f32,
    pub mie_intensity: f32,
    pub scattering_strength: f32,
}

/// Per-field uniforms of the star point shader.
#[derive(Debug, Clone, PartialEq)]
pub struct StarMaterial {
    /// Morph progress in `[0, 1]` from origin to target positions.
    pub transition: f32,
    /// Seconds, drives the twinkle.
    pub time: f32,
    pub twinkle_speed: f32,
    /// Point size numerator; on-screen size is `size * attenuation / depth`.
    pub size_attenuation: f32,
}

impl Default for StarMaterial {
    fn default() -> Self {
        Self {
            transition: 0.0,
            time: 0.0,
            twinkle_speed: 0.2,
            size_attenuation: 300.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Material {
    Standard(StandardMaterial),
    Basic(BasicMaterial),
    Atmosphere(AtmosphereMaterial),
    Stars(StarMaterial),
}

impl Material {
    /// Textures referenced by this material.
    pub fn textures(&self) -> Vec<TextureId> {
        match self {
            Material::Standard(m) => [m.map, m.normal_map, m.bump_map, m.emissive_map]
                .into_iter()
                .flatten()
                .collect(),
            Material::Basic(m) => m.map.into_iter().collect(),
            Material::Atmosphere(_) | Material::Stars(_) => Vec::new(),
        }
    }

    pub fn is_transparent(&self) -> bool {
        match self {
            Material::Standard(m) => m.transparent,
            Material::Basic(m) => m.transparent,
            Material::Atmosphere(_) | Material::Stars(_) => true,
        }
    }

    /// A transparent material with zero opacity contributes nothing.
    pub fn is_invisible(&self) -> bool {
        match self {
            Material::Standard(m) => m.transparent && m.opacity <= 0.0,
            Material::Basic(m) => m.transparent && m.opacity <= 0.0,
            Material::Atmosphere(_) | Material::Stars(_) => false,
        }
    }

    pub fn blending(&self) -> Blending {
        match self {
            Material::Basic(m) => m.blending,
            Material::Standard(_) => Blending::Normal,
            Material::Atmosphere(_) | Material::Stars(_) => Blending::Additive,
        }
    }

    pub fn side(&self) -> Side {
        match self {
            Material::Standard(m) => m.side,
            Material::Basic(m) => m.side,
            Material::Atmosphere(_) => Side::Back,
            Material::Stars(_) => Side::Double,
        }
    }

    pub fn depth_write(&self) -> bool {
        match self {
            Material::Standard(m) => m.depth_write,
            Material::Basic(m) => m.depth_write,
            Material::Atmosphere(_) | Material::Stars(_) => false,
        }
    }

    pub fn as_standard(&self) -> Option<&StandardMaterial> {
        match self {
            Material::Standard(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_standard_mut(&mut self) -> Option<&mut StandardMaterial> {
        match self {
            Material::Standard(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_basic_mut(&mut self) -> Option<&mut BasicMaterial> {
        match self {
            Material::Basic(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_stars(&self) -> Option<&StarMaterial> {
        match self {
            Material::Stars(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_stars_mut(&mut self) -> Option<&mut StarMaterial> {
        match self {
            Material::Stars(m) => Some(m),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_textures_listed() {
        let m = Material::Standard(StandardMaterial {
            map: Some(TextureId::from_raw(1)),
            bump_map: Some(TextureId::from_raw(3)),
            ..Default::default()
        });
        assert_eq!(m.textures(), vec![TextureId::from_raw(1), TextureId::from_raw(3)]);
    }

    #[test]
    fn test_zero_opacity_transparent_is_invisible() {
        let mut basic = BasicMaterial {
            transparent: true,
            opacity: 0.0,
            ..Default::default()
        };
        assert!(Material::Basic(basic.clone()).is_invisible());
        basic.transparent = false;
        assert!(!Material::Basic(basic).is_invisible());
    }

    #[test]
    fn test_atmosphere_is_additive_back_side() {
        let m = Material::Atmosphere(AtmosphereMaterial {
            rayleigh_color: Vec3::ONE,
            mie_color: Vec3::ONE,
            fresnel_power: 4.5,
            rayleigh_intensity: 0.08,
            mie_intensity: 0.04,
            scattering_strength: 0.18,
        });
        assert_eq!(m.blending(), Blending::Additive);
        assert_eq!(m.side(), Side::Back);
        assert!(!m.depth_write());
    }
}
