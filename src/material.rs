use glam::Vec4;

use crate::texture::TextureId;

/// Surface description for a drawable body
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Material {
    /// Flat RGBA color
    Color(Vec4),
    /// Sampled texture; `placeholder` is the single opaque pixel bound until
    /// the image finishes loading
    Texture { texture: TextureId, placeholder: [u8; 4] },
}

impl Material {
    /// Base color handed to the shader. Textured materials are modulated by white.
    pub fn base_color(&self) -> Vec4 {
        match self {
            Material::Color(color) => *color,
            Material::Texture { .. } => Vec4::ONE,
        }
    }

    pub fn texture(&self) -> Option<TextureId> {
        match self {
            Material::Color(_) => None,
            Material::Texture { texture, .. } => Some(*texture),
        }
    }
}

/// Convert a linear color to an opaque 8-bit pixel, clamping overbright channels
pub fn color_to_pixel(color: Vec4) -> [u8; 4] {
    let c = color.clamp(Vec4::ZERO, Vec4::ONE) * 255.0;
    [c.x.round() as u8, c.y.round() as u8, c.z.round() as u8, 255]
}

/// Per-node draw metadata. Geometry is shared by every body, so the record
/// only carries what differs between them.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    pub material: Material,
}

impl DrawRecord {
    pub fn color(color: Vec4) -> Self {
        Self { material: Material::Color(color) }
    }

    pub fn textured(texture: TextureId, placeholder: Vec4) -> Self {
        Self {
            material: Material::Texture {
                texture,
                placeholder: color_to_pixel(placeholder),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overbright_color_is_clamped() {
        // The sun is authored overbright
        assert_eq!(color_to_pixel(Vec4::new(6.0, 5.0, 0.0, 1.0)), [255, 255, 0, 255]);
        assert_eq!(color_to_pixel(Vec4::new(0.2, 0.5, 0.8, 0.3)), [51, 128, 204, 255]);
    }

    #[test]
    fn test_textured_material_uses_white_base() {
        let record = DrawRecord::textured(TextureId(3), Vec4::new(0.2, 0.5, 0.8, 1.0));
        assert_eq!(record.material.base_color(), Vec4::ONE);
        assert_eq!(record.material.texture(), Some(TextureId(3)));
    }
}
