use glam::{Vec3, Vec4};

/// Number of lights the body shader consumes
pub const MAX_LIGHTS: usize = 7;

/// Spot-style light: lit where the surface-to-light direction is within the
/// cutoff cone around `-direction`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub position: Vec3,
    pub direction: Vec3,
    /// Cosine of the cutoff angle
    pub limit: f32,
}

impl Light {
    pub fn new(position: Vec3, direction: Vec3, cutoff_degrees: f32) -> Self {
        Self {
            position,
            direction,
            limit: cutoff_degrees.to_radians().cos(),
        }
    }
}

/// Light arrays laid out for a std140 uniform block
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightUniforms {
    /// xyz = world position
    pub positions: [Vec4; MAX_LIGHTS],
    /// xyz = direction, w = cutoff cosine
    pub directions: [Vec4; MAX_LIGHTS],
}

/// Fixed set of lights surrounding the sun
#[derive(Debug, Clone)]
pub struct LightRig {
    lights: [Light; MAX_LIGHTS],
}

impl LightRig {
    /// Point light at the origin plus six lights around the sun aimed back at it
    pub fn sun_rig() -> Self {
        Self {
            lights: [
                Light::new(Vec3::ZERO, Vec3::ZERO, 180.0),
                Light::new(Vec3::new(150.0, 0.0, 0.0), Vec3::new(-10.0, 0.0, 0.0), 90.0),
                Light::new(Vec3::new(-150.0, 0.0, 0.0), Vec3::new(10.0, 0.0, 0.0), 90.0),
                Light::new(Vec3::new(0.0, 150.0, 0.0), Vec3::new(0.0, -10.0, 0.0), 90.0),
                Light::new(Vec3::new(0.0, -150.0, 0.0), Vec3::new(0.0, 10.0, 0.0), 90.0),
                Light::new(Vec3::new(0.0, 0.0, -150.0), Vec3::new(0.0, 0.0, 10.0), 90.0),
                Light::new(Vec3::new(0.0, 0.0, 150.0), Vec3::new(0.0, 0.0, -10.0), 90.0),
            ],
        }
    }

    pub fn lights(&self) -> &[Light; MAX_LIGHTS] {
        &self.lights
    }

    pub fn uniforms(&self) -> LightUniforms {
        let mut uniforms = LightUniforms {
            positions: [Vec4::ZERO; MAX_LIGHTS],
            directions: [Vec4::ZERO; MAX_LIGHTS],
        };
        for (i, light) in self.lights.iter().enumerate() {
            uniforms.positions[i] = light.position.extend(1.0);
            uniforms.directions[i] = light.direction.extend(light.limit);
        }
        uniforms
    }
}

impl Default for LightRig {
    fn default() -> Self {
        Self::sun_rig()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rig_cutoffs() {
        let rig = LightRig::sun_rig();
        let lights = rig.lights();
        assert!((lights[0].limit + 1.0).abs() < 1e-6);
        for light in &lights[1..] {
            assert!(light.limit.abs() < 1e-6);
            // Every sun light points back toward the origin
            assert!(light.direction.dot(light.position) < 0.0);
        }
    }

    #[test]
    fn test_uniforms_pack_limit_in_w() {
        let uniforms = LightRig::sun_rig().uniforms();
        assert_eq!(uniforms.positions[1], Vec4::new(150.0, 0.0, 0.0, 1.0));
        assert_eq!(uniforms.directions[1].truncate(), Vec3::new(-10.0, 0.0, 0.0));
        assert!((uniforms.directions[0].w + 1.0).abs() < 1e-6);
        assert_eq!(std::mem::size_of::<LightUniforms>(), 2 * MAX_LIGHTS * 16);
    }

    #[test]
    fn test_uniforms_are_stable() {
        let rig = LightRig::sun_rig();
        assert_eq!(rig.uniforms(), rig.uniforms());
    }
}
