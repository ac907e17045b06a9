/// Per-tick scene update and draw packet assembly
///
/// `FrameContext` owns everything the tick touches. `FrameLoop::tick` runs
/// the fixed update order and hands the resulting `FramePacket` to a
/// `RenderBackend`, which is the only part that talks to the GPU.
use glam::{Mat4, Vec4};

use crate::animation::Animator;
use crate::camera_rig::{CameraRig, CameraSelection};
use crate::config::AppConfig;
use crate::core::lighting::{LightRig, LightUniforms};
use crate::material::Material;
use crate::solar_system::SolarSystem;
use crate::texture::{LoadedTexture, TextureLoader};

/// Drawable surface size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width over height; a collapsed viewport reports 1
    pub fn aspect(&self) -> f32 {
        if self.width == 0 || self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

/// Per-object uniform block, std140 compatible
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ObjectUniforms {
    pub world: Mat4,
    pub world_view_projection: Mat4,
    pub world_inverse_transpose: Mat4,
    pub color: Vec4,
}

impl ObjectUniforms {
    pub fn new(world: Mat4, view_projection: Mat4, color: Vec4) -> Self {
        Self {
            world,
            world_view_projection: view_projection * world,
            world_inverse_transpose: world.inverse().transpose(),
            color,
        }
    }
}

/// One sphere draw
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub name: String,
    pub uniforms: ObjectUniforms,
    pub material: Material,
}

/// Everything the backend needs to render one frame
#[derive(Debug, Clone)]
pub struct FramePacket {
    pub frame_index: u64,
    pub camera_position: glam::Vec3,
    pub view_projection: Mat4,
    pub lights: LightUniforms,
    pub draws: Vec<DrawCall>,
    /// Images decoded since the previous frame
    pub textures: Vec<LoadedTexture>,
}

/// What the backend did with a submitted packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Drawn,
    /// No frame was recorded (e.g. minimized window). The packet's textures
    /// were not taken and go out again with the next packet.
    Skipped,
}

/// GPU-facing half of the frame loop
pub trait RenderBackend {
    /// Current drawable size
    fn viewport(&self) -> Viewport;

    /// Record and present one frame
    fn submit(&mut self, packet: &FramePacket) -> anyhow::Result<Submission>;
}

/// Scene state carried between ticks
pub struct FrameContext {
    pub system: SolarSystem,
    pub cameras: CameraRig,
    pub lights: LightRig,
    pub animator: Animator,
    pub textures: TextureLoader,
}

impl FrameContext {
    pub fn new(config: &AppConfig, viewport: Viewport) -> anyhow::Result<Self> {
        let mut textures = TextureLoader::new();
        let system = SolarSystem::build(config, &mut textures)?;
        let cameras = CameraRig::new(&config.cameras, viewport.aspect());

        Ok(Self {
            system,
            cameras,
            lights: LightRig::sun_rig(),
            animator: Animator::new(&config.animation),
            textures,
        })
    }

    pub fn select_camera(&mut self, selection: CameraSelection) {
        self.cameras.select(selection);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    Uninitialized,
    Running,
}

/// Drives the per-tick update order
pub struct FrameLoop {
    state: FrameState,
    frame_index: u64,
    last_time: Option<f64>,
    /// Decoded images the backend has not taken yet
    pending_textures: Vec<LoadedTexture>,
}

impl FrameLoop {
    pub fn new() -> Self {
        Self {
            state: FrameState::Uninitialized,
            frame_index: 0,
            last_time: None,
            pending_textures: Vec::new(),
        }
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Run one tick at time `now` (seconds since start). Returns the elapsed
    /// time since the previous tick.
    pub fn tick(
        &mut self,
        context: &mut FrameContext,
        backend: &mut dyn RenderBackend,
        now: f64,
    ) -> anyhow::Result<f32> {
        let dt = match self.last_time {
            Some(last) => (now - last).max(0.0) as f32,
            None => 0.0,
        };
        self.last_time = Some(now);

        let mut packet = self.update(context, backend.viewport(), dt);
        if !self.pending_textures.is_empty() {
            let mut textures = std::mem::take(&mut self.pending_textures);
            textures.append(&mut packet.textures);
            packet.textures = textures;
        }

        match backend.submit(&packet)? {
            Submission::Drawn => {}
            Submission::Skipped => {
                if !packet.textures.is_empty() {
                    tracing::debug!("Frame skipped, holding {} textures", packet.textures.len());
                }
                self.pending_textures = packet.textures;
            }
        }

        if self.state == FrameState::Uninitialized {
            tracing::info!("Frame loop running");
            self.state = FrameState::Running;
        }
        self.frame_index += 1;

        Ok(dt)
    }

    /// Advance the scene by `dt` and build the draw packet without submitting it
    pub fn update(&self, context: &mut FrameContext, viewport: Viewport, dt: f32) -> FramePacket {
        let completed = context.textures.poll();

        context.cameras.set_aspect(viewport.aspect());

        let system = &mut context.system;
        context
            .animator
            .advance(&mut system.graph, &system.orbits, &system.bodies, dt);

        system.graph.update_world_matrices(system.root);

        context.cameras.update(&system.graph);
        let camera = context.cameras.active();
        let view_projection = camera.view_projection_matrix();

        let lights = context.lights.uniforms();

        let draws = system
            .bodies
            .iter()
            .filter_map(|&node| {
                let record = system.graph.draw_record(node)?;
                let world = system.graph.world_matrix(node);
                Some(DrawCall {
                    name: system.graph.name(node).unwrap_or_default(),
                    uniforms: ObjectUniforms::new(world, view_projection, record.material.base_color()),
                    material: record.material,
                })
            })
            .collect();

        FramePacket {
            frame_index: self.frame_index,
            camera_position: camera.position,
            view_projection,
            lights,
            draws,
            textures: completed,
        }
    }
}

impl Default for FrameLoop {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewport_aspect() {
        assert_eq!(Viewport::new(1600, 800).aspect(), 2.0);
        assert_eq!(Viewport::new(0, 800).aspect(), 1.0);
    }

    #[test]
    fn test_object_uniforms_layout() {
        assert_eq!(std::mem::size_of::<ObjectUniforms>(), 3 * 64 + 16);
        let world = Mat4::from_scale(glam::Vec3::splat(2.0));
        let uniforms = ObjectUniforms::new(world, Mat4::IDENTITY, Vec4::ONE);
        assert_eq!(uniforms.world_view_projection, world);
        assert!(uniforms
            .world_inverse_transpose
            .abs_diff_eq(Mat4::from_scale(glam::Vec3::splat(0.5)), 1e-6));
    }

    #[test]
    fn test_update_keeps_draw_order() {
        let config = AppConfig::default();
        let mut context = FrameContext::new(&config, Viewport::new(800, 600)).unwrap();
        let packet = FrameLoop::new().update(&mut context, Viewport::new(800, 600), 0.0);
        let names: Vec<&str> = packet.draws.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names[0], "Sun");
        assert_eq!(names[4], "Moon");
        assert_eq!(names.len(), 10);
    }
}
