/// Frame loop scenarios driven through an in-memory backend

use std::time::Duration;

use glam::{Mat4, Vec3};
use orrery::animation::MotionMode;
use orrery::camera_rig::{ABOVE_CAMERA, FOLLOW_CAMERA};
use orrery::frame::FrameState;
use orrery::material::Material;
use orrery::solar_system::{orbit_name, BODIES};
use orrery::{
    AppConfig, CameraSelection, FrameContext, FrameLoop, FramePacket, RenderBackend, Submission, Viewport,
};

/// Backend that records packets instead of drawing them
struct RecordingBackend {
    viewport: Viewport,
    packets: Vec<FramePacket>,
    /// Report every submission as skipped, like a minimized window
    skipping: bool,
}

impl RecordingBackend {
    fn new(width: u32, height: u32) -> Self {
        Self {
            viewport: Viewport::new(width, height),
            packets: Vec::new(),
            skipping: false,
        }
    }
}

impl RenderBackend for RecordingBackend {
    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn submit(&mut self, packet: &FramePacket) -> anyhow::Result<Submission> {
        self.packets.push(packet.clone());
        if self.skipping {
            Ok(Submission::Skipped)
        } else {
            Ok(Submission::Drawn)
        }
    }
}

fn context_with(mode: MotionMode) -> FrameContext {
    let mut config = AppConfig::default();
    config.animation.mode = mode;
    FrameContext::new(&config, Viewport::new(1280, 720)).unwrap()
}

#[test]
fn test_first_tick_draws_every_body() {
    let mut context = context_with(MotionMode::PerTick);
    let mut backend = RecordingBackend::new(1280, 720);
    let mut frame_loop = FrameLoop::new();

    assert_eq!(frame_loop.state(), FrameState::Uninitialized);
    frame_loop.tick(&mut context, &mut backend, 0.0).unwrap();
    assert_eq!(frame_loop.state(), FrameState::Running);

    let packet = &backend.packets[0];
    let names: Vec<&str> = packet.draws.iter().map(|d| d.name.as_str()).collect();
    let expected: Vec<&str> = BODIES.iter().map(|b| b.name).collect();
    assert_eq!(names, expected);
}

#[test]
fn test_root_holds_sun_and_planet_orbits() {
    let context = context_with(MotionMode::PerTick);
    let system = &context.system;
    let children = system.graph.children(system.root);

    assert_eq!(children.len(), 9);
    assert_eq!(children[0], system.sun);
    assert_eq!(system.graph.roots(), vec![system.root]);
}

#[test]
fn test_zero_elapsed_time_holds_time_scaled_motion() {
    let mut context = context_with(MotionMode::TimeScaled);
    let mut backend = RecordingBackend::new(800, 600);
    let mut frame_loop = FrameLoop::new();

    // Move Earth's pivot without refreshing world matrices; only the tick does that
    let earth_orbit = context.system.graph.find(&orbit_name("Earth")).unwrap();
    context
        .system
        .graph
        .set_local(earth_orbit, Mat4::from_translation(Vec3::new(100.0, 0.0, 0.0)));

    let graph = &context.system.graph;
    let orbit_locals: Vec<_> = context.system.orbits.iter().map(|&n| graph.local(n)).collect();
    let body_locals: Vec<_> = context.system.bodies.iter().map(|&n| graph.local(n)).collect();
    let stale = context.system.body_position("Earth").unwrap();
    assert!(stale.abs_diff_eq(Vec3::new(350.0, 0.0, 0.0), 1e-3));

    // First tick has no elapsed time
    let dt = frame_loop.tick(&mut context, &mut backend, 5.0).unwrap();
    assert_eq!(dt, 0.0);

    let graph = &context.system.graph;
    for (&node, local) in context.system.orbits.iter().zip(&orbit_locals) {
        assert_eq!(graph.local(node), *local);
    }
    for (&node, local) in context.system.bodies.iter().zip(&body_locals) {
        assert_eq!(graph.local(node), *local);
    }

    let earth = context.system.body_position("Earth").unwrap();
    assert!(earth.abs_diff_eq(Vec3::new(100.0, 0.0, 0.0), 1e-3), "earth at {:?}", earth);
    let moon = context.system.body_position("Moon").unwrap();
    assert!(moon.abs_diff_eq(Vec3::new(130.0, 0.0, 0.0), 1e-3), "moon at {:?}", moon);
}

#[test]
fn test_per_tick_motion_ignores_elapsed_time() {
    let mut context = context_with(MotionMode::PerTick);
    let mut backend = RecordingBackend::new(800, 600);
    let mut frame_loop = FrameLoop::new();

    frame_loop.tick(&mut context, &mut backend, 0.0).unwrap();
    frame_loop.tick(&mut context, &mut backend, 10.0).unwrap();

    // Two ticks of 0.01 rad around the sun
    let earth = context.system.body_position("Earth").unwrap();
    let angle = 0.02f32;
    let expected = Vec3::new(350.0 * angle.cos(), 0.0, -350.0 * angle.sin());
    assert!(earth.abs_diff_eq(expected, 1e-2), "earth at {:?}", earth);
}

#[test]
fn test_switching_to_follow_camera_tracks_body() {
    let mut context = context_with(MotionMode::PerTick);
    let mut backend = RecordingBackend::new(1280, 720);
    let mut frame_loop = FrameLoop::new();

    context.select_camera(CameraSelection::Above);
    frame_loop.tick(&mut context, &mut backend, 0.0).unwrap();
    assert_eq!(context.cameras.active_index(), ABOVE_CAMERA);
    assert_eq!(context.cameras.tracked(), None);

    context.select_camera(CameraSelection::Earth);
    frame_loop.tick(&mut context, &mut backend, 0.016).unwrap();
    assert_eq!(context.cameras.active_index(), FOLLOW_CAMERA);
    assert_eq!(context.cameras.tracked(), Some("Earth"));

    let earth = context.system.body_position("Earth").unwrap();
    let packet = backend.packets.last().unwrap();
    assert!(packet.camera_position.abs_diff_eq(earth + Vec3::new(0.0, 30.0, 80.0), 1e-3));
}

#[test]
fn test_resize_refreshes_aspect() {
    let mut context = context_with(MotionMode::PerTick);
    let mut backend = RecordingBackend::new(1000, 1000);
    let mut frame_loop = FrameLoop::new();

    frame_loop.tick(&mut context, &mut backend, 0.0).unwrap();
    let square = backend.packets[0].view_projection;

    backend.viewport = Viewport::new(2000, 1000);
    frame_loop.tick(&mut context, &mut backend, 0.0).unwrap();
    let wide = backend.packets[1].view_projection;

    assert!((square.x_axis.x - wide.x_axis.x * 2.0).abs() < 1e-4);
    assert_eq!(frame_loop.frame_index(), 2);
}

#[test]
fn test_draw_uniforms_follow_world_and_active_camera() {
    let mut context = context_with(MotionMode::TimeScaled);
    let mut backend = RecordingBackend::new(1280, 720);
    let mut frame_loop = FrameLoop::new();

    context.select_camera(CameraSelection::Venus);
    frame_loop.tick(&mut context, &mut backend, 1.0).unwrap();
    frame_loop.tick(&mut context, &mut backend, 1.5).unwrap();

    let packet = backend.packets.last().unwrap();
    assert_eq!(packet.view_projection, context.cameras.active().view_projection_matrix());
    assert_eq!(packet.draws.len(), context.system.bodies.len());

    for (draw, &node) in packet.draws.iter().zip(&context.system.bodies) {
        let world = context.system.graph.world_matrix(node);
        let uniforms = &draw.uniforms;

        assert_eq!(uniforms.world, world, "{}", draw.name);
        assert!(uniforms
            .world_view_projection
            .abs_diff_eq(packet.view_projection * world, 1e-3));
        assert!(uniforms
            .world_inverse_transpose
            .abs_diff_eq(world.inverse().transpose(), 1e-4));
    }
}

#[test]
fn test_skipped_frame_resends_loaded_textures() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("earth.png");
    image::RgbaImage::from_pixel(4, 2, image::Rgba([0, 90, 200, 255]))
        .save(&path)
        .unwrap();

    let mut config = AppConfig::default();
    config
        .textures
        .insert("Earth".to_string(), path.to_string_lossy().into_owned());
    let mut context = FrameContext::new(&config, Viewport::new(800, 600)).unwrap();
    let mut backend = RecordingBackend::new(800, 600);
    let mut frame_loop = FrameLoop::new();
    backend.skipping = true;

    let earth = context.system.body("Earth").unwrap();
    let texture = match context.system.graph.draw_record(earth).unwrap().material {
        Material::Texture { texture, .. } => texture,
        other => panic!("expected a textured material, got {:?}", other),
    };

    let mut now = 0.0;
    for _ in 0..500 {
        frame_loop.tick(&mut context, &mut backend, now).unwrap();
        now += 0.01;
        if !backend.packets.last().unwrap().textures.is_empty() {
            break;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    let first = backend.packets.last().unwrap();
    assert_eq!(first.textures.len(), 1, "texture never finished loading");
    assert_eq!(first.textures[0].id, texture);
    assert_eq!(context.textures.pending(), 0);

    // Still minimized: the image goes out again
    frame_loop.tick(&mut context, &mut backend, now).unwrap();
    assert_eq!(backend.packets.last().unwrap().textures.len(), 1);

    // Restored: delivered once more, then taken
    backend.skipping = false;
    frame_loop.tick(&mut context, &mut backend, now + 0.01).unwrap();
    let delivered = &backend.packets.last().unwrap().textures;
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].id, texture);
    assert_eq!((delivered[0].width, delivered[0].height), (4, 2));

    frame_loop.tick(&mut context, &mut backend, now + 0.02).unwrap();
    assert!(backend.packets.last().unwrap().textures.is_empty());
}

#[test]
fn test_elapsed_time_stays_precise_after_long_uptime() {
    let mut context = context_with(MotionMode::TimeScaled);
    let mut backend = RecordingBackend::new(800, 600);
    let mut frame_loop = FrameLoop::new();

    // Three days in
    let start = 3.0 * 24.0 * 3600.0;
    frame_loop.tick(&mut context, &mut backend, start).unwrap();
    let dt = frame_loop.tick(&mut context, &mut backend, start + 0.004).unwrap();

    assert!((dt - 0.004).abs() < 1e-6, "dt was {}", dt);
}
