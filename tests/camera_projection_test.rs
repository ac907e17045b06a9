/// Camera matrices against a straightforward look-at construction

use glam::{Mat4, Vec3, Vec4};
use orrery::core::camera::{look_at, Camera};

/// Project a world point to normalized device coordinates
fn to_ndc(view_projection: Mat4, point: Vec3) -> Vec3 {
    let clip = view_projection * Vec4::new(point.x, point.y, point.z, 1.0);
    clip.truncate() / clip.w
}

fn placed(position: Vec3, target: Vec3, up: Vec3, aspect: f32) -> Camera {
    let mut camera = Camera::new();
    camera.set_attributes(position, target, up, aspect, 60.0);
    camera.set_matrix();
    camera
}

#[test]
fn test_view_projection_matches_composition() {
    let placements = [
        (Vec3::new(0.0, 400.0, 1000.0), Vec3::ZERO, Vec3::Y),
        (Vec3::new(0.0, 700.0, 0.0), Vec3::ZERO, Vec3::Z),
        (Vec3::new(350.0, 30.0, 80.0), Vec3::new(350.0, 0.0, 0.0), Vec3::Y),
    ];

    for (position, target, up) in placements {
        let camera = placed(position, target, up, 16.0 / 9.0);
        let mut projection = Mat4::perspective_rh(60f32.to_radians(), 16.0 / 9.0, 1.0, 2000.0);
        projection.y_axis.y *= -1.0;
        let expected = projection * look_at(position, target, up).inverse();

        assert!(camera.view_projection_matrix().abs_diff_eq(expected, 1e-4));
        assert!(camera
            .view_matrix()
            .abs_diff_eq(Mat4::look_at_rh(position, target, up), 1e-2));
    }
}

#[test]
fn test_target_lands_at_screen_center() {
    let camera = placed(Vec3::new(0.0, 400.0, 1000.0), Vec3::ZERO, Vec3::Y, 1.5);
    let ndc = to_ndc(camera.view_projection_matrix(), Vec3::ZERO);

    assert!(ndc.x.abs() < 1e-4);
    assert!(ndc.y.abs() < 1e-4);
    assert!(ndc.z > 0.0 && ndc.z < 1.0, "target inside depth range, got {}", ndc.z);
}

#[test]
fn test_above_camera_orientation() {
    // Looking down with +Z as up: +Z is screen top (negative NDC Y after the flip)
    let camera = placed(Vec3::new(0.0, 700.0, 0.0), Vec3::ZERO, Vec3::Z, 1.0);
    let ndc = to_ndc(camera.view_projection_matrix(), Vec3::new(0.0, 0.0, 100.0));

    assert!(ndc.y < 0.0, "expected upper half, got {}", ndc.y);
    assert!(ndc.x.abs() < 1e-4);
}

#[test]
fn test_aspect_change_needs_set_matrix() {
    let mut camera = placed(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO, Vec3::Y, 1.0);
    let before = camera.projection_matrix();

    camera.set_attributes(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO, Vec3::Y, 2.0, 60.0);
    assert_eq!(camera.projection_matrix(), before);

    camera.set_matrix();
    assert!((camera.projection_matrix().x_axis.x * 2.0 - before.x_axis.x).abs() < 1e-5);
}
