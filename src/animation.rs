use glam::Mat4;
use serde::{Deserialize, Serialize};

use crate::config::AnimationConfigData;
use crate::scene::{NodeId, SceneGraph};

/// How angular rates are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MotionMode {
    /// Rates are radians per tick; motion speed follows the display rate
    #[default]
    PerTick,
    /// Rates are radians per reference tick, scaled by elapsed time
    TimeScaled,
}

/// Converts angular rates into per-tick rotation angles
#[derive(Debug, Clone, Copy)]
pub struct Animator {
    pub mode: MotionMode,
    pub time_scale: f32,
    pub reference_hz: f32,
}

impl Animator {
    pub fn new(config: &AnimationConfigData) -> Self {
        Self {
            mode: config.mode,
            time_scale: config.time_scale,
            reference_hz: config.reference_hz,
        }
    }

    /// Angle to apply this tick for a node with the given rate
    pub fn angle(&self, rate: f32, dt: f32) -> f32 {
        match self.mode {
            MotionMode::PerTick => rate,
            MotionMode::TimeScaled => rate * self.reference_hz * self.time_scale * dt,
        }
    }

    /// Rotate every orbit, then every body, by its rate
    pub fn advance(&self, graph: &mut SceneGraph, orbits: &[NodeId], bodies: &[NodeId], dt: f32) {
        for &node in orbits.iter().chain(bodies) {
            if let Some(rate) = graph.angular_rate(node) {
                rotate_y(graph, node, self.angle(rate, dt));
            }
        }
    }
}

impl Default for Animator {
    fn default() -> Self {
        Self::new(&AnimationConfigData::default())
    }
}

/// Premultiply a node's local matrix by a rotation about Y
pub fn rotate_y(graph: &mut SceneGraph, node: NodeId, angle: f32) {
    if angle == 0.0 {
        return;
    }
    let local = graph.local(node);
    graph.set_local(node, Mat4::from_rotation_y(angle) * local);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::NodeKind;
    use glam::Vec3;

    #[test]
    fn test_per_tick_ignores_dt() {
        let animator = Animator::default();
        assert_eq!(animator.angle(0.01, 0.0), 0.01);
        assert_eq!(animator.angle(0.01, 5.0), 0.01);
    }

    #[test]
    fn test_time_scaled_angle() {
        let animator = Animator {
            mode: MotionMode::TimeScaled,
            time_scale: 2.0,
            reference_hz: 60.0,
        };
        assert!((animator.angle(0.01, 0.5) - 0.6).abs() < 1e-6);
        assert_eq!(animator.angle(0.01, 0.0), 0.0);
    }

    #[test]
    fn test_rotation_premultiplies() {
        let mut graph = SceneGraph::new();
        let orbit = graph.spawn("orbit", NodeKind::Orbit, Mat4::from_translation(Vec3::new(100.0, 0.0, 0.0)));
        graph.set_angular_rate(orbit, std::f32::consts::FRAC_PI_2);

        Animator::default().advance(&mut graph, &[orbit], &[], 1.0 / 60.0);

        // Rotating the translated frame moves it around the parent's origin
        let position = graph.local(orbit).transform_point3(Vec3::ZERO);
        assert!(position.abs_diff_eq(Vec3::new(0.0, 0.0, -100.0), 1e-3));
    }

    #[test]
    fn test_zero_angle_is_exact() {
        let mut graph = SceneGraph::new();
        let local = Mat4::from_scale(Vec3::splat(1.3));
        let body = graph.spawn("body", NodeKind::Body, local);
        rotate_y(&mut graph, body, 0.0);
        assert_eq!(graph.local(body), local);
    }
}
