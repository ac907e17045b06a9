use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::config::{CameraPlacementData, CameraRigConfigData};
use crate::core::camera::Camera;
use crate::scene::SceneGraph;

/// Index of the overhead camera
pub const ABOVE_CAMERA: usize = 0;
/// Index of the oblique overview camera
pub const FRONT_CAMERA: usize = 1;
/// Index of the camera that follows a body
pub const FOLLOW_CAMERA: usize = 2;

/// User-facing camera choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
pub enum CameraSelection {
    #[default]
    Front,
    Above,
    Mercury,
    Venus,
    Earth,
}

impl CameraSelection {
    pub const ALL: [CameraSelection; 5] = [
        CameraSelection::Front,
        CameraSelection::Above,
        CameraSelection::Mercury,
        CameraSelection::Venus,
        CameraSelection::Earth,
    ];

    /// Camera slot this selection activates
    pub fn camera_index(self) -> usize {
        match self {
            CameraSelection::Above => ABOVE_CAMERA,
            CameraSelection::Front => FRONT_CAMERA,
            _ => FOLLOW_CAMERA,
        }
    }

    /// Name of the body to track, if any
    pub fn tracked_body(self) -> Option<&'static str> {
        match self {
            CameraSelection::Front | CameraSelection::Above => None,
            CameraSelection::Mercury => Some("Mercury"),
            CameraSelection::Venus => Some("Venus"),
            CameraSelection::Earth => Some("Earth"),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CameraSelection::Front => "Front",
            CameraSelection::Above => "Above",
            CameraSelection::Mercury => "Mercury",
            CameraSelection::Venus => "Venus",
            CameraSelection::Earth => "Earth",
        }
    }
}

/// The three scene cameras and which one is live
pub struct CameraRig {
    cameras: [Camera; 3],
    active: usize,
    selection: CameraSelection,
    tracked: Option<String>,
    follow_offset: Vec3,
}

impl CameraRig {
    pub fn new(config: &CameraRigConfigData, aspect: f32) -> Self {
        let place = |placement: &CameraPlacementData| {
            let mut camera = Camera::new();
            camera.set_attributes_with_planes(
                placement.position,
                placement.target,
                placement.up,
                aspect,
                config.fov,
                config.near,
                config.far,
            );
            camera.set_matrix();
            camera
        };

        // Follow camera starts on the front placement until a body is tracked
        let cameras = [place(&config.above), place(&config.front), place(&config.front)];

        let mut rig = Self {
            cameras,
            active: FRONT_CAMERA,
            selection: CameraSelection::Front,
            tracked: None,
            follow_offset: follow_offset(config.follow_offset),
        };
        rig.select(config.initial);
        rig
    }

    pub fn select(&mut self, selection: CameraSelection) {
        self.selection = selection;
        self.active = selection.camera_index();
        self.tracked = selection.tracked_body().map(str::to_string);
        tracing::info!("Camera -> {}", selection.label());
    }

    pub fn selection(&self) -> CameraSelection {
        self.selection
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn tracked(&self) -> Option<&str> {
        self.tracked.as_deref()
    }

    pub fn active(&self) -> &Camera {
        &self.cameras[self.active]
    }

    pub fn camera(&self, index: usize) -> Option<&Camera> {
        self.cameras.get(index)
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        for camera in &mut self.cameras {
            camera.aspect = aspect;
        }
    }

    /// Re-aim the follow camera at the tracked body, then recompute the
    /// active camera. Call after world matrices are current.
    pub fn update(&mut self, graph: &SceneGraph) {
        if let Some(name) = &self.tracked {
            match graph.find(name) {
                Some(node) => {
                    let target = graph.world_matrix(node).transform_point3(Vec3::ZERO);
                    let follow = &mut self.cameras[FOLLOW_CAMERA];
                    follow.target = target;
                    follow.position = target + self.follow_offset;
                    follow.up = follow_up(self.follow_offset);
                }
                None => tracing::warn!("Tracked body {} not in scene", name),
            }
        }

        self.cameras[self.active].set_matrix();
    }
}

/// A zero offset would put the follow camera inside its target
fn follow_offset(configured: Vec3) -> Vec3 {
    if configured.length_squared() > f32::EPSILON {
        return configured;
    }
    let fallback = CameraRigConfigData::default().follow_offset;
    tracing::warn!("Follow offset {:?} is zero, using {:?}", configured, fallback);
    fallback
}

/// +Y up unless the offset is vertical, where +Z takes over
fn follow_up(offset: Vec3) -> Vec3 {
    if offset.normalize().cross(Vec3::Y).length_squared() < 1e-6 {
        Vec3::Z
    } else {
        Vec3::Y
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::NodeKind;
    use glam::Mat4;

    #[test]
    fn test_selection_indices() {
        assert_eq!(CameraSelection::Above.camera_index(), 0);
        assert_eq!(CameraSelection::Front.camera_index(), 1);
        for selection in [CameraSelection::Mercury, CameraSelection::Venus, CameraSelection::Earth] {
            assert_eq!(selection.camera_index(), 2);
            assert_eq!(selection.tracked_body(), Some(selection.label()));
        }
    }

    #[test]
    fn test_initial_selection_from_config() {
        let config = CameraRigConfigData {
            initial: CameraSelection::Above,
            ..Default::default()
        };
        let rig = CameraRig::new(&config, 2.0);
        assert_eq!(rig.active_index(), ABOVE_CAMERA);
        assert_eq!(rig.tracked(), None);
        assert_eq!(rig.active().up, Vec3::Z);
    }

    #[test]
    fn test_follow_camera_tracks_body() {
        let mut graph = SceneGraph::new();
        let earth = graph.spawn("Earth", NodeKind::Body, Mat4::from_translation(Vec3::new(350.0, 0.0, 0.0)));
        graph.update_world_matrices(earth);

        let config = CameraRigConfigData::default();
        let mut rig = CameraRig::new(&config, 2.0);
        rig.select(CameraSelection::Earth);
        rig.update(&graph);

        let camera = rig.active();
        assert_eq!(camera.target, Vec3::new(350.0, 0.0, 0.0));
        assert_eq!(camera.position, Vec3::new(350.0, 0.0, 0.0) + config.follow_offset);
    }

    #[test]
    fn test_vertical_follow_offset_keeps_finite_view() {
        let mut graph = SceneGraph::new();
        let venus = graph.spawn("Venus", NodeKind::Body, Mat4::from_translation(Vec3::new(250.0, 0.0, 0.0)));
        graph.update_world_matrices(venus);

        for offset in [Vec3::new(0.0, 120.0, 0.0), Vec3::new(0.0, -40.0, 0.0), Vec3::ZERO] {
            let config = CameraRigConfigData {
                follow_offset: offset,
                initial: CameraSelection::Venus,
                ..Default::default()
            };
            let mut rig = CameraRig::new(&config, 1.5);
            rig.update(&graph);

            let camera = rig.active();
            assert_ne!(camera.position, camera.target);
            assert!(camera.view_matrix().is_finite(), "offset {:?}", offset);
            assert!(camera.view_projection_matrix().is_finite());
        }
    }
}
