use glam::{Mat4, Vec3};

/// Default near clipping plane distance
pub const DEFAULT_NEAR: f32 = 1.0;
/// Default far clipping plane distance
pub const DEFAULT_FAR: f32 = 2000.0;

/// Look-at camera.
///
/// Attributes are plain values; `set_matrix` derives every matrix from them
/// and must be called each frame after an attribute change.
#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub aspect: f32,
    /// Field of view in radians
    pub fov: f32,
    pub near: f32,
    pub far: f32,

    projection_matrix: Mat4,
    camera_matrix: Mat4,
    view_matrix: Mat4,
    view_projection_matrix: Mat4,
}

impl Camera {
    pub fn new() -> Self {
        Self {
            position: Vec3::new(0.0, 500.0, 0.0),
            target: Vec3::ZERO,
            up: Vec3::Z,
            aspect: 2.0,
            fov: 0.0,
            near: DEFAULT_NEAR,
            far: DEFAULT_FAR,
            projection_matrix: Mat4::IDENTITY,
            camera_matrix: Mat4::IDENTITY,
            view_matrix: Mat4::IDENTITY,
            view_projection_matrix: Mat4::IDENTITY,
        }
    }

    /// Store view parameters; `fov_degrees` is converted to radians
    pub fn set_attributes(&mut self, position: Vec3, target: Vec3, up: Vec3, aspect: f32, fov_degrees: f32) {
        self.position = position;
        self.target = target;
        self.up = up;
        self.aspect = aspect;
        self.fov = fov_degrees.to_radians();
    }

    /// Same as `set_attributes` with explicit clipping planes
    #[allow(clippy::too_many_arguments)]
    pub fn set_attributes_with_planes(
        &mut self,
        position: Vec3,
        target: Vec3,
        up: Vec3,
        aspect: f32,
        fov_degrees: f32,
        near: f32,
        far: f32,
    ) {
        self.set_attributes(position, target, up, aspect, fov_degrees);
        self.near = near;
        self.far = far;
    }

    /// Recompute projection, camera-to-world, view and view-projection, in that order
    pub fn set_matrix(&mut self) {
        let mut proj = Mat4::perspective_rh(self.fov, self.aspect, self.near, self.far);
        // Flip Y for Vulkan coordinate system
        proj.y_axis.y *= -1.0;
        self.projection_matrix = proj;
        self.camera_matrix = look_at(self.position, self.target, self.up);
        self.view_matrix = self.camera_matrix.inverse();
        self.view_projection_matrix = self.projection_matrix * self.view_matrix;
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.projection_matrix
    }

    /// Camera-to-world transform
    pub fn camera_matrix(&self) -> Mat4 {
        self.camera_matrix
    }

    pub fn view_matrix(&self) -> Mat4 {
        self.view_matrix
    }

    pub fn view_projection_matrix(&self) -> Mat4 {
        self.view_projection_matrix
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}

/// Camera-to-world matrix placing an observer at `eye` facing `target`.
///
/// The camera looks down its local -Z axis. This is the inverse of
/// `Mat4::look_at_rh`, which yields the world-to-camera transform.
pub fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
    let z_axis = (eye - target).normalize();
    let x_axis = up.cross(z_axis).normalize();
    let y_axis = z_axis.cross(x_axis).normalize();

    Mat4::from_cols(
        x_axis.extend(0.0),
        y_axis.extend(0.0),
        z_axis.extend(0.0),
        eye.extend(1.0),
    )
}
