use crate::mesh::ModelBounds;
use glam::{Mat4, Vec3};

const DEFAULT_UP: Vec3 = Vec3::Y;

/// Offset from the framed model's center to the camera, scaled by the
/// framing distance as-is. Gives the familiar three-quarter catalog angle.
const FRAME_OFFSET: Vec3 = Vec3::new(0.7, 0.5, 0.7);

/// Perspective camera for the offscreen thumbnail target.
#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y_radians: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 5.0),
            target: Vec3::ZERO,
            up: DEFAULT_UP,
            fov_y_radians: 45.0_f32.to_radians(),
            near: 0.01,
            far: 1000.0,
        }
    }
}

impl Camera {
    /// Frames the model's bounding box: look at its center from a fixed
    /// offset direction, at a distance proportional to the largest extent.
    /// Degenerate bounds (a point, or no geometry) fall back to a fixed
    /// distance so the render still produces a sensible empty frame.
    pub fn framing(bounds: &ModelBounds) -> Self {
        let center = bounds.center();
        let max_dim = bounds.max_extent();
        let distance = if max_dim > 0.0 { max_dim * 1.8 } else { 5.0 };
        Self {
            position: center + FRAME_OFFSET * distance,
            target: center,
            ..Self::default()
        }
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov_y_radians, aspect.max(0.0001), self.near, self.far)
    }

    pub fn view_projection(&self, aspect: f32) -> Mat4 {
        self.projection_matrix(aspect) * self.view_matrix()
    }
}
