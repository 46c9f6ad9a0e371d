//! Camera parameters supplied by the frame orchestrator

use glam::{Mat4, Vec3};

/// View used to sort and draw particles for one frame
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ParticleView {
    /// World-to-view matrix
    pub view: Mat4,
    /// View-to-clip matrix
    pub projection: Mat4,
    /// Camera position in world space, the sort origin
    pub position: Vec3,
}

impl ParticleView {
    pub fn new(view: Mat4, projection: Mat4, position: Vec3) -> Self {
        Self {
            view,
            projection,
            position,
        }
    }

    /// Build from matrices alone, recovering the eye from the inverse view
    pub fn from_matrices(view: Mat4, projection: Mat4) -> Self {
        let position = view.inverse().w_axis.truncate();
        Self::new(view, projection, position)
    }

    /// Create a perspective view
    pub fn perspective(
        position: Vec3,
        target: Vec3,
        up: Vec3,
        fov_y: f32,
        aspect: f32,
        near: f32,
        far: f32,
    ) -> Self {
        let view = Mat4::look_at_rh(position, target, up);
        let projection = Mat4::perspective_rh(fov_y, aspect, near, far);
        Self::new(view, projection, position)
    }

    /// Combined view-projection matrix
    pub fn view_proj(&self) -> Mat4 {
        self.projection * self.view
    }
}

impl Default for ParticleView {
    fn default() -> Self {
        Self::new(Mat4::IDENTITY, Mat4::IDENTITY, Vec3::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eye_is_recovered_from_view_matrix() {
        let eye = Vec3::new(3.0, 4.0, 5.0);
        let view = Mat4::look_at_rh(eye, Vec3::ZERO, Vec3::Y);
        let recovered = ParticleView::from_matrices(view, Mat4::IDENTITY).position;

        assert!(recovered.abs_diff_eq(eye, 1e-4), "{recovered:?}");
    }
}
