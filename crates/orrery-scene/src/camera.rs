//! Perspective camera with a per-pass layer filter.

use crate::layer::{Layer, is_visible_in_pass};
use glam::Mat4;

/// Perspective projection parameters plus the layer the camera currently sees.
///
/// The camera's placement comes from the node it is attached to; see
/// [`Camera::view_matrix`].
#[derive(Clone, Debug, PartialEq)]
pub struct Camera {
    /// Vertical field of view in degrees.
    pub fov_y_degrees: f32,
    /// Width / height.
    pub aspect_ratio: f32,
    /// Near clip plane distance (always positive).
    pub near: f32,
    /// Far clip plane distance (always positive, > near).
    pub far: f32,
    layer_filter: Layer,
}

impl Camera {
    pub fn new(fov_y_degrees: f32, aspect_ratio: f32, near: f32, far: f32) -> Self {
        Self {
            fov_y_degrees,
            aspect_ratio,
            near,
            far,
            layer_filter: Layer::Base,
        }
    }

    /// Compute the projection matrix with reverse-Z.
    pub fn projection_matrix(&self) -> Mat4 {
        // Near maps to z=1, far to z=0.
        Mat4::perspective_rh(
            self.fov_y_degrees.to_radians(),
            self.aspect_ratio,
            self.far,
            self.near,
        )
    }

    /// View matrix for a camera whose node has world transform `world`.
    pub fn view_matrix(world: Mat4) -> Mat4 {
        world.inverse()
    }

    pub fn view_projection_matrix(&self, world: Mat4) -> Mat4 {
        self.projection_matrix() * Self::view_matrix(world)
    }

    /// Update the aspect ratio. Zero-sized dimensions are clamped to 1.
    pub fn set_aspect_ratio(&mut self, width: u32, height: u32) {
        self.aspect_ratio = width.max(1) as f32 / height.max(1) as f32;
    }

    pub fn layer_filter(&self) -> Layer {
        self.layer_filter
    }

    /// Restrict the camera to objects tagged `layer`.
    pub fn set_layer_filter(&mut self, layer: Layer) {
        self.layer_filter = layer;
    }

    pub fn sees(&self, layer: Layer) -> bool {
        is_visible_in_pass(layer, self.layer_filter)
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(60.0, 16.0 / 9.0, 0.1, 1000.0)
    }
}
