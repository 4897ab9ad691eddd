//! Orbit-style camera rig: a pivot node anchored to a body, with the camera
//! as its child at a fixed offset.
//!
//! Rotating the pivot swings the camera around the anchor; translating it
//! slides the whole rig. Both are relative and unclamped.

use crate::camera::Camera;
use crate::graph::{Node, NodeId, Scene};
use glam::Vec3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    fn unit(self) -> Vec3 {
        match self {
            Axis::X => Vec3::X,
            Axis::Y => Vec3::Y,
            Axis::Z => Vec3::Z,
        }
    }
}

/// Relative manipulation of a camera rig.
pub trait RigControl {
    /// Add `d_yaw` to the pivot's Y rotation and `d_pitch` to its X rotation.
    fn apply_rotation_delta(&mut self, d_yaw: f32, d_pitch: f32);

    /// Slide the pivot by `delta` along `axis` of its parent's space.
    fn apply_translation(&mut self, axis: Axis, delta: f32);
}

/// Ids of the rig's pivot and camera nodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CameraRig {
    pivot: NodeId,
    camera: NodeId,
}

impl CameraRig {
    /// Create the pivot under `anchor` and the camera under the pivot at `offset`.
    pub fn attach(scene: &mut Scene, anchor: NodeId, camera: Camera, offset: Vec3) -> Self {
        let pivot = scene.add_child(anchor, Node::pivot("camera_pivot"));
        let camera = scene.add_child(pivot, Node::camera("camera", camera).with_position(offset));
        Self { pivot, camera }
    }

    pub fn pivot(&self) -> NodeId {
        self.pivot
    }

    pub fn camera(&self) -> NodeId {
        self.camera
    }

    /// Borrow the scene mutably for rig control.
    pub fn control<'a>(&self, scene: &'a mut Scene) -> RigMut<'a> {
        RigMut {
            scene,
            pivot: self.pivot,
        }
    }
}

/// A rig bound to the scene it lives in.
pub struct RigMut<'a> {
    scene: &'a mut Scene,
    pivot: NodeId,
}

impl RigControl for RigMut<'_> {
    fn apply_rotation_delta(&mut self, d_yaw: f32, d_pitch: f32) {
        if let Some(transform) = self.scene.transform_mut(self.pivot) {
            transform.rotation.y += d_yaw;
            transform.rotation.x += d_pitch;
        }
    }

    fn apply_translation(&mut self, axis: Axis, delta: f32) {
        if let Some(transform) = self.scene.transform_mut(self.pivot) {
            transform.position += axis.unit() * delta;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rig_scene() -> (Scene, NodeId, CameraRig) {
        let mut scene = Scene::new();
        let earth = scene.add(Node::pivot("earth"));
        let rig = CameraRig::attach(&mut scene, earth, Camera::default(), Vec3::new(0.0, 0.0, 4.0));
        (scene, earth, rig)
    }

    #[test]
    fn test_rig_hierarchy() {
        let (scene, earth, rig) = rig_scene();
        assert_eq!(scene.node(rig.pivot()).unwrap().parent(), Some(earth));
        assert_eq!(scene.node(rig.camera()).unwrap().parent(), Some(rig.pivot()));
        assert!(scene.camera(rig.camera()).is_some());
    }

    #[test]
    fn test_rotation_deltas_add() {
        let (mut scene, _, rig) = rig_scene();
        {
            let mut control = rig.control(&mut scene);
            control.apply_rotation_delta(0.1, 0.2);
            control.apply_rotation_delta(0.3, -0.05);
        }
        let rotation = scene.node(rig.pivot()).unwrap().transform.rotation;
        assert!((rotation.y - 0.4).abs() < 1e-6);
        assert!((rotation.x - 0.15).abs() < 1e-6);
        assert_eq!(rotation.z, 0.0);
    }

    #[test]
    fn test_pitch_is_not_clamped() {
        let (mut scene, _, rig) = rig_scene();
        let mut control = rig.control(&mut scene);
        for _ in 0..400 {
            control.apply_rotation_delta(0.0, 0.01);
        }
        let pitch = scene.node(rig.pivot()).unwrap().transform.rotation.x;
        assert!(pitch > std::f32::consts::PI);
    }

    #[test]
    fn test_translation_per_axis() {
        let (mut scene, _, rig) = rig_scene();
        {
            let mut control = rig.control(&mut scene);
            control.apply_translation(Axis::Z, -0.1);
            control.apply_translation(Axis::X, 0.1);
            control.apply_translation(Axis::Y, -0.1);
            control.apply_translation(Axis::Y, -0.1);
        }
        let position = scene.node(rig.pivot()).unwrap().transform.position;
        assert!((position - Vec3::new(0.1, -0.2, -0.1)).length() < 1e-6);
    }

    #[test]
    fn test_yaw_swings_camera_around_anchor() {
        let (mut scene, _, rig) = rig_scene();
        rig.control(&mut scene)
            .apply_rotation_delta(std::f32::consts::FRAC_PI_2, 0.0);
        let camera_pos = scene.world_position(rig.camera()).unwrap();
        assert!((camera_pos - Vec3::new(4.0, 0.0, 0.0)).length() < 1e-4, "{camera_pos:?}");
    }
}
