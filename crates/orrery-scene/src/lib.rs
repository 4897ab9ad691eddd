//! Scene description: node hierarchy, render layers, camera, camera rig, and
//! construction of the earth/moon/sun scene.
//!
//! Nothing in this crate touches the GPU. Renderers read a [`Scene`] and a
//! [`Camera`]; input code mutates the scene only through [`RigControl`].

pub mod assets;
pub mod camera;
pub mod celestial;
pub mod graph;
pub mod layer;
pub mod material;
pub mod rig;

pub use assets::{AssetError, AssetSource, TextureHandle};
pub use camera::Camera;
pub use celestial::{CelestialScene, SceneBuildError, SUN_POSITION};
pub use graph::{Node, NodeId, NodeKind, Scene, Transform};
pub use layer::{Layer, is_visible_in_pass};
pub use material::{Geometry, Material, MeshDesc, Side, hex_color};
pub use rig::{Axis, CameraRig, RigControl, RigMut};
