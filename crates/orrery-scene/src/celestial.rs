//! Construction of the earth, moon, sun and galaxy scene.

use crate::assets::{AssetError, AssetSource};
use crate::camera::Camera;
use crate::graph::{Node, NodeId, Scene};
use crate::layer::Layer;
use crate::material::{Geometry, Material, MeshDesc, Side, hex_color};
use crate::rig::CameraRig;
use glam::Vec3;
use orrery_config::{AnimationConfig, AssetConfig, RenderConfig};

/// World position shared by the sun mesh and the point light.
pub const SUN_POSITION: Vec3 = Vec3::new(-50.0, 20.0, -60.0);

const CAMERA_OFFSET: Vec3 = Vec3::new(0.0, 0.0, 4.0);
const MOON_OFFSET: Vec3 = Vec3::new(2.0, 0.0, 0.0);
const PHONG_SHININESS: f32 = 30.0;

#[derive(Debug, thiserror::Error)]
pub enum SceneBuildError {
    #[error("failed to load scene asset: {0}")]
    Asset(#[from] AssetError),
}

/// The built scene plus handles to the nodes the frame loop animates.
#[derive(Debug)]
pub struct CelestialScene {
    pub scene: Scene,
    pub sun: NodeId,
    pub galaxy: NodeId,
    pub earth: NodeId,
    pub clouds: NodeId,
    pub moon_pivot: NodeId,
    pub moon: NodeId,
    pub point_light: NodeId,
    pub rig: CameraRig,
}

impl CelestialScene {
    /// Build the scene, loading every texture through `assets`.
    ///
    /// Any texture failure aborts construction; nothing partial is returned.
    pub fn build(
        assets: &mut dyn AssetSource,
        asset_config: &AssetConfig,
        render_config: &RenderConfig,
        animation: &AnimationConfig,
        aspect_ratio: f32,
    ) -> Result<Self, SceneBuildError> {
        let galaxy_map = assets.load_texture(&asset_config.galaxy)?;
        let earth_map = assets.load_texture(&asset_config.earth_map)?;
        let earth_bump = assets.load_texture(&asset_config.earth_bump)?;
        let cloud_map = assets.load_texture(&asset_config.clouds)?;
        let moon_map = assets.load_texture(&asset_config.moon_map)?;
        let moon_bump = assets.load_texture(&asset_config.moon_bump)?;

        let mut scene = Scene::new();

        let sun = scene.add(
            Node::mesh(
                "sun",
                Layer::Glow,
                MeshDesc {
                    geometry: Geometry::Icosahedron {
                        radius: 3.0,
                        detail: 15,
                    },
                    material: Material::Basic {
                        color: hex_color(0xFFA500),
                        map: None,
                        side: Side::Front,
                        transparent: false,
                    },
                },
            )
            .with_position(SUN_POSITION),
        );

        let galaxy = scene.add(Node::mesh(
            "galaxy",
            Layer::Glow,
            MeshDesc {
                geometry: Geometry::Sphere {
                    radius: 80.0,
                    width_segments: 64,
                    height_segments: 64,
                },
                material: Material::Basic {
                    color: Vec3::ONE,
                    map: Some(galaxy_map),
                    side: Side::Back,
                    transparent: true,
                },
            },
        ));

        let earth = scene.add(
            Node::mesh(
                "earth",
                Layer::Base,
                MeshDesc {
                    geometry: Geometry::Sphere {
                        radius: 0.98,
                        width_segments: 32,
                        height_segments: 32,
                    },
                    material: Material::Phong {
                        color: Vec3::ONE,
                        map: Some(earth_map),
                        bump_map: Some(earth_bump),
                        bump_scale: 0.3,
                        shininess: PHONG_SHININESS,
                        transparent: false,
                    },
                },
            )
            .with_shadows(true, true),
        );

        let clouds = scene.add(Node::mesh(
            "clouds",
            Layer::Base,
            MeshDesc {
                geometry: Geometry::Sphere {
                    radius: 1.0,
                    width_segments: 32,
                    height_segments: 32,
                },
                material: Material::Phong {
                    color: Vec3::ONE,
                    map: Some(cloud_map),
                    bump_map: None,
                    bump_scale: 0.0,
                    shininess: PHONG_SHININESS,
                    transparent: true,
                },
            },
        ));

        let moon_pivot = scene.add_child(
            earth,
            Node::pivot("moon_pivot").with_rotation(Vec3::new(animation.moon_tilt, 0.0, 0.0)),
        );
        let moon = scene.add_child(
            moon_pivot,
            Node::mesh(
                "moon",
                Layer::Base,
                MeshDesc {
                    geometry: Geometry::Sphere {
                        radius: 0.2,
                        width_segments: 32,
                        height_segments: 32,
                    },
                    material: Material::Phong {
                        color: Vec3::ONE,
                        map: Some(moon_map),
                        bump_map: Some(moon_bump),
                        bump_scale: 0.02,
                        shininess: PHONG_SHININESS,
                        transparent: false,
                    },
                },
            )
            .with_position(MOON_OFFSET)
            .with_shadows(true, true),
        );

        let camera = Camera::new(
            render_config.fov_y_degrees,
            aspect_ratio,
            render_config.near,
            render_config.far,
        );
        let rig = CameraRig::attach(&mut scene, earth, camera, CAMERA_OFFSET);

        scene.add(Node::ambient_light("ambient", Vec3::ONE, 0.2));
        let point_light = scene.add(
            Node::point_light("sun_light", Vec3::ONE, 1.0)
                .with_position(SUN_POSITION)
                .with_shadows(true, false),
        );

        tracing::debug!(nodes = scene.len(), "celestial scene built");

        Ok(Self {
            scene,
            sun,
            galaxy,
            earth,
            clouds,
            moon_pivot,
            moon,
            point_light,
            rig,
        })
    }

    /// Active camera of the rig.
    pub fn camera(&self) -> Option<&Camera> {
        self.scene.camera(self.rig.camera())
    }

    pub fn camera_mut(&mut self) -> Option<&mut Camera> {
        self.scene.camera_mut(self.rig.camera())
    }
}
