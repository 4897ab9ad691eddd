//! wgpu implementation of [`SceneRenderer`].
//!
//! GPU resources for a mesh node (vertex data, uniform buffer, bind groups)
//! are created the first time the node is drawn and reused afterwards. Only
//! uniforms are rewritten per frame.

use crate::basic_pipeline::basic_pipeline;
use crate::bloom::{BloomPipeline, HDR_FORMAT};
use crate::buffer::{BufferAllocator, MeshBuffer};
use crate::compositor::{BloomSettings, RenderError, RenderTarget, SceneRenderer};
use crate::depth::DepthBuffer;
use crate::gpu::RenderContext;
use crate::mesh::tessellate;
use crate::pass::{FrameEncoder, RenderPassBuilder, begin_depth_only_pass};
use crate::phong_pipeline::phong_pipeline;
use crate::pipeline::{FrameUniform, MeshPipeline, ObjectUniform, PipelineKey, SceneLayouts};
use crate::shadow_pipeline::{ShadowPipeline, light_view_projection};
use crate::texture::{TextureAssets, TextureManager};
use glam::{Mat4, Vec3};
use orrery_config::RenderConfig;
use orrery_scene::{Geometry, Material, MeshDesc, NodeId, NodeKind, Scene};
use std::collections::HashMap;
use std::path::PathBuf;

struct ObjectBinding {
    mesh: usize,
    uniform: wgpu::Buffer,
    object_bind_group: wgpu::BindGroup,
    material_bind_group: wgpu::BindGroup,
}

/// One mesh node selected for the current pass.
struct DrawItem {
    id: NodeId,
    world: Mat4,
    desc: MeshDesc,
    cast_shadows: bool,
    receive_shadows: bool,
}

impl DrawItem {
    fn lit(&self, target: RenderTarget) -> bool {
        target == RenderTarget::Screen && matches!(self.desc.material, Material::Phong { .. })
    }

    fn key(&self, target: RenderTarget, surface_format: wgpu::TextureFormat) -> PipelineKey {
        PipelineKey {
            side: self.desc.material.side(),
            transparent: self.desc.material.is_transparent(),
            format: match target {
                RenderTarget::Offscreen => HDR_FORMAT,
                RenderTarget::Screen => surface_format,
            },
        }
    }
}

#[derive(Default)]
struct Lighting {
    ambient: Vec3,
    point: Option<(Vec3, Vec3, bool)>,
}

pub struct WgpuSceneRenderer {
    ctx: RenderContext,
    depth: DepthBuffer,
    layouts: SceneLayouts,
    basic: MeshPipeline,
    phong: MeshPipeline,
    shadow: ShadowPipeline,
    bloom: BloomPipeline,
    textures: TextureManager,
    meshes: Vec<(Geometry, MeshBuffer)>,
    objects: HashMap<NodeId, ObjectBinding>,
    frame_buffer: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,
    frame: Option<FrameEncoder>,
    clear_color: wgpu::Color,
    shadow_focus: Option<NodeId>,
    depth_clear_pending: bool,
    screen_written: bool,
}

impl WgpuSceneRenderer {
    pub fn new(ctx: RenderContext, config: &RenderConfig) -> Self {
        let device = &ctx.device;
        let (width, height) = ctx.size();

        let layouts = SceneLayouts::new(device);
        let basic = basic_pipeline(device, &layouts);
        let phong = phong_pipeline(device, &layouts);
        let shadow = ShadowPipeline::new(device, &layouts, config.shadow_map_size);
        let bloom = BloomPipeline::new(
            device,
            ctx.surface_format,
            width,
            height,
            config.bloom_levels,
        );
        let depth = DepthBuffer::new(device, width, height);
        let textures = TextureManager::new(device, &ctx.queue);

        let frame_buffer =
            BufferAllocator::new(device).create_uniform("frame-uniform", &FrameUniform::default());
        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("frame-bg"),
            layout: &layouts.frame,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: frame_buffer.as_entire_binding(),
            }],
        });

        let [r, g, b, a] = config.clear_color;
        log::info!(
            "Scene renderer ready at {width}x{height}, {} bloom levels, {}px shadow map",
            bloom.levels(),
            shadow.size()
        );

        Self {
            ctx,
            depth,
            layouts,
            basic,
            phong,
            shadow,
            bloom,
            textures,
            meshes: Vec::new(),
            objects: HashMap::new(),
            frame_buffer,
            frame_bind_group,
            frame: None,
            clear_color: wgpu::Color { r, g, b, a },
            shadow_focus: None,
            depth_clear_pending: false,
            screen_written: false,
        }
    }

    /// Asset source writing into this renderer's texture manager.
    pub fn texture_assets(
        &mut self,
        dir: impl Into<PathBuf>,
        linear: impl IntoIterator<Item = String>,
    ) -> TextureAssets<'_> {
        TextureAssets::new(
            &self.ctx.device,
            &self.ctx.queue,
            &mut self.textures,
            dir,
            linear,
        )
    }

    /// Node the shadow map is aimed at. Without one, the map is centred on
    /// the average position of the shadow casters.
    pub fn set_shadow_focus(&mut self, node: NodeId) {
        self.shadow_focus = Some(node);
    }

    pub fn context(&self) -> &RenderContext {
        &self.ctx
    }

    fn collect(scene: &Scene, camera: &orrery_scene::Camera) -> (Vec<DrawItem>, Lighting) {
        let mut items = Vec::new();
        let mut lighting = Lighting::default();
        scene.visit(|id, node, world| match &node.kind {
            NodeKind::Mesh(desc) if camera.sees(node.layer()) => items.push(DrawItem {
                id,
                world,
                desc: desc.clone(),
                cast_shadows: node.cast_shadows,
                receive_shadows: node.receive_shadows,
            }),
            NodeKind::AmbientLight { color, intensity } => lighting.ambient += *color * *intensity,
            NodeKind::PointLight {
                color,
                intensity,
                cast_shadows,
            } if lighting.point.is_none() => {
                let position = world.transform_point3(Vec3::ZERO);
                lighting.point = Some((position, *color * *intensity, *cast_shadows));
            }
            _ => {}
        });
        (items, lighting)
    }

    fn mesh_index(&mut self, geometry: &Geometry) -> usize {
        if let Some(i) = self.meshes.iter().position(|(g, _)| g == geometry) {
            return i;
        }
        let data = tessellate(geometry);
        log::debug!(
            "Tessellated {geometry:?}: {} vertices, {} triangles",
            data.vertices.len(),
            data.triangle_count()
        );
        let buffer = BufferAllocator::new(&self.ctx.device).create_mesh("scene-mesh", &data);
        self.meshes.push((*geometry, buffer));
        self.meshes.len() - 1
    }

    fn ensure_object(&mut self, item: &DrawItem) {
        if self.objects.contains_key(&item.id) {
            return;
        }
        let mesh = self.mesh_index(&item.desc.geometry);
        let device = &self.ctx.device;
        let label = format!("object-{}", item.id.index());

        let uniform = BufferAllocator::new(device).create_uniform(
            &label,
            &object_uniform(item),
        );
        let object_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&label),
            layout: &self.layouts.object,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform.as_entire_binding(),
            }],
        });

        let bump = match item.desc.material {
            Material::Phong { bump_map, .. } => bump_map,
            Material::Basic { .. } => None,
        };
        let material_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&label),
            layout: &self.layouts.material,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(
                        self.textures.view_or_white(item.desc.material.map()),
                    ),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(
                        self.textures.view_or_white(bump),
                    ),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(self.textures.sampler()),
                },
            ],
        });

        self.objects.insert(
            item.id,
            ObjectBinding {
                mesh,
                uniform,
                object_bind_group,
                material_bind_group,
            },
        );
    }

    fn shadow_matrix(&self, scene: &Scene, items: &[DrawItem], light: Vec3) -> Mat4 {
        let focus = self
            .shadow_focus
            .and_then(|id| scene.world_position(id))
            .unwrap_or_else(|| {
                let casters: Vec<Vec3> = items
                    .iter()
                    .filter(|i| i.cast_shadows)
                    .map(|i| i.world.transform_point3(Vec3::ZERO))
                    .collect();
                if casters.is_empty() {
                    Vec3::ZERO
                } else {
                    casters.iter().sum::<Vec3>() / casters.len() as f32
                }
            });
        light_view_projection(light, focus)
    }

    fn render_shadow_map(&mut self, items: &[DrawItem]) -> Result<(), RenderError> {
        let frame = self.frame.as_mut().ok_or(RenderError::NoFrame)?;
        let encoder = frame.encoder_mut().ok_or(RenderError::NoFrame)?;
        let mut pass = begin_depth_only_pass(
            encoder,
            &self.shadow.map_view,
            DepthBuffer::CLEAR_VALUE,
            "shadow-pass",
        );
        pass.set_pipeline(&self.shadow.pipeline);
        pass.set_bind_group(0, &self.shadow.light_bind_group, &[]);
        for item in items.iter().filter(|i| i.cast_shadows) {
            if let Some(binding) = self.objects.get(&item.id) {
                pass.set_bind_group(1, &binding.object_bind_group, &[]);
                self.meshes[binding.mesh].1.draw(&mut pass);
            }
        }
        Ok(())
    }
}

fn object_uniform(item: &DrawItem) -> ObjectUniform {
    let (bump_scale, shininess) = match item.desc.material {
        Material::Phong {
            bump_scale,
            shininess,
            ..
        } => (bump_scale, shininess),
        Material::Basic { .. } => (0.0, 0.0),
    };
    ObjectUniform::new(
        item.world,
        item.desc.material.color(),
        bump_scale,
        shininess,
        item.receive_shadows,
    )
}

/// Opaque items first in traversal order, then transparent items far to
/// near.
fn sort_for_drawing(items: &mut [DrawItem], eye: Vec3) {
    let distance = |item: &DrawItem| item.world.transform_point3(Vec3::ZERO).distance(eye);
    items.sort_by(|a, b| {
        let (ta, tb) = (
            a.desc.material.is_transparent(),
            b.desc.material.is_transparent(),
        );
        match (ta, tb) {
            (false, false) => std::cmp::Ordering::Equal,
            (false, true) => std::cmp::Ordering::Less,
            (true, false) => std::cmp::Ordering::Greater,
            (true, true) => distance(b).total_cmp(&distance(a)),
        }
    });
}

impl SceneRenderer for WgpuSceneRenderer {
    fn resolution(&self) -> (u32, u32) {
        self.ctx.size()
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.ctx.resize(width, height);
        let (w, h) = self.ctx.size();
        self.depth.resize(&self.ctx.device, w, h);
        self.bloom.resize(&self.ctx.device, w, h);
    }

    fn begin_frame(&mut self) -> Result<(), RenderError> {
        if self.frame.take().is_some() {
            log::warn!("Previous frame was never ended");
        }
        let surface_texture = self.ctx.get_current_texture()?;
        self.frame = Some(FrameEncoder::new(
            &self.ctx.device,
            self.ctx.queue.clone(),
            surface_texture,
        ));
        self.depth_clear_pending = false;
        self.screen_written = false;
        Ok(())
    }

    fn draw_scene(
        &mut self,
        scene: &Scene,
        camera_id: NodeId,
        target: RenderTarget,
    ) -> Result<(), RenderError> {
        if self.frame.is_none() {
            return Err(RenderError::NoFrame);
        }
        let camera = scene
            .camera(camera_id)
            .ok_or(RenderError::MissingCamera(camera_id))?;
        let camera_world = scene
            .world_matrix(camera_id)
            .ok_or(RenderError::MissingCamera(camera_id))?;
        let eye = camera_world.transform_point3(Vec3::ZERO);

        let (mut items, lighting) = Self::collect(scene, camera);
        sort_for_drawing(&mut items, eye);

        let surface_format = self.ctx.surface_format;
        for item in &items {
            self.ensure_object(item);
            if let Some(binding) = self.objects.get(&item.id) {
                self.ctx
                    .queue
                    .write_buffer(&binding.uniform, 0, bytemuck::bytes_of(&object_uniform(item)));
            }
            let key = item.key(target, surface_format);
            if item.lit(target) {
                self.phong.prepare(&self.ctx.device, key);
            } else {
                self.basic.prepare(&self.ctx.device, key);
            }
        }

        let (light_pos, light_color, casts) = lighting.point.unwrap_or((Vec3::ZERO, Vec3::ZERO, false));
        let light_view_proj = if casts {
            self.shadow_matrix(scene, &items, light_pos)
        } else {
            Mat4::IDENTITY
        };
        let frame_uniform = FrameUniform {
            view_proj: camera.view_projection_matrix(camera_world).to_cols_array_2d(),
            camera_pos: eye.extend(1.0).to_array(),
            light_view_proj: light_view_proj.to_cols_array_2d(),
            light_pos: light_pos.extend(1.0).to_array(),
            light_color: light_color.extend(if casts { 1.0 } else { 0.0 }).to_array(),
            ambient: lighting.ambient.extend(1.0).to_array(),
        };
        self.ctx
            .queue
            .write_buffer(&self.frame_buffer, 0, bytemuck::bytes_of(&frame_uniform));

        if target == RenderTarget::Screen && casts {
            self.shadow.set_light(&self.ctx.queue, light_view_proj);
            self.render_shadow_map(&items)?;
        }

        let builder = match target {
            RenderTarget::Offscreen => RenderPassBuilder::new("glow-pass")
                .clear_color(self.clear_color)
                .depth(&self.depth.view, DepthBuffer::CLEAR_VALUE),
            RenderTarget::Screen => {
                let builder = RenderPassBuilder::new("base-pass");
                let builder = if self.screen_written {
                    builder.load_color()
                } else {
                    builder.clear_color(self.clear_color)
                };
                if self.depth_clear_pending {
                    builder.depth(&self.depth.view, DepthBuffer::CLEAR_VALUE)
                } else {
                    builder.depth_load(&self.depth.view)
                }
            }
        };

        let frame = self.frame.as_mut().ok_or(RenderError::NoFrame)?;
        let (encoder, surface_view) = frame.parts().ok_or(RenderError::NoFrame)?;
        let color_view = match target {
            RenderTarget::Offscreen => self.bloom.hdr_view(),
            RenderTarget::Screen => surface_view,
        };
        let mut pass = builder.begin(encoder, color_view);
        pass.set_bind_group(0, &self.frame_bind_group, &[]);
        pass.set_bind_group(3, &self.shadow.sample_bind_group, &[]);

        let mut drawn = 0usize;
        for item in &items {
            let key = item.key(target, surface_format);
            let pipeline = if item.lit(target) {
                self.phong.get(&key)
            } else {
                self.basic.get(&key)
            };
            let (Some(pipeline), Some(binding)) = (pipeline, self.objects.get(&item.id)) else {
                continue;
            };
            pass.set_pipeline(pipeline);
            pass.set_bind_group(1, &binding.object_bind_group, &[]);
            pass.set_bind_group(2, &binding.material_bind_group, &[]);
            self.meshes[binding.mesh].1.draw(&mut pass);
            drawn += 1;
        }
        drop(pass);

        if target == RenderTarget::Screen {
            self.screen_written = true;
            self.depth_clear_pending = false;
        }
        log::trace!("{target:?} pass drew {drawn} objects");
        Ok(())
    }

    fn apply_bloom(&mut self, settings: &BloomSettings) -> Result<(), RenderError> {
        let frame = self.frame.as_mut().ok_or(RenderError::NoFrame)?;
        self.bloom.update(&self.ctx.queue, settings);
        let (encoder, surface_view) = frame.parts().ok_or(RenderError::NoFrame)?;
        self.bloom.execute(encoder, surface_view);
        self.screen_written = true;
        Ok(())
    }

    fn clear_depth(&mut self) -> Result<(), RenderError> {
        if self.frame.is_none() {
            return Err(RenderError::NoFrame);
        }
        self.depth_clear_pending = true;
        Ok(())
    }

    fn end_frame(&mut self) -> Result<(), RenderError> {
        let frame = self.frame.take().ok_or(RenderError::NoFrame)?;
        frame.submit();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orrery_scene::{Side, TextureHandle};

    fn item(id_source: &mut Scene, transparent: bool, z: f32) -> DrawItem {
        let desc = MeshDesc {
            geometry: Geometry::Sphere {
                radius: 1.0,
                width_segments: 8,
                height_segments: 6,
            },
            material: Material::Basic {
                color: Vec3::ONE,
                map: None,
                side: Side::Front,
                transparent,
            },
        };
        let id = id_source.add(orrery_scene::Node::pivot("n"));
        DrawItem {
            id,
            world: Mat4::from_translation(Vec3::new(0.0, 0.0, z)),
            desc,
            cast_shadows: false,
            receive_shadows: false,
        }
    }

    #[test]
    fn test_opaque_before_transparent_far_to_near() {
        let mut scene = Scene::new();
        let mut items = vec![
            item(&mut scene, true, -1.0),
            item(&mut scene, false, -5.0),
            item(&mut scene, true, -10.0),
            item(&mut scene, false, -2.0),
        ];
        let ids: Vec<_> = items.iter().map(|i| i.id).collect();
        sort_for_drawing(&mut items, Vec3::ZERO);
        let order: Vec<_> = items.iter().map(|i| i.id).collect();
        // Opaque keep traversal order; transparent sorted farthest first.
        assert_eq!(order, vec![ids[1], ids[3], ids[2], ids[0]]);
    }

    #[test]
    fn test_phong_lit_only_on_screen() {
        let mut scene = Scene::new();
        let mut phong = item(&mut scene, false, 0.0);
        phong.desc.material = Material::Phong {
            color: Vec3::ONE,
            map: Some(TextureHandle::new(0)),
            bump_map: None,
            bump_scale: 0.3,
            shininess: 30.0,
            transparent: false,
        };
        assert!(phong.lit(RenderTarget::Screen));
        assert!(!phong.lit(RenderTarget::Offscreen));
        let basic = item(&mut scene, false, 0.0);
        assert!(!basic.lit(RenderTarget::Screen));
    }

    #[test]
    fn test_offscreen_targets_hdr_format() {
        let mut scene = Scene::new();
        let i = item(&mut scene, true, 0.0);
        let fmt = wgpu::TextureFormat::Bgra8UnormSrgb;
        assert_eq!(i.key(RenderTarget::Offscreen, fmt).format, HDR_FORMAT);
        assert_eq!(i.key(RenderTarget::Screen, fmt).format, fmt);
        assert!(i.key(RenderTarget::Screen, fmt).transparent);
    }

    #[test]
    fn test_object_uniform_for_basic_has_no_bump() {
        let mut scene = Scene::new();
        let i = item(&mut scene, false, 3.0);
        let u = object_uniform(&i);
        assert_eq!(u.params[0], 0.0);
        assert_eq!(u.model[3][2], 3.0);
    }

    #[test]
    fn test_collect_filters_by_layer_and_gathers_lights() {
        use orrery_scene::{Camera, Layer, Node};
        let mut scene = Scene::new();
        let desc = item(&mut Scene::new(), false, 0.0).desc;
        scene.add(Node::mesh("glow", Layer::Glow, desc.clone()));
        scene.add(Node::mesh("base", Layer::Base, desc));
        scene.add(Node::ambient_light("ambient", Vec3::ONE, 0.2));
        scene.add(
            Node::point_light("sun", Vec3::ONE, 1.0)
                .with_position(Vec3::new(-50.0, 20.0, -60.0))
                .with_shadows(true, false),
        );

        let mut camera = Camera::new(45.0, 1.0, 0.1, 1000.0);
        camera.set_layer_filter(Layer::Glow);
        let (items, lighting) = WgpuSceneRenderer::collect(&scene, &camera);
        assert_eq!(items.len(), 1);
        assert!((lighting.ambient - Vec3::splat(0.2)).length() < 1e-6);
        let (pos, color, casts) = lighting.point.unwrap();
        assert_eq!(pos, Vec3::new(-50.0, 20.0, -60.0));
        assert_eq!(color, Vec3::ONE);
        assert!(casts);

        camera.set_layer_filter(Layer::Base);
        let (items, _) = WgpuSceneRenderer::collect(&scene, &camera);
        assert_eq!(items.len(), 1);
        assert_eq!(scene.node(items[0].id).unwrap().name, "base");
    }
}
