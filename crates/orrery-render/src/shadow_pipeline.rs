//! Depth-only shadow map for the scene's point light.
//!
//! A single perspective projection from the light towards the shadow focus
//! (the earth) covers the earth-moon system. Reverse-Z like the main depth
//! buffer: cleared to 0.0, nearer fragments win with `GreaterEqual`.

use crate::depth::{DepthBuffer, depth_texture};
use crate::pipeline::SceneLayouts;
use crate::buffer::VertexPositionNormalUv;
use glam::{Mat4, Vec3};
use std::num::NonZeroU64;

/// Radius around the focus point that must fit in the light frustum.
const FOCUS_RADIUS: f32 = 3.0;
/// Extra angular margin around the focus radius.
const FOV_MARGIN: f32 = 1.2;
/// Depth range kept in front of and behind the focus point.
const DEPTH_SLAB: f32 = 10.0;

pub const SHADOW_SHADER_SOURCE: &str = r#"
struct LightMatrix {
    view_proj: mat4x4<f32>,
};

struct Object {
    model: mat4x4<f32>,
    normal_matrix: mat4x4<f32>,
    color: vec4<f32>,
    params: vec4<f32>,
};

@group(0) @binding(0) var<uniform> light: LightMatrix;
@group(1) @binding(0) var<uniform> object: Object;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
};

@vertex
fn vs_shadow(in: VertexInput) -> @builtin(position) vec4<f32> {
    return light.view_proj * object.model * vec4<f32>(in.position, 1.0);
}
"#;

/// Reverse-Z view-projection of a point light looking at `focus`.
pub fn light_view_projection(light: Vec3, focus: Vec3) -> Mat4 {
    let distance = light.distance(focus).max(FOCUS_RADIUS + 0.1);
    let fov = 2.0 * (FOCUS_RADIUS / distance).atan() * FOV_MARGIN;
    let near = (distance - DEPTH_SLAB).max(0.1);
    let far = distance + DEPTH_SLAB;
    let up = if (focus - light).normalize().abs().dot(Vec3::Y) > 0.99 {
        Vec3::Z
    } else {
        Vec3::Y
    };
    let view = Mat4::look_at_rh(light, focus, up);
    let projection = Mat4::perspective_rh(fov, 1.0, far, near);
    projection * view
}

pub struct ShadowPipeline {
    pub pipeline: wgpu::RenderPipeline,
    pub light_bind_group_layout: wgpu::BindGroupLayout,
    pub light_buffer: wgpu::Buffer,
    pub light_bind_group: wgpu::BindGroup,
    pub map: wgpu::Texture,
    pub map_view: wgpu::TextureView,
    /// Samples `map` for the lit pipeline's group 3.
    pub sample_bind_group: wgpu::BindGroup,
    size: u32,
}

impl ShadowPipeline {
    pub fn new(device: &wgpu::Device, layouts: &SceneLayouts, size: u32) -> Self {
        let size = size.max(1);
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("shadow-shader"),
            source: wgpu::ShaderSource::Wgsl(SHADOW_SHADER_SOURCE.into()),
        });

        let light_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("shadow-light-bgl"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: NonZeroU64::new(64), // mat4x4<f32>
                    },
                    count: None,
                }],
            });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("shadow-pipeline-layout"),
            bind_group_layouts: &[&light_bind_group_layout, &layouts.object],
            immediate_size: 0,
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("shadow-depth-pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_shadow"),
                buffers: &[VertexPositionNormalUv::layout()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Front), // front-face culling reduces acne
                unclipped_depth: false,
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
            },
            // Negative in reverse-Z: pushes stored depth away from the light.
            depth_stencil: Some(DepthBuffer::state(wgpu::DepthBiasState {
                constant: -2,
                slope_scale: -1.75,
                clamp: 0.0,
            })),
            multisample: wgpu::MultisampleState::default(),
            fragment: None,
            multiview_mask: None,
            cache: None,
        });

        let light_buffer = crate::buffer::BufferAllocator::new(device)
            .create_uniform("shadow-light", &Mat4::IDENTITY.to_cols_array_2d());
        let light_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("shadow-light-bg"),
            layout: &light_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: light_buffer.as_entire_binding(),
            }],
        });

        let map = depth_texture(
            device,
            "shadow-map",
            (size, size),
            wgpu::TextureUsages::TEXTURE_BINDING,
        );
        let map_view = map.create_view(&wgpu::TextureViewDescriptor::default());

        let compare_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("shadow-compare-sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            compare: Some(DepthBuffer::COMPARE_FUNCTION),
            ..Default::default()
        });
        let sample_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("shadow-sample-bg"),
            layout: &layouts.shadow,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&map_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&compare_sampler),
                },
            ],
        });

        Self {
            pipeline,
            light_bind_group_layout,
            light_buffer,
            light_bind_group,
            map,
            map_view,
            sample_bind_group,
            size,
        }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn set_light(&self, queue: &wgpu::Queue, view_proj: Mat4) {
        queue.write_buffer(
            &self.light_buffer,
            0,
            bytemuck::bytes_of(&view_proj.to_cols_array_2d()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_ndc(m: Mat4, p: Vec3) -> Vec3 {
        m.project_point3(p)
    }

    #[test]
    fn test_focus_projects_to_center() {
        let light = Vec3::new(-50.0, 20.0, -60.0);
        let m = light_view_projection(light, Vec3::ZERO);
        let c = to_ndc(m, Vec3::ZERO);
        assert!(c.x.abs() < 1e-4 && c.y.abs() < 1e-4);
        assert!(c.z > 0.0 && c.z < 1.0);
    }

    #[test]
    fn test_moon_orbit_fits_in_frustum() {
        let light = Vec3::new(-50.0, 20.0, -60.0);
        let m = light_view_projection(light, Vec3::ZERO);
        for p in [
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::new(-2.0, 0.0, 0.0),
            Vec3::new(0.0, 2.0, 0.0),
            Vec3::new(0.0, 0.0, 2.0),
        ] {
            let c = to_ndc(m, p);
            assert!(c.x.abs() < 1.0 && c.y.abs() < 1.0, "{p} -> {c}");
        }
    }

    #[test]
    fn test_reverse_z_nearer_is_greater() {
        let light = Vec3::new(0.0, 0.0, 40.0);
        let m = light_view_projection(light, Vec3::ZERO);
        let near = to_ndc(m, Vec3::new(0.0, 0.0, 1.0));
        let far = to_ndc(m, Vec3::new(0.0, 0.0, -1.0));
        assert!(near.z > far.z);
    }

    #[test]
    fn test_light_straight_above_has_valid_basis() {
        let m = light_view_projection(Vec3::new(0.0, 30.0, 0.0), Vec3::ZERO);
        assert!(m.is_finite());
    }

    #[test]
    fn test_shadow_map_allocated_at_size() {
        let Some((device, _queue)) = crate::test_util::create_test_device() else {
            return;
        };
        let layouts = SceneLayouts::new(&device);
        let shadow = ShadowPipeline::new(&device, &layouts, 512);
        assert_eq!(shadow.size(), 512);
        assert_eq!(shadow.map.width(), 512);
        assert_eq!(shadow.map.format(), DepthBuffer::FORMAT);
    }
}
