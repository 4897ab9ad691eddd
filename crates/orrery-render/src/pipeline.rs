//! Bind group layouts, uniforms and pipeline construction shared by the
//! mesh shaders.
//!
//! Group layout used by every mesh pipeline:
//! - group 0: [`FrameUniform`] (camera, light, ambient)
//! - group 1: [`ObjectUniform`] (model matrix, material scalars)
//! - group 2: colour map, bump map, sampler
//! - group 3: shadow map + comparison sampler (lit pipeline only)

use crate::buffer::VertexPositionNormalUv;
use crate::depth::DepthBuffer;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use orrery_scene::Side;
use std::collections::HashMap;
use std::num::NonZeroU64;

/// Per-frame uniform (192 bytes).
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct FrameUniform {
    pub view_proj: [[f32; 4]; 4],
    pub camera_pos: [f32; 4],
    pub light_view_proj: [[f32; 4]; 4],
    pub light_pos: [f32; 4],
    /// Colour times intensity; `w` is 1.0 when the light casts shadows.
    pub light_color: [f32; 4],
    pub ambient: [f32; 4],
}

impl Default for FrameUniform {
    fn default() -> Self {
        Self {
            view_proj: Mat4::IDENTITY.to_cols_array_2d(),
            camera_pos: [0.0; 4],
            light_view_proj: Mat4::IDENTITY.to_cols_array_2d(),
            light_pos: [0.0; 4],
            light_color: [0.0; 4],
            ambient: [0.0; 4],
        }
    }
}

/// Per-object uniform (160 bytes).
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct ObjectUniform {
    pub model: [[f32; 4]; 4],
    pub normal_matrix: [[f32; 4]; 4],
    pub color: [f32; 4],
    /// x: bump scale, y: shininess, z: receives shadows (0/1).
    pub params: [f32; 4],
}

impl ObjectUniform {
    pub fn new(model: Mat4, color: Vec3, bump_scale: f32, shininess: f32, receive: bool) -> Self {
        Self {
            model: model.to_cols_array_2d(),
            normal_matrix: model.inverse().transpose().to_cols_array_2d(),
            color: color.extend(1.0).to_array(),
            params: [bump_scale, shininess, if receive { 1.0 } else { 0.0 }, 0.0],
        }
    }
}

/// Vertex stage, uniforms and material bindings common to every mesh shader.
pub const MESH_COMMON_WGSL: &str = r#"
struct Frame {
    view_proj: mat4x4<f32>,
    camera_pos: vec4<f32>,
    light_view_proj: mat4x4<f32>,
    light_pos: vec4<f32>,
    light_color: vec4<f32>,
    ambient: vec4<f32>,
};

struct Object {
    model: mat4x4<f32>,
    normal_matrix: mat4x4<f32>,
    color: vec4<f32>,
    params: vec4<f32>,
};

@group(0) @binding(0) var<uniform> frame: Frame;
@group(1) @binding(0) var<uniform> object: Object;
@group(2) @binding(0) var map_texture: texture_2d<f32>;
@group(2) @binding(1) var bump_texture: texture_2d<f32>;
@group(2) @binding(2) var material_sampler: sampler;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
};

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    let world = object.model * vec4<f32>(in.position, 1.0);
    var out: VertexOutput;
    out.clip_position = frame.view_proj * world;
    out.world_position = world.xyz;
    out.normal = (object.normal_matrix * vec4<f32>(in.normal, 0.0)).xyz;
    out.uv = in.uv;
    return out;
}
"#;

fn uniform_entry(
    binding: u32,
    visibility: wgpu::ShaderStages,
    size: u64,
) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: NonZeroU64::new(size),
        },
        count: None,
    }
}

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

/// Bind group layouts shared by the unlit, lit and shadow pipelines.
pub struct SceneLayouts {
    pub frame: wgpu::BindGroupLayout,
    pub object: wgpu::BindGroupLayout,
    pub material: wgpu::BindGroupLayout,
    pub shadow: wgpu::BindGroupLayout,
}

impl SceneLayouts {
    pub fn new(device: &wgpu::Device) -> Self {
        let stages = wgpu::ShaderStages::VERTEX_FRAGMENT;
        let frame = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("frame-bgl"),
            entries: &[uniform_entry(
                0,
                stages,
                std::mem::size_of::<FrameUniform>() as u64,
            )],
        });
        let object = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("object-bgl"),
            entries: &[uniform_entry(
                0,
                stages,
                std::mem::size_of::<ObjectUniform>() as u64,
            )],
        });
        let material = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("material-bgl"),
            entries: &[
                texture_entry(0),
                texture_entry(1),
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });
        let shadow = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("shadow-sample-bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Depth,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                    count: None,
                },
            ],
        });

        Self {
            frame,
            object,
            material,
            shadow,
        }
    }
}

/// Everything that forces a distinct pipeline object for the same shader.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub side: Side,
    pub transparent: bool,
    pub format: wgpu::TextureFormat,
}

impl PipelineKey {
    pub fn cull_mode(&self) -> Option<wgpu::Face> {
        match self.side {
            Side::Front => Some(wgpu::Face::Back),
            Side::Back => Some(wgpu::Face::Front),
            Side::Double => None,
        }
    }

    pub fn blend(&self) -> Option<wgpu::BlendState> {
        self.transparent.then_some(wgpu::BlendState::ALPHA_BLENDING)
    }
}

/// One shader module with its layout, plus the pipeline variants built from
/// it so far.
pub struct MeshPipeline {
    label: &'static str,
    shader: wgpu::ShaderModule,
    layout: wgpu::PipelineLayout,
    variants: HashMap<PipelineKey, wgpu::RenderPipeline>,
}

impl MeshPipeline {
    pub fn new(
        device: &wgpu::Device,
        label: &'static str,
        source: String,
        bind_group_layouts: &[&wgpu::BindGroupLayout],
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(label),
            bind_group_layouts,
            immediate_size: 0,
        });
        Self {
            label,
            shader,
            layout,
            variants: HashMap::new(),
        }
    }

    /// Build the variant for `key` on first use.
    pub fn prepare(&mut self, device: &wgpu::Device, key: PipelineKey) {
        if self.variants.contains_key(&key) {
            return;
        }
        log::debug!("Building {} pipeline for {key:?}", self.label);
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(self.label),
            layout: Some(&self.layout),
            vertex: wgpu::VertexState {
                module: &self.shader,
                entry_point: Some("vs_main"),
                buffers: &[VertexPositionNormalUv::layout()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: key.cull_mode(),
                unclipped_depth: false,
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil: Some(DepthBuffer::state(Default::default())),
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &self.shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: key.format,
                    blend: key.blend(),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multiview_mask: None,
            cache: None,
        });
        self.variants.insert(key, pipeline);
    }

    /// A variant previously built with [`MeshPipeline::prepare`].
    pub fn get(&self, key: &PipelineKey) -> Option<&wgpu::RenderPipeline> {
        self.variants.get(key)
    }

    pub fn variant_count(&self) -> usize {
        self.variants.len()
    }
}
