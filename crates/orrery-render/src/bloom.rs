//! Bloom over the Glow layer.
//!
//! The glow pass draws into an HDR target owned here. [`BloomPipeline::execute`]
//! then runs a fixed schedule of fullscreen passes: bright-pass into the
//! first chain level, box downsamples to the smallest level, weighted
//! additive upsamples back to the first, and finally `hdr + strength * glow`
//! onto the swapchain image.

use crate::compositor::BloomSettings;
use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

pub const HDR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// Width of the smoothstep band above the threshold.
const SMOOTH_WIDTH: f32 = 0.01;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub(crate) struct BloomParams {
    pub threshold: f32,
    pub smooth_width: f32,
    /// Multiplier on the sampled colour in the upsample and composite passes.
    pub scale: f32,
    pub _pad: f32,
}

const BLOOM_WGSL: &str = r#"
struct Params {
    threshold: f32,
    smooth_width: f32,
    scale: f32,
    _pad: f32,
};

struct Varyings {
    @builtin(position) clip: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@group(0) @binding(0) var<uniform> params: Params;
@group(1) @binding(0) var source: texture_2d<f32>;
@group(1) @binding(1) var source_sampler: sampler;

@vertex
fn vs_fullscreen(@builtin(vertex_index) i: u32) -> Varyings {
    let corner = vec2<f32>(f32((i << 1u) & 2u), f32(i & 2u));
    var v: Varyings;
    v.clip = vec4<f32>(corner * 2.0 - 1.0, 0.0, 1.0);
    v.uv = vec2<f32>(corner.x, 1.0 - corner.y);
    return v;
}

fn fetch(uv: vec2<f32>) -> vec3<f32> {
    return textureSample(source, source_sampler, uv).rgb;
}

@fragment
fn fs_extract(v: Varyings) -> @location(0) vec4<f32> {
    let color = textureSample(source, source_sampler, v.uv);
    let luma = dot(color.rgb, vec3<f32>(0.299, 0.587, 0.114));
    let keep = smoothstep(params.threshold, params.threshold + params.smooth_width, luma);
    return color * keep;
}

@fragment
fn fs_downsample(v: Varyings) -> @location(0) vec4<f32> {
    let d = 1.0 / vec2<f32>(textureDimensions(source));
    let sum = fetch(v.uv - d) + fetch(v.uv + d)
        + fetch(v.uv + vec2<f32>(d.x, -d.y)) + fetch(v.uv + vec2<f32>(-d.x, d.y));
    return vec4<f32>(sum * 0.25, 1.0);
}

@fragment
fn fs_scaled(v: Varyings) -> @location(0) vec4<f32> {
    return vec4<f32>(fetch(v.uv) * params.scale, 1.0);
}

@fragment
fn fs_copy(v: Varyings) -> @location(0) vec4<f32> {
    return vec4<f32>(fetch(v.uv), 1.0);
}
"#;

/// Per-pass weights derived from [`BloomSettings`].
///
/// Upsampling folds level `i + 1` into level `i` scaled by `f[i+1] / f[i]`,
/// so after the chain level 0 holds `sum(f[i] * level[i]) / f[0]`. The
/// composite multiplies by `strength * f[0]`.
pub(crate) fn pass_scales(settings: &BloomSettings, levels: u32) -> (Vec<f32>, f32) {
    let factors = settings.level_factors(levels);
    let upsample = factors
        .windows(2)
        .map(|w| w[1] / w[0].max(1e-4))
        .collect();
    let composite = settings.strength * factors.first().copied().unwrap_or(1.0);
    (upsample, composite)
}

/// Sizes of the blur chain: half resolution first, halving per level.
pub(crate) fn mip_sizes(width: u32, height: u32, levels: u32) -> Vec<(u32, u32)> {
    std::iter::successors(Some(((width / 2).max(1), (height / 2).max(1))), |&(w, h)| {
        Some(((w / 2).max(1), (h / 2).max(1)))
    })
    .take(levels.max(1) as usize)
    .collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Program {
    Extract,
    Downsample,
    Upsample,
    Copy,
    Composite,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Source {
    Hdr,
    Level(usize),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Dest {
    Level(usize),
    Surface,
}

/// One fullscreen draw of the bloom schedule.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Step {
    pub program: Program,
    pub source: Source,
    pub dest: Dest,
    /// Index into the uniform slots.
    pub params: usize,
    /// Clear the destination first; otherwise blend onto it.
    pub clear: bool,
}

/// The pass order for a chain of `levels` blur levels.
pub(crate) fn schedule(levels: usize) -> Vec<Step> {
    let step = |program, source, dest, params, clear| Step {
        program,
        source,
        dest,
        params,
        clear,
    };
    let mut steps = vec![step(Program::Extract, Source::Hdr, Dest::Level(0), 0, true)];
    steps.extend((1..levels).map(|i| {
        step(Program::Downsample, Source::Level(i - 1), Dest::Level(i), 0, true)
    }));
    steps.extend((0..levels.saturating_sub(1)).rev().map(|i| {
        step(Program::Upsample, Source::Level(i + 1), Dest::Level(i), i + 1, false)
    }));
    steps.push(step(Program::Copy, Source::Hdr, Dest::Surface, 0, true));
    steps.push(step(Program::Composite, Source::Level(0), Dest::Surface, 0, false));
    steps
}

struct ParamSlot {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

/// A sampled render target.
struct Target {
    view: wgpu::TextureView,
    input: wgpu::BindGroup,
}

struct Programs {
    extract: wgpu::RenderPipeline,
    downsample: wgpu::RenderPipeline,
    upsample: wgpu::RenderPipeline,
    copy: wgpu::RenderPipeline,
    composite: wgpu::RenderPipeline,
}

impl Programs {
    fn get(&self, program: Program) -> &wgpu::RenderPipeline {
        match program {
            Program::Extract => &self.extract,
            Program::Downsample => &self.downsample,
            Program::Upsample => &self.upsample,
            Program::Copy => &self.copy,
            Program::Composite => &self.composite,
        }
    }
}

pub struct BloomPipeline {
    levels: u32,
    input_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    programs: Programs,
    /// Slot 0 drives extract and composite. Slot `i + 1` drives the
    /// upsample into level `i`.
    params: Vec<ParamSlot>,
    hdr: Target,
    chain: Vec<Target>,
    steps: Vec<Step>,
}

impl BloomPipeline {
    pub fn new(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
        levels: u32,
    ) -> Self {
        let levels = levels.max(1);
        let fragment_entry = |binding, ty| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty,
            count: None,
        };
        let params_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("bloom-params-layout"),
            entries: &[fragment_entry(
                0,
                wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(size_of::<BloomParams>() as u64),
                },
            )],
        });
        let input_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("bloom-input-layout"),
            entries: &[
                fragment_entry(
                    0,
                    wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                ),
                fragment_entry(
                    1,
                    wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                ),
            ],
        });

        let programs = build_programs(device, &params_layout, &input_layout, surface_format);
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("bloom-sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let params = (0..=levels)
            .map(|slot| {
                let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(&format!("bloom-params-{slot}")),
                    contents: bytemuck::bytes_of(&BloomParams::default()),
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                });
                let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("bloom-params"),
                    layout: &params_layout,
                    entries: &[wgpu::BindGroupEntry {
                        binding: 0,
                        resource: buffer.as_entire_binding(),
                    }],
                });
                ParamSlot { buffer, bind_group }
            })
            .collect();

        let mut bloom = Self {
            levels,
            hdr: allocate_target(device, &input_layout, &sampler, (width, height), "bloom-hdr"),
            chain: Vec::new(),
            steps: schedule(levels as usize),
            input_layout,
            sampler,
            programs,
            params,
        };
        bloom.chain = bloom.allocate_chain(device, width, height);
        bloom
    }

    /// The view the glow pass renders into.
    pub fn hdr_view(&self) -> &wgpu::TextureView {
        &self.hdr.view
    }

    pub fn levels(&self) -> u32 {
        self.levels
    }

    /// Reallocate the HDR target and chain for a new resolution.
    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        self.hdr = allocate_target(
            device,
            &self.input_layout,
            &self.sampler,
            (width, height),
            "bloom-hdr",
        );
        self.chain = self.allocate_chain(device, width, height);
    }

    fn allocate_chain(&self, device: &wgpu::Device, width: u32, height: u32) -> Vec<Target> {
        mip_sizes(width, height, self.levels)
            .into_iter()
            .map(|size| {
                log::trace!("Bloom level {}x{}", size.0, size.1);
                allocate_target(device, &self.input_layout, &self.sampler, size, "bloom-level")
            })
            .collect()
    }

    /// Write the uniform slots for `settings`.
    pub fn update(&self, queue: &wgpu::Queue, settings: &BloomSettings) {
        let (upsample, composite) = pass_scales(settings, self.levels);
        let base = BloomParams {
            threshold: settings.threshold,
            smooth_width: SMOOTH_WIDTH,
            scale: composite,
            _pad: 0.0,
        };
        let scales = std::iter::once(composite).chain(upsample);
        for (slot, scale) in self.params.iter().zip(scales) {
            let params = BloomParams { scale, ..base };
            queue.write_buffer(&slot.buffer, 0, bytemuck::bytes_of(&params));
        }
    }

    /// Record the whole schedule. `surface_view` is fully overwritten.
    pub fn execute(&self, encoder: &mut wgpu::CommandEncoder, surface_view: &wgpu::TextureView) {
        for step in &self.steps {
            let input = match step.source {
                Source::Hdr => &self.hdr.input,
                Source::Level(i) => &self.chain[i].input,
            };
            let (view, clear) = match step.dest {
                Dest::Level(i) => (&self.chain[i].view, wgpu::Color::TRANSPARENT),
                Dest::Surface => (surface_view, wgpu::Color::BLACK),
            };
            let load = if step.clear {
                wgpu::LoadOp::Clear(clear)
            } else {
                wgpu::LoadOp::Load
            };

            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("bloom-step"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                ..Default::default()
            });
            pass.set_pipeline(self.programs.get(step.program));
            pass.set_bind_group(0, &self.params[step.params].bind_group, &[]);
            pass.set_bind_group(1, input, &[]);
            pass.draw(0..3, 0..1);
        }
    }
}

fn build_programs(
    device: &wgpu::Device,
    params_layout: &wgpu::BindGroupLayout,
    input_layout: &wgpu::BindGroupLayout,
    surface_format: wgpu::TextureFormat,
) -> Programs {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("bloom-shader"),
        source: wgpu::ShaderSource::Wgsl(BLOOM_WGSL.into()),
    });
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("bloom-pipeline-layout"),
        bind_group_layouts: &[params_layout, input_layout],
        immediate_size: 0,
    });
    // Adds colour, leaves destination alpha alone.
    let additive = wgpu::BlendState {
        color: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::One,
            operation: wgpu::BlendOperation::Add,
        },
        alpha: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::Zero,
            dst_factor: wgpu::BlendFactor::One,
            operation: wgpu::BlendOperation::Add,
        },
    };
    let fullscreen = |entry: &str, format: wgpu::TextureFormat, blend| {
        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(entry),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_fullscreen"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some(entry),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            multiview_mask: None,
            cache: None,
        })
    };

    Programs {
        extract: fullscreen("fs_extract", HDR_FORMAT, None),
        downsample: fullscreen("fs_downsample", HDR_FORMAT, None),
        upsample: fullscreen("fs_scaled", HDR_FORMAT, Some(additive)),
        copy: fullscreen("fs_copy", surface_format, None),
        composite: fullscreen("fs_scaled", surface_format, Some(additive)),
    }
}

fn allocate_target(
    device: &wgpu::Device,
    input_layout: &wgpu::BindGroupLayout,
    sampler: &wgpu::Sampler,
    (width, height): (u32, u32),
    label: &str,
) -> Target {
    let view = device
        .create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: HDR_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        })
        .create_view(&Default::default());
    let input = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout: input_layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    });
    Target { view, input }
}
