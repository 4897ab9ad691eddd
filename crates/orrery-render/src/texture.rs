//! Texture storage for scene materials.
//!
//! [`TextureManager`] owns every uploaded map and issues [`TextureHandle`]s
//! in upload order. [`TextureAssets`] adapts it to [`AssetSource`] so scene
//! construction can load maps by file name.

use orrery_scene::{AssetError, AssetSource, TextureHandle};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

/// An uploaded texture and its full-mip view.
pub struct ManagedTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub dimensions: (u32, u32),
    pub format: wgpu::TextureFormat,
    pub mip_level_count: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum TextureError {
    #[error("{width}x{height} {format:?} needs {expected} bytes, got {actual}")]
    DataSizeMismatch {
        actual: usize,
        expected: usize,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
    },

    #[error("texture has an empty extent ({width}x{height})")]
    ZeroDimensions { width: u32, height: u32 },
}

/// Pixel data for one upload.
#[derive(Clone, Copy)]
pub struct TextureUpload<'a> {
    pub name: &'a str,
    pub pixels: &'a [u8],
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
    pub mipmapped: bool,
}

impl TextureUpload<'_> {
    fn texel_size(&self) -> u32 {
        self.format.block_copy_size(None).unwrap_or(4)
    }

    fn check(&self) -> Result<(), TextureError> {
        let (width, height, format) = (self.width, self.height, self.format);
        if width == 0 || height == 0 {
            return Err(TextureError::ZeroDimensions { width, height });
        }
        let expected = width as usize * height as usize * self.texel_size() as usize;
        if self.pixels.len() != expected {
            return Err(TextureError::DataSizeMismatch {
                actual: self.pixels.len(),
                expected,
                width,
                height,
                format,
            });
        }
        Ok(())
    }

    fn levels(&self) -> u32 {
        if self.mipmapped {
            mip_level_count(self.width, self.height)
        } else {
            1
        }
    }
}

/// Full mip chain length down to 1×1.
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    u32::BITS - width.max(height).max(1).leading_zeros()
}

const DOWNSAMPLE_WGSL: &str = r#"
@group(0) @binding(0) var level_above: texture_2d<f32>;
@group(0) @binding(1) var linear_clamp: sampler;

struct Varyings {
    @builtin(position) clip: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) i: u32) -> Varyings {
    let corner = vec2<f32>(f32((i << 1u) & 2u), f32(i & 2u));
    var v: Varyings;
    v.clip = vec4<f32>(corner * 2.0 - 1.0, 0.0, 1.0);
    v.uv = vec2<f32>(corner.x, 1.0 - corner.y);
    return v;
}

@fragment
fn fs_main(v: Varyings) -> @location(0) vec4<f32> {
    return textureSample(level_above, linear_clamp, v.uv);
}
"#;

/// Fills mip levels by repeatedly drawing each level into the next with a
/// bilinear sampler. Pipelines are built once per texture format.
struct MipChainBuilder {
    shader: wgpu::ShaderModule,
    layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    sampler: wgpu::Sampler,
    pipelines: HashMap<wgpu::TextureFormat, wgpu::RenderPipeline>,
}

impl MipChainBuilder {
    fn new(device: &wgpu::Device) -> Self {
        let sampled = |binding, ty| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty,
            count: None,
        };
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("mip-chain-layout"),
            entries: &[
                sampled(
                    0,
                    wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                ),
                sampled(
                    1,
                    wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                ),
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("mip-chain-pipeline-layout"),
            bind_group_layouts: &[&layout],
            immediate_size: 0,
        });
        Self {
            shader: device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("mip-chain-shader"),
                source: wgpu::ShaderSource::Wgsl(DOWNSAMPLE_WGSL.into()),
            }),
            layout,
            pipeline_layout,
            sampler: device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some("mip-chain-sampler"),
                mag_filter: wgpu::FilterMode::Linear,
                min_filter: wgpu::FilterMode::Linear,
                ..Default::default()
            }),
            pipelines: HashMap::new(),
        }
    }

    fn ensure_pipeline(&mut self, device: &wgpu::Device, format: wgpu::TextureFormat) {
        let shader = &self.shader;
        let pipeline_layout = &self.pipeline_layout;
        self.pipelines.entry(format).or_insert_with(|| {
            log::debug!("Building mip chain pipeline for {format:?}");
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("mip-chain-pipeline"),
                layout: Some(pipeline_layout),
                vertex: wgpu::VertexState {
                    module: shader,
                    entry_point: Some("vs_main"),
                    buffers: &[],
                    compilation_options: Default::default(),
                },
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module: shader,
                    entry_point: Some("fs_main"),
                    targets: &[Some(format.into())],
                    compilation_options: Default::default(),
                }),
                multiview_mask: None,
                cache: None,
            })
        });
    }

    fn build(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, target: &ManagedTexture) {
        let level_view = |level: u32| {
            target.texture.create_view(&wgpu::TextureViewDescriptor {
                label: Some("mip-level"),
                base_mip_level: level,
                mip_level_count: Some(1),
                ..Default::default()
            })
        };
        self.ensure_pipeline(device, target.format);
        let Some(pipeline) = self.pipelines.get(&target.format) else {
            return;
        };

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("mip-chain"),
        });
        let mut above = level_view(0);
        for level in 1..target.mip_level_count {
            let below = level_view(level);
            let inputs = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("mip-chain-inputs"),
                layout: &self.layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&above),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&self.sampler),
                    },
                ],
            });
            {
                let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("mip-chain-level"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &below,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                        depth_slice: None,
                    })],
                    ..Default::default()
                });
                pass.set_pipeline(pipeline);
                pass.set_bind_group(0, &inputs, &[]);
                pass.draw(0..3, 0..1);
            }
            above = below;
        }
        queue.submit([encoder.finish()]);
    }
}

/// Owns every material texture, plus a 1×1 white map bound wherever a
/// material has none.
pub struct TextureManager {
    textures: Vec<Arc<ManagedTexture>>,
    by_name: HashMap<String, TextureHandle>,
    white: Arc<ManagedTexture>,
    sampler: wgpu::Sampler,
    mips: MipChainBuilder,
}

impl TextureManager {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let white = Arc::new(allocate(
            device,
            queue,
            &TextureUpload {
                name: "white",
                pixels: &[255; 4],
                width: 1,
                height: 1,
                format: wgpu::TextureFormat::Rgba8Unorm,
                mipmapped: false,
            },
        ));
        // Equirectangular maps wrap around the sphere in u only.
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("material-sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Linear,
            ..Default::default()
        });
        Self {
            textures: Vec::new(),
            by_name: HashMap::new(),
            white,
            sampler,
            mips: MipChainBuilder::new(device),
        }
    }

    /// Upload `upload`, or return the handle already issued for its name.
    pub fn create_texture(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        upload: TextureUpload<'_>,
    ) -> Result<TextureHandle, TextureError> {
        if let Some(handle) = self.handle_of(upload.name) {
            return Ok(handle);
        }
        upload.check()?;

        let managed = allocate(device, queue, &upload);
        if managed.mip_level_count > 1 {
            self.mips.build(device, queue, &managed);
        }
        log::info!(
            "Texture '{}' uploaded: {}x{} {:?}, {} levels",
            upload.name,
            upload.width,
            upload.height,
            upload.format,
            managed.mip_level_count
        );

        let handle = TextureHandle::new(self.textures.len() as u32);
        self.textures.push(Arc::new(managed));
        self.by_name.insert(upload.name.to_owned(), handle);
        Ok(handle)
    }

    pub fn get(&self, handle: TextureHandle) -> Option<&Arc<ManagedTexture>> {
        self.textures.get(handle.index() as usize)
    }

    pub fn handle_of(&self, name: &str) -> Option<TextureHandle> {
        self.by_name.get(name).copied()
    }

    /// View for `handle`; the white map when there is none.
    pub fn view_or_white(&self, handle: Option<TextureHandle>) -> &wgpu::TextureView {
        match handle.and_then(|h| self.get(h)) {
            Some(texture) => &texture.view,
            None => &self.white.view,
        }
    }

    pub fn sampler(&self) -> &wgpu::Sampler {
        &self.sampler
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }
}

/// Create the texture and write level 0.
fn allocate(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    upload: &TextureUpload<'_>,
) -> ManagedTexture {
    let extent = wgpu::Extent3d {
        width: upload.width,
        height: upload.height,
        depth_or_array_layers: 1,
    };
    let mip_level_count = upload.levels();
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(upload.name),
        size: extent,
        mip_level_count,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: upload.format,
        // Mip levels past 0 are render targets of the chain builder.
        usage: wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_DST
            | wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    queue.write_texture(
        texture.as_image_copy(),
        upload.pixels,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(upload.width * upload.texel_size()),
            rows_per_image: Some(upload.height),
        },
        extent,
    );
    ManagedTexture {
        view: texture.create_view(&Default::default()),
        texture,
        dimensions: (upload.width, upload.height),
        format: upload.format,
        mip_level_count,
    }
}

/// [`AssetSource`] reading image files from one directory.
///
/// Colour maps become sRGB textures. Names in the `linear` set (bump maps)
/// stay linear so their heights are not gamma-decoded on sampling.
pub struct TextureAssets<'a> {
    device: &'a wgpu::Device,
    queue: &'a wgpu::Queue,
    manager: &'a mut TextureManager,
    dir: PathBuf,
    linear: HashSet<String>,
}

impl<'a> TextureAssets<'a> {
    pub fn new(
        device: &'a wgpu::Device,
        queue: &'a wgpu::Queue,
        manager: &'a mut TextureManager,
        dir: impl Into<PathBuf>,
        linear: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            device,
            queue,
            manager,
            dir: dir.into(),
            linear: linear.into_iter().collect(),
        }
    }

    fn format_for(&self, name: &str) -> wgpu::TextureFormat {
        if self.linear.contains(name) {
            wgpu::TextureFormat::Rgba8Unorm
        } else {
            wgpu::TextureFormat::Rgba8UnormSrgb
        }
    }
}

impl AssetSource for TextureAssets<'_> {
    fn load_texture(&mut self, name: &str) -> Result<TextureHandle, AssetError> {
        if let Some(handle) = self.manager.handle_of(name) {
            return Ok(handle);
        }

        let path = self.dir.join(name);
        if !path.is_file() {
            return Err(AssetError::NotFound {
                name: name.to_owned(),
                path: path.display().to_string(),
            });
        }
        let decode_failed = |reason: String| AssetError::Decode {
            name: name.to_owned(),
            reason,
        };

        let rgba = image::open(&path)
            .map_err(|e| decode_failed(e.to_string()))?
            .into_rgba8();
        let upload = TextureUpload {
            name,
            pixels: rgba.as_raw(),
            width: rgba.width(),
            height: rgba.height(),
            format: self.format_for(name),
            mipmapped: true,
        };
        self.manager
            .create_texture(self.device, self.queue, upload)
            .map_err(|e| decode_failed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::create_test_device;

    #[test]
    fn test_mipmap_level_count_calculation() {
        assert_eq!(mip_level_count(1, 1), 1);
        assert_eq!(mip_level_count(2, 2), 2);
        assert_eq!(mip_level_count(4, 4), 3);
        assert_eq!(mip_level_count(512, 256), 10);
        assert_eq!(mip_level_count(2048, 1024), 12);
    }

    fn upload<'a>(name: &'a str, pixels: &'a [u8], width: u32, height: u32) -> TextureUpload<'a> {
        TextureUpload {
            name,
            pixels,
            width,
            height,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            mipmapped: false,
        }
    }

    #[test]
    fn test_upload_validation_without_device() {
        assert!(upload("ok", &[0; 32], 4, 2).check().is_ok());
        assert!(matches!(
            upload("zero", &[], 0, 3).check(),
            Err(TextureError::ZeroDimensions { width: 0, height: 3 })
        ));
        assert!(matches!(
            upload("short", &[0; 12], 2, 2).check(),
            Err(TextureError::DataSizeMismatch { actual: 12, expected: 16, .. })
        ));
    }

    #[test]
    fn test_create_texture_issues_sequential_handles() {
        let Some((device, queue)) = create_test_device() else {
            return;
        };
        let mut manager = TextureManager::new(&device, &queue);
        let a = manager
            .create_texture(&device, &queue, upload("a", &[255; 16], 2, 2))
            .unwrap();
        let b = manager
            .create_texture(&device, &queue, upload("b", &[0; 64], 4, 4))
            .unwrap();
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(manager.get(b).unwrap().dimensions, (4, 4));
    }

    #[test]
    fn test_texture_cache_deduplicates() {
        let Some((device, queue)) = create_test_device() else {
            return;
        };
        let mut manager = TextureManager::new(&device, &queue);
        let first = manager
            .create_texture(&device, &queue, upload("shared", &[255; 16], 2, 2))
            .unwrap();
        let second = manager
            .create_texture(&device, &queue, upload("shared", &[255; 16], 2, 2))
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_mipmap_generation_sets_mip_count() {
        let Some((device, queue)) = create_test_device() else {
            return;
        };
        let mut manager = TextureManager::new(&device, &queue);
        let data = vec![255u8; 256 * 128 * 4];
        let mipmapped = TextureUpload {
            mipmapped: true,
            ..upload("mipmapped", &data, 256, 128)
        };
        let handle = manager.create_texture(&device, &queue, mipmapped).unwrap();
        assert_eq!(manager.get(handle).unwrap().mip_level_count, 9);
    }

    #[test]
    fn test_unknown_handle_falls_back_to_white() {
        let Some((device, queue)) = create_test_device() else {
            return;
        };
        let manager = TextureManager::new(&device, &queue);
        assert!(manager.get(TextureHandle::new(7)).is_none());
        // Both resolve to the fallback view without panicking.
        let _ = manager.view_or_white(None);
        let _ = manager.view_or_white(Some(TextureHandle::new(7)));
        assert!(manager.is_empty());
    }

    #[test]
    fn test_assets_load_png_and_pick_format() {
        let Some((device, queue)) = create_test_device() else {
            return;
        };
        let dir = tempfile::tempdir().unwrap();
        let img = image::RgbaImage::from_pixel(8, 4, image::Rgba([10, 20, 30, 255]));
        img.save(dir.path().join("earth.png")).unwrap();
        img.save(dir.path().join("bump.png")).unwrap();

        let mut manager = TextureManager::new(&device, &queue);
        let mut assets = TextureAssets::new(
            &device,
            &queue,
            &mut manager,
            dir.path(),
            ["bump.png".to_string()],
        );
        let color = assets.load_texture("earth.png").unwrap();
        let bump = assets.load_texture("bump.png").unwrap();
        let again = assets.load_texture("earth.png").unwrap();
        assert_eq!(color, again);

        let color = manager.get(color).unwrap();
        assert_eq!(color.dimensions, (8, 4));
        assert_eq!(color.format, wgpu::TextureFormat::Rgba8UnormSrgb);
        assert_eq!(
            manager.get(bump).unwrap().format,
            wgpu::TextureFormat::Rgba8Unorm
        );
    }

    #[test]
    fn test_assets_missing_file_is_not_found() {
        let Some((device, queue)) = create_test_device() else {
            return;
        };
        let dir = tempfile::tempdir().unwrap();
        let mut manager = TextureManager::new(&device, &queue);
        let mut assets =
            TextureAssets::new(&device, &queue, &mut manager, dir.path(), Vec::new());
        let err = assets.load_texture("missing.jpg").unwrap_err();
        assert!(matches!(err, AssetError::NotFound { ref name, .. } if name == "missing.jpg"));
    }

    #[test]
    fn test_assets_corrupt_file_is_decode_error() {
        let Some((device, queue)) = create_test_device() else {
            return;
        };
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.png"), b"not an image").unwrap();
        let mut manager = TextureManager::new(&device, &queue);
        let mut assets =
            TextureAssets::new(&device, &queue, &mut manager, dir.path(), Vec::new());
        let err = assets.load_texture("broken.png").unwrap_err();
        assert!(matches!(err, AssetError::Decode { .. }));
    }
}
