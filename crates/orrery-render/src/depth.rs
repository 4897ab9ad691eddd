//! Reverse-Z depth: near maps to 1.0 and far to 0.0.
//!
//! The galaxy backdrop sits at radius 80 while the moon is 0.2 units
//! across, so float precision is spent near the far plane.

pub struct DepthBuffer {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    size: (u32, u32),
}

impl DepthBuffer {
    pub const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

    /// The far plane.
    pub const CLEAR_VALUE: f32 = 0.0;

    pub const COMPARE_FUNCTION: wgpu::CompareFunction = wgpu::CompareFunction::GreaterEqual;

    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let size = (width.max(1), height.max(1));
        let texture = depth_texture(device, "scene-depth", size, wgpu::TextureUsages::empty());
        Self {
            view: texture.create_view(&Default::default()),
            texture,
            size,
        }
    }

    /// Depth test and write for every pipeline drawing into this buffer.
    pub fn state(bias: wgpu::DepthBiasState) -> wgpu::DepthStencilState {
        wgpu::DepthStencilState {
            format: Self::FORMAT,
            depth_write_enabled: true,
            depth_compare: Self::COMPARE_FUNCTION,
            stencil: Default::default(),
            bias,
        }
    }

    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        if (width.max(1), height.max(1)) != self.size {
            *self = Self::new(device, width, height);
        }
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }
}

/// A single-level [`DepthBuffer::FORMAT`] texture usable as an attachment,
/// plus any `extra` usages.
pub(crate) fn depth_texture(
    device: &wgpu::Device,
    label: &str,
    (width, height): (u32, u32),
    extra: wgpu::TextureUsages,
) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DepthBuffer::FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | extra,
        view_formats: &[],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::create_test_device;

    #[test]
    fn test_state_is_reverse_z() {
        let state = DepthBuffer::state(Default::default());
        assert_eq!(state.format, wgpu::TextureFormat::Depth32Float);
        assert_eq!(state.depth_compare, wgpu::CompareFunction::GreaterEqual);
        assert!(state.depth_write_enabled);
        assert_eq!(DepthBuffer::CLEAR_VALUE, 0.0);
    }

    #[test]
    fn test_resize_reallocates_only_on_change() {
        let Some((device, _queue)) = create_test_device() else {
            return;
        };
        let mut depth = DepthBuffer::new(&device, 800, 600);
        depth.resize(&device, 800, 600);
        assert_eq!(depth.size(), (800, 600));

        depth.resize(&device, 1920, 1080);
        assert_eq!(depth.size(), (1920, 1080));
        assert_eq!(depth.texture.width(), 1920);
    }

    #[test]
    fn test_zero_size_is_clamped() {
        let Some((device, _queue)) = create_test_device() else {
            return;
        };
        let depth = DepthBuffer::new(&device, 0, 0);
        assert_eq!(depth.size(), (1, 1));
    }
}
