//! Device and swapchain ownership.
//!
//! [`RenderContext`] is created once per window. Everything else in the
//! renderer borrows its device and shares its queue.

use std::sync::Arc;
use winit::window::Window;

#[derive(Debug, thiserror::Error)]
pub enum RenderContextError {
    #[error("no GPU adapter can present to this window")]
    NoAdapter,

    #[error("GPU device request failed: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),

    #[error("window surface could not be created: {0}")]
    SurfaceCreation(#[from] wgpu::CreateSurfaceError),

    #[error("surface reports no supported texture formats")]
    NoSurfaceFormat,
}

/// Why a frame could not get a swapchain image.
#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
    /// Still lost after one reconfigure.
    #[error("surface lost")]
    Lost,

    #[error("out of memory")]
    OutOfMemory,

    /// The presentation engine did not hand out an image in time. The frame
    /// is skipped; the next one usually succeeds.
    #[error("timeout")]
    Timeout,
}

pub struct RenderContext {
    pub instance: wgpu::Instance,
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    /// Shared with [`crate::pass::FrameEncoder`], which submits on drop.
    pub queue: Arc<wgpu::Queue>,
    pub surface: wgpu::Surface<'static>,
    pub surface_config: wgpu::SurfaceConfiguration,
    pub surface_format: wgpu::TextureFormat,
}

impl RenderContext {
    pub async fn new(window: Arc<Window>, vsync: bool) -> Result<Self, RenderContextError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let size = window.inner_size();
        let surface = instance.create_surface(window)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|_| RenderContextError::NoAdapter)?;
        let info = adapter.get_info();
        log::info!("Adapter: {} on {:?} ({:?})", info.name, info.backend, info.device_type);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("orrery-device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::default(),
                experimental_features: wgpu::ExperimentalFeatures::default(),
                trace: wgpu::Trace::Off,
            })
            .await?;

        let caps = surface.get_capabilities(&adapter);
        let surface_format =
            choose_surface_format(&caps.formats).ok_or(RenderContextError::NoSurfaceFormat)?;
        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: select_present_mode(&caps.present_modes, vsync),
            alpha_mode: choose_alpha_mode(&caps.alpha_modes),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        log::debug!(
            "Swapchain {}x{} {:?} {:?}",
            surface_config.width,
            surface_config.height,
            surface_config.format,
            surface_config.present_mode
        );
        surface.configure(&device, &surface_config);

        Ok(Self {
            instance,
            adapter,
            device,
            queue: Arc::new(queue),
            surface,
            surface_config,
            surface_format,
        })
    }

    /// Reconfigure the swapchain. Zero dimensions are raised to 1.
    pub fn resize(&mut self, width: u32, height: u32) {
        let (width, height) = (width.max(1), height.max(1));
        if (width, height) == self.size() {
            return;
        }
        self.surface_config.width = width;
        self.surface_config.height = height;
        self.surface.configure(&self.device, &self.surface_config);
    }

    pub fn size(&self) -> (u32, u32) {
        (self.surface_config.width, self.surface_config.height)
    }

    /// Next swapchain image. A lost or outdated surface is reconfigured and
    /// retried once.
    pub fn get_current_texture(&self) -> Result<wgpu::SurfaceTexture, SurfaceError> {
        let err = match self.surface.get_current_texture() {
            Ok(texture) => return Ok(texture),
            Err(err) => err,
        };
        match err {
            wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => {
                log::warn!("Surface {err:?}, reconfiguring");
                self.surface.configure(&self.device, &self.surface_config);
                self.surface
                    .get_current_texture()
                    .map_err(|_| SurfaceError::Lost)
            }
            wgpu::SurfaceError::OutOfMemory => Err(SurfaceError::OutOfMemory),
            wgpu::SurfaceError::Timeout => Err(SurfaceError::Timeout),
            wgpu::SurfaceError::Other => {
                log::error!("Unrecognised surface error");
                Err(SurfaceError::Lost)
            }
        }
    }
}

/// Blocking wrapper around [`RenderContext::new`].
pub fn init_render_context_blocking(
    window: Arc<Window>,
    vsync: bool,
) -> Result<RenderContext, RenderContextError> {
    pollster::block_on(RenderContext::new(window, vsync))
}

/// First match of Bgra8UnormSrgb, Rgba8UnormSrgb, any sRGB format, any format.
fn choose_surface_format(formats: &[wgpu::TextureFormat]) -> Option<wgpu::TextureFormat> {
    const PREFERRED: [wgpu::TextureFormat; 2] = [
        wgpu::TextureFormat::Bgra8UnormSrgb,
        wgpu::TextureFormat::Rgba8UnormSrgb,
    ];
    PREFERRED
        .into_iter()
        .find(|f| formats.contains(f))
        .or_else(|| formats.iter().copied().find(|f| f.is_srgb()))
        .or_else(|| formats.first().copied())
}

/// Fifo with vsync. Without it, Mailbox, then Immediate, then Fifo.
fn select_present_mode(modes: &[wgpu::PresentMode], vsync: bool) -> wgpu::PresentMode {
    if vsync {
        return wgpu::PresentMode::Fifo;
    }
    [wgpu::PresentMode::Mailbox, wgpu::PresentMode::Immediate]
        .into_iter()
        .find(|m| modes.contains(m))
        .unwrap_or(wgpu::PresentMode::Fifo)
}

fn choose_alpha_mode(modes: &[wgpu::CompositeAlphaMode]) -> wgpu::CompositeAlphaMode {
    if modes.contains(&wgpu::CompositeAlphaMode::Opaque) {
        wgpu::CompositeAlphaMode::Opaque
    } else {
        modes.first().copied().unwrap_or(wgpu::CompositeAlphaMode::Auto)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wgpu::TextureFormat as F;

    #[test]
    fn test_surface_format_prefers_bgra_srgb() {
        let formats = [F::Rgba8Unorm, F::Rgba8UnormSrgb, F::Bgra8UnormSrgb];
        assert_eq!(choose_surface_format(&formats), Some(F::Bgra8UnormSrgb));
    }

    #[test]
    fn test_surface_format_falls_back_in_order() {
        assert_eq!(
            choose_surface_format(&[F::Rgba8Unorm, F::Rgba8UnormSrgb]),
            Some(F::Rgba8UnormSrgb)
        );
        assert_eq!(
            choose_surface_format(&[F::Rgba16Float, F::Bgra8Unorm]),
            Some(F::Rgba16Float)
        );
        assert_eq!(choose_surface_format(&[]), None);
    }

    #[test]
    fn test_vsync_always_fifo() {
        let modes = [wgpu::PresentMode::Mailbox, wgpu::PresentMode::Immediate];
        assert_eq!(select_present_mode(&modes, true), wgpu::PresentMode::Fifo);
    }

    #[test]
    fn test_no_vsync_lowest_latency_available() {
        use wgpu::PresentMode as P;
        assert_eq!(select_present_mode(&[P::Fifo, P::Immediate, P::Mailbox], false), P::Mailbox);
        assert_eq!(select_present_mode(&[P::Fifo, P::Immediate], false), P::Immediate);
        assert_eq!(select_present_mode(&[P::Fifo], false), P::Fifo);
    }

    #[test]
    fn test_alpha_mode_prefers_opaque() {
        use wgpu::CompositeAlphaMode as A;
        assert_eq!(choose_alpha_mode(&[A::PreMultiplied, A::Opaque]), A::Opaque);
        assert_eq!(choose_alpha_mode(&[A::Inherit]), A::Inherit);
        assert_eq!(choose_alpha_mode(&[]), A::Auto);
    }
}
