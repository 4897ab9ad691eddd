//! Pass setup helpers and the per-frame encoder.

use std::sync::Arc;

/// Background of both passes: black with zero alpha.
pub const SPACE_BLACK: wgpu::Color = wgpu::Color {
    r: 0.0,
    g: 0.0,
    b: 0.0,
    a: 0.0,
};

fn depth_attachment(
    view: &wgpu::TextureView,
    load: wgpu::LoadOp<f32>,
) -> wgpu::RenderPassDepthStencilAttachment<'_> {
    wgpu::RenderPassDepthStencilAttachment {
        view,
        depth_ops: Some(wgpu::Operations {
            load,
            store: wgpu::StoreOp::Store,
        }),
        stencil_ops: None,
    }
}

/// Describes one colour pass with an optional depth attachment.
///
/// Colour is cleared to [`SPACE_BLACK`] unless told otherwise; a pass drawn
/// over earlier output uses [`RenderPassBuilder::load_color`].
#[derive(Debug)]
pub struct RenderPassBuilder<'a> {
    label: &'static str,
    color: wgpu::LoadOp<wgpu::Color>,
    depth: Option<(&'a wgpu::TextureView, wgpu::LoadOp<f32>)>,
}

impl<'a> RenderPassBuilder<'a> {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            color: wgpu::LoadOp::Clear(SPACE_BLACK),
            depth: None,
        }
    }

    pub fn clear_color(self, color: wgpu::Color) -> Self {
        Self {
            color: wgpu::LoadOp::Clear(color),
            ..self
        }
    }

    pub fn load_color(self) -> Self {
        Self {
            color: wgpu::LoadOp::Load,
            ..self
        }
    }

    pub fn depth(self, view: &'a wgpu::TextureView, clear_value: f32) -> Self {
        Self {
            depth: Some((view, wgpu::LoadOp::Clear(clear_value))),
            ..self
        }
    }

    /// Depth test against what earlier passes left in `view`.
    pub fn depth_load(self, view: &'a wgpu::TextureView) -> Self {
        Self {
            depth: Some((view, wgpu::LoadOp::Load)),
            ..self
        }
    }

    pub fn begin<'e>(
        &self,
        encoder: &'e mut wgpu::CommandEncoder,
        color_view: &'e wgpu::TextureView,
    ) -> wgpu::RenderPass<'e>
    where
        'a: 'e,
    {
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(self.label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: self.color,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: self.depth.map(|(view, load)| depth_attachment(view, load)),
            ..Default::default()
        })
    }
}

/// A pass with no colour target, clearing `view` to `clear_value`.
pub fn begin_depth_only_pass<'e>(
    encoder: &'e mut wgpu::CommandEncoder,
    view: &'e wgpu::TextureView,
    clear_value: f32,
    label: &'static str,
) -> wgpu::RenderPass<'e> {
    encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        depth_stencil_attachment: Some(depth_attachment(view, wgpu::LoadOp::Clear(clear_value))),
        ..Default::default()
    })
}

struct InFlight {
    encoder: wgpu::CommandEncoder,
    image: wgpu::SurfaceTexture,
}

/// One frame's command encoder together with the swapchain image it will
/// present. [`FrameEncoder::submit`] submits and presents; dropping an
/// unsubmitted frame does the same and logs a warning.
pub struct FrameEncoder {
    queue: Arc<wgpu::Queue>,
    surface_view: wgpu::TextureView,
    in_flight: Option<InFlight>,
}

impl FrameEncoder {
    pub fn new(
        device: &wgpu::Device,
        queue: Arc<wgpu::Queue>,
        image: wgpu::SurfaceTexture,
    ) -> Self {
        let encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("frame"),
        });
        Self {
            queue,
            surface_view: image.texture.create_view(&Default::default()),
            in_flight: Some(InFlight { encoder, image }),
        }
    }

    /// The encoder and the swapchain view; `None` after submission.
    pub fn parts(&mut self) -> Option<(&mut wgpu::CommandEncoder, &wgpu::TextureView)> {
        let in_flight = self.in_flight.as_mut()?;
        Some((&mut in_flight.encoder, &self.surface_view))
    }

    pub fn encoder_mut(&mut self) -> Option<&mut wgpu::CommandEncoder> {
        self.in_flight.as_mut().map(|f| &mut f.encoder)
    }

    pub fn submit(mut self) {
        self.present();
    }

    fn present(&mut self) {
        if let Some(InFlight { encoder, image }) = self.in_flight.take() {
            self.queue.submit([encoder.finish()]);
            image.present();
        }
    }
}

impl Drop for FrameEncoder {
    fn drop(&mut self) {
        if self.in_flight.is_some() {
            log::warn!("Frame dropped before submit, presenting it now");
            self.present();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_pass_clears_to_space_black() {
        let builder = RenderPassBuilder::new("glow-pass");
        assert!(matches!(builder.color, wgpu::LoadOp::Clear(c) if c == SPACE_BLACK));
        assert_eq!(SPACE_BLACK.a, 0.0);
        assert!(builder.depth.is_none());
        assert_eq!(builder.label, "glow-pass");
    }

    #[test]
    fn test_colour_load_modes() {
        let red = RenderPassBuilder::new("p").clear_color(wgpu::Color::RED);
        assert!(matches!(red.color, wgpu::LoadOp::Clear(c) if c == wgpu::Color::RED));
        let kept = red.load_color();
        assert!(matches!(kept.color, wgpu::LoadOp::Load));
    }

    #[test]
    fn test_depth_modes() {
        let Some((device, _queue)) = crate::test_util::create_test_device() else {
            return;
        };
        let depth = crate::DepthBuffer::new(&device, 4, 4);

        let cleared = RenderPassBuilder::new("p").depth(&depth.view, 0.0);
        assert!(matches!(cleared.depth, Some((_, wgpu::LoadOp::Clear(v))) if v == 0.0));

        let kept = RenderPassBuilder::new("p").depth_load(&depth.view);
        assert!(matches!(kept.depth, Some((_, wgpu::LoadOp::Load))));
    }
}
