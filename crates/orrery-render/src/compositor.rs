//! Two-pass layered frame protocol.
//!
//! Every frame draws the Glow layer into an offscreen target, blooms it onto
//! the screen, clears depth, and then draws the Base layer lit and shadowed
//! on top. The compositor owns only the ordering; rasterization sits behind
//! [`SceneRenderer`].

use crate::gpu::SurfaceError;
use orrery_config::RenderConfig;
use orrery_scene::{Layer, NodeId, Scene};

/// Glow parameters plus the resolution they were computed for.
#[derive(Clone, Debug, PartialEq)]
pub struct BloomSettings {
    pub strength: f32,
    /// 0 keeps glow tight around the emitter, 1 spreads it across mips.
    pub radius: f32,
    /// Luminance above which a pixel contributes.
    pub threshold: f32,
    /// Always equal to the viewport size.
    pub resolution: (u32, u32),
}

impl BloomSettings {
    pub fn from_config(config: &RenderConfig, resolution: (u32, u32)) -> Self {
        Self {
            strength: config.bloom_strength,
            radius: config.bloom_radius,
            threshold: config.bloom_threshold,
            resolution,
        }
    }

    /// Contribution of each blur mip to the final glow. Mip 0 is the
    /// sharpest. `radius` shifts weight from sharp mips towards wide ones.
    pub fn level_factors(&self, levels: u32) -> Vec<f32> {
        let n = levels.max(1);
        (0..n)
            .map(|i| {
                let base = if n == 1 {
                    1.0
                } else {
                    1.0 - i as f32 * 0.8 / (n - 1) as f32
                };
                base + (1.2 - 2.0 * base) * self.radius
            })
            .collect()
    }
}

/// Where a scene pass draws.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderTarget {
    /// HDR texture feeding the bloom chain.
    Offscreen,
    /// The swapchain image presented this frame.
    Screen,
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("surface unavailable: {0}")]
    Surface(#[from] SurfaceError),
    #[error("renderer is {actual:?} but compositor expects {expected:?}")]
    StaleResolution {
        expected: (u32, u32),
        actual: (u32, u32),
    },
    #[error("node {0:?} is not a camera")]
    MissingCamera(NodeId),
    #[error("no frame in progress")]
    NoFrame,
}

/// The draw-scene primitive the compositor sequences.
pub trait SceneRenderer {
    fn resolution(&self) -> (u32, u32);
    fn resize(&mut self, width: u32, height: u32);
    fn begin_frame(&mut self) -> Result<(), RenderError>;
    /// Draw every node `camera` can see into `target`.
    fn draw_scene(
        &mut self,
        scene: &Scene,
        camera: NodeId,
        target: RenderTarget,
    ) -> Result<(), RenderError>;
    /// Extract, blur and composite the offscreen target onto the screen.
    fn apply_bloom(&mut self, settings: &BloomSettings) -> Result<(), RenderError>;
    /// Reset depth only. Colour already on screen is kept.
    fn clear_depth(&mut self) -> Result<(), RenderError>;
    fn end_frame(&mut self) -> Result<(), RenderError>;
}

pub struct BloomCompositor<R> {
    renderer: R,
    settings: BloomSettings,
}

impl<R: SceneRenderer> BloomCompositor<R> {
    pub fn new(renderer: R, config: &RenderConfig) -> Self {
        let settings = BloomSettings::from_config(config, renderer.resolution());
        Self { renderer, settings }
    }

    pub fn settings(&self) -> &BloomSettings {
        &self.settings
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    /// Resize renderer and bloom targets before returning. Zero sizes are
    /// clamped to 1.
    pub fn resize(&mut self, width: u32, height: u32) {
        let size = (width.max(1), height.max(1));
        self.renderer.resize(size.0, size.1);
        self.settings.resolution = size;
        log::debug!("Compositor resized to {}x{}", size.0, size.1);
    }

    /// Render one frame: glow pass with bloom, depth clear, base pass.
    ///
    /// The camera's layer filter is left on [`Layer::Base`] afterwards.
    pub fn render(&mut self, scene: &mut Scene, camera: NodeId) -> Result<(), RenderError> {
        let actual = self.renderer.resolution();
        if actual != self.settings.resolution {
            return Err(RenderError::StaleResolution {
                expected: self.settings.resolution,
                actual,
            });
        }
        if scene.camera(camera).is_none() {
            return Err(RenderError::MissingCamera(camera));
        }

        self.renderer.begin_frame()?;

        set_filter(scene, camera, Layer::Glow);
        self.renderer
            .draw_scene(scene, camera, RenderTarget::Offscreen)?;
        self.renderer.apply_bloom(&self.settings)?;

        self.renderer.clear_depth()?;

        set_filter(scene, camera, Layer::Base);
        self.renderer.draw_scene(scene, camera, RenderTarget::Screen)?;

        self.renderer.end_frame()
    }
}

fn set_filter(scene: &mut Scene, camera: NodeId, layer: Layer) {
    if let Some(cam) = scene.camera_mut(camera) {
        cam.set_layer_filter(layer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orrery_scene::{Camera, Node};

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Begin,
        Draw(RenderTarget, Layer),
        Bloom((u32, u32)),
        ClearDepth,
        End,
    }

    struct Recorder {
        size: (u32, u32),
        calls: Vec<Call>,
    }

    impl Recorder {
        fn new(w: u32, h: u32) -> Self {
            Self {
                size: (w, h),
                calls: Vec::new(),
            }
        }
    }

    impl SceneRenderer for Recorder {
        fn resolution(&self) -> (u32, u32) {
            self.size
        }
        fn resize(&mut self, width: u32, height: u32) {
            self.size = (width, height);
        }
        fn begin_frame(&mut self) -> Result<(), RenderError> {
            self.calls.push(Call::Begin);
            Ok(())
        }
        fn draw_scene(
            &mut self,
            scene: &Scene,
            camera: NodeId,
            target: RenderTarget,
        ) -> Result<(), RenderError> {
            let layer = scene.camera(camera).unwrap().layer_filter();
            self.calls.push(Call::Draw(target, layer));
            Ok(())
        }
        fn apply_bloom(&mut self, settings: &BloomSettings) -> Result<(), RenderError> {
            self.calls.push(Call::Bloom(settings.resolution));
            Ok(())
        }
        fn clear_depth(&mut self) -> Result<(), RenderError> {
            self.calls.push(Call::ClearDepth);
            Ok(())
        }
        fn end_frame(&mut self) -> Result<(), RenderError> {
            self.calls.push(Call::End);
            Ok(())
        }
    }

    fn scene_with_camera() -> (Scene, NodeId) {
        let mut scene = Scene::new();
        let cam = scene.add(Node::camera("camera", Camera::default()));
        (scene, cam)
    }

    #[test]
    fn test_frame_protocol_order() {
        let (mut scene, cam) = scene_with_camera();
        let mut compositor = BloomCompositor::new(Recorder::new(800, 600), &RenderConfig::default());
        compositor.render(&mut scene, cam).unwrap();

        assert_eq!(
            compositor.renderer().calls,
            vec![
                Call::Begin,
                Call::Draw(RenderTarget::Offscreen, Layer::Glow),
                Call::Bloom((800, 600)),
                Call::ClearDepth,
                Call::Draw(RenderTarget::Screen, Layer::Base),
                Call::End,
            ]
        );
    }

    #[test]
    fn test_camera_left_on_base_layer() {
        let (mut scene, cam) = scene_with_camera();
        scene.camera_mut(cam).unwrap().set_layer_filter(Layer::Glow);
        let mut compositor = BloomCompositor::new(Recorder::new(10, 10), &RenderConfig::default());
        compositor.render(&mut scene, cam).unwrap();
        assert_eq!(scene.camera(cam).unwrap().layer_filter(), Layer::Base);
    }

    #[test]
    fn test_both_passes_run_without_glow_objects() {
        // The scene holds only a camera, so nothing is tagged Glow.
        let (mut scene, cam) = scene_with_camera();
        let mut compositor = BloomCompositor::new(Recorder::new(10, 10), &RenderConfig::default());
        compositor.render(&mut scene, cam).unwrap();
        let draws = compositor
            .renderer()
            .calls
            .iter()
            .filter(|c| matches!(c, Call::Draw(..)))
            .count();
        assert_eq!(draws, 2);
    }

    #[test]
    fn test_resize_updates_renderer_and_settings() {
        let (mut scene, cam) = scene_with_camera();
        let mut compositor = BloomCompositor::new(Recorder::new(800, 600), &RenderConfig::default());
        compositor.resize(1024, 768);
        assert_eq!(compositor.renderer().resolution(), (1024, 768));
        assert_eq!(compositor.settings().resolution, (1024, 768));

        compositor.render(&mut scene, cam).unwrap();
        assert!(compositor.renderer().calls.contains(&Call::Bloom((1024, 768))));
    }

    #[test]
    fn test_resize_clamps_zero() {
        let mut compositor = BloomCompositor::new(Recorder::new(800, 600), &RenderConfig::default());
        compositor.resize(0, 0);
        assert_eq!(compositor.settings().resolution, (1, 1));
        assert_eq!(compositor.renderer().resolution(), (1, 1));
    }

    #[test]
    fn test_stale_resolution_draws_nothing() {
        let (mut scene, cam) = scene_with_camera();
        let mut compositor = BloomCompositor::new(Recorder::new(800, 600), &RenderConfig::default());
        // Resize the renderer behind the compositor's back.
        compositor.renderer_mut().resize(640, 480);

        let err = compositor.render(&mut scene, cam).unwrap_err();
        assert!(matches!(
            err,
            RenderError::StaleResolution {
                expected: (800, 600),
                actual: (640, 480)
            }
        ));
        assert!(compositor.renderer().calls.is_empty());
    }

    #[test]
    fn test_non_camera_node_is_rejected() {
        let mut scene = Scene::new();
        let pivot = scene.add(Node::pivot("pivot"));
        let mut compositor = BloomCompositor::new(Recorder::new(10, 10), &RenderConfig::default());
        assert!(matches!(
            compositor.render(&mut scene, pivot),
            Err(RenderError::MissingCamera(id)) if id == pivot
        ));
    }

    #[test]
    fn test_settings_follow_config() {
        let config = RenderConfig::default();
        let compositor = BloomCompositor::new(Recorder::new(320, 200), &config);
        let settings = compositor.settings();
        assert_eq!(settings.strength, config.bloom_strength);
        assert_eq!(settings.radius, config.bloom_radius);
        assert_eq!(settings.threshold, config.bloom_threshold);
        assert_eq!(settings.resolution, (320, 200));
    }

    #[test]
    fn test_level_factors_zero_radius_favours_sharp_mips() {
        let settings = BloomSettings {
            strength: 2.0,
            radius: 0.0,
            threshold: 0.0,
            resolution: (1, 1),
        };
        let f = settings.level_factors(5);
        assert_eq!(f.len(), 5);
        assert!((f[0] - 1.0).abs() < 1e-6);
        assert!((f[4] - 0.2).abs() < 1e-6);
        assert!(f.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn test_level_factors_full_radius_favours_wide_mips() {
        let settings = BloomSettings {
            strength: 1.0,
            radius: 1.0,
            threshold: 0.0,
            resolution: (1, 1),
        };
        let f = settings.level_factors(5);
        assert!((f[0] - 0.2).abs() < 1e-6);
        assert!((f[4] - 1.0).abs() < 1e-6);
        assert_eq!(settings.level_factors(1), vec![1.0 + (1.2 - 2.0) * 1.0]);
    }
}
