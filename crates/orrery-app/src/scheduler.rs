//! Per-redraw frame driver: autonomous motion, then the layered render.
//!
//! Motion deltas are per frame by default, so the animation speed follows
//! the display's refresh rate. With [`MotionTiming::Elapsed`] each delta is
//! scaled by the measured frame time against a reference rate instead.

use orrery_config::{AnimationConfig, MotionTiming};
use orrery_render::{BloomCompositor, RenderError, SceneRenderer, SurfaceError};
use orrery_scene::{CelestialScene, NodeId, Scene};
use std::time::Instant;
use tracing::warn;

/// Longest frame time fed into elapsed-time scaling. A stall longer than
/// this (window drag, debugger pause) advances motion by this much only.
pub const MAX_FRAME_TIME: f64 = 0.25;

/// Nodes moved every frame without user input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MotionTargets {
    pub clouds: NodeId,
    pub moon_pivot: NodeId,
    pub rig_pivot: NodeId,
    pub galaxy: NodeId,
}

impl MotionTargets {
    pub fn of(celestial: &CelestialScene) -> Self {
        Self {
            clouds: celestial.clouds,
            moon_pivot: celestial.moon_pivot,
            rig_pivot: celestial.rig.pivot(),
            galaxy: celestial.galaxy,
        }
    }
}

/// Bring the render targets and the camera projection to a new surface
/// size. Both must change together or the next frame fails with
/// [`RenderError::StaleResolution`].
pub fn resize_view<R: SceneRenderer>(
    celestial: &mut CelestialScene,
    compositor: &mut BloomCompositor<R>,
    width: u32,
    height: u32,
) {
    compositor.resize(width, height);
    if let Some(camera) = celestial.camera_mut() {
        camera.set_aspect_ratio(width, height);
    }
}

/// What happened to one redraw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Rendered,
    /// Surface timed out; motion advanced but nothing was presented.
    Skipped,
}

pub struct FrameScheduler {
    animation: AnimationConfig,
    previous_time: Option<Instant>,
    frame_count: u64,
    skipped_count: u64,
}

impl FrameScheduler {
    pub fn new(animation: &AnimationConfig) -> Self {
        Self {
            animation: animation.clone(),
            previous_time: None,
            frame_count: 0,
            skipped_count: 0,
        }
    }

    /// Run one frame at `now`: advance motion, then draw.
    pub fn tick<R: SceneRenderer>(
        &mut self,
        now: Instant,
        celestial: &mut CelestialScene,
        compositor: &mut BloomCompositor<R>,
    ) -> Result<FrameOutcome, RenderError> {
        let elapsed = self
            .previous_time
            .map(|previous| now.duration_since(previous).as_secs_f64())
            .unwrap_or(0.0);
        self.previous_time = Some(now);

        let scale = self.motion_scale(elapsed);
        let targets = MotionTargets::of(celestial);
        self.advance(&mut celestial.scene, &targets, scale);

        let outcome = match compositor.render(&mut celestial.scene, celestial.rig.camera()) {
            Ok(()) => FrameOutcome::Rendered,
            Err(RenderError::Surface(SurfaceError::Timeout)) => {
                warn!("surface timed out, skipping frame");
                self.skipped_count += 1;
                FrameOutcome::Skipped
            }
            Err(e) => return Err(e),
        };
        self.frame_count += 1;
        Ok(outcome)
    }

    /// Multiplier applied to every configured delta for a frame that took
    /// `elapsed` seconds.
    pub fn motion_scale(&self, elapsed: f64) -> f32 {
        match self.animation.timing {
            MotionTiming::PerFrame => 1.0,
            MotionTiming::Elapsed { reference_fps } => {
                let clamped = if elapsed > MAX_FRAME_TIME {
                    warn!(
                        "Frame time {:.1}ms exceeds maximum, clamping to {:.1}ms",
                        elapsed * 1000.0,
                        MAX_FRAME_TIME * 1000.0
                    );
                    MAX_FRAME_TIME
                } else {
                    elapsed.max(0.0)
                };
                (clamped * reference_fps as f64) as f32
            }
        }
    }

    /// Apply one frame of autonomous rotation.
    pub fn advance(&self, scene: &mut Scene, targets: &MotionTargets, scale: f32) {
        let a = &self.animation;
        if let Some(t) = scene.transform_mut(targets.clouds) {
            t.rotation.y += a.cloud_spin * scale;
        }
        if let Some(t) = scene.transform_mut(targets.moon_pivot) {
            t.rotation.y += a.moon_orbit * scale;
            t.rotation.x = a.moon_tilt;
        }
        if let Some(t) = scene.transform_mut(targets.rig_pivot) {
            t.rotation.y += a.rig_drift * scale;
        }
        if let Some(t) = scene.transform_mut(targets.galaxy) {
            t.rotation.y += a.galaxy_spin * scale;
        }
    }

    /// Frames run so far, skipped ones included.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn skipped_count(&self) -> u64 {
        self.skipped_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orrery_config::{AssetConfig, RenderConfig};
    use orrery_render::{BloomSettings, RenderTarget};
    use orrery_scene::{AssetError, AssetSource, Layer, TextureHandle};
    use std::time::Duration;

    #[derive(Default)]
    struct CountingAssets(u32);

    impl AssetSource for CountingAssets {
        fn load_texture(&mut self, _name: &str) -> Result<TextureHandle, AssetError> {
            self.0 += 1;
            Ok(TextureHandle::new(self.0 - 1))
        }
    }

    struct Recorder {
        size: (u32, u32),
        draws: Vec<(RenderTarget, Layer)>,
        fail_with_timeout: bool,
    }

    impl Recorder {
        fn new() -> Self {
            Self {
                size: (800, 600),
                draws: Vec::new(),
                fail_with_timeout: false,
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
            if self.fail_with_timeout {
                return Err(RenderError::Surface(SurfaceError::Timeout));
            }
            Ok(())
        }
        fn draw_scene(
            &mut self,
            scene: &Scene,
            camera: NodeId,
            target: RenderTarget,
        ) -> Result<(), RenderError> {
            let layer = scene
                .camera(camera)
                .ok_or(RenderError::MissingCamera(camera))?
                .layer_filter();
            self.draws.push((target, layer));
            Ok(())
        }
        fn apply_bloom(&mut self, _settings: &BloomSettings) -> Result<(), RenderError> {
            Ok(())
        }
        fn clear_depth(&mut self) -> Result<(), RenderError> {
            Ok(())
        }
        fn end_frame(&mut self) -> Result<(), RenderError> {
            Ok(())
        }
    }

    fn celestial() -> CelestialScene {
        CelestialScene::build(
            &mut CountingAssets::default(),
            &AssetConfig::default(),
            &RenderConfig::default(),
            &AnimationConfig::default(),
            4.0 / 3.0,
        )
        .unwrap()
    }

    fn rotation(scene: &Scene, id: NodeId) -> glam::Vec3 {
        scene.node(id).unwrap().transform.rotation
    }

    #[test]
    fn test_per_frame_deltas_accumulate() {
        let mut celestial = celestial();
        let targets = MotionTargets::of(&celestial);
        let scheduler = FrameScheduler::new(&AnimationConfig::default());
        for _ in 0..10 {
            scheduler.advance(&mut celestial.scene, &targets, 1.0);
        }
        let scene = &celestial.scene;
        assert!((rotation(scene, targets.clouds).y - -0.002).abs() < 1e-6);
        assert!((rotation(scene, targets.moon_pivot).y - -0.05).abs() < 1e-6);
        assert!((rotation(scene, targets.moon_pivot).x - 0.5).abs() < 1e-6);
        assert!((rotation(scene, targets.rig_pivot).y - 0.01).abs() < 1e-6);
        assert!((rotation(scene, targets.galaxy).y - 0.002).abs() < 1e-6);
    }

    #[test]
    fn test_per_frame_scale_ignores_elapsed() {
        let scheduler = FrameScheduler::new(&AnimationConfig::default());
        assert_eq!(scheduler.motion_scale(0.0), 1.0);
        assert_eq!(scheduler.motion_scale(2.0), 1.0);
    }

    #[test]
    fn test_elapsed_scale_is_clamped() {
        let animation = AnimationConfig {
            timing: MotionTiming::Elapsed {
                reference_fps: 60.0,
            },
            ..AnimationConfig::default()
        };
        let scheduler = FrameScheduler::new(&animation);
        assert!((scheduler.motion_scale(1.0 / 60.0) - 1.0).abs() < 1e-4);
        assert!((scheduler.motion_scale(1.0 / 30.0) - 2.0).abs() < 1e-4);
        assert!((scheduler.motion_scale(5.0) - 15.0).abs() < 1e-4);
    }

    #[test]
    fn test_tick_moves_then_renders_both_passes() {
        let mut celestial = celestial();
        let mut compositor = BloomCompositor::new(Recorder::new(), &RenderConfig::default());
        let mut scheduler = FrameScheduler::new(&AnimationConfig::default());
        let start = Instant::now();

        let outcome = scheduler
            .tick(start, &mut celestial, &mut compositor)
            .unwrap();
        assert_eq!(outcome, FrameOutcome::Rendered);
        scheduler
            .tick(start + Duration::from_millis(16), &mut celestial, &mut compositor)
            .unwrap();

        assert_eq!(scheduler.frame_count(), 2);
        assert_eq!(
            compositor.renderer().draws,
            vec![
                (RenderTarget::Offscreen, Layer::Glow),
                (RenderTarget::Screen, Layer::Base),
                (RenderTarget::Offscreen, Layer::Glow),
                (RenderTarget::Screen, Layer::Base),
            ]
        );
        let drift = rotation(&celestial.scene, celestial.rig.pivot()).y;
        assert!((drift - 0.002).abs() < 1e-6);
    }

    #[test]
    fn test_surface_timeout_skips_frame() {
        let mut celestial = celestial();
        let mut recorder = Recorder::new();
        recorder.fail_with_timeout = true;
        let mut compositor = BloomCompositor::new(recorder, &RenderConfig::default());
        let mut scheduler = FrameScheduler::new(&AnimationConfig::default());

        let outcome = scheduler
            .tick(Instant::now(), &mut celestial, &mut compositor)
            .unwrap();
        assert_eq!(outcome, FrameOutcome::Skipped);
        assert_eq!(scheduler.skipped_count(), 1);
        assert!(compositor.renderer().draws.is_empty());
    }

    #[test]
    fn test_resize_view_keeps_frames_rendering() {
        let mut celestial = celestial();
        let mut compositor = BloomCompositor::new(Recorder::new(), &RenderConfig::default());
        let mut scheduler = FrameScheduler::new(&AnimationConfig::default());

        resize_view(&mut celestial, &mut compositor, 1024, 512);

        let aspect = celestial.camera_mut().unwrap().aspect_ratio;
        assert!((aspect - 2.0).abs() < 1e-6);
        assert_eq!(compositor.renderer().resolution(), (1024, 512));
        assert_eq!(compositor.settings().resolution, (1024, 512));
        let outcome = scheduler
            .tick(Instant::now(), &mut celestial, &mut compositor)
            .unwrap();
        assert_eq!(outcome, FrameOutcome::Rendered);
    }

    #[test]
    fn test_stale_resolution_is_reported() {
        let mut celestial = celestial();
        let mut compositor = BloomCompositor::new(Recorder::new(), &RenderConfig::default());
        compositor.renderer_mut().size = (1024, 768);
        let mut scheduler = FrameScheduler::new(&AnimationConfig::default());

        let result = scheduler.tick(Instant::now(), &mut celestial, &mut compositor);
        assert!(matches!(result, Err(RenderError::StaleResolution { .. })));
    }
}
