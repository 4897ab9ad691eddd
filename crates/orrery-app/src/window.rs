//! Window creation and event handling via winit.
//!
//! [`AppState`] implements winit's [`ApplicationHandler`] and is the single
//! owner of the scene, the input controller and the compositor. [`run`]
//! starts the event loop.

use std::sync::Arc;
use std::time::Instant;

use crate::scheduler::{FrameOutcome, FrameScheduler, resize_view};
use orrery_config::Config;
use orrery_input::{InputController, InputEvent, InputResponse, grab_cursor, release_cursor};
use orrery_render::{
    BloomCompositor, RenderContextError, RenderError, SurfaceError, WgpuSceneRenderer,
    init_render_context_blocking,
};
use orrery_scene::{CelestialScene, SceneBuildError};
use tracing::{debug, error, info, instrument, warn};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{DeviceEvent, DeviceId, ElementState, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::window::{Window, WindowAttributes, WindowId};

/// Errors that end the program.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("event loop failed: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
    #[error("window creation failed: {0}")]
    Window(#[from] winit::error::OsError),
    #[error(transparent)]
    RenderContext(#[from] RenderContextError),
    #[error("scene construction failed: {0}")]
    Scene(#[from] SceneBuildError),
    #[error("rendering failed: {0}")]
    Render(#[from] RenderError),
}

/// Returns [`WindowAttributes`] based on the given configuration.
pub fn window_attributes_from_config(config: &Config) -> WindowAttributes {
    WindowAttributes::default()
        .with_title(config.window.title.clone())
        .with_inner_size(winit::dpi::LogicalSize::new(
            config.window.width as f64,
            config.window.height as f64,
        ))
}

/// Physical size with zero dimensions (minimized windows) raised to 1.
pub fn surface_size(size: PhysicalSize<u32>) -> (u32, u32) {
    (size.width.max(1), size.height.max(1))
}

/// Everything that exists only once the window and GPU are up.
struct Runtime {
    window: Arc<Window>,
    celestial: CelestialScene,
    compositor: BloomCompositor<WgpuSceneRenderer>,
}

pub struct AppState {
    config: Config,
    runtime: Option<Runtime>,
    controller: InputController,
    scheduler: FrameScheduler,
    fatal: Option<AppError>,
    stats_since: Instant,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            controller: InputController::new(&config.input),
            scheduler: FrameScheduler::new(&config.animation),
            config,
            runtime: None,
            fatal: None,
            stats_since: Instant::now(),
        }
    }

    pub fn controller(&self) -> &InputController {
        &self.controller
    }

    pub fn is_running(&self) -> bool {
        self.runtime.is_some()
    }

    /// Error that stopped the event loop, if any.
    pub fn take_fatal(&mut self) -> Option<AppError> {
        self.fatal.take()
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: AppError) {
        error!("{err}");
        self.fatal = Some(err);
        event_loop.exit();
    }

    fn initialize(&self, event_loop: &ActiveEventLoop) -> Result<Runtime, AppError> {
        let window = Arc::new(event_loop.create_window(window_attributes_from_config(&self.config))?);
        let (width, height) = surface_size(window.inner_size());
        info!(width, height, scale = window.scale_factor(), "window created");

        let ctx = init_render_context_blocking(window.clone(), self.config.window.vsync)?;
        let mut renderer = WgpuSceneRenderer::new(ctx, &self.config.render);

        let assets_config = &self.config.assets;
        let linear = [
            assets_config.earth_bump.clone(),
            assets_config.moon_bump.clone(),
        ];
        let mut assets = renderer.texture_assets(assets_config.texture_dir.clone(), linear);
        let celestial = CelestialScene::build(
            &mut assets,
            assets_config,
            &self.config.render,
            &self.config.animation,
            width as f32 / height as f32,
        )?;
        renderer.set_shadow_focus(celestial.earth);

        let compositor = BloomCompositor::new(renderer, &self.config.render);
        info!(nodes = celestial.scene.len(), "scene ready");

        Ok(Runtime {
            window,
            celestial,
            compositor,
        })
    }

    /// Resize renderer, bloom targets and camera aspect before returning.
    fn resize(&mut self, size: PhysicalSize<u32>) {
        let Some(rt) = &mut self.runtime else {
            return;
        };
        let (width, height) = surface_size(size);
        resize_view(&mut rt.celestial, &mut rt.compositor, width, height);
        debug!(width, height, "resized");
    }

    /// Feed one event to the controller and carry out its response.
    fn handle_input(&mut self, event: InputEvent) {
        let Some(rt) = &mut self.runtime else {
            return;
        };
        let rig = rt.celestial.rig;
        let response = self
            .controller
            .handle(event, &mut rig.control(&mut rt.celestial.scene));
        self.apply_response(response);
    }

    fn apply_response(&mut self, response: InputResponse) {
        let Some(rt) = &mut self.runtime else {
            return;
        };
        let rig = rt.celestial.rig;
        let mut control = rig.control(&mut rt.celestial.scene);
        match response {
            InputResponse::None => {}
            InputResponse::RequestPointerLock => {
                if grab_cursor(&rt.window) {
                    self.controller
                        .handle(InputEvent::PointerLockChanged { locked: true }, &mut control);
                }
            }
            InputResponse::ReleasePointerLock => {
                release_cursor(&rt.window);
                self.controller
                    .handle(InputEvent::PointerLockChanged { locked: false }, &mut control);
            }
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(rt) = &mut self.runtime else {
            return;
        };
        let result = self
            .scheduler
            .tick(Instant::now(), &mut rt.celestial, &mut rt.compositor);
        self.controller.end_frame();

        match result {
            Ok(FrameOutcome::Rendered | FrameOutcome::Skipped) => {}
            Err(RenderError::StaleResolution { expected, actual }) => {
                warn!(?expected, ?actual, "render targets out of date, resizing");
                let size = rt.window.inner_size();
                self.resize(size);
            }
            Err(RenderError::Surface(SurfaceError::OutOfMemory)) => {
                self.fail(event_loop, RenderError::Surface(SurfaceError::OutOfMemory).into());
                return;
            }
            Err(e) => warn!("frame dropped: {e}"),
        }

        self.log_frame_stats();
        if let Some(rt) = &self.runtime {
            rt.window.request_redraw();
        }
    }

    fn log_frame_stats(&mut self) {
        let interval = self.config.debug.frame_stats_interval;
        let frames = self.scheduler.frame_count();
        if interval == 0 || frames == 0 || !frames.is_multiple_of(interval) {
            return;
        }
        let elapsed = self.stats_since.elapsed().as_secs_f64();
        self.stats_since = Instant::now();
        let fps = interval as f64 / elapsed.max(f64::EPSILON);
        info!(
            frames,
            skipped = self.scheduler.skipped_count(),
            fps,
            "frame stats"
        );
    }
}

impl ApplicationHandler for AppState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.runtime.is_some() {
            return;
        }
        match self.initialize(event_loop) {
            Ok(rt) => {
                rt.window.request_redraw();
                self.runtime = Some(rt);
            }
            Err(e) => self.fail(event_loop, e),
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => self.resize(size),
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                if let Some(size) = self.runtime.as_ref().map(|rt| rt.window.inner_size()) {
                    debug!(scale_factor, "scale factor changed");
                    self.resize(size);
                }
            }
            WindowEvent::Focused(false) => {
                let response = self.controller.focus_lost();
                self.apply_response(response);
            }
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } => self.handle_input(InputEvent::PointerDown),
            WindowEvent::KeyboardInput { event, .. } => {
                self.handle_input(InputEvent::from_key_event(&event));
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: DeviceId,
        event: DeviceEvent,
    ) {
        if let DeviceEvent::MouseMotion { delta } = event {
            self.handle_input(InputEvent::PointerMotion {
                dx: delta.0,
                dy: delta.1,
            });
        }
    }
}

/// Creates an event loop and runs the application until the window closes.
#[instrument(skip_all)]
pub fn run(config: Config) -> Result<(), AppError> {
    let event_loop = EventLoop::new()?;
    let mut app = AppState::new(config);
    event_loop.run_app(&mut app)?;
    match app.take_fatal() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
