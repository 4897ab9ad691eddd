//! Pointer look state and cursor grabbing.

use glam::Vec2;
use winit::window::{CursorGrabMode, Window};

/// Relative motion gathered while the pointer is captured.
#[derive(Debug, Clone, Default)]
pub struct MouseState {
    delta: Vec2,
    captured: bool,
}

impl MouseState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a raw device delta. Motion while the cursor is free is dropped.
    pub fn on_raw_motion(&mut self, dx: f64, dy: f64) {
        if self.captured {
            self.delta += Vec2::new(dx as f32, dy as f32);
        }
    }

    pub fn set_captured(&mut self, captured: bool) {
        self.captured = captured;
        if !captured {
            self.delta = Vec2::ZERO;
        }
    }

    pub fn clear_transients(&mut self) {
        self.delta = Vec2::ZERO;
    }

    #[must_use]
    pub fn delta(&self) -> Vec2 {
        self.delta
    }

    #[must_use]
    pub fn is_captured(&self) -> bool {
        self.captured
    }
}

/// Hide the cursor and grab it, `Locked` if the platform allows and
/// `Confined` otherwise. `false` when both are refused.
pub fn grab_cursor(window: &Window) -> bool {
    let result = [CursorGrabMode::Locked, CursorGrabMode::Confined]
        .into_iter()
        .map(|mode| (mode, window.set_cursor_grab(mode)))
        .find(|(_, r)| r.is_ok());
    match result {
        Some((mode, _)) => {
            tracing::debug!(?mode, "cursor grabbed");
            window.set_cursor_visible(false);
            true
        }
        None => {
            tracing::warn!("pointer lock refused by the platform");
            false
        }
    }
}

pub fn release_cursor(window: &Window) {
    if let Err(e) = window.set_cursor_grab(CursorGrabMode::None) {
        tracing::debug!("cursor release failed: {e}");
    }
    window.set_cursor_visible(true);
}
