//! Pointer-lock state machine and rig control dispatch.
//!
//! The controller receives environment-neutral [`InputEvent`]s and mutates a
//! [`RigControl`]. It never touches the window; when the pointer should be
//! grabbed or released it says so through [`InputResponse`] and waits for a
//! [`InputEvent::PointerLockChanged`] confirmation.

use crate::bindings::KeyBindings;
use crate::keyboard::{KeyboardState, RawKeyEvent, key_label};
use crate::mouse::MouseState;
use glam::Vec2;
use orrery_config::InputConfig;
use orrery_scene::RigControl;
use tracing::{debug, trace};
use winit::event::{ElementState, KeyEvent};
use winit::keyboard::{Key, NamedKey};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LockState {
    #[default]
    Unlocked,
    Locked,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    /// Primary button pressed over the render surface.
    PointerDown,
    /// The environment reports a pointer lock change.
    PointerLockChanged { locked: bool },
    /// Raw relative pointer motion.
    PointerMotion { dx: f64, dy: f64 },
    KeyDown { key: Key, repeat: bool },
    KeyUp { key: Key },
}

impl InputEvent {
    /// Translate a winit key event.
    pub fn from_key_event(event: &KeyEvent) -> Self {
        let key = event.logical_key.clone();
        match event.state {
            ElementState::Pressed => InputEvent::KeyDown {
                key,
                repeat: event.repeat,
            },
            ElementState::Released => InputEvent::KeyUp { key },
        }
    }
}

/// What the environment should do after an event was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputResponse {
    None,
    RequestPointerLock,
    ReleasePointerLock,
}

/// Owns all input state for the session.
#[derive(Debug, Clone)]
pub struct InputController {
    lock: LockState,
    bindings: KeyBindings,
    keyboard: KeyboardState,
    mouse: MouseState,
    sensitivity: f32,
    move_step: f32,
    turn_step: f32,
}

impl Default for InputController {
    fn default() -> Self {
        Self::new(&InputConfig::default())
    }
}

impl InputController {
    pub fn new(config: &InputConfig) -> Self {
        Self {
            lock: LockState::Unlocked,
            bindings: KeyBindings::from_config(config),
            keyboard: KeyboardState::new(),
            mouse: MouseState::new(),
            sensitivity: config.mouse_sensitivity,
            move_step: config.move_step,
            turn_step: config.turn_step,
        }
    }

    pub fn lock_state(&self) -> LockState {
        self.lock
    }

    pub fn is_locked(&self) -> bool {
        self.lock == LockState::Locked
    }

    pub fn keyboard(&self) -> &KeyboardState {
        &self.keyboard
    }

    /// Look delta gathered since the last [`end_frame`](Self::end_frame).
    pub fn look_delta(&self) -> Vec2 {
        self.mouse.delta()
    }

    pub fn bindings(&self) -> &KeyBindings {
        &self.bindings
    }

    /// Apply one event. Rig changes happen immediately.
    pub fn handle(&mut self, event: InputEvent, rig: &mut impl RigControl) -> InputResponse {
        match event {
            InputEvent::PointerDown => match self.lock {
                LockState::Unlocked => InputResponse::RequestPointerLock,
                LockState::Locked => InputResponse::None,
            },
            InputEvent::PointerLockChanged { locked } => {
                self.lock = if locked {
                    LockState::Locked
                } else {
                    LockState::Unlocked
                };
                self.mouse.set_captured(locked);
                debug!(state = ?self.lock, "pointer lock changed");
                InputResponse::None
            }
            InputEvent::PointerMotion { dx, dy } => {
                if self.lock == LockState::Locked {
                    self.mouse.on_raw_motion(dx, dy);
                    rig.apply_rotation_delta(
                        dx as f32 * self.sensitivity,
                        dy as f32 * self.sensitivity,
                    );
                }
                InputResponse::None
            }
            InputEvent::KeyDown { key, repeat } => {
                self.keyboard.process_raw(&RawKeyEvent {
                    key: key.clone(),
                    state: ElementState::Pressed,
                    repeat,
                });
                self.on_key_down(&key, rig)
            }
            InputEvent::KeyUp { key } => {
                self.keyboard.process_raw(&RawKeyEvent {
                    key,
                    state: ElementState::Released,
                    repeat: false,
                });
                InputResponse::None
            }
        }
    }

    fn on_key_down(&mut self, key: &Key, rig: &mut impl RigControl) -> InputResponse {
        if *key == Key::Named(NamedKey::Escape) {
            return match self.lock {
                LockState::Locked => InputResponse::ReleasePointerLock,
                LockState::Unlocked => InputResponse::None,
            };
        }

        let action = key_label(key).and_then(|label| self.bindings.action_for(&label));
        if let Some(action) = action {
            trace!(?action, "rig action");
            action.apply(rig, self.move_step, self.turn_step);
        }
        InputResponse::None
    }

    /// Window focus lost: held keys are forgotten and the lock is dropped.
    pub fn focus_lost(&mut self) -> InputResponse {
        self.keyboard.release_all();
        match self.lock {
            LockState::Locked => InputResponse::ReleasePointerLock,
            LockState::Unlocked => InputResponse::None,
        }
    }

    /// Drop the look delta gathered this frame. Call once after each
    /// rendered frame.
    pub fn end_frame(&mut self) {
        self.mouse.clear_transients();
    }
}
