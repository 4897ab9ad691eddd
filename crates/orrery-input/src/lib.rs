//! Input handling: pointer lock, mouse look, and keyboard rig control mapped
//! through configurable key bindings.

pub mod bindings;
pub mod controller;
pub mod keyboard;
pub mod mouse;

pub use bindings::{Conflict, KeyBindings, RigAction};
pub use controller::{InputController, InputEvent, InputResponse, LockState};
pub use keyboard::{KeyboardState, RawKeyEvent, key_label};
pub use mouse::{MouseState, grab_cursor, release_cursor};
