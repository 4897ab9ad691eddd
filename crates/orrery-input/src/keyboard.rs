//! Held-key tracking and binding labels.
//!
//! Keys are logical: the rig's `+` and `-` bindings are characters whose
//! physical position depends on the layout.

use std::collections::HashSet;
use winit::event::ElementState;
use winit::keyboard::Key;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawKeyEvent {
    pub key: Key,
    pub state: ElementState,
    pub repeat: bool,
}

/// Binding-table label for `key`: characters lowercased so shift does not
/// matter, named keys by their lowercased name (`escape`, `space`,
/// `arrowup`).
#[must_use]
pub fn key_label(key: &Key) -> Option<String> {
    match key {
        Key::Character(text) => Some(text.to_lowercase()),
        Key::Named(named) => Some(format!("{named:?}").to_lowercase()),
        _ => None,
    }
}

/// The set of keys currently held down.
#[derive(Debug, Clone, Default)]
pub struct KeyboardState {
    held: HashSet<Key>,
}

impl KeyboardState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Auto-repeat does not change the held set.
    pub fn process_raw(&mut self, event: &RawKeyEvent) {
        if event.repeat {
            return;
        }
        match event.state {
            ElementState::Pressed => {
                self.held.insert(event.key.clone());
            }
            ElementState::Released => {
                self.held.remove(&event.key);
            }
        }
    }

    #[must_use]
    pub fn is_pressed(&self, key: &Key) -> bool {
        self.held.contains(key)
    }

    pub fn pressed_count(&self) -> usize {
        self.held.len()
    }

    /// Forget every held key. Used on focus loss, when the real release
    /// events go to another window.
    pub fn release_all(&mut self) {
        self.held.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::keyboard::NamedKey;

    fn raw(c: &str, state: ElementState, repeat: bool) -> RawKeyEvent {
        RawKeyEvent {
            key: Key::Character(c.into()),
            state,
            repeat,
        }
    }

    fn ch(c: &str) -> Key {
        Key::Character(c.into())
    }

    #[test]
    fn test_press_then_release() {
        let mut kb = KeyboardState::new();
        kb.process_raw(&raw("w", ElementState::Pressed, false));
        assert!(kb.is_pressed(&ch("w")));
        kb.process_raw(&raw("w", ElementState::Released, false));
        assert!(!kb.is_pressed(&ch("w")));
    }

    #[test]
    fn test_repeat_keeps_key_held() {
        let mut kb = KeyboardState::new();
        kb.process_raw(&raw("d", ElementState::Pressed, false));
        kb.process_raw(&raw("d", ElementState::Pressed, true));
        assert_eq!(kb.pressed_count(), 1);
        assert!(kb.is_pressed(&ch("d")));
    }

    #[test]
    fn test_release_all_empties_held_set() {
        let mut kb = KeyboardState::new();
        kb.process_raw(&raw("q", ElementState::Pressed, false));
        kb.process_raw(&raw("e", ElementState::Pressed, false));
        kb.release_all();
        assert_eq!(kb.pressed_count(), 0);
        assert!(!kb.is_pressed(&ch("q")));
    }

    #[test]
    fn test_key_labels() {
        assert_eq!(key_label(&ch("W")).as_deref(), Some("w"));
        assert_eq!(key_label(&ch("+")).as_deref(), Some("+"));
        assert_eq!(
            key_label(&Key::Named(NamedKey::Escape)).as_deref(),
            Some("escape")
        );
        assert_eq!(
            key_label(&Key::Named(NamedKey::Space)).as_deref(),
            Some("space")
        );
    }
}
