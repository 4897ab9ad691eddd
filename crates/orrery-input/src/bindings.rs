//! Key bindings for camera rig actions.
//!
//! Each [`RigAction`] has a default key. `InputConfig::keybindings` maps an
//! action name to a replacement key label (see [`key_label`](crate::key_label)).

use orrery_config::InputConfig;
use orrery_scene::{Axis, RigControl};
use std::collections::HashMap;
use tracing::warn;

/// Discrete rig manipulation triggered by a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RigAction {
    MoveForward,
    MoveBack,
    MoveLeft,
    MoveRight,
    TurnLeft,
    TurnRight,
    Descend,
    Ascend,
}

impl RigAction {
    pub const ALL: [RigAction; 8] = [
        RigAction::MoveForward,
        RigAction::MoveBack,
        RigAction::MoveLeft,
        RigAction::MoveRight,
        RigAction::TurnLeft,
        RigAction::TurnRight,
        RigAction::Descend,
        RigAction::Ascend,
    ];

    /// Name used in the config file.
    pub fn name(self) -> &'static str {
        match self {
            RigAction::MoveForward => "move_forward",
            RigAction::MoveBack => "move_back",
            RigAction::MoveLeft => "move_left",
            RigAction::MoveRight => "move_right",
            RigAction::TurnLeft => "turn_left",
            RigAction::TurnRight => "turn_right",
            RigAction::Descend => "descend",
            RigAction::Ascend => "ascend",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.name() == name)
    }

    pub fn default_key(self) -> &'static str {
        match self {
            RigAction::MoveForward => "w",
            RigAction::MoveBack => "s",
            RigAction::MoveLeft => "a",
            RigAction::MoveRight => "d",
            RigAction::TurnLeft => "q",
            RigAction::TurnRight => "e",
            RigAction::Descend => "+",
            RigAction::Ascend => "-",
        }
    }

    /// Apply one step of this action to the rig.
    pub fn apply(self, rig: &mut impl RigControl, move_step: f32, turn_step: f32) {
        match self {
            RigAction::MoveForward => rig.apply_translation(Axis::Z, -move_step),
            RigAction::MoveBack => rig.apply_translation(Axis::Z, move_step),
            RigAction::MoveLeft => rig.apply_translation(Axis::X, -move_step),
            RigAction::MoveRight => rig.apply_translation(Axis::X, move_step),
            RigAction::TurnLeft => rig.apply_rotation_delta(turn_step, 0.0),
            RigAction::TurnRight => rig.apply_rotation_delta(-turn_step, 0.0),
            RigAction::Descend => rig.apply_translation(Axis::Y, -move_step),
            RigAction::Ascend => rig.apply_translation(Axis::Y, move_step),
        }
    }
}

/// A key label claimed by more than one action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub key: String,
    pub actions: Vec<RigAction>,
}

/// Lookup table from key label to action.
#[derive(Debug, Clone)]
pub struct KeyBindings {
    by_action: HashMap<RigAction, String>,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            by_action: RigAction::ALL
                .into_iter()
                .map(|action| (action, action.default_key().to_string()))
                .collect(),
        }
    }
}

impl KeyBindings {
    /// Defaults with the config's overrides applied. Unknown action names are
    /// logged and skipped.
    pub fn from_config(config: &InputConfig) -> Self {
        let mut bindings = Self::default();
        for (name, key) in &config.keybindings {
            match RigAction::from_name(name) {
                Some(action) => bindings.rebind(action, key),
                None => warn!("unknown key binding action '{name}' ignored"),
            }
        }
        for conflict in bindings.detect_conflicts() {
            warn!(
                "key '{}' bound to several actions: {:?}",
                conflict.key, conflict.actions
            );
        }
        bindings
    }

    pub fn rebind(&mut self, action: RigAction, key: &str) {
        self.by_action.insert(action, key.to_lowercase());
    }

    pub fn key_for(&self, action: RigAction) -> Option<&str> {
        self.by_action.get(&action).map(String::as_str)
    }

    /// Action bound to `label`. On conflict the first action in
    /// [`RigAction::ALL`] order wins.
    pub fn action_for(&self, label: &str) -> Option<RigAction> {
        RigAction::ALL
            .into_iter()
            .find(|action| self.key_for(*action) == Some(label))
    }

    #[must_use]
    pub fn detect_conflicts(&self) -> Vec<Conflict> {
        let mut seen: HashMap<&str, Vec<RigAction>> = HashMap::new();
        for action in RigAction::ALL {
            if let Some(key) = self.key_for(action) {
                seen.entry(key).or_default().push(action);
            }
        }
        let mut conflicts: Vec<Conflict> = seen
            .into_iter()
            .filter(|(_, actions)| actions.len() > 1)
            .map(|(key, actions)| Conflict {
                key: key.to_string(),
                actions,
            })
            .collect();
        conflicts.sort_by(|a, b| a.key.cmp(&b.key));
        conflicts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table() {
        let bindings = KeyBindings::default();
        assert_eq!(bindings.action_for("w"), Some(RigAction::MoveForward));
        assert_eq!(bindings.action_for("s"), Some(RigAction::MoveBack));
        assert_eq!(bindings.action_for("a"), Some(RigAction::MoveLeft));
        assert_eq!(bindings.action_for("d"), Some(RigAction::MoveRight));
        assert_eq!(bindings.action_for("q"), Some(RigAction::TurnLeft));
        assert_eq!(bindings.action_for("e"), Some(RigAction::TurnRight));
        assert_eq!(bindings.action_for("+"), Some(RigAction::Descend));
        assert_eq!(bindings.action_for("-"), Some(RigAction::Ascend));
        assert_eq!(bindings.action_for("x"), None);
        assert!(bindings.detect_conflicts().is_empty());
    }

    #[test]
    fn test_names_round_trip() {
        for action in RigAction::ALL {
            assert_eq!(RigAction::from_name(action.name()), Some(action));
        }
        assert_eq!(RigAction::from_name("jump"), None);
    }

    #[test]
    fn test_config_override() {
        let mut config = InputConfig::default();
        config
            .keybindings
            .insert("move_forward".into(), "Z".into());
        config.keybindings.insert("fly".into(), "f".into());
        let bindings = KeyBindings::from_config(&config);

        assert_eq!(bindings.action_for("z"), Some(RigAction::MoveForward));
        assert_eq!(bindings.action_for("w"), None);
        assert_eq!(bindings.action_for("f"), None);
    }

    #[test]
    fn test_conflict_detected() {
        let mut bindings = KeyBindings::default();
        bindings.rebind(RigAction::Ascend, "w");
        let conflicts = bindings.detect_conflicts();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].key, "w");
        assert_eq!(
            conflicts[0].actions,
            vec![RigAction::MoveForward, RigAction::Ascend]
        );
        assert_eq!(bindings.action_for("w"), Some(RigAction::MoveForward));
    }
}
