//! Render layer classification.
//!
//! Every node carries exactly one [`Layer`], fixed when the node is created.
//! The compositor renders the scene twice, once per layer, so a node is drawn
//! by exactly one of the two passes.

/// Render category of a scene node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Layer {
    /// Normally lit geometry, drawn in the second pass.
    #[default]
    Base,
    /// Emissive geometry, drawn in the bright pass and bloomed.
    Glow,
}

impl Layer {
    /// Both layers, in the order the compositor renders them.
    pub const ALL: [Layer; 2] = [Layer::Glow, Layer::Base];

    /// The layer this one is not.
    #[must_use]
    pub fn other(self) -> Layer {
        match self {
            Layer::Base => Layer::Glow,
            Layer::Glow => Layer::Base,
        }
    }
}

/// Whether an object tagged `object_layer` is drawn by the pass rendering `pass_layer`.
#[must_use]
pub fn is_visible_in_pass(object_layer: Layer, pass_layer: Layer) -> bool {
    object_layer == pass_layer
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_layer_visible_in_exactly_one_pass() {
        for object in Layer::ALL {
            let in_glow = is_visible_in_pass(object, Layer::Glow);
            let in_base = is_visible_in_pass(object, Layer::Base);
            assert_ne!(in_glow, in_base, "{object:?} must belong to one pass");
        }
    }

    #[test]
    fn test_equal_tags_match() {
        assert!(is_visible_in_pass(Layer::Glow, Layer::Glow));
        assert!(is_visible_in_pass(Layer::Base, Layer::Base));
        assert!(!is_visible_in_pass(Layer::Glow, Layer::Base));
    }

    #[test]
    fn test_other_is_involution() {
        assert_eq!(Layer::Base.other(), Layer::Glow);
        assert_eq!(Layer::Glow.other().other(), Layer::Glow);
    }

    #[test]
    fn test_default_layer_is_base() {
        assert_eq!(Layer::default(), Layer::Base);
    }
}
