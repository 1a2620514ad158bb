//! Jump kinds between flow graph nodes.

use strum::{AsRefStr, Display, EnumIter};

/// The kind of control transfer an edge represents.
///
/// A node has at most one outgoing jump of each kind. Together they describe the node
/// shape: no out-jumps for a terminal node, a single [`JumpType::Always`] for a
/// straight-line block, and exactly one [`JumpType::ConditionalTrue`] plus one
/// [`JumpType::ConditionalFalse`] for a branch.
///
/// # Examples
///
/// ```rust
/// use sagekit::utils::graph::JumpType;
///
/// assert!(JumpType::ConditionalFalse.is_conditional());
/// assert_eq!(JumpType::ConditionalTrue.negate(), JumpType::ConditionalFalse);
/// assert_eq!(JumpType::Always.to_string(), "always");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, AsRefStr, Display, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum JumpType {
    /// Unconditional transfer: explicit jump or fall-through.
    Always,
    /// Taken when the branch condition holds.
    ConditionalTrue,
    /// Taken when the branch condition does not hold.
    ConditionalFalse,
}

impl JumpType {
    /// Returns `true` for the two conditional kinds.
    #[must_use]
    pub const fn is_conditional(self) -> bool {
        matches!(self, JumpType::ConditionalTrue | JumpType::ConditionalFalse)
    }

    /// Swaps the two conditional kinds, leaves [`JumpType::Always`] alone.
    #[must_use]
    pub const fn negate(self) -> JumpType {
        match self {
            JumpType::Always => JumpType::Always,
            JumpType::ConditionalTrue => JumpType::ConditionalFalse,
            JumpType::ConditionalFalse => JumpType::ConditionalTrue,
        }
    }

    /// Graphviz edge attributes used by [`crate::utils::graph::FlowGraph::to_dot`].
    pub(crate) const fn dot_style(self) -> &'static str {
        match self {
            JumpType::Always => "color=black",
            JumpType::ConditionalTrue => "color=darkgreen",
            JumpType::ConditionalFalse => "color=red, style=dashed",
        }
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn negation_is_involutive() {
        for kind in JumpType::iter() {
            assert_eq!(kind.negate().negate(), kind);
        }
    }

    #[test]
    fn names() {
        assert_eq!(JumpType::ConditionalTrue.as_ref(), "conditional_true");
        assert_eq!(JumpType::ConditionalFalse.to_string(), "conditional_false");
        assert!(!JumpType::Always.is_conditional());
    }
}
