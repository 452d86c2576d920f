//! Transitions: directed, optionally guarded edges
//!
//! A transition exists only inside the arena owned by a [`Workflow`]:
//! endpoints are named by [`ActivityId`] and the transition itself by a
//! [`TransitionId`] handle held in both endpoints' ordered lists.
//!
//! [`Workflow`]: crate::Workflow

use crate::{ActivityId, Expression};
use serde::{Deserialize, Serialize};

/// Stable handle for a transition: an index into the workflow's
/// transition arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransitionId(pub usize);

impl std::fmt::Display for TransitionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// A directed edge between two activities, with an optional guard
/// condition evaluated at the moment the edge is considered.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transition {
    pub id: TransitionId,
    pub from: ActivityId,
    pub to: ActivityId,
    /// Guard condition. `None` means the transition always qualifies.
    pub condition: Option<Expression>,
}

impl Transition {
    pub fn is_guarded(&self) -> bool {
        self.condition.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_id_display() {
        assert_eq!(format!("{}", TransitionId(3)), "t3");
    }

    #[test]
    fn test_guarded() {
        let t = Transition {
            id: TransitionId(0),
            from: ActivityId::new("a"),
            to: ActivityId::new("b"),
            condition: None,
        };
        assert!(!t.is_guarded());

        let g = Transition {
            condition: Some(Expression::new("approved")),
            ..t
        };
        assert!(g.is_guarded());
    }
}
