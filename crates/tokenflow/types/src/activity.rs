//! Activities: graph nodes with guards, bindings, and behavior
//!
//! An activity specializes a scope: besides its own variable
//! declarations it carries an optional entry guard, input/output
//! bindings, the transition handles touching it, and a [`Behavior`]
//! variant selecting what happens when the token arrives.

use crate::{Binding, Expression, Scope, TransitionId, VarType};
use serde::{Deserialize, Serialize};

/// Unique identifier for an activity within one workflow.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActivityId(pub String);

impl ActivityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for ActivityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ActivityId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ActivityId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// What happens when the execution token arrives at an activity.
///
/// New behaviors are added as new variants plus driver match arms,
/// each carrying only the data its semantics need.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Behavior {
    /// Performs its work synchronously and advances in the same step.
    Automatic,
    /// Suspends the execution and registers a pending notification for
    /// an external collaborator; a later message resumes it.
    External,
}

impl Behavior {
    /// Whether arriving here parks the execution in a wait state.
    pub fn is_wait_state(&self) -> bool {
        matches!(self, Behavior::External)
    }
}

/// A node in the workflow graph.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Activity {
    pub id: ActivityId,
    /// Variables declared at activity level, shadowing the root scope.
    pub scope: Scope,
    /// Entry guard, evaluated before the activity may start. A false
    /// guard bypasses the activity along an eligible outbound transition.
    pub condition: Option<Expression>,
    /// Evaluated against the enclosing scope and written into the local
    /// layer before the behavior runs. Declaration order.
    pub input_bindings: Vec<Binding>,
    /// Evaluated against the local layer and written back out after the
    /// behavior completes or resumes. Declaration order.
    pub output_bindings: Vec<Binding>,
    /// Handles of transitions arriving here. Invariant: each names a
    /// transition whose `to` is this activity.
    pub in_transitions: Vec<TransitionId>,
    /// Handles of transitions leaving here, in declaration order — the
    /// order the driver scans for the first eligible one. Invariant:
    /// each names a transition whose `from` is this activity.
    pub out_transitions: Vec<TransitionId>,
    pub behavior: Behavior,
}

impl Activity {
    pub fn new(id: impl Into<String>, behavior: Behavior) -> Self {
        Self {
            id: ActivityId::new(id),
            scope: Scope::new(),
            condition: None,
            input_bindings: Vec::new(),
            output_bindings: Vec::new(),
            in_transitions: Vec::new(),
            out_transitions: Vec::new(),
            behavior,
        }
    }

    /// An activity that completes synchronously.
    pub fn automatic(id: impl Into<String>) -> Self {
        Self::new(id, Behavior::Automatic)
    }

    /// An asynchronous wait state resolved by an external collaborator.
    pub fn external(id: impl Into<String>) -> Self {
        Self::new(id, Behavior::External)
    }

    pub fn with_condition(mut self, condition: impl Into<Expression>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn with_input(mut self, variable: impl Into<String>, expr: impl Into<Expression>) -> Self {
        self.input_bindings.push(Binding::new(variable, expr));
        self
    }

    pub fn with_output(mut self, variable: impl Into<String>, expr: impl Into<Expression>) -> Self {
        self.output_bindings.push(Binding::new(variable, expr));
        self
    }

    /// Declare a variable in the activity's own scope.
    pub fn with_variable(mut self, name: impl Into<String>, var_type: VarType) -> Self {
        self.scope.declare(name, var_type);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        let auto = Activity::automatic("charge");
        assert_eq!(auto.behavior, Behavior::Automatic);
        assert!(!auto.behavior.is_wait_state());

        let ext = Activity::external("approve");
        assert_eq!(ext.behavior, Behavior::External);
        assert!(ext.behavior.is_wait_state());
        assert!(ext.out_transitions.is_empty());
    }

    #[test]
    fn test_builder() {
        let activity = Activity::automatic("charge")
            .with_condition("enabled")
            .with_input("amount", "order_total")
            .with_input("currency", "\"EUR\"")
            .with_output("charged", "amount")
            .with_variable("amount", VarType::Number);

        assert!(activity.condition.is_some());
        assert_eq!(activity.input_bindings.len(), 2);
        assert_eq!(activity.input_bindings[0].variable, "amount");
        assert_eq!(activity.input_bindings[1].variable, "currency");
        assert_eq!(activity.output_bindings.len(), 1);
        assert!(activity.scope.declares("amount"));
    }
}
