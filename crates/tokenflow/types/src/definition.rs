//! Workflow definitions: the immutable graph an instance runs against
//!
//! A [`Workflow`] is an arena of activities and transitions. Transitions
//! are created exclusively through [`Workflow::connect`], which registers
//! the new handle on both endpoints atomically — either both ordered
//! lists are updated or neither. Definitions become immutable once
//! registered with the engine; structural problems are configuration
//! errors surfaced by [`Workflow::validate`], never at traversal time.

use crate::{
    Activity, ActivityId, Expression, FlowError, FlowResult, Scope, Transition, TransitionId,
    VarType,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Unique identifier for a workflow definition.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkflowId(pub String);

impl WorkflowId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn short(&self) -> &str {
        &self.0[..8.min(self.0.len())]
    }
}

impl std::fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A workflow definition — the graph an execution token advances through.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Workflow {
    pub id: WorkflowId,
    pub name: String,
    /// Root scope: variables visible to every activity unless shadowed.
    pub scope: Scope,
    /// The activity arena.
    pub activities: Vec<Activity>,
    /// The transition arena; [`TransitionId`] is an index into this.
    pub transitions: Vec<Transition>,
    /// Explicit start activity. When unset, the unique activity without
    /// inbound transitions is the start.
    pub initial: Option<ActivityId>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl Workflow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: WorkflowId::generate(),
            name: name.into(),
            scope: Scope::new(),
            activities: Vec::new(),
            transitions: Vec::new(),
            initial: None,
            created_at: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_initial(mut self, id: impl Into<String>) -> Self {
        self.initial = Some(ActivityId::new(id));
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Declare a variable in the root scope.
    pub fn declare(&mut self, name: impl Into<String>, var_type: VarType) {
        self.scope.declare(name, var_type);
    }

    /// Register an activity.
    pub fn add_activity(&mut self, activity: Activity) -> FlowResult<()> {
        if self.activities.iter().any(|a| a.id == activity.id) {
            return Err(FlowError::DuplicateActivityId(activity.id));
        }
        self.activities.push(activity);
        Ok(())
    }

    /// Create an unguarded transition between two registered activities.
    ///
    /// The handle is appended to the source's `out_transitions` and the
    /// destination's `in_transitions` in one step; both endpoints are
    /// checked before anything is mutated, so registration is never
    /// partial. Parallel transitions between the same pair are legal and
    /// represent independent branches.
    pub fn connect(
        &mut self,
        from: impl Into<ActivityId>,
        to: impl Into<ActivityId>,
    ) -> FlowResult<TransitionId> {
        self.connect_inner(from.into(), to.into(), None)
    }

    /// Create a transition guarded by a condition expression.
    pub fn connect_guarded(
        &mut self,
        from: impl Into<ActivityId>,
        to: impl Into<ActivityId>,
        condition: impl Into<Expression>,
    ) -> FlowResult<TransitionId> {
        self.connect_inner(from.into(), to.into(), Some(condition.into()))
    }

    fn connect_inner(
        &mut self,
        from: ActivityId,
        to: ActivityId,
        condition: Option<Expression>,
    ) -> FlowResult<TransitionId> {
        // Verify both endpoints before touching any list.
        let from_idx = self
            .activities
            .iter()
            .position(|a| a.id == from)
            .ok_or_else(|| FlowError::ActivityNotFound(from.clone()))?;
        let to_idx = self
            .activities
            .iter()
            .position(|a| a.id == to)
            .ok_or_else(|| FlowError::ActivityNotFound(to.clone()))?;

        let id = TransitionId(self.transitions.len());
        self.transitions.push(Transition {
            id,
            from,
            to,
            condition,
        });
        self.activities[from_idx].out_transitions.push(id);
        self.activities[to_idx].in_transitions.push(id);
        Ok(id)
    }

    // ── Lookup ───────────────────────────────────────────────────────

    pub fn activity(&self, id: &ActivityId) -> Option<&Activity> {
        self.activities.iter().find(|a| &a.id == id)
    }

    pub fn activity_mut(&mut self, id: &ActivityId) -> Option<&mut Activity> {
        self.activities.iter_mut().find(|a| &a.id == id)
    }

    pub fn transition(&self, id: TransitionId) -> Option<&Transition> {
        self.transitions.get(id.0)
    }

    /// Transitions leaving `id`, in declaration order.
    pub fn outgoing(&self, id: &ActivityId) -> Vec<&Transition> {
        self.activity(id)
            .map(|a| {
                a.out_transitions
                    .iter()
                    .filter_map(|t| self.transition(*t))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Transitions arriving at `id`, in declaration order.
    pub fn incoming(&self, id: &ActivityId) -> Vec<&Transition> {
        self.activity(id)
            .map(|a| {
                a.in_transitions
                    .iter()
                    .filter_map(|t| self.transition(*t))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Resolve the start activity: the explicit `initial` when set,
    /// otherwise the unique activity with no inbound transitions.
    pub fn start_activity(&self) -> FlowResult<&Activity> {
        if let Some(initial) = &self.initial {
            return self
                .activity(initial)
                .ok_or_else(|| FlowError::ActivityNotFound(initial.clone()));
        }
        let mut sources = self.activities.iter().filter(|a| a.in_transitions.is_empty());
        let first = sources.next().ok_or(FlowError::NoStartActivity)?;
        if sources.next().is_some() {
            return Err(FlowError::AmbiguousStartActivity);
        }
        Ok(first)
    }

    pub fn activity_count(&self) -> usize {
        self.activities.len()
    }

    pub fn transition_count(&self) -> usize {
        self.transitions.len()
    }

    // ── Validation ───────────────────────────────────────────────────

    /// Validate the definition for structural correctness. Called at
    /// registration time so a malformed graph can never reach `start`.
    pub fn validate(&self) -> FlowResult<()> {
        if self.activities.is_empty() {
            return Err(FlowError::Validation(
                "Workflow must have at least one activity".into(),
            ));
        }

        let mut seen = HashSet::new();
        for activity in &self.activities {
            if !seen.insert(&activity.id) {
                return Err(FlowError::DuplicateActivityId(activity.id.clone()));
            }
        }

        // Every transition endpoint must be registered, and the handle
        // must appear in both endpoints' lists with matching direction.
        for transition in &self.transitions {
            let from = self.activity(&transition.from).ok_or_else(|| {
                FlowError::UnregisteredEndpoint {
                    transition: transition.id,
                    activity: transition.from.clone(),
                }
            })?;
            let to = self.activity(&transition.to).ok_or_else(|| {
                FlowError::UnregisteredEndpoint {
                    transition: transition.id,
                    activity: transition.to.clone(),
                }
            })?;
            if !from.out_transitions.contains(&transition.id)
                || !to.in_transitions.contains(&transition.id)
            {
                return Err(FlowError::Validation(format!(
                    "transition {} is not registered on both endpoints",
                    transition.id
                )));
            }
        }
        for activity in &self.activities {
            for tid in &activity.out_transitions {
                match self.transition(*tid) {
                    Some(t) if t.from == activity.id => {}
                    _ => {
                        return Err(FlowError::Validation(format!(
                            "activity {} lists {} as outbound but is not its source",
                            activity.id, tid
                        )))
                    }
                }
            }
            for tid in &activity.in_transitions {
                match self.transition(*tid) {
                    Some(t) if t.to == activity.id => {}
                    _ => {
                        return Err(FlowError::Validation(format!(
                            "activity {} lists {} as inbound but is not its destination",
                            activity.id, tid
                        )))
                    }
                }
            }
        }

        let start = self.start_activity()?;

        // Every activity must be reachable from the start.
        let reachable = self.reachable_from(&start.id);
        for activity in &self.activities {
            if !reachable.contains(&activity.id) {
                return Err(FlowError::DisconnectedGraph);
            }
        }

        Ok(())
    }

    /// All activities reachable from `start`, following outbound
    /// transitions.
    fn reachable_from(&self, start: &ActivityId) -> HashSet<ActivityId> {
        let mut visited = HashSet::new();
        let mut queue = vec![start.clone()];

        while let Some(current) = queue.pop() {
            if visited.insert(current.clone()) {
                for transition in self.outgoing(&current) {
                    if !visited.contains(&transition.to) {
                        queue.push(transition.to.clone());
                    }
                }
            }
        }

        visited
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_linear_workflow() -> Workflow {
        let mut wf = Workflow::new("Payment");
        wf.add_activity(Activity::automatic("charge")).unwrap();
        wf.add_activity(Activity::external("approve")).unwrap();
        wf.add_activity(Activity::automatic("settle")).unwrap();
        wf.connect("charge", "approve").unwrap();
        wf.connect("approve", "settle").unwrap();
        wf
    }

    #[test]
    fn test_connect_registers_both_endpoints() {
        let wf = make_linear_workflow();
        let t = wf.transition(TransitionId(0)).unwrap();

        let from = wf.activity(&t.from).unwrap();
        let to = wf.activity(&t.to).unwrap();
        assert!(from.out_transitions.contains(&t.id));
        assert!(to.in_transitions.contains(&t.id));
    }

    #[test]
    fn test_connect_unknown_endpoint_mutates_nothing() {
        let mut wf = make_linear_workflow();
        let before = wf.transition_count();

        let result = wf.connect("charge", "missing");
        assert!(matches!(result, Err(FlowError::ActivityNotFound(_))));

        assert_eq!(wf.transition_count(), before);
        // No dangling handle on the known endpoint either.
        assert_eq!(wf.activity(&ActivityId::new("charge")).unwrap().out_transitions.len(), 1);
    }

    #[test]
    fn test_parallel_transitions_are_legal() {
        let mut wf = Workflow::new("Parallel");
        wf.add_activity(Activity::automatic("a")).unwrap();
        wf.add_activity(Activity::automatic("b")).unwrap();
        wf.connect("a", "b").unwrap();
        wf.connect("a", "b").unwrap();

        assert_eq!(wf.transition_count(), 2);
        assert_eq!(wf.outgoing(&ActivityId::new("a")).len(), 2);
        assert!(wf.validate().is_ok());
    }

    #[test]
    fn test_duplicate_activity_id() {
        let mut wf = Workflow::new("Dup");
        wf.add_activity(Activity::automatic("a")).unwrap();
        let result = wf.add_activity(Activity::external("a"));
        assert!(matches!(result, Err(FlowError::DuplicateActivityId(_))));
    }

    #[test]
    fn test_start_activity_is_the_one_without_inbound() {
        let wf = make_linear_workflow();
        assert_eq!(wf.start_activity().unwrap().id, ActivityId::new("charge"));
    }

    #[test]
    fn test_explicit_initial_wins() {
        let wf = make_linear_workflow().with_initial("approve");
        assert_eq!(wf.start_activity().unwrap().id, ActivityId::new("approve"));
    }

    #[test]
    fn test_no_start_activity() {
        let mut wf = Workflow::new("Cycle");
        wf.add_activity(Activity::automatic("a")).unwrap();
        wf.add_activity(Activity::automatic("b")).unwrap();
        wf.connect("a", "b").unwrap();
        wf.connect("b", "a").unwrap();

        assert!(matches!(wf.start_activity(), Err(FlowError::NoStartActivity)));
        assert!(wf.validate().is_err());
    }

    #[test]
    fn test_ambiguous_start_activity() {
        let mut wf = Workflow::new("TwoRoots");
        wf.add_activity(Activity::automatic("a")).unwrap();
        wf.add_activity(Activity::automatic("b")).unwrap();
        wf.add_activity(Activity::automatic("c")).unwrap();
        wf.connect("a", "c").unwrap();
        wf.connect("b", "c").unwrap();

        assert!(matches!(
            wf.start_activity(),
            Err(FlowError::AmbiguousStartActivity)
        ));
    }

    #[test]
    fn test_validate_disconnected_graph() {
        let mut wf = make_linear_workflow();
        // Island reachable from nowhere, pinned start keeps it unambiguous.
        wf.add_activity(Activity::automatic("island")).unwrap();
        wf.add_activity(Activity::automatic("island2")).unwrap();
        wf.connect("island", "island2").unwrap();
        let wf = wf.with_initial("charge");

        assert!(matches!(wf.validate(), Err(FlowError::DisconnectedGraph)));
    }

    #[test]
    fn test_validate_ok() {
        assert!(make_linear_workflow().validate().is_ok());
    }

    #[test]
    fn test_outgoing_declaration_order() {
        let mut wf = Workflow::new("Branch");
        wf.add_activity(Activity::automatic("decide")).unwrap();
        wf.add_activity(Activity::automatic("x")).unwrap();
        wf.add_activity(Activity::automatic("y")).unwrap();
        wf.connect_guarded("decide", "x", "left").unwrap();
        wf.connect("decide", "y").unwrap();

        let out = wf.outgoing(&ActivityId::new("decide"));
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].to, ActivityId::new("x"));
        assert!(out[0].is_guarded());
        assert_eq!(out[1].to, ActivityId::new("y"));
    }

    #[test]
    fn test_root_scope_declarations() {
        let mut wf = Workflow::new("Vars");
        wf.declare("amount", VarType::Number);
        assert!(wf.scope.declares("amount"));
        assert_eq!(wf.scope.declared_type("amount"), VarType::Number);
    }
}
