//! Executions and instances: the runtime side of a workflow
//!
//! A [`WorkflowInstance`] is one run of a definition — it owns the
//! execution tree, the durable root variable layer, and the pending
//! notifications not yet handed to the notification channel. It is the
//! unit of persistence: everything in here serializes.
//!
//! An [`Execution`] is a cursor through the graph. It moves while
//! `Active`, parks at an external activity while `Waiting`, and becomes
//! immutable once `Ended`.

use crate::{ActivityId, FlowError, FlowResult, Value, Workflow, WorkflowId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Unique identifier for a workflow instance.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceId(pub String);

impl InstanceId {
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

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for an execution within an instance.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionId(pub String);

impl ExecutionId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of an execution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ExecutionState {
    /// Advancing synchronously on the calling thread.
    #[default]
    Active,
    /// Parked at an external activity until a message arrives.
    Waiting,
    /// Reached an activity with no outbound transitions, or cancelled.
    Ended,
}

impl ExecutionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ended)
    }
}

/// A runtime cursor advancing through the workflow graph.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Execution {
    pub id: ExecutionId,
    /// Parent execution, for concurrent or nested branches. `None` for
    /// the root.
    pub parent: Option<ExecutionId>,
    /// The activity currently occupied. `None` only before start and
    /// after end.
    pub position: Option<ActivityId>,
    pub state: ExecutionState,
    /// The activity-local variable layer, shadowing the instance's root
    /// layer. Input bindings and message data land here.
    pub local_vars: HashMap<String, Value>,
}

impl Execution {
    pub fn new(parent: Option<ExecutionId>) -> Self {
        Self {
            id: ExecutionId::generate(),
            parent,
            position: None,
            state: ExecutionState::Active,
            local_vars: HashMap::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.state == ExecutionState::Active
    }

    pub fn is_waiting(&self) -> bool {
        self.state == ExecutionState::Waiting
    }

    pub fn is_ended(&self) -> bool {
        self.state == ExecutionState::Ended
    }
}

/// A queued signal to an external collaborator announcing a pending wait
/// state. The engine guarantees only that it is handed to the channel
/// after the instance commits, not when or how it is transported.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PendingNotification {
    pub id: String,
    pub instance_id: InstanceId,
    pub execution_id: ExecutionId,
    pub activity_id: ActivityId,
    pub created_at: DateTime<Utc>,
}

/// One run of a workflow definition: the root execution, the durable
/// variable store, and notifications awaiting dispatch.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkflowInstance {
    pub id: InstanceId,
    pub workflow_id: WorkflowId,
    /// Execution tree, root first.
    pub executions: Vec<Execution>,
    /// Root scope layer — the durable variable values.
    pub variables: HashMap<String, Value>,
    /// Notifications registered by suspensions and not yet dispatched.
    /// Drained by the engine strictly after a successful commit.
    pub pending_notifications: Vec<PendingNotification>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

impl WorkflowInstance {
    /// Create an instance with a fresh root execution, unpositioned and
    /// `Active`.
    pub fn new(workflow_id: WorkflowId) -> Self {
        let now = Utc::now();
        Self {
            id: InstanceId::generate(),
            workflow_id,
            executions: vec![Execution::new(None)],
            variables: HashMap::new(),
            pending_notifications: Vec::new(),
            created_at: now,
            updated_at: now,
            ended_at: None,
        }
    }

    pub fn root(&self) -> &Execution {
        &self.executions[0]
    }

    pub fn root_id(&self) -> ExecutionId {
        self.executions[0].id.clone()
    }

    pub fn execution(&self, id: &ExecutionId) -> FlowResult<&Execution> {
        self.executions
            .iter()
            .find(|e| &e.id == id)
            .ok_or_else(|| FlowError::ExecutionNotFound(id.clone()))
    }

    pub fn execution_mut(&mut self, id: &ExecutionId) -> FlowResult<&mut Execution> {
        self.executions
            .iter_mut()
            .find(|e| &e.id == id)
            .ok_or_else(|| FlowError::ExecutionNotFound(id.clone()))
    }

    /// The whole run is over when every execution has ended.
    pub fn is_ended(&self) -> bool {
        self.executions.iter().all(|e| e.is_ended())
    }

    // ── Lifecycle (driver-facing) ────────────────────────────────────

    /// Move an execution to a new position. The activity-local variable
    /// layer belongs to the position being left, so it is torn down
    /// here: only the current activity's layer may shadow the root.
    pub fn move_execution(&mut self, id: &ExecutionId, to: ActivityId) -> FlowResult<()> {
        let execution = self.execution_mut(id)?;
        if execution.is_ended() {
            return Err(FlowError::AlreadyEnded(id.clone()));
        }
        execution.local_vars.clear();
        execution.position = Some(to);
        self.touch();
        Ok(())
    }

    /// Park an execution in its wait state.
    pub fn suspend_execution(&mut self, id: &ExecutionId) -> FlowResult<()> {
        let execution = self.execution_mut(id)?;
        if execution.is_ended() {
            return Err(FlowError::AlreadyEnded(id.clone()));
        }
        execution.state = ExecutionState::Waiting;
        self.touch();
        Ok(())
    }

    /// Bring a waiting execution back to `Active`.
    pub fn resume_execution(&mut self, id: &ExecutionId) -> FlowResult<()> {
        let execution = self.execution_mut(id)?;
        if !execution.is_waiting() {
            return Err(FlowError::NotWaiting(id.clone()));
        }
        execution.state = ExecutionState::Active;
        self.touch();
        Ok(())
    }

    /// End an execution. Position clears; once every execution has
    /// ended, the instance records its end time.
    pub fn end_execution(&mut self, id: &ExecutionId) -> FlowResult<()> {
        let execution = self.execution_mut(id)?;
        if execution.is_ended() {
            return Err(FlowError::AlreadyEnded(id.clone()));
        }
        execution.state = ExecutionState::Ended;
        execution.position = None;
        execution.local_vars.clear();
        if self.is_ended() {
            self.ended_at = Some(Utc::now());
        }
        self.touch();
        Ok(())
    }

    // ── Notifications ────────────────────────────────────────────────

    /// Register a pending notification for a suspended execution.
    pub fn register_notification(
        &mut self,
        execution_id: &ExecutionId,
        activity_id: &ActivityId,
    ) -> FlowResult<()> {
        self.execution(execution_id)?;
        self.pending_notifications.push(PendingNotification {
            id: uuid::Uuid::new_v4().to_string(),
            instance_id: self.id.clone(),
            execution_id: execution_id.clone(),
            activity_id: activity_id.clone(),
            created_at: Utc::now(),
        });
        self.touch();
        Ok(())
    }

    /// Drain the registered notifications. The engine calls this only
    /// after the instance has committed.
    pub fn take_pending_notifications(&mut self) -> Vec<PendingNotification> {
        std::mem::take(&mut self.pending_notifications)
    }

    pub fn pending_count(&self) -> usize {
        self.pending_notifications.len()
    }

    // ── Variable resolution ──────────────────────────────────────────

    /// Read a variable as seen from an execution: the activity-local
    /// layer wins when the activity's scope declares the name or the
    /// layer holds it (input bindings may introduce undeclared locals),
    /// otherwise the root layer.
    pub fn read_variable<'a>(
        &'a self,
        definition: &Workflow,
        execution_id: &ExecutionId,
        name: &str,
    ) -> FlowResult<Option<&'a Value>> {
        let execution = self.execution(execution_id)?;
        if let Some(position) = &execution.position {
            if let Some(activity) = definition.activity(position) {
                if activity.scope.declares(name) || execution.local_vars.contains_key(name) {
                    return Ok(execution.local_vars.get(name));
                }
            }
        }
        Ok(self.variables.get(name))
    }

    /// Write a variable, targeting the layer whose static scope declares
    /// it: the activity layer when the activity declares the name,
    /// otherwise the root layer. An inner layer is never created
    /// implicitly for an undeclared name.
    pub fn write_variable(
        &mut self,
        definition: &Workflow,
        execution_id: &ExecutionId,
        name: &str,
        value: Value,
    ) -> FlowResult<()> {
        let execution = self.execution(execution_id)?;
        let local = execution
            .position
            .as_ref()
            .and_then(|p| definition.activity(p))
            .map(|a| a.scope.declares(name))
            .unwrap_or(false);

        if local {
            self.execution_mut(execution_id)?
                .local_vars
                .insert(name.to_string(), value);
        } else {
            self.variables.insert(name.to_string(), value);
        }
        self.touch();
        Ok(())
    }

    /// Stamp the instance as modified.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// A read-only view of the variables visible to one execution, handed to
/// the expression evaluator. Resolution is nearest-declaration-wins
/// through the scope chain.
pub struct ScopeView<'a> {
    definition: &'a Workflow,
    instance: &'a WorkflowInstance,
    execution_id: &'a ExecutionId,
}

impl<'a> ScopeView<'a> {
    pub fn new(
        definition: &'a Workflow,
        instance: &'a WorkflowInstance,
        execution_id: &'a ExecutionId,
    ) -> Self {
        Self {
            definition,
            instance,
            execution_id,
        }
    }

    pub fn get(&self, name: &str) -> Option<&'a Value> {
        self.instance
            .read_variable(self.definition, self.execution_id, name)
            .ok()
            .flatten()
    }

    pub fn execution_id(&self) -> &ExecutionId {
        self.execution_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Activity, VarType};
    use serde_json::json;

    fn make_workflow() -> Workflow {
        let mut wf = Workflow::new("Vars");
        wf.declare("count", VarType::Number);
        wf.add_activity(
            Activity::automatic("shadowed").with_variable("count", VarType::Number),
        )
        .unwrap();
        wf.add_activity(Activity::automatic("plain")).unwrap();
        wf.connect("shadowed", "plain").unwrap();
        wf
    }

    #[test]
    fn test_new_instance_has_active_unpositioned_root() {
        let instance = WorkflowInstance::new(WorkflowId::new("wf"));
        assert_eq!(instance.executions.len(), 1);
        assert!(instance.root().is_active());
        assert!(instance.root().position.is_none());
        assert!(!instance.is_ended());
        assert_eq!(instance.pending_count(), 0);
    }

    #[test]
    fn test_lifecycle() {
        let mut instance = WorkflowInstance::new(WorkflowId::new("wf"));
        let root = instance.root_id();

        instance.move_execution(&root, ActivityId::new("a")).unwrap();
        assert_eq!(instance.root().position, Some(ActivityId::new("a")));

        instance.suspend_execution(&root).unwrap();
        assert!(instance.root().is_waiting());

        instance.resume_execution(&root).unwrap();
        assert!(instance.root().is_active());

        instance.end_execution(&root).unwrap();
        assert!(instance.is_ended());
        assert!(instance.root().position.is_none());
        assert!(instance.ended_at.is_some());
    }

    #[test]
    fn test_ended_execution_is_immutable() {
        let mut instance = WorkflowInstance::new(WorkflowId::new("wf"));
        let root = instance.root_id();
        instance.end_execution(&root).unwrap();

        assert!(matches!(
            instance.move_execution(&root, ActivityId::new("a")),
            Err(FlowError::AlreadyEnded(_))
        ));
        assert!(matches!(
            instance.suspend_execution(&root),
            Err(FlowError::AlreadyEnded(_))
        ));
        assert!(matches!(
            instance.end_execution(&root),
            Err(FlowError::AlreadyEnded(_))
        ));
    }

    #[test]
    fn test_resume_requires_waiting() {
        let mut instance = WorkflowInstance::new(WorkflowId::new("wf"));
        let root = instance.root_id();
        assert!(matches!(
            instance.resume_execution(&root),
            Err(FlowError::NotWaiting(_))
        ));
    }

    #[test]
    fn test_notifications_drain_once() {
        let mut instance = WorkflowInstance::new(WorkflowId::new("wf"));
        let root = instance.root_id();
        instance
            .register_notification(&root, &ActivityId::new("approve"))
            .unwrap();
        assert_eq!(instance.pending_count(), 1);

        let taken = instance.take_pending_notifications();
        assert_eq!(taken.len(), 1);
        assert_eq!(taken[0].execution_id, root);
        assert_eq!(taken[0].activity_id, ActivityId::new("approve"));
        assert_eq!(instance.pending_count(), 0);
        assert!(instance.take_pending_notifications().is_empty());
    }

    #[test]
    fn test_move_tears_down_local_layer() {
        let wf = make_workflow();
        let mut instance = WorkflowInstance::new(wf.id.clone());
        let root = instance.root_id();
        instance.variables.insert("count".into(), json!(1));
        instance
            .move_execution(&root, ActivityId::new("shadowed"))
            .unwrap();
        instance.write_variable(&wf, &root, "count", json!(9)).unwrap();

        instance.move_execution(&root, ActivityId::new("plain")).unwrap();

        // The previous activity's layer is gone; resolution falls
        // through to the root.
        assert!(instance.root().local_vars.is_empty());
        assert_eq!(
            instance.read_variable(&wf, &root, "count").unwrap(),
            Some(&json!(1))
        );
    }

    #[test]
    fn test_undeclared_write_lands_on_root_layer() {
        let wf = make_workflow();
        let mut instance = WorkflowInstance::new(wf.id.clone());
        let root = instance.root_id();
        instance.move_execution(&root, ActivityId::new("plain")).unwrap();

        instance
            .write_variable(&wf, &root, "note", json!("hello"))
            .unwrap();
        assert_eq!(instance.variables.get("note"), Some(&json!("hello")));
        assert!(instance.root().local_vars.is_empty());
    }

    #[test]
    fn test_shadowed_write_stays_local() {
        let wf = make_workflow();
        let mut instance = WorkflowInstance::new(wf.id.clone());
        let root = instance.root_id();
        instance.variables.insert("count".into(), json!(1));
        instance
            .move_execution(&root, ActivityId::new("shadowed"))
            .unwrap();

        instance.write_variable(&wf, &root, "count", json!(9)).unwrap();

        // The activity layer shadows the root, which keeps its value.
        assert_eq!(
            instance.read_variable(&wf, &root, "count").unwrap(),
            Some(&json!(9))
        );
        assert_eq!(instance.variables.get("count"), Some(&json!(1)));
    }

    #[test]
    fn test_unshadowed_read_walks_to_root() {
        let wf = make_workflow();
        let mut instance = WorkflowInstance::new(wf.id.clone());
        let root = instance.root_id();
        instance.variables.insert("count".into(), json!(7));
        instance.move_execution(&root, ActivityId::new("plain")).unwrap();

        assert_eq!(
            instance.read_variable(&wf, &root, "count").unwrap(),
            Some(&json!(7))
        );
    }

    #[test]
    fn test_scope_view_resolves() {
        let wf = make_workflow();
        let mut instance = WorkflowInstance::new(wf.id.clone());
        let root = instance.root_id();
        instance.variables.insert("count".into(), json!(3));
        instance.move_execution(&root, ActivityId::new("plain")).unwrap();

        let view = ScopeView::new(&wf, &instance, &root);
        assert_eq!(view.get("count"), Some(&json!(3)));
        assert_eq!(view.get("missing"), None);
    }

    #[test]
    fn test_instance_serializes() {
        let instance = WorkflowInstance::new(WorkflowId::new("wf"));
        let text = serde_json::to_string(&instance).unwrap();
        let back: WorkflowInstance = serde_json::from_str(&text).unwrap();
        assert_eq!(back.id, instance.id);
        assert_eq!(back.executions.len(), 1);
    }
}
