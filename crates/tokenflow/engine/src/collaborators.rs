//! Collaborator interfaces: what the core consumes, not how it is built
//!
//! The engine depends on three outside concerns only through traits: expression
//! evaluation, instance persistence, and notification transport. They
//! are wired in through an explicit [`Collaborators`] object handed to
//! the engine at construction — there is no ambient singleton factory.
//!
//! The in-memory implementations at the bottom are real enough for
//! embedders that keep everything in-process, and are what the test
//! suites run against.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokenflow_types::{
    EvalError, Expression, FlowError, FlowResult, PendingNotification, ScopeView, Value, VarType,
    WorkflowInstance,
};

/// Evaluates opaque expressions against a scope and converts values
/// between declared types.
pub trait ExpressionEvaluator: Send + Sync {
    /// Evaluate an expression against the variables visible to one
    /// execution. Conditions use this too; the design relies on
    /// evaluation being free of observable side effects so candidate
    /// transitions can be re-tested in order.
    fn evaluate(&self, expression: &Expression, scope: &ScopeView<'_>) -> Result<Value, EvalError>;

    /// Convert a value to a declared target type. Unsupported pairs fail
    /// with [`EvalError::UnsupportedConversion`]; the core propagates
    /// that as a binding failure rather than coercing.
    fn convert(&self, value: Value, target: &VarType) -> Result<Value, EvalError>;
}

/// Durably stores a workflow instance. `commit` must complete before any
/// notification registered during the committed step is dispatched.
pub trait InstanceStore: Send + Sync {
    fn commit(&self, instance: &WorkflowInstance) -> FlowResult<()>;
}

/// Delivers notifications to whatever transport a deployment chooses.
/// The core only guarantees a notification is handed over after commit,
/// not when or how it travels.
pub trait NotificationChannel: Send + Sync {
    fn notify(&self, notification: PendingNotification) -> FlowResult<()>;
}

/// The explicit wiring of collaborators passed into the engine.
#[derive(Clone)]
pub struct Collaborators {
    pub evaluator: Arc<dyn ExpressionEvaluator>,
    pub store: Arc<dyn InstanceStore>,
    pub channel: Arc<dyn NotificationChannel>,
}

impl Collaborators {
    pub fn new(
        evaluator: Arc<dyn ExpressionEvaluator>,
        store: Arc<dyn InstanceStore>,
        channel: Arc<dyn NotificationChannel>,
    ) -> Self {
        Self {
            evaluator,
            store,
            channel,
        }
    }
}

/// An in-memory store keeping every committed snapshot, newest last.
#[derive(Default)]
pub struct InMemoryStore {
    commits: Mutex<Vec<WorkflowInstance>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commit_count(&self) -> usize {
        self.commits.lock().expect("store lock poisoned").len()
    }

    /// The most recent committed snapshot, if any.
    pub fn last(&self) -> Option<WorkflowInstance> {
        self.commits
            .lock()
            .expect("store lock poisoned")
            .last()
            .cloned()
    }
}

impl InstanceStore for InMemoryStore {
    fn commit(&self, instance: &WorkflowInstance) -> FlowResult<()> {
        self.commits
            .lock()
            .map_err(|_| FlowError::Persistence("store lock poisoned".into()))?
            .push(instance.clone());
        Ok(())
    }
}

/// A channel that buffers notifications for a worker to drain, FIFO.
#[derive(Default)]
pub struct QueueChannel {
    queue: Mutex<VecDeque<PendingNotification>>,
}

impl QueueChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pop the oldest notification, if any.
    pub fn take(&self) -> Option<PendingNotification> {
        self.queue.lock().expect("channel lock poisoned").pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().expect("channel lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl NotificationChannel for QueueChannel {
    fn notify(&self, notification: PendingNotification) -> FlowResult<()> {
        self.queue
            .lock()
            .map_err(|_| FlowError::Notification("channel lock poisoned".into()))?
            .push_back(notification);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokenflow_types::{ActivityId, ExecutionId, InstanceId, WorkflowId};

    fn make_notification() -> PendingNotification {
        PendingNotification {
            id: "n1".into(),
            instance_id: InstanceId::new("i1"),
            execution_id: ExecutionId::new("e1"),
            activity_id: ActivityId::new("approve"),
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_in_memory_store_keeps_snapshots() {
        let store = InMemoryStore::new();
        assert_eq!(store.commit_count(), 0);
        assert!(store.last().is_none());

        let instance = WorkflowInstance::new(WorkflowId::new("wf"));
        store.commit(&instance).unwrap();
        store.commit(&instance).unwrap();

        assert_eq!(store.commit_count(), 2);
        assert_eq!(store.last().unwrap().id, instance.id);
    }

    #[test]
    fn test_queue_channel_is_fifo() {
        let channel = QueueChannel::new();
        assert!(channel.is_empty());

        let mut first = make_notification();
        first.id = "first".into();
        let mut second = make_notification();
        second.id = "second".into();

        channel.notify(first).unwrap();
        channel.notify(second).unwrap();
        assert_eq!(channel.len(), 2);

        assert_eq!(channel.take().unwrap().id, "first");
        assert_eq!(channel.take().unwrap().id, "second");
        assert!(channel.take().is_none());
    }
}
