//! Error types for the workflow core

use crate::{ActivityId, ExecutionId, InstanceId, TransitionId, WorkflowId};

/// Errors that can occur in workflow operations.
///
/// Structural (configuration) errors are detected by validation before
/// an instance can ever start. Runtime errors during a driver step leave
/// the execution in its last-committed state so the caller may inspect,
/// fix, and retry without corrupting the graph position.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("Workflow not found: {0}")]
    WorkflowNotFound(WorkflowId),

    #[error("Workflow instance not found: {0}")]
    InstanceNotFound(InstanceId),

    #[error("Activity not found: {0}")]
    ActivityNotFound(ActivityId),

    #[error("Transition not found: {0}")]
    TransitionNotFound(TransitionId),

    #[error("Execution not found: {0}")]
    ExecutionNotFound(ExecutionId),

    #[error("Duplicate activity id: {0}")]
    DuplicateActivityId(ActivityId),

    #[error("No start activity: no activity without inbound transitions")]
    NoStartActivity,

    #[error("Ambiguous start activity: several activities have no inbound transitions")]
    AmbiguousStartActivity,

    #[error("Disconnected graph: unreachable activities")]
    DisconnectedGraph,

    #[error("Transition {transition} references unregistered activity: {activity}")]
    UnregisteredEndpoint {
        transition: TransitionId,
        activity: ActivityId,
    },

    #[error("Workflow validation error: {0}")]
    Validation(String),

    #[error("No eligible outbound transition at activity: {activity}")]
    NoEligibleTransition { activity: ActivityId },

    #[error("Binding `{variable}` failed at activity {activity}: {reason}")]
    BindingEvaluation {
        activity: ActivityId,
        variable: String,
        reason: String,
    },

    #[error("Condition failed at activity {activity}: {reason}")]
    ConditionEvaluation { activity: ActivityId, reason: String },

    #[error("Execution is not waiting: {0}")]
    NotWaiting(ExecutionId),

    #[error("Execution is not active: {0}")]
    NotActive(ExecutionId),

    #[error("Execution already ended: {0}")]
    AlreadyEnded(ExecutionId),

    #[error("Persistence failure: {0}")]
    Persistence(String),

    #[error("Notification failure: {0}")]
    Notification(String),
}

/// Result type alias for workflow operations.
pub type FlowResult<T> = Result<T, FlowError>;

/// Errors raised at the evaluator boundary. The core propagates both
/// variants as [`FlowError::BindingEvaluation`] — an unsupported
/// conversion is never silently coerced.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("evaluation failed: {0}")]
    Evaluation(String),

    #[error("unsupported conversion: {from} -> {to}")]
    UnsupportedConversion { from: String, to: String },
}
