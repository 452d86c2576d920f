//! The execution driver: one explicit step function and a loop
//!
//! Rather than recursing into each destination activity and "returning
//! early" on suspension, the driver is a state machine: [`Driver::step`]
//! advances one execution by exactly one activity and reports a
//! [`StepOutcome`]; [`Driver::run`] loops until the token suspends or
//! ends. Suspension is returning control, never blocking — a parked
//! execution is resumed later by [`Driver::handle_message`], possibly
//! from a different thread entirely.

use crate::collaborators::ExpressionEvaluator;
use std::collections::HashMap;
use std::sync::Arc;
use tokenflow_types::{
    Activity, ActivityId, Behavior, Binding, EvalError, ExecutionId, ExecutionState, Expression,
    FlowError, FlowResult, ScopeView, Value, VarType, Workflow, WorkflowInstance,
};

/// The result of advancing an execution by one activity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// The token follows a transition to this activity next.
    Continue(ActivityId),
    /// The token parked at a wait state; a notification was registered.
    Suspended,
    /// The token reached an activity with no outbound transitions.
    Ended,
}

/// Advances executions through a workflow graph.
pub struct Driver {
    evaluator: Arc<dyn ExpressionEvaluator>,
}

impl Driver {
    pub fn new(evaluator: Arc<dyn ExpressionEvaluator>) -> Self {
        Self { evaluator }
    }

    /// Position the root execution at the start activity and drive it to
    /// its first suspension or to completion.
    pub fn start(&self, instance: &mut WorkflowInstance, definition: &Workflow) -> FlowResult<()> {
        let start = definition.start_activity()?.id.clone();
        let root = instance.root_id();
        instance.move_execution(&root, start)?;
        self.run(instance, definition, &root)
    }

    /// Drive one execution until it suspends or ends.
    pub fn run(
        &self,
        instance: &mut WorkflowInstance,
        definition: &Workflow,
        execution_id: &ExecutionId,
    ) -> FlowResult<()> {
        loop {
            match self.step(instance, definition, execution_id)? {
                StepOutcome::Continue(next) => instance.move_execution(execution_id, next)?,
                StepOutcome::Suspended | StepOutcome::Ended => return Ok(()),
            }
        }
    }

    /// Advance an execution through the activity it is positioned at:
    /// entry guard, input bindings, then behavior dispatch.
    pub fn step(
        &self,
        instance: &mut WorkflowInstance,
        definition: &Workflow,
        execution_id: &ExecutionId,
    ) -> FlowResult<StepOutcome> {
        let position = instance
            .execution(execution_id)?
            .position
            .clone()
            .ok_or_else(|| {
                FlowError::Validation(format!("execution {execution_id} is not positioned"))
            })?;
        let activity = definition
            .activity(&position)
            .ok_or_else(|| FlowError::ActivityNotFound(position.clone()))?;

        // A false entry guard bypasses the activity entirely: the token
        // leaves along the first eligible outbound transition instead.
        if let Some(condition) = &activity.condition {
            if !self.test_condition(condition, definition, instance, execution_id, &activity.id)? {
                tracing::debug!(activity = %activity.id, "entry guard false, bypassing");
                let next = self.select_transition(definition, instance, execution_id, activity)?;
                return Ok(StepOutcome::Continue(next));
            }
        }

        self.apply_input_bindings(definition, instance, execution_id, activity)?;

        match activity.behavior {
            Behavior::Automatic => self.leave(definition, instance, execution_id, activity),
            Behavior::External => {
                instance.register_notification(execution_id, &activity.id)?;
                instance.suspend_execution(execution_id)?;
                tracing::debug!(
                    execution = %execution_id,
                    activity = %activity.id,
                    "execution suspended at wait state"
                );
                Ok(StepOutcome::Suspended)
            }
        }
    }

    /// Deliver a completion message to a waiting execution: merge the
    /// data, apply output bindings, and pick the outbound transition,
    /// all before flipping back to `Active` — a failure at any of those
    /// keeps the wait state so the delivery can be retried.
    ///
    /// Any execution not in `Waiting` rejects the delivery with
    /// `NotWaiting` — duplicates and late messages must never race a
    /// resumed or ended token.
    pub fn handle_message(
        &self,
        instance: &mut WorkflowInstance,
        definition: &Workflow,
        execution_id: &ExecutionId,
        data: HashMap<String, Value>,
    ) -> FlowResult<()> {
        let execution = instance.execution(execution_id)?;
        if !execution.is_waiting() {
            return Err(FlowError::NotWaiting(execution_id.clone()));
        }
        let position = execution
            .position
            .clone()
            .ok_or_else(|| FlowError::NotWaiting(execution_id.clone()))?;
        let activity = definition
            .activity(&position)
            .ok_or_else(|| FlowError::ActivityNotFound(position.clone()))?;

        // Message data lands in the local layer before outputs run.
        instance.execution_mut(execution_id)?.local_vars.extend(data);

        // Outputs and the outbound guard scan both run while still
        // Waiting: any failure up to here keeps the wait state intact
        // so the delivery can be retried with fixed data.
        self.apply_output_bindings(definition, instance, execution_id, activity)?;
        if activity.out_transitions.is_empty() {
            instance.resume_execution(execution_id)?;
            instance.end_execution(execution_id)?;
            return Ok(());
        }
        let next = self.select_transition(definition, instance, execution_id, activity)?;

        instance.resume_execution(execution_id)?;
        tracing::debug!(
            execution = %execution_id,
            activity = %activity.id,
            "execution resumed by message"
        );
        instance.move_execution(execution_id, next)?;
        self.run(instance, definition, execution_id)
    }

    /// Cancel a waiting execution: it ends without taking a transition.
    /// Any notification still queued for it is dropped.
    pub fn cancel(
        &self,
        instance: &mut WorkflowInstance,
        execution_id: &ExecutionId,
    ) -> FlowResult<()> {
        let execution = instance.execution(execution_id)?;
        match execution.state {
            ExecutionState::Ended => Err(FlowError::AlreadyEnded(execution_id.clone())),
            ExecutionState::Active => Err(FlowError::NotWaiting(execution_id.clone())),
            ExecutionState::Waiting => {
                instance
                    .pending_notifications
                    .retain(|n| &n.execution_id != execution_id);
                instance.end_execution(execution_id)?;
                tracing::debug!(execution = %execution_id, "waiting execution cancelled");
                Ok(())
            }
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// Apply output bindings, end the execution when no transitions
    /// leave the activity, otherwise pick the next destination.
    fn leave(
        &self,
        definition: &Workflow,
        instance: &mut WorkflowInstance,
        execution_id: &ExecutionId,
        activity: &Activity,
    ) -> FlowResult<StepOutcome> {
        self.apply_output_bindings(definition, instance, execution_id, activity)?;
        if activity.out_transitions.is_empty() {
            instance.end_execution(execution_id)?;
            tracing::debug!(execution = %execution_id, activity = %activity.id, "execution ended");
            return Ok(StepOutcome::Ended);
        }
        let next = self.select_transition(definition, instance, execution_id, activity)?;
        Ok(StepOutcome::Continue(next))
    }

    /// First-true-wins over declaration order: an unguarded transition
    /// always qualifies, a guarded one qualifies when its condition
    /// evaluates true. No eligible transition is an error, not a stall.
    fn select_transition(
        &self,
        definition: &Workflow,
        instance: &WorkflowInstance,
        execution_id: &ExecutionId,
        activity: &Activity,
    ) -> FlowResult<ActivityId> {
        for tid in &activity.out_transitions {
            let transition = definition
                .transition(*tid)
                .ok_or(FlowError::TransitionNotFound(*tid))?;
            match &transition.condition {
                None => return Ok(transition.to.clone()),
                Some(condition) => {
                    if self.test_condition(
                        condition,
                        definition,
                        instance,
                        execution_id,
                        &activity.id,
                    )? {
                        return Ok(transition.to.clone());
                    }
                }
            }
        }
        Err(FlowError::NoEligibleTransition {
            activity: activity.id.clone(),
        })
    }

    fn test_condition(
        &self,
        condition: &Expression,
        definition: &Workflow,
        instance: &WorkflowInstance,
        execution_id: &ExecutionId,
        activity_id: &ActivityId,
    ) -> FlowResult<bool> {
        let view = ScopeView::new(definition, instance, execution_id);
        let value = self
            .evaluator
            .evaluate(condition, &view)
            .map_err(|e| FlowError::ConditionEvaluation {
                activity: activity_id.clone(),
                reason: e.to_string(),
            })?;
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(FlowError::ConditionEvaluation {
                activity: activity_id.clone(),
                reason: format!("expected a boolean, got {other}"),
            }),
        }
    }

    /// Evaluate input bindings in declaration order against the
    /// enclosing scope and write the results into the activity-local
    /// layer. Results are staged so a failing binding leaves the
    /// execution untouched.
    fn apply_input_bindings(
        &self,
        definition: &Workflow,
        instance: &mut WorkflowInstance,
        execution_id: &ExecutionId,
        activity: &Activity,
    ) -> FlowResult<()> {
        if activity.input_bindings.is_empty() {
            return Ok(());
        }
        let mut staged = Vec::with_capacity(activity.input_bindings.len());
        for binding in &activity.input_bindings {
            let declared = activity.scope.declared_type(&binding.variable);
            let value = self.evaluate_binding(definition, instance, execution_id, activity, binding, declared)?;
            staged.push((binding.variable.clone(), value));
        }
        instance.execution_mut(execution_id)?.local_vars.extend(staged);
        Ok(())
    }

    /// Evaluate output bindings in declaration order against the local
    /// layer and write the results back out, each to the layer whose
    /// static scope declares it. Staged like inputs.
    fn apply_output_bindings(
        &self,
        definition: &Workflow,
        instance: &mut WorkflowInstance,
        execution_id: &ExecutionId,
        activity: &Activity,
    ) -> FlowResult<()> {
        if activity.output_bindings.is_empty() {
            return Ok(());
        }
        let mut staged = Vec::with_capacity(activity.output_bindings.len());
        for binding in &activity.output_bindings {
            let declared = if activity.scope.declares(&binding.variable) {
                activity.scope.declared_type(&binding.variable)
            } else {
                definition.scope.declared_type(&binding.variable)
            };
            let value = self.evaluate_binding(definition, instance, execution_id, activity, binding, declared)?;
            staged.push((binding.variable.clone(), value));
        }
        for (name, value) in staged {
            instance.write_variable(definition, execution_id, &name, value)?;
        }
        Ok(())
    }

    fn evaluate_binding(
        &self,
        definition: &Workflow,
        instance: &WorkflowInstance,
        execution_id: &ExecutionId,
        activity: &Activity,
        binding: &Binding,
        declared: VarType,
    ) -> FlowResult<Value> {
        let view = ScopeView::new(definition, instance, execution_id);
        let value = self
            .evaluator
            .evaluate(&binding.expression, &view)
            .map_err(|e| Self::binding_error(activity, binding, e))?;
        if declared == VarType::Any {
            return Ok(value);
        }
        self.evaluator
            .convert(value, &declared)
            .map_err(|e| Self::binding_error(activity, binding, e))
    }

    fn binding_error(activity: &Activity, binding: &Binding, source: EvalError) -> FlowError {
        FlowError::BindingEvaluation {
            activity: activity.id.clone(),
            variable: binding.variable.clone(),
            reason: source.to_string(),
        }
    }
}
