//! The engine facade: registry, instances, driver, and the checkpoint
//!
//! [`WorkflowEngine`] owns the definition registry and the live
//! instances and funnels every state change through one checkpoint:
//! commit the instance to the store, then dispatch whatever
//! notifications the drive registered. The order is load-bearing. A
//! collaborator that reacts to a notification instantly — same thread,
//! same call stack — finds the wait state already durable.

use crate::collaborators::{Collaborators, InstanceStore, NotificationChannel};
use crate::driver::Driver;
use crate::registry::WorkflowRegistry;
use std::collections::HashMap;
use std::sync::Arc;
use tokenflow_types::{
    ExecutionId, FlowError, FlowResult, InstanceId, Value, Workflow, WorkflowId, WorkflowInstance,
};

/// Owns workflow definitions and live instances, and drives them.
pub struct WorkflowEngine {
    registry: WorkflowRegistry,
    instances: HashMap<InstanceId, WorkflowInstance>,
    driver: Driver,
    store: Arc<dyn InstanceStore>,
    channel: Arc<dyn NotificationChannel>,
}

impl WorkflowEngine {
    pub fn new(collaborators: Collaborators) -> Self {
        Self {
            registry: WorkflowRegistry::new(),
            instances: HashMap::new(),
            driver: Driver::new(collaborators.evaluator),
            store: collaborators.store,
            channel: collaborators.channel,
        }
    }

    // ── Definitions ──────────────────────────────────────────────────

    /// Validate and register a workflow definition.
    pub fn register_workflow(&mut self, workflow: Workflow) -> FlowResult<WorkflowId> {
        self.registry.register(workflow)
    }

    pub fn workflow(&self, id: &WorkflowId) -> FlowResult<&Workflow> {
        self.registry.get(id)
    }

    pub fn find_workflow(&self, name: &str) -> Option<&Workflow> {
        self.registry.find_by_name(name)
    }

    pub fn workflow_count(&self) -> usize {
        self.registry.count()
    }

    // ── Instance lifecycle ───────────────────────────────────────────

    /// Create an instance of a registered workflow and drive its root
    /// execution to the first suspension or to completion, then
    /// checkpoint.
    ///
    /// A failed step still commits and retains the instance, parked at
    /// the failing activity: the caller can inspect it through the
    /// queries, fix its data with [`WorkflowEngine::set_variable`], and
    /// re-drive it with [`WorkflowEngine::resume`].
    pub fn start(&mut self, workflow_id: &WorkflowId) -> FlowResult<InstanceId> {
        let definition = self.registry.get(workflow_id)?;
        let mut instance = WorkflowInstance::new(workflow_id.clone());
        let instance_id = instance.id.clone();

        let driven = self.driver.start(&mut instance, definition);
        checkpoint(self.store.as_ref(), self.channel.as_ref(), &mut instance)?;

        match &driven {
            Ok(()) => tracing::info!(
                instance_id = %instance_id.short(),
                workflow = %definition.name,
                ended = instance.is_ended(),
                "workflow instance started"
            ),
            Err(error) => tracing::warn!(
                instance_id = %instance_id.short(),
                workflow = %definition.name,
                %error,
                "workflow instance parked on start failure"
            ),
        }
        self.instances.insert(instance_id.clone(), instance);
        driven.map(|()| instance_id)
    }

    /// Deliver a completion message to a waiting execution and drive it
    /// onward, then checkpoint. A delivery to an execution that is not
    /// waiting fails with `NotWaiting` and changes nothing.
    ///
    /// Any driver failure rolls the in-memory instance back to its
    /// last-committed state, so queries never observe data the store has
    /// not seen and the delivery stays retryable.
    pub fn handle_message(
        &mut self,
        instance_id: &InstanceId,
        execution_id: &ExecutionId,
        data: HashMap<String, Value>,
    ) -> FlowResult<()> {
        let instance = self
            .instances
            .get_mut(instance_id)
            .ok_or_else(|| FlowError::InstanceNotFound(instance_id.clone()))?;
        let definition = self.registry.get(&instance.workflow_id)?;

        let committed = instance.clone();
        if let Err(error) = self
            .driver
            .handle_message(instance, definition, execution_id, data)
        {
            *instance = committed;
            return Err(error);
        }
        checkpoint(self.store.as_ref(), self.channel.as_ref(), instance)?;

        tracing::info!(
            instance_id = %instance_id.short(),
            execution = %execution_id,
            ended = instance.is_ended(),
            "message handled"
        );
        Ok(())
    }

    /// Re-drive an execution left `Active` by an earlier failed step
    /// (e.g. a `NoEligibleTransition` during `start`), then checkpoint.
    /// Waiting executions are resumed by messages, not by this.
    pub fn resume(
        &mut self,
        instance_id: &InstanceId,
        execution_id: &ExecutionId,
    ) -> FlowResult<()> {
        let instance = self
            .instances
            .get_mut(instance_id)
            .ok_or_else(|| FlowError::InstanceNotFound(instance_id.clone()))?;
        let definition = self.registry.get(&instance.workflow_id)?;
        {
            let execution = instance.execution(execution_id)?;
            if execution.is_ended() {
                return Err(FlowError::AlreadyEnded(execution_id.clone()));
            }
            if !execution.is_active() || execution.position.is_none() {
                return Err(FlowError::NotActive(execution_id.clone()));
            }
        }

        let committed = instance.clone();
        if let Err(error) = self.driver.run(instance, definition, execution_id) {
            *instance = committed;
            return Err(error);
        }
        checkpoint(self.store.as_ref(), self.channel.as_ref(), instance)?;

        tracing::info!(
            instance_id = %instance_id.short(),
            execution = %execution_id,
            ended = instance.is_ended(),
            "execution re-driven"
        );
        Ok(())
    }

    /// Write a root-layer variable on a live instance, typically to fix
    /// the data a failed step choked on before re-driving it.
    pub fn set_variable(
        &mut self,
        instance_id: &InstanceId,
        name: impl Into<String>,
        value: Value,
    ) -> FlowResult<()> {
        let instance = self
            .instances
            .get_mut(instance_id)
            .ok_or_else(|| FlowError::InstanceNotFound(instance_id.clone()))?;
        instance.variables.insert(name.into(), value);
        instance.touch();
        Ok(())
    }

    /// Cancel a waiting execution, then checkpoint.
    pub fn cancel(
        &mut self,
        instance_id: &InstanceId,
        execution_id: &ExecutionId,
    ) -> FlowResult<()> {
        let instance = self
            .instances
            .get_mut(instance_id)
            .ok_or_else(|| FlowError::InstanceNotFound(instance_id.clone()))?;

        self.driver.cancel(instance, execution_id)?;
        checkpoint(self.store.as_ref(), self.channel.as_ref(), instance)?;

        tracing::info!(
            instance_id = %instance_id.short(),
            execution = %execution_id,
            "waiting execution cancelled"
        );
        Ok(())
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn instance(&self, id: &InstanceId) -> FlowResult<&WorkflowInstance> {
        self.instances
            .get(id)
            .ok_or_else(|| FlowError::InstanceNotFound(id.clone()))
    }

    pub fn is_ended(&self, id: &InstanceId) -> FlowResult<bool> {
        Ok(self.instance(id)?.is_ended())
    }

    pub fn active_instances(&self) -> Vec<&WorkflowInstance> {
        self.instances.values().filter(|i| !i.is_ended()).collect()
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }
}

/// Commit the instance, then dispatch its registered notifications.
///
/// A commit failure returns before anything is dispatched, with the
/// notifications still registered on the instance. A dispatch failure
/// leaves the committed state intact.
fn checkpoint(
    store: &dyn InstanceStore,
    channel: &dyn NotificationChannel,
    instance: &mut WorkflowInstance,
) -> FlowResult<()> {
    store.commit(instance)?;
    for notification in instance.take_pending_notifications() {
        tracing::debug!(
            execution = %notification.execution_id,
            activity = %notification.activity_id,
            "dispatching notification"
        );
        channel.notify(notification)?;
    }
    Ok(())
}
