//! Registry of validated workflow definitions
//!
//! Definitions are validated at registration, never at start: a
//! workflow that made it into the registry can always produce a start
//! activity and every transition it holds resolves.

use std::collections::HashMap;
use tokenflow_types::{FlowError, FlowResult, Workflow, WorkflowId};

/// In-memory store of registered workflow definitions.
#[derive(Default)]
pub struct WorkflowRegistry {
    workflows: HashMap<WorkflowId, Workflow>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and register a definition. An invalid graph is rejected
    /// here and never becomes startable.
    pub fn register(&mut self, workflow: Workflow) -> FlowResult<WorkflowId> {
        workflow.validate()?;
        let id = workflow.id.clone();
        tracing::info!(
            workflow_id = %id.short(),
            name = %workflow.name,
            activities = workflow.activity_count(),
            transitions = workflow.transition_count(),
            "workflow registered"
        );
        self.workflows.insert(id.clone(), workflow);
        Ok(id)
    }

    pub fn get(&self, id: &WorkflowId) -> FlowResult<&Workflow> {
        self.workflows
            .get(id)
            .ok_or_else(|| FlowError::WorkflowNotFound(id.clone()))
    }

    /// First registered definition with this name, if any.
    pub fn find_by_name(&self, name: &str) -> Option<&Workflow> {
        self.workflows.values().find(|w| w.name == name)
    }

    pub fn remove(&mut self, id: &WorkflowId) -> FlowResult<Workflow> {
        self.workflows
            .remove(id)
            .ok_or_else(|| FlowError::WorkflowNotFound(id.clone()))
    }

    pub fn contains(&self, id: &WorkflowId) -> bool {
        self.workflows.contains_key(id)
    }

    pub fn list(&self) -> Vec<&Workflow> {
        self.workflows.values().collect()
    }

    pub fn count(&self) -> usize {
        self.workflows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokenflow_types::Activity;

    fn make_valid() -> Workflow {
        let mut wf = Workflow::new("review");
        wf.add_activity(Activity::automatic("open")).unwrap();
        wf.add_activity(Activity::external("review")).unwrap();
        wf.connect("open", "review").unwrap();
        wf
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = WorkflowRegistry::new();
        let id = registry.register(make_valid()).unwrap();

        assert!(registry.contains(&id));
        assert_eq!(registry.count(), 1);
        assert_eq!(registry.get(&id).unwrap().name, "review");
    }

    #[test]
    fn test_invalid_definition_is_rejected() {
        let mut registry = WorkflowRegistry::new();
        let empty = Workflow::new("empty");

        assert!(registry.register(empty).is_err());
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn test_find_by_name() {
        let mut registry = WorkflowRegistry::new();
        registry.register(make_valid()).unwrap();

        assert!(registry.find_by_name("review").is_some());
        assert!(registry.find_by_name("unknown").is_none());
    }

    #[test]
    fn test_remove() {
        let mut registry = WorkflowRegistry::new();
        let id = registry.register(make_valid()).unwrap();

        let removed = registry.remove(&id).unwrap();
        assert_eq!(removed.id, id);
        assert!(!registry.contains(&id));
        assert!(matches!(
            registry.get(&id),
            Err(FlowError::WorkflowNotFound(_))
        ));
    }
}
