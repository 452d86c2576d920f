//! Workflow Execution Engine for tokenflow
//!
//! The engine advances an execution token through a registered
//! [`Workflow`] graph until the token suspends at an external wait state
//! or the run ends. Suspension is control flow, not blocking: an
//! external activity registers a pending notification and the driver
//! returns, leaving the execution parked in `Waiting` until
//! [`WorkflowEngine::handle_message`] resumes it.
//!
//! # Ordering guarantee
//!
//! The `Waiting` state (and every variable written before suspension) is
//! committed through the [`InstanceStore`] **before** any registered
//! notification reaches the [`NotificationChannel`]. A collaborator can
//! therefore never observe a notification for state that is not yet
//! durable.
//!
//! # Architecture
//!
//! - [`WorkflowRegistry`] — validates and stores immutable definitions
//! - [`Driver`] — the step function advancing one execution
//! - [`Collaborators`] — the explicit wiring of evaluator, store, and
//!   notification channel (no ambient engine singleton)
//! - [`WorkflowEngine`] — the facade tying the above together
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use tokenflow_engine::*;
//! use tokenflow_types::*;
//!
//! let channel = Arc::new(QueueChannel::new());
//! let mut engine = WorkflowEngine::new(Collaborators::new(
//!     Arc::new(SimpleEvaluator),
//!     Arc::new(InMemoryStore::new()),
//!     channel.clone(),
//! ));
//!
//! let mut workflow = Workflow::new("approval");
//! workflow.add_activity(Activity::external("approve")).unwrap();
//! workflow.add_activity(Activity::automatic("archive")).unwrap();
//! workflow.connect("approve", "archive").unwrap();
//! let workflow_id = engine.register_workflow(workflow).unwrap();
//!
//! let instance_id = engine.start(&workflow_id).unwrap();
//! assert!(!engine.is_ended(&instance_id).unwrap());
//!
//! // An external worker picks the notification up and answers.
//! let notification = channel.take().unwrap();
//! engine
//!     .handle_message(&instance_id, &notification.execution_id, Default::default())
//!     .unwrap();
//! assert!(engine.is_ended(&instance_id).unwrap());
//! ```
//!
//! [`Workflow`]: tokenflow_types::Workflow

#![deny(unsafe_code)]

pub mod collaborators;
pub mod driver;
pub mod engine;
pub mod evaluator;
pub mod registry;

pub use collaborators::{
    Collaborators, ExpressionEvaluator, InMemoryStore, InstanceStore, NotificationChannel,
    QueueChannel,
};
pub use driver::{Driver, StepOutcome};
pub use engine::WorkflowEngine;
pub use evaluator::SimpleEvaluator;
pub use registry::WorkflowRegistry;
