//! Workflow Domain Types for tokenflow
//!
//! A workflow here is a directed graph of **activities** connected by
//! optionally guarded **transitions**. At runtime an **execution** token
//! advances through the graph, parking in a WAITING state at external
//! activities until a collaborator delivers a completion message.
//!
//! # Key Concepts
//!
//! - **Workflow**: The immutable graph definition — a root scope of
//!   variables plus registered activities and transitions.
//! - **Activity**: A node with an entry guard, input/output bindings,
//!   its own variable scope, and a [`Behavior`] selecting its semantics.
//! - **Transition**: A directed edge between two activities, addressed
//!   by a stable [`TransitionId`] handle and registered on both endpoints.
//! - **WorkflowInstance**: One run of a workflow — the execution tree,
//!   the durable variable store, and the notifications not yet dispatched.
//! - **Execution**: A runtime cursor: current activity, lifecycle state,
//!   and the local variable layer shadowing the workflow scope.
//!
//! # Design Principles
//!
//! 1. The graph is an arena: activities and transitions refer to each
//!    other by id, never by mutual object references.
//! 2. Structural errors are configuration errors, caught by
//!    [`Workflow::validate`] before any execution can start.
//! 3. Expressions are opaque text; evaluation belongs to a pluggable
//!    collaborator, the core only guarantees ordering.

#![deny(unsafe_code)]

mod activity;
mod definition;
mod errors;
mod execution;
mod expression;
mod scope;
mod transition;

pub use activity::*;
pub use definition::*;
pub use errors::*;
pub use execution::*;
pub use expression::*;
pub use scope::*;
pub use transition::*;
