//! Workflow DAG scheduling for the Zeus CI pipeline engine.
//!
//! A [`Workflow`] owns the stage set for one build run; a [`Scheduler`]
//! drives it to completion with bounded container concurrency.

pub mod scheduler;
pub mod stage;
pub mod workflow;

pub use scheduler::Scheduler;
pub use stage::Stage;
pub use workflow::{BuildContext, Workflow};
