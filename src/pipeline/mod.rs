//! Workflow driver
//!
//! Runs every patient through the configured modifiers, either sequentially
//! or on the rayon pool, and reduces the per-modifier statistics.

pub mod modifier;
pub mod workflow;

pub use modifier::{Modifier, RunContext};
pub use workflow::{RunOutcome, Workflow};
