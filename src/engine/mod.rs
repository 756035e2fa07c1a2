// src/engine/mod.rs

//! Orchestration engine for borgkeeper.
//!
//! This module ties together:
//! - the retry queue over a configuration's repositories (pure, no IO)
//! - the per-repository action pipeline with its command hooks
//! - the run coordinator, which drives every configuration, pings
//!   monitors and collects the run summary
//!
//! The pure retry state lives in [`queue`]; the async shell that sleeps,
//! spawns and pings is in [`pipeline`] and [`coordinator`].

pub mod coordinator;
pub mod outcome;
pub mod pipeline;
pub mod queue;

pub use coordinator::{run, run_configuration, RunContext, RunSummary};
pub use outcome::PipelineItem;
pub use pipeline::{run_actions, PipelineContext};
pub use queue::{FailureDecision, RetryQueue, RetryUnit};
