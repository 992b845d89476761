//! Runtime Module - pipeline execution
//!
//! Contains the runtime execution components:
//! - `pipeline`: lifecycle (register, init, run, destroy) and the tokio runtime
//! - `runner`: frontier-driven DAG execution with JoinSet concurrency
//! - `report`: per-run unit outcomes
//!
//! This module represents the "how" - runtime execution.
//! For static structure, see the `dag` and `element` modules.

mod pipeline;
mod report;
mod runner;

pub use pipeline::{Pipeline, PipelineState};
pub use report::{RunReport, UnitOutcome, UnitStatus};
pub(crate) use runner::drive;
