//! DAG Module - dependency structure and per-run scheduling state
//!
//! - `graph`: DependencyGraph, immutable once built (validated on build)
//! - `frontier`: Frontier, readiness and skip propagation for one run

mod frontier;
mod graph;

pub use frontier::{Advance, Frontier, UnitState};
pub use graph::{DepVec, DependencyGraph};
