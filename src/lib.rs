//! Nodeflow - DAG task scheduler with composite units, shared parameters and events
//!
//! ## Module Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         UNIT MODEL                           │
//! │  element/   Node, Cluster, Condition, Region + NodeContext   │
//! │  aspect/    begin/finish interceptors per phase              │
//! └──────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      APPLICATION LAYER                       │
//! │  runtime/   Pipeline lifecycle, frontier runner, RunReport   │
//! │  dag/       DependencyGraph (validated), per-run Frontier    │
//! └──────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    INFRASTRUCTURE LAYER                      │
//! │  param/     Shared parameters (DashMap registry)             │
//! │  event/     EventBus dispatcher, TraceLog                    │
//! │  util/      Constants, panic containment                     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`element`] | Schedulable units and what a body can reach |
//! | [`aspect`] | Ordered interceptors around init, run and destroy |
//! | [`runtime`] | Pipeline lifecycle on an owned tokio runtime |
//! | [`dag`] | Dependency graph with FxHashMap/SmallVec storage |
//! | [`param`] | Named, typed, lock-protected shared state |
//! | [`event`] | Named events off the critical path; execution trace |
//! | [`config`] | Pipeline settings (TOML + environment) |
//! | [`error`] | Error types with codes and fix suggestions |
//!
//! ## Example
//!
//! ```no_run
//! use nodeflow::{node_fn, Element, Pipeline, Status};
//!
//! let mut pipeline = Pipeline::new();
//! pipeline.register(Element::node("fetch", node_fn(|_| Status::ok())), &[]);
//! pipeline.register(Element::node("parse", node_fn(|_| Status::ok())), &["fetch"]);
//! assert!(pipeline.process().is_ok());
//! ```

// ═══════════════════════════════════════════════════════════════
// UNIT MODEL
// ═══════════════════════════════════════════════════════════════
pub mod aspect;
pub mod element;

// ═══════════════════════════════════════════════════════════════
// APPLICATION LAYER - Execution logic
// ═══════════════════════════════════════════════════════════════
pub mod dag;
pub mod runtime;

// ═══════════════════════════════════════════════════════════════
// INFRASTRUCTURE LAYER - Parameters, events
// ═══════════════════════════════════════════════════════════════
pub mod event;
pub mod param;
pub mod util;

// ═══════════════════════════════════════════════════════════════
// CROSS-CUTTING - Error handling, configuration
// ═══════════════════════════════════════════════════════════════
pub mod config;
pub mod error;
pub mod status;

// ═══════════════════════════════════════════════════════════════
// PUBLIC API RE-EXPORTS
// ═══════════════════════════════════════════════════════════════

// Error types
pub use error::{ErrorCode, FixSuggestion, NodeflowError, Result};
pub use status::Status;

// Config types
pub use config::PipelineConfig;

// Units
pub use aspect::{Aspect, AspectPhase};
pub use element::{node_fn, Chooser, Element, ElementKind, FnNode, Node, NodeContext, Region};

// Execution
pub use dag::DependencyGraph;
pub use runtime::{Pipeline, PipelineState, RunReport, UnitOutcome, UnitStatus};

// Shared state and events
pub use event::{EventBus, EventContext, EventHandler, TraceEvent, TraceKind, TraceLog, TraceSink};
pub use param::{Param, ParamRegistry, SharedParam};
