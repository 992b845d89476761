//! Event Module - user events and the execution trace
//!
//! - `bus`: EventBus, named events dispatched asynchronously to handlers
//! - `trace`: TraceLog, append-only record of scheduling and outcomes
//!
//! The two are independent: the bus carries what unit code raises,
//! the trace records what the engine did.

mod bus;
mod trace;

pub use bus::{EventBus, EventContext, EventHandler};
pub use trace::{NoopSink, TraceEvent, TraceKind, TraceLog, TraceSink};
