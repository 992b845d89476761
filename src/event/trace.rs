//! TraceLog - append-only execution trace
//!
//! Records scheduling decisions and unit outcomes for every run.
//! - TraceEvent: envelope with id + timestamp + kind
//! - TraceKind: run / unit / condition / param / aspect / event variants
//! - TraceLog: thread-safe, append-only log
//! - TraceSink: emission trait (TraceLog, or NoopSink when tracing is off)

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Single entry in the execution trace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEvent {
    /// Monotonic sequence ID (for ordering)
    pub id: u64,
    /// Time since the log was created (µs)
    pub timestamp_us: u64,
    /// Event type and data
    pub kind: TraceKind,
}

/// All trace event types
///
/// Uses Arc<str> for unit names to enable zero-cost cloning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TraceKind {
    // ═══════════════════════════════════════════
    // RUN LEVEL
    // ═══════════════════════════════════════════
    RunStarted {
        run_id: String,
        run_index: u64,
        unit_count: usize,
    },
    RunCompleted {
        run_index: u64,
        code: i32,
        failed: usize,
        skipped: usize,
        duration_us: u64,
    },

    // ═══════════════════════════════════════════
    // UNIT LEVEL
    // ═══════════════════════════════════════════
    UnitScheduled {
        unit: Arc<str>,
        dependencies: Vec<Arc<str>>,
    },
    /// One loop iteration begins
    UnitStarted {
        unit: Arc<str>,
        iteration: u32,
    },
    UnitCompleted {
        unit: Arc<str>,
        duration_us: u64,
    },
    UnitFailed {
        unit: Arc<str>,
        code: i32,
        error: String,
        duration_us: u64,
    },
    UnitSkipped {
        unit: Arc<str>,
        blocked_by: Arc<str>,
    },
    ConditionChose {
        unit: Arc<str>,
        index: isize,
    },

    // ═══════════════════════════════════════════
    // CROSS-CUTTING
    // ═══════════════════════════════════════════
    ParamsReset {
        count: usize,
        prior_code: i32,
    },
    AspectFailed {
        unit: Arc<str>,
        phase: String,
        code: i32,
        error: String,
    },
    EventNotified {
        event: Arc<str>,
        source: Arc<str>,
    },
    EventHandlerFailed {
        event: Arc<str>,
        code: i32,
        error: String,
    },
}

impl TraceKind {
    /// Extract the unit name if the event is unit-related
    pub fn unit(&self) -> Option<&str> {
        match self {
            Self::UnitScheduled { unit, .. }
            | Self::UnitStarted { unit, .. }
            | Self::UnitCompleted { unit, .. }
            | Self::UnitFailed { unit, .. }
            | Self::UnitSkipped { unit, .. }
            | Self::ConditionChose { unit, .. }
            | Self::AspectFailed { unit, .. } => Some(unit),
            Self::EventNotified { source, .. } => Some(source),
            Self::RunStarted { .. }
            | Self::RunCompleted { .. }
            | Self::ParamsReset { .. }
            | Self::EventHandlerFailed { .. } => None,
        }
    }

    /// Check if this is a run-level event
    pub fn is_run_event(&self) -> bool {
        matches!(self, Self::RunStarted { .. } | Self::RunCompleted { .. })
    }
}

/// Trait for emitting trace events
pub trait TraceSink: Send + Sync {
    /// Emit an event and return its ID
    fn emit(&self, kind: TraceKind) -> u64;
}

/// Sink that drops everything (tracing disabled in config)
#[derive(Debug, Clone, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {
    fn emit(&self, _kind: TraceKind) -> u64 {
        0
    }
}

/// Thread-safe, append-only trace log
#[derive(Clone)]
pub struct TraceLog {
    events: Arc<RwLock<Vec<TraceEvent>>>,
    start_time: Instant,
    next_id: Arc<AtomicU64>,
}

impl TraceLog {
    pub fn new() -> Self {
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
            start_time: Instant::now(),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Emit an event (thread-safe, returns event ID).
    ///
    /// The id is taken under the write lock, so id order equals storage order.
    pub fn emit(&self, kind: TraceKind) -> u64 {
        let mut events = self.events.write();
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        events.push(TraceEvent {
            id,
            timestamp_us: self.start_time.elapsed().as_micros() as u64,
            kind,
        });
        id
    }

    /// Get all events (cloned - use `with_events` for zero-copy access)
    pub fn events(&self) -> Vec<TraceEvent> {
        self.events.read().clone()
    }

    /// Zero-copy access to events via callback
    ///
    /// Holds read lock for duration of callback - keep it short.
    pub fn with_events<T>(&self, f: impl FnOnce(&[TraceEvent]) -> T) -> T {
        f(&self.events.read())
    }

    /// Events for one unit
    pub fn filter_unit(&self, unit: &str) -> Vec<TraceEvent> {
        self.with_events(|events| {
            events
                .iter()
                .filter(|e| e.kind.unit() == Some(unit))
                .cloned()
                .collect()
        })
    }

    /// Run-level events only
    pub fn run_events(&self) -> Vec<TraceEvent> {
        self.with_events(|events| {
            events
                .iter()
                .filter(|e| e.kind.is_run_event())
                .cloned()
                .collect()
        })
    }

    /// Count events matching a predicate (no allocation)
    pub fn count(&self, predicate: impl Fn(&TraceKind) -> bool) -> usize {
        self.with_events(|events| events.iter().filter(|e| predicate(&e.kind)).count())
    }

    /// First event matching a predicate
    pub fn find(&self, predicate: impl Fn(&TraceKind) -> bool) -> Option<TraceEvent> {
        self.with_events(|events| events.iter().find(|e| predicate(&e.kind)).cloned())
    }

    /// Unit names in the order their iterations started (one entry per iteration)
    pub fn start_order(&self) -> Vec<Arc<str>> {
        self.with_events(|events| {
            events
                .iter()
                .filter_map(|e| match &e.kind {
                    TraceKind::UnitStarted { unit, .. } => Some(Arc::clone(unit)),
                    _ => None,
                })
                .collect()
        })
    }

    /// Serialize to JSON for debugging
    pub fn to_json(&self) -> Value {
        self.with_events(|events| serde_json::to_value(events).unwrap_or(Value::Null))
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.events.write().clear();
    }

    /// Drop everything up to the end of all but the last `runs` completed runs.
    ///
    /// Events after the newest `RunCompleted` are always kept.
    pub fn retain_runs(&self, runs: usize) {
        let mut events = self.events.write();
        let ends: Vec<usize> = events
            .iter()
            .enumerate()
            .filter(|(_, e)| matches!(e.kind, TraceKind::RunCompleted { .. }))
            .map(|(i, _)| i)
            .collect();
        if ends.len() <= runs {
            return;
        }
        let cut = ends[ends.len() - runs - 1] + 1;
        events.drain(..cut);
    }
}

impl TraceSink for TraceLog {
    fn emit(&self, kind: TraceKind) -> u64 {
        TraceLog::emit(self, kind)
    }
}

impl Default for TraceLog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TraceLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceLog").field("len", &self.len()).finish()
    }
}
