// The #[error] attribute from thiserror uses struct fields via string interpolation,
// but Rust's unused_assignments lint doesn't recognize this.
#![allow(unused_assignments)]

//! Nodeflow Error Types with Error Codes
//!
//! Error code ranges:
//! - NF-010-019: Structure errors (registration, element shape)
//! - NF-020-029: DAG errors
//! - NF-030-039: Unit runtime errors
//! - NF-040-049: Shared parameter errors
//! - NF-050-059: Aspect and event errors
//! - NF-060-069: Lifecycle errors
//! - NF-070-079: Configuration errors
//!
//! Every variant maps to a stable numeric [`ErrorCode`]; that number is the
//! `code` of the [`Status`](crate::Status) handed back across the public API.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, NodeflowError>;

/// Numeric error codes carried by a failing [`Status`](crate::Status).
///
/// `0` is reserved for success and never appears here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorCode {
    DuplicateIdentity = 10,
    UnknownPredecessor = 11,
    UnknownElement = 12,
    InvalidElement = 13,
    CyclicDependency = 20,
    RunFailure = 30,
    InitFailure = 31,
    Timeout = 32,
    ConditionIndexOutOfRange = 33,
    DestroyFailure = 34,
    Panicked = 35,
    DuplicateParameter = 40,
    UnknownParameter = 41,
    ParamTypeMismatch = 42,
    AspectFailure = 50,
    UnknownEvent = 51,
    EventHandlerFailure = 52,
    InvalidState = 60,
    ConfigError = 70,
}

impl ErrorCode {
    const ALL: [ErrorCode; 19] = [
        Self::DuplicateIdentity,
        Self::UnknownPredecessor,
        Self::UnknownElement,
        Self::InvalidElement,
        Self::CyclicDependency,
        Self::RunFailure,
        Self::InitFailure,
        Self::Timeout,
        Self::ConditionIndexOutOfRange,
        Self::DestroyFailure,
        Self::Panicked,
        Self::DuplicateParameter,
        Self::UnknownParameter,
        Self::ParamTypeMismatch,
        Self::AspectFailure,
        Self::UnknownEvent,
        Self::EventHandlerFailure,
        Self::InvalidState,
        Self::ConfigError,
    ];

    /// Numeric value as stored in `Status::code`
    #[inline]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Reverse lookup; `None` for user-defined codes
    pub fn from_i32(code: i32) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.as_i32() == code)
    }
}

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

/// All error variants are part of the public API.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NodeflowError {
    // ═══════════════════════════════════════════
    // STRUCTURE ERRORS (010-019)
    // ═══════════════════════════════════════════
    #[error("[NF-010] Duplicate unit identity '{name}'")]
    DuplicateIdentity { name: String },

    #[error("[NF-011] Unit '{name}' depends on unknown unit '{predecessor}'")]
    UnknownPredecessor { name: String, predecessor: String },

    #[error("[NF-012] No unit named '{name}' is registered")]
    UnknownElement { name: String },

    #[error("[NF-013] Invalid unit '{name}': {reason}")]
    InvalidElement { name: String, reason: String },

    // ═══════════════════════════════════════════
    // DAG ERRORS (020-029)
    // ═══════════════════════════════════════════
    #[error("[NF-020] Cyclic dependency: {cycle}")]
    CyclicDependency { cycle: String },

    // ═══════════════════════════════════════════
    // UNIT RUNTIME ERRORS (030-039)
    // ═══════════════════════════════════════════
    #[error("[NF-030] Unit '{name}' failed: {reason}")]
    RunFailure { name: String, reason: String },

    #[error("[NF-031] Unit '{name}' failed to initialize (code {code}): {message}")]
    InitFailure {
        name: String,
        code: i32,
        message: String,
    },

    #[error("[NF-032] Unit '{name}' timed out after {timeout_ms}ms")]
    Timeout { name: String, timeout_ms: u64 },

    #[error("[NF-033] Condition '{name}' chose index {index} but has {len} candidates")]
    ConditionIndexOutOfRange { name: String, index: isize, len: usize },

    #[error("[NF-034] Unit '{name}' failed to destroy (code {code}): {message}")]
    DestroyFailure {
        name: String,
        code: i32,
        message: String,
    },

    #[error("[NF-035] '{name}' panicked: {message}")]
    Panicked { name: String, message: String },

    // ═══════════════════════════════════════════
    // PARAMETER ERRORS (040-049)
    // ═══════════════════════════════════════════
    #[error("[NF-040] Shared parameter '{name}' already exists")]
    DuplicateParameter { name: String },

    #[error("[NF-041] Shared parameter '{name}' not found")]
    UnknownParameter { name: String },

    #[error("[NF-042] Shared parameter '{name}' does not hold a {expected}")]
    ParamTypeMismatch { name: String, expected: &'static str },

    // ═══════════════════════════════════════════
    // ASPECT / EVENT ERRORS (050-059)
    // ═══════════════════════════════════════════
    #[error("[NF-050] Aspect on '{name}' failed during {phase} (code {code}): {message}")]
    AspectFailure {
        name: String,
        phase: String,
        code: i32,
        message: String,
    },

    #[error("[NF-051] No handler registered for event '{event}'")]
    UnknownEvent { event: String },

    #[error("[NF-052] Handler for event '{event}' failed (code {code}): {message}")]
    EventHandlerFailure {
        event: String,
        code: i32,
        message: String,
    },

    // ═══════════════════════════════════════════
    // LIFECYCLE ERRORS (060-069)
    // ═══════════════════════════════════════════
    #[error("[NF-060] Cannot {operation} while pipeline is {state}")]
    InvalidState {
        operation: &'static str,
        state: String,
    },

    // ═══════════════════════════════════════════
    // CONFIG ERRORS (070-079)
    // ═══════════════════════════════════════════
    #[error("[NF-070] Configuration error: {reason}")]
    ConfigError { reason: String },
}

impl NodeflowError {
    /// Get the numeric error code
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::DuplicateIdentity { .. } => ErrorCode::DuplicateIdentity,
            Self::UnknownPredecessor { .. } => ErrorCode::UnknownPredecessor,
            Self::UnknownElement { .. } => ErrorCode::UnknownElement,
            Self::InvalidElement { .. } => ErrorCode::InvalidElement,
            Self::CyclicDependency { .. } => ErrorCode::CyclicDependency,
            Self::RunFailure { .. } => ErrorCode::RunFailure,
            Self::InitFailure { .. } => ErrorCode::InitFailure,
            Self::Timeout { .. } => ErrorCode::Timeout,
            Self::ConditionIndexOutOfRange { .. } => ErrorCode::ConditionIndexOutOfRange,
            Self::DestroyFailure { .. } => ErrorCode::DestroyFailure,
            Self::Panicked { .. } => ErrorCode::Panicked,
            Self::DuplicateParameter { .. } => ErrorCode::DuplicateParameter,
            Self::UnknownParameter { .. } => ErrorCode::UnknownParameter,
            Self::ParamTypeMismatch { .. } => ErrorCode::ParamTypeMismatch,
            Self::AspectFailure { .. } => ErrorCode::AspectFailure,
            Self::UnknownEvent { .. } => ErrorCode::UnknownEvent,
            Self::EventHandlerFailure { .. } => ErrorCode::EventHandlerFailure,
            Self::InvalidState { .. } => ErrorCode::InvalidState,
            Self::ConfigError { .. } => ErrorCode::ConfigError,
        }
    }

    /// Get the error code string (e.g., "NF-020")
    pub fn code(&self) -> String {
        format!("NF-{:03}", self.error_code().as_i32())
    }

    /// Structural errors abort `init()`; nothing runs afterwards.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::DuplicateIdentity { .. }
                | Self::UnknownPredecessor { .. }
                | Self::InvalidElement { .. }
                | Self::CyclicDependency { .. }
        )
    }
}

impl FixSuggestion for NodeflowError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            NodeflowError::DuplicateIdentity { .. } => Some("Give every registered unit a unique name"),
            NodeflowError::UnknownPredecessor { .. } => {
                Some("Register the predecessor before init(), or fix the dependency name")
            }
            NodeflowError::UnknownElement { .. } => Some("Check the unit name passed to the pipeline"),
            NodeflowError::InvalidElement { .. } => {
                Some("Check loop counts, member lists and region dependencies")
            }
            NodeflowError::CyclicDependency { .. } => {
                Some("Remove one dependency from the reported cycle")
            }
            NodeflowError::RunFailure { .. } => Some("Inspect the failing unit's body"),
            NodeflowError::InitFailure { .. } => Some("Fix the unit's init(); nothing ran"),
            NodeflowError::Timeout { .. } => {
                Some("Increase the timeout or poll ctx.is_cancelled() in the body")
            }
            NodeflowError::ConditionIndexOutOfRange { .. } => {
                Some("Return an index in 0..candidates.len() from the chooser")
            }
            NodeflowError::DestroyFailure { .. } => Some("Check the unit's destroy() cleanup"),
            NodeflowError::Panicked { .. } => Some("Return a failing Status instead of panicking"),
            NodeflowError::DuplicateParameter { .. } => {
                Some("Create each shared parameter exactly once, or look it up instead")
            }
            NodeflowError::UnknownParameter { .. } => {
                Some("Create the parameter in some unit's init() before using it")
            }
            NodeflowError::ParamTypeMismatch { .. } => {
                Some("Request the parameter with the type it was created with")
            }
            NodeflowError::AspectFailure { .. } => Some("Inspect the aspect's hook"),
            NodeflowError::UnknownEvent { .. } => Some("Register a handler with add_event_handler()"),
            NodeflowError::EventHandlerFailure { .. } => Some("Inspect the event handler"),
            NodeflowError::InvalidState { .. } => {
                Some("Follow the lifecycle: register → init → run (×N) → destroy")
            }
            NodeflowError::ConfigError { .. } => Some("Check the pipeline configuration values"),
        }
    }
}
