//! Centralized constants for pipeline configuration
//!
//! All default values in one place for easy tuning.

use std::time::Duration;

// ═══════════════════════════════════════════════════════════════
// Thread Pools
// ═══════════════════════════════════════════════════════════════

/// Upper bound for the blocking pool that runs unit bodies
pub const DEFAULT_MAX_BLOCKING_THREADS: usize = 64;

/// Name prefix of pipeline worker threads
pub const DEFAULT_THREAD_NAME: &str = "nodeflow-worker";

// ═══════════════════════════════════════════════════════════════
// Timeouts
// ═══════════════════════════════════════════════════════════════

/// Unit timeout when neither the unit nor the config sets one (0 = none)
pub const DEFAULT_UNIT_TIMEOUT_MS: u64 = 0;

/// How long destroy() waits for abandoned bodies and queued event handlers
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

// ═══════════════════════════════════════════════════════════════
// Trace
// ═══════════════════════════════════════════════════════════════

/// Runs kept in the execution trace (0 = all)
pub const DEFAULT_TRACE_RUNS: usize = 16;

// ═══════════════════════════════════════════════════════════════
// Environment
// ═══════════════════════════════════════════════════════════════

pub const ENV_WORKER_THREADS: &str = "NODEFLOW_WORKER_THREADS";
pub const ENV_MAX_BLOCKING_THREADS: &str = "NODEFLOW_MAX_BLOCKING_THREADS";
pub const ENV_DEFAULT_TIMEOUT_MS: &str = "NODEFLOW_DEFAULT_TIMEOUT_MS";
pub const ENV_SHUTDOWN_TIMEOUT_MS: &str = "NODEFLOW_SHUTDOWN_TIMEOUT_MS";
pub const ENV_TRACE: &str = "NODEFLOW_TRACE";
pub const ENV_TRACE_RUNS: &str = "NODEFLOW_TRACE_RUNS";

/// Available parallelism, at least 1
pub fn default_worker_threads() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get())
}

// ═══════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pools_are_positive() {
        const _: () = assert!(DEFAULT_MAX_BLOCKING_THREADS > 0);
        assert!(default_worker_threads() >= 1);
    }

    #[test]
    fn shutdown_timeout_is_bounded() {
        assert!(DEFAULT_SHUTDOWN_TIMEOUT.as_secs() > 0);
        assert!(DEFAULT_SHUTDOWN_TIMEOUT.as_secs() <= 60);
    }

    #[test]
    fn env_names_share_prefix() {
        for name in [
            ENV_WORKER_THREADS,
            ENV_MAX_BLOCKING_THREADS,
            ENV_DEFAULT_TIMEOUT_MS,
            ENV_SHUTDOWN_TIMEOUT_MS,
        ] {
            assert!(name.starts_with("NODEFLOW_"));
        }
    }
}
