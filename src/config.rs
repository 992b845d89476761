//! Pipeline Configuration
//!
//! Tunes the worker pool, default timeouts and shutdown of a pipeline.
//!
//! ## Priority Order (highest to lowest)
//!
//! 1. Environment variables (`NODEFLOW_*`, applied by [`PipelineConfig::with_env`])
//! 2. Config file / TOML string
//! 3. Defaults (`util::constants`)

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{NodeflowError, Result};
use crate::util::constants::{
    default_worker_threads, DEFAULT_MAX_BLOCKING_THREADS, DEFAULT_SHUTDOWN_TIMEOUT,
    DEFAULT_THREAD_NAME, DEFAULT_TRACE_RUNS, DEFAULT_UNIT_TIMEOUT_MS, ENV_DEFAULT_TIMEOUT_MS,
    ENV_MAX_BLOCKING_THREADS, ENV_SHUTDOWN_TIMEOUT_MS, ENV_TRACE, ENV_TRACE_RUNS,
    ENV_WORKER_THREADS,
};

/// Pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Threads driving activations
    pub worker_threads: usize,

    /// Upper bound of the pool running unit bodies and event handlers
    pub max_blocking_threads: usize,

    /// Timeout for plain units that set none (0 = unlimited)
    pub default_timeout_ms: u64,

    /// How long destroy() waits for abandoned work
    pub shutdown_timeout_ms: u64,

    /// Name of pipeline threads
    pub thread_name: String,

    /// Record a TraceLog (off: events are dropped)
    pub trace: bool,

    /// Runs the trace keeps; older runs are dropped when a run starts (0 = all)
    pub trace_runs: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            worker_threads: default_worker_threads(),
            max_blocking_threads: DEFAULT_MAX_BLOCKING_THREADS,
            default_timeout_ms: DEFAULT_UNIT_TIMEOUT_MS,
            shutdown_timeout_ms: DEFAULT_SHUTDOWN_TIMEOUT.as_millis() as u64,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
            trace: true,
            trace_runs: DEFAULT_TRACE_RUNS,
        }
    }
}

impl PipelineConfig {
    /// Parse TOML; missing keys take defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| NodeflowError::ConfigError {
            reason: format!("Failed to parse config: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| NodeflowError::ConfigError {
            reason: format!("Failed to read config file {}: {}", path.display(), e),
        })?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| NodeflowError::ConfigError {
            reason: format!("Failed to serialize config: {}", e),
        })
    }

    /// Merge with environment variables
    ///
    /// Environment variables take precedence over file values.
    pub fn with_env(self) -> Result<Self> {
        self.with_vars(|key| std::env::var(key).ok())
    }

    /// Like [`with_env`](Self::with_env), reading values through `lookup`
    pub fn with_vars(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        fn parse<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
            raw.trim().parse().map_err(|_| NodeflowError::ConfigError {
                reason: format!("{key}={raw:?} is not a valid number"),
            })
        }

        let value = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(raw) = value(ENV_WORKER_THREADS) {
            self.worker_threads = parse(ENV_WORKER_THREADS, &raw)?;
        }
        if let Some(raw) = value(ENV_MAX_BLOCKING_THREADS) {
            self.max_blocking_threads = parse(ENV_MAX_BLOCKING_THREADS, &raw)?;
        }
        if let Some(raw) = value(ENV_DEFAULT_TIMEOUT_MS) {
            self.default_timeout_ms = parse(ENV_DEFAULT_TIMEOUT_MS, &raw)?;
        }
        if let Some(raw) = value(ENV_SHUTDOWN_TIMEOUT_MS) {
            self.shutdown_timeout_ms = parse(ENV_SHUTDOWN_TIMEOUT_MS, &raw)?;
        }
        if let Some(raw) = value(ENV_TRACE_RUNS) {
            self.trace_runs = parse(ENV_TRACE_RUNS, &raw)?;
        }
        if let Some(raw) = value(ENV_TRACE) {
            self.trace = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "on" | "yes" => true,
                "0" | "false" | "off" | "no" => false,
                _ => {
                    return Err(NodeflowError::ConfigError {
                        reason: format!("{ENV_TRACE}={raw:?} is not a boolean"),
                    })
                }
            };
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.worker_threads == 0 {
            return Err(NodeflowError::ConfigError {
                reason: "worker_threads must be at least 1".to_string(),
            });
        }
        if self.max_blocking_threads == 0 {
            return Err(NodeflowError::ConfigError {
                reason: "max_blocking_threads must be at least 1".to_string(),
            });
        }
        if self.thread_name.is_empty() {
            return Err(NodeflowError::ConfigError {
                reason: "thread_name must not be empty".to_string(),
            });
        }
        Ok(())
    }

    pub fn worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }

    pub fn max_blocking_threads(mut self, threads: usize) -> Self {
        self.max_blocking_threads = threads;
        self
    }

    pub fn default_timeout_ms(mut self, ms: u64) -> Self {
        self.default_timeout_ms = ms;
        self
    }

    pub fn shutdown_timeout_ms(mut self, ms: u64) -> Self {
        self.shutdown_timeout_ms = ms;
        self
    }

    pub fn trace(mut self, enabled: bool) -> Self {
        self.trace = enabled;
        self
    }

    pub fn trace_runs(mut self, runs: usize) -> Self {
        self.trace_runs = runs;
        self
    }

    pub fn default_timeout(&self) -> Option<Duration> {
        (self.default_timeout_ms > 0).then(|| Duration::from_millis(self.default_timeout_ms))
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn defaults_are_valid() {
        let config = PipelineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.max_blocking_threads, 64);
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(5));
        assert!(config.default_timeout().is_none());
        assert!(config.trace);
        assert_eq!(config.trace_runs, 16);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = PipelineConfig::from_toml_str(
            r#"
worker_threads = 2
default_timeout_ms = 150
"#,
        )
        .unwrap();
        assert_eq!(config.worker_threads, 2);
        assert_eq!(config.default_timeout(), Some(Duration::from_millis(150)));
        assert_eq!(config.thread_name, DEFAULT_THREAD_NAME);
    }

    #[test]
    fn toml_roundtrip() {
        let config = PipelineConfig::default().worker_threads(3).trace(false);
        let text = config.to_toml_string().unwrap();
        assert_eq!(PipelineConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn malformed_toml_is_config_error() {
        let err = PipelineConfig::from_toml_str("worker_threads = \"many\"").unwrap_err();
        assert!(err.to_string().contains("NF-070"));
    }

    #[test]
    fn zero_workers_rejected() {
        let err = PipelineConfig::from_toml_str("worker_threads = 0").unwrap_err();
        assert!(err.to_string().contains("worker_threads"));
    }

    #[test]
    fn env_overrides_values() {
        let vars: HashMap<&str, &str> = [
            (ENV_WORKER_THREADS, "4"),
            (ENV_DEFAULT_TIMEOUT_MS, " 20 "),
            (ENV_SHUTDOWN_TIMEOUT_MS, ""),
            (ENV_TRACE_RUNS, "3"),
        ]
        .into_iter()
        .collect();

        let config = PipelineConfig::default()
            .with_vars(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.worker_threads, 4);
        assert_eq!(config.default_timeout_ms, 20);
        assert_eq!(config.shutdown_timeout_ms, 5000);
        assert_eq!(config.trace_runs, 3);
    }

    #[test]
    fn env_garbage_is_rejected() {
        let err = PipelineConfig::default()
            .with_vars(|k| (k == ENV_MAX_BLOCKING_THREADS).then(|| "lots".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_MAX_BLOCKING_THREADS));
    }

    #[test]
    fn env_trace_flag() {
        let off = PipelineConfig::default()
            .with_vars(|k| (k == ENV_TRACE).then(|| "Off".to_string()))
            .unwrap();
        assert!(!off.trace);

        let err = PipelineConfig::default()
            .with_vars(|k| (k == ENV_TRACE).then(|| "maybe".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_TRACE));
    }
}
