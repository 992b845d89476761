//! Pipeline - registration, lifecycle, and runs
//!
//! ```text
//! new ─► register* ─► init ─► run* ─► destroy
//!                      │        │
//!                      │        └─ drive(graph) on the pipeline runtime
//!                      └─ validate graph, start runtime + event dispatcher,
//!                         init units in topological order
//! ```
//!
//! The pipeline owns a tokio runtime, so its methods block the caller and
//! must not be called (or the pipeline dropped while initialized) from
//! inside another async runtime.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Runtime;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::report::RunReport;
use super::runner::drive;
use crate::aspect::Aspect;
use crate::config::PipelineConfig;
use crate::dag::DependencyGraph;
use crate::element::{Element, ElementKind, NodeContext};
use crate::error::{NodeflowError, Result};
use crate::event::{EventBus, EventHandler, NoopSink, TraceKind, TraceLog, TraceSink};
use crate::param::{Param, ParamRegistry, SharedParam};
use crate::status::Status;

/// Lifecycle position of a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Created,
    Initialized,
    Destroyed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PipelineState::Created => "created",
            PipelineState::Initialized => "initialized",
            PipelineState::Destroyed => "destroyed",
        })
    }
}

struct Registration {
    element: Arc<Element>,
    depends: Vec<Arc<str>>,
}

/// A DAG of units with a shared parameter space and an event bus
pub struct Pipeline {
    config: PipelineConfig,
    state: PipelineState,
    registrations: Vec<Registration>,
    /// First structural error seen during registration; init reports it
    poisoned: Option<NodeflowError>,
    graph: Option<DependencyGraph>,
    units: Vec<Arc<Element>>,
    runtime: Option<Runtime>,
    dispatcher: Option<JoinHandle<()>>,
    params: Arc<ParamRegistry>,
    bus: EventBus,
    trace: TraceLog,
    sink: Arc<dyn TraceSink>,
    ctx: NodeContext,
    runs: u64,
    last_report: Option<RunReport>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::with_config(PipelineConfig::default())
    }

    pub fn with_config(config: PipelineConfig) -> Self {
        let trace = TraceLog::new();
        let sink: Arc<dyn TraceSink> = if config.trace {
            Arc::new(trace.clone())
        } else {
            Arc::new(NoopSink)
        };
        let params = Arc::new(ParamRegistry::new());
        let bus = EventBus::new(Arc::clone(&params), Arc::clone(&sink));
        let ctx = NodeContext::new(
            Arc::clone(&params),
            bus.clone(),
            Arc::clone(&sink),
            config.default_timeout(),
        );

        Self {
            config,
            state: PipelineState::Created,
            registrations: Vec::new(),
            poisoned: None,
            graph: None,
            units: Vec::new(),
            runtime: None,
            dispatcher: None,
            params,
            bus,
            trace,
            sink,
            ctx,
            runs: 0,
            last_report: None,
        }
    }

    // ═══════════════════════════════════════════
    // REGISTRATION
    // ═══════════════════════════════════════════

    /// Add a unit that runs after every unit named in `depends`.
    ///
    /// Predecessors may be registered later; unknown names fail `init`.
    /// A duplicate name fails here and also makes `init` fail.
    pub fn register(&mut self, element: Element, depends: &[&str]) -> Status {
        if let Err(err) = self.expect_state(PipelineState::Created, "register") {
            return err.into();
        }
        if self
            .registrations
            .iter()
            .any(|r| r.element.name() == element.name())
        {
            let err = NodeflowError::DuplicateIdentity {
                name: element.name().to_string(),
            };
            warn!(error = %err, "registration rejected");
            self.poisoned.get_or_insert_with(|| err.clone());
            return err.into();
        }

        debug!(unit = element.name(), kind = element.kind().label(), ?depends, "unit registered");
        self.registrations.push(Registration {
            element: Arc::new(element),
            depends: depends.iter().map(|d| Arc::from(*d)).collect(),
        });
        Status::ok()
    }

    /// Attach an aspect to a registered unit
    pub fn add_aspect(&mut self, unit: &str, aspect: impl Aspect) -> Status {
        let aspect: Arc<dyn Aspect> = Arc::new(aspect);
        self.configure(unit, "add aspect", move |element| element.push_aspect(aspect))
    }

    /// Per-iteration timeout of a registered unit; zero removes it
    pub fn set_timeout(&mut self, unit: &str, limit: Duration) -> Status {
        self.configure(unit, "set timeout", |element| element.set_timeout(limit))
    }

    pub fn set_loop_count(&mut self, unit: &str, count: u32) -> Status {
        self.configure(unit, "set loop count", |element| element.set_loop_count(count))
    }

    fn configure(
        &mut self,
        unit: &str,
        operation: &'static str,
        apply: impl FnOnce(&mut Element),
    ) -> Status {
        if let Err(err) = self.expect_state(PipelineState::Created, operation) {
            return err.into();
        }
        let Some(registration) = self
            .registrations
            .iter_mut()
            .find(|r| r.element.name() == unit)
        else {
            return NodeflowError::UnknownElement {
                name: unit.to_string(),
            }
            .into();
        };
        match Arc::get_mut(&mut registration.element) {
            Some(element) => {
                apply(element);
                Status::ok()
            }
            None => NodeflowError::InvalidState {
                operation,
                state: "in use".to_string(),
            }
            .into(),
        }
    }

    // ═══════════════════════════════════════════
    // PARAMETERS AND EVENTS
    // ═══════════════════════════════════════════

    pub fn create_param<T: Param>(&self, name: &str, value: T) -> Status {
        if let Err(err) = self.expect_alive("create param") {
            return err.into();
        }
        Status::from(self.params.create(name, value))
    }

    pub fn param<T: Param>(&self, name: &str) -> Result<SharedParam<T>> {
        self.params.get(name)
    }

    pub fn params(&self) -> &ParamRegistry {
        &self.params
    }

    pub fn add_event_handler(&self, event: &str, handler: impl EventHandler) -> Status {
        if let Err(err) = self.expect_alive("add event handler") {
            return err.into();
        }
        self.bus.add_handler(event, handler);
        Status::ok()
    }

    /// Raise an event from outside any unit (source "pipeline")
    pub fn notify(&self, event: &str) -> Status {
        Status::from(self.ctx.notify(event))
    }

    // ═══════════════════════════════════════════
    // LIFECYCLE
    // ═══════════════════════════════════════════

    /// Validate the graph, start the runtime, init every unit once
    #[instrument(name = "pipeline_init", skip(self), fields(units = self.registrations.len()))]
    pub fn init(&mut self) -> Status {
        match self.try_init() {
            Ok(()) => {
                info!("pipeline initialized");
                Status::ok()
            }
            Err(err) => {
                warn!(error = %err, "pipeline init failed");
                err.into()
            }
        }
    }

    fn try_init(&mut self) -> Result<()> {
        self.expect_state(PipelineState::Created, "init")?;
        if let Some(err) = &self.poisoned {
            return Err(err.clone());
        }
        self.config.validate()?;

        let graph = DependencyGraph::build(
            self.registrations
                .iter()
                .map(|r| (r.element.name(), r.depends.iter().map(|d| d.as_ref()))),
        )?;
        for registration in &self.registrations {
            registration.element.prepare()?;
        }

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.config.worker_threads)
            .max_blocking_threads(self.config.max_blocking_threads)
            .thread_name(self.config.thread_name.clone())
            .enable_time()
            .build()
            .map_err(|e| NodeflowError::ConfigError {
                reason: format!("failed to start worker pool: {e}"),
            })?;
        let dispatcher = self.bus.start(runtime.handle());

        let units: Vec<Arc<Element>> = self
            .registrations
            .iter()
            .map(|r| Arc::clone(&r.element))
            .collect();

        let host_params = self.params.names();
        let mut initialized: Vec<usize> = Vec::with_capacity(units.len());
        for &unit in graph.topological_order() {
            let element = &units[unit];
            let status = element.init_tree(&self.ctx);
            if status.is_err() {
                let err = NodeflowError::InitFailure {
                    name: element.name().to_string(),
                    code: status.code(),
                    message: status.message().to_string(),
                };
                for &done in initialized.iter().rev() {
                    let _ = units[done].destroy_tree(&self.ctx);
                }
                self.params.retain_names(&host_params);
                self.shutdown(runtime, dispatcher);
                return Err(err);
            }
            initialized.push(unit);
        }

        self.graph = Some(graph);
        self.units = units;
        self.runtime = Some(runtime);
        self.dispatcher = dispatcher;
        self.state = PipelineState::Initialized;
        Ok(())
    }

    /// Run every unit once, honouring dependencies.
    ///
    /// Returns the first unit failure, unchanged, or ok. From the second run
    /// on, shared parameters are reset with the previous run's status first.
    #[instrument(name = "pipeline_run", skip(self), fields(run = self.runs))]
    pub fn run(&mut self) -> Status {
        if let Err(err) = self.expect_state(PipelineState::Initialized, "run") {
            return err.into();
        }

        if self.config.trace_runs > 0 {
            self.trace.retain_runs(self.config.trace_runs - 1);
        }
        if self.runs > 0 {
            let prior = self
                .last_report
                .as_ref()
                .map(|r| r.status.clone())
                .unwrap_or_default();
            let count = self.params.reset_all(&prior);
            debug!(count, prior_code = prior.code(), "shared parameters reset");
            self.sink.emit(TraceKind::ParamsReset {
                count,
                prior_code: prior.code(),
            });
        }
        let run_index = self.runs;
        self.runs += 1;

        let (Some(runtime), Some(graph)) = (&self.runtime, &self.graph) else {
            return NodeflowError::InvalidState {
                operation: "run",
                state: "missing runtime".to_string(),
            }
            .into();
        };

        self.sink.emit(TraceKind::RunStarted {
            run_id: Uuid::new_v4().to_string(),
            run_index,
            unit_count: graph.len(),
        });
        let ctx = self.ctx.for_run(run_index);
        let report = runtime.block_on(drive(graph, &self.units, &ctx));

        let failed = report.failed().count();
        let skipped = report.skipped().count();
        self.sink.emit(TraceKind::RunCompleted {
            run_index,
            code: report.status.code(),
            failed,
            skipped,
            duration_us: report.duration.as_micros() as u64,
        });
        if report.is_ok() {
            info!(duration_ms = report.duration.as_millis() as u64, "run completed");
        } else {
            warn!(failed, skipped, status = %report.status, "run failed");
        }

        let status = report.status.clone();
        self.last_report = Some(report);
        status
    }

    /// Destroy units in reverse topological order and stop the runtime.
    ///
    /// Every unit is destroyed even if some fail; the first failure is
    /// returned.
    #[instrument(name = "pipeline_destroy", skip(self))]
    pub fn destroy(&mut self) -> Status {
        let status = match self.state {
            PipelineState::Destroyed => {
                return NodeflowError::InvalidState {
                    operation: "destroy",
                    state: self.state.to_string(),
                }
                .into()
            }
            PipelineState::Created => Status::ok(),
            PipelineState::Initialized => {
                let mut first = Status::ok();
                if let Some(graph) = &self.graph {
                    for &unit in graph.topological_order().iter().rev() {
                        let element = &self.units[unit];
                        let status = element.destroy_tree(&self.ctx);
                        if status.is_err() {
                            let err = NodeflowError::DestroyFailure {
                                name: element.name().to_string(),
                                code: status.code(),
                                message: status.message().to_string(),
                            };
                            warn!(error = %err, "unit destroy failed");
                            first = first.or(err.into());
                        }
                    }
                }
                if let Some(runtime) = self.runtime.take() {
                    let dispatcher = self.dispatcher.take();
                    self.shutdown(runtime, dispatcher);
                }
                first
            }
        };

        self.units.clear();
        self.graph = None;
        self.params.clear();
        self.state = PipelineState::Destroyed;
        info!("pipeline destroyed");
        status
    }

    /// init, one run, destroy
    pub fn process(&mut self) -> Status {
        self.process_times(1)
    }

    /// init, up to `times` runs (stopping at the first failure), destroy.
    ///
    /// Returns the first failure of any step; destroy runs whenever init
    /// succeeded.
    pub fn process_times(&mut self, times: u32) -> Status {
        let status = self.init();
        if status.is_err() {
            return status;
        }
        let mut status = Status::ok();
        for _ in 0..times {
            status = self.run();
            if status.is_err() {
                break;
            }
        }
        status.or(self.destroy())
    }

    fn shutdown(&self, runtime: Runtime, dispatcher: Option<JoinHandle<()>>) {
        self.bus.stop();
        let limit = self.config.shutdown_timeout();
        if let Some(dispatcher) = dispatcher {
            // the timer has to be created inside the runtime
            let drained = runtime.block_on(async move {
                tokio::time::timeout(limit, dispatcher).await
            });
            if drained.is_err() {
                warn!(timeout_ms = limit.as_millis() as u64, "event dispatcher did not drain in time");
            }
        }
        runtime.shutdown_timeout(limit);
    }

    // ═══════════════════════════════════════════
    // INSPECTION
    // ═══════════════════════════════════════════

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Trace of every run so far (empty when tracing is disabled)
    pub fn trace(&self) -> &TraceLog {
        &self.trace
    }

    pub fn last_report(&self) -> Option<&RunReport> {
        self.last_report.as_ref()
    }

    pub fn run_count(&self) -> u64 {
        self.runs
    }

    /// Registered unit names, in registration order
    pub fn unit_names(&self) -> Vec<&str> {
        self.registrations.iter().map(|r| r.element.name()).collect()
    }

    /// Indented outline of every unit and its members
    pub fn outline(&self) -> String {
        let mut out = String::new();
        for registration in &self.registrations {
            registration.element.describe(0, &mut out);
        }
        out
    }

    /// Graphviz rendering of the top-level graph.
    ///
    /// Composite units are drawn as boxes listing their members.
    pub fn dump(&self) -> Result<String> {
        let graph = match &self.graph {
            Some(graph) => graph.clone(),
            None => DependencyGraph::build(
                self.registrations
                    .iter()
                    .map(|r| (r.element.name(), r.depends.iter().map(|d| d.as_ref()))),
            )?,
        };
        Ok(graph.to_dot("pipeline", |unit| {
            let element = &self.registrations[unit].element;
            if let ElementKind::Node(_) = element.kind() {
                return None;
            }
            let members: Vec<&str> = element.members().iter().map(|m| m.name()).collect();
            Some(format!(
                "shape=box3d, label=\"{}\\n[{}]\\n{}\"",
                element.name(),
                element.kind().label(),
                members.join("\\n")
            ))
        }))
    }

    fn expect_state(&self, expected: PipelineState, operation: &'static str) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(NodeflowError::InvalidState {
                operation,
                state: self.state.to_string(),
            })
        }
    }

    fn expect_alive(&self, operation: &'static str) -> Result<()> {
        if self.state == PipelineState::Destroyed {
            Err(NodeflowError::InvalidState {
                operation,
                state: self.state.to_string(),
            })
        } else {
            Ok(())
        }
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        if self.state == PipelineState::Initialized {
            let status = self.destroy();
            if status.is_err() {
                warn!(%status, "destroy on drop failed");
            }
        }
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("state", &self.state)
            .field("units", &self.unit_names())
            .field("runs", &self.runs)
            .field("params", &self.params)
            .finish()
    }
}
