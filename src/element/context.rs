//! NodeContext - what a unit body can reach while it runs
//!
//! One context per activation iteration. Cloning is cheap (Arc fields).

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::event::{EventBus, TraceSink};
use crate::param::{Param, ParamRegistry, SharedParam};

/// Per-activation view of the pipeline: parameters, events, cancellation
#[derive(Clone)]
pub struct NodeContext {
    name: Arc<str>,
    iteration: u32,
    run_index: u64,
    params: Arc<ParamRegistry>,
    bus: EventBus,
    sink: Arc<dyn TraceSink>,
    cancel: CancellationToken,
    default_timeout: Option<Duration>,
}

impl NodeContext {
    pub(crate) fn new(
        params: Arc<ParamRegistry>,
        bus: EventBus,
        sink: Arc<dyn TraceSink>,
        default_timeout: Option<Duration>,
    ) -> Self {
        Self {
            name: Arc::from("pipeline"),
            iteration: 0,
            run_index: 0,
            params,
            bus,
            sink,
            cancel: CancellationToken::new(),
            default_timeout,
        }
    }

    /// Context for a run: fresh cancellation scope
    pub(crate) fn for_run(&self, run_index: u64) -> Self {
        Self {
            run_index,
            cancel: CancellationToken::new(),
            ..self.clone()
        }
    }

    pub(crate) fn for_unit(&self, name: &Arc<str>) -> Self {
        Self {
            name: Arc::clone(name),
            iteration: 0,
            ..self.clone()
        }
    }

    pub(crate) fn for_iteration(&self, iteration: u32) -> Self {
        Self {
            iteration,
            ..self.clone()
        }
    }

    /// Child scope whose token the caller cancels on timeout
    pub(crate) fn child_scope(&self) -> (Self, CancellationToken) {
        let token = self.cancel.child_token();
        (
            Self {
                cancel: token.clone(),
                ..self.clone()
            },
            token,
        )
    }

    pub(crate) fn sink(&self) -> &dyn TraceSink {
        self.sink.as_ref()
    }

    pub(crate) fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout
    }

    /// Name of the unit this context belongs to
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Zero-based loop iteration of the current activation
    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    /// Zero-based index of the current run
    pub fn run_index(&self) -> u64 {
        self.run_index
    }

    /// Create a shared parameter (typically from `init`)
    pub fn create_param<T: Param>(&self, name: &str, value: T) -> Result<SharedParam<T>> {
        self.params.create(name, value)
    }

    /// Look up a shared parameter; the payload is not locked
    pub fn param<T: Param>(&self, name: &str) -> Result<SharedParam<T>> {
        self.params.get(name)
    }

    pub fn params(&self) -> &ParamRegistry {
        &self.params
    }

    /// Raise a named event; handlers run later, off this unit's path
    pub fn notify(&self, event: &str) -> Result<()> {
        self.bus.notify(event, &self.name)
    }

    /// Set once this iteration has timed out
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}

impl std::fmt::Debug for NodeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeContext")
            .field("name", &self.name)
            .field("iteration", &self.iteration)
            .field("run_index", &self.run_index)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::TraceLog;

    fn root() -> NodeContext {
        let params = Arc::new(ParamRegistry::new());
        let sink: Arc<dyn TraceSink> = Arc::new(TraceLog::new());
        let bus = EventBus::new(Arc::clone(&params), Arc::clone(&sink));
        NodeContext::new(params, bus, sink, None)
    }

    #[test]
    fn scopes_carry_identity() {
        let run = root().for_run(3);
        let unit = run.for_unit(&Arc::from("fetch")).for_iteration(2);
        assert_eq!(unit.name(), "fetch");
        assert_eq!(unit.iteration(), 2);
        assert_eq!(unit.run_index(), 3);
    }

    #[test]
    fn child_scope_cancels_without_touching_parent() {
        let parent = root().for_run(0);
        let (child, token) = parent.child_scope();
        token.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());
    }

    #[test]
    fn params_are_shared_between_scopes() {
        struct Flag(bool);
        impl Param for Flag {}

        let ctx = root();
        ctx.create_param("flag", Flag(false)).unwrap();
        let other = ctx.for_unit(&Arc::from("other"));
        other.param::<Flag>("flag").unwrap().lock().0 = true;
        assert!(ctx.param::<Flag>("flag").unwrap().lock().0);
    }
}
