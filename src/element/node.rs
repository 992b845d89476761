//! Node - the user-supplied body of a plain unit, and the chooser of a condition

use super::context::NodeContext;
use crate::status::Status;

/// Computation wrapped by a plain unit.
///
/// `init` runs once per pipeline lifetime, `run` once per loop iteration of
/// every run, `destroy` once when the pipeline is destroyed. `run` executes on
/// the pipeline's blocking pool and may block; poll
/// [`NodeContext::is_cancelled`] to stop early after a timeout.
pub trait Node: Send + Sync + 'static {
    fn init(&self, _ctx: &NodeContext) -> Status {
        Status::ok()
    }

    fn run(&self, ctx: &NodeContext) -> Status;

    fn destroy(&self, _ctx: &NodeContext) -> Status {
        Status::ok()
    }
}

/// Node built from a closure (run only)
pub struct FnNode<F>(F);

impl<F> Node for FnNode<F>
where
    F: Fn(&NodeContext) -> Status + Send + Sync + 'static,
{
    fn run(&self, ctx: &NodeContext) -> Status {
        (self.0)(ctx)
    }
}

/// Wrap a closure as a [`Node`]
pub fn node_fn<F>(f: F) -> FnNode<F>
where
    F: Fn(&NodeContext) -> Status + Send + Sync + 'static,
{
    FnNode(f)
}

/// Picks which candidate of a condition runs.
///
/// Called once per activation iteration; any value outside
/// `0..candidates.len()` fails the condition without running a candidate.
pub trait Chooser: Send + Sync + 'static {
    fn choose(&self, ctx: &NodeContext) -> isize;
}

impl<F> Chooser for F
where
    F: Fn(&NodeContext) -> isize + Send + Sync + 'static,
{
    fn choose(&self, ctx: &NodeContext) -> isize {
        self(ctx)
    }
}
