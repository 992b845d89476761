//! Activation - one run of an element: loop, aspects, timeout, dispatch
//!
//! ```text
//! activate ─► for each iteration:
//!               aspects.begin ─► timeout(pass) ─► aspects.finish
//!
//! pass: Node      ─► spawn_blocking(node.run)
//!       Cluster   ─► members in order
//!       Condition ─► chooser, then one candidate
//!       Region    ─► inner DAG through the runner
//! ```

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::future::{BoxFuture, FutureExt};
use tracing::{debug, warn};

use super::{Element, ElementKind, NodeContext};
use crate::aspect::{AspectChain, AspectPhase};
use crate::error::NodeflowError;
use crate::event::TraceKind;
use crate::runtime::drive;
use crate::status::Status;
use crate::util::panic_message;

impl Element {
    /// Run every loop iteration; stops at the first failing iteration.
    ///
    /// Must be polled inside the pipeline's runtime.
    pub fn activate<'a>(&'a self, ctx: &'a NodeContext) -> BoxFuture<'a, Status> {
        async move {
            let ctx = ctx.for_unit(&self.name);
            let started = Instant::now();
            let mut status = Status::ok();

            for iteration in 0..self.loop_count {
                let ctx = ctx.for_iteration(iteration);
                ctx.sink().emit(TraceKind::UnitStarted {
                    unit: Arc::clone(&self.name),
                    iteration,
                });
                status = self.iterate(&ctx).await;
                if status.is_err() {
                    break;
                }
            }

            let duration_us = started.elapsed().as_micros() as u64;
            if status.is_ok() {
                ctx.sink().emit(TraceKind::UnitCompleted {
                    unit: Arc::clone(&self.name),
                    duration_us,
                });
            } else {
                debug!(unit = %self.name, code = status.code(), error = status.message(), "unit failed");
                ctx.sink().emit(TraceKind::UnitFailed {
                    unit: Arc::clone(&self.name),
                    code: status.code(),
                    error: status.message().to_string(),
                    duration_us,
                });
            }
            status
        }
        .boxed()
    }

    async fn iterate(&self, ctx: &NodeContext) -> Status {
        let chain = AspectChain::new(&self.aspects, &self.name, AspectPhase::Run, ctx.sink());
        let (entered, status) = match chain.begin() {
            Ok(entered) => (entered, self.timed_pass(ctx).await),
            Err((entered, status)) => (entered, status),
        };
        chain.finish(entered, &status);
        status
    }

    async fn timed_pass(&self, ctx: &NodeContext) -> Status {
        let limit = match &self.kind {
            ElementKind::Node(_) => self.timeout.or(ctx.default_timeout()),
            _ => self.timeout,
        };
        let Some(limit) = limit else {
            return self.pass(ctx).await;
        };

        let (scoped, token) = ctx.child_scope();
        match tokio::time::timeout(limit, self.pass(&scoped)).await {
            Ok(status) => status,
            Err(_) => {
                token.cancel();
                warn!(unit = %self.name, timeout_ms = limit.as_millis() as u64, "unit timed out");
                NodeflowError::Timeout {
                    name: self.name.to_string(),
                    timeout_ms: limit.as_millis() as u64,
                }
                .into()
            }
        }
    }

    async fn pass(&self, ctx: &NodeContext) -> Status {
        match &self.kind {
            ElementKind::Node(node) => {
                let node = Arc::clone(node);
                let body_ctx = ctx.clone();
                match tokio::task::spawn_blocking(move || node.run(&body_ctx)).await {
                    Ok(status) => status,
                    Err(join) if join.is_panic() => NodeflowError::Panicked {
                        name: self.name.to_string(),
                        message: panic_message(join.into_panic().as_ref()),
                    }
                    .into(),
                    Err(join) => NodeflowError::RunFailure {
                        name: self.name.to_string(),
                        reason: join.to_string(),
                    }
                    .into(),
                }
            }
            ElementKind::Cluster(members) => {
                for member in members {
                    let status = member.activate(ctx).await;
                    if status.is_err() {
                        return status;
                    }
                }
                Status::ok()
            }
            ElementKind::Condition { candidates, chooser } => {
                let index = match std::panic::catch_unwind(AssertUnwindSafe(|| chooser.choose(ctx))) {
                    Ok(index) => index,
                    Err(payload) => {
                        return NodeflowError::Panicked {
                            name: self.name.to_string(),
                            message: panic_message(payload.as_ref()),
                        }
                        .into()
                    }
                };
                ctx.sink().emit(TraceKind::ConditionChose {
                    unit: Arc::clone(&self.name),
                    index,
                });
                match usize::try_from(index).ok().and_then(|i| candidates.get(i)) {
                    Some(candidate) => candidate.activate(ctx).await,
                    None => NodeflowError::ConditionIndexOutOfRange {
                        name: self.name.to_string(),
                        index,
                        len: candidates.len(),
                    }
                    .into(),
                }
            }
            ElementKind::Region(region) => match region.graph() {
                Some(graph) => drive(graph, region.members(), ctx).await.status,
                None => NodeflowError::InvalidState {
                    operation: "run region",
                    state: "not initialized".to_string(),
                }
                .into(),
            },
        }
    }
}
