//! DAG Runner - event-driven frontier execution with tokio
//!
//! Performance optimizations:
//! - Arc for zero-cost element/context sharing
//! - JoinSet for efficient parallel activation collection
//! - readiness tracked by one coordinator, so no lock on the hot path
//!
//! Used for the pipeline's top-level graph and for every region.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use super::report::{RunReport, UnitOutcome, UnitStatus};
use crate::dag::{DependencyGraph, Frontier, UnitState};
use crate::element::{Element, NodeContext};
use crate::error::NodeflowError;
use crate::event::TraceKind;
use crate::status::Status;
use crate::util::panic_message;

type Finished = (usize, Status, Duration);

/// Run every unit of `graph` once; `units[i]` is the element of unit `i`.
///
/// A unit starts once all its predecessors succeeded. A failure skips every
/// transitive dependent while independent branches keep running. The run
/// status is the first failure observed, unchanged.
pub(crate) async fn drive(
    graph: &DependencyGraph,
    units: &[Arc<Element>],
    ctx: &NodeContext,
) -> RunReport {
    debug_assert_eq!(graph.len(), units.len());
    let started = Instant::now();
    let mut frontier = Frontier::new(graph);
    let mut outcomes: Vec<Option<UnitOutcome>> = vec![None; graph.len()];
    let mut failure_order = Vec::new();
    let mut status = Status::ok();
    let mut join_set: JoinSet<Finished> = JoinSet::new();

    for unit in frontier.start() {
        dispatch(&mut join_set, graph, units, ctx, unit);
    }

    while let Some(joined) = join_set.join_next().await {
        let (unit, unit_status, duration) = match joined {
            Ok(finished) => finished,
            Err(err) => {
                // panics are caught inside the task; only cancellation lands here
                error!(error = %err, "activation task lost");
                if status.is_ok() {
                    status = NodeflowError::RunFailure {
                        name: ctx.name().to_string(),
                        reason: format!("activation task lost: {err}"),
                    }
                    .into();
                }
                continue;
            }
        };

        let name = Arc::clone(graph.name(unit));
        let success = unit_status.is_ok();
        if !success {
            failure_order.push(Arc::clone(&name));
            if status.is_ok() {
                status = unit_status.clone();
            }
        }
        outcomes[unit] = Some(UnitOutcome {
            name: Arc::clone(&name),
            status: if success {
                UnitStatus::Completed
            } else {
                UnitStatus::Failed(unit_status)
            },
            duration,
        });

        let advance = frontier.complete(unit, success);
        for skipped in advance.skipped {
            let skipped_name = Arc::clone(graph.name(skipped));
            debug!(unit = %skipped_name, blocked_by = %name, "unit skipped");
            ctx.sink().emit(TraceKind::UnitSkipped {
                unit: Arc::clone(&skipped_name),
                blocked_by: Arc::clone(&name),
            });
            outcomes[skipped] = Some(UnitOutcome {
                name: skipped_name,
                status: UnitStatus::Skipped {
                    blocked_by: Arc::clone(&name),
                },
                duration: Duration::ZERO,
            });
        }
        for ready in advance.ready {
            dispatch(&mut join_set, graph, units, ctx, ready);
        }
    }

    if !frontier.is_settled() {
        warn!(unit = ctx.name(), "run ended with units that never finished");
    }

    let outcomes = outcomes
        .into_iter()
        .enumerate()
        .map(|(unit, outcome)| {
            outcome.unwrap_or_else(|| UnitOutcome {
                name: Arc::clone(graph.name(unit)),
                status: UnitStatus::Failed(lost_status(graph, &frontier, unit)),
                duration: Duration::ZERO,
            })
        })
        .collect();

    RunReport {
        run_index: ctx.run_index(),
        status,
        outcomes,
        failure_order,
        duration: started.elapsed(),
    }
}

fn dispatch(
    join_set: &mut JoinSet<Finished>,
    graph: &DependencyGraph,
    units: &[Arc<Element>],
    ctx: &NodeContext,
    unit: usize,
) {
    ctx.sink().emit(TraceKind::UnitScheduled {
        unit: Arc::clone(graph.name(unit)),
        dependencies: graph
            .predecessors(unit)
            .iter()
            .map(|&p| Arc::clone(graph.name(p)))
            .collect(),
    });

    let element = Arc::clone(&units[unit]);
    let ctx = ctx.clone();
    join_set.spawn(async move {
        let started = Instant::now();
        let status = AssertUnwindSafe(element.activate(&ctx))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| {
                NodeflowError::Panicked {
                    name: element.name().to_string(),
                    message: panic_message(payload.as_ref()),
                }
                .into()
            });
        (unit, status, started.elapsed())
    });
}

fn lost_status(graph: &DependencyGraph, frontier: &Frontier<'_>, unit: usize) -> Status {
    let reason = match frontier.state(unit) {
        UnitState::Running => "activation task lost",
        _ => "never became ready",
    };
    NodeflowError::RunFailure {
        name: graph.name(unit).to_string(),
        reason: reason.to_string(),
    }
    .into()
}
