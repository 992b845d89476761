//! Frontier - per-run readiness bookkeeping over a DependencyGraph
//!
//! Owned by exactly one coordinator per run, so it needs no locking.
//! A unit becomes ready when its last predecessor completes successfully;
//! a failure marks every pending descendant skipped.

use super::graph::DependencyGraph;

/// Where a unit stands within the current run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    Pending,
    Running,
    Completed,
    Failed,
    /// Not run because the unit at this index failed
    Skipped(usize),
}

/// Effects of one completion
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Advance {
    /// Units that just became ready, already marked running
    pub ready: Vec<usize>,
    /// Units skipped because of this completion
    pub skipped: Vec<usize>,
}

#[derive(Debug)]
pub struct Frontier<'g> {
    graph: &'g DependencyGraph,
    remaining: Vec<usize>,
    states: Vec<UnitState>,
    running: usize,
}

impl<'g> Frontier<'g> {
    pub fn new(graph: &'g DependencyGraph) -> Self {
        Self {
            graph,
            remaining: graph.in_degrees(),
            states: vec![UnitState::Pending; graph.len()],
            running: 0,
        }
    }

    /// Units with no predecessors, marked running
    pub fn start(&mut self) -> Vec<usize> {
        let roots = self.graph.roots();
        for &unit in &roots {
            self.mark_running(unit);
        }
        roots
    }

    /// Record the outcome of a running unit
    pub fn complete(&mut self, unit: usize, success: bool) -> Advance {
        debug_assert_eq!(self.states[unit], UnitState::Running);
        self.running -= 1;

        let mut advance = Advance::default();
        if success {
            self.states[unit] = UnitState::Completed;
            for &next in self.graph.successors(unit) {
                self.remaining[next] -= 1;
                if self.remaining[next] == 0 && self.states[next] == UnitState::Pending {
                    self.mark_running(next);
                    advance.ready.push(next);
                }
            }
        } else {
            self.states[unit] = UnitState::Failed;
            let mut blocked = self.graph.descendants(unit);
            blocked.sort_unstable();
            for next in blocked {
                if self.states[next] == UnitState::Pending {
                    self.states[next] = UnitState::Skipped(unit);
                    advance.skipped.push(next);
                }
            }
        }
        advance
    }

    pub fn state(&self, unit: usize) -> UnitState {
        self.states[unit]
    }

    /// No unit is pending or running
    pub fn is_settled(&self) -> bool {
        self.running == 0
            && self
                .states
                .iter()
                .all(|s| !matches!(s, UnitState::Pending | UnitState::Running))
    }

    fn mark_running(&mut self, unit: usize) {
        self.states[unit] = UnitState::Running;
        self.running += 1;
    }
}
