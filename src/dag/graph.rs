//! DependencyGraph - immutable DAG over registered units
//!
//! Performance optimizations:
//! - units addressed by dense index; names kept once as Arc<str>
//! - FxHashMap for name lookup (non-crypto hashing)
//! - SmallVec for stack-allocated small edge lists (0-4 items)
//!
//! Validation on build:
//! - duplicate names and unknown predecessors
//! - cycle detection using DFS three-color algorithm

use std::collections::VecDeque;
use std::fmt::Write as _;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::error::{NodeflowError, Result};

/// Stack-allocated edges: most units have 0-4 neighbours
pub type DepVec = SmallVec<[usize; 4]>;

/// Dependency graph, fixed once built
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    names: Vec<Arc<str>>,
    index: FxHashMap<Arc<str>, usize>,
    predecessors: Vec<DepVec>,
    successors: Vec<DepVec>,
    order: Vec<usize>,
}

impl DependencyGraph {
    /// Build from `(name, predecessors)` pairs in registration order.
    ///
    /// Duplicate entries in a predecessor list count once.
    pub fn build<'a, I, D>(units: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, D)>,
        D: IntoIterator<Item = &'a str>,
    {
        let units: Vec<(&str, Vec<&str>)> = units
            .into_iter()
            .map(|(name, deps)| (name, deps.into_iter().collect()))
            .collect();

        let capacity = units.len();
        let mut names = Vec::with_capacity(capacity);
        let mut index: FxHashMap<Arc<str>, usize> =
            FxHashMap::with_capacity_and_hasher(capacity, Default::default());

        for (name, _) in &units {
            let name: Arc<str> = Arc::from(*name);
            if index.contains_key(&name) {
                return Err(NodeflowError::DuplicateIdentity {
                    name: name.to_string(),
                });
            }
            index.insert(Arc::clone(&name), names.len());
            names.push(name);
        }

        let mut predecessors = vec![DepVec::new(); capacity];
        let mut successors = vec![DepVec::new(); capacity];
        for (unit, (name, deps)) in units.iter().enumerate() {
            for dep in deps {
                let Some(&pred) = index.get(*dep) else {
                    return Err(NodeflowError::UnknownPredecessor {
                        name: name.to_string(),
                        predecessor: dep.to_string(),
                    });
                };
                if !predecessors[unit].contains(&pred) {
                    predecessors[unit].push(pred);
                    successors[pred].push(unit);
                }
            }
        }

        let mut graph = Self {
            names,
            index,
            predecessors,
            successors,
            order: Vec::new(),
        };
        graph.detect_cycles()?;
        graph.order = graph.kahn_order();
        Ok(graph)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    #[inline]
    pub fn name(&self, unit: usize) -> &Arc<str> {
        &self.names[unit]
    }

    pub fn names(&self) -> &[Arc<str>] {
        &self.names
    }

    #[inline]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    #[inline]
    pub fn predecessors(&self, unit: usize) -> &[usize] {
        &self.predecessors[unit]
    }

    #[inline]
    pub fn successors(&self, unit: usize) -> &[usize] {
        &self.successors[unit]
    }

    /// Number of distinct predecessors per unit
    pub fn in_degrees(&self) -> Vec<usize> {
        self.predecessors.iter().map(SmallVec::len).collect()
    }

    /// Units with no predecessors, in registration order
    pub fn roots(&self) -> Vec<usize> {
        (0..self.len())
            .filter(|&u| self.predecessors[u].is_empty())
            .collect()
    }

    /// Units nothing depends on
    pub fn sinks(&self) -> Vec<usize> {
        (0..self.len())
            .filter(|&u| self.successors[u].is_empty())
            .collect()
    }

    /// A topological order; ties broken by registration order
    pub fn topological_order(&self) -> &[usize] {
        &self.order
    }

    /// Check if there's a path from `from` to `to` (BFS)
    pub fn has_path(&self, from: usize, to: usize) -> bool {
        if from == to {
            return true;
        }
        let mut visited = vec![false; self.len()];
        let mut queue = VecDeque::from([from]);
        visited[from] = true;

        while let Some(current) = queue.pop_front() {
            for &next in &self.successors[current] {
                if next == to {
                    return true;
                }
                if !visited[next] {
                    visited[next] = true;
                    queue.push_back(next);
                }
            }
        }
        false
    }

    /// Every unit reachable from `unit` through successor edges
    pub fn descendants(&self, unit: usize) -> Vec<usize> {
        let mut visited = vec![false; self.len()];
        let mut stack: Vec<usize> = self.successors[unit].to_vec();
        let mut found = Vec::new();
        while let Some(current) = stack.pop() {
            if visited[current] {
                continue;
            }
            visited[current] = true;
            found.push(current);
            stack.extend(self.successors[current].iter().copied());
        }
        found
    }

    /// Graphviz rendering, one node per unit; `attrs` may decorate a node
    pub fn to_dot(&self, graph_name: &str, attrs: impl Fn(usize) -> Option<String>) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "digraph \"{graph_name}\" {{");
        let _ = writeln!(out, "  rankdir=LR;");
        for (unit, name) in self.names.iter().enumerate() {
            match attrs(unit) {
                Some(attrs) => {
                    let _ = writeln!(out, "  \"{name}\" [{attrs}];");
                }
                None => {
                    let _ = writeln!(out, "  \"{name}\";");
                }
            }
        }
        for (unit, succs) in self.successors.iter().enumerate() {
            for &succ in succs {
                let _ = writeln!(out, "  \"{}\" -> \"{}\";", self.names[unit], self.names[succ]);
            }
        }
        out.push('}');
        out.push('\n');
        out
    }

    /// Detect cycles using DFS with three-color marking.
    ///
    /// - White: unvisited
    /// - Gray: currently in DFS stack
    /// - Black: fully processed
    ///
    /// Meeting a Gray unit closes a cycle; the error names its path.
    fn detect_cycles(&self) -> Result<()> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Color {
            White,
            Gray,
            Black,
        }

        fn dfs(
            unit: usize,
            successors: &[DepVec],
            colors: &mut [Color],
            stack: &mut Vec<usize>,
        ) -> std::result::Result<(), Vec<usize>> {
            colors[unit] = Color::Gray;
            stack.push(unit);

            for &next in &successors[unit] {
                match colors[next] {
                    Color::Gray => {
                        let start = stack.iter().position(|&u| u == next).unwrap_or(0);
                        let mut cycle = stack[start..].to_vec();
                        cycle.push(next);
                        return Err(cycle);
                    }
                    Color::White => dfs(next, successors, colors, stack)?,
                    Color::Black => {}
                }
            }

            stack.pop();
            colors[unit] = Color::Black;
            Ok(())
        }

        let mut colors = vec![Color::White; self.len()];
        let mut stack = Vec::new();
        for unit in 0..self.len() {
            if colors[unit] == Color::White {
                if let Err(cycle) = dfs(unit, &self.successors, &mut colors, &mut stack) {
                    let path: Vec<&str> = cycle.iter().map(|&u| self.names[u].as_ref()).collect();
                    return Err(NodeflowError::CyclicDependency {
                        cycle: path.join(" → "),
                    });
                }
            }
        }
        Ok(())
    }

    fn kahn_order(&self) -> Vec<usize> {
        let mut remaining = self.in_degrees();
        let mut queue: VecDeque<usize> = self.roots().into();
        let mut order = Vec::with_capacity(self.len());
        while let Some(unit) = queue.pop_front() {
            order.push(unit);
            for &next in &self.successors[unit] {
                remaining[next] -= 1;
                if remaining[next] == 0 {
                    queue.push_back(next);
                }
            }
        }
        order
    }
}
