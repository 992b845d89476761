//! Property tests: graph validation and scheduling on random DAGs

mod common;

use std::collections::{HashMap, VecDeque};

use common::pipeline;
use nodeflow::{node_fn, DependencyGraph, Element, ErrorCode, Status, TraceKind, UnitStatus};
use proptest::prelude::*;

fn name(i: usize) -> String {
    format!("u{i}")
}

/// Edges only point from lower to higher index, so the graph is acyclic
fn dag_strategy(max_units: usize) -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1..=max_units).prop_flat_map(|n| {
        (0..n)
            .map(|i| proptest::sample::subsequence((0..i).collect::<Vec<_>>(), 0..=i.min(3)))
            .collect::<Vec<_>>()
    })
}

/// Arbitrary edges, cycles allowed
fn digraph_strategy() -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1..8usize).prop_flat_map(|n| proptest::collection::vec(proptest::collection::vec(0..n, 0..3), n))
}

fn is_acyclic(deps: &[Vec<usize>]) -> bool {
    let n = deps.len();
    let mut remaining: Vec<usize> = deps
        .iter()
        .map(|d| {
            let mut d = d.clone();
            d.sort_unstable();
            d.dedup();
            d.len()
        })
        .collect();
    let mut successors = vec![Vec::new(); n];
    for (unit, d) in deps.iter().enumerate() {
        let mut d = d.clone();
        d.sort_unstable();
        d.dedup();
        for p in d {
            successors[p].push(unit);
        }
    }
    let mut queue: VecDeque<usize> = (0..n).filter(|&u| remaining[u] == 0).collect();
    let mut seen = 0;
    while let Some(u) = queue.pop_front() {
        seen += 1;
        for &s in &successors[u] {
            remaining[s] -= 1;
            if remaining[s] == 0 {
                queue.push_back(s);
            }
        }
    }
    seen == n
}

fn build(deps: &[Vec<usize>]) -> nodeflow::Result<DependencyGraph> {
    let names: Vec<String> = (0..deps.len()).map(name).collect();
    let dep_names: Vec<Vec<String>> = deps
        .iter()
        .map(|d| d.iter().map(|&p| name(p)).collect())
        .collect();
    DependencyGraph::build(
        names
            .iter()
            .zip(&dep_names)
            .map(|(n, d)| (n.as_str(), d.iter().map(String::as_str))),
    )
}

proptest! {
    #[test]
    fn build_accepts_exactly_the_acyclic_graphs(deps in digraph_strategy()) {
        let result = build(&deps);
        if is_acyclic(&deps) {
            let graph = result.unwrap();
            let order = graph.topological_order();
            prop_assert_eq!(order.len(), deps.len());
            let pos: HashMap<usize, usize> = order.iter().enumerate().map(|(i, &u)| (u, i)).collect();
            for (unit, d) in deps.iter().enumerate() {
                for &p in d {
                    prop_assert!(pos[&p] < pos[&unit]);
                }
            }
        } else {
            prop_assert_eq!(result.unwrap_err().error_code(), ErrorCode::CyclicDependency);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn runs_respect_dependencies_and_skip_exactly_blocked_units(
        (deps, failures) in dag_strategy(10).prop_flat_map(|deps| {
            let n = deps.len();
            (Just(deps), proptest::collection::vec(prop::bool::weighted(0.2), n))
        })
    ) {
        let mut p = pipeline();
        for (unit, d) in deps.iter().enumerate() {
            let fails = failures[unit];
            let element = Element::node(
                &name(unit),
                node_fn(move |_| if fails { Status::error(100, "planned") } else { Status::ok() }),
            );
            let d: Vec<String> = d.iter().map(|&x| name(x)).collect();
            let d: Vec<&str> = d.iter().map(String::as_str).collect();
            prop_assert!(p.register(element, &d).is_ok());
        }
        prop_assert!(p.init().is_ok());
        let status = p.run();

        // expected outcome, computed in index order (a topological order here)
        let mut ran = vec![false; deps.len()];
        let mut succeeded = vec![false; deps.len()];
        for unit in 0..deps.len() {
            ran[unit] = deps[unit].iter().all(|&x| succeeded[x]);
            succeeded[unit] = ran[unit] && !failures[unit];
        }

        let report = p.last_report().unwrap().clone();
        for unit in 0..deps.len() {
            let outcome = report.outcome(&name(unit)).unwrap();
            match (&outcome.status, ran[unit], succeeded[unit]) {
                (UnitStatus::Completed, true, true) => {}
                (UnitStatus::Failed(s), true, false) => prop_assert_eq!(s.code(), 100),
                (UnitStatus::Skipped { .. }, false, _) => {}
                (other, r, s) => prop_assert!(false, "{}: {:?} ran={} ok={}", name(unit), other, r, s),
            }
        }
        prop_assert_eq!(status.is_ok(), succeeded.iter().zip(&ran).all(|(s, r)| !r || *s));

        // a unit starts only after each predecessor completed
        let events = p.trace().events();
        let id_of = |pred: &dyn Fn(&TraceKind) -> bool| events.iter().find(|e| pred(&e.kind)).map(|e| e.id);
        for unit in 0..deps.len() {
            if !ran[unit] {
                continue;
            }
            let me = name(unit);
            let start = id_of(&|k| matches!(k, TraceKind::UnitStarted { unit: u, .. } if u.as_ref() == me)).unwrap();
            for &x in &deps[unit] {
                let pred = name(x);
                let done = id_of(&|k| matches!(k, TraceKind::UnitCompleted { unit: u, .. } if u.as_ref() == pred)).unwrap();
                prop_assert!(done < start);
            }
        }
        p.destroy();
    }
}
