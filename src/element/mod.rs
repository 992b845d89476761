//! Element Module - the schedulable units
//!
//! An element is one of:
//! - Node: a user body ([`Node`])
//! - Cluster: members run one after another
//! - Condition: a [`Chooser`] picks one candidate per iteration
//! - Region: members form their own DAG
//!
//! Every element carries a loop count, an optional timeout, and aspects.
//! Members of composites are owned by their parent and never appear in the
//! pipeline's graph.

mod activate;
mod context;
mod node;

use std::fmt::{self, Write as _};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use crate::aspect::{Aspect, AspectChain, AspectPhase};
use crate::dag::DependencyGraph;
use crate::error::{NodeflowError, Result};
use crate::status::Status;
use crate::util::catch_status;

pub use context::NodeContext;
pub use node::{node_fn, Chooser, FnNode, Node};

/// What an element does when activated
pub enum ElementKind {
    Node(Arc<dyn Node>),
    Cluster(Vec<Arc<Element>>),
    Condition {
        candidates: Vec<Arc<Element>>,
        chooser: Arc<dyn Chooser>,
    },
    Region(Region),
}

impl ElementKind {
    pub fn label(&self) -> &'static str {
        match self {
            ElementKind::Node(_) => "node",
            ElementKind::Cluster(_) => "cluster",
            ElementKind::Condition { .. } => "condition",
            ElementKind::Region(_) => "region",
        }
    }
}

/// Members of a region with their in-region dependencies
#[derive(Default)]
pub struct Region {
    members: Vec<Arc<Element>>,
    depends: Vec<Vec<Arc<str>>>,
    graph: OnceLock<DependencyGraph>,
}

impl Region {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a member depending on earlier or later members by name
    pub fn member(mut self, element: Element, depends: &[&str]) -> Self {
        self.members.push(Arc::new(element));
        self.depends
            .push(depends.iter().map(|d| Arc::from(*d)).collect());
        self
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub(crate) fn members(&self) -> &[Arc<Element>] {
        &self.members
    }

    pub(crate) fn graph(&self) -> Option<&DependencyGraph> {
        self.graph.get()
    }

    fn build_graph(&self) -> Result<()> {
        if self.graph.get().is_none() {
            let graph = DependencyGraph::build(
                self.members
                    .iter()
                    .zip(&self.depends)
                    .map(|(m, d)| (m.name(), d.iter().map(|s| s.as_ref()))),
            )?;
            let _ = self.graph.set(graph);
        }
        Ok(())
    }
}

/// A named, schedulable unit
pub struct Element {
    name: Arc<str>,
    loop_count: u32,
    timeout: Option<Duration>,
    aspects: Vec<Arc<dyn Aspect>>,
    kind: ElementKind,
}

impl Element {
    fn with_kind(name: &str, kind: ElementKind) -> Self {
        Self {
            name: Arc::from(name),
            loop_count: 1,
            timeout: None,
            aspects: Vec::new(),
            kind,
        }
    }

    pub fn node(name: &str, node: impl Node) -> Self {
        Self::with_kind(name, ElementKind::Node(Arc::new(node)))
    }

    /// Members run in the given order; the first failure ends the pass
    pub fn cluster(name: &str, members: impl IntoIterator<Item = Element>) -> Self {
        Self::with_kind(
            name,
            ElementKind::Cluster(members.into_iter().map(Arc::new).collect()),
        )
    }

    pub fn condition(
        name: &str,
        candidates: impl IntoIterator<Item = Element>,
        chooser: impl Chooser,
    ) -> Self {
        Self::with_kind(
            name,
            ElementKind::Condition {
                candidates: candidates.into_iter().map(Arc::new).collect(),
                chooser: Arc::new(chooser),
            },
        )
    }

    pub fn region(name: &str, region: Region) -> Self {
        Self::with_kind(name, ElementKind::Region(region))
    }

    /// Iterations per activation (must be at least 1)
    pub fn loop_count(mut self, count: u32) -> Self {
        self.loop_count = count;
        self
    }

    /// Per-iteration time limit; zero clears it
    pub fn timeout(mut self, limit: Duration) -> Self {
        self.set_timeout(limit);
        self
    }

    pub fn timeout_ms(self, ms: u64) -> Self {
        self.timeout(Duration::from_millis(ms))
    }

    pub fn aspect(mut self, aspect: impl Aspect) -> Self {
        self.aspects.push(Arc::new(aspect));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &ElementKind {
        &self.kind
    }

    pub fn loop_count_value(&self) -> u32 {
        self.loop_count
    }

    pub fn timeout_value(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn aspect_count(&self) -> usize {
        self.aspects.len()
    }

    pub(crate) fn push_aspect(&mut self, aspect: Arc<dyn Aspect>) {
        self.aspects.push(aspect);
    }

    pub(crate) fn set_timeout(&mut self, limit: Duration) {
        self.timeout = (!limit.is_zero()).then_some(limit);
    }

    pub(crate) fn set_loop_count(&mut self, count: u32) {
        self.loop_count = count;
    }

    /// Direct members (candidates for a condition)
    pub fn members(&self) -> &[Arc<Element>] {
        match &self.kind {
            ElementKind::Node(_) => &[],
            ElementKind::Cluster(members) => members,
            ElementKind::Condition { candidates, .. } => candidates,
            ElementKind::Region(region) => region.members(),
        }
    }

    /// Validate this element and everything below it; builds region graphs
    pub(crate) fn prepare(&self) -> Result<()> {
        if self.loop_count == 0 {
            return Err(NodeflowError::InvalidElement {
                name: self.name.to_string(),
                reason: "loop count must be at least 1".to_string(),
            });
        }
        if let ElementKind::Region(region) = &self.kind {
            region.build_graph()?;
        }
        self.members().iter().try_for_each(|m| m.prepare())
    }

    /// Init this element and its members, wrapped by init-phase aspects
    pub(crate) fn init_tree(&self, ctx: &NodeContext) -> Status {
        let ctx = ctx.for_unit(&self.name);
        let chain = AspectChain::new(&self.aspects, &self.name, AspectPhase::Init, ctx.sink());
        chain.wrap(|| match &self.kind {
            ElementKind::Node(node) => catch_status(&self.name, || node.init(&ctx)),
            _ => {
                for member in self.members() {
                    let status = member.init_tree(&ctx);
                    if status.is_err() {
                        return status;
                    }
                }
                Status::ok()
            }
        })
    }

    /// Destroy members last to first, then this element; keeps going past
    /// failures and returns the first one
    pub(crate) fn destroy_tree(&self, ctx: &NodeContext) -> Status {
        let ctx = ctx.for_unit(&self.name);
        let chain = AspectChain::new(&self.aspects, &self.name, AspectPhase::Destroy, ctx.sink());
        chain.wrap(|| match &self.kind {
            ElementKind::Node(node) => catch_status(&self.name, || node.destroy(&ctx)),
            _ => self
                .members()
                .iter()
                .rev()
                .fold(Status::ok(), |first, m| first.or(m.destroy_tree(&ctx))),
        })
    }

    /// Human-readable outline, one line per element
    pub(crate) fn describe(&self, depth: usize, out: &mut String) {
        let _ = write!(out, "{:indent$}{} [{}", "", self.name, self.kind.label(), indent = depth * 2);
        if self.loop_count != 1 {
            let _ = write!(out, " x{}", self.loop_count);
        }
        if let Some(limit) = self.timeout {
            let _ = write!(out, " timeout={}ms", limit.as_millis());
        }
        if !self.aspects.is_empty() {
            let _ = write!(out, " aspects={}", self.aspects.len());
        }
        out.push_str("]\n");
        for member in self.members() {
            member.describe(depth + 1, out);
        }
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("name", &self.name)
            .field("kind", &self.kind.label())
            .field("loop_count", &self.loop_count)
            .field("timeout", &self.timeout)
            .field("aspects", &self.aspects.len())
            .field("members", &self.members())
            .finish()
    }
}
