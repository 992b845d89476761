//! Shared fixtures for integration tests
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use nodeflow::{node_fn, Element, Node, NodeContext, Pipeline, PipelineConfig, Status};
use parking_lot::Mutex;

/// Ordered record of what happened, shared between units and the test
pub type Log = Arc<Mutex<Vec<String>>>;

pub fn log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn entries(log: &Log) -> Vec<String> {
    log.lock().clone()
}

/// Log output for `RUST_LOG=nodeflow=debug cargo test`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_test_writer()
        .try_init();
}

/// Small pool so tests do not spawn a thread per core
pub fn pipeline() -> Pipeline {
    init_tracing();
    Pipeline::with_config(PipelineConfig::default().worker_threads(2))
}

/// Node that appends its name on every run
pub fn record(name: &str, log: &Log) -> Element {
    let log = Arc::clone(log);
    let tag = name.to_string();
    Element::node(
        name,
        node_fn(move |_| {
            log.lock().push(tag.clone());
            Status::ok()
        }),
    )
}

/// Node that always fails with `code`
pub fn failing(name: &str, code: i32) -> Element {
    let message = format!("{name} broke");
    Element::node(name, node_fn(move |_| Status::error(code, message.clone())))
}

/// Node that sleeps, then appends its name
pub fn sleeper(name: &str, ms: u64, log: &Log) -> Element {
    let log = Arc::clone(log);
    let tag = name.to_string();
    Element::node(
        name,
        node_fn(move |_| {
            std::thread::sleep(Duration::from_millis(ms));
            log.lock().push(tag.clone());
            Status::ok()
        }),
    )
}

/// Node recording every lifecycle hook as `"<name>.<hook>"`
pub struct Lifecycle {
    pub name: &'static str,
    pub log: Log,
    pub fail_init: bool,
    pub fail_destroy: bool,
}

impl Lifecycle {
    pub fn element(name: &'static str, log: &Log) -> Element {
        Self::build(name, log, false, false)
    }

    pub fn build(name: &'static str, log: &Log, fail_init: bool, fail_destroy: bool) -> Element {
        Element::node(
            name,
            Lifecycle {
                name,
                log: Arc::clone(log),
                fail_init,
                fail_destroy,
            },
        )
    }

    fn push(&self, hook: &str) {
        self.log.lock().push(format!("{}.{hook}", self.name));
    }
}

impl Node for Lifecycle {
    fn init(&self, _ctx: &NodeContext) -> Status {
        self.push("init");
        if self.fail_init {
            Status::error(21, "init refused")
        } else {
            Status::ok()
        }
    }

    fn run(&self, _ctx: &NodeContext) -> Status {
        self.push("run");
        Status::ok()
    }

    fn destroy(&self, _ctx: &NodeContext) -> Status {
        self.push("destroy");
        if self.fail_destroy {
            Status::error(22, "destroy refused")
        } else {
            Status::ok()
        }
    }
}
