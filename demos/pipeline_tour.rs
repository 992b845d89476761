//! A small tour: plain nodes, a cluster, a condition, a region,
//! shared parameters, an aspect and an event handler.
//!
//! Run: RUST_LOG=nodeflow=debug cargo run --example pipeline_tour

use std::time::{Duration, Instant};

use nodeflow::{
    node_fn, Aspect, AspectPhase, Element, EventContext, Node, NodeContext, Param, Pipeline,
    PipelineConfig, Region, Status,
};
use parking_lot::Mutex;

/// Running total shared by every stage
#[derive(Default)]
struct Ledger {
    entries: Vec<String>,
}

impl Param for Ledger {
    fn reset(&mut self, prior: &Status) {
        tracing::info!(entries = self.entries.len(), %prior, "ledger reset");
        self.entries.clear();
    }
}

fn stamp(ctx: &NodeContext) -> Status {
    match ctx.param::<Ledger>("ledger") {
        Ok(ledger) => {
            ledger.lock().entries.push(format!("{}#{}", ctx.name(), ctx.iteration()));
            Status::ok()
        }
        Err(err) => err.into(),
    }
}

struct Source;

impl Node for Source {
    fn init(&self, ctx: &NodeContext) -> Status {
        Status::from(ctx.create_param("ledger", Ledger::default()))
    }

    fn run(&self, ctx: &NodeContext) -> Status {
        stamp(ctx)
    }
}

/// Logs how long each run iteration of a unit takes
struct Stopwatch {
    started: Mutex<Option<Instant>>,
}

impl Aspect for Stopwatch {
    fn begin(&self, phase: AspectPhase, _unit: &str) -> Status {
        if phase == AspectPhase::Run {
            *self.started.lock() = Some(Instant::now());
        }
        Status::ok()
    }

    fn finish(&self, phase: AspectPhase, unit: &str, status: &Status) -> Status {
        if let (AspectPhase::Run, Some(started)) = (phase, self.started.lock().take()) {
            tracing::info!(unit, elapsed = ?started.elapsed(), %status, "stage timed");
        }
        Status::ok()
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config = match PipelineConfig::default().with_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };
    let mut pipeline = Pipeline::with_config(config);

    pipeline.register(Element::node("source", Source), &[]);
    pipeline.register(
        Element::cluster(
            "prepare",
            [
                Element::node("clean", node_fn(stamp)),
                Element::node("normalize", node_fn(stamp)),
            ],
        )
        .aspect(Stopwatch {
            started: Mutex::new(None),
        }),
        &["source"],
    );
    pipeline.register(
        Element::condition(
            "route",
            [
                Element::node("fast_path", node_fn(stamp)),
                Element::node("slow_path", node_fn(stamp)),
            ],
            |ctx: &NodeContext| (ctx.run_index() % 2) as isize,
        ),
        &["source"],
    );
    pipeline.register(
        Element::region(
            "fanout",
            Region::new()
                .member(Element::node("split", node_fn(stamp)), &[])
                .member(Element::node("left", node_fn(stamp)).loop_count(2), &["split"])
                .member(Element::node("right", node_fn(stamp)), &["split"]),
        )
        .timeout(Duration::from_secs(2)),
        &["prepare", "route"],
    );
    pipeline.register(
        Element::node(
            "publish",
            node_fn(|ctx| {
                let status = stamp(ctx);
                if status.is_err() {
                    return status;
                }
                Status::from(ctx.notify("published"))
            }),
        ),
        &["fanout"],
    );

    pipeline.add_event_handler("published", |ctx: &EventContext| -> Status {
        match ctx.param::<Ledger>("ledger") {
            Ok(ledger) => {
                println!("{} published: {:?}", ctx.source(), ledger.lock().entries);
                Status::ok()
            }
            Err(err) => err.into(),
        }
    });

    println!("{}", pipeline.outline());
    match pipeline.dump() {
        Ok(dot) => println!("{dot}"),
        Err(err) => eprintln!("{err}"),
    }

    let status = pipeline.process_times(2);
    println!("finished: {status}");
    if let Some(report) = pipeline.last_report() {
        for outcome in &report.outcomes {
            println!("  {:<10} {:?} in {:?}", outcome.name, outcome.status, outcome.duration);
        }
    }
    println!("trace events: {}", pipeline.trace().len());
}
