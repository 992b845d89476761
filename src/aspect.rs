//! Aspects - ordered begin/finish interceptors around a unit
//!
//! For each phase (init, run iteration, destroy):
//! - `begin` hooks run in registration order;
//! - the first failing `begin` skips the body and every later `begin`;
//! - `finish` runs in reverse order for every aspect whose `begin` was
//!   called, including the one that failed, and receives the unit's status;
//! - a failing `finish` is traced and logged but never changes that status.

use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::error::NodeflowError;
use crate::event::{TraceKind, TraceSink};
use crate::status::Status;
use crate::util::catch_status;

/// Lifecycle phase an aspect is wrapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AspectPhase {
    Init,
    Run,
    Destroy,
}

impl fmt::Display for AspectPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AspectPhase::Init => "init",
            AspectPhase::Run => "run",
            AspectPhase::Destroy => "destroy",
        })
    }
}

/// Interceptor attached to a unit
pub trait Aspect: Send + Sync + 'static {
    fn begin(&self, _phase: AspectPhase, _unit: &str) -> Status {
        Status::ok()
    }

    fn finish(&self, _phase: AspectPhase, _unit: &str, _status: &Status) -> Status {
        Status::ok()
    }
}

/// The aspects of one unit for one phase
pub(crate) struct AspectChain<'a> {
    aspects: &'a [Arc<dyn Aspect>],
    unit: &'a Arc<str>,
    phase: AspectPhase,
    sink: &'a dyn TraceSink,
}

impl<'a> AspectChain<'a> {
    pub(crate) fn new(
        aspects: &'a [Arc<dyn Aspect>],
        unit: &'a Arc<str>,
        phase: AspectPhase,
        sink: &'a dyn TraceSink,
    ) -> Self {
        Self {
            aspects,
            unit,
            phase,
            sink,
        }
    }

    /// Run `begin` hooks; returns how many were entered.
    ///
    /// On failure the count includes the failing aspect, so its own
    /// `finish` is paired with its `begin`.
    pub(crate) fn begin(&self) -> Result<usize, (usize, Status)> {
        for (index, aspect) in self.aspects.iter().enumerate() {
            let status = catch_status(self.unit, || aspect.begin(self.phase, self.unit));
            if status.is_err() {
                self.record(&format!("{}:begin", self.phase), &status);
                return Err((index + 1, status));
            }
        }
        Ok(self.aspects.len())
    }

    /// Run `finish` hooks of the first `entered` aspects, last to first
    pub(crate) fn finish(&self, entered: usize, status: &Status) {
        for aspect in self.aspects[..entered].iter().rev() {
            let outcome = catch_status(self.unit, || aspect.finish(self.phase, self.unit, status));
            if outcome.is_err() {
                self.record(&format!("{}:finish", self.phase), &outcome);
            }
        }
    }

    /// Wrap a synchronous body (init and destroy phases)
    pub(crate) fn wrap(&self, body: impl FnOnce() -> Status) -> Status {
        let (entered, status) = match self.begin() {
            Ok(entered) => (entered, body()),
            Err((entered, status)) => (entered, status),
        };
        self.finish(entered, &status);
        status
    }

    fn record(&self, phase: &str, status: &Status) {
        let err = NodeflowError::AspectFailure {
            name: self.unit.to_string(),
            phase: phase.to_string(),
            code: status.code(),
            message: status.message().to_string(),
        };
        warn!(error = %err, "aspect hook failed");
        self.sink.emit(TraceKind::AspectFailed {
            unit: Arc::clone(self.unit),
            phase: phase.to_string(),
            code: status.code(),
            error: status.message().to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::TraceLog;
    use parking_lot::Mutex;

    struct Recorder {
        tag: &'static str,
        fail_begin: bool,
        fail_finish: bool,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl Aspect for Recorder {
        fn begin(&self, phase: AspectPhase, _unit: &str) -> Status {
            self.calls.lock().push(format!("{}.begin({phase})", self.tag));
            if self.fail_begin {
                Status::error(77, "begin refused")
            } else {
                Status::ok()
            }
        }

        fn finish(&self, _phase: AspectPhase, _unit: &str, status: &Status) -> Status {
            self.calls
                .lock()
                .push(format!("{}.finish({})", self.tag, status.code()));
            if self.fail_finish {
                Status::fail("finish broke")
            } else {
                Status::ok()
            }
        }
    }

    fn recorder(
        tag: &'static str,
        fail_begin: bool,
        fail_finish: bool,
        calls: &Arc<Mutex<Vec<String>>>,
    ) -> Arc<dyn Aspect> {
        Arc::new(Recorder {
            tag,
            fail_begin,
            fail_finish,
            calls: Arc::clone(calls),
        })
    }

    #[test]
    fn begins_in_order_finishes_in_reverse() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let aspects = vec![
            recorder("x", false, false, &calls),
            recorder("y", false, false, &calls),
        ];
        let unit: Arc<str> = Arc::from("u");
        let log = TraceLog::new();
        let chain = AspectChain::new(&aspects, &unit, AspectPhase::Run, &log);

        let status = chain.wrap(|| {
            calls.lock().push("body".into());
            Status::ok()
        });

        assert!(status.is_ok());
        assert_eq!(
            *calls.lock(),
            vec!["x.begin(run)", "y.begin(run)", "body", "y.finish(0)", "x.finish(0)"]
        );
        assert!(log.is_empty());
    }

    #[test]
    fn failing_begin_skips_body_and_later_aspects() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let aspects = vec![
            recorder("x", true, false, &calls),
            recorder("y", false, false, &calls),
        ];
        let unit: Arc<str> = Arc::from("u");
        let log = TraceLog::new();
        let chain = AspectChain::new(&aspects, &unit, AspectPhase::Init, &log);

        let status = chain.wrap(|| {
            calls.lock().push("body".into());
            Status::ok()
        });

        assert_eq!(status.code(), 77);
        assert_eq!(*calls.lock(), vec!["x.begin(init)", "x.finish(77)"]);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn failing_finish_does_not_override_status() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let aspects = vec![
            recorder("x", false, false, &calls),
            recorder("y", false, true, &calls),
        ];
        let unit: Arc<str> = Arc::from("u");
        let log = TraceLog::new();
        let chain = AspectChain::new(&aspects, &unit, AspectPhase::Destroy, &log);

        let status = chain.wrap(|| Status::error(5, "body failed"));

        assert_eq!(status.code(), 5);
        assert_eq!(
            *calls.lock(),
            vec!["x.begin(destroy)", "y.begin(destroy)", "y.finish(5)", "x.finish(5)"]
        );
        assert_eq!(log.count(|k| matches!(k, TraceKind::AspectFailed { .. })), 1);
    }

    #[test]
    fn panicking_hook_is_contained() {
        struct Panicky;
        impl Aspect for Panicky {
            fn begin(&self, _phase: AspectPhase, _unit: &str) -> Status {
                panic!("aspect blew up")
            }
        }

        let aspects: Vec<Arc<dyn Aspect>> = vec![Arc::new(Panicky)];
        let unit: Arc<str> = Arc::from("u");
        let log = TraceLog::new();
        let chain = AspectChain::new(&aspects, &unit, AspectPhase::Run, &log);

        let status = chain.wrap(Status::ok);
        assert!(status.is(crate::error::ErrorCode::Panicked));
    }
}
