//! EventBus - named events dispatched to handlers off the critical path
//!
//! ```text
//! unit bodies (many)                      dispatcher (one per pipeline)
//!   ctx.notify("done") ──┐
//!   ctx.notify("tick") ──┼──► mpsc queue ──► handlers in registration order
//!   ...                ──┘                   (each on the blocking pool)
//! ```
//!
//! - `notify` never waits for handlers.
//! - A failing or panicking handler is logged and traced, nothing else.
//! - Notifications are handled in the order they were queued.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{NodeflowError, Result};
use crate::event::trace::{TraceKind, TraceSink};
use crate::param::{Param, ParamRegistry, SharedParam};
use crate::status::Status;

/// Handler invoked for a named event
pub trait EventHandler: Send + Sync + 'static {
    fn handle(&self, ctx: &EventContext) -> Status;
}

impl<F> EventHandler for F
where
    F: Fn(&EventContext) -> Status + Send + Sync + 'static,
{
    fn handle(&self, ctx: &EventContext) -> Status {
        self(ctx)
    }
}

/// What a handler sees: the event, who raised it, and the shared parameters
pub struct EventContext {
    event: Arc<str>,
    source: Arc<str>,
    params: Arc<ParamRegistry>,
}

impl EventContext {
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Name of the unit that raised the event
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn param<T: Param>(&self, name: &str) -> Result<SharedParam<T>> {
        self.params.get(name)
    }
}

struct Notification {
    event: Arc<str>,
    source: Arc<str>,
}

type HandlerMap = FxHashMap<Arc<str>, Vec<Arc<dyn EventHandler>>>;

/// Registry of handlers plus the dispatch queue
#[derive(Clone)]
pub struct EventBus {
    handlers: Arc<RwLock<HandlerMap>>,
    tx: Arc<Mutex<Option<mpsc::UnboundedSender<Notification>>>>,
    params: Arc<ParamRegistry>,
    sink: Arc<dyn TraceSink>,
}

impl EventBus {
    pub fn new(params: Arc<ParamRegistry>, sink: Arc<dyn TraceSink>) -> Self {
        Self {
            handlers: Arc::new(RwLock::new(HandlerMap::default())),
            tx: Arc::new(Mutex::new(None)),
            params,
            sink,
        }
    }

    /// Append a handler; all handlers of an event run in registration order
    pub fn add_handler(&self, event: &str, handler: impl EventHandler) {
        self.handlers
            .write()
            .entry(Arc::from(event))
            .or_default()
            .push(Arc::new(handler));
    }

    pub fn handler_count(&self, event: &str) -> usize {
        self.handlers.read().get(event).map_or(0, Vec::len)
    }

    pub fn is_running(&self) -> bool {
        self.tx.lock().is_some()
    }

    /// Queue an event raised by `source`; returns without waiting
    pub fn notify(&self, event: &str, source: &str) -> Result<()> {
        if self.handler_count(event) == 0 {
            return Err(NodeflowError::UnknownEvent {
                event: event.to_string(),
            });
        }

        let notification = Notification {
            event: Arc::from(event),
            source: Arc::from(source),
        };
        let tx = self.tx.lock();
        let sender = tx.as_ref().ok_or_else(|| NodeflowError::InvalidState {
            operation: "notify",
            state: "not initialized".to_string(),
        })?;

        self.sink.emit(TraceKind::EventNotified {
            event: Arc::clone(&notification.event),
            source: Arc::clone(&notification.source),
        });
        sender
            .send(notification)
            .map_err(|_| NodeflowError::InvalidState {
                operation: "notify",
                state: "shutting down".to_string(),
            })
    }

    /// Start the dispatcher on `handle`. Calling it twice is a no-op.
    pub(crate) fn start(&self, handle: &Handle) -> Option<JoinHandle<()>> {
        let mut tx = self.tx.lock();
        if tx.is_some() {
            return None;
        }
        let (sender, receiver) = mpsc::unbounded_channel();
        *tx = Some(sender);

        let bus = self.clone();
        Some(handle.spawn(async move { bus.dispatch(receiver).await }))
    }

    /// Close the queue; the dispatcher drains what is already queued, then exits
    pub(crate) fn stop(&self) {
        self.tx.lock().take();
    }

    async fn dispatch(self, mut receiver: mpsc::UnboundedReceiver<Notification>) {
        while let Some(notification) = receiver.recv().await {
            let handlers: Vec<Arc<dyn EventHandler>> = self
                .handlers
                .read()
                .get(&notification.event)
                .cloned()
                .unwrap_or_default();
            debug!(
                event = %notification.event,
                source = %notification.source,
                handlers = handlers.len(),
                "dispatching event"
            );

            for handler in handlers {
                let ctx = EventContext {
                    event: Arc::clone(&notification.event),
                    source: Arc::clone(&notification.source),
                    params: Arc::clone(&self.params),
                };
                let status = match tokio::task::spawn_blocking(move || handler.handle(&ctx)).await
                {
                    Ok(status) => status,
                    Err(join) => NodeflowError::Panicked {
                        name: format!("handler for '{}'", notification.event),
                        message: join.to_string(),
                    }
                    .into(),
                };
                if status.is_err() {
                    self.report_failure(&notification.event, &status);
                }
            }
        }
        debug!("event dispatcher stopped");
    }

    fn report_failure(&self, event: &Arc<str>, status: &Status) {
        let err = NodeflowError::EventHandlerFailure {
            event: event.to_string(),
            code: status.code(),
            message: status.message().to_string(),
        };
        warn!(error = %err, "event handler failed");
        self.sink.emit(TraceKind::EventHandlerFailed {
            event: Arc::clone(event),
            code: status.code(),
            error: status.message().to_string(),
        });
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut events: Vec<String> = self.handlers.read().keys().map(|k| k.to_string()).collect();
        events.sort();
        f.debug_struct("EventBus")
            .field("events", &events)
            .field("running", &self.is_running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::event::trace::TraceLog;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn bus_with_log() -> (EventBus, TraceLog) {
        let log = TraceLog::new();
        let bus = EventBus::new(Arc::new(ParamRegistry::new()), Arc::new(log.clone()));
        (bus, log)
    }

    #[test]
    fn notify_without_handler_is_unknown_event() {
        let (bus, _) = bus_with_log();
        let err = bus.notify("nothing", "a").unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::UnknownEvent);
    }

    #[test]
    fn notify_before_start_is_invalid_state() {
        let (bus, _) = bus_with_log();
        bus.add_handler("done", |_: &EventContext| Status::ok());
        let err = bus.notify("done", "a").unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::InvalidState);
    }

    #[tokio::test]
    async fn all_handlers_run_in_order() {
        let (bus, log) = bus_with_log();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second"] {
            let seen = Arc::clone(&seen);
            bus.add_handler("done", move |ctx: &EventContext| {
                seen.lock().push(format!("{tag}:{}:{}", ctx.event(), ctx.source()));
                Status::ok()
            });
        }
        assert_eq!(bus.handler_count("done"), 2);

        let dispatcher = bus.start(&Handle::current()).unwrap();
        assert!(bus.start(&Handle::current()).is_none());
        bus.notify("done", "unit_a").unwrap();
        bus.stop();
        dispatcher.await.unwrap();

        assert_eq!(
            *seen.lock(),
            vec!["first:done:unit_a".to_string(), "second:done:unit_a".to_string()]
        );
        assert_eq!(log.count(|k| matches!(k, TraceKind::EventNotified { .. })), 1);
    }

    #[tokio::test]
    async fn failing_handler_does_not_stop_the_rest() {
        let (bus, log) = bus_with_log();
        let calls = Arc::new(AtomicUsize::new(0));

        bus.add_handler("tick", |_: &EventContext| Status::error(9, "boom"));
        bus.add_handler("tick", |_: &EventContext| -> Status { panic!("handler panic") });
        let counter = Arc::clone(&calls);
        bus.add_handler("tick", move |_: &EventContext| {
            counter.fetch_add(1, Ordering::SeqCst);
            Status::ok()
        });

        let dispatcher = bus.start(&Handle::current()).unwrap();
        bus.notify("tick", "a").unwrap();
        bus.notify("tick", "b").unwrap();
        bus.stop();
        dispatcher.await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(
            log.count(|k| matches!(k, TraceKind::EventHandlerFailed { .. })),
            4
        );
    }

    #[tokio::test]
    async fn notify_after_stop_fails() {
        let (bus, _) = bus_with_log();
        bus.add_handler("done", |_: &EventContext| Status::ok());
        let dispatcher = bus.start(&Handle::current()).unwrap();
        bus.stop();
        dispatcher.await.unwrap();

        assert!(!bus.is_running());
        assert!(bus.notify("done", "a").is_err());
    }
}
