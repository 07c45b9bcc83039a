//! Publish/subscribe event bus.
//!
//! Handlers are registered per [`EventKind`]. Synchronous handlers run inline
//! on the publishing task, in subscription order; asynchronous handlers are
//! spawned onto the tokio runtime and run fire-and-forget.
//!
//! A failing or panicking handler never affects the publisher or the other
//! handlers: the failure is logged and dispatch continues.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::runtime::Handle;
use tracing::{debug, error, warn};

use super::event::{Event, EventKind};

/// Default number of events kept for diagnostics.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Error reported by an event handler.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct HandlerError(String);

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Result returned by event handlers.
pub type HandlerResult = Result<(), HandlerError>;

type SyncFn = dyn Fn(&Event) -> HandlerResult + Send + Sync;
type AsyncFn = dyn Fn(Event) -> BoxFuture<'static, HandlerResult> + Send + Sync;

/// A subscribed callback.
///
/// Identity is by allocation: keep a clone of the handler you subscribed in
/// order to unsubscribe it later.
#[derive(Clone)]
pub enum Handler {
    /// Runs inline during [`EventBus::publish`].
    Sync(Arc<SyncFn>),
    /// Spawned as a task during [`EventBus::publish`].
    Async(Arc<AsyncFn>),
}

impl Handler {
    /// Wrap a synchronous callback.
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(&Event) -> HandlerResult + Send + Sync + 'static,
    {
        Self::Sync(Arc::new(f))
    }

    /// Wrap an asynchronous callback.
    pub fn asynchronous<F, Fut>(f: F) -> Self
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self::Async(Arc::new(move |event| f(event).boxed()))
    }

    fn same_as(&self, other: &Handler) -> bool {
        match (self, other) {
            (Self::Sync(a), Self::Sync(b)) => Arc::ptr_eq(a, b),
            (Self::Async(a), Self::Async(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sync(_) => f.write_str("Handler::Sync"),
            Self::Async(_) => f.write_str("Handler::Async"),
        }
    }
}

/// Event bus shared by every pipeline component.
///
/// Construct one per session and pass it around as `Arc<EventBus>`.
pub struct EventBus {
    handlers: Mutex<HashMap<EventKind, Vec<Handler>>>,
    history: Mutex<VecDeque<Event>>,
    history_limit: usize,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_history_limit(DEFAULT_HISTORY_LIMIT)
    }

    pub fn with_history_limit(history_limit: usize) -> Self {
        Self {
            handlers: Mutex::new(HashMap::new()),
            history: Mutex::new(VecDeque::with_capacity(history_limit)),
            history_limit,
        }
    }

    /// Register a handler for an event kind.
    ///
    /// Returns `false` if this handler was already subscribed to `kind`.
    pub fn subscribe(&self, kind: EventKind, handler: Handler) -> bool {
        let mut handlers = self.handlers.lock();
        let list = handlers.entry(kind).or_default();
        if list.iter().any(|h| h.same_as(&handler)) {
            return false;
        }
        list.push(handler);
        debug!(kind = %kind, subscribers = list.len(), "Handler subscribed");
        true
    }

    /// Remove a handler. Returns `false` if it was not subscribed.
    pub fn unsubscribe(&self, kind: EventKind, handler: &Handler) -> bool {
        let mut handlers = self.handlers.lock();
        let Some(list) = handlers.get_mut(&kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|h| !h.same_as(handler));
        let removed = list.len() != before;
        if removed {
            debug!(kind = %kind, subscribers = list.len(), "Handler unsubscribed");
        }
        removed
    }

    /// Number of handlers currently subscribed to `kind`.
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.handlers.lock().get(&kind).map_or(0, Vec::len)
    }

    /// Publish an event to every handler subscribed to its kind.
    ///
    /// The registry lock is released before any handler runs, so handlers
    /// may publish, subscribe or unsubscribe themselves.
    pub fn publish(&self, event: Event) {
        self.record(&event);

        let snapshot: Vec<Handler> = self
            .handlers
            .lock()
            .get(&event.kind())
            .cloned()
            .unwrap_or_default();

        for handler in snapshot {
            match handler {
                Handler::Sync(f) => Self::invoke_sync(&f, &event),
                Handler::Async(f) => Self::spawn_async(&f, &event),
            }
        }
    }

    /// Build and publish an event from a source label and a JSON payload.
    pub fn emit(&self, kind: EventKind, source: &str, payload: Value) {
        self.publish(Event::from_value(kind, payload).with_source(source));
    }

    /// Most recent events, oldest first.
    pub fn history(&self) -> Vec<Event> {
        self.history.lock().iter().cloned().collect()
    }

    /// Most recent events of one kind, oldest first.
    pub fn history_of(&self, kind: EventKind) -> Vec<Event> {
        self.history
            .lock()
            .iter()
            .filter(|e| e.kind() == kind)
            .cloned()
            .collect()
    }

    pub fn clear_history(&self) {
        self.history.lock().clear();
    }

    fn record(&self, event: &Event) {
        if self.history_limit == 0 {
            return;
        }
        let mut history = self.history.lock();
        while history.len() >= self.history_limit {
            history.pop_front();
        }
        history.push_back(event.clone());
    }

    fn invoke_sync(f: &Arc<SyncFn>, event: &Event) {
        match std::panic::catch_unwind(AssertUnwindSafe(|| f(event))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(kind = %event.kind(), error = %e, "Event handler failed");
            }
            Err(_) => {
                error!(kind = %event.kind(), "Event handler panicked");
            }
        }
    }

    fn spawn_async(f: &Arc<AsyncFn>, event: &Event) {
        let Ok(runtime) = Handle::try_current() else {
            warn!(
                kind = %event.kind(),
                "No async runtime available, skipping async event handler"
            );
            return;
        };

        let kind = event.kind();
        let future = f(event.clone());
        runtime.spawn(async move {
            match AssertUnwindSafe(future).catch_unwind().await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(kind = %kind, error = %e, "Async event handler failed");
                }
                Err(_) => {
                    error!(kind = %kind, "Async event handler panicked");
                }
            }
        });
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("history_limit", &self.history_limit)
            .field("history_len", &self.history.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    async fn exploding_handler(_event: Event) -> HandlerResult {
        panic!("async handler exploded")
    }

    fn counting_handler(counter: Arc<AtomicUsize>) -> Handler {
        Handler::sync(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    #[test]
    fn test_sync_handler_receives_event() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        bus.subscribe(
            EventKind::ConnectionEstablished,
            Handler::sync(move |event| {
                seen_clone.lock().push(event.get("port").cloned());
                Ok(())
            }),
        );

        bus.emit(
            EventKind::ConnectionEstablished,
            "listener",
            json!({"type": "udp", "port": 49002}),
        );

        assert_eq!(seen.lock().as_slice(), &[Some(json!(49002))]);
    }

    #[test]
    fn test_handlers_only_see_their_kind() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));
        bus.subscribe(EventKind::RecordingStarted, counting_handler(counter.clone()));

        bus.publish(Event::empty(EventKind::RecordingStopped));
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        bus.publish(Event::empty(EventKind::RecordingStarted));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_duplicate_subscribe_is_noop() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let handler = counting_handler(counter.clone());

        assert!(bus.subscribe(EventKind::PositionAdded, handler.clone()));
        assert!(!bus.subscribe(EventKind::PositionAdded, handler.clone()));
        assert_eq!(bus.subscriber_count(EventKind::PositionAdded), 1);

        bus.publish(Event::empty(EventKind::PositionAdded));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let handler = counting_handler(counter.clone());
        bus.subscribe(EventKind::PositionAdded, handler.clone());

        assert!(bus.unsubscribe(EventKind::PositionAdded, &handler));
        assert!(!bus.unsubscribe(EventKind::PositionAdded, &handler));

        bus.publish(Event::empty(EventKind::PositionAdded));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_failing_handlers_do_not_stop_dispatch() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));

        bus.subscribe(
            EventKind::ErrorOccurred,
            Handler::sync(|_| Err(HandlerError::new("nope"))),
        );
        bus.subscribe(
            EventKind::ErrorOccurred,
            Handler::sync(|_| panic!("handler exploded")),
        );
        bus.subscribe(EventKind::ErrorOccurred, counting_handler(counter.clone()));

        bus.publish(Event::empty(EventKind::ErrorOccurred));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_handler_may_publish_reentrantly() {
        let bus = Arc::new(EventBus::new());
        let counter = Arc::new(AtomicUsize::new(0));
        bus.subscribe(EventKind::SettingsChanged, counting_handler(counter.clone()));

        let inner = Arc::clone(&bus);
        bus.subscribe(
            EventKind::ShutdownRequested,
            Handler::sync(move |_| {
                inner.publish(Event::empty(EventKind::SettingsChanged));
                Ok(())
            }),
        );

        bus.publish(Event::empty(EventKind::ShutdownRequested));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_async_handler_without_runtime_is_skipped() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        bus.subscribe(
            EventKind::ConnectionLost,
            Handler::asynchronous(move |_| {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }),
        );

        bus.publish(Event::empty(EventKind::ConnectionLost));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_async_handler_is_spawned() {
        let bus = EventBus::new();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        bus.subscribe(
            EventKind::RecordingStopped,
            Handler::asynchronous(move |event| {
                let tx = tx.clone();
                async move {
                    tx.send(event.id())
                        .map_err(|e| HandlerError::new(e.to_string()))
                }
            }),
        );
        bus.subscribe(
            EventKind::RecordingStopped,
            Handler::asynchronous(exploding_handler),
        );

        let event = Event::empty(EventKind::RecordingStopped);
        let id = event.id();
        bus.publish(event);

        let received = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("async handler should run");
        assert_eq!(received, Some(id));
    }

    #[test]
    fn test_history_is_bounded() {
        let bus = EventBus::new();
        for i in 0..150 {
            bus.emit(EventKind::PositionAdded, "writer", json!({"fix_count": i}));
        }

        let history = bus.history();
        assert_eq!(history.len(), DEFAULT_HISTORY_LIMIT);
        assert_eq!(history[0].get("fix_count"), Some(&json!(50)));
        assert_eq!(history[99].get("fix_count"), Some(&json!(149)));

        bus.clear_history();
        assert!(bus.history().is_empty());
    }

    #[test]
    fn test_history_of_filters_kind() {
        let bus = EventBus::new();
        bus.publish(Event::empty(EventKind::ConnectionEstablished));
        bus.publish(Event::empty(EventKind::ConnectionLost));
        bus.publish(Event::empty(EventKind::ConnectionLost));

        assert_eq!(bus.history_of(EventKind::ConnectionLost).len(), 2);
        assert_eq!(bus.history_of(EventKind::DataReceived).len(), 0);
    }
}
