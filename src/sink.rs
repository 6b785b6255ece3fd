//! Consumers of metric events.

use std::sync::mpsc::{sync_channel, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::MetricEvent;

const DEFAULT_QUEUE_SIZE: usize = 1024;

/// Accepts metric events.
///
/// Emission is fire and forget: there is no return value and no error.
/// Implementations are shared between threads and must not block the caller
/// for an unbounded time. Buffering, batching and dropping under load are
/// the sink's own policy.
pub trait MetricSink: Send + Sync + 'static {
    /// Records one event.
    fn emit(&self, event: MetricEvent);
}

impl<S: MetricSink + ?Sized> MetricSink for Arc<S> {
    fn emit(&self, event: MetricEvent) {
        (**self).emit(event)
    }
}

impl<S: MetricSink + ?Sized> MetricSink for Box<S> {
    fn emit(&self, event: MetricEvent) {
        (**self).emit(event)
    }
}

impl<S: MetricSink + ?Sized> MetricSink for &'static S {
    fn emit(&self, event: MetricEvent) {
        (**self).emit(event)
    }
}

/// A sink discarding every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl MetricSink for NoopSink {
    fn emit(&self, _event: MetricEvent) {}
}

/// Collects events in memory instead of sending them anywhere.
///
/// # Examples
///
/// ```
/// use runstats::{CollectingSink, MetricEvent, MetricSink};
///
/// let sink = CollectingSink::new();
/// sink.emit(MetricEvent::counter("requests", 1));
///
/// let events = sink.fetch_and_clear_events();
/// assert_eq!(events.len(), 1);
/// assert!(sink.is_empty());
/// ```
#[derive(Debug, Default)]
pub struct CollectingSink {
    collected: Mutex<Vec<MetricEvent>>,
}

impl CollectingSink {
    /// Creates a new collecting sink.
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> Arc<CollectingSink> {
        Arc::new(CollectingSink::default())
    }

    /// Fetches and clears the collected events.
    pub fn fetch_and_clear_events(&self) -> Vec<MetricEvent> {
        let mut guard = self.collected.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *guard)
    }

    /// Returns a copy of the collected events.
    pub fn events(&self) -> Vec<MetricEvent> {
        self.collected
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of collected events.
    pub fn len(&self) -> usize {
        self.collected
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns true if no event was collected.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MetricSink for CollectingSink {
    fn emit(&self, event: MetricEvent) {
        self.collected
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

/// Writes every event as a JSON log record.
#[derive(Clone, Debug)]
pub struct LogSink {
    level: log::Level,
}

impl LogSink {
    /// Creates a sink logging at `Info` level.
    pub fn new() -> Self {
        Self {
            level: log::Level::Info,
        }
    }

    /// Sets the level events are logged at.
    #[must_use]
    pub fn with_level(mut self, level: log::Level) -> Self {
        self.level = level;
        self
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricSink for LogSink {
    fn emit(&self, event: MetricEvent) {
        match serde_json::to_string(&event) {
            Ok(json) => log::log!(target: "runstats::metrics", self.level, "{}", json),
            Err(err) => stats_debug!("failed to serialize metric {}: {}", event.name, err),
        }
    }
}

enum Task {
    Emit(MetricEvent),
    Flush(SyncSender<()>),
    Shutdown,
}

/// Hands events to another sink on a dedicated background thread.
///
/// Events are queued in a bounded channel. When the queue is full new events
/// are dropped, so emitting never blocks the caller. Dropping the sink
/// delivers the events still queued and joins the worker.
pub struct ThreadSink {
    sender: SyncSender<Task>,
    handle: Option<JoinHandle<()>>,
}

impl ThreadSink {
    /// Spawns a worker delivering to `inner` with the default queue size.
    pub fn new<S: MetricSink>(inner: S) -> Self {
        Self::with_capacity(inner, DEFAULT_QUEUE_SIZE)
    }

    /// Spawns a worker delivering to `inner`, queueing at most `capacity` events.
    pub fn with_capacity<S: MetricSink>(inner: S, capacity: usize) -> Self {
        let (sender, receiver) = sync_channel(capacity);
        let handle = thread::Builder::new()
            .name("runstats-sink".into())
            .spawn(move || {
                for task in receiver.into_iter() {
                    match task {
                        Task::Emit(event) => inner.emit(event),
                        Task::Flush(sender) => {
                            sender.send(()).ok();
                        }
                        Task::Shutdown => return,
                    }
                }
            })
            .map_err(|err| stats_error!("failed to spawn metric sink thread: {}", err))
            .ok();

        Self { sender, handle }
    }

    /// Waits until every event queued so far was delivered.
    ///
    /// Returns `false` if that did not happen within `timeout`.
    pub fn flush(&self, timeout: Duration) -> bool {
        let (sender, receiver) = sync_channel(1);
        if self.sender.send(Task::Flush(sender)).is_err() {
            return false;
        }
        receiver.recv_timeout(timeout).is_ok()
    }
}

impl MetricSink for ThreadSink {
    fn emit(&self, event: MetricEvent) {
        match self.sender.try_send(Task::Emit(event)) {
            Ok(()) => {}
            Err(TrySendError::Full(Task::Emit(event))) => {
                stats_debug!("metric queue is full, dropping {}", event.name);
            }
            Err(_) => {
                stats_debug!("metric sink thread is gone, dropping event");
            }
        }
    }
}

impl Drop for ThreadSink {
    fn drop(&mut self) {
        let _ = self.sender.send(Task::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl std::fmt::Debug for ThreadSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadSink")
            .field("running", &self.handle.is_some())
            .finish()
    }
}
