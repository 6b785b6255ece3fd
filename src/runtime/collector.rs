//! Periodic runtime metrics collection.

use std::sync::Arc;

use crate::runtime::config::RuntimeMetricsConfig;
use crate::runtime::gc::{GcDelta, GcHistory, GcHistoryReader};
use crate::runtime::memory::{MemoryStats, MemoryStatsReader, ProcessMemoryReader};
use crate::{CollectError, MetricEvent, MetricSink};

/// State carried from one collection cycle to the next.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CollectorState {
    last_observed_pass: u64,
}

impl CollectorState {
    /// The pass counter seen by the previous successful collection, `0`
    /// before the first one.
    pub fn last_observed_pass(&self) -> u64 {
        self.last_observed_pass
    }
}

/// Samples memory counters and garbage collection history and emits one
/// metric event per measured quantity.
///
/// [`collect`](Self::collect) takes `&mut self`: polls of one collector are
/// serialized by ownership, so its [`CollectorState`] has a single writer.
/// To poll from a background thread hand the collector to a
/// [`RuntimePoller`](crate::runtime::RuntimePoller).
///
/// Metrics emitted:
/// - `{ns}.memstats.*` - one gauge per memory counter the reader provides
/// - `{ns}.runtime.gc.pause` - one timer per pause, stamped with its end time
/// - `{ns}.runtime.gc.count` - passes since the previous collection
/// - `{ns}.runtime.gc.pause_total` - cumulative pause time
/// - `{ns}.runtime.cpu.count`, `{ns}.runtime.threads`
pub struct RuntimeMetricsCollector {
    config: RuntimeMetricsConfig,
    sink: Arc<dyn MetricSink>,
    gc: Box<dyn GcHistoryReader>,
    memory: Box<dyn MemoryStatsReader>,
    state: CollectorState,
    runtime_prefix: String,
    memstats_prefix: String,
}

impl RuntimeMetricsCollector {
    /// Creates a collector reading [`GcHistory::global`] and the process
    /// memory counters.
    pub fn new<S: MetricSink>(sink: S, config: RuntimeMetricsConfig) -> Self {
        Self {
            runtime_prefix: config.runtime_prefix(),
            memstats_prefix: config.memstats_prefix(),
            config,
            sink: Arc::new(sink),
            gc: Box::new(GcHistory::global()),
            memory: Box::new(ProcessMemoryReader::new()),
            state: CollectorState::default(),
        }
    }

    /// Reads pause history from `reader` instead.
    #[must_use]
    pub fn with_gc_reader<R: GcHistoryReader>(mut self, reader: R) -> Self {
        self.gc = Box::new(reader);
        self
    }

    /// Reads memory counters from `reader` instead.
    #[must_use]
    pub fn with_memory_reader<R: MemoryStatsReader>(mut self, reader: R) -> Self {
        self.memory = Box::new(reader);
        self
    }

    /// The configuration of this collector.
    pub fn config(&self) -> &RuntimeMetricsConfig {
        &self.config
    }

    /// The state left by the previous collection.
    pub fn state(&self) -> CollectorState {
        self.state
    }

    /// Runs one collection cycle.
    ///
    /// All counters are read before anything is emitted: if memory counters
    /// cannot be read the cycle fails without emitting any event and without
    /// advancing the state.
    pub fn collect(&mut self) -> Result<(), CollectError> {
        let memory = if self.config.collect_memory {
            Some(
                self.memory
                    .read_memory_stats()
                    .map_err(CollectError::MemoryStats)?,
            )
        } else {
            None
        };

        let gc = if self.config.collect_gc {
            Some(
                self.gc
                    .read_snapshot()
                    .since(self.state.last_observed_pass),
            )
        } else {
            None
        };

        if let Some(stats) = memory {
            self.report_memory(&stats);
        }

        if self.config.collect_runtime_info {
            self.report_runtime_info();
        }

        if let Some(delta) = gc {
            if delta.lost > 0 {
                stats_debug!(
                    "{} gc passes happened since the last collection, pauses of {} were overwritten",
                    delta.passes,
                    delta.lost
                );
            }
            self.report_gc(&delta);
            self.state.last_observed_pass = delta.num_gc;
        }

        Ok(())
    }

    fn report_memory(&self, stats: &MemoryStats) {
        let counters = [
            ("rss_bytes", stats.rss_bytes, "byte"),
            ("virtual_bytes", stats.virtual_bytes, "byte"),
            ("heap_alloc_bytes", stats.heap_alloc_bytes, "byte"),
            ("heap_resident_bytes", stats.heap_resident_bytes, "byte"),
            ("total_alloc_bytes", stats.total_alloc_bytes, "byte"),
            ("heap_objects", stats.heap_objects, "count"),
        ];

        for (name, value, unit) in counters {
            if let Some(value) = value {
                self.sink.emit(
                    MetricEvent::gauge(format!("{}{}", self.memstats_prefix, name), value)
                        .with_unit(unit),
                );
            }
        }
    }

    fn report_runtime_info(&self) {
        if let Ok(cpus) = std::thread::available_parallelism() {
            self.sink.emit(
                MetricEvent::gauge(format!("{}cpu.count", self.runtime_prefix), cpus.get())
                    .with_unit("count"),
            );
        }

        if let Some(threads) = thread_count() {
            self.sink.emit(
                MetricEvent::gauge(format!("{}threads", self.runtime_prefix), threads)
                    .with_unit("count"),
            );
        }
    }

    fn report_gc(&self, delta: &GcDelta) {
        // the collector never ran
        if delta.num_gc == 0 {
            return;
        }

        let pause_name = format!("{}gc.pause", self.runtime_prefix);
        for pause in &delta.pauses {
            self.sink.emit(
                MetricEvent::timer(pause_name.as_str(), pause.duration).with_timestamp(pause.end),
            );
        }

        self.sink.emit(
            MetricEvent::counter(format!("{}gc.count", self.runtime_prefix), delta.passes)
                .with_unit("count"),
        );
        self.sink.emit(
            MetricEvent::gauge(
                format!("{}gc.pause_total", self.runtime_prefix),
                delta.pause_total,
            )
            .with_unit("nanosecond"),
        );
    }
}

impl std::fmt::Debug for RuntimeMetricsCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeMetricsCollector")
            .field("config", &self.config)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(target_os = "linux")]
fn thread_count() -> Option<usize> {
    let entries = std::fs::read_dir("/proc/self/task").ok()?;
    Some(entries.count())
}

#[cfg(not(target_os = "linux"))]
fn thread_count() -> Option<usize> {
    None
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::Mutex;
    use std::time::{Duration, SystemTime};

    use super::*;
    use crate::runtime::gc::{GcSnapshot, GC_PAUSE_HISTORY};
    use crate::{CollectingSink, MetricKind, MetricValue};

    struct FixedMemory(MemoryStats);

    impl MemoryStatsReader for FixedMemory {
        fn read_memory_stats(&self) -> io::Result<MemoryStats> {
            Ok(self.0.clone())
        }
    }

    struct BrokenMemory;

    impl MemoryStatsReader for BrokenMemory {
        fn read_memory_stats(&self) -> io::Result<MemoryStats> {
            Err(io::Error::new(io::ErrorKind::Unsupported, "no counters"))
        }
    }

    struct FixedGc(Mutex<GcSnapshot>);

    impl GcHistoryReader for FixedGc {
        fn read_snapshot(&self) -> GcSnapshot {
            self.0.lock().unwrap().clone()
        }
    }

    fn memory() -> FixedMemory {
        FixedMemory(MemoryStats {
            rss_bytes: Some(4096),
            heap_alloc_bytes: Some(1024),
            heap_objects: Some(12),
            ..Default::default()
        })
    }

    fn collector(sink: Arc<CollectingSink>, history: Arc<GcHistory>) -> RuntimeMetricsCollector {
        RuntimeMetricsCollector::new(sink, RuntimeMetricsConfig::new())
            .with_gc_reader(history)
            .with_memory_reader(memory())
    }

    fn pauses(events: &[MetricEvent]) -> Vec<&MetricEvent> {
        events
            .iter()
            .filter(|e| e.name == "rust.runtime.gc.pause")
            .collect()
    }

    #[test]
    fn test_metric_families() {
        let sink = CollectingSink::new();
        let history = Arc::new(GcHistory::new());
        history.record_pause(Duration::from_micros(5), SystemTime::now());

        let mut collector = collector(sink.clone(), history);
        collector.collect().unwrap();

        let events = sink.fetch_and_clear_events();
        assert!(!events.is_empty());
        for event in &events {
            assert!(
                event.name.starts_with("rust.runtime.") || event.name.starts_with("rust.memstats."),
                "invalid metric name: {}",
                event.name
            );
        }
        assert!(events
            .iter()
            .any(|e| e.name == "rust.memstats.heap_objects" && e.value == MetricValue::Int(12)));
        assert!(!events.iter().any(|e| e.name == "rust.memstats.virtual_bytes"));
    }

    #[test]
    fn test_pauses_are_reported_once() {
        let sink = CollectingSink::new();
        let history = Arc::new(GcHistory::new());
        let start = SystemTime::now();
        for i in 1..=3 {
            history.record_pause(Duration::from_micros(i), start + Duration::from_millis(i));
        }

        let mut collector = collector(sink.clone(), history.clone());
        collector.collect().unwrap();

        let events = sink.fetch_and_clear_events();
        let reported = pauses(&events);
        assert_eq!(reported.len(), 3);
        assert_eq!(reported[0].value, MetricValue::Int(1_000));
        assert_eq!(reported[2].value, MetricValue::Int(3_000));
        assert_eq!(reported[0].timestamp, Some(start + Duration::from_millis(1)));
        assert_eq!(reported[0].kind, MetricKind::Timer);
        assert_eq!(collector.state().last_observed_pass(), 3);

        history.record_pause(Duration::from_micros(4), start + Duration::from_millis(4));
        collector.collect().unwrap();

        let events = sink.fetch_and_clear_events();
        let reported = pauses(&events);
        assert_eq!(reported.len(), 1);
        assert_eq!(reported[0].value, MetricValue::Int(4_000));

        let count = events
            .iter()
            .find(|e| e.name == "rust.runtime.gc.count")
            .unwrap();
        assert_eq!(count.kind, MetricKind::Counter);
        assert_eq!(count.value, MetricValue::Int(1));

        let total = events
            .iter()
            .find(|e| e.name == "rust.runtime.gc.pause_total")
            .unwrap();
        assert_eq!(total.value, MetricValue::Int(10_000));

        collector.collect().unwrap();
        assert!(pauses(&sink.fetch_and_clear_events()).is_empty());
    }

    #[test]
    fn test_no_gc_events_before_first_pass() {
        let sink = CollectingSink::new();
        let mut collector = collector(sink.clone(), Arc::new(GcHistory::new()));
        collector.collect().unwrap();

        let events = sink.fetch_and_clear_events();
        assert!(!events.iter().any(|e| e.name.starts_with("rust.runtime.gc.")));
        assert_eq!(collector.state().last_observed_pass(), 0);
    }

    #[test]
    fn test_overflow_reports_whole_history() {
        let sink = CollectingSink::new();
        let now = SystemTime::now();
        let gc = FixedGc(Mutex::new(GcSnapshot {
            num_gc: 1000,
            pause_total: Duration::from_millis(100),
            last_gc: Some(now),
            pauses: vec![Duration::from_micros(100); GC_PAUSE_HISTORY],
            pause_ends: vec![now; GC_PAUSE_HISTORY],
        }));

        let mut collector = RuntimeMetricsCollector::new(sink.clone(), RuntimeMetricsConfig::new())
            .with_gc_reader(gc)
            .with_memory_reader(memory());
        collector.collect().unwrap();

        let events = sink.fetch_and_clear_events();
        assert_eq!(pauses(&events).len(), GC_PAUSE_HISTORY);
        let count = events
            .iter()
            .find(|e| e.name == "rust.runtime.gc.count")
            .unwrap();
        assert_eq!(count.value, MetricValue::Int(1000));
        assert_eq!(collector.state().last_observed_pass(), 1000);
    }

    #[test]
    fn test_memory_failure_emits_nothing() {
        let sink = CollectingSink::new();
        let history = Arc::new(GcHistory::new());
        history.record_pause(Duration::from_micros(5), SystemTime::now());

        let mut collector = RuntimeMetricsCollector::new(sink.clone(), RuntimeMetricsConfig::new())
            .with_gc_reader(history)
            .with_memory_reader(BrokenMemory);

        let err = collector.collect().unwrap_err();
        assert!(matches!(err, CollectError::MemoryStats(_)));
        assert!(sink.is_empty());
        assert_eq!(collector.state().last_observed_pass(), 0);
    }

    #[test]
    fn test_disabled_families() {
        let sink = CollectingSink::new();
        let config = RuntimeMetricsConfig::new()
            .with_namespace("app")
            .with_memory_metrics(false)
            .with_runtime_info(false);
        let history = Arc::new(GcHistory::new());
        history.record_pause(Duration::from_micros(5), SystemTime::now());

        let mut collector = RuntimeMetricsCollector::new(sink.clone(), config)
            .with_gc_reader(history)
            .with_memory_reader(BrokenMemory);
        collector.collect().unwrap();

        let events = sink.fetch_and_clear_events();
        assert!(!events.is_empty());
        assert!(events.iter().all(|e| e.name.starts_with("app.runtime.gc.")));
    }
}
