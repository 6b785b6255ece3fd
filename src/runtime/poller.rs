use std::sync::mpsc::{channel, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};

use crate::runtime::RuntimeMetricsCollector;

/// Runs a [`RuntimeMetricsCollector`] on a dedicated thread.
///
/// The collector is polled once right away and then every
/// `collection_interval`. Being owned by a single thread, polls never
/// overlap. The first failed collection stops the poller. Dropping the
/// poller stops it and joins the thread.
pub struct RuntimePoller {
    shutdown: Option<Sender<()>>,
    handle: Option<JoinHandle<RuntimeMetricsCollector>>,
}

impl RuntimePoller {
    /// Starts polling `collector`.
    pub fn spawn(mut collector: RuntimeMetricsCollector) -> Self {
        let (shutdown, receiver) = channel::<()>();
        let interval = collector.config().collection_interval;

        let handle = thread::Builder::new()
            .name("runstats-poller".into())
            .spawn(move || {
                stats_debug!("runtime metrics poller started, interval {:?}", interval);
                loop {
                    if let Err(err) = collector.collect() {
                        stats_error!("runtime metrics collection failed, stopping: {}", err);
                        break;
                    }
                    match receiver.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                stats_debug!("runtime metrics poller stopped");
                collector
            })
            .map_err(|err| stats_error!("failed to spawn runtime metrics poller: {}", err))
            .ok();

        Self {
            shutdown: Some(shutdown),
            handle,
        }
    }

    /// Returns true while the poller thread is alive.
    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stops polling and hands back the collector.
    ///
    /// Returns `None` if the poller thread could not be started or panicked.
    pub fn shutdown(mut self) -> Option<RuntimeMetricsCollector> {
        self.stop()
    }

    fn stop(&mut self) -> Option<RuntimeMetricsCollector> {
        drop(self.shutdown.take());
        self.handle.take()?.join().ok()
    }
}

impl Drop for RuntimePoller {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for RuntimePoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimePoller")
            .field("running", &self.is_running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::Arc;
    use std::time::{Duration, SystemTime};

    use super::*;
    use crate::runtime::{GcHistory, MemoryStats, MemoryStatsReader, RuntimeMetricsConfig};
    use crate::CollectingSink;

    struct NoMemory;

    impl MemoryStatsReader for NoMemory {
        fn read_memory_stats(&self) -> io::Result<MemoryStats> {
            Ok(MemoryStats::default())
        }
    }

    struct BrokenMemory;

    impl MemoryStatsReader for BrokenMemory {
        fn read_memory_stats(&self) -> io::Result<MemoryStats> {
            Err(io::Error::new(io::ErrorKind::Other, "gone"))
        }
    }

    #[test]
    fn test_poller_collects_until_shutdown() {
        let sink = CollectingSink::new();
        let history = Arc::new(GcHistory::new());
        history.record_pause(Duration::from_micros(7), SystemTime::now());

        let config = RuntimeMetricsConfig::new().with_interval(Duration::from_millis(5));
        let collector = RuntimeMetricsCollector::new(sink.clone(), config)
            .with_gc_reader(history.clone())
            .with_memory_reader(NoMemory);

        let poller = RuntimePoller::spawn(collector);
        std::thread::sleep(Duration::from_millis(50));
        history.record_pause(Duration::from_micros(8), SystemTime::now());
        std::thread::sleep(Duration::from_millis(50));

        let collector = poller.shutdown().unwrap();
        assert_eq!(collector.state().last_observed_pass(), 2);

        let pauses: Vec<_> = sink
            .fetch_and_clear_events()
            .into_iter()
            .filter(|e| e.name == "rust.runtime.gc.pause")
            .collect();
        assert_eq!(pauses.len(), 2);
    }

    #[test]
    fn test_poller_stops_on_failure() {
        let sink = CollectingSink::new();
        let config = RuntimeMetricsConfig::new().with_interval(Duration::from_millis(5));
        let collector = RuntimeMetricsCollector::new(sink.clone(), config)
            .with_gc_reader(Arc::new(GcHistory::new()))
            .with_memory_reader(BrokenMemory);

        let poller = RuntimePoller::spawn(collector);
        std::thread::sleep(Duration::from_millis(50));

        assert!(!poller.is_running());
        assert!(sink.is_empty());
        assert!(poller.shutdown().is_some());
    }
}
