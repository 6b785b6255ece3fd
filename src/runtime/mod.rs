//! Runtime metrics: memory counters and garbage collection pauses.
//!
//! A [`RuntimeMetricsCollector`] samples a [`MemoryStatsReader`] and a
//! [`GcHistoryReader`] on every [`collect`](RuntimeMetricsCollector::collect)
//! call. Pause history is kept in a fixed-size ring buffer by the runtime,
//! so samples are diffed against the pass counter seen last time and only
//! the new pauses are reported.
//!
//! Rust has no runtime collector of its own; embedded runtimes, arenas and
//! reference-cycle collectors record their passes into a [`GcHistory`],
//! by default the process-wide [`GcHistory::global`].
//!
//! ```rust
//! use std::time::{Duration, SystemTime};
//! use runstats::runtime::{GcHistory, RuntimeMetricsCollector, RuntimeMetricsConfig};
//! use runstats::CollectingSink;
//! # use std::sync::Arc;
//!
//! let history = Arc::new(GcHistory::new());
//! let sink = CollectingSink::new();
//! let config = RuntimeMetricsConfig::new().with_memory_metrics(false);
//! let mut collector = RuntimeMetricsCollector::new(sink.clone(), config)
//!     .with_gc_reader(history.clone());
//!
//! history.record_pause(Duration::from_micros(120), SystemTime::now());
//! collector.collect().unwrap();
//!
//! let events = sink.fetch_and_clear_events();
//! assert!(events.iter().any(|e| e.name == "rust.runtime.gc.pause"));
//! ```

mod collector;
mod config;
mod gc;
mod memory;
mod poller;

pub use collector::{CollectorState, RuntimeMetricsCollector};
pub use config::RuntimeMetricsConfig;
pub use gc::{GcDelta, GcHistory, GcHistoryReader, GcPause, GcSnapshot, GC_PAUSE_HISTORY};
pub use memory::{MemoryStats, MemoryStatsReader, ProcessMemoryReader};
pub use poller::RuntimePoller;
