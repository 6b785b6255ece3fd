//! Runtime and HTTP client instrumentation.
//!
//! This crate turns low-level signals from two interception points of a
//! running process into a stream of named, tagged [`MetricEvent`]s that are
//! handed to a pluggable [`MetricSink`]:
//!
//! - [`http::InstrumentedTransport`] decorates a blocking request transport
//!   and emits exactly one timing event per request, whatever the outcome.
//! - [`runtime::RuntimeMetricsCollector`] periodically samples memory
//!   counters and a bounded history of garbage-collection pauses, reporting
//!   every pause exactly once even when samples are far apart.
//!
//! How events are aggregated or exported is entirely up to the sink.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use runstats::http::InstrumentedTransport;
//! use runstats::runtime::{RuntimeMetricsCollector, RuntimeMetricsConfig, RuntimePoller};
//! use runstats::LogSink;
//!
//! let sink = Arc::new(LogSink::new());
//!
//! // `None` selects the platform default transport.
//! let transport = InstrumentedTransport::new(sink.clone(), None);
//!
//! let collector = RuntimeMetricsCollector::new(
//!     sink,
//!     RuntimeMetricsConfig::new().with_interval(Duration::from_secs(5)),
//! );
//! let _poller = RuntimePoller::spawn(collector);
//! ```

#![warn(missing_docs)]

#[macro_use]
mod macros;

mod error;
mod event;
mod sink;

pub mod http;
pub mod runtime;

pub use error::{CollectError, TransportError};
pub use event::{MetricEvent, MetricKind, MetricValue, TagMap};
pub use sink::{CollectingSink, LogSink, MetricSink, NoopSink, ThreadSink};
