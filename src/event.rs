//! Metric events handed to a [`MetricSink`](crate::MetricSink).

use std::collections::BTreeMap;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

/// Tags attached to a metric event. Keys are unique.
pub type TagMap = BTreeMap<String, String>;

/// A single measurement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricEvent {
    /// Dot-separated metric name (e.g. `"rust.runtime.gc.pause"`).
    pub name: String,

    /// The kind of metric (counter, gauge, timer).
    pub kind: MetricKind,

    /// The measured value.
    pub value: MetricValue,

    /// Unit of measurement (e.g. `"byte"`, `"nanosecond"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,

    /// Tags for additional context.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: TagMap,

    /// When the measured thing happened, if it is not "now".
    ///
    /// Garbage collection pauses carry their end time here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<SystemTime>,
}

impl MetricEvent {
    fn new(name: impl Into<String>, kind: MetricKind, value: MetricValue) -> Self {
        Self {
            name: name.into(),
            kind,
            value,
            unit: None,
            tags: TagMap::new(),
            timestamp: None,
        }
    }

    /// Creates a new counter event.
    pub fn counter(name: impl Into<String>, value: impl Into<MetricValue>) -> Self {
        Self::new(name, MetricKind::Counter, value.into())
    }

    /// Creates a new gauge event.
    pub fn gauge(name: impl Into<String>, value: impl Into<MetricValue>) -> Self {
        Self::new(name, MetricKind::Gauge, value.into())
    }

    /// Creates a new timer event measuring `duration` in nanoseconds.
    pub fn timer(name: impl Into<String>, duration: Duration) -> Self {
        Self::new(name, MetricKind::Timer, MetricValue::from(duration)).with_unit("nanosecond")
    }

    /// Sets the unit for this event.
    #[must_use]
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Adds a tag to this event, replacing any previous value for `key`.
    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Adds all `tags` to this event.
    #[must_use]
    pub fn with_tags<I, K, V>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.tags
            .extend(tags.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Sets the time the measured thing happened.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: SystemTime) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Returns the value of the tag `key`, if present.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

/// The kind of metric being recorded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// A count of occurrences since the previous report.
    Counter,
    /// A point-in-time value that can go up or down.
    Gauge,
    /// A duration sample, typically aggregated into a histogram.
    Timer,
}

/// Metric value supporting both integers and floats.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    /// An integer value.
    Int(i64),
    /// A floating-point value.
    Float(f64),
}

impl MetricValue {
    /// Returns the value as a float.
    pub fn as_f64(self) -> f64 {
        match self {
            MetricValue::Int(v) => v as f64,
            MetricValue::Float(v) => v,
        }
    }
}

impl From<i64> for MetricValue {
    fn from(v: i64) -> Self {
        MetricValue::Int(v)
    }
}

impl From<i32> for MetricValue {
    fn from(v: i32) -> Self {
        MetricValue::Int(v as i64)
    }
}

impl From<u64> for MetricValue {
    fn from(v: u64) -> Self {
        MetricValue::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<u32> for MetricValue {
    fn from(v: u32) -> Self {
        MetricValue::Int(v as i64)
    }
}

impl From<usize> for MetricValue {
    fn from(v: usize) -> Self {
        MetricValue::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        MetricValue::Float(v)
    }
}

/// Durations are recorded in whole nanoseconds.
impl From<Duration> for MetricValue {
    fn from(d: Duration) -> Self {
        MetricValue::Int(i64::try_from(d.as_nanos()).unwrap_or(i64::MAX))
    }
}
