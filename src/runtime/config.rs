//! Configuration for runtime metrics collection.

use std::time::Duration;

/// Configuration for the runtime metrics collector.
#[derive(Clone, Debug)]
pub struct RuntimeMetricsConfig {
    /// How often the poller collects metrics.
    ///
    /// Default: 10 seconds
    pub collection_interval: Duration,

    /// Prefix of every metric name.
    ///
    /// Runtime statistics are reported as `{namespace}.runtime.*` and
    /// allocator counters as `{namespace}.memstats.*`. An empty namespace
    /// drops the prefix.
    ///
    /// Default: `"rust"`
    pub namespace: String,

    /// Report memory counters.
    ///
    /// Default: true
    pub collect_memory: bool,

    /// Report garbage collection pauses and counters.
    ///
    /// Default: true
    pub collect_gc: bool,

    /// Report the CPU count and the thread count of the process.
    ///
    /// Default: true
    pub collect_runtime_info: bool,
}

impl Default for RuntimeMetricsConfig {
    fn default() -> Self {
        Self {
            collection_interval: Duration::from_secs(10),
            namespace: "rust".into(),
            collect_memory: true,
            collect_gc: true,
            collect_runtime_info: true,
        }
    }
}

impl RuntimeMetricsConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the collection interval.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.collection_interval = interval;
        self
    }

    /// Sets the metric name prefix.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Enables or disables memory metrics.
    #[must_use]
    pub fn with_memory_metrics(mut self, enabled: bool) -> Self {
        self.collect_memory = enabled;
        self
    }

    /// Enables or disables garbage collection metrics.
    #[must_use]
    pub fn with_gc_metrics(mut self, enabled: bool) -> Self {
        self.collect_gc = enabled;
        self
    }

    /// Enables or disables CPU and thread count metrics.
    #[must_use]
    pub fn with_runtime_info(mut self, enabled: bool) -> Self {
        self.collect_runtime_info = enabled;
        self
    }

    pub(crate) fn runtime_prefix(&self) -> String {
        self.prefixed("runtime.")
    }

    pub(crate) fn memstats_prefix(&self) -> String {
        self.prefixed("memstats.")
    }

    fn prefixed(&self, family: &str) -> String {
        if self.namespace.is_empty() {
            family.to_owned()
        } else {
            format!("{}.{}", self.namespace, family)
        }
    }
}
