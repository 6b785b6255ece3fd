//! Garbage collection pause history and its incremental extraction.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::{Duration, SystemTime};

/// Capacity of the pause history ring buffer.
pub const GC_PAUSE_HISTORY: usize = 256;

/// A point-in-time copy of the pause history.
///
/// `pauses[0]` belongs to pass `num_gc`, `pauses[1]` to pass `num_gc - 1`
/// and so on. `pause_ends` is parallel to `pauses`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GcSnapshot {
    /// Number of passes since the process started.
    pub num_gc: u64,
    /// Cumulative pause duration across all passes.
    pub pause_total: Duration,
    /// End time of the most recent pass.
    pub last_gc: Option<SystemTime>,
    /// Pause durations, most recent first.
    pub pauses: Vec<Duration>,
    /// Pause end times, most recent first.
    pub pause_ends: Vec<SystemTime>,
}

/// A single garbage collection pause.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GcPause {
    /// How long the pause lasted.
    pub duration: Duration,
    /// When the pause ended.
    pub end: SystemTime,
}

/// The passes that happened between two snapshots.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GcDelta {
    /// Pass counter of the newer snapshot; the next boundary to diff against.
    pub num_gc: u64,
    /// Number of passes since the previous boundary.
    pub passes: u64,
    /// Passes whose pauses were overwritten before they could be observed.
    pub lost: u64,
    /// Cumulative pause duration of the newer snapshot.
    pub pause_total: Duration,
    /// Pauses of the new passes still in the history, oldest first.
    pub pauses: Vec<GcPause>,
}

impl GcSnapshot {
    /// Extracts the pauses of every pass newer than `last_observed_pass`.
    ///
    /// Never fails. If the counter did not advance (or went backwards) the
    /// delta is empty. If more passes happened than the history holds, only
    /// the pauses still present are reported and the rest is counted as
    /// `lost`. The returned `num_gc` is the boundary for the next call.
    pub fn since(&self, last_observed_pass: u64) -> GcDelta {
        let passes = self.num_gc.saturating_sub(last_observed_pass);
        let available = self
            .pauses
            .len()
            .min(self.pause_ends.len())
            .min(GC_PAUSE_HISTORY);
        let reported = usize::try_from(passes).map_or(available, |p| p.min(available));

        let pauses = self.pauses[..reported]
            .iter()
            .zip(&self.pause_ends[..reported])
            .rev()
            .map(|(&duration, &end)| GcPause { duration, end })
            .collect();

        GcDelta {
            num_gc: self.num_gc,
            passes,
            lost: passes - reported as u64,
            pause_total: self.pause_total,
            pauses,
        }
    }
}

/// Reads the runtime's pause history.
pub trait GcHistoryReader: Send + 'static {
    /// Returns a fresh snapshot. May block for a bounded time.
    fn read_snapshot(&self) -> GcSnapshot;
}

impl<R: GcHistoryReader + Sync + ?Sized> GcHistoryReader for Arc<R> {
    fn read_snapshot(&self) -> GcSnapshot {
        (**self).read_snapshot()
    }
}

impl GcHistoryReader for &'static GcHistory {
    fn read_snapshot(&self) -> GcSnapshot {
        (**self).read_snapshot()
    }
}

/// A ring buffer of collection pauses that a collector records into.
///
/// Embedded runtimes, arenas and other collecting allocators call
/// [`record_pause`](Self::record_pause) after every pass. The buffer keeps
/// the last [`GC_PAUSE_HISTORY`] pauses and overwrites the oldest one when
/// full; counters keep growing.
#[derive(Debug)]
pub struct GcHistory {
    inner: Mutex<HistoryInner>,
}

#[derive(Debug, Default)]
struct HistoryInner {
    num_gc: u64,
    pause_total: Duration,
    // most recent first
    pauses: VecDeque<GcPause>,
}

impl GcHistory {
    /// Creates an empty history.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HistoryInner {
                pauses: VecDeque::with_capacity(GC_PAUSE_HISTORY),
                ..Default::default()
            }),
        }
    }

    /// The process-wide history.
    pub fn global() -> &'static GcHistory {
        static GLOBAL: OnceLock<GcHistory> = OnceLock::new();
        GLOBAL.get_or_init(GcHistory::new)
    }

    /// Records one finished pass.
    pub fn record_pause(&self, duration: Duration, end: SystemTime) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.num_gc = inner.num_gc.wrapping_add(1);
        inner.pause_total = inner.pause_total.saturating_add(duration);
        inner.pauses.push_front(GcPause { duration, end });
        inner.pauses.truncate(GC_PAUSE_HISTORY);
    }

    /// Number of passes recorded so far.
    pub fn num_gc(&self) -> u64 {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .num_gc
    }

    /// Copies the current state.
    pub fn read_snapshot(&self) -> GcSnapshot {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        GcSnapshot {
            num_gc: inner.num_gc,
            pause_total: inner.pause_total,
            last_gc: inner.pauses.front().map(|p| p.end),
            pauses: inner.pauses.iter().map(|p| p.duration).collect(),
            pause_ends: inner.pauses.iter().map(|p| p.end).collect(),
        }
    }
}

impl Default for GcHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl GcHistoryReader for GcHistory {
    fn read_snapshot(&self) -> GcSnapshot {
        GcHistory::read_snapshot(self)
    }
}
