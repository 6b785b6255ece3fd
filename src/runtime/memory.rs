//! Live memory counters.

use std::io;
use std::sync::Arc;

/// Memory counters of the running process.
///
/// Every counter is optional; readers fill in what their platform or
/// allocator exposes and only those are reported.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemoryStats {
    /// Resident set size in bytes.
    pub rss_bytes: Option<u64>,
    /// Virtual memory size in bytes.
    pub virtual_bytes: Option<u64>,
    /// Bytes currently allocated on the heap.
    pub heap_alloc_bytes: Option<u64>,
    /// Bytes in physically resident heap pages.
    pub heap_resident_bytes: Option<u64>,
    /// Bytes allocated since the process started.
    pub total_alloc_bytes: Option<u64>,
    /// Number of live heap objects.
    pub heap_objects: Option<u64>,
}

/// Reads live memory counters.
pub trait MemoryStatsReader: Send + 'static {
    /// Reads the current counters.
    fn read_memory_stats(&self) -> io::Result<MemoryStats>;
}

impl<R: MemoryStatsReader + Sync + ?Sized> MemoryStatsReader for Arc<R> {
    fn read_memory_stats(&self) -> io::Result<MemoryStats> {
        (**self).read_memory_stats()
    }
}

/// Reads memory counters of the current process from the operating system.
///
/// Counters collected:
/// - `rss_bytes` and `virtual_bytes` from `/proc/self/statm` (Linux)
/// - `heap_alloc_bytes` and `heap_resident_bytes` from jemalloc (with the
///   `jemalloc` feature)
///
/// Without the `jemalloc` feature no heap counter is reported.
/// `total_alloc_bytes` and `heap_objects` are never filled in here: the
/// system and jemalloc allocators do not track them. Supply a custom
/// [`MemoryStatsReader`] backed by a counting allocator to report them.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessMemoryReader {
    _private: (),
}

impl ProcessMemoryReader {
    /// Creates a new process memory reader.
    pub fn new() -> Self {
        Self { _private: () }
    }
}

impl MemoryStatsReader for ProcessMemoryReader {
    fn read_memory_stats(&self) -> io::Result<MemoryStats> {
        let mut stats = MemoryStats::default();

        let (size, resident) = read_statm()?;
        stats.virtual_bytes = Some(size);
        stats.rss_bytes = Some(resident);

        #[cfg(all(unix, feature = "jemalloc"))]
        {
            if let Some((allocated, resident)) = read_jemalloc_stats() {
                stats.heap_alloc_bytes = Some(allocated);
                stats.heap_resident_bytes = Some(resident);
            }
        }

        Ok(stats)
    }
}

/// Returns (virtual size, resident size) in bytes.
#[cfg(target_os = "linux")]
fn read_statm() -> io::Result<(u64, u64)> {
    // size resident shared text lib data dt, in pages
    let statm = std::fs::read_to_string("/proc/self/statm")?;
    parse_statm(&statm, page_size())
}

#[cfg(not(target_os = "linux"))]
fn read_statm() -> io::Result<(u64, u64)> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "process memory statistics are not available on this platform",
    ))
}

#[cfg(target_os = "linux")]
fn page_size() -> u64 {
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 {
        size as u64
    } else {
        4096
    }
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_statm(statm: &str, page_size: u64) -> io::Result<(u64, u64)> {
    let invalid = || io::Error::new(io::ErrorKind::InvalidData, "malformed statm");
    let mut parts = statm.split_whitespace();
    let size: u64 = parts
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(invalid)?;
    let resident: u64 = parts
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(invalid)?;
    Ok((size * page_size, resident * page_size))
}

#[cfg(all(unix, feature = "jemalloc"))]
fn read_jemalloc_stats() -> Option<(u64, u64)> {
    use tikv_jemalloc_ctl::{epoch, stats};

    // stats are cached until the epoch advances
    epoch::advance().ok()?;

    let allocated = stats::allocated::read().ok()? as u64;
    let resident = stats::resident::read().ok()? as u64;

    Some((allocated, resident))
}
