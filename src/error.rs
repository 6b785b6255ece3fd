use std::io;

use thiserror::Error;

/// An error produced by an HTTP transport before a response was available.
///
/// Instrumentation never creates or rewrites these; whatever the wrapped
/// transport returns is handed back to the caller unchanged.
#[derive(Debug, Error)]
pub enum TransportError {
    /// An I/O error on the underlying connection.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    /// A transport specific failure (connect, TLS, protocol, timeout).
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
    /// The response received could not be represented.
    #[error("invalid response: {0}")]
    InvalidResponse(#[from] http::Error),
    /// No http transport was compiled into the library.
    #[error("no http transport available")]
    Unavailable,
}

/// An error aborting a runtime metrics collection cycle.
///
/// Returned before any event of the cycle has been emitted.
#[derive(Debug, Error)]
pub enum CollectError {
    /// Memory counters could not be read.
    #[error("failed to read memory statistics")]
    MemoryStats(#[source] io::Error),
}
