//! Blocking request transports and their instrumentation.

use std::fmt;
use std::io::{self, Read};
use std::sync::Arc;
use std::time::{Duration, Instant};

use http::{Method, StatusCode};

use crate::http::status_bucket;
use crate::{MetricEvent, MetricSink, TagMap, TransportError};

/// A request handed to a [`RoundTrip`] transport.
pub type Request = http::Request<Vec<u8>>;

/// A response returned by a [`RoundTrip`] transport.
pub type Response = http::Response<Body>;

/// A streaming response body.
pub struct Body {
    reader: Box<dyn Read + Send + 'static>,
}

impl Body {
    /// Wraps a reader producing the body bytes.
    pub fn new<R: Read + Send + 'static>(reader: R) -> Self {
        Self {
            reader: Box::new(reader),
        }
    }

    /// A body without any bytes.
    pub fn empty() -> Self {
        Self::new(io::empty())
    }

    /// Reads the remaining body into a byte vector.
    pub fn into_bytes(mut self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Reads the remaining body into a string.
    pub fn into_string(mut self) -> io::Result<String> {
        let mut buf = String::new();
        self.read_to_string(&mut buf)?;
        Ok(buf)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(io::Cursor::new(bytes))
    }
}

impl From<&'static str> for Body {
    fn from(s: &'static str) -> Self {
        Self::new(s.as_bytes())
    }
}

impl Read for Body {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Body").finish_non_exhaustive()
    }
}

/// Executes HTTP requests.
///
/// Implementations are synchronous: they block until the response head was
/// received or the request failed. HTTP error statuses are responses, only
/// failures to obtain a response at all are errors.
pub trait RoundTrip: Send + Sync + 'static {
    /// Sends `request` and returns the response.
    fn round_trip(&self, request: Request) -> Result<Response, TransportError>;
}

impl<T: RoundTrip + ?Sized> RoundTrip for Arc<T> {
    fn round_trip(&self, request: Request) -> Result<Response, TransportError> {
        (**self).round_trip(request)
    }
}

impl<T: RoundTrip + ?Sized> RoundTrip for Box<T> {
    fn round_trip(&self, request: Request) -> Result<Response, TransportError> {
        (**self).round_trip(request)
    }
}

/// Returns the platform default transport.
///
/// This is the process-wide [`UreqTransport`](crate::http::UreqTransport)
/// when the `ureq` feature is enabled. Without a compiled-in transport every
/// request fails with [`TransportError::Unavailable`].
pub fn default_transport() -> Arc<dyn RoundTrip> {
    #[cfg(feature = "ureq")]
    {
        crate::http::UreqTransport::shared()
    }
    #[cfg(not(feature = "ureq"))]
    {
        Arc::new(UnavailableTransport)
    }
}

#[cfg(not(feature = "ureq"))]
struct UnavailableTransport;

#[cfg(not(feature = "ureq"))]
impl RoundTrip for UnavailableTransport {
    fn round_trip(&self, _request: Request) -> Result<Response, TransportError> {
        Err(TransportError::Unavailable)
    }
}

/// Options for the request metric.
#[derive(Clone, Debug)]
pub struct TransportOptions {
    /// Name of the per-request timer.
    ///
    /// Default: `"http.client.request.duration"`
    pub metric_name: String,

    /// Tags added to every request event.
    pub tags: TagMap,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            metric_name: "http.client.request.duration".into(),
            tags: TagMap::new(),
        }
    }
}

impl TransportOptions {
    /// Creates options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the metric name.
    #[must_use]
    pub fn with_metric_name(mut self, name: impl Into<String>) -> Self {
        self.metric_name = name.into();
        self
    }

    /// Adds a constant tag.
    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

/// How a single request ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RequestOutcome {
    /// Time from handing the request to the transport until the outcome was
    /// known.
    pub elapsed: Duration,
    /// The response status, if a response was received.
    pub status: Option<StatusCode>,
    /// The transport failed to produce a response (or the request was
    /// abandoned before it did).
    pub failed: bool,
    /// Reading the response body failed.
    pub body_error: bool,
}

impl RequestOutcome {
    /// The status class of the response, empty without a response.
    pub fn status_bucket(&self) -> &'static str {
        self.status.map_or("", status_bucket)
    }

    /// Returns true if the request or its body failed.
    pub fn is_error(&self) -> bool {
        self.failed || self.body_error
    }

    fn to_event(self, options: &TransportOptions, method: &Method) -> MetricEvent {
        MetricEvent::timer(options.metric_name.as_str(), self.elapsed)
            .with_tags(options.tags.clone())
            .with_tag("bucket", self.status_bucket())
            .with_tag("error", if self.is_error() { "true" } else { "false" })
            .with_tag("method", method.as_str())
    }
}

/// Times one request and emits its event when dropped.
///
/// A measurement starts out failed; only a received response clears that.
/// Emitting from `Drop` makes every path, including errors, panics and
/// cancellation, report exactly once.
pub(crate) struct Measurement {
    sink: Arc<dyn MetricSink>,
    options: Arc<TransportOptions>,
    method: Method,
    start: Instant,
    status: Option<StatusCode>,
    failed: bool,
    body_error: bool,
}

impl Measurement {
    pub(crate) fn start(
        sink: Arc<dyn MetricSink>,
        options: Arc<TransportOptions>,
        method: Method,
    ) -> Self {
        Self {
            sink,
            options,
            method,
            start: Instant::now(),
            status: None,
            failed: true,
            body_error: false,
        }
    }

    pub(crate) fn response(&mut self, status: StatusCode) {
        self.status = Some(status);
        self.failed = false;
    }

    pub(crate) fn body_error(&mut self) {
        self.body_error = true;
    }

    fn outcome(&self) -> RequestOutcome {
        RequestOutcome {
            elapsed: self.start.elapsed(),
            status: self.status,
            failed: self.failed,
            body_error: self.body_error,
        }
    }
}

impl Drop for Measurement {
    fn drop(&mut self) {
        let event = self.outcome().to_event(&self.options, &self.method);
        self.sink.emit(event);
    }
}

/// A response body that finishes the request measurement.
///
/// The measurement ends at end of body, on the first read error, or when the
/// body is dropped, whichever happens first.
struct InstrumentedBody {
    body: Body,
    measurement: Option<Measurement>,
}

impl Read for InstrumentedBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let result = self.body.read(buf);
        match &result {
            Ok(0) if !buf.is_empty() => {
                self.measurement.take();
            }
            Ok(_) => {}
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(_) => {
                if let Some(mut measurement) = self.measurement.take() {
                    measurement.body_error();
                }
            }
        }
        result
    }
}

/// A transport decorator emitting one timing event per request.
///
/// Requests and responses pass through unchanged. The event is named after
/// [`TransportOptions::metric_name`] and tagged with:
/// - `bucket`: `"1xx"` to `"5xx"`, or `""` when no response was received
/// - `error`: `"true"` if the transport failed or the body could not be read
/// - `method`: the request method
///
/// The measurement covers the whole exchange: it ends once the caller has
/// read the response body to the end, failed reading it, or dropped it.
///
/// # Examples
///
/// ```rust,no_run
/// use runstats::http::{InstrumentedTransport, RoundTrip};
/// use runstats::LogSink;
///
/// let transport = InstrumentedTransport::new(LogSink::new(), None);
/// let request = http::Request::get("http://localhost:8080/").body(Vec::new()).unwrap();
/// let body = transport.round_trip(request)?.into_body().into_string()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Clone)]
pub struct InstrumentedTransport {
    inner: Arc<dyn RoundTrip>,
    sink: Arc<dyn MetricSink>,
    options: Arc<TransportOptions>,
}

impl InstrumentedTransport {
    /// Wraps `transport`, or the [`default_transport`] if `None`.
    pub fn new<S: MetricSink>(sink: S, transport: Option<Arc<dyn RoundTrip>>) -> Self {
        Self {
            inner: transport.unwrap_or_else(default_transport),
            sink: Arc::new(sink),
            options: Arc::new(TransportOptions::default()),
        }
    }

    /// Sets the metric options.
    #[must_use]
    pub fn with_options(mut self, options: TransportOptions) -> Self {
        self.options = Arc::new(options);
        self
    }

    /// The wrapped transport.
    pub fn inner(&self) -> &Arc<dyn RoundTrip> {
        &self.inner
    }
}

impl RoundTrip for InstrumentedTransport {
    fn round_trip(&self, request: Request) -> Result<Response, TransportError> {
        let mut measurement = Measurement::start(
            self.sink.clone(),
            self.options.clone(),
            request.method().clone(),
        );

        let response = self.inner.round_trip(request)?;
        measurement.response(response.status());

        Ok(response.map(|body| {
            Body::new(InstrumentedBody {
                body,
                measurement: Some(measurement),
            })
        }))
    }
}

impl fmt::Debug for InstrumentedTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstrumentedTransport")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
