//! HTTP client instrumentation.
//!
//! [`InstrumentedTransport`] decorates any blocking [`RoundTrip`]
//! transport, [`MetricsLayer`] any tower HTTP client service. Both emit
//! exactly one event per request, tagged with the status class of the
//! response (`bucket`) and whether the request failed (`error`).
//!
//! **Feature:** `ureq` (*enabled by default*) provides [`UreqTransport`],
//! the default transport. **Feature:** `tower` (*enabled by default*)
//! provides [`MetricsLayer`].

mod bucket;
mod transport;

#[cfg(feature = "tower")]
mod tower;
#[cfg(feature = "tower")]
pub use self::tower::{MetricsFuture, MetricsLayer, MetricsService};

#[cfg(feature = "ureq")]
mod ureq;
#[cfg(feature = "ureq")]
pub use self::ureq::UreqTransport;

pub use bucket::status_bucket;
pub use transport::{
    default_transport, Body, InstrumentedTransport, Request, RequestOutcome, Response, RoundTrip,
    TransportOptions,
};
