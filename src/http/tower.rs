use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use http::{Request, Response};
use tower_layer::Layer;
use tower_service::Service;

use crate::http::transport::Measurement;
use crate::http::TransportOptions;
use crate::MetricSink;

/// Tower Layer that emits one timing event per request.
///
/// This is the asynchronous counterpart of
/// [`InstrumentedTransport`](crate::http::InstrumentedTransport) for
/// tower-based HTTP clients. The measurement ends when the inner future
/// resolves with the response head. A future dropped before that
/// (cancellation, timeout) is reported as failed.
///
/// # Examples
///
/// ```rust
/// use runstats::http::MetricsLayer;
/// use runstats::CollectingSink;
/// use tower::ServiceBuilder;
///
/// let sink = CollectingSink::new();
/// let service = ServiceBuilder::new()
///     .layer(MetricsLayer::new(sink))
///     .service_fn(|_req: http::Request<()>| async {
///         Ok::<_, std::convert::Infallible>(http::Response::new(()))
///     });
/// ```
#[derive(Clone)]
pub struct MetricsLayer {
    sink: Arc<dyn MetricSink>,
    options: Arc<TransportOptions>,
}

impl MetricsLayer {
    /// Creates a new layer reporting to `sink`.
    pub fn new<S: MetricSink>(sink: S) -> Self {
        Self {
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
}

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsService<S>;

    fn layer(&self, service: S) -> Self::Service {
        MetricsService {
            service,
            sink: self.sink.clone(),
            options: self.options.clone(),
        }
    }
}

/// Tower Service that emits one timing event per request.
#[derive(Clone)]
pub struct MetricsService<S> {
    service: S,
    sink: Arc<dyn MetricSink>,
    options: Arc<TransportOptions>,
}

/// The Future returned from [`MetricsService`].
#[pin_project::pin_project]
pub struct MetricsFuture<F> {
    measurement: Option<Measurement>,
    #[pin]
    future: F,
}

impl<F, ResBody, Error> Future for MetricsFuture<F>
where
    F: Future<Output = Result<Response<ResBody>, Error>>,
{
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let slf = self.project();
        match slf.future.poll(cx) {
            Poll::Ready(res) => {
                if let Some(mut measurement) = slf.measurement.take() {
                    if let Ok(response) = &res {
                        measurement.response(response.status());
                    }
                }
                Poll::Ready(res)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for MetricsService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = MetricsFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        let measurement = Measurement::start(
            self.sink.clone(),
            self.options.clone(),
            request.method().clone(),
        );

        MetricsFuture {
            measurement: Some(measurement),
            future: self.service.call(request),
        }
    }
}
