use std::sync::{Arc, OnceLock};

use http::header::{HeaderMap, HeaderName};
use http::Method;
use ureq::{Agent, AgentBuilder};

use crate::http::{Body, Request, Response, RoundTrip};
use crate::TransportError;

/// A [`RoundTrip`] transport that sends requests via the [`ureq`] library.
///
/// This is enabled by the `ureq` feature flag and is the default transport
/// of [`InstrumentedTransport`](crate::http::InstrumentedTransport).
#[derive(Clone, Debug)]
pub struct UreqTransport {
    agent: Agent,
}

impl UreqTransport {
    /// Creates a transport with its own connection pool.
    pub fn new() -> Self {
        Self::with_agent(AgentBuilder::new().build())
    }

    /// Creates a transport that uses the specified [`ureq::Agent`].
    pub fn with_agent(agent: Agent) -> Self {
        Self { agent }
    }

    /// The process-wide shared transport.
    pub fn shared() -> Arc<UreqTransport> {
        static SHARED: OnceLock<Arc<UreqTransport>> = OnceLock::new();
        SHARED.get_or_init(|| Arc::new(UreqTransport::new())).clone()
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl RoundTrip for UreqTransport {
    fn round_trip(&self, request: Request) -> Result<Response, TransportError> {
        let (parts, body) = request.into_parts();

        let mut req = self
            .agent
            .request(parts.method.as_str(), &parts.uri.to_string());
        for name in parts.headers.keys() {
            match joined_values(&parts.headers, name) {
                Some(value) => req = req.set(name.as_str(), &value),
                None => stats_debug!("skipping non-ascii header {}", name),
            }
        }

        let sends_body =
            !body.is_empty() || matches!(parts.method, Method::POST | Method::PUT | Method::PATCH);
        let result = if sends_body {
            req.send_bytes(&body)
        } else {
            req.call()
        };

        let response = match result {
            Ok(response) => response,
            // statuses >= 400 are still responses
            Err(ureq::Error::Status(_, response)) => response,
            Err(ureq::Error::Transport(err)) => {
                return Err(TransportError::Transport(Box::new(err)))
            }
        };

        into_http_response(response)
    }
}

/// Folds all values of `name` into one comma separated value.
///
/// `ureq` replaces earlier values on `set` for every header not prefixed
/// with `x-`.
fn joined_values(headers: &HeaderMap, name: &HeaderName) -> Option<String> {
    let values = headers
        .get_all(name)
        .iter()
        .map(|value| value.to_str().ok())
        .collect::<Option<Vec<_>>>()?;
    Some(values.join(", "))
}

fn into_http_response(response: ureq::Response) -> Result<Response, TransportError> {
    let mut builder = http::Response::builder().status(response.status());
    for name in response.headers_names() {
        for value in response.all(&name) {
            builder = builder.header(name.as_str(), value);
        }
    }
    Ok(builder.body(Body::new(response.into_reader()))?)
}

#[cfg(test)]
mod tests {
    use http::header::{ACCEPT, COOKIE};
    use http::HeaderValue;

    use super::*;

    #[test]
    fn test_repeated_headers_are_joined() {
        let mut headers = HeaderMap::new();
        headers.append(ACCEPT, HeaderValue::from_static("text/html"));
        headers.append(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(COOKIE, HeaderValue::from_static("session=1"));

        assert_eq!(
            joined_values(&headers, &ACCEPT).as_deref(),
            Some("text/html, application/json")
        );
        assert_eq!(
            joined_values(&headers, &COOKIE).as_deref(),
            Some("session=1")
        );
    }

    #[test]
    fn test_non_ascii_header_is_skipped() {
        let mut headers = HeaderMap::new();
        headers.append(ACCEPT, HeaderValue::from_static("text/html"));
        headers.append(ACCEPT, HeaderValue::from_bytes(b"caf\xe9").unwrap());

        assert_eq!(joined_values(&headers, &ACCEPT), None);
    }
}
