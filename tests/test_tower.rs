#![cfg(feature = "tower")]

use std::convert::Infallible;
use std::time::Duration;

use http::{Request, Response, StatusCode};
use runstats::http::{MetricsLayer, TransportOptions};
use runstats::CollectingSink;
use tower::{ServiceBuilder, ServiceExt};

#[tokio::test]
async fn test_tower_response() {
    let sink = CollectingSink::new();
    let service = ServiceBuilder::new()
        .layer(MetricsLayer::new(sink.clone()))
        .service_fn(|_req: Request<()>| async {
            Ok::<_, Infallible>(
                Response::builder()
                    .status(StatusCode::NOT_FOUND)
                    .body(())
                    .unwrap(),
            )
        });

    let request = Request::post("/users").body(()).unwrap();
    let response = service.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let events = sink.fetch_and_clear_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].name, "http.client.request.duration");
    assert_eq!(events[0].tag("bucket"), Some("4xx"));
    assert_eq!(events[0].tag("error"), Some("false"));
    assert_eq!(events[0].tag("method"), Some("POST"));
}

#[tokio::test]
async fn test_tower_error() {
    let sink = CollectingSink::new();
    let service = ServiceBuilder::new()
        .layer(
            MetricsLayer::new(sink.clone())
                .with_options(TransportOptions::new().with_metric_name("upstream.request")),
        )
        .service_fn(|_req: Request<()>| async {
            Err::<Response<()>, _>("connection refused".to_owned())
        });

    let result = service.oneshot(Request::new(())).await;
    assert_eq!(result.unwrap_err(), "connection refused");

    let events = sink.fetch_and_clear_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].name, "upstream.request");
    assert_eq!(events[0].tag("bucket"), Some(""));
    assert_eq!(events[0].tag("error"), Some("true"));
}

#[tokio::test]
async fn test_tower_cancelled_request() {
    let sink = CollectingSink::new();
    let service = ServiceBuilder::new()
        .timeout(Duration::from_millis(10))
        .layer(MetricsLayer::new(sink.clone()))
        .service_fn(|_req: Request<()>| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, Infallible>(Response::new(()))
        });

    let result = service.oneshot(Request::new(())).await;
    assert!(result.is_err());

    let events = sink.fetch_and_clear_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].tag("bucket"), Some(""));
    assert_eq!(events[0].tag("error"), Some("true"));
}
