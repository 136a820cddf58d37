// tests/metrics.rs
//
// The Prometheus endpoint renders discovery series once something is recorded.

use axum::body::{self, Body};
use http::{Request, StatusCode};
use tower::ServiceExt as _;

use fitness_discovery::metrics::Metrics;

#[tokio::test]
async fn metrics_endpoint_exposes_discovery_counters() {
    let _first = Metrics::init().expect("recorder");
    // Idempotent: a second init reuses the installed recorder.
    let again = Metrics::init().expect("second init");

    metrics::counter!("discovery_source_errors_total", "platform" => "article").increment(2);

    let req = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let resp = again.router().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body::to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    let text = String::from_utf8_lossy(&bytes);
    assert!(text.contains("discovery_source_errors_total"), "{text}");
    assert!(text.contains(r#"platform="article""#));
}
