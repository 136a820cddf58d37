// tests/http_retry.rs
//
// Bounded retry on rate limiting; other failures are returned at once.

use std::time::Duration;

use fitness_discovery::ingest::http::{FetchError, HttpClient, RetryPolicy};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(max_retries: u32) -> HttpClient {
    let retry = RetryPolicy {
        max_retries,
        base_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(50),
    };
    HttpClient::new(Duration::from_secs(5), retry).expect("http client")
}

#[tokio::test]
async fn rate_limit_then_success_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "hyrox"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"items": [1, 2]}"#))
        .expect(1)
        .mount(&server)
        .await;

    let v = client(3)
        .get_json(&format!("{}/search", server.uri()), &[("q", "hyrox".to_string())], &[])
        .await
        .expect("second attempt succeeds");
    assert_eq!(v["items"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn retry_budget_is_bounded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
        .expect(3)
        .mount(&server)
        .await;

    let err = client(2)
        .get_text(&server.uri(), &[], &[])
        .await
        .expect_err("budget exhausted");
    assert!(matches!(err, FetchError::RateLimited { attempts: 3 }), "got {err:?}");
}

#[tokio::test]
async fn auth_and_not_found_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/private"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let http = client(3);
    let err = http.get_text(&format!("{}/private", server.uri()), &[], &[]).await.unwrap_err();
    assert!(matches!(err, FetchError::Auth { status: 403 }));
    let err = http.get_text(&format!("{}/gone", server.uri()), &[], &[]).await.unwrap_err();
    assert!(matches!(err, FetchError::NotFound(_)));
}

#[tokio::test]
async fn non_json_body_is_a_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let err = client(0).get_json(&server.uri(), &[], &[]).await.unwrap_err();
    assert!(matches!(err, FetchError::Parse(_)));
}
