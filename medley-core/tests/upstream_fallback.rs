//! Integration tests for host fallback, time budgets and offline stubs.

use std::sync::Arc;
use std::time::Duration;

use medley_core::config::{SourceEndpoints, UpstreamConfig};
use medley_core::upstream::{
    Endpoint, FailureKind, FetchOptions, OfflineStub, PayloadOrigin, UpstreamClient, UpstreamError,
};
use medley_core::{CancellationToken, RuntimeMode};
use serde_json::{Value, json};
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug)]
struct SearchStub;

impl OfflineStub for SearchStub {
    fn payload(&self, endpoint: &Endpoint) -> Value {
        json!({ "results": [{ "id": 1, "title": format!("stub for {}", endpoint.path()) }] })
    }
}

fn short_budgets() -> UpstreamConfig {
    UpstreamConfig {
        request_timeout: Duration::from_millis(300),
        fallback_timeout: Duration::from_millis(300),
        ..Default::default()
    }
}

fn client_for(hosts: &[&MockServer], mode: RuntimeMode) -> UpstreamClient {
    let endpoints = SourceEndpoints::new(hosts[0].uri())
        .with_fallbacks(hosts[1..].iter().map(|server| server.uri()));

    UpstreamClient::builder("catalog", &endpoints)
        .upstream_config(&short_budgets())
        .mode(mode)
        .offline_stub(Arc::new(SearchStub))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_primary_success_is_not_marked_fallback() {
    let primary = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/multi"))
        .and(query_param("query", "dune"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": [] })))
        .expect(1)
        .mount(&primary)
        .await;

    let client = client_for(&[&primary], RuntimeMode::Production);
    let endpoint = Endpoint::new("/search/multi").query("query", "dune");

    let payload = assert_ok!(client.fetch(&endpoint, &FetchOptions::default()).await);
    assert_eq!(payload.origin, PayloadOrigin::Primary);
}

#[tokio::test]
async fn test_http_error_falls_through_to_next_host() {
    let primary = MockServer::start().await;
    let backup = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&primary)
        .await;
    Mock::given(method("GET"))
        .and(path("/trending/movie/week"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": [{ "id": 7 }] })))
        .mount(&backup)
        .await;

    let client = client_for(&[&primary, &backup], RuntimeMode::Production);
    let payload = client
        .fetch(&Endpoint::new("/trending/movie/week"), &FetchOptions::default())
        .await
        .unwrap();

    assert_eq!(payload.value["results"][0]["id"], 7);
    assert_eq!(
        payload.origin,
        PayloadOrigin::Fallback {
            host: backup.uri()
        }
    );
}

#[tokio::test]
async fn test_slow_primary_times_out_and_fallback_answers() {
    let primary = MockServer::start().await;
    let backup = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "results": [{ "id": "late" }] }))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&primary)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": [{ "id": "fast" }] })))
        .mount(&backup)
        .await;

    let client = client_for(&[&primary, &backup], RuntimeMode::Production);
    let payload = client
        .fetch(&Endpoint::new("/search/multi"), &FetchOptions::default())
        .await
        .unwrap();

    assert_eq!(payload.value["results"][0]["id"], "fast");
}

#[tokio::test]
async fn test_non_json_content_type_triggers_fallback() {
    let primary = MockServer::start().await;
    let backup = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>captcha</html>"))
        .mount(&primary)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .mount(&backup)
        .await;

    let client = client_for(&[&primary, &backup], RuntimeMode::Production);
    let payload = client
        .fetch(&Endpoint::new("/recent"), &FetchOptions::default())
        .await
        .unwrap();

    assert_eq!(payload.value, json!({ "data": [] }));
}

#[tokio::test]
async fn test_production_exhaustion_reports_every_host() {
    let primary = MockServer::start().await;
    let backup = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&primary)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&backup)
        .await;

    let client = client_for(&[&primary, &backup], RuntimeMode::Production);
    let error = assert_err!(
        client
            .fetch(&Endpoint::new("/movie/42"), &FetchOptions::default())
            .await
    );

    match error {
        UpstreamError::Exhausted { failures, path, .. } => {
            assert_eq!(path, "/movie/42");
            assert_eq!(failures.len(), 2);
            assert_eq!(failures[0].kind, FailureKind::Http { status: 500 });
            assert_eq!(failures[1].kind, FailureKind::Http { status: 404 });
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_development_exhaustion_serves_offline_stub() {
    let primary = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&primary)
        .await;

    let client = client_for(&[&primary], RuntimeMode::Development);
    let payload = client
        .fetch(&Endpoint::new("/search/multi"), &FetchOptions::default())
        .await
        .unwrap();

    assert!(payload.is_stub());
    assert_eq!(payload.value["results"][0]["title"], "stub for /search/multi");
}

#[tokio::test]
async fn test_cancellation_stops_attempt_loop() {
    let primary = MockServer::start().await;
    let backup = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})).set_delay(Duration::from_secs(5)))
        .mount(&primary)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&backup)
        .await;

    let endpoints = SourceEndpoints::new(primary.uri()).with_fallbacks([backup.uri()]);
    let client = UpstreamClient::builder("anime-primary", &endpoints)
        .upstream_config(&UpstreamConfig {
            request_timeout: Duration::from_secs(10),
            ..Default::default()
        })
        .mode(RuntimeMode::Development)
        .offline_stub(Arc::new(SearchStub))
        .build()
        .unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let error = client
        .fetch(&Endpoint::new("/search"), &FetchOptions::with_cancel(cancel))
        .await
        .unwrap_err();

    assert!(error.was_cancelled());
}

#[tokio::test]
async fn test_api_key_is_sent_to_every_host() {
    let primary = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("api_key", "abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "genres": [] })))
        .expect(1)
        .mount(&primary)
        .await;

    let endpoints = SourceEndpoints::new(primary.uri()).with_api_key("abc");
    let client = UpstreamClient::builder("catalog", &endpoints)
        .api_key_param("api_key")
        .build()
        .unwrap();

    assert_ok!(
        client
            .fetch(&Endpoint::new("/genre/movie/list"), &FetchOptions::default())
            .await
    );
}
