//! Availability probe against a mocked embed host.

use std::sync::Arc;
use std::time::Duration;

use medley_search::{AvailabilityProbe, ProbeCache, StreamingProvider};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn probe() -> AvailabilityProbe {
    AvailabilityProbe::new(reqwest::Client::new(), Duration::from_millis(300), Arc::new(ProbeCache::new()))
}

async fn host_answering(route: &str, status: u16) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status))
        .mount(&server)
        .await;
    server
}

fn provider(name: &str, url: String, tier: u8) -> StreamingProvider {
    StreamingProvider {
        name: name.to_string(),
        url,
        tier,
        priority: 0,
        quality: "auto".to_string(),
        language: "multi".to_string(),
        available: true,
    }
}

#[tokio::test]
async fn test_status_codes_map_to_availability() {
    let server = MockServer::start().await;
    for (route, status) in [("/ok", 200), ("/moved", 302), ("/gone", 404), ("/removed", 410), ("/blocked", 403)] {
        Mock::given(method("HEAD"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(status))
            .mount(&server)
            .await;
    }
    let probe = probe();
    let url = |route: &str| format!("{}{route}", server.uri());

    assert!(probe.is_likely_available(&url("/ok")).await);
    assert!(probe.is_likely_available(&url("/moved")).await);
    assert!(!probe.is_likely_available(&url("/gone")).await);
    assert!(!probe.is_likely_available(&url("/removed")).await);
    assert!(probe.is_likely_available(&url("/blocked")).await);
}

#[tokio::test]
async fn test_method_not_allowed_counts_as_available() {
    let server = host_answering("/embed/1", 405).await;
    assert!(probe().is_likely_available(&format!("{}/embed/1", server.uri())).await);
}

#[tokio::test]
async fn test_slow_host_counts_as_available() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(404).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    assert!(probe().is_likely_available(&format!("{}/slow", server.uri())).await);
}

#[tokio::test]
async fn test_results_are_cached_per_url() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/embed/2"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    let probe = probe();
    let url = format!("{}/embed/2", server.uri());

    assert!(!probe.is_likely_available(&url).await);
    assert!(!probe.is_likely_available(&url).await);
    assert_eq!(probe.cache().get(&url), Some(false));
    assert_eq!(probe.cache().len(), 1);
}

#[tokio::test]
async fn test_annotate_keeps_order() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/dead"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/live"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let mut providers = vec![
        provider("first", format!("{}/dead", server.uri()), 1),
        provider("second", format!("{}/live", server.uri()), 2),
        provider("third", "not a url".to_string(), 3),
    ];
    probe().annotate(&mut providers).await;

    let observed: Vec<_> = providers.iter().map(|p| (p.name.as_str(), p.available)).collect();
    assert_eq!(observed, [("first", false), ("second", true), ("third", false)]);
}
