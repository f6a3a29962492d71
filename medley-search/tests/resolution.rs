//! End-to-end resolution against mocked upstreams.

use std::time::Duration;

use medley_core::{CancellationToken, MedleyConfig, RuntimeMode, SourceEndpoints};
use medley_search::types::PLACEHOLDER_COVER;
use medley_search::{MediaKind, MediaRef, ResolutionContext, ResolutionOrchestrator, ResolveError, SourceId};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Nothing listens here, so connections are refused immediately.
const DEAD_HOST: &str = "http://127.0.0.1:1";

fn dead() -> SourceEndpoints {
    SourceEndpoints::new(DEAD_HOST)
}

fn config_with(configure: impl FnOnce(&mut MedleyConfig)) -> MedleyConfig {
    let mut config = MedleyConfig::for_testing();
    config.sources.catalog = dead();
    config.sources.anime_primary = dead();
    config.sources.anime_backup = dead();
    config.sources.hentai_primary = dead();
    config.sources.hentai_backup = dead();
    configure(&mut config);
    config
}

fn orchestrator(config: &MedleyConfig) -> ResolutionOrchestrator {
    ResolutionOrchestrator::new(ResolutionContext::from_config(config).unwrap())
}

#[tokio::test]
async fn test_structured_scraper_item_with_missing_fields() {
    let anime = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("keyword", "x"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "data": [{ "title": "X", "slug": "x" }]
        })))
        .mount(&anime)
        .await;

    let config = config_with(|config| config.sources.anime_primary = SourceEndpoints::new(anime.uri()));
    let items = orchestrator(&config)
        .search("x", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(items.len(), 1);
    let item = &items[0];
    assert_eq!(item.id, "x");
    assert_eq!(item.title, "X");
    assert_eq!(item.source, SourceId::AnimePrimary);
    assert_eq!(item.kind, MediaKind::Anime);
    assert_eq!(item.rating, 0.0);
    assert_eq!(item.cover, PLACEHOLDER_COVER);
    assert!(item.genre.is_empty());
}

#[tokio::test]
async fn test_soft_failure_status_is_empty_not_error() {
    let anime = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "error", "message": "rate limited" })))
        .mount(&anime)
        .await;

    let config = config_with(|config| config.sources.anime_primary = SourceEndpoints::new(anime.uri()));
    let page = orchestrator(&config)
        .search_kind(MediaKind::Anime, "x", 1, &CancellationToken::new())
        .await
        .unwrap();

    assert!(page.data.is_empty());
}

#[tokio::test]
async fn test_slow_primary_host_falls_back_to_mirror() {
    let slow = MockServer::start().await;
    let mirror = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "status": "success", "data": { "id": "frieren", "title": "Slow" } }))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&slow)
        .await;
    Mock::given(method("GET"))
        .and(path("/anime/frieren"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "data": { "anime": { "id": "frieren", "title": "Frieren", "rating": "8.9" } }
        })))
        .expect(1)
        .mount(&mirror)
        .await;

    let config = config_with(|config| {
        config.sources.anime_primary = SourceEndpoints::new(slow.uri()).with_fallbacks([mirror.uri()]);
    });
    let media = MediaRef::new(SourceId::AnimePrimary, MediaKind::Anime, "frieren");
    let item = orchestrator(&config)
        .resolve_media(&media, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(item.title, "Frieren");
    assert_eq!(item.source, SourceId::AnimePrimary);
}

#[tokio::test]
async fn test_hanging_primary_hosts_leave_branch_time_for_backup() {
    let primary = MockServer::start().await;
    let mirror = MockServer::start().await;
    for host in [&primary, &mirror] {
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "status": "success", "data": [{ "id": "late" }] }))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(host)
            .await;
    }
    let backup = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": "b" }])))
        .expect(1)
        .mount(&backup)
        .await;

    let config = config_with(|config| {
        config.upstream.request_timeout = Duration::from_millis(1200);
        config.upstream.fallback_timeout = Duration::from_millis(1000);
        config.orchestrator.branch_timeout = Duration::from_secs(2);
        config.sources.anime_primary = SourceEndpoints::new(primary.uri()).with_fallbacks([mirror.uri()]);
        config.sources.anime_backup = SourceEndpoints::new(backup.uri());
    });
    let items = orchestrator(&config)
        .search("x", &CancellationToken::new())
        .await
        .unwrap();

    let ids: Vec<_> = items.iter().map(|item| item.id.as_str()).collect();
    assert_eq!(ids, ["b"]);
    assert_eq!(items[0].source, SourceId::AnimeBackup);
}

#[tokio::test]
async fn test_unreachable_sources_exhaust_in_production() {
    let config = config_with(|_| {});
    let media = MediaRef::new(SourceId::AnimePrimary, MediaKind::Anime, "frieren");

    match orchestrator(&config)
        .resolve_media(&media, &CancellationToken::new())
        .await
    {
        Err(ResolveError::ExhaustedFallbacks { sources, .. }) => {
            assert_eq!(sources, [SourceId::AnimePrimary, SourceId::AnimeBackup]);
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[tokio::test]
async fn test_unreachable_sources_use_stub_in_development() {
    let config = config_with(|config| config.mode = RuntimeMode::Development);
    let media = MediaRef::new(SourceId::AnimePrimary, MediaKind::Anime, "frieren");

    let item = orchestrator(&config)
        .resolve_media(&media, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(item.id, "frieren");
    assert_eq!(item.source, SourceId::AnimePrimary);
}

#[tokio::test]
async fn test_search_keeps_healthy_branches_when_one_fails() {
    let catalog = MockServer::start().await;
    let hentai = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/multi"))
        .and(query_param("query", "dune"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "page": 1,
            "total_pages": 1,
            "total_results": 2,
            "results": [
                { "id": 438631, "media_type": "movie", "title": "Dune", "release_date": "2021-09-15", "vote_average": 7.8 },
                { "id": 1, "media_type": "person", "name": "Someone" }
            ]
        })))
        .mount(&catalog)
        .await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&hentai)
        .await;

    let config = config_with(|config| {
        config.sources.catalog = SourceEndpoints::new(catalog.uri());
        config.sources.hentai_primary = SourceEndpoints::new(hentai.uri());
    });
    let items = orchestrator(&config)
        .search("dune", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, "438631");
    assert_eq!(items[0].kind, MediaKind::Movie);
    assert_eq!(items[0].year, 2021);
}

#[tokio::test]
async fn test_series_episodes_span_seasons_in_order() {
    let catalog = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tv/1396"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 1396,
            "name": "Breaking Bad",
            "seasons": [{ "season_number": 2 }, { "season_number": 0 }, { "season_number": 1 }]
        })))
        .mount(&catalog)
        .await;
    for season in [1, 2] {
        Mock::given(method("GET"))
            .and(path(format!("/tv/1396/season/{season}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "episodes": [
                    { "episode_number": 2, "season_number": season, "name": format!("S{season}E2") },
                    { "episode_number": 1, "season_number": season, "name": format!("S{season}E1") }
                ]
            })))
            .mount(&catalog)
            .await;
    }

    let config = config_with(|config| config.sources.catalog = SourceEndpoints::new(catalog.uri()));
    let media = MediaRef::new(SourceId::Catalog, MediaKind::Series, "1396");
    let episodes = orchestrator(&config)
        .resolve_episodes(&media, &CancellationToken::new())
        .await
        .unwrap();

    let titles: Vec<_> = episodes.iter().map(|e| e.title.as_str()).collect();
    assert_eq!(titles, ["S1E1", "S1E2", "S2E1", "S2E2"]);
    assert_eq!(episodes[2].stream_ref, "1396/2/1");
}

#[tokio::test]
async fn test_scraper_providers_come_from_first_episode() {
    let anime = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/anime/frieren/episodes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "data": { "episodes": [
                { "id": "frieren-ep-2", "number": 2 },
                { "id": "frieren-ep-1", "number": 1 }
            ] }
        })))
        .mount(&anime)
        .await;
    Mock::given(method("GET"))
        .and(path("/episode/frieren-ep-1/servers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "data": { "servers": [
                { "name": "StreamSB", "url": "https://sb.example/e/1" },
                { "name": "HD-1", "url": "https://hd.example/e/1" }
            ] }
        })))
        .expect(1)
        .mount(&anime)
        .await;

    let config = config_with(|config| config.sources.anime_primary = SourceEndpoints::new(anime.uri()));
    let media = MediaRef::new(SourceId::AnimePrimary, MediaKind::Anime, "frieren");
    let providers = orchestrator(&config)
        .resolve_providers(&media, None, &CancellationToken::new())
        .await
        .unwrap();

    let names: Vec<_> = providers.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["HD-1", "StreamSB"]);
}

#[tokio::test]
async fn test_catalog_providers_cover_every_template() {
    let config = config_with(|_| {});
    let orchestrator = orchestrator(&config);
    let media = MediaRef::new(SourceId::Catalog, MediaKind::Series, "1396");

    let providers = orchestrator
        .resolve_providers(&media, None, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(providers.len(), orchestrator.context().registry().templates().len());
    assert!(providers.iter().all(|p| p.url.contains("1396")));
    assert!(providers.windows(2).all(|w| w[0].rank_key() <= w[1].rank_key()));
}

#[tokio::test]
async fn test_genres_listed_once_and_routed_to_catalog() {
    let catalog = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/genre/movie/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "genres": [{ "id": 28, "name": "Action" }] })))
        .expect(1)
        .mount(&catalog)
        .await;
    Mock::given(method("GET"))
        .and(path("/genre/tv/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "genres": [{ "id": 18, "name": "Drama" }] })))
        .expect(1)
        .mount(&catalog)
        .await;
    Mock::given(method("GET"))
        .and(path("/discover/movie"))
        .and(query_param("with_genres", "28"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "page": 1,
            "total_pages": 3,
            "total_results": 60,
            "results": [{ "id": 603, "title": "The Matrix", "genre_ids": [28] }]
        })))
        .mount(&catalog)
        .await;

    let config = config_with(|config| config.sources.catalog = SourceEndpoints::new(catalog.uri()));
    let orchestrator = orchestrator(&config);

    assert_eq!(orchestrator.list_genres().await, ["Action", "Drama"]);

    let page = orchestrator
        .list_by_genre("ACTION", 1, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(page.data.len(), 1);
    assert_eq!(page.data[0].genre, ["Action"]);
    assert_eq!(page.total_pages, 3);
}
