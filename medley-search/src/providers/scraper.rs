//! Generic adapter for the anime and hentai scraper upstreams.
//!
//! The four scrapers differ only in envelope, field names and routes, so one
//! adapter is parameterized by a static [`ScraperProfile`].

use async_trait::async_trait;
use medley_core::{CancellationToken, Endpoint, FetchOptions, UpstreamClient};
use serde_json::Value;

use super::{GenreFilter, SourceAdapter, route};
use crate::errors::ResolveError;
use crate::normalize::scraper::{self as normalize, Envelope, ScraperShape};
use crate::types::{EpisodeRef, MediaItem, MediaKind, MediaRef, PaginatedResult, ServerEntry, SourceId};

/// Route templates below a scraper's base URL. `{id}` is replaced by a
/// percent-encoded media id, episode stream ref or genre slug.
#[derive(Debug, Clone, Copy)]
pub struct ScraperRoutes {
    pub search: &'static str,
    /// Query parameter carrying the search text
    pub search_param: &'static str,
    pub detail: &'static str,
    pub episodes: &'static str,
    pub servers: &'static str,
    pub genre: &'static str,
    pub recent: &'static str,
}

/// Everything that distinguishes one scraper upstream from another.
#[derive(Debug, Clone, Copy)]
pub struct ScraperProfile {
    pub shape: ScraperShape,
    pub routes: ScraperRoutes,
}

/// Structured anime scraper.
pub const ANIME_PRIMARY: ScraperProfile = ScraperProfile {
    shape: ScraperShape {
        source: SourceId::AnimePrimary,
        kind: MediaKind::Anime,
        envelope: Envelope::Status,
        list_fields: &["animes"],
        episode_fields: &["episodes"],
        server_fields: &["servers", "sources"],
    },
    routes: ScraperRoutes {
        search: "search",
        search_param: "keyword",
        detail: "anime/{id}",
        episodes: "anime/{id}/episodes",
        servers: "episode/{id}/servers",
        genre: "genre/{id}",
        recent: "recent-episodes",
    },
};

/// Unstructured anime scraper.
pub const ANIME_BACKUP: ScraperProfile = ScraperProfile {
    shape: ScraperShape {
        source: SourceId::AnimeBackup,
        kind: MediaKind::Anime,
        envelope: Envelope::Bare,
        list_fields: &["animes", "items"],
        episode_fields: &["episodes", "episodeList"],
        server_fields: &["servers", "links"],
    },
    routes: ScraperRoutes {
        search: "search",
        search_param: "q",
        detail: "info/{id}",
        episodes: "episodes/{id}",
        servers: "watch/{id}",
        genre: "genre/{id}",
        recent: "recent",
    },
};

/// Structured hentai scraper.
pub const HENTAI_PRIMARY: ScraperProfile = ScraperProfile {
    shape: ScraperShape {
        source: SourceId::HentaiPrimary,
        kind: MediaKind::Hentai,
        envelope: Envelope::Status,
        list_fields: &["hentai", "videos"],
        episode_fields: &["episodes"],
        server_fields: &["servers", "sources"],
    },
    routes: ScraperRoutes {
        search: "search",
        search_param: "q",
        detail: "hentai/{id}",
        episodes: "hentai/{id}/episodes",
        servers: "watch/{id}",
        genre: "tags/{id}",
        recent: "recent",
    },
};

/// Unstructured hentai scraper.
pub const HENTAI_BACKUP: ScraperProfile = ScraperProfile {
    shape: ScraperShape {
        source: SourceId::HentaiBackup,
        kind: MediaKind::Hentai,
        envelope: Envelope::Bare,
        list_fields: &["videos", "items"],
        episode_fields: &["episodes", "videos"],
        server_fields: &["streams", "sources"],
    },
    routes: ScraperRoutes {
        search: "search",
        search_param: "query",
        detail: "video/{id}",
        episodes: "video/{id}/episodes",
        servers: "video/{id}/streams",
        genre: "genre/{id}",
        recent: "latest",
    },
};

/// Adapter for one scraper upstream.
#[derive(Debug, Clone)]
pub struct ScraperAdapter {
    profile: ScraperProfile,
    client: UpstreamClient,
}

impl ScraperAdapter {
    pub fn new(profile: ScraperProfile, client: UpstreamClient) -> Self {
        Self { profile, client }
    }

    pub fn profile(&self) -> &ScraperProfile {
        &self.profile
    }

    async fn fetch(&self, endpoint: &Endpoint, cancel: &CancellationToken) -> Result<Value, ResolveError> {
        let payload = self
            .client
            .fetch(endpoint, &FetchOptions::with_cancel(cancel.clone()))
            .await?;
        Ok(payload.into_value())
    }

    async fn page(
        &self,
        endpoint: Endpoint,
        page: u32,
        cancel: &CancellationToken,
    ) -> Result<PaginatedResult<MediaItem>, ResolveError> {
        let payload = self.fetch(&endpoint.query("page", page.max(1)), cancel).await?;
        Ok(normalize::media_page(&self.profile.shape, &payload, page))
    }
}

#[async_trait]
impl SourceAdapter for ScraperAdapter {
    fn id(&self) -> SourceId {
        self.profile.shape.source
    }

    async fn search(
        &self,
        query: &str,
        kind: Option<MediaKind>,
        page: u32,
        cancel: &CancellationToken,
    ) -> Result<PaginatedResult<MediaItem>, ResolveError> {
        if kind.is_some_and(|kind| !self.serves(kind)) {
            return Ok(PaginatedResult::empty(page));
        }
        let routes = &self.profile.routes;
        let endpoint = route(routes.search, "").query(routes.search_param, query);
        self.page(endpoint, page, cancel).await
    }

    async fn detail(&self, media: &MediaRef, cancel: &CancellationToken) -> Result<Option<MediaItem>, ResolveError> {
        let endpoint = route(self.profile.routes.detail, &media.id);
        let payload = match self.fetch(&endpoint, cancel).await {
            Err(e) if e.is_upstream_not_found() => return Ok(None),
            other => other?,
        };
        Ok(normalize::media_detail(&self.profile.shape, &payload, &media.id))
    }

    async fn episodes(&self, media: &MediaRef, cancel: &CancellationToken) -> Result<Vec<EpisodeRef>, ResolveError> {
        let endpoint = route(self.profile.routes.episodes, &media.id);
        let payload = match self.fetch(&endpoint, cancel).await {
            Err(e) if e.is_upstream_not_found() => return Ok(Vec::new()),
            other => other?,
        };
        Ok(normalize::episodes(&self.profile.shape, &payload, &media.id).unwrap_or_default())
    }

    async fn servers(
        &self,
        _media: &MediaRef,
        episode: &EpisodeRef,
        cancel: &CancellationToken,
    ) -> Result<Vec<ServerEntry>, ResolveError> {
        let endpoint = route(self.profile.routes.servers, &episode.stream_ref);
        let payload = self.fetch(&endpoint, cancel).await?;
        Ok(normalize::servers(&self.profile.shape, &payload).unwrap_or_default())
    }

    async fn by_genre(
        &self,
        kind: MediaKind,
        genre: &GenreFilter,
        page: u32,
        cancel: &CancellationToken,
    ) -> Result<PaginatedResult<MediaItem>, ResolveError> {
        let GenreFilter::Slug(slug) = genre else {
            return Err(ResolveError::Unsupported {
                operation: "catalog genre id listing",
                kind,
            });
        };
        if !self.serves(kind) {
            return Ok(PaginatedResult::empty(page));
        }
        self.page(route(self.profile.routes.genre, slug), page, cancel).await
    }

    async fn trending(
        &self,
        kind: MediaKind,
        page: u32,
        cancel: &CancellationToken,
    ) -> Result<PaginatedResult<MediaItem>, ResolveError> {
        if !self.serves(kind) {
            return Ok(PaginatedResult::empty(page));
        }
        self.page(route(self.profile.routes.recent, ""), page, cancel).await
    }
}
