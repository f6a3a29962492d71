//! General movie/TV catalog adapter.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use medley_core::{CancellationToken, Endpoint, FetchOptions, UpstreamClient};
use serde_json::Value;
use tracing::{debug, warn};

use super::{GenreFilter, SourceAdapter};
use crate::errors::ResolveError;
use crate::genres::{GenreIndex, GenreSource};
use crate::normalize::catalog as normalize;
use crate::types::{EpisodeRef, MediaItem, MediaKind, MediaRef, PaginatedResult, ServerEntry, SourceId, sort_episodes};

/// Query parameter the catalog expects its API key under.
pub const API_KEY_PARAM: &str = "api_key";

fn kind_segment(kind: MediaKind) -> Option<&'static str> {
    match kind {
        MediaKind::Movie => Some("movie"),
        MediaKind::Series => Some("tv"),
        MediaKind::Anime | MediaKind::Hentai => None,
    }
}

async fn fetch(client: &UpstreamClient, endpoint: &Endpoint, cancel: &CancellationToken) -> Result<Value, ResolveError> {
    let payload = client
        .fetch(endpoint, &FetchOptions::with_cancel(cancel.clone()))
        .await?;
    Ok(payload.into_value())
}

/// Catalog adapter. Movie and series ids are the catalog's integer ids.
#[derive(Debug, Clone)]
pub struct CatalogAdapter {
    client: UpstreamClient,
    genres: Arc<GenreIndex>,
}

impl CatalogAdapter {
    /// `genres` maps list items' `genre_ids` to names.
    pub fn new(client: UpstreamClient, genres: Arc<GenreIndex>) -> Self {
        Self { client, genres }
    }

    async fn list(
        &self,
        endpoint: Endpoint,
        default_kind: MediaKind,
        page: u32,
        cancel: &CancellationToken,
    ) -> Result<PaginatedResult<MediaItem>, ResolveError> {
        let (payload, table) = tokio::join!(fetch(&self.client, &endpoint, cancel), self.genres.ensure());
        Ok(normalize::media_page(&payload?, default_kind, Some(&*table), page))
    }

    async fn series_episodes(&self, series_id: &str, cancel: &CancellationToken) -> Result<Vec<EpisodeRef>, ResolveError> {
        let detail = fetch(&self.client, &Endpoint::new("tv").segment(series_id), cancel).await?;
        let seasons = normalize::season_numbers(&detail);
        debug!("Series {series_id} has seasons {seasons:?}");

        let results = join_all(seasons.iter().map(|season| async move {
            let endpoint = Endpoint::new("tv")
                .segment(series_id)
                .segment("season")
                .segment(season.to_string());
            (*season, fetch(&self.client, &endpoint, cancel).await)
        }))
        .await;

        let mut episodes = Vec::new();
        let mut first_error = None;
        let mut any_ok = false;
        for (season, result) in results {
            match result {
                Ok(payload) => {
                    any_ok = true;
                    episodes.extend(normalize::season_episodes(&payload, series_id, season).unwrap_or_default());
                }
                Err(e) => {
                    warn!("Season {season} of series {series_id} failed: {e}");
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        if let Some(e) = first_error
            && !any_ok
        {
            return Err(e);
        }

        sort_episodes(&mut episodes);
        Ok(episodes)
    }
}

#[async_trait]
impl SourceAdapter for CatalogAdapter {
    fn id(&self) -> SourceId {
        SourceId::Catalog
    }

    async fn search(
        &self,
        query: &str,
        kind: Option<MediaKind>,
        page: u32,
        cancel: &CancellationToken,
    ) -> Result<PaginatedResult<MediaItem>, ResolveError> {
        let (segment, default_kind) = match kind {
            None => ("multi", MediaKind::Movie),
            Some(kind) => match kind_segment(kind) {
                Some(segment) => (segment, kind),
                None => return Ok(PaginatedResult::empty(page)),
            },
        };

        let endpoint = Endpoint::new("search")
            .segment(segment)
            .query("query", query)
            .query("page", page.max(1));
        self.list(endpoint, default_kind, page, cancel).await
    }

    async fn detail(&self, media: &MediaRef, cancel: &CancellationToken) -> Result<Option<MediaItem>, ResolveError> {
        let Some(segment) = kind_segment(media.kind) else {
            return Ok(None);
        };
        let endpoint = Endpoint::new(segment).segment(&media.id);
        let payload = match fetch(&self.client, &endpoint, cancel).await {
            Err(e) if e.is_upstream_not_found() => return Ok(None),
            other => other?,
        };
        Ok(normalize::media_detail(&payload, media.kind, None))
    }

    async fn episodes(&self, media: &MediaRef, cancel: &CancellationToken) -> Result<Vec<EpisodeRef>, ResolveError> {
        match media.kind {
            MediaKind::Series => self.series_episodes(&media.id, cancel).await,
            _ => Ok(Vec::new()),
        }
    }

    /// Catalog content has no upstream server list; providers come from templates.
    async fn servers(
        &self,
        _media: &MediaRef,
        _episode: &EpisodeRef,
        _cancel: &CancellationToken,
    ) -> Result<Vec<ServerEntry>, ResolveError> {
        Ok(Vec::new())
    }

    async fn by_genre(
        &self,
        kind: MediaKind,
        genre: &GenreFilter,
        page: u32,
        cancel: &CancellationToken,
    ) -> Result<PaginatedResult<MediaItem>, ResolveError> {
        let GenreFilter::CatalogId(genre_id) = genre else {
            return Err(ResolveError::Unsupported {
                operation: "genre slug listing",
                kind,
            });
        };
        let Some(segment) = kind_segment(kind) else {
            return Ok(PaginatedResult::empty(page));
        };

        let endpoint = Endpoint::new("discover")
            .segment(segment)
            .query("with_genres", genre_id)
            .query("page", page.max(1));
        self.list(endpoint, kind, page, cancel).await
    }

    async fn trending(
        &self,
        kind: MediaKind,
        page: u32,
        cancel: &CancellationToken,
    ) -> Result<PaginatedResult<MediaItem>, ResolveError> {
        let Some(segment) = kind_segment(kind) else {
            return Ok(PaginatedResult::empty(page));
        };
        let endpoint = Endpoint::new("trending")
            .segment(segment)
            .segment("week")
            .query("page", page.max(1));
        self.list(endpoint, kind, page, cancel).await
    }
}

/// Fetches the catalog's movie and TV genre lists for the [`GenreIndex`].
#[derive(Debug, Clone)]
pub struct CatalogGenres {
    client: UpstreamClient,
}

impl CatalogGenres {
    pub fn new(client: UpstreamClient) -> Self {
        Self { client }
    }

    async fn genres(&self, segment: &str, cancel: &CancellationToken) -> Result<Vec<(u32, String)>, ResolveError> {
        let endpoint = Endpoint::new("genre").segment(segment).segment("list");
        let payload = fetch(&self.client, &endpoint, cancel).await?;
        Ok(normalize::genre_list(&payload).unwrap_or_default())
    }
}

#[async_trait]
impl GenreSource for CatalogGenres {
    async fn movie_genres(&self, cancel: &CancellationToken) -> Result<Vec<(u32, String)>, ResolveError> {
        self.genres("movie", cancel).await
    }

    async fn tv_genres(&self, cancel: &CancellationToken) -> Result<Vec<(u32, String)>, ResolveError> {
        self.genres("tv", cancel).await
    }
}
