//! Source adapters: one implementation per upstream family.

use async_trait::async_trait;
use medley_core::{CancellationToken, Endpoint};

use crate::errors::ResolveError;
use crate::types::{EpisodeRef, MediaItem, MediaKind, MediaRef, PaginatedResult, ServerEntry, SourceId};

pub mod catalog;
pub mod mock;
pub mod offline;
pub mod scraper;

pub use catalog::{CatalogAdapter, CatalogGenres};
#[cfg(test)]
pub use mock::MockSource;
pub use offline::{CatalogStub, ScraperStub};
pub use scraper::{ANIME_BACKUP, ANIME_PRIMARY, HENTAI_BACKUP, HENTAI_PRIMARY, ScraperAdapter, ScraperProfile, ScraperRoutes};

/// Source-specific genre filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenreFilter {
    /// Integer genre id of the general catalog.
    CatalogId(u32),
    /// Genre slug used by scraper routes.
    Slug(String),
}

/// Uniform capability set of one upstream family.
///
/// The orchestrator depends only on this trait. Every method fetches through
/// the adapter's upstream client and normalizes the result; a payload no
/// strategy recognizes comes back empty, not as an error.
#[async_trait]
pub trait SourceAdapter: Send + Sync + std::fmt::Debug {
    fn id(&self) -> SourceId;

    /// Whether this adapter can answer for `kind`.
    fn serves(&self, kind: MediaKind) -> bool {
        self.id().serves(kind)
    }

    /// Searches by free text. `None` searches every kind the source serves.
    ///
    /// # Errors
    /// - `ResolveError::Upstream` - All hosts failed
    async fn search(
        &self,
        query: &str,
        kind: Option<MediaKind>,
        page: u32,
        cancel: &CancellationToken,
    ) -> Result<PaginatedResult<MediaItem>, ResolveError>;

    /// Looks up one item. `Ok(None)` when the payload holds no item.
    ///
    /// # Errors
    /// - `ResolveError::Upstream` - All hosts failed
    async fn detail(&self, media: &MediaRef, cancel: &CancellationToken) -> Result<Option<MediaItem>, ResolveError>;

    /// Episodes sorted by `(season, episode)`. Empty for movies.
    ///
    /// # Errors
    /// - `ResolveError::Upstream` - All hosts failed
    async fn episodes(&self, media: &MediaRef, cancel: &CancellationToken) -> Result<Vec<EpisodeRef>, ResolveError>;

    /// Server entries for one episode, in upstream order.
    ///
    /// # Errors
    /// - `ResolveError::Upstream` - All hosts failed
    async fn servers(
        &self,
        media: &MediaRef,
        episode: &EpisodeRef,
        cancel: &CancellationToken,
    ) -> Result<Vec<ServerEntry>, ResolveError>;

    /// Lists one genre.
    ///
    /// # Errors
    /// - `ResolveError::Unsupported` - Filter type not understood by this source
    /// - `ResolveError::Upstream` - All hosts failed
    async fn by_genre(
        &self,
        kind: MediaKind,
        genre: &GenreFilter,
        page: u32,
        cancel: &CancellationToken,
    ) -> Result<PaginatedResult<MediaItem>, ResolveError>;

    /// Trending or recently released items.
    ///
    /// # Errors
    /// - `ResolveError::Upstream` - All hosts failed
    async fn trending(
        &self,
        kind: MediaKind,
        page: u32,
        cancel: &CancellationToken,
    ) -> Result<PaginatedResult<MediaItem>, ResolveError>;
}

/// Builds an endpoint from a route template such as `anime/{id}/episodes`.
pub(crate) fn route(template: &str, id: &str) -> Endpoint {
    template
        .split('/')
        .filter(|part| !part.is_empty())
        .fold(Endpoint::new(""), |endpoint, part| {
            if part == "{id}" {
                endpoint.segment(id)
            } else {
                endpoint.segment(part)
            }
        })
}

/// Matches `path` against a route template, returning the decoded `{id}`.
pub(crate) fn match_route(template: &str, path: &str) -> Option<String> {
    let expected: Vec<&str> = template.split('/').filter(|p| !p.is_empty()).collect();
    let actual: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
    if expected.len() != actual.len() {
        return None;
    }

    let mut id = String::new();
    for (want, got) in expected.iter().zip(&actual) {
        if *want == "{id}" {
            id = urlencoding::decode(got).map(|s| s.into_owned()).unwrap_or_else(|_| got.to_string());
        } else if want != got {
            return None;
        }
    }
    Some(id)
}
