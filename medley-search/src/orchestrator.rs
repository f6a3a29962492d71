//! Top-level resolution entry point.
//!
//! Composite queries fan out one branch per source family, each branch under
//! its own child cancellation token and time budget, and join every branch
//! whatever the outcome; a failed branch only costs its partial result.
//! Single-item lookups walk the owning source's fallback chain in order.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use medley_core::CancellationToken;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::context::ResolutionContext;
use crate::errors::ResolveError;
use crate::fallback::{FallbackOutcome, resolve_with_fallback, resolve_with_fallback_until};
use crate::normalize::fields::slugify;
use crate::providers::GenreFilter;
use crate::types::{EpisodeRef, MediaItem, MediaKind, MediaRef, PaginatedResult, SourceId, StreamingProvider};

/// Families searched by [`ResolutionOrchestrator::search`], in precedence
/// order. Series share the catalog branch with movies.
const SEARCH_FAMILIES: [MediaKind; 3] = [MediaKind::Movie, MediaKind::Anime, MediaKind::Hentai];

/// Resolves media, episodes and providers across every configured source.
#[derive(Debug, Clone)]
pub struct ResolutionOrchestrator {
    context: Arc<ResolutionContext>,
}

impl ResolutionOrchestrator {
    pub fn new(context: ResolutionContext) -> Self {
        Self {
            context: Arc::new(context),
        }
    }

    pub fn context(&self) -> &ResolutionContext {
        &self.context
    }

    /// Unified search across the catalog and every scraper family.
    ///
    /// Results keep family precedence and are deduplicated by id, first
    /// occurrence winning. Branches that fail or time out contribute nothing.
    ///
    /// # Errors
    /// - `ResolveError::InvalidReference` - Blank query
    pub async fn search(&self, query: &str, cancel: &CancellationToken) -> Result<Vec<MediaItem>, ResolveError> {
        let query = non_blank(query, "search query")?;

        let branches = SEARCH_FAMILIES.iter().map(|&family| {
            let sources = self.context.sources_for(family);
            async move {
                if sources.is_empty() {
                    return None;
                }
                self.branch(format!("search[{family}]"), cancel, |token, deadline| async move {
                    resolve_with_fallback_until("search", &sources, &token, Some(deadline), |source| {
                        source.search(query, None, 1, &token)
                    })
                    .await
                    .into_result("search")
                })
                .await
                .flatten()
            }
        });

        let pages = join_all(branches).await;
        let merged = dedup_by_id(pages.into_iter().flatten().flat_map(|page| page.data));
        info!("Search '{query}' returned {} items", merged.len());
        Ok(merged)
    }

    /// Paged search of one kind through its fallback chain.
    ///
    /// # Errors
    /// - `ResolveError::InvalidReference` - Blank query
    /// - `ResolveError::Unsupported` - No source serves `kind`
    /// - `ResolveError::ExhaustedFallbacks` - Every source failed
    pub async fn search_kind(
        &self,
        kind: MediaKind,
        query: &str,
        page: u32,
        cancel: &CancellationToken,
    ) -> Result<PaginatedResult<MediaItem>, ResolveError> {
        let query = non_blank(query, "search query")?;
        let sources = self.required_sources(kind, "search")?;

        let outcome = resolve_with_fallback("search_kind", &sources, cancel, |source| {
            source.search(query, Some(kind), page, cancel)
        })
        .await;
        Ok(outcome
            .into_result("search_kind")?
            .unwrap_or_else(|| PaginatedResult::empty(page)))
    }

    /// Resolves one media item.
    ///
    /// # Errors
    /// - `ResolveError::InvalidReference` - Blank id or source/kind mismatch
    /// - `ResolveError::NotFound` - No source knows the id
    /// - `ResolveError::ExhaustedFallbacks` - Every source in the chain failed
    pub async fn resolve_media(&self, media: &MediaRef, cancel: &CancellationToken) -> Result<MediaItem, ResolveError> {
        validate(media)?;
        let chain = self.context.chain_for(media);

        let outcome = resolve_with_fallback("resolve_media", &chain, cancel, |source| source.detail(media, cancel)).await;
        if let FallbackOutcome::Found { source, .. } = &outcome
            && *source != media.source
        {
            debug!("{media} resolved by {source}");
        }

        match outcome.into_result("resolve_media")? {
            Some(Some(item)) => Ok(item),
            _ => Err(ResolveError::not_found(media)),
        }
    }

    /// Episodes sorted by `(season, episode)`. Empty for movies and when no
    /// source could answer.
    ///
    /// # Errors
    /// - `ResolveError::InvalidReference` - Blank id or source/kind mismatch
    pub async fn resolve_episodes(
        &self,
        media: &MediaRef,
        cancel: &CancellationToken,
    ) -> Result<Vec<EpisodeRef>, ResolveError> {
        validate(media)?;
        if !media.kind.is_episodic() {
            return Ok(Vec::new());
        }
        Ok(self
            .episodes_with_source(media, cancel)
            .await
            .map(|(_, episodes)| episodes)
            .unwrap_or_default())
    }

    /// Episodes of `media` together with the source that listed them.
    async fn episodes_with_source(
        &self,
        media: &MediaRef,
        cancel: &CancellationToken,
    ) -> Option<(SourceId, Vec<EpisodeRef>)> {
        let chain = self.context.chain_for(media);
        let outcome =
            resolve_with_fallback("resolve_episodes", &chain, cancel, |source| source.episodes(media, cancel)).await;
        match outcome {
            FallbackOutcome::Found { source, value } => Some((source, value)),
            FallbackOutcome::Empty { .. } => None,
            FallbackOutcome::Exhausted { failures, cancelled } => {
                warn!(
                    "No episodes for {media}: {} source(s) failed{}",
                    failures.len(),
                    if cancelled { ", cancelled" } else { "" }
                );
                None
            }
        }
    }

    /// Ranked streaming providers, fully ordered by `(tier, priority)`.
    ///
    /// Scraper content without an explicit episode uses its first episode.
    /// An empty list means no providers, not a failure. When the probe is
    /// enabled every candidate is annotated without reordering.
    ///
    /// # Errors
    /// - `ResolveError::InvalidReference` - Blank id or source/kind mismatch
    /// - `ResolveError::ExhaustedFallbacks` - Every scraper in the chain failed
    pub async fn resolve_providers(
        &self,
        media: &MediaRef,
        episode: Option<&EpisodeRef>,
        cancel: &CancellationToken,
    ) -> Result<Vec<StreamingProvider>, ResolveError> {
        validate(media)?;
        let registry = self.context.registry();

        let mut providers = if media.kind.is_catalog() {
            registry.list_providers(media, episode, &[])
        } else {
            // Servers are asked of the source that listed the episode first.
            let (first_source, episode) = match episode {
                Some(episode) => (media.source, episode.clone()),
                None => match self.episodes_with_source(media, cancel).await {
                    Some((source, episodes)) if !episodes.is_empty() => (source, episodes[0].clone()),
                    _ => {
                        debug!("{media} has no episodes, so no providers");
                        return Ok(Vec::new());
                    }
                },
            };

            let chain = self.context.chain_from(media.kind, first_source);
            let servers = resolve_with_fallback("resolve_providers", &chain, cancel, |source| {
                source.servers(media, &episode, cancel)
            })
            .await
            .into_result("resolve_providers")?
            .unwrap_or_default();
            registry.list_providers(media, Some(&episode), &servers)
        };

        if let Some(probe) = self.context.probe() {
            probe.annotate(&mut providers).await;
        }
        debug!("{media}: {} providers", providers.len());
        Ok(providers)
    }

    /// Every known genre name, alphabetically. Empty if the catalog is unreachable.
    pub async fn list_genres(&self) -> Vec<String> {
        self.context.genres().ensure().await.names()
    }

    /// One page of a genre.
    ///
    /// Catalog genres fan out to the movie and TV listings concurrently and
    /// merge; names unknown to the catalog fall back to the anime scrapers'
    /// genre routes by slug.
    ///
    /// # Errors
    /// - `ResolveError::InvalidReference` - Blank genre
    /// - `ResolveError::ExhaustedFallbacks` - Every anime scraper failed
    pub async fn list_by_genre(
        &self,
        genre: &str,
        page: u32,
        cancel: &CancellationToken,
    ) -> Result<PaginatedResult<MediaItem>, ResolveError> {
        let genre = non_blank(genre, "genre")?;
        let table = self.context.genres().ensure().await;
        let ids = table.resolve(genre);

        if !ids.is_empty() {
            let targets: Vec<(MediaKind, u32)> = [(MediaKind::Movie, ids.movie_id), (MediaKind::Series, ids.tv_id)]
                .into_iter()
                .filter_map(|(kind, id)| Some((kind, id?)))
                .collect();

            let branches = targets.into_iter().map(|(kind, id)| {
                let sources = self.context.sources_for(kind);
                async move {
                    self.branch(format!("genre[{kind}]"), cancel, |token, deadline| async move {
                        let filter = GenreFilter::CatalogId(id);
                        resolve_with_fallback_until("list_by_genre", &sources, &token, Some(deadline), |source| {
                            source.by_genre(kind, &filter, page, &token)
                        })
                        .await
                        .into_result("list_by_genre")
                    })
                    .await
                    .flatten()
                }
            });
            let pages: Vec<_> = join_all(branches).await.into_iter().flatten().collect();
            return Ok(merge_pages(pages, page));
        }

        let slug = slugify(genre);
        debug!("Genre '{genre}' unknown to the catalog, trying anime route '{slug}'");
        let sources = self.required_sources(MediaKind::Anime, "genre listing")?;
        let filter = GenreFilter::Slug(slug);
        let outcome = resolve_with_fallback("list_by_genre", &sources, cancel, |source| {
            source.by_genre(MediaKind::Anime, &filter, page, cancel)
        })
        .await;
        Ok(outcome
            .into_result("list_by_genre")?
            .unwrap_or_else(|| PaginatedResult::empty(page)))
    }

    /// Trending movies or series, or recent releases for scraper kinds.
    ///
    /// # Errors
    /// - `ResolveError::Unsupported` - No source serves `kind`
    /// - `ResolveError::ExhaustedFallbacks` - Every source failed
    pub async fn trending(
        &self,
        kind: MediaKind,
        page: u32,
        cancel: &CancellationToken,
    ) -> Result<PaginatedResult<MediaItem>, ResolveError> {
        let sources = self.required_sources(kind, "trending")?;
        let outcome =
            resolve_with_fallback("trending", &sources, cancel, |source| source.trending(kind, page, cancel)).await;
        Ok(outcome
            .into_result("trending")?
            .unwrap_or_else(|| PaginatedResult::empty(page)))
    }

    fn required_sources(
        &self,
        kind: MediaKind,
        operation: &'static str,
    ) -> Result<Vec<Arc<dyn crate::providers::SourceAdapter>>, ResolveError> {
        let sources = self.context.sources_for(kind);
        if sources.is_empty() {
            return Err(ResolveError::Unsupported { operation, kind });
        }
        Ok(sources)
    }

    /// Runs one fan-out branch under a child token and the branch budget.
    ///
    /// `work` receives the branch deadline so its fallback chain can share
    /// the budget between sources. Errors and timeouts are logged with the
    /// branch label and yield `None`.
    async fn branch<T, F, Fut>(&self, label: String, cancel: &CancellationToken, work: F) -> Option<T>
    where
        F: FnOnce(CancellationToken, Instant) -> Fut,
        Fut: Future<Output = Result<T, ResolveError>>,
    {
        let token = cancel.child_token();
        let budget = self.context.branch_timeout();
        let deadline = Instant::now() + budget;

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("{label} cancelled by caller");
                None
            }
            result = tokio::time::timeout_at(deadline, work(token.clone(), deadline)) => match result {
                Ok(Ok(value)) => Some(value),
                Ok(Err(e)) => {
                    warn!("{label} failed: {e}");
                    None
                }
                Err(_) => {
                    warn!("{label} timed out after {budget:?}");
                    None
                }
            },
        };

        token.cancel();
        outcome
    }
}

fn non_blank<'a>(value: &'a str, what: &str) -> Result<&'a str, ResolveError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ResolveError::InvalidReference {
            reason: format!("empty {what}"),
        });
    }
    Ok(trimmed)
}

fn validate(media: &MediaRef) -> Result<(), ResolveError> {
    if media.id.trim().is_empty() {
        return Err(ResolveError::InvalidReference {
            reason: "empty media id".to_string(),
        });
    }
    if !media.source.serves(media.kind) {
        return Err(ResolveError::InvalidReference {
            reason: format!("{} does not serve {}", media.source, media.kind),
        });
    }
    Ok(())
}

/// Keeps the first item for every id.
fn dedup_by_id(items: impl IntoIterator<Item = MediaItem>) -> Vec<MediaItem> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.id.clone()))
        .collect()
}

/// Concatenates pages of one listing, keeping the first item per reference.
fn merge_pages(pages: Vec<PaginatedResult<MediaItem>>, page: u32) -> PaginatedResult<MediaItem> {
    let total_pages = pages.iter().map(|p| p.total_pages).max().unwrap_or(1);
    let total_items = pages.iter().map(|p| p.total_items).sum();

    let mut seen = HashSet::new();
    let data = pages
        .into_iter()
        .flat_map(|p| p.data)
        .filter(|item| seen.insert(item.reference()))
        .collect();
    PaginatedResult::new(data, page, total_pages, total_items)
}
