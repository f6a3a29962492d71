//! Mock source adapter for testing.

#[cfg(test)]
use std::sync::atomic::{AtomicUsize, Ordering};
#[cfg(test)]
use std::time::Duration;

#[cfg(test)]
use async_trait::async_trait;
#[cfg(test)]
use medley_core::{CancellationToken, UpstreamError};

#[cfg(test)]
use super::{GenreFilter, SourceAdapter};
#[cfg(test)]
use crate::errors::ResolveError;
#[cfg(test)]
use crate::genres::GenreSource;
#[cfg(test)]
use crate::types::{EpisodeRef, MediaItem, MediaKind, MediaRef, PaginatedResult, ServerEntry, SourceId};

/// Mock adapter returning canned data, optionally slow or failing.
#[cfg(test)]
#[derive(Debug)]
pub struct MockSource {
    id: SourceId,
    items: Vec<MediaItem>,
    episodes: Vec<EpisodeRef>,
    servers: Vec<ServerEntry>,
    genres: Vec<(u32, String)>,
    delay: Option<Duration>,
    failing: bool,
    calls: AtomicUsize,
}

#[cfg(test)]
impl MockSource {
    /// Creates an empty, healthy mock for `id`.
    pub fn new(id: SourceId) -> Self {
        Self {
            id,
            items: Vec::new(),
            episodes: Vec::new(),
            servers: Vec::new(),
            genres: Vec::new(),
            delay: None,
            failing: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Items with the given ids and titles, kind taken from the source.
    pub fn with_titles(mut self, titles: &[(&str, &str)]) -> Self {
        let kind = match self.id {
            SourceId::Catalog => MediaKind::Movie,
            SourceId::AnimePrimary | SourceId::AnimeBackup => MediaKind::Anime,
            SourceId::HentaiPrimary | SourceId::HentaiBackup => MediaKind::Hentai,
        };
        self.items = titles
            .iter()
            .map(|(id, title)| {
                let mut item = MediaItem::placeholder(self.id, kind, *id);
                item.title = title.to_string();
                item
            })
            .collect();
        self
    }

    pub fn with_items(mut self, items: Vec<MediaItem>) -> Self {
        self.items = items;
        self
    }

    pub fn with_episodes(mut self, episodes: Vec<EpisodeRef>) -> Self {
        self.episodes = episodes;
        self
    }

    pub fn with_servers(mut self, servers: &[(&str, &str)]) -> Self {
        self.servers = servers
            .iter()
            .map(|(name, url)| ServerEntry {
                name: name.to_string(),
                url: url.to_string(),
            })
            .collect();
        self
    }

    pub fn with_genres(mut self, genres: &[(u32, &str)]) -> Self {
        self.genres = genres.iter().map(|(id, name)| (*id, name.to_string())).collect();
        self
    }

    /// Sleeps before every answer.
    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fails every call as if all hosts were down.
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    /// Number of adapter calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn answer<T: Send>(&self, value: T) -> Result<T, ResolveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing {
            return Err(ResolveError::Upstream(UpstreamError::Exhausted {
                source_name: self.id.to_string(),
                path: "/mock".to_string(),
                failures: Vec::new(),
            }));
        }
        Ok(value)
    }

    fn page(&self, page: u32) -> PaginatedResult<MediaItem> {
        PaginatedResult::single(self.items.clone(), page)
    }
}

#[cfg(test)]
#[async_trait]
impl SourceAdapter for MockSource {
    fn id(&self) -> SourceId {
        self.id
    }

    async fn search(
        &self,
        _query: &str,
        _kind: Option<MediaKind>,
        page: u32,
        _cancel: &CancellationToken,
    ) -> Result<PaginatedResult<MediaItem>, ResolveError> {
        self.answer(self.page(page)).await
    }

    async fn detail(&self, media: &MediaRef, _cancel: &CancellationToken) -> Result<Option<MediaItem>, ResolveError> {
        let found = self.items.iter().find(|item| item.id == media.id).cloned();
        self.answer(found).await
    }

    async fn episodes(&self, _media: &MediaRef, _cancel: &CancellationToken) -> Result<Vec<EpisodeRef>, ResolveError> {
        self.answer(self.episodes.clone()).await
    }

    async fn servers(
        &self,
        _media: &MediaRef,
        _episode: &EpisodeRef,
        _cancel: &CancellationToken,
    ) -> Result<Vec<ServerEntry>, ResolveError> {
        self.answer(self.servers.clone()).await
    }

    async fn by_genre(
        &self,
        _kind: MediaKind,
        _genre: &GenreFilter,
        page: u32,
        _cancel: &CancellationToken,
    ) -> Result<PaginatedResult<MediaItem>, ResolveError> {
        self.answer(self.page(page)).await
    }

    async fn trending(
        &self,
        _kind: MediaKind,
        page: u32,
        _cancel: &CancellationToken,
    ) -> Result<PaginatedResult<MediaItem>, ResolveError> {
        self.answer(self.page(page)).await
    }
}

#[cfg(test)]
#[async_trait]
impl GenreSource for MockSource {
    async fn movie_genres(&self, _cancel: &CancellationToken) -> Result<Vec<(u32, String)>, ResolveError> {
        self.answer(self.genres.clone()).await
    }

    async fn tv_genres(&self, _cancel: &CancellationToken) -> Result<Vec<(u32, String)>, ResolveError> {
        self.answer(self.genres.clone()).await
    }
}
