//! Lazily built genre index for the general catalog.
//!
//! Maps human-facing genre names to the catalog's per-kind integer ids (movie
//! genres and TV genres are numbered independently) and back. Built once per
//! process from two concurrent catalog calls; a failed build caches an empty
//! table instead of retrying on every call. Callers force a rebuild explicitly.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use medley_core::CancellationToken;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, warn};

use crate::errors::ResolveError;
use crate::types::MediaKind;

/// Supplies the raw `(id, name)` genre lists.
#[async_trait]
pub trait GenreSource: Send + Sync + std::fmt::Debug {
    /// # Errors
    /// - `ResolveError::Upstream` - Catalog unreachable
    async fn movie_genres(&self, cancel: &CancellationToken) -> Result<Vec<(u32, String)>, ResolveError>;

    /// # Errors
    /// - `ResolveError::Upstream` - Catalog unreachable
    async fn tv_genres(&self, cancel: &CancellationToken) -> Result<Vec<(u32, String)>, ResolveError>;
}

/// Source-specific ids for one genre name. Both empty for unknown names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenreIds {
    pub movie_id: Option<u32>,
    pub tv_id: Option<u32>,
}

impl GenreIds {
    pub fn is_empty(&self) -> bool {
        self.movie_id.is_none() && self.tv_id.is_none()
    }
}

#[derive(Debug, Clone)]
struct GenreEntry {
    name: String,
    ids: GenreIds,
}

/// Immutable snapshot of the catalog's genres.
#[derive(Debug, Clone, Default)]
pub struct GenreTable {
    by_name: BTreeMap<String, GenreEntry>,
    movie_names: HashMap<u32, String>,
    tv_names: HashMap<u32, String>,
}

impl GenreTable {
    /// Merges the movie and TV lists into one name-keyed table.
    pub fn from_lists(movie: Vec<(u32, String)>, tv: Vec<(u32, String)>) -> Self {
        let mut table = Self::default();

        for (id, name) in movie {
            table.insert(&name, |ids| ids.movie_id = Some(id));
            table.movie_names.insert(id, name);
        }
        for (id, name) in tv {
            table.insert(&name, |ids| ids.tv_id = Some(id));
            table.tv_names.insert(id, name);
        }

        table
    }

    fn insert(&mut self, name: &str, assign: impl FnOnce(&mut GenreIds)) {
        let name = name.trim();
        if name.is_empty() {
            return;
        }
        let entry = self
            .by_name
            .entry(name.to_lowercase())
            .or_insert_with(|| GenreEntry {
                name: name.to_string(),
                ids: GenreIds::default(),
            });
        assign(&mut entry.ids);
    }

    /// Case-insensitive lookup.
    pub fn resolve(&self, name: &str) -> GenreIds {
        self.by_name
            .get(&name.trim().to_lowercase())
            .map(|entry| entry.ids)
            .unwrap_or_default()
    }

    /// Display name for a catalog genre id of the given kind.
    pub fn name_for(&self, kind: MediaKind, id: u32) -> Option<&str> {
        let names = match kind {
            MediaKind::Movie => &self.movie_names,
            MediaKind::Series => &self.tv_names,
            MediaKind::Anime | MediaKind::Hentai => return None,
        };
        names.get(&id).map(String::as_str)
    }

    /// Genre names in case-insensitive alphabetical order.
    pub fn names(&self) -> Vec<String> {
        self.by_name.values().map(|entry| entry.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// Process-wide memoized genre table.
///
/// Concurrent `ensure` calls share one build: the first caller fetches while
/// the others wait on the build lock and then read the stored snapshot.
#[derive(Debug)]
pub struct GenreIndex {
    source: Arc<dyn GenreSource>,
    table: RwLock<Option<Arc<GenreTable>>>,
    build_lock: tokio::sync::Mutex<()>,
    builds: AtomicUsize,
}

impl GenreIndex {
    pub fn new(source: Arc<dyn GenreSource>) -> Self {
        Self {
            source,
            table: RwLock::new(None),
            build_lock: tokio::sync::Mutex::new(()),
            builds: AtomicUsize::new(0),
        }
    }

    /// Builds the table on first use; later calls return the cached snapshot.
    pub async fn ensure(&self) -> Arc<GenreTable> {
        if let Some(table) = self.snapshot() {
            return table;
        }

        let _guard = self.build_lock.lock().await;
        if let Some(table) = self.snapshot() {
            return table;
        }
        self.build_and_store().await
    }

    /// Discards the cached table and builds a new one.
    pub async fn rebuild(&self) -> Arc<GenreTable> {
        let _guard = self.build_lock.lock().await;
        self.build_and_store().await
    }

    /// Drops the cached table; the next `ensure` fetches again.
    pub fn invalidate(&self) {
        *self.table.write() = None;
    }

    /// Current table without triggering a build.
    pub fn snapshot(&self) -> Option<Arc<GenreTable>> {
        self.table.read().clone()
    }

    /// Pure lookup against the current table. Empty if nothing is built yet.
    pub fn resolve(&self, name: &str) -> GenreIds {
        self.snapshot()
            .map(|table| table.resolve(name))
            .unwrap_or_default()
    }

    /// How many times the underlying fetch ran.
    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    async fn build_and_store(&self) -> Arc<GenreTable> {
        self.builds.fetch_add(1, Ordering::SeqCst);

        // Not tied to any caller: the table outlives the request that triggered it.
        let cancel = CancellationToken::new();
        let (movie, tv) = tokio::join!(
            self.source.movie_genres(&cancel),
            self.source.tv_genres(&cancel)
        );

        let table = match (movie, tv) {
            (Ok(movie), Ok(tv)) => {
                let table = GenreTable::from_lists(movie, tv);
                debug!("Genre index built with {} genres", table.len());
                table
            }
            (movie, tv) => {
                let reason = movie
                    .err()
                    .or(tv.err())
                    .map(|e| e.to_string())
                    .unwrap_or_default();
                warn!("Genre index build failed, caching empty index: {reason}");
                GenreTable::default()
            }
        };

        let table = Arc::new(table);
        *self.table.write() = Some(Arc::clone(&table));
        table
    }
}
