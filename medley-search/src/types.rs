//! Canonical data model shared by every source adapter.
//!
//! Every field has a documented default so the presentation layer never sees a
//! missing value: strings default to `""`, numbers to `0`, lists to empty,
//! covers to [`PLACEHOLDER_COVER`] and titles to [`UNKNOWN_TITLE`].

use serde::{Deserialize, Serialize};

/// Sentinel cover used when an upstream provides no image.
pub const PLACEHOLDER_COVER: &str = "medley://placeholder/cover";

/// Title used when an upstream provides no usable title.
pub const UNKNOWN_TITLE: &str = "Unknown";

/// Media kind discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Movie,
    Series,
    Anime,
    Hentai,
}

impl MediaKind {
    /// Movies and series come from the general catalog.
    pub fn is_catalog(self) -> bool {
        matches!(self, Self::Movie | Self::Series)
    }

    /// Whether items of this kind are split into episodes.
    pub fn is_episodic(self) -> bool {
        !matches!(self, Self::Movie)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Series => "series",
            Self::Anime => "anime",
            Self::Hentai => "hentai",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "movie" | "movies" => Ok(Self::Movie),
            "series" | "tv" | "show" => Ok(Self::Series),
            "anime" => Ok(Self::Anime),
            "hentai" => Ok(Self::Hentai),
            _ => Err(format!(
                "Invalid media kind: '{s}'. Valid options are: movie, series, anime, hentai"
            )),
        }
    }
}

/// Identifies the upstream an id belongs to. Ids are unique only within one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceId {
    Catalog,
    AnimePrimary,
    AnimeBackup,
    HentaiPrimary,
    HentaiBackup,
}

impl SourceId {
    pub const ALL: [SourceId; 5] = [
        SourceId::Catalog,
        SourceId::AnimePrimary,
        SourceId::AnimeBackup,
        SourceId::HentaiPrimary,
        SourceId::HentaiBackup,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Catalog => "catalog",
            Self::AnimePrimary => "anime-primary",
            Self::AnimeBackup => "anime-backup",
            Self::HentaiPrimary => "hentai-primary",
            Self::HentaiBackup => "hentai-backup",
        }
    }

    /// Whether this source can answer for `kind`.
    pub fn serves(self, kind: MediaKind) -> bool {
        match self {
            Self::Catalog => kind.is_catalog(),
            Self::AnimePrimary | Self::AnimeBackup => kind == MediaKind::Anime,
            Self::HentaiPrimary | Self::HentaiBackup => kind == MediaKind::Hentai,
        }
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SourceId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|source| source.as_str() == wanted)
            .ok_or_else(|| format!("Unknown source: '{s}'"))
    }
}

/// Reference to one media item in one source namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaRef {
    pub source: SourceId,
    pub kind: MediaKind,
    pub id: String,
}

impl MediaRef {
    pub fn new(source: SourceId, kind: MediaKind, id: impl Into<String>) -> Self {
        Self {
            source,
            kind,
            id: id.into(),
        }
    }
}

impl std::fmt::Display for MediaRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.source, self.kind, self.id)
    }
}

/// Normalized media item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    pub id: String,
    pub source: SourceId,
    pub title: String,
    pub cover: String,
    /// 0 when unknown
    pub rating: f32,
    pub genre: Vec<String>,
    pub country: String,
    /// 0 when unknown
    pub year: u16,
    pub synopsis: String,
    #[serde(rename = "type")]
    pub kind: MediaKind,
}

impl MediaItem {
    /// Item with every optional field at its default.
    pub fn placeholder(source: SourceId, kind: MediaKind, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source,
            title: UNKNOWN_TITLE.to_string(),
            cover: PLACEHOLDER_COVER.to_string(),
            rating: 0.0,
            genre: Vec::new(),
            country: String::new(),
            year: 0,
            synopsis: String::new(),
            kind,
        }
    }

    pub fn reference(&self) -> MediaRef {
        MediaRef::new(self.source, self.kind, self.id.clone())
    }

    pub fn has_cover(&self) -> bool {
        self.cover != PLACEHOLDER_COVER
    }
}

/// Normalized episode reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeRef {
    pub id: String,
    pub title: String,
    pub episode_number: u32,
    /// 0 for sources without seasons
    pub season_number: u32,
    pub cover: String,
    /// Opaque token resolved into providers by the owning source
    pub stream_ref: String,
}

impl EpisodeRef {
    pub fn sort_key(&self) -> (u32, u32) {
        (self.season_number, self.episode_number)
    }
}

/// Sorts by `(season, episode)`; ties keep upstream order.
pub fn sort_episodes(episodes: &mut [EpisodeRef]) {
    episodes.sort_by_key(EpisodeRef::sort_key);
}

/// Candidate streaming endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamingProvider {
    pub name: String,
    pub url: String,
    /// 1 = best, 4 = backup
    pub tier: u8,
    /// Stable ordering key within and across tiers
    pub priority: u32,
    pub quality: String,
    pub language: String,
    /// Best-effort, advisory only
    pub available: bool,
}

impl StreamingProvider {
    pub fn rank_key(&self) -> (u8, u32) {
        (self.tier, self.priority)
    }
}

/// Server name and URL pair reported by a scraper upstream, before ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEntry {
    pub name: String,
    pub url: String,
}

/// One page of results.
///
/// `page` and `total_pages` are always at least 1. `total_items` is advisory:
/// sources may undercount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedResult<T> {
    pub data: Vec<T>,
    pub page: u32,
    pub total_pages: u32,
    pub total_items: u64,
}

impl<T> PaginatedResult<T> {
    /// Builds a page, clamping `page` and `total_pages` to at least 1 and
    /// `total_pages` to at least `page`.
    pub fn new(data: Vec<T>, page: u32, total_pages: u32, total_items: u64) -> Self {
        let page = page.max(1);
        Self {
            data,
            page,
            total_pages: total_pages.max(page),
            total_items,
        }
    }

    pub fn empty(page: u32) -> Self {
        Self::new(Vec::new(), page, 1, 0)
    }

    /// A single page holding everything the source returned.
    pub fn single(data: Vec<T>, page: u32) -> Self {
        let total_items = data.len() as u64;
        Self::new(data, page, 1, total_items)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PaginatedResult<U> {
        PaginatedResult {
            data: self.data.into_iter().map(f).collect(),
            page: self.page,
            total_pages: self.total_pages,
            total_items: self.total_items,
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn episode(season: u32, number: u32, id: &str) -> EpisodeRef {
        EpisodeRef {
            id: id.to_string(),
            title: String::new(),
            episode_number: number,
            season_number: season,
            cover: PLACEHOLDER_COVER.to_string(),
            stream_ref: id.to_string(),
        }
    }

    #[test]
    fn test_episodes_sort_by_season_then_number() {
        let mut episodes = vec![
            episode(2, 1, "s2e1"),
            episode(1, 10, "s1e10"),
            episode(1, 2, "s1e2"),
            episode(1, 2, "s1e2-alt"),
        ];

        sort_episodes(&mut episodes);

        let ids: Vec<_> = episodes.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["s1e2", "s1e2-alt", "s1e10", "s2e1"]);
    }

    #[test]
    fn test_media_item_serializes_type_discriminant() {
        let item = MediaItem::placeholder(SourceId::AnimePrimary, MediaKind::Anime, "x");
        let json = serde_json::to_value(&item).unwrap();

        assert_eq!(json["type"], "anime");
        assert_eq!(json["source"], "anime-primary");
        assert_eq!(json["rating"], 0.0);
        assert_eq!(json["cover"], PLACEHOLDER_COVER);
        assert!(!item.has_cover());
    }

    #[test]
    fn test_source_and_kind_parse() {
        assert_eq!("hentai-backup".parse::<SourceId>(), Ok(SourceId::HentaiBackup));
        assert_eq!("tv".parse::<MediaKind>(), Ok(MediaKind::Series));
        assert!("music".parse::<MediaKind>().is_err());
        assert!(SourceId::Catalog.serves(MediaKind::Series));
        assert!(!SourceId::AnimeBackup.serves(MediaKind::Hentai));
    }

    #[test]
    fn test_empty_page_still_reports_one_page() {
        let page: PaginatedResult<MediaItem> = PaginatedResult::empty(0);
        assert_eq!(page.page, 1);
        assert_eq!(page.total_pages, 1);
        assert_eq!(page.total_items, 0);
    }

    proptest! {
        #[test]
        fn prop_page_bounds_hold(page in 0u32..1000, total_pages in 0u32..1000, items in 0u64..10_000) {
            let result: PaginatedResult<u8> = PaginatedResult::new(Vec::new(), page, total_pages, items);
            prop_assert!(result.page >= 1);
            prop_assert!(result.total_pages >= 1);
            prop_assert!(result.total_pages >= result.page);
        }
    }
}
