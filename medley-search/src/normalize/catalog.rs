//! Normalizer for the general movie/TV catalog.
//!
//! Lists arrive as `{ results, page, total_pages, total_results }`, single
//! items as flat objects. Genre ids are integers scoped per kind.

use serde_json::Value;

use super::fields::{first_f32, first_string, first_u32, first_year, lookup, slugify, string_list};
use super::strategy::{Extracted, Extraction, extract_first};
use super::SchemaMiss;
use crate::genres::GenreTable;
use crate::types::{EpisodeRef, MediaItem, MediaKind, PLACEHOLDER_COVER, PaginatedResult, SourceId, UNKNOWN_TITLE};

/// Prefix for relative image paths.
pub const IMAGE_BASE: &str = "https://image.tmdb.org/t/p/w500";

const LIST_STRATEGIES: &[Extraction] = &[Extraction::Field("results"), Extraction::Root];
const EPISODE_STRATEGIES: &[Extraction] = &[Extraction::Field("episodes"), Extraction::Root];
const GENRE_STRATEGIES: &[Extraction] = &[Extraction::Field("genres"), Extraction::Root];

/// Maps a catalog list payload.
///
/// Items tagged with a `media_type` (multi-search) use it; `person` entries
/// are skipped. Untagged items take `default_kind`.
pub fn media_list(
    payload: &Value,
    default_kind: MediaKind,
    genres: Option<&GenreTable>,
) -> Option<Vec<MediaItem>> {
    let items = match extract_first(LIST_STRATEGIES, payload) {
        Extracted::Items { items, .. } => items,
        Extracted::Empty => return Some(Vec::new()),
        Extracted::Unrecognized => {
            SchemaMiss::new(SourceId::Catalog, "list", payload).log();
            return None;
        }
    };

    Some(
        items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.is_object())
            .filter_map(|(index, item)| {
                let kind = match first_string(item, &["media_type"]).as_deref() {
                    Some("movie") => MediaKind::Movie,
                    Some("tv") => MediaKind::Series,
                    Some(_) => return None,
                    None => default_kind,
                };
                Some(media_item(item, kind, genres, index))
            })
            .collect(),
    )
}

/// Maps a list payload into a page, reading the catalog's paging fields.
pub fn media_page(
    payload: &Value,
    default_kind: MediaKind,
    genres: Option<&GenreTable>,
    requested_page: u32,
) -> PaginatedResult<MediaItem> {
    let data = media_list(payload, default_kind, genres).unwrap_or_default();
    let page = first_u32(payload, &["page"]).unwrap_or(requested_page);
    let total_pages = first_u32(payload, &["total_pages"]).unwrap_or(1);
    let total_items = lookup(payload, "total_results")
        .and_then(Value::as_u64)
        .unwrap_or(data.len() as u64);
    PaginatedResult::new(data, page, total_pages, total_items)
}

/// Maps a single-item payload. `None` if it carries neither an id nor a title.
pub fn media_detail(payload: &Value, kind: MediaKind, genres: Option<&GenreTable>) -> Option<MediaItem> {
    if !payload.is_object() || first_string(payload, &["id", "title", "name"]).is_none() {
        SchemaMiss::new(SourceId::Catalog, "detail", payload).log();
        return None;
    }
    Some(media_item(payload, kind, genres, 0))
}

/// Maps one catalog object with every field defaulted.
pub fn media_item(item: &Value, kind: MediaKind, genres: Option<&GenreTable>, index: usize) -> MediaItem {
    let title = first_string(item, &["title", "name", "original_title", "original_name"]);
    let id = first_string(item, &["id"])
        .or_else(|| title.as_deref().map(slugify).filter(|slug| !slug.is_empty()))
        .unwrap_or_else(|| format!("{}-{index}", SourceId::Catalog));

    let mut media = MediaItem::placeholder(SourceId::Catalog, kind, id);
    media.title = title.unwrap_or_else(|| UNKNOWN_TITLE.to_string());
    media.cover = first_string(item, &["poster_path", "backdrop_path"])
        .map(|path| image_url(&path))
        .unwrap_or_else(|| PLACEHOLDER_COVER.to_string());
    media.rating = first_f32(item, &["vote_average"]).unwrap_or(0.0);
    media.genre = genre_names(item, kind, genres);
    media.country = country(item).unwrap_or_default();
    media.year = first_year(item, &["release_date", "first_air_date"]).unwrap_or(0);
    media.synopsis = first_string(item, &["overview"]).unwrap_or_default();
    media
}

/// Absolute image URL for a catalog image path.
pub fn image_url(path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        path.to_string()
    } else if path.starts_with('/') {
        format!("{IMAGE_BASE}{path}")
    } else {
        format!("{IMAGE_BASE}/{path}")
    }
}

fn genre_names(item: &Value, kind: MediaKind, genres: Option<&GenreTable>) -> Vec<String> {
    let named = string_list(item, &["genres"]);
    if !named.is_empty() {
        return named;
    }

    let (Some(table), Some(ids)) = (genres, lookup(item, "genre_ids").and_then(Value::as_array)) else {
        return Vec::new();
    };
    ids.iter()
        .filter_map(Value::as_u64)
        .filter_map(|id| u32::try_from(id).ok())
        .filter_map(|id| table.name_for(kind, id))
        .map(str::to_string)
        .collect()
}

fn country(item: &Value) -> Option<String> {
    let origin = lookup(item, "origin_country")
        .and_then(Value::as_array)
        .and_then(|codes| codes.iter().find_map(Value::as_str))
        .map(str::to_string);

    origin.or_else(|| {
        lookup(item, "production_countries")
            .and_then(Value::as_array)
            .and_then(|countries| countries.first())
            .and_then(|country| first_string(country, &["iso_3166_1", "name"]))
    })
}

/// `(id, name)` pairs from a genre-list payload.
pub fn genre_list(payload: &Value) -> Option<Vec<(u32, String)>> {
    let items = match extract_first(GENRE_STRATEGIES, payload) {
        Extracted::Items { items, .. } => items,
        Extracted::Empty => return Some(Vec::new()),
        Extracted::Unrecognized => {
            SchemaMiss::new(SourceId::Catalog, "genres", payload).log();
            return None;
        }
    };

    Some(
        items
            .iter()
            .filter_map(|genre| Some((first_u32(genre, &["id"])?, first_string(genre, &["name"])?)))
            .collect(),
    )
}

/// Season numbers of a series detail payload, ascending.
///
/// Season 0 holds specials and is skipped unless it is the only season.
pub fn season_numbers(payload: &Value) -> Vec<u32> {
    let mut seasons: Vec<u32> = lookup(payload, "seasons")
        .and_then(Value::as_array)
        .map(|seasons| {
            seasons
                .iter()
                .filter_map(|season| first_u32(season, &["season_number"]))
                .collect()
        })
        .unwrap_or_default();

    if seasons.is_empty()
        && let Some(count) = first_u32(payload, &["number_of_seasons"])
    {
        seasons = (1..=count).collect();
    }

    seasons.sort_unstable();
    seasons.dedup();
    if seasons.len() > 1 {
        seasons.retain(|season| *season != 0);
    }
    seasons
}

/// Episodes of one season. Stream refs take the form `series/season/episode`.
pub fn season_episodes(payload: &Value, series_id: &str, season: u32) -> Option<Vec<EpisodeRef>> {
    let items = match extract_first(EPISODE_STRATEGIES, payload) {
        Extracted::Items { items, .. } => items,
        Extracted::Empty => return Some(Vec::new()),
        Extracted::Unrecognized => {
            SchemaMiss::new(SourceId::Catalog, "season", payload).log();
            return None;
        }
    };

    Some(
        items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.is_object())
            .map(|(index, item)| {
                let season_number = first_u32(item, &["season_number"]).unwrap_or(season);
                let episode_number = first_u32(item, &["episode_number"])
                    .unwrap_or_else(|| u32::try_from(index + 1).unwrap_or(u32::MAX));
                EpisodeRef {
                    id: first_string(item, &["id"])
                        .unwrap_or_else(|| format!("{series_id}-s{season_number}e{episode_number}")),
                    title: first_string(item, &["name"])
                        .unwrap_or_else(|| format!("Episode {episode_number}")),
                    episode_number,
                    season_number,
                    cover: first_string(item, &["still_path"])
                        .map(|path| image_url(&path))
                        .unwrap_or_else(|| PLACEHOLDER_COVER.to_string()),
                    stream_ref: format!("{series_id}/{season_number}/{episode_number}"),
                }
            })
            .collect(),
    )
}

/// Splits a catalog stream ref into `(series, season, episode)`.
pub fn parse_stream_ref(stream_ref: &str) -> Option<(&str, u32, u32)> {
    let mut parts = stream_ref.split('/');
    let series = parts.next().filter(|s| !s.is_empty())?;
    let season = parts.next()?.parse().ok()?;
    let episode = parts.next()?.parse().ok()?;
    parts.next().is_none().then_some((series, season, episode))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn table() -> GenreTable {
        GenreTable::from_lists(
            vec![(28, "Action".to_string()), (18, "Drama".to_string())],
            vec![(10759, "Action & Adventure".to_string()), (18, "Drama".to_string())],
        )
    }

    #[test]
    fn test_multi_search_skips_people_and_maps_kinds() {
        let payload = json!({
            "page": 1,
            "results": [
                { "id": 603, "media_type": "movie", "title": "The Matrix", "poster_path": "/m.jpg",
                  "vote_average": 8.2, "release_date": "1999-03-30", "genre_ids": [28, 999] },
                { "id": 5, "media_type": "person", "name": "Keanu Reeves" },
                { "id": 1399, "media_type": "tv", "name": "Game of Thrones", "first_air_date": "2011-04-17",
                  "origin_country": ["US"], "genre_ids": [18] }
            ]
        });

        let items = media_list(&payload, MediaKind::Movie, Some(&table())).unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, "603");
        assert_eq!(items[0].cover, "https://image.tmdb.org/t/p/w500/m.jpg");
        assert_eq!(items[0].genre, vec!["Action"]);
        assert_eq!(items[0].year, 1999);
        assert_eq!(items[1].kind, MediaKind::Series);
        assert_eq!(items[1].country, "US");
        assert_eq!(items[1].genre, vec!["Drama"]);
        assert_eq!(items[1].cover, PLACEHOLDER_COVER);
    }

    #[test]
    fn test_list_shapes() {
        assert_eq!(media_list(&json!({ "results": [] }), MediaKind::Movie, None), Some(Vec::new()));
        assert_eq!(media_list(&json!({ "status_message": "Invalid API key" }), MediaKind::Movie, None), None);
    }

    #[test]
    fn test_page_fields() {
        let payload = json!({ "page": 3, "total_pages": 0, "total_results": 41, "results": [{ "id": 1 }] });
        let page = media_page(&payload, MediaKind::Movie, None, 3);
        assert_eq!(page.page, 3);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.total_items, 41);
        assert_eq!(page.data[0].title, UNKNOWN_TITLE);
    }

    #[test]
    fn test_detail_with_named_genres() {
        let payload = json!({
            "id": 1399, "name": "Game of Thrones", "overview": "Winter is coming.",
            "genres": [{ "id": 18, "name": "Drama" }],
            "production_countries": [{ "iso_3166_1": "GB", "name": "United Kingdom" }]
        });
        let item = media_detail(&payload, MediaKind::Series, None).unwrap();
        assert_eq!(item.genre, vec!["Drama"]);
        assert_eq!(item.country, "GB");
        assert_eq!(item.synopsis, "Winter is coming.");
        assert!(media_detail(&json!({ "success": false }), MediaKind::Movie, None).is_none());
    }

    #[test]
    fn test_season_numbers_skip_specials() {
        let payload = json!({ "seasons": [{ "season_number": 2 }, { "season_number": 0 }, { "season_number": 1 }] });
        assert_eq!(season_numbers(&payload), vec![1, 2]);
        assert_eq!(season_numbers(&json!({ "seasons": [{ "season_number": 0 }] })), vec![0]);
        assert_eq!(season_numbers(&json!({ "number_of_seasons": 3 })), vec![1, 2, 3]);
    }

    #[test]
    fn test_season_episodes() {
        let payload = json!({ "episodes": [
            { "id": 63056, "name": "Winter Is Coming", "episode_number": 1, "season_number": 1, "still_path": "/s.jpg" },
            { "episode_number": 2 }
        ]});
        let episodes = season_episodes(&payload, "1399", 1).unwrap();
        assert_eq!(episodes[0].id, "63056");
        assert_eq!(episodes[0].stream_ref, "1399/1/1");
        assert_eq!(episodes[1].id, "1399-s1e2");
        assert_eq!(episodes[1].title, "Episode 2");
        assert_eq!(parse_stream_ref("1399/1/2"), Some(("1399", 1, 2)));
        assert_eq!(parse_stream_ref("1399/x/2"), None);
    }

    #[test]
    fn test_genre_list() {
        let payload = json!({ "genres": [{ "id": 28, "name": "Action" }, { "name": "broken" }] });
        assert_eq!(genre_list(&payload), Some(vec![(28, "Action".to_string())]));
    }
}
