//! Normalizer for the anime and hentai scraper families.
//!
//! Structured scrapers wrap every payload as `{ status: "success", data }`;
//! anything else is a soft failure that yields an empty result. Unstructured
//! scrapers return a bare array, `{ data }`, `{ results }` or a
//! source-specific field, and the shape may change between calls.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use super::fields::{first_f32, first_object, first_string, first_u32, first_year, slugify, string_list};
use super::strategy::{Extracted, Extraction, enveloped_strategies, extract_first, unstructured_strategies};
use super::SchemaMiss;
use crate::types::{
    EpisodeRef, MediaItem, MediaKind, PLACEHOLDER_COVER, PaginatedResult, ServerEntry, SourceId,
    UNKNOWN_TITLE, sort_episodes,
};

const ID_KEYS: &[&str] = &["slug", "id", "animeId", "anime_id", "mal_id", "url_slug"];
const TITLE_KEYS: &[&str] = &["title", "name", "animeTitle", "title.english", "title.romaji"];
const COVER_KEYS: &[&str] = &["cover", "poster", "image", "img", "thumbnail", "animeImg", "images.jpg.image_url"];
const RATING_KEYS: &[&str] = &["rating", "score"];
const GENRE_KEYS: &[&str] = &["genres", "genre", "tags"];
const COUNTRY_KEYS: &[&str] = &["country", "origin", "countryOfOrigin"];
const YEAR_KEYS: &[&str] = &["year", "releaseDate", "release_date", "released", "aired", "date"];
const SYNOPSIS_KEYS: &[&str] = &["synopsis", "description", "overview", "plot", "summary"];
const DETAIL_KEYS: &[&str] = &["anime", "info", "detail", "result"];

const EPISODE_ID_KEYS: &[&str] = &["id", "episodeId", "episode_id", "slug"];
const EPISODE_NUMBER_KEYS: &[&str] = &["number", "episode", "episodeNumber", "episode_number", "ep"];
const SERVER_NAME_KEYS: &[&str] = &["name", "server", "serverName", "label"];
const SERVER_URL_KEYS: &[&str] = &["url", "link", "src", "file", "iframe", "embed"];

static EPISODE_NUMBER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)(?:episode|ep)[\s._-]*(\d{1,4})").ok());
static TRAILING_NUMBER: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"-(\d{1,4})$").ok());

/// How a scraper wraps its payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Envelope {
    /// `{ status: "success", data: ... }`
    Status,
    /// Payload returned as-is.
    Bare,
}

/// Per-source description of the payload shapes a scraper produces.
#[derive(Debug, Clone, Copy)]
pub struct ScraperShape {
    pub source: SourceId,
    pub kind: MediaKind,
    pub envelope: Envelope,
    /// Source-specific list fields tried after the generic ones
    pub list_fields: &'static [&'static str],
    pub episode_fields: &'static [&'static str],
    pub server_fields: &'static [&'static str],
}

impl ScraperShape {
    fn strategies(&self, named: &'static [&'static str]) -> Vec<Extraction> {
        match self.envelope {
            Envelope::Status => enveloped_strategies(named),
            Envelope::Bare => unstructured_strategies(named),
        }
    }

    /// Body inside the envelope, or `None` for a soft failure.
    fn body<'a>(&self, payload: &'a Value, context: &'static str) -> Option<&'a Value> {
        match self.envelope {
            Envelope::Bare => Some(payload),
            Envelope::Status => {
                let status = first_string(payload, &["status"]);
                if status.as_deref().is_some_and(|s| s.eq_ignore_ascii_case("success")) {
                    payload.get("data")
                } else {
                    debug!(
                        source = %self.source,
                        context,
                        "Soft failure, status {:?}",
                        status.unwrap_or_default()
                    );
                    None
                }
            }
        }
    }

    fn items<'a>(
        &self,
        payload: &'a Value,
        named: &'static [&'static str],
        context: &'static str,
    ) -> Option<&'a [Value]> {
        let body = self.body(payload, context)?;
        match extract_first(&self.strategies(named), body) {
            Extracted::Items { strategy, items } => {
                debug!(source = %self.source, context, "Extracted {} items via {strategy}", items.len());
                Some(items)
            }
            Extracted::Empty => Some(&[][..]),
            Extracted::Unrecognized => {
                SchemaMiss::new(self.source, context, body).log();
                None
            }
        }
    }

    /// Structured payload without a success status.
    fn is_soft_failure(&self, payload: &Value) -> bool {
        self.envelope == Envelope::Status && self.body(payload, "envelope").is_none()
    }
}

/// Maps a list payload. `None` only for an unrecognized shape.
pub fn media_list(shape: &ScraperShape, payload: &Value) -> Option<Vec<MediaItem>> {
    if shape.is_soft_failure(payload) {
        return Some(Vec::new());
    }
    let items = shape.items(payload, shape.list_fields, "list")?;
    Some(
        items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.is_object())
            .map(|(index, item)| media_item(shape, item, None, index))
            .collect(),
    )
}

/// Maps a list payload into a page using whatever paging fields are present.
pub fn media_page(shape: &ScraperShape, payload: &Value, requested_page: u32) -> PaginatedResult<MediaItem> {
    let data = media_list(shape, payload).unwrap_or_default();
    let requested_page = requested_page.max(1);

    let scopes: Vec<&Value> = match shape.body(payload, "page") {
        Some(body) if body.is_object() => vec![body, payload],
        _ => vec![payload],
    };
    let read = |keys: &[&str]| scopes.iter().find_map(|scope| first_u32(scope, keys));

    let page = read(&["page", "currentPage", "current_page"]).unwrap_or(requested_page);
    let has_next = scopes
        .iter()
        .find_map(|scope| scope.get("hasNextPage").and_then(Value::as_bool))
        .unwrap_or(false);
    let total_pages = read(&["totalPages", "total_pages", "lastPage", "last_page", "pages"])
        .unwrap_or(if has_next { page.saturating_add(1) } else { page });
    let total_items = read(&["totalItems", "total_results", "totalResults", "total"])
        .map_or(data.len() as u64, u64::from);

    PaginatedResult::new(data, page, total_pages, total_items)
}

/// Maps a detail payload. The detail object may sit directly in the body,
/// under a wrapper field, or as the first element of an array.
pub fn media_detail(shape: &ScraperShape, payload: &Value, requested_id: &str) -> Option<MediaItem> {
    let body = shape.body(payload, "detail")?;
    let object = match body {
        Value::Array(items) => items.iter().find(|item| item.is_object()),
        Value::Object(_) => first_object(body, DETAIL_KEYS).or(Some(body)),
        _ => None,
    };

    match object {
        Some(object) if first_string(object, ID_KEYS).is_some() || first_string(object, TITLE_KEYS).is_some() => {
            Some(media_item(shape, object, Some(requested_id), 0))
        }
        _ => {
            SchemaMiss::new(shape.source, "detail", body).log();
            None
        }
    }
}

/// Maps one scraper object with every field defaulted.
pub fn media_item(shape: &ScraperShape, item: &Value, fallback_id: Option<&str>, index: usize) -> MediaItem {
    let title = first_string(item, TITLE_KEYS);
    let id = first_string(item, ID_KEYS)
        .or_else(|| fallback_id.map(str::to_string))
        .or_else(|| title.as_deref().map(slugify).filter(|slug| !slug.is_empty()))
        .unwrap_or_else(|| format!("{}-{index}", shape.source));

    let mut media = MediaItem::placeholder(shape.source, shape.kind, id);
    media.title = title.unwrap_or_else(|| UNKNOWN_TITLE.to_string());
    media.cover = first_string(item, COVER_KEYS).unwrap_or_else(|| PLACEHOLDER_COVER.to_string());
    media.rating = first_f32(item, RATING_KEYS).unwrap_or(0.0);
    media.genre = string_list(item, GENRE_KEYS);
    media.country = first_string(item, COUNTRY_KEYS).unwrap_or_default();
    media.year = first_year(item, YEAR_KEYS).unwrap_or(0);
    media.synopsis = first_string(item, SYNOPSIS_KEYS).unwrap_or_default();
    media
}

/// Maps an episode list, sorted by episode number with ties in upstream order.
///
/// Episodes may also arrive nested in a detail payload, so the detail wrappers
/// are searched when the body itself holds no list.
pub fn episodes(shape: &ScraperShape, payload: &Value, media_id: &str) -> Option<Vec<EpisodeRef>> {
    if shape.is_soft_failure(payload) {
        return Some(Vec::new());
    }

    let items = match shape.items(payload, shape.episode_fields, "episodes") {
        Some(items) => items,
        None => {
            let body = shape.body(payload, "episodes")?;
            let nested = first_object(body, DETAIL_KEYS)?;
            match extract_first(&unstructured_strategies(shape.episode_fields), nested) {
                Extracted::Items { items, .. } => items,
                Extracted::Empty => &[][..],
                Extracted::Unrecognized => return None,
            }
        }
    };

    let mut episodes: Vec<EpisodeRef> = items
        .iter()
        .enumerate()
        .filter(|(_, item)| item.is_object())
        .map(|(index, item)| episode(item, media_id, index))
        .collect();
    sort_episodes(&mut episodes);
    Some(episodes)
}

fn episode(item: &Value, media_id: &str, index: usize) -> EpisodeRef {
    let id = first_string(item, EPISODE_ID_KEYS);
    let title = first_string(item, &["title", "name"]);

    let episode_number = first_u32(item, EPISODE_NUMBER_KEYS)
        .or_else(|| title.as_deref().and_then(episode_number_in))
        .or_else(|| id.as_deref().and_then(episode_number_in))
        .unwrap_or_else(|| u32::try_from(index + 1).unwrap_or(u32::MAX));

    let id = id.unwrap_or_else(|| format!("{media_id}-episode-{episode_number}"));
    EpisodeRef {
        stream_ref: id.clone(),
        id,
        title: title.unwrap_or_else(|| format!("Episode {episode_number}")),
        episode_number,
        season_number: 0,
        cover: first_string(item, COVER_KEYS).unwrap_or_else(|| PLACEHOLDER_COVER.to_string()),
    }
}

/// Episode number embedded in a title or slug such as `Ep 12` or `show-12`.
pub fn episode_number_in(text: &str) -> Option<u32> {
    let captured = |re: &LazyLock<Option<Regex>>| {
        re.as_ref()?
            .captures(text)?
            .get(1)?
            .as_str()
            .parse::<u32>()
            .ok()
    };
    captured(&EPISODE_NUMBER).or_else(|| captured(&TRAILING_NUMBER))
}

/// Server name and URL pairs in upstream order. Empty URLs are kept here and
/// dropped by the provider registry.
pub fn servers(shape: &ScraperShape, payload: &Value) -> Option<Vec<ServerEntry>> {
    if shape.is_soft_failure(payload) {
        return Some(Vec::new());
    }
    let items = shape.items(payload, shape.server_fields, "servers")?;
    Some(
        items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.is_object())
            .map(|(index, item)| ServerEntry {
                name: first_string(item, SERVER_NAME_KEYS).unwrap_or_else(|| format!("Server {}", index + 1)),
                url: first_string(item, SERVER_URL_KEYS).unwrap_or_default(),
            })
            .collect(),
    )
}
