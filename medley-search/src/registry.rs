//! Deterministic generation and ranking of streaming provider candidates.
//!
//! Catalog content gets a hand-ordered list of embed URL templates. Scraper
//! content gets whatever servers its upstream reported, tiered by name. Either
//! way the output is fully sorted by `(tier, priority)` before it is returned.

use serde::Serialize;
use tracing::debug;

use crate::normalize::catalog::parse_stream_ref;
use crate::types::{EpisodeRef, MediaKind, MediaRef, ServerEntry, StreamingProvider};

/// Lowest-ranked tier, used for servers matching no known pattern.
pub const BACKUP_TIER: u8 = 4;

/// Embed URL template for catalog content.
///
/// `{id}`, `{season}` and `{episode}` are substituted.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderTemplate {
    pub name: &'static str,
    pub tier: u8,
    pub movie: &'static str,
    pub series: &'static str,
    pub quality: &'static str,
    pub language: &'static str,
}

const fn template(
    name: &'static str,
    tier: u8,
    movie: &'static str,
    series: &'static str,
) -> ProviderTemplate {
    ProviderTemplate {
        name,
        tier,
        movie,
        series,
        quality: "auto",
        language: "multi",
    }
}

/// Master ordering. A template's position is its priority.
pub const CATALOG_TEMPLATES: &[ProviderTemplate] = &[
    template(
        "VidSrc",
        1,
        "https://vidsrc.xyz/embed/movie/{id}",
        "https://vidsrc.xyz/embed/tv/{id}/{season}/{episode}",
    ),
    template(
        "VidSrc Pro",
        1,
        "https://vidsrc.to/embed/movie/{id}",
        "https://vidsrc.to/embed/tv/{id}/{season}/{episode}",
    ),
    template(
        "VidLink",
        1,
        "https://vidlink.pro/movie/{id}",
        "https://vidlink.pro/tv/{id}/{season}/{episode}",
    ),
    template(
        "2Embed",
        2,
        "https://www.2embed.cc/embed/{id}",
        "https://www.2embed.cc/embedtv/{id}&s={season}&e={episode}",
    ),
    template(
        "MultiEmbed",
        2,
        "https://multiembed.mov/?video_id={id}&tmdb=1",
        "https://multiembed.mov/?video_id={id}&tmdb=1&s={season}&e={episode}",
    ),
    template(
        "AutoEmbed",
        2,
        "https://player.autoembed.cc/embed/movie/{id}",
        "https://player.autoembed.cc/embed/tv/{id}/{season}/{episode}",
    ),
    template(
        "Embed.su",
        2,
        "https://embed.su/embed/movie/{id}",
        "https://embed.su/embed/tv/{id}/{season}/{episode}",
    ),
    template(
        "MoviesAPI",
        3,
        "https://moviesapi.club/movie/{id}",
        "https://moviesapi.club/tv/{id}-{season}-{episode}",
    ),
    template(
        "SmashyStream",
        3,
        "https://player.smashy.stream/movie/{id}",
        "https://player.smashy.stream/tv/{id}?s={season}&e={episode}",
    ),
];

/// Name fragments per tier, checked in tier order.
const SERVER_TIERS: &[(u8, &[&str])] = &[
    (1, &["vidstreaming", "megacloud", "hd-1", "vidplay", "rapidcloud"]),
    (2, &["vidcloud", "streamtape", "filemoon", "hd-2", "streamsb", "upcloud"]),
    (3, &["mp4upload", "dood", "mixdrop", "hd-3", "voe", "streamwish"]),
];

const QUALITY_MARKERS: &[(&str, &str)] = &[
    ("2160", "2160p"),
    ("4k", "2160p"),
    ("1080", "1080p"),
    ("720", "720p"),
    ("480", "480p"),
    ("360", "360p"),
];

/// Tier for a scraper server name. Unknown names fall to [`BACKUP_TIER`].
pub fn tier_for(name: &str) -> u8 {
    let name = name.to_lowercase();
    SERVER_TIERS
        .iter()
        .find(|(_, patterns)| patterns.iter().any(|pattern| name.contains(pattern)))
        .map_or(BACKUP_TIER, |(tier, _)| *tier)
}

/// Resolution advertised in a server name, else `auto`.
pub fn quality_for(name: &str) -> &'static str {
    let name = name.to_lowercase();
    QUALITY_MARKERS
        .iter()
        .find(|(marker, _)| name.contains(marker))
        .map_or("auto", |(_, quality)| *quality)
}

/// `dub` when the server name mentions it, else `sub`.
pub fn language_for(name: &str) -> &'static str {
    if name.to_lowercase().contains("dub") {
        "dub"
    } else {
        "sub"
    }
}

/// Generates ranked provider lists.
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    templates: Vec<ProviderTemplate>,
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::with_templates(CATALOG_TEMPLATES.to_vec())
    }

    /// Registry with a custom master template ordering.
    pub fn with_templates(templates: Vec<ProviderTemplate>) -> Self {
        Self { templates }
    }

    pub fn templates(&self) -> &[ProviderTemplate] {
        &self.templates
    }

    /// Ranked providers for a media item.
    ///
    /// Catalog kinds expand the templates; a series without an episode targets
    /// season 1 episode 1. Scraper kinds rank `servers` as reported upstream.
    pub fn list_providers(
        &self,
        media: &MediaRef,
        episode: Option<&EpisodeRef>,
        servers: &[ServerEntry],
    ) -> Vec<StreamingProvider> {
        match media.kind {
            MediaKind::Movie => self.catalog_providers(&media.id, None),
            MediaKind::Series => {
                let target = episode.map_or((1, 1), |episode| {
                    parse_stream_ref(&episode.stream_ref)
                        .map(|(_, season, number)| (season, number))
                        .unwrap_or((episode.season_number.max(1), episode.episode_number.max(1)))
                });
                self.catalog_providers(&media.id, Some(target))
            }
            MediaKind::Anime | MediaKind::Hentai => self.server_providers(servers),
        }
    }

    /// Expands every template for a catalog id.
    pub fn catalog_providers(&self, id: &str, episode: Option<(u32, u32)>) -> Vec<StreamingProvider> {
        let encoded_id = urlencoding::encode(id);
        let providers = self
            .templates
            .iter()
            .enumerate()
            .map(|(position, template)| {
                let url = match episode {
                    None => template.movie.replace("{id}", &encoded_id),
                    Some((season, number)) => template
                        .series
                        .replace("{id}", &encoded_id)
                        .replace("{season}", &season.to_string())
                        .replace("{episode}", &number.to_string()),
                };
                StreamingProvider {
                    name: template.name.to_string(),
                    url,
                    tier: template.tier,
                    priority: priority_of(position),
                    quality: template.quality.to_string(),
                    language: template.language.to_string(),
                    available: true,
                }
            })
            .collect();
        rank(providers)
    }

    /// Tiers upstream-reported servers. Empty URLs are dropped and duplicate
    /// URLs keep their first occurrence. Priority is the upstream position.
    pub fn server_providers(&self, servers: &[ServerEntry]) -> Vec<StreamingProvider> {
        let mut seen = std::collections::HashSet::new();
        let providers: Vec<StreamingProvider> = servers
            .iter()
            .enumerate()
            .filter(|&(_, server)| !server.url.trim().is_empty())
            .filter(|&(_, server)| seen.insert(server.url.trim()))
            .map(|(position, server)| StreamingProvider {
                name: server.name.clone(),
                url: server.url.trim().to_string(),
                tier: tier_for(&server.name),
                priority: priority_of(position),
                quality: quality_for(&server.name).to_string(),
                language: language_for(&server.name).to_string(),
                available: true,
            })
            .collect();

        if providers.len() < servers.len() {
            debug!(
                "Dropped {} empty or duplicate servers",
                servers.len() - providers.len()
            );
        }
        rank(providers)
    }
}

fn priority_of(position: usize) -> u32 {
    u32::try_from(position).unwrap_or(u32::MAX)
}

/// Full stable sort by `(tier, priority)`.
pub fn rank(mut providers: Vec<StreamingProvider>) -> Vec<StreamingProvider> {
    providers.sort_by_key(StreamingProvider::rank_key);
    providers
}
