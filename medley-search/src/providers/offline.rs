//! Deterministic offline payloads for development mode.
//!
//! Served by the upstream client only after every host failed in development
//! mode. Each stub answers with the same shape the real upstream uses for the
//! requested route, so the normalizers run unchanged.

use medley_core::Endpoint;
use medley_core::upstream::OfflineStub;
use serde_json::{Value, json};

use super::match_route;
use super::scraper::ScraperProfile;
use crate::normalize::scraper::Envelope;

struct CatalogSample {
    id: u32,
    tv: bool,
    title: &'static str,
    overview: &'static str,
    date: &'static str,
    rating: f32,
    genre_ids: &'static [u32],
}

const CATALOG_SAMPLES: &[CatalogSample] = &[
    CatalogSample {
        id: 157336,
        tv: false,
        title: "Interstellar",
        overview: "A team of explorers travel through a wormhole in space in an attempt to ensure humanity's survival.",
        date: "2014-11-05",
        rating: 8.4,
        genre_ids: &[12, 18, 878],
    },
    CatalogSample {
        id: 603,
        tv: false,
        title: "The Matrix",
        overview: "A computer hacker learns about the true nature of his reality and his role in the war against its controllers.",
        date: "1999-03-30",
        rating: 8.2,
        genre_ids: &[28, 878],
    },
    CatalogSample {
        id: 27205,
        tv: false,
        title: "Inception",
        overview: "A thief who steals corporate secrets through dream-sharing technology is given the inverse task of planting an idea.",
        date: "2010-07-15",
        rating: 8.4,
        genre_ids: &[28, 878, 12],
    },
    CatalogSample {
        id: 438631,
        tv: false,
        title: "Dune",
        overview: "Paul Atreides leads nomadic tribes in a revolt to free their desert world from the emperor's rule.",
        date: "2021-09-15",
        rating: 7.8,
        genre_ids: &[878, 12],
    },
    CatalogSample {
        id: 1396,
        tv: true,
        title: "Breaking Bad",
        overview: "A chemistry teacher diagnosed with cancer turns to manufacturing methamphetamine.",
        date: "2008-01-20",
        rating: 8.9,
        genre_ids: &[18, 80],
    },
    CatalogSample {
        id: 70523,
        tv: true,
        title: "Dark",
        overview: "A missing child sets four families on a frantic hunt for answers across generations.",
        date: "2017-12-01",
        rating: 8.4,
        genre_ids: &[80, 18, 10765],
    },
];

const MOVIE_GENRES: &[(u32, &str)] = &[(28, "Action"), (12, "Adventure"), (18, "Drama"), (878, "Science Fiction")];
const TV_GENRES: &[(u32, &str)] = &[(18, "Drama"), (80, "Crime"), (10765, "Sci-Fi & Fantasy")];

impl CatalogSample {
    fn matches(&self, kind: &str) -> bool {
        match kind {
            "movie" => !self.tv,
            "tv" => self.tv,
            _ => true,
        }
    }

    fn to_json(&self, tagged: bool) -> Value {
        let mut item = json!({
            "id": self.id,
            "overview": self.overview,
            "vote_average": self.rating,
            "genre_ids": self.genre_ids,
            "poster_path": format!("/offline/{}.jpg", self.id),
        });
        if self.tv {
            item["name"] = json!(self.title);
            item["first_air_date"] = json!(self.date);
            item["origin_country"] = json!(["US"]);
        } else {
            item["title"] = json!(self.title);
            item["release_date"] = json!(self.date);
        }
        if tagged {
            item["media_type"] = json!(if self.tv { "tv" } else { "movie" });
        }
        item
    }
}

fn genre_list(genres: &[(u32, &str)]) -> Value {
    json!({ "genres": genres.iter().map(|(id, name)| json!({ "id": id, "name": name })).collect::<Vec<_>>() })
}

fn catalog_page(items: Vec<Value>) -> Value {
    json!({ "page": 1, "total_pages": 1, "total_results": items.len(), "results": items })
}

/// Offline stand-in for the general catalog.
#[derive(Debug, Clone, Copy, Default)]
pub struct CatalogStub;

impl CatalogStub {
    fn list(kind: &str, tagged: bool, filter: impl Fn(&CatalogSample) -> bool) -> Value {
        catalog_page(
            CATALOG_SAMPLES
                .iter()
                .filter(|sample| sample.matches(kind) && filter(sample))
                .map(|sample| sample.to_json(tagged))
                .collect(),
        )
    }

    fn detail(kind: &str, id: &str) -> Value {
        let sample = CATALOG_SAMPLES
            .iter()
            .find(|sample| sample.matches(kind) && sample.id.to_string() == id);

        let mut detail = match sample {
            Some(sample) => sample.to_json(false),
            None if kind == "tv" => json!({ "id": id, "name": format!("Offline Series {id}") }),
            None => json!({ "id": id, "title": format!("Offline Movie {id}") }),
        };
        if kind == "tv" {
            detail["number_of_seasons"] = json!(2);
            detail["seasons"] = json!([{ "season_number": 0 }, { "season_number": 1 }, { "season_number": 2 }]);
        }
        detail
    }

    fn season(id: &str, season: &str) -> Value {
        let season: u32 = season.parse().unwrap_or(1);
        let episodes: Vec<Value> = (1..=3)
            .map(|number| {
                json!({
                    "id": format!("{id}{season:02}{number:02}"),
                    "name": format!("Episode {number}"),
                    "season_number": season,
                    "episode_number": number,
                })
            })
            .collect();
        json!({ "season_number": season, "episodes": episodes })
    }
}

impl OfflineStub for CatalogStub {
    fn payload(&self, endpoint: &Endpoint) -> Value {
        let parts: Vec<&str> = endpoint.path().split('/').filter(|p| !p.is_empty()).collect();

        match parts.as_slice() {
            ["genre", "movie", "list"] => genre_list(MOVIE_GENRES),
            ["genre", "tv", "list"] => genre_list(TV_GENRES),
            ["search", kind] => {
                let query = endpoint.query_value("query").unwrap_or_default().to_lowercase();
                Self::list(kind, *kind == "multi", |sample| {
                    sample.title.to_lowercase().contains(&query)
                })
            }
            ["trending", kind, ..] => Self::list(kind, false, |_| true),
            ["discover", kind] => {
                let genre = endpoint
                    .query_value("with_genres")
                    .and_then(|g| g.parse::<u32>().ok());
                Self::list(kind, false, |sample| {
                    genre.is_none_or(|genre| sample.genre_ids.contains(&genre))
                })
            }
            [kind @ ("movie" | "tv"), id] => Self::detail(kind, id),
            ["tv", id, "season", season] => Self::season(id, season),
            _ => catalog_page(Vec::new()),
        }
    }
}

const SCRAPER_TITLES: &[(&str, &str, &[&str])] = &[
    ("frieren", "Frieren: Beyond Journey's End", &["Adventure", "Fantasy"]),
    ("cowboy-bebop", "Cowboy Bebop", &["Action", "Sci-Fi"]),
    ("mob-psycho-100", "Mob Psycho 100", &["Action", "Comedy"]),
];

/// Offline stand-in for one scraper upstream.
#[derive(Debug, Clone, Copy)]
pub struct ScraperStub {
    profile: ScraperProfile,
}

impl ScraperStub {
    pub fn new(profile: ScraperProfile) -> Self {
        Self { profile }
    }

    fn wrap(&self, body: Value) -> Value {
        match self.profile.shape.envelope {
            Envelope::Status => json!({ "status": "success", "data": body }),
            Envelope::Bare => body,
        }
    }

    fn item(&self, slug: &str, title: &str, genres: &[&str]) -> Value {
        json!({
            "slug": format!("{}-{slug}", self.profile.shape.source),
            "title": title,
            "cover": format!("https://offline.medley.invalid/{}/{slug}.jpg", self.profile.shape.source),
            "genres": genres,
            "synopsis": format!("Offline sample from {}.", self.profile.shape.source),
        })
    }

    fn list(&self, query: Option<&str>) -> Value {
        let query = query.map(str::to_lowercase).unwrap_or_default();
        let items: Vec<Value> = SCRAPER_TITLES
            .iter()
            .filter(|(_, title, _)| title.to_lowercase().contains(&query))
            .map(|(slug, title, genres)| self.item(slug, title, genres))
            .collect();

        let field = self.profile.shape.list_fields.first().copied().unwrap_or("data");
        let mut body = json!({ "currentPage": 1, "hasNextPage": false });
        body[field] = Value::Array(items);
        body
    }

    fn named(fields: &[&str], items: Vec<Value>) -> Value {
        let field = fields.first().copied().unwrap_or("data");
        let mut body = json!({});
        body[field] = Value::Array(items);
        body
    }
}

impl OfflineStub for ScraperStub {
    fn payload(&self, endpoint: &Endpoint) -> Value {
        let routes = &self.profile.routes;
        let shape = &self.profile.shape;
        let path = endpoint.path();

        let body = if let Some(id) = match_route(routes.episodes, path) {
            Self::named(
                shape.episode_fields,
                (1..=3)
                    .map(|n| json!({ "id": format!("{id}-episode-{n}"), "title": format!("Episode {n}"), "number": n }))
                    .collect(),
            )
        } else if let Some(id) = match_route(routes.servers, path) {
            Self::named(
                shape.server_fields,
                ["HD-1", "HD-2"]
                    .iter()
                    .enumerate()
                    .map(|(i, name)| {
                        json!({ "name": name, "url": format!("https://offline.medley.invalid/embed/{id}?server={}", i + 1) })
                    })
                    .collect(),
            )
        } else if let Some(id) = match_route(routes.detail, path) {
            json!({
                "slug": id,
                "title": format!("Offline {id}"),
                "synopsis": format!("Offline sample from {}.", shape.source),
            })
        } else if match_route(routes.search, path).is_some() {
            self.list(endpoint.query_value(routes.search_param))
        } else {
            self.list(None)
        };

        self.wrap(body)
    }
}
