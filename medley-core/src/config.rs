//! Centralized configuration for Medley.
//!
//! Time budgets, upstream hosts and probe settings live here so adapters and
//! the orchestrator never hard-code them.

use std::time::Duration;

use crate::mode::RuntimeMode;

/// Central configuration for all Medley components.
///
/// Supports `MEDLEY_*` environment variable overrides on top of the defaults.
#[derive(Debug, Clone, Default)]
pub struct MedleyConfig {
    pub mode: RuntimeMode,
    pub upstream: UpstreamConfig,
    pub sources: SourcesConfig,
    pub probe: ProbeConfig,
    pub orchestrator: OrchestratorConfig,
}

/// Time budgets and identity for upstream HTTP requests.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Budget for the request against the primary host
    pub request_timeout: Duration,
    /// Budget for each fallback host attempt
    pub fallback_timeout: Duration,
    /// User agent sent with every request
    pub user_agent: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(12),
            fallback_timeout: Duration::from_secs(10),
            user_agent: format!("medley/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl UpstreamConfig {
    /// Longest one fetch against `endpoints` can take before every host has
    /// been given up on.
    pub fn worst_case_fetch(&self, endpoints: &SourceEndpoints) -> Duration {
        let fallbacks = u32::try_from(endpoints.fallback_hosts.len()).unwrap_or(u32::MAX);
        self.request_timeout
            .saturating_add(self.fallback_timeout.saturating_mul(fallbacks))
    }
}

/// Hosts serving one logical upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEndpoints {
    /// Primary base URL, including any path prefix (e.g. `/3`)
    pub base_url: String,
    /// Alternate base URLs tried in order after the primary fails
    pub fallback_hosts: Vec<String>,
    /// API key appended as a query parameter, when the upstream wants one
    pub api_key: Option<String>,
}

impl SourceEndpoints {
    /// Endpoints with no fallbacks and no key.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            fallback_hosts: Vec::new(),
            api_key: None,
        }
    }

    /// Adds alternate hosts, keeping configured order.
    pub fn with_fallbacks<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fallback_hosts.extend(hosts.into_iter().map(Into::into));
        self
    }

    /// Sets the API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }
}

/// Endpoints for every upstream family Medley aggregates.
#[derive(Debug, Clone)]
pub struct SourcesConfig {
    /// General movie/TV catalog API
    pub catalog: SourceEndpoints,
    /// Structured (`{status, data}`) anime scraper
    pub anime_primary: SourceEndpoints,
    /// Unstructured anime scraper
    pub anime_backup: SourceEndpoints,
    /// Structured hentai scraper
    pub hentai_primary: SourceEndpoints,
    /// Unstructured hentai scraper
    pub hentai_backup: SourceEndpoints,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            catalog: SourceEndpoints::new("https://api.themoviedb.org/3")
                .with_fallbacks(["https://api.tmdb.org/3"]),
            anime_primary: SourceEndpoints::new("https://anime-api.medley.stream/api")
                .with_fallbacks(["https://anime-api-mirror.medley.stream/api"]),
            anime_backup: SourceEndpoints::new("https://anime-scrape.medley.stream"),
            hentai_primary: SourceEndpoints::new("https://hentai-api.medley.stream/api")
                .with_fallbacks(["https://hentai-api-mirror.medley.stream/api"]),
            hentai_backup: SourceEndpoints::new("https://hentai-scrape.medley.stream"),
        }
    }
}

/// Availability probe configuration.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Probe candidate providers while resolving them
    pub enabled: bool,
    /// Budget for a single probe request
    pub timeout: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            timeout: Duration::from_secs(3),
        }
    }
}

/// Fan-out behaviour of the resolution orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Budget for one fan-out branch including its whole fallback chain
    pub branch_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            branch_timeout: Duration::from_secs(45),
        }
    }
}

impl MedleyConfig {
    /// Creates configuration with environment variable overrides.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Creates configuration from an arbitrary key lookup.
    ///
    /// Unparseable values are logged and ignored so a typo never prevents startup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(mode) = lookup("MEDLEY_MODE") {
            match mode.parse() {
                Ok(mode) => config.mode = mode,
                Err(reason) => tracing::warn!("Ignoring MEDLEY_MODE: {reason}"),
            }
        }

        if let Some(timeout) = parse_seconds(&lookup, "MEDLEY_REQUEST_TIMEOUT") {
            config.upstream.request_timeout = timeout;
        }
        if let Some(timeout) = parse_seconds(&lookup, "MEDLEY_FALLBACK_TIMEOUT") {
            config.upstream.fallback_timeout = timeout;
        }
        if let Some(timeout) = parse_seconds(&lookup, "MEDLEY_BRANCH_TIMEOUT") {
            config.orchestrator.branch_timeout = timeout;
        }
        if let Some(timeout) = parse_seconds(&lookup, "MEDLEY_PROBE_TIMEOUT") {
            config.probe.timeout = timeout;
        }

        if let Some(enabled) = lookup("MEDLEY_PROBE_ENABLED") {
            match enabled.trim().parse::<bool>() {
                Ok(enabled) => config.probe.enabled = enabled,
                Err(_) => tracing::warn!("Ignoring MEDLEY_PROBE_ENABLED: '{enabled}'"),
            }
        }

        if let Some(key) = lookup("MEDLEY_CATALOG_API_KEY").filter(|k| !k.trim().is_empty()) {
            config.sources.catalog.api_key = Some(key.trim().to_string());
        }

        let sources = &mut config.sources;
        for (prefix, endpoints) in [
            ("MEDLEY_CATALOG", &mut sources.catalog),
            ("MEDLEY_ANIME_PRIMARY", &mut sources.anime_primary),
            ("MEDLEY_ANIME_BACKUP", &mut sources.anime_backup),
            ("MEDLEY_HENTAI_PRIMARY", &mut sources.hentai_primary),
            ("MEDLEY_HENTAI_BACKUP", &mut sources.hentai_backup),
        ] {
            apply_endpoint_overrides(&lookup, prefix, endpoints);
        }

        config
    }

    /// Longest a fan-out branch can take walking its whole fallback chain
    /// when every host hangs until its own timeout.
    pub fn slowest_branch(&self) -> Duration {
        let sources = &self.sources;
        [
            vec![&sources.catalog],
            vec![&sources.anime_primary, &sources.anime_backup],
            vec![&sources.hentai_primary, &sources.hentai_backup],
        ]
        .into_iter()
        .map(|chain| {
            chain
                .into_iter()
                .fold(Duration::ZERO, |total, endpoints| {
                    total.saturating_add(self.upstream.worst_case_fetch(endpoints))
                })
        })
        .max()
        .unwrap_or(Duration::ZERO)
    }

    /// Creates a configuration with short budgets for tests.
    ///
    /// Stays in production mode so upstream failures remain visible.
    pub fn for_testing() -> Self {
        Self {
            mode: RuntimeMode::Production,
            upstream: UpstreamConfig {
                request_timeout: Duration::from_millis(500),
                fallback_timeout: Duration::from_millis(500),
                ..Default::default()
            },
            probe: ProbeConfig {
                enabled: false,
                timeout: Duration::from_millis(300),
            },
            orchestrator: OrchestratorConfig {
                branch_timeout: Duration::from_secs(2),
            },
            ..Default::default()
        }
    }

    /// Creates a configuration for local development with offline stubs.
    pub fn for_development() -> Self {
        Self {
            mode: RuntimeMode::Development,
            ..Default::default()
        }
    }
}

fn parse_seconds<F>(lookup: &F, key: &str) -> Option<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<u64>() {
        Ok(seconds) if seconds > 0 => Some(Duration::from_secs(seconds)),
        _ => {
            tracing::warn!("Ignoring {key}: expected positive seconds, got '{raw}'");
            None
        }
    }
}

fn apply_endpoint_overrides<F>(lookup: &F, prefix: &str, endpoints: &mut SourceEndpoints)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup(&format!("{prefix}_URL")).filter(|u| !u.trim().is_empty()) {
        endpoints.base_url = url.trim().trim_end_matches('/').to_string();
    }

    if let Some(hosts) = lookup(&format!("{prefix}_FALLBACKS")) {
        endpoints.fallback_hosts = hosts
            .split(',')
            .map(|host| host.trim().trim_end_matches('/'))
            .filter(|host| !host.is_empty())
            .map(str::to_string)
            .collect();
    }
}
