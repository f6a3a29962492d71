//! Best-effort liveness checks for streaming provider URLs.
//!
//! A probe is a short `HEAD` request. Only definite answers mark a URL
//! unavailable: a 404/410 or a refused connection. Timeouts and opaque
//! statuses such as 403 or 405 count as available, since embed hosts commonly
//! reject probes they would serve to a browser. Results never reorder a
//! provider list and cannot detect playback-time failures.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use parking_lot::RwLock;
use reqwest::StatusCode;
use tracing::debug;

use crate::types::StreamingProvider;

/// Per-URL probe results for the process lifetime.
///
/// Concurrent probes of the same URL may both write; the last write wins.
#[derive(Debug, Default)]
pub struct ProbeCache {
    entries: RwLock<HashMap<String, bool>>,
}

impl ProbeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, url: &str) -> Option<bool> {
        self.entries.read().get(url).copied()
    }

    pub fn insert(&self, url: impl Into<String>, available: bool) {
        self.entries.write().insert(url.into(), available);
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

/// Probe outcome before caching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Available,
    Unavailable,
    /// No definite answer; treated as available.
    Ambiguous,
}

impl Verdict {
    fn from_status(status: StatusCode) -> Self {
        match status {
            StatusCode::NOT_FOUND | StatusCode::GONE => Verdict::Unavailable,
            status if status.is_success() || status.is_redirection() => Verdict::Available,
            _ => Verdict::Ambiguous,
        }
    }

    fn is_available(self) -> bool {
        self != Verdict::Unavailable
    }
}

/// Memoized availability probe.
#[derive(Debug, Clone)]
pub struct AvailabilityProbe {
    http: reqwest::Client,
    timeout: Duration,
    cache: Arc<ProbeCache>,
}

impl AvailabilityProbe {
    pub fn new(http: reqwest::Client, timeout: Duration, cache: Arc<ProbeCache>) -> Self {
        Self { http, timeout, cache }
    }

    pub fn cache(&self) -> &Arc<ProbeCache> {
        &self.cache
    }

    /// Drops every memoized result.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Whether `url` is likely to load. Cached after the first probe.
    pub async fn is_likely_available(&self, url: &str) -> bool {
        if let Some(available) = self.cache.get(url) {
            return available;
        }

        let verdict = self.probe(url).await;
        debug!("Probed {url}: {verdict:?}");
        let available = verdict.is_available();
        self.cache.insert(url, available);
        available
    }

    /// Probes every provider concurrently and sets `available`. Order is untouched.
    pub async fn annotate(&self, providers: &mut [StreamingProvider]) {
        let verdicts = join_all(
            providers
                .iter()
                .map(|provider| self.is_likely_available(&provider.url)),
        )
        .await;

        for (provider, available) in providers.iter_mut().zip(verdicts) {
            provider.available = available;
        }
    }

    async fn probe(&self, url: &str) -> Verdict {
        match reqwest::Url::parse(url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
            _ => return Verdict::Unavailable,
        }

        match tokio::time::timeout(self.timeout, self.http.head(url).send()).await {
            Err(_) => Verdict::Ambiguous,
            Ok(Ok(response)) => Verdict::from_status(response.status()),
            Ok(Err(e)) if e.is_timeout() => Verdict::Ambiguous,
            Ok(Err(e)) if e.is_connect() => Verdict::Unavailable,
            Ok(Err(_)) => Verdict::Ambiguous,
        }
    }
}
