//! Explicit resolution context constructed once at process start.
//!
//! Owns the source adapters in precedence order, the process-wide genre index
//! and probe cache, and the provider registry. Tests build one from mock
//! adapters; production builds one from [`MedleyConfig`].

use std::sync::Arc;
use std::time::Duration;

use medley_core::config::OrchestratorConfig;
use medley_core::upstream::{OfflineStub, UpstreamClientBuilder};
use medley_core::{MedleyConfig, SourceEndpoints, UpstreamClient, UpstreamError};
use tracing::{info, warn};

use crate::errors::ResolveError;
use crate::genres::GenreIndex;
use crate::probe::{AvailabilityProbe, ProbeCache};
use crate::providers::catalog::API_KEY_PARAM;
use crate::providers::{
    ANIME_BACKUP, ANIME_PRIMARY, CatalogAdapter, CatalogGenres, CatalogStub, HENTAI_BACKUP, HENTAI_PRIMARY,
    ScraperAdapter, ScraperStub, SourceAdapter,
};
use crate::registry::ProviderRegistry;
use crate::types::{MediaKind, MediaRef, SourceId};

/// Everything the orchestrator needs, with no hidden globals.
#[derive(Debug)]
pub struct ResolutionContext {
    adapters: Vec<Arc<dyn SourceAdapter>>,
    genres: Arc<GenreIndex>,
    registry: ProviderRegistry,
    probe: Option<AvailabilityProbe>,
    orchestrator: OrchestratorConfig,
}

impl ResolutionContext {
    /// Context over `adapters`, listed in precedence order.
    pub fn new(adapters: Vec<Arc<dyn SourceAdapter>>, genres: Arc<GenreIndex>) -> Self {
        Self {
            adapters,
            genres,
            registry: ProviderRegistry::new(),
            probe: None,
            orchestrator: OrchestratorConfig::default(),
        }
    }

    pub fn with_registry(mut self, registry: ProviderRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Enables availability annotation of resolved providers.
    pub fn with_probe(mut self, probe: AvailabilityProbe) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn with_orchestrator_config(mut self, orchestrator: OrchestratorConfig) -> Self {
        self.orchestrator = orchestrator;
        self
    }

    /// Builds the catalog adapter and all four scraper adapters.
    ///
    /// Every upstream client shares one connection pool and carries the
    /// offline stub for its family, used only in development mode.
    ///
    /// # Errors
    /// - `ResolveError::Upstream` - HTTP client construction failed or a source has no hosts
    pub fn from_config(config: &MedleyConfig) -> Result<Self, ResolveError> {
        let http = reqwest::Client::builder()
            .user_agent(config.upstream.user_agent.clone())
            .build()
            .map_err(|e| UpstreamError::ClientBuild {
                source_name: "medley".to_string(),
                reason: e.to_string(),
            })?;

        let client = |name: &str, endpoints: &SourceEndpoints, stub: Arc<dyn OfflineStub>| -> UpstreamClientBuilder {
            UpstreamClient::builder(name, endpoints)
                .upstream_config(&config.upstream)
                .mode(config.mode)
                .offline_stub(stub)
                .http_client(http.clone())
        };

        let slowest = config.slowest_branch();
        if config.orchestrator.branch_timeout < slowest {
            warn!(
                "Branch budget {:?} is shorter than the slowest fallback chain ({slowest:?}); \
                 late sources get a reduced share",
                config.orchestrator.branch_timeout
            );
        }

        let sources = &config.sources;
        let catalog_client = client("catalog", &sources.catalog, Arc::new(CatalogStub))
            .api_key_param(API_KEY_PARAM)
            .build()?;
        let genres = Arc::new(GenreIndex::new(Arc::new(CatalogGenres::new(catalog_client.clone()))));

        let mut adapters: Vec<Arc<dyn SourceAdapter>> =
            vec![Arc::new(CatalogAdapter::new(catalog_client, Arc::clone(&genres)))];
        for (profile, endpoints) in [
            (ANIME_PRIMARY, &sources.anime_primary),
            (ANIME_BACKUP, &sources.anime_backup),
            (HENTAI_PRIMARY, &sources.hentai_primary),
            (HENTAI_BACKUP, &sources.hentai_backup),
        ] {
            let source = profile.shape.source;
            let scraper_client = client(source.as_str(), endpoints, Arc::new(ScraperStub::new(profile))).build()?;
            adapters.push(Arc::new(ScraperAdapter::new(profile, scraper_client)));
        }

        info!(
            "Resolution context ready: mode {}, {} sources, probe {}",
            config.mode,
            adapters.len(),
            if config.probe.enabled { "on" } else { "off" }
        );

        let mut context = Self::new(adapters, genres).with_orchestrator_config(config.orchestrator.clone());
        if config.probe.enabled {
            context = context.with_probe(AvailabilityProbe::new(
                http,
                config.probe.timeout,
                Arc::new(ProbeCache::new()),
            ));
        }
        Ok(context)
    }

    pub fn adapters(&self) -> &[Arc<dyn SourceAdapter>] {
        &self.adapters
    }

    /// Adapters serving `kind`, in precedence order.
    pub fn sources_for(&self, kind: MediaKind) -> Vec<Arc<dyn SourceAdapter>> {
        self.adapters
            .iter()
            .filter(|adapter| adapter.serves(kind))
            .cloned()
            .collect()
    }

    /// Fallback chain for a reference: its owning source first, then the
    /// other sources serving the same kind in precedence order.
    pub fn chain_for(&self, media: &MediaRef) -> Vec<Arc<dyn SourceAdapter>> {
        self.chain_from(media.kind, media.source)
    }

    /// Sources serving `kind` with `first` moved to the front.
    pub fn chain_from(&self, kind: MediaKind, first: SourceId) -> Vec<Arc<dyn SourceAdapter>> {
        let mut chain = self.sources_for(kind);
        if let Some(position) = chain.iter().position(|adapter| adapter.id() == first) {
            let owner = chain.remove(position);
            chain.insert(0, owner);
        }
        chain
    }

    pub fn genres(&self) -> &Arc<GenreIndex> {
        &self.genres
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn probe(&self) -> Option<&AvailabilityProbe> {
        self.probe.as_ref()
    }

    /// Budget for one fan-out branch including its fallback chain.
    pub fn branch_timeout(&self) -> Duration {
        self.orchestrator.branch_timeout
    }
}
