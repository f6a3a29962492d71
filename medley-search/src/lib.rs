//! Medley Search - Multi-source media resolution

#![deny(clippy::missing_panics_doc)]
#![warn(clippy::too_many_lines)]
//!
//! Resolves movies, series, anime and hentai across a catalog API and four
//! scraper upstreams, normalizes their heterogeneous payloads into one model,
//! and turns resolved media into a ranked list of streaming providers.

pub mod context;
pub mod errors;
pub mod fallback;
pub mod genres;
pub mod normalize;
pub mod orchestrator;
pub mod probe;
pub mod providers;
pub mod registry;
pub mod types;

// Re-export main types
pub use context::ResolutionContext;
pub use errors::ResolveError;
pub use genres::{GenreIndex, GenreTable};
pub use orchestrator::ResolutionOrchestrator;
pub use probe::{AvailabilityProbe, ProbeCache};
pub use registry::ProviderRegistry;
pub use types::{EpisodeRef, MediaItem, MediaKind, MediaRef, PaginatedResult, ServerEntry, SourceId, StreamingProvider};

/// Convenience type alias for Results with ResolveError.
pub type Result<T> = std::result::Result<T, ResolveError>;
