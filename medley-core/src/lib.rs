//! Medley Core - configuration and upstream plumbing
//!
//! Provides the pieces every Medley source adapter builds on: runtime mode,
//! centralized configuration, tracing setup and the bounded-time
//! [`UpstreamClient`](upstream::UpstreamClient) with host fallback.

pub mod config;
pub mod mode;
pub mod tracing_setup;
pub mod upstream;

pub use config::{MedleyConfig, SourceEndpoints};
pub use mode::{RuntimeMode, UnknownMode};
pub use upstream::{Endpoint, FetchOptions, RawPayload, UpstreamClient, UpstreamError};

// Re-exported so callers can cancel requests without depending on tokio-util directly.
pub use tokio_util::sync::CancellationToken;
