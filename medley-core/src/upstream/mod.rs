//! Resilient access to third-party HTTP APIs.
//!
//! One [`UpstreamClient`] exists per upstream family. It knows nothing about
//! response shapes; normalization happens in the search crate.

mod client;
mod endpoint;
mod error;

pub use client::{FetchOptions, OfflineStub, PayloadOrigin, RawPayload, UpstreamClient, UpstreamClientBuilder};
pub use endpoint::{ApiKey, Endpoint};
pub use error::{FailureKind, HostFailure, UpstreamError};
