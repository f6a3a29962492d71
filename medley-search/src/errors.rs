//! Error types for media resolution.

use std::time::Duration;

use medley_core::UpstreamError;
use thiserror::Error;

use crate::types::{MediaKind, SourceId};

/// Errors that can reach callers of the resolution orchestrator.
///
/// Fan-out operations never return these for a single failing branch; the
/// branch contributes an empty partial result and the failure is logged.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// One adapter's upstream exhausted its hosts.
    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    /// Every source in a required fallback chain failed.
    #[error("All sources failed for {operation}: {}", join_sources(.sources))]
    ExhaustedFallbacks {
        /// The operation that was attempted
        operation: &'static str,
        /// Sources tried, in precedence order
        sources: Vec<SourceId>,
    },

    /// A source used up its share of a fan-out branch budget.
    #[error("{source_id} gave no answer for {operation} within {budget:?}")]
    SliceElapsed {
        /// The operation that was attempted
        operation: &'static str,
        /// The source that overran
        source_id: SourceId,
        /// Time the source was given
        budget: Duration,
    },

    /// No source could resolve the requested id.
    #[error("Not found: {reference}")]
    NotFound {
        /// The reference that was requested
        reference: String,
    },

    /// The operation does not apply to this media kind or source.
    #[error("{operation} is not supported for {kind}")]
    Unsupported {
        /// The operation that was attempted
        operation: &'static str,
        /// The media kind it was attempted on
        kind: MediaKind,
    },

    /// A reference or argument was malformed.
    #[error("Invalid reference: {reason}")]
    InvalidReference {
        /// Why the reference was rejected
        reason: String,
    },
}

impl ResolveError {
    /// Returns a message suitable for a degraded-state screen.
    pub fn user_message(&self) -> String {
        match self {
            ResolveError::Upstream(e) if e.was_cancelled() => "Request cancelled".to_string(),
            ResolveError::Upstream(_)
            | ResolveError::ExhaustedFallbacks { .. }
            | ResolveError::SliceElapsed { .. } => {
                "Sources are unreachable right now, try again later".to_string()
            }
            ResolveError::NotFound { .. } => "This title could not be found".to_string(),
            ResolveError::Unsupported { operation, kind } => {
                format!("{operation} is not available for {kind}")
            }
            ResolveError::InvalidReference { reason } => format!("Invalid request: {reason}"),
        }
    }

    /// Whether retrying later could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ResolveError::Upstream(_) | ResolveError::ExhaustedFallbacks { .. } | ResolveError::SliceElapsed { .. }
        )
    }

    /// Upstream answered 404 on its last host: the id does not exist there.
    pub(crate) fn is_upstream_not_found(&self) -> bool {
        matches!(self, ResolveError::Upstream(e) if e.last_http_status() == Some(404))
    }

    pub(crate) fn not_found(reference: impl std::fmt::Display) -> Self {
        ResolveError::NotFound {
            reference: reference.to_string(),
        }
    }
}

fn join_sources(sources: &[SourceId]) -> String {
    if sources.is_empty() {
        return "no sources configured".to_string();
    }
    sources
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
