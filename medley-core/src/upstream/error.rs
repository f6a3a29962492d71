//! Error types for upstream HTTP access.

use std::time::Duration;

use thiserror::Error;

/// Why a single host attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureKind {
    /// Connection, DNS or transport failure.
    #[error("network error: {reason}")]
    Network { reason: String },

    /// Host did not answer within its budget.
    #[error("timed out after {budget:?}")]
    Timeout { budget: Duration },

    /// Host answered with a non-2xx status.
    #[error("HTTP {status}")]
    Http { status: u16 },

    /// Host answered 2xx but not with JSON.
    #[error("unexpected content type '{content_type}'")]
    NotJson { content_type: String },

    /// Host claimed JSON but the body did not parse.
    #[error("malformed JSON body: {reason}")]
    MalformedBody { reason: String },

    /// Endpoint could not be joined onto the host.
    #[error("invalid URL: {reason}")]
    InvalidUrl { reason: String },

    /// Caller abandoned the request.
    #[error("cancelled")]
    Cancelled,
}

impl FailureKind {
    /// Timeouts and transport failures, as opposed to answers the host gave.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Timeout { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// A failed attempt against one host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostFailure {
    pub host: String,
    pub kind: FailureKind,
}

impl std::fmt::Display for HostFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.host, self.kind)
    }
}

/// Errors surfaced by [`UpstreamClient`](super::UpstreamClient).
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The primary host and every fallback failed (or the caller cancelled).
    #[error("All hosts failed for {source_name} {path}: {}", summarize(.failures))]
    Exhausted {
        /// Logical upstream name
        source_name: String,
        /// Endpoint path that was requested
        path: String,
        /// One entry per attempted host, in attempt order
        failures: Vec<HostFailure>,
    },

    /// The underlying HTTP client could not be constructed.
    #[error("Failed to build HTTP client for {source_name}: {reason}")]
    ClientBuild { source_name: String, reason: String },

    /// A client was configured without any host.
    #[error("No hosts configured for {source_name}")]
    NoHosts { source_name: String },
}

impl UpstreamError {
    /// Whether the caller's cancellation ended the attempt loop.
    pub fn was_cancelled(&self) -> bool {
        match self {
            Self::Exhausted { failures, .. } => failures.iter().any(|f| f.kind.is_cancelled()),
            _ => false,
        }
    }

    /// Whether every attempt failed at the transport level.
    pub fn is_network(&self) -> bool {
        match self {
            Self::Exhausted { failures, .. } => {
                !failures.is_empty() && failures.iter().all(|f| f.kind.is_network())
            }
            _ => false,
        }
    }

    /// Status of the last attempt when it was an HTTP error.
    pub fn last_http_status(&self) -> Option<u16> {
        match self {
            Self::Exhausted { failures, .. } => match failures.last()?.kind {
                FailureKind::Http { status } => Some(status),
                _ => None,
            },
            _ => None,
        }
    }
}

fn summarize(failures: &[HostFailure]) -> String {
    if failures.is_empty() {
        return "no attempts".to_string();
    }
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exhausted(kinds: Vec<FailureKind>) -> UpstreamError {
        UpstreamError::Exhausted {
            source_name: "catalog".to_string(),
            path: "/search/multi".to_string(),
            failures: kinds
                .into_iter()
                .enumerate()
                .map(|(i, kind)| HostFailure {
                    host: format!("http://host-{i}"),
                    kind,
                })
                .collect(),
        }
    }

    #[test]
    fn test_classification() {
        let network = exhausted(vec![
            FailureKind::Timeout {
                budget: Duration::from_secs(10),
            },
            FailureKind::Network {
                reason: "refused".to_string(),
            },
        ]);
        assert!(network.is_network());
        assert!(!network.was_cancelled());

        let http = exhausted(vec![FailureKind::Http { status: 503 }]);
        assert!(!http.is_network());
        assert_eq!(http.last_http_status(), Some(503));

        let cancelled = exhausted(vec![FailureKind::Cancelled]);
        assert!(cancelled.was_cancelled());
    }

    #[test]
    fn test_display_lists_every_host() {
        let error = exhausted(vec![
            FailureKind::Http { status: 500 },
            FailureKind::NotJson {
                content_type: "text/html".to_string(),
            },
        ]);
        let message = error.to_string();
        assert!(message.contains("http://host-0: HTTP 500"));
        assert!(message.contains("http://host-1: unexpected content type 'text/html'"));
    }
}
