//! Ordered fallback across source adapters.
//!
//! Tries sources strictly in precedence order and stops at the first one that
//! returns a non-empty value. Errors from one source never stop the chain,
//! but cancellation does.

use std::future::Future;
use std::sync::Arc;

use medley_core::CancellationToken;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::errors::ResolveError;
use crate::providers::SourceAdapter;
use crate::types::{PaginatedResult, SourceId};

/// Values that can be "found but empty".
pub trait FallbackValue {
    fn is_empty_value(&self) -> bool;
}

impl<T> FallbackValue for Vec<T> {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<T> FallbackValue for Option<T> {
    fn is_empty_value(&self) -> bool {
        self.is_none()
    }
}

impl<T> FallbackValue for PaginatedResult<T> {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

/// Result of walking a fallback chain.
#[derive(Debug)]
pub enum FallbackOutcome<T> {
    /// First source with a non-empty value.
    Found { source: SourceId, value: T },
    /// At least one source answered, none had data. `failed` lists sources that errored.
    Empty {
        value: Option<T>,
        failed: Vec<SourceId>,
    },
    /// Every attempted source errored, or the caller cancelled.
    Exhausted {
        failures: Vec<(SourceId, ResolveError)>,
        cancelled: bool,
    },
}

impl<T> FallbackOutcome<T> {
    /// Found value, the last well-formed empty value, or `ExhaustedFallbacks`.
    ///
    /// # Errors
    /// - `ResolveError::ExhaustedFallbacks` - Every source failed or the caller cancelled
    pub fn into_result(self, operation: &'static str) -> Result<Option<T>, ResolveError> {
        match self {
            FallbackOutcome::Found { value, .. } => Ok(Some(value)),
            FallbackOutcome::Empty { value, .. } => Ok(value),
            FallbackOutcome::Exhausted { failures, .. } => Err(ResolveError::ExhaustedFallbacks {
                operation,
                sources: failures.into_iter().map(|(source, _)| source).collect(),
            }),
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, FallbackOutcome::Exhausted { .. })
    }
}

/// Walks `sources` in order, calling `attempt` on each until one returns a
/// non-empty value.
pub async fn resolve_with_fallback<'a, T, F, Fut>(
    operation: &'static str,
    sources: &'a [Arc<dyn SourceAdapter>],
    cancel: &CancellationToken,
    attempt: F,
) -> FallbackOutcome<T>
where
    T: FallbackValue,
    F: FnMut(&'a Arc<dyn SourceAdapter>) -> Fut,
    Fut: Future<Output = Result<T, ResolveError>>,
{
    resolve_with_fallback_until(operation, sources, cancel, None, attempt).await
}

/// [`resolve_with_fallback`] bounded by `deadline`.
///
/// The time left is split evenly between the sources not yet tried, so a
/// hanging source overruns only its own slice and the sources after it still
/// get their turn.
pub async fn resolve_with_fallback_until<'a, T, F, Fut>(
    operation: &'static str,
    sources: &'a [Arc<dyn SourceAdapter>],
    cancel: &CancellationToken,
    deadline: Option<Instant>,
    mut attempt: F,
) -> FallbackOutcome<T>
where
    T: FallbackValue,
    F: FnMut(&'a Arc<dyn SourceAdapter>) -> Fut,
    Fut: Future<Output = Result<T, ResolveError>>,
{
    let mut failures = Vec::new();
    let mut empty = None;

    for (position, source) in sources.iter().enumerate() {
        if cancel.is_cancelled() {
            debug!("{operation}: cancelled before trying {}", source.id());
            return FallbackOutcome::Exhausted {
                failures,
                cancelled: true,
            };
        }

        let result = match deadline {
            None => attempt(source).await,
            Some(deadline) => {
                let untried = u32::try_from(sources.len() - position).unwrap_or(u32::MAX);
                let slice = deadline.saturating_duration_since(Instant::now()) / untried;
                tokio::time::timeout(slice, attempt(source))
                    .await
                    .unwrap_or_else(|_| {
                        Err(ResolveError::SliceElapsed {
                            operation,
                            source_id: source.id(),
                            budget: slice,
                        })
                    })
            }
        };

        match result {
            Ok(value) if !value.is_empty_value() => {
                if !failures.is_empty() {
                    warn!(
                        "{operation}: resolved via {} after {} failed source(s)",
                        source.id(),
                        failures.len()
                    );
                }
                return FallbackOutcome::Found {
                    source: source.id(),
                    value,
                };
            }
            Ok(value) => {
                debug!("{operation}: {} returned nothing", source.id());
                empty = Some(value);
            }
            Err(e) => {
                warn!(source = %source.id(), "{operation} failed: {e}");
                let cancelled = matches!(&e, ResolveError::Upstream(upstream) if upstream.was_cancelled());
                failures.push((source.id(), e));
                if cancelled {
                    return FallbackOutcome::Exhausted {
                        failures,
                        cancelled: true,
                    };
                }
            }
        }
    }

    match empty {
        Some(value) => FallbackOutcome::Empty {
            value: Some(value),
            failed: failures.into_iter().map(|(source, _)| source).collect(),
        },
        None if failures.is_empty() => FallbackOutcome::Empty {
            value: None,
            failed: Vec::new(),
        },
        None => FallbackOutcome::Exhausted {
            failures,
            cancelled: false,
        },
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::providers::MockSource;
    use crate::types::{MediaItem, MediaKind, MediaRef};

    fn sources(mocks: Vec<MockSource>) -> Vec<Arc<dyn SourceAdapter>> {
        mocks
            .into_iter()
            .map(|mock| Arc::new(mock) as Arc<dyn SourceAdapter>)
            .collect()
    }

    async fn detail(sources: &[Arc<dyn SourceAdapter>], cancel: &CancellationToken) -> FallbackOutcome<Option<MediaItem>> {
        let media = MediaRef::new(SourceId::AnimePrimary, MediaKind::Anime, "x");
        resolve_with_fallback("detail", sources, cancel, |source| source.detail(&media, cancel)).await
    }

    #[tokio::test]
    async fn test_first_non_empty_source_wins() {
        let chain = sources(vec![
            MockSource::new(SourceId::AnimePrimary).failing(),
            MockSource::new(SourceId::AnimeBackup).with_titles(&[("x", "Backup")]),
        ]);

        match detail(&chain, &CancellationToken::new()).await {
            FallbackOutcome::Found { source, value } => {
                assert_eq!(source, SourceId::AnimeBackup);
                assert_eq!(value.map(|item| item.title).as_deref(), Some("Backup"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_answer_is_not_exhaustion() {
        let chain = sources(vec![
            MockSource::new(SourceId::AnimePrimary).failing(),
            MockSource::new(SourceId::AnimeBackup),
        ]);

        match detail(&chain, &CancellationToken::new()).await {
            FallbackOutcome::Empty { value, failed } => {
                assert_eq!(value, Some(None));
                assert_eq!(failed, [SourceId::AnimePrimary]);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_all_failures_exhaust() {
        let chain = sources(vec![
            MockSource::new(SourceId::AnimePrimary).failing(),
            MockSource::new(SourceId::AnimeBackup).failing(),
        ]);

        let outcome = detail(&chain, &CancellationToken::new()).await;
        assert!(outcome.is_exhausted());
        match outcome.into_result("detail") {
            Err(ResolveError::ExhaustedFallbacks { operation, sources }) => {
                assert_eq!(operation, "detail");
                assert_eq!(sources, [SourceId::AnimePrimary, SourceId::AnimeBackup]);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancelled_chain_tries_nothing() {
        let primary = Arc::new(MockSource::new(SourceId::AnimePrimary).with_titles(&[("x", "X")]));
        let chain: Vec<Arc<dyn SourceAdapter>> = vec![primary.clone()];
        let cancel = CancellationToken::new();
        cancel.cancel();

        match detail(&chain, &cancel).await {
            FallbackOutcome::Exhausted { failures, cancelled } => {
                assert!(cancelled);
                assert!(failures.is_empty());
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(primary.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_source_leaves_time_for_the_next() {
        let chain = sources(vec![
            MockSource::new(SourceId::AnimePrimary)
                .with_titles(&[("x", "Late")])
                .slow(Duration::from_secs(60)),
            MockSource::new(SourceId::AnimeBackup).with_titles(&[("x", "Backup")]),
        ]);
        let media = MediaRef::new(SourceId::AnimePrimary, MediaKind::Anime, "x");
        let cancel = CancellationToken::new();
        let started = Instant::now();
        let deadline = started + Duration::from_secs(2);

        let outcome = resolve_with_fallback_until("detail", &chain, &cancel, Some(deadline), |source| {
            source.detail(&media, &cancel)
        })
        .await;

        match outcome {
            FallbackOutcome::Found { source, value } => {
                assert_eq!(source, SourceId::AnimeBackup);
                assert_eq!(value.map(|item| item.title).as_deref(), Some("Backup"));
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_source_overrunning_exhausts_by_deadline() {
        let chain = sources(vec![
            MockSource::new(SourceId::HentaiPrimary).slow(Duration::from_secs(60)),
            MockSource::new(SourceId::HentaiBackup).slow(Duration::from_secs(60)),
        ]);
        let media = MediaRef::new(SourceId::HentaiPrimary, MediaKind::Hentai, "x");
        let cancel = CancellationToken::new();
        let started = Instant::now();

        let outcome = resolve_with_fallback_until(
            "detail",
            &chain,
            &cancel,
            Some(started + Duration::from_secs(4)),
            |source| source.detail(&media, &cancel),
        )
        .await;

        match outcome {
            FallbackOutcome::Exhausted { failures, cancelled } => {
                assert!(!cancelled);
                assert_eq!(failures.len(), 2);
                assert!(
                    failures
                        .iter()
                        .all(|(_, e)| matches!(e, ResolveError::SliceElapsed { .. }))
                );
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_no_sources_is_empty() {
        let outcome = detail(&[], &CancellationToken::new()).await;
        assert!(matches!(outcome, FallbackOutcome::Empty { value: None, .. }));
    }
}
