// Copyright (c) 2025 - Cowboy AI, Inc.
//! Bounded Retries
//!
//! Two retry shapes, both capped by a wall-clock budget:
//!
//! - [`VersionConflictRetrier`] re-reads the distribution before every
//!   mutating attempt, so a write always carries the freshest version token.
//!   Stale-token failures (`VersionConflict`, `PreconditionFailed`) are
//!   retried; everything else is returned as-is.
//! - [`retry_when`] repeats an operation while its error matches a
//!   predicate. Used for remote errors that clear up on their own as the
//!   remote converges (certificates not yet visible, a disable not yet
//!   propagated).

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::client::DistributionClient;
use crate::domain::{DistributionId, VersionedDistribution};
use crate::errors::{ReconcileError, ReconcileResult, RemoteError};

/// Delay between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay every time
    Fixed(Duration),

    /// Doubling delay starting at `initial`, never above `max`
    Exponential { initial: Duration, max: Duration },
}

impl Backoff {
    /// Delay to apply after attempt number `attempt` (1-based) failed
    pub fn delay(&self, attempt: u32) -> Duration {
        match self {
            Backoff::Fixed(delay) => *delay,
            Backoff::Exponential { initial, max } => {
                let exponent = attempt.saturating_sub(1).min(16);
                initial.saturating_mul(1u32 << exponent).min(*max)
            }
        }
    }
}

/// Retry budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrySettings {
    /// No attempt starts after this much time has passed
    pub max_duration: Duration,
    pub backoff: Backoff,
}

impl RetrySettings {
    pub fn new(max_duration: Duration, backoff: Backoff) -> Self {
        Self {
            max_duration,
            backoff,
        }
    }

    /// Delay before the next attempt, or `None` when the budget is spent
    fn next_delay(&self, attempt: u32, elapsed: Duration) -> Option<Duration> {
        let delay = self.backoff.delay(attempt);
        if elapsed.saturating_add(delay) < self.max_duration {
            Some(delay)
        } else {
            None
        }
    }
}

async fn pause(
    delay: Duration,
    cancel: &CancellationToken,
    operation: &'static str,
) -> ReconcileResult<()> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ReconcileError::Cancelled { operation }),
        _ = sleep(delay) => Ok(()),
    }
}

/// Wraps one mutating call in read-then-write attempts
#[derive(Clone)]
pub struct VersionConflictRetrier {
    client: Arc<dyn DistributionClient>,
    settings: RetrySettings,
}

impl VersionConflictRetrier {
    pub fn new(client: Arc<dyn DistributionClient>, settings: RetrySettings) -> Self {
        Self { client, settings }
    }

    /// Run `mutate` against a freshly read copy of the distribution
    ///
    /// `mutate` receives the current body and token and returns the remote
    /// result of its write. A missing distribution, whether seen by the read
    /// or by the write, becomes [`ReconcileError::NotFound`].
    pub async fn retry_with_fresh_token<T, F, Fut>(
        &self,
        id: &DistributionId,
        operation: &'static str,
        cancel: &CancellationToken,
        mut mutate: F,
    ) -> ReconcileResult<T>
    where
        F: FnMut(VersionedDistribution) -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let started = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            let current = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ReconcileError::Cancelled { operation }),
                result = self.client.get(id) => {
                    result.map_err(|err| ReconcileError::remote("get", id, err))?
                }
            };
            debug!(%id, operation, attempt, version = %current.version, "attempting write");

            let err = match mutate(current).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_version_conflict() => err,
                Err(err) => return Err(ReconcileError::remote(operation, id, err)),
            };

            let elapsed = started.elapsed();
            let delay = match self.settings.next_delay(attempt, elapsed) {
                Some(delay) => delay,
                None => {
                    return Err(ReconcileError::RetryExhausted {
                        id: id.clone(),
                        operation,
                        attempts: attempt,
                        elapsed,
                        last: err,
                    });
                }
            };

            warn!(%id, operation, attempt, ?delay, error = %err, "stale version token, retrying");
            pause(delay, cancel, operation).await?;
        }
    }
}

/// Repeat `op` while its error satisfies `should_retry` and budget remains
///
/// When the budget runs out the last error is returned unchanged.
pub async fn retry_when<T, F, Fut, P>(
    settings: RetrySettings,
    cancel: &CancellationToken,
    operation: &'static str,
    should_retry: P,
    mut op: F,
) -> ReconcileResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ReconcileResult<T>>,
    P: Fn(&ReconcileError) -> bool,
{
    let started = Instant::now();
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(err) if should_retry(&err) => err,
            Err(err) => return Err(err),
        };

        let delay = match settings.next_delay(attempt, started.elapsed()) {
            Some(delay) => delay,
            None => return Err(err),
        };

        warn!(operation, attempt, ?delay, error = %err, "retrying until remote converges");
        pause(delay, cancel, operation).await?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ApiCall, Fault, InMemoryDistributionApi};
    use crate::domain::{DistributionConfig, DistributionStatus};
    use std::sync::atomic::{AtomicU32, Ordering};
    use test_case::test_case;

    fn settings() -> RetrySettings {
        RetrySettings::new(
            Duration::from_secs(60),
            Backoff::Exponential {
                initial: Duration::from_secs(1),
                max: Duration::from_secs(8),
            },
        )
    }

    #[test_case(1, 1 ; "first retry")]
    #[test_case(2, 2 ; "second retry")]
    #[test_case(4, 8 ; "reaches cap")]
    #[test_case(30, 8 ; "stays capped")]
    fn test_exponential_backoff(attempt: u32, expected_secs: u64) {
        let backoff = Backoff::Exponential {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(8),
        };
        assert_eq!(backoff.delay(attempt), Duration::from_secs(expected_secs));
    }

    #[test]
    fn test_zero_budget_never_retries() {
        let settings = RetrySettings::new(Duration::ZERO, Backoff::Fixed(Duration::ZERO));
        assert_eq!(settings.next_delay(1, Duration::ZERO), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_conflicts_resolved_with_fresh_tokens() {
        let api = Arc::new(InMemoryDistributionApi::new());
        let seeded = api
            .seed(DistributionConfig::enabled(), DistributionStatus::Deployed)
            .await;
        api.inject_times(ApiCall::Update, Fault::ConcurrentWrite, 3)
            .await;
        let retrier = VersionConflictRetrier::new(api.clone(), settings());
        let client = api.clone();

        let updated = retrier
            .retry_with_fresh_token(
                seeded.id(),
                "update",
                &CancellationToken::new(),
                |current| {
                    let client = client.clone();
                    async move {
                        client
                            .update(
                                current.id(),
                                &current.version,
                                &current.distribution.config,
                            )
                            .await
                    }
                },
            )
            .await
            .unwrap();

        let updates = api.calls_of(ApiCall::Update).await;
        assert_eq!(updates.len(), 4);
        assert_eq!(api.count(ApiCall::Get).await, 4);
        assert_ne!(updates[0].version, updates[3].version);
        assert_eq!(updates[0].version, Some(seeded.version.clone()));
        assert_ne!(updated.version, seeded.version);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_reports_attempts() {
        let api = Arc::new(InMemoryDistributionApi::new());
        let seeded = api
            .seed(DistributionConfig::enabled(), DistributionStatus::Deployed)
            .await;
        let retrier = VersionConflictRetrier::new(
            api.clone(),
            RetrySettings::new(Duration::from_secs(10), Backoff::Fixed(Duration::from_secs(3))),
        );

        let started = Instant::now();
        let err = retrier
            .retry_with_fresh_token(
                seeded.id(),
                "delete",
                &CancellationToken::new(),
                |_| async { Err::<(), _>(RemoteError::PreconditionFailed("stale".into())) },
            )
            .await
            .unwrap_err();

        match err {
            ReconcileError::RetryExhausted { attempts, last, .. } => {
                assert_eq!(attempts, 4);
                assert!(last.is_version_conflict());
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_errors_are_not_retried() {
        let api = Arc::new(InMemoryDistributionApi::new());
        let seeded = api
            .seed(DistributionConfig::enabled(), DistributionStatus::Deployed)
            .await;
        let retrier = VersionConflictRetrier::new(api.clone(), settings());

        let err = retrier
            .retry_with_fresh_token(seeded.id(), "delete", &CancellationToken::new(), |_| async {
                Err::<(), _>(RemoteError::ResourceBusy("DistributionNotDisabled".into()))
            })
            .await
            .unwrap_err();

        assert!(err.is_resource_busy());
        assert_eq!(api.count(ApiCall::Get).await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_distribution_is_not_found() {
        let api = Arc::new(InMemoryDistributionApi::new());
        let retrier = VersionConflictRetrier::new(api.clone(), settings());

        let err = retrier
            .retry_with_fresh_token(
                &DistributionId::new("EMISSING"),
                "update",
                &CancellationToken::new(),
                |_| async { Ok::<(), RemoteError>(()) },
            )
            .await
            .unwrap_err();

        assert!(err.is_not_found());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_when_stops_on_success() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result = retry_when(
            settings(),
            &CancellationToken::new(),
            "create",
            ReconcileError::is_invalid_certificate,
            move || async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(ReconcileError::remote(
                        "create",
                        &DistributionId::new("E1"),
                        RemoteError::InvalidViewerCertificate("not yet".into()),
                    ))
                } else {
                    Ok(7)
                }
            },
        )
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_when_returns_last_error_after_budget() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let err = retry_when(
            RetrySettings::new(Duration::from_secs(5), Backoff::Fixed(Duration::from_secs(2))),
            &CancellationToken::new(),
            "delete",
            ReconcileError::is_resource_busy,
            move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(ReconcileError::remote(
                    "delete",
                    &DistributionId::new("E1"),
                    RemoteError::ResourceBusy("DistributionNotDisabled".into()),
                ))
            },
        )
        .await
        .unwrap_err();

        assert!(err.is_resource_busy());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_sleep_is_cancellable() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = retry_when(
            settings(),
            &cancel,
            "update",
            |_| true,
            || async {
                Err::<(), _>(ReconcileError::Configuration("always".into()))
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ReconcileError::Cancelled { .. }));
    }
}
