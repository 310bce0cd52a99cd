// Copyright (c) 2025 - Cowboy AI, Inc.
//! Deployment Waiter
//!
//! Polls the remote until a distribution leaves `InProgress`. This is the
//! only place in the crate that blocks for long, so every wait is bounded by
//! a timeout and can be cancelled at any point, including mid-request and
//! mid-sleep.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::client::DistributionClient;
use crate::domain::{DistributionId, DistributionStatus, VersionedDistribution};
use crate::errors::{ReconcileError, ReconcileResult};

/// Budget and cadence of a polling wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitSettings {
    /// Total time allowed
    pub timeout: Duration,

    /// Pause between reads
    pub poll_interval: Duration,
}

impl WaitSettings {
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval,
        }
    }
}

impl Default for WaitSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(90 * 60),
            poll_interval: Duration::from_secs(15),
        }
    }
}

/// Sleep before the next read, clamped to the deadline
///
/// A deadline too far out to represent (`None`) never expires.
fn next_pause(poll_interval: Duration, deadline: Option<Instant>, now: Instant) -> Option<Duration> {
    match deadline {
        Some(deadline) if now >= deadline => None,
        Some(deadline) => Some(poll_interval.min(deadline - now)),
        None => Some(poll_interval),
    }
}

/// Polls a distribution's status through the injected client
#[derive(Clone)]
pub struct DeploymentWaiter {
    client: Arc<dyn DistributionClient>,
}

impl DeploymentWaiter {
    pub fn new(client: Arc<dyn DistributionClient>) -> Self {
        Self { client }
    }

    /// Wait until the distribution reads as `Deployed`
    ///
    /// Returns on the first read if it is already deployed. `NotFound` is
    /// returned immediately rather than retried.
    pub async fn wait_until_deployed(
        &self,
        id: &DistributionId,
        settings: WaitSettings,
        cancel: &CancellationToken,
    ) -> ReconcileResult<VersionedDistribution> {
        const OPERATION: &str = "deployment wait";

        let started = Instant::now();
        let deadline = started.checked_add(settings.timeout);
        let mut polls: u32 = 0;

        loop {
            let observed = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(ReconcileError::Cancelled { operation: OPERATION });
                }
                result = self.client.get(id) => {
                    result.map_err(|err| ReconcileError::remote("get", id, err))?
                }
            };
            polls += 1;

            if observed.status() == DistributionStatus::Deployed {
                if polls > 1 {
                    info!(%id, polls, waited = ?started.elapsed(), "distribution deployed");
                }
                return Ok(observed);
            }

            let now = Instant::now();
            let Some(pause) = next_pause(settings.poll_interval, deadline, now) else {
                return Err(ReconcileError::DeploymentTimeout {
                    id: id.clone(),
                    last_status: observed.status(),
                    waited: now - started,
                });
            };
            debug!(%id, polls, ?pause, "distribution still deploying");
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(ReconcileError::Cancelled { operation: OPERATION });
                }
                _ = sleep(pause) => {}
            }
        }
    }

    /// Wait until reads of the distribution return `NotFound`
    pub async fn wait_until_deleted(
        &self,
        id: &DistributionId,
        settings: WaitSettings,
        cancel: &CancellationToken,
    ) -> ReconcileResult<()> {
        const OPERATION: &str = "deletion wait";

        let started = Instant::now();
        let deadline = started.checked_add(settings.timeout);

        loop {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(ReconcileError::Cancelled { operation: OPERATION });
                }
                result = self.client.get(id) => result,
            };

            match result {
                Err(err) if err.is_not_found() => return Ok(()),
                Err(err) => return Err(ReconcileError::remote("get", id, err)),
                Ok(observed) => {
                    debug!(%id, status = %observed.status(), "distribution still present");
                }
            }

            let now = Instant::now();
            let Some(pause) = next_pause(settings.poll_interval, deadline, now) else {
                return Err(ReconcileError::DeletionTimeout {
                    id: id.clone(),
                    waited: now - started,
                });
            };
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(ReconcileError::Cancelled { operation: OPERATION });
                }
                _ = sleep(pause) => {}
            }
        }
    }
}
