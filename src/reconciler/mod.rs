// Copyright (c) 2025 - Cowboy AI, Inc.
//! Distribution Lifecycle Reconciler
//!
//! Brings one remote distribution to a desired state through a control plane
//! that demands a version token on every write, deploys changes slowly and
//! refuses to delete anything that still serves traffic.
//!
//! # Operation Pattern
//!
//! ```text
//! DesiredState ──> Reconciler ──> [Retrier ──> Client] ──> DeploymentWaiter
//!                      │                                        │
//!                      └──────────── TrackedState <─────────────┘
//! ```
//!
//! Every write goes through the [`VersionConflictRetrier`], which re-reads
//! the distribution right before each attempt. Waits happen after create and
//! update (when the desired state asks for it) and before any delete.
//!
//! # Failure Semantics
//!
//! - `NotFound` is fatal for create, update and read, and success for delete
//! - version conflicts only surface once their budget is spent
//! - `ResourceBusy` is only handled inside the delete protocol
//! - the id of a created distribution is recorded before anything else can
//!   fail (cancellation included), so a failed create can always be cleaned
//!   up with [`delete`]
//!
//! [`delete`]: DistributionReconciler::delete

mod delete;

pub use delete::DeleteReport;

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn, Span};
use uuid::Uuid;

use crate::client::{DistributionClient, RemoteResult, TaggingClient};
use crate::config::ReconcilerConfig;
use crate::domain::{
    DesiredState, DistributionConfig, DistributionId, TrackedState, UpdatePlan,
    VersionedDistribution,
};
use crate::errors::{ReconcileError, ReconcileResult};
use crate::retry::{retry_when, VersionConflictRetrier};
use crate::state_machine::LifecycleEvent;
use crate::waiter::DeploymentWaiter;

/// Run one remote call, giving up as soon as `cancel` fires
pub(crate) async fn cancellable<T, Fut>(
    operation: &'static str,
    id: &DistributionId,
    cancel: &CancellationToken,
    call: Fut,
) -> ReconcileResult<T>
where
    Fut: Future<Output = RemoteResult<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ReconcileError::Cancelled { operation }),
        result = call => result.map_err(|err| ReconcileError::remote(operation, id, err)),
    }
}

/// Lifecycle manager for remote distributions
///
/// Holds no per-distribution state: everything an operation needs is passed
/// in, so one reconciler can serve many tasks as long as each distribution is
/// handled by one operation at a time.
#[derive(Clone)]
pub struct DistributionReconciler {
    client: Arc<dyn DistributionClient>,
    tagging: Arc<dyn TaggingClient>,
    waiter: DeploymentWaiter,
    retrier: VersionConflictRetrier,
    config: ReconcilerConfig,
}

impl DistributionReconciler {
    pub fn new(
        client: Arc<dyn DistributionClient>,
        tagging: Arc<dyn TaggingClient>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            waiter: DeploymentWaiter::new(client.clone()),
            retrier: VersionConflictRetrier::new(client.clone(), config.version_conflict_retry()),
            client,
            tagging,
            config,
        }
    }

    /// Create a distribution matching `desired`
    ///
    /// The remote-assigned id is written to `tracked` as soon as the create
    /// call returns. A later failure (deployment timeout, the distribution
    /// vanishing while deploying) is returned with the id still recorded.
    ///
    /// Cancellation is honoured before the create request is sent and after
    /// its id is recorded, never while the request is in flight.
    #[instrument(skip_all, fields(id = tracing::field::Empty))]
    pub async fn create(
        &self,
        desired: &DesiredState,
        tracked: &mut TrackedState,
        cancel: &CancellationToken,
    ) -> ReconcileResult<VersionedDistribution> {
        tracked.advance(LifecycleEvent::CreateRequested)?;

        let mut config = desired.config.clone();
        if config.caller_reference.is_none() {
            config.caller_reference = Some(Uuid::now_v7().to_string());
        }

        let created = match self.create_call(&config, desired, cancel).await {
            Ok(created) => created,
            Err(err) => {
                tracked.advance(LifecycleEvent::CreateFailed)?;
                return Err(err);
            }
        };

        let id = created.id().clone();
        Span::current().record("id", tracing::field::display(&id));
        tracked.observe(&created)?;
        tracked.tags = desired.tags.clone();
        info!(%id, version = %created.version, "distribution created");

        let observed = self.settle(&id, desired.wait_for_deployment, cancel).await?;
        tracked.observe(&observed)?;
        Ok(observed)
    }

    async fn create_call(
        &self,
        config: &DistributionConfig,
        desired: &DesiredState,
        cancel: &CancellationToken,
    ) -> ReconcileResult<VersionedDistribution> {
        let client = &self.client;
        let tags = &desired.tags;

        retry_when(
            self.config.certificate_propagation_retry(),
            cancel,
            "create",
            ReconcileError::is_invalid_certificate,
            move || async move {
                if cancel.is_cancelled() {
                    return Err(ReconcileError::Cancelled { operation: "create" });
                }
                // Not raced against `cancel`: an accepted create must reach the caller
                client
                    .create(config, tags)
                    .await
                    .map_err(|source| ReconcileError::Remote {
                        operation: "create",
                        id: "(unassigned)".to_string(),
                        source,
                    })
            },
        )
        .await
    }

    /// Bring an existing distribution in line with `desired`
    ///
    /// Tags and configuration are handled independently: a tag-only change
    /// issues no configuration write and a configuration-only change issues
    /// no tag call.
    #[instrument(skip_all, fields(id = tracing::field::Empty))]
    pub async fn update(
        &self,
        desired: &DesiredState,
        tracked: &mut TrackedState,
        cancel: &CancellationToken,
    ) -> ReconcileResult<VersionedDistribution> {
        let id = tracked
            .id
            .clone()
            .ok_or(ReconcileError::Untracked { operation: "update" })?;
        Span::current().record("id", tracing::field::display(&id));

        let plan = UpdatePlan::between(tracked, desired);
        debug!(
            %id,
            config_changed = plan.config_changed,
            tags_changed = plan.tags_changed(),
            "update planned"
        );
        if plan.is_noop() {
            debug!(%id, "distribution already matches desired state");
        }

        if plan.tag_diff.is_some() {
            cancellable(
                "tag update",
                &id,
                cancel,
                self.tagging.apply_tag_diff(&id, &tracked.tags, &desired.tags),
            )
            .await?;
            tracked.tags = desired.tags.clone();
        }

        if plan.config_changed {
            let updated = self.write_config(&id, &desired.config, cancel).await?;
            info!(%id, version = %updated.version, "distribution configuration updated");
            tracked.observe(&updated)?;
        }

        let observed = self.settle(&id, desired.wait_for_deployment, cancel).await?;
        tracked.observe(&observed)?;
        Ok(observed)
    }

    /// Overlay `desired` on the freshest server document and write it back
    async fn write_config(
        &self,
        id: &DistributionId,
        desired: &DistributionConfig,
        cancel: &CancellationToken,
    ) -> ReconcileResult<VersionedDistribution> {
        let client = &self.client;
        let retrier = &self.retrier;

        retry_when(
            self.config.certificate_propagation_retry(),
            cancel,
            "update",
            ReconcileError::is_invalid_certificate,
            move || {
                retrier.retry_with_fresh_token(id, "update", cancel, move |current| {
                    let version = current.version;
                    let config = current.distribution.config.overlaid(desired);
                    async move { client.update(id, &version, &config).await }
                })
            },
        )
        .await
    }

    /// Wait for deployment or read once, as the caller asked
    async fn settle(
        &self,
        id: &DistributionId,
        wait_for_deployment: bool,
        cancel: &CancellationToken,
    ) -> ReconcileResult<VersionedDistribution> {
        if wait_for_deployment {
            self.waiter
                .wait_until_deployed(id, self.config.deployment_wait(), cancel)
                .await
        } else {
            self.read(id, cancel).await
        }
    }

    /// Read the distribution; `NotFound` is an error
    pub async fn read(
        &self,
        id: &DistributionId,
        cancel: &CancellationToken,
    ) -> ReconcileResult<VersionedDistribution> {
        cancellable("get", id, cancel, self.client.get(id)).await
    }

    /// Re-read a tracked distribution
    ///
    /// A distribution that disappeared outside of reconciliation is not an
    /// error here: the tracked state is cleared and `None` returned so the
    /// caller can recreate it.
    #[instrument(skip_all, fields(id = tracing::field::Empty))]
    pub async fn refresh(
        &self,
        tracked: &mut TrackedState,
        cancel: &CancellationToken,
    ) -> ReconcileResult<Option<VersionedDistribution>> {
        let id = tracked
            .id
            .clone()
            .ok_or(ReconcileError::Untracked { operation: "refresh" })?;
        Span::current().record("id", tracing::field::display(&id));

        match self.read(&id, cancel).await {
            Ok(observed) => {
                tracked.observe(&observed)?;
                Ok(Some(observed))
            }
            Err(err) if err.is_not_found() => {
                warn!(%id, "distribution not found, removing from tracked state");
                tracked.advance(LifecycleEvent::Vanished)?;
                tracked.forget();
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Start tracking a distribution that already exists
    ///
    /// Tags are unknown until the next update supplies them.
    #[instrument(skip_all, fields(id = %id))]
    pub async fn import(
        &self,
        id: &DistributionId,
        cancel: &CancellationToken,
    ) -> ReconcileResult<TrackedState> {
        let observed = self.read(id, cancel).await?;
        let mut tracked = TrackedState::new();
        tracked.observe(&observed)?;
        info!(%id, status = %observed.status(), "distribution imported");
        Ok(tracked)
    }
}
