// Copyright (c) 2025 - Cowboy AI, Inc.
//! Delete protocol driver
//!
//! Performs the steps [`DeleteProtocol`] asks for against the remote and
//! feeds the results back until the protocol finishes.

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn, Span};

use super::DistributionReconciler;
use crate::domain::{DesiredState, DistributionId, TrackedState, VersionedDistribution};
use crate::errors::{ReconcileError, ReconcileResult};
use crate::retry::retry_when;
use crate::state_machine::{
    DeleteEvent, DeleteOutcome, DeletePhase, DeleteProtocol, DeleteStep, LifecycleEvent,
    StateMachineWithHistory, Transition,
};

/// How a delete ended and which phases it went through
#[derive(Debug, Clone)]
pub struct DeleteReport {
    pub id: DistributionId,
    pub outcome: DeleteOutcome,
    pub transitions: Vec<Transition<DeleteProtocol, DeleteEvent>>,
}

impl DeleteReport {
    /// Every phase visited, starting with the initial one
    pub fn phases(&self) -> Vec<DeletePhase> {
        let mut phases = Vec::with_capacity(self.transitions.len() + 1);
        if let Some(first) = self.transitions.first() {
            phases.push(first.from.phase());
        }
        phases.extend(self.transitions.iter().map(|t| t.to.phase()));
        phases
    }

    /// Whether the disable path was needed
    pub fn disabled_first(&self) -> bool {
        self.transitions
            .iter()
            .any(|t| t.input == DeleteEvent::DisableApplied)
    }
}

impl DistributionReconciler {
    /// Delete the tracked distribution and clear `tracked` on success
    ///
    /// `desired.retain_on_delete` decides between deleting and disabling in
    /// place. With nothing tracked this is a no-op reporting `AlreadyAbsent`.
    /// On failure the id stays recorded and the call can be repeated.
    #[instrument(skip_all, fields(id = tracing::field::Empty, retain = desired.retain_on_delete))]
    pub async fn delete(
        &self,
        desired: &DesiredState,
        tracked: &mut TrackedState,
        cancel: &CancellationToken,
    ) -> ReconcileResult<DeleteOutcome> {
        let id = match tracked.id.clone() {
            Some(id) => id,
            None => {
                debug!("nothing tracked, delete is a no-op");
                return Ok(DeleteOutcome::AlreadyAbsent);
            }
        };
        Span::current().record("id", tracing::field::display(&id));

        tracked.advance(LifecycleEvent::DeleteRequested)?;
        let report = self
            .delete_by_id(&id, desired.retain_on_delete, cancel)
            .await?;

        let event = match report.outcome {
            DeleteOutcome::Deleted => LifecycleEvent::Deleted,
            DeleteOutcome::AlreadyAbsent => LifecycleEvent::Vanished,
            DeleteOutcome::Retained => LifecycleEvent::Retained,
        };
        tracked.advance(event)?;
        tracked.forget();
        Ok(report.outcome)
    }

    /// Run the delete protocol for `id`
    ///
    /// Calling this for a distribution that no longer exists succeeds with
    /// [`DeleteOutcome::AlreadyAbsent`].
    #[instrument(skip_all, fields(id = %id, retain = retain))]
    pub async fn delete_by_id(
        &self,
        id: &DistributionId,
        retain: bool,
        cancel: &CancellationToken,
    ) -> ReconcileResult<DeleteReport> {
        let mut protocol = StateMachineWithHistory::new(DeleteProtocol::new(retain));
        let mut step = protocol.current_state().first_step();

        loop {
            let event = match step {
                DeleteStep::Finish(outcome) => {
                    match outcome {
                        DeleteOutcome::Retained => warn!(
                            %id,
                            "distribution disabled and retained; it still exists remotely"
                        ),
                        _ => info!(%id, ?outcome, "distribution delete finished"),
                    }
                    return Ok(DeleteReport {
                        id: id.clone(),
                        outcome,
                        transitions: protocol.into_history(),
                    });
                }

                DeleteStep::AwaitDeployment => {
                    let wait = self
                        .waiter
                        .wait_until_deployed(id, self.config.deployment_wait(), cancel)
                        .await;
                    match wait {
                        Ok(_) => DeleteEvent::Deployed,
                        Err(err) if err.is_not_found() => DeleteEvent::NotFound,
                        Err(err) => return Err(err),
                    }
                }

                DeleteStep::Delete => {
                    let final_attempt = protocol.current_state().is_final_attempt();
                    match self.delete_call(id, final_attempt, cancel).await {
                        Ok(()) => {
                            if self.config.wait_for_deletion {
                                self.waiter
                                    .wait_until_deleted(id, self.config.deletion_wait(), cancel)
                                    .await?;
                            }
                            DeleteEvent::Deleted
                        }
                        Err(err) if err.is_not_found() => DeleteEvent::NotFound,
                        Err(err) if err.is_resource_busy() && !final_attempt => {
                            debug!(%id, "distribution not disabled yet");
                            DeleteEvent::Busy
                        }
                        Err(err) => return Err(err),
                    }
                }

                DeleteStep::Inspect => match self.read(id, cancel).await {
                    Ok(current) if current.distribution.is_deletable() => {
                        DeleteEvent::InspectedDisabled { deployed: true }
                    }
                    Ok(current) if current.distribution.is_enabled() => {
                        DeleteEvent::InspectedEnabled
                    }
                    Ok(_) => DeleteEvent::InspectedDisabled { deployed: false },
                    Err(err) if err.is_not_found() => DeleteEvent::NotFound,
                    Err(err) => return Err(err),
                },

                DeleteStep::Disable => match self.disable(id, cancel).await {
                    Ok(disabled) => {
                        info!(%id, version = %disabled.version, "distribution disabled");
                        DeleteEvent::DisableApplied
                    }
                    Err(err) if err.is_not_found() => DeleteEvent::NotFound,
                    Err(err) => return Err(err),
                },
            };

            let from = protocol.current_state().phase();
            step = protocol.transition_with_history(event, Utc::now())?;
            debug!(%id, ?from, to = ?protocol.current_state().phase(), ?event, "delete protocol");
        }
    }

    /// Delete with a fresh token
    ///
    /// After the distribution has been disabled, the remote may still report
    /// it as enabled for a while; that refusal is retried within the
    /// disable propagation budget.
    async fn delete_call(
        &self,
        id: &DistributionId,
        final_attempt: bool,
        cancel: &CancellationToken,
    ) -> ReconcileResult<()> {
        let client = &self.client;
        let retrier = &self.retrier;
        let attempt = move || {
            retrier.retry_with_fresh_token(id, "delete", cancel, move |current| async move {
                client.delete(id, &current.version).await
            })
        };

        if final_attempt {
            retry_when(
                self.config.disable_propagation_retry(),
                cancel,
                "delete",
                ReconcileError::is_resource_busy,
                attempt,
            )
            .await
        } else {
            attempt().await
        }
    }

    /// Write `enabled = false` onto the freshest server document
    async fn disable(
        &self,
        id: &DistributionId,
        cancel: &CancellationToken,
    ) -> ReconcileResult<VersionedDistribution> {
        let client = &self.client;
        self.retrier
            .retry_with_fresh_token(id, "disable", cancel, move |current| {
                let version = current.version;
                let mut config = current.distribution.config;
                config.enabled = false;
                async move { client.update(id, &version, &config).await }
            })
            .await
    }
}
