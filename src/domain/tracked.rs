// Copyright (c) 2025 - Cowboy AI, Inc.
//! Caller-Visible Tracked State
//!
//! The record a caller keeps for one managed distribution. The reconciler
//! writes the remote-assigned id here the moment it exists, so a failure
//! later in an operation never loses track of a live resource.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::distribution::{
    DistributionConfig, DistributionId, DistributionStatus, VersionToken, VersionedDistribution,
};
use super::tags::Tags;
use crate::state_machine::{LifecycleEvent, LifecycleState, StateMachine, TransitionResult};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrackedState {
    pub id: Option<DistributionId>,

    /// Last version token observed
    pub version: Option<VersionToken>,

    pub status: Option<DistributionStatus>,

    /// Last configuration document observed on the server
    pub config: Option<DistributionConfig>,

    /// Tags as last applied
    #[serde(default)]
    pub tags: Tags,

    #[serde(default)]
    pub lifecycle: LifecycleState,
}

impl TrackedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_tracked(&self) -> bool {
        self.id.is_some()
    }

    /// Copy an observation into the record
    pub fn record(&mut self, observed: &VersionedDistribution) {
        self.id = Some(observed.distribution.id.clone());
        self.version = Some(observed.version.clone());
        self.status = Some(observed.distribution.status);
        self.config = Some(observed.distribution.config.clone());
    }

    /// Drive the lifecycle state machine
    pub fn advance(&mut self, event: LifecycleEvent) -> TransitionResult<()> {
        let (next, output) = self.lifecycle.transition(&event)?;
        for warning in &output.warnings {
            warn!(id = ?self.id, state = %self.lifecycle, "{}", warning);
        }
        if next != self.lifecycle {
            debug!(
                id = ?self.id,
                from = %self.lifecycle,
                to = %next,
                "lifecycle transition"
            );
        }
        self.lifecycle = next;
        Ok(())
    }

    /// Record an observation and move the lifecycle to match it
    pub fn observe(&mut self, observed: &VersionedDistribution) -> TransitionResult<()> {
        self.record(observed);
        self.advance(LifecycleEvent::Observed {
            status: observed.distribution.status,
            enabled: observed.distribution.config.enabled,
        })
    }

    /// Drop everything: the distribution no longer exists or is no longer managed
    pub fn forget(&mut self) {
        *self = Self::default();
    }
}
