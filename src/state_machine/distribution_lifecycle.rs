// Copyright (c) 2025 - Cowboy AI, Inc.
//! Distribution Lifecycle State Machine
//!
//! Tracks where a managed distribution is in its life, as seen by the
//! caller. Transitions are driven by caller operations and by observations
//! of the remote resource; the remote's own `InProgress → Deployed`
//! propagation only ever arrives here as an observation.
//!
//! # States
//!
//! - Absent: nothing exists (initial, and final after delete)
//! - Creating: create requested, no id assigned yet
//! - Live: exists, with the last observed status and enabled flag
//! - Deleting: delete protocol running (resumable)
//! - Retained: disabled and released from management (terminal)
//!
//! ```text
//! Absent → Creating → Live{InProgress|Deployed, enabled ⇄ disabled} → Deleting → Absent
//!                                                                          ↘ Retained
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{StateMachine, TransitionError, TransitionResult};
use crate::domain::DistributionStatus;

/// Caller-side lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LifecycleState {
    #[default]
    Absent,
    Creating,
    Live {
        status: DistributionStatus,
        enabled: bool,
    },
    Deleting,
    Retained,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleState::Absent => f.write_str("Absent"),
            LifecycleState::Creating => f.write_str("Creating"),
            LifecycleState::Live { status, enabled } => {
                let flag = if *enabled { "Enabled" } else { "Disabled" };
                write!(f, "{}({})", status, flag)
            }
            LifecycleState::Deleting => f.write_str("Deleting"),
            LifecycleState::Retained => f.write_str("Retained"),
        }
    }
}

/// Lifecycle input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Caller asked for a new distribution
    CreateRequested,

    /// The create call itself failed; nothing was assigned
    CreateFailed,

    /// A read or write returned the resource in this shape
    Observed {
        status: DistributionStatus,
        enabled: bool,
    },

    /// Caller asked for teardown
    DeleteRequested,

    /// The remote no longer has the resource
    Deleted,

    /// Teardown stopped after disabling
    Retained,

    /// The resource disappeared without the delete protocol running
    Vanished,
}

/// Transition output with metadata
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransitionOutput {
    /// Warnings generated during transition
    pub warnings: Vec<String>,
}

impl TransitionOutput {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn with_warning(warning: impl Into<String>) -> Self {
        Self {
            warnings: vec![warning.into()],
        }
    }
}

impl StateMachine for LifecycleState {
    type Input = LifecycleEvent;
    type Output = TransitionOutput;

    fn transition(&self, input: &Self::Input) -> TransitionResult<(Self, Self::Output)> {
        use LifecycleEvent as E;
        use LifecycleState::*;

        match (self, input) {
            (Absent, E::CreateRequested) => Ok((Creating, TransitionOutput::ok())),
            (Absent, E::Observed { status, enabled }) => Ok((
                Live {
                    status: *status,
                    enabled: *enabled,
                },
                TransitionOutput::with_warning("adopting a distribution created elsewhere"),
            )),

            (Creating, E::CreateFailed) => Ok((Absent, TransitionOutput::ok())),
            (Creating, E::Observed { status, enabled })
            | (Live { .. }, E::Observed { status, enabled }) => Ok((
                Live {
                    status: *status,
                    enabled: *enabled,
                },
                TransitionOutput::ok(),
            )),

            (Live { enabled, .. }, E::DeleteRequested) => {
                let output = if *enabled {
                    TransitionOutput::with_warning("distribution must be disabled before deletion")
                } else {
                    TransitionOutput::ok()
                };
                Ok((Deleting, output))
            }

            // Resuming an interrupted teardown
            (Deleting, E::DeleteRequested) | (Deleting, E::Observed { .. }) => {
                Ok((Deleting, TransitionOutput::ok()))
            }
            (Deleting, E::Deleted) => Ok((Absent, TransitionOutput::ok())),
            (Deleting, E::Retained) => Ok((
                Retained,
                TransitionOutput::with_warning(
                    "distribution left in place; it must be deleted manually",
                ),
            )),

            (Creating, E::Vanished) | (Live { .. }, E::Vanished) => Ok((
                Absent,
                TransitionOutput::with_warning("distribution disappeared outside of reconciliation"),
            )),
            (Deleting, E::Vanished) => Ok((Absent, TransitionOutput::ok())),

            (Live { .. }, E::CreateRequested) | (Deleting, E::CreateRequested) => Err(
                TransitionError::BusinessRuleViolation("distribution already exists".to_string()),
            ),

            _ => Err(TransitionError::invalid(self, input)),
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, LifecycleState::Retained)
    }
}
