// Copyright (c) 2025 - Cowboy AI, Inc.
//! Delete Protocol State Machine
//!
//! The remote refuses to delete a distribution that is enabled or still
//! deploying. Teardown is therefore an ordered protocol; this module holds
//! its states and transitions with no knowledge of the remote client. The
//! reconciler performs the [`DeleteStep`] each transition asks for and feeds
//! the result back as a [`DeleteEvent`].
//!
//! # Phases
//!
//! ```text
//! AwaitingDeployment ──Deployed──> Deleting ──Deleted──> Gone
//!                                     │
//!                                    Busy
//!                                     ▼
//!                                 Inspecting ──disabled & deployed──> FinalDeleting ──Deleted──> Gone
//!                                     │   └──disabled, in progress──┐        ▲
//!                                  enabled                          ▼        │
//!                                     ▼                      AwaitingDisabled┘
//!                                 Disabling ──DisableApplied──────────┘
//! ```
//!
//! `NotFound` from any non-terminal phase ends the protocol successfully.
//! With `retain` set, the protocol never deletes: it disables, waits for the
//! disable to deploy, and finishes as `Retained`.

use super::{StateMachine, TransitionError, TransitionResult};

/// Where the protocol currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletePhase {
    /// Waiting for any in-flight deployment before the first attempt
    AwaitingDeployment,

    /// First delete attempt
    Deleting,

    /// Remote said "not disabled"; re-reading to decide how to disable
    Inspecting,

    /// Writing `enabled = false`
    Disabling,

    /// Waiting for the disable to deploy
    AwaitingDisabled,

    /// Delete attempt after disabling; failures here are fatal
    FinalDeleting,

    Gone,
    Retained,
}

/// Result of performing the current step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteEvent {
    /// The waiter saw `Deployed`
    Deployed,

    /// The resource does not exist
    NotFound,

    /// The delete call succeeded
    Deleted,

    /// The delete call was refused because the resource is not disabled
    Busy,

    /// Inspection found the resource still enabled
    InspectedEnabled,

    /// Inspection found the resource disabled
    InspectedDisabled { deployed: bool },

    /// The disabling update was accepted
    DisableApplied,
}

/// How the protocol ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// This run deleted the resource
    Deleted,

    /// The resource was already gone
    AlreadyAbsent,

    /// The resource was disabled and left in place
    Retained,
}

/// Next action the driver must perform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteStep {
    AwaitDeployment,
    Delete,
    Inspect,
    Disable,
    Finish(DeleteOutcome),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteProtocol {
    phase: DeletePhase,
    retain: bool,
}

impl DeleteProtocol {
    pub fn new(retain: bool) -> Self {
        Self {
            phase: DeletePhase::AwaitingDeployment,
            retain,
        }
    }

    pub fn phase(&self) -> DeletePhase {
        self.phase
    }

    /// The step to perform before any event has been observed
    pub fn first_step(&self) -> DeleteStep {
        DeleteStep::AwaitDeployment
    }

    /// True once a delete has been refused and the disable path was taken
    pub fn is_final_attempt(&self) -> bool {
        self.phase == DeletePhase::FinalDeleting
    }

    fn to(&self, phase: DeletePhase, step: DeleteStep) -> TransitionResult<(Self, DeleteStep)> {
        Ok((
            Self {
                phase,
                retain: self.retain,
            },
            step,
        ))
    }

    /// Once the resource is known to be disabled and deployed
    fn after_disabled(&self) -> TransitionResult<(Self, DeleteStep)> {
        if self.retain {
            self.to(
                DeletePhase::Retained,
                DeleteStep::Finish(DeleteOutcome::Retained),
            )
        } else {
            self.to(DeletePhase::FinalDeleting, DeleteStep::Delete)
        }
    }
}

impl StateMachine for DeleteProtocol {
    type Input = DeleteEvent;
    type Output = DeleteStep;

    fn transition(&self, input: &Self::Input) -> TransitionResult<(Self, Self::Output)> {
        use DeleteEvent as E;
        use DeletePhase::*;

        if self.is_terminal() {
            return Err(TransitionError::invalid(self.phase, input));
        }

        match (self.phase, input) {
            (_, E::NotFound) => self.to(Gone, DeleteStep::Finish(DeleteOutcome::AlreadyAbsent)),

            (AwaitingDeployment, E::Deployed) if self.retain => {
                self.to(Inspecting, DeleteStep::Inspect)
            }
            (AwaitingDeployment, E::Deployed) => self.to(Deleting, DeleteStep::Delete),

            (Deleting, E::Deleted) | (FinalDeleting, E::Deleted) => {
                self.to(Gone, DeleteStep::Finish(DeleteOutcome::Deleted))
            }
            (Deleting, E::Busy) => self.to(Inspecting, DeleteStep::Inspect),

            (Inspecting, E::InspectedEnabled) => self.to(Disabling, DeleteStep::Disable),
            (Inspecting, E::InspectedDisabled { deployed: true }) => self.after_disabled(),
            (Inspecting, E::InspectedDisabled { deployed: false }) => {
                self.to(AwaitingDisabled, DeleteStep::AwaitDeployment)
            }

            (Disabling, E::DisableApplied) => {
                self.to(AwaitingDisabled, DeleteStep::AwaitDeployment)
            }
            (AwaitingDisabled, E::Deployed) => self.after_disabled(),

            (FinalDeleting, E::Busy) => Err(TransitionError::BusinessRuleViolation(
                "distribution still refuses deletion after being disabled".to_string(),
            )),

            _ => Err(TransitionError::invalid(self.phase, input)),
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self.phase, DeletePhase::Gone | DeletePhase::Retained)
    }
}
