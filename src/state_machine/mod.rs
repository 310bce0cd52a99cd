// Copyright (c) 2025 - Cowboy AI, Inc.
//! Finite State Machine Abstractions
//!
//! Generic state machine types used to model the distribution lifecycle and
//! the delete protocol. Transitions are pure functions; the reconciler
//! performs the I/O each state asks for and feeds the outcome back in.
//!
//! # Mealy Machine
//!
//! Output depends on both current state and input:
//! ```text
//! (State, Input) → (State, Output)
//! ```
//!
//! Both machines in this crate are Mealy machines. The delete protocol uses
//! its output to name the next remote action to perform.
//!
//! # Example
//!
//! ```rust
//! use cdn_reconciler::state_machine::{StateMachine, TransitionResult};
//!
//! #[derive(Debug, Clone, PartialEq)]
//! enum Switch {
//!     Off,
//!     On,
//! }
//!
//! impl StateMachine for Switch {
//!     type Input = ();
//!     type Output = ();
//!
//!     fn transition(&self, _input: &()) -> TransitionResult<(Self, ())> {
//!         match self {
//!             Switch::Off => Ok((Switch::On, ())),
//!             Switch::On => Ok((Switch::Off, ())),
//!         }
//!     }
//! }
//!
//! let (next, _) = Switch::Off.transition(&()).unwrap();
//! assert_eq!(next, Switch::On);
//! ```

pub mod delete_protocol;
pub mod distribution_lifecycle;

pub use delete_protocol::{DeleteEvent, DeleteOutcome, DeletePhase, DeleteProtocol, DeleteStep};
pub use distribution_lifecycle::{LifecycleEvent, LifecycleState, TransitionOutput};

/// Result of a state transition
pub type TransitionResult<S> = Result<S, TransitionError>;

/// Errors that can occur during state transitions
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    /// Transition from current state to target state is not allowed
    #[error("Invalid transition from {from} on {input}")]
    InvalidTransition { from: String, input: String },

    /// Business rule prevents transition
    #[error("Business rule violated: {0}")]
    BusinessRuleViolation(String),
}

impl TransitionError {
    pub(crate) fn invalid(from: impl std::fmt::Debug, input: impl std::fmt::Debug) -> Self {
        TransitionError::InvalidTransition {
            from: format!("{:?}", from),
            input: format!("{:?}", input),
        }
    }
}

/// Trait for finite state machines
///
/// Implement this trait to define a state machine with typed states,
/// inputs, and outputs.
pub trait StateMachine: Sized + Clone {
    /// Input type that triggers transitions
    type Input;

    /// Output type produced by transitions (use () if none)
    type Output;

    /// Attempt to transition to a new state given an input
    ///
    /// # Returns
    /// - Ok((new_state, output)) if transition is valid
    /// - Err(TransitionError) if transition is invalid
    fn transition(&self, input: &Self::Input) -> TransitionResult<(Self, Self::Output)>;

    /// Check if a transition is valid without performing it
    fn can_transition(&self, input: &Self::Input) -> bool {
        self.transition(input).is_ok()
    }

    /// Whether no further input is accepted
    fn is_terminal(&self) -> bool {
        false
    }
}

/// Transition metadata
///
/// Records information about a state transition for auditing.
#[derive(Debug, Clone)]
pub struct Transition<S, I> {
    /// State before transition
    pub from: S,

    /// State after transition
    pub to: S,

    /// Input that triggered transition
    pub input: I,

    /// Timestamp of transition
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl<S, I> Transition<S, I> {
    pub fn new(from: S, to: S, input: I, timestamp: chrono::DateTime<chrono::Utc>) -> Self {
        Self {
            from,
            to,
            input,
            timestamp,
        }
    }
}

/// State machine with history
///
/// Wraps a state machine and tracks transition history.
#[derive(Debug, Clone)]
pub struct StateMachineWithHistory<FSM: StateMachine> {
    /// Current state
    pub current: FSM,

    /// Transition history
    pub history: Vec<Transition<FSM, FSM::Input>>,
}

impl<FSM: StateMachine> StateMachineWithHistory<FSM> {
    pub fn new(initial: FSM) -> Self {
        Self {
            current: initial,
            history: Vec::new(),
        }
    }

    /// Transition with history recording
    pub fn transition_with_history(
        &mut self,
        input: FSM::Input,
        timestamp: chrono::DateTime<chrono::Utc>,
    ) -> TransitionResult<FSM::Output> {
        let (to, output) = self.current.transition(&input)?;

        let from = std::mem::replace(&mut self.current, to.clone());
        self.history.push(Transition::new(from, to, input, timestamp));

        Ok(output)
    }

    pub fn get_history(&self) -> &[Transition<FSM, FSM::Input>] {
        &self.history
    }

    pub fn current_state(&self) -> &FSM {
        &self.current
    }

    /// Consume the wrapper, keeping only the recorded transitions
    pub fn into_history(self) -> Vec<Transition<FSM, FSM::Input>> {
        self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Switch {
        Off,
        On,
        Broken,
    }

    #[derive(Debug, Clone)]
    enum SwitchInput {
        Press,
        Smash,
    }

    impl StateMachine for Switch {
        type Input = SwitchInput;
        type Output = ();

        fn transition(&self, input: &Self::Input) -> TransitionResult<(Self, Self::Output)> {
            match (self, input) {
                (Switch::Off, SwitchInput::Press) => Ok((Switch::On, ())),
                (Switch::On, SwitchInput::Press) => Ok((Switch::Off, ())),
                (Switch::Broken, _) => Err(TransitionError::invalid(self, input)),
                (_, SwitchInput::Smash) => Ok((Switch::Broken, ())),
            }
        }

        fn is_terminal(&self) -> bool {
            matches!(self, Switch::Broken)
        }
    }

    #[test]
    fn test_simple_transition() {
        let (new_state, _) = Switch::Off.transition(&SwitchInput::Press).unwrap();
        assert_eq!(new_state, Switch::On);
    }

    #[test]
    fn test_can_transition() {
        assert!(Switch::Off.can_transition(&SwitchInput::Press));
        assert!(!Switch::Broken.can_transition(&SwitchInput::Press));
        assert!(Switch::Broken.is_terminal());
    }

    #[test]
    fn test_invalid_transition_names_state_and_input() {
        let err = Switch::Broken.transition(&SwitchInput::Press).unwrap_err();
        assert_eq!(
            err,
            TransitionError::InvalidTransition {
                from: "Broken".to_string(),
                input: "Press".to_string(),
            }
        );
    }

    #[test]
    fn test_state_machine_with_history() {
        let mut fsm = StateMachineWithHistory::new(Switch::Off);

        fsm.transition_with_history(SwitchInput::Press, Utc::now())
            .unwrap();
        assert_eq!(*fsm.current_state(), Switch::On);
        assert_eq!(fsm.get_history().len(), 1);

        fsm.transition_with_history(SwitchInput::Press, Utc::now())
            .unwrap();
        assert_eq!(*fsm.current_state(), Switch::Off);

        let history = fsm.into_history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].from, Switch::Off);
        assert_eq!(history[1].to, Switch::Off);
    }

    #[test]
    fn test_failed_transition_leaves_history_untouched() {
        let mut fsm = StateMachineWithHistory::new(Switch::Broken);
        assert!(fsm
            .transition_with_history(SwitchInput::Press, Utc::now())
            .is_err());
        assert!(fsm.get_history().is_empty());
        assert_eq!(*fsm.current_state(), Switch::Broken);
    }
}
