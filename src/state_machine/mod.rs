// Copyright (c) 2025 - Cowboy AI, Inc.
//! Finite State Machines
//!
//! A machine is a value type whose `transition` is a pure function
//! `(State, Input) → (State, Output)`. [`Tracked`] wraps one and keeps the
//! transitions it took, which is what the engine reports per declaration.
//!
//! # Example
//!
//! ```rust
//! use hub_spoke_infrastructure::state_machine::{DeclarationStatus, LifecycleEvent, Tracked};
//!
//! let mut machine = Tracked::new(DeclarationStatus::Declared);
//! machine.advance(LifecycleEvent::StartResolution, chrono::Utc::now()).unwrap();
//! assert_eq!(*machine.state(), DeclarationStatus::Resolving);
//! assert_eq!(machine.path(), vec![DeclarationStatus::Resolving]);
//! ```

pub mod resource_lifecycle;

pub use resource_lifecycle::{
    DeclarationLifecycle, DeclarationReport, DeclarationStatus, LifecycleEvent, TransitionOutput,
};

use chrono::{DateTime, Utc};

/// Result of a state transition
pub type TransitionResult<S> = Result<S, TransitionError>;

/// Rejected transition
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("Invalid transition from {from} on {input}")]
    InvalidTransition { from: String, input: String },

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),
}

/// A finite state machine over typed inputs and outputs
pub trait StateMachine: Sized + Clone {
    type Input;
    type Output;

    /// Next state and output, or why `input` is not accepted here
    fn transition(&self, input: &Self::Input) -> TransitionResult<(Self, Self::Output)>;

    fn can_transition(&self, input: &Self::Input) -> bool {
        self.transition(input).is_ok()
    }

    /// Whether no input is accepted any more
    fn is_terminal(&self) -> bool {
        false
    }
}

/// One accepted transition
#[derive(Debug, Clone)]
pub struct Transition<S, I> {
    pub from: S,
    pub to: S,
    pub input: I,
    pub at: DateTime<Utc>,
}

/// A machine together with the transitions it accepted
#[derive(Debug, Clone)]
pub struct Tracked<M: StateMachine> {
    state: M,
    history: Vec<Transition<M, M::Input>>,
}

impl<M: StateMachine> Tracked<M> {
    pub fn new(initial: M) -> Self {
        Self {
            state: initial,
            history: Vec::new(),
        }
    }

    /// Apply `input`; a rejected input leaves state and history untouched
    pub fn advance(&mut self, input: M::Input, at: DateTime<Utc>) -> TransitionResult<M::Output>
    where
        M::Input: Clone,
    {
        let (to, output) = self.state.transition(&input)?;
        let from = std::mem::replace(&mut self.state, to.clone());
        self.history.push(Transition { from, to, input, at });
        Ok(output)
    }

    pub fn state(&self) -> &M {
        &self.state
    }

    pub fn history(&self) -> &[Transition<M, M::Input>] {
        &self.history
    }

    /// States entered, in order (the initial state excluded)
    pub fn path(&self) -> Vec<M> {
        self.history.iter().map(|t| t.to.clone()).collect()
    }
}
