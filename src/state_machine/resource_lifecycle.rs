// Copyright (c) 2025 - Cowboy AI, Inc.
//! Declaration Lifecycle State Machine
//!
//! Every resource declaration walks this machine while the engine resolves
//! its inputs and executes its step. A provider call is only legal from
//! `Ready`, which is only reachable once every input has resolved.
//!
//! # States
//!
//! - Declared: registered, nothing awaited yet
//! - Resolving: awaiting inputs and explicit dependencies
//! - Ready: inputs resolved, step computed
//! - Applying: step in flight against the provider
//! - Settled: outputs resolved (terminal)
//! - Failed: rejected or cancelled (terminal)
//!
//! # Inputs
//!
//! - StartResolution: Declared → Resolving
//! - InputsResolved: Resolving → Ready
//! - Apply: Ready → Applying
//! - Succeed: Applying → Settled
//! - Fail: any non-terminal → Failed
//! - Cancel: Declared | Resolving → Failed

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::{StateMachine, Tracked, TransitionError, TransitionResult};

/// Status of one declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclarationStatus {
    Declared,
    Resolving,
    Ready,
    Applying,
    Settled,
    Failed,
}

/// Lifecycle event (FSM input)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Begin awaiting inputs
    StartResolution,

    /// Every input and dependency resolved
    InputsResolved,

    /// Hand the step to the provider
    Apply,

    /// Provider call (or no-op step) completed
    Succeed,

    /// Provider rejected the step
    Fail(String),

    /// Abandoned before apply because an input or another declaration failed
    Cancel(String),
}

/// Warnings a transition produced
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransitionOutput {
    pub warnings: Vec<String>,
    /// Set when the declaration itself failed
    pub is_critical: bool,
}

impl TransitionOutput {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn warning(warning: String) -> Self {
        Self {
            warnings: vec![warning],
            is_critical: false,
        }
    }

    pub fn critical(warning: String) -> Self {
        Self {
            warnings: vec![warning],
            is_critical: true,
        }
    }
}

impl StateMachine for DeclarationStatus {
    type Input = LifecycleEvent;
    type Output = TransitionOutput;

    fn transition(&self, input: &Self::Input) -> TransitionResult<(Self, Self::Output)> {
        use DeclarationStatus::*;
        use LifecycleEvent::*;

        match (self, input) {
            (Declared, StartResolution) => Ok((Resolving, TransitionOutput::ok())),
            (Resolving, InputsResolved) => Ok((Ready, TransitionOutput::ok())),
            (Ready, Apply) => Ok((Applying, TransitionOutput::ok())),
            (Applying, Succeed) => Ok((Settled, TransitionOutput::ok())),

            (Declared | Resolving, Cancel(reason)) => Ok((
                Failed,
                TransitionOutput::warning(format!("Cancelled before apply: {reason}")),
            )),
            (Declared | Resolving | Ready | Applying, Fail(reason)) => {
                Ok((Failed, TransitionOutput::critical(reason.clone())))
            }

            (Declared | Resolving, Apply) => Err(TransitionError::PreconditionFailed(
                "Apply requested before inputs resolved".to_string(),
            )),
            (from, input) => Err(TransitionError::InvalidTransition {
                from: format!("{from:?}"),
                input: format!("{input:?}"),
            }),
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, DeclarationStatus::Settled | DeclarationStatus::Failed)
    }
}

/// What one declaration went through in a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclarationReport {
    pub status: DeclarationStatus,
    /// States entered after `Declared`
    pub path: Vec<DeclarationStatus>,
    pub warnings: Vec<String>,
    /// The declaration failed on its own rather than being cancelled
    pub critical: bool,
}

/// Lifecycle of one declaration and the warnings its transitions produced
#[derive(Debug, Clone)]
pub struct DeclarationLifecycle {
    machine: Tracked<DeclarationStatus>,
    warnings: Vec<String>,
    critical: bool,
}

impl Default for DeclarationLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl DeclarationLifecycle {
    pub fn new() -> Self {
        Self {
            machine: Tracked::new(DeclarationStatus::Declared),
            warnings: Vec::new(),
            critical: false,
        }
    }

    pub fn advance(&mut self, event: LifecycleEvent) -> TransitionResult<DeclarationStatus> {
        let output = self.machine.advance(event, Utc::now())?;
        self.critical |= output.is_critical;
        self.warnings.extend(output.warnings);
        Ok(self.status())
    }

    pub fn status(&self) -> DeclarationStatus {
        *self.machine.state()
    }

    pub fn report(&self) -> DeclarationReport {
        DeclarationReport {
            status: self.status(),
            path: self.machine.path(),
            warnings: self.warnings.clone(),
            critical: self.critical,
        }
    }
}
