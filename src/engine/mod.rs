// Copyright (c) 2025 - Cowboy AI, Inc.
//! Deployment Engine
//!
//! Runs a program (a function that declares resources against a
//! [`Context`]) and reconciles the declared set with the prior snapshot.
//!
//! ```text
//! StateStore ──load──▶ Context ──program──▶ declarations ──▶ Provider
//!      ▲                                                        │
//!      └─────────────────────save (Up only)◀────────────────────┘
//! ```
//!
//! # Modes
//!
//! - **Preview**: plan every step, touch nothing; values of resources that
//!   do not exist yet stay unknown
//! - **Up**: execute the steps and persist the new snapshot, even when the
//!   run stopped early
//! - **Destroy**: an `Up` of the empty program

pub mod context;
pub mod inputs;
pub mod plan;
pub mod resource;
pub mod state;

pub use context::{Context, RunOutcome};
pub use inputs::{Inputs, PropertyMap, ResolvedInputs, ResourceArgs, ResourceOptions};
pub use plan::{Plan, PlanSummary, Step, StepOp};
pub use resource::{ComponentHandle, HasUrn, Resource};
pub use state::{
    ComponentState, FileStateStore, InMemoryStateStore, ResourceState, Snapshot, StateStore,
};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;
use uuid::Uuid;

use crate::domain::Urn;
use crate::errors::InfrastructureResult;
use crate::provider::Provider;
use crate::state_machine::DeclarationReport;

/// How a run treats the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Preview,
    Up,
    Destroy,
}

impl RunMode {
    fn applies(&self) -> bool {
        !matches!(self, RunMode::Preview)
    }
}

/// Result of a successful run
#[derive(Debug, Clone)]
pub struct UpdateSummary {
    pub update_id: Uuid,
    pub mode: RunMode,
    pub plan: Plan,
    /// Snapshot after the run (the prior one for a preview)
    pub snapshot: Snapshot,
    /// Export name → value, `None` while unknown
    pub exports: BTreeMap<String, Option<Value>>,
    /// How far each declaration got
    pub declarations: BTreeMap<Urn, DeclarationReport>,
    pub duration: Duration,
}

/// One stack bound to a provider and a state store
#[derive(Clone)]
pub struct Deployment {
    stack: String,
    project: String,
    provider: Arc<dyn Provider>,
    store: Arc<dyn StateStore>,
    last_run: Arc<Mutex<BTreeMap<Urn, DeclarationReport>>>,
}

impl Deployment {
    pub fn new(
        stack: &str,
        project: &str,
        provider: Arc<dyn Provider>,
        store: Arc<dyn StateStore>,
    ) -> Self {
        Self {
            stack: stack.to_string(),
            project: project.to_string(),
            provider,
            store,
            last_run: Arc::default(),
        }
    }

    pub fn stack(&self) -> &str {
        &self.stack
    }

    /// Declaration reports of the last run, failed runs included
    pub fn last_declarations(&self) -> BTreeMap<Urn, DeclarationReport> {
        self.last_run.lock().clone()
    }

    /// Snapshot of the last apply (empty if never deployed)
    pub async fn snapshot(&self) -> InfrastructureResult<Snapshot> {
        Ok(self.store.load(&self.stack).await?.unwrap_or_default())
    }

    /// Plan `program` without touching the provider
    pub async fn preview<F, Fut>(&self, program: F) -> InfrastructureResult<UpdateSummary>
    where
        F: FnOnce(Context) -> Fut,
        Fut: Future<Output = InfrastructureResult<()>>,
    {
        self.run(RunMode::Preview, program).await
    }

    /// Converge the provider on `program`
    pub async fn up<F, Fut>(&self, program: F) -> InfrastructureResult<UpdateSummary>
    where
        F: FnOnce(Context) -> Fut,
        Fut: Future<Output = InfrastructureResult<()>>,
    {
        self.run(RunMode::Up, program).await
    }

    /// Delete everything the stack owns
    pub async fn destroy(&self) -> InfrastructureResult<UpdateSummary> {
        self.run(RunMode::Destroy, |_ctx| async { Ok(()) }).await
    }

    async fn run<F, Fut>(&self, mode: RunMode, program: F) -> InfrastructureResult<UpdateSummary>
    where
        F: FnOnce(Context) -> Fut,
        Fut: Future<Output = InfrastructureResult<()>>,
    {
        let started = Instant::now();
        let update_id = Uuid::now_v7();
        let prior = self.snapshot().await?;
        info!(
            stack = %self.stack,
            mode = ?mode,
            provider = self.provider.name(),
            prior_resources = prior.resources.len(),
            "run started"
        );

        let ctx = Context::new(
            &self.stack,
            &self.project,
            if mode == RunMode::Preview {
                RunMode::Preview
            } else {
                RunMode::Up
            },
            self.provider.clone(),
            prior.clone(),
        );
        if let Err(err) = program(ctx.clone()).await {
            ctx.record_failure(err);
        }
        let outcome = ctx.finish().await;
        *self.last_run.lock() = outcome.declarations.clone();

        let mut snapshot = if mode.applies() {
            outcome.snapshot
        } else {
            prior
        };
        if mode.applies() {
            snapshot.update_id = Some(update_id);
            self.store.save(&self.stack, &snapshot).await?;
        }

        let summary = outcome.plan.summary();
        info!(
            stack = %self.stack,
            create = summary.create,
            update = summary.update,
            replace = summary.replace,
            delete = summary.delete,
            same = summary.same,
            "run finished"
        );

        match outcome.failure {
            Some(err) => Err(err),
            None => Ok(UpdateSummary {
                update_id,
                mode,
                plan: outcome.plan,
                snapshot,
                exports: outcome.exports,
                declarations: outcome.declarations,
                duration: started.elapsed(),
            }),
        }
    }
}

impl std::fmt::Debug for Deployment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deployment")
            .field("stack", &self.stack)
            .field("project", &self.project)
            .field("provider", &self.provider.name())
            .finish()
    }
}
