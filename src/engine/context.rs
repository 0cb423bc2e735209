// Copyright (c) 2025 - Cowboy AI, Inc.
//! Declaration context
//!
//! The [`Context`] is what a program declares resources against. Every
//! declaration becomes a tracked task that awaits its inputs and explicit
//! dependencies, plans its step against the prior snapshot and executes it
//! through the injected provider.
//!
//! ```text
//! register ──▶ task: await inputs ──▶ plan_step ──▶ provider ──▶ resolve outputs
//!                    ▲                                               │
//!                    └──────────── consumers of the outputs ◀────────┘
//! ```
//!
//! The first failure stops the run: declarations that have not reached the
//! provider yet are cancelled, and no undeclared resource is deleted.

use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::inputs::{Inputs, PropertyMap, ResolvedInputs, ResourceArgs, ResourceOptions};
use super::plan::{deletion_order, dependents_of, plan_step, Plan, Step, StepOp};
use super::resource::{ComponentHandle, Resource};
use super::state::{ComponentState, ResourceState, Snapshot};
use super::RunMode;
use crate::domain::{ResourceKind, Urn};
use crate::errors::{InfrastructureError, InfrastructureResult};
use crate::output::{all, Output, Resolved};
use crate::provider::{Lookup, Provider};
use crate::state_machine::{DeclarationLifecycle, DeclarationReport, LifecycleEvent, StateMachine};

/// Outputs handed to consumers once a declaration settles
struct Settled {
    id: Option<String>,
    outputs: Option<PropertyMap>,
}

/// Everything a finished run produced
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub plan: Plan,
    pub snapshot: Snapshot,
    /// Export name → value, `None` while unknown
    pub exports: BTreeMap<String, Option<Value>>,
    /// How far each declaration got
    pub declarations: BTreeMap<Urn, DeclarationReport>,
    pub failure: Option<InfrastructureError>,
}

struct Shared {
    stack: String,
    project: String,
    mode: RunMode,
    provider: Arc<dyn Provider>,
    prior: Mutex<BTreeMap<Urn, ResourceState>>,
    replaced: Mutex<Vec<ResourceState>>,
    claimed: Mutex<BTreeSet<Urn>>,
    settled: Mutex<Vec<ResourceState>>,
    declarations: Mutex<BTreeMap<Urn, DeclarationReport>>,
    components: Mutex<Vec<ComponentState>>,
    plan: Mutex<Plan>,
    exports: Mutex<Vec<(String, Output<Value>)>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    failure: Mutex<Option<InfrastructureError>>,
}

/// Handle programs declare against; cheap to clone
#[derive(Clone)]
pub struct Context {
    inner: Arc<Shared>,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("stack", &self.inner.stack)
            .field("project", &self.inner.project)
            .field("mode", &self.inner.mode)
            .finish()
    }
}

impl Context {
    pub(crate) fn new(
        stack: &str,
        project: &str,
        mode: RunMode,
        provider: Arc<dyn Provider>,
        prior: Snapshot,
    ) -> Self {
        let (pending, live): (Vec<_>, Vec<_>) =
            prior.resources.into_iter().partition(|r| r.pending_delete);

        Self {
            inner: Arc::new(Shared {
                stack: stack.to_string(),
                project: project.to_string(),
                mode,
                provider,
                prior: Mutex::new(live.into_iter().map(|r| (r.urn.clone(), r)).collect()),
                replaced: Mutex::new(pending),
                claimed: Mutex::new(BTreeSet::new()),
                settled: Mutex::new(Vec::new()),
                declarations: Mutex::new(BTreeMap::new()),
                components: Mutex::new(Vec::new()),
                plan: Mutex::new(Plan::new()),
                exports: Mutex::new(Vec::new()),
                tasks: Mutex::new(Vec::new()),
                failure: Mutex::new(None),
            }),
        }
    }

    pub fn stack(&self) -> &str {
        &self.inner.stack
    }

    pub fn project(&self) -> &str {
        &self.inner.project
    }

    pub fn mode(&self) -> RunMode {
        self.inner.mode
    }

    pub fn is_preview(&self) -> bool {
        self.inner.mode == RunMode::Preview
    }

    /// First failure of this run, if any
    pub fn failure(&self) -> Option<InfrastructureError> {
        self.inner.failure.lock().clone()
    }

    fn urn_for(&self, type_token: &str, name: &str) -> Urn {
        Urn::new(&self.inner.stack, &self.inner.project, type_token, name)
    }

    fn claim(&self, urn: &Urn) -> bool {
        self.inner.claimed.lock().insert(urn.clone())
    }

    fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(future);
        self.inner.tasks.lock().push(handle);
    }

    /// Record a failure; only the first one that is not a cancellation sticks
    pub(crate) fn record_failure(&self, err: InfrastructureError) {
        if err.is_cancellation() {
            return;
        }
        let mut failure = self.inner.failure.lock();
        if failure.is_none() {
            error!(error = %err, "run stopped");
            *failure = Some(err);
        }
    }

    fn ensure_running(&self) -> InfrastructureResult<()> {
        match self.inner.failure.lock().as_ref() {
            Some(err) => Err(InfrastructureError::Cancelled(format!(
                "stopped after earlier failure: {err}"
            ))),
            None => Ok(()),
        }
    }

    fn journal(&self, urn: &Urn, kind: ResourceKind, op: StepOp, diffs: Vec<String>) {
        self.inner
            .plan
            .lock()
            .push(Step::new(urn.clone(), kind, op, diffs));
    }

    fn adopt(&self, parent: &Urn, child: &Urn) {
        let mut components = self.inner.components.lock();
        if let Some(component) = components.iter_mut().find(|c| &c.urn == parent) {
            component.children.push(child.clone());
        }
    }

    /// Declare a component (grouping node)
    ///
    /// Components have no provider-side existence; they only group their
    /// children for display.
    pub fn component(
        &self,
        type_name: &str,
        name: &str,
        parent: Option<&Urn>,
    ) -> InfrastructureResult<ComponentHandle> {
        let urn = self.urn_for(type_name, name);
        if !self.claim(&urn) {
            return Err(InfrastructureError::DuplicateUrn(urn.to_string()));
        }
        self.inner.components.lock().push(ComponentState {
            urn: urn.clone(),
            type_name: type_name.to_string(),
            name: name.to_string(),
            parent: parent.cloned(),
            children: Vec::new(),
        });
        if let Some(parent) = parent {
            self.adopt(parent, &urn);
        }
        debug!(urn = %urn, "component declared");
        Ok(ComponentHandle::new(urn, type_name, name))
    }

    /// Declare a resource
    ///
    /// Returns immediately; the handle's outputs resolve once the resource's
    /// step has executed.
    pub fn register<A: ResourceArgs>(
        &self,
        name: &str,
        args: A,
        options: ResourceOptions,
    ) -> Resource {
        let kind = A::KIND;
        let urn = self.urn_for(kind.type_token(), name);
        let (id_resolver, id) = Output::pending();
        let (state_resolver, state) = Output::pending();
        let resource = Resource::new(urn.clone(), kind, id, state);

        if !self.claim(&urn) {
            let err = InfrastructureError::DuplicateUrn(urn.to_string());
            self.record_failure(err.clone());
            id_resolver.reject(err.clone());
            state_resolver.reject(err);
            return resource;
        }
        if let Some(parent) = &options.parent {
            self.adopt(parent, &urn);
        }
        debug!(urn = %urn, kind = %kind, "resource declared");

        let inputs = args.into_inputs();
        let ctx = self.clone();
        self.spawn(async move {
            match ctx.run_declaration(&urn, kind, inputs, options).await {
                Ok(settled) => {
                    id_resolver.resolve(Resolved::from_resource(settled.id, urn.clone()));
                    state_resolver.resolve(Resolved::from_resource(settled.outputs, urn));
                }
                Err(err) => {
                    ctx.record_failure(err.clone());
                    id_resolver.reject(err.clone());
                    state_resolver.reject(err);
                }
            }
        });

        resource
    }

    async fn await_inputs(
        &self,
        inputs: Inputs,
        options: &ResourceOptions,
    ) -> InfrastructureResult<ResolvedInputs> {
        let explicit = all(options.depends_on.iter().map(Resource::ready).collect());
        let (resolved, explicit) = futures::join!(inputs.resolve(), explicit.resolve());
        let mut resolved = resolved?;
        resolved.dependencies.extend(explicit?.dependencies);
        Ok(resolved)
    }

    async fn run_declaration(
        &self,
        urn: &Urn,
        kind: ResourceKind,
        inputs: Inputs,
        options: ResourceOptions,
    ) -> InfrastructureResult<Settled> {
        let mut lifecycle = DeclarationLifecycle::new();
        let result = self
            .drive_declaration(&mut lifecycle, urn, kind, inputs, options)
            .await;

        if let Err(err) = &result {
            // A rejected transition leaves the machine short of a terminal state
            if !lifecycle.status().is_terminal() {
                lifecycle.advance(LifecycleEvent::Fail(err.to_string())).ok();
            }
        }
        let report = lifecycle.report();
        if report.critical {
            warn!(urn = %urn, warnings = ?report.warnings, "declaration failed");
        }
        self.inner.declarations.lock().insert(urn.clone(), report);
        result
    }

    async fn drive_declaration(
        &self,
        lifecycle: &mut DeclarationLifecycle,
        urn: &Urn,
        kind: ResourceKind,
        inputs: Inputs,
        options: ResourceOptions,
    ) -> InfrastructureResult<Settled> {
        lifecycle.advance(LifecycleEvent::StartResolution)?;

        let awaited = self.await_inputs(inputs, &options).await;
        let resolved = match awaited.and_then(|r| self.ensure_running().map(|_| r)) {
            Ok(resolved) => resolved,
            Err(err) => {
                lifecycle.advance(LifecycleEvent::Cancel(err.to_string()))?;
                self.record_failure(err.clone());
                debug!(urn = %urn, error = %err, "declaration cancelled");
                return Err(if err.is_cancellation() {
                    err
                } else {
                    InfrastructureError::Cancelled(format!("{urn}: {err}"))
                });
            }
        };
        lifecycle.advance(LifecycleEvent::InputsResolved)?;

        let prior = self.inner.prior.lock().get(urn).cloned();
        let (op, diffs) = plan_step(kind, prior.as_ref(), &resolved, options.delete_before_replace);
        lifecycle.advance(LifecycleEvent::Apply)?;

        match self.apply(urn, kind, op, &resolved, prior, &options).await {
            Ok(settled) => {
                lifecycle.advance(LifecycleEvent::Succeed)?;
                if op.is_change() {
                    info!(urn = %urn, op = ?op, diffs = ?diffs, "step");
                } else {
                    debug!(urn = %urn, "unchanged");
                }
                self.journal(urn, kind, op, diffs);
                Ok(settled)
            }
            Err(err) => {
                lifecycle.advance(LifecycleEvent::Fail(err.to_string()))?;
                Err(err)
            }
        }
    }

    async fn apply(
        &self,
        urn: &Urn,
        kind: ResourceKind,
        op: StepOp,
        resolved: &ResolvedInputs,
        prior: Option<ResourceState>,
        options: &ResourceOptions,
    ) -> InfrastructureResult<Settled> {
        if self.is_preview() {
            return Ok(preview_outputs(op, prior.as_ref(), resolved));
        }
        if !resolved.is_fully_known() {
            return Err(InfrastructureError::DependencyOrdering(format!(
                "{urn}: inputs {:?} unresolved at apply",
                resolved.unknown
            )));
        }

        let provider = &self.inner.provider;
        let properties = &resolved.properties;
        let (id, outputs) = match (op, prior) {
            (StepOp::Same, Some(prior)) => (prior.id, prior.outputs),
            (StepOp::Update, Some(prior)) => {
                let outputs = provider.update(kind, urn, &prior.id, properties).await?;
                (prior.id, outputs)
            }
            (
                StepOp::Replace {
                    delete_before_replace: true,
                },
                Some(prior),
            ) => {
                self.delete_dependents(urn).await?;
                provider.delete(kind, urn, &prior.id).await?;
                self.inner.prior.lock().remove(urn);
                self.journal(urn, kind, StepOp::DeleteReplaced, Vec::new());
                let created = provider.create(kind, urn, properties).await?;
                (created.id, created.outputs)
            }
            (StepOp::Replace { .. }, Some(mut prior)) => {
                let created = provider.create(kind, urn, properties).await?;
                self.inner.prior.lock().remove(urn);
                prior.pending_delete = true;
                self.inner.replaced.lock().push(prior);
                (created.id, created.outputs)
            }
            _ => {
                let created = provider.create(kind, urn, properties).await?;
                (created.id, created.outputs)
            }
        };

        let mut dependencies = resolved.dependencies.clone();
        dependencies.remove(urn);
        self.inner.settled.lock().push(ResourceState {
            urn: urn.clone(),
            kind,
            id: id.clone(),
            inputs: properties.clone(),
            outputs: outputs.clone(),
            parent: options.parent.clone(),
            dependencies,
            delete_before_replace: options.delete_before_replace,
            pending_delete: false,
        });

        Ok(Settled {
            id: Some(id),
            outputs: Some(outputs),
        })
    }

    /// Delete every prior resource that depends on `urn`, dependents first
    async fn delete_dependents(&self, urn: &Urn) -> InfrastructureResult<()> {
        let doomed: Vec<ResourceState> = {
            let prior = self.inner.prior.lock();
            dependents_of(urn, prior.values())
                .iter()
                .filter_map(|u| prior.get(u).cloned())
                .collect()
        };

        for state in deletion_order(doomed) {
            info!(urn = %state.urn, replaced = %urn, "deleting dependent before replacement");
            self.inner
                .provider
                .delete(state.kind, &state.urn, &state.id)
                .await?;
            self.inner.prior.lock().remove(&state.urn);
            self.inner.settled.lock().retain(|s| s.urn != state.urn);
            self.journal(&state.urn, state.kind, StepOp::DeleteReplaced, Vec::new());
        }
        Ok(())
    }

    /// Run `continuation` once `output` resolves
    ///
    /// The continuation may declare further resources. It is skipped when the
    /// value stays unknown (preview of a resource that does not exist yet).
    pub fn when_resolved<T, F>(&self, output: Output<T>, continuation: F)
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce(&Context, T) -> InfrastructureResult<()> + Send + 'static,
    {
        let ctx = self.clone();
        self.spawn(async move {
            match output.resolve().await {
                Ok(Resolved { value: Some(value), .. }) => {
                    if let Err(err) = continuation(&ctx, value) {
                        ctx.record_failure(err);
                    }
                }
                Ok(_) => debug!("continuation skipped: value unknown until apply"),
                Err(err) => ctx.record_failure(err),
            }
        });
    }

    /// Run a provider lookup
    pub fn invoke(&self, lookup: Lookup) -> Output<Value> {
        let (resolver, output) = Output::pending();
        let ctx = self.clone();
        self.spawn(async move {
            debug!(function = lookup.function(), "invoke");
            let result = ctx.inner.provider.invoke(&lookup).await;
            if let Err(err) = &result {
                ctx.record_failure(err.clone());
            }
            resolver.settle(result.map(Resolved::known));
        });
        output
    }

    /// Export a stack output
    pub fn export<T>(&self, name: &str, value: &Output<T>)
    where
        T: Serialize + Clone + Send + Sync + 'static,
    {
        self.inner
            .exports
            .lock()
            .push((name.to_string(), value.to_json()));
    }

    /// Wait for every declaration and continuation, including those spawned
    /// while waiting
    async fn drain(&self) {
        loop {
            let handles: Vec<_> = std::mem::take(&mut *self.inner.tasks.lock());
            if handles.is_empty() {
                break;
            }
            for handle in handles {
                if let Err(e) = handle.await {
                    self.record_failure(InfrastructureError::DependencyOrdering(format!(
                        "declaration task aborted: {e}"
                    )));
                }
            }
        }
    }

    async fn resolve_exports(&self) -> BTreeMap<String, Option<Value>> {
        let exports: Vec<_> = self.inner.exports.lock().clone();
        let mut resolved = BTreeMap::new();
        for (name, output) in exports {
            let value = match output.value().await {
                Ok(value) => value,
                Err(err) => {
                    self.record_failure(err);
                    None
                }
            };
            resolved.insert(name, value);
        }
        resolved
    }

    /// Delete undeclared and replaced resources, dependents first
    async fn delete_undeclared(&self) {
        let doomed: Vec<ResourceState> = {
            let claimed = self.inner.claimed.lock();
            let mut doomed: Vec<_> = self
                .inner
                .prior
                .lock()
                .values()
                .filter(|s| !claimed.contains(&s.urn))
                .cloned()
                .collect();
            doomed.extend(self.inner.replaced.lock().iter().cloned());
            doomed
        };

        for state in deletion_order(doomed) {
            let op = if state.pending_delete {
                StepOp::DeleteReplaced
            } else {
                StepOp::Delete
            };
            if !self.is_preview() {
                if let Err(err) = self
                    .inner
                    .provider
                    .delete(state.kind, &state.urn, &state.id)
                    .await
                {
                    warn!(urn = %state.urn, error = %err, "delete failed");
                    self.record_failure(err);
                    return;
                }
                info!(urn = %state.urn, "deleted");
                if state.pending_delete {
                    self.inner.replaced.lock().retain(|s| s.id != state.id);
                } else {
                    self.inner.prior.lock().remove(&state.urn);
                }
            }
            self.journal(&state.urn, state.kind, op, Vec::new());
        }
    }

    fn snapshot(&self, exports: &BTreeMap<String, Option<Value>>) -> Snapshot {
        let mut resources = self.inner.settled.lock().clone();
        let settled: BTreeSet<Urn> = resources.iter().map(|r| r.urn.clone()).collect();
        resources.extend(
            self.inner
                .prior
                .lock()
                .values()
                .filter(|r| !settled.contains(&r.urn))
                .cloned(),
        );
        resources.extend(self.inner.replaced.lock().iter().cloned());

        // Dependencies first, stable across runs
        resources.sort_by(|a, b| a.urn.cmp(&b.urn).then(a.pending_delete.cmp(&b.pending_delete)));
        let mut resources = deletion_order(resources);
        resources.reverse();

        Snapshot {
            update_id: None,
            updated_at: Some(Utc::now()),
            resources,
            components: self.inner.components.lock().clone(),
            exports: exports
                .iter()
                .filter_map(|(k, v)| v.clone().map(|v| (k.clone(), v)))
                .collect(),
        }
    }

    /// Drain the run, delete what is no longer declared and build the new
    /// snapshot
    pub(crate) async fn finish(&self) -> RunOutcome {
        self.drain().await;
        let exports = self.resolve_exports().await;
        if self.failure().is_none() {
            self.delete_undeclared().await;
        }
        let snapshot = self.snapshot(&exports);

        RunOutcome {
            plan: self.inner.plan.lock().clone(),
            snapshot,
            exports,
            declarations: self.inner.declarations.lock().clone(),
            failure: self.failure(),
        }
    }
}

/// Outputs of a previewed step
fn preview_outputs(
    op: StepOp,
    prior: Option<&ResourceState>,
    resolved: &ResolvedInputs,
) -> Settled {
    match (op, prior) {
        (StepOp::Same, Some(prior)) => Settled {
            id: Some(prior.id.clone()),
            outputs: Some(prior.outputs.clone()),
        },
        (StepOp::Update, Some(prior)) => {
            let outputs = resolved.is_fully_known().then(|| {
                let mut outputs = prior.outputs.clone();
                outputs.extend(resolved.properties.clone());
                outputs
            });
            Settled {
                id: Some(prior.id.clone()),
                outputs,
            }
        }
        _ => Settled {
            id: None,
            outputs: None,
        },
    }
}
