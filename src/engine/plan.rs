// Copyright (c) 2025 - Cowboy AI, Inc.
//! Step planning
//!
//! A step is what the engine does for one resource in one run. Steps are
//! pure functions of the prior state and the resolved inputs; the journal
//! ([`Plan`]) records them in execution order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::domain::{ResourceKind, Urn};
use crate::engine::inputs::{PropertyMap, ResolvedInputs};
use crate::engine::state::ResourceState;

/// Operation for one resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOp {
    Same,
    Create,
    Update,
    Replace { delete_before_replace: bool },
    Delete,
    /// Deletion of the old half of a replacement
    DeleteReplaced,
}

impl StepOp {
    /// Whether the step touches the provider
    pub fn is_change(&self) -> bool {
        !matches!(self, StepOp::Same)
    }
}

impl fmt::Display for StepOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            StepOp::Same => " ",
            StepOp::Create => "+",
            StepOp::Update => "~",
            StepOp::Replace { .. } => "+-",
            StepOp::Delete => "-",
            StepOp::DeleteReplaced => "--",
        };
        write!(f, "{symbol}")
    }
}

/// One journaled step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub urn: Urn,
    pub kind: ResourceKind,
    pub op: StepOp,
    /// Changed input properties, sorted
    pub diffs: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl Step {
    pub fn new(urn: Urn, kind: ResourceKind, op: StepOp, diffs: Vec<String>) -> Self {
        Self {
            urn,
            kind,
            op,
            diffs,
            timestamp: Utc::now(),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>2} {} {}", self.op, self.kind, self.urn.name())?;
        if !self.diffs.is_empty() {
            write!(f, " [diff: {}]", self.diffs.join(", "))?;
        }
        Ok(())
    }
}

/// Counts per operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub same: usize,
    pub create: usize,
    pub update: usize,
    pub replace: usize,
    pub delete: usize,
}

/// Journal of executed (or previewed) steps
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    steps: Vec<Step>,
}

impl Plan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: Step) {
        self.steps.push(step);
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Steps other than `Same`
    pub fn changes(&self) -> impl Iterator<Item = &Step> {
        self.steps.iter().filter(|s| s.op.is_change())
    }

    pub fn has_changes(&self) -> bool {
        self.changes().next().is_some()
    }

    /// Last step recorded for `urn`
    pub fn step_for(&self, urn: &Urn) -> Option<&Step> {
        self.steps.iter().rev().find(|s| &s.urn == urn)
    }

    /// Steps for resources whose declared name is `name`
    pub fn steps_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Step> {
        self.steps.iter().filter(move |s| s.urn.name() == name)
    }

    pub fn summary(&self) -> PlanSummary {
        let mut summary = PlanSummary::default();
        for step in &self.steps {
            match step.op {
                StepOp::Same => summary.same += 1,
                StepOp::Create => summary.create += 1,
                StepOp::Update => summary.update += 1,
                StepOp::Replace { .. } => summary.replace += 1,
                StepOp::Delete => summary.delete += 1,
                // Counted with its Replace
                StepOp::DeleteReplaced => {}
            }
        }
        summary
    }
}

/// Keys whose values differ between `old` and `new`
///
/// Unknown keys always count as changed.
pub fn diff_properties(
    old: &PropertyMap,
    new: &PropertyMap,
    unknown: &BTreeSet<String>,
) -> Vec<String> {
    let keys: BTreeSet<&String> = old.keys().chain(new.keys()).chain(unknown.iter()).collect();
    keys.into_iter()
        .filter(|k| unknown.contains(*k) || old.get(*k) != new.get(*k))
        .cloned()
        .collect()
}

/// Step for a declaration given its prior state
pub fn plan_step(
    kind: ResourceKind,
    prior: Option<&ResourceState>,
    resolved: &ResolvedInputs,
    delete_before_replace: bool,
) -> (StepOp, Vec<String>) {
    let Some(prior) = prior else {
        return (StepOp::Create, Vec::new());
    };

    let diffs = diff_properties(&prior.inputs, &resolved.properties, &resolved.unknown);
    if diffs.is_empty() {
        return (StepOp::Same, diffs);
    }

    let replace_keys = kind.replace_on_change();
    if diffs.iter().any(|d| replace_keys.contains(&d.as_str())) {
        (
            StepOp::Replace {
                delete_before_replace,
            },
            diffs,
        )
    } else {
        (StepOp::Update, diffs)
    }
}

/// Order states so every resource comes before the resources it depends on
///
/// Cycles cannot arise from declarations; if one is present the remaining
/// states are appended in their original order.
pub fn deletion_order(mut states: Vec<ResourceState>) -> Vec<ResourceState> {
    let mut ordered = Vec::with_capacity(states.len());
    while !states.is_empty() {
        // A state is deletable once nothing left depends on it
        let position = states.iter().position(|candidate| {
            !states
                .iter()
                .any(|other| other.dependencies.contains(&candidate.urn))
        });
        match position {
            Some(i) => ordered.push(states.remove(i)),
            None => {
                ordered.append(&mut states);
            }
        }
    }
    ordered
}

/// Prior states that depend, directly or transitively, on `urn`
pub fn dependents_of<'a>(
    urn: &Urn,
    prior: impl IntoIterator<Item = &'a ResourceState> + Clone,
) -> Vec<Urn> {
    let mut found: BTreeSet<Urn> = BTreeSet::new();
    let mut frontier = vec![urn.clone()];
    while let Some(current) = frontier.pop() {
        for state in prior.clone() {
            if state.dependencies.contains(&current) && found.insert(state.urn.clone()) {
                frontier.push(state.urn.clone());
            }
        }
    }
    found.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn urn(name: &str) -> Urn {
        Urn::new("dev", "hub", "aws:ec2/subnet:Subnet", name)
    }

    fn state(name: &str, deps: &[&str], inputs: serde_json::Value) -> ResourceState {
        let inputs = match inputs {
            serde_json::Value::Object(m) => m,
            _ => PropertyMap::new(),
        };
        ResourceState {
            urn: urn(name),
            kind: ResourceKind::Subnet,
            id: format!("subnet-{name}"),
            inputs: inputs.clone(),
            outputs: inputs,
            parent: None,
            dependencies: deps.iter().map(|d| urn(d)).collect(),
            delete_before_replace: false,
            pending_delete: false,
        }
    }

    fn resolved(properties: serde_json::Value) -> ResolvedInputs {
        ResolvedInputs {
            properties: match properties {
                serde_json::Value::Object(m) => m,
                _ => PropertyMap::new(),
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_plan_create_same_update_replace() {
        let prior = state("a", &[], json!({"cidr_block": "10.0.0.0/24", "tags": {"Name": "a"}}));

        let (op, _) = plan_step(ResourceKind::Subnet, None, &resolved(json!({})), false);
        assert_eq!(op, StepOp::Create);

        let same = resolved(json!({"cidr_block": "10.0.0.0/24", "tags": {"Name": "a"}}));
        assert_eq!(plan_step(ResourceKind::Subnet, Some(&prior), &same, false).0, StepOp::Same);

        let retag = resolved(json!({"cidr_block": "10.0.0.0/24", "tags": {"Name": "b"}}));
        assert_eq!(
            plan_step(ResourceKind::Subnet, Some(&prior), &retag, false),
            (StepOp::Update, vec!["tags".to_string()])
        );

        let moved = resolved(json!({"cidr_block": "10.0.1.0/24", "tags": {"Name": "a"}}));
        assert_eq!(
            plan_step(ResourceKind::Subnet, Some(&prior), &moved, true).0,
            StepOp::Replace {
                delete_before_replace: true
            }
        );
    }

    #[test]
    fn test_unknown_input_is_a_diff() {
        let prior = state("a", &[], json!({"vpc_id": "vpc-1"}));
        let mut inputs = resolved(json!({}));
        inputs.unknown.insert("vpc_id".to_string());
        assert_eq!(
            plan_step(ResourceKind::Subnet, Some(&prior), &inputs, false).0,
            StepOp::Replace {
                delete_before_replace: false
            }
        );
    }

    #[test]
    fn test_deletion_order_dependents_first() {
        let states = vec![
            state("vpc", &[], json!({})),
            state("subnet", &["vpc"], json!({})),
            state("route", &["subnet", "vpc"], json!({})),
        ];
        let order: Vec<String> = deletion_order(states)
            .into_iter()
            .map(|s| s.urn.name().to_string())
            .collect();
        assert_eq!(order, vec!["route", "subnet", "vpc"]);
    }

    #[test]
    fn test_dependents_are_transitive() {
        let states = vec![
            state("attachment", &[], json!({})),
            state("association", &["attachment"], json!({})),
            state("route", &["association"], json!({})),
            state("other", &[], json!({})),
        ];
        let names: Vec<String> = dependents_of(&urn("attachment"), &states)
            .iter()
            .map(|u| u.name().to_string())
            .collect();
        assert_eq!(names, vec!["association", "route"]);
    }

    #[test]
    fn test_summary_counts() {
        let mut plan = Plan::new();
        plan.push(Step::new(urn("a"), ResourceKind::Subnet, StepOp::Create, vec![]));
        plan.push(Step::new(
            urn("b"),
            ResourceKind::Subnet,
            StepOp::Replace {
                delete_before_replace: true,
            },
            vec!["cidr_block".to_string()],
        ));
        plan.push(Step::new(urn("b"), ResourceKind::Subnet, StepOp::DeleteReplaced, vec![]));
        plan.push(Step::new(urn("c"), ResourceKind::Subnet, StepOp::Same, vec![]));

        let summary = plan.summary();
        assert_eq!((summary.create, summary.replace, summary.same), (1, 1, 1));
        assert_eq!(plan.changes().count(), 3);
        assert_eq!(plan.step_for(&urn("b")).map(|s| s.op), Some(StepOp::DeleteReplaced));
    }
}
