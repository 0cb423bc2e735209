// Copyright (c) 2025 - Cowboy AI, Inc.
//! Network firewall resources

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::domain::ResourceKind;
use crate::engine::{Inputs, ResourceArgs};
use crate::output::{all, Output};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleGroupType {
    Stateful,
    Stateless,
}

/// Evaluation order of stateful rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleOrder {
    #[default]
    StrictOrder,
    DefaultActionOrder,
}

/// Rule group defined by Suricata-compatible rule lines
#[derive(Debug, Clone)]
pub struct RuleGroupArgs {
    pub name: String,
    pub capacity: u32,
    pub rule_group_type: RuleGroupType,
    pub rules_string: String,
    pub rule_order: RuleOrder,
}

impl ResourceArgs for RuleGroupArgs {
    const KIND: ResourceKind = ResourceKind::FirewallRuleGroup;

    fn into_inputs(self) -> Inputs {
        Inputs::new()
            .set("name", self.name)
            .set("capacity", self.capacity)
            .set("type", self.rule_group_type)
            .set("rules_string", self.rules_string)
            .set("rule_order", self.rule_order)
    }
}

/// Stateful rule group referenced by a policy
#[derive(Debug, Clone)]
pub struct RuleGroupReference {
    pub priority: u32,
    pub resource_arn: Output<String>,
}

impl RuleGroupReference {
    fn to_json(&self) -> Output<serde_json::Value> {
        let priority = self.priority;
        self.resource_arn
            .map(move |arn| json!({ "priority": priority, "resource_arn": arn }))
    }
}

#[derive(Debug, Clone)]
pub struct FirewallPolicyArgs {
    pub name: String,
    pub stateless_default_actions: Vec<String>,
    pub stateless_fragment_default_actions: Vec<String>,
    pub stateful_default_actions: Vec<String>,
    pub rule_order: RuleOrder,
    pub stateful_rule_group_references: Vec<RuleGroupReference>,
}

impl ResourceArgs for FirewallPolicyArgs {
    const KIND: ResourceKind = ResourceKind::FirewallPolicy;

    fn into_inputs(self) -> Inputs {
        let references = all(
            self.stateful_rule_group_references
                .iter()
                .map(RuleGroupReference::to_json)
                .collect(),
        );
        Inputs::new()
            .set("name", self.name)
            .set("stateless_default_actions", self.stateless_default_actions)
            .set(
                "stateless_fragment_default_actions",
                self.stateless_fragment_default_actions,
            )
            .set("stateful_default_actions", self.stateful_default_actions)
            .set("rule_order", self.rule_order)
            .output("stateful_rule_group_references", &references)
    }
}
