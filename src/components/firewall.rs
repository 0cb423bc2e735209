// Copyright (c) 2025 - Cowboy AI, Inc.
//! Inspection firewall policy
//!
//! A strict-order policy that forwards all stateless traffic to the stateful
//! engine, drops by default and passes only HTTPS toward `.amazon.com`.

use crate::aws::networkfirewall::{
    FirewallPolicyArgs, RuleGroupArgs, RuleGroupReference, RuleGroupType, RuleOrder,
};
use crate::domain::{validate_rules, Urn};
use crate::engine::{ComponentHandle, Context, HasUrn, Resource, ResourceOptions};
use crate::errors::{InfrastructureError, InfrastructureResult};
use crate::output::Output;

use super::INSPECTION_FIREWALL_TYPE;

/// Rules of the `allow-amazon` group
pub const ALLOW_AMAZON_RULES: &str = concat!(
    "pass tcp any any <> $EXTERNAL_NET 443 (msg:\"Allowing TCP in port 443\"; flow:not_established; sid:892123; rev:1;)\n",
    "pass tls any any -> $EXTERNAL_NET 443 (tls.sni; dotprefix; content:\".amazon.com\"; endswith; msg:\"Allowing .amazon.com HTTPS requests\"; sid:892125; rev:1;)",
);

const RULE_GROUP_CAPACITY: u32 = 100;
const RULE_GROUP_PRIORITY: u32 = 10;

/// A declared firewall policy and its rule group
#[derive(Debug, Clone)]
pub struct InspectionFirewall {
    component: ComponentHandle,
    pub rule_group: Resource,
    pub policy: Resource,
}

impl InspectionFirewall {
    pub fn declare(ctx: &Context, name: &str, parent: Option<&Urn>) -> InfrastructureResult<Self> {
        validate_rules(ALLOW_AMAZON_RULES)
            .map_err(|e| InfrastructureError::Configuration(format!("allow-amazon: {e}")))?;
        let component = ctx.component(INSPECTION_FIREWALL_TYPE, name, parent)?;

        let rule_group = ctx.register(
            "allow-amazon",
            RuleGroupArgs {
                name: "allow-amazon".to_string(),
                capacity: RULE_GROUP_CAPACITY,
                rule_group_type: RuleGroupType::Stateful,
                rules_string: ALLOW_AMAZON_RULES.to_string(),
                rule_order: RuleOrder::StrictOrder,
            },
            ResourceOptions::new().parent(&component),
        );

        let forward = vec!["aws:forward_to_sfe".to_string()];
        let policy = ctx.register(
            "firewall-policy",
            FirewallPolicyArgs {
                name: "firewall-policy".to_string(),
                stateless_default_actions: forward.clone(),
                stateless_fragment_default_actions: forward,
                stateful_default_actions: vec![
                    "aws:drop_strict".to_string(),
                    "aws:alert_strict".to_string(),
                ],
                rule_order: RuleOrder::StrictOrder,
                stateful_rule_group_references: vec![RuleGroupReference {
                    priority: RULE_GROUP_PRIORITY,
                    resource_arn: rule_group.output_string("arn"),
                }],
            },
            ResourceOptions::new().parent(&component),
        );

        Ok(Self {
            component,
            rule_group,
            policy,
        })
    }

    pub fn policy_arn(&self) -> Output<String> {
        self.policy.output_string("arn")
    }
}

impl HasUrn for InspectionFirewall {
    fn urn(&self) -> &Urn {
        self.component.urn()
    }
}
