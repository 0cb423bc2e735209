// Copyright (c) 2025 - Cowboy AI, Inc.
//! Hub-and-Spoke Program
//!
//! Composes the builders in dependency order:
//!
//! ```text
//! Backbone ─▶ HubVpc ─┬─▶ SpokeVerification (per spoke)
//!          ─▶ SpokeVpc┘
//! ```
//!
//! and exports the values operators need after an apply.

use tracing::info;

use crate::components::{
    Backbone, HubVpc, HubVpcArgs, InspectionFirewall, SpokeVerification, SpokeVerificationArgs,
    SpokeVpc, SpokeVpcArgs,
};
use crate::config::HubAndSpokeSettings;
use crate::engine::{Context, HasUrn};
use crate::errors::InfrastructureResult;

/// Project every URN is namespaced under
pub const PROJECT: &str = "hub-spoke";

/// Name of the hub component
pub const HUB_NAME: &str = "hub";

/// Everything the program declared
#[derive(Debug, Clone)]
pub struct HubAndSpoke {
    pub backbone: Backbone,
    pub hub: HubVpc,
    pub spokes: Vec<SpokeVpc>,
    pub verifications: Vec<SpokeVerification>,
    pub firewall: Option<InspectionFirewall>,
}

impl HubAndSpoke {
    pub fn spoke(&self, name: &str) -> Option<&SpokeVpc> {
        self.spokes.iter().find(|s| s.name() == name)
    }
}

/// Declare the whole topology against `ctx`
pub fn declare(ctx: &Context, settings: &HubAndSpokeSettings) -> InfrastructureResult<HubAndSpoke> {
    settings.validate()?;
    let zones = settings.zones();

    let backbone = Backbone::declare(ctx, ctx.project());

    let hub = HubVpc::declare(
        ctx,
        HUB_NAME,
        HubVpcArgs {
            supernet_cidr_block: settings.supernet.clone(),
            vpc_cidr_block: settings.hub_vpc_cidr.clone(),
            availability_zones: zones.clone(),
            tgw_id: backbone.transit_gateway_id(),
            spoke_tgw_route_table_id: backbone.spoke_route_table.id(),
            hub_tgw_route_table_id: backbone.hub_route_table.id(),
        },
        None,
    )?;

    let mut spokes = Vec::with_capacity(settings.spokes.len());
    for spoke in &settings.spokes {
        spokes.push(SpokeVpc::declare(
            ctx,
            &spoke.name,
            SpokeVpcArgs {
                vpc_cidr_block: spoke.cidr.clone(),
                availability_zones: zones.clone(),
                tgw_id: backbone.transit_gateway_id(),
                tgw_route_table_id: backbone.spoke_route_table.id(),
                vpc_endpoints: settings.vpc_endpoints,
                region: settings.region.clone(),
            },
            None,
        )?);
    }

    let mut verifications = Vec::new();
    if settings.verification {
        let hub_igw_id = hub.internet_gateway_id()?;
        for spoke in &spokes {
            verifications.push(SpokeVerification::declare(
                ctx,
                &format!("{}-verification", spoke.name()),
                SpokeVerificationArgs {
                    spoke_vpc_id: spoke.vpc_id(),
                    instance_subnet_id: spoke.first_workload_subnet_id(),
                    hub_igw_id: hub_igw_id.clone(),
                    egress: settings.verification_egress,
                    ssm_access: settings.ssm_access,
                },
                Some(spoke.urn()),
            )?);
        }
    }

    let firewall = if settings.inspection_firewall {
        Some(InspectionFirewall::declare(ctx, "inspection-firewall", None)?)
    } else {
        None
    };

    ctx.export("hub_eip", &hub.eip_public_ip());
    ctx.export("hub_igw_id", &hub.internet_gateway_id()?);
    ctx.export("hub_vpc_id", &hub.vpc_id());
    for spoke in &spokes {
        ctx.export(&format!("{}_vpc_id", spoke.name()), &spoke.vpc_id());
    }
    if let Some(firewall) = &firewall {
        ctx.export("firewall_policy_arn", &firewall.policy_arn());
    }

    info!(
        stack = ctx.stack(),
        spokes = spokes.len(),
        verifications = verifications.len(),
        firewall = firewall.is_some(),
        "hub-and-spoke declared"
    );
    Ok(HubAndSpoke {
        backbone,
        hub,
        spokes,
        verifications,
        firewall,
    })
}

/// [`declare`] in the shape [`Deployment::up`](crate::engine::Deployment::up) expects
pub async fn program(ctx: Context, settings: HubAndSpokeSettings) -> InfrastructureResult<()> {
    declare(&ctx, &settings).map(|_| ())
}
