// Copyright (c) 2025 - Cowboy AI, Inc.
//! Hub VPC
//!
//! Centralized egress for every spoke. Traffic enters through the `tgw`
//! subnets, leaves through the hub's own NAT gateway in the first public
//! subnet, and returns toward the spokes through the transit gateway.
//!
//! ```text
//! spoke ─▶ TGW (spoke table: 0.0.0.0/0 → hub attachment)
//!        ─▶ tgw subnet (0.0.0.0/0 → NAT) ─▶ public subnet (0.0.0.0/0 → IGW)
//!        ◀─ public subnet (supernet → TGW)
//! ```

use tracing::debug;

use super::vpc::{NatStrategy, Vpc, VpcArgs};
use super::HUB_VPC_TYPE;
use crate::aws::ec2::{EipArgs, NatGatewayArgs, RouteArgs, RouteTarget};
use crate::aws::ec2transitgateway::{RouteArgs as TransitRouteArgs, RouteTableAssociationArgs, VpcAttachmentArgs};
use crate::aws::{name_tag, Toggle};
use crate::domain::{parse_cidr, SubnetSpec, SubnetType, Urn, DEFAULT_ROUTE};
use crate::engine::{ComponentHandle, Context, HasUrn, Resource, ResourceOptions};
use crate::errors::{InfrastructureError, InfrastructureResult};
use crate::output::Output;

/// Subnet roles of the hub
pub const PUBLIC_ROLE: &str = "public";
pub const INSPECTION_ROLE: &str = "inspection";
pub const TGW_ROLE: &str = "tgw";

/// Prefix length of every hub subnet
const HUB_SUBNET_MASK: u8 = 28;

#[derive(Debug, Clone)]
pub struct HubVpcArgs {
    /// Aggregate of every spoke block
    pub supernet_cidr_block: String,
    pub vpc_cidr_block: String,
    pub availability_zones: Vec<String>,
    pub tgw_id: Output<String>,
    pub spoke_tgw_route_table_id: Output<String>,
    pub hub_tgw_route_table_id: Output<String>,
}

/// A declared hub
#[derive(Debug, Clone)]
pub struct HubVpc {
    component: ComponentHandle,
    pub vpc: Vpc,
    pub eip: Resource,
    pub nat_gateway: Resource,
    pub tgw_attachment: Resource,
    pub default_route: Resource,
    pub tgw_association: Resource,
}

impl HubVpc {
    /// Subnet roles of every hub, in allocation order
    pub fn subnet_specs() -> Vec<SubnetSpec> {
        vec![
            SubnetSpec::new(SubnetType::Public, HUB_SUBNET_MASK).named(PUBLIC_ROLE),
            SubnetSpec::new(SubnetType::Isolated, HUB_SUBNET_MASK).named(INSPECTION_ROLE),
            SubnetSpec::new(SubnetType::Isolated, HUB_SUBNET_MASK).named(TGW_ROLE),
        ]
    }

    pub fn declare(
        ctx: &Context,
        name: &str,
        args: HubVpcArgs,
        parent: Option<&Urn>,
    ) -> InfrastructureResult<Self> {
        parse_cidr(&args.supernet_cidr_block)?;
        let component = ctx.component(HUB_VPC_TYPE, name, parent)?;
        let child = || ResourceOptions::new().parent(&component);

        let vpc = Vpc::declare(
            ctx,
            &format!("{name}-vpc"),
            VpcArgs {
                cidr_block: args.vpc_cidr_block.clone(),
                subnet_specs: Self::subnet_specs(),
                availability_zones: args.availability_zones.clone(),
                nat_strategy: NatStrategy::None,
                enable_dns_hostnames: true,
                enable_dns_support: true,
            },
            Some(component.urn()),
        )?;

        // The hub owns its NAT: one address, one gateway in the first public subnet
        let first_public = vpc
            .subnets_of_type(SubnetType::Public)
            .next()
            .ok_or_else(|| {
                InfrastructureError::Configuration(format!("{name}: hub VPC has no public subnet"))
            })?;
        let eip = ctx.register(
            &format!("{name}-eip"),
            EipArgs {
                tags: name_tag(&format!("{name}-eip")),
            },
            child(),
        );
        let mut nat_options = child();
        if let Some(igw) = &vpc.internet_gateway {
            nat_options = nat_options.depends_on(igw);
        }
        let nat_gateway = ctx.register(
            &format!("{name}-nat-gateway"),
            NatGatewayArgs {
                subnet_id: first_public.subnet.id(),
                allocation_id: eip.id(),
                tags: name_tag(&format!("{name}-nat-gateway")),
            },
            nat_options,
        );

        // Isolated subnets egress through the NAT
        let isolated: Vec<&str> = vec![INSPECTION_ROLE, TGW_ROLE];
        let isolated_tables: Vec<Output<String>> = vpc
            .subnets_with_roles(&isolated)
            .map(|s| s.route_table.id())
            .collect();
        let nat_id = nat_gateway.id();
        let hub = name.to_string();
        let parent_urn = component.urn().clone();
        ctx.when_resolved(vpc.subnets_ready(&isolated), move |ctx, subnet_ids| {
            for (subnet_id, table) in subnet_ids.iter().zip(isolated_tables) {
                debug!(subnet = %subnet_id, "hub egress route");
                ctx.register(
                    &format!("{hub}-nat-route-{subnet_id}"),
                    RouteArgs::default_route(table, RouteTarget::NatGateway(nat_id.clone())),
                    ResourceOptions::new().parent(&parent_urn),
                );
            }
            Ok(())
        });

        let tgw_attachment = ctx.register(
            &format!("{name}-tgw-vpc-attachment"),
            VpcAttachmentArgs {
                transit_gateway_id: args.tgw_id.clone(),
                vpc_id: vpc.vpc_id(),
                subnet_ids: vpc.subnets_ready(&[TGW_ROLE]),
                appliance_mode_support: Toggle::Enable,
                transit_gateway_default_route_table_association: false,
                transit_gateway_default_route_table_propagation: false,
                tags: name_tag(name),
            },
            child().depends_on(&vpc.vpc).delete_before_replace(),
        );

        let default_route = ctx.register(
            &format!("{name}-default-spoke-to-inspection"),
            TransitRouteArgs {
                destination_cidr_block: DEFAULT_ROUTE.to_string(),
                transit_gateway_attachment_id: Some(tgw_attachment.id()),
                transit_gateway_route_table_id: args.spoke_tgw_route_table_id.clone(),
            },
            child(),
        );

        let tgw_association = ctx.register(
            &format!("{name}-tgw-route-table-assoc"),
            RouteTableAssociationArgs {
                transit_gateway_attachment_id: tgw_attachment.id(),
                transit_gateway_route_table_id: args.hub_tgw_route_table_id.clone(),
            },
            child(),
        );

        // Return path toward the spokes
        let public_tables: Vec<Output<String>> = vpc
            .subnets_with_roles(&[PUBLIC_ROLE])
            .map(|s| s.route_table.id())
            .collect();
        let hub = name.to_string();
        let parent_urn = component.urn().clone();
        let attachment = tgw_attachment.clone();
        let supernet = args.supernet_cidr_block.clone();
        let tgw_id = args.tgw_id.clone();
        ctx.when_resolved(vpc.subnets_ready(&[PUBLIC_ROLE]), move |ctx, subnet_ids| {
            for (subnet_id, table) in subnet_ids.iter().zip(public_tables) {
                ctx.register(
                    &format!("{hub}-tgw-route-{subnet_id}"),
                    RouteArgs {
                        route_table_id: table,
                        destination_cidr_block: supernet.clone(),
                        target: RouteTarget::TransitGateway(tgw_id.clone()),
                    },
                    ResourceOptions::new()
                        .parent(&parent_urn)
                        .depends_on(&attachment),
                );
            }
            Ok(())
        });

        Ok(Self {
            component,
            vpc,
            eip,
            nat_gateway,
            tgw_attachment,
            default_route,
            tgw_association,
        })
    }

    pub fn name(&self) -> &str {
        self.component.name()
    }

    pub fn vpc_id(&self) -> Output<String> {
        self.vpc.vpc_id()
    }

    pub fn internet_gateway_id(&self) -> InfrastructureResult<Output<String>> {
        self.vpc.internet_gateway_id()
    }

    /// Public address of the hub's NAT
    pub fn eip_public_ip(&self) -> Output<String> {
        self.eip.output_string("public_ip")
    }
}

impl HasUrn for HubVpc {
    fn urn(&self) -> &Urn {
        self.component.urn()
    }
}
