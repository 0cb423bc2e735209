// Copyright (c) 2025 - Cowboy AI, Inc.
//! Spoke VPC
//!
//! An isolated-only VPC whose workload subnets send everything outside the
//! VPC to the transit gateway. The attachment is associated with and
//! propagated into the spoke route table, so the hub's default route there
//! carries spoke egress and the spoke's own block becomes reachable.

use tracing::debug;

use super::vpc::{NatStrategy, Vpc, VpcArgs};
use super::SPOKE_VPC_TYPE;
use crate::aws::ec2::{get_route_table, RouteArgs, RouteTarget, SecurityGroupArgs, SecurityGroupRule, VpcEndpointArgs};
use crate::aws::ec2transitgateway::{
    RouteTableAssociationArgs, RouteTablePropagationArgs, VpcAttachmentArgs,
};
use crate::aws::{name_tag, Tags, Toggle};
use crate::domain::{SubnetSpec, SubnetType, Urn};
use crate::engine::{ComponentHandle, Context, HasUrn, Resource, ResourceOptions};
use crate::errors::{InfrastructureError, InfrastructureResult};
use crate::output::{all, Output};

/// Subnet roles of a spoke
pub const WORKLOAD_ROLE: &str = "private";
pub const TGW_ROLE: &str = "tgw";

/// Services reached through interface endpoints
pub const ENDPOINT_SERVICES: [&str; 3] = ["ec2messages", "ssmmessages", "ssm"];

const SPOKE_SUBNET_MASK: u8 = 28;

#[derive(Debug, Clone)]
pub struct SpokeVpcArgs {
    pub vpc_cidr_block: String,
    pub availability_zones: Vec<String>,
    pub tgw_id: Output<String>,
    pub tgw_route_table_id: Output<String>,
    /// Declare Systems Manager interface endpoints in the workload subnets
    pub vpc_endpoints: bool,
    /// Region the endpoint service names refer to
    pub region: String,
}

/// A declared spoke
#[derive(Debug, Clone)]
pub struct SpokeVpc {
    component: ComponentHandle,
    pub vpc: Vpc,
    pub tgw_attachment: Resource,
    pub tgw_association: Resource,
    pub tgw_propagation: Resource,
    pub endpoints: Vec<Resource>,
}

impl SpokeVpc {
    /// Subnet roles of every spoke, in allocation order
    pub fn subnet_specs() -> Vec<SubnetSpec> {
        vec![
            SubnetSpec::new(SubnetType::Isolated, SPOKE_SUBNET_MASK).named(WORKLOAD_ROLE),
            SubnetSpec::new(SubnetType::Isolated, SPOKE_SUBNET_MASK).named(TGW_ROLE),
        ]
    }

    pub fn declare(
        ctx: &Context,
        name: &str,
        args: SpokeVpcArgs,
        parent: Option<&Urn>,
    ) -> InfrastructureResult<Self> {
        let component = ctx.component(SPOKE_VPC_TYPE, name, parent)?;
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

        let tgw_attachment = ctx.register(
            &format!("{name}-tgw-vpc-attachment"),
            VpcAttachmentArgs {
                transit_gateway_id: args.tgw_id.clone(),
                vpc_id: vpc.vpc_id(),
                subnet_ids: vpc.subnets_ready(&[TGW_ROLE]),
                appliance_mode_support: Toggle::Disable,
                transit_gateway_default_route_table_association: false,
                transit_gateway_default_route_table_propagation: false,
                tags: name_tag(name),
            },
            child().depends_on(&vpc.vpc).delete_before_replace(),
        );

        let tgw_association = ctx.register(
            &format!("{name}-tgw-route-table-assoc"),
            RouteTableAssociationArgs {
                transit_gateway_attachment_id: tgw_attachment.id(),
                transit_gateway_route_table_id: args.tgw_route_table_id.clone(),
            },
            child(),
        );
        let tgw_propagation = ctx.register(
            &format!("{name}-tgw-route-table-propagation"),
            RouteTablePropagationArgs {
                transit_gateway_attachment_id: tgw_attachment.id(),
                transit_gateway_route_table_id: args.tgw_route_table_id.clone(),
            },
            child(),
        );

        let endpoints = if args.vpc_endpoints {
            declare_endpoints(ctx, name, &vpc, &args.region, &component)
        } else {
            Vec::new()
        };

        // Everything outside the VPC goes to the transit gateway. The route
        // table is looked up per subnet once the subnet's association exists.
        let associations: Vec<(Urn, Urn)> = vpc
            .subnets_with_roles(&[WORKLOAD_ROLE])
            .map(|s| (s.route_table.urn().clone(), s.association.urn().clone()))
            .collect();
        let spoke = name.to_string();
        let parent_urn = component.urn().clone();
        let attachment = tgw_attachment.clone();
        let tgw_id = args.tgw_id.clone();
        ctx.when_resolved(vpc.subnets_ready(&[WORKLOAD_ROLE]), move |ctx, subnet_ids| {
            for (subnet_id, (table_urn, association_urn)) in subnet_ids.iter().zip(associations) {
                debug!(subnet = %subnet_id, "spoke default route");
                let route_table_id = get_route_table(ctx, subnet_id)
                    .with_dependency(table_urn)
                    .with_dependency(association_urn);
                ctx.register(
                    &format!("{spoke}-tgw-route-{subnet_id}"),
                    RouteArgs::default_route(
                        route_table_id,
                        RouteTarget::TransitGateway(tgw_id.clone()),
                    ),
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
            tgw_attachment,
            tgw_association,
            tgw_propagation,
            endpoints,
        })
    }

    pub fn name(&self) -> &str {
        self.component.name()
    }

    pub fn vpc_id(&self) -> Output<String> {
        self.vpc.vpc_id()
    }

    /// Ids of the workload subnets, once their routing exists
    pub fn workload_subnet_ids(&self) -> Output<Vec<String>> {
        self.vpc.subnets_ready(&[WORKLOAD_ROLE])
    }

    /// First workload subnet, where probes are placed
    pub fn first_workload_subnet_id(&self) -> Output<String> {
        let spoke = self.name().to_string();
        self.workload_subnet_ids().try_map(move |ids| {
            ids.into_iter().next().ok_or_else(|| {
                InfrastructureError::DependencyOrdering(format!("{spoke}: no workload subnet"))
            })
        })
    }
}

impl HasUrn for SpokeVpc {
    fn urn(&self) -> &Urn {
        self.component.urn()
    }
}

fn declare_endpoints(
    ctx: &Context,
    name: &str,
    vpc: &Vpc,
    region: &str,
    component: &ComponentHandle,
) -> Vec<Resource> {
    let endpoint_sg = ctx.register(
        &format!("{name}-vpc-endpoint-sg"),
        SecurityGroupArgs {
            vpc_id: vpc.vpc_id(),
            description: "Allow all traffic to interface endpoints".to_string(),
            ingress: vec![SecurityGroupRule::allow_all()],
            egress: vec![SecurityGroupRule::allow_all()],
            tags: Tags::new(),
        },
        ResourceOptions::new().parent(component),
    );
    let workload_subnets = vpc.subnets_ready(&[WORKLOAD_ROLE]);

    ENDPOINT_SERVICES
        .iter()
        .map(|service| {
            ctx.register(
                &format!("{name}-endpoint-{service}"),
                VpcEndpointArgs {
                    vpc_id: vpc.vpc_id(),
                    service_name: VpcEndpointArgs::service_name(region, service),
                    private_dns_enabled: true,
                    security_group_ids: all(vec![endpoint_sg.id()]),
                    subnet_ids: workload_subnets.clone(),
                    tags: name_tag(&format!("{name}-{service}")),
                },
                ResourceOptions::new().parent(component),
            )
        })
        .collect()
}
