// Copyright (c) 2025 - Cowboy AI, Inc.
//! VPC Builder
//!
//! Declares a VPC, one subnet per (role, availability zone), a route table
//! and association per subnet, and the default routes implied by each subnet
//! type:
//!
//! | type       | default route                              |
//! |------------|--------------------------------------------|
//! | `Public`   | internet gateway (declared when needed)    |
//! | `Private`  | NAT gateway of the same zone, per strategy |
//! | `Isolated` | none                                       |
//!
//! Subnets are named `{vpc}-{role}-{n}`, `n` counting zones from 1.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::VPC_TYPE;
use crate::aws::ec2::{
    EipArgs, InternetGatewayArgs, NatGatewayArgs, RouteArgs, RouteTableArgs,
    RouteTableAssociationArgs, RouteTarget, SubnetArgs, VpcArgs as Ec2VpcArgs,
};
use crate::aws::name_tag;
use crate::domain::{parse_cidr, partition_vpc, SubnetAllocation, SubnetSpec, SubnetType, Urn};
use crate::engine::{ComponentHandle, Context, HasUrn, Resource, ResourceOptions};
use crate::errors::{InfrastructureError, InfrastructureResult};
use crate::output::{all, Output};

/// Zone suffixes available in every supported region
const ZONE_SUFFIXES: [char; 6] = ['a', 'b', 'c', 'd', 'e', 'f'];

/// The first `count` availability zones of `region`
pub fn availability_zones(region: &str, count: usize) -> Vec<String> {
    ZONE_SUFFIXES
        .iter()
        .take(count)
        .map(|suffix| format!("{region}{suffix}"))
        .collect()
}

/// Where NAT gateways for `Private` subnets are placed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NatStrategy {
    /// No NAT gateways; `Private` subnets get no default route
    #[default]
    None,
    /// One NAT gateway in the first public subnet
    Single,
    /// One NAT gateway per zone
    OnePerAz,
}

#[derive(Debug, Clone)]
pub struct VpcArgs {
    pub cidr_block: String,
    pub subnet_specs: Vec<SubnetSpec>,
    pub availability_zones: Vec<String>,
    pub nat_strategy: NatStrategy,
    pub enable_dns_hostnames: bool,
    pub enable_dns_support: bool,
}

/// One declared subnet with its routing
#[derive(Debug, Clone)]
pub struct VpcSubnet {
    pub allocation: SubnetAllocation,
    pub subnet: Resource,
    pub route_table: Resource,
    pub association: Resource,
}

impl VpcSubnet {
    pub fn role(&self) -> &str {
        &self.allocation.role
    }
}

/// A declared VPC
#[derive(Debug, Clone)]
pub struct Vpc {
    component: ComponentHandle,
    pub vpc: Resource,
    pub internet_gateway: Option<Resource>,
    pub nat_gateways: Vec<Resource>,
    pub subnets: Vec<VpcSubnet>,
}

impl Vpc {
    /// Declare the VPC `name` under `parent`
    ///
    /// Fails before declaring anything if the subnet specs do not fit the
    /// VPC block.
    pub fn declare(
        ctx: &Context,
        name: &str,
        args: VpcArgs,
        parent: Option<&Urn>,
    ) -> InfrastructureResult<Self> {
        let block = parse_cidr(&args.cidr_block)?;
        let allocations = partition_vpc(&block, &args.subnet_specs, &args.availability_zones)?;
        let has_public = allocations.iter().any(|a| a.subnet_type == SubnetType::Public);
        if args.nat_strategy != NatStrategy::None && !has_public {
            return Err(InfrastructureError::Configuration(format!(
                "{name}: NAT strategy {:?} needs a public subnet",
                args.nat_strategy
            )));
        }

        let component = ctx.component(VPC_TYPE, name, parent)?;
        let child = || ResourceOptions::new().parent(&component);

        let vpc = ctx.register(
            name,
            Ec2VpcArgs {
                cidr_block: args.cidr_block.clone(),
                enable_dns_hostnames: args.enable_dns_hostnames,
                enable_dns_support: args.enable_dns_support,
                tags: name_tag(name),
            },
            child(),
        );

        let internet_gateway = has_public.then(|| {
            ctx.register(
                name,
                InternetGatewayArgs {
                    vpc_id: vpc.id(),
                    tags: name_tag(name),
                },
                child(),
            )
        });

        let mut subnets = Vec::with_capacity(allocations.len());
        for allocation in allocations {
            let subnet_name = format!("{name}-{}-{}", allocation.role, allocation.index);
            let subnet = ctx.register(
                &subnet_name,
                SubnetArgs {
                    vpc_id: vpc.id(),
                    cidr_block: allocation.cidr.to_string(),
                    availability_zone: allocation.availability_zone.clone(),
                    map_public_ip_on_launch: allocation.subnet_type == SubnetType::Public,
                    tags: name_tag(&subnet_name),
                },
                child(),
            );
            let route_table = ctx.register(
                &subnet_name,
                RouteTableArgs {
                    vpc_id: vpc.id(),
                    tags: name_tag(&subnet_name),
                },
                ResourceOptions::new().parent(&subnet),
            );
            let association = ctx.register(
                &subnet_name,
                RouteTableAssociationArgs {
                    subnet_id: subnet.id(),
                    route_table_id: route_table.id(),
                },
                ResourceOptions::new().parent(&route_table),
            );
            debug!(subnet = %subnet_name, cidr = %allocation.cidr, "subnet declared");
            subnets.push(VpcSubnet {
                allocation,
                subnet,
                route_table,
                association,
            });
        }

        if let Some(igw) = &internet_gateway {
            for public in subnets
                .iter()
                .filter(|s| s.allocation.subnet_type == SubnetType::Public)
            {
                ctx.register(
                    &format!("{name}-{}-{}-igw", public.role(), public.allocation.index),
                    RouteArgs::default_route(
                        public.route_table.id(),
                        RouteTarget::InternetGateway(igw.id()),
                    ),
                    ResourceOptions::new().parent(&public.route_table),
                );
            }
        }

        let nat_gateways = declare_nat_gateways(ctx, name, &args, &subnets, &component);
        if !nat_gateways.is_empty() {
            for private in subnets
                .iter()
                .filter(|s| s.allocation.subnet_type == SubnetType::Private)
            {
                let nat = match args.nat_strategy {
                    NatStrategy::OnePerAz => nat_gateways
                        .get(private.allocation.index - 1)
                        .or_else(|| nat_gateways.first()),
                    _ => nat_gateways.first(),
                };
                if let Some(nat) = nat {
                    ctx.register(
                        &format!("{name}-{}-{}-nat", private.role(), private.allocation.index),
                        RouteArgs::default_route(
                            private.route_table.id(),
                            RouteTarget::NatGateway(nat.id()),
                        ),
                        ResourceOptions::new().parent(&private.route_table),
                    );
                }
            }
        }

        Ok(Self {
            component,
            vpc,
            internet_gateway,
            nat_gateways,
            subnets,
        })
    }

    pub fn name(&self) -> &str {
        self.component.name()
    }

    pub fn vpc_id(&self) -> Output<String> {
        self.vpc.id()
    }

    /// Internet gateway id, if the VPC has public subnets
    pub fn internet_gateway_id(&self) -> InfrastructureResult<Output<String>> {
        self.internet_gateway
            .as_ref()
            .map(Resource::id)
            .ok_or_else(|| {
                InfrastructureError::Configuration(format!(
                    "{} has no internet gateway",
                    self.name()
                ))
            })
    }

    /// Subnets whose role is one of `roles`, in declaration order
    pub fn subnets_with_roles<'a>(
        &'a self,
        roles: &'a [&str],
    ) -> impl Iterator<Item = &'a VpcSubnet> + 'a {
        self.subnets
            .iter()
            .filter(move |s| roles.contains(&s.role()))
    }

    /// Subnets of one exposure class
    pub fn subnets_of_type(&self, subnet_type: SubnetType) -> impl Iterator<Item = &VpcSubnet> {
        self.subnets
            .iter()
            .filter(move |s| s.allocation.subnet_type == subnet_type)
    }

    /// Ids of the subnets with `role`, as soon as the subnets exist
    pub fn subnet_ids(&self, role: &str) -> Output<Vec<String>> {
        all(self
            .subnets
            .iter()
            .filter(|s| s.role() == role)
            .map(|s| s.subnet.id())
            .collect())
    }

    /// Ids of the subnets with one of `roles`, once each subnet, its route
    /// table and its association have completed
    ///
    /// Resolves with a dependency-ordering error if no subnet has any of the
    /// roles.
    pub fn subnets_ready(&self, roles: &[&str]) -> Output<Vec<String>> {
        let selected: Vec<&VpcSubnet> = self.subnets_with_roles(roles).collect();
        let ids = all(selected.iter().map(|s| s.subnet.id()).collect());
        let settled = all(selected.iter().map(|s| s.association.ready()).collect());
        let vpc = self.name().to_string();
        let wanted = roles.join(", ");

        ids.zip(&settled).try_map(move |(ids, _)| {
            if ids.is_empty() {
                return Err(InfrastructureError::DependencyOrdering(format!(
                    "{vpc}: no subnets with role {wanted} after the subnets completed"
                )));
            }
            Ok(ids)
        })
    }
}

impl HasUrn for Vpc {
    fn urn(&self) -> &Urn {
        self.component.urn()
    }
}

fn declare_nat_gateways(
    ctx: &Context,
    name: &str,
    args: &VpcArgs,
    subnets: &[VpcSubnet],
    component: &ComponentHandle,
) -> Vec<Resource> {
    let public: Vec<&VpcSubnet> = subnets
        .iter()
        .filter(|s| s.allocation.subnet_type == SubnetType::Public)
        .collect();
    let hosts: Vec<&VpcSubnet> = match args.nat_strategy {
        NatStrategy::None => Vec::new(),
        NatStrategy::Single => public.into_iter().take(1).collect(),
        NatStrategy::OnePerAz => {
            // First public subnet of each zone
            let mut seen = Vec::new();
            public
                .into_iter()
                .filter(|s| {
                    let fresh = !seen.contains(&s.allocation.availability_zone);
                    seen.push(s.allocation.availability_zone.clone());
                    fresh
                })
                .collect()
        }
    };

    hosts
        .into_iter()
        .enumerate()
        .map(|(i, host)| {
            let nat_name = format!("{name}-{}", i + 1);
            let eip = ctx.register(
                &nat_name,
                EipArgs {
                    tags: name_tag(&nat_name),
                },
                ResourceOptions::new().parent(component),
            );
            ctx.register(
                &nat_name,
                NatGatewayArgs {
                    subnet_id: host.subnet.id(),
                    allocation_id: eip.id(),
                    tags: name_tag(&nat_name),
                },
                ResourceOptions::new().parent(&host.subnet),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_availability_zones() {
        assert_eq!(
            availability_zones("us-east-1", 3),
            vec!["us-east-1a", "us-east-1b", "us-east-1c"]
        );
        assert_eq!(availability_zones("eu-west-1", 9).len(), 6);
    }

    #[test]
    fn test_nat_strategy_default_is_none() {
        assert_eq!(NatStrategy::default(), NatStrategy::None);
        assert_eq!(
            serde_json::to_string(&NatStrategy::OnePerAz).unwrap(),
            "\"one_per_az\""
        );
    }
}
