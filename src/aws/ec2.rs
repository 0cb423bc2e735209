// Copyright (c) 2025 - Cowboy AI, Inc.
//! EC2 resources and lookups

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Tags;
use crate::domain::{ResourceKind, DEFAULT_ROUTE};
use crate::engine::{Context, Inputs, ResourceArgs};
use crate::errors::InfrastructureError;
use crate::output::Output;
use crate::provider::{Lookup, LookupFilter};

/// Virtual private cloud
#[derive(Debug, Clone)]
pub struct VpcArgs {
    pub cidr_block: String,
    pub enable_dns_hostnames: bool,
    pub enable_dns_support: bool,
    pub tags: Tags,
}

impl ResourceArgs for VpcArgs {
    const KIND: ResourceKind = ResourceKind::Vpc;

    fn into_inputs(self) -> Inputs {
        Inputs::new()
            .set("cidr_block", self.cidr_block)
            .set("enable_dns_hostnames", self.enable_dns_hostnames)
            .set("enable_dns_support", self.enable_dns_support)
            .set("tags", self.tags)
    }
}

#[derive(Debug, Clone)]
pub struct SubnetArgs {
    pub vpc_id: Output<String>,
    pub cidr_block: String,
    pub availability_zone: String,
    pub map_public_ip_on_launch: bool,
    pub tags: Tags,
}

impl ResourceArgs for SubnetArgs {
    const KIND: ResourceKind = ResourceKind::Subnet;

    fn into_inputs(self) -> Inputs {
        Inputs::new()
            .output("vpc_id", &self.vpc_id)
            .set("cidr_block", self.cidr_block)
            .set("availability_zone", self.availability_zone)
            .set("map_public_ip_on_launch", self.map_public_ip_on_launch)
            .set("tags", self.tags)
    }
}

#[derive(Debug, Clone)]
pub struct RouteTableArgs {
    pub vpc_id: Output<String>,
    pub tags: Tags,
}

impl ResourceArgs for RouteTableArgs {
    const KIND: ResourceKind = ResourceKind::RouteTable;

    fn into_inputs(self) -> Inputs {
        Inputs::new()
            .output("vpc_id", &self.vpc_id)
            .set("tags", self.tags)
    }
}

#[derive(Debug, Clone)]
pub struct RouteTableAssociationArgs {
    pub subnet_id: Output<String>,
    pub route_table_id: Output<String>,
}

impl ResourceArgs for RouteTableAssociationArgs {
    const KIND: ResourceKind = ResourceKind::RouteTableAssociation;

    fn into_inputs(self) -> Inputs {
        Inputs::new()
            .output("subnet_id", &self.subnet_id)
            .output("route_table_id", &self.route_table_id)
    }
}

/// Next hop of a VPC route
#[derive(Debug, Clone)]
pub enum RouteTarget {
    InternetGateway(Output<String>),
    NatGateway(Output<String>),
    TransitGateway(Output<String>),
}

impl RouteTarget {
    fn property(&self) -> &'static str {
        match self {
            RouteTarget::InternetGateway(_) => "gateway_id",
            RouteTarget::NatGateway(_) => "nat_gateway_id",
            RouteTarget::TransitGateway(_) => "transit_gateway_id",
        }
    }

    fn id(&self) -> &Output<String> {
        match self {
            RouteTarget::InternetGateway(id)
            | RouteTarget::NatGateway(id)
            | RouteTarget::TransitGateway(id) => id,
        }
    }
}

/// Route in a VPC route table
#[derive(Debug, Clone)]
pub struct RouteArgs {
    pub route_table_id: Output<String>,
    pub destination_cidr_block: String,
    pub target: RouteTarget,
}

impl RouteArgs {
    /// `0.0.0.0/0` toward `target`
    pub fn default_route(route_table_id: Output<String>, target: RouteTarget) -> Self {
        Self {
            route_table_id,
            destination_cidr_block: DEFAULT_ROUTE.to_string(),
            target,
        }
    }
}

impl ResourceArgs for RouteArgs {
    const KIND: ResourceKind = ResourceKind::Route;

    fn into_inputs(self) -> Inputs {
        Inputs::new()
            .output("route_table_id", &self.route_table_id)
            .set("destination_cidr_block", self.destination_cidr_block)
            .output(self.target.property(), self.target.id())
    }
}

#[derive(Debug, Clone)]
pub struct InternetGatewayArgs {
    pub vpc_id: Output<String>,
    pub tags: Tags,
}

impl ResourceArgs for InternetGatewayArgs {
    const KIND: ResourceKind = ResourceKind::InternetGateway;

    fn into_inputs(self) -> Inputs {
        Inputs::new()
            .output("vpc_id", &self.vpc_id)
            .set("tags", self.tags)
    }
}

/// Elastic IP in the VPC domain
#[derive(Debug, Clone, Default)]
pub struct EipArgs {
    pub tags: Tags,
}

impl ResourceArgs for EipArgs {
    const KIND: ResourceKind = ResourceKind::Eip;

    fn into_inputs(self) -> Inputs {
        Inputs::new().set("domain", "vpc").set("tags", self.tags)
    }
}

#[derive(Debug, Clone)]
pub struct NatGatewayArgs {
    pub subnet_id: Output<String>,
    pub allocation_id: Output<String>,
    pub tags: Tags,
}

impl ResourceArgs for NatGatewayArgs {
    const KIND: ResourceKind = ResourceKind::NatGateway;

    fn into_inputs(self) -> Inputs {
        Inputs::new()
            .output("subnet_id", &self.subnet_id)
            .output("allocation_id", &self.allocation_id)
            .set("tags", self.tags)
    }
}

/// One ingress or egress rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroupRule {
    pub protocol: String,
    pub from_port: u16,
    pub to_port: u16,
    pub cidr_blocks: Vec<String>,
    pub description: String,
}

impl SecurityGroupRule {
    /// Every protocol and port to anywhere
    pub fn allow_all() -> Self {
        Self {
            protocol: "-1".to_string(),
            from_port: 0,
            to_port: 0,
            cidr_blocks: vec![DEFAULT_ROUTE.to_string()],
            description: "Allow everything".to_string(),
        }
    }

    /// One TCP port to anywhere
    pub fn tcp(port: u16, description: &str) -> Self {
        Self {
            protocol: "tcp".to_string(),
            from_port: port,
            to_port: port,
            cidr_blocks: vec![DEFAULT_ROUTE.to_string()],
            description: description.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SecurityGroupArgs {
    pub vpc_id: Output<String>,
    pub description: String,
    pub ingress: Vec<SecurityGroupRule>,
    pub egress: Vec<SecurityGroupRule>,
    pub tags: Tags,
}

impl ResourceArgs for SecurityGroupArgs {
    const KIND: ResourceKind = ResourceKind::SecurityGroup;

    fn into_inputs(self) -> Inputs {
        Inputs::new()
            .output("vpc_id", &self.vpc_id)
            .set("description", self.description)
            .set("ingress", self.ingress)
            .set("egress", self.egress)
            .set("tags", self.tags)
    }
}

/// Interface endpoint for an AWS service
#[derive(Debug, Clone)]
pub struct VpcEndpointArgs {
    pub vpc_id: Output<String>,
    /// `com.amazonaws.{region}.{service}`
    pub service_name: String,
    pub private_dns_enabled: bool,
    pub security_group_ids: Output<Vec<String>>,
    pub subnet_ids: Output<Vec<String>>,
    pub tags: Tags,
}

impl VpcEndpointArgs {
    /// Service name of `service` in `region`
    pub fn service_name(region: &str, service: &str) -> String {
        format!("com.amazonaws.{region}.{service}")
    }
}

impl ResourceArgs for VpcEndpointArgs {
    const KIND: ResourceKind = ResourceKind::VpcEndpoint;

    fn into_inputs(self) -> Inputs {
        Inputs::new()
            .output("vpc_id", &self.vpc_id)
            .set("service_name", self.service_name)
            .set("vpc_endpoint_type", "Interface")
            .set("private_dns_enabled", self.private_dns_enabled)
            .output("security_group_ids", &self.security_group_ids)
            .output("subnet_ids", &self.subnet_ids)
            .set("tags", self.tags)
    }
}

#[derive(Debug, Clone)]
pub struct InstanceArgs {
    pub ami: Output<String>,
    pub instance_type: String,
    pub subnet_id: Output<String>,
    pub vpc_security_group_ids: Output<Vec<String>>,
    /// Instance profile name
    pub iam_instance_profile: Option<Output<String>>,
    pub tags: Tags,
}

impl ResourceArgs for InstanceArgs {
    const KIND: ResourceKind = ResourceKind::Instance;

    fn into_inputs(self) -> Inputs {
        Inputs::new()
            .output("ami", &self.ami)
            .set("instance_type", self.instance_type)
            .output("subnet_id", &self.subnet_id)
            .output("vpc_security_group_ids", &self.vpc_security_group_ids)
            .optional_output("iam_instance_profile", &self.iam_instance_profile)
            .set("tags", self.tags)
    }
}

/// Source/destination pair for reachability analysis
#[derive(Debug, Clone)]
pub struct NetworkInsightsPathArgs {
    pub source: Output<String>,
    pub destination: Output<String>,
    pub protocol: String,
    pub destination_port: Option<u16>,
    pub tags: Tags,
}

impl ResourceArgs for NetworkInsightsPathArgs {
    const KIND: ResourceKind = ResourceKind::NetworkInsightsPath;

    fn into_inputs(self) -> Inputs {
        let inputs = Inputs::new()
            .output("source", &self.source)
            .output("destination", &self.destination)
            .set("protocol", self.protocol)
            .set("tags", self.tags);
        match self.destination_port {
            Some(port) => inputs.set("destination_port", port),
            None => inputs,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NetworkInsightsAnalysisArgs {
    pub network_insights_path_id: Output<String>,
    pub wait_for_completion: bool,
}

impl ResourceArgs for NetworkInsightsAnalysisArgs {
    const KIND: ResourceKind = ResourceKind::NetworkInsightsAnalysis;

    fn into_inputs(self) -> Inputs {
        Inputs::new()
            .output("network_insights_path_id", &self.network_insights_path_id)
            .set("wait_for_completion", self.wait_for_completion)
    }
}

/// Image lookup query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmiQuery {
    pub most_recent: bool,
    pub owners: Vec<String>,
    pub filters: Vec<LookupFilter>,
}

impl AmiQuery {
    /// Latest Amazon Linux 2 x86_64 image
    pub fn amazon_linux_2() -> Self {
        Self {
            most_recent: true,
            owners: vec!["amazon".to_string()],
            filters: vec![
                LookupFilter::new("name", &["amzn2-ami-hvm-*-x86_64-gp2"]),
                LookupFilter::new("owner-alias", &["amazon"]),
            ],
        }
    }
}

/// Look an image up and return its id
pub fn get_ami(ctx: &Context, query: AmiQuery) -> Output<String> {
    ctx.invoke(Lookup::Ami {
        most_recent: query.most_recent,
        owners: query.owners,
        filters: query.filters,
    })
    .try_map(|image| string_field(&image, "id", "aws:ec2/getAmi:getAmi"))
}

/// Route table associated with `subnet_id`
pub fn get_route_table(ctx: &Context, subnet_id: &str) -> Output<String> {
    ctx.invoke(Lookup::RouteTable {
        subnet_id: subnet_id.to_string(),
    })
    .try_map(|table| string_field(&table, "id", "aws:ec2/getRouteTable:getRouteTable"))
}

fn string_field(value: &Value, key: &str, function: &str) -> Result<String, InfrastructureError> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| InfrastructureError::MissingAttribute {
            urn: function.to_string(),
            attribute: key.to_string(),
        })
}
