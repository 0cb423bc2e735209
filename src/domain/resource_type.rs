// Copyright (c) 2025 - Cowboy AI, Inc.
//! Declared Resource Kind Taxonomy
//!
//! The set of cloud resource kinds the hub-and-spoke topology declares. The
//! type tokens are the wire contract with the provider and stay stable across
//! topology variants.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Resource kind taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    // Transit
    /// Central routing hub
    TransitGateway,
    /// Transit-side routing table
    TransitGatewayRouteTable,
    /// Static route in a transit routing table
    TransitGatewayRoute,
    /// Attachment → routing table association
    TransitGatewayRouteTableAssociation,
    /// Attachment → routing table propagation
    TransitGatewayRouteTablePropagation,
    /// Binding of a VPC to the transit gateway
    TransitGatewayVpcAttachment,

    // Network
    /// Virtual private cloud
    Vpc,
    /// VPC subnet
    Subnet,
    /// VPC route table
    RouteTable,
    /// Subnet → route table association
    RouteTableAssociation,
    /// Route in a VPC route table
    Route,
    /// Internet gateway
    InternetGateway,
    /// NAT gateway
    NatGateway,
    /// Elastic IP address
    Eip,
    /// Interface endpoint
    VpcEndpoint,

    // Security
    /// Security group
    SecurityGroup,
    /// Network firewall rule group
    FirewallRuleGroup,
    /// Network firewall policy
    FirewallPolicy,

    // Identity
    /// IAM role
    IamRole,
    /// Managed policy attachment
    IamRolePolicyAttachment,
    /// EC2 instance profile
    IamInstanceProfile,

    // Compute
    /// EC2 instance
    Instance,

    // Diagnostics
    /// Reachability path definition
    NetworkInsightsPath,
    /// Reachability analysis run
    NetworkInsightsAnalysis,
}

/// Coarse grouping of resource kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceCategory {
    Transit,
    Network,
    Security,
    Identity,
    Compute,
    Diagnostics,
}

impl ResourceKind {
    /// Every declared kind
    pub const ALL: [ResourceKind; 24] = [
        ResourceKind::TransitGateway,
        ResourceKind::TransitGatewayRouteTable,
        ResourceKind::TransitGatewayRoute,
        ResourceKind::TransitGatewayRouteTableAssociation,
        ResourceKind::TransitGatewayRouteTablePropagation,
        ResourceKind::TransitGatewayVpcAttachment,
        ResourceKind::Vpc,
        ResourceKind::Subnet,
        ResourceKind::RouteTable,
        ResourceKind::RouteTableAssociation,
        ResourceKind::Route,
        ResourceKind::InternetGateway,
        ResourceKind::NatGateway,
        ResourceKind::Eip,
        ResourceKind::VpcEndpoint,
        ResourceKind::SecurityGroup,
        ResourceKind::FirewallRuleGroup,
        ResourceKind::FirewallPolicy,
        ResourceKind::IamRole,
        ResourceKind::IamRolePolicyAttachment,
        ResourceKind::IamInstanceProfile,
        ResourceKind::Instance,
        ResourceKind::NetworkInsightsPath,
        ResourceKind::NetworkInsightsAnalysis,
    ];

    /// Provider type token
    pub fn type_token(&self) -> &'static str {
        use ResourceKind::*;
        match self {
            TransitGateway => "aws:ec2transitgateway/transitGateway:TransitGateway",
            TransitGatewayRouteTable => "aws:ec2transitgateway/routeTable:RouteTable",
            TransitGatewayRoute => "aws:ec2transitgateway/route:Route",
            TransitGatewayRouteTableAssociation => {
                "aws:ec2transitgateway/routeTableAssociation:RouteTableAssociation"
            }
            TransitGatewayRouteTablePropagation => {
                "aws:ec2transitgateway/routeTablePropagation:RouteTablePropagation"
            }
            TransitGatewayVpcAttachment => "aws:ec2transitgateway/vpcAttachment:VpcAttachment",
            Vpc => "aws:ec2/vpc:Vpc",
            Subnet => "aws:ec2/subnet:Subnet",
            RouteTable => "aws:ec2/routeTable:RouteTable",
            RouteTableAssociation => "aws:ec2/routeTableAssociation:RouteTableAssociation",
            Route => "aws:ec2/route:Route",
            InternetGateway => "aws:ec2/internetGateway:InternetGateway",
            NatGateway => "aws:ec2/natGateway:NatGateway",
            Eip => "aws:ec2/eip:Eip",
            VpcEndpoint => "aws:ec2/vpcEndpoint:VpcEndpoint",
            SecurityGroup => "aws:ec2/securityGroup:SecurityGroup",
            FirewallRuleGroup => "aws:networkfirewall/ruleGroup:RuleGroup",
            FirewallPolicy => "aws:networkfirewall/firewallPolicy:FirewallPolicy",
            IamRole => "aws:iam/role:Role",
            IamRolePolicyAttachment => "aws:iam/rolePolicyAttachment:RolePolicyAttachment",
            IamInstanceProfile => "aws:iam/instanceProfile:InstanceProfile",
            Instance => "aws:ec2/instance:Instance",
            NetworkInsightsPath => "aws:ec2/networkInsightsPath:NetworkInsightsPath",
            NetworkInsightsAnalysis => "aws:ec2/networkInsightsAnalysis:NetworkInsightsAnalysis",
        }
    }

    /// Prefix of provider-assigned identifiers
    pub fn id_prefix(&self) -> &'static str {
        use ResourceKind::*;
        match self {
            TransitGateway => "tgw",
            TransitGatewayRouteTable => "tgw-rtb",
            TransitGatewayRoute => "tgw-route",
            TransitGatewayRouteTableAssociation => "tgw-rtb-assoc",
            TransitGatewayRouteTablePropagation => "tgw-rtb-prop",
            TransitGatewayVpcAttachment => "tgw-attach",
            Vpc => "vpc",
            Subnet => "subnet",
            RouteTable => "rtb",
            RouteTableAssociation => "rtbassoc",
            Route => "r",
            InternetGateway => "igw",
            NatGateway => "nat",
            Eip => "eipalloc",
            VpcEndpoint => "vpce",
            SecurityGroup => "sg",
            FirewallRuleGroup => "rulegroup",
            FirewallPolicy => "fwpolicy",
            IamRole => "role",
            IamRolePolicyAttachment => "rpa",
            IamInstanceProfile => "profile",
            Instance => "i",
            NetworkInsightsPath => "nip",
            NetworkInsightsAnalysis => "nia",
        }
    }

    /// Input properties whose change forces a replacement
    pub fn replace_on_change(&self) -> &'static [&'static str] {
        use ResourceKind::*;
        match self {
            TransitGateway => &["amazon_side_asn"],
            TransitGatewayRouteTable => &["transit_gateway_id"],
            TransitGatewayRoute => &[
                "destination_cidr_block",
                "transit_gateway_route_table_id",
                "transit_gateway_attachment_id",
            ],
            TransitGatewayRouteTableAssociation | TransitGatewayRouteTablePropagation => &[
                "transit_gateway_attachment_id",
                "transit_gateway_route_table_id",
            ],
            TransitGatewayVpcAttachment => &["transit_gateway_id", "vpc_id"],
            Vpc => &["cidr_block"],
            Subnet => &["vpc_id", "cidr_block", "availability_zone"],
            RouteTable => &["vpc_id"],
            RouteTableAssociation => &["subnet_id"],
            Route => &["route_table_id", "destination_cidr_block"],
            InternetGateway => &["vpc_id"],
            NatGateway => &["subnet_id", "allocation_id"],
            Eip => &["domain"],
            VpcEndpoint => &["vpc_id", "service_name", "vpc_endpoint_type"],
            SecurityGroup => &["vpc_id", "description"],
            FirewallRuleGroup => &["name", "type", "capacity"],
            FirewallPolicy => &["name"],
            IamRole => &["name"],
            IamRolePolicyAttachment => &["role", "policy_arn"],
            IamInstanceProfile => &["name"],
            Instance => &["ami", "subnet_id"],
            NetworkInsightsPath => &["source", "destination", "destination_port", "protocol"],
            NetworkInsightsAnalysis => &["network_insights_path_id"],
        }
    }

    /// Category of this kind
    pub fn category(&self) -> ResourceCategory {
        use ResourceKind::*;
        match self {
            TransitGateway
            | TransitGatewayRouteTable
            | TransitGatewayRoute
            | TransitGatewayRouteTableAssociation
            | TransitGatewayRouteTablePropagation
            | TransitGatewayVpcAttachment => ResourceCategory::Transit,
            Vpc | Subnet | RouteTable | RouteTableAssociation | Route | InternetGateway
            | NatGateway | Eip | VpcEndpoint => ResourceCategory::Network,
            SecurityGroup | FirewallRuleGroup | FirewallPolicy => ResourceCategory::Security,
            IamRole | IamRolePolicyAttachment | IamInstanceProfile => ResourceCategory::Identity,
            Instance => ResourceCategory::Compute,
            NetworkInsightsPath | NetworkInsightsAnalysis => ResourceCategory::Diagnostics,
        }
    }

    /// Short name used in URNs and logs
    pub fn short_name(&self) -> &'static str {
        let token = self.type_token();
        token.rsplit(':').next().unwrap_or(token)
    }

    /// Look a kind up by its type token
    pub fn from_type_token(token: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.type_token() == token)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_token())
    }
}
