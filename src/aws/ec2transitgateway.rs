// Copyright (c) 2025 - Cowboy AI, Inc.
//! Transit gateway resources

use super::{Tags, Toggle};
use crate::domain::ResourceKind;
use crate::engine::{Inputs, ResourceArgs};
use crate::output::Output;

#[derive(Debug, Clone, Default)]
pub struct TransitGatewayArgs {
    pub description: String,
    /// Private ASN of the Amazon side; provider default when unset
    pub amazon_side_asn: Option<u32>,
    pub default_route_table_association: Toggle,
    pub default_route_table_propagation: Toggle,
    pub tags: Tags,
}

impl ResourceArgs for TransitGatewayArgs {
    const KIND: ResourceKind = ResourceKind::TransitGateway;

    fn into_inputs(self) -> Inputs {
        let inputs = Inputs::new()
            .set("description", self.description)
            .set("default_route_table_association", self.default_route_table_association)
            .set("default_route_table_propagation", self.default_route_table_propagation)
            .set("tags", self.tags);
        match self.amazon_side_asn {
            Some(asn) => inputs.set("amazon_side_asn", asn),
            None => inputs,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RouteTableArgs {
    pub transit_gateway_id: Output<String>,
    pub tags: Tags,
}

impl ResourceArgs for RouteTableArgs {
    const KIND: ResourceKind = ResourceKind::TransitGatewayRouteTable;

    fn into_inputs(self) -> Inputs {
        Inputs::new()
            .output("transit_gateway_id", &self.transit_gateway_id)
            .set("tags", self.tags)
    }
}

/// Static route in a transit gateway route table
///
/// Without an attachment the route is a blackhole.
#[derive(Debug, Clone)]
pub struct RouteArgs {
    pub destination_cidr_block: String,
    pub transit_gateway_attachment_id: Option<Output<String>>,
    pub transit_gateway_route_table_id: Output<String>,
}

impl ResourceArgs for RouteArgs {
    const KIND: ResourceKind = ResourceKind::TransitGatewayRoute;

    fn into_inputs(self) -> Inputs {
        let blackhole = self.transit_gateway_attachment_id.is_none();
        Inputs::new()
            .set("destination_cidr_block", self.destination_cidr_block)
            .optional_output("transit_gateway_attachment_id", &self.transit_gateway_attachment_id)
            .output("transit_gateway_route_table_id", &self.transit_gateway_route_table_id)
            .set("blackhole", blackhole)
    }
}

/// Attachment → route table association
#[derive(Debug, Clone)]
pub struct RouteTableAssociationArgs {
    pub transit_gateway_attachment_id: Output<String>,
    pub transit_gateway_route_table_id: Output<String>,
}

impl ResourceArgs for RouteTableAssociationArgs {
    const KIND: ResourceKind = ResourceKind::TransitGatewayRouteTableAssociation;

    fn into_inputs(self) -> Inputs {
        Inputs::new()
            .output("transit_gateway_attachment_id", &self.transit_gateway_attachment_id)
            .output("transit_gateway_route_table_id", &self.transit_gateway_route_table_id)
    }
}

/// Attachment → route table propagation
#[derive(Debug, Clone)]
pub struct RouteTablePropagationArgs {
    pub transit_gateway_attachment_id: Output<String>,
    pub transit_gateway_route_table_id: Output<String>,
}

impl ResourceArgs for RouteTablePropagationArgs {
    const KIND: ResourceKind = ResourceKind::TransitGatewayRouteTablePropagation;

    fn into_inputs(self) -> Inputs {
        Inputs::new()
            .output("transit_gateway_attachment_id", &self.transit_gateway_attachment_id)
            .output("transit_gateway_route_table_id", &self.transit_gateway_route_table_id)
    }
}

/// Binding of one VPC to the transit gateway through its attachment subnets
#[derive(Debug, Clone)]
pub struct VpcAttachmentArgs {
    pub transit_gateway_id: Output<String>,
    pub vpc_id: Output<String>,
    /// One subnet per availability zone
    pub subnet_ids: Output<Vec<String>>,
    pub appliance_mode_support: Toggle,
    pub transit_gateway_default_route_table_association: bool,
    pub transit_gateway_default_route_table_propagation: bool,
    pub tags: Tags,
}

impl ResourceArgs for VpcAttachmentArgs {
    const KIND: ResourceKind = ResourceKind::TransitGatewayVpcAttachment;

    fn into_inputs(self) -> Inputs {
        Inputs::new()
            .output("transit_gateway_id", &self.transit_gateway_id)
            .output("vpc_id", &self.vpc_id)
            .output("subnet_ids", &self.subnet_ids)
            .set("appliance_mode_support", self.appliance_mode_support)
            .set(
                "transit_gateway_default_route_table_association",
                self.transit_gateway_default_route_table_association,
            )
            .set(
                "transit_gateway_default_route_table_propagation",
                self.transit_gateway_default_route_table_propagation,
            )
            .set("tags", self.tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_route_without_attachment_is_blackhole() {
        let args = RouteArgs {
            destination_cidr_block: "10.0.0.0/8".to_string(),
            transit_gateway_attachment_id: None,
            transit_gateway_route_table_id: Output::known("tgw-rtb-1".to_string()),
        };
        let resolved = args.into_inputs().resolve().await.unwrap();
        assert_eq!(resolved.properties["blackhole"], json!(true));
        assert!(!resolved.properties.contains_key("transit_gateway_attachment_id"));
    }

    #[tokio::test]
    async fn test_gateway_toggles_serialize_lowercase() {
        let args = TransitGatewayArgs {
            description: "Transit Gateway - hub".to_string(),
            ..Default::default()
        };
        let resolved = args.into_inputs().resolve().await.unwrap();
        assert_eq!(resolved.properties["default_route_table_association"], json!("disable"));
        assert!(!resolved.properties.contains_key("amazon_side_asn"));
    }
}
