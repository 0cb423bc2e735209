// Copyright (c) 2025 - Cowboy AI, Inc.
//! Transit backbone: the transit gateway and its three route tables

use tracing::info;

use crate::aws::ec2transitgateway::{RouteTableArgs, TransitGatewayArgs};
use crate::aws::{name_tag, Toggle};
use crate::engine::{Context, Resource, ResourceOptions};
use crate::output::Output;

/// Transit gateway with default association and propagation disabled
#[derive(Debug, Clone)]
pub struct Backbone {
    pub transit_gateway: Resource,
    /// Traffic returning from inspection
    pub inspection_route_table: Resource,
    /// Associated with every spoke attachment
    pub spoke_route_table: Resource,
    /// Associated with the hub attachment
    pub hub_route_table: Resource,
}

impl Backbone {
    pub fn declare(ctx: &Context, project: &str) -> Self {
        let transit_gateway = ctx.register(
            "tgw",
            TransitGatewayArgs {
                description: format!("Transit Gateway - {project}"),
                amazon_side_asn: None,
                default_route_table_association: Toggle::Disable,
                default_route_table_propagation: Toggle::Disable,
                tags: name_tag(project),
            },
            ResourceOptions::new(),
        );

        let route_table = |name: &str, tag: &str| {
            ctx.register(
                name,
                RouteTableArgs {
                    transit_gateway_id: transit_gateway.id(),
                    tags: name_tag(tag),
                },
                ResourceOptions::new().parent(&transit_gateway),
            )
        };
        let inspection_route_table =
            route_table("post-inspection-tgw-route-table", "Post-Inspection Route Table");
        let spoke_route_table = route_table("spoke-tgw-route-table", "spoke-tgw-route-table");
        let hub_route_table = route_table("hub-tgw-route-table", "hub-tgw-route-table");
        info!(project, "transit backbone declared");

        Self {
            transit_gateway,
            inspection_route_table,
            spoke_route_table,
            hub_route_table,
        }
    }

    pub fn transit_gateway_id(&self) -> Output<String> {
        self.transit_gateway.id()
    }
}
