// Copyright (c) 2025 - Cowboy AI, Inc.
//! Static reachability evaluation
//!
//! Follows a packet from an instance toward an internet gateway through the
//! modelled routing state:
//!
//! ```text
//! instance ─▶ security group egress ─▶ subnet route table (longest prefix)
//!     ├─ local          → stays in the VPC (not found)
//!     ├─ NAT gateway    → source translated, continue from the NAT's subnet
//!     ├─ transit gateway→ attachment ─▶ associated TGW table
//!     │                    (static + propagated routes) ─▶ next attachment
//!     └─ internet gateway → found if it is the destination and the source
//!                           has been translated or is public
//! ```

use ipnet::Ipv4Net;
use serde_json::Value;
use std::net::Ipv4Addr;

use super::{CloudResource, CloudState};
use crate::domain::{longest_prefix_match, parse_cidr, ResourceKind};

/// Address standing in for "somewhere on the internet"
const EXTERNAL: Ipv4Addr = Ipv4Addr::new(198, 51, 100, 10);

/// Loop guard
const MAX_HOPS: usize = 16;

/// Result of one evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Outcome {
    pub found: bool,
    pub hops: Vec<String>,
    pub explanations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NextHop {
    Local,
    Gateway(String),
    Nat(String),
    Transit(String),
    Blackhole,
    Attachment(String),
}

/// Evaluate a network insights path
pub(super) fn evaluate(state: &CloudState, path: &CloudResource) -> Outcome {
    let mut hops = Vec::new();
    match walk(state, path, &mut hops) {
        Ok(()) => Outcome {
            found: true,
            hops,
            explanations: Vec::new(),
        },
        Err(reason) => Outcome {
            found: false,
            hops,
            explanations: vec![reason],
        },
    }
}

fn egress_allows(group: &CloudResource, protocol: &str, port: Option<u64>, addr: Ipv4Addr) -> bool {
    group
        .inputs
        .get("egress")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .any(|rule| {
            let rule_protocol = rule.get("protocol").and_then(Value::as_str).unwrap_or_default();
            let protocol_ok = rule_protocol == "-1" || rule_protocol == protocol;
            let port_ok = rule_protocol == "-1"
                || port.map_or(true, |p| {
                    let from = rule.get("from_port").and_then(Value::as_u64).unwrap_or(0);
                    let to = rule.get("to_port").and_then(Value::as_u64).unwrap_or(0);
                    (from..=to).contains(&p)
                });
            let cidr_ok = rule
                .get("cidr_blocks")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
                .filter_map(Value::as_str)
                .filter_map(|c| parse_cidr(c).ok())
                .any(|net| net.contains(&addr));
            protocol_ok && port_ok && cidr_ok
        })
}

fn vpc_routes(state: &CloudState, table: &CloudResource, vpc: &CloudResource) -> Vec<(Ipv4Net, NextHop)> {
    let mut routes = Vec::new();
    if let Some(local) = vpc.get_str("cidr_block").and_then(|c| parse_cidr(c).ok()) {
        routes.push((local, NextHop::Local));
    }
    for route in state
        .of_kind(ResourceKind::Route)
        .filter(|r| r.get_str("route_table_id") == Some(table.id.as_str()))
    {
        let Some(destination) = route
            .get_str("destination_cidr_block")
            .and_then(|d| parse_cidr(d).ok())
        else {
            continue;
        };
        let hop = if let Some(igw) = route.get_str("gateway_id") {
            NextHop::Gateway(igw.to_string())
        } else if let Some(nat) = route.get_str("nat_gateway_id") {
            NextHop::Nat(nat.to_string())
        } else if let Some(tgw) = route.get_str("transit_gateway_id") {
            NextHop::Transit(tgw.to_string())
        } else {
            NextHop::Blackhole
        };
        routes.push((destination, hop));
    }
    routes
}

fn transit_routes(state: &CloudState, table_id: &str) -> Vec<(Ipv4Net, NextHop)> {
    let mut routes = Vec::new();
    for route in state
        .of_kind(ResourceKind::TransitGatewayRoute)
        .filter(|r| r.get_str("transit_gateway_route_table_id") == Some(table_id))
    {
        let Some(destination) = route
            .get_str("destination_cidr_block")
            .and_then(|d| parse_cidr(d).ok())
        else {
            continue;
        };
        let hop = match route.get_str("transit_gateway_attachment_id") {
            Some(attachment) if route.inputs.get("blackhole").and_then(Value::as_bool) != Some(true) => {
                NextHop::Attachment(attachment.to_string())
            }
            _ => NextHop::Blackhole,
        };
        routes.push((destination, hop));
    }

    // Propagated routes: the VPC block of every propagating attachment
    for propagation in state
        .of_kind(ResourceKind::TransitGatewayRouteTablePropagation)
        .filter(|p| p.get_str("transit_gateway_route_table_id") == Some(table_id))
    {
        let Some(attachment) = propagation
            .get_str("transit_gateway_attachment_id")
            .and_then(|a| state.get(a))
        else {
            continue;
        };
        let block = attachment
            .get_str("vpc_id")
            .and_then(|v| state.get(v))
            .and_then(|vpc| vpc.get_str("cidr_block"))
            .and_then(|c| parse_cidr(c).ok());
        if let Some(block) = block {
            routes.push((block, NextHop::Attachment(attachment.id.clone())));
        }
    }
    routes
}

fn walk(state: &CloudState, path: &CloudResource, hops: &mut Vec<String>) -> Result<(), String> {
    let source_id = path.get_str("source").unwrap_or_default();
    let destination_id = path.get_str("destination").unwrap_or_default();
    let protocol = path.get_str("protocol").unwrap_or("tcp");
    let port = path.inputs.get("destination_port").and_then(Value::as_u64);

    let source = state
        .get(source_id)
        .ok_or_else(|| format!("source {source_id} no longer exists"))?;
    if source.kind != ResourceKind::Instance {
        return Err(format!(
            "{source_id}: no inbound route from {} toward {destination_id}",
            source.kind.short_name()
        ));
    }
    let destination = state.require(ResourceKind::InternetGateway, destination_id)?;
    hops.push(source.id.clone());

    let group = source
        .get_strs("vpc_security_group_ids")
        .into_iter()
        .filter_map(|id| state.get(id))
        .find(|sg| egress_allows(sg, protocol, port, EXTERNAL))
        .ok_or_else(|| {
            format!(
                "security groups of {source_id} do not allow egress {protocol}/{}",
                port.map_or("any".to_string(), |p| p.to_string())
            )
        })?;
    hops.push(group.id.clone());

    let mut subnet = source
        .get_str("subnet_id")
        .and_then(|s| state.get(s))
        .ok_or_else(|| format!("{source_id} has no subnet"))?;
    let mut translated = false;

    for _ in 0..MAX_HOPS {
        let vpc = subnet
            .get_str("vpc_id")
            .and_then(|v| state.get(v))
            .ok_or_else(|| format!("{} has no VPC", subnet.id))?;
        let table = state
            .route_table_for_subnet(&subnet.id)
            .ok_or_else(|| format!("{} has no associated route table", subnet.id))?;
        hops.push(table.id.clone());

        let routes = vpc_routes(state, table, vpc);
        let next = longest_prefix_match(EXTERNAL, routes.iter().map(|(net, hop)| (net, hop)))
            .ok_or_else(|| format!("no route to {EXTERNAL} in {}", table.id))?;

        match next {
            NextHop::Local => {
                return Err(format!("{EXTERNAL} resolved to the local route of {}", vpc.id))
            }
            NextHop::Blackhole | NextHop::Attachment(_) => {
                return Err(format!("route to {EXTERNAL} in {} has no usable target", table.id))
            }
            NextHop::Gateway(igw) => {
                hops.push(igw.clone());
                if igw != &destination.id {
                    return Err(format!("traffic leaves through {igw}, not {}", destination.id));
                }
                let public = subnet
                    .inputs
                    .get("map_public_ip_on_launch")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                if translated || public {
                    return Ok(());
                }
                return Err(format!("{source_id} has no public address at {igw}"));
            }
            NextHop::Nat(nat_id) => {
                hops.push(nat_id.clone());
                let nat = state.require(ResourceKind::NatGateway, nat_id)?;
                subnet = nat
                    .get_str("subnet_id")
                    .and_then(|s| state.get(s))
                    .ok_or_else(|| format!("{nat_id} has no subnet"))?;
                translated = true;
            }
            NextHop::Transit(tgw) => {
                hops.push(tgw.clone());
                let attachment = state
                    .of_kind(ResourceKind::TransitGatewayVpcAttachment)
                    .find(|a| {
                        a.get_str("transit_gateway_id") == Some(tgw.as_str())
                            && a.get_str("vpc_id") == Some(vpc.id.as_str())
                    })
                    .ok_or_else(|| format!("{} is not attached to {tgw}", vpc.id))?;
                hops.push(attachment.id.clone());

                let table_id = state
                    .of_kind(ResourceKind::TransitGatewayRouteTableAssociation)
                    .find(|a| a.get_str("transit_gateway_attachment_id") == Some(attachment.id.as_str()))
                    .and_then(|a| a.get_str("transit_gateway_route_table_id"))
                    .ok_or_else(|| format!("{} is not associated with a route table", attachment.id))?;
                hops.push(table_id.to_string());

                let routes = transit_routes(state, table_id);
                let next = longest_prefix_match(EXTERNAL, routes.iter().map(|(net, hop)| (net, hop)))
                    .ok_or_else(|| format!("no route to {EXTERNAL} in {table_id}"))?;
                let NextHop::Attachment(next_id) = next else {
                    return Err(format!("route to {EXTERNAL} in {table_id} is a blackhole"));
                };
                if next_id == &attachment.id {
                    return Err(format!("route in {table_id} loops back to {next_id}"));
                }
                hops.push(next_id.clone());

                let next_attachment = state.require(ResourceKind::TransitGatewayVpcAttachment, next_id)?;
                subnet = next_attachment
                    .get_strs("subnet_ids")
                    .first()
                    .and_then(|s| state.get(s))
                    .ok_or_else(|| format!("{next_id} has no subnets"))?;
            }
        }
    }

    Err(format!("no path within {MAX_HOPS} hops"))
}
