// Copyright (c) 2025 - Cowboy AI, Inc.
//! Pure Validation Functions - Topology Invariants
//!
//! Checks over a deployment snapshot. All functions are pure and return the
//! first violation they find; [`validate_snapshot`] runs every check and
//! collects all violations.
//!
//! # Invariant Categories
//!
//! 1. **Address space**: subnets inside their VPC and disjoint
//! 2. **Attachment**: at most one attachment per VPC
//! 3. **Ordering**: associations and propagations depend on their attachment
//! 4. **References**: every route target resolves to a live resource
//! 5. **Reachability**: every workload subnet has a default path

use std::collections::BTreeMap;

use crate::domain::network::{check_partition, parse_cidr, DEFAULT_ROUTE};
use crate::domain::ResourceKind;
use crate::engine::state::{ResourceState, Snapshot};

/// Validation result with detailed error information
pub type ValidationResult = Result<(), ValidationError>;

/// Validation error with context
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Subnet outside its VPC, overlapping a sibling, or unparsable
    #[error("Subnet partition of {vpc} is invalid: {reason}")]
    SubnetPartition { vpc: String, reason: String },

    /// More than one live attachment for a VPC
    #[error("VPC {vpc} has {} attachments: {}", attachments.len(), attachments.join(", "))]
    MultipleAttachments {
        vpc: String,
        attachments: Vec<String>,
    },

    /// Association or propagation recorded without its attachment as dependency
    #[error("{relation} does not depend on attachment {attachment}")]
    AssociationOrdering {
        relation: String,
        attachment: String,
    },

    /// A property references an id no live resource has
    #[error("{resource}.{property} references unknown {target}")]
    DanglingReference {
        resource: String,
        property: String,
        target: String,
    },

    /// Transit routing entry whose table or attachment is gone
    #[error("Orphaned transit gateway entry {entry}: {reason}")]
    OrphanedTransitRoute { entry: String, reason: String },

    /// Subnet or transit table without a default path
    #[error("No default route for {subject}")]
    MissingDefaultRoute { subject: String },
}

fn ids_of(snapshot: &Snapshot, kind: ResourceKind) -> BTreeMap<&str, &ResourceState> {
    snapshot.by_kind(kind).map(|r| (r.id.as_str(), r)).collect()
}

/// Route table associated with a subnet
fn route_table_of<'a>(snapshot: &'a Snapshot, subnet_id: &str) -> Option<&'a str> {
    snapshot
        .by_kind(ResourceKind::RouteTableAssociation)
        .find(|a| a.output_str("subnet_id") == Some(subnet_id))
        .and_then(|a| a.output_str("route_table_id"))
}

fn has_default_route(snapshot: &Snapshot, route_table_id: &str) -> bool {
    snapshot.by_kind(ResourceKind::Route).any(|r| {
        r.output_str("route_table_id") == Some(route_table_id)
            && r.output_str("destination_cidr_block") == Some(DEFAULT_ROUTE)
    })
}

/// Validate subnet partitions of every VPC
///
/// # Rules
/// - Every subnet CIDR lies inside its VPC CIDR
/// - Subnets of one VPC are pairwise disjoint
pub fn validate_subnet_partitions(snapshot: &Snapshot) -> ValidationResult {
    for vpc in snapshot.by_kind(ResourceKind::Vpc) {
        let invalid = |reason: String| ValidationError::SubnetPartition {
            vpc: vpc.display_name().to_string(),
            reason,
        };
        let block = vpc
            .output_str("cidr_block")
            .ok_or_else(|| invalid("VPC has no cidr_block".to_string()))
            .and_then(|c| parse_cidr(c).map_err(|e| invalid(e.to_string())))?;

        let subnets = snapshot
            .by_kind(ResourceKind::Subnet)
            .filter(|s| s.output_str("vpc_id") == Some(vpc.id.as_str()))
            .map(|s| {
                s.output_str("cidr_block")
                    .ok_or_else(|| invalid(format!("{} has no cidr_block", s.urn.name())))
                    .and_then(|c| parse_cidr(c).map_err(|e| invalid(e.to_string())))
            })
            .collect::<Result<Vec<_>, _>>()?;

        check_partition(&block, &subnets).map_err(|e| invalid(e.to_string()))?;
    }
    Ok(())
}

/// Validate that no VPC has more than one live attachment
pub fn validate_single_attachment_per_vpc(snapshot: &Snapshot) -> ValidationResult {
    let mut by_vpc: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for attachment in snapshot.by_kind(ResourceKind::TransitGatewayVpcAttachment) {
        if let Some(vpc) = attachment.output_str("vpc_id") {
            by_vpc.entry(vpc).or_default().push(attachment.id.clone());
        }
    }
    match by_vpc.into_iter().find(|(_, a)| a.len() > 1) {
        Some((vpc, attachments)) => Err(ValidationError::MultipleAttachments {
            vpc: vpc.to_string(),
            attachments,
        }),
        None => Ok(()),
    }
}

/// Validate that every association and propagation depends on its attachment
pub fn validate_association_ordering(snapshot: &Snapshot) -> ValidationResult {
    let attachments = ids_of(snapshot, ResourceKind::TransitGatewayVpcAttachment);
    let relations = snapshot
        .by_kind(ResourceKind::TransitGatewayRouteTableAssociation)
        .chain(snapshot.by_kind(ResourceKind::TransitGatewayRouteTablePropagation));

    for relation in relations {
        let attachment_id = relation
            .output_str("transit_gateway_attachment_id")
            .unwrap_or_default();
        let attachment = attachments.get(attachment_id).ok_or_else(|| {
            ValidationError::DanglingReference {
                resource: relation.urn.name().to_string(),
                property: "transit_gateway_attachment_id".to_string(),
                target: attachment_id.to_string(),
            }
        })?;
        if !relation.dependencies.contains(&attachment.urn) {
            return Err(ValidationError::AssociationOrdering {
                relation: relation.urn.name().to_string(),
                attachment: attachment.urn.name().to_string(),
            });
        }
    }
    Ok(())
}

/// Validate that every route target resolves to a live resource
///
/// # Rules
/// - VPC routes: `route_table_id`, and whichever of `gateway_id`,
///   `nat_gateway_id`, `transit_gateway_id` is set
/// - Transit routes: `transit_gateway_attachment_id` unless blackhole
pub fn validate_route_references(snapshot: &Snapshot) -> ValidationResult {
    let targets = [
        ("route_table_id", ResourceKind::RouteTable),
        ("gateway_id", ResourceKind::InternetGateway),
        ("nat_gateway_id", ResourceKind::NatGateway),
        ("transit_gateway_id", ResourceKind::TransitGateway),
    ];
    for route in snapshot.by_kind(ResourceKind::Route) {
        for (property, kind) in targets {
            if let Some(target) = route.output_str(property) {
                if !snapshot.by_kind(kind).any(|r| r.id == target) {
                    return Err(ValidationError::DanglingReference {
                        resource: route.urn.name().to_string(),
                        property: property.to_string(),
                        target: target.to_string(),
                    });
                }
            }
        }
    }

    let attachments = ids_of(snapshot, ResourceKind::TransitGatewayVpcAttachment);
    for route in snapshot.by_kind(ResourceKind::TransitGatewayRoute) {
        if route.outputs.get("blackhole").and_then(|b| b.as_bool()) == Some(true) {
            continue;
        }
        let target = route
            .output_str("transit_gateway_attachment_id")
            .unwrap_or_default();
        if !attachments.contains_key(target) {
            return Err(ValidationError::DanglingReference {
                resource: route.urn.name().to_string(),
                property: "transit_gateway_attachment_id".to_string(),
                target: target.to_string(),
            });
        }
    }
    Ok(())
}

/// Validate that no transit routing entry outlived its table or attachment
pub fn validate_no_orphaned_transit_routes(snapshot: &Snapshot) -> ValidationResult {
    let tables = ids_of(snapshot, ResourceKind::TransitGatewayRouteTable);
    let attachments = ids_of(snapshot, ResourceKind::TransitGatewayVpcAttachment);
    let entries = snapshot
        .by_kind(ResourceKind::TransitGatewayRoute)
        .chain(snapshot.by_kind(ResourceKind::TransitGatewayRouteTableAssociation))
        .chain(snapshot.by_kind(ResourceKind::TransitGatewayRouteTablePropagation));

    for entry in entries {
        let table = entry
            .output_str("transit_gateway_route_table_id")
            .unwrap_or_default();
        if !tables.contains_key(table) {
            return Err(ValidationError::OrphanedTransitRoute {
                entry: entry.urn.name().to_string(),
                reason: format!("route table {table} is gone"),
            });
        }
        if let Some(attachment) = entry.output_str("transit_gateway_attachment_id") {
            if !attachments.contains_key(attachment) {
                return Err(ValidationError::OrphanedTransitRoute {
                    entry: entry.urn.name().to_string(),
                    reason: format!("attachment {attachment} is gone"),
                });
            }
        }
    }
    Ok(())
}

/// Validate that attached VPCs have a default path everywhere it matters
///
/// # Rules
/// - In a VPC with a transit attachment, every subnet not used by the
///   attachment routes `0.0.0.0/0`
/// - A transit table associated with the attachment of a VPC that has no
///   internet gateway routes `0.0.0.0/0`
pub fn validate_default_paths(snapshot: &Snapshot) -> ValidationResult {
    for attachment in snapshot.by_kind(ResourceKind::TransitGatewayVpcAttachment) {
        let vpc_id = attachment.output_str("vpc_id").unwrap_or_default();
        let attachment_subnets = attachment.output_strs("subnet_ids");

        for subnet in snapshot
            .by_kind(ResourceKind::Subnet)
            .filter(|s| s.output_str("vpc_id") == Some(vpc_id))
            .filter(|s| !attachment_subnets.contains(&s.id.as_str()))
        {
            let routed = route_table_of(snapshot, &subnet.id)
                .map(|rt| has_default_route(snapshot, rt))
                .unwrap_or(false);
            if !routed {
                return Err(ValidationError::MissingDefaultRoute {
                    subject: subnet.display_name().to_string(),
                });
            }
        }

        let has_igw = snapshot
            .by_kind(ResourceKind::InternetGateway)
            .any(|igw| igw.output_str("vpc_id") == Some(vpc_id));
        if has_igw {
            continue;
        }
        for association in snapshot
            .by_kind(ResourceKind::TransitGatewayRouteTableAssociation)
            .filter(|a| a.output_str("transit_gateway_attachment_id") == Some(attachment.id.as_str()))
        {
            let table = association
                .output_str("transit_gateway_route_table_id")
                .unwrap_or_default();
            let routed = snapshot
                .by_kind(ResourceKind::TransitGatewayRoute)
                .any(|r| {
                    r.output_str("transit_gateway_route_table_id") == Some(table)
                        && r.output_str("destination_cidr_block") == Some(DEFAULT_ROUTE)
                });
            if !routed {
                return Err(ValidationError::MissingDefaultRoute {
                    subject: format!("transit route table {table}"),
                });
            }
        }
    }
    Ok(())
}

/// Run every check, collecting all violations
pub fn validate_snapshot(snapshot: &Snapshot) -> Vec<ValidationError> {
    let checks: [fn(&Snapshot) -> ValidationResult; 6] = [
        validate_subnet_partitions,
        validate_single_attachment_per_vpc,
        validate_association_ordering,
        validate_route_references,
        validate_no_orphaned_transit_routes,
        validate_default_paths,
    ];
    checks
        .iter()
        .filter_map(|check| check(snapshot).err())
        .collect()
}
