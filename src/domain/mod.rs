// Copyright (c) 2025 - Cowboy AI, Inc.
//! Infrastructure Domain Models
//!
//! Core domain concepts of the hub-and-spoke topology: the resource kind
//! taxonomy, resource names, IPv4 address-space arithmetic, Suricata rule
//! checks and the topology invariants every converged deployment must hold.
//!
//! # Value Objects with Invariants
//!
//! - [`Urn`] - unique declaration name within a stack
//! - [`ResourceKind`] - declared resource taxonomy and its provider tokens
//! - [`SubnetSpec`] / [`SubnetAllocation`] - subnet roles and their blocks
//!
//! # Pure Functions
//!
//! - [`partition_vpc`] - first-fit aligned subnet allocation
//! - [`longest_prefix_match`] - route selection
//! - [`validate_snapshot`] - topology invariants

pub mod invariants;
pub mod network;
pub mod resource_type;
pub mod suricata;
pub mod urn;

pub use invariants::{
    validate_association_ordering, validate_default_paths, validate_no_orphaned_transit_routes,
    validate_route_references, validate_single_attachment_per_vpc, validate_snapshot,
    validate_subnet_partitions, ValidationError, ValidationResult,
};
pub use network::{
    check_partition, cidrs_overlap, longest_prefix_match, parse_cidr, partition_vpc,
    NetworkError, SubnetAllocation, SubnetSpec, SubnetType, DEFAULT_ROUTE, MAX_SUBNET_PREFIX,
};
pub use resource_type::{ResourceCategory, ResourceKind};
pub use suricata::{validate_rules, RuleError};
pub use urn::Urn;
