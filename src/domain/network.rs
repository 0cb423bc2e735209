// Copyright (c) 2025 - Cowboy AI, Inc.
//! Network Value Objects with Validation Invariants
//!
//! CIDR parsing, subnet specifications and the partitioning of a VPC address
//! space into non-overlapping subnets.

use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use thiserror::Error;

/// Network validation error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("Invalid CIDR notation: {0}")]
    InvalidCidr(String),

    #[error("CIDR {0} is not a network address (host bits set)")]
    HostBitsSet(String),

    #[error("Invalid subnet mask /{mask} for VPC {vpc} (must be between /{min} and /28)")]
    InvalidSubnetMask { vpc: String, mask: u8, min: u8 },

    #[error("Address space {vpc} exhausted allocating a /{mask} subnet")]
    AddressSpaceExhausted { vpc: String, mask: u8 },

    #[error("Subnet {subnet} lies outside VPC {vpc}")]
    OutsideVpc { subnet: String, vpc: String },

    #[error("Subnets {first} and {second} overlap")]
    Overlap { first: String, second: String },
}

/// Smallest subnet the provider accepts
pub const MAX_SUBNET_PREFIX: u8 = 28;

/// Default route destination
pub const DEFAULT_ROUTE: &str = "0.0.0.0/0";

/// Parse an IPv4 CIDR block, rejecting addresses with host bits set
///
/// # Examples
///
/// ```rust
/// use hub_spoke_infrastructure::domain::parse_cidr;
///
/// let net = parse_cidr("10.129.0.0/24").unwrap();
/// assert_eq!(net.prefix_len(), 24);
/// assert!(parse_cidr("10.129.0.1/24").is_err());
/// ```
pub fn parse_cidr(cidr: impl AsRef<str>) -> Result<Ipv4Net, NetworkError> {
    let cidr = cidr.as_ref().trim();
    let net = Ipv4Net::from_str(cidr).map_err(|_| NetworkError::InvalidCidr(cidr.to_string()))?;

    // Invariant: canonical network address
    if net.network() != net.addr() {
        return Err(NetworkError::HostBitsSet(cidr.to_string()));
    }
    Ok(net)
}

/// Whether two blocks share at least one address
pub fn cidrs_overlap(a: &Ipv4Net, b: &Ipv4Net) -> bool {
    a.contains(b) || b.contains(a)
}

/// Exposure class of a subnet
///
/// - `Public`: default route to the VPC internet gateway
/// - `Private`: default route to a NAT gateway owned by the same VPC
/// - `Isolated`: no default route installed by the network builder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubnetType {
    Public,
    Private,
    Isolated,
}

impl SubnetType {
    /// Default role name for specs that don't set one
    pub fn default_name(&self) -> &'static str {
        match self {
            SubnetType::Public => "public",
            SubnetType::Private => "private",
            SubnetType::Isolated => "isolated",
        }
    }
}

impl fmt::Display for SubnetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.default_name())
    }
}

/// One subnet role of a VPC, repeated once per availability zone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetSpec {
    /// Exposure class
    pub subnet_type: SubnetType,
    /// Prefix length of every subnet of this role
    pub cidr_mask: u8,
    /// Role name; defaults to the type name
    pub name: Option<String>,
}

impl SubnetSpec {
    /// Create a spec with the default role name
    pub fn new(subnet_type: SubnetType, cidr_mask: u8) -> Self {
        Self {
            subnet_type,
            cidr_mask,
            name: None,
        }
    }

    /// Set the role name
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Role name used for tags and lookups
    pub fn role(&self) -> &str {
        self.name
            .as_deref()
            .unwrap_or_else(|| self.subnet_type.default_name())
    }
}

/// A subnet carved out of a VPC block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetAllocation {
    /// Role name from the spec
    pub role: String,
    /// Exposure class from the spec
    pub subnet_type: SubnetType,
    /// Availability zone
    pub availability_zone: String,
    /// 1-based index within the role
    pub index: usize,
    /// Allocated block
    pub cidr: Ipv4Net,
}

/// Partition a VPC block into one subnet per (spec, availability zone)
///
/// Allocation is first-fit and aligned, walking the specs in order and, within
/// a spec, the zones in order. The result never overlaps and never leaves
/// the VPC block.
///
/// # Examples
///
/// ```rust
/// use hub_spoke_infrastructure::domain::{parse_cidr, partition_vpc, SubnetSpec, SubnetType};
///
/// let vpc = parse_cidr("10.129.0.0/24").unwrap();
/// let specs = vec![
///     SubnetSpec::new(SubnetType::Public, 28),
///     SubnetSpec::new(SubnetType::Isolated, 28).named("tgw"),
/// ];
/// let zones = vec!["us-east-1a".to_string(), "us-east-1b".to_string()];
/// let subnets = partition_vpc(&vpc, &specs, &zones).unwrap();
/// assert_eq!(subnets.len(), 4);
/// assert_eq!(subnets[2].cidr.to_string(), "10.129.0.32/28");
/// ```
pub fn partition_vpc(
    vpc: &Ipv4Net,
    specs: &[SubnetSpec],
    availability_zones: &[String],
) -> Result<Vec<SubnetAllocation>, NetworkError> {
    let space_end = u32::from(vpc.broadcast()) as u64;
    let mut cursor = u32::from(vpc.network()) as u64;
    let mut allocations = Vec::with_capacity(specs.len() * availability_zones.len());

    for spec in specs {
        let mask = spec.cidr_mask;
        if mask < vpc.prefix_len() || mask > MAX_SUBNET_PREFIX {
            return Err(NetworkError::InvalidSubnetMask {
                vpc: vpc.to_string(),
                mask,
                min: vpc.prefix_len(),
            });
        }
        let block = 1u64 << (32 - mask);

        for (i, zone) in availability_zones.iter().enumerate() {
            // Align the cursor to the block boundary
            let start = cursor.div_ceil(block) * block;
            let end = start + block - 1;
            if end > space_end {
                return Err(NetworkError::AddressSpaceExhausted {
                    vpc: vpc.to_string(),
                    mask,
                });
            }

            let cidr = Ipv4Net::new(Ipv4Addr::from(start as u32), mask)
                .map_err(|_| NetworkError::InvalidCidr(format!("{}/{}", start, mask)))?;
            allocations.push(SubnetAllocation {
                role: spec.role().to_string(),
                subnet_type: spec.subnet_type,
                availability_zone: zone.clone(),
                index: i + 1,
                cidr,
            });
            cursor = end + 1;
        }
    }

    Ok(allocations)
}

/// Check that `subnets` lie inside `vpc` and are pairwise disjoint
pub fn check_partition(vpc: &Ipv4Net, subnets: &[Ipv4Net]) -> Result<(), NetworkError> {
    for subnet in subnets {
        if !vpc.contains(subnet) {
            return Err(NetworkError::OutsideVpc {
                subnet: subnet.to_string(),
                vpc: vpc.to_string(),
            });
        }
    }

    let mut sorted = subnets.to_vec();
    sorted.sort();
    for pair in sorted.windows(2) {
        if cidrs_overlap(&pair[0], &pair[1]) {
            return Err(NetworkError::Overlap {
                first: pair[0].to_string(),
                second: pair[1].to_string(),
            });
        }
    }
    Ok(())
}

/// Longest-prefix match of `addr` against `(destination, value)` pairs
pub fn longest_prefix_match<'a, T>(
    addr: Ipv4Addr,
    routes: impl IntoIterator<Item = (&'a Ipv4Net, T)>,
) -> Option<T> {
    routes
        .into_iter()
        .filter(|(dest, _)| dest.contains(&addr))
        .max_by_key(|(dest, _)| dest.prefix_len())
        .map(|(_, value)| value)
}
