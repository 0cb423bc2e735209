// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property tests for VPC subnet partitioning
//!
//! Properties verified:
//! 1. Every allocation lies inside the VPC and no two overlap
//! 2. One allocation per (spec, zone), each with the spec's mask
//! 3. Allocations are handed out in ascending address order
//! 4. Layouts ordered from largest to smallest subnet fit exactly when their
//!    total size fits
//! 5. Overlap is symmetric and agrees with address ranges

use hub_spoke_infrastructure::domain::{
    check_partition, cidrs_overlap, partition_vpc, NetworkError, SubnetSpec, SubnetType,
};
use ipnet::Ipv4Net;
use proptest::prelude::*;
use std::net::Ipv4Addr;

fn arb_vpc() -> impl Strategy<Value = Ipv4Net> {
    (any::<u32>(), 16u8..=24).prop_map(|(addr, prefix)| {
        Ipv4Net::new(Ipv4Addr::from(addr), prefix)
            .expect("prefix in range")
            .trunc()
    })
}

fn arb_subnet_type() -> impl Strategy<Value = SubnetType> {
    prop_oneof![
        Just(SubnetType::Public),
        Just(SubnetType::Private),
        Just(SubnetType::Isolated),
    ]
}

/// A VPC and specs whose masks are valid for it
fn arb_layout() -> impl Strategy<Value = (Ipv4Net, Vec<SubnetSpec>, Vec<String>)> {
    arb_vpc().prop_flat_map(|vpc| {
        let spec = (arb_subnet_type(), vpc.prefix_len()..=28u8)
            .prop_map(|(subnet_type, mask)| SubnetSpec::new(subnet_type, mask));
        (
            Just(vpc),
            prop::collection::vec(spec, 1..5),
            (1usize..=6).prop_map(|n| (0..n).map(|i| format!("zone-{i}")).collect()),
        )
    })
}

fn block_size(mask: u8) -> u64 {
    1u64 << (32 - mask)
}

fn range(net: &Ipv4Net) -> (u32, u32) {
    (u32::from(net.network()), u32::from(net.broadcast()))
}

proptest! {
    #[test]
    fn prop_allocations_partition_the_vpc((vpc, specs, zones) in arb_layout()) {
        match partition_vpc(&vpc, &specs, &zones) {
            Ok(allocations) => {
                let cidrs: Vec<Ipv4Net> = allocations.iter().map(|a| a.cidr).collect();
                prop_assert_eq!(check_partition(&vpc, &cidrs), Ok(()));
                prop_assert_eq!(allocations.len(), specs.len() * zones.len());

                for (spec_index, spec) in specs.iter().enumerate() {
                    for (zone_index, zone) in zones.iter().enumerate() {
                        let allocation = &allocations[spec_index * zones.len() + zone_index];
                        prop_assert_eq!(allocation.cidr.prefix_len(), spec.cidr_mask);
                        prop_assert_eq!(&allocation.availability_zone, zone);
                        prop_assert_eq!(allocation.index, zone_index + 1);
                        prop_assert_eq!(allocation.role.as_str(), spec.role());
                    }
                }
            }
            Err(err) => {
                let is_exhausted = matches!(err, NetworkError::AddressSpaceExhausted { .. });
                prop_assert!(is_exhausted, "unexpected error: {}", err);
            }
        }
    }

    #[test]
    fn prop_allocations_ascend((vpc, specs, zones) in arb_layout()) {
        if let Ok(allocations) = partition_vpc(&vpc, &specs, &zones) {
            for pair in allocations.windows(2) {
                prop_assert!(range(&pair[0].cidr).1 < range(&pair[1].cidr).0);
            }
        }
    }

    #[test]
    fn prop_largest_first_layouts_fit_when_size_allows((vpc, mut specs, zones) in arb_layout()) {
        specs.sort_by_key(|s| s.cidr_mask);
        let required: u64 = specs
            .iter()
            .map(|s| block_size(s.cidr_mask) * zones.len() as u64)
            .sum();
        let available = block_size(vpc.prefix_len());

        let result = partition_vpc(&vpc, &specs, &zones);
        prop_assert_eq!(result.is_ok(), required <= available);
    }

    #[test]
    fn prop_overlap_matches_ranges(a in arb_vpc(), b in arb_vpc()) {
        let (a_start, a_end) = range(&a);
        let (b_start, b_end) = range(&b);
        let intersects = a_start <= b_end && b_start <= a_end;

        prop_assert_eq!(cidrs_overlap(&a, &b), cidrs_overlap(&b, &a));
        prop_assert_eq!(cidrs_overlap(&a, &b), intersects);
    }
}

#[test]
fn test_oversized_mask_is_rejected() {
    let vpc: Ipv4Net = "10.129.0.0/24".parse().unwrap();
    let specs = vec![SubnetSpec::new(SubnetType::Public, 29)];
    let zones = vec!["us-east-1a".to_string()];

    let err = partition_vpc(&vpc, &specs, &zones).unwrap_err();
    assert!(matches!(err, NetworkError::InvalidSubnetMask { mask: 29, .. }));
}
