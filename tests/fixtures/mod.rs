// Copyright (c) 2025 - Cowboy AI, Inc.
//! Test Fixtures for hub-spoke-infrastructure
//!
//! Deterministic deployments against a fresh simulated account.
//!
//! # Design Principles
//! - Every test owns its account and state store
//! - The reference topology is `10.0.0.0/8` / `10.129.0.0/24` / `10.0.0.0/16`
//! - Ids are read back from the account, never hard-coded

#![allow(dead_code)]

use std::sync::Arc;

use hub_spoke_infrastructure::config::{HubAndSpokeSettings, SpokeSettings};
use hub_spoke_infrastructure::domain::ResourceKind;
use hub_spoke_infrastructure::engine::{Deployment, InMemoryStateStore, StateStore};
use hub_spoke_infrastructure::provider::simulated::CloudResource;
use hub_spoke_infrastructure::provider::SimulatedCloud;
use hub_spoke_infrastructure::{stack, InfrastructureResult, UpdateSummary};

pub const STACK: &str = "test";
pub const SUPERNET: &str = "10.0.0.0/8";
pub const HUB_CIDR: &str = "10.129.0.0/24";
pub const SPOKE_CIDR: &str = "10.0.0.0/16";
pub const DEFAULT_ROUTE: &str = "0.0.0.0/0";

/// Reference topology: one spoke, verification on
pub fn scenario_settings() -> HubAndSpokeSettings {
    HubAndSpokeSettings::new(SUPERNET)
}

/// Reference topology with a different spoke list
pub fn settings_with_spokes(spokes: &[(&str, &str)]) -> HubAndSpokeSettings {
    let mut settings = scenario_settings();
    settings.spokes = spokes
        .iter()
        .map(|(name, cidr)| SpokeSettings::new(name, cidr))
        .collect();
    settings
}

/// A fresh account and an in-memory state store
pub fn harness() -> (Arc<SimulatedCloud>, Deployment) {
    let cloud = Arc::new(SimulatedCloud::default());
    let deployment = deployment_with_store(&cloud, Arc::new(InMemoryStateStore::new()));
    (cloud, deployment)
}

pub fn deployment_with_store(cloud: &Arc<SimulatedCloud>, store: Arc<dyn StateStore>) -> Deployment {
    Deployment::new(STACK, stack::PROJECT, cloud.clone(), store)
}

/// Apply the hub-and-spoke program
pub async fn up(
    deployment: &Deployment,
    settings: &HubAndSpokeSettings,
) -> InfrastructureResult<UpdateSummary> {
    let settings = settings.clone();
    deployment.up(|ctx| stack::program(ctx, settings)).await
}

/// Preview the hub-and-spoke program
pub async fn preview(
    deployment: &Deployment,
    settings: &HubAndSpokeSettings,
) -> InfrastructureResult<UpdateSummary> {
    let settings = settings.clone();
    deployment.preview(|ctx| stack::program(ctx, settings)).await
}

/// Resource by declared name
pub fn named(cloud: &SimulatedCloud, kind: ResourceKind, name: &str) -> CloudResource {
    cloud
        .find_named(kind, name)
        .unwrap_or_else(|| panic!("no {kind} named {name}"))
}

/// Resources of `kind` whose declared name starts with `prefix`
pub fn named_prefix(cloud: &SimulatedCloud, kind: ResourceKind, prefix: &str) -> Vec<CloudResource> {
    cloud
        .resources(kind)
        .into_iter()
        .filter(|r| r.urn.name().starts_with(prefix))
        .collect()
}

/// Route table associated with `subnet_id`
pub fn route_table_of(cloud: &SimulatedCloud, subnet_id: &str) -> String {
    cloud
        .resources(ResourceKind::RouteTableAssociation)
        .into_iter()
        .find(|a| a.get_str("subnet_id") == Some(subnet_id))
        .and_then(|a| a.get_str("route_table_id").map(str::to_string))
        .unwrap_or_else(|| panic!("subnet {subnet_id} has no route table"))
}

/// The `0.0.0.0/0` route of a VPC route table
pub fn default_route(cloud: &SimulatedCloud, route_table_id: &str) -> CloudResource {
    cloud
        .resources(ResourceKind::Route)
        .into_iter()
        .find(|r| {
            r.get_str("route_table_id") == Some(route_table_id)
                && r.get_str("destination_cidr_block") == Some(DEFAULT_ROUTE)
        })
        .unwrap_or_else(|| panic!("{route_table_id} has no default route"))
}
