// Copyright (c) 2025 - Cowboy AI, Inc.
//! Integration tests for the reference hub-and-spoke topology
//!
//! Applies the `10.0.0.0/8` / `10.129.0.0/24` / `10.0.0.0/16` topology to a
//! simulated account and checks the converged routing:
//! 1. Hub isolated subnets egress through the hub NAT
//! 2. The spoke transit table sends everything to the hub attachment
//! 3. Spoke workload subnets send everything to the transit gateway
//! 4. Both reachability analyses find a path to the hub internet gateway

mod fixtures;

use fixtures::*;
use hub_spoke_infrastructure::components::{describe_analyses, EgressPolicy, HUB_VPC_TYPE};
use hub_spoke_infrastructure::domain::{parse_cidr, validate_snapshot, ResourceKind};
use hub_spoke_infrastructure::provider::AnalysisStatus;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::net::Ipv4Addr;

#[tokio::test]
async fn test_hub_isolated_subnets_route_to_nat() {
    let (cloud, deployment) = harness();
    up(&deployment, &scenario_settings()).await.unwrap();

    let nat = named(&cloud, ResourceKind::NatGateway, "hub-nat-gateway");
    let public_1 = named(&cloud, ResourceKind::Subnet, "hub-vpc-public-1");
    assert_eq!(nat.get_str("subnet_id"), Some(public_1.id.as_str()));

    let isolated: Vec<_> = named_prefix(&cloud, ResourceKind::Subnet, "hub-vpc-inspection-")
        .into_iter()
        .chain(named_prefix(&cloud, ResourceKind::Subnet, "hub-vpc-tgw-"))
        .collect();
    assert_eq!(isolated.len(), 6);
    for subnet in isolated {
        let route = default_route(&cloud, &route_table_of(&cloud, &subnet.id));
        assert_eq!(route.get_str("nat_gateway_id"), Some(nat.id.as_str()));
    }
}

#[tokio::test]
async fn test_hub_subnets_partition_the_hub_block() {
    let (cloud, deployment) = harness();
    up(&deployment, &scenario_settings()).await.unwrap();

    let cidrs: Vec<String> = ["public", "inspection", "tgw"]
        .iter()
        .flat_map(|role| (1..=3).map(move |i| format!("hub-vpc-{role}-{i}")))
        .map(|name| {
            named(&cloud, ResourceKind::Subnet, &name)
                .get_str("cidr_block")
                .unwrap_or_default()
                .to_string()
        })
        .collect();
    assert_eq!(
        cidrs,
        vec![
            "10.129.0.0/28",
            "10.129.0.16/28",
            "10.129.0.32/28",
            "10.129.0.48/28",
            "10.129.0.64/28",
            "10.129.0.80/28",
            "10.129.0.96/28",
            "10.129.0.112/28",
            "10.129.0.128/28",
        ]
    );
}

#[tokio::test]
async fn test_spoke_transit_table_defaults_to_hub_attachment() {
    let (cloud, deployment) = harness();
    up(&deployment, &scenario_settings()).await.unwrap();

    let hub_attachment = named(&cloud, ResourceKind::TransitGatewayVpcAttachment, "hub-tgw-vpc-attachment");
    let spoke_table = named(&cloud, ResourceKind::TransitGatewayRouteTable, "spoke-tgw-route-table");
    let route = named(&cloud, ResourceKind::TransitGatewayRoute, "hub-default-spoke-to-inspection");

    assert_eq!(route.get_str("destination_cidr_block"), Some(DEFAULT_ROUTE));
    assert_eq!(route.get_str("transit_gateway_route_table_id"), Some(spoke_table.id.as_str()));
    assert_eq!(route.get_str("transit_gateway_attachment_id"), Some(hub_attachment.id.as_str()));
    assert_eq!(hub_attachment.get_str("appliance_mode_support"), Some("enable"));
}

#[tokio::test]
async fn test_spoke_workload_subnets_route_to_transit_gateway() {
    let (cloud, deployment) = harness();
    up(&deployment, &scenario_settings()).await.unwrap();

    let tgw = named(&cloud, ResourceKind::TransitGateway, "tgw");
    let workload = named_prefix(&cloud, ResourceKind::Subnet, "spoke1-vpc-private-");
    assert_eq!(workload.len(), 3);
    for subnet in workload {
        let route = default_route(&cloud, &route_table_of(&cloud, &subnet.id));
        assert_eq!(route.get_str("transit_gateway_id"), Some(tgw.id.as_str()));
        assert_eq!(route.urn.name(), format!("spoke1-tgw-route-{}", subnet.id));
    }

    // Association and propagation are separate relations into the spoke table
    let spoke_table = named(&cloud, ResourceKind::TransitGatewayRouteTable, "spoke-tgw-route-table");
    let attachment = named(&cloud, ResourceKind::TransitGatewayVpcAttachment, "spoke1-tgw-vpc-attachment");
    for (kind, name) in [
        (ResourceKind::TransitGatewayRouteTableAssociation, "spoke1-tgw-route-table-assoc"),
        (ResourceKind::TransitGatewayRouteTablePropagation, "spoke1-tgw-route-table-propagation"),
    ] {
        let relation = named(&cloud, kind, name);
        assert_eq!(relation.get_str("transit_gateway_route_table_id"), Some(spoke_table.id.as_str()));
        assert_eq!(relation.get_str("transit_gateway_attachment_id"), Some(attachment.id.as_str()));
    }
}

#[tokio::test]
async fn test_converged_snapshot_holds_every_invariant() {
    let (_cloud, deployment) = harness();
    let summary = up(&deployment, &scenario_settings()).await.unwrap();

    let violations = validate_snapshot(&summary.snapshot);
    assert!(violations.is_empty(), "{violations:?}");
    assert!(summary.snapshot.update_id.is_some());
}

#[tokio::test]
async fn test_both_analyses_find_the_hub_gateway() {
    let (cloud, deployment) = harness();
    let summary = up(&deployment, &scenario_settings()).await.unwrap();
    let igw = named(&cloud, ResourceKind::InternetGateway, "hub-vpc");

    let mut reports = describe_analyses(cloud.as_ref(), &summary.snapshot).await.unwrap();
    reports.sort_by(|a, b| a.0.cmp(&b.0));
    let names: Vec<&str> = reports.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "spoke1-verification-network-insights-analysis-http",
            "spoke1-verification-network-insights-analysis-https",
        ]
    );
    for (name, report) in &reports {
        assert_eq!(report.status, AnalysisStatus::Succeeded, "{name}");
        assert_eq!(report.network_path_found, Some(true), "{name}: {:?}", report.explanations);
        assert_eq!(report.forward_path.last(), Some(&igw.id));
    }
}

#[tokio::test]
async fn test_https_analysis_runs_on_https_path() {
    let (cloud, deployment) = harness();
    up(&deployment, &scenario_settings()).await.unwrap();

    let http_path = named(&cloud, ResourceKind::NetworkInsightsPath, "spoke1-verification-to-hub-igw-path-http");
    let https_path = named(&cloud, ResourceKind::NetworkInsightsPath, "spoke1-verification-to-hub-igw-path-https");
    let https = named(
        &cloud,
        ResourceKind::NetworkInsightsAnalysis,
        "spoke1-verification-network-insights-analysis-https",
    );
    let http = named(
        &cloud,
        ResourceKind::NetworkInsightsAnalysis,
        "spoke1-verification-network-insights-analysis-http",
    );

    assert_eq!(https.get_str("network_insights_path_id"), Some(https_path.id.as_str()));
    assert_eq!(http.get_str("network_insights_path_id"), Some(http_path.id.as_str()));
    assert_eq!(https_path.inputs.get("destination_port"), Some(&json!(443)));
    assert_eq!(http_path.inputs.get("destination_port"), Some(&json!(80)));
    assert_eq!(https.inputs.get("wait_for_completion"), Some(&json!(false)));
}

#[tokio::test]
async fn test_verification_instance_uses_latest_amazon_linux_image() {
    let (cloud, deployment) = harness();
    up(&deployment, &scenario_settings()).await.unwrap();

    let instance = named(&cloud, ResourceKind::Instance, "spoke1-verification-instance");
    let profile = named(&cloud, ResourceKind::IamInstanceProfile, "spoke1-verification-instance-profile");
    let first_workload = named(&cloud, ResourceKind::Subnet, "spoke1-vpc-private-1");

    assert_eq!(instance.get_str("ami"), Some("ami-0a1b2c3d4e5f60002"));
    assert_eq!(instance.get_str("instance_type"), Some("t3.micro"));
    assert_eq!(instance.get_str("subnet_id"), Some(first_workload.id.as_str()));
    assert_eq!(instance.get_str("iam_instance_profile"), profile.get_str("name"));
}

#[tokio::test]
async fn test_verification_instance_address_is_inside_its_subnet() {
    let (cloud, deployment) = harness();
    up(&deployment, &settings_with_spokes(&[("spoke1", SPOKE_CIDR), ("spoke2", "10.1.0.0/16")]))
        .await
        .unwrap();

    for instance in cloud.resources(ResourceKind::Instance) {
        let subnet = cloud
            .resource(instance.get_str("subnet_id").unwrap())
            .unwrap();
        let block = parse_cidr(subnet.get_str("cidr_block").unwrap()).unwrap();
        let ip: Ipv4Addr = instance.get_str("private_ip").unwrap().parse().unwrap();
        assert!(block.contains(&ip), "{ip} outside {block}");
    }
}

#[tokio::test]
async fn test_exports() {
    let (cloud, deployment) = harness();
    let summary = up(&deployment, &scenario_settings()).await.unwrap();

    let eip = named(&cloud, ResourceKind::Eip, "hub-eip");
    let spoke_vpc = named(&cloud, ResourceKind::Vpc, "spoke1-vpc");
    let hub_vpc = named(&cloud, ResourceKind::Vpc, "hub-vpc");

    assert_eq!(summary.exports["hub_eip"], eip.get_str("public_ip").map(|ip| json!(ip)));
    assert_eq!(summary.exports["spoke1_vpc_id"], Some(json!(spoke_vpc.id)));
    assert_eq!(summary.exports["hub_vpc_id"], Some(json!(hub_vpc.id)));
    assert!(!summary.exports.contains_key("firewall_policy_arn"));
    assert_eq!(summary.snapshot.exports.len(), summary.exports.len());
}

#[tokio::test]
async fn test_second_apply_is_a_no_op() {
    let (cloud, deployment) = harness();
    let settings = scenario_settings();
    let first = up(&deployment, &settings).await.unwrap();
    let resources = cloud.state().resources.len();

    let second = up(&deployment, &settings).await.unwrap();
    assert!(!second.plan.has_changes(), "{:?}", second.plan.changes().collect::<Vec<_>>());
    assert_eq!(second.plan.summary().same, first.plan.summary().create);
    assert_eq!(cloud.state().resources.len(), resources);
}

#[tokio::test]
async fn test_components_group_their_resources() {
    let (_cloud, deployment) = harness();
    let summary = up(&deployment, &scenario_settings()).await.unwrap();
    let snapshot = &summary.snapshot;

    let hub = snapshot
        .components
        .iter()
        .find(|c| c.name == "hub")
        .unwrap();
    assert_eq!(hub.type_name, HUB_VPC_TYPE);
    assert!(hub.children.iter().any(|c| c.name() == "hub-nat-gateway"));

    let probe = snapshot
        .components
        .iter()
        .find(|c| c.name == "spoke1-verification")
        .unwrap();
    let spoke = snapshot.components.iter().find(|c| c.name == "spoke1").unwrap();
    assert_eq!(probe.parent.as_ref(), Some(&spoke.urn));
}

#[tokio::test]
async fn test_restricted_egress_still_reaches_gateway() {
    let (cloud, deployment) = harness();
    let mut settings = scenario_settings();
    settings.verification_egress = EgressPolicy::Restricted;
    let summary = up(&deployment, &settings).await.unwrap();

    let reports = describe_analyses(cloud.as_ref(), &summary.snapshot).await.unwrap();
    assert_eq!(reports.len(), 2);
    assert!(reports.iter().all(|(_, r)| r.network_path_found == Some(true)));
}

#[tokio::test]
async fn test_verification_disabled_declares_no_instances_or_analyses() {
    let (cloud, deployment) = harness();
    let mut settings = scenario_settings();
    settings.verification = false;
    up(&deployment, &settings).await.unwrap();

    assert_eq!(cloud.count(ResourceKind::Instance), 0);
    assert_eq!(cloud.count(ResourceKind::NetworkInsightsPath), 0);
    assert_eq!(cloud.count(ResourceKind::NatGateway), 1);
}

#[tokio::test]
async fn test_interface_endpoints_in_workload_subnets() {
    let (cloud, deployment) = harness();
    let mut settings = scenario_settings();
    settings.vpc_endpoints = true;
    up(&deployment, &settings).await.unwrap();

    let endpoints = cloud.resources(ResourceKind::VpcEndpoint);
    let services: Vec<&str> = endpoints
        .iter()
        .filter_map(|e| e.get_str("service_name"))
        .collect();
    assert_eq!(endpoints.len(), 3);
    for service in ["ssm", "ssmmessages", "ec2messages"] {
        assert!(services.contains(&format!("com.amazonaws.us-east-1.{service}").as_str()));
    }
    let workload: Vec<String> = named_prefix(&cloud, ResourceKind::Subnet, "spoke1-vpc-private-")
        .into_iter()
        .map(|s| s.id)
        .collect();
    for endpoint in &endpoints {
        assert_eq!(endpoint.get_strs("subnet_ids"), workload);
    }
}

#[tokio::test]
async fn test_inspection_firewall_exports_policy_arn() {
    let (cloud, deployment) = harness();
    let mut settings = scenario_settings();
    settings.inspection_firewall = true;
    let summary = up(&deployment, &settings).await.unwrap();

    assert_eq!(
        summary.exports["firewall_policy_arn"],
        Some(json!(
            "arn:aws:network-firewall:us-east-1:123456789012:firewall-policy/firewall-policy"
        ))
    );
    let policy = named(&cloud, ResourceKind::FirewallPolicy, "firewall-policy");
    let group = named(&cloud, ResourceKind::FirewallRuleGroup, "allow-amazon");
    assert_eq!(
        policy.inputs.get("stateful_rule_group_references"),
        Some(&json!([{"priority": 10, "resource_arn": group.get_str("arn")}]))
    );
}
