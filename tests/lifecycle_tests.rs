// Copyright (c) 2025 - Cowboy AI, Inc.
//! Integration tests for deployment lifecycle
//!
//! These tests verify how successive runs converge the account:
//! 1. Removing a spoke deletes everything it owned, leaving no transit orphans
//! 2. Attachment replacement needs delete-before-replace, and takes the
//!    attachment's association and routes down and back up with it
//! 3. Destroy empties the account
//! 4. Preview never mutates the account
//! 5. The first provider rejection stops the run and is reported verbatim,
//!    with a per-declaration account of how far each one got

mod fixtures;

use std::sync::Arc;

use fixtures::*;
use hub_spoke_infrastructure::aws::ec2transitgateway::{
    RouteArgs, RouteTableArgs, RouteTableAssociationArgs, TransitGatewayArgs, VpcAttachmentArgs,
};
use hub_spoke_infrastructure::aws::{Tags, Toggle};
use hub_spoke_infrastructure::components::{availability_zones, Backbone, NatStrategy, Vpc, VpcArgs};
use hub_spoke_infrastructure::domain::{validate_snapshot, ResourceKind, SubnetSpec, SubnetType};
use hub_spoke_infrastructure::engine::{
    Context, FileStateStore, ResourceOptions, StateStore, StepOp,
};
use hub_spoke_infrastructure::provider::simulated::CallOp;
use hub_spoke_infrastructure::state_machine::DeclarationStatus;
use hub_spoke_infrastructure::{stack, InfrastructureError, InfrastructureResult};
use pretty_assertions::assert_eq;

// ============================================================================
// Spoke removal
// ============================================================================

#[tokio::test]
async fn test_removing_a_spoke_leaves_no_orphans() {
    let (cloud, deployment) = harness();
    up(&deployment, &settings_with_spokes(&[("spoke1", SPOKE_CIDR), ("spoke2", "10.1.0.0/16")]))
        .await
        .unwrap();
    assert_eq!(cloud.count(ResourceKind::TransitGatewayVpcAttachment), 3);
    assert_eq!(cloud.count(ResourceKind::TransitGatewayRouteTablePropagation), 2);

    let summary = up(&deployment, &settings_with_spokes(&[("spoke1", SPOKE_CIDR)]))
        .await
        .unwrap();

    let leftovers: Vec<String> = cloud
        .state()
        .resources
        .values()
        .filter(|r| r.urn.name().contains("spoke2"))
        .map(|r| r.urn.name().to_string())
        .collect();
    assert_eq!(leftovers, Vec::<String>::new());

    assert_eq!(cloud.count(ResourceKind::TransitGatewayVpcAttachment), 2);
    assert_eq!(cloud.count(ResourceKind::TransitGatewayRouteTableAssociation), 2);
    assert_eq!(cloud.count(ResourceKind::TransitGatewayRouteTablePropagation), 1);
    assert!(summary
        .plan
        .steps_named("spoke2-tgw-vpc-attachment")
        .any(|s| s.op == StepOp::Delete));
    assert!(summary.snapshot.components.iter().all(|c| c.name != "spoke2"));

    let violations = validate_snapshot(&summary.snapshot);
    assert!(violations.is_empty(), "{violations:?}");
}

#[tokio::test]
async fn test_adding_a_spoke_only_creates() {
    let (cloud, deployment) = harness();
    up(&deployment, &scenario_settings()).await.unwrap();
    let hub_attachment = named(&cloud, ResourceKind::TransitGatewayVpcAttachment, "hub-tgw-vpc-attachment");

    let summary = up(&deployment, &settings_with_spokes(&[("spoke1", SPOKE_CIDR), ("spoke2", "10.1.0.0/16")]))
        .await
        .unwrap();
    let counts = summary.plan.summary();
    assert_eq!((counts.update, counts.replace, counts.delete), (0, 0, 0));
    assert!(counts.create > 0);
    assert_eq!(
        named(&cloud, ResourceKind::TransitGatewayVpcAttachment, "hub-tgw-vpc-attachment").id,
        hub_attachment.id
    );
    assert_eq!(cloud.count(ResourceKind::Instance), 2);
}

// ============================================================================
// Attachment replacement
// ============================================================================

/// Two transit gateways and one VPC attached to the selected one
async fn attachment_program(
    ctx: Context,
    use_second_gateway: bool,
    delete_before_replace: bool,
) -> InfrastructureResult<()> {
    let first = ctx.register("tgw-a", TransitGatewayArgs::default(), ResourceOptions::new());
    let second = ctx.register("tgw-b", TransitGatewayArgs::default(), ResourceOptions::new());
    let vpc = Vpc::declare(
        &ctx,
        "workload",
        VpcArgs {
            cidr_block: SPOKE_CIDR.to_string(),
            subnet_specs: vec![SubnetSpec::new(SubnetType::Isolated, 28).named("tgw")],
            availability_zones: availability_zones("us-east-1", 2),
            nat_strategy: NatStrategy::None,
            enable_dns_hostnames: true,
            enable_dns_support: true,
        },
        None,
    )?;

    let gateway = if use_second_gateway { &second } else { &first };
    let mut options = ResourceOptions::new().depends_on(&vpc.vpc);
    if delete_before_replace {
        options = options.delete_before_replace();
    }
    ctx.register(
        "workload-attachment",
        VpcAttachmentArgs {
            transit_gateway_id: gateway.id(),
            vpc_id: vpc.vpc_id(),
            subnet_ids: vpc.subnets_ready(&["tgw"]),
            appliance_mode_support: Toggle::Disable,
            transit_gateway_default_route_table_association: false,
            transit_gateway_default_route_table_propagation: false,
            tags: Tags::new(),
        },
        options,
    );
    Ok(())
}

#[tokio::test]
async fn test_attachment_replacement_deletes_first() {
    let (cloud, deployment) = harness();
    deployment
        .up(|ctx| attachment_program(ctx, false, true))
        .await
        .unwrap();
    let summary = deployment
        .up(|ctx| attachment_program(ctx, true, true))
        .await
        .unwrap();

    let ops: Vec<StepOp> = summary
        .plan
        .steps_named("workload-attachment")
        .map(|s| s.op)
        .collect();
    assert_eq!(
        ops,
        vec![
            StepOp::DeleteReplaced,
            StepOp::Replace {
                delete_before_replace: true
            },
        ]
    );

    let second = named(&cloud, ResourceKind::TransitGateway, "tgw-b");
    let attachments = cloud.resources(ResourceKind::TransitGatewayVpcAttachment);
    assert_eq!(attachments.len(), 1);
    assert_eq!(attachments[0].get_str("transit_gateway_id"), Some(second.id.as_str()));
}

#[tokio::test]
async fn test_attachment_replacement_without_delete_first_is_rejected() {
    let (cloud, deployment) = harness();
    deployment
        .up(|ctx| attachment_program(ctx, false, false))
        .await
        .unwrap();
    let err = deployment
        .up(|ctx| attachment_program(ctx, true, false))
        .await
        .unwrap_err();

    match err {
        InfrastructureError::ProviderRejection { urn, message } => {
            assert!(urn.ends_with("workload-attachment"), "{urn}");
            assert!(message.starts_with("DuplicateTransitGatewayAttachment"), "{message}");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(cloud.count(ResourceKind::TransitGatewayVpcAttachment), 1);
}

/// A transit gateway, two VPCs and one attachment carrying an association
/// and a default route, attached to the VPC named `attached`
async fn attachment_with_dependents_program(ctx: Context, attached: &'static str) -> InfrastructureResult<()> {
    let gateway = ctx.register("tgw", TransitGatewayArgs::default(), ResourceOptions::new());
    let table = ctx.register(
        "workload-tgw-route-table",
        RouteTableArgs {
            transit_gateway_id: gateway.id(),
            tags: Tags::new(),
        },
        ResourceOptions::new(),
    );

    let mut vpcs = Vec::new();
    for (name, cidr) in [("blue", SPOKE_CIDR), ("green", "10.1.0.0/16")] {
        let vpc = Vpc::declare(
            &ctx,
            name,
            VpcArgs {
                cidr_block: cidr.to_string(),
                subnet_specs: vec![SubnetSpec::new(SubnetType::Isolated, 28).named("tgw")],
                availability_zones: availability_zones("us-east-1", 2),
                nat_strategy: NatStrategy::None,
                enable_dns_hostnames: true,
                enable_dns_support: true,
            },
            None,
        )?;
        vpcs.push(vpc);
    }
    let vpc = vpcs
        .iter()
        .find(|v| v.name() == attached)
        .expect("declared above");

    let attachment = ctx.register(
        "workload-attachment",
        VpcAttachmentArgs {
            transit_gateway_id: gateway.id(),
            vpc_id: vpc.vpc_id(),
            subnet_ids: vpc.subnets_ready(&["tgw"]),
            appliance_mode_support: Toggle::Disable,
            transit_gateway_default_route_table_association: false,
            transit_gateway_default_route_table_propagation: false,
            tags: Tags::new(),
        },
        ResourceOptions::new().depends_on(&vpc.vpc).delete_before_replace(),
    );
    ctx.register(
        "workload-association",
        RouteTableAssociationArgs {
            transit_gateway_attachment_id: attachment.id(),
            transit_gateway_route_table_id: table.id(),
        },
        ResourceOptions::new(),
    );
    ctx.register(
        "workload-default-route",
        RouteArgs {
            destination_cidr_block: DEFAULT_ROUTE.to_string(),
            transit_gateway_attachment_id: Some(attachment.id()),
            transit_gateway_route_table_id: table.id(),
        },
        ResourceOptions::new(),
    );
    Ok(())
}

#[tokio::test]
async fn test_attachment_replacement_recreates_its_dependents() {
    let (cloud, deployment) = harness();
    deployment
        .up(|ctx| attachment_with_dependents_program(ctx, "blue"))
        .await
        .unwrap();
    let summary = deployment
        .up(|ctx| attachment_with_dependents_program(ctx, "green"))
        .await
        .unwrap();

    let position = |name: &str, op: StepOp| {
        summary
            .plan
            .steps()
            .iter()
            .position(|s| s.urn.name() == name && s.op == op)
            .unwrap_or_else(|| panic!("no {op:?} step for {name}"))
    };
    let attachment_deleted = position("workload-attachment", StepOp::DeleteReplaced);
    let attachment_created = position(
        "workload-attachment",
        StepOp::Replace {
            delete_before_replace: true,
        },
    );
    for dependent in ["workload-association", "workload-default-route"] {
        assert!(position(dependent, StepOp::DeleteReplaced) < attachment_deleted);
        assert!(position(dependent, StepOp::Create) > attachment_created);
    }
    assert!(attachment_deleted < attachment_created);

    let green = named(&cloud, ResourceKind::Vpc, "green");
    let attachment = named(&cloud, ResourceKind::TransitGatewayVpcAttachment, "workload-attachment");
    assert_eq!(attachment.get_str("vpc_id"), Some(green.id.as_str()));
    assert_eq!(
        named(&cloud, ResourceKind::TransitGatewayRoute, "workload-default-route")
            .get_str("transit_gateway_attachment_id"),
        Some(attachment.id.as_str())
    );
    assert_eq!(cloud.count(ResourceKind::TransitGatewayRouteTableAssociation), 1);

    let violations = validate_snapshot(&summary.snapshot);
    assert!(violations.is_empty(), "{violations:?}");

    let settled = deployment
        .up(|ctx| attachment_with_dependents_program(ctx, "green"))
        .await
        .unwrap();
    assert!(!settled.plan.has_changes());
}

// ============================================================================
// Destroy and preview
// ============================================================================

#[tokio::test]
async fn test_destroy_empties_the_account() {
    let (cloud, deployment) = harness();
    up(&deployment, &scenario_settings()).await.unwrap();

    let summary = deployment.destroy().await.unwrap();
    assert!(cloud.state().resources.is_empty());
    assert!(summary.snapshot.resources.is_empty());
    assert!(summary.plan.steps().iter().all(|s| s.op == StepOp::Delete));
    assert!(deployment.snapshot().await.unwrap().resources.is_empty());
}

#[tokio::test]
async fn test_preview_makes_no_mutating_calls() {
    let (cloud, deployment) = harness();
    let summary = preview(&deployment, &scenario_settings()).await.unwrap();

    let mutating: Vec<_> = cloud
        .calls()
        .into_iter()
        .filter(|c| c.op != CallOp::Invoke)
        .collect();
    assert_eq!(mutating, vec![]);
    assert!(cloud.state().resources.is_empty());
    assert!(summary.plan.summary().create > 0);
    assert_eq!(summary.exports["hub_eip"], None);
    assert!(deployment.snapshot().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_preview_after_apply_reports_no_changes() {
    let (cloud, deployment) = harness();
    let settings = scenario_settings();
    up(&deployment, &settings).await.unwrap();
    cloud.clear_calls();

    let summary = preview(&deployment, &settings).await.unwrap();
    assert!(!summary.plan.has_changes());
    assert!(cloud.calls().iter().all(|c| c.op == CallOp::Invoke));
    assert!(summary.exports["hub_eip"].is_some());
}

#[tokio::test]
async fn test_preview_of_spoke_removal_plans_deletes() {
    let (cloud, deployment) = harness();
    up(&deployment, &settings_with_spokes(&[("spoke1", SPOKE_CIDR), ("spoke2", "10.1.0.0/16")]))
        .await
        .unwrap();
    let before = cloud.state().resources.len();

    let summary = preview(&deployment, &settings_with_spokes(&[("spoke1", SPOKE_CIDR)]))
        .await
        .unwrap();
    assert!(summary
        .plan
        .steps_named("spoke2-tgw-vpc-attachment")
        .any(|s| s.op == StepOp::Delete));
    assert_eq!(cloud.state().resources.len(), before);
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_provider_rejection_stops_the_run() {
    let (cloud, deployment) = harness();
    cloud.reject_next(
        ResourceKind::NatGateway,
        "NatGatewayLimitExceeded: The maximum number of NAT gateways has been reached.",
    );

    let err = up(&deployment, &scenario_settings()).await.unwrap_err();
    assert_eq!(
        err,
        InfrastructureError::rejected(
            deployment_urn("aws:ec2/natGateway:NatGateway", "hub-nat-gateway"),
            "NatGatewayLimitExceeded: The maximum number of NAT gateways has been reached.",
        )
    );

    // Nothing that consumes the NAT was attempted
    assert_eq!(cloud.count(ResourceKind::NatGateway), 0);
    assert!(cloud
        .resources(ResourceKind::Route)
        .iter()
        .all(|r| r.get_str("nat_gateway_id").is_none()));

    // What was created is remembered, and the next run converges
    let saved = deployment.snapshot().await.unwrap();
    assert!(saved.find_named(ResourceKind::Vpc, "hub-vpc").is_some());
    let summary = up(&deployment, &scenario_settings()).await.unwrap();
    assert!(validate_snapshot(&summary.snapshot).is_empty());
    assert_eq!(cloud.count(ResourceKind::Vpc), 2);
}

#[tokio::test]
async fn test_failed_run_reports_each_declaration() {
    let (cloud, deployment) = harness();
    cloud.reject_next(ResourceKind::NatGateway, "NatGatewayLimitExceeded: quota reached");
    up(&deployment, &scenario_settings()).await.unwrap_err();

    let reports = deployment.last_declarations();
    let report = |name: &str| {
        reports
            .iter()
            .find(|(urn, _)| urn.name() == name)
            .map(|(_, report)| report.clone())
            .unwrap_or_else(|| panic!("no report for {name}"))
    };

    let nat = report("hub-nat-gateway");
    assert_eq!(nat.status, DeclarationStatus::Failed);
    assert!(nat.critical);
    assert_eq!(nat.path.last(), Some(&DeclarationStatus::Failed));
    assert!(nat.path.contains(&DeclarationStatus::Applying));
    assert!(nat.warnings[0].contains("NatGatewayLimitExceeded: quota reached"), "{:?}", nat.warnings);

    let vpc = report("hub-vpc");
    assert_eq!(
        vpc.path,
        vec![
            DeclarationStatus::Resolving,
            DeclarationStatus::Ready,
            DeclarationStatus::Applying,
            DeclarationStatus::Settled,
        ]
    );

    let nat_routes: Vec<_> = reports
        .iter()
        .filter(|(urn, _)| urn.name().starts_with("hub-nat-route-"))
        .map(|(_, report)| report)
        .collect();
    assert!(!nat_routes.is_empty());
    for route in nat_routes {
        assert_eq!(route.status, DeclarationStatus::Failed);
        assert!(!route.critical);
        assert!(route.warnings[0].starts_with("Cancelled before apply"), "{:?}", route.warnings);
        assert!(!route.path.contains(&DeclarationStatus::Applying));
    }
}

#[tokio::test]
async fn test_successful_run_settles_every_declaration() {
    let (_cloud, deployment) = harness();
    let summary = up(&deployment, &scenario_settings()).await.unwrap();

    assert_eq!(summary.declarations.len(), summary.snapshot.resources.len());
    assert!(summary
        .declarations
        .values()
        .all(|r| r.status == DeclarationStatus::Settled && r.warnings.is_empty()));
    assert_eq!(deployment.last_declarations(), summary.declarations);
}

fn deployment_urn(type_token: &str, name: &str) -> String {
    format!("urn:hubspoke:{STACK}::{}::{type_token}::{name}", stack::PROJECT)
}

#[tokio::test]
async fn test_invalid_configuration_fails_before_any_call() {
    let (cloud, deployment) = harness();
    let settings = settings_with_spokes(&[("spoke1", "172.16.0.0/16")]);

    let err = up(&deployment, &settings).await.unwrap_err();
    assert!(matches!(err, InfrastructureError::Configuration(_)), "{err}");
    assert_eq!(cloud.calls(), vec![]);
}

#[tokio::test]
async fn test_duplicate_declaration_is_rejected() {
    let (_cloud, deployment) = harness();
    let err = deployment
        .up(|ctx| async move {
            Backbone::declare(&ctx, "twice");
            Backbone::declare(&ctx, "twice");
            Ok(())
        })
        .await
        .unwrap_err();
    assert!(matches!(err, InfrastructureError::DuplicateUrn(ref urn) if urn.ends_with("::tgw")), "{err}");
}

// ============================================================================
// File-backed state
// ============================================================================

#[tokio::test]
async fn test_file_state_survives_a_new_deployment_handle() {
    let dir = tempfile::tempdir().unwrap();
    let cloud = Arc::new(hub_spoke_infrastructure::SimulatedCloud::default());
    let store = Arc::new(FileStateStore::new(dir.path()));
    let first = deployment_with_store(&cloud, store.clone());
    let applied = up(&first, &scenario_settings()).await.unwrap();
    assert!(store.path_for(STACK).exists());

    let reopened = deployment_with_store(&cloud, Arc::new(FileStateStore::new(dir.path())));
    let loaded = FileStateStore::new(dir.path()).load(STACK).await.unwrap().unwrap();
    assert_eq!(loaded.resources, applied.snapshot.resources);

    let summary = up(&reopened, &scenario_settings()).await.unwrap();
    assert!(!summary.plan.has_changes());
}

#[tokio::test]
async fn test_simulated_account_round_trips_through_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cloud.json");
    let (cloud, deployment) = harness();
    up(&deployment, &scenario_settings()).await.unwrap();
    cloud.save(&path).await.unwrap();

    let reloaded = hub_spoke_infrastructure::SimulatedCloud::load(&path, "us-east-1")
        .await
        .unwrap();
    assert_eq!(reloaded.state(), cloud.state());
}
