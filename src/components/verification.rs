// Copyright (c) 2025 - Cowboy AI, Inc.
//! Spoke verification probe
//!
//! A small instance in a spoke workload subnet plus Network Insights paths
//! from it to the hub internet gateway. The HTTP and HTTPS analyses each run
//! against their own path.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::SPOKE_VERIFICATION_TYPE;
use crate::aws::ec2::{
    get_ami, AmiQuery, InstanceArgs, NetworkInsightsAnalysisArgs, NetworkInsightsPathArgs,
    SecurityGroupArgs, SecurityGroupRule,
};
use crate::aws::iam::{InstanceProfileArgs, RoleArgs, RolePolicyAttachmentArgs, SSM_MANAGED_INSTANCE_CORE};
use crate::aws::{name_tag, Tags};
use crate::domain::{ResourceKind, Urn};
use crate::engine::{ComponentHandle, Context, HasUrn, Resource, ResourceOptions, Snapshot};
use crate::errors::InfrastructureResult;
use crate::output::{all, Output};
use crate::provider::{AnalysisReport, Lookup, Provider};

pub const INSTANCE_TYPE: &str = "t3.micro";
pub const HTTP_PORT: u16 = 80;
pub const HTTPS_PORT: u16 = 443;

/// Egress allowed to the probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EgressPolicy {
    /// HTTP and HTTPS only
    Restricted,
    /// Everything
    #[default]
    Permissive,
}

impl EgressPolicy {
    fn rules(&self) -> Vec<SecurityGroupRule> {
        match self {
            EgressPolicy::Restricted => vec![
                SecurityGroupRule::tcp(HTTP_PORT, "Allow outbound HTTP to any destination"),
                SecurityGroupRule::tcp(HTTPS_PORT, "Allow outbound HTTPS to any destination"),
            ],
            EgressPolicy::Permissive => vec![SecurityGroupRule::allow_all()],
        }
    }
}

#[derive(Debug, Clone)]
pub struct SpokeVerificationArgs {
    pub spoke_vpc_id: Output<String>,
    pub instance_subnet_id: Output<String>,
    pub hub_igw_id: Output<String>,
    pub egress: EgressPolicy,
    /// Attach an instance profile with Systems Manager access
    pub ssm_access: bool,
}

/// A declared probe
#[derive(Debug, Clone)]
pub struct SpokeVerification {
    component: ComponentHandle,
    pub security_group: Resource,
    pub instance_profile: Option<Resource>,
    pub instance: Resource,
    pub http_path: Resource,
    pub https_path: Resource,
    /// Hub gateway back to the instance; no analysis runs on it
    pub reverse_http_path: Resource,
    pub http_analysis: Resource,
    pub https_analysis: Resource,
}

impl SpokeVerification {
    pub fn declare(
        ctx: &Context,
        name: &str,
        args: SpokeVerificationArgs,
        parent: Option<&Urn>,
    ) -> InfrastructureResult<Self> {
        let component = ctx.component(SPOKE_VERIFICATION_TYPE, name, parent)?;
        let child = || ResourceOptions::new().parent(&component);

        let security_group = ctx.register(
            &format!("{name}-instance-sg"),
            SecurityGroupArgs {
                vpc_id: args.spoke_vpc_id.clone(),
                description: "Allow outbound HTTP/S to any destination".to_string(),
                ingress: Vec::new(),
                egress: args.egress.rules(),
                tags: Tags::new(),
            },
            child(),
        );

        let instance_profile = args.ssm_access.then(|| {
            let role = ctx.register(
                &format!("{name}-instance-role"),
                RoleArgs::for_service("ec2.amazonaws.com"),
                child(),
            );
            ctx.register(
                &format!("{name}-role-policy-attachment"),
                RolePolicyAttachmentArgs {
                    role: role.output_string("name"),
                    policy_arn: SSM_MANAGED_INSTANCE_CORE.to_string(),
                },
                ResourceOptions::new().parent(&role),
            );
            ctx.register(
                &format!("{name}-instance-profile"),
                InstanceProfileArgs {
                    role: role.output_string("name"),
                },
                ResourceOptions::new().parent(&role),
            )
        });

        let instance = ctx.register(
            &format!("{name}-instance"),
            InstanceArgs {
                ami: get_ami(ctx, AmiQuery::amazon_linux_2()),
                instance_type: INSTANCE_TYPE.to_string(),
                subnet_id: args.instance_subnet_id.clone(),
                vpc_security_group_ids: all(vec![security_group.id()]),
                iam_instance_profile: instance_profile.as_ref().map(|p| p.output_string("name")),
                tags: name_tag(&format!("{name}-instance")),
            },
            child(),
        );

        let path = |path_name: String, source: Output<String>, destination: Output<String>, port: u16| {
            ctx.register(
                &path_name,
                NetworkInsightsPathArgs {
                    source,
                    destination,
                    protocol: "tcp".to_string(),
                    destination_port: Some(port),
                    tags: name_tag(&path_name),
                },
                child(),
            )
        };
        let http_path = path(
            format!("{name}-to-hub-igw-path-http"),
            instance.id(),
            args.hub_igw_id.clone(),
            HTTP_PORT,
        );
        let https_path = path(
            format!("{name}-to-hub-igw-path-https"),
            instance.id(),
            args.hub_igw_id.clone(),
            HTTPS_PORT,
        );
        let reverse_http_path = path(
            format!("hub-igw-to-{name}-path-http"),
            args.hub_igw_id.clone(),
            instance.id(),
            HTTP_PORT,
        );

        let analysis = |analysis_name: String, path: &Resource| {
            ctx.register(
                &analysis_name,
                NetworkInsightsAnalysisArgs {
                    network_insights_path_id: path.id(),
                    wait_for_completion: false,
                },
                child().depends_on(&instance),
            )
        };
        let http_analysis = analysis(format!("{name}-network-insights-analysis-http"), &http_path);
        let https_analysis = analysis(format!("{name}-network-insights-analysis-https"), &https_path);
        debug!(probe = name, "verification declared");

        Ok(Self {
            component,
            security_group,
            instance_profile,
            instance,
            http_path,
            https_path,
            reverse_http_path,
            http_analysis,
            https_analysis,
        })
    }

    pub fn name(&self) -> &str {
        self.component.name()
    }
}

impl HasUrn for SpokeVerification {
    fn urn(&self) -> &Urn {
        self.component.urn()
    }
}

/// Current report of every analysis in `snapshot`, keyed by declared name
pub async fn describe_analyses(
    provider: &dyn Provider,
    snapshot: &Snapshot,
) -> InfrastructureResult<Vec<(String, AnalysisReport)>> {
    let mut reports = Vec::new();
    for analysis in snapshot.by_kind(ResourceKind::NetworkInsightsAnalysis) {
        let value = provider
            .invoke(&Lookup::NetworkInsightsAnalysis {
                id: analysis.id.clone(),
            })
            .await?;
        let report: AnalysisReport = serde_json::from_value(value)?;
        reports.push((analysis.urn.name().to_string(), report));
    }
    Ok(reports)
}
