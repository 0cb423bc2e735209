// Copyright (c) 2025 - Cowboy AI, Inc.
//! IAM resources

use serde_json::json;

use super::Tags;
use crate::domain::ResourceKind;
use crate::engine::{Inputs, ResourceArgs};
use crate::output::Output;

/// Managed policy granting Systems Manager access to an instance
pub const SSM_MANAGED_INSTANCE_CORE: &str = "arn:aws:iam::aws:policy/AmazonSSMManagedInstanceCore";

#[derive(Debug, Clone)]
pub struct RoleArgs {
    /// Trust policy document (JSON text)
    pub assume_role_policy: String,
    /// Explicit name; the provider generates one when unset
    pub name: Option<String>,
    pub tags: Tags,
}

impl RoleArgs {
    /// Role assumable by an AWS service principal
    pub fn for_service(service: &str) -> Self {
        let document = json!({
            "Version": "2012-10-17",
            "Statement": {
                "Effect": "Allow",
                "Principal": { "Service": service },
                "Action": "sts:AssumeRole",
            },
        });
        Self {
            assume_role_policy: document.to_string(),
            name: None,
            tags: Tags::new(),
        }
    }
}

impl ResourceArgs for RoleArgs {
    const KIND: ResourceKind = ResourceKind::IamRole;

    fn into_inputs(self) -> Inputs {
        let inputs = Inputs::new()
            .set("assume_role_policy", self.assume_role_policy)
            .set("tags", self.tags);
        match self.name {
            Some(name) => inputs.set("name", name),
            None => inputs,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RolePolicyAttachmentArgs {
    /// Role name
    pub role: Output<String>,
    pub policy_arn: String,
}

impl ResourceArgs for RolePolicyAttachmentArgs {
    const KIND: ResourceKind = ResourceKind::IamRolePolicyAttachment;

    fn into_inputs(self) -> Inputs {
        Inputs::new()
            .output("role", &self.role)
            .set("policy_arn", self.policy_arn)
    }
}

#[derive(Debug, Clone)]
pub struct InstanceProfileArgs {
    /// Role name
    pub role: Output<String>,
}

impl ResourceArgs for InstanceProfileArgs {
    const KIND: ResourceKind = ResourceKind::IamInstanceProfile;

    fn into_inputs(self) -> Inputs {
        Inputs::new().output("role", &self.role)
    }
}
