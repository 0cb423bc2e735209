// Copyright (c) 2025 - Cowboy AI, Inc.
//! Request checks of the simulated account
//!
//! Each check returns the provider's rejection message verbatim. `replacing`
//! is the id of the resource being updated, excluded from uniqueness checks.

use serde_json::Value;

use super::CloudState;
use crate::domain::{cidrs_overlap, parse_cidr, validate_rules, ResourceKind};
use crate::engine::inputs::PropertyMap;

fn opt<'a>(inputs: &'a PropertyMap, key: &str) -> Option<&'a str> {
    inputs.get(key).and_then(Value::as_str)
}

fn req<'a>(inputs: &'a PropertyMap, key: &str) -> Result<&'a str, String> {
    opt(inputs, key)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| format!("MissingParameter: The request must contain the parameter {key}"))
}

fn strs<'a>(inputs: &'a PropertyMap, key: &str) -> Vec<&'a str> {
    inputs
        .get(key)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}

fn flag(inputs: &PropertyMap, key: &str) -> bool {
    inputs.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn cidr(value: &str) -> Result<ipnet::Ipv4Net, String> {
    parse_cidr(value).map_err(|_| format!("InvalidParameterValue: Value ({value}) for parameter cidrBlock is invalid"))
}

impl CloudState {
    fn others<'a>(
        &'a self,
        kind: ResourceKind,
        replacing: Option<&'a str>,
    ) -> impl Iterator<Item = &'a super::CloudResource> {
        self.of_kind(kind)
            .filter(move |r| Some(r.id.as_str()) != replacing)
    }

    /// Check a create (or update, with `replacing`) request
    pub(super) fn check(
        &self,
        kind: ResourceKind,
        inputs: &PropertyMap,
        replacing: Option<&str>,
    ) -> Result<(), String> {
        use ResourceKind::*;
        match kind {
            TransitGateway => {
                if let Some(asn) = inputs.get("amazon_side_asn").and_then(Value::as_u64) {
                    let private = (64512..=65534).contains(&asn)
                        || (4_200_000_000..=4_294_967_294).contains(&asn);
                    if !private {
                        return Err(format!("InvalidParameterValue: amazon-side-asn {asn} is not a private ASN"));
                    }
                }
                Ok(())
            }
            TransitGatewayRouteTable => {
                self.require(TransitGateway, req(inputs, "transit_gateway_id")?)?;
                Ok(())
            }
            TransitGatewayVpcAttachment => self.check_attachment(inputs, replacing),
            TransitGatewayRoute => self.check_transit_route(inputs, replacing),
            TransitGatewayRouteTableAssociation => {
                let (attachment, _) = self.transit_pair(inputs)?;
                if let Some(existing) = self.others(kind, replacing).find(|a| {
                    opt(&a.inputs, "transit_gateway_attachment_id") == Some(attachment)
                }) {
                    return Err(format!(
                        "Resource.AlreadyAssociated: Transit Gateway Attachment {attachment} is already associated to a route table ({}).",
                        existing.get_str("transit_gateway_route_table_id").unwrap_or_default()
                    ));
                }
                Ok(())
            }
            TransitGatewayRouteTablePropagation => {
                let (attachment, table) = self.transit_pair(inputs)?;
                let duplicate = self.others(kind, replacing).any(|p| {
                    opt(&p.inputs, "transit_gateway_attachment_id") == Some(attachment)
                        && opt(&p.inputs, "transit_gateway_route_table_id") == Some(table)
                });
                if duplicate {
                    return Err(format!(
                        "TransitGatewayRouteTablePropagation.Duplicate: {attachment} already propagates to {table}"
                    ));
                }
                Ok(())
            }
            Vpc => {
                let block = cidr(req(inputs, "cidr_block")?)?;
                if !(16..=28).contains(&block.prefix_len()) {
                    return Err(format!("InvalidVpc.Range: The CIDR '{block}' is invalid."));
                }
                Ok(())
            }
            Subnet => self.check_subnet(inputs, replacing),
            RouteTable => {
                self.require(Vpc, req(inputs, "vpc_id")?)?;
                Ok(())
            }
            RouteTableAssociation => {
                let subnet_id = req(inputs, "subnet_id")?;
                let subnet = self.require(Subnet, subnet_id)?;
                let table = self.require(RouteTable, req(inputs, "route_table_id")?)?;
                if subnet.get_str("vpc_id") != table.get_str("vpc_id") {
                    return Err(format!(
                        "InvalidParameterValue: route table {} and subnet {subnet_id} belong to different networks",
                        table.id
                    ));
                }
                if self
                    .others(kind, replacing)
                    .any(|a| opt(&a.inputs, "subnet_id") == Some(subnet_id))
                {
                    return Err(format!(
                        "Resource.AlreadyAssociated: the specified association for route table {} conflicts with an existing association",
                        table.id
                    ));
                }
                Ok(())
            }
            Route => self.check_route(inputs, replacing),
            InternetGateway => {
                let vpc = req(inputs, "vpc_id")?;
                self.require(Vpc, vpc)?;
                if let Some(igw) = self
                    .others(kind, replacing)
                    .find(|g| opt(&g.inputs, "vpc_id") == Some(vpc))
                {
                    return Err(format!(
                        "Resource.AlreadyAssociated: resource {vpc} is already attached to network gateway {}",
                        igw.id
                    ));
                }
                Ok(())
            }
            Eip => match opt(inputs, "domain") {
                None | Some("vpc") => Ok(()),
                Some(other) => Err(format!("InvalidParameterValue: Invalid value '{other}' for domain")),
            },
            NatGateway => {
                self.require(Subnet, req(inputs, "subnet_id")?)?;
                let allocation = req(inputs, "allocation_id")?;
                self.require(Eip, allocation)?;
                if self
                    .others(kind, replacing)
                    .any(|n| opt(&n.inputs, "allocation_id") == Some(allocation))
                {
                    return Err(format!(
                        "Resource.AlreadyAssociated: Elastic IP address [{allocation}] is already associated"
                    ));
                }
                Ok(())
            }
            VpcEndpoint => self.check_endpoint(inputs),
            SecurityGroup => self.check_security_group(inputs),
            FirewallRuleGroup => self.check_rule_group(inputs, replacing),
            FirewallPolicy => self.check_firewall_policy(inputs, replacing),
            IamRole => {
                let document = req(inputs, "assume_role_policy")?;
                serde_json::from_str::<Value>(document).map_err(|e| {
                    format!("MalformedPolicyDocument: Syntax errors in policy. {e}")
                })?;
                self.unique_name(kind, inputs, replacing)
            }
            IamRolePolicyAttachment => {
                self.require_named(IamRole, req(inputs, "role")?)?;
                let policy = req(inputs, "policy_arn")?;
                if !policy.starts_with("arn:aws:iam::") {
                    return Err(format!("InvalidInput: ARN {policy} is not valid."));
                }
                Ok(())
            }
            IamInstanceProfile => {
                self.require_named(IamRole, req(inputs, "role")?)?;
                self.unique_name(kind, inputs, replacing)
            }
            Instance => self.check_instance(inputs),
            NetworkInsightsPath => {
                let source = req(inputs, "source")?;
                let destination = req(inputs, "destination")?;
                for id in [source, destination] {
                    if self.get(id).is_none() {
                        return Err(format!(
                            "InvalidParameterValue: The resource {id} does not exist"
                        ));
                    }
                }
                match opt(inputs, "protocol") {
                    Some("tcp") | Some("udp") => {}
                    other => {
                        return Err(format!(
                            "InvalidParameterValue: Unsupported protocol {}",
                            other.unwrap_or_default()
                        ))
                    }
                }
                match inputs.get("destination_port").and_then(Value::as_u64) {
                    None => Ok(()),
                    Some(port) if port <= u16::MAX as u64 => Ok(()),
                    Some(port) => Err(format!("InvalidParameterValue: Invalid port {port}")),
                }
            }
            NetworkInsightsAnalysis => {
                self.require(NetworkInsightsPath, req(inputs, "network_insights_path_id")?)?;
                Ok(())
            }
        }
    }

    fn unique_name(
        &self,
        kind: ResourceKind,
        inputs: &PropertyMap,
        replacing: Option<&str>,
    ) -> Result<(), String> {
        match opt(inputs, "name") {
            Some(name) if self.others(kind, replacing).any(|r| r.get_str("name") == Some(name)) => {
                Err(format!("EntityAlreadyExists: {} with name {name} already exists.", kind.short_name()))
            }
            _ => Ok(()),
        }
    }

    fn transit_pair<'a>(&self, inputs: &'a PropertyMap) -> Result<(&'a str, &'a str), String> {
        let attachment_id = req(inputs, "transit_gateway_attachment_id")?;
        let table_id = req(inputs, "transit_gateway_route_table_id")?;
        let attachment = self.require(ResourceKind::TransitGatewayVpcAttachment, attachment_id)?;
        let table = self.require(ResourceKind::TransitGatewayRouteTable, table_id)?;
        if attachment.get_str("transit_gateway_id") != table.get_str("transit_gateway_id") {
            return Err(format!(
                "InvalidParameterValue: {attachment_id} and {table_id} belong to different transit gateways"
            ));
        }
        Ok((attachment_id, table_id))
    }

    fn check_attachment(&self, inputs: &PropertyMap, replacing: Option<&str>) -> Result<(), String> {
        let tgw = req(inputs, "transit_gateway_id")?;
        self.require(ResourceKind::TransitGateway, tgw)?;
        let vpc = req(inputs, "vpc_id")?;
        self.require(ResourceKind::Vpc, vpc)?;

        let subnet_ids = strs(inputs, "subnet_ids");
        if subnet_ids.is_empty() {
            return Err("MissingParameter: The request must contain the parameter SubnetIds".to_string());
        }
        let mut zones = Vec::new();
        for id in subnet_ids {
            let subnet = self.require(ResourceKind::Subnet, id)?;
            if subnet.get_str("vpc_id") != Some(vpc) {
                return Err(format!("InvalidParameterValue: Subnet {id} does not belong to {vpc}"));
            }
            let zone = subnet.get_str("availability_zone").unwrap_or_default();
            if zones.contains(&zone) {
                return Err(format!(
                    "DuplicateSubnetsInSameZone: Duplicate Subnets for same AvailabilityZone {zone}"
                ));
            }
            zones.push(zone);
        }

        if let Some(existing) = self
            .others(ResourceKind::TransitGatewayVpcAttachment, replacing)
            .find(|a| opt(&a.inputs, "vpc_id") == Some(vpc))
        {
            return Err(format!(
                "DuplicateTransitGatewayAttachment: {} has non-deleted Transit Gateway Attachments with same VPC ID.",
                existing.get_str("transit_gateway_id").unwrap_or(tgw)
            ));
        }
        Ok(())
    }

    fn check_transit_route(&self, inputs: &PropertyMap, replacing: Option<&str>) -> Result<(), String> {
        let table_id = req(inputs, "transit_gateway_route_table_id")?;
        let table = self.require(ResourceKind::TransitGatewayRouteTable, table_id)?;
        let destination = cidr(req(inputs, "destination_cidr_block")?)?;

        if !flag(inputs, "blackhole") {
            let attachment_id = req(inputs, "transit_gateway_attachment_id")?;
            let attachment = self.require(ResourceKind::TransitGatewayVpcAttachment, attachment_id)?;
            if attachment.get_str("transit_gateway_id") != table.get_str("transit_gateway_id") {
                return Err(format!(
                    "InvalidParameterValue: {attachment_id} is not attached to the transit gateway of {table_id}"
                ));
            }
        }

        let duplicate = self
            .others(ResourceKind::TransitGatewayRoute, replacing)
            .filter(|r| opt(&r.inputs, "transit_gateway_route_table_id") == Some(table_id))
            .any(|r| opt(&r.inputs, "destination_cidr_block").and_then(|d| parse_cidr(d).ok()) == Some(destination));
        if duplicate {
            return Err(format!(
                "RouteAlreadyExists: Route {destination} already exists in Transit Gateway Route Table {table_id}."
            ));
        }
        Ok(())
    }

    fn check_subnet(&self, inputs: &PropertyMap, replacing: Option<&str>) -> Result<(), String> {
        let vpc_id = req(inputs, "vpc_id")?;
        let vpc = self.require(ResourceKind::Vpc, vpc_id)?;
        let block = cidr(req(inputs, "cidr_block")?)?;
        let vpc_block = cidr(vpc.get_str("cidr_block").unwrap_or_default())?;
        if !vpc_block.contains(&block) {
            return Err(format!("InvalidSubnet.Range: The CIDR '{block}' is invalid."));
        }

        let zone = req(inputs, "availability_zone")?;
        if !zone.starts_with(&self.region) {
            return Err(format!(
                "InvalidParameterValue: Value ({zone}) for parameter availabilityZone is invalid. Subnets can currently only be created in {}",
                self.region
            ));
        }

        let conflict = self
            .others(ResourceKind::Subnet, replacing)
            .filter(|s| opt(&s.inputs, "vpc_id") == Some(vpc_id))
            .filter_map(|s| opt(&s.inputs, "cidr_block").and_then(|c| parse_cidr(c).ok()))
            .any(|other| cidrs_overlap(&other, &block));
        if conflict {
            return Err(format!("InvalidSubnet.Conflict: The CIDR '{block}' conflicts with another subnet"));
        }
        Ok(())
    }

    fn check_route(&self, inputs: &PropertyMap, replacing: Option<&str>) -> Result<(), String> {
        let table_id = req(inputs, "route_table_id")?;
        let table = self.require(ResourceKind::RouteTable, table_id)?;
        let vpc = table.get_str("vpc_id").unwrap_or_default();
        let destination = cidr(req(inputs, "destination_cidr_block")?)?;

        let targets: Vec<(&str, &str)> = ["gateway_id", "nat_gateway_id", "transit_gateway_id"]
            .into_iter()
            .filter_map(|key| opt(inputs, key).map(|v| (key, v)))
            .collect();
        let [(key, target)] = targets[..] else {
            return Err("InvalidParameterCombination: exactly one route target must be specified".to_string());
        };

        match key {
            "gateway_id" => {
                let igw = self.require(ResourceKind::InternetGateway, target)?;
                if igw.get_str("vpc_id") != Some(vpc) {
                    return Err(format!(
                        "InvalidParameterValue: route table {table_id} and network gateway {target} belong to different networks"
                    ));
                }
            }
            "nat_gateway_id" => {
                let nat = self.require(ResourceKind::NatGateway, target)?;
                let nat_vpc = nat
                    .get_str("subnet_id")
                    .and_then(|s| self.get(s))
                    .and_then(|s| s.get_str("vpc_id"));
                if nat_vpc != Some(vpc) {
                    return Err(format!(
                        "InvalidParameterValue: route table {table_id} and NAT gateway {target} belong to different networks"
                    ));
                }
            }
            _ => {
                self.require(ResourceKind::TransitGateway, target)?;
                let attached = self.of_kind(ResourceKind::TransitGatewayVpcAttachment).any(|a| {
                    a.get_str("transit_gateway_id") == Some(target) && a.get_str("vpc_id") == Some(vpc)
                });
                if !attached {
                    return Err(format!(
                        "InvalidTransitGatewayID.NotFound: The transitGateway ID '{target}' does not exist in {vpc}."
                    ));
                }
            }
        }

        let duplicate = self
            .others(ResourceKind::Route, replacing)
            .filter(|r| opt(&r.inputs, "route_table_id") == Some(table_id))
            .any(|r| opt(&r.inputs, "destination_cidr_block").and_then(|d| parse_cidr(d).ok()) == Some(destination));
        if duplicate {
            return Err(format!(
                "RouteAlreadyExists: The route identified by {destination} already exists."
            ));
        }
        Ok(())
    }

    fn check_security_group(&self, inputs: &PropertyMap) -> Result<(), String> {
        self.require(ResourceKind::Vpc, req(inputs, "vpc_id")?)?;
        req(inputs, "description")?;

        let rules = ["ingress", "egress"]
            .into_iter()
            .filter_map(|key| inputs.get(key).and_then(Value::as_array))
            .flatten();
        for rule in rules {
            let protocol = rule.get("protocol").and_then(Value::as_str).unwrap_or_default();
            if !["-1", "tcp", "udp", "icmp"].contains(&protocol) {
                return Err(format!("InvalidParameterValue: Invalid value '{protocol}' for IP protocol."));
            }
            let from = rule.get("from_port").and_then(Value::as_u64).unwrap_or(0);
            let to = rule.get("to_port").and_then(Value::as_u64).unwrap_or(0);
            if from > to {
                return Err(format!("InvalidParameterValue: Invalid port range {from}-{to}"));
            }
            for block in rule
                .get("cidr_blocks")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
                .filter_map(Value::as_str)
            {
                cidr(block)?;
            }
        }
        Ok(())
    }

    fn check_endpoint(&self, inputs: &PropertyMap) -> Result<(), String> {
        let vpc = req(inputs, "vpc_id")?;
        self.require(ResourceKind::Vpc, vpc)?;
        let service = req(inputs, "service_name")?;
        let prefix = format!("com.amazonaws.{}.", self.region);
        let known = service
            .strip_prefix(&prefix)
            .is_some_and(|svc| !svc.is_empty() && !svc.contains('.'));
        if !known {
            return Err(format!(
                "InvalidServiceName: The Vpc Endpoint Service '{service}' does not exist"
            ));
        }
        for id in strs(inputs, "subnet_ids") {
            let subnet = self.require(ResourceKind::Subnet, id)?;
            if subnet.get_str("vpc_id") != Some(vpc) {
                return Err(format!("InvalidParameter: Subnet {id} does not belong to {vpc}"));
            }
        }
        for id in strs(inputs, "security_group_ids") {
            self.require(ResourceKind::SecurityGroup, id)?;
        }
        Ok(())
    }

    fn check_instance(&self, inputs: &PropertyMap) -> Result<(), String> {
        let ami = req(inputs, "ami")?;
        if !self.images.iter().any(|img| img.id == ami) {
            return Err(format!("InvalidAMIID.NotFound: The image id '[{ami}]' does not exist"));
        }
        req(inputs, "instance_type")?;
        let subnet_id = req(inputs, "subnet_id")?;
        let subnet = self.require(ResourceKind::Subnet, subnet_id)?;
        for sg_id in strs(inputs, "vpc_security_group_ids") {
            let sg = self.require(ResourceKind::SecurityGroup, sg_id)?;
            if sg.get_str("vpc_id") != subnet.get_str("vpc_id") {
                return Err(format!(
                    "InvalidParameter: Security group {sg_id} and subnet {subnet_id} belong to different networks."
                ));
            }
        }
        if let Some(profile) = opt(inputs, "iam_instance_profile") {
            self.require_named(ResourceKind::IamInstanceProfile, profile)
                .map_err(|_| {
                    format!(
                        "InvalidParameterValue: Value ({profile}) for parameter iamInstanceProfile.name is invalid. Invalid IAM Instance Profile name"
                    )
                })?;
        }
        Ok(())
    }

    fn check_rule_group(&self, inputs: &PropertyMap, replacing: Option<&str>) -> Result<(), String> {
        req(inputs, "name")?;
        let capacity = inputs.get("capacity").and_then(Value::as_u64).unwrap_or(0);
        if !(1..=30_000).contains(&capacity) {
            return Err(format!("InvalidRequestException: capacity {capacity} is out of range"));
        }
        match opt(inputs, "type") {
            Some("STATEFUL") => {
                validate_rules(req(inputs, "rules_string")?)
                    .map_err(|e| format!("InvalidRequestException: {e}"))?;
            }
            Some("STATELESS") => {}
            other => {
                return Err(format!(
                    "InvalidRequestException: unknown rule group type {}",
                    other.unwrap_or_default()
                ))
            }
        }
        self.unique_name(ResourceKind::FirewallRuleGroup, inputs, replacing)
    }

    fn check_firewall_policy(&self, inputs: &PropertyMap, replacing: Option<&str>) -> Result<(), String> {
        req(inputs, "name")?;
        for key in ["stateless_default_actions", "stateless_fragment_default_actions"] {
            if strs(inputs, key).is_empty() {
                return Err(format!("InvalidRequestException: {key} must not be empty"));
            }
        }
        let references = inputs
            .get("stateful_rule_group_references")
            .and_then(Value::as_array)
            .into_iter()
            .flatten();
        for reference in references {
            let arn = reference
                .get("resource_arn")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let exists = self
                .of_kind(ResourceKind::FirewallRuleGroup)
                .any(|g| g.get_str("arn") == Some(arn));
            if !exists {
                return Err(format!(
                    "InvalidRequestException: rule group {arn} does not exist"
                ));
            }
        }
        self.unique_name(ResourceKind::FirewallPolicy, inputs, replacing)
    }
}
