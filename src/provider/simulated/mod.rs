// Copyright (c) 2025 - Cowboy AI, Inc.
//! Simulated Cloud Account
//!
//! An in-process provider that keeps a deterministic model of one account
//! and enforces the constraints the hub-and-spoke topology relies on:
//! address-space containment, one transit attachment per VPC, one
//! association per attachment, referential integrity on create and delete.
//! Reachability analyses are evaluated against the modelled routing state.
//!
//! The model can be persisted to a JSON file so that separate CLI runs see
//! the same account.

mod reachability;
mod validation;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::path::Path;
use tracing::{debug, info, warn};

use super::{AnalysisReport, AnalysisStatus, Lookup, LookupFilter, Provider, ProviderResource};
use crate::domain::{parse_cidr, ResourceKind, Urn};
use crate::engine::inputs::PropertyMap;
use crate::errors::{InfrastructureError, InfrastructureResult};

/// Leading addresses of a subnet the provider keeps for itself
const RESERVED_HOSTS: u64 = 4;

/// Account id reported in ARNs and owner fields
pub const ACCOUNT_ID: &str = "123456789012";

/// One modelled resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudResource {
    pub id: String,
    pub kind: ResourceKind,
    pub urn: Urn,
    /// Inputs as last applied
    pub inputs: PropertyMap,
    /// Attributes the provider computed
    pub computed: PropertyMap,
}

impl CloudResource {
    /// Inputs overlaid with computed attributes
    pub fn outputs(&self) -> PropertyMap {
        let mut outputs = self.inputs.clone();
        outputs.extend(self.computed.clone());
        outputs
    }

    /// String property (computed first)
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.computed
            .get(key)
            .or_else(|| self.inputs.get(key))
            .and_then(Value::as_str)
    }

    /// String-array input
    pub fn get_strs(&self, key: &str) -> Vec<&str> {
        self.inputs
            .get(key)
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Whether any input mentions `needle`
    fn mentions(&self, needle: &str) -> bool {
        self.inputs.values().any(|v| value_mentions(v, needle))
    }
}

fn value_mentions(value: &Value, needle: &str) -> bool {
    match value {
        Value::String(s) => s == needle,
        Value::Array(items) => items.iter().any(|v| value_mentions(v, needle)),
        Value::Object(map) => map.values().any(|v| value_mentions(v, needle)),
        _ => false,
    }
}

/// Catalog entry for image lookups
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineImage {
    pub id: String,
    pub name: String,
    /// Owning account id
    pub owner: String,
    /// `amazon`, `aws-marketplace`, ...
    #[serde(default)]
    pub owner_alias: Option<String>,
    pub architecture: String,
    pub creation_date: DateTime<Utc>,
}

/// Persisted account model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CloudState {
    pub region: String,
    pub next_serial: u64,
    pub resources: BTreeMap<String, CloudResource>,
    pub images: Vec<MachineImage>,
}

impl CloudState {
    fn new(region: &str) -> Self {
        Self {
            region: region.to_string(),
            next_serial: 1,
            resources: BTreeMap::new(),
            images: default_images(),
        }
    }

    pub(crate) fn get(&self, id: &str) -> Option<&CloudResource> {
        self.resources.get(id)
    }

    pub(crate) fn of_kind(&self, kind: ResourceKind) -> impl Iterator<Item = &CloudResource> {
        self.resources.values().filter(move |r| r.kind == kind)
    }

    /// Resource of `kind` by id, or the provider's not-found message
    pub(crate) fn require(&self, kind: ResourceKind, id: &str) -> Result<&CloudResource, String> {
        self.get(id)
            .filter(|r| r.kind == kind)
            .ok_or_else(|| not_found(kind, id))
    }

    /// Resource of `kind` by its `name` attribute
    pub(crate) fn require_named(
        &self,
        kind: ResourceKind,
        name: &str,
    ) -> Result<&CloudResource, String> {
        self.of_kind(kind)
            .find(|r| r.get_str("name") == Some(name))
            .ok_or_else(|| not_found(kind, name))
    }

    /// Route table associated with a subnet
    pub(crate) fn route_table_for_subnet(&self, subnet_id: &str) -> Option<&CloudResource> {
        self.of_kind(ResourceKind::RouteTableAssociation)
            .find(|a| a.get_str("subnet_id") == Some(subnet_id))
            .and_then(|a| a.get_str("route_table_id"))
            .and_then(|rt| self.get(rt))
    }

    fn arn(&self, kind: ResourceKind, id: &str, name: Option<&str>) -> Option<String> {
        let region = &self.region;
        let arn = match kind {
            ResourceKind::TransitGateway => {
                format!("arn:aws:ec2:{region}:{ACCOUNT_ID}:transit-gateway/{id}")
            }
            ResourceKind::TransitGatewayVpcAttachment => {
                format!("arn:aws:ec2:{region}:{ACCOUNT_ID}:transit-gateway-attachment/{id}")
            }
            ResourceKind::NetworkInsightsPath => {
                format!("arn:aws:ec2:{region}:{ACCOUNT_ID}:network-insights-path/{id}")
            }
            ResourceKind::NetworkInsightsAnalysis => {
                format!("arn:aws:ec2:{region}:{ACCOUNT_ID}:network-insights-analysis/{id}")
            }
            ResourceKind::FirewallRuleGroup => format!(
                "arn:aws:network-firewall:{region}:{ACCOUNT_ID}:stateful-rulegroup/{}",
                name.unwrap_or(id)
            ),
            ResourceKind::FirewallPolicy => format!(
                "arn:aws:network-firewall:{region}:{ACCOUNT_ID}:firewall-policy/{}",
                name.unwrap_or(id)
            ),
            ResourceKind::IamRole => format!("arn:aws:iam::{ACCOUNT_ID}:role/{}", name.unwrap_or(id)),
            ResourceKind::IamInstanceProfile => {
                format!("arn:aws:iam::{ACCOUNT_ID}:instance-profile/{}", name.unwrap_or(id))
            }
            _ => return None,
        };
        Some(arn)
    }

    /// Attributes the provider computes on create
    fn compute(
        &self,
        kind: ResourceKind,
        urn: &Urn,
        id: &str,
        serial: u64,
        inputs: &PropertyMap,
    ) -> PropertyMap {
        let mut computed = PropertyMap::new();
        computed.insert("id".to_string(), json!(id));

        // Autonamed kinds
        let name = match kind {
            ResourceKind::IamRole
            | ResourceKind::IamInstanceProfile
            | ResourceKind::SecurityGroup
            | ResourceKind::FirewallRuleGroup
            | ResourceKind::FirewallPolicy => Some(
                inputs
                    .get("name")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("{}-{:07x}", urn.name(), serial)),
            ),
            _ => None,
        };
        if let Some(arn) = self.arn(kind, id, name.as_deref()) {
            computed.insert("arn".to_string(), json!(arn));
        }
        if let Some(name) = name {
            computed.insert("name".to_string(), json!(name));
        }

        match kind {
            ResourceKind::Vpc | ResourceKind::TransitGateway | ResourceKind::TransitGatewayVpcAttachment => {
                computed.insert("owner_id".to_string(), json!(ACCOUNT_ID));
            }
            ResourceKind::Eip => {
                computed.insert("allocation_id".to_string(), json!(id));
                computed.insert(
                    "public_ip".to_string(),
                    json!(format!("52.94.{}.{}", (serial >> 8) & 0xff, serial & 0xff)),
                );
            }
            ResourceKind::NatGateway => {
                let public_ip = inputs
                    .get("allocation_id")
                    .and_then(Value::as_str)
                    .and_then(|a| self.get(a))
                    .and_then(|eip| eip.get_str("public_ip"))
                    .map(str::to_string);
                if let Some(ip) = public_ip {
                    computed.insert("public_ip".to_string(), json!(ip));
                }
                if let Some(ip) = self.host_in_subnet(inputs, 0) {
                    computed.insert("private_ip".to_string(), json!(ip.to_string()));
                }
            }
            ResourceKind::Instance => {
                if let Some(ip) = self.host_in_subnet(inputs, serial) {
                    computed.insert("private_ip".to_string(), json!(ip.to_string()));
                }
                computed.insert("instance_state".to_string(), json!("running"));
            }
            ResourceKind::NetworkInsightsAnalysis => {
                computed.insert("status".to_string(), json!(AnalysisStatus::Running));
                computed.insert("start_date".to_string(), json!(Utc::now()));
            }
            _ => {}
        }
        computed
    }

    /// A usable host address of the request's subnet, picked by `seed`
    ///
    /// The first four addresses and the broadcast address of every subnet are
    /// reserved.
    fn host_in_subnet(&self, inputs: &PropertyMap, seed: u64) -> Option<Ipv4Addr> {
        let subnet = inputs
            .get("subnet_id")
            .and_then(Value::as_str)
            .and_then(|s| self.get(s))?;
        let cidr = parse_cidr(subnet.get_str("cidr_block")?).ok()?;
        let size = 1u64 << (32 - cidr.prefix_len());
        let usable = size.checked_sub(RESERVED_HOSTS + 1).filter(|n| *n > 0)?;
        let offset = RESERVED_HOSTS + seed % usable;
        Some(Ipv4Addr::from(u32::from(cidr.network()) + offset as u32))
    }

    fn lookup(&self, lookup: &Lookup) -> Result<Value, String> {
        match lookup {
            Lookup::Ami {
                most_recent,
                owners,
                filters,
            } => {
                let image = self.find_image(*most_recent, owners, filters)?;
                Ok(json!({
                    "id": image.id,
                    "name": image.name,
                    "owner_id": image.owner,
                    "image_owner_alias": image.owner_alias,
                    "architecture": image.architecture,
                    "creation_date": image.creation_date,
                }))
            }
            Lookup::RouteTable { subnet_id } => {
                let table = self.route_table_for_subnet(subnet_id).ok_or_else(|| {
                    format!("NotFound: no route table is associated with subnet {subnet_id}")
                })?;
                let routes: Vec<Value> = self
                    .of_kind(ResourceKind::Route)
                    .filter(|r| r.get_str("route_table_id") == Some(table.id.as_str()))
                    .map(|r| Value::Object(r.outputs()))
                    .collect();
                Ok(json!({
                    "id": table.id,
                    "route_table_id": table.id,
                    "vpc_id": table.get_str("vpc_id"),
                    "routes": routes,
                }))
            }
            Lookup::NetworkInsightsAnalysis { id } => {
                let report = self.describe_analysis(id)?;
                serde_json::to_value(report).map_err(|e| e.to_string())
            }
        }
    }

    fn find_image(
        &self,
        most_recent: bool,
        owners: &[String],
        filters: &[LookupFilter],
    ) -> Result<&MachineImage, String> {
        let mut patterns = Vec::new();
        for filter in filters {
            for value in &filter.values {
                patterns.push((filter.name.as_str(), glob_regex(value)?));
            }
        }

        let mut candidates = Vec::new();
        for img in self.images.iter().filter(|img| img.is_owned_by(owners)) {
            let mut matches = true;
            for (name, pattern) in &patterns {
                let field = match *name {
                    "name" => Some(img.name.as_str()),
                    "architecture" => Some(img.architecture.as_str()),
                    "owner-alias" => img.owner_alias.as_deref(),
                    "owner-id" => Some(img.owner.as_str()),
                    other => {
                        return Err(format!(
                            "InvalidParameterValue: The filter '{other}' is invalid"
                        ))
                    }
                };
                matches &= field.is_some_and(|f| pattern.is_match(f));
            }
            if matches {
                candidates.push(img);
            }
        }

        if candidates.len() > 1 && !most_recent {
            return Err(
                "Your query returned more than one result. Please try a more specific search criteria, or set `most_recent` attribute to true."
                    .to_string(),
            );
        }
        candidates.sort_by_key(|img| img.creation_date);
        candidates
            .pop()
            .ok_or_else(|| "Your query returned no results. Please change your search criteria and try again.".to_string())
    }

    /// Current report of an analysis
    pub(crate) fn describe_analysis(&self, id: &str) -> Result<AnalysisReport, String> {
        let analysis = self.require(ResourceKind::NetworkInsightsAnalysis, id)?;
        let path_id = analysis
            .get_str("network_insights_path_id")
            .unwrap_or_default()
            .to_string();
        let path = self.require(ResourceKind::NetworkInsightsPath, &path_id)?;
        let outcome = reachability::evaluate(self, path);

        Ok(AnalysisReport {
            id: id.to_string(),
            network_insights_path_id: path_id,
            status: AnalysisStatus::Succeeded,
            network_path_found: Some(outcome.found),
            forward_path: outcome.hops,
            explanations: outcome.explanations,
        })
    }
}

/// Provider not-found message for a kind
fn not_found(kind: ResourceKind, id: &str) -> String {
    let code = match kind {
        ResourceKind::Vpc => "InvalidVpcID.NotFound",
        ResourceKind::Subnet => "InvalidSubnetID.NotFound",
        ResourceKind::RouteTable => "InvalidRouteTableID.NotFound",
        ResourceKind::InternetGateway => "InvalidInternetGatewayID.NotFound",
        ResourceKind::NatGateway => "NatGatewayNotFound",
        ResourceKind::Eip => "InvalidAllocationID.NotFound",
        ResourceKind::SecurityGroup => "InvalidGroup.NotFound",
        ResourceKind::TransitGateway => "InvalidTransitGatewayID.NotFound",
        ResourceKind::TransitGatewayRouteTable => "InvalidRouteTableID.NotFound",
        ResourceKind::TransitGatewayVpcAttachment => "InvalidTransitGatewayAttachmentID.NotFound",
        ResourceKind::IamRole | ResourceKind::IamInstanceProfile => "NoSuchEntity",
        ResourceKind::NetworkInsightsPath => "InvalidNetworkInsightsPathId.NotFound",
        ResourceKind::NetworkInsightsAnalysis => "InvalidNetworkInsightsAnalysisId.NotFound",
        ResourceKind::FirewallRuleGroup | ResourceKind::FirewallPolicy => "ResourceNotFoundException",
        _ => "InvalidParameterValue",
    };
    format!("{code}: The {} '{id}' does not exist", kind.short_name())
}

/// Translate a `*`/`?` glob into an anchored regex
fn glob_regex(glob: &str) -> Result<Regex, String> {
    let mut pattern = String::from("^");
    for ch in glob.chars() {
        match ch {
            '*' => pattern.push_str(".*"),
            '?' => pattern.push('.'),
            c => pattern.push_str(&regex::escape(&c.to_string())),
        }
    }
    pattern.push('$');
    Regex::new(&pattern).map_err(|e| format!("InvalidParameterValue: {e}"))
}

impl MachineImage {
    /// Whether `owners` (account ids or aliases) admits this image
    fn is_owned_by(&self, owners: &[String]) -> bool {
        owners.is_empty()
            || owners
                .iter()
                .any(|o| o == &self.owner || Some(o.as_str()) == self.owner_alias.as_deref())
    }
}

fn image(id: &str, name: &str, owner: &str, year: i32, month: u32, day: u32) -> MachineImage {
    let (owner, owner_alias) = match owner {
        "amazon" => (AMAZON_OWNER_ID, Some("amazon".to_string())),
        account => (account, None),
    };
    MachineImage {
        id: id.to_string(),
        name: name.to_string(),
        owner: owner.to_string(),
        owner_alias,
        architecture: "x86_64".to_string(),
        creation_date: Utc
            .with_ymd_and_hms(year, month, day, 0, 0, 0)
            .single()
            .unwrap_or_default(),
    }
}

/// Account publishing the Amazon Linux images
const AMAZON_OWNER_ID: &str = "137112412989";

fn default_images() -> Vec<MachineImage> {
    vec![
        image("ami-0a1b2c3d4e5f60001", "amzn2-ami-hvm-2.0.20240916.0-x86_64-gp2", "amazon", 2024, 9, 16),
        image("ami-0a1b2c3d4e5f60002", "amzn2-ami-hvm-2.0.20241001.0-x86_64-gp2", "amazon", 2024, 10, 1),
        image("ami-0a1b2c3d4e5f60003", "amzn2-ami-hvm-2.0.20241001.0-arm64-gp2", "amazon", 2024, 10, 2),
        image("ami-0a1b2c3d4e5f60004", "ubuntu/images/hvm-ssd/ubuntu-jammy-22.04-amd64-server-20241002", "099720109477", 2024, 10, 2),
    ]
}

/// Operation recorded by the simulated account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallOp {
    Create,
    Update,
    Delete,
    Invoke,
}

/// One recorded provider call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderCall {
    pub op: CallOp,
    pub kind: Option<ResourceKind>,
    /// URN for resource calls, function token for lookups
    pub target: String,
}

/// In-process simulated account
#[derive(Debug)]
pub struct SimulatedCloud {
    state: Mutex<CloudState>,
    calls: Mutex<Vec<ProviderCall>>,
    injected: Mutex<Vec<(ResourceKind, String)>>,
}

impl Default for SimulatedCloud {
    fn default() -> Self {
        Self::new("us-east-1")
    }
}

impl SimulatedCloud {
    /// Empty account in `region` with the default image catalog
    pub fn new(region: &str) -> Self {
        Self::from_state(CloudState::new(region))
    }

    pub fn from_state(state: CloudState) -> Self {
        Self {
            state: Mutex::new(state),
            calls: Mutex::new(Vec::new()),
            injected: Mutex::new(Vec::new()),
        }
    }

    /// Load the account from `path`, or start empty if the file is absent
    pub async fn load(path: &Path, region: &str) -> InfrastructureResult<Self> {
        match tokio::fs::read(path).await {
            Ok(bytes) => {
                let state: CloudState = serde_json::from_slice(&bytes).map_err(|e| {
                    InfrastructureError::Deserialization(format!("{}: {e}", path.display()))
                })?;
                debug!(path = %path.display(), resources = state.resources.len(), "loaded simulated account");
                Ok(Self::from_state(state))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::new(region)),
            Err(e) => Err(e.into()),
        }
    }

    /// Persist the account to `path`
    pub async fn save(&self, path: &Path) -> InfrastructureResult<()> {
        let bytes = serde_json::to_vec_pretty(&*self.state.lock())?;
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await?;
        }
        tokio::fs::write(path, bytes).await?;
        Ok(())
    }

    pub fn region(&self) -> String {
        self.state.lock().region.clone()
    }

    /// Copy of the account model
    pub fn state(&self) -> CloudState {
        self.state.lock().clone()
    }

    pub fn resource(&self, id: &str) -> Option<CloudResource> {
        self.state.lock().get(id).cloned()
    }

    /// Resources of one kind, ordered by id
    pub fn resources(&self, kind: ResourceKind) -> Vec<CloudResource> {
        self.state.lock().of_kind(kind).cloned().collect()
    }

    pub fn count(&self, kind: ResourceKind) -> usize {
        self.state.lock().of_kind(kind).count()
    }

    /// Resource by declared name
    pub fn find_named(&self, kind: ResourceKind, name: &str) -> Option<CloudResource> {
        self.state
            .lock()
            .of_kind(kind)
            .find(|r| r.urn.name() == name)
            .cloned()
    }

    /// Calls received so far
    pub fn calls(&self) -> Vec<ProviderCall> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// Reject the next create of `kind` with `message`
    pub fn reject_next(&self, kind: ResourceKind, message: &str) {
        self.injected.lock().push((kind, message.to_string()));
    }

    /// Evaluate a reachability analysis
    pub fn describe_analysis(&self, id: &str) -> InfrastructureResult<AnalysisReport> {
        self.state
            .lock()
            .describe_analysis(id)
            .map_err(|message| InfrastructureError::rejected(id, message))
    }

    fn record(&self, op: CallOp, kind: Option<ResourceKind>, target: &str) {
        self.calls.lock().push(ProviderCall {
            op,
            kind,
            target: target.to_string(),
        });
    }

    fn take_injected(&self, kind: ResourceKind) -> Option<String> {
        let mut injected = self.injected.lock();
        let position = injected.iter().position(|(k, _)| *k == kind)?;
        Some(injected.remove(position).1)
    }
}

#[async_trait]
impl Provider for SimulatedCloud {
    async fn create(
        &self,
        kind: ResourceKind,
        urn: &Urn,
        inputs: &PropertyMap,
    ) -> InfrastructureResult<ProviderResource> {
        self.record(CallOp::Create, Some(kind), urn.as_str());
        if let Some(message) = self.take_injected(kind) {
            return Err(InfrastructureError::rejected(urn, message));
        }

        let mut state = self.state.lock();
        state
            .check(kind, inputs, None)
            .map_err(|message| InfrastructureError::rejected(urn, message))?;

        let serial = state.next_serial;
        state.next_serial += 1;
        let id = format!("{}-{:017x}", kind.id_prefix(), serial);
        let mut computed = state.compute(kind, urn, &id, serial, inputs);
        if kind == ResourceKind::NetworkInsightsAnalysis
            && inputs.get("wait_for_completion").and_then(Value::as_bool) == Some(true)
        {
            if let Some(path) = inputs
                .get("network_insights_path_id")
                .and_then(Value::as_str)
                .and_then(|p| state.get(p))
            {
                let outcome = reachability::evaluate(&state, path);
                computed.insert("status".to_string(), json!(AnalysisStatus::Succeeded));
                computed.insert("path_found".to_string(), json!(outcome.found));
            }
        }

        let resource = CloudResource {
            id: id.clone(),
            kind,
            urn: urn.clone(),
            inputs: inputs.clone(),
            computed,
        };
        let outputs = resource.outputs();
        state.resources.insert(id.clone(), resource);
        info!(urn = %urn, id = %id, "created");

        Ok(ProviderResource { id, outputs })
    }

    async fn update(
        &self,
        kind: ResourceKind,
        urn: &Urn,
        id: &str,
        inputs: &PropertyMap,
    ) -> InfrastructureResult<PropertyMap> {
        self.record(CallOp::Update, Some(kind), urn.as_str());
        let mut state = self.state.lock();
        state
            .require(kind, id)
            .map_err(|message| InfrastructureError::rejected(urn, message))?;
        state
            .check(kind, inputs, Some(id))
            .map_err(|message| InfrastructureError::rejected(urn, message))?;

        let resource = state
            .resources
            .get_mut(id)
            .ok_or_else(|| InfrastructureError::rejected(urn, not_found(kind, id)))?;
        resource.inputs = inputs.clone();
        info!(urn = %urn, id = %id, "updated");
        Ok(resource.outputs())
    }

    async fn delete(&self, kind: ResourceKind, urn: &Urn, id: &str) -> InfrastructureResult<()> {
        self.record(CallOp::Delete, Some(kind), urn.as_str());
        let mut state = self.state.lock();
        let Some(resource) = state.get(id) else {
            warn!(urn = %urn, id = %id, "already gone");
            return Ok(());
        };

        let mut needles = vec![resource.id.clone()];
        needles.extend(resource.get_str("arn").map(str::to_string));
        if matches!(kind, ResourceKind::IamRole | ResourceKind::IamInstanceProfile) {
            needles.extend(resource.get_str("name").map(str::to_string));
        }
        let dependent = state
            .resources
            .values()
            .filter(|r| r.id != id)
            .find(|r| needles.iter().any(|n| r.mentions(n)));
        if let Some(dependent) = dependent {
            return Err(InfrastructureError::rejected(
                urn,
                format!(
                    "DependencyViolation: resource {id} has a dependent object ({})",
                    dependent.id
                ),
            ));
        }

        state.resources.remove(id);
        info!(urn = %urn, id = %id, "deleted");
        Ok(())
    }

    async fn invoke(&self, lookup: &Lookup) -> InfrastructureResult<Value> {
        self.record(CallOp::Invoke, None, lookup.function());
        self.state
            .lock()
            .lookup(lookup)
            .map_err(|message| InfrastructureError::rejected(lookup.function(), message))
    }

    fn name(&self) -> &str {
        "simulated"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urn(kind: ResourceKind, name: &str) -> Urn {
        Urn::new("dev", "hub", kind.type_token(), name)
    }

    fn props(value: Value) -> PropertyMap {
        match value {
            Value::Object(m) => m,
            _ => PropertyMap::new(),
        }
    }

    async fn create(cloud: &SimulatedCloud, kind: ResourceKind, name: &str, inputs: Value) -> InfrastructureResult<String> {
        cloud
            .create(kind, &urn(kind, name), &props(inputs))
            .await
            .map(|r| r.id)
    }

    #[tokio::test]
    async fn test_ids_are_deterministic() {
        let cloud = SimulatedCloud::default();
        let id = create(&cloud, ResourceKind::Vpc, "hub", json!({"cidr_block": "10.129.0.0/24"}))
            .await
            .unwrap();
        assert_eq!(id, "vpc-00000000000000001");
    }

    #[tokio::test]
    async fn test_subnet_containment_and_overlap() {
        let cloud = SimulatedCloud::default();
        let vpc = create(&cloud, ResourceKind::Vpc, "hub", json!({"cidr_block": "10.129.0.0/24"}))
            .await
            .unwrap();
        let subnet = |cidr: &str| {
            json!({"vpc_id": vpc, "cidr_block": cidr, "availability_zone": "us-east-1a"})
        };

        create(&cloud, ResourceKind::Subnet, "a", subnet("10.129.0.0/28")).await.unwrap();
        let outside = create(&cloud, ResourceKind::Subnet, "b", subnet("10.130.0.0/28")).await;
        assert!(matches!(outside, Err(InfrastructureError::ProviderRejection { message, .. }) if message.starts_with("InvalidSubnet.Range")));
        let overlap = create(&cloud, ResourceKind::Subnet, "c", subnet("10.129.0.0/27")).await;
        assert!(matches!(overlap, Err(InfrastructureError::ProviderRejection { message, .. }) if message.starts_with("InvalidSubnet.Conflict")));
    }

    #[tokio::test]
    async fn test_delete_with_dependent_is_rejected() {
        let cloud = SimulatedCloud::default();
        let vpc = create(&cloud, ResourceKind::Vpc, "hub", json!({"cidr_block": "10.129.0.0/24"}))
            .await
            .unwrap();
        create(&cloud, ResourceKind::RouteTable, "rt", json!({"vpc_id": vpc}))
            .await
            .unwrap();

        let err = cloud
            .delete(ResourceKind::Vpc, &urn(ResourceKind::Vpc, "hub"), &vpc)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("DependencyViolation"));
    }

    #[tokio::test]
    async fn test_ami_lookup_picks_most_recent_match() {
        let cloud = SimulatedCloud::default();
        let image = cloud
            .invoke(&Lookup::Ami {
                most_recent: true,
                owners: vec!["amazon".to_string()],
                filters: vec![LookupFilter::new("name", &["amzn2-ami-hvm-*-x86_64-gp2"])],
            })
            .await
            .unwrap();
        assert_eq!(image["id"], json!("ami-0a1b2c3d4e5f60002"));
    }

    #[tokio::test]
    async fn test_instances_get_addresses_inside_their_subnet() {
        let cloud = SimulatedCloud::default();
        let vpc = create(&cloud, ResourceKind::Vpc, "spoke1", json!({"cidr_block": "10.0.0.0/16"}))
            .await
            .unwrap();
        let subnet = create(
            &cloud,
            ResourceKind::Subnet,
            "spoke1-private-1",
            json!({"vpc_id": vpc, "cidr_block": "10.0.0.0/28", "availability_zone": "us-east-1a"}),
        )
        .await
        .unwrap();
        let block = parse_cidr("10.0.0.0/28").unwrap();

        for n in 0..20 {
            let id = create(
                &cloud,
                ResourceKind::Instance,
                &format!("instance-{n}"),
                json!({"ami": "ami-0a1b2c3d4e5f60002", "instance_type": "t3.micro", "subnet_id": subnet}),
            )
            .await
            .unwrap();
            let ip: Ipv4Addr = cloud
                .resource(&id)
                .and_then(|r| r.get_str("private_ip").map(str::to_string))
                .unwrap()
                .parse()
                .unwrap();
            let host = u32::from(ip) - u32::from(block.network());
            assert!(block.contains(&ip), "{ip} outside {block}");
            assert!((4..15).contains(&host), "{ip} is a reserved address");
        }
    }

    #[tokio::test]
    async fn test_ami_lookup_honours_owner_alias() {
        let cloud = SimulatedCloud::default();
        let lookup = |alias: &str| Lookup::Ami {
            most_recent: true,
            owners: Vec::new(),
            filters: vec![
                LookupFilter::new("name", &["*"]),
                LookupFilter::new("owner-alias", &[alias]),
            ],
        };

        let image = cloud.invoke(&lookup("amazon")).await.unwrap();
        assert_eq!(image["id"], json!("ami-0a1b2c3d4e5f60003"));
        assert_eq!(image["owner_id"], json!(AMAZON_OWNER_ID));

        let err = cloud.invoke(&lookup("aws-marketplace")).await.unwrap_err();
        assert!(err.to_string().contains("returned no results"), "{err}");
    }

    #[tokio::test]
    async fn test_unknown_image_filter_is_rejected() {
        let cloud = SimulatedCloud::default();
        let err = cloud
            .invoke(&Lookup::Ami {
                most_recent: true,
                owners: vec!["amazon".to_string()],
                filters: vec![LookupFilter::new("virtualisation", &["hvm"])],
            })
            .await
            .unwrap_err();
        assert!(
            matches!(err, InfrastructureError::ProviderRejection { ref message, .. } if message.starts_with("InvalidParameterValue")),
            "{err}"
        );
    }

    #[tokio::test]
    async fn test_injected_rejection_is_verbatim() {
        let cloud = SimulatedCloud::default();
        cloud.reject_next(ResourceKind::Eip, "AddressLimitExceeded: The maximum number of addresses has been reached.");
        let err = create(&cloud, ResourceKind::Eip, "hub-eip", json!({"domain": "vpc"}))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            InfrastructureError::rejected(
                urn(ResourceKind::Eip, "hub-eip"),
                "AddressLimitExceeded: The maximum number of addresses has been reached."
            )
        );
    }

    #[tokio::test]
    async fn test_persistence_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cloud.json");
        let cloud = SimulatedCloud::default();
        create(&cloud, ResourceKind::Eip, "hub-eip", json!({"domain": "vpc"}))
            .await
            .unwrap();
        cloud.save(&path).await.unwrap();

        let reloaded = SimulatedCloud::load(&path, "us-east-1").await.unwrap();
        assert_eq!(reloaded.state(), cloud.state());
    }

    #[tokio::test]
    async fn test_account_region_is_fixed_at_creation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cloud.json");

        let fresh = SimulatedCloud::load(&path, "eu-west-1").await.unwrap();
        assert_eq!(fresh.region(), "eu-west-1");
        fresh.save(&path).await.unwrap();

        let reloaded = SimulatedCloud::load(&path, "us-east-1").await.unwrap();
        assert_eq!(reloaded.region(), "eu-west-1");
    }
}
