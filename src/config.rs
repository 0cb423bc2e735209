// Copyright (c) 2025 - Cowboy AI, Inc.
//! Stack Configuration
//!
//! A stack file (`Stack.<stack>.yaml`) holds namespaced keys under `config:`:
//!
//! ```yaml
//! config:
//!   hub-spoke:hub-and-spoke-supernet: 10.0.0.0/8
//!   hub-spoke:spokes:
//!     - name: spoke1
//!       cidr: 10.0.0.0/16
//! ```
//!
//! Any key can be overridden from the environment with
//! `HUBSPOKE_CONFIG_<KEY>`, the key upper-cased with `-` as `_`. Override
//! values are parsed as YAML, so lists and booleans work too.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

use crate::components::{availability_zones, EgressPolicy, HubVpc, SpokeVpc};
use crate::domain::{cidrs_overlap, parse_cidr, partition_vpc};
use crate::errors::{InfrastructureError, InfrastructureResult};

/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "HUBSPOKE_CONFIG_";

/// Raw stack file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StackConfig {
    #[serde(skip)]
    project: String,
    #[serde(default)]
    config: BTreeMap<String, serde_yaml::Value>,
    #[serde(skip)]
    overrides: BTreeMap<String, String>,
}

impl StackConfig {
    /// Empty configuration for `project`
    pub fn new(project: &str) -> Self {
        Self {
            project: project.to_string(),
            ..Default::default()
        }
    }

    /// Parse a stack file
    pub fn from_yaml(project: &str, text: &str) -> InfrastructureResult<Self> {
        let mut config: StackConfig = if text.trim().is_empty() {
            StackConfig::default()
        } else {
            serde_yaml::from_str(text)?
        };
        config.project = project.to_string();
        Ok(config)
    }

    /// Read a stack file and apply environment overrides
    pub async fn load(project: &str, path: &Path) -> InfrastructureResult<Self> {
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            InfrastructureError::Configuration(format!("{}: {e}", path.display()))
        })?;
        let config = Self::from_yaml(project, &text)?.with_overrides(std::env::vars());
        debug!(path = %path.display(), keys = config.config.len(), "stack configuration loaded");
        Ok(config)
    }

    /// Apply `HUBSPOKE_CONFIG_*` pairs from `vars`
    pub fn with_overrides(mut self, vars: impl IntoIterator<Item = (String, String)>) -> Self {
        self.overrides.extend(
            vars.into_iter()
                .filter_map(|(k, v)| k.strip_prefix(ENV_PREFIX).map(|key| (key.to_string(), v))),
        );
        self
    }

    /// Set a key in the stack file
    pub fn set(&mut self, key: &str, value: impl Serialize) -> InfrastructureResult<()> {
        let value = serde_yaml::to_value(value)?;
        self.config.insert(self.namespaced(key), value);
        Ok(())
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    fn namespaced(&self, key: &str) -> String {
        if key.contains(':') {
            key.to_string()
        } else {
            format!("{}:{key}", self.project)
        }
    }

    fn env_key(key: &str) -> String {
        key.to_uppercase().replace('-', "_")
    }

    fn raw(&self, key: &str) -> InfrastructureResult<Option<serde_yaml::Value>> {
        if let Some(text) = self.overrides.get(&Self::env_key(key)) {
            let value = serde_yaml::from_str(text).map_err(|e| {
                InfrastructureError::Configuration(format!("{ENV_PREFIX}{}: {e}", Self::env_key(key)))
            })?;
            return Ok(Some(value));
        }
        Ok(self.config.get(&self.namespaced(key)).cloned())
    }

    /// Optional key
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> InfrastructureResult<Option<T>> {
        self.raw(key)?
            .map(|value| {
                serde_yaml::from_value(value).map_err(|e| {
                    InfrastructureError::Configuration(format!("{}: {e}", self.namespaced(key)))
                })
            })
            .transpose()
    }

    /// Optional key with a default
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> InfrastructureResult<T> {
        Ok(self.get(key)?.unwrap_or(default))
    }

    /// Required key
    pub fn require<T: DeserializeOwned>(&self, key: &str) -> InfrastructureResult<T> {
        self.get(key)?.ok_or_else(|| {
            InfrastructureError::Configuration(format!(
                "Missing required configuration variable '{}'",
                self.namespaced(key)
            ))
        })
    }
}

/// One spoke of the topology
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpokeSettings {
    pub name: String,
    pub cidr: String,
}

impl SpokeSettings {
    pub fn new(name: &str, cidr: &str) -> Self {
        Self {
            name: name.to_string(),
            cidr: cidr.to_string(),
        }
    }
}

/// Typed view of the stack configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubAndSpokeSettings {
    /// Aggregate of every spoke block
    pub supernet: String,
    pub hub_vpc_cidr: String,
    pub spokes: Vec<SpokeSettings>,
    pub availability_zones: usize,
    pub region: String,
    /// Declare a verification probe in every spoke
    pub verification: bool,
    pub verification_egress: EgressPolicy,
    pub ssm_access: bool,
    pub vpc_endpoints: bool,
    pub inspection_firewall: bool,
}

impl HubAndSpokeSettings {
    pub const DEFAULT_HUB_VPC_CIDR: &'static str = "10.129.0.0/24";
    pub const DEFAULT_REGION: &'static str = "us-east-1";
    pub const DEFAULT_AVAILABILITY_ZONES: usize = 3;
    pub const MAX_AVAILABILITY_ZONES: usize = 6;

    /// Defaults around a supernet
    pub fn new(supernet: &str) -> Self {
        Self {
            supernet: supernet.to_string(),
            hub_vpc_cidr: Self::DEFAULT_HUB_VPC_CIDR.to_string(),
            spokes: vec![SpokeSettings::new("spoke1", "10.0.0.0/16")],
            availability_zones: Self::DEFAULT_AVAILABILITY_ZONES,
            region: Self::DEFAULT_REGION.to_string(),
            verification: true,
            verification_egress: EgressPolicy::Permissive,
            ssm_access: true,
            vpc_endpoints: false,
            inspection_firewall: false,
        }
    }

    /// Read and validate the typed settings
    pub fn from_config(config: &StackConfig) -> InfrastructureResult<Self> {
        let defaults = Self::new(&config.require::<String>("hub-and-spoke-supernet")?);
        let settings = Self {
            hub_vpc_cidr: config.get_or("hub-vpc-cidr", defaults.hub_vpc_cidr.clone())?,
            spokes: config.get_or("spokes", defaults.spokes.clone())?,
            availability_zones: config.get_or("availability-zones", defaults.availability_zones)?,
            region: config.get_or("region", defaults.region.clone())?,
            verification: config.get_or("verification", defaults.verification)?,
            verification_egress: config.get_or("verification-egress", defaults.verification_egress)?,
            ssm_access: config.get_or("ssm-access", defaults.ssm_access)?,
            vpc_endpoints: config.get_or("vpc-endpoints", defaults.vpc_endpoints)?,
            inspection_firewall: config.get_or("inspection-firewall", defaults.inspection_firewall)?,
            supernet: defaults.supernet,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Availability zones every VPC spans
    pub fn zones(&self) -> Vec<String> {
        availability_zones(&self.region, self.availability_zones)
    }

    /// Check the settings before anything is declared
    pub fn validate(&self) -> InfrastructureResult<()> {
        let invalid = |msg: String| Err(InfrastructureError::Configuration(msg));

        if !(1..=Self::MAX_AVAILABILITY_ZONES).contains(&self.availability_zones) {
            return invalid(format!(
                "availability-zones must be between 1 and {}, got {}",
                Self::MAX_AVAILABILITY_ZONES,
                self.availability_zones
            ));
        }
        if self.region.is_empty() {
            return invalid("region must not be empty".to_string());
        }

        let supernet = parse_cidr(&self.supernet)?;
        let hub = parse_cidr(&self.hub_vpc_cidr)?;
        let zones = self.zones();
        partition_vpc(&hub, &HubVpc::subnet_specs(), &zones)?;

        let mut blocks = vec![("hub".to_string(), hub)];
        for spoke in &self.spokes {
            if spoke.name.is_empty() {
                return invalid("spoke name must not be empty".to_string());
            }
            if blocks.iter().any(|(name, _)| name == &spoke.name) {
                return invalid(format!("duplicate spoke name {}", spoke.name));
            }
            let block = parse_cidr(&spoke.cidr)?;
            if !supernet.contains(&block) {
                return invalid(format!(
                    "spoke {} block {block} is outside the supernet {supernet}",
                    spoke.name
                ));
            }
            if let Some((other, _)) = blocks.iter().find(|(_, b)| cidrs_overlap(b, &block)) {
                return invalid(format!("spoke {} block {block} overlaps {other}", spoke.name));
            }
            partition_vpc(&block, &SpokeVpc::subnet_specs(), &zones)?;
            blocks.push((spoke.name.clone(), block));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    const PROJECT: &str = "hub-spoke";

    fn config(yaml: &str) -> StackConfig {
        StackConfig::from_yaml(PROJECT, yaml).unwrap()
    }

    #[test]
    fn test_defaults_from_minimal_stack() {
        let settings = HubAndSpokeSettings::from_config(&config(
            "config:\n  hub-spoke:hub-and-spoke-supernet: 10.0.0.0/8\n",
        ))
        .unwrap();
        assert_eq!(settings, HubAndSpokeSettings::new("10.0.0.0/8"));
        assert_eq!(settings.zones(), vec!["us-east-1a", "us-east-1b", "us-east-1c"]);
    }

    #[test]
    fn test_region_from_stack_file() {
        let settings = HubAndSpokeSettings::from_config(&config(
            "config:\n  hub-spoke:hub-and-spoke-supernet: 10.0.0.0/8\n  hub-spoke:region: eu-west-1\n",
        ))
        .unwrap();
        assert_eq!(settings.region, "eu-west-1");
        assert_eq!(settings.zones(), vec!["eu-west-1a", "eu-west-1b", "eu-west-1c"]);
    }

    #[test]
    fn test_missing_supernet_is_fatal() {
        let err = HubAndSpokeSettings::from_config(&config("config: {}\n")).unwrap_err();
        assert_eq!(
            err,
            InfrastructureError::Configuration(
                "Missing required configuration variable 'hub-spoke:hub-and-spoke-supernet'"
                    .to_string()
            )
        );
    }

    #[test]
    fn test_environment_override_wins() {
        let stack = config("config:\n  hub-spoke:hub-and-spoke-supernet: 10.0.0.0/8\n  hub-spoke:verification: true\n")
            .with_overrides([
                ("HUBSPOKE_CONFIG_VERIFICATION".to_string(), "false".to_string()),
                ("UNRELATED".to_string(), "x".to_string()),
            ]);
        let settings = HubAndSpokeSettings::from_config(&stack).unwrap();
        assert!(!settings.verification);
    }

    #[test]
    fn test_spoke_list_from_yaml() {
        let stack = config(concat!(
            "config:\n",
            "  hub-spoke:hub-and-spoke-supernet: 10.0.0.0/8\n",
            "  hub-spoke:spokes:\n",
            "    - name: a\n      cidr: 10.1.0.0/16\n",
            "    - name: b\n      cidr: 10.2.0.0/16\n",
        ));
        let settings = HubAndSpokeSettings::from_config(&stack).unwrap();
        assert_eq!(
            settings.spokes,
            vec![SpokeSettings::new("a", "10.1.0.0/16"), SpokeSettings::new("b", "10.2.0.0/16")]
        );
    }

    #[test_case("10.0.0.0/8", &[("a", "172.16.0.0/16")] ; "spoke outside supernet")]
    #[test_case("10.0.0.0/8", &[("a", "10.1.0.0/16"), ("a", "10.2.0.0/16")] ; "duplicate name")]
    #[test_case("10.0.0.0/8", &[("a", "10.1.0.0/16"), ("b", "10.1.128.0/17")] ; "overlapping spokes")]
    #[test_case("10.0.0.0/8", &[("a", "10.129.0.0/16")] ; "spoke overlaps hub")]
    #[test_case("10.0.0.0/33", &[("a", "10.1.0.0/16")] ; "malformed supernet")]
    fn test_invalid_spokes(supernet: &str, spokes: &[(&str, &str)]) {
        let mut settings = HubAndSpokeSettings::new(supernet);
        settings.spokes = spokes.iter().map(|(n, c)| SpokeSettings::new(n, c)).collect();
        assert!(settings.validate().is_err());
    }

    #[test_case(0 ; "no zones")]
    #[test_case(7 ; "too many zones")]
    fn test_zone_count_bounds(zones: usize) {
        let mut settings = HubAndSpokeSettings::new("10.0.0.0/8");
        settings.availability_zones = zones;
        assert!(matches!(settings.validate(), Err(InfrastructureError::Configuration(_))));
    }

    #[test]
    fn test_hub_too_small_for_zones() {
        let mut settings = HubAndSpokeSettings::new("10.0.0.0/8");
        settings.hub_vpc_cidr = "10.129.0.0/26".to_string();
        assert!(matches!(settings.validate(), Err(InfrastructureError::Network(_))));
    }

    #[test]
    fn test_set_namespaces_keys() {
        let mut stack = StackConfig::new(PROJECT);
        stack.set("region", "eu-west-1").unwrap();
        assert_eq!(stack.require::<String>("region").unwrap(), "eu-west-1");
        assert_eq!(stack.require::<String>("hub-spoke:region").unwrap(), "eu-west-1");
    }
}
