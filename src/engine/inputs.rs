// Copyright (c) 2025 - Cowboy AI, Inc.
//! Declaration inputs and options

use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use crate::domain::{ResourceKind, Urn};
use crate::engine::resource::{HasUrn, Resource};
use crate::errors::InfrastructureResult;
use crate::output::{Output, Resolved};

/// Resource properties as the provider sees them
pub type PropertyMap = serde_json::Map<String, Value>;

/// Typed arguments of one resource kind
///
/// Implementations erase their fields into an [`Inputs`] map; fields that
/// come from other resources stay asynchronous until the engine resolves
/// them.
pub trait ResourceArgs: Send + 'static {
    /// Kind declared by these arguments
    const KIND: ResourceKind;

    /// Erase the typed fields
    fn into_inputs(self) -> Inputs;
}

/// Property name → asynchronous JSON value
#[derive(Debug, Clone, Default)]
pub struct Inputs {
    entries: BTreeMap<String, Output<Value>>,
}

impl Inputs {
    /// Empty input map
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a known property
    pub fn set(mut self, key: &str, value: impl Serialize) -> Self {
        let output = match serde_json::to_value(value) {
            Ok(v) => Output::known(v),
            Err(e) => Output::failed(e.into()),
        };
        self.entries.insert(key.to_string(), output);
        self
    }

    /// Set a property produced by another resource
    pub fn output<T>(mut self, key: &str, value: &Output<T>) -> Self
    where
        T: Serialize + Clone + Send + Sync + 'static,
    {
        self.entries.insert(key.to_string(), value.to_json());
        self
    }

    /// Set a property only when present
    pub fn optional_output<T>(self, key: &str, value: &Option<Output<T>>) -> Self
    where
        T: Serialize + Clone + Send + Sync + 'static,
    {
        match value {
            Some(v) => self.output(key, v),
            None => self,
        }
    }

    /// Set a pre-erased property
    pub fn json_output(mut self, key: &str, value: Output<Value>) -> Self {
        self.entries.insert(key.to_string(), value);
        self
    }

    /// Property names
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Await every property
    ///
    /// Fails with the first failed property. Unknown properties are left out
    /// of the map and listed in `unknown`.
    pub async fn resolve(self) -> InfrastructureResult<ResolvedInputs> {
        let (keys, outputs): (Vec<_>, Vec<_>) = self.entries.into_iter().unzip();
        let results = join_all(outputs.iter().map(|o| o.resolve())).await;

        let mut resolved = ResolvedInputs::default();
        for (key, result) in keys.into_iter().zip(results) {
            let Resolved {
                value,
                dependencies,
            } = result?;
            resolved.dependencies.extend(dependencies);
            match value {
                Some(v) => {
                    resolved.properties.insert(key, v);
                }
                None => {
                    resolved.unknown.insert(key);
                }
            }
        }
        Ok(resolved)
    }
}

/// Inputs after every property resolved
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedInputs {
    /// Known properties
    pub properties: PropertyMap,
    /// Properties that stay unknown until apply
    pub unknown: BTreeSet<String>,
    /// Resources the properties came from
    pub dependencies: BTreeSet<Urn>,
}

impl ResolvedInputs {
    /// Whether every property is known
    pub fn is_fully_known(&self) -> bool {
        self.unknown.is_empty()
    }
}

/// Per-declaration options
#[derive(Debug, Clone, Default)]
pub struct ResourceOptions {
    /// Display parent; grouping only, never a lifecycle dependency
    pub parent: Option<Urn>,
    /// Resources that must settle before this one, without a data dependency
    pub depends_on: Vec<Resource>,
    /// Delete the old resource before creating its replacement
    pub delete_before_replace: bool,
}

impl ResourceOptions {
    /// Default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Group under `parent`
    pub fn parent(mut self, parent: &impl HasUrn) -> Self {
        self.parent = Some(parent.urn().clone());
        self
    }

    /// Wait for `resource` before executing
    pub fn depends_on(mut self, resource: &Resource) -> Self {
        self.depends_on.push(resource.clone());
        self
    }

    /// Replace by delete-then-create
    pub fn delete_before_replace(mut self) -> Self {
        self.delete_before_replace = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_resolve_splits_known_and_unknown() {
        let urn = Urn::new("s", "p", "aws:ec2/vpc:Vpc", "vpc");
        let inputs = Inputs::new()
            .set("cidr_block", "10.0.0.0/16")
            .output("vpc_id", &Output::known("vpc-1".to_string()).with_dependency(urn.clone()))
            .output("subnet_ids", &Output::<Vec<String>>::unknown());

        let resolved = inputs.resolve().await.unwrap();
        assert_eq!(resolved.properties["cidr_block"], json!("10.0.0.0/16"));
        assert_eq!(resolved.properties["vpc_id"], json!("vpc-1"));
        assert!(resolved.unknown.contains("subnet_ids"));
        assert!(resolved.dependencies.contains(&urn));
        assert!(!resolved.is_fully_known());
    }

    #[tokio::test]
    async fn test_optional_output_absent() {
        let inputs = Inputs::new().optional_output::<String>("nat_gateway_id", &None);
        assert_eq!(inputs.keys().count(), 0);
    }
}
