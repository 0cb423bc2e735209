// Copyright (c) 2025 - Cowboy AI, Inc.
//! Handles returned by declarations

use serde_json::Value;

use crate::domain::{ResourceKind, Urn};
use crate::engine::inputs::PropertyMap;
use crate::errors::InfrastructureError;
use crate::output::Output;

/// Anything addressable by URN
pub trait HasUrn {
    fn urn(&self) -> &Urn;
}

/// A declared resource
///
/// The handle exists as soon as the declaration is registered; its outputs
/// resolve once the engine has executed the resource's step.
#[derive(Debug, Clone)]
pub struct Resource {
    urn: Urn,
    kind: ResourceKind,
    id: Output<String>,
    state: Output<PropertyMap>,
}

impl Resource {
    pub(crate) fn new(
        urn: Urn,
        kind: ResourceKind,
        id: Output<String>,
        state: Output<PropertyMap>,
    ) -> Self {
        Self {
            urn,
            kind,
            id,
            state,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Provider-assigned identifier
    pub fn id(&self) -> Output<String> {
        self.id.clone()
    }

    /// All provider outputs
    pub fn outputs(&self) -> Output<PropertyMap> {
        self.state.clone()
    }

    /// One output property
    ///
    /// Resolves with `MissingAttribute` if the provider did not return it.
    pub fn output(&self, key: &str) -> Output<Value> {
        let key = key.to_string();
        let urn = self.urn.to_string();
        self.state.try_map(move |mut outputs| {
            outputs
                .remove(&key)
                .ok_or(InfrastructureError::MissingAttribute {
                    urn,
                    attribute: key,
                })
        })
    }

    /// One string output property
    pub fn output_string(&self, key: &str) -> Output<String> {
        let key_owned = key.to_string();
        let urn = self.urn.to_string();
        self.output(key).try_map(move |value| match value {
            Value::String(s) => Ok(s),
            _ => Err(InfrastructureError::MissingAttribute {
                urn,
                attribute: key_owned,
            }),
        })
    }

    /// Resolves once the resource has settled
    pub fn ready(&self) -> Output<()> {
        self.id.map(|_| ())
    }
}

impl HasUrn for Urn {
    fn urn(&self) -> &Urn {
        self
    }
}

impl HasUrn for Resource {
    fn urn(&self) -> &Urn {
        &self.urn
    }
}

/// A declared component (grouping node)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentHandle {
    urn: Urn,
    type_name: String,
    name: String,
}

impl ComponentHandle {
    pub(crate) fn new(urn: Urn, type_name: &str, name: &str) -> Self {
        Self {
            urn,
            type_name: type_name.to_string(),
            name: name.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }
}

impl HasUrn for ComponentHandle {
    fn urn(&self) -> &Urn {
        &self.urn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resource(outputs: Value) -> Resource {
        let map = match outputs {
            Value::Object(m) => m,
            _ => PropertyMap::new(),
        };
        Resource::new(
            Urn::new("dev", "hub", "aws:ec2/eip:Eip", "hub-eip"),
            ResourceKind::Eip,
            Output::known("eipalloc-1".to_string()),
            Output::known(map),
        )
    }

    #[tokio::test]
    async fn test_output_string() {
        let eip = resource(json!({"public_ip": "52.94.0.1"}));
        assert_eq!(
            eip.output_string("public_ip").value().await.unwrap(),
            Some("52.94.0.1".to_string())
        );
    }

    #[tokio::test]
    async fn test_missing_attribute() {
        let eip = resource(json!({}));
        let err = eip.output("public_ip").value().await.unwrap_err();
        assert!(matches!(err, InfrastructureError::MissingAttribute { attribute, .. } if attribute == "public_ip"));
    }
}
