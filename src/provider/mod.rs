// Copyright (c) 2025 - Cowboy AI, Inc.
//! Provider Port
//!
//! The engine never talks to a cloud directly. Every side effect goes
//! through the [`Provider`] trait, which a deployment receives by
//! injection.
//!
//! ```text
//! Engine (plans steps)
//!     ↓
//! Provider (executes them)
//!     ↓
//! Cloud account (real or simulated)
//! ```

pub mod simulated;

pub use simulated::SimulatedCloud;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{ResourceKind, Urn};
use crate::engine::inputs::PropertyMap;
use crate::errors::InfrastructureResult;

/// Result of a create call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderResource {
    /// Provider-assigned identifier
    pub id: String,
    /// Inputs plus computed attributes
    pub outputs: PropertyMap,
}

/// Name/values filter of a lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupFilter {
    pub name: String,
    pub values: Vec<String>,
}

impl LookupFilter {
    pub fn new(name: &str, values: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }
}

/// Read-only provider query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "function", rename_all = "snake_case")]
pub enum Lookup {
    /// Machine image by owner and filters
    Ami {
        most_recent: bool,
        owners: Vec<String>,
        filters: Vec<LookupFilter>,
    },
    /// Route table associated with a subnet
    RouteTable { subnet_id: String },
    /// Current report of a reachability analysis
    NetworkInsightsAnalysis { id: String },
}

impl Lookup {
    /// Function token, for logs
    pub fn function(&self) -> &'static str {
        match self {
            Lookup::Ami { .. } => "aws:ec2/getAmi:getAmi",
            Lookup::RouteTable { .. } => "aws:ec2/getRouteTable:getRouteTable",
            Lookup::NetworkInsightsAnalysis { .. } => {
                "aws:ec2/getNetworkInsightsAnalysis:getNetworkInsightsAnalysis"
            }
        }
    }
}

/// Status of a reachability analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Running,
    Succeeded,
    Failed,
}

/// Outcome of a reachability analysis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub id: String,
    pub network_insights_path_id: String,
    pub status: AnalysisStatus,
    /// `None` while running
    pub network_path_found: Option<bool>,
    /// Components the traffic traverses, in order
    #[serde(default)]
    pub forward_path: Vec<String>,
    /// Why the path was not found
    #[serde(default)]
    pub explanations: Vec<String>,
}

/// Side-effecting cloud operations
///
/// Implementations must reject invalid requests with
/// `InfrastructureError::ProviderRejection` carrying the provider's message
/// verbatim.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Create a resource
    async fn create(
        &self,
        kind: ResourceKind,
        urn: &Urn,
        inputs: &PropertyMap,
    ) -> InfrastructureResult<ProviderResource>;

    /// Update a resource in place, returning its new outputs
    async fn update(
        &self,
        kind: ResourceKind,
        urn: &Urn,
        id: &str,
        inputs: &PropertyMap,
    ) -> InfrastructureResult<PropertyMap>;

    /// Delete a resource
    async fn delete(&self, kind: ResourceKind, urn: &Urn, id: &str) -> InfrastructureResult<()>;

    /// Run a lookup
    async fn invoke(&self, lookup: &Lookup) -> InfrastructureResult<Value>;

    /// Provider name (for logging)
    fn name(&self) -> &str;
}
