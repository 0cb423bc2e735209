// Copyright (c) 2025 - Cowboy AI, Inc.
//! Deployment snapshot and state stores
//!
//! The snapshot is the engine's record of what the last deployment left
//! behind. It is read at the start of every run and written at the end of
//! every apply, through an injected [`StateStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

use crate::domain::{ResourceKind, Urn};
use crate::engine::inputs::PropertyMap;
use crate::errors::{InfrastructureError, InfrastructureResult};

/// One live resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    pub urn: Urn,
    pub kind: ResourceKind,
    /// Provider-assigned identifier
    pub id: String,
    /// Resolved inputs the resource was last applied with
    pub inputs: PropertyMap,
    /// Provider outputs (inputs plus computed attributes)
    pub outputs: PropertyMap,
    /// Display parent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<Urn>,
    /// Resources that must outlive this one
    #[serde(default)]
    pub dependencies: BTreeSet<Urn>,
    #[serde(default)]
    pub delete_before_replace: bool,
    /// Replaced but not yet deleted
    #[serde(default)]
    pub pending_delete: bool,
}

impl ResourceState {
    /// String output, if present
    pub fn output_str(&self, key: &str) -> Option<&str> {
        self.outputs.get(key).and_then(Value::as_str)
    }

    /// String-array output, empty if absent
    pub fn output_strs(&self, key: &str) -> Vec<&str> {
        self.outputs
            .get(key)
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Value of the `Name` tag, falling back to the URN name
    pub fn display_name(&self) -> &str {
        self.outputs
            .get("tags")
            .and_then(|t| t.get("Name"))
            .and_then(Value::as_str)
            .unwrap_or_else(|| self.urn.name())
    }
}

/// One component (grouping node)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentState {
    pub urn: Urn,
    pub type_name: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<Urn>,
    /// Direct children, resources and components, in declaration order
    #[serde(default)]
    pub children: Vec<Urn>,
}

/// Everything the last deployment left behind
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub resources: Vec<ResourceState>,
    #[serde(default)]
    pub components: Vec<ComponentState>,
    #[serde(default)]
    pub exports: BTreeMap<String, Value>,
}

impl Snapshot {
    /// Live resource by URN
    pub fn find(&self, urn: &Urn) -> Option<&ResourceState> {
        self.live().find(|r| &r.urn == urn)
    }

    /// Live resource by provider id
    pub fn find_by_id(&self, id: &str) -> Option<&ResourceState> {
        self.live().find(|r| r.id == id)
    }

    /// Live resource by declared name and kind
    pub fn find_named(&self, kind: ResourceKind, name: &str) -> Option<&ResourceState> {
        self.by_kind(kind).find(|r| r.urn.name() == name)
    }

    /// Live resources of one kind, in snapshot order
    pub fn by_kind(&self, kind: ResourceKind) -> impl Iterator<Item = &ResourceState> {
        self.live().filter(move |r| r.kind == kind)
    }

    /// Resources not awaiting deletion
    pub fn live(&self) -> impl Iterator<Item = &ResourceState> {
        self.resources.iter().filter(|r| !r.pending_delete)
    }

    /// Component by URN
    pub fn component(&self, urn: &Urn) -> Option<&ComponentState> {
        self.components.iter().find(|c| &c.urn == urn)
    }

    /// Whether nothing is deployed
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

/// Snapshot persistence
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Snapshot of `stack`, `None` if it was never deployed
    async fn load(&self, stack: &str) -> InfrastructureResult<Option<Snapshot>>;

    /// Replace the snapshot of `stack`
    async fn save(&self, stack: &str, snapshot: &Snapshot) -> InfrastructureResult<()>;
}

/// Process-local store
#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    stacks: Mutex<HashMap<String, Snapshot>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn load(&self, stack: &str) -> InfrastructureResult<Option<Snapshot>> {
        Ok(self.stacks.lock().get(stack).cloned())
    }

    async fn save(&self, stack: &str, snapshot: &Snapshot) -> InfrastructureResult<()> {
        self.stacks
            .lock()
            .insert(stack.to_string(), snapshot.clone());
        Ok(())
    }
}

/// JSON file per stack under a directory
#[derive(Debug, Clone)]
pub struct FileStateStore {
    dir: PathBuf,
}

impl FileStateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// File holding the snapshot of `stack`
    pub fn path_for(&self, stack: &str) -> PathBuf {
        self.dir.join(format!("{stack}.json"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn load(&self, stack: &str) -> InfrastructureResult<Option<Snapshot>> {
        let path = self.path_for(stack);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let snapshot = serde_json::from_slice(&bytes).map_err(|e| {
            InfrastructureError::Deserialization(format!("{}: {e}", path.display()))
        })?;
        debug!(path = %path.display(), "loaded snapshot");
        Ok(Some(snapshot))
    }

    async fn save(&self, stack: &str, snapshot: &Snapshot) -> InfrastructureResult<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(stack);
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(path = %path.display(), resources = snapshot.resources.len(), "saved snapshot");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vpc_state(pending_delete: bool) -> ResourceState {
        let mut outputs = PropertyMap::new();
        outputs.insert("cidr_block".to_string(), json!("10.0.0.0/16"));
        outputs.insert("tags".to_string(), json!({"Name": "spoke1"}));
        ResourceState {
            urn: Urn::new("dev", "hub", "aws:ec2/vpc:Vpc", "spoke1"),
            kind: ResourceKind::Vpc,
            id: "vpc-1".to_string(),
            inputs: PropertyMap::new(),
            outputs,
            parent: None,
            dependencies: BTreeSet::new(),
            delete_before_replace: false,
            pending_delete,
        }
    }

    #[test]
    fn test_pending_deletes_are_not_live() {
        let snapshot = Snapshot {
            resources: vec![vpc_state(true)],
            ..Default::default()
        };
        assert!(snapshot.find_by_id("vpc-1").is_none());
        assert!(!snapshot.is_empty());
    }

    #[test]
    fn test_display_name_prefers_tag() {
        let state = vpc_state(false);
        assert_eq!(state.display_name(), "spoke1");
        assert_eq!(state.output_str("cidr_block"), Some("10.0.0.0/16"));
    }

    #[tokio::test]
    async fn test_in_memory_round_trip() {
        let store = InMemoryStateStore::new();
        assert!(store.load("dev").await.unwrap().is_none());

        let snapshot = Snapshot {
            resources: vec![vpc_state(false)],
            ..Default::default()
        };
        store.save("dev", &snapshot).await.unwrap();
        assert_eq!(store.load("dev").await.unwrap(), Some(snapshot));
    }
}
