// Copyright (c) 2025 - Cowboy AI, Inc.
//! Resource names
//!
//! A URN identifies one declaration within a stack:
//! `urn:hubspoke:{stack}::{project}::{type}::{name}`. The type segment is the
//! provider type token for resources or the component type for components.

use serde::{Deserialize, Serialize};
use std::fmt;

const SCHEME: &str = "urn:hubspoke:";

/// Unique resource name within a stack
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Urn(String);

impl Urn {
    /// Build a URN from its parts
    pub fn new(stack: &str, project: &str, type_token: &str, name: &str) -> Self {
        Self(format!("{SCHEME}{stack}::{project}::{type_token}::{name}"))
    }

    fn segments(&self) -> Vec<&str> {
        self.0
            .strip_prefix(SCHEME)
            .unwrap_or(&self.0)
            .splitn(4, "::")
            .collect()
    }

    /// Declared name (last segment)
    pub fn name(&self) -> &str {
        self.0.rsplit("::").next().unwrap_or(&self.0)
    }

    /// Type token or component type
    pub fn type_token(&self) -> &str {
        self.segments().get(2).copied().unwrap_or_default()
    }

    /// Stack segment
    pub fn stack(&self) -> &str {
        self.segments().first().copied().unwrap_or_default()
    }

    /// Full URN string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Urn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
