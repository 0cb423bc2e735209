// Copyright (c) 2025 - Cowboy AI, Inc.
//! Typed Resource Arguments
//!
//! One argument struct per declared resource kind, grouped by provider
//! module. Each struct implements [`ResourceArgs`](crate::engine::ResourceArgs)
//! and erases itself into the property names the provider expects.
//!
//! Fields that come from other resources are [`Output`](crate::output::Output)s,
//! so declaring a resource never blocks on its producers.

pub mod ec2;
pub mod ec2transitgateway;
pub mod iam;
pub mod networkfirewall;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Resource tags
pub type Tags = BTreeMap<String, String>;

/// Tags holding only a `Name`
pub fn name_tag(name: &str) -> Tags {
    Tags::from([("Name".to_string(), name.to_string())])
}

/// `enable` / `disable` switch used by transit gateway settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Toggle {
    Enable,
    #[default]
    Disable,
}

impl fmt::Display for Toggle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Toggle::Enable => write!(f, "enable"),
            Toggle::Disable => write!(f, "disable"),
        }
    }
}
