// Copyright (c) 2025 - Cowboy AI, Inc.
//! Hub-and-spoke transit network infrastructure
//!
//! Declares an AWS transit-gateway hub-and-spoke topology (a backbone, a hub
//! VPC with centralized egress, spoke VPCs and reachability probes) and
//! converges a provider on it through a dependency-ordered engine.
//!
//! # Architecture
//!
//! ```text
//! config ──▶ stack::declare ──▶ components ──▶ aws (typed args)
//!                                    │
//!                                    ▼
//!                 engine (Output<T>, plan, state store)
//!                                    │
//!                                    ▼
//!                         provider (SimulatedCloud)
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use hub_spoke_infrastructure::{
//!     config::HubAndSpokeSettings, engine::{Deployment, InMemoryStateStore},
//!     provider::SimulatedCloud, stack,
//! };
//!
//! # async fn run() -> hub_spoke_infrastructure::InfrastructureResult<()> {
//! let deployment = Deployment::new(
//!     "dev",
//!     stack::PROJECT,
//!     Arc::new(SimulatedCloud::default()),
//!     Arc::new(InMemoryStateStore::new()),
//! );
//! let settings = HubAndSpokeSettings::new("10.0.0.0/8");
//! let summary = deployment.up(|ctx| stack::program(ctx, settings)).await?;
//! println!("{:?}", summary.exports.get("hub_eip"));
//! # Ok(())
//! # }
//! ```

pub mod aws;
pub mod components;
pub mod config;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod output;
pub mod provider;
pub mod stack;
pub mod state_machine;

// Re-export commonly used types
pub use config::{HubAndSpokeSettings, SpokeSettings, StackConfig};
pub use engine::{Context, Deployment, RunMode, UpdateSummary};
pub use errors::{InfrastructureError, InfrastructureResult};
pub use output::Output;
pub use provider::{Provider, SimulatedCloud};
