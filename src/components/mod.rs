// Copyright (c) 2025 - Cowboy AI, Inc.
//! Topology Builders
//!
//! Reusable groups of declarations. Each builder declares a component (a
//! grouping node with no provider-side existence) and its resources as
//! children of it.
//!
//! ```text
//! Backbone ──▶ HubVpc ───┐
//!     │                  ├──▶ SpokeVerification
//!     └──────▶ SpokeVpc ─┘
//! ```
//!
//! Builders never wait on a racing lookup: steps that need subnet ids are
//! continuations keyed on the completion of the VPC's own subnet
//! declarations.

pub mod backbone;
pub mod firewall;
pub mod hub;
pub mod spoke;
pub mod verification;
pub mod vpc;

pub use backbone::Backbone;
pub use firewall::InspectionFirewall;
pub use hub::{HubVpc, HubVpcArgs};
pub use spoke::{SpokeVpc, SpokeVpcArgs, ENDPOINT_SERVICES};
pub use verification::{describe_analyses, EgressPolicy, SpokeVerification, SpokeVerificationArgs};
pub use vpc::{availability_zones, NatStrategy, Vpc, VpcArgs, VpcSubnet};

/// Component type of [`Vpc`]
pub const VPC_TYPE: &str = "awsx:ec2:Vpc";
/// Component type of [`HubVpc`]
pub const HUB_VPC_TYPE: &str = "hubspoke:index:HubVpc";
/// Component type of [`SpokeVpc`]
pub const SPOKE_VPC_TYPE: &str = "hubspoke:index:SpokeVpc";
/// Component type of [`SpokeVerification`]
pub const SPOKE_VERIFICATION_TYPE: &str = "hubspoke:index:SpokeVerification";
/// Component type of [`InspectionFirewall`]
pub const INSPECTION_FIREWALL_TYPE: &str = "hubspoke:index:InspectionFirewall";
