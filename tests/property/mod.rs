// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests Module
//!
//! Subnet partitioning must stay inside the VPC block and never overlap,
//! whatever the layout.

mod subnet_partition;
