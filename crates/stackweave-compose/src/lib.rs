//! # stackweave-compose
//!
//! Synthesis core: turns declared stacks into an ordered resource plan.
//!
//! Handles:
//! - **Descriptor**: Immutable resource records and their patch-before-freeze builder.
//! - **Reference**: Lazy handles to attributes of not-yet-realized resources.
//! - **Graph**: Dependency graph construction and deterministic topological ordering.
//! - **Stack**: Named resource collections with explicit exports and imports.
//! - **Composer**: Cross-stack ordering and import threading into a single plan.
//! - **Network**: Tier segmentation into security groups and ingress rules.
//! - **Secret**: Fanout of one secret's fields to multiple consumers.
//! - **Plan**: The synthesized, fingerprinted output handed to a provider.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod composer;
pub mod descriptor;
pub mod graph;
pub mod network;
pub mod plan;
pub mod reference;
pub mod secret;
pub mod stack;
