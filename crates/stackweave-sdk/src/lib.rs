//! # stackweave-sdk
//!
//! Public SDK for using Stackweave as a Rust library.
//!
//! Provides three main entry points:
//! - [`ContainerBuilder`](builder::ContainerBuilder): Fluent API for declaring container definitions.
//! - [`blueprint`]: The registry and application stacks of the reference topology.
//! - [`Planner`](planner::Planner): Loads configuration and synthesizes the ordered plan.
//!
//! # Example
//!
//! ```rust,no_run
//! use stackweave_sdk::planner::Planner;
//!
//! let mut planner = Planner::new();
//! planner.set_image_tag("v2").expect("valid tag");
//! let plan = planner.plan().expect("plan");
//! println!("{} resources, {}", plan.len(), plan.fingerprint().expect("fingerprint"));
//! ```

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod blueprint;
pub mod builder;
pub mod planner;
