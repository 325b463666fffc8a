//! Plan realization for the Stackweave workspace.
//!
//! The engine walks a composed plan in order, resolves references against
//! what has been realized so far, and hands each descriptor to a
//! [`provider::Provider`].

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod engine;
pub mod provider;
pub mod state;
