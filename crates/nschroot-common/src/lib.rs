//! # nschroot-common
//!
//! Shared types, error definitions, configuration models, and constants
//! used across the nschroot workspace.
//!
//! This crate is the leaf of the dependency graph. It performs no
//! privileged operation and no filesystem mutation.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod config;
pub mod constants;
pub mod error;
pub mod types;
