//! # nschroot-core
//!
//! The sandbox setup pipeline. Stages, leaf first:
//! - **Mount plan**: merges default, file, and command-line mount specs.
//! - **Namespaces**: checks kernel support and re-executes the program
//!   inside the new namespaces exactly once.
//! - **Mount executor**: private remount, tmpfs mounts, bind mounts with
//!   placeholder creation under tmpfs.
//! - **Cgroups v2**: joins a unified-hierarchy cgroup and runs the
//!   per-controller hooks.
//! - **Handoff**: hostname, sanitized environment, shell resolution,
//!   chroot and exec.
//!
//! Unsafe calls are limited to `fork(2)` in the namespace support check and carry
//! `// SAFETY:` notes.

#![allow(unsafe_code)]
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod cgroup;
pub mod filesystem;
pub mod handoff;
pub mod host;
pub mod namespace;
pub mod pipeline;
