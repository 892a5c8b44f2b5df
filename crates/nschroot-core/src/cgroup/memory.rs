//! Memory controller hook.
//!
//! Manages `memory.max` and `memory.high`.

use std::path::Path;

use nschroot_common::error::Result;
use nschroot_common::types::ResourceLimits;

use super::{ControllerHook, write_control};

/// Sets the hard memory limit for a cgroup.
///
/// # Errors
///
/// Returns an error if writing to `memory.max` fails.
pub fn set_memory_max(cgroup_path: &Path, bytes: u64) -> Result<()> {
    write_control(cgroup_path, "memory.max", &bytes.to_string())?;
    tracing::debug!(bytes, "memory max limit set");
    Ok(())
}

/// Sets the memory high watermark (throttling threshold).
///
/// # Errors
///
/// Returns an error if writing to `memory.high` fails.
pub fn set_memory_high(cgroup_path: &Path, bytes: u64) -> Result<()> {
    write_control(cgroup_path, "memory.high", &bytes.to_string())?;
    tracing::debug!(bytes, "memory high watermark set");
    Ok(())
}

/// Hook applying `memory_max` and `memory_high`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryHook;

impl ControllerHook for MemoryHook {
    fn configure(&self, cgroup: &Path, limits: &ResourceLimits) -> Result<()> {
        if let Some(bytes) = limits.memory_max {
            set_memory_max(cgroup, bytes)?;
        }
        if let Some(bytes) = limits.memory_high {
            set_memory_high(cgroup, bytes)?;
        }
        Ok(())
    }
}
