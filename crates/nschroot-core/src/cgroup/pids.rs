//! Pids controller hook.

use std::path::Path;

use nschroot_common::error::Result;
use nschroot_common::types::ResourceLimits;

use super::{ControllerHook, write_control};

/// Hook applying `pids_max` to `pids.max`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PidsHook;

impl ControllerHook for PidsHook {
    fn configure(&self, cgroup: &Path, limits: &ResourceLimits) -> Result<()> {
        if let Some(max) = limits.pids_max {
            write_control(cgroup, "pids.max", &max.to_string())?;
            tracing::debug!(max, "pids max set");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hook_is_a_no_op_without_limit() {
        let dir = tempfile::tempdir().unwrap();
        PidsHook
            .configure(dir.path(), &ResourceLimits::default())
            .unwrap();
        assert!(!dir.path().join("pids.max").exists());
    }

    #[test]
    fn hook_writes_limit() {
        let dir = tempfile::tempdir().unwrap();
        let limits = ResourceLimits {
            pids_max: Some(64),
            ..ResourceLimits::default()
        };
        PidsHook.configure(dir.path(), &limits).unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("pids.max")).unwrap(),
            "64"
        );
    }
}
