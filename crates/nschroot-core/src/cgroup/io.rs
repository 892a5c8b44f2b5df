//! I/O controller hook.

use std::path::Path;

use nschroot_common::error::Result;
use nschroot_common::types::ResourceLimits;

use super::{ControllerHook, write_control};

/// Sets the default I/O weight for a cgroup.
///
/// # Errors
///
/// Returns an error if writing to `io.weight` fails.
pub fn set_io_weight(cgroup_path: &Path, weight: u16) -> Result<()> {
    write_control(cgroup_path, "io.weight", &format!("default {weight}"))?;
    tracing::debug!(weight, "I/O weight set");
    Ok(())
}

/// Hook applying `io_weight`.
#[derive(Debug, Default, Clone, Copy)]
pub struct IoHook;

impl ControllerHook for IoHook {
    fn configure(&self, cgroup: &Path, limits: &ResourceLimits) -> Result<()> {
        limits
            .io_weight
            .map_or(Ok(()), |weight| set_io_weight(cgroup, weight))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hook_writes_default_weight() {
        let dir = tempfile::tempdir().unwrap();
        let limits = ResourceLimits {
            io_weight: Some(500),
            ..ResourceLimits::default()
        };
        IoHook.configure(dir.path(), &limits).unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("io.weight")).unwrap(),
            "default 500"
        );
    }
}
