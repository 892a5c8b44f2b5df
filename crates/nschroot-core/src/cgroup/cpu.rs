//! CPU controller hook.
//!
//! Manages `cpu.weight` and `cpu.max`.

use std::path::Path;

use nschroot_common::error::{NschrootError, Result};
use nschroot_common::types::ResourceLimits;

use super::{ControllerHook, write_control};

/// Sets the CPU weight for a cgroup.
///
/// Weight is a value between 1 and 10000 that controls the relative
/// share of CPU time this cgroup receives under contention.
///
/// # Errors
///
/// Returns an error if the weight is out of range or writing to
/// `cpu.weight` fails.
pub fn set_cpu_weight(cgroup_path: &Path, weight: u64) -> Result<()> {
    if !(1..=10_000).contains(&weight) {
        return Err(NschrootError::Cgroup {
            path: cgroup_path.join("cpu.weight"),
            message: format!("cpu weight {weight} outside 1-10000"),
        });
    }
    write_control(cgroup_path, "cpu.weight", &weight.to_string())?;
    tracing::debug!(weight, "CPU weight set");
    Ok(())
}

/// Sets the CPU bandwidth limit.
///
/// Writes `quota_us period_us` to `cpu.max`, where `quota_us` is the
/// maximum CPU time allowed per `period_us` window.
///
/// # Errors
///
/// Returns an error if writing to `cpu.max` fails.
pub fn set_cpu_max(cgroup_path: &Path, quota_us: u64, period_us: u64) -> Result<()> {
    write_control(cgroup_path, "cpu.max", &format!("{quota_us} {period_us}"))?;
    tracing::debug!(quota_us, period_us, "CPU max quota set");
    Ok(())
}

/// Hook applying `cpu_weight` and `cpu_max`.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpuHook;

impl ControllerHook for CpuHook {
    fn configure(&self, cgroup: &Path, limits: &ResourceLimits) -> Result<()> {
        if let Some(weight) = limits.cpu_weight {
            set_cpu_weight(cgroup, weight)?;
        }
        if let Some((quota_us, period_us)) = limits.cpu_max {
            set_cpu_max(cgroup, quota_us, period_us)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hook_writes_weight_and_max() {
        let dir = tempfile::tempdir().unwrap();
        let limits = ResourceLimits {
            cpu_weight: Some(200),
            cpu_max: Some((50_000, 100_000)),
            ..ResourceLimits::default()
        };
        CpuHook.configure(dir.path(), &limits).unwrap();
        let weight = std::fs::read_to_string(dir.path().join("cpu.weight")).unwrap();
        let max = std::fs::read_to_string(dir.path().join("cpu.max")).unwrap();
        assert_eq!(weight, "200");
        assert_eq!(max, "50000 100000");
    }

    #[test]
    fn weight_out_of_range_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(set_cpu_weight(dir.path(), 0).is_err());
        assert!(!dir.path().join("cpu.weight").exists());
    }
}
