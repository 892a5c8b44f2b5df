//! Applies a [`MountPlan`] under the target root.
//!
//! Order is fixed: private remount of `/`, every tmpfs, then every bind
//! mount. A missing bind target is created only when it lies beneath one
//! of the tmpfs mounts just made; anywhere else it is an error, or a
//! silent skip for optional entries.

use std::fs::{self, OpenOptions};
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};

use nschroot_common::error::{NschrootError, Result};

use super::mount::MountOps;
use super::plan::MountPlan;
use super::rooted;

/// Outcome of a successful plan execution.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MountReport {
    /// Tmpfs mount points, in the order mounted.
    pub tmpfs: Vec<PathBuf>,
    /// Bind targets mounted, in the order mounted.
    pub mounted: Vec<PathBuf>,
    /// Placeholders created for missing bind targets.
    pub created: Vec<PathBuf>,
    /// Sources of optional entries that were skipped.
    pub skipped: Vec<PathBuf>,
}

/// Executes `plan` under `root` through `ops`.
///
/// # Errors
///
/// Returns the first failure of a non-optional step. Failures of optional
/// bind mounts are logged and skipped.
pub fn execute_plan(plan: &MountPlan, root: &Path, ops: &mut impl MountOps) -> Result<MountReport> {
    if !root.is_dir() {
        return Err(NschrootError::argument(format!(
            "target is not an existing directory: {}",
            root.display()
        )));
    }
    let mut report = MountReport::default();

    ops.make_private(Path::new("/"))?;

    for (path, mode) in &plan.tmpfs {
        let mount_point = rooted(root, path);
        if !mount_point.is_dir() {
            return Err(NschrootError::Mount {
                source_path: PathBuf::from("tmpfs"),
                target: mount_point,
                message: "mount target does not exist".into(),
            });
        }
        ops.mount_tmpfs(&mount_point, mode.bits())?;
        tracing::info!(mount_point = %mount_point.display(), mode = %mode, "tmpfs mounted");
        report.tmpfs.push(mount_point);
    }

    for (source, entry) in &plan.binds {
        let inner = entry.target_for(source);
        let target = rooted(root, inner);
        match bind_one(plan, source, inner, &target, entry.options, ops, &mut report) {
            Ok(()) => report.mounted.push(target),
            Err(e) if entry.optional => {
                tracing::debug!(source = %source.display(), error = %e, "skipping optional mount");
                report.skipped.push(source.clone());
            }
            Err(e) => return Err(e),
        }
    }

    tracing::info!(
        tmpfs = report.tmpfs.len(),
        mounted = report.mounted.len(),
        skipped = report.skipped.len(),
        "mount plan applied"
    );
    Ok(report)
}

fn bind_one(
    plan: &MountPlan,
    source: &Path,
    inner: &Path,
    target: &Path,
    options: super::spec::BindOptions,
    ops: &mut impl MountOps,
    report: &mut MountReport,
) -> Result<()> {
    let metadata = fs::metadata(source).map_err(|e| NschrootError::Mount {
        source_path: source.to_path_buf(),
        target: target.to_path_buf(),
        message: format!("mount source unavailable: {e}"),
    })?;

    if fs::symlink_metadata(target).is_err() {
        if plan.covering_tmpfs(inner).is_none() {
            return Err(NschrootError::Mount {
                source_path: source.to_path_buf(),
                target: target.to_path_buf(),
                message: "mount target does not exist".into(),
            });
        }
        create_placeholder(source, &metadata.file_type(), target)?;
        report.created.push(target.to_path_buf());
    }

    ops.bind(source, target, options)
}

/// Creates an empty mount point at `target` matching the type of `source`.
///
/// # Errors
///
/// Returns an error for sources that are not a directory, regular file
/// or socket, or if the placeholder cannot be created.
pub fn create_placeholder(source: &Path, file_type: &fs::FileType, target: &Path) -> Result<()> {
    let io_err = |e: std::io::Error| NschrootError::Io {
        path: target.to_path_buf(),
        source: e,
    };
    if file_type.is_dir() {
        fs::create_dir_all(target).map_err(io_err)?;
    } else if file_type.is_file() || file_type.is_socket() {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let _ = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(target)
            .map_err(io_err)?;
    } else {
        return Err(NschrootError::Mount {
            source_path: source.to_path_buf(),
            target: target.to_path_buf(),
            message: "cannot create a mount point for this source type".into(),
        });
    }
    tracing::debug!(path = %target.display(), "created mount point");
    Ok(())
}
