//! Mount primitives used inside the new mount namespace.
//!
//! [`MountOps`] is the seam between the executor's ordering logic and
//! the `mount(2)` calls; [`KernelMounts`] is the real implementation.

use std::path::Path;

use nix::mount::{MsFlags, mount};
use nschroot_common::error::{NschrootError, Result};

use super::spec::BindOptions;

/// Operations the mount executor performs against the kernel.
pub trait MountOps {
    /// Recursively marks the mount at `path` as private.
    ///
    /// # Errors
    ///
    /// Returns an error if the propagation change fails.
    fn make_private(&mut self, path: &Path) -> Result<()>;

    /// Mounts a fresh tmpfs at `target` with permission bits `mode`.
    ///
    /// # Errors
    ///
    /// Returns an error if the mount fails.
    fn mount_tmpfs(&mut self, target: &Path, mode: u32) -> Result<()>;

    /// Bind mounts `source` onto `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if the bind or the follow-up remount fails.
    fn bind(&mut self, source: &Path, target: &Path, options: BindOptions) -> Result<()>;
}

/// [`MountOps`] backed by `mount(2)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct KernelMounts;

impl MountOps for KernelMounts {
    fn make_private(&mut self, path: &Path) -> Result<()> {
        mount(
            None::<&str>,
            path,
            None::<&str>,
            MsFlags::MS_REC | MsFlags::MS_PRIVATE,
            None::<&str>,
        )
        .map_err(|e| mount_error(path, path, format!("cannot make mount private: {e}")))?;
        tracing::debug!(path = %path.display(), "mount propagation set to private");
        Ok(())
    }

    fn mount_tmpfs(&mut self, target: &Path, mode: u32) -> Result<()> {
        let options = tmpfs_options(mode);
        mount(
            Some("tmpfs"),
            target,
            Some("tmpfs"),
            MsFlags::MS_NOSUID | MsFlags::MS_NODEV,
            Some(options.as_str()),
        )
        .map_err(|e| mount_error(Path::new("tmpfs"), target, e.to_string()))?;
        tracing::debug!(mount_point = %target.display(), %options, "tmpfs mounted");
        Ok(())
    }

    fn bind(&mut self, source: &Path, target: &Path, options: BindOptions) -> Result<()> {
        let mut flags = MsFlags::MS_BIND;
        if options.recursive {
            flags |= MsFlags::MS_REC;
        }
        mount(Some(source), target, None::<&str>, flags, None::<&str>)
            .map_err(|e| mount_error(source, target, e.to_string()))?;

        if options.needs_remount() {
            mount(
                None::<&str>,
                target,
                None::<&str>,
                remount_flags(options),
                None::<&str>,
            )
            .map_err(|e| mount_error(source, target, format!("remount failed: {e}")))?;
        }
        tracing::debug!(
            source = %source.display(),
            mount_point = %target.display(),
            options = ?options,
            "bind mounted"
        );
        Ok(())
    }
}

/// Recursively bind mounts `root` onto itself so it is a mount point.
///
/// # Errors
///
/// Returns an error if the bind mount fails.
pub fn self_bind(root: &Path) -> Result<()> {
    let options = BindOptions {
        recursive: true,
        ..BindOptions::default()
    };
    KernelMounts.bind(root, root, options)
}

fn tmpfs_options(mode: u32) -> String {
    format!("mode={mode:o}")
}

fn remount_flags(options: BindOptions) -> MsFlags {
    let mut flags = MsFlags::MS_BIND | MsFlags::MS_REMOUNT;
    if options.read_only {
        flags |= MsFlags::MS_RDONLY;
    }
    if options.nosuid {
        flags |= MsFlags::MS_NOSUID;
    }
    if options.nodev {
        flags |= MsFlags::MS_NODEV;
    }
    if options.noexec {
        flags |= MsFlags::MS_NOEXEC;
    }
    flags
}

fn mount_error(source: &Path, target: &Path, message: String) -> NschrootError {
    NschrootError::Mount {
        source_path: source.to_path_buf(),
        target: target.to_path_buf(),
        message,
    }
}
