//! Linux namespace handling.
//!
//! The run is split in two phases separated by a single re-exec:
//! before it, namespace support is checked and the program re-invokes
//! itself through the namespace helper; after it, the carried
//! [`NamespaceSet`] is used as-is once the mount namespace is verified
//! to differ from the caller's.

pub mod reexec;
pub mod support;
pub mod uts;

use std::path::Path;

use nix::sched::CloneFlags;
use nschroot_common::constants::{NAMESPACES_MARKER, PARENT_MOUNT_NS_MARKER, REEXEC_MARKER};
use nschroot_common::error::{NschrootError, Result};
use nschroot_common::types::{NamespaceKind, NamespaceSet};

use crate::host::HostEnv;

/// Which side of the re-exec boundary this process is on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    /// Initial invocation: check support and re-exec.
    PreNamespace,
    /// Re-executed inside the namespaces listed.
    InNamespace(NamespaceSet),
}

impl Phase {
    /// Reads the phase from the re-exec markers in the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the marker is present but the carried
    /// namespace list is malformed or lacks the mount namespace.
    pub fn detect(host: &HostEnv) -> Result<Self> {
        if host.get(REEXEC_MARKER) != Some("1") {
            return Ok(Self::PreNamespace);
        }
        let set = NamespaceSet::decode(host.get(NAMESPACES_MARKER).unwrap_or(""))?;
        if !set.contains(NamespaceKind::Mount) {
            return Err(NschrootError::Namespace {
                kind: NamespaceKind::Mount.as_str(),
                message: "re-executed without a mount namespace".into(),
            });
        }
        Ok(Self::InNamespace(set))
    }
}

/// Mount namespace link of the current process.
pub const SELF_MOUNT_NS: &str = "/proc/self/ns/mnt";

/// Mount namespace link of the init process.
const INIT_MOUNT_NS: &str = "/proc/1/ns/mnt";

/// Reads the namespace identifier behind `link`, e.g. `mnt:[4026531841]`.
#[must_use]
pub fn namespace_id(link: &Path) -> Option<String> {
    std::fs::read_link(link)
        .ok()
        .map(|target| target.to_string_lossy().into_owned())
}

/// Fails unless this process sits in a mount namespace other than the one
/// recorded before the re-exec and the one of init.
///
/// # Errors
///
/// Returns a namespace error when the namespace is shared with either
/// reference, or when no reference can be read.
pub fn ensure_new_mount_namespace(host: &HostEnv) -> Result<()> {
    let own = namespace_id(Path::new(SELF_MOUNT_NS))
        .ok_or_else(|| mount_ns_error(format!("cannot read {SELF_MOUNT_NS}")))?;
    let init = namespace_id(Path::new(INIT_MOUNT_NS));
    check_mount_namespace(&own, host.get(PARENT_MOUNT_NS_MARKER), init.as_deref())
}

fn check_mount_namespace(own: &str, parent: Option<&str>, init: Option<&str>) -> Result<()> {
    if parent.is_none() && init.is_none() {
        return Err(mount_ns_error(
            "cannot confirm that a new mount namespace was entered".into(),
        ));
    }
    if parent == Some(own) || init == Some(own) {
        return Err(mount_ns_error(format!(
            "still in the host mount namespace ({own})"
        )));
    }
    tracing::debug!(namespace = own, "running in a private mount namespace");
    Ok(())
}

fn mount_ns_error(message: String) -> NschrootError {
    NschrootError::Namespace {
        kind: NamespaceKind::Mount.as_str(),
        message,
    }
}

/// `clone(2)` flag for a namespace kind.
#[must_use]
pub const fn clone_flag(kind: NamespaceKind) -> CloneFlags {
    match kind {
        NamespaceKind::Mount => CloneFlags::CLONE_NEWNS,
        NamespaceKind::Uts => CloneFlags::CLONE_NEWUTS,
        NamespaceKind::Ipc => CloneFlags::CLONE_NEWIPC,
        NamespaceKind::Net => CloneFlags::CLONE_NEWNET,
        NamespaceKind::Pid => CloneFlags::CLONE_NEWPID,
        NamespaceKind::User => CloneFlags::CLONE_NEWUSER,
        NamespaceKind::Cgroup => CloneFlags::CLONE_NEWCGROUP,
    }
}

/// `unshare(1)` option for a namespace kind.
#[must_use]
pub const fn unshare_option(kind: NamespaceKind) -> &'static str {
    match kind {
        NamespaceKind::Mount => "--mount",
        NamespaceKind::Uts => "--uts",
        NamespaceKind::Ipc => "--ipc",
        NamespaceKind::Net => "--net",
        NamespaceKind::Pid => "--pid",
        NamespaceKind::User => "--user",
        NamespaceKind::Cgroup => "--cgroup",
    }
}
