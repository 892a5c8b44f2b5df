//! Re-execution of the current program inside new namespaces.
//!
//! The helper `unshare(1)` creates the namespaces and then runs this
//! program again with its original arguments. The resolved namespace set
//! and the re-exec marker travel in the environment so the second run
//! skips the support checks.

use std::convert::Infallible;
use std::ffi::OsString;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::Command;

use nschroot_common::constants::{
    NAMESPACES_MARKER, PARENT_MOUNT_NS_MARKER, REEXEC_MARKER, UNSHARE_BIN,
};
use nschroot_common::error::{NschrootError, Result};
use nschroot_common::types::{NamespaceKind, NamespaceSet};

use super::{SELF_MOUNT_NS, namespace_id, unshare_option};

/// Everything needed to build the re-exec command line.
#[derive(Debug, Clone)]
pub struct Reexec {
    /// Path of the namespace helper.
    pub helper: PathBuf,
    /// Path of this program.
    pub program: PathBuf,
    /// Original arguments, without `argv[0]`.
    pub args: Vec<OsString>,
    /// Mount namespace of this process before the re-exec.
    pub parent_mount_ns: Option<String>,
}

impl Reexec {
    /// Locates the helper on `PATH` and this program's executable.
    ///
    /// # Errors
    ///
    /// Returns a capability error if either cannot be found.
    pub fn locate() -> Result<Self> {
        let helper = which::which(UNSHARE_BIN).map_err(|e| NschrootError::Capability {
            mechanism: "namespace helper",
            message: format!("{UNSHARE_BIN}: {e}"),
        })?;
        let program = std::env::current_exe().map_err(|e| NschrootError::Capability {
            mechanism: "self re-exec",
            message: format!("cannot locate own executable: {e}"),
        })?;
        Ok(Self {
            helper,
            program,
            args: std::env::args_os().skip(1).collect(),
            parent_mount_ns: namespace_id(Path::new(SELF_MOUNT_NS)),
        })
    }

    /// Builds the helper invocation for `set`.
    #[must_use]
    pub fn command(&self, set: &NamespaceSet, extra_args: &[String]) -> Command {
        let mut cmd = Command::new(&self.helper);
        for kind in set.iter() {
            let _ = cmd.arg(unshare_option(kind));
        }
        if set.contains(NamespaceKind::Pid) {
            let _ = cmd.arg("--fork");
        }
        if set.contains(NamespaceKind::User) {
            let _ = cmd.arg("--map-root-user");
        }
        let _ = cmd
            .args(extra_args)
            .arg("--")
            .arg(&self.program)
            .args(&self.args)
            .env(REEXEC_MARKER, "1")
            .env(NAMESPACES_MARKER, set.encode());
        if let Some(id) = &self.parent_mount_ns {
            let _ = cmd.env(PARENT_MOUNT_NS_MARKER, id);
        }
        cmd
    }

    /// Replaces the current process with the helper invocation.
    ///
    /// # Errors
    ///
    /// Only returns when the exec itself fails.
    pub fn exec(&self, set: &NamespaceSet, extra_args: &[String]) -> Result<Infallible> {
        tracing::info!(
            helper = %self.helper.display(),
            namespaces = %set,
            "re-executing inside new namespaces"
        );
        let err = self.command(set, extra_args).exec();
        Err(NschrootError::Capability {
            mechanism: "namespace helper",
            message: format!("{}: {err}", self.helper.display()),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::ffi::OsStr;

    use super::*;

    fn reexec() -> Reexec {
        Reexec {
            helper: PathBuf::from("/usr/bin/unshare"),
            program: PathBuf::from("/usr/local/bin/nschroot"),
            args: vec!["--keep-env".into(), "/srv/root".into()],
            parent_mount_ns: Some("mnt:[4026531841]".into()),
        }
    }

    fn args(cmd: &Command) -> Vec<&OsStr> {
        cmd.get_args().collect()
    }

    #[test]
    fn command_lists_namespaces_then_program_and_original_args() {
        let set: NamespaceSet = [NamespaceKind::Mount, NamespaceKind::Uts].into_iter().collect();
        let cmd = reexec().command(&set, &[]);
        assert_eq!(cmd.get_program(), "/usr/bin/unshare");
        assert_eq!(
            args(&cmd),
            vec!["--mount", "--uts", "--", "/usr/local/bin/nschroot", "--keep-env", "/srv/root"]
        );
    }

    #[test]
    fn pid_and_user_namespaces_add_helper_flags() {
        let set: NamespaceSet = [NamespaceKind::Mount, NamespaceKind::Pid, NamespaceKind::User]
            .into_iter()
            .collect();
        let cmd = reexec().command(&set, &["--propagation=private".to_owned()]);
        let argv = args(&cmd);
        assert_eq!(
            &argv[..6],
            &["--mount", "--pid", "--user", "--fork", "--map-root-user", "--propagation=private"]
        );
    }

    #[test]
    fn markers_are_exported() {
        let set: NamespaceSet = [NamespaceKind::Mount].into_iter().collect();
        let cmd = reexec().command(&set, &[]);
        let envs: Vec<_> = cmd.get_envs().collect();
        assert!(envs.contains(&(OsStr::new(REEXEC_MARKER), Some(OsStr::new("1")))));
        assert!(envs.contains(&(OsStr::new(NAMESPACES_MARKER), Some(OsStr::new("mount")))));
        assert!(envs.contains(&(
            OsStr::new(PARENT_MOUNT_NS_MARKER),
            Some(OsStr::new("mnt:[4026531841]"))
        )));
    }
}
