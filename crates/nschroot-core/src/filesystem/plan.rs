//! Mount plan construction.
//!
//! Merges the built-in tables, the configuration file and the command
//! line into the final tmpfs and bind-mount mappings. Nothing here
//! mutates the filesystem; the only filesystem access is the existence
//! check on command-line bind sources.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use nschroot_common::config::Configuration;
use nschroot_common::constants::{DEFAULT_MOUNTS, DEFAULT_TMPFS, SSH_AUTH_SOCK_VAR};
use nschroot_common::error::{NschrootError, Result};
use nschroot_common::types::TmpfsMode;

use super::spec::{BindMount, BindOptions, parse_bind_mount, parse_tmpfs};
use crate::host::HostEnv;

/// Bind mounts keyed by source path.
pub type MountSpec = BTreeMap<PathBuf, BindMount>;

/// Tmpfs mounts keyed by path inside the target root.
pub type TmpfsSpec = BTreeMap<PathBuf, TmpfsMode>;

/// What happens to the SSH agent socket variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SshAgent {
    /// No socket variable in the calling environment, or the whole
    /// environment is kept.
    Untouched,
    /// The socket directory lives under a tmpfs and is bind mounted;
    /// the variable is forwarded with this value.
    Forward(String),
    /// The socket would be unreachable inside the root; the variable is
    /// not forwarded.
    Drop,
}

/// Fully resolved mount plan for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountPlan {
    /// Tmpfs mounts, applied before any bind mount.
    pub tmpfs: TmpfsSpec,
    /// Bind mounts.
    pub binds: MountSpec,
    /// SSH agent handling decided while planning.
    pub ssh_agent: SshAgent,
}

impl MountPlan {
    /// Builds the plan from the configuration and the caller's environment.
    ///
    /// Mount merge order, later entries overriding earlier ones with the
    /// same source: built-in defaults (or the file's full replacement),
    /// file additions, command-line entries. Tmpfs: built-in defaults (or
    /// the file's replacement), then command-line entries.
    ///
    /// # Errors
    ///
    /// Returns an argument error for a malformed specification, a
    /// relative source, or a command-line source that does not exist.
    pub fn build(config: &Configuration, host: &HostEnv) -> Result<Self> {
        let mut binds = MountSpec::new();
        match &config.file_mounts {
            Some(replacement) => insert_binds(&mut binds, replacement)?,
            None => insert_binds(&mut binds, DEFAULT_MOUNTS)?,
        }
        insert_binds(&mut binds, &config.file_extra_mounts)?;
        for spec in &config.cli_mounts {
            let (source, entry) = parse_bind_mount(spec)?;
            let source = std::path::absolute(&source).map_err(|e| NschrootError::Io {
                path: source.clone(),
                source: e,
            })?;
            if !source.exists() {
                return Err(NschrootError::argument(format!(
                    "bind mount source does not exist: {}",
                    source.display()
                )));
            }
            let _ = binds.insert(source, entry);
        }

        let mut tmpfs = TmpfsSpec::new();
        match &config.file_tmpfs {
            Some(replacement) => insert_tmpfs(&mut tmpfs, replacement)?,
            None => insert_tmpfs(&mut tmpfs, DEFAULT_TMPFS)?,
        }
        insert_tmpfs(&mut tmpfs, &config.cli_tmpfs)?;

        let ssh_agent = if config.keep_env {
            SshAgent::Untouched
        } else {
            plan_ssh_agent(host, &tmpfs, &mut binds)
        };

        tracing::debug!(
            tmpfs = tmpfs.len(),
            binds = binds.len(),
            ssh_agent = ?ssh_agent,
            "mount plan built"
        );
        Ok(Self {
            tmpfs,
            binds,
            ssh_agent,
        })
    }

    /// Returns the tmpfs mount that `path` (inside the root) lies strictly
    /// beneath, if any.
    #[must_use]
    pub fn covering_tmpfs(&self, path: &Path) -> Option<&Path> {
        covering_tmpfs(&self.tmpfs, path)
    }
}

fn covering_tmpfs<'a>(tmpfs: &'a TmpfsSpec, path: &Path) -> Option<&'a Path> {
    tmpfs
        .keys()
        .find(|t| path != t.as_path() && path.starts_with(t))
        .map(PathBuf::as_path)
}

/// Bind the agent socket's directory when it would otherwise be hidden
/// under a fresh tmpfs, drop the variable when the socket cannot be
/// reached at all.
fn plan_ssh_agent(host: &HostEnv, tmpfs: &TmpfsSpec, binds: &mut MountSpec) -> SshAgent {
    let Some(sock) = host.get(SSH_AUTH_SOCK_VAR) else {
        return SshAgent::Untouched;
    };
    let Some(dir) = Path::new(sock).parent().filter(|d| d.is_absolute()) else {
        return SshAgent::Drop;
    };
    if covering_tmpfs(tmpfs, dir).is_none() || !dir.is_dir() {
        return SshAgent::Drop;
    }
    let _ = binds.entry(dir.to_path_buf()).or_insert(BindMount {
        target: None,
        options: BindOptions::default(),
        optional: false,
    });
    SshAgent::Forward(sock.to_owned())
}

fn insert_binds<S: AsRef<str>>(binds: &mut MountSpec, specs: &[S]) -> Result<()> {
    for spec in specs {
        let (source, entry) = parse_bind_mount(spec.as_ref())?;
        if !source.is_absolute() {
            return Err(NschrootError::argument(format!(
                "mount source must be absolute: {}",
                spec.as_ref()
            )));
        }
        let _ = binds.insert(source, entry);
    }
    Ok(())
}

fn insert_tmpfs<S: AsRef<str>>(tmpfs: &mut TmpfsSpec, specs: &[S]) -> Result<()> {
    for spec in specs {
        let (path, mode) = parse_tmpfs(spec.as_ref())?;
        let _ = tmpfs.insert(path, mode);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Configuration {
        Configuration::with_defaults("/srv/root").unwrap()
    }

    #[test]
    fn defaults_produce_proc_sys_dev_and_tmp_run() {
        let plan = MountPlan::build(&config(), &HostEnv::default()).unwrap();
        for src in ["/proc", "/sys", "/dev"] {
            let entry = &plan.binds[Path::new(src)];
            assert!(entry.options.recursive, "{src} should be rbind");
            assert!(!entry.optional);
        }
        assert!(plan.binds[Path::new("/etc/resolv.conf")].optional);
        assert_eq!(plan.tmpfs[Path::new("/tmp")], TmpfsMode::Explicit(0o1777));
        assert_eq!(plan.tmpfs[Path::new("/run")], TmpfsMode::Default);
        assert_eq!(plan.ssh_agent, SshAgent::Untouched);
    }

    #[test]
    fn cli_mount_overrides_default_options() {
        let mut cfg = config();
        cfg.cli_mounts.push("/dev::ro".into());
        let plan = MountPlan::build(&cfg, &HostEnv::default()).unwrap();
        let dev = &plan.binds[Path::new("/dev")];
        assert!(dev.options.read_only);
        assert!(!dev.options.recursive);
    }

    #[test]
    fn file_replacement_removes_defaults() {
        let mut cfg = config();
        cfg.file_mounts = Some(vec!["/proc::rbind".into()]);
        cfg.file_extra_mounts = vec!["/srv/data:/data".into()];
        let plan = MountPlan::build(&cfg, &HostEnv::default()).unwrap();
        let sources: Vec<_> = plan.binds.keys().cloned().collect();
        assert_eq!(
            sources,
            vec![PathBuf::from("/proc"), PathBuf::from("/srv/data")]
        );
    }

    #[test]
    fn tmpfs_replacement_then_cli() {
        let mut cfg = config();
        cfg.file_tmpfs = Some(vec!["/var/tmp".into()]);
        cfg.cli_tmpfs = vec!["/var/tmp:700".into(), "/scratch".into()];
        let plan = MountPlan::build(&cfg, &HostEnv::default()).unwrap();
        assert_eq!(plan.tmpfs.len(), 2);
        assert_eq!(plan.tmpfs[Path::new("/var/tmp")], TmpfsMode::Explicit(0o700));
        assert!(!plan.tmpfs.contains_key(Path::new("/tmp")));
    }

    #[test]
    fn missing_cli_source_is_an_argument_error() {
        let mut cfg = config();
        cfg.cli_mounts.push("/nonexistent/nschroot-src:/foo".into());
        let err = MountPlan::build(&cfg, &HostEnv::default()).unwrap_err();
        assert!(err.is_argument());
        assert!(err.to_string().contains("/nonexistent/nschroot-src"));
    }

    #[test]
    fn relative_config_source_is_rejected() {
        let mut cfg = config();
        cfg.file_extra_mounts.push("srv".into());
        assert!(MountPlan::build(&cfg, &HostEnv::default()).is_err());
    }

    #[test]
    fn building_twice_yields_identical_plans() {
        let mut cfg = config();
        cfg.cli_tmpfs.push("/scratch:1777".into());
        let host = HostEnv::default();
        assert_eq!(
            MountPlan::build(&cfg, &host).unwrap(),
            MountPlan::build(&cfg, &host).unwrap()
        );
    }

    #[test]
    fn ssh_socket_under_tmpfs_is_bound() {
        let dir = tempfile::tempdir().unwrap();
        let sock = dir.path().join("agent.1");
        let mut cfg = config();
        let parent = dir.path().parent().unwrap().to_string_lossy().into_owned();
        cfg.cli_tmpfs.push(parent);
        let host: HostEnv = [(SSH_AUTH_SOCK_VAR, sock.to_string_lossy().into_owned())]
            .into_iter()
            .collect();
        let plan = MountPlan::build(&cfg, &host).unwrap();
        assert_eq!(
            plan.ssh_agent,
            SshAgent::Forward(sock.to_string_lossy().into_owned())
        );
        assert!(plan.binds.contains_key(dir.path()));
    }

    #[test]
    fn ssh_socket_outside_tmpfs_is_dropped() {
        let host: HostEnv = [(SSH_AUTH_SOCK_VAR, "/home/u/.ssh/agent.sock")]
            .into_iter()
            .collect();
        let plan = MountPlan::build(&config(), &host).unwrap();
        assert_eq!(plan.ssh_agent, SshAgent::Drop);
        assert!(!plan.binds.contains_key(Path::new("/home/u/.ssh")));
    }

    #[test]
    fn keep_env_leaves_ssh_socket_alone() {
        let mut cfg = config();
        cfg.keep_env = true;
        let host: HostEnv = [(SSH_AUTH_SOCK_VAR, "/tmp/ssh-x/agent.1")].into_iter().collect();
        let plan = MountPlan::build(&cfg, &host).unwrap();
        assert_eq!(plan.ssh_agent, SshAgent::Untouched);
    }

    #[test]
    fn covering_tmpfs_excludes_the_mount_point_itself() {
        let plan = MountPlan::build(&config(), &HostEnv::default()).unwrap();
        assert_eq!(plan.covering_tmpfs(Path::new("/tmp/x/y")), Some(Path::new("/tmp")));
        assert_eq!(plan.covering_tmpfs(Path::new("/tmp")), None);
        assert_eq!(plan.covering_tmpfs(Path::new("/tmpfoo")), None);
    }
}
