//! Namespace support checks.
//!
//! Each candidate kind is tested by forking a child that unshares only
//! that kind and exits. The mount namespace is mandatory; every other
//! kind silently drops out when unsupported.

use nix::sched::unshare;
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::{ForkResult, fork};
use nschroot_common::config::Configuration;
use nschroot_common::error::{NschrootError, Result};
use nschroot_common::types::{NamespaceKind, NamespaceSet};

use super::clone_flag;

/// Answers whether the kernel lets this process create a namespace kind.
pub trait SupportCheck {
    /// Returns `true` if `kind` can be created.
    fn supports(&self, kind: NamespaceKind) -> bool;
}

/// [`SupportCheck`] that forks a throwaway child per kind.
#[derive(Debug, Default, Clone, Copy)]
pub struct KernelSupport;

impl SupportCheck for KernelSupport {
    fn supports(&self, kind: NamespaceKind) -> bool {
        // SAFETY: the process is single-threaded during setup, and the
        // child only calls async-signal-safe unshare(2) and _exit(2).
        match unsafe { fork() } {
            Ok(ForkResult::Child) => {
                let code = i32::from(unshare(clone_flag(kind)).is_err());
                // SAFETY: _exit(2) is async-signal-safe and never returns.
                unsafe { libc::_exit(code) }
            }
            Ok(ForkResult::Parent { child }) => {
                let supported = matches!(waitpid(child, None), Ok(WaitStatus::Exited(_, 0)));
                tracing::debug!(namespace = %kind, supported, "checked namespace support");
                supported
            }
            Err(e) => {
                tracing::debug!(namespace = %kind, error = %e, "fork failed while checking support");
                false
            }
        }
    }
}

/// Computes the namespaces to enter for this run.
///
/// Candidates are the mount namespace, the forced kinds, the configured
/// kinds and the command-line kinds, in that order. Omitted kinds are
/// removed unless forced.
///
/// # Errors
///
/// Returns an argument error when the mount namespace is omitted, and a
/// namespace error when the kernel cannot create a mount namespace.
pub fn resolve_namespaces(config: &Configuration, support: &impl SupportCheck) -> Result<NamespaceSet> {
    if config.omit_namespaces.contains(&NamespaceKind::Mount) {
        return Err(NschrootError::argument(
            "the mount namespace cannot be omitted",
        ));
    }

    let mut candidates = NamespaceSet::new();
    let _ = candidates.insert(NamespaceKind::Mount);
    candidates.extend(config.forced_namespaces.iter().copied());
    candidates.extend(config.namespaces.iter().copied());
    candidates.extend(config.extra_namespaces.iter().copied());

    let mut resolved = NamespaceSet::new();
    for kind in candidates.iter() {
        let forced = kind == NamespaceKind::Mount || config.forced_namespaces.contains(&kind);
        if !forced && config.omit_namespaces.contains(&kind) {
            tracing::debug!(namespace = %kind, "namespace omitted by configuration");
            continue;
        }
        if support.supports(kind) {
            let _ = resolved.insert(kind);
        } else if kind == NamespaceKind::Mount {
            return Err(NschrootError::Namespace {
                kind: kind.as_str(),
                message: "kernel refused to create a mount namespace".into(),
            });
        } else {
            tracing::info!(namespace = %kind, "namespace unsupported, not requested");
        }
    }

    tracing::info!(namespaces = %resolved, "namespaces resolved");
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Supports(Vec<NamespaceKind>);

    impl SupportCheck for Supports {
        fn supports(&self, kind: NamespaceKind) -> bool {
            self.0.contains(&kind)
        }
    }

    fn config() -> Configuration {
        Configuration::with_defaults("/srv/root").unwrap()
    }

    #[test]
    fn kernel_check_reaps_its_child() {
        // Either answer is valid; unprivileged hosts usually refuse.
        let first = KernelSupport.supports(NamespaceKind::Uts);
        let second = KernelSupport.supports(NamespaceKind::Uts);
        assert_eq!(first, second);
    }

    #[test]
    fn unsupported_optional_kinds_drop_out() {
        let set = resolve_namespaces(
            &config(),
            &Supports(vec![NamespaceKind::Mount, NamespaceKind::Ipc]),
        )
        .unwrap();
        assert_eq!(set.encode(), "mount,ipc");
    }

    #[test]
    fn unsupported_mount_namespace_is_fatal() {
        let err = resolve_namespaces(&config(), &Supports(vec![NamespaceKind::Uts])).unwrap_err();
        assert!(matches!(err, NschrootError::Namespace { kind: "mount", .. }));
    }

    #[test]
    fn omitting_mount_is_an_argument_error() {
        let mut cfg = config();
        cfg.omit_namespaces.push(NamespaceKind::Mount);
        let err = resolve_namespaces(&cfg, &Supports(NamespaceKind::ALL.to_vec())).unwrap_err();
        assert!(err.is_argument());
    }

    #[test]
    fn omit_removes_configured_but_not_forced_kinds() {
        let mut cfg = config();
        cfg.forced_namespaces.push(NamespaceKind::Pid);
        cfg.extra_namespaces.push(NamespaceKind::Net);
        cfg.omit_namespaces = vec![NamespaceKind::Uts, NamespaceKind::Pid, NamespaceKind::Net];
        let set = resolve_namespaces(&cfg, &Supports(NamespaceKind::ALL.to_vec())).unwrap();
        assert_eq!(set.encode(), "mount,pid,ipc");
    }

    #[test]
    fn mount_is_always_present() {
        let mut cfg = config();
        cfg.forced_namespaces.clear();
        cfg.namespaces = vec![NamespaceKind::Uts];
        let set = resolve_namespaces(&cfg, &Supports(NamespaceKind::ALL.to_vec())).unwrap();
        assert!(set.contains(NamespaceKind::Mount));
    }

    #[test]
    fn extra_kinds_are_appended_once() {
        let mut cfg = config();
        cfg.extra_namespaces = vec![NamespaceKind::Uts, NamespaceKind::Cgroup];
        let set = resolve_namespaces(&cfg, &Supports(NamespaceKind::ALL.to_vec())).unwrap();
        assert_eq!(set.encode(), "mount,uts,ipc,cgroup");
    }
}
