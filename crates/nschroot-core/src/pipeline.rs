//! The two phases of a run.
//!
//! [`check_and_reexec`] runs in the original process and never returns on
//! success. [`run_in_namespace`] runs in the re-executed process, sets up
//! the sandbox, and also never returns on success.

use std::convert::Infallible;
use std::path::Path;

use nschroot_common::config::Configuration;
use nschroot_common::constants::CGROUP_V2_PATH;
use nschroot_common::error::Result;
use nschroot_common::types::{NamespaceKind, NamespaceSet};

use crate::cgroup::{self, CgroupOutcome, CgroupSpec, ControllerHooks};
use crate::filesystem::executor::execute_plan;
use crate::filesystem::mount::KernelMounts;
use crate::filesystem::plan::MountPlan;
use crate::handoff::{self, env::build_environment, shell};
use crate::host::HostEnv;
use crate::namespace::ensure_new_mount_namespace;
use crate::namespace::support::{KernelSupport, resolve_namespaces};
use crate::namespace::reexec::Reexec;
use crate::namespace::uts::set_hostname;

/// First phase: validate, check namespace support, then re-exec through
/// the namespace helper.
///
/// The mount plan is built here as well so that bad mount arguments fail
/// before any namespace exists.
///
/// # Errors
///
/// Returns argument errors from validation and planning, a namespace
/// error if the mount namespace is unsupported, and a capability error if
/// the helper cannot be run.
pub fn check_and_reexec(config: &Configuration, host: &HostEnv) -> Result<Infallible> {
    config.validate()?;
    let _ = MountPlan::build(config, host)?;
    let set = resolve_namespaces(config, &KernelSupport)?;
    Reexec::locate()?.exec(&set, &config.unshare_args)
}

/// Second phase: mounts, cgroup, hostname, environment, chroot and exec.
///
/// # Errors
///
/// Returns the first fatal failure. Cgroup failures are logged as
/// warnings and do not stop the run.
pub fn run_in_namespace(
    config: &Configuration,
    namespaces: &NamespaceSet,
    host: &HostEnv,
) -> Result<Infallible> {
    config.validate()?;
    tracing::debug!(namespaces = %namespaces, "running inside namespaces");
    ensure_new_mount_namespace(host)?;

    let plan = MountPlan::build(config, host)?;
    let _ = execute_plan(&plan, &config.target, &mut KernelMounts)?;

    let _ = join_cgroup(config, Path::new(CGROUP_V2_PATH));

    let hostname = config.hostname();
    if namespaces.contains(NamespaceKind::Uts) {
        set_hostname(&hostname)?;
    }

    let env = build_environment(config, host, &hostname, &plan.ssh_agent);
    let command = shell::resolve_command(
        &config.target,
        &config.command,
        host,
        shell::caller_login_shell(),
    )?;
    handoff::exec_in_root(&config.target, &command, &env)
}

/// Joins the configured cgroup under `hierarchy`, warning on failure.
pub fn join_cgroup(config: &Configuration, hierarchy: &Path) -> Option<CgroupOutcome> {
    let outcome = CgroupSpec::resolve(hierarchy, config.cgroup_name(), &config.cgroup_controllers)
        .and_then(|spec| {
            cgroup::attach(
                hierarchy,
                &spec,
                &config.limits,
                &ControllerHooks::builtin(),
                std::process::id(),
            )
        });
    match outcome {
        Ok(outcome) => Some(outcome),
        Err(e) => {
            tracing::warn!(error = %e, "cgroup setup failed, continuing without it");
            None
        }
    }
}
