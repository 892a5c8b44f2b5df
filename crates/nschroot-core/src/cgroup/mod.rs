//! Cgroups v2 attachment.
//!
//! Creates (or reuses) a cgroup under the unified hierarchy at
//! `/sys/fs/cgroup`, moves the current process into it, enables the
//! requested controllers and runs each controller's configuration hook.
//! Every failure here is reported to the caller, which treats it as a
//! warning rather than aborting the run.

pub mod cpu;
pub mod io;
pub mod memory;
pub mod pids;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use nschroot_common::error::{NschrootError, Result};
use nschroot_common::types::ResourceLimits;

/// Resolved cgroup to join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CgroupSpec {
    /// Name relative to the hierarchy root.
    pub name: String,
    /// Absolute path of the cgroup directory.
    pub path: PathBuf,
    /// Controllers to enable.
    pub controllers: Vec<String>,
}

impl CgroupSpec {
    /// Resolves `name` under `hierarchy`.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty, absolute, or escapes the
    /// hierarchy with `..`.
    pub fn resolve(hierarchy: &Path, name: &str, controllers: &[String]) -> Result<Self> {
        let relative = Path::new(name);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, std::path::Component::Normal(_)));
        if name.is_empty() || escapes {
            return Err(NschrootError::Cgroup {
                path: relative.to_path_buf(),
                message: "cgroup name must be a relative path inside the hierarchy".into(),
            });
        }
        Ok(Self {
            name: name.to_owned(),
            path: hierarchy.join(relative),
            controllers: controllers.to_vec(),
        })
    }
}

/// Result of [`attach`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CgroupOutcome {
    /// No unified hierarchy on this host; nothing was done.
    Unavailable,
    /// The process joined the cgroup at this path.
    Joined(PathBuf),
}

/// Per-controller configuration step run after the controller is enabled.
pub trait ControllerHook {
    /// Configures `controller` for the cgroup at `cgroup`.
    ///
    /// # Errors
    ///
    /// Returns an error if a control file cannot be written.
    fn configure(&self, cgroup: &Path, limits: &ResourceLimits) -> Result<()>;
}

/// Hook for controllers without specific configuration.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHook;

impl ControllerHook for NoopHook {
    fn configure(&self, _cgroup: &Path, _limits: &ResourceLimits) -> Result<()> {
        Ok(())
    }
}

/// Lookup table from controller name to its hook.
pub struct ControllerHooks {
    hooks: HashMap<String, Box<dyn ControllerHook>>,
}

impl ControllerHooks {
    /// An empty table: every controller resolves to [`NoopHook`].
    #[must_use]
    pub fn empty() -> Self {
        Self {
            hooks: HashMap::new(),
        }
    }

    /// Table with the `cpu`, `memory`, `io` and `pids` hooks registered.
    #[must_use]
    pub fn builtin() -> Self {
        let mut hooks = Self::empty();
        hooks.register("cpu", cpu::CpuHook);
        hooks.register("memory", memory::MemoryHook);
        hooks.register("io", io::IoHook);
        hooks.register("pids", pids::PidsHook);
        hooks
    }

    /// Registers or replaces the hook for `controller`.
    pub fn register(&mut self, controller: &str, hook: impl ControllerHook + 'static) {
        let _ = self.hooks.insert(controller.to_owned(), Box::new(hook));
    }

    /// Returns the hook for `controller`, or [`NoopHook`].
    #[must_use]
    pub fn get(&self, controller: &str) -> &dyn ControllerHook {
        self.hooks
            .get(controller)
            .map_or(&NoopHook as &dyn ControllerHook, |hook| &**hook)
    }
}

impl Default for ControllerHooks {
    fn default() -> Self {
        Self::builtin()
    }
}

impl std::fmt::Debug for ControllerHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.hooks.keys().collect();
        names.sort();
        f.debug_struct("ControllerHooks").field("hooks", &names).finish()
    }
}

/// Returns whether `hierarchy` is a mounted cgroup2 root.
///
/// `cgroup.controllers` only exists in cgroup2 directories, so its
/// presence is used as the mount check.
#[must_use]
pub fn unified_hierarchy_available(hierarchy: &Path) -> bool {
    hierarchy.is_dir() && hierarchy.join("cgroup.controllers").is_file()
}

/// Joins the cgroup described by `spec` and configures its controllers.
///
/// Steps: create the directory, write `pid` to `cgroup.procs`, enable
/// the controllers through the parent's `cgroup.subtree_control`, then run
/// each controller's hook.
///
/// # Errors
///
/// Returns an error if any step fails. Callers treat this as non-fatal.
pub fn attach(
    hierarchy: &Path,
    spec: &CgroupSpec,
    limits: &ResourceLimits,
    hooks: &ControllerHooks,
    pid: u32,
) -> Result<CgroupOutcome> {
    if !unified_hierarchy_available(hierarchy) {
        tracing::debug!(hierarchy = %hierarchy.display(), "no unified cgroup hierarchy, skipping");
        return Ok(CgroupOutcome::Unavailable);
    }

    std::fs::create_dir_all(&spec.path).map_err(|e| cgroup_error(&spec.path, &e))?;

    let procs = spec.path.join("cgroup.procs");
    std::fs::write(&procs, pid.to_string()).map_err(|e| cgroup_error(&procs, &e))?;
    tracing::info!(path = %spec.path.display(), pid, "joined cgroup");

    if !spec.controllers.is_empty() {
        enable_controllers(spec)?;
        for controller in &spec.controllers {
            hooks.get(controller).configure(&spec.path, limits)?;
            tracing::debug!(%controller, "controller configured");
        }
    }
    Ok(CgroupOutcome::Joined(spec.path.clone()))
}

fn enable_controllers(spec: &CgroupSpec) -> Result<()> {
    let parent = spec.path.parent().unwrap_or(spec.path.as_path());
    let control = parent.join("cgroup.subtree_control");
    let line = spec
        .controllers
        .iter()
        .map(|c| format!("+{c}"))
        .collect::<Vec<_>>()
        .join(" ");
    std::fs::write(&control, &line).map_err(|e| cgroup_error(&control, &e))?;
    tracing::debug!(file = %control.display(), controllers = %line, "controllers enabled");
    Ok(())
}

/// Writes `value` to the control file `name` of `cgroup`.
pub(crate) fn write_control(cgroup: &Path, name: &str, value: &str) -> Result<()> {
    let file = cgroup.join(name);
    std::fs::write(&file, value).map_err(|e| cgroup_error(&file, &e))
}

fn cgroup_error(path: &Path, err: &std::io::Error) -> NschrootError {
    NschrootError::Cgroup {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}
