//! Configuration model: the on-disk YAML file and the resolved,
//! read-only [`Configuration`] snapshot consumed by the core pipeline.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{NschrootError, Result};
use crate::types::{NamespaceKind, ResourceLimits};

/// Contents of the YAML configuration file. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Full replacement of the built-in bind mounts.
    pub mounts: Option<Vec<String>>,
    /// Bind mounts added on top of the defaults (or replacement).
    pub extra_mounts: Vec<String>,
    /// Full replacement of the built-in tmpfs mounts.
    pub tmpfs: Option<Vec<String>>,
    /// Namespaces to request instead of the built-in list.
    pub namespaces: Option<Vec<NamespaceKind>>,
    /// Namespaces never to request.
    pub omit_namespaces: Vec<NamespaceKind>,
    /// Cgroup name under the unified hierarchy.
    pub cgroup: Option<String>,
    /// Controllers to enable for the cgroup.
    pub cgroup_controllers: Vec<String>,
    /// Limits handed to the controller hooks.
    pub limits: ResourceLimits,
    /// Variable names forwarded into the sandbox.
    pub env: Vec<String>,
    /// Hostname inside the UTS namespace.
    pub hostname: Option<String>,
    /// Forward the whole calling environment.
    pub keep_env: bool,
    /// Forward `SHELLOPTS`.
    pub shellopts: bool,
    /// Extra arguments for the namespace helper.
    pub unshare_args: Vec<String>,
}

impl FileConfig {
    /// Parses a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid YAML
    /// for this schema.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| NschrootError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&text, path)
    }

    /// Parses configuration text. `origin` is only used in diagnostics.
    ///
    /// # Errors
    ///
    /// Returns an error if the text does not match the schema.
    pub fn parse(text: &str, origin: &Path) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).map_err(|e| NschrootError::Config {
            path: origin.to_path_buf(),
            source: e,
        })
    }
}

/// Fully merged inputs of one run. Built once, then read-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    /// Directory to chroot into.
    pub target: PathBuf,
    /// Configured namespace kinds (file list or built-in defaults).
    pub namespaces: Vec<NamespaceKind>,
    /// Kinds always requested.
    pub forced_namespaces: Vec<NamespaceKind>,
    /// Kinds never requested.
    pub omit_namespaces: Vec<NamespaceKind>,
    /// Kinds added on the command line.
    pub extra_namespaces: Vec<NamespaceKind>,
    /// Extra arguments for the namespace helper.
    pub unshare_args: Vec<String>,
    /// Hostname override.
    pub hostname: Option<String>,
    /// Cgroup name override.
    pub cgroup: Option<String>,
    /// Controllers to enable.
    pub cgroup_controllers: Vec<String>,
    /// Limits handed to the controller hooks.
    pub limits: ResourceLimits,
    /// Forward the whole calling environment.
    pub keep_env: bool,
    /// Forward `SHELLOPTS`.
    pub shellopts: bool,
    /// Variable names forwarded into the sandbox.
    pub env: Vec<String>,
    /// Replacement mount list from the configuration file.
    pub file_mounts: Option<Vec<String>>,
    /// Additional mounts from the configuration file.
    pub file_extra_mounts: Vec<String>,
    /// Mounts given on the command line.
    pub cli_mounts: Vec<String>,
    /// Replacement tmpfs list from the configuration file.
    pub file_tmpfs: Option<Vec<String>>,
    /// Tmpfs mounts given on the command line.
    pub cli_tmpfs: Vec<String>,
    /// Command to run. Empty means an interactive shell.
    pub command: Vec<String>,
}

impl Configuration {
    /// Creates a configuration for `target` with built-in defaults only.
    ///
    /// # Errors
    ///
    /// Returns an error if a built-in namespace name fails to parse.
    pub fn with_defaults(target: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            target: target.into(),
            namespaces: parse_kinds(constants::DEFAULT_NAMESPACES)?,
            forced_namespaces: parse_kinds(constants::FORCED_NAMESPACES)?,
            omit_namespaces: Vec::new(),
            extra_namespaces: Vec::new(),
            unshare_args: Vec::new(),
            hostname: None,
            cgroup: None,
            cgroup_controllers: Vec::new(),
            limits: ResourceLimits::default(),
            keep_env: false,
            shellopts: false,
            env: Vec::new(),
            file_mounts: None,
            file_extra_mounts: Vec::new(),
            cli_mounts: Vec::new(),
            file_tmpfs: None,
            cli_tmpfs: Vec::new(),
            command: Vec::new(),
        })
    }

    /// Layers a configuration file over the built-in defaults.
    pub fn apply_file(&mut self, file: FileConfig) {
        if let Some(namespaces) = file.namespaces {
            self.namespaces = namespaces;
        }
        self.omit_namespaces.extend(file.omit_namespaces);
        self.unshare_args.extend(file.unshare_args);
        self.hostname = file.hostname.or_else(|| self.hostname.take());
        self.cgroup = file.cgroup.or_else(|| self.cgroup.take());
        self.cgroup_controllers.extend(file.cgroup_controllers);
        self.limits = file.limits;
        self.keep_env |= file.keep_env;
        self.shellopts |= file.shellopts;
        self.env.extend(file.env);
        self.file_mounts = file.mounts;
        self.file_extra_mounts = file.extra_mounts;
        self.file_tmpfs = file.tmpfs;
    }

    /// Checks the argument-level invariants that must hold before any
    /// namespace or mount work begins.
    ///
    /// # Errors
    ///
    /// Returns an argument error for a missing target, a target that is
    /// not a directory, an invalid hostname override, or an attempt to
    /// omit the mount namespace.
    pub fn validate(&self) -> Result<()> {
        if self.target.as_os_str().is_empty() {
            return Err(NschrootError::argument("missing target directory"));
        }
        if !self.target.is_dir() {
            return Err(NschrootError::argument(format!(
                "target is not an existing directory: {}",
                self.target.display()
            )));
        }
        if self.omit_namespaces.contains(&NamespaceKind::Mount) {
            return Err(NschrootError::argument(
                "the mount namespace cannot be omitted",
            ));
        }
        if let Some(hostname) = &self.hostname {
            validate_hostname(hostname)?;
        }
        Ok(())
    }

    /// Hostname for the UTS namespace: the override, or the basename of
    /// the target directory made hostname-safe.
    #[must_use]
    pub fn hostname(&self) -> String {
        self.hostname.clone().unwrap_or_else(|| {
            self.target
                .file_name()
                .map(|n| hostname_from_basename(&n.to_string_lossy()))
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| constants::APP_NAME.to_owned())
        })
    }

    /// Cgroup name: the override or [`constants::DEFAULT_CGROUP_NAME`].
    #[must_use]
    pub fn cgroup_name(&self) -> &str {
        self.cgroup
            .as_deref()
            .unwrap_or(constants::DEFAULT_CGROUP_NAME)
    }
}

/// Rejects hostnames the UTS namespace should never carry.
///
/// # Errors
///
/// Returns an argument error if the name is empty, longer than 64 bytes,
/// contains `.` or whitespace, or starts with `-`.
pub fn validate_hostname(name: &str) -> Result<()> {
    let invalid = name.is_empty()
        || name.len() > 64
        || name.starts_with('-')
        || name.contains('.')
        || name.chars().any(|c| c.is_whitespace() || c == '/');
    if invalid {
        return Err(NschrootError::argument(format!("invalid hostname: {name}")));
    }
    Ok(())
}

/// Maps `.`, `/` and whitespace to `-`, trims leading `-` and caps the
/// result at 64 bytes.
fn hostname_from_basename(base: &str) -> String {
    let mapped: String = base
        .chars()
        .map(|c| if c == '.' || c == '/' || c.is_whitespace() { '-' } else { c })
        .collect();
    let mut name = mapped.trim_start_matches('-').to_owned();
    while name.len() > 64 {
        let _ = name.pop();
    }
    name
}

fn parse_kinds(names: &[&str]) -> Result<Vec<NamespaceKind>> {
    names.iter().map(|n| n.parse()).collect()
}
