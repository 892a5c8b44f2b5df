//! Command-line definition and conversion into a [`Configuration`].

use std::path::{Path, PathBuf};

use clap::Parser;
use nschroot_common::config::{Configuration, FileConfig};
use nschroot_common::constants::DEFAULT_CONFIG_FILE;
use nschroot_common::error::{NschrootError, Result};
use nschroot_common::types::NamespaceKind;

/// Runs a command or shell chrooted into a directory tree inside fresh
/// Linux namespaces.
#[derive(Parser, Debug)]
#[command(name = "nschroot", version, about, long_about = None)]
pub struct Cli {
    /// Directory to chroot into.
    pub target: PathBuf,

    /// Command to run inside the tree. Defaults to a login shell.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "COMMAND")]
    pub command: Vec<String>,

    /// Additional bind mount, as `source[:target[:options]]`.
    #[arg(short = 'b', long = "bind-mount", value_name = "SPEC")]
    pub bind_mounts: Vec<String>,

    /// Cgroup to join under the unified hierarchy.
    #[arg(short = 'c', long)]
    pub cgroup: Option<String>,

    /// Configuration file. Defaults to the system file when present.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Environment variable to forward into the tree.
    #[arg(short = 'e', long = "env", value_name = "NAME")]
    pub env: Vec<String>,

    /// Additional namespace to enter.
    #[arg(short = 'n', long = "namespace", value_name = "KIND")]
    pub namespaces: Vec<NamespaceKind>,

    /// Extra argument passed to the namespace helper.
    #[arg(short = 'u', long = "unshare-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub unshare_args: Vec<String>,

    /// Hostname inside the UTS namespace.
    #[arg(short = 'H', long)]
    pub hostname: Option<String>,

    /// Keep the calling environment instead of sanitizing it.
    #[arg(short = 'k', long)]
    pub keep_env: bool,

    /// Namespace not to enter. `mount` is rejected.
    #[arg(short = 'o', long = "omit-namespace", value_name = "KIND")]
    pub omit_namespaces: Vec<NamespaceKind>,

    /// Forward `SHELLOPTS` into the tree.
    #[arg(short = 's', long)]
    pub shellopts: bool,

    /// Additional tmpfs mount, as `path[:mode]`.
    #[arg(short = 't', long = "tmpfs", value_name = "SPEC")]
    pub tmpfs: Vec<String>,

    /// Log filter, e.g. `debug` or `nschroot_core=trace`. Overrides `RUST_LOG`.
    #[arg(long, value_name = "FILTER")]
    pub log_level: Option<String>,
}

impl Cli {
    /// Merges built-in defaults, the configuration file and these
    /// arguments, in increasing precedence.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file cannot be loaded or the
    /// target path cannot be made absolute.
    pub fn into_configuration(self) -> Result<Configuration> {
        self.into_configuration_with(Path::new(DEFAULT_CONFIG_FILE))
    }

    fn into_configuration_with(self, default_file: &Path) -> Result<Configuration> {
        let target = std::path::absolute(&self.target).map_err(|e| NschrootError::Io {
            path: self.target.clone(),
            source: e,
        })?;
        let mut config = Configuration::with_defaults(target)?;

        if let Some(file) = load_file(self.config.as_deref(), default_file)? {
            config.apply_file(file);
        }

        config.cli_mounts = self.bind_mounts;
        config.cli_tmpfs = self.tmpfs;
        config.env.extend(self.env);
        config.extra_namespaces = self.namespaces;
        config.omit_namespaces.extend(self.omit_namespaces);
        config.unshare_args.extend(self.unshare_args);
        if self.hostname.is_some() {
            config.hostname = self.hostname;
        }
        if self.cgroup.is_some() {
            config.cgroup = self.cgroup;
        }
        config.keep_env |= self.keep_env;
        config.shellopts |= self.shellopts;
        config.command = self.command;
        Ok(config)
    }
}

/// Loads the explicit file, which must exist, or the default file when
/// it is present.
fn load_file(explicit: Option<&Path>, default_file: &Path) -> Result<Option<FileConfig>> {
    match explicit {
        Some(path) => FileConfig::load(path).map(Some),
        None if default_file.is_file() => {
            tracing::debug!(path = %default_file.display(), "loading default configuration");
            FileConfig::load(default_file).map(Some)
        }
        None => Ok(None),
    }
}
