//! Unified error type for the nschroot workspace.
//!
//! Variants follow the failure classes of the setup pipeline. Everything
//! except [`NschrootError::Cgroup`] aborts the run.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum NschrootError {
    /// A command-line or configuration value is invalid.
    #[error("{message}")]
    Argument {
        /// Description of the invalid argument.
        message: String,
    },

    /// A required kernel or userspace mechanism is unavailable.
    #[error("{mechanism} unavailable: {message}")]
    Capability {
        /// Name of the missing mechanism.
        mechanism: &'static str,
        /// Additional detail.
        message: String,
    },

    /// A mount could not be prepared or performed.
    #[error("mount {source_path} on {target}: {message}")]
    Mount {
        /// Mount source.
        source_path: PathBuf,
        /// Mount target.
        target: PathBuf,
        /// Description of the failure.
        message: String,
    },

    /// A required namespace could not be entered.
    #[error("namespace {kind}: {message}")]
    Namespace {
        /// Namespace kind name.
        kind: &'static str,
        /// Description of the failure.
        message: String,
    },

    /// Control group setup failed. Never fatal.
    #[error("cgroup {path}: {message}")]
    Cgroup {
        /// Cgroup directory involved.
        path: PathBuf,
        /// Description of the failure.
        message: String,
    },

    /// The final process transition could not be performed.
    #[error("{message}")]
    Handoff {
        /// Description of the failure.
        message: String,
    },

    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The configuration file could not be parsed.
    #[error("invalid configuration file {path}: {source}")]
    Config {
        /// Path of the configuration file.
        path: PathBuf,
        /// Underlying parse error.
        source: serde_yaml::Error,
    },
}

impl NschrootError {
    /// Shorthand for an [`NschrootError::Argument`].
    #[must_use]
    pub fn argument(message: impl Into<String>) -> Self {
        Self::Argument {
            message: message.into(),
        }
    }

    /// Returns whether this error should be reported as a usage problem.
    #[must_use]
    pub const fn is_argument(&self) -> bool {
        matches!(self, Self::Argument { .. } | Self::Config { .. })
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, NschrootError>;
