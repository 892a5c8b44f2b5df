//! Snapshot of the calling process environment.
//!
//! Taken once at startup and passed explicitly to the stages that need
//! it, so plan building and environment construction never read ambient
//! process state. Values are kept as raw OS strings so a kept environment
//! is forwarded byte for byte.

use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};

use nschroot_common::constants::{NAMESPACES_MARKER, PARENT_MOUNT_NS_MARKER, REEXEC_MARKER};

/// Immutable copy of the caller's environment variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostEnv {
    vars: BTreeMap<OsString, OsString>,
}

impl HostEnv {
    /// Captures the current process environment.
    #[must_use]
    pub fn capture() -> Self {
        std::env::vars_os().collect()
    }

    /// Returns a non-empty UTF-8 value for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .get(OsStr::new(name))
            .and_then(|v| v.to_str())
            .filter(|v| !v.is_empty())
    }

    /// Iterates all variables except the re-exec control markers.
    pub fn exported(&self) -> impl Iterator<Item = (&OsStr, &OsStr)> {
        self.vars
            .iter()
            .filter(|(k, _)| !is_marker(k))
            .map(|(k, v)| (k.as_os_str(), v.as_os_str()))
    }
}

impl<K: Into<OsString>, V: Into<OsString>> FromIterator<(K, V)> for HostEnv {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

fn is_marker(name: &OsStr) -> bool {
    [REEXEC_MARKER, NAMESPACES_MARKER, PARENT_MOUNT_NS_MARKER]
        .iter()
        .any(|marker| name == *marker)
}
