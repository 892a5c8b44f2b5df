//! Domain primitive types used across the nschroot workspace.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::NschrootError;

/// A Linux namespace kind that can be unshared for the sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum NamespaceKind {
    /// Mount table isolation.
    Mount,
    /// Hostname and domain name isolation.
    Uts,
    /// System V IPC and POSIX message queue isolation.
    Ipc,
    /// Network stack isolation.
    Net,
    /// Process ID isolation.
    Pid,
    /// User and group ID isolation.
    User,
    /// Cgroup root view isolation.
    Cgroup,
}

impl NamespaceKind {
    /// All kinds, in the order they are handed to the namespace helper.
    pub const ALL: [Self; 7] = [
        Self::Mount,
        Self::Uts,
        Self::Ipc,
        Self::Net,
        Self::Pid,
        Self::User,
        Self::Cgroup,
    ];

    /// Canonical lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mount => "mount",
            Self::Uts => "uts",
            Self::Ipc => "ipc",
            Self::Net => "net",
            Self::Pid => "pid",
            Self::User => "user",
            Self::Cgroup => "cgroup",
        }
    }
}

impl fmt::Display for NamespaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NamespaceKind {
    type Err = NschrootError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mount" | "mnt" => Ok(Self::Mount),
            "uts" => Ok(Self::Uts),
            "ipc" => Ok(Self::Ipc),
            "net" | "network" => Ok(Self::Net),
            "pid" => Ok(Self::Pid),
            "user" => Ok(Self::User),
            "cgroup" => Ok(Self::Cgroup),
            other => Err(NschrootError::argument(format!(
                "unknown namespace kind: {other}"
            ))),
        }
    }
}

impl TryFrom<String> for NamespaceKind {
    type Error = NschrootError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<NamespaceKind> for String {
    fn from(kind: NamespaceKind) -> Self {
        kind.as_str().to_owned()
    }
}

/// Insertion-ordered, deduplicated set of namespace kinds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceSet(Vec<NamespaceKind>);

impl NamespaceSet {
    /// Creates an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Adds a kind, returning `false` if it was already present.
    pub fn insert(&mut self, kind: NamespaceKind) -> bool {
        if self.contains(kind) {
            return false;
        }
        self.0.push(kind);
        true
    }

    /// Removes a kind if present.
    pub fn remove(&mut self, kind: NamespaceKind) {
        self.0.retain(|k| *k != kind);
    }

    /// Returns whether the kind is in the set.
    #[must_use]
    pub fn contains(&self, kind: NamespaceKind) -> bool {
        self.0.contains(&kind)
    }

    /// Iterates kinds in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = NamespaceKind> + '_ {
        self.0.iter().copied()
    }

    /// Number of kinds in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Encodes the set as a comma-separated list for the re-exec marker.
    #[must_use]
    pub fn encode(&self) -> String {
        self.0
            .iter()
            .map(|k| k.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Decodes a set produced by [`NamespaceSet::encode`].
    ///
    /// # Errors
    ///
    /// Returns an error if any element is not a known namespace kind.
    pub fn decode(encoded: &str) -> Result<Self, NschrootError> {
        encoded
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(str::parse)
            .collect()
    }
}

impl FromIterator<NamespaceKind> for NamespaceSet {
    fn from_iter<I: IntoIterator<Item = NamespaceKind>>(iter: I) -> Self {
        let mut set = Self::new();
        for kind in iter {
            let _ = set.insert(kind);
        }
        set
    }
}

impl Extend<NamespaceKind> for NamespaceSet {
    fn extend<I: IntoIterator<Item = NamespaceKind>>(&mut self, iter: I) {
        for kind in iter {
            let _ = self.insert(kind);
        }
    }
}

impl fmt::Display for NamespaceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Permission mode of a tmpfs mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TmpfsMode {
    /// Use [`crate::constants::DEFAULT_TMPFS_MODE`].
    Default,
    /// Explicit octal permission bits.
    Explicit(u32),
}

impl TmpfsMode {
    /// Resolves the numeric permission bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        match self {
            Self::Default => crate::constants::DEFAULT_TMPFS_MODE,
            Self::Explicit(mode) => mode,
        }
    }
}

impl fmt::Display for TmpfsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04o}", self.bits())
    }
}

/// Resource limits applied by the cgroup controller hooks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceLimits {
    /// Hard memory limit in bytes (`memory.max`).
    pub memory_max: Option<u64>,
    /// Memory throttling threshold in bytes (`memory.high`).
    pub memory_high: Option<u64>,
    /// Relative CPU weight, 1-10000 (`cpu.weight`).
    pub cpu_weight: Option<u64>,
    /// CPU bandwidth as `(quota_us, period_us)` (`cpu.max`).
    pub cpu_max: Option<(u64, u64)>,
    /// I/O weight, 1-10000 (`io.weight`).
    pub io_weight: Option<u16>,
    /// Maximum number of tasks (`pids.max`).
    pub pids_max: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_kind_accepts_aliases() {
        assert_eq!("mnt".parse::<NamespaceKind>().unwrap(), NamespaceKind::Mount);
        assert_eq!(
            "Network".parse::<NamespaceKind>().unwrap(),
            NamespaceKind::Net
        );
        assert!("time".parse::<NamespaceKind>().is_err());
    }

    #[test]
    fn namespace_set_deduplicates_and_keeps_order() {
        let set: NamespaceSet = [
            NamespaceKind::Uts,
            NamespaceKind::Mount,
            NamespaceKind::Uts,
            NamespaceKind::Ipc,
        ]
        .into_iter()
        .collect();
        assert_eq!(set.encode(), "uts,mount,ipc");
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn namespace_set_decode_reverses_encode() {
        let set: NamespaceSet = [NamespaceKind::Mount, NamespaceKind::Pid].into_iter().collect();
        assert_eq!(NamespaceSet::decode(&set.encode()).unwrap(), set);
        assert!(NamespaceSet::decode("").unwrap().is_empty());
        assert!(NamespaceSet::decode("mount,bogus").is_err());
    }

    #[test]
    fn tmpfs_mode_defaults_to_0755() {
        assert_eq!(TmpfsMode::Default.bits(), 0o755);
        assert_eq!(TmpfsMode::Explicit(0o1777).to_string(), "1777");
    }
}
