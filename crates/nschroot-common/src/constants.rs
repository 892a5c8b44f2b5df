//! System-wide constants and default paths.

/// Application name used in diagnostics.
pub const APP_NAME: &str = "nschroot";

/// Default configuration file, read when present.
pub const DEFAULT_CONFIG_FILE: &str = "/etc/nschroot/config.yaml";

/// Cgroups v2 unified hierarchy mount point.
pub const CGROUP_V2_PATH: &str = "/sys/fs/cgroup";

/// Default cgroup created under the unified hierarchy.
pub const DEFAULT_CGROUP_NAME: &str = "nschroot";

/// Environment marker set on the re-executed process.
pub const REEXEC_MARKER: &str = "NSCHROOT_REEXEC";

/// Environment variable carrying the resolved namespace set across re-exec.
pub const NAMESPACES_MARKER: &str = "NSCHROOT_NAMESPACES";

/// Environment variable carrying the pre-exec mount namespace id, used to
/// confirm a new mount namespace was actually entered.
pub const PARENT_MOUNT_NS_MARKER: &str = "NSCHROOT_PARENT_MNTNS";

/// Variable exported to the final command with the sandbox hostname.
pub const CHROOT_VAR: &str = "CHROOT";

/// SSH agent socket variable.
pub const SSH_AUTH_SOCK_VAR: &str = "SSH_AUTH_SOCK";

/// Bash shell-options variable.
pub const SHELLOPTS_VAR: &str = "SHELLOPTS";

/// Helper binary used to create namespaces around the re-executed process.
pub const UNSHARE_BIN: &str = "unshare";

/// `PATH` used when the calling environment has none.
pub const DEFAULT_PATH: &str = "/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin";

/// Last-resort shell inside the target tree.
pub const FALLBACK_SHELL: &str = "/bin/sh";

/// Permission mode for tmpfs mounts without an explicit mode.
pub const DEFAULT_TMPFS_MODE: u32 = 0o755;

/// Prefix on a mount source marking the mount as optional.
pub const OPTIONAL_MOUNT_PREFIX: char = '?';

/// Default bind mounts as `source[:target[:options]]` strings.
pub const DEFAULT_MOUNTS: &[&str] = &[
    "/proc::rbind",
    "/sys::rbind",
    "/dev::rbind",
    "?/etc/resolv.conf::ro",
];

/// Default tmpfs mounts as `path[:mode]` strings.
pub const DEFAULT_TMPFS: &[&str] = &["/tmp:1777", "/run"];

/// Namespaces requested when nothing else is configured.
pub const DEFAULT_NAMESPACES: &[&str] = &["mount", "uts", "ipc"];

/// Namespaces requested on every run.
pub const FORCED_NAMESPACES: &[&str] = &["mount"];
