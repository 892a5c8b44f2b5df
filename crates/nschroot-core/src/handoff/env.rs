//! Environment handed to the final command.

use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};

use nschroot_common::config::Configuration;
use nschroot_common::constants::{CHROOT_VAR, DEFAULT_PATH, SHELLOPTS_VAR, SSH_AUTH_SOCK_VAR};

use crate::filesystem::plan::SshAgent;
use crate::host::HostEnv;

/// Variables forwarded by default when the environment is sanitized.
const BASELINE_VARS: &[&str] = &["HOME", "TERM"];

/// Environment passed to `execve(2)`.
pub type Environment = BTreeMap<OsString, OsString>;

/// Builds the final command's environment.
///
/// With `keep_env` the caller's environment is forwarded unmodified minus
/// the re-exec markers. Otherwise only `CHROOT`, `HOME`, `TERM`, `PATH`, the
/// SSH agent socket when the plan forwards it, `SHELLOPTS` when requested,
/// and each explicitly named variable with a non-empty value are set.
#[must_use]
pub fn build_environment(
    config: &Configuration,
    host: &HostEnv,
    hostname: &str,
    ssh_agent: &SshAgent,
) -> Environment {
    let mut env = Environment::new();

    if config.keep_env {
        env.extend(host.exported().map(|(k, v)| (k.to_owned(), v.to_owned())));
        set(&mut env, CHROOT_VAR, hostname);
        return env;
    }

    set(&mut env, CHROOT_VAR, hostname);
    for name in BASELINE_VARS {
        forward(&mut env, host, name);
    }
    set(&mut env, "PATH", host.get("PATH").unwrap_or(DEFAULT_PATH));
    if let SshAgent::Forward(sock) = ssh_agent {
        set(&mut env, SSH_AUTH_SOCK_VAR, sock);
    }
    if config.shellopts {
        forward(&mut env, host, SHELLOPTS_VAR);
    }
    for name in &config.env {
        forward(&mut env, host, name);
    }
    env
}

fn set(env: &mut Environment, name: &str, value: &str) {
    let _ = env.insert(name.into(), value.into());
}

fn forward(env: &mut Environment, host: &HostEnv, name: &str) {
    if let Some(value) = host.get(name) {
        set(env, name, value);
    }
}

/// Looks up `name` as UTF-8.
#[must_use]
pub fn lookup<'a>(env: &'a Environment, name: &str) -> Option<&'a str> {
    env.get(OsStr::new(name)).and_then(|v| v.to_str())
}

#[cfg(test)]
mod tests {
    use nschroot_common::constants::{NAMESPACES_MARKER, REEXEC_MARKER};

    use super::*;

    fn host() -> HostEnv {
        [
            ("HOME", "/home/dev"),
            ("TERM", "xterm"),
            ("PATH", "/usr/bin:/bin"),
            ("LANG", "C.UTF-8"),
            ("EMPTY", ""),
            ("SHELLOPTS", "braceexpand"),
            (SSH_AUTH_SOCK_VAR, "/tmp/ssh-x/agent.1"),
            (REEXEC_MARKER, "1"),
            (NAMESPACES_MARKER, "mount"),
        ]
        .into_iter()
        .collect()
    }

    fn config() -> Configuration {
        Configuration::with_defaults("/srv/root").unwrap()
    }

    #[test]
    fn sanitized_environment_has_only_baseline() {
        let env = build_environment(&config(), &host(), "root", &SshAgent::Drop);
        let names: Vec<_> = env.keys().filter_map(|k| k.to_str()).collect();
        assert_eq!(names, vec!["CHROOT", "HOME", "PATH", "TERM"]);
        assert_eq!(lookup(&env, "CHROOT"), Some("root"));
    }

    #[test]
    fn forwarded_names_require_non_empty_values() {
        let mut cfg = config();
        cfg.env = vec!["LANG".into(), "EMPTY".into(), "MISSING".into()];
        cfg.shellopts = true;
        let env = build_environment(&cfg, &host(), "root", &SshAgent::Untouched);
        assert_eq!(lookup(&env, "LANG"), Some("C.UTF-8"));
        assert_eq!(lookup(&env, "SHELLOPTS"), Some("braceexpand"));
        assert!(lookup(&env, "EMPTY").is_none());
        assert!(lookup(&env, "MISSING").is_none());
        assert!(lookup(&env, SSH_AUTH_SOCK_VAR).is_none());
    }

    #[test]
    fn ssh_socket_forwarded_when_planned() {
        let env = build_environment(
            &config(),
            &host(),
            "root",
            &SshAgent::Forward("/tmp/ssh-x/agent.1".into()),
        );
        assert_eq!(lookup(&env, SSH_AUTH_SOCK_VAR), Some("/tmp/ssh-x/agent.1"));
    }

    #[test]
    fn keep_env_forwards_everything_but_markers() {
        let mut cfg = config();
        cfg.keep_env = true;
        let env = build_environment(&cfg, &host(), "root", &SshAgent::Untouched);
        assert_eq!(lookup(&env, "LANG"), Some("C.UTF-8"));
        assert_eq!(lookup(&env, "CHROOT"), Some("root"));
        assert!(lookup(&env, REEXEC_MARKER).is_none());
        assert!(lookup(&env, NAMESPACES_MARKER).is_none());
    }

    #[test]
    fn keep_env_forwards_non_utf8_values_unchanged() {
        use std::os::unix::ffi::OsStringExt;

        let raw = OsString::from_vec(vec![b'x', 0xfe]);
        let host: HostEnv = [(OsString::from("LEGACY"), raw.clone())].into_iter().collect();
        let mut cfg = config();
        cfg.keep_env = true;
        let env = build_environment(&cfg, &host, "root", &SshAgent::Untouched);
        assert_eq!(env.get(OsStr::new("LEGACY")), Some(&raw));
    }

    #[test]
    fn path_falls_back_when_unset() {
        let host = HostEnv::default();
        let env = build_environment(&config(), &host, "root", &SshAgent::Untouched);
        assert_eq!(lookup(&env, "PATH"), Some(DEFAULT_PATH));
    }
}
