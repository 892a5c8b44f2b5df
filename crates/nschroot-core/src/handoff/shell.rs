//! Command and fallback shell selection.

use std::path::{Path, PathBuf};

use nix::unistd::{AccessFlags, User, access, getuid};
use nschroot_common::constants::FALLBACK_SHELL;
use nschroot_common::error::{NschrootError, Result};

use crate::filesystem::rooted;
use crate::host::HostEnv;

/// Program and argument vector to exec after the chroot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCommand {
    /// Program path or bare name, as seen inside the sandbox.
    pub program: PathBuf,
    /// Full argument vector including `argv[0]`.
    pub argv: Vec<String>,
}

/// Login shell of the calling user from the password database.
#[must_use]
pub fn caller_login_shell() -> Option<PathBuf> {
    match User::from_uid(getuid()) {
        Ok(user) => user.map(|u| u.shell),
        Err(e) => {
            tracing::debug!(error = %e, "password database lookup failed");
            None
        }
    }
}

/// Picks what to run inside `root`.
///
/// An explicit `command` is returned as is. Otherwise the first shell
/// that is executable inside `root` wins, tried in order: `login_shell`,
/// `$SHELL`, the entries of `<root>/etc/shells`, then `/bin/sh`. The
/// chosen shell is started as a login shell.
///
/// # Errors
///
/// Returns a handoff error when no command was given and no shell is
/// usable.
pub fn resolve_command(
    root: &Path,
    command: &[String],
    host: &HostEnv,
    login_shell: Option<PathBuf>,
) -> Result<ResolvedCommand> {
    if let Some(program) = command.first() {
        return Ok(ResolvedCommand {
            program: PathBuf::from(program),
            argv: command.to_vec(),
        });
    }

    let candidates = login_shell
        .into_iter()
        .chain(host.get("SHELL").map(PathBuf::from))
        .chain(listed_shells(root))
        .chain(std::iter::once(PathBuf::from(FALLBACK_SHELL)));

    for shell in candidates {
        if executable_in(root, &shell) {
            tracing::debug!(shell = %shell.display(), "selected interactive shell");
            return Ok(ResolvedCommand {
                argv: vec![login_name(&shell)],
                program: shell,
            });
        }
    }
    Err(NschrootError::Handoff {
        message: format!("no usable shell found in {}", root.display()),
    })
}

fn listed_shells(root: &Path) -> Vec<PathBuf> {
    std::fs::read_to_string(rooted(root, Path::new("/etc/shells")))
        .map(|text| {
            text.lines()
                .map(str::trim)
                .filter(|l| l.starts_with('/'))
                .map(PathBuf::from)
                .collect()
        })
        .unwrap_or_default()
}

fn executable_in(root: &Path, shell: &Path) -> bool {
    if !shell.is_absolute() {
        return false;
    }
    let path = rooted(root, shell);
    path.is_file() && access(&path, AccessFlags::X_OK).is_ok()
}

fn login_name(shell: &Path) -> String {
    let base = shell
        .file_name()
        .map_or_else(|| shell.to_string_lossy(), |n| n.to_string_lossy());
    format!("-{base}")
}
