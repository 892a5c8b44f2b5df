//! Final process transition into the sandbox root.
//!
//! Builds the environment and command line, self-binds the root so it is
//! a mount point, then chroots and replaces the process image.

pub mod env;
pub mod shell;

use std::convert::Infallible;
use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use nix::unistd::{chdir, chroot, execve};
use nschroot_common::constants::DEFAULT_PATH;
use nschroot_common::error::{NschrootError, Result};

use self::env::{Environment, lookup};
use self::shell::ResolvedCommand;
use crate::filesystem::mount::self_bind;

/// Chroots into `root` and execs `command` with exactly `env`.
///
/// A bare program name is looked up on the `PATH` from `env`, resolved
/// against the new root.
///
/// # Errors
///
/// Only returns when a step of the transition fails.
pub fn exec_in_root(
    root: &Path,
    command: &ResolvedCommand,
    env: &Environment,
) -> Result<Infallible> {
    self_bind(root)?;
    chroot(root).map_err(|e| handoff(format!("chroot {}: {e}", root.display())))?;
    chdir("/").map_err(|e| handoff(format!("chdir /: {e}")))?;

    let program = locate(&command.program, env)?;
    let path = CString::new(program.as_os_str().as_bytes())
        .map_err(|e| handoff(format!("{}: {e}", program.display())))?;
    let argv = to_cstrings(command.argv.iter().map(String::as_str))?;
    let envp = to_cstrings(env.iter().map(|(k, v)| {
        let mut entry = k.as_bytes().to_vec();
        entry.push(b'=');
        entry.extend_from_slice(v.as_bytes());
        entry
    }))?;

    tracing::info!(program = %program.display(), root = %root.display(), "handing off");
    let Err(err) = execve(&path, &argv, &envp);
    Err(handoff(format!("exec {}: {err}", program.display())))
}

fn locate(program: &Path, env: &Environment) -> Result<PathBuf> {
    if program.components().count() > 1 || program.is_absolute() {
        return Ok(program.to_path_buf());
    }
    let search = lookup(env, "PATH").unwrap_or(DEFAULT_PATH);
    which::which_in(program, Some(search), "/")
        .map_err(|e| handoff(format!("{}: {e}", program.display())))
}

fn to_cstrings<S: Into<Vec<u8>>>(items: impl Iterator<Item = S>) -> Result<Vec<CString>> {
    items
        .map(|item| CString::new(item).map_err(|e| handoff(format!("invalid argument: {e}"))))
        .collect()
}

fn handoff(message: String) -> NschrootError {
    NschrootError::Handoff { message }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_with_separators_are_not_searched() {
        let env = Environment::new();
        assert_eq!(
            locate(Path::new("./configure"), &env).unwrap(),
            PathBuf::from("./configure")
        );
        assert_eq!(
            locate(Path::new("/bin/true"), &env).unwrap(),
            PathBuf::from("/bin/true")
        );
    }

    #[test]
    fn interior_nul_is_rejected() {
        let err = to_cstrings(["ok", "bad\0arg"].into_iter()).unwrap_err();
        assert!(matches!(err, NschrootError::Handoff { .. }));
    }
}
