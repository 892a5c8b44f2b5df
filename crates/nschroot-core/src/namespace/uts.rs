//! UTS namespace hostname.

use nschroot_common::config::validate_hostname;
use nschroot_common::error::{NschrootError, Result};

/// Sets the hostname inside the current UTS namespace.
///
/// # Errors
///
/// Returns an error if the name is invalid or `sethostname(2)` fails.
pub fn set_hostname(hostname: &str) -> Result<()> {
    validate_hostname(hostname)?;
    nix::unistd::sethostname(hostname).map_err(|e| NschrootError::Namespace {
        kind: "uts",
        message: format!("sethostname {hostname}: {e}"),
    })?;
    tracing::debug!(hostname, "hostname set");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_hostname_is_rejected_before_syscall() {
        let err = set_hostname("-bad").unwrap_err();
        assert!(err.is_argument());
    }
}
