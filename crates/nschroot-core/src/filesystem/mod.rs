//! Filesystem setup for the sandbox root.
//!
//! Mount specification parsing, plan building, and plan execution.

pub mod executor;
pub mod mount;
pub mod plan;
pub mod spec;

use std::path::{Path, PathBuf};

/// Maps an absolute sandbox path to its location under `root`.
#[must_use]
pub fn rooted(root: &Path, path: &Path) -> PathBuf {
    root.join(path.strip_prefix("/").unwrap_or(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rooted_strips_leading_slash() {
        assert_eq!(
            rooted(Path::new("/srv/root"), Path::new("/etc/hosts")),
            PathBuf::from("/srv/root/etc/hosts")
        );
        assert_eq!(
            rooted(Path::new("/srv/root"), Path::new("/")),
            PathBuf::from("/srv/root/")
        );
    }
}
