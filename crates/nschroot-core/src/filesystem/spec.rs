//! Parsing of bind-mount and tmpfs specification strings using `nom`.
//!
//! Bind mounts are written `[?]source[:target[:options]]`, tmpfs mounts
//! `path[:mode]`. A leading `?` marks a bind mount as optional.

use std::path::PathBuf;

use nom::{
    IResult, Parser,
    bytes::complete::{take_while, take_while_m_n, take_while1},
    character::complete::char,
    combinator::{all_consuming, opt, rest},
    sequence::preceded,
};
use nschroot_common::constants::OPTIONAL_MOUNT_PREFIX;
use nschroot_common::error::{NschrootError, Result};
use nschroot_common::types::TmpfsMode;

/// Options applied to a bind mount. `bind` is always implied.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BindOptions {
    /// Bind the whole subtree (`rbind`).
    pub recursive: bool,
    /// Remount read-only.
    pub read_only: bool,
    /// Remount with `nosuid`.
    pub nosuid: bool,
    /// Remount with `nodev`.
    pub nodev: bool,
    /// Remount with `noexec`.
    pub noexec: bool,
}

impl BindOptions {
    /// Parses a comma-separated option list.
    ///
    /// # Errors
    ///
    /// Returns an argument error for an unknown option.
    pub fn parse(list: &str) -> Result<Self> {
        let mut opts = Self::default();
        for opt in list.split(',').map(str::trim).filter(|o| !o.is_empty()) {
            match opt {
                "bind" => {}
                "rbind" | "rec" => opts.recursive = true,
                "ro" => opts.read_only = true,
                "rw" => opts.read_only = false,
                "nosuid" => opts.nosuid = true,
                "nodev" => opts.nodev = true,
                "noexec" => opts.noexec = true,
                other => {
                    return Err(NschrootError::argument(format!(
                        "unsupported bind mount option: {other}"
                    )));
                }
            }
        }
        Ok(opts)
    }

    /// Whether a remount is needed after the initial bind.
    #[must_use]
    pub const fn needs_remount(&self) -> bool {
        self.read_only || self.nosuid || self.nodev || self.noexec
    }
}

/// One bind mount entry, keyed by its source path in the mount plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindMount {
    /// Path inside the target root. `None` mirrors the source path.
    pub target: Option<PathBuf>,
    /// Mount options.
    pub options: BindOptions,
    /// Skip silently when the target cannot be satisfied.
    pub optional: bool,
}

impl BindMount {
    /// Target path inside the root, mirroring `source` when unset.
    #[must_use]
    pub fn target_for<'a>(&'a self, source: &'a std::path::Path) -> &'a std::path::Path {
        self.target.as_deref().unwrap_or(source)
    }
}

type RawBind<'a> = (bool, &'a str, Option<&'a str>, Option<&'a str>);

fn bind_fields(input: &str) -> IResult<&str, RawBind<'_>> {
    (
        opt(char(OPTIONAL_MOUNT_PREFIX)),
        take_while1(|c: char| c != ':'),
        opt(preceded(char(':'), take_while(|c: char| c != ':'))),
        opt(preceded(char(':'), rest)),
    )
        .map(|(optional, source, target, options)| {
            (optional.is_some(), source, target, options)
        })
        .parse(input)
}

fn tmpfs_fields(input: &str) -> IResult<&str, (&str, Option<&str>)> {
    (
        take_while1(|c: char| c != ':'),
        opt(preceded(
            char(':'),
            take_while_m_n(3, 4, |c: char| c.is_digit(8)),
        )),
    )
        .parse(input)
}

/// Parses a bind-mount specification into `(source, entry)`.
///
/// # Errors
///
/// Returns an argument error if the string is malformed, a path is not
/// absolute, or an option is unknown.
pub fn parse_bind_mount(spec: &str) -> Result<(PathBuf, BindMount)> {
    let (_, (optional, source, target, options)) = all_consuming(bind_fields)
        .parse(spec)
        .map_err(|_| NschrootError::argument(format!("invalid mount specification: {spec}")))?;

    let source = PathBuf::from(source);
    let target = target.filter(|t| !t.is_empty()).map(PathBuf::from);
    if target.as_ref().is_some_and(|t| !t.is_absolute()) {
        return Err(NschrootError::argument(format!(
            "mount target must be absolute: {spec}"
        )));
    }
    let options = BindOptions::parse(options.unwrap_or(""))?;

    Ok((
        source,
        BindMount {
            target,
            options,
            optional,
        },
    ))
}

/// Parses a tmpfs specification into `(path, mode)`.
///
/// # Errors
///
/// Returns an argument error if the path is not absolute or the mode is
/// not a 3-4 digit octal value.
pub fn parse_tmpfs(spec: &str) -> Result<(PathBuf, TmpfsMode)> {
    let (_, (path, mode)) = all_consuming(tmpfs_fields)
        .parse(spec)
        .map_err(|_| NschrootError::argument(format!("invalid tmpfs specification: {spec}")))?;

    let path = PathBuf::from(path);
    if !path.is_absolute() {
        return Err(NschrootError::argument(format!(
            "tmpfs path must be absolute: {spec}"
        )));
    }
    let mode = match mode {
        None => TmpfsMode::Default,
        Some(digits) => TmpfsMode::Explicit(u32::from_str_radix(digits, 8).map_err(|_| {
            NschrootError::argument(format!("invalid tmpfs mode: {spec}"))
        })?),
    };
    Ok((path, mode))
}
