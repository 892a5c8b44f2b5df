//! Runs the `nschroot` binary for failures that happen before any
//! namespace is created, so no privileges are needed.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::process::{Command, Output};

fn nschroot(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_nschroot"))
        .args(args)
        .env_remove("NSCHROOT_REEXEC")
        .env_remove("NSCHROOT_NAMESPACES")
        .env_remove("NSCHROOT_PARENT_MNTNS")
        .env_remove("RUST_LOG")
        .output()
        .expect("binary should start")
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn omitting_the_mount_namespace_is_a_usage_error() {
    let root = tempfile::tempdir().unwrap();
    let out = nschroot(&["-H", "box", "-o", "mount", root.path().to_str().unwrap()]);
    assert_eq!(out.status.code(), Some(2));
    let err = stderr(&out);
    assert!(err.starts_with("nschroot: "), "{err}");
    assert!(err.contains("mount namespace"), "{err}");
    assert_eq!(err.lines().count(), 1, "{err}");
}

#[test]
fn missing_bind_source_is_reported_before_reexec() {
    let root = tempfile::tempdir().unwrap();
    let out = nschroot(&[
        "-H",
        "box",
        "-b",
        "/nonexistent/nschroot-src:/foo",
        root.path().to_str().unwrap(),
    ]);
    assert_eq!(out.status.code(), Some(2));
    assert!(stderr(&out).contains("/nonexistent/nschroot-src"));
}

#[test]
fn missing_target_directory_fails() {
    let out = nschroot(&["-H", "box", "/nonexistent/nschroot-root"]);
    assert_eq!(out.status.code(), Some(2));
    assert!(stderr(&out).contains("target is not an existing directory"));
}

#[test]
fn bad_hostname_fails() {
    let root = tempfile::tempdir().unwrap();
    let out = nschroot(&["-H", "bad.name", root.path().to_str().unwrap()]);
    assert_eq!(out.status.code(), Some(2));
    assert!(stderr(&out).contains("invalid hostname"));
}

#[test]
fn dotted_target_name_is_not_a_hostname_error() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("debian-12.4");
    std::fs::create_dir(&root).unwrap();
    let out = nschroot(&[
        "-b",
        "/nonexistent/nschroot-src",
        root.to_str().unwrap(),
    ]);
    let err = stderr(&out);
    assert!(!err.contains("invalid hostname"), "{err}");
    assert!(err.contains("/nonexistent/nschroot-src"), "{err}");
}
