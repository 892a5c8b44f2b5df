//! # nschroot
//!
//! Enters fresh Linux namespaces, assembles bind and tmpfs mounts inside a
//! directory tree, optionally joins a cgroup, then chroots and execs a
//! command or login shell.

mod cli;

use std::convert::Infallible;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use nschroot_common::constants::APP_NAME;
use nschroot_common::error::NschrootError;
use nschroot_core::host::HostEnv;
use nschroot_core::namespace::Phase;
use nschroot_core::pipeline;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    match run(cli) {
        Ok(never) => match never {},
        Err(err) => report(&err),
    }
}

fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level).ok(),
        None => EnvFilter::try_from_default_env().ok(),
    }
    .unwrap_or_else(|| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<Infallible> {
    let host = HostEnv::capture();
    let phase = Phase::detect(&host).context("reading re-exec state")?;
    let config = cli.into_configuration()?;

    let never = match phase {
        Phase::PreNamespace => pipeline::check_and_reexec(&config, &host)?,
        Phase::InNamespace(namespaces) => pipeline::run_in_namespace(&config, &namespaces, &host)?,
    };
    Ok(never)
}

#[allow(clippy::print_stderr)]
fn report(err: &anyhow::Error) -> ExitCode {
    eprintln!("{APP_NAME}: {err:#}");
    let usage = err
        .downcast_ref::<NschrootError>()
        .is_some_and(NschrootError::is_argument);
    if usage { ExitCode::from(2) } else { ExitCode::FAILURE }
}
