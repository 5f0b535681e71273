// runtime-seal binary
// Logs go to stderr so stdout carries only the gate summary.

use clap::Parser;
use runtime_seal::cli::{dispatch, Cli};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let status = dispatch(Cli::parse());
    ExitCode::from(status.code())
}
