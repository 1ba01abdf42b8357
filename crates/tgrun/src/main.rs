//! tgrun: orchestrate IaC units as one stack.

// The CLI talks to the user on stdout/stderr directly.
#![allow(clippy::print_stdout, clippy::print_stderr)]

mod cli;
mod commands;
mod tracing;

use clap::Parser;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    let parsed = cli::Cli::parse();
    tracing::init(parsed.global.log_level, parsed.global.log_format);

    // First interrupt cancels cooperatively; a second one exits hard.
    let token = CancellationToken::new();
    let interrupt_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ::tracing::warn!("Interrupt received; cancelling the run");
            interrupt_token.cancel();
        }
        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(commands::EXIT_FAILURE);
        }
    });

    let exit_code = commands::dispatch(parsed, token).await;
    std::process::exit(exit_code);
}
