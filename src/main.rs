//! `woof`: parallel file uploader for anonymous file hosting services.

mod cli;
mod config;
mod error;
mod output;
mod upload;

use crate::cli::{Cli, Command};
use crate::config::{Overrides, UploadOverrides};
use crate::error::Result;
use clap::Parser;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Exit status after Ctrl-C, as shells report for SIGINT.
const EXIT_INTERRUPTED: u8 = 130;
const VERBOSE_FILTER: &str = "warn,woof=debug,woof_hosts=debug,woof_provider=debug,woof_uploader=debug";

fn init_tracing(verbose: bool) {
    let fallback = if verbose { VERBOSE_FILTER } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)))
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(error) => {
            eprintln!("Error: {}", error::report(&error));
            tracing::debug!(?error, "Command failed");
            ExitCode::FAILURE
        },
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let args = match cli.command {
        Command::Version => {
            println!("woof version {}", env!("CARGO_PKG_VERSION"));
            return Ok(ExitCode::SUCCESS);
        },
        Command::Upload(args) => args,
    };

    let overrides = Overrides {
        concurrency: cli.concurrency,
        verbose: cli.verbose,
        output: cli.output,
        upload: UploadOverrides { retry_attempts: args.retry_attempts, retry_delay: args.retry_delay },
    };
    let loaded = config::load(cli.config.as_deref(), &overrides);
    init_tracing(loaded.as_ref().map_or(cli.verbose, |config| config.verbose));
    let config = loaded?;

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, cancelling uploads");
                cancel.cancel();
            }
        }
    });

    let summary = upload::run(args, config, &cancel).await?;
    Ok(if cancel.is_cancelled() {
        ExitCode::from(EXIT_INTERRUPTED)
    } else if summary.failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
