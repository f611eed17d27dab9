//! pstore entry point.

mod cli;
mod config;
mod report;

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use pstore_play::{AccessToken, PlayClient, TOKEN_ENV_VAR};
use pstore_publish::{OsFileAccess, PublishOrchestrator, validate};
use tracing_subscriber::EnvFilter;

use cli::Cli;
use config::PublishConfig;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let file_config = cli.config.as_deref().map(PublishConfig::load).transpose();

    let verbose = cli.verbose || matches!(&file_config, Ok(Some(c)) if c.verbose);
    init_logging(verbose);

    let result = match file_config {
        Ok(file_config) => run(cli, file_config.unwrap_or_default()).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Installs the log subscriber. `RUST_LOG` wins over `--verbose`.
fn init_logging(verbose: bool) {
    let default = if verbose { "info,pstore=debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .init();
}

async fn run(cli: Cli, file_config: PublishConfig) -> anyhow::Result<()> {
    let token_in_env = std::env::var(TOKEN_ENV_VAR).is_ok_and(|t| !t.trim().is_empty());
    let raw = file_config.merge(&cli, token_in_env)?;
    let fs = OsFileAccess;
    let request = validate(&raw, &fs).context("invalid configuration")?;

    let token = AccessToken::load(request.credentials().map(|c| c.as_path()))
        .await
        .context("failed to load credentials")?;
    let client = PlayClient::new(&token)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        package = request.package_name(),
        track = %request.track(),
        binaries = request.binaries().len(),
        "starting upload"
    );

    let mut orchestrator = PublishOrchestrator::new();
    let events = orchestrator
        .take_events()
        .context("event channel already taken")?;
    let reporter = tokio::spawn(report::log_events(events));

    let cancel = orchestrator.cancel_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        tracing::warn!("interrupted, deleting the edit (press Ctrl-C again to exit now)");
        cancel.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::error!("interrupted twice, exiting without cleanup");
            std::process::exit(130);
        }
    });

    let result = orchestrator.publish(&request, &fs, Some(&client)).await;
    interrupt.abort();
    drop(orchestrator);
    let _ = reporter.await;

    let outcome = result?;
    tracing::info!(
        edit = %outcome.edit_id,
        versions = ?outcome.version_codes,
        "upload complete"
    );
    Ok(())
}
