#[path = "mailprobe-cli/args.rs"]
mod args;
#[path = "mailprobe-cli/input.rs"]
mod input;
#[path = "mailprobe-cli/output.rs"]
mod output;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use args::Cli;
use mailprobe_lib::Verifier;
use output::Summary;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse_args();
    init_logging(&cli);

    match run(&cli).await {
        Ok(summary) if summary.all_valid() => ExitCode::SUCCESS,
        // codes de sortie : 0 OK, 2 invalides ou annulées, 1 fatal
        Ok(_) => ExitCode::from(2),
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(1)
        }
    }
}

async fn run(cli: &Cli) -> Result<Summary> {
    let addresses = input::collect_addresses(cli)?;
    if addresses.is_empty() {
        warn!("no address given (positional, --input or --stdin)");
    }

    let config = cli.verifier_config();
    let verifier = Arc::new(Verifier::from_config(&config).context("build verifier")?);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling remaining verifications");
            on_signal.cancel();
        }
    });

    info!(count = addresses.len(), concurrency = config.max_concurrent_addresses, "verifying");
    let items = verifier.verify_batch(addresses, cancel).await;

    output::write_report(&items, cli)?;
    Ok(Summary::of(&items))
}

fn init_logging(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.default_log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}
