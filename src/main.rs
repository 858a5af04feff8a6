use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use cix::check::NixCheckRunner;
use cix::config::Configuration;
use cix::poller::Poller;
use cix::source::StatusReporter;

#[derive(Parser)]
#[command(name = "cix")]
#[command(version, about = "Poll git repositories, check new commits, report statuses")]
pub struct Cli {
    /// Path to the JSON configuration file
    pub config: PathBuf,

    /// Run a single tick and exit with its result
    #[arg(long)]
    pub once: bool,

    /// Seconds to sleep between ticks
    #[arg(long, default_value = "180")]
    pub interval: u64,

    /// Log cix at debug level (RUST_LOG takes precedence)
    #[arg(short, long)]
    pub verbose: bool,
}

/// Filter used when RUST_LOG is unset. Verbose raises only our own crate.
fn default_filter(verbose: bool) -> &'static str {
    if verbose { "cix=debug,info" } else { "info" }
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Configuration::load(&cli.config)?;
    init_logging(cli.verbose || config.verbose);
    config.validate().context("Invalid configuration")?;

    let reporter = StatusReporter::new()?;
    let poller = Poller::new(&config, reporter, NixCheckRunner);
    info!(
        repositories = config.repositories.len(),
        data = %config.var.display(),
        "cix {} starting",
        env!("CARGO_PKG_VERSION")
    );

    if cli.once {
        poller.tick().await?;
        return Ok(());
    }

    let interval = Duration::from_secs(cli.interval);
    loop {
        if let Err(e) = poller.tick().await {
            error!(error = %e, "tick failed");
        }
        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_filter_is_scoped_to_cix() {
        let filter = default_filter(true);
        assert_eq!(filter, "cix=debug,info");
        assert!(EnvFilter::try_new(filter).is_ok());
    }

    #[test]
    fn test_quiet_filter() {
        assert_eq!(default_filter(false), "info");
    }
}
