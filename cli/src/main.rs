mod args;
mod commands;

use anyhow::Context;
use clap::Parser;
use clinic_records::{Clinic, ClinicConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use args::Cli;

fn main() -> anyhow::Result<()> {
    // Initialize tracing; stdout is kept for command output
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = ClinicConfig::from_env().context("invalid clinic configuration")?;
    if let Some(data_dir) = cli.data_dir {
        config = config.with_data_dir(data_dir);
    }

    let mut clinic = Clinic::open(config).context("failed to open the clinic data directory")?;
    let stdout = std::io::stdout();
    commands::run(&mut clinic, &cli.credentials, cli.command, &mut stdout.lock())
}
