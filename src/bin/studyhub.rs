//! StudyHub CLI Binary
//!
//! Command-line inspector for the resource hierarchy and vote core.

use anyhow::Context;
use clap::Parser;
use studyhub::logging::init_logging;
use studyhub::tooling::cli::{Cli, CliContext};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = CliContext::load_config(cli.config.as_deref())
        .context("Error loading configuration")?;
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.logging.format = format.clone();
    }
    init_logging(Some(&config.logging)).context("Error initializing logging")?;

    let context = CliContext::new(&cli.root, &config)
        .with_context(|| format!("Error mirroring {}", cli.root.display()))?;

    let output = context.execute(&cli.command, &cli.format).await?;
    println!("{}", output);
    Ok(())
}
