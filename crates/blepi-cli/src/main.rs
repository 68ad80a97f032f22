//! blepi - PiSugar Wi-Fi configuration peripheral

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use blepi_cli::{
    app::{self, RunOptions},
    cli::Cli,
    config::AppConfig,
    error::Result,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.print_config {
        println!("{}", AppConfig::example_config()?);
        return Ok(());
    }

    setup_logging(cli.verbose);

    let config = AppConfig::load(&cli)?;
    let options = RunOptions {
        simulate_central: cli.simulate_central,
        run_for: cli.run_for,
    };

    let summary = app::run(config.peripheral_config(), options).await?;
    info!(
        "blepi exited: {} advertising switches, {} notifications sent",
        summary.advertising_switches, summary.notifications
    );
    Ok(())
}

/// Setup logging based on verbosity level
fn setup_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
