//! Main application entry point for the signal relay
//!
//! Loads configuration, sets up logging, restores the saved sensor network
//! and drives it on a fixed tick until asked to stop.

mod app;
mod cli;
mod config;
mod logging;
mod signals;
mod world;

use app::Application;
use cli::CliArgs;
use config::AppConfig;
use tracing::{error, info};

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    // Load configuration first (before logging setup)
    let mut config = AppConfig::load_from_file(&args.config_path).await?;
    config.apply_cli(&args);
    logging::setup_logging(&config.logging)?;

    info!(
        "Signal Relay v{} | Config: {}",
        env!("CARGO_PKG_VERSION"),
        args.config_path.display()
    );

    let app = match Application::new(config).await {
        Ok(app) => app,
        Err(e) => {
            error!("Failed to start application: {:?}", e);
            std::process::exit(1);
        }
    };

    info!(stats = %app.network().stats(), "Sensor network ready");

    if let Err(e) = app.run().await {
        error!("Application error: {:?}", e);
        std::process::exit(1);
    }

    Ok(())
}
