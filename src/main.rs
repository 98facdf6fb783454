use anyhow::{Context, Result};
use clap::Parser;
use html_to_image::{apply_overrides, load_config_file, setup_logging, Cli, CliRunner, RendererConfig};
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Cli::parse();

    setup_logging(args.verbose)?;

    info!("Starting html-to-image v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args).await?;
    let cli_runner = CliRunner::new(config)?;

    // A cancelled render drops its child, which kills the renderer process
    let result = tokio::select! {
        result = cli_runner.run(args.command) => result,
        _ = signal::ctrl_c() => {
            info!("Received interrupt, stopping");
            Ok(())
        }
    };

    if let Err(e) = result {
        error!("Application error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

async fn load_config(args: &Cli) -> Result<RendererConfig> {
    let mut config = match &args.config {
        Some(path) => load_config_file(path).await?,
        None => RendererConfig::default(),
    };

    apply_overrides(&mut config, args);

    config
        .validate()
        .context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Renderer binary: {}", config.binary.display());
    info!("Renderer timeout: {:?}", config.timeout);

    Ok(config)
}
