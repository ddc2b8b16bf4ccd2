//! Command implementations

mod config;
mod job;
mod network;
mod probe;
mod replay;

use crate::cli::{Cli, Commands};
use crate::config_loader::load_config;
use crate::output::OutputWriter;
use anyhow::{Context, Result};
use geocapture_client::{ProcessingClient, ServiceStatus};
use geocapture_core::config::LayeredConfig;

/// Environment fallback for `--api-key`
pub const API_KEY_ENV: &str = "GEOCAPTURE_API_KEY";

/// Execute a CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    let output = OutputWriter::new(cli.json);
    let overrides = cli.config_overrides();
    let Cli {
        config: config_path,
        api_key,
        command,
        ..
    } = cli;

    match command {
        Commands::Config(args) => {
            let config = load_config(config_path.as_deref(), overrides)?;
            config::execute(args, &config, &output)
        }
        Commands::Probe => {
            let config = validated(load_config(config_path.as_deref(), overrides)?)?;
            probe::execute(&config, api_key, &output).await
        }
        Commands::Network => {
            let config = validated(load_config(config_path.as_deref(), overrides)?)?;
            network::execute(&config, api_key, &output).await
        }
        Commands::Job(args) => {
            let config = validated(load_config(config_path.as_deref(), overrides)?)?;
            job::execute(args, &config, api_key, &output).await
        }
        Commands::Replay(args) => {
            let overrides = args.config_overrides(overrides);
            let config = validated(load_config(config_path.as_deref(), overrides)?)?;
            replay::execute(args, &config, api_key, &output).await
        }
    }
}

fn validated(config: LayeredConfig) -> Result<LayeredConfig> {
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Build a client and verify the credential against the service
async fn connect(
    config: &LayeredConfig,
    api_key: Option<String>,
) -> Result<(ProcessingClient, ServiceStatus)> {
    let api_key = api_key
        .or_else(|| std::env::var(API_KEY_ENV).ok())
        .with_context(|| format!("No API key given: pass --api-key or set {}", API_KEY_ENV))?;

    let mut client = ProcessingClient::new(config.service_settings())?;
    let status = client
        .initialize(api_key)
        .await
        .with_context(|| format!("Could not connect to {}", client.base_url()))?;
    Ok((client, status))
}
