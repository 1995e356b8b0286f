// Copyright (c) 2026 chainreact contributors
// SPDX-License-Identifier: AGPL-3.0

//! # chainreact CLI
//!
//! The `chainreact` binary hosts the reaction chain: it loads the
//! configuration manifest, opens the store, registers and starts every
//! persisted instance, and runs until interrupted. Management happens
//! through the primary instance's command surface while the host runs.
//!
//! ## Commands
//!
//! - `chainreact run` (also the default) - start the chain host
//! - `chainreact config show|validate` - configuration management

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use chainreact_core::application::lifecycle::InstanceLifecycleManager;
use chainreact_core::domain::config::ChainConfig;
use chainreact_core::domain::repository::{
    InstanceRepository, OverrideRepository, PackRepository, StorageBackend,
};
use chainreact_core::infrastructure::repositories::{
    InMemoryInstanceRepository, InMemoryOverrideRepository, InMemoryPackRepository,
};
use chainreact_core::infrastructure::sled_store::SledStore;
use chainreact_core::infrastructure::transport::LoggingTransport;

/// chainreact - deterministic reaction-chain orchestrator
#[derive(Parser)]
#[command(name = "chainreact")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "CHAINREACT_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "CHAINREACT_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the chain host until interrupted
    Run,

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the effective configuration
    Show,
    /// Check the configuration without starting anything
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(cli.config).await,
        Commands::Config { command } => handle_config(command, cli.config),
    }
}

async fn run(config_path: Option<PathBuf>) -> Result<()> {
    let config = ChainConfig::discover(config_path.as_deref())
        .context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    let (instances, packs, overrides) = build_repositories(&config)?;
    let transport = Arc::new(LoggingTransport::new());
    let manager =
        InstanceLifecycleManager::new(&config, instances, packs, overrides, transport);

    let started = manager
        .start_all()
        .await
        .context("Failed to start instances")?;
    info!(started, "chain host running, press Ctrl-C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("shutdown signal received, stopping instances");
    manager.stop_all().await;

    Ok(())
}

type Repositories = (
    Arc<dyn InstanceRepository>,
    Arc<dyn PackRepository>,
    Arc<dyn OverrideRepository>,
);

fn build_repositories(config: &ChainConfig) -> Result<Repositories> {
    match config.storage_backend().context("Invalid storage config")? {
        StorageBackend::InMemory => {
            info!("using in-memory storage (state is lost on exit)");
            Ok((
                Arc::new(InMemoryInstanceRepository::new()),
                Arc::new(InMemoryPackRepository::new()),
                Arc::new(InMemoryOverrideRepository::new()),
            ))
        }
        StorageBackend::Sled(sled_config) => {
            let store =
                SledStore::open(&sled_config.path).context("Failed to open sled store")?;
            Ok((
                Arc::new(store.instances().context("Failed to open instances tree")?),
                Arc::new(store.packs().context("Failed to open packs tree")?),
                Arc::new(store.overrides().context("Failed to open overrides tree")?),
            ))
        }
    }
}

fn handle_config(command: ConfigCommand, config_path: Option<PathBuf>) -> Result<()> {
    let config = ChainConfig::discover(config_path.as_deref())
        .context("Failed to load configuration")?;

    match command {
        ConfigCommand::Show => {
            // The credential never reaches stdout.
            let mut shown = config;
            if shown.primary_credential.is_some() {
                shown.primary_credential = Some("<set>".to_string());
            }
            let rendered =
                serde_yaml::to_string(&shown).context("Failed to render configuration")?;
            println!("{rendered}");
        }
        ConfigCommand::Validate => {
            config.validate().context("Invalid configuration")?;
            println!("Configuration OK");
        }
    }
    Ok(())
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}
