//! Gift Card Price Optimization Service
//!
//! Runs the repricing loop as a long-lived process:
//! - CLI arguments and TOML config file support
//! - Structured logging with tracing
//! - Paper mode with simulated market data and sales for dry runs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tracing::info;

use giftcard_pricing::{
    init_logging, paper_inventory, paper_models, shutdown_channel, Error, JsonInventory, LogConfig,
    ModelRegistry, NoopSales, OptimizationLoop, OptimizationLoopInput, PricingConfig,
    SimulatedMarketData, SimulatedSales, StaticInventory,
};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser)]
#[command(name = "price_optimizer")]
#[command(version, about = "Gift Card Price Optimization Service", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "pricing_config.toml")]
    config: String,

    /// Override data directory from config
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Override minutes between repricing cycles
    #[arg(long)]
    interval_minutes: Option<u64>,

    /// Override the experiment name
    #[arg(long)]
    experiment: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Log file name (rolling daily under the log directory)
    #[arg(long)]
    log_file: Option<String>,

    /// Paper mode: run against simulated market data and sales
    #[arg(long)]
    paper: bool,

    /// Seed for paper-mode randomness
    #[arg(long, env = "PRICING_PAPER_SEED", default_value_t = 7)]
    seed: u64,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a sample config file
    GenerateConfig {
        /// Output file path
        #[arg(short, long, default_value = "pricing_config.toml")]
        output: String,
    },
    /// Validate config without running
    ValidateConfig,
    /// Run the optimization loop (default)
    Run,
}

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
struct AppConfig {
    #[serde(default)]
    pricing: PricingConfig,
    #[serde(default)]
    logging: LogConfig,
    #[serde(default)]
    data: DataConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct DataConfig {
    /// Directory holding inventory, model metadata and outputs
    #[serde(default = "default_data_dir")]
    data_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl DataConfig {
    fn inventory_path(&self) -> PathBuf {
        self.data_dir.join("current_inventory.json")
    }

    fn model_metadata_path(&self) -> PathBuf {
        self.data_dir.join("model_metadata.json")
    }

    fn history_path(&self) -> PathBuf {
        self.data_dir.join("price_update_history.jsonl")
    }

    fn dashboard_path(&self) -> PathBuf {
        self.data_dir.join("dashboard_summary.json")
    }
}

fn load_config(cli: &Cli) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let mut config = if Path::new(&cli.config).exists() {
        let content = std::fs::read_to_string(&cli.config)?;
        toml::from_str(&content)?
    } else {
        AppConfig::default()
    };

    // CLI overrides
    if let Some(ref data_dir) = cli.data_dir {
        config.data.data_dir = data_dir.clone();
    }
    if let Some(interval) = cli.interval_minutes {
        config.pricing.update_interval_minutes = interval;
    }
    if let Some(ref experiment) = cli.experiment {
        config.pricing.experiment_name = experiment.clone();
    }
    if let Some(ref log_level) = cli.log_level {
        config.logging.level = log_level.clone();
    }
    if let Some(ref log_file) = cli.log_file {
        config.logging.log_file = Some(log_file.clone());
    }

    Ok(config)
}

fn generate_sample_config(output: &str) -> Result<(), Box<dyn std::error::Error>> {
    let sample = AppConfig::default();
    let content = toml::to_string_pretty(&sample)?;
    std::fs::write(output, content)?;
    println!("Sample config written to {output}");
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if it exists (before parsing CLI args)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::GenerateConfig { output }) => {
            generate_sample_config(output)?;
            return Ok(());
        }
        Some(Commands::ValidateConfig) => {
            let config = load_config(&cli)?;
            config.pricing.validate().map_err(|e| Error::config(e))?;
            println!("Configuration is valid:\n{config:#?}");
            return Ok(());
        }
        Some(Commands::Run) | None => {
            // Continue into the loop below
        }
    }

    let config = load_config(&cli)?;
    // Invalid configuration is fatal before the loop starts.
    config.pricing.validate().map_err(|e| Error::config(e))?;

    let _log_guard = init_logging(&config.logging, cli.log_level.as_deref())?;

    let input = if cli.paper {
        info!(seed = cli.seed, "Paper mode: simulated market data and sales");
        let inventory = Arc::new(StaticInventory::new(paper_inventory(3)));
        OptimizationLoopInput {
            config: config.pricing.clone(),
            registry: paper_models(),
            inventory: inventory.clone(),
            market_data: Arc::new(SimulatedMarketData::new(cli.seed, 0.1)),
            sales: Arc::new(SimulatedSales::new(inventory, cli.seed, 0.25)),
            history_path: config.data.history_path(),
            dashboard_path: config.data.dashboard_path(),
        }
    } else {
        // Inventory and trained models come from the data directory. The
        // competitor collector runs out of process; until its feed is wired
        // in, the simulated client stands in and the cache fallback chain
        // covers gaps.
        let registry = ModelRegistry::from_path(config.data.model_metadata_path())?;
        OptimizationLoopInput {
            config: config.pricing.clone(),
            registry,
            inventory: Arc::new(JsonInventory::new(config.data.inventory_path())),
            market_data: Arc::new(SimulatedMarketData::new(cli.seed, 0.1)),
            sales: Arc::new(NoopSales),
            history_path: config.data.history_path(),
            dashboard_path: config.data.dashboard_path(),
        }
    };

    let (handle, signal) = shutdown_channel();

    // Dedicated signal handler task: the loop checks the signal between
    // phases and during sleep, so Ctrl+C never waits for a full interval.
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigterm =
                signal(SignalKind::terminate()).expect("Failed to register SIGTERM handler");
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received (SIGINT/Ctrl+C)");
                }
                _ = sigterm.recv() => {
                    info!("Shutdown signal received (SIGTERM)");
                }
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received (SIGINT/Ctrl+C)");
        }
        handle.shutdown();
    });

    let mut engine = OptimizationLoop::new(input, signal)?;
    engine.run().await?;

    Ok(())
}
