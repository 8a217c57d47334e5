//! Solana Volume Bot - randomized swap traffic through the Jupiter aggregator
//!
//! # WARNING
//! - This bot trades with real money. Only use funds you can afford to lose.
//! - Every swap pays fees and slippage; volume generation is not free.
//! - Keep wallet secret files out of version control.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;

// Use the library crate
use solana_volume_bot::cli::commands;
use solana_volume_bot::config::Config;

/// Solana Volume Bot - randomized Jupiter swap traffic
#[derive(Parser)]
#[command(name = "volbot")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the randomized trading loop
    Run {
        /// Quote only, don't sign or send anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Execute a single swap with the primary wallet
    Swap {
        /// Trade direction: buy or sell
        direction: String,

        /// Token mint address
        mint: String,

        /// Amount in UI units (SOL for buys, tokens for sells)
        amount: f64,

        /// Quote only, don't sign or send
        #[arg(long)]
        dry_run: bool,
    },

    /// Verify proxy rotation via consensus public IP.
    /// Exits 0 when the IP changed, 1 when unchanged, 2 when no IP was obtained.
    CheckIp {
        /// Proxy URL (falls back to the PROXY_URL environment variable)
        #[arg(long)]
        proxy: Option<String>,

        /// Where to persist the last observed IP
        #[arg(long)]
        state_file: Option<String>,
    },

    /// Show current configuration (secrets masked)
    Config,

    /// Probe all candidate RPC endpoints and the local setup
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("solana_volume_bot=info".parse().unwrap()),
        )
        .with_target(true)
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Execute command
    let result = match cli.command {
        Commands::Run { dry_run } => commands::run(&config, dry_run).await,
        Commands::Swap {
            direction,
            mint,
            amount,
            dry_run,
        } => commands::swap(&config, &direction, &mint, amount, dry_run).await,
        Commands::CheckIp { proxy, state_file } => {
            match commands::check_ip(&config, proxy, state_file).await {
                Ok(outcome) => std::process::exit(outcome.exit_code()),
                Err(e) => {
                    error!("IP check failed: {}", e);
                    std::process::exit(2);
                }
            }
        }
        Commands::Config => commands::show_config(&config),
        Commands::Health => commands::health(&config).await,
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
