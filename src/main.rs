//! netnav - Net NAV tooling for EulerSwap pools
//!
//! Run with: cargo run -- <command>
//!
//! Commands query the Euler index (REST v1/v2 + GraphQL), compute net NAV
//! from vault positions and oracle prices, and print tables or JSON. `serve`
//! starts the web dashboard.

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use console::style;
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cache;
mod commands;
mod config;
mod dashboard;
mod indexer;
mod nav;
mod report;
mod tokens;

use commands::account::{AccountHistoryArgs, PoolAccountHistoryArgs};
use commands::cache::CacheArgs;
use commands::compare_apr::CompareAprArgs;
use commands::find_pool::FindPoolArgs;
use commands::history::HistoryArgs;
use commands::lifetime::LifetimeArgs;
use commands::nav::NavArgs;
use commands::pool_info::PoolInfoArgs;
use commands::pool_map::PoolMapArgs;
use commands::prices::PricesArgs;
use commands::vaults::VaultsArgs;
use commands::App;
use config::{Config, OutputFormat};

#[derive(Parser)]
#[command(name = "netnav", version, about = "Net NAV, APR and history for EulerSwap pools")]
struct Cli {
    /// Chain id (overrides CHAIN_ID)
    #[arg(long, global = true)]
    chain: Option<u64>,

    /// TOML config file instead of environment variables
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Current NAV, return between two blocks, or lifespan return
    Nav(NavArgs),
    /// Compare v2 APR against a lifetime NAV estimate
    CompareApr(CompareAprArgs),
    /// Daily NAV history of a pool
    History(HistoryArgs),
    /// Daily NAV of every pool owned by an Euler account
    AccountHistory(AccountHistoryArgs),
    /// Daily accountNav of a single pool
    PoolAccountHistory(PoolAccountHistoryArgs),
    /// Find pools for a token pair
    FindPool(FindPoolArgs),
    /// Deployment, config and status of a pool
    PoolInfo(PoolInfoArgs),
    /// Per-vault accountNav breakdown
    Vaults(VaultsArgs),
    /// Lifespan analysis with v2 APRs alongside
    Lifetime(LifetimeArgs),
    /// Daily token prices from DeFiLlama / CoinGecko
    Prices(PricesArgs),
    /// All deployments grouped by account
    PoolMap(PoolMapArgs),
    /// Inspect or clear the CSV caches
    Cache(CacheArgs),
    /// Print the effective configuration, optionally saving it as TOML
    Config {
        #[arg(long)]
        save: Option<PathBuf>,
    },
    /// Start the web dashboard
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },
}

impl Commands {
    /// Commands whose stdout must stay machine-readable
    fn prints_json(&self) -> bool {
        match self {
            Commands::Nav(a) => a.format == OutputFormat::Json,
            Commands::FindPool(a) => a.format == OutputFormat::Json,
            Commands::PoolInfo(a) => a.format == OutputFormat::Json,
            Commands::Vaults(a) => a.raw,
            _ => false,
        }
    }
}

fn print_banner() {
    println!();
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").cyan()
    );
    println!("{}", style(" 📈 NETNAV - EulerSwap Net NAV Toolkit").cyan().bold());
    println!(
        "{}",
        style("    REST v1/v2 | GraphQL Oracle | Lifespan & Daily History").cyan()
    );
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").cyan()
    );
    println!();
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("netnav=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    if !cli.command.prints_json() {
        print_banner();
    }

    // Load configuration
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    if let Some(chain) = cli.chain {
        config.chain_id = chain;
    }

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        error!("Please check your .env file");
        return Err(e);
    }

    match cli.command {
        Commands::Config { save } => {
            config.print_summary();
            if let Some(path) = save {
                config.save_to_file(&path)?;
                println!("{} Saved to {}", style("✓").green(), path.display());
            }
            Ok(())
        }
        Commands::Serve { port } => {
            let port = port.unwrap_or(config.dashboard_port);
            config.print_summary();
            println!();
            let app = App::new(config)?;
            dashboard::serve(app, port).await
        }
        command => {
            let app = App::new(config)?;
            run(&app, command).await
        }
    }
}

async fn run(app: &App, command: Commands) -> Result<()> {
    match command {
        Commands::Nav(args) => commands::nav::run(app, args).await,
        Commands::CompareApr(args) => commands::compare_apr::run(app, args).await,
        Commands::History(args) => commands::history::run(app, args).await,
        Commands::AccountHistory(args) => commands::account::run_account(app, args).await,
        Commands::PoolAccountHistory(args) => commands::account::run_pool(app, args).await,
        Commands::FindPool(args) => commands::find_pool::run(app, args).await,
        Commands::PoolInfo(args) => commands::pool_info::run(app, args).await,
        Commands::Vaults(args) => commands::vaults::run(app, args).await,
        Commands::Lifetime(args) => commands::lifetime::run(app, args).await,
        Commands::Prices(args) => commands::prices::run(app, args).await,
        Commands::PoolMap(args) => commands::pool_map::run(app, args).await,
        Commands::Cache(args) => commands::cache::run(app, args).await,
        Commands::Config { .. } | Commands::Serve { .. } => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_commands() {
        let cli = Cli::try_parse_from([
            "netnav", "--chain", "8453", "nav", "--pool", "0xabc", "--format", "json",
        ])
        .unwrap();
        assert_eq!(cli.chain, Some(8453));
        assert!(cli.command.prints_json());

        let cli = Cli::try_parse_from(["netnav", "history", "--pool", "0xabc"]).unwrap();
        match cli.command {
            Commands::History(args) => assert_eq!(args.days, 30),
            _ => panic!("expected history"),
        }

        let cli = Cli::try_parse_from(["netnav", "cache", "tokens", "clear"]).unwrap();
        assert!(matches!(cli.command, Commands::Cache(_)));
    }

    #[test]
    fn test_nav_block_range_must_be_complete() {
        assert!(Cli::try_parse_from(["netnav", "nav", "--pool", "0x1", "--from-block", "5"]).is_err());
        assert!(Cli::try_parse_from([
            "netnav", "nav", "--pool", "0x1", "--lifespan", "--from-block", "5", "--to-block", "6"
        ])
        .is_err());
    }
}
