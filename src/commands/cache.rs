//! `netnav cache`: inspect or clear the CSV caches

use clap::{Args, ValueEnum};
use console::style;
use eyre::Result;

use super::App;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CacheTarget {
    Pools,
    Tokens,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CacheAction {
    Stats,
    Clear,
}

#[derive(Debug, Args)]
pub struct CacheArgs {
    #[arg(value_enum)]
    pub target: CacheTarget,

    #[arg(value_enum, default_value_t = CacheAction::Stats)]
    pub action: CacheAction,
}

pub async fn run(app: &App, args: CacheArgs) -> Result<()> {
    match (args.target, args.action) {
        (CacheTarget::Pools, CacheAction::Stats) => {
            app.pool_cache.stats().await.print("Pool creation cache");
        }
        (CacheTarget::Pools, CacheAction::Clear) => {
            app.pool_cache.clear().await?;
            println!("{} Pool cache cleared", style("✓").green());
        }
        (CacheTarget::Tokens, CacheAction::Stats) => {
            app.token_cache.stats().await.print("Token metadata cache");
            let symbols = app.token_cache.symbols().await;
            if !symbols.is_empty() {
                println!("   Symbols:");
                for (address, symbol) in symbols {
                    println!("     {:<10} {}", symbol, address);
                }
            }
        }
        (CacheTarget::Tokens, CacheAction::Clear) => {
            app.token_cache.clear().await?;
            println!("{} Token cache cleared", style("✓").green());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_clear_pool_cache_removes_file() {
        let dir = tempdir().unwrap();
        let pools = dir.path().join("pools.csv");
        let config = Config {
            pool_cache_path: pools.display().to_string(),
            token_cache_path: dir.path().join("tokens.csv").display().to_string(),
            ..Config::default()
        };
        let app = App::new(config).unwrap();
        app.pool_cache.upsert("0xpool", 1, 100, 1_000, None).await.unwrap();
        assert!(pools.exists());

        run(
            &app,
            CacheArgs {
                target: CacheTarget::Pools,
                action: CacheAction::Clear,
            },
        )
        .await
        .unwrap();
        assert!(!pools.exists());
        assert_eq!(app.pool_cache.stats().await.entries, 0);
    }
}
