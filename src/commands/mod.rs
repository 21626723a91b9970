//! CLI subcommands
//!
//! Each command takes the shared [`App`] and prints either human-readable
//! output or JSON.

pub mod account;
pub mod cache;
pub mod compare_apr;
pub mod find_pool;
pub mod history;
pub mod lifetime;
pub mod nav;
pub mod pool_info;
pub mod pool_map;
pub mod prices;
pub mod vaults;

use eyre::Result;
use serde::Serialize;
use std::sync::Arc;

use crate::cache::{PoolCache, TokenCache, TokenResolver};
use crate::config::Config;
use crate::indexer::Clients;
use crate::nav::{HistoryBuilder, LifespanAnalyzer, NavCalculator};

/// Everything a command needs, built once from the config
#[derive(Clone)]
pub struct App {
    pub config: Config,
    pub clients: Clients,
    pub pool_cache: Arc<PoolCache>,
    pub token_cache: Arc<TokenCache>,
    pub tokens: TokenResolver,
    pub nav: NavCalculator,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let clients = Clients::from_config(&config)?;
        let pool_cache = Arc::new(PoolCache::new(&config.pool_cache_path));
        let token_cache = Arc::new(TokenCache::new(&config.token_cache_path));
        let tokens = TokenResolver::new(
            token_cache.clone(),
            clients.rpc.clone(),
            clients.graphql.clone(),
            config.chain_id,
        );
        let nav = NavCalculator::new(
            clients.graphql.clone(),
            tokens.clone(),
            config.chain_id,
            config.price_source.clone(),
        );

        Ok(Self {
            config,
            clients,
            pool_cache,
            token_cache,
            tokens,
            nav,
        })
    }

    pub fn chain(&self) -> u64 {
        self.config.chain_id
    }

    pub fn lifespan(&self) -> LifespanAnalyzer {
        LifespanAnalyzer::new(
            self.clients.rest.clone(),
            self.clients.rpc.clone(),
            self.nav.clone(),
            self.pool_cache.clone(),
            self.clients.graphql.clone(),
            self.clients.oracle.clone(),
            self.chain(),
        )
    }

    pub fn history(&self) -> HistoryBuilder {
        HistoryBuilder::new(
            self.clients.rest.clone(),
            self.clients.graphql.clone(),
            self.clients.oracle.clone(),
            self.clients.external.clone(),
            self.nav.clone(),
            self.pool_cache.clone(),
            self.chain(),
        )
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// `YYYY-MM-DD HH:MM:SS UTC` for a Unix timestamp
pub fn format_timestamp(ts: u64) -> String {
    chrono::DateTime::<chrono::Utc>::from_timestamp(ts as i64, 0)
        .map(|d| d.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}
