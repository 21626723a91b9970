//! Runtime configuration for netnav
//!
//! Every endpoint, cache path and retry knob lives here. Values come from
//! the environment (with `.env` support) or a TOML file.

use eyre::{eyre, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::indexer::retry::RetryPolicy;

// ============================================
// OUTPUT FORMAT
// ============================================

/// How command results are printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable lines and tables
    Simple,
    /// Pretty-printed JSON on stdout
    Json,
}

impl Default for OutputFormat {
    fn default() -> Self {
        OutputFormat::Simple
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Simple => write!(f, "simple"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

// ============================================
// MAIN CONFIGURATION
// ============================================

/// Main configuration struct
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // ========== Index Endpoints ==========
    /// v1 pools endpoint (vault positions, reserves)
    pub rest_api_v1: String,

    /// v2 pools endpoint (accountNav, APR windows, fees, volume)
    pub rest_api_v2: String,

    /// GraphQL endpoint (prices, deployments, swaps)
    pub graphql_url: String,

    // ========== Network Settings ==========
    /// Ethereum JSON-RPC URL used for block lookups and ERC20 metadata
    pub rpc_url: String,

    /// Chain ID (1 = Ethereum Mainnet)
    pub chain_id: u64,

    /// Oracle price source name in the index
    pub price_source: String,

    // ========== External APIs ==========
    /// Etherscan API key for block-by-timestamp lookups
    pub etherscan_api_key: Option<String>,

    pub etherscan_api_url: String,

    pub coingecko_api_url: String,

    pub defillama_api_url: String,

    // ========== Caches & Output ==========
    /// CSV cache of pool creation / last-available blocks
    pub pool_cache_path: String,

    /// CSV cache of token symbols and decimals
    pub token_cache_path: String,

    /// Directory for JSON history output
    pub data_dir: String,

    // ========== HTTP & Retry ==========
    pub http_timeout_secs: u64,

    /// Total attempts per request (first try included)
    pub max_retries: u32,

    pub initial_retry_delay_secs: u64,

    pub max_retry_delay_secs: u64,

    // ========== Dashboard ==========
    pub dashboard_port: u16,

    /// How long index responses are reused by the dashboard
    pub dashboard_cache_ttl_secs: u64,

    /// Maximum pools rendered in the dashboard table
    pub dashboard_max_pools: usize,
}

impl Config {
    /// Load configuration from environment variables and .env file
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            // Index
            rest_api_v1: env::var("REST_API_V1")
                .unwrap_or_else(|_| "https://index-dev.eul.dev/v1/swap/pools".to_string()),
            rest_api_v2: env::var("REST_API_V2")
                .unwrap_or_else(|_| "https://index-dev.eul.dev/v2/swap/pools".to_string()),
            graphql_url: env::var("GRAPHQL_URL")
                .unwrap_or_else(|_| "https://index-dev.euler.finance/graphql".to_string()),

            // Network
            rpc_url: env::var("RPC_URL")
                .unwrap_or_else(|_| "https://ethereum.publicnode.com".to_string()),
            chain_id: env::var("CHAIN_ID")
                .unwrap_or_else(|_| "1".to_string())
                .parse()
                .unwrap_or(1),
            price_source: env::var("PRICE_SOURCE")
                .unwrap_or_else(|_| "oracle".to_string()),

            // External APIs
            etherscan_api_key: env::var("ETHERSCAN_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            etherscan_api_url: env::var("ETHERSCAN_API_URL")
                .unwrap_or_else(|_| "https://api.etherscan.io/api".to_string()),
            coingecko_api_url: env::var("COINGECKO_API_URL")
                .unwrap_or_else(|_| "https://api.coingecko.com/api/v3".to_string()),
            defillama_api_url: env::var("DEFILLAMA_API_URL")
                .unwrap_or_else(|_| "https://coins.llama.fi".to_string()),

            // Caches
            pool_cache_path: env::var("POOL_CACHE_PATH")
                .unwrap_or_else(|_| "pool_creation_blocks.csv".to_string()),
            token_cache_path: env::var("TOKEN_CACHE_PATH")
                .unwrap_or_else(|_| "token_metadata.csv".to_string()),
            data_dir: env::var("DATA_DIR")
                .unwrap_or_else(|_| "data".to_string()),

            // HTTP & retry
            http_timeout_secs: env::var("HTTP_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30),
            max_retries: env::var("MAX_RETRIES")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
            initial_retry_delay_secs: env::var("INITIAL_RETRY_DELAY_SECS")
                .unwrap_or_else(|_| "1".to_string())
                .parse()
                .unwrap_or(1),
            max_retry_delay_secs: env::var("MAX_RETRY_DELAY_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30),

            // Dashboard
            dashboard_port: env::var("DASHBOARD_PORT")
                .unwrap_or_else(|_| "5001".to_string())
                .parse()
                .unwrap_or(5001),
            dashboard_cache_ttl_secs: env::var("DASHBOARD_CACHE_TTL_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .unwrap_or(60),
            dashboard_max_pools: env::var("DASHBOARD_MAX_POOLS")
                .unwrap_or_else(|_| "100".to_string())
                .parse()
                .unwrap_or(100),
        })
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration before any network work starts
    pub fn validate(&self) -> Result<()> {
        for (name, url) in [
            ("REST_API_V1", &self.rest_api_v1),
            ("REST_API_V2", &self.rest_api_v2),
            ("GRAPHQL_URL", &self.graphql_url),
            ("RPC_URL", &self.rpc_url),
        ] {
            if url.is_empty() || url.contains("YOUR_API_KEY") {
                return Err(eyre!("Invalid {} - please set a valid URL", name));
            }
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(eyre!("{} must be an http(s) URL (got {})", name, url));
            }
        }

        if self.http_timeout_secs == 0 {
            return Err(eyre!("HTTP_TIMEOUT_SECS must be greater than zero"));
        }
        if self.max_retries == 0 {
            return Err(eyre!("MAX_RETRIES must be at least 1"));
        }
        if self.initial_retry_delay_secs > self.max_retry_delay_secs {
            return Err(eyre!(
                "INITIAL_RETRY_DELAY_SECS ({}) exceeds MAX_RETRY_DELAY_SECS ({})",
                self.initial_retry_delay_secs,
                self.max_retry_delay_secs
            ));
        }

        Ok(())
    }

    /// Retry policy shared by every HTTP client
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            Duration::from_secs(self.initial_retry_delay_secs),
            Duration::from_secs(self.max_retry_delay_secs),
        )
    }

    /// Build the shared reqwest client
    pub fn http_client(&self) -> Result<Client> {
        Client::builder()
            .timeout(Duration::from_secs(self.http_timeout_secs))
            .build()
            .map_err(|e| eyre!("Failed to create HTTP client: {}", e))
    }

    /// Directory for history output
    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        println!("╔════════════════════════════════════════════════════════════╗");
        println!("║                 NETNAV - CONFIGURATION                     ║");
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ Chain ID:          {:^40} ║", self.chain_id);
        println!("║ Price Source:      {:^40} ║", self.price_source);
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ INDEX                                                      ║");
        println!("║ • REST v1:         {:<40} ║", truncate(&self.rest_api_v1, 40));
        println!("║ • REST v2:         {:<40} ║", truncate(&self.rest_api_v2, 40));
        println!("║ • GraphQL:         {:<40} ║", truncate(&self.graphql_url, 40));
        println!("║ • RPC:             {:<40} ║", truncate(&self.rpc_url, 40));
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ BLOCK LOOKUPS                                              ║");
        println!("║ • Etherscan API:   {:^40} ║",
            if self.etherscan_api_key.is_some() { "✓ Configured" } else { "✗ Estimating" }
        );
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ RETRY                                                      ║");
        println!("║ • Max Attempts:    {:^40} ║", self.max_retries);
        println!("║ • Backoff:         {:^40} ║",
            format!("{}s → {}s", self.initial_retry_delay_secs, self.max_retry_delay_secs)
        );
        println!("║ • HTTP Timeout:    {:^40} ║", format!("{}s", self.http_timeout_secs));
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ CACHES                                                     ║");
        println!("║ • Pools:           {:<40} ║", truncate(&self.pool_cache_path, 40));
        println!("║ • Tokens:          {:<40} ║", truncate(&self.token_cache_path, 40));
        println!("║ • Data Dir:        {:<40} ║", truncate(&self.data_dir, 40));
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ DASHBOARD                                                  ║");
        println!("║ • Port:            {:^40} ║", self.dashboard_port);
        println!("║ • Cache TTL:       {:^40} ║", format!("{}s", self.dashboard_cache_ttl_secs));
        println!("╚════════════════════════════════════════════════════════════╝");
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rest_api_v1: "https://index-dev.eul.dev/v1/swap/pools".to_string(),
            rest_api_v2: "https://index-dev.eul.dev/v2/swap/pools".to_string(),
            graphql_url: "https://index-dev.euler.finance/graphql".to_string(),
            rpc_url: "https://ethereum.publicnode.com".to_string(),
            chain_id: 1,
            price_source: "oracle".to_string(),
            etherscan_api_key: None,
            etherscan_api_url: "https://api.etherscan.io/api".to_string(),
            coingecko_api_url: "https://api.coingecko.com/api/v3".to_string(),
            defillama_api_url: "https://coins.llama.fi".to_string(),
            pool_cache_path: "pool_creation_blocks.csv".to_string(),
            token_cache_path: "token_metadata.csv".to_string(),
            data_dir: "data".to_string(),
            http_timeout_secs: 30,
            max_retries: 10,
            initial_retry_delay_secs: 1,
            max_retry_delay_secs: 30,
            dashboard_port: 5001,
            dashboard_cache_ttl_secs: 60,
            dashboard_max_pools: 100,
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", head)
    }
}

// ============================================
// TESTS
// ============================================
