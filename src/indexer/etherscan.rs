//! Block-by-timestamp oracle
//!
//! Resolves a Unix timestamp to a block number. Uses Etherscan when an API
//! key is configured and falls back to a linear estimate from a known
//! reference block otherwise.
//!
//! API: https://api.etherscan.io/api?module=block&action=getblocknobytime&closest=after

use eyre::{eyre, Result};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::Config;

// ============================================
// CONSTANTS
// ============================================

/// Mainnet block at `REFERENCE_TIMESTAMP`
const REFERENCE_BLOCK: i64 = 23_179_760;

/// 2025-08-20 18:40:00 UTC
const REFERENCE_TIMESTAMP: i64 = 1_755_715_200;

/// Average post-merge block time
const SECONDS_PER_BLOCK: i64 = 12;

// ============================================
// API RESPONSE TYPES
// ============================================

#[derive(Debug, Deserialize)]
struct BlockNoByTimeResponse {
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    result: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockSource {
    Etherscan,
    Estimate,
}

impl std::fmt::Display for BlockSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockSource::Etherscan => write!(f, "Etherscan"),
            BlockSource::Estimate => write!(f, "Estimate"),
        }
    }
}

// ============================================
// BLOCK ORACLE
// ============================================

#[derive(Debug, Clone)]
pub struct BlockOracle {
    http_client: Client,
    api_key: Option<String>,
    api_url: String,
}

impl BlockOracle {
    pub fn new(http_client: Client, api_key: Option<String>, api_url: String) -> Self {
        Self { http_client, api_key, api_url }
    }

    pub fn from_config(config: &Config, http_client: Client) -> Self {
        Self::new(
            http_client,
            config.etherscan_api_key.clone(),
            config.etherscan_api_url.clone(),
        )
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Block at or after `ts` (tries Etherscan first, then the estimate)
    pub async fn block_by_timestamp(&self, ts: u64) -> (u64, BlockSource) {
        if let Some(ref api_key) = self.api_key {
            match self.fetch_from_etherscan(api_key, ts).await {
                Ok(block) => {
                    debug!("🧱 Block from Etherscan: ts {} → {}", ts, block);
                    return (block, BlockSource::Etherscan);
                }
                Err(e) => {
                    warn!("Etherscan block lookup failed: {}", e);
                }
            }
        }

        let block = estimate_block(ts);
        debug!("🧱 Estimated block: ts {} → {}", ts, block);
        (block, BlockSource::Estimate)
    }

    async fn fetch_from_etherscan(&self, api_key: &str, ts: u64) -> Result<u64> {
        let ts = ts.to_string();
        let response: BlockNoByTimeResponse = self
            .http_client
            .get(&self.api_url)
            .query(&[
                ("module", "block"),
                ("action", "getblocknobytime"),
                ("timestamp", ts.as_str()),
                ("closest", "after"),
                ("apikey", api_key),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if response.status != "1" {
            return Err(eyre!("Etherscan error: {} ({})", response.message, response.result));
        }

        match &response.result {
            serde_json::Value::String(s) => s
                .parse::<u64>()
                .map_err(|e| eyre!("Failed to parse block number '{}': {}", s, e)),
            serde_json::Value::Number(n) => n
                .as_u64()
                .ok_or_else(|| eyre!("Block number out of range: {}", n)),
            other => Err(eyre!("No result from Etherscan: {}", other)),
        }
    }
}

/// Linear estimate from the reference block, never below 1
pub fn estimate_block(ts: u64) -> u64 {
    let diff = (ts as i64 - REFERENCE_TIMESTAMP).div_euclid(SECONDS_PER_BLOCK);
    (REFERENCE_BLOCK + diff).max(1) as u64
}

// ============================================
// TESTS
// ============================================
