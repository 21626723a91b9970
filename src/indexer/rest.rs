//! REST client for the pools endpoints
//!
//! `GET {base}?chainId=1[&blockNumber=N]` returns every pool on the chain at
//! that block. There is no per-pool route, so single-pool lookups filter the
//! list locally.

use eyre::Result;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, trace};

use super::retry::RetryPolicy;
use super::types::{normalize_pool_list, PoolSnapshot};
use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiVersion {
    /// Raw vault positions and reserves
    V1,
    /// Pre-computed accountNav, APRs, fees and volume
    V2,
}

impl std::fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiVersion::V1 => write!(f, "v1"),
            ApiVersion::V2 => write!(f, "v2"),
        }
    }
}

/// The index answered, but the pool is not in its list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolNotFound {
    pub pool: String,
    pub block: Option<u64>,
}

impl std::fmt::Display for PoolNotFound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.block {
            Some(b) => write!(f, "Pool {} not found at block {}", self.pool, b),
            None => write!(f, "Pool {} not found", self.pool),
        }
    }
}

impl std::error::Error for PoolNotFound {}

/// True only for a missing pool, never for transport or status failures
pub fn is_not_found(err: &eyre::Report) -> bool {
    err.downcast_ref::<PoolNotFound>().is_some()
}

#[derive(Debug, Clone)]
pub struct RestClient {
    http: Client,
    retry: RetryPolicy,
    v1_url: String,
    v2_url: String,
}

impl RestClient {
    pub fn new(http: Client, retry: RetryPolicy, v1_url: String, v2_url: String) -> Self {
        Self { http, retry, v1_url, v2_url }
    }

    pub fn from_config(config: &Config, http: Client) -> Self {
        Self::new(
            http,
            config.retry_policy(),
            config.rest_api_v1.clone(),
            config.rest_api_v2.clone(),
        )
    }

    fn url(&self, version: ApiVersion) -> &str {
        match version {
            ApiVersion::V1 => &self.v1_url,
            ApiVersion::V2 => &self.v2_url,
        }
    }

    /// Raw JSON body of the pools endpoint
    pub async fn fetch_pools_raw(
        &self,
        version: ApiVersion,
        chain: u64,
        block: Option<u64>,
    ) -> Result<Value> {
        let url = self.url(version);
        let http = &self.http;
        trace!("GET {} chainId={} block={:?}", url, chain, block);

        self.retry
            .run(&format!("{} pools", version), || async move {
                let mut req = http.get(url).query(&[("chainId", chain)]);
                if let Some(b) = block {
                    req = req.query(&[("blockNumber", b)]);
                }
                let body = req.send().await?.error_for_status()?.json::<Value>().await?;
                Ok::<Value, eyre::Report>(body)
            })
            .await
    }

    /// Every pool on the chain at `block` (latest when `None`)
    pub async fn fetch_pools(
        &self,
        version: ApiVersion,
        chain: u64,
        block: Option<u64>,
    ) -> Result<Vec<PoolSnapshot>> {
        let body = self.fetch_pools_raw(version, chain, block).await?;
        let pools = normalize_pool_list(body)?;
        debug!("📥 {} pools from {} (block {:?})", pools.len(), version, block);
        Ok(pools)
    }

    /// One pool, matched case-insensitively
    pub async fn fetch_pool(
        &self,
        version: ApiVersion,
        chain: u64,
        pool: &str,
        block: Option<u64>,
    ) -> Result<PoolSnapshot> {
        self.fetch_pools(version, chain, block)
            .await?
            .into_iter()
            .find(|p| p.matches(pool))
            .ok_or_else(|| {
                eyre::Report::new(PoolNotFound {
                    pool: pool.to_string(),
                    block,
                })
            })
    }

    /// Raw JSON of one pool (for `--raw` output)
    pub async fn fetch_pool_raw(
        &self,
        version: ApiVersion,
        chain: u64,
        pool: &str,
        block: Option<u64>,
    ) -> Result<Value> {
        let body = self.fetch_pools_raw(version, chain, block).await?;
        let items = match body {
            Value::Array(items) => items,
            Value::Object(mut map) => match map.remove("data") {
                Some(Value::Array(items)) => items,
                _ => vec![Value::Object(map)],
            },
            _ => vec![],
        };
        items
            .into_iter()
            .find(|item| {
                item.get("pool")
                    .and_then(Value::as_str)
                    .map(|p| p.eq_ignore_ascii_case(pool))
                    .unwrap_or(false)
            })
            .ok_or_else(|| {
                eyre::Report::new(PoolNotFound {
                    pool: pool.to_string(),
                    block,
                })
            })
    }

    /// Whether the index still serves this pool at `block`. Only an
    /// answer without the pool counts as `false`; outages are errors.
    pub async fn has_data_at(&self, version: ApiVersion, chain: u64, pool: &str, block: u64) -> Result<bool> {
        match self.fetch_pool(version, chain, pool, Some(block)).await {
            Ok(_) => Ok(true),
            Err(e) if is_not_found(&e) => {
                trace!("no {} data for {} at {}", version, pool, block);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

// ============================================
// TESTS
// ============================================
