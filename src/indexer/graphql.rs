//! GraphQL client for the Euler index
//!
//! Oracle prices, pool deployments/configs, swaps and token symbols. The
//! index expects lowercase addresses in `where` clauses.

use alloy_primitives::U256;
use eyre::{eyre, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::collections::HashSet;
use tracing::{debug, trace, warn};

use super::retry::RetryPolicy;
use super::types::{
    parse_u256, Page, PoolConfig, PoolDeployment, SwapEvent, DEFAULT_FEE_RATE,
};
use crate::config::Config;
use crate::tokens::u256_to_f64;

/// Deployments per page (index maximum)
const DEPLOYMENT_PAGE_SIZE: usize = 100;

/// Swaps per page (index maximum)
const SWAP_PAGE_SIZE: usize = 1000;

// ============================================
// ORACLE PRICE
// ============================================

/// Fixed-point oracle price as stored by the index
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OraclePrice {
    pub raw: U256,
    pub scale: f64,
}

impl OraclePrice {
    /// Scale follows magnitude: up to 9 digits is 1e8, longer is 1e18
    pub fn from_raw_str(raw: &str) -> Option<Self> {
        let raw = parse_u256(raw)?;
        let digits = raw.to_string().len();
        let scale = if digits <= 9 { 1e8 } else { 1e18 };
        Some(Self { raw, scale })
    }

    /// Price from a plain USD float (external APIs), stored at 1e8
    pub fn from_usd(price: f64) -> Self {
        let raw = if price.is_finite() && price > 0.0 {
            U256::from((price * 1e8).round() as u128)
        } else {
            U256::ZERO
        };
        Self { raw, scale: 1e8 }
    }

    pub fn usd(&self) -> f64 {
        u256_to_f64(self.raw) / self.scale
    }
}

// ============================================
// CLIENT
// ============================================

#[derive(Debug, Clone)]
pub struct GraphqlClient {
    http: Client,
    retry: RetryPolicy,
    url: String,
}

impl GraphqlClient {
    pub fn new(http: Client, retry: RetryPolicy, url: String) -> Self {
        Self { http, retry, url }
    }

    pub fn from_config(config: &Config, http: Client) -> Self {
        Self::new(http, config.retry_policy(), config.graphql_url.clone())
    }

    /// POST a query, return its `data` object
    pub async fn query(&self, query: &str) -> Result<Value> {
        let http = &self.http;
        let url = self.url.as_str();
        let body = json!({ "query": query });

        let response: Value = self
            .retry
            .run("GraphQL query", || {
                let body = &body;
                async move {
                    let value = http
                        .post(url)
                        .json(body)
                        .send()
                        .await?
                        .error_for_status()?
                        .json::<Value>()
                        .await?;
                    Ok::<Value, eyre::Report>(value)
                }
            })
            .await?;

        if let Some(errors) = response.get("errors").and_then(Value::as_array) {
            if !errors.is_empty() {
                let messages: Vec<String> = errors
                    .iter()
                    .map(|e| {
                        e.get("message")
                            .and_then(Value::as_str)
                            .map(String::from)
                            .unwrap_or_else(|| e.to_string())
                    })
                    .collect();
                return Err(eyre!("GraphQL error: {}", messages.join("; ")));
            }
        }

        Ok(response.get("data").cloned().unwrap_or(Value::Null))
    }

    /// Forward a raw request body and hand back the raw response
    pub async fn forward_raw(&self, body: Vec<u8>) -> Result<(u16, Vec<u8>)> {
        let response = self
            .http
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await?;
        Ok((status, bytes.to_vec()))
    }

    fn field<T: DeserializeOwned>(data: &Value, name: &str) -> Result<Option<T>> {
        match data.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => Ok(Some(serde_json::from_value(v.clone())?)),
        }
    }

    // ========== Prices ==========

    /// Latest oracle price at or before `block`
    pub async fn fetch_price(
        &self,
        chain: u64,
        asset: &str,
        source: &str,
        block: Option<u64>,
    ) -> Result<OraclePrice> {
        let mut where_clause = format!(
            r#"chainId: {}, asset: "{}", source: "{}""#,
            chain,
            asset.to_lowercase(),
            source
        );
        if let Some(b) = block {
            where_clause.push_str(&format!(r#", blockNumber_lte: "{}""#, b));
        }

        let query = format!(
            r#"query {{
  priceCrons(
    where: {{ {} }}
    orderBy: "blockNumber"
    orderDirection: "desc"
    limit: 1
  ) {{
    items {{ price }}
  }}
}}"#,
            where_clause
        );

        let data = self.query(&query).await?;
        let raw = data
            .pointer("/priceCrons/items/0/price")
            .and_then(|p| match p {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .ok_or_else(|| eyre!("No price found for {}", asset))?;

        let price = OraclePrice::from_raw_str(&raw)
            .ok_or_else(|| eyre!("Unparseable price '{}' for {}", raw, asset))?;
        trace!("💲 {} @ {:?} = {}", asset, block, price.usd());
        Ok(price)
    }

    // ========== Pools ==========

    pub async fn fetch_pool_deployment(&self, chain: u64, pool: &str) -> Result<PoolDeployment> {
        let query = format!(
            r#"query {{
  deployment: eulerSwapFactoryPoolDeployed(chainId: {}, pool: "{}") {{
    pool
    createdAt
    eulerAccount
    asset0
    asset1
    asset0Decimals
    asset1Decimals
  }}
}}"#,
            chain,
            pool.to_lowercase()
        );

        let data = self.query(&query).await?;
        let deployment: PoolDeployment = Self::field(&data, "deployment")?
            .ok_or_else(|| eyre!("Pool {} not found or missing createdAt", pool))?;
        if deployment.created_at.is_none() {
            return Err(eyre!("Pool {} not found or missing createdAt", pool));
        }
        Ok(deployment)
    }

    /// Creation timestamp of a pool
    pub async fn fetch_pool_created_at(&self, chain: u64, pool: &str) -> Result<u64> {
        self.fetch_pool_deployment(chain, pool)
            .await?
            .created_at
            .ok_or_else(|| eyre!("Pool {} not found or missing createdAt", pool))
    }

    pub async fn fetch_pool_config(&self, chain: u64, pool: &str) -> Result<PoolConfig> {
        let query = format!(
            r#"query {{
  config: eulerSwapFactoryPoolConfig(chainId: {}, pool: "{}") {{
    fee
    protocolFee
    protocolFeeRecipient
    vault0
    vault1
    eulerAccount
    currReserve0
    currReserve1
  }}
}}"#,
            chain,
            pool.to_lowercase()
        );

        let data = self.query(&query).await?;
        Self::field(&data, "config")?.ok_or_else(|| eyre!("No config for pool {}", pool))
    }

    /// Pool fee as a fraction (0.0005 = 5 bps); 1 bp when unknown
    pub async fn fetch_fee_rate(&self, chain: u64, pool: &str) -> f64 {
        match self.fetch_pool_config(chain, pool).await {
            Ok(config) if config.fee > 0.0 => config.fee_fraction(),
            Ok(_) => DEFAULT_FEE_RATE,
            Err(e) => {
                warn!("Could not fetch pool fee rate: {} - assuming 1 bp", e);
                DEFAULT_FEE_RATE
            }
        }
    }

    pub async fn fetch_token_symbol(&self, chain: u64, address: &str) -> Option<String> {
        let query = format!(
            r#"query {{
  token(chainId: {}, address: "{}") {{
    symbol
    name
  }}
}}"#,
            chain,
            address.to_lowercase()
        );

        match self.query(&query).await {
            Ok(data) => data
                .pointer("/token/symbol")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(String::from),
            Err(e) => {
                debug!("token symbol lookup failed for {}: {}", address, e);
                None
            }
        }
    }

    // ========== Deployments ==========

    async fn fetch_deployment_pages(&self, where_clause: &str) -> Result<Vec<PoolDeployment>> {
        let mut all = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let after = cursor
                .as_ref()
                .map(|c| format!(r#"after: "{}""#, c))
                .unwrap_or_default();
            let query = format!(
                r#"query {{
  deployments: eulerSwapFactoryPoolDeployeds(
    where: {{ {} }}
    orderBy: "createdAt"
    orderDirection: "desc"
    limit: {}
    {}
  ) {{
    items {{
      pool
      createdAt
      eulerAccount
      asset0
      asset1
      asset0Decimals
      asset1Decimals
    }}
    pageInfo {{
      hasNextPage
      endCursor
    }}
  }}
}}"#,
                where_clause, DEPLOYMENT_PAGE_SIZE, after
            );

            let data = self.query(&query).await?;
            let page: Page<PoolDeployment> = match Self::field(&data, "deployments")? {
                Some(page) => page,
                None => break,
            };
            if page.items.is_empty() {
                break;
            }
            all.extend(page.items);
            debug!("📄 {} deployments so far", all.len());

            match (page.page_info.has_next_page, page.page_info.end_cursor) {
                (true, Some(next)) => cursor = Some(next),
                _ => break,
            }
        }

        Ok(all)
    }

    /// Every deployment on the chain, including uninstalled pools
    pub async fn fetch_deployments(&self, chain: u64) -> Result<Vec<PoolDeployment>> {
        self.fetch_deployment_pages(&format!("chainId: {}", chain)).await
    }

    /// Deployments owned by one Euler account, oldest first
    pub async fn fetch_account_deployments(
        &self,
        chain: u64,
        account: &str,
    ) -> Result<Vec<PoolDeployment>> {
        let mut deployments = self
            .fetch_deployment_pages(&format!(
                r#"chainId: {}, eulerAccount: "{}""#,
                chain,
                account.to_lowercase()
            ))
            .await?;
        deployments.sort_by_key(|d| d.created_at.unwrap_or(0));
        Ok(deployments)
    }

    /// Pools for a token pair in either asset order, deduplicated
    pub async fn search_pools_by_pair(
        &self,
        chain: u64,
        token0: &str,
        token1: &str,
    ) -> Result<Vec<PoolDeployment>> {
        let t0 = token0.to_lowercase();
        let t1 = token1.to_lowercase();
        let mut seen = HashSet::new();
        let mut pools = Vec::new();

        for (a0, a1) in [(&t0, &t1), (&t1, &t0)] {
            let query = format!(
                r#"query {{
  pools: eulerSwapFactoryPoolDeployeds(where: {{chainId: {}, asset0: "{}", asset1: "{}"}}, limit: 100) {{
    items {{
      pool
      asset0
      asset1
      createdAt
      eulerAccount
      asset0Decimals
      asset1Decimals
    }}
  }}
}}"#,
                chain, a0, a1
            );

            let data = self.query(&query).await?;
            let page: Option<Page<PoolDeployment>> = Self::field(&data, "pools")?;
            for deployment in page.map(|p| p.items).unwrap_or_default() {
                if seen.insert(deployment.pool.to_lowercase()) {
                    pools.push(deployment);
                }
            }
        }

        Ok(pools)
    }

    // ========== Swaps ==========

    fn swaps_query(
        chain: u64,
        pool: &str,
        limit: usize,
        order_by: &str,
        direction: &str,
        after: Option<&str>,
    ) -> String {
        let after = after
            .map(|c| format!(r#"after: "{}""#, c))
            .unwrap_or_default();
        format!(
            r#"query {{
  swaps: eulerSwapSwaps(
    where: {{chainId: {}, pool: "{}"}}
    orderBy: "{}"
    orderDirection: "{}"
    limit: {}
    {}
  ) {{
    items {{
      blockNumber
      timestamp
      amount0In
      amount1In
      amount0Out
      amount1Out
      reserve0
      reserve1
      fee0
      fee1
    }}
    pageInfo {{
      hasNextPage
      endCursor
    }}
  }}
}}"#,
            chain,
            pool.to_lowercase(),
            order_by,
            direction,
            limit,
            after
        )
    }

    /// Newest swaps first
    pub async fn fetch_recent_swaps(&self, chain: u64, pool: &str, limit: usize) -> Result<Vec<SwapEvent>> {
        let data = self
            .query(&Self::swaps_query(chain, pool, limit, "timestamp", "desc", None))
            .await?;
        let page: Option<Page<SwapEvent>> = Self::field(&data, "swaps")?;
        Ok(page.map(|p| p.items).unwrap_or_default())
    }

    /// Oldest swap of a pool, if it ever traded
    pub async fn fetch_first_swap(&self, chain: u64, pool: &str) -> Result<Option<SwapEvent>> {
        let data = self
            .query(&Self::swaps_query(chain, pool, 1, "timestamp", "asc", None))
            .await?;
        let page: Option<Page<SwapEvent>> = Self::field(&data, "swaps")?;
        Ok(page.and_then(|p| p.items.into_iter().next()))
    }

    /// Number of swaps, capped at one page (1000)
    pub async fn fetch_swap_count(&self, chain: u64, pool: &str) -> Result<usize> {
        Ok(self.fetch_recent_swaps(chain, pool, SWAP_PAGE_SIZE).await?.len())
    }

    /// All swaps newer than `since_ts`, newest first
    pub async fn fetch_swaps_since(&self, chain: u64, pool: &str, since_ts: u64) -> Result<Vec<SwapEvent>> {
        let mut all = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let query = Self::swaps_query(
                chain,
                pool,
                SWAP_PAGE_SIZE,
                "blockNumber",
                "desc",
                cursor.as_deref(),
            );
            let data = self.query(&query).await?;
            let page: Page<SwapEvent> = match Self::field(&data, "swaps")? {
                Some(page) => page,
                None => break,
            };
            if page.items.is_empty() {
                break;
            }

            let reached_start = page
                .items
                .last()
                .map(|s| s.timestamp < since_ts)
                .unwrap_or(true);
            all.extend(page.items);

            if reached_start {
                debug!("Reached swaps before start date, stopping pagination");
                break;
            }
            match (page.page_info.has_next_page, page.page_info.end_cursor) {
                (true, Some(next)) => cursor = Some(next),
                _ => break,
            }
        }

        debug!("🔄 {} swaps fetched for {}", all.len(), pool);
        Ok(all)
    }
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> GraphqlClient {
        GraphqlClient::new(
            Client::new(),
            RetryPolicy::new(2, Duration::from_millis(1), Duration::from_millis(2)),
            format!("{}/graphql", server.uri()),
        )
    }

    #[test]
    fn test_price_scale_detection() {
        let p8 = OraclePrice::from_raw_str("100020000").unwrap();
        assert_eq!(p8.scale, 1e8);
        assert!((p8.usd() - 1.0002).abs() < 1e-12);

        let p18 = OraclePrice::from_raw_str("4312500000000000000000").unwrap();
        assert_eq!(p18.scale, 1e18);
        assert!((p18.usd() - 4312.5).abs() < 1e-9);

        assert!(OraclePrice::from_raw_str("abc").is_none());
        assert!((OraclePrice::from_usd(2500.25).usd() - 2500.25).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_fetch_price_with_block() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .and(body_string_contains("blockNumber_lte"))
            .and(body_string_contains("0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "priceCrons": { "items": [ { "price": "99990000" } ] } }
            })))
            .mount(&server)
            .await;

        let price = client(&server)
            .fetch_price(1, "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48", "oracle", Some(23_000_000))
            .await
            .unwrap();
        assert!((price.usd() - 0.9999).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_missing_price_and_graphql_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("priceCrons"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "priceCrons": { "items": [] } }
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_string_contains("eulerSwapFactoryPoolConfig"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "errors": [ { "message": "boom" } ]
            })))
            .mount(&server)
            .await;

        let gql = client(&server);
        let err = gql.fetch_price(1, "0x01", "oracle", None).await.unwrap_err();
        assert!(err.to_string().contains("No price found"));

        let err = gql.fetch_pool_config(1, "0x02").await.unwrap_err();
        assert!(err.to_string().contains("boom"));

        // fee lookups degrade to the default
        assert_eq!(gql.fetch_fee_rate(1, "0x02").await, DEFAULT_FEE_RATE);
    }

    #[tokio::test]
    async fn test_pool_deployment_requires_created_at() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "deployment": { "pool": "0x01", "createdAt": null } }
            })))
            .mount(&server)
            .await;

        assert!(client(&server).fetch_pool_created_at(1, "0x01").await.is_err());
    }

    #[tokio::test]
    async fn test_search_pools_by_pair_dedupes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "pools": { "items": [
                    { "pool": "0xAAA", "asset0": "0x1", "asset1": "0x2", "createdAt": "1750000000" }
                ] } }
            })))
            .mount(&server)
            .await;

        let pools = client(&server)
            .search_pools_by_pair(1, "0x1", "0x2")
            .await
            .unwrap();
        assert_eq!(pools.len(), 1);
        assert_eq!(pools[0].created_at, Some(1_750_000_000));
    }

    #[tokio::test]
    async fn test_deployment_pagination_follows_cursor() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("after: \\\"c1\\\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "deployments": {
                    "items": [ { "pool": "0x02", "createdAt": "2" } ],
                    "pageInfo": { "hasNextPage": false, "endCursor": null }
                } }
            })))
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "deployments": {
                    "items": [ { "pool": "0x01", "createdAt": "1" } ],
                    "pageInfo": { "hasNextPage": true, "endCursor": "c1" }
                } }
            })))
            .with_priority(2)
            .mount(&server)
            .await;

        let deployments = client(&server).fetch_deployments(1).await.unwrap();
        let pools: Vec<_> = deployments.iter().map(|d| d.pool.as_str()).collect();
        assert_eq!(pools, vec!["0x01", "0x02"]);
    }

    #[tokio::test]
    async fn test_swaps_since_stops_at_start() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "swaps": {
                    "items": [
                        { "blockNumber": "3", "timestamp": "300", "amount0In": "1" },
                        { "blockNumber": "2", "timestamp": "200", "amount1In": "1" }
                    ],
                    "pageInfo": { "hasNextPage": true, "endCursor": "next" }
                } }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let swaps = client(&server).fetch_swaps_since(1, "0x01", 250).await.unwrap();
        assert_eq!(swaps.len(), 2);
    }
}
