//! Historical and lifespan returns
//!
//! A lifespan runs from the pool's creation block to the newest block the
//! REST index still serves. Active pools end at head; uninstalled pools end
//! wherever the data stops, found by binary search and cached.

use eyre::{eyre, Result};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::calculator::{NavCalculator, NetNav};
use super::returns::PeriodReturn;
use crate::cache::pool_cache::{PoolCache, PoolCacheEntry};
use crate::indexer::etherscan::BlockOracle;
use crate::indexer::graphql::GraphqlClient;
use crate::indexer::rest::{ApiVersion, RestClient};
use crate::indexer::rpc::ChainRpc;

/// Gap to head beyond which a last available block is considered final
const INACTIVE_GAP_BLOCKS: u64 = 100;

#[derive(Debug, Clone, Serialize)]
pub struct HistoricalReturn {
    pub start: NetNav,
    pub end: NetNav,
    #[serde(rename = "return")]
    pub period: PeriodReturn,
}

#[derive(Debug, Clone, Serialize)]
pub struct LifespanReturn {
    pub created_at: u64,
    pub from_block: u64,
    pub to_block: u64,
    pub result: HistoricalReturn,
}

/// Newest block in `[lo, hi]` for which `has_data` holds, assuming data is
/// contiguous from `lo`. The first failed check aborts the search.
pub async fn newest_block_with<F, Fut>(lo: u64, hi: u64, mut has_data: F) -> Result<Option<u64>>
where
    F: FnMut(u64) -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let mut left = lo;
    let mut right = hi;
    let mut last_ok = None;

    while left <= right {
        let mid = left + (right - left) / 2;
        if has_data(mid).await? {
            last_ok = Some(mid);
            left = mid + 1;
        } else {
            if mid == 0 {
                break;
            }
            right = mid - 1;
        }
    }

    Ok(last_ok)
}

#[derive(Clone)]
pub struct LifespanAnalyzer {
    rest: RestClient,
    rpc: ChainRpc,
    nav: NavCalculator,
    pool_cache: Arc<PoolCache>,
    graphql: GraphqlClient,
    oracle: BlockOracle,
    chain: u64,
}

impl LifespanAnalyzer {
    pub fn new(
        rest: RestClient,
        rpc: ChainRpc,
        nav: NavCalculator,
        pool_cache: Arc<PoolCache>,
        graphql: GraphqlClient,
        oracle: BlockOracle,
        chain: u64,
    ) -> Self {
        Self {
            rest,
            rpc,
            nav,
            pool_cache,
            graphql,
            oracle,
            chain,
        }
    }

    /// NAV at both blocks from v1 snapshots, priced at each block
    pub async fn historical_return(&self, pool: &str, from_block: u64, to_block: u64) -> Result<HistoricalReturn> {
        let start_snapshot = self
            .rest
            .fetch_pool(ApiVersion::V1, self.chain, pool, Some(from_block))
            .await?;
        let end_snapshot = self
            .rest
            .fetch_pool(ApiVersion::V1, self.chain, pool, Some(to_block))
            .await?;

        let start = self.nav.calculate(&start_snapshot, Some(from_block)).await?;
        let end = self.nav.calculate(&end_snapshot, Some(to_block)).await?;

        let period = PeriodReturn::between(
            start.nav,
            start.timestamp.unwrap_or(0),
            end.nav,
            end.timestamp.unwrap_or(0),
        );

        Ok(HistoricalReturn { start, end, period })
    }

    pub async fn find_last_available_block(&self, pool: &str, lo: u64, hi: u64) -> Result<Option<u64>> {
        debug!("🔎 Searching last available block for {} in [{}, {}]", pool, lo, hi);
        newest_block_with(lo, hi, |block| {
            self.rest.has_data_at(ApiVersion::V1, self.chain, pool, block)
        })
        .await
    }

    /// Cached block (still valid) → head → binary search. Nothing is cached
    /// when a check fails.
    pub async fn last_available_block(&self, pool: &str, creation_block: u64, head: u64) -> Result<Option<u64>> {
        if let Some(cached) = self.pool_cache.last_available_block(pool, self.chain).await {
            if cached < head && self.rest.has_data_at(ApiVersion::V1, self.chain, pool, cached).await? {
                debug!("📦 Last available block for {} from cache: {}", pool, cached);
                return Ok(Some(cached));
            }
        }

        if self.rest.has_data_at(ApiVersion::V1, self.chain, pool, head).await? {
            return Ok(Some(head));
        }

        if head == 0 || creation_block > head - 1 {
            return Ok(None);
        }

        let found = self.find_last_available_block(pool, creation_block, head - 1).await?;
        if let Some(block) = found {
            if block < head.saturating_sub(INACTIVE_GAP_BLOCKS) {
                info!("📦 Pool {} looks uninstalled, caching last block {}", pool, block);
                self.pool_cache
                    .set_last_available_block(pool, self.chain, block)
                    .await?;
            }
        }
        Ok(found)
    }

    /// Cached creation block. Without an Etherscan key the block is a
    /// timestamp estimate; when the index has no data there it is replaced
    /// by an RPC search on the creation timestamp.
    pub async fn creation_entry(&self, pool: &str) -> Result<PoolCacheEntry> {
        let mut entry = self
            .pool_cache
            .creation_block(pool, self.chain, &self.graphql, &self.oracle)
            .await?;

        if self.oracle.has_api_key()
            || self
                .rest
                .has_data_at(ApiVersion::V1, self.chain, pool, entry.creation_block)
                .await?
        {
            return Ok(entry);
        }

        match self.rpc.block_at_or_after_timestamp(entry.created_at).await {
            Ok(block) => {
                info!("🧱 Creation block of {} refined via RPC: {} → {}", pool, entry.creation_block, block);
                self.pool_cache
                    .upsert(pool, self.chain, entry.created_at, block, entry.last_available_block)
                    .await?;
                entry.creation_block = block;
            }
            Err(e) => warn!("⚠️ Keeping estimated creation block for {}: {}", pool, e),
        }
        Ok(entry)
    }

    pub async fn lifespan_return(&self, pool: &str) -> Result<LifespanReturn> {
        let entry = self.creation_entry(pool).await?;
        let head = self.rpc.head_block().await?;

        let to_block = self
            .last_available_block(pool, entry.creation_block, head)
            .await?
            .ok_or_else(|| eyre!("No available data found for pool {}", pool))?;

        info!("⏱️ Lifespan of {}: block {} → {}", pool, entry.creation_block, to_block);
        let result = self
            .historical_return(pool, entry.creation_block, to_block)
            .await?;

        Ok(LifespanReturn {
            created_at: entry.created_at,
            from_block: entry.creation_block,
            to_block,
            result,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::token_cache::{TokenCache, TokenResolver};
    use crate::indexer::retry::RetryPolicy;
    use reqwest::Client;
    use serde_json::json;
    use tempfile::tempdir;
    use wiremock::matchers::method;
    use std::sync::atomic::{AtomicBool, Ordering};
    use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

    /// Serves the pool only up to `last_block`
    struct PoolsUntil {
        last_block: u64,
    }

    impl Respond for PoolsUntil {
        fn respond(&self, request: &Request) -> ResponseTemplate {
            let block = request
                .url
                .query_pairs()
                .find(|(k, _)| k == "blockNumber")
                .and_then(|(_, v)| v.parse::<u64>().ok());
            match block {
                Some(b) if b > self.last_block => ResponseTemplate::new(200).set_body_json(json!([])),
                _ => ResponseTemplate::new(200).set_body_json(json!([{ "pool": "0xpool" }])),
            }
        }
    }

    /// Like `PoolsUntil`, but the first request for `fail_block` gets a 503
    struct FlakyPoolsUntil {
        last_block: u64,
        fail_block: u64,
        failed: AtomicBool,
    }

    impl Respond for FlakyPoolsUntil {
        fn respond(&self, request: &Request) -> ResponseTemplate {
            let block = request
                .url
                .query_pairs()
                .find(|(k, _)| k == "blockNumber")
                .and_then(|(_, v)| v.parse::<u64>().ok());
            if block == Some(self.fail_block) && !self.failed.swap(true, Ordering::SeqCst) {
                return ResponseTemplate::new(503);
            }
            PoolsUntil { last_block: self.last_block }.respond(request)
        }
    }

    async fn analyzer(server: &MockServer, cache: Arc<PoolCache>) -> LifespanAnalyzer {
        let http = Client::new();
        let retry = RetryPolicy::none();
        let rest = RestClient::new(http.clone(), retry.clone(), server.uri(), server.uri());
        let graphql = GraphqlClient::new(http.clone(), retry.clone(), "http://127.0.0.1:1".into());
        let rpc = ChainRpc::new("http://127.0.0.1:1".into(), retry);
        let dir = tempdir().unwrap();
        let tokens = TokenResolver::new(
            Arc::new(TokenCache::new(dir.path().join("tokens.csv"))),
            rpc.clone(),
            graphql.clone(),
            1,
        );
        let nav = NavCalculator::new(graphql.clone(), tokens, 1, "oracle".into());
        let oracle = BlockOracle::new(http, None, "http://127.0.0.1:1".into());
        LifespanAnalyzer::new(rest, rpc, nav, cache, graphql, oracle, 1)
    }

    #[tokio::test]
    async fn test_last_available_block_searches_and_caches() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(PoolsUntil { last_block: 5_000 })
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let cache = Arc::new(PoolCache::new(dir.path().join("pools.csv")));
        cache.upsert("0xpool", 1, 100, 1_000, None).await.unwrap();
        let analyzer = analyzer(&server, cache.clone()).await;

        let last = analyzer.last_available_block("0xpool", 1_000, 10_000).await.unwrap();
        assert_eq!(last, Some(5_000));
        assert_eq!(cache.last_available_block("0xpool", 1).await, Some(5_000));

        // cached value is reused
        let again = analyzer.last_available_block("0xpool", 1_000, 10_000).await.unwrap();
        assert_eq!(again, Some(5_000));
    }

    #[tokio::test]
    async fn test_outage_mid_search_is_not_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(FlakyPoolsUntil {
                last_block: 9_000,
                fail_block: 5_499,
                failed: AtomicBool::new(false),
            })
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let cache = Arc::new(PoolCache::new(dir.path().join("pools.csv")));
        cache.upsert("0xpool", 1, 100, 1_000, None).await.unwrap();
        let analyzer = analyzer(&server, cache.clone()).await;

        // first check of the search (block 5499) hits the 503
        assert!(analyzer.last_available_block("0xpool", 1_000, 10_000).await.is_err());
        assert_eq!(cache.last_available_block("0xpool", 1).await, None);

        let last = analyzer.last_available_block("0xpool", 1_000, 10_000).await.unwrap();
        assert_eq!(last, Some(9_000));
        assert_eq!(cache.last_available_block("0xpool", 1).await, Some(9_000));
    }

    #[tokio::test]
    async fn test_last_available_block_active_pool_is_head() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(PoolsUntil { last_block: u64::MAX })
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let cache = Arc::new(PoolCache::new(dir.path().join("pools.csv")));
        let analyzer = analyzer(&server, cache.clone()).await;

        let last = analyzer.last_available_block("0xPOOL", 1_000, 10_000).await.unwrap();
        assert_eq!(last, Some(10_000));
        assert_eq!(cache.last_available_block("0xpool", 1).await, None);
    }

    #[tokio::test]
    async fn test_recent_gap_not_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(PoolsUntil { last_block: 9_950 })
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let cache = Arc::new(PoolCache::new(dir.path().join("pools.csv")));
        cache.upsert("0xpool", 1, 100, 1_000, None).await.unwrap();
        let analyzer = analyzer(&server, cache.clone()).await;

        let last = analyzer.last_available_block("0xpool", 1_000, 10_000).await.unwrap();
        assert_eq!(last, Some(9_950));
        assert_eq!(cache.last_available_block("0xpool", 1).await, None);
    }

    #[tokio::test]
    async fn test_creation_entry_keeps_estimate_when_rpc_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(PoolsUntil { last_block: 500 })
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let cache = Arc::new(PoolCache::new(dir.path().join("pools.csv")));
        cache.upsert("0xpool", 1, 100, 1_000, None).await.unwrap();
        let analyzer = analyzer(&server, cache.clone()).await;

        let entry = analyzer.creation_entry("0xpool").await.unwrap();
        assert_eq!(entry.creation_block, 1_000);
        assert_eq!(cache.get("0xpool", 1).await.unwrap().creation_block, 1_000);
    }

    #[tokio::test]
    async fn test_newest_block_with() {
        // data stops after block 1234
        let found = newest_block_with(1_000, 5_000, |b| async move { Ok(b <= 1_234) }).await;
        assert_eq!(found.unwrap(), Some(1_234));

        let all = newest_block_with(1_000, 5_000, |_| async { Ok(true) }).await;
        assert_eq!(all.unwrap(), Some(5_000));

        let none = newest_block_with(1_000, 5_000, |_| async { Ok(false) }).await;
        assert_eq!(none.unwrap(), None);

        let from_zero = newest_block_with(0, 10, |b| async move { Ok(b == 0) }).await;
        assert_eq!(from_zero.unwrap(), Some(0));

        let failed = newest_block_with(0, 10, |_| async { Err(eyre!("index down")) }).await;
        assert!(failed.is_err());
    }

    #[tokio::test]
    async fn test_newest_block_check_count_is_logarithmic() {
        let mut checks = 0u32;
        let found = newest_block_with(0, 1_000_000, |b| {
            checks += 1;
            async move { Ok(b <= 777_777) }
        })
        .await
        .unwrap();
        assert_eq!(found, Some(777_777));
        assert!(checks <= 21);
    }
}
