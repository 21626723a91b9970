//! Pool creation-block cache
//!
//! One CSV row per (pool, chain). Creation blocks never change; the last
//! available block is stored for uninstalled pools so the binary search
//! for it runs once.

use eyre::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{file_size, load_rows, now_stamp, remove_file, write_rows, CacheStats};
use crate::indexer::etherscan::BlockOracle;
use crate::indexer::graphql::GraphqlClient;

const HEADER: &[&str] = &[
    "pool_address",
    "chain_id",
    "created_at",
    "creation_block",
    "last_available_block",
    "last_updated",
];

/// Field order matches `HEADER`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolCacheEntry {
    pub pool_address: String,
    pub chain_id: u64,
    pub created_at: u64,
    pub creation_block: u64,
    pub last_available_block: Option<u64>,
    pub last_updated: String,
}

fn cache_key(pool: &str, chain: u64) -> String {
    format!("{}:{}", pool.to_lowercase(), chain)
}

pub struct PoolCache {
    path: PathBuf,
    entries: Mutex<Option<HashMap<String, PoolCacheEntry>>>,
}

impl PoolCache {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            entries: Mutex::new(None),
        }
    }

    fn load(path: &Path) -> HashMap<String, PoolCacheEntry> {
        let entries: HashMap<_, _> = load_rows::<PoolCacheEntry>(path)
            .into_iter()
            .map(|e| (cache_key(&e.pool_address, e.chain_id), e))
            .collect();
        debug!("📦 Loaded {} pool cache entries", entries.len());
        entries
    }

    fn save(&self, entries: &HashMap<String, PoolCacheEntry>) -> Result<()> {
        let mut rows: Vec<&PoolCacheEntry> = entries.values().collect();
        rows.sort_by(|a, b| {
            (a.chain_id, a.pool_address.as_str()).cmp(&(b.chain_id, b.pool_address.as_str()))
        });
        write_rows(&self.path, HEADER, rows)
    }

    pub async fn get(&self, pool: &str, chain: u64) -> Option<PoolCacheEntry> {
        let mut guard = self.entries.lock().await;
        let entries = guard.get_or_insert_with(|| Self::load(&self.path));
        entries.get(&cache_key(pool, chain)).cloned()
    }

    /// Insert or update an entry; `None` keeps a previously stored last
    /// available block
    pub async fn upsert(
        &self,
        pool: &str,
        chain: u64,
        created_at: u64,
        creation_block: u64,
        last_available_block: Option<u64>,
    ) -> Result<()> {
        let mut guard = self.entries.lock().await;
        let entries = guard.get_or_insert_with(|| Self::load(&self.path));
        let key = cache_key(pool, chain);

        let last_available_block = last_available_block
            .or_else(|| entries.get(&key).and_then(|e| e.last_available_block));

        entries.insert(
            key,
            PoolCacheEntry {
                pool_address: pool.to_lowercase(),
                chain_id: chain,
                created_at,
                creation_block,
                last_available_block,
                last_updated: now_stamp(),
            },
        );
        self.save(entries)
    }

    /// Cached entry, or resolve `createdAt` via GraphQL and its block via the
    /// oracle, then store it
    pub async fn creation_block(
        &self,
        pool: &str,
        chain: u64,
        graphql: &GraphqlClient,
        oracle: &BlockOracle,
    ) -> Result<PoolCacheEntry> {
        if let Some(entry) = self.get(pool, chain).await {
            debug!("📦 Creation block for {} from cache: {}", pool, entry.creation_block);
            return Ok(entry);
        }

        info!("🔍 Resolving creation block for {}", pool);
        let created_at = graphql.fetch_pool_created_at(chain, pool).await?;
        let (block, source) = oracle.block_by_timestamp(created_at).await;
        info!("   createdAt {} → block {} ({})", created_at, block, source);

        self.upsert(pool, chain, created_at, block, None).await?;
        self.get(pool, chain)
            .await
            .ok_or_else(|| eyre::eyre!("Pool {} missing from cache after insert", pool))
    }

    pub async fn last_available_block(&self, pool: &str, chain: u64) -> Option<u64> {
        self.get(pool, chain).await.and_then(|e| e.last_available_block)
    }

    /// Record the last available block; ignored for pools with no entry
    pub async fn set_last_available_block(&self, pool: &str, chain: u64, block: u64) -> Result<()> {
        let mut guard = self.entries.lock().await;
        let entries = guard.get_or_insert_with(|| Self::load(&self.path));

        match entries.get_mut(&cache_key(pool, chain)) {
            Some(entry) => {
                entry.last_available_block = Some(block);
                entry.last_updated = now_stamp();
            }
            None => {
                debug!("No cache entry for {}, not storing last available block", pool);
                return Ok(());
            }
        }
        self.save(entries)
    }

    pub async fn clear(&self) -> Result<()> {
        let mut guard = self.entries.lock().await;
        *guard = Some(HashMap::new());
        if remove_file(&self.path)? {
            info!("🗑️ Removed {}", self.path.display());
        }
        Ok(())
    }

    pub async fn stats(&self) -> CacheStats {
        let mut guard = self.entries.lock().await;
        let entries = guard.get_or_insert_with(|| Self::load(&self.path));

        CacheStats {
            path: self.path.display().to_string(),
            entries: entries.len(),
            file_size: file_size(&self.path),
            oldest: entries.values().map(|e| e.last_updated.clone()).min(),
            newest: entries.values().map(|e| e.last_updated.clone()).max(),
        }
    }
}

// ============================================
// TESTS
// ============================================
