//! Token metadata cache and resolver
//!
//! Symbol lookup order: CSV cache → known tokens → on-chain `symbol()` →
//! index `token` entity → short address. Decimals follow the same order
//! without the index step and default to 18.

use eyre::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{file_size, load_rows, now_stamp, remove_file, write_rows, CacheStats};
use crate::indexer::graphql::GraphqlClient;
use crate::indexer::rpc::ChainRpc;
use crate::tokens;

const HEADER: &[&str] = &["address", "symbol", "decimals", "last_updated"];

const DEFAULT_DECIMALS: u8 = 18;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCacheEntry {
    pub address: String,
    pub symbol: Option<String>,
    pub decimals: Option<u8>,
    pub last_updated: String,
}

pub struct TokenCache {
    path: PathBuf,
    entries: Mutex<Option<HashMap<String, TokenCacheEntry>>>,
}

impl TokenCache {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            entries: Mutex::new(None),
        }
    }

    fn load(path: &Path) -> HashMap<String, TokenCacheEntry> {
        load_rows::<TokenCacheEntry>(path)
            .into_iter()
            .map(|mut e| {
                e.address = e.address.to_lowercase();
                e.symbol = e.symbol.filter(|s| !s.trim().is_empty());
                (e.address.clone(), e)
            })
            .collect()
    }

    fn save(&self, entries: &HashMap<String, TokenCacheEntry>) -> Result<()> {
        let mut rows: Vec<&TokenCacheEntry> = entries.values().collect();
        rows.sort_by(|a, b| a.address.cmp(&b.address));
        write_rows(&self.path, HEADER, rows)
    }

    pub async fn get(&self, address: &str) -> Option<TokenCacheEntry> {
        let mut guard = self.entries.lock().await;
        let entries = guard.get_or_insert_with(|| Self::load(&self.path));
        entries.get(&address.to_lowercase()).cloned()
    }

    /// Merge new metadata into the entry; `None` keeps stored values
    pub async fn upsert(&self, address: &str, symbol: Option<String>, decimals: Option<u8>) -> Result<()> {
        let mut guard = self.entries.lock().await;
        let entries = guard.get_or_insert_with(|| Self::load(&self.path));
        let key = address.to_lowercase();

        let existing = entries.get(&key);
        let entry = TokenCacheEntry {
            address: key.clone(),
            symbol: symbol.or_else(|| existing.and_then(|e| e.symbol.clone())),
            decimals: decimals.or_else(|| existing.and_then(|e| e.decimals)),
            last_updated: now_stamp(),
        };
        entries.insert(key, entry);
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

    /// `(address, symbol)` of every entry with a symbol, sorted by symbol
    pub async fn symbols(&self) -> Vec<(String, String)> {
        let mut guard = self.entries.lock().await;
        let entries = guard.get_or_insert_with(|| Self::load(&self.path));
        let mut symbols: Vec<(String, String)> = entries
            .values()
            .filter_map(|e| e.symbol.clone().map(|s| (e.address.clone(), s)))
            .collect();
        symbols.sort_by(|a, b| a.1.cmp(&b.1));
        symbols
    }
}

// ============================================
// RESOLVER
// ============================================

#[derive(Clone)]
pub struct TokenResolver {
    cache: Arc<TokenCache>,
    rpc: ChainRpc,
    graphql: GraphqlClient,
    chain: u64,
}

impl TokenResolver {
    pub fn new(cache: Arc<TokenCache>, rpc: ChainRpc, graphql: GraphqlClient, chain: u64) -> Self {
        Self { cache, rpc, graphql, chain }
    }

    pub fn cache(&self) -> &TokenCache {
        &self.cache
    }

    pub async fn symbol(&self, address: &str) -> String {
        if let Some(symbol) = self.cache.get(address).await.and_then(|e| e.symbol) {
            return symbol;
        }
        if let Some(symbol) = tokens::known_symbol(address) {
            return symbol.to_string();
        }

        match self.rpc.token_metadata(address).await {
            Ok(meta) if meta.symbol.is_some() => {
                debug!("🪙 {} symbol from chain: {:?}", address, meta.symbol);
                if let Err(e) = self.cache.upsert(address, meta.symbol.clone(), meta.decimals).await {
                    debug!("Could not store token metadata: {}", e);
                }
                if let Some(symbol) = meta.symbol {
                    return symbol;
                }
            }
            Ok(_) => {}
            Err(e) => debug!("token metadata call failed for {}: {}", address, e),
        }

        if let Some(symbol) = self.graphql.fetch_token_symbol(self.chain, address).await {
            return symbol;
        }

        tokens::short_address(address)
    }

    pub async fn decimals(&self, address: &str) -> u8 {
        if let Some(decimals) = self.cache.get(address).await.and_then(|e| e.decimals) {
            return decimals;
        }
        if let Some(decimals) = tokens::known_decimals(address) {
            return decimals;
        }

        match self.rpc.token_metadata(address).await {
            Ok(meta) => {
                if let Some(decimals) = meta.decimals {
                    if let Err(e) = self.cache.upsert(address, meta.symbol, Some(decimals)).await {
                        debug!("Could not store token metadata: {}", e);
                    }
                    return decimals;
                }
            }
            Err(e) => debug!("token metadata call failed for {}: {}", address, e),
        }

        DEFAULT_DECIMALS
    }

    /// "USDC/USDT" style label
    pub async fn pair_label(&self, asset0: &str, asset1: &str) -> String {
        format!("{}/{}", self.symbol(asset0).await, self.symbol(asset1).await)
    }
}

// ============================================
// TESTS
// ============================================
