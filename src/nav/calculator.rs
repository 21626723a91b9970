//! Net NAV calculator
//!
//! `nav = Σ assets·price − Σ borrowed·price` over the two vaults of a pool,
//! with amounts scaled by token decimals and prices by their oracle scale.

use alloy_primitives::U256;
use eyre::Result;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::token_cache::TokenResolver;
use crate::indexer::graphql::{GraphqlClient, OraclePrice};
use crate::indexer::types::{PoolSnapshot, VaultSnapshot};
use crate::tokens::format_units;

/// Pools priced concurrently by `calculate_all`
const NAV_CONCURRENCY: usize = 4;

// ============================================
// TYPES
// ============================================

/// One vault of the pool account with its price
#[derive(Debug, Clone)]
pub struct VaultPosition {
    pub symbol: String,
    pub asset: String,
    pub decimals: u8,
    pub assets: U256,
    pub borrowed: U256,
    pub price: OraclePrice,
}

impl VaultPosition {
    /// A vault without `accountNav` holds nothing
    pub fn from_vault(vault: &VaultSnapshot, symbol: String, price: OraclePrice) -> Self {
        let (assets, borrowed) = vault
            .account_nav
            .as_ref()
            .map(|n| (n.assets, n.borrowed))
            .unwrap_or((U256::ZERO, U256::ZERO));

        Self {
            symbol,
            asset: vault.asset.clone(),
            decimals: vault.decimals,
            assets,
            borrowed,
            price,
        }
    }

    pub fn value(&self) -> PositionValue {
        let assets = format_units(self.assets, self.decimals);
        let borrowed = format_units(self.borrowed, self.decimals);
        let price = self.price.usd();

        PositionValue {
            symbol: self.symbol.clone(),
            asset: self.asset.clone(),
            assets,
            borrowed,
            net: assets - borrowed,
            price,
            assets_usd: assets * price,
            borrowed_usd: borrowed * price,
            net_usd: (assets - borrowed) * price,
        }
    }
}

/// Position in human units and USD
#[derive(Debug, Clone, Serialize)]
pub struct PositionValue {
    pub symbol: String,
    pub asset: String,
    pub assets: f64,
    pub borrowed: f64,
    pub net: f64,
    pub price: f64,
    pub assets_usd: f64,
    pub borrowed_usd: f64,
    pub net_usd: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct NetNav {
    pub nav: f64,
    pub total_assets_usd: f64,
    pub total_borrowed_usd: f64,
    pub block: Option<u64>,
    pub timestamp: Option<u64>,
    pub positions: Vec<PositionValue>,
}

impl NetNav {
    pub fn position(&self, index: usize) -> Option<&PositionValue> {
        self.positions.get(index)
    }
}

pub fn compute_net_nav(positions: &[VaultPosition]) -> NetNav {
    let positions: Vec<PositionValue> = positions.iter().map(VaultPosition::value).collect();
    let total_assets_usd: f64 = positions.iter().map(|p| p.assets_usd).sum();
    let total_borrowed_usd: f64 = positions.iter().map(|p| p.borrowed_usd).sum();

    NetNav {
        nav: total_assets_usd - total_borrowed_usd,
        total_assets_usd,
        total_borrowed_usd,
        block: None,
        timestamp: None,
        positions,
    }
}

// ============================================
// CALCULATOR
// ============================================

#[derive(Clone)]
pub struct NavCalculator {
    graphql: GraphqlClient,
    tokens: TokenResolver,
    chain: u64,
    price_source: String,
}

impl NavCalculator {
    pub fn new(graphql: GraphqlClient, tokens: TokenResolver, chain: u64, price_source: String) -> Self {
        Self {
            graphql,
            tokens,
            chain,
            price_source,
        }
    }

    pub fn tokens(&self) -> &TokenResolver {
        &self.tokens
    }

    /// Oracle prices of both vault assets at `block` (latest when `None`)
    pub async fn prices_at(
        &self,
        snapshot: &PoolSnapshot,
        block: Option<u64>,
    ) -> Result<(OraclePrice, OraclePrice)> {
        let price0 = self
            .graphql
            .fetch_price(self.chain, &snapshot.vault0.asset, &self.price_source, block)
            .await?;
        let price1 = self
            .graphql
            .fetch_price(self.chain, &snapshot.vault1.asset, &self.price_source, block)
            .await?;
        Ok((price0, price1))
    }

    /// NAV of a snapshot with prices at `block`, or at the snapshot's own
    /// block when none is given
    pub async fn calculate(&self, snapshot: &PoolSnapshot, block: Option<u64>) -> Result<NetNav> {
        let block = block.or(snapshot.block_number);
        let prices = self.prices_at(snapshot, block).await?;
        let mut nav = self.calculate_with_prices(snapshot, prices).await;
        nav.block = nav.block.or(block);
        Ok(nav)
    }

    pub async fn calculate_with_prices(
        &self,
        snapshot: &PoolSnapshot,
        prices: (OraclePrice, OraclePrice),
    ) -> NetNav {
        let symbol0 = self.tokens.symbol(&snapshot.vault0.asset).await;
        let symbol1 = self.tokens.symbol(&snapshot.vault1.asset).await;

        let positions = [
            VaultPosition::from_vault(&snapshot.vault0, symbol0, prices.0),
            VaultPosition::from_vault(&snapshot.vault1, symbol1, prices.1),
        ];

        let mut nav = compute_net_nav(&positions);
        nav.block = snapshot.block_number;
        nav.timestamp = snapshot.block_timestamp;
        debug!("💰 {} NAV ${:.2}", snapshot.pool, nav.nav);
        nav
    }

    /// Current NAV for every snapshot, in input order; failures are logged
    /// and skipped
    pub async fn calculate_all(&self, snapshots: &[PoolSnapshot]) -> Vec<(String, NetNav)> {
        let futures: Vec<_> = snapshots
            .iter()
            .map(|snapshot| async move { (snapshot, self.calculate(snapshot, None).await) })
            .collect();
        stream::iter(futures)
            .buffered(NAV_CONCURRENCY)
            .filter_map(|(snapshot, result)| async move {
                match result {
                    Ok(nav) => Some((snapshot.pool.clone(), nav)),
                    Err(e) => {
                        warn!("⚠️ Skipping {}: {}", snapshot.pool, e);
                        None
                    }
                }
            })
            .collect()
            .await
    }
}

// ============================================
// TESTS
// ============================================
