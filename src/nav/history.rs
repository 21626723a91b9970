//! Daily NAV history
//!
//! Walks UTC midnights over a window, resolves each to a block, and records
//! the pool (or account) NAV at that block. Pool history prices both assets
//! from CoinGecko daily closes when available and falls back to the index
//! oracle per day.

use eyre::{eyre, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::calculator::{NavCalculator, NetNav};
use super::returns::annualize;
use crate::cache::pool_cache::PoolCache;
use crate::indexer::etherscan::BlockOracle;
use crate::indexer::external::{utc_date, ExternalPrices};
use crate::indexer::graphql::{GraphqlClient, OraclePrice};
use crate::indexer::rest::{ApiVersion, RestClient};
use crate::indexer::types::{apr_to_percent, usd_from_e8, PoolDeployment, PoolSnapshot, SwapEvent};
use crate::report::output::create_progress_bar;
use crate::tokens::format_units;

const SECONDS_PER_DAY: u64 = 86_400;

// ============================================
// DAY PLAN
// ============================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedDay {
    pub date: String,
    pub timestamp: u64,
}

/// UTC midnights from `max(created_at, now - days)` up to `now`
#[derive(Debug, Clone)]
pub struct DayPlan {
    pub start_ts: u64,
    pub end_ts: u64,
    pub days: Vec<PlannedDay>,
}

impl DayPlan {
    pub fn new(created_at: Option<u64>, now: u64, days: u32) -> Self {
        let window_start = now.saturating_sub(days as u64 * SECONDS_PER_DAY);
        let start_ts = created_at.map_or(window_start, |c| c.max(window_start));

        let mut planned = Vec::new();
        let mut ts = start_ts - start_ts % SECONDS_PER_DAY;
        while ts <= now {
            planned.push(PlannedDay {
                date: utc_date(ts),
                timestamp: ts,
            });
            ts += SECONDS_PER_DAY;
        }

        Self {
            start_ts,
            end_ts: now,
            days: planned,
        }
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}

// ============================================
// SWAP VOLUMES
// ============================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DayVolume {
    pub swap_count: u64,
    pub volume_token0: f64,
    pub volume_token1: f64,
}

/// Groups swaps into UTC days; each swap counts `max(in, out)` per token
#[derive(Debug, Clone, Copy)]
pub struct SwapVolumeAggregator {
    pub decimals0: u8,
    pub decimals1: u8,
    pub start_ts: u64,
    pub end_ts: u64,
}

impl SwapVolumeAggregator {
    pub fn aggregate(&self, swaps: &[SwapEvent]) -> BTreeMap<String, DayVolume> {
        let mut daily: BTreeMap<String, DayVolume> = BTreeMap::new();

        for swap in swaps {
            if swap.timestamp < self.start_ts || swap.timestamp > self.end_ts {
                continue;
            }
            let amount0_in = format_units(swap.amount0_in, self.decimals0);
            let amount0_out = format_units(swap.amount0_out, self.decimals0);
            let amount1_in = format_units(swap.amount1_in, self.decimals1);
            let amount1_out = format_units(swap.amount1_out, self.decimals1);

            let day = daily.entry(utc_date(swap.timestamp)).or_default();
            day.swap_count += 1;
            day.volume_token0 += amount0_in.max(amount0_out);
            day.volume_token1 += amount1_in.max(amount1_out);
        }

        daily
    }
}

// ============================================
// POOL HISTORY ROWS
// ============================================

/// One day of pool history; NAV fields are `None` when the day failed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyNavRow {
    pub date: String,
    pub block: Option<u64>,
    pub nav: Option<f64>,
    pub net0: Option<f64>,
    pub net1: Option<f64>,
    pub price0: Option<f64>,
    pub price1: Option<f64>,
    pub value0: Option<f64>,
    pub value1: Option<f64>,
    pub nav_in_quote: Option<f64>,
    pub swap_count: u64,
    pub volume_token0: f64,
    pub volume_token1: f64,
    pub volume_usd: f64,
}

impl DailyNavRow {
    pub fn failed(date: &str) -> Self {
        Self {
            date: date.to_string(),
            block: None,
            nav: None,
            net0: None,
            net1: None,
            price0: None,
            price1: None,
            value0: None,
            value1: None,
            nav_in_quote: None,
            swap_count: 0,
            volume_token0: 0.0,
            volume_token1: 0.0,
            volume_usd: 0.0,
        }
    }

    pub fn from_nav(date: &str, block: u64, nav: &NetNav, volume: Option<&DayVolume>) -> Self {
        let (net0, price0, value0) = nav
            .position(0)
            .map(|p| (p.net, p.price, p.net_usd))
            .unwrap_or_default();
        let (net1, price1, value1) = nav
            .position(1)
            .map(|p| (p.net, p.price, p.net_usd))
            .unwrap_or_default();
        let volume = volume.copied().unwrap_or_default();

        let volume_usd = (volume.volume_token0 * price0 + volume.volume_token1 * price1) / 2.0;
        let nav_in_quote = if price1 > 0.0 { nav.nav / price1 } else { 0.0 };

        Self {
            date: date.to_string(),
            block: Some(block),
            nav: Some(nav.nav),
            net0: Some(net0),
            net1: Some(net1),
            price0: Some(price0),
            price1: Some(price1),
            value0: Some(value0),
            value1: Some(value1),
            nav_in_quote: Some(nav_in_quote),
            swap_count: volume.swap_count,
            volume_token0: volume.volume_token0,
            volume_token1: volume.volume_token1,
            volume_usd,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HistorySummary {
    pub period_start: String,
    pub period_end: String,
    pub first_nav: f64,
    pub last_nav: f64,
    pub total_change: f64,
    pub total_change_pct: f64,
    pub valid_days: usize,
    pub avg_daily_change_pct: f64,
    pub annualized: Option<f64>,
    pub total_volume: f64,
    pub total_swaps: u64,
    pub avg_daily_volume: f64,
    pub fee_rate: f64,
    pub total_fees: f64,
    pub fee_return_pct: f64,
    pub fee_apr: f64,
}

impl HistorySummary {
    /// `None` with fewer than two valid NAVs
    pub fn from_rows(rows: &[DailyNavRow], fee_rate: f64) -> Option<Self> {
        let navs: Vec<f64> = rows.iter().filter_map(|r| r.nav).collect();
        if navs.len() < 2 {
            return None;
        }

        let first_nav = navs[0];
        let last_nav = navs[navs.len() - 1];
        let valid_days = navs.len();
        let total_change = last_nav - first_nav;
        let total_change_pct = if first_nav > 0.0 {
            total_change / first_nav * 100.0
        } else {
            0.0
        };

        let total_volume: f64 = rows.iter().map(|r| r.volume_usd).sum();
        let total_swaps: u64 = rows.iter().map(|r| r.swap_count).sum();
        let total_fees = total_volume * fee_rate;
        let fee_return_pct = if first_nav > 0.0 {
            total_fees / first_nav * 100.0
        } else {
            0.0
        };

        Some(Self {
            period_start: rows.first().map(|r| r.date.clone()).unwrap_or_default(),
            period_end: rows.last().map(|r| r.date.clone()).unwrap_or_default(),
            first_nav,
            last_nav,
            total_change,
            total_change_pct,
            valid_days,
            avg_daily_change_pct: total_change_pct / valid_days as f64,
            annualized: annualize(first_nav, last_nav, valid_days as f64),
            total_volume,
            total_swaps,
            avg_daily_volume: total_volume / rows.len() as f64,
            fee_rate,
            total_fees,
            fee_return_pct,
            fee_apr: fee_return_pct / valid_days as f64 * 365.0,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryMetadata {
    pub pool_address: String,
    pub chain_id: u64,
    pub fee_rate: f64,
    pub fee_bps: f64,
    pub token0_symbol: String,
    pub token1_symbol: String,
}

/// JSON document written by the `history` command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryFile {
    pub metadata: HistoryMetadata,
    pub daily_data: Vec<DailyNavRow>,
}

#[derive(Debug, Clone)]
pub struct PoolHistory {
    pub pool: String,
    pub token0_symbol: String,
    pub token1_symbol: String,
    pub fee_rate: f64,
    pub active: bool,
    pub rows: Vec<DailyNavRow>,
}

impl PoolHistory {
    pub fn to_file(&self, chain: u64) -> HistoryFile {
        HistoryFile {
            metadata: HistoryMetadata {
                pool_address: self.pool.clone(),
                chain_id: chain,
                fee_rate: self.fee_rate,
                fee_bps: self.fee_rate * 10_000.0,
                token0_symbol: self.token0_symbol.clone(),
                token1_symbol: self.token1_symbol.clone(),
            },
            daily_data: self.rows.clone(),
        }
    }

    pub fn summary(&self) -> Option<HistorySummary> {
        HistorySummary::from_rows(&self.rows, self.fee_rate)
    }
}

// ============================================
// ACCOUNT HISTORY ROWS
// ============================================

#[derive(Debug, Clone, Serialize)]
pub struct AccountPoolEntry {
    pub pool: String,
    pub nav: f64,
    pub active: bool,
    pub asset0: String,
    pub asset1: String,
}

/// v2 `accountNav` summed over every pool of one account at one block
#[derive(Debug, Clone, Default, Serialize)]
pub struct AccountSnapshot {
    pub nav_usd: f64,
    pub total_assets_usd: f64,
    pub total_borrowed_usd: f64,
    pub num_pools: usize,
    pub pools: Vec<AccountPoolEntry>,
    pub interest_earned: f64,
    pub interest_paid: f64,
    pub net_interest: f64,
    pub fees: f64,
    pub volume: f64,
    /// Mean of the non-zero 1-day APRs, in percent
    pub apr: f64,
}

impl AccountSnapshot {
    pub fn aggregate(account: &str, snapshots: &[PoolSnapshot]) -> Self {
        let mut out = AccountSnapshot::default();
        let mut apr_sum = 0.0;
        let mut apr_count = 0usize;

        for pool in snapshots.iter().filter(|p| p.is_owned_by(account)) {
            let (nav, assets, borrowed) = pool
                .account_nav
                .as_ref()
                .map(|n| (n.nav_usd(), n.total_assets_usd(), n.total_borrowed_usd()))
                .unwrap_or_default();

            out.nav_usd += nav;
            out.total_assets_usd += assets;
            out.total_borrowed_usd += borrowed;
            out.interest_earned += usd_from_e8(pool.interest_earned.total1d);
            out.interest_paid += usd_from_e8(pool.interest_paid.total1d);
            out.fees += usd_from_e8(pool.fees.total1d);
            out.volume += usd_from_e8(pool.volume.total1d);

            let apr = apr_to_percent(pool.apr.total1d);
            if apr != 0.0 {
                apr_sum += apr;
                apr_count += 1;
            }

            out.pools.push(AccountPoolEntry {
                pool: pool.pool.clone(),
                nav,
                active: pool.active,
                asset0: pool.vault0.asset.clone(),
                asset1: pool.vault1.asset.clone(),
            });
        }

        out.num_pools = out.pools.len();
        out.net_interest = out.interest_earned - out.interest_paid;
        out.apr = if apr_count > 0 {
            apr_sum / apr_count as f64
        } else {
            0.0
        };
        out
    }

    pub fn is_empty(&self) -> bool {
        self.num_pools == 0 && self.nav_usd == 0.0
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountDayRow {
    pub date: String,
    pub block: u64,
    #[serde(flatten)]
    pub snapshot: AccountSnapshot,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountHistory {
    pub account: String,
    pub chain_id: u64,
    pub deployments: Vec<PoolDeployment>,
    pub daily_data: Vec<AccountDayRow>,
}

/// One day of a single pool's v2 `accountNav`
#[derive(Debug, Clone, Serialize)]
pub struct PoolAccountRow {
    pub date: String,
    pub block: u64,
    pub nav_usd: Option<f64>,
    pub total_assets_usd: Option<f64>,
    pub total_borrowed_usd: Option<f64>,
    pub active_vaults: usize,
    pub interest_earned: f64,
    pub interest_paid: f64,
    pub net_interest: f64,
    pub fees: f64,
    pub volume: f64,
    pub apr: f64,
}

impl PoolAccountRow {
    pub fn from_snapshot(date: &str, block: u64, pool: &PoolSnapshot) -> Self {
        let nav = pool.account_nav.as_ref();
        let interest_earned = usd_from_e8(pool.interest_earned.total1d);
        let interest_paid = usd_from_e8(pool.interest_paid.total1d);

        Self {
            date: date.to_string(),
            block,
            nav_usd: Some(nav.map(|n| n.nav_usd()).unwrap_or(0.0)),
            total_assets_usd: Some(nav.map(|n| n.total_assets_usd()).unwrap_or(0.0)),
            total_borrowed_usd: Some(nav.map(|n| n.total_borrowed_usd()).unwrap_or(0.0)),
            active_vaults: nav.map(|n| n.breakdown.len()).unwrap_or(0),
            interest_earned,
            interest_paid,
            net_interest: interest_earned - interest_paid,
            fees: usd_from_e8(pool.fees.total1d),
            volume: usd_from_e8(pool.volume.total1d),
            apr: apr_to_percent(pool.apr.total1d),
        }
    }

    pub fn failed(date: &str, block: u64) -> Self {
        Self {
            date: date.to_string(),
            block,
            nav_usd: None,
            total_assets_usd: None,
            total_borrowed_usd: None,
            active_vaults: 0,
            interest_earned: 0.0,
            interest_paid: 0.0,
            net_interest: 0.0,
            fees: 0.0,
            volume: 0.0,
            apr: 0.0,
        }
    }
}

/// Start/end summary of an account NAV series; annualized from the mean
/// day-over-day change
#[derive(Debug, Clone, Serialize)]
pub struct AccountSummary {
    pub start_nav: f64,
    pub end_nav: f64,
    pub total_change: f64,
    pub total_change_pct: f64,
    pub days_with_data: usize,
    pub avg_daily_change_pct: f64,
    pub annualized: f64,
}

impl AccountSummary {
    pub fn from_navs(navs: &[f64]) -> Option<Self> {
        if navs.len() < 2 {
            return None;
        }
        let start_nav = navs[0];
        let end_nav = navs[navs.len() - 1];
        let total_change = end_nav - start_nav;
        let total_change_pct = if start_nav != 0.0 {
            total_change / start_nav * 100.0
        } else {
            0.0
        };

        let daily: Vec<f64> = navs
            .windows(2)
            .filter(|w| w[0] != 0.0)
            .map(|w| (w[1] - w[0]) / w[0] * 100.0)
            .collect();
        let avg_daily_change_pct = if daily.is_empty() {
            0.0
        } else {
            daily.iter().sum::<f64>() / daily.len() as f64
        };

        Some(Self {
            start_nav,
            end_nav,
            total_change,
            total_change_pct,
            days_with_data: navs.len(),
            avg_daily_change_pct,
            annualized: avg_daily_change_pct * 365.0,
        })
    }
}

// ============================================
// BUILDER
// ============================================

struct PoolContext<'a> {
    pool: &'a str,
    creation_block: u64,
    max_block: Option<u64>,
    prices0: BTreeMap<String, f64>,
    prices1: BTreeMap<String, f64>,
    volumes: BTreeMap<String, DayVolume>,
}

#[derive(Clone)]
pub struct HistoryBuilder {
    rest: RestClient,
    graphql: GraphqlClient,
    oracle: BlockOracle,
    external: ExternalPrices,
    nav: NavCalculator,
    pool_cache: Arc<PoolCache>,
    chain: u64,
}

impl HistoryBuilder {
    pub fn new(
        rest: RestClient,
        graphql: GraphqlClient,
        oracle: BlockOracle,
        external: ExternalPrices,
        nav: NavCalculator,
        pool_cache: Arc<PoolCache>,
        chain: u64,
    ) -> Self {
        Self {
            rest,
            graphql,
            oracle,
            external,
            nav,
            pool_cache,
            chain,
        }
    }

    fn now() -> u64 {
        chrono::Utc::now().timestamp().max(0) as u64
    }

    /// Token addresses from the live v2 list, or from the deployment for
    /// pools that are no longer installed
    async fn pool_assets(&self, pool: &str) -> Result<(String, String, bool)> {
        let live = self
            .rest
            .fetch_pools(ApiVersion::V2, self.chain, None)
            .await?
            .into_iter()
            .find(|p| p.matches(pool));

        if let Some(snapshot) = live {
            return Ok((snapshot.vault0.asset, snapshot.vault1.asset, true));
        }

        warn!("⚠️ Pool {} not in the v2 list, reading assets from its deployment", pool);
        let deployment = self.graphql.fetch_pool_deployment(self.chain, pool).await?;
        match (deployment.asset0, deployment.asset1) {
            (Some(a0), Some(a1)) => Ok((a0, a1, false)),
            _ => Err(eyre!("Pool {} not found in v2 API or GraphQL", pool)),
        }
    }

    pub async fn pool_history(&self, pool: &str, days: u32) -> Result<PoolHistory> {
        let fee_rate = self.graphql.fetch_fee_rate(self.chain, pool).await;
        info!("💸 Pool fee rate: {:.2} bps", fee_rate * 10_000.0);

        let entry = self
            .pool_cache
            .creation_block(pool, self.chain, &self.graphql, &self.oracle)
            .await?;

        let (asset0, asset1, active) = self.pool_assets(pool).await?;
        let tokens = self.nav.tokens();
        let token0_symbol = tokens.symbol(&asset0).await;
        let token1_symbol = tokens.symbol(&asset1).await;

        let max_block = if active {
            None
        } else {
            let last = self.pool_cache.last_available_block(pool, self.chain).await;
            match last {
                Some(b) => info!("   Pool was last available at block {}", b),
                None => warn!("⚠️ Pool looks uninstalled; historical data may be missing"),
            }
            last
        };

        let plan = DayPlan::new(Some(entry.created_at), Self::now(), days);
        info!(
            "📅 {}/{} from {} to {} ({} days)",
            token0_symbol,
            token1_symbol,
            utc_date(plan.start_ts),
            utc_date(plan.end_ts),
            plan.len()
        );

        let aggregator = SwapVolumeAggregator {
            decimals0: tokens.decimals(&asset0).await,
            decimals1: tokens.decimals(&asset1).await,
            start_ts: plan.start_ts,
            end_ts: plan.end_ts,
        };
        let volumes = match self.graphql.fetch_swaps_since(self.chain, pool, plan.start_ts).await {
            Ok(swaps) => aggregator.aggregate(&swaps),
            Err(e) => {
                warn!("⚠️ Could not fetch swap volumes: {}", e);
                BTreeMap::new()
            }
        };
        debug!("🔄 Swaps grouped into {} days", volumes.len());

        let prices0 = self.daily_prices(&asset0, days + 1).await;
        let prices1 = self.daily_prices(&asset1, days + 1).await;
        if prices0.is_empty() || prices1.is_empty() {
            warn!("⚠️ External daily prices incomplete, falling back to oracle prices per day");
        }

        let ctx = PoolContext {
            pool,
            creation_block: entry.creation_block,
            max_block,
            prices0,
            prices1,
            volumes,
        };

        let pb = create_progress_bar(plan.len() as u64, "NAV history".to_string());
        let mut rows = Vec::with_capacity(plan.len());
        for day in &plan.days {
            pb.set_message(day.date.clone());
            // the REST and GraphQL clients already retry each request
            match self.pool_day(&ctx, day).await {
                Ok(Some(row)) => {
                    debug!("  {}: block {:?} NAV {:?}", row.date, row.block, row.nav);
                    rows.push(row);
                }
                Ok(None) => debug!("  {}: skipped", day.date),
                Err(e) => {
                    warn!("  {}: failed - {}", day.date, e);
                    rows.push(DailyNavRow::failed(&day.date));
                }
            }
            pb.inc(1);
        }
        pb.finish_and_clear();

        Ok(PoolHistory {
            pool: pool.to_string(),
            token0_symbol,
            token1_symbol,
            fee_rate,
            active,
            rows,
        })
    }

    async fn daily_prices(&self, token: &str, days: u32) -> BTreeMap<String, f64> {
        match self.external.coingecko_contract_history(token, days).await {
            Ok(prices) => prices,
            Err(e) => {
                warn!("⚠️ CoinGecko history failed for {}: {}", token, e);
                BTreeMap::new()
            }
        }
    }

    /// `None` for days outside the pool's lifetime
    async fn pool_day(&self, ctx: &PoolContext<'_>, day: &PlannedDay) -> Result<Option<DailyNavRow>> {
        let (block, _) = self.oracle.block_by_timestamp(day.timestamp).await;
        if block < ctx.creation_block {
            return Ok(None);
        }
        if ctx.max_block.map_or(false, |max| block > max) {
            return Ok(None);
        }

        let snapshot = self
            .rest
            .fetch_pool(ApiVersion::V2, self.chain, ctx.pool, Some(block))
            .await?;

        let prices = match (ctx.prices0.get(&day.date), ctx.prices1.get(&day.date)) {
            (Some(p0), Some(p1)) => (OraclePrice::from_usd(*p0), OraclePrice::from_usd(*p1)),
            _ => self.nav.prices_at(&snapshot, Some(block)).await?,
        };

        let nav = self.nav.calculate_with_prices(&snapshot, prices).await;
        Ok(Some(DailyNavRow::from_nav(
            &day.date,
            block,
            &nav,
            ctx.volumes.get(&day.date),
        )))
    }

    /// Aggregate v2 `accountNav` over every pool of `account`, day by day
    pub async fn account_history(&self, account: &str, days: u32) -> Result<AccountHistory> {
        let deployments = self
            .graphql
            .fetch_account_deployments(self.chain, account)
            .await?;
        let mut history = AccountHistory {
            account: account.to_string(),
            chain_id: self.chain,
            deployments,
            daily_data: Vec::new(),
        };
        if history.deployments.is_empty() {
            warn!("⚠️ No pools found for account {}", account);
            return Ok(history);
        }
        info!("🏦 {} pool(s) deployed by {}", history.deployments.len(), account);

        let plan = DayPlan::new(None, Self::now(), days);
        let pb = create_progress_bar(plan.len() as u64, "Account NAV".to_string());
        for day in &plan.days {
            pb.set_message(day.date.clone());
            let (block, _) = self.oracle.block_by_timestamp(day.timestamp).await;

            match self.rest.fetch_pools(ApiVersion::V2, self.chain, Some(block)).await {
                Ok(snapshots) => {
                    let snapshot = AccountSnapshot::aggregate(account, &snapshots);
                    if snapshot.is_empty() {
                        debug!("  {}: no pools for account", day.date);
                    } else {
                        history.daily_data.push(AccountDayRow {
                            date: day.date.clone(),
                            block,
                            snapshot,
                        });
                    }
                }
                Err(e) => warn!("  {}: failed - {}", day.date, e),
            }
            pb.inc(1);
        }
        pb.finish_and_clear();

        Ok(history)
    }

    /// v2 `accountNav` of one pool, day by day
    pub async fn pool_account_history(&self, pool: &str, days: u32) -> Result<Vec<PoolAccountRow>> {
        let entry = self
            .pool_cache
            .creation_block(pool, self.chain, &self.graphql, &self.oracle)
            .await?;

        let plan = DayPlan::new(None, Self::now(), days);
        let pb = create_progress_bar(plan.len() as u64, "Pool account NAV".to_string());
        let mut rows = Vec::with_capacity(plan.len());

        for day in &plan.days {
            pb.set_message(day.date.clone());
            let (block, _) = self.oracle.block_by_timestamp(day.timestamp).await;
            if block < entry.creation_block {
                debug!("  {}: before pool creation", day.date);
                pb.inc(1);
                continue;
            }

            match self
                .rest
                .fetch_pool(ApiVersion::V2, self.chain, pool, Some(block))
                .await
            {
                Ok(snapshot) => rows.push(PoolAccountRow::from_snapshot(&day.date, block, &snapshot)),
                Err(e) => {
                    warn!("  {}: failed - {}", day.date, e);
                    rows.push(PoolAccountRow::failed(&day.date, block));
                }
            }
            pb.inc(1);
        }
        pb.finish_and_clear();

        Ok(rows)
    }
}

// ============================================
// TESTS
// ============================================
