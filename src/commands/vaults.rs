//! `netnav vaults`: per-vault breakdown of the v2 `accountNav`

use clap::Args;
use console::style;
use eyre::{eyre, Result};
use serde::Serialize;
use tracing::info;

use super::{format_timestamp, print_json, App};
use crate::indexer::rest::ApiVersion;
use crate::indexer::types::{usd_from_e8, BreakdownEntry, PoolSnapshot};
use crate::report::table::print_section;
use crate::report::{new_table, numeric_row, signed_pct, signed_usd, usd};
use crate::tokens::{abbreviate, format_units};

#[derive(Debug, Args)]
pub struct VaultsArgs {
    #[arg(long, required_unless_present = "extra")]
    pub pool: Option<String>,

    /// Snapshot block (latest when omitted)
    #[arg(long)]
    pub block: Option<u64>,

    /// Print the raw v2 pool JSON
    #[arg(long)]
    pub raw: bool,

    /// Compare the creation block with now
    #[arg(long)]
    pub compare: bool,

    /// Scan every active pool for balances outside vault0/vault1
    #[arg(long, conflicts_with_all = ["raw", "compare"])]
    pub extra: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PositionStatus {
    Leveraged,
    Long,
    Borrowed,
    Empty,
}

impl PositionStatus {
    pub fn classify(assets: f64, borrowed: f64) -> Self {
        match (assets > 0.0, borrowed > 0.0) {
            (true, true) => PositionStatus::Leveraged,
            (true, false) => PositionStatus::Long,
            (false, true) => PositionStatus::Borrowed,
            (false, false) => PositionStatus::Empty,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PositionStatus::Leveraged => "Leveraged position",
            PositionStatus::Long => "Long position (no leverage)",
            PositionStatus::Borrowed => "Borrowed position",
            PositionStatus::Empty => "No position",
        }
    }
}

/// One vault of the breakdown in human units
#[derive(Debug, Clone, Serialize)]
pub struct VaultRow {
    pub vault: String,
    pub symbol: String,
    pub assets: f64,
    pub borrowed: f64,
    pub net: f64,
    pub price: f64,
    pub value: f64,
    /// assets / net; `None` without a positive net
    pub leverage: Option<f64>,
    pub status: PositionStatus,
}

impl VaultRow {
    pub fn new(vault: &str, entry: &BreakdownEntry, symbol: String, decimals: u8) -> Self {
        let assets = format_units(entry.assets, decimals);
        let borrowed = format_units(entry.borrowed, decimals);
        let net = assets - borrowed;
        let price = usd_from_e8(entry.price);

        Self {
            vault: vault.to_string(),
            symbol,
            assets,
            borrowed,
            net,
            price,
            value: net * price,
            leverage: (net > 0.0 && borrowed > 0.0).then(|| assets / net),
            status: PositionStatus::classify(assets, borrowed),
        }
    }
}

async fn vault_rows(app: &App, snapshot: &PoolSnapshot) -> Vec<VaultRow> {
    let Some(nav) = &snapshot.account_nav else {
        return Vec::new();
    };
    let mut rows = Vec::with_capacity(nav.breakdown.len());
    for (vault, entry) in &nav.breakdown {
        let symbol = app.tokens.symbol(&entry.asset).await;
        let decimals = app.tokens.decimals(&entry.asset).await;
        rows.push(VaultRow::new(vault, entry, symbol, decimals));
    }
    rows
}

/// Pool-only vs extra-vault split of one pool's NAV
#[derive(Debug, Clone, Serialize)]
pub struct ExtraVaultReport {
    pub pool: String,
    pub owner: Option<String>,
    pub total_nav: f64,
    pub pool_only_nav: f64,
    pub extra_nav: f64,
    pub extra: Vec<VaultRow>,
}

impl ExtraVaultReport {
    /// Share of the reported NAV held in extra vaults, in percent
    pub fn impact_pct(&self) -> f64 {
        if self.total_nav > 0.0 {
            self.extra_nav / self.total_nav * 100.0
        } else {
            0.0
        }
    }
}

fn is_pool_vault(snapshot: &PoolSnapshot, vault: &str) -> bool {
    [&snapshot.vault0.address, &snapshot.vault1.address]
        .into_iter()
        .flatten()
        .any(|a| a.eq_ignore_ascii_case(vault))
}

/// Splits `rows` into the pool's own vaults and everything else. `None`
/// when no vault outside vault0/vault1 holds a balance.
pub fn extra_vaults(snapshot: &PoolSnapshot, rows: &[VaultRow]) -> Option<ExtraVaultReport> {
    let (own, other): (Vec<&VaultRow>, Vec<&VaultRow>) =
        rows.iter().partition(|r| is_pool_vault(snapshot, &r.vault));
    let extra: Vec<VaultRow> = other
        .into_iter()
        .filter(|r| r.status != PositionStatus::Empty)
        .cloned()
        .collect();
    if extra.is_empty() {
        return None;
    }

    Some(ExtraVaultReport {
        pool: snapshot.pool.clone(),
        owner: snapshot.account.clone(),
        total_nav: snapshot.nav_usd(),
        pool_only_nav: own.iter().map(|r| r.value).sum(),
        extra_nav: extra.iter().map(|r| r.value).sum(),
        extra,
    })
}

pub async fn run(app: &App, args: VaultsArgs) -> Result<()> {
    if args.extra {
        return scan_extra_vaults(app).await;
    }
    let pool = args
        .pool
        .ok_or_else(|| eyre!("--pool is required without --extra"))?
        .to_lowercase();
    let chain = app.chain();
    let rest = &app.clients.rest;

    if args.raw {
        let raw = rest.fetch_pool_raw(ApiVersion::V2, chain, &pool, args.block).await?;
        return print_json(&raw);
    }

    let snapshot = rest.fetch_pool(ApiVersion::V2, chain, &pool, args.block).await?;
    if snapshot.account_nav.is_none() {
        return Err(eyre!("Pool {} has no accountNav in the v2 response", pool));
    }

    print_section(&format!("VAULTS {}", pool));
    if let Some(block) = snapshot.block_number {
        println!("  Block: {}", block);
    }
    if let Some(ts) = snapshot.block_timestamp {
        println!("  Time:  {}", format_timestamp(ts));
    }

    let rows = vault_rows(app, &snapshot).await;
    print_rows(&rows);
    print_totals(&rows, &snapshot);
    if let Some(report) = extra_vaults(&snapshot, &rows) {
        print_extra(&report);
    }

    if args.compare {
        compare_with_creation(app, &pool, &snapshot).await?;
    }
    Ok(())
}

fn print_rows(rows: &[VaultRow]) {
    let mut table = new_table(&[
        "Vault", "Asset", "Assets", "Borrowed", "Net", "Price", "Value", "Leverage", "Status",
    ]);
    for r in rows {
        table.add_row(numeric_row(vec![
            abbreviate(&r.vault),
            r.symbol.clone(),
            format!("{:.6}", r.assets),
            format!("{:.6}", r.borrowed),
            format!("{:.6}", r.net),
            usd(r.price),
            usd(r.value),
            r.leverage
                .map(|l| format!("{:.2}x", l))
                .unwrap_or_else(|| "-".into()),
            r.status.label().to_string(),
        ]));
    }
    println!();
    table.printstd();
}

async fn scan_extra_vaults(app: &App) -> Result<()> {
    let pools = app
        .clients
        .rest
        .fetch_pools(ApiVersion::V2, app.chain(), None)
        .await?;
    let active: Vec<&PoolSnapshot> = pools.iter().filter(|p| p.active).collect();
    info!("🔍 Checking {} active pools for extra vaults", active.len());

    let mut reports = Vec::new();
    for snapshot in &active {
        let rows = vault_rows(app, snapshot).await;
        if let Some(report) = extra_vaults(snapshot, &rows) {
            reports.push(report);
        }
    }
    reports.sort_by(|a, b| b.extra_nav.abs().total_cmp(&a.extra_nav.abs()));

    print_section("EXTRA VAULT ACTIVITY");
    println!("  Active pools: {}", active.len());
    println!("  With extra vaults: {}", reports.len());
    if reports.is_empty() {
        println!("  {} All NAV sits in the configured pool vaults", style("✓").green());
        return Ok(());
    }

    for report in reports.iter().take(EXTRA_SHOWN) {
        print_extra(report);
    }

    let significant: Vec<&ExtraVaultReport> =
        reports.iter().filter(|r| r.impact_pct().abs() > 1.0).collect();
    println!();
    println!("  Pools where extra vaults exceed 1% of NAV: {}", significant.len());
    if let Some(max) = significant
        .iter()
        .max_by(|a, b| a.impact_pct().abs().total_cmp(&b.impact_pct().abs()))
    {
        println!(
            "  Largest impact: {} ({})",
            signed_pct(max.impact_pct()),
            abbreviate(&max.pool)
        );
    }
    Ok(())
}

const EXTRA_SHOWN: usize = 10;

fn print_extra(report: &ExtraVaultReport) {
    println!();
    println!("  {} Extra vaults in {}", style("!").yellow(), report.pool);
    if let Some(owner) = &report.owner {
        println!("    Owner:          {}", owner);
    }
    println!("    Total NAV:      {}", usd(report.total_nav));
    println!("    Pool-only NAV:  {}", usd(report.pool_only_nav));
    println!(
        "    Extra NAV:      {} ({})",
        signed_usd(report.extra_nav),
        signed_pct(report.impact_pct())
    );
    for r in &report.extra {
        println!(
            "    - {} {}: assets {:.2}, borrowed {:.2} ({})",
            r.symbol,
            abbreviate(&r.vault),
            r.assets,
            r.borrowed,
            signed_usd(r.value)
        );
    }
}

fn print_totals(rows: &[VaultRow], snapshot: &PoolSnapshot) {
    let computed: f64 = rows.iter().map(|r| r.value).sum();
    let reported = snapshot.nav_usd();

    println!();
    println!("  Computed NAV:    {}", usd(computed));
    println!("  Reported NAV:    {}", usd(reported));
    if let Some(nav) = &snapshot.account_nav {
        println!("  Total assets:    {}", usd(nav.total_assets_usd()));
        println!("  Total borrowed:  {}", usd(nav.total_borrowed_usd()));
    }
    let diff = computed - reported;
    if diff.abs() > 0.01 {
        println!("  {} Difference: {}", style("!").yellow(), signed_usd(diff));
    } else {
        println!("  {} Matches reported NAV", style("✓").green());
    }
}

async fn compare_with_creation(app: &App, pool: &str, current: &PoolSnapshot) -> Result<()> {
    let entry = app
        .pool_cache
        .creation_block(pool, app.chain(), &app.clients.graphql, &app.clients.oracle)
        .await?;

    print_section("CREATION VS CURRENT");
    println!(
        "  Created: {} (block {})",
        format_timestamp(entry.created_at),
        entry.creation_block
    );

    let initial = match app
        .clients
        .rest
        .fetch_pool(ApiVersion::V2, app.chain(), pool, Some(entry.creation_block))
        .await
    {
        Ok(s) => s,
        Err(e) => {
            println!("  {} No snapshot at creation block: {}", style("✗").red(), e);
            return Ok(());
        }
    };

    let start = initial.nav_usd();
    let end = current.nav_usd();
    println!("  NAV at creation: {}", usd(start));
    println!("  NAV now:         {}", usd(end));
    if start != 0.0 {
        println!(
            "  Change:          {} ({})",
            signed_usd(end - start),
            signed_pct((end - start) / start * 100.0)
        );
    }
    if let Some(age) = current.age_days() {
        println!("  Age:             {:.1} days", age);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::U256;

    fn entry(assets: u128, borrowed: u128, price: f64) -> BreakdownEntry {
        BreakdownEntry {
            asset: "0xasset".into(),
            assets: U256::from(assets),
            borrowed: U256::from(borrowed),
            price,
            ..Default::default()
        }
    }

    #[test]
    fn test_leveraged_row() {
        // 3 supplied, 1 borrowed at $2
        let row = VaultRow::new("0xvault", &entry(3_000_000, 1_000_000, 2e8), "USDC".into(), 6);
        assert!((row.net - 2.0).abs() < 1e-9);
        assert!((row.value - 4.0).abs() < 1e-9);
        assert!((row.leverage.unwrap() - 1.5).abs() < 1e-9);
        assert_eq!(row.status, PositionStatus::Leveraged);
    }

    #[test]
    fn test_extra_vaults_split_from_pool_nav() {
        let mut snapshot = PoolSnapshot {
            pool: "0xpool".into(),
            ..Default::default()
        };
        snapshot.vault0.address = Some("0xVault0".into());
        snapshot.vault1.address = Some("0xvault1".into());

        let rows = vec![
            VaultRow::new("0xvault0", &entry(3_000_000, 0, 1e8), "USDC".into(), 6),
            VaultRow::new("0xvault1", &entry(0, 1_000_000, 1e8), "USDT".into(), 6),
            VaultRow::new("0xside", &entry(2_000_000, 0, 1e8), "USDC".into(), 6),
            VaultRow::new("0xdust", &entry(0, 0, 1e8), "USDC".into(), 6),
        ];
        let report = extra_vaults(&snapshot, &rows).unwrap();
        assert_eq!(report.extra.len(), 1);
        assert_eq!(report.extra[0].vault, "0xside");
        assert!((report.pool_only_nav - 2.0).abs() < 1e-9);
        assert!((report.extra_nav - 2.0).abs() < 1e-9);

        // Only configured vaults with balances
        assert!(extra_vaults(&snapshot, &rows[..2]).is_none());
        assert!(extra_vaults(&snapshot, &[rows[0].clone(), rows[3].clone()]).is_none());
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(PositionStatus::classify(1.0, 0.0).label(), "Long position (no leverage)");
        assert_eq!(PositionStatus::classify(0.0, 1.0).label(), "Borrowed position");
        assert_eq!(PositionStatus::classify(0.0, 0.0).label(), "No position");

        let borrowed = VaultRow::new("0xv", &entry(0, 5_000_000, 1e8), "USDC".into(), 6);
        assert!(borrowed.leverage.is_none());
        assert!((borrowed.value + 5.0).abs() < 1e-9);
    }
}
