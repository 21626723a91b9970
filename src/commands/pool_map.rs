//! `netnav pool-map`: every deployment joined with its current v2 state,
//! grouped by Euler account

use clap::Args;
use console::style;
use eyre::Result;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use super::App;
use crate::indexer::external::utc_date;
use crate::indexer::rest::ApiVersion;
use crate::indexer::types::{usd_from_e8, PoolDeployment, PoolSnapshot};
use crate::report::table::print_section;
use crate::report::{usd, write_json};

#[derive(Debug, Args)]
pub struct PoolMapArgs {
    /// Print statistics without writing files
    #[arg(long)]
    pub stats_only: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PoolMapEntry {
    pub pool: String,
    pub account: String,
    pub created_at: u64,
    pub created_date: String,
    pub active: bool,
    pub token0: String,
    pub token0_symbol: String,
    pub token1: String,
    pub token1_symbol: String,
    pub current_nav: f64,
    pub total_volume: f64,
    pub total_fees: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountEntry {
    pub account: String,
    pub pools: Vec<String>,
    pub active_pools: usize,
    pub total_nav: f64,
    pub first_created: u64,
    pub last_created: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PoolMapStats {
    pub total_pools: usize,
    pub active_pools: usize,
    pub inactive_pools: usize,
    pub accounts: usize,
    pub multi_pool_accounts: usize,
    pub pairs: usize,
    pub total_nav: f64,
    pub total_volume: f64,
    /// date → pools created that day
    pub timeline: BTreeMap<String, usize>,
}

/// Joins deployments with current v2 snapshots; symbols come from `symbols`
/// (address → symbol), unknown addresses keep the address
pub fn build_pool_map(
    deployments: &[PoolDeployment],
    current: &[PoolSnapshot],
    symbols: &HashMap<String, String>,
) -> Vec<PoolMapEntry> {
    let by_pool: HashMap<String, &PoolSnapshot> = current
        .iter()
        .map(|s| (s.pool.to_lowercase(), s))
        .collect();
    let symbol = |addr: &str| {
        symbols
            .get(&addr.to_lowercase())
            .cloned()
            .unwrap_or_else(|| addr.to_string())
    };

    let mut entries: Vec<PoolMapEntry> = deployments
        .iter()
        .map(|d| {
            let snapshot = by_pool.get(&d.pool.to_lowercase()).copied();
            let created_at = d.created_at.unwrap_or(0);
            let token0 = d.asset0.clone().unwrap_or_default().to_lowercase();
            let token1 = d.asset1.clone().unwrap_or_default().to_lowercase();
            PoolMapEntry {
                pool: d.pool.to_lowercase(),
                account: d.euler_account.clone().unwrap_or_default().to_lowercase(),
                created_at,
                created_date: utc_date(created_at),
                active: snapshot.map(|s| s.active).unwrap_or(false),
                token0_symbol: symbol(&token0),
                token1_symbol: symbol(&token1),
                token0,
                token1,
                current_nav: snapshot.map(|s| s.nav_usd()).unwrap_or(0.0),
                total_volume: snapshot.map(|s| usd_from_e8(s.volume.total)).unwrap_or(0.0),
                total_fees: snapshot.map(|s| usd_from_e8(s.fees.total)).unwrap_or(0.0),
            }
        })
        .collect();
    entries.sort_by_key(|e| e.created_at);
    entries
}

pub fn group_by_account(entries: &[PoolMapEntry]) -> Vec<AccountEntry> {
    let mut accounts: BTreeMap<&str, AccountEntry> = BTreeMap::new();
    for e in entries {
        let account = accounts.entry(e.account.as_str()).or_insert_with(|| AccountEntry {
            account: e.account.clone(),
            pools: Vec::new(),
            active_pools: 0,
            total_nav: 0.0,
            first_created: e.created_at,
            last_created: e.created_at,
        });
        account.pools.push(e.pool.clone());
        if e.active {
            account.active_pools += 1;
        }
        account.total_nav += e.current_nav;
        account.first_created = account.first_created.min(e.created_at);
        account.last_created = account.last_created.max(e.created_at);
    }
    let mut accounts: Vec<AccountEntry> = accounts.into_values().collect();
    accounts.sort_by(|a, b| b.pools.len().cmp(&a.pools.len()));
    accounts
}

pub fn pool_map_stats(entries: &[PoolMapEntry], accounts: &[AccountEntry]) -> PoolMapStats {
    let active_pools = entries.iter().filter(|e| e.active).count();
    let pairs: BTreeSet<(String, String)> = entries
        .iter()
        .map(|e| {
            let mut pair = [e.token0.clone(), e.token1.clone()];
            pair.sort();
            let [a, b] = pair;
            (a, b)
        })
        .collect();
    let mut timeline = BTreeMap::new();
    for e in entries {
        *timeline.entry(e.created_date.clone()).or_insert(0) += 1;
    }

    PoolMapStats {
        total_pools: entries.len(),
        active_pools,
        inactive_pools: entries.len() - active_pools,
        accounts: accounts.len(),
        multi_pool_accounts: accounts.iter().filter(|a| a.pools.len() > 1).count(),
        pairs: pairs.len(),
        total_nav: entries.iter().map(|e| e.current_nav).sum(),
        total_volume: entries.iter().map(|e| e.total_volume).sum(),
        timeline,
    }
}

fn write_csv(path: &Path, entries: &[PoolMapEntry]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    for e in entries {
        writer.serialize(e)?;
    }
    writer.flush()?;
    Ok(())
}

pub async fn run(app: &App, args: PoolMapArgs) -> Result<()> {
    let chain = app.chain();
    let deployments = app.clients.graphql.fetch_deployments(chain).await?;
    let current = app
        .clients
        .rest
        .fetch_pools(ApiVersion::V2, chain, None)
        .await?;
    println!(
        "{} {} deployments, {} pools in v2",
        style("✓").green(),
        deployments.len(),
        current.len()
    );

    let addresses: BTreeSet<String> = deployments
        .iter()
        .flat_map(|d| [d.asset0.clone(), d.asset1.clone()])
        .flatten()
        .map(|a| a.to_lowercase())
        .collect();
    let mut symbols = HashMap::with_capacity(addresses.len());
    for address in addresses {
        let symbol = app.tokens.symbol(&address).await;
        symbols.insert(address, symbol);
    }

    let entries = build_pool_map(&deployments, &current, &symbols);
    let accounts = group_by_account(&entries);
    let stats = pool_map_stats(&entries, &accounts);
    print_stats(&stats, &accounts);

    if args.stats_only {
        return Ok(());
    }

    let dir = app.config.data_path();
    write_json(&dir.join("complete_pool_map.json"), &entries)?;
    write_csv(&dir.join("complete_pool_map.csv"), &entries)?;
    write_json(
        &dir.join("complete_account_map.json"),
        &serde_json::json!({ "stats": stats, "accounts": accounts }),
    )?;
    println!();
    println!(
        "{} Saved complete_pool_map.json, complete_pool_map.csv and complete_account_map.json to {}",
        style("✓").green(),
        dir.display()
    );
    Ok(())
}

fn print_stats(stats: &PoolMapStats, accounts: &[AccountEntry]) {
    print_section("POOL MAP");
    println!("  Total pools:          {}", stats.total_pools);
    println!("  Active / inactive:    {} / {}", stats.active_pools, stats.inactive_pools);
    println!("  Accounts:             {}", stats.accounts);
    println!("  Multi-pool accounts:  {}", stats.multi_pool_accounts);
    println!("  Unique pairs:         {}", stats.pairs);
    println!("  Total current NAV:    {}", usd(stats.total_nav));
    println!("  Total volume:         {}", usd(stats.total_volume));

    print_section("TOP ACCOUNTS");
    for a in accounts.iter().take(10) {
        println!(
            "  {}  {} pools ({} active)  NAV {}",
            a.account,
            a.pools.len(),
            a.active_pools,
            usd(a.total_nav)
        );
    }

    print_section("DEPLOYMENTS BY DAY");
    for (date, count) in &stats.timeline {
        println!("  {}  {}", date, "█".repeat(*count));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::types::normalize_pool_list;
    use serde_json::json;
    use tempfile::tempdir;

    const DAY: u64 = 86_400;

    fn deployment(pool: &str, account: &str, created: u64, a0: &str, a1: &str) -> PoolDeployment {
        PoolDeployment {
            pool: pool.into(),
            created_at: Some(created),
            euler_account: Some(account.into()),
            asset0: Some(a0.into()),
            asset1: Some(a1.into()),
            ..Default::default()
        }
    }

    fn fixtures() -> (Vec<PoolDeployment>, Vec<PoolSnapshot>) {
        let base = 1_755_734_400;
        let deployments = vec![
            deployment("0xP2", "0xA", base + DAY, "0xt1", "0xt0"),
            deployment("0xP1", "0xA", base, "0xt0", "0xt1"),
            deployment("0xP3", "0xB", base + DAY, "0xt0", "0xt2"),
        ];
        let current = normalize_pool_list(json!([{
            "pool": "0xp2",
            "active": true,
            "accountNav": { "nav": "150000000000", "totalAssets": "0", "totalBorrowed": "0" },
            "volume": { "total": "500000000000" }
        }]))
        .unwrap();
        (deployments, current)
    }

    #[test]
    fn test_build_pool_map_joins_current_state() {
        let (deployments, current) = fixtures();
        let symbols: HashMap<String, String> =
            [("0xt0".to_string(), "USDC".to_string())].into_iter().collect();
        let entries = build_pool_map(&deployments, &current, &symbols);

        assert_eq!(entries[0].pool, "0xp1");
        assert!(!entries[0].active);
        assert_eq!(entries[0].token0_symbol, "USDC");
        assert_eq!(entries[0].token1_symbol, "0xt1");
        assert_eq!(entries[0].created_date, "2025-08-21");

        let p2 = entries.iter().find(|e| e.pool == "0xp2").unwrap();
        assert!(p2.active);
        assert!((p2.current_nav - 1_500.0).abs() < 1e-9);
        assert!((p2.total_volume - 5_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_accounts_and_stats() {
        let (deployments, current) = fixtures();
        let entries = build_pool_map(&deployments, &current, &HashMap::new());
        let accounts = group_by_account(&entries);

        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].account, "0xa");
        assert_eq!(accounts[0].pools.len(), 2);
        assert_eq!(accounts[0].active_pools, 1);

        let stats = pool_map_stats(&entries, &accounts);
        assert_eq!(stats.total_pools, 3);
        assert_eq!(stats.active_pools, 1);
        assert_eq!(stats.multi_pool_accounts, 1);
        // t0/t1 in either order is one pair
        assert_eq!(stats.pairs, 2);
        assert_eq!(stats.timeline.get("2025-08-22"), Some(&2));
    }

    #[test]
    fn test_write_csv() {
        let (deployments, current) = fixtures();
        let entries = build_pool_map(&deployments, &current, &HashMap::new());
        let dir = tempdir().unwrap();
        let path = dir.path().join("maps").join("pool_map.csv");
        write_csv(&path, &entries).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert!(lines.next().unwrap().starts_with("pool,account,created_at"));
        assert_eq!(lines.count(), 3);
    }
}
