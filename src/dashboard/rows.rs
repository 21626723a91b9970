//! Dashboard rows: active v1 pools with computed NAV joined with v2 metrics

use serde::Serialize;
use std::collections::HashMap;

use crate::indexer::types::{apr_to_percent, usd_from_e8, PoolSnapshot};
use crate::nav::NetNav;
use crate::tokens::format_units;

/// Pools younger than this show no lifetime APY when it rounds to zero
const YOUNG_POOL_DAYS: f64 = 7.0;

/// Computed state of one active pool before joining with v2
#[derive(Debug, Clone)]
pub struct PoolNav {
    pub snapshot: PoolSnapshot,
    pub pair: String,
    pub nav: Option<NetNav>,
    /// Annualized lifespan return and lifespan length in days
    pub lifetime: Option<(f64, Option<f64>)>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolRow {
    pub pool: String,
    pub pair: String,
    pub net_nav: f64,
    pub net_position0: f64,
    pub net_position1: f64,
    pub apr_30d: f64,
    pub lifetime_apy: Option<f64>,
    pub volume_30d: f64,
    pub fees_30d: f64,
    pub net_interest_30d: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardData {
    pub active_pools: usize,
    pub total_net_nav: f64,
    pub total_volume_30d: f64,
    pub pools: Vec<PoolRow>,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub active_pools: usize,
    pub total_net_nav: f64,
    pub total_volume_30d: f64,
    pub profitable_pools: usize,
    pub losing_pools: usize,
}

impl DashboardData {
    pub fn stats(&self) -> DashboardStats {
        DashboardStats {
            active_pools: self.active_pools,
            total_net_nav: self.total_net_nav,
            total_volume_30d: self.total_volume_30d,
            profitable_pools: self.pools.iter().filter(|p| p.apr_30d > 0.0).count(),
            losing_pools: self.pools.iter().filter(|p| p.apr_30d < 0.0).count(),
        }
    }
}

/// A zero APY on a young pool with NAV is shown as missing
pub fn visible_lifetime_apy(apy: Option<f64>, net_nav: f64, days: Option<f64>) -> Option<f64> {
    let apy = apy?;
    let young = days.map(|d| d < YOUNG_POOL_DAYS).unwrap_or(false);
    if apy == 0.0 && net_nav > 0.0 && young {
        None
    } else {
        Some(apy)
    }
}

fn row(pool: &PoolNav, v2: Option<&PoolSnapshot>) -> PoolRow {
    let snapshot = &pool.snapshot;
    let net_nav = pool.nav.as_ref().map(|n| n.nav).unwrap_or(0.0);

    let (net_position0, net_position1) = match &pool.nav {
        Some(nav) => (
            nav.position(0).map(|p| p.net).unwrap_or(0.0),
            nav.position(1).map(|p| p.net).unwrap_or(0.0),
        ),
        None => (
            format_units(snapshot.vault0.reserves, snapshot.vault0.decimals),
            format_units(snapshot.vault1.reserves, snapshot.vault1.decimals),
        ),
    };

    let lifetime_apy = pool
        .lifetime
        .and_then(|(apy, days)| visible_lifetime_apy(Some(apy), net_nav, days));

    PoolRow {
        pool: snapshot.pool.clone(),
        pair: pool.pair.clone(),
        net_nav,
        net_position0,
        net_position1,
        apr_30d: v2.map(|s| apr_to_percent(s.apr.total30d)).unwrap_or(0.0),
        lifetime_apy,
        volume_30d: v2.map(|s| usd_from_e8(s.volume.total30d)).unwrap_or(0.0),
        fees_30d: v2.map(|s| usd_from_e8(s.fees.total30d)).unwrap_or(0.0),
        net_interest_30d: v2.map(|s| s.net_interest_30d()).unwrap_or(0.0),
    }
}

/// Totals cover every active pool; the table keeps the `max_pools` largest
pub fn assemble(pools: &[PoolNav], v2: &[PoolSnapshot], max_pools: usize, updated_at: String) -> DashboardData {
    let by_pool: HashMap<String, &PoolSnapshot> =
        v2.iter().map(|s| (s.pool.to_lowercase(), s)).collect();

    let mut rows: Vec<PoolRow> = pools
        .iter()
        .filter(|p| p.snapshot.active)
        .map(|p| row(p, by_pool.get(&p.snapshot.pool.to_lowercase()).copied()))
        .collect();

    let active_pools = rows.len();
    let total_net_nav = rows.iter().map(|r| r.net_nav).sum();
    let total_volume_30d = rows.iter().map(|r| r.volume_30d).sum();

    rows.sort_by(|a, b| b.net_nav.total_cmp(&a.net_nav));
    rows.truncate(max_pools);

    DashboardData {
        active_pools,
        total_net_nav,
        total_volume_30d,
        pools: rows,
        updated_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::types::normalize_pool_list;
    use crate::nav::PositionValue;
    use serde_json::json;

    fn nav(value: f64, net0: f64, net1: f64) -> NetNav {
        let position = |net: f64| PositionValue {
            symbol: "T".into(),
            asset: "0xt".into(),
            assets: net,
            borrowed: 0.0,
            net,
            price: 1.0,
            assets_usd: net,
            borrowed_usd: 0.0,
            net_usd: net,
        };
        NetNav {
            nav: value,
            total_assets_usd: value,
            total_borrowed_usd: 0.0,
            block: None,
            timestamp: None,
            positions: vec![position(net0), position(net1)],
        }
    }

    fn v1(pool: &str, active: bool) -> PoolSnapshot {
        PoolSnapshot {
            pool: pool.into(),
            active,
            ..Default::default()
        }
    }

    #[test]
    fn test_visible_lifetime_apy() {
        assert_eq!(visible_lifetime_apy(Some(0.0), 100.0, Some(3.0)), None);
        assert_eq!(visible_lifetime_apy(Some(0.0), 100.0, Some(30.0)), Some(0.0));
        assert_eq!(visible_lifetime_apy(Some(0.0), 0.0, Some(3.0)), Some(0.0));
        assert_eq!(visible_lifetime_apy(Some(12.5), 100.0, Some(1.0)), Some(12.5));
        assert_eq!(visible_lifetime_apy(None, 100.0, Some(30.0)), None);
    }

    #[test]
    fn test_assemble_sorts_truncates_and_totals() {
        let v2 = normalize_pool_list(json!([
            { "pool": "0xB", "apr": { "total30d": "50000000000000000" }, "volume": { "total30d": "100000000000" } },
            { "pool": "0xa", "apr": { "total30d": "-10000000000000000" }, "volume": { "total30d": "50000000000" } }
        ]))
        .unwrap();

        let pools = vec![
            PoolNav {
                snapshot: v1("0xA", true),
                pair: "USDC/WETH".into(),
                nav: Some(nav(500.0, 1.0, 2.0)),
                lifetime: Some((8.0, Some(40.0))),
            },
            PoolNav {
                snapshot: v1("0xb", true),
                pair: "USDC/USDT".into(),
                nav: Some(nav(2_000.0, 3.0, 4.0)),
                lifetime: Some((0.0, Some(2.0))),
            },
            PoolNav {
                snapshot: v1("0xc", false),
                pair: "X/Y".into(),
                nav: Some(nav(9_999.0, 0.0, 0.0)),
                lifetime: None,
            },
        ];

        let data = assemble(&pools, &v2, 1, "now".into());
        assert_eq!(data.active_pools, 2);
        assert!((data.total_net_nav - 2_500.0).abs() < 1e-9);
        assert!((data.total_volume_30d - 1_500.0).abs() < 1e-9);
        assert_eq!(data.pools.len(), 1);

        let top = &data.pools[0];
        assert_eq!(top.pool, "0xb");
        assert!((top.apr_30d - 5.0).abs() < 1e-9);
        assert_eq!(top.lifetime_apy, None);
        assert_eq!(top.net_position1, 4.0);

        let stats = assemble(&pools, &v2, 10, "now".into()).stats();
        assert_eq!(stats.profitable_pools, 1);
        assert_eq!(stats.losing_pools, 1);
    }
}
