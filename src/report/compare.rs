//! APR comparison between the v2 API and a lifetime NAV calculation
//!
//! The index keeps no NAV at creation, so the starting point is estimated:
//! pools younger than 180 days back it out of the reported 180d APR (which
//! covers the whole life), older pools use half the current reserves.

use serde::Serialize;

use crate::indexer::types::{apr_to_percent, PoolSnapshot};
use crate::nav::returns::{implied_start_nav, lifetime_apr};
use crate::tokens::format_units;

const LIFETIME_WINDOW_DAYS: f64 = 180.0;

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct V2Apr {
    #[serde(rename = "1d")]
    pub d1: f64,
    #[serde(rename = "7d")]
    pub d7: f64,
    #[serde(rename = "30d")]
    pub d30: f64,
    #[serde(rename = "180d")]
    pub d180: f64,
}

impl V2Apr {
    pub fn from_snapshot(pool: &PoolSnapshot) -> Self {
        Self {
            d1: apr_to_percent(pool.apr.total1d),
            d7: apr_to_percent(pool.apr.total7d),
            d30: apr_to_percent(pool.apr.total30d),
            d180: apr_to_percent(pool.apr.total180d),
        }
    }

    pub fn periods(&self) -> [(&'static str, f64); 4] {
        [("1d", self.d1), ("7d", self.d7), ("30d", self.d30), ("180d", self.d180)]
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct NavBreakdown {
    pub total_assets: f64,
    pub total_borrowed: f64,
    pub net_nav: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AprComparison {
    pub pool: String,
    pub v2_apr: V2Apr,
    pub current_nav: f64,
    pub nav_breakdown: Option<NavBreakdown>,
    pub creation_nav: Option<f64>,
    pub age_days: f64,
    pub calculated_apr: Option<f64>,
    pub discrepancy: Option<f64>,
    pub note: Option<String>,
    pub error: Option<String>,
}

impl AprComparison {
    /// Total return from the estimated creation NAV, in percent
    pub fn total_return(&self) -> Option<f64> {
        self.creation_nav
            .filter(|c| *c > 0.0)
            .map(|c| (self.current_nav - c) / c * 100.0)
    }
}

pub fn compare_pool(pool: &PoolSnapshot) -> AprComparison {
    let v2_apr = V2Apr::from_snapshot(pool);
    let nav_breakdown = pool.account_nav.as_ref().map(|n| NavBreakdown {
        total_assets: n.total_assets_usd(),
        total_borrowed: n.total_borrowed_usd(),
        net_nav: n.nav_usd(),
    });
    let current_nav = pool.nav_usd();
    let age_days = pool.age_days().unwrap_or(0.0);

    let mut result = AprComparison {
        pool: pool.pool.clone(),
        v2_apr,
        current_nav,
        nav_breakdown,
        creation_nav: None,
        age_days,
        calculated_apr: None,
        discrepancy: None,
        note: None,
        error: None,
    };

    if age_days < LIFETIME_WINDOW_DAYS && v2_apr.d180 > 0.0 {
        if age_days > 0.0 {
            result.creation_nav = Some(implied_start_nav(current_nav, v2_apr.d180, age_days));
            result.calculated_apr = Some(v2_apr.d180);
            result.discrepancy = Some(0.0);
            result.note = Some("Using v2 180d APR as lifetime (pool < 180d)".to_string());
        } else {
            result.error = Some("Pool age is 0 days".to_string());
        }
        return result;
    }

    let reserves0 = format_units(pool.vault0.reserves, pool.vault0.decimals);
    let reserves1 = format_units(pool.vault1.reserves, pool.vault1.decimals);
    let creation_nav = (reserves0 + reserves1) * 0.5;
    result.creation_nav = Some(creation_nav);

    if creation_nav > 0.0 && current_nav > creation_nav && age_days > 0.0 {
        let calculated = lifetime_apr(creation_nav, current_nav, age_days);
        result.calculated_apr = Some(calculated);
        if age_days < LIFETIME_WINDOW_DAYS {
            result.discrepancy = Some((calculated - v2_apr.d180).abs());
            result.note = Some("Estimated creation NAV from reserves".to_string());
        } else {
            result.note = Some("Pool > 180 days, estimated NAV".to_string());
        }
    } else {
        result.error = Some("Invalid values for calculation".to_string());
    }

    result
}

/// Pools with 180d APR ≥ `min_apr`, highest first, at most `limit`
pub fn select_pools(mut pools: Vec<PoolSnapshot>, min_apr: Option<f64>, limit: usize) -> Vec<PoolSnapshot> {
    if let Some(min) = min_apr {
        pools.retain(|p| apr_to_percent(p.apr.total180d) >= min);
    }
    pools.sort_by(|a, b| b.apr.total180d.total_cmp(&a.apr.total180d));
    pools.truncate(limit);
    pools
}

#[derive(Debug, Clone, Serialize)]
pub struct ComparisonSummary {
    pub analyzed: usize,
    pub valid: usize,
    pub average_discrepancy: f64,
    pub max_discrepancy: f64,
}

impl ComparisonSummary {
    /// `None` when no comparison produced a discrepancy
    pub fn from_comparisons(comparisons: &[AprComparison]) -> Option<Self> {
        let discrepancies: Vec<f64> = comparisons.iter().filter_map(|c| c.discrepancy).collect();
        if discrepancies.is_empty() {
            return None;
        }
        Some(Self {
            analyzed: comparisons.len(),
            valid: discrepancies.len(),
            average_discrepancy: discrepancies.iter().sum::<f64>() / discrepancies.len() as f64,
            max_discrepancy: discrepancies.iter().cloned().fold(f64::MIN, f64::max),
        })
    }
}
