//! `netnav find-pool`: deployments for a token pair

use clap::Args;
use console::style;
use eyre::Result;
use serde::Serialize;
use std::collections::HashSet;
use tracing::warn;

use super::{format_timestamp, print_json, App};
use crate::config::OutputFormat;
use crate::indexer::rest::ApiVersion;
use crate::indexer::types::PoolDeployment;

#[derive(Debug, Args)]
pub struct FindPoolArgs {
    #[arg(long)]
    pub token0: String,

    #[arg(long)]
    pub token1: String,

    #[arg(long, value_enum, default_value_t = OutputFormat::Simple)]
    pub format: OutputFormat,
}

#[derive(Debug, Serialize)]
struct TokenLabel {
    address: String,
    symbol: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FoundPool {
    pool: String,
    asset0: Option<String>,
    asset1: Option<String>,
    created_at: Option<u64>,
    is_active: bool,
    last_activity: Option<u64>,
}

#[derive(Debug, Serialize)]
struct FindPoolReport {
    tokens: TokenPair,
    pools: Vec<FoundPool>,
}

#[derive(Debug, Serialize)]
struct TokenPair {
    token0: TokenLabel,
    token1: TokenLabel,
}

/// Active pools first, then newest
fn rank(mut pools: Vec<FoundPool>) -> Vec<FoundPool> {
    pools.sort_by(|a, b| {
        b.is_active
            .cmp(&a.is_active)
            .then(b.created_at.unwrap_or(0).cmp(&a.created_at.unwrap_or(0)))
    });
    pools
}

fn found_pool(deployment: PoolDeployment, active: &HashSet<String>, last_activity: Option<u64>) -> FoundPool {
    FoundPool {
        is_active: active.contains(&deployment.pool.to_lowercase()),
        pool: deployment.pool,
        asset0: deployment.asset0,
        asset1: deployment.asset1,
        created_at: deployment.created_at,
        last_activity,
    }
}

pub async fn run(app: &App, args: FindPoolArgs) -> Result<()> {
    let token0 = args.token0.to_lowercase();
    let token1 = args.token1.to_lowercase();
    let symbol0 = app.tokens.symbol(&token0).await;
    let symbol1 = app.tokens.symbol(&token1).await;

    let deployments = app
        .clients
        .graphql
        .search_pools_by_pair(app.chain(), &token0, &token1)
        .await?;

    let active: HashSet<String> = match app.clients.rest.fetch_pools(ApiVersion::V1, app.chain(), None).await {
        Ok(pools) => pools
            .into_iter()
            .filter(|p| p.active)
            .map(|p| p.pool.to_lowercase())
            .collect(),
        Err(e) => {
            warn!("⚠️ Could not fetch active pools: {}", e);
            HashSet::new()
        }
    };

    let mut pools = Vec::with_capacity(deployments.len());
    for deployment in deployments {
        let last_activity = app
            .clients
            .graphql
            .fetch_recent_swaps(app.chain(), &deployment.pool, 5)
            .await
            .ok()
            .and_then(|swaps| swaps.first().map(|s| s.timestamp));
        pools.push(found_pool(deployment, &active, last_activity));
    }
    let pools = rank(pools);

    let report = FindPoolReport {
        tokens: TokenPair {
            token0: TokenLabel {
                address: token0,
                symbol: symbol0,
            },
            token1: TokenLabel {
                address: token1,
                symbol: symbol1,
            },
        },
        pools,
    };

    match args.format {
        OutputFormat::Json => print_json(&report),
        OutputFormat::Simple => {
            print_simple(&report);
            Ok(())
        }
    }
}

fn print_simple(report: &FindPoolReport) {
    let t = &report.tokens;
    println!();
    println!(
        "Pools for {} ({}) / {} ({})",
        style(&t.token0.symbol).bold(),
        t.token0.address,
        style(&t.token1.symbol).bold(),
        t.token1.address
    );
    println!("{}", "=".repeat(60));

    if report.pools.is_empty() {
        println!("{}", style("No pools found for this pair").yellow());
        return;
    }

    for (i, p) in report.pools.iter().enumerate() {
        let status = if p.is_active {
            style("ACTIVE").green()
        } else {
            style("INACTIVE").red()
        };
        println!();
        println!("{}. {} [{}]", i + 1, p.pool, status);
        if let Some(created) = p.created_at {
            println!("   Created:       {}", format_timestamp(created));
        }
        match p.last_activity {
            Some(ts) => println!("   Last swap:     {}", format_timestamp(ts)),
            None => println!("   Last swap:     never"),
        }
    }
    println!();
    println!("Found {} pool(s)", report.pools.len());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deployment(pool: &str, created: u64) -> PoolDeployment {
        PoolDeployment {
            pool: pool.into(),
            created_at: Some(created),
            ..Default::default()
        }
    }

    #[test]
    fn test_active_pools_rank_first() {
        let active: HashSet<String> = ["0xbb".to_string()].into_iter().collect();
        let pools = vec![
            found_pool(deployment("0xAA", 300), &active, None),
            found_pool(deployment("0xBB", 100), &active, Some(150)),
            found_pool(deployment("0xCC", 200), &active, None),
        ];
        let ranked = rank(pools);
        let order: Vec<&str> = ranked.iter().map(|p| p.pool.as_str()).collect();
        assert_eq!(order, vec!["0xBB", "0xAA", "0xCC"]);
        assert!(ranked[0].is_active);
    }

    #[test]
    fn test_report_json_shape() {
        let report = FindPoolReport {
            tokens: TokenPair {
                token0: TokenLabel {
                    address: "0xa".into(),
                    symbol: "USDC".into(),
                },
                token1: TokenLabel {
                    address: "0xb".into(),
                    symbol: "WETH".into(),
                },
            },
            pools: vec![found_pool(deployment("0xpool", 1), &HashSet::new(), Some(2))],
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["tokens"]["token0"]["symbol"], "USDC");
        assert_eq!(value["pools"][0]["isActive"], false);
        assert_eq!(value["pools"][0]["lastActivity"], 2);
        assert_eq!(value["pools"][0]["createdAt"], 1);
    }
}
