//! `netnav pool-info`: deployment, config and current state of one pool

use clap::Args;
use console::style;
use eyre::Result;
use serde::Serialize;
use tracing::warn;

use super::{format_timestamp, print_json, App};
use crate::config::OutputFormat;
use crate::indexer::rest::{is_not_found, ApiVersion};
use crate::indexer::types::{apr_to_percent, fee_to_fraction, usd_from_e8, PoolConfig, PoolDeployment, PoolSnapshot, SwapEvent};
use crate::report::{pct, usd};
use crate::tokens::format_units;

#[derive(Debug, Args)]
pub struct PoolInfoArgs {
    #[arg(long)]
    pub pool: String,

    #[arg(long, value_enum, default_value_t = OutputFormat::Simple)]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenInfo {
    address: String,
    symbol: String,
    decimals: u8,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConfigInfo {
    fee_bps: f64,
    protocol_fee_bps: f64,
    protocol_fee_recipient: Option<String>,
    vault0: Option<String>,
    vault1: Option<String>,
    euler_account: Option<String>,
    reserve0: f64,
    reserve1: f64,
}

impl ConfigInfo {
    fn new(config: &PoolConfig, decimals0: u8, decimals1: u8) -> Self {
        Self {
            fee_bps: config.fee_bps(),
            protocol_fee_bps: fee_to_fraction(config.protocol_fee) * 10_000.0,
            protocol_fee_recipient: config.protocol_fee_recipient.clone(),
            vault0: config.vault0.clone(),
            vault1: config.vault1.clone(),
            euler_account: config.euler_account.clone(),
            reserve0: format_units(config.curr_reserve0, decimals0),
            reserve1: format_units(config.curr_reserve1, decimals1),
        }
    }
}

/// Status from a v2 snapshot; `historical` when taken at the last swap of an
/// uninstalled pool
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusInfo {
    active: bool,
    historical: bool,
    block_number: Option<u64>,
    nav: f64,
    total_assets: f64,
    total_borrowed: f64,
    apr_30d: f64,
    volume_30d: f64,
    fees_30d: f64,
}

impl StatusInfo {
    fn new(snapshot: &PoolSnapshot, historical: bool) -> Self {
        let nav = snapshot.account_nav.as_ref();
        Self {
            active: snapshot.active && !historical,
            historical,
            block_number: snapshot.block_number,
            nav: snapshot.nav_usd(),
            total_assets: nav.map(|n| n.total_assets_usd()).unwrap_or(0.0),
            total_borrowed: nav.map(|n| n.total_borrowed_usd()).unwrap_or(0.0),
            apr_30d: apr_to_percent(snapshot.apr.total30d),
            volume_30d: usd_from_e8(snapshot.volume.total30d),
            fees_30d: usd_from_e8(snapshot.fees.total30d),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct SwapInfo {
    block_number: u64,
    timestamp: u64,
    reserve0: f64,
    reserve1: f64,
    fee0: f64,
    fee1: f64,
}

impl SwapInfo {
    fn new(swap: &SwapEvent, decimals0: u8, decimals1: u8) -> Self {
        Self {
            block_number: swap.block_number,
            timestamp: swap.timestamp,
            reserve0: format_units(swap.reserve0, decimals0),
            reserve1: format_units(swap.reserve1, decimals1),
            fee0: format_units(swap.fee0, decimals0),
            fee1: format_units(swap.fee1, decimals1),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct PoolInfo {
    pool: String,
    chain_id: u64,
    deployment: PoolDeployment,
    token0: Option<TokenInfo>,
    token1: Option<TokenInfo>,
    config: Option<ConfigInfo>,
    status: Option<StatusInfo>,
    first_swap: Option<SwapInfo>,
    last_swap: Option<SwapInfo>,
    swap_count: usize,
}

async fn token_info(app: &App, address: Option<&str>) -> Option<TokenInfo> {
    let address = address?;
    Some(TokenInfo {
        address: address.to_string(),
        symbol: app.tokens.symbol(address).await,
        decimals: app.tokens.decimals(address).await,
    })
}

pub async fn run(app: &App, args: PoolInfoArgs) -> Result<()> {
    let pool = args.pool.to_lowercase();
    let chain = app.chain();
    let graphql = &app.clients.graphql;

    let deployment = graphql.fetch_pool_deployment(chain, &pool).await?;
    let token0 = token_info(app, deployment.asset0.as_deref()).await;
    let token1 = token_info(app, deployment.asset1.as_deref()).await;
    let decimals0 = token0.as_ref().map(|t| t.decimals).unwrap_or(18);
    let decimals1 = token1.as_ref().map(|t| t.decimals).unwrap_or(18);

    let config = match graphql.fetch_pool_config(chain, &pool).await {
        Ok(c) => Some(ConfigInfo::new(&c, decimals0, decimals1)),
        Err(e) => {
            warn!("⚠️ Pool config unavailable: {}", e);
            None
        }
    };

    let last_swap = graphql
        .fetch_recent_swaps(chain, &pool, 1)
        .await
        .ok()
        .and_then(|s| s.into_iter().next());
    let first_swap = graphql.fetch_first_swap(chain, &pool).await.ok().flatten();
    let swap_count = graphql.fetch_swap_count(chain, &pool).await.unwrap_or(0);

    let rest = &app.clients.rest;
    let status = match rest.fetch_pool(ApiVersion::V2, chain, &pool, None).await {
        Ok(snapshot) => Some(StatusInfo::new(&snapshot, false)),
        // uninstalled: read the state at the last swap instead
        Err(e) if is_not_found(&e) => match &last_swap {
            Some(swap) => rest
                .fetch_pool(ApiVersion::V2, chain, &pool, Some(swap.block_number))
                .await
                .ok()
                .map(|s| StatusInfo::new(&s, true)),
            None => None,
        },
        Err(e) => {
            warn!("⚠️ Current status unavailable: {}", e);
            None
        }
    };

    let info = PoolInfo {
        pool,
        chain_id: chain,
        deployment,
        token0,
        token1,
        config,
        status,
        first_swap: first_swap.map(|s| SwapInfo::new(&s, decimals0, decimals1)),
        last_swap: last_swap.map(|s| SwapInfo::new(&s, decimals0, decimals1)),
        swap_count,
    };

    match args.format {
        OutputFormat::Json => print_json(&info),
        OutputFormat::Simple => {
            print_simple(&info);
            Ok(())
        }
    }
}

fn symbol(token: &Option<TokenInfo>) -> &str {
    token.as_ref().map(|t| t.symbol.as_str()).unwrap_or("?")
}

fn print_simple(info: &PoolInfo) {
    let s0 = symbol(&info.token0);
    let s1 = symbol(&info.token1);

    println!();
    println!("{} {}", style("Pool").bold(), info.pool);
    println!("{}", "=".repeat(60));
    println!("  Pair:            {}/{}", s0, s1);
    if let Some(created) = info.deployment.created_at {
        println!("  Created:         {}", format_timestamp(created));
    }
    if let Some(account) = &info.deployment.euler_account {
        println!("  Euler account:   {}", account);
    }
    for token in [&info.token0, &info.token1].into_iter().flatten() {
        println!("  {:<6}           {} ({} decimals)", token.symbol, token.address, token.decimals);
    }

    if let Some(c) = &info.config {
        println!();
        println!("{}", style("Configuration").bold());
        println!("  Fee:             {:.2} bps", c.fee_bps);
        if c.protocol_fee_bps > 0.0 {
            println!("  Protocol fee:    {:.2} bps", c.protocol_fee_bps);
        }
        if let Some(v) = &c.vault0 {
            println!("  Vault0:          {}", v);
        }
        if let Some(v) = &c.vault1 {
            println!("  Vault1:          {}", v);
        }
        println!("  Reserves:        {:.4} {} / {:.4} {}", c.reserve0, s0, c.reserve1, s1);
    }

    println!();
    println!("{}", style("Status").bold());
    match &info.status {
        Some(st) => {
            let label = if st.active {
                style("ACTIVE".to_string()).green()
            } else if st.historical {
                style(format!(
                    "INACTIVE (snapshot at block {})",
                    st.block_number.unwrap_or_default()
                ))
                .yellow()
            } else {
                style("INACTIVE".to_string()).red()
            };
            println!("  State:           {}", label);
            println!("  NAV:             {}", usd(st.nav));
            println!("  Total assets:    {}", usd(st.total_assets));
            println!("  Total borrowed:  {}", usd(st.total_borrowed));
            println!("  30d APR:         {}", pct(st.apr_30d));
            println!("  30d volume:      {}", usd(st.volume_30d));
            println!("  30d fees:        {}", usd(st.fees_30d));
        }
        None => println!("  {}", style("No snapshot available").yellow()),
    }

    println!();
    println!("{}", style("Activity").bold());
    let capped = if info.swap_count >= 1_000 { "+" } else { "" };
    println!("  Swaps:           {}{}", info.swap_count, capped);
    if let Some(first) = &info.first_swap {
        println!(
            "  First swap:      {} (block {})",
            format_timestamp(first.timestamp),
            first.block_number
        );
    }
    match &info.last_swap {
        Some(swap) => {
            println!(
                "  Last swap:       {} (block {})",
                format_timestamp(swap.timestamp),
                swap.block_number
            );
            println!("  Reserves after:  {:.4} {} / {:.4} {}", swap.reserve0, s0, swap.reserve1, s1);
            println!("  Fees:            {:.6} {} / {:.6} {}", swap.fee0, s0, swap.fee1, s1);
        }
        None => println!("  Last swap:       never"),
    }
}
