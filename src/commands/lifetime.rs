//! `netnav lifetime`: lifespan return next to the v2 APR windows

use clap::Args;
use console::style;
use eyre::Result;
use tracing::warn;

use super::{format_timestamp, App};
use crate::indexer::rest::{is_not_found, ApiVersion};
use crate::nav::lifetime_apr;
use crate::report::compare::V2Apr;
use crate::report::table::print_section;
use crate::report::{pct, signed_pct, signed_usd, usd};

#[derive(Debug, Args)]
pub struct LifetimeArgs {
    #[arg(long)]
    pub pool: String,
}

pub async fn run(app: &App, args: LifetimeArgs) -> Result<()> {
    let pool = args.pool.to_lowercase();
    let lifespan = app.lifespan().lifespan_return(&pool).await?;
    let result = &lifespan.result;
    let period = &result.period;

    print_section(&format!("LIFETIME {}", pool));
    println!("  Created:       {}", format_timestamp(lifespan.created_at));
    println!("  Blocks:        {} → {}", lifespan.from_block, lifespan.to_block);
    if let Some(end) = result.end.timestamp {
        println!("  Data until:    {}", format_timestamp(end));
    }

    if let (Some(p0), Some(p1)) = (result.end.position(0), result.end.position(1)) {
        println!("  Pair:          {}/{}", p0.symbol, p1.symbol);
    }

    print_section("NAV");
    println!("  Start NAV:     {}", usd(period.start_nav));
    println!("  End NAV:       {}", usd(period.end_nav));
    println!(
        "  Return:        {} ({})",
        signed_usd(period.absolute),
        signed_pct(period.percent)
    );

    let days = period.days.unwrap_or(0.0);
    println!("  Duration:      {:.2} days", days);
    let apr = lifetime_apr(period.start_nav, period.end_nav, days);
    if period.start_nav > 0.0 && days > 0.0 {
        let ratio = period.end_nav / period.start_nav;
        let exponent = 365.0 / days.max(1.0);
        println!();
        println!("  Annualization:");
        println!("    ratio    = end / start        = {:.6}", ratio);
        println!("    exponent = 365 / days         = {:.4}", exponent);
        println!("    APR      = (ratio^exp − 1)·100 = {}", pct(apr));
    } else {
        println!("  {}", style("Start NAV is not positive; lifetime APR undefined").yellow());
    }

    print_section("POSITIONS AT END");
    for p in &result.end.positions {
        println!(
            "  {:<8} assets {:>16.6}  borrowed {:>16.6}  net {:>16.6} @ {}",
            p.symbol,
            p.assets,
            p.borrowed,
            p.net,
            usd(p.price)
        );
    }

    match app
        .clients
        .rest
        .fetch_pool(ApiVersion::V2, app.chain(), &pool, None)
        .await
    {
        Ok(snapshot) => {
            let v2 = V2Apr::from_snapshot(&snapshot);
            print_section("V2 APR");
            println!("  30d:           {}", pct(v2.d30));
            println!("  180d:          {}", pct(v2.d180));
            println!("  Lifetime:      {}", pct(apr));
            if !snapshot.active {
                println!("  {}", style("Pool is inactive").yellow());
            }
        }
        Err(e) => {
            if !is_not_found(&e) {
                warn!("⚠️ Current v2 snapshot failed: {}", e);
            }
            println!();
            println!("  {}", style(missing_v2_note(&e)).yellow());
        }
    }
    Ok(())
}

/// Only a pool the index no longer lists counts as uninstalled
fn missing_v2_note(err: &eyre::Report) -> &'static str {
    if is_not_found(err) {
        "Pool not in the current v2 list; it is likely uninstalled"
    } else {
        "Current v2 APRs unavailable (index request failed)"
    }
}
