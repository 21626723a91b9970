//! `netnav nav`: current NAV, return between two blocks, or lifespan return

use clap::Args;
use eyre::{bail, Result};
use serde_json::{json, Value};

use super::{print_json, App};
use crate::config::OutputFormat;
use crate::indexer::rest::ApiVersion;
use crate::nav::{HistoricalReturn, NetNav, PositionValue};
use crate::report::{signed_pct, signed_usd, usd};

#[derive(Debug, Args)]
pub struct NavArgs {
    /// Pool address
    #[arg(long)]
    pub pool: String,

    #[arg(long, value_enum, default_value_t = OutputFormat::Simple)]
    pub format: OutputFormat,

    /// Start block for a historical return
    #[arg(long, requires = "to_block")]
    pub from_block: Option<u64>,

    /// End block for a historical return
    #[arg(long, requires = "from_block")]
    pub to_block: Option<u64>,

    /// Return from the pool's creation to its last available block
    #[arg(long, conflicts_with_all = ["from_block", "to_block"])]
    pub lifespan: bool,
}

pub async fn run(app: &App, args: NavArgs) -> Result<()> {
    let pool = args.pool.to_lowercase();

    if args.lifespan {
        let lifespan = app.lifespan().lifespan_return(&pool).await?;
        if args.format == OutputFormat::Simple {
            println!("Lifespan: Block {} → {}", lifespan.from_block, lifespan.to_block);
        }
        return print_historical(app, &pool, &lifespan.result, args.format);
    }

    match (args.from_block, args.to_block) {
        (Some(from), Some(to)) => {
            if from >= to {
                bail!("--from-block must be lower than --to-block");
            }
            let result = app.lifespan().historical_return(&pool, from, to).await?;
            print_historical(app, &pool, &result, args.format)
        }
        (None, None) => {
            let snapshot = app
                .clients
                .rest
                .fetch_pool(ApiVersion::V1, app.chain(), &pool, None)
                .await?;
            let nav = app.nav.calculate(&snapshot, None).await?;
            print_current(app, &pool, &nav, args.format)
        }
        _ => bail!("--from-block and --to-block must be given together"),
    }
}

/// Positions keyed by symbol; a repeated symbol gets its position index
/// appended (`USDC_1`) so no position is dropped
fn positions_json(positions: &[PositionValue]) -> Value {
    let mut map = serde_json::Map::new();
    for (i, p) in positions.iter().enumerate() {
        let key = if map.contains_key(&p.symbol) {
            format!("{}_{}", p.symbol, i)
        } else {
            p.symbol.clone()
        };
        map.insert(
            key,
            json!({
                "asset": p.asset,
                "assets": p.assets,
                "borrowed": p.borrowed,
                "net": p.net,
                "price": p.price,
                "netUsd": p.net_usd,
            }),
        );
    }
    map.into()
}

fn snapshot_json(nav: &NetNav) -> Value {
    json!({
        "block": nav.block,
        "timestamp": nav.timestamp,
        "netNAV": nav.nav,
        "positions": positions_json(&nav.positions),
    })
}

fn print_current(app: &App, pool: &str, nav: &NetNav, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(&json!({
            "pool": pool,
            "chainId": app.chain(),
            "netNAV": nav.nav,
            "positions": positions_json(&nav.positions),
        })),
        OutputFormat::Simple => {
            println!("Net NAV: {}", usd(nav.nav));
            println!("Positions:");
            for p in &nav.positions {
                println!("  {}: {:.6} @ ${:.6}", p.symbol, p.net, p.price);
            }
            Ok(())
        }
    }
}

fn print_historical(app: &App, pool: &str, result: &HistoricalReturn, format: OutputFormat) -> Result<()> {
    let period = &result.period;
    match format {
        OutputFormat::Json => print_json(&json!({
            "pool": pool,
            "chainId": app.chain(),
            "start": snapshot_json(&result.start),
            "end": snapshot_json(&result.end),
            "return": {
                "absolute": period.absolute,
                "percent": period.percent,
                "days": period.days,
                "annualized": period.annualized,
            },
        })),
        OutputFormat::Simple => {
            println!();
            println!("Historical Return Analysis");
            println!("{}", "=".repeat(50));
            println!(
                "Period: Block {} → {}",
                result.start.block.unwrap_or_default(),
                result.end.block.unwrap_or_default()
            );
            if let Some(days) = period.days {
                println!("Duration: {:.1} days", days);
            }
            println!("Start NAV: {}", usd(period.start_nav));
            println!("End NAV:   {}", usd(period.end_nav));
            println!(
                "Return: {} ({})",
                signed_usd(period.absolute),
                signed_pct(period.percent)
            );
            match period.annualized {
                Some(a) => println!("Annualized: {:.2}%", a),
                None => println!("Annualized: N/A"),
            }
            Ok(())
        }
    }
}
