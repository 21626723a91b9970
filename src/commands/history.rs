//! `netnav history`: daily NAV of one pool

use clap::Args;
use console::style;
use eyre::Result;
use prettytable::Table;
use std::path::PathBuf;

use super::App;
use crate::nav::history::{DailyNavRow, PoolHistory};
use crate::nav::HistorySummary;
use crate::report::table::{opt_usd, print_section, thousands};
use crate::report::{new_table, numeric_row, pct, resolve_output_path, signed_pct, signed_usd, usd, usd0, write_json};

#[derive(Debug, Args)]
pub struct HistoryArgs {
    /// Pool address
    #[arg(long)]
    pub pool: String,

    /// Days to look back
    #[arg(long, default_value_t = 30)]
    pub days: u32,

    /// Output JSON file; relative paths land in the data directory
    #[arg(long)]
    pub output: Option<PathBuf>,
}

pub async fn run(app: &App, args: HistoryArgs) -> Result<()> {
    let pool = args.pool.to_lowercase();
    let history = app.history().pool_history(&pool, args.days).await?;

    let path = resolve_output_path(
        &app.config.data_path(),
        args.output.as_deref(),
        &format!("{}.json", pool),
    );
    write_json(&path, &history.to_file(app.chain()))?;
    println!("{} Saved {} days to {}", style("✓").green(), history.rows.len(), path.display());

    print_section("DAILY NAV");
    history_table(&history).printstd();

    match history.summary() {
        Some(summary) => print_summary(&summary, &history),
        None => println!("{}", style("Not enough valid days for a summary").yellow()),
    }
    Ok(())
}

fn history_table(history: &PoolHistory) -> Table {
    let t0 = &history.token0_symbol;
    let t1 = &history.token1_symbol;
    let headers = [
        "Date".to_string(),
        "Block".to_string(),
        "Net NAV".to_string(),
        "Change".to_string(),
        "Change %".to_string(),
        format!("{} Net", t0),
        format!("{} Net", t1),
        format!("{} Price", t0),
        format!("{} Price", t1),
        format!("NAV in {}", t1),
        "Daily Volume".to_string(),
        "Swaps".to_string(),
    ];
    let header_refs: Vec<&str> = headers.iter().map(String::as_str).collect();
    let mut table = new_table(&header_refs);

    let mut previous: Option<f64> = None;
    for row in &history.rows {
        let (change, change_pct) = day_change(previous, row);
        if row.nav.is_some() {
            previous = row.nav;
        }
        table.add_row(numeric_row(vec![
            row.date.clone(),
            row.block.map(|b| b.to_string()).unwrap_or_else(|| "-".into()),
            opt_usd(row.nav),
            change,
            change_pct,
            opt_amount(row.net0),
            opt_amount(row.net1),
            opt_usd(row.price0),
            opt_usd(row.price1),
            opt_amount(row.nav_in_quote),
            usd0(row.volume_usd),
            row.swap_count.to_string(),
        ]));
    }
    table
}

/// Change against the previous valid day
fn day_change(previous: Option<f64>, row: &DailyNavRow) -> (String, String) {
    match (previous, row.nav) {
        (Some(prev), Some(nav)) => {
            let change = nav - prev;
            let change_pct = if prev != 0.0 {
                signed_pct(change / prev * 100.0)
            } else {
                "-".to_string()
            };
            (signed_usd(change), change_pct)
        }
        _ => ("-".to_string(), "-".to_string()),
    }
}

fn opt_amount(value: Option<f64>) -> String {
    value
        .map(|v| thousands(v, 4))
        .unwrap_or_else(|| "N/A".to_string())
}

fn print_summary(s: &HistorySummary, history: &PoolHistory) {
    print_section("SUMMARY");
    println!("  Period:               {} → {}", s.period_start, s.period_end);
    println!("  Pair:                 {}/{}", history.token0_symbol, history.token1_symbol);
    println!("  Starting NAV:         {}", usd(s.first_nav));
    println!("  Ending NAV:           {}", usd(s.last_nav));
    println!(
        "  Total change:         {} ({})",
        signed_usd(s.total_change),
        signed_pct(s.total_change_pct)
    );
    println!("  Valid days:           {}", s.valid_days);
    println!("  Avg daily change:     {}", signed_pct(s.avg_daily_change_pct));
    match s.annualized {
        Some(a) => println!("  Annualized return:    {}", pct(a)),
        None => println!("  Annualized return:    N/A"),
    }

    println!();
    println!("  Total volume:         {}", usd0(s.total_volume));
    println!("  Total swaps:          {}", s.total_swaps);
    println!("  Avg daily volume:     {}", usd0(s.avg_daily_volume));
    println!("  Fee rate:             {:.2} bps", s.fee_rate * 10_000.0);
    println!("  Estimated fees:       {}", usd(s.total_fees));
    println!("  Fee return:           {}", pct(s.fee_return_pct));
    println!("  Fee APR:              {}", pct(s.fee_apr));

    if !history.active {
        println!();
        println!("  {}", style("Pool is no longer active").yellow());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(date: &str, nav: Option<f64>) -> DailyNavRow {
        let mut row = DailyNavRow::failed(date);
        row.nav = nav;
        row
    }

    #[test]
    fn test_day_change_skips_failed_days() {
        assert_eq!(day_change(None, &row("2025-01-01", Some(100.0))).0, "-");
        let (abs, rel) = day_change(Some(100.0), &row("2025-01-02", Some(110.0)));
        assert_eq!(abs, "+$10.00");
        assert_eq!(rel, "+10.00%");
        assert_eq!(day_change(Some(100.0), &row("2025-01-03", None)).1, "-");
    }

    #[test]
    fn test_history_table_headers_use_symbols() {
        let history = PoolHistory {
            pool: "0xpool".into(),
            token0_symbol: "USDC".into(),
            token1_symbol: "WETH".into(),
            fee_rate: 0.0001,
            active: true,
            rows: vec![row("2025-01-01", Some(100.0)), row("2025-01-02", None)],
        };
        let table = history_table(&history);
        assert_eq!(table.len(), 2);
        let rendered = table.to_string();
        assert!(rendered.contains("USDC Net"));
        assert!(rendered.contains("NAV in WETH"));
    }
}
