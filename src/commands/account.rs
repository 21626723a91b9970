//! `netnav account-history` and `netnav pool-account-history`

use clap::Args;
use console::style;
use eyre::Result;
use prettytable::Table;
use std::path::PathBuf;

use super::App;
use crate::nav::history::{AccountDayRow, AccountSummary, PoolAccountRow};
use crate::report::table::{opt_usd, print_section};
use crate::report::{new_table, numeric_row, pct, resolve_output_path, signed_pct, signed_usd, usd, write_json};
use crate::tokens::abbreviate;

#[derive(Debug, Args)]
pub struct AccountHistoryArgs {
    /// Euler account address
    #[arg(long)]
    pub account: String,

    #[arg(long, default_value_t = 30)]
    pub days: u32,

    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct PoolAccountHistoryArgs {
    /// Pool address
    #[arg(long)]
    pub pool: String,

    #[arg(long, default_value_t = 30)]
    pub days: u32,

    #[arg(long)]
    pub output: Option<PathBuf>,
}

pub async fn run_account(app: &App, args: AccountHistoryArgs) -> Result<()> {
    let account = args.account.to_lowercase();
    let history = app.history().account_history(&account, args.days).await?;

    print_section(&format!("ACCOUNT {}", account));
    println!("  Deployments: {}", history.deployments.len());
    for d in &history.deployments {
        let label = match (&d.asset0, &d.asset1) {
            (Some(a0), Some(a1)) => app.tokens.pair_label(a0, a1).await,
            _ => "?/?".to_string(),
        };
        println!("    {} {}", abbreviate(&d.pool), style(label).dim());
    }

    if history.daily_data.is_empty() {
        println!("{}", style("No NAV data found for this account").yellow());
        return Ok(());
    }

    print_section("DAILY ACCOUNT NAV");
    account_table(&history.daily_data).printstd();

    let navs: Vec<f64> = history.daily_data.iter().map(|r| r.snapshot.nav_usd).collect();
    if let Some(summary) = AccountSummary::from_navs(&navs) {
        print_account_summary(&summary);
    }

    let path = resolve_output_path(
        &app.config.data_path(),
        args.output.as_deref(),
        &format!("account_{}.json", account),
    );
    write_json(&path, &history)?;
    println!();
    println!("{} Saved to {}", style("✓").green(), path.display());
    Ok(())
}

pub async fn run_pool(app: &App, args: PoolAccountHistoryArgs) -> Result<()> {
    let pool = args.pool.to_lowercase();
    let rows = app.history().pool_account_history(&pool, args.days).await?;

    print_section(&format!("POOL ACCOUNT NAV {}", pool));
    pool_account_table(&rows).printstd();

    let navs: Vec<f64> = rows.iter().filter_map(|r| r.nav_usd).collect();
    if let Some(summary) = AccountSummary::from_navs(&navs) {
        print_account_summary(&summary);
    }

    let path = resolve_output_path(
        &app.config.data_path(),
        args.output.as_deref(),
        &format!("pool_account_{}.json", pool),
    );
    write_json(
        &path,
        &serde_json::json!({
            "pool": pool,
            "chainId": app.chain(),
            "dailyData": rows,
        }),
    )?;
    println!();
    println!("{} Saved to {}", style("✓").green(), path.display());
    Ok(())
}

fn change_cells(previous: Option<f64>, current: Option<f64>) -> (String, String) {
    match (previous, current) {
        (Some(prev), Some(cur)) if prev != 0.0 => {
            let change = cur - prev;
            (signed_usd(change), signed_pct(change / prev * 100.0))
        }
        _ => ("-".to_string(), "-".to_string()),
    }
}

fn account_table(rows: &[AccountDayRow]) -> Table {
    let mut table = new_table(&[
        "Date",
        "Block",
        "Account NAV",
        "Total Assets",
        "Total Borrowed",
        "Change",
        "Change %",
        "Pools",
    ]);
    let mut previous = None;
    for row in rows {
        let nav = row.snapshot.nav_usd;
        let (change, change_pct) = change_cells(previous, Some(nav));
        previous = Some(nav);
        table.add_row(numeric_row(vec![
            row.date.clone(),
            row.block.to_string(),
            usd(nav),
            usd(row.snapshot.total_assets_usd),
            usd(row.snapshot.total_borrowed_usd),
            change,
            change_pct,
            row.snapshot.num_pools.to_string(),
        ]));
    }
    table
}

fn pool_account_table(rows: &[PoolAccountRow]) -> Table {
    let mut table = new_table(&[
        "Date",
        "Block",
        "Account NAV",
        "Total Assets",
        "Total Borrowed",
        "Change",
        "Change %",
        "Vaults",
    ]);
    let mut previous = None;
    for row in rows {
        let (change, change_pct) = change_cells(previous, row.nav_usd);
        if row.nav_usd.is_some() {
            previous = row.nav_usd;
        }
        table.add_row(numeric_row(vec![
            row.date.clone(),
            row.block.to_string(),
            opt_usd(row.nav_usd),
            opt_usd(row.total_assets_usd),
            opt_usd(row.total_borrowed_usd),
            change,
            change_pct,
            row.active_vaults.to_string(),
        ]));
    }
    table
}

fn print_account_summary(s: &AccountSummary) {
    print_section("SUMMARY");
    println!("  Start NAV:            {}", usd(s.start_nav));
    println!("  End NAV:              {}", usd(s.end_nav));
    println!(
        "  Total change:         {} ({})",
        signed_usd(s.total_change),
        signed_pct(s.total_change_pct)
    );
    println!("  Days with data:       {}", s.days_with_data);
    println!("  Avg daily change:     {}", signed_pct(s.avg_daily_change_pct));
    println!("  Annualized (simple):  {}", pct(s.annualized));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_cells() {
        assert_eq!(change_cells(None, Some(5.0)), ("-".into(), "-".into()));
        assert_eq!(change_cells(Some(0.0), Some(5.0)), ("-".into(), "-".into()));
        assert_eq!(
            change_cells(Some(200.0), Some(150.0)),
            ("-$50.00".into(), "-25.00%".into())
        );
    }

    #[test]
    fn test_pool_account_table_keeps_failed_days() {
        let rows = vec![
            PoolAccountRow::failed("2025-01-01", 100),
            PoolAccountRow::failed("2025-01-02", 200),
        ];
        let table = pool_account_table(&rows);
        assert_eq!(table.len(), 2);
        assert!(table.to_string().contains("N/A"));
    }
}
