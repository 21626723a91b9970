//! `netnav compare-apr`: v2 API APR against a lifetime NAV estimate

use clap::Args;
use console::style;
use eyre::{eyre, Result};
use prettytable::Table;
use tracing::info;

use super::App;
use crate::indexer::rest::ApiVersion;
use crate::report::table::{opt_pct, opt_usd, print_section};
use crate::report::{compare_pool, new_table, numeric_row, pct, select_pools, usd, AprComparison, ComparisonSummary};
use crate::tokens::abbreviate;

#[derive(Debug, Args)]
pub struct CompareAprArgs {
    /// Only this pool
    #[arg(long)]
    pub pool: Option<String>,

    /// Number of pools to analyze
    #[arg(long, default_value_t = 10)]
    pub limit: usize,

    /// Per-pool breakdown instead of a table
    #[arg(long)]
    pub detailed: bool,

    /// Minimum v2 180d APR in percent
    #[arg(long)]
    pub min_apr: Option<f64>,
}

pub async fn run(app: &App, args: CompareAprArgs) -> Result<()> {
    let pools = app
        .clients
        .rest
        .fetch_pools(ApiVersion::V2, app.chain(), None)
        .await?;
    info!("📊 Fetched {} pools from v2", pools.len());

    let selected = match &args.pool {
        Some(pool) => {
            let found = pools
                .into_iter()
                .find(|p| p.matches(pool))
                .ok_or_else(|| eyre!("Pool {} not found", pool))?;
            vec![found]
        }
        None => select_pools(pools, args.min_apr, args.limit),
    };

    let comparisons: Vec<AprComparison> = selected.iter().map(compare_pool).collect();

    if args.detailed {
        for c in &comparisons {
            print_detailed(c);
        }
    } else {
        print_section("APR COMPARISON");
        comparison_table(&comparisons).printstd();
    }

    if let Some(summary) = ComparisonSummary::from_comparisons(&comparisons) {
        print_section("SUMMARY");
        println!("  Pools analyzed:        {}", summary.analyzed);
        println!("  Valid calculations:    {}", summary.valid);
        println!("  Average discrepancy:   {}", pct(summary.average_discrepancy));
        println!("  Max discrepancy:       {}", pct(summary.max_discrepancy));
    }

    Ok(())
}

fn comparison_table(comparisons: &[AprComparison]) -> Table {
    let mut table = new_table(&[
        "Pool",
        "Age",
        "Current NAV",
        "v2 180d APR",
        "Calc APR",
        "Discrepancy",
        "Note",
    ]);
    for c in comparisons {
        let note = c
            .error
            .as_deref()
            .or(c.note.as_deref())
            .unwrap_or("")
            .to_string();
        table.add_row(numeric_row(vec![
            abbreviate(&c.pool),
            format!("{:.0}d", c.age_days),
            usd(c.current_nav),
            pct(c.v2_apr.d180),
            opt_pct(c.calculated_apr),
            opt_pct(c.discrepancy),
            note,
        ]));
    }
    table
}

fn print_detailed(c: &AprComparison) {
    print_section(&format!("POOL {}", c.pool));
    println!("  Age:              {:.1} days", c.age_days);
    println!("  Current NAV:      {}", usd(c.current_nav));
    if let Some(b) = &c.nav_breakdown {
        println!("    Total assets:   {}", usd(b.total_assets));
        println!("    Total borrowed: {}", usd(b.total_borrowed));
    }
    println!("  Creation NAV:     {}", opt_usd(c.creation_nav));
    if let Some(total) = c.total_return() {
        println!("  Total return:     {}", pct(total));
    }

    println!();
    println!("  v2 APR:");
    for (period, value) in c.v2_apr.periods() {
        println!("    {:>5}: {}", period, pct(value));
    }
    println!("  Calculated APR:   {}", opt_pct(c.calculated_apr));
    println!("  Discrepancy:      {}", opt_pct(c.discrepancy));

    if let Some(note) = &c.note {
        println!("  {}", style(note).dim());
    }
    if let Some(error) = &c.error {
        println!("  {} {}", style("✗").red(), error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::compare::V2Apr;

    #[test]
    fn test_comparison_table_prefers_error_over_note() {
        let c = AprComparison {
            pool: "0x1234567890abcdef1234567890abcdef12345678".into(),
            v2_apr: V2Apr {
                d180: 12.0,
                ..Default::default()
            },
            current_nav: 1_000.0,
            nav_breakdown: None,
            creation_nav: None,
            age_days: 200.0,
            calculated_apr: None,
            discrepancy: None,
            note: Some("ignored".into()),
            error: Some("Invalid values for calculation".into()),
        };
        let rendered = comparison_table(&[c]).to_string();
        assert!(rendered.contains("Invalid values for calculation"));
        assert!(!rendered.contains("ignored"));
        assert!(rendered.contains("12.00%"));
        assert!(rendered.contains("N/A"));
    }
}
