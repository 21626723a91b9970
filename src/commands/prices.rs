//! `netnav prices`: daily USD prices from DeFiLlama and CoinGecko

use clap::{Args, ValueEnum};
use console::style;
use eyre::{bail, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::warn;

use super::App;
use crate::indexer::external::{
    compare_sources, resolve_coingecko_id, PriceComparison, PricePoint, PriceSource,
};
use crate::report::table::{opt_pct, opt_usd, print_section};
use crate::report::{new_table, numeric_row, resolve_output_path, usd, write_json};

/// Tokens shown as current prices when querying both sources
const CURRENT_PRICE_TOKENS: [&str; 4] = ["steth", "wsteth", "eth", "usdc"];

/// Rows of history printed to the console
const SHOWN_DAYS: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceChoice {
    Defillama,
    Coingecko,
    Both,
}

#[derive(Debug, Args)]
pub struct PricesArgs {
    /// Symbol (steth, wsteth, weth, eth, usdc, usdt) or token address
    pub token: String,

    #[arg(long, default_value_t = 30)]
    pub days: u32,

    #[arg(long, value_enum, default_value_t = SourceChoice::Defillama)]
    pub source: SourceChoice,

    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Date-by-date comparison of both sources
    #[arg(long)]
    pub compare: bool,

    /// Daily DeFiLlama ratio of the token to this base token (e.g. weth)
    #[arg(long, value_name = "BASE")]
    pub ratio: Option<String>,
}

/// Token price expressed in units of a base token on one day
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceRatio {
    pub date: String,
    pub token_price: f64,
    pub base_price: f64,
    pub ratio: f64,
}

/// Joins both series on date. Days missing from either side, or with a
/// non-positive base price, are dropped.
pub fn price_ratios(token: &[PricePoint], base: &[PricePoint]) -> Vec<PriceRatio> {
    let base_by_date: BTreeMap<&str, f64> =
        base.iter().map(|p| (p.date.as_str(), p.price)).collect();
    let mut ratios: Vec<PriceRatio> = token
        .iter()
        .filter_map(|p| {
            let base_price = *base_by_date.get(p.date.as_str())?;
            (base_price > 0.0).then(|| PriceRatio {
                date: p.date.clone(),
                token_price: p.price,
                base_price,
                ratio: p.price / base_price,
            })
        })
        .collect();
    ratios.sort_by(|a, b| a.date.cmp(&b.date));
    ratios.dedup_by(|a, b| a.date == b.date);
    ratios
}

#[derive(Debug, Serialize)]
struct PricesFile<'a> {
    token: &'a str,
    days: u32,
    defillama: &'a [PricePoint],
    coingecko: &'a [PricePoint],
    #[serde(skip_serializing_if = "Option::is_none")]
    comparison: Option<&'a [PriceComparison]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ratios: Option<&'a [PriceRatio]>,
}

async fn coingecko(app: &App, token: &str, days: u32) -> Result<Vec<PricePoint>> {
    let external = &app.clients.external;
    if let Some(id) = resolve_coingecko_id(token) {
        return external.coingecko_history(id, days).await;
    }
    if !token.starts_with("0x") {
        bail!("Unknown CoinGecko token {}", token);
    }
    let by_date = external.coingecko_contract_history(token, days).await?;
    Ok(by_date
        .into_iter()
        .map(|(date, price)| PricePoint {
            timestamp: chrono::NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|d| d.and_utc().timestamp() as u64)
                .unwrap_or(0),
            date,
            price,
            source: PriceSource::CoinGecko,
        })
        .collect())
}

pub async fn run(app: &App, args: PricesArgs) -> Result<()> {
    let token = args.token.to_lowercase();
    let want_llama = args.compare || args.source != SourceChoice::Coingecko;
    let want_gecko = args.compare || args.source != SourceChoice::Defillama;

    let mut llama = Vec::new();
    if want_llama {
        match app.clients.external.defillama_history(&token, args.days).await {
            Ok(points) => llama = points,
            Err(e) => warn!("⚠️ DeFiLlama: {}", e),
        }
    }
    let mut gecko = Vec::new();
    if want_gecko {
        match coingecko(app, &token, args.days).await {
            Ok(points) => gecko = points,
            Err(e) => warn!("⚠️ CoinGecko: {}", e),
        }
    }

    if llama.is_empty() && gecko.is_empty() {
        bail!("No price data for {}", token);
    }

    for (source, points) in [(PriceSource::DefiLlama, &llama), (PriceSource::CoinGecko, &gecko)] {
        if !points.is_empty() {
            print_series(&source.to_string(), points);
        }
    }

    let comparison = args.compare.then(|| compare_sources(&llama, &gecko));
    if let Some(rows) = &comparison {
        print_comparison(rows);
    }

    let mut ratios = None;
    if let Some(base) = &args.ratio {
        let base = base.to_lowercase();
        let token_series = if llama.is_empty() {
            app.clients.external.defillama_history(&token, args.days).await?
        } else {
            llama.clone()
        };
        let base_series = app.clients.external.defillama_history(&base, args.days).await?;
        let rows = price_ratios(&token_series, &base_series);
        print_ratios(&token, &base, &rows);
        ratios = Some(rows);
    }

    if args.source == SourceChoice::Both {
        match app.clients.external.defillama_current(&CURRENT_PRICE_TOKENS).await {
            Ok(current) => {
                print_section("CURRENT PRICES (DeFiLlama)");
                for (name, price) in current {
                    println!("  {:<8} {}", name.to_uppercase(), usd(price));
                }
            }
            Err(e) => warn!("⚠️ Current prices unavailable: {}", e),
        }
    }

    if let Some(output) = &args.output {
        let path = resolve_output_path(&app.config.data_path(), Some(output), "prices.json");
        write_json(
            &path,
            &PricesFile {
                token: &token,
                days: args.days,
                defillama: &llama,
                coingecko: &gecko,
                comparison: comparison.as_deref(),
                ratios: ratios.as_deref(),
            },
        )?;
        println!();
        println!("{} Saved to {}", style("✓").green(), path.display());
    }
    Ok(())
}

fn print_series(source: &str, points: &[PricePoint]) {
    print_section(&format!("{} ({} days)", source, points.len()));
    let mut table = new_table(&["Date", "Price"]);
    let skip = points.len().saturating_sub(SHOWN_DAYS);
    for p in points.iter().skip(skip) {
        table.add_row(numeric_row(vec![p.date.clone(), format!("${:.4}", p.price)]));
    }
    table.printstd();
}

fn print_ratios(token: &str, base: &str, rows: &[PriceRatio]) {
    print_section(&format!(
        "{}/{} RATIO ({} days)",
        token.to_uppercase(),
        base.to_uppercase(),
        rows.len()
    ));
    if rows.is_empty() {
        println!("  {} No overlapping days", style("✗").red());
        return;
    }
    let mut table = new_table(&["Date", token, base, "Ratio"]);
    let skip = rows.len().saturating_sub(SHOWN_DAYS);
    for r in rows.iter().skip(skip) {
        table.add_row(numeric_row(vec![
            r.date.clone(),
            usd(r.token_price),
            usd(r.base_price),
            format!("{:.6}", r.ratio),
        ]));
    }
    table.printstd();

    let avg = rows.iter().map(|r| r.ratio).sum::<f64>() / rows.len() as f64;
    println!();
    println!("  Average ratio: {:.6}", avg);
}

fn print_comparison(rows: &[PriceComparison]) {
    print_section("DEFILLAMA VS COINGECKO");
    let mut table = new_table(&["Date", "DeFiLlama", "CoinGecko", "Diff"]);
    for r in rows {
        table.add_row(numeric_row(vec![
            r.date.clone(),
            opt_usd(r.defillama),
            opt_usd(r.coingecko),
            opt_pct(r.diff_pct),
        ]));
    }
    table.printstd();

    let diffs: Vec<f64> = rows.iter().filter_map(|r| r.diff_pct).collect();
    if !diffs.is_empty() {
        let avg = diffs.iter().sum::<f64>() / diffs.len() as f64;
        let max = diffs.iter().cloned().fold(0.0, f64::max);
        println!();
        println!("  Average difference: {:.4}%", avg);
        println!("  Max difference:     {:.4}%", max);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::App;
    use crate::config::Config;
    use serde_json::json;
    use tempfile::tempdir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn point(date: &str, price: f64) -> PricePoint {
        PricePoint {
            date: date.into(),
            timestamp: 0,
            price,
            source: PriceSource::DefiLlama,
        }
    }

    #[test]
    fn test_price_ratios_join_on_date() {
        let wsteth = [
            point("2025-08-20", 4_800.0),
            point("2025-08-21", 4_840.0),
            point("2025-08-22", 4_900.0),
        ];
        let weth = [
            point("2025-08-21", 4_000.0),
            point("2025-08-22", 0.0),
            point("2025-08-23", 4_100.0),
        ];

        let rows = price_ratios(&wsteth, &weth);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].date, "2025-08-21");
        assert!((rows[0].ratio - 1.21).abs() < 1e-12);
        assert!(price_ratios(&wsteth, &[]).is_empty());
    }

    #[tokio::test]
    async fn test_coingecko_contract_fallback_for_addresses() {
        let server = MockServer::start().await;
        let token = "0x1111111111111111111111111111111111111111";
        Mock::given(method("GET"))
            .and(path(format!("/coins/ethereum/contract/{}/market_chart", token)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "prices": [[1_755_734_400_000.0_f64, 1.5], [1_755_820_800_000.0_f64, 1.6]]
            })))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let config = Config {
            coingecko_api_url: server.uri(),
            pool_cache_path: dir.path().join("pools.csv").display().to_string(),
            token_cache_path: dir.path().join("tokens.csv").display().to_string(),
            ..Config::default()
        };
        let app = App::new(config).unwrap();

        let points = coingecko(&app, token, 2).await.unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].date, "2025-08-21");
        assert_eq!(points[0].timestamp, 1_755_734_400);
        assert_eq!(points[1].price, 1.6);

        assert!(coingecko(&app, "notatoken", 2).await.is_err());
    }
}
