//! Server-rendered dashboard page

use std::fmt::Write;

use super::rows::{DashboardData, PoolRow};
use crate::report::table::thousands;

const STYLE: &str = r#"
body { font-family: -apple-system, system-ui, sans-serif; background: #f3f4f6; }
.container { max-width: 1400px; margin: 0 auto; padding: 20px; }
h1 { color: #1f2937; margin-bottom: 10px; }
.subtitle { color: #6b7280; margin-bottom: 30px; }
table { width: 100%; border-collapse: collapse; background: white; box-shadow: 0 1px 3px rgba(0,0,0,0.1); }
th { background: #f9fafb; padding: 12px; text-align: left; font-weight: 600; color: #374151; border-bottom: 2px solid #e5e7eb; }
td { padding: 12px; border-bottom: 1px solid #f3f4f6; }
tr:hover { background: #f9fafb; }
.profit { color: #10b981; font-weight: 600; }
.loss { color: #ef4444; font-weight: 600; }
.neutral { color: #6b7280; }
.pool-addr { font-family: 'SF Mono', Monaco, monospace; font-size: 0.875rem; color: #6366f1; }
.pair-badge { background: #f3f4f6; padding: 4px 8px; border-radius: 4px; font-weight: 500; }
.number { text-align: right; font-variant-numeric: tabular-nums; }
.error { text-align: center; padding: 40px; color: #ef4444; }
.stats-grid { display: grid; grid-template-columns: repeat(auto-fit, minmax(200px, 1fr)); gap: 20px; margin-bottom: 30px; }
.stat-card { background: white; padding: 20px; border-radius: 8px; box-shadow: 0 1px 3px rgba(0,0,0,0.1); }
.stat-label { color: #6b7280; font-size: 0.875rem; margin-bottom: 4px; }
.stat-value { font-size: 1.875rem; font-weight: bold; color: #1f2937; }
.timestamp { color: #6b7280; font-size: 0.875rem; margin-top: 20px; }
"#;

const TITLE: &str = "EulerSwap Pools (Net NAV)";

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn sign_class(value: f64) -> &'static str {
    if value > 0.0 {
        "profit"
    } else if value < 0.0 {
        "loss"
    } else {
        "neutral"
    }
}

fn page(body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n<style>{style}</style>\n</head>\n<body>\n<div class=\"container\">\n<h1>{title}</h1>\n{body}\n</div>\n</body>\n</html>\n",
        title = TITLE,
        style = STYLE,
        body = body
    )
}

fn stat_card(label: &str, value: &str) -> String {
    format!(
        "<div class=\"stat-card\"><div class=\"stat-label\">{}</div><div class=\"stat-value\">{}</div></div>",
        label, value
    )
}

fn pool_row(row: &PoolRow) -> String {
    let short: String = row.pool.chars().take(8).collect();
    let apy = row
        .lifetime_apy
        .map(|a| format!("{:.2}%", a))
        .unwrap_or_else(|| "—".to_string());
    let apy_class = sign_class(row.lifetime_apy.unwrap_or(0.0));
    let interest_sign = if row.net_interest_30d < 0.0 { "-" } else { "+" };

    format!(
        concat!(
            "<tr>",
            "<td><a href=\"https://etherscan.io/address/{pool}\" target=\"_blank\"><code class=\"pool-addr\">{short}...</code></a></td>",
            "<td><span class=\"pair-badge\">{pair}</span></td>",
            "<td class=\"number\">${nav}</td>",
            "<td class=\"number\">{net0}</td>",
            "<td class=\"number\">{net1}</td>",
            "<td class=\"number {apr_class}\">{apr:.2}%</td>",
            "<td class=\"number {apy_class}\">{apy}</td>",
            "<td class=\"number\">${volume}</td>",
            "<td class=\"number\">${fees}</td>",
            "<td class=\"number {interest_class}\">{interest_sign}${interest}</td>",
            "</tr>"
        ),
        pool = escape(&row.pool),
        short = escape(&short),
        pair = escape(&row.pair),
        nav = thousands(row.net_nav, 2),
        net0 = thousands(row.net_position0, 2),
        net1 = thousands(row.net_position1, 2),
        apr_class = sign_class(row.apr_30d),
        apr = row.apr_30d,
        apy_class = apy_class,
        apy = apy,
        volume = thousands(row.volume_30d, 0),
        fees = thousands(row.fees_30d, 2),
        interest_class = sign_class(row.net_interest_30d),
        interest_sign = interest_sign,
        interest = thousands(row.net_interest_30d.abs(), 2),
    )
}

pub fn render(data: &DashboardData) -> String {
    let mut body = String::new();
    body.push_str("<p class=\"subtitle\">Active pools on Ethereum Mainnet using custom NAV calculations</p>\n");

    body.push_str("<div class=\"stats-grid\">");
    body.push_str(&stat_card("Active Pools", &data.active_pools.to_string()));
    body.push_str(&stat_card("Total Net NAV", &format!("${}", thousands(data.total_net_nav, 0))));
    body.push_str(&stat_card("30d Volume", &format!("${}", thousands(data.total_volume_30d, 0))));
    body.push_str("</div>\n");

    body.push_str("<table>\n<thead><tr>");
    for header in [
        "Pool",
        "Pair",
        "Net NAV",
        "Net Position 0",
        "Net Position 1",
        "V2 30d APR",
        "Lifetime APY",
        "30d Volume",
        "30d Fees",
        "30d Net Interest",
    ] {
        let _ = write!(body, "<th>{}</th>", header);
    }
    body.push_str("</tr></thead>\n<tbody>\n");
    for row in &data.pools {
        body.push_str(&pool_row(row));
        body.push('\n');
    }
    body.push_str("</tbody>\n</table>\n");

    let _ = write!(
        body,
        "<p class=\"timestamp\">Last updated: {}</p>",
        escape(&data.updated_at)
    );
    page(&body)
}

pub fn render_error(message: &str) -> String {
    page(&format!(
        "<div class=\"error\">Error loading data: {}</div>",
        escape(message)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(lifetime_apy: Option<f64>) -> PoolRow {
        PoolRow {
            pool: "0x1234567890abcdef".into(),
            pair: "USDC/<WETH>".into(),
            net_nav: 12_345.678,
            net_position0: 1.0,
            net_position1: -2.0,
            apr_30d: 4.2,
            lifetime_apy,
            volume_30d: 1_000_000.0,
            fees_30d: 10.0,
            net_interest_30d: -3.5,
        }
    }

    #[test]
    fn test_render_page() {
        let data = DashboardData {
            active_pools: 1,
            total_net_nav: 12_345.678,
            total_volume_30d: 1_000_000.0,
            pools: vec![row(None)],
            updated_at: "2025-08-21 00:00:00 UTC".into(),
        };
        let html = render(&data);
        assert!(html.contains("<title>EulerSwap Pools (Net NAV)</title>"));
        assert!(html.contains("$12,346"));
        assert!(html.contains("$12,345.68"));
        assert!(html.contains("USDC/&lt;WETH&gt;"));
        assert!(html.contains("0x123456..."));
        assert!(html.contains("—"));
        assert!(html.contains("-$3.50"));
        assert!(html.contains("https://etherscan.io/address/0x1234567890abcdef"));
    }

    #[test]
    fn test_render_error_escapes() {
        let html = render_error("bad <thing>");
        assert!(html.contains("Error loading data: bad &lt;thing&gt;"));
    }

    #[test]
    fn test_lifetime_apy_cell() {
        let html = pool_row(&row(Some(-1.234)));
        assert!(html.contains("<td class=\"number loss\">-1.23%</td>"));
    }
}
