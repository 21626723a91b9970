//! External USD price feeds (CoinGecko, DeFiLlama)
//!
//! Used for daily history where one bulk call replaces a GraphQL oracle
//! query per day, and for cross-checking the oracle.

use chrono::{DateTime, Utc};
use eyre::{eyre, Result};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Config;
use crate::tokens;

/// Pause before the single retry after a CoinGecko 429
const RATE_LIMIT_WAIT_SECS: u64 = 15;

/// Symbol → DeFiLlama coin id
const DEFILLAMA_IDS: &[(&str, &str)] = &[
    ("steth", "ethereum:0xae7ab96520de3a18e5e111b5eaab095312d7fe84"),
    ("wsteth", "ethereum:0x7f39c581f595b53c5cb19bd0b3f8da6c935e2ca0"),
    ("weth", "ethereum:0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2"),
    ("eth", "ethereum:0x0000000000000000000000000000000000000000"),
    ("usdc", "ethereum:0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"),
    ("usdt", "ethereum:0xdac17f958d2ee523a2206206994597c13d831ec7"),
];

/// Symbol → CoinGecko coin id
const COINGECKO_IDS: &[(&str, &str)] = &[
    ("steth", "staked-ether"),
    ("wsteth", "wrapped-steth"),
    ("eth", "ethereum"),
    ("weth", "weth"),
    ("usdc", "usd-coin"),
    ("usdt", "tether"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PriceSource {
    #[value(name = "defillama")]
    DefiLlama,
    #[value(name = "coingecko")]
    CoinGecko,
}

impl std::fmt::Display for PriceSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PriceSource::DefiLlama => write!(f, "DeFiLlama"),
            PriceSource::CoinGecko => write!(f, "CoinGecko"),
        }
    }
}

/// One daily price
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PricePoint {
    pub date: String,
    pub timestamp: u64,
    pub price: f64,
    pub source: PriceSource,
}

/// One row of a DeFiLlama vs CoinGecko comparison
#[derive(Debug, Clone, Serialize)]
pub struct PriceComparison {
    pub date: String,
    pub defillama: Option<f64>,
    pub coingecko: Option<f64>,
    /// |a - b| / a × 100 when both exist
    pub diff_pct: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct MarketChart {
    #[serde(default)]
    prices: Vec<(f64, f64)>,
}

#[derive(Debug, Deserialize)]
struct LlamaChart {
    #[serde(default)]
    coins: HashMap<String, LlamaSeries>,
}

#[derive(Debug, Deserialize)]
struct LlamaSeries {
    #[serde(default)]
    prices: Vec<LlamaPoint>,
}

#[derive(Debug, Deserialize)]
struct LlamaPoint {
    timestamp: u64,
    price: f64,
}

#[derive(Debug, Deserialize)]
struct LlamaCurrent {
    #[serde(default)]
    coins: HashMap<String, LlamaCurrentCoin>,
}

#[derive(Debug, Deserialize)]
struct LlamaCurrentCoin {
    price: f64,
}

/// `YYYY-MM-DD` (UTC) for a Unix timestamp in seconds
pub fn utc_date(ts: u64) -> String {
    DateTime::<Utc>::from_timestamp(ts as i64, 0)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

pub fn resolve_defillama_id(token: &str) -> String {
    let lower = token.trim().to_lowercase();
    if let Some((_, id)) = DEFILLAMA_IDS.iter().find(|(sym, _)| *sym == lower) {
        return id.to_string();
    }
    if lower.starts_with("ethereum:") {
        lower
    } else {
        format!("ethereum:{}", lower)
    }
}

pub fn resolve_coingecko_id(token: &str) -> Option<&'static str> {
    let lower = token.trim().to_lowercase();
    COINGECKO_IDS
        .iter()
        .find(|(sym, _)| *sym == lower)
        .map(|(_, id)| *id)
}

#[derive(Debug, Clone)]
pub struct ExternalPrices {
    http: Client,
    coingecko_url: String,
    defillama_url: String,
    rate_limit_wait: Duration,
}

impl ExternalPrices {
    pub fn new(http: Client, coingecko_url: String, defillama_url: String) -> Self {
        Self {
            http,
            coingecko_url: coingecko_url.trim_end_matches('/').to_string(),
            defillama_url: defillama_url.trim_end_matches('/').to_string(),
            rate_limit_wait: Duration::from_secs(RATE_LIMIT_WAIT_SECS),
        }
    }

    pub fn from_config(config: &Config, http: Client) -> Self {
        Self::new(
            http,
            config.coingecko_api_url.clone(),
            config.defillama_api_url.clone(),
        )
    }

    #[cfg(test)]
    pub fn with_rate_limit_wait(mut self, wait: Duration) -> Self {
        self.rate_limit_wait = wait;
        self
    }

    /// GET with one retry after a 429
    async fn get_coingecko(&self, url: &str, query: &[(&str, String)]) -> Result<Option<MarketChart>> {
        let mut response = self.http.get(url).query(query).send().await?;
        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            warn!("Rate limited by CoinGecko, waiting {:?}...", self.rate_limit_wait);
            tokio::time::sleep(self.rate_limit_wait).await;
            response = self.http.get(url).query(query).send().await?;
        }
        if !response.status().is_success() {
            debug!("CoinGecko {} returned {}", url, response.status());
            return Ok(None);
        }
        Ok(Some(response.json().await?))
    }

    fn last_price_per_day(chart: MarketChart) -> BTreeMap<String, f64> {
        let mut by_date = BTreeMap::new();
        for (ts_ms, price) in chart.prices {
            by_date.insert(utc_date((ts_ms / 1000.0) as u64), price);
        }
        by_date
    }

    /// Date → last USD price of that day for an ERC20 contract
    pub async fn coingecko_contract_history(&self, token: &str, days: u32) -> Result<BTreeMap<String, f64>> {
        let query = [("vs_currency", "usd".to_string()), ("days", days.to_string())];

        let url = format!(
            "{}/coins/ethereum/contract/{}/market_chart",
            self.coingecko_url,
            token.to_lowercase()
        );
        if let Some(chart) = self.get_coingecko(&url, &query).await? {
            if !chart.prices.is_empty() {
                return Ok(Self::last_price_per_day(chart));
            }
        }

        if tokens::is_native_eth(token) {
            let url = format!("{}/coins/ethereum/market_chart", self.coingecko_url);
            if let Some(chart) = self.get_coingecko(&url, &query).await? {
                return Ok(Self::last_price_per_day(chart));
            }
        }

        Ok(BTreeMap::new())
    }

    /// Daily prices for a CoinGecko coin id (`staked-ether`, `ethereum`, ...)
    pub async fn coingecko_history(&self, coin_id: &str, days: u32) -> Result<Vec<PricePoint>> {
        let url = format!("{}/coins/{}/market_chart", self.coingecko_url, coin_id);
        let query = [
            ("vs_currency", "usd".to_string()),
            ("days", days.to_string()),
            ("interval", "daily".to_string()),
        ];

        let chart = self
            .get_coingecko(&url, &query)
            .await?
            .ok_or_else(|| eyre!("No price data from CoinGecko for {}", coin_id))?;

        Ok(chart
            .prices
            .into_iter()
            .map(|(ts_ms, price)| {
                let ts = (ts_ms / 1000.0) as u64;
                PricePoint {
                    date: utc_date(ts),
                    timestamp: ts,
                    price,
                    source: PriceSource::CoinGecko,
                }
            })
            .collect())
    }

    /// Daily prices from DeFiLlama for a symbol or address
    pub async fn defillama_history(&self, token: &str, days: u32) -> Result<Vec<PricePoint>> {
        let token_id = resolve_defillama_id(token);
        let url = format!("{}/chart/{}", self.defillama_url, token_id);

        let chart: LlamaChart = self
            .http
            .get(&url)
            .query(&[("period", "1d".to_string()), ("span", days.to_string())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let series = chart
            .coins
            .into_iter()
            .find(|(id, _)| id.eq_ignore_ascii_case(&token_id))
            .map(|(_, s)| s)
            .ok_or_else(|| eyre!("No data found for {}", token_id))?;

        Ok(series
            .prices
            .into_iter()
            .map(|p| PricePoint {
                date: utc_date(p.timestamp),
                timestamp: p.timestamp,
                price: p.price,
                source: PriceSource::DefiLlama,
            })
            .collect())
    }

    /// Current prices keyed by the caller's token names
    pub async fn defillama_current(&self, tokens: &[&str]) -> Result<BTreeMap<String, f64>> {
        let ids: Vec<(String, String)> = tokens
            .iter()
            .map(|t| (t.to_lowercase(), resolve_defillama_id(t)))
            .collect();
        let joined = ids.iter().map(|(_, id)| id.as_str()).collect::<Vec<_>>().join(",");
        let url = format!("{}/prices/current/{}", self.defillama_url, joined);

        let current: LlamaCurrent = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let mut prices = BTreeMap::new();
        for (name, id) in ids {
            if let Some(coin) = current.coins.get(&id) {
                prices.insert(name, coin.price);
            }
        }
        Ok(prices)
    }
}

/// Align two series by date; `diff_pct` relative to DeFiLlama
pub fn compare_sources(defillama: &[PricePoint], coingecko: &[PricePoint]) -> Vec<PriceComparison> {
    let dl: BTreeMap<&str, f64> = defillama.iter().map(|p| (p.date.as_str(), p.price)).collect();
    let cg: BTreeMap<&str, f64> = coingecko.iter().map(|p| (p.date.as_str(), p.price)).collect();
    let dates: BTreeSet<&str> = dl.keys().chain(cg.keys()).copied().collect();

    dates
        .into_iter()
        .map(|date| {
            let a = dl.get(date).copied().filter(|p| *p > 0.0);
            let b = cg.get(date).copied().filter(|p| *p > 0.0);
            let diff_pct = match (a, b) {
                (Some(a), Some(b)) => Some((a - b).abs() / a * 100.0),
                _ => None,
            };
            PriceComparison {
                date: date.to_string(),
                defillama: a,
                coingecko: b,
                diff_pct,
            }
        })
        .collect()
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn prices(server: &MockServer) -> ExternalPrices {
        ExternalPrices::new(Client::new(), server.uri(), server.uri())
            .with_rate_limit_wait(Duration::from_millis(1))
    }

    #[test]
    fn test_id_resolution() {
        assert_eq!(
            resolve_defillama_id("stETH"),
            "ethereum:0xae7ab96520de3a18e5e111b5eaab095312d7fe84"
        );
        assert_eq!(resolve_defillama_id("0xABC"), "ethereum:0xabc");
        assert_eq!(resolve_defillama_id("ethereum:0xabc"), "ethereum:0xabc");
        assert_eq!(resolve_coingecko_id("WSTETH"), Some("wrapped-steth"));
        assert_eq!(resolve_coingecko_id("doge"), None);
    }

    #[test]
    fn test_utc_date() {
        assert_eq!(utc_date(1_755_715_200), "2025-08-20");
        assert_eq!(utc_date(1_755_734_399), "2025-08-20");
    }

    #[test]
    fn test_compare_sources() {
        let p = |date: &str, price: f64, source| PricePoint {
            date: date.to_string(),
            timestamp: 0,
            price,
            source,
        };
        let dl = vec![p("2025-08-01", 100.0, PriceSource::DefiLlama), p("2025-08-02", 200.0, PriceSource::DefiLlama)];
        let cg = vec![p("2025-08-02", 198.0, PriceSource::CoinGecko), p("2025-08-03", 50.0, PriceSource::CoinGecko)];

        let rows = compare_sources(&dl, &cg);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].diff_pct, None);
        assert!((rows[1].diff_pct.unwrap() - 1.0).abs() < 1e-9);
        assert_eq!(rows[2].defillama, None);
    }

    #[tokio::test]
    async fn test_contract_history_keeps_last_price_per_day() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/coins/ethereum/contract/0xabc/market_chart"))
            .and(query_param("vs_currency", "usd"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "prices": [
                    [1755715200000.0, 1.0],
                    [1755730000000.0, 1.5],
                    [1755801600000.0, 2.0]
                ]
            })))
            .mount(&server)
            .await;

        let by_date = prices(&server).coingecko_contract_history("0xABC", 2).await.unwrap();
        assert_eq!(by_date.len(), 2);
        assert_eq!(by_date["2025-08-20"], 1.5);
        assert_eq!(by_date["2025-08-21"], 2.0);
    }

    #[tokio::test]
    async fn test_rate_limit_retries_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/coins/ethereum/market_chart"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/coins/ethereum/market_chart"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "prices": [[1755715200000.0, 4300.0]]
            })))
            .mount(&server)
            .await;

        let points = prices(&server).coingecko_history("ethereum", 1).await.unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].source, PriceSource::CoinGecko);
        assert_eq!(points[0].price, 4300.0);
    }

    #[tokio::test]
    async fn test_defillama_history_and_current() {
        let server = MockServer::start().await;
        let id = "ethereum:0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2";
        Mock::given(method("GET"))
            .and(path(format!("/chart/{}", id)))
            .and(query_param("period", "1d"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "coins": { (id): { "prices": [ { "timestamp": 1755715200u64, "price": 4200.5 } ] } }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/prices/current/{}", id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "coins": { (id): { "price": 4210.0, "symbol": "WETH" } }
            })))
            .mount(&server)
            .await;

        let api = prices(&server);
        let history = api.defillama_history("weth", 7).await.unwrap();
        assert_eq!(history[0].date, "2025-08-20");

        let current = api.defillama_current(&["WETH"]).await.unwrap();
        assert_eq!(current["weth"], 4210.0);
    }
}
