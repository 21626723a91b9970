//! Wire types for the Euler index
//!
//! The REST endpoints serialize big integers inconsistently: decimal
//! strings most of the time, bare JSON numbers sometimes, `null` for empty
//! vaults. Every numeric field goes through one of the helpers below:
//! missing and `null` values take the field default, anything present but
//! unparseable fails that entry, and the pool list skips it with a warning.

use alloy_primitives::U256;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeMap;

// ============================================
// SCALES
// ============================================

/// USD values in the v2 API are fixed-point with 8 decimals
pub const USD_SCALE: f64 = 1e8;

/// APR values and fee rates are fixed-point with 18 decimals
pub const WAD: f64 = 1e18;

/// Pool fee used when the index cannot tell us (1 bp)
pub const DEFAULT_FEE_RATE: f64 = 0.0001;

pub fn apr_to_percent(raw: f64) -> f64 {
    raw / WAD * 100.0
}

pub fn usd_from_e8(raw: f64) -> f64 {
    raw / USD_SCALE
}

pub fn fee_to_fraction(raw: f64) -> f64 {
    raw / WAD
}

// ============================================
// POOL SNAPSHOTS (REST v1 / v2)
// ============================================

/// One pool as returned by `/v1/swap/pools` or `/v2/swap/pools`.
/// v1 fills the per-vault `accountNav`, v2 adds the top-level fields.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolSnapshot {
    pub pool: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default, deserialize_with = "de_opt_u64")]
    pub block_number: Option<u64>,
    #[serde(default, deserialize_with = "de_opt_u64")]
    pub block_timestamp: Option<u64>,
    #[serde(default, deserialize_with = "de_opt_u64")]
    pub created_at: Option<u64>,
    #[serde(default)]
    pub vault0: VaultSnapshot,
    #[serde(default)]
    pub vault1: VaultSnapshot,

    // ----- v2 only -----
    #[serde(default)]
    pub account_nav: Option<AccountNav>,
    #[serde(default)]
    pub apr: WindowedTotals,
    #[serde(default, rename = "swapFeesAPR")]
    pub swap_fees_apr: WindowedTotals,
    #[serde(default)]
    pub interest_apr: WindowedTotals,
    #[serde(default)]
    pub fees: WindowedTotals,
    #[serde(default)]
    pub volume: WindowedTotals,
    #[serde(default)]
    pub interest_earned: WindowedTotals,
    #[serde(default)]
    pub interest_paid: WindowedTotals,
    #[serde(default, deserialize_with = "de_f64")]
    pub fee: f64,
    #[serde(default, deserialize_with = "de_f64")]
    pub price: f64,
    #[serde(default, deserialize_with = "de_f64")]
    pub available_liquidity: f64,
}

impl PoolSnapshot {
    pub fn matches(&self, pool: &str) -> bool {
        self.pool.eq_ignore_ascii_case(pool.trim())
    }

    pub fn is_owned_by(&self, account: &str) -> bool {
        self.account
            .as_deref()
            .map(|a| a.eq_ignore_ascii_case(account.trim()))
            .unwrap_or(false)
    }

    /// Age in days at the snapshot's block
    pub fn age_days(&self) -> Option<f64> {
        let created = self.created_at?;
        let now = self.block_timestamp?;
        if now < created {
            return None;
        }
        Some((now - created) as f64 / 86_400.0)
    }

    /// Reported account NAV in USD (v2)
    pub fn nav_usd(&self) -> f64 {
        self.account_nav
            .as_ref()
            .map(|n| usd_from_e8(n.nav as f64))
            .unwrap_or(0.0)
    }

    /// Net interest (earned - paid) over 30 days in USD
    pub fn net_interest_30d(&self) -> f64 {
        usd_from_e8(self.interest_earned.total30d) - usd_from_e8(self.interest_paid.total30d)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultSnapshot {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub asset: String,
    #[serde(default = "default_decimals", deserialize_with = "de_u8")]
    pub decimals: u8,
    #[serde(default, deserialize_with = "de_u256")]
    pub reserves: U256,
    #[serde(default)]
    pub account_nav: Option<VaultNav>,
}

impl Default for VaultSnapshot {
    fn default() -> Self {
        Self {
            address: None,
            asset: String::new(),
            decimals: default_decimals(),
            reserves: U256::ZERO,
            account_nav: None,
        }
    }
}

/// Supplied vs borrowed for the pool's account in one vault (raw units)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VaultNav {
    #[serde(default, deserialize_with = "de_u256")]
    pub assets: U256,
    #[serde(default, deserialize_with = "de_u256")]
    pub borrowed: U256,
}

/// Pre-computed NAV for the pool's Euler account (USD × 1e8)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountNav {
    #[serde(default, deserialize_with = "de_i128")]
    pub nav: i128,
    #[serde(default, deserialize_with = "de_i128")]
    pub total_assets: i128,
    #[serde(default, deserialize_with = "de_i128")]
    pub total_borrowed: i128,
    #[serde(default)]
    pub breakdown: BTreeMap<String, BreakdownEntry>,
}

impl AccountNav {
    pub fn nav_usd(&self) -> f64 {
        usd_from_e8(self.nav as f64)
    }

    pub fn total_assets_usd(&self) -> f64 {
        usd_from_e8(self.total_assets as f64)
    }

    pub fn total_borrowed_usd(&self) -> f64 {
        usd_from_e8(self.total_borrowed as f64)
    }
}

/// One vault inside `accountNav.breakdown`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BreakdownEntry {
    #[serde(default)]
    pub asset: String,
    #[serde(default, deserialize_with = "de_u256")]
    pub shares: U256,
    #[serde(default, deserialize_with = "de_u256")]
    pub assets: U256,
    #[serde(default, deserialize_with = "de_u256")]
    pub borrowed: U256,
    /// USD price × 1e8
    #[serde(default, deserialize_with = "de_f64")]
    pub price: f64,
}

/// Lifetime and rolling-window totals. Units depend on the field: APRs are
/// 1e18 fractions, USD amounts are 1e8.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct WindowedTotals {
    #[serde(default, deserialize_with = "de_f64")]
    pub total: f64,
    #[serde(default, deserialize_with = "de_f64")]
    pub total1d: f64,
    #[serde(default, deserialize_with = "de_f64")]
    pub total7d: f64,
    #[serde(default, deserialize_with = "de_f64")]
    pub total30d: f64,
    #[serde(default, deserialize_with = "de_f64")]
    pub total180d: f64,
}

/// The pools endpoint answers with a bare list, `{ "data": [...] }`, or
/// occasionally a single object.
pub fn normalize_pool_list(body: Value) -> eyre::Result<Vec<PoolSnapshot>> {
    let items = match body {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(items)) => items,
            Some(other) => vec![other],
            None => vec![Value::Object(map)],
        },
        Value::Null => vec![],
        other => return Err(eyre::eyre!("Unexpected pools response: {}", other)),
    };

    let mut pools = Vec::with_capacity(items.len());
    for item in items {
        match serde_json::from_value::<PoolSnapshot>(item) {
            Ok(pool) => pools.push(pool),
            Err(e) => tracing::warn!("⚠️ Skipping malformed pool entry: {}", e),
        }
    }
    Ok(pools)
}

// ============================================
// GRAPHQL ENTITIES
// ============================================

#[derive(Debug, Clone, Default, Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolDeployment {
    pub pool: String,
    #[serde(default, deserialize_with = "de_opt_u64")]
    pub created_at: Option<u64>,
    #[serde(default)]
    pub euler_account: Option<String>,
    #[serde(default)]
    pub asset0: Option<String>,
    #[serde(default)]
    pub asset1: Option<String>,
    #[serde(default, deserialize_with = "de_opt_u64")]
    pub asset0_decimals: Option<u64>,
    #[serde(default, deserialize_with = "de_opt_u64")]
    pub asset1_decimals: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolConfig {
    #[serde(default, deserialize_with = "de_f64")]
    pub fee: f64,
    #[serde(default, deserialize_with = "de_f64")]
    pub protocol_fee: f64,
    #[serde(default)]
    pub protocol_fee_recipient: Option<String>,
    #[serde(default)]
    pub vault0: Option<String>,
    #[serde(default)]
    pub vault1: Option<String>,
    #[serde(default)]
    pub euler_account: Option<String>,
    #[serde(default, deserialize_with = "de_u256")]
    pub curr_reserve0: U256,
    #[serde(default, deserialize_with = "de_u256")]
    pub curr_reserve1: U256,
}

impl PoolConfig {
    pub fn fee_fraction(&self) -> f64 {
        fee_to_fraction(self.fee)
    }

    pub fn fee_bps(&self) -> f64 {
        self.fee_fraction() * 10_000.0
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapEvent {
    #[serde(default, deserialize_with = "de_u64")]
    pub block_number: u64,
    #[serde(default, deserialize_with = "de_u64")]
    pub timestamp: u64,
    #[serde(default, rename = "amount0In", deserialize_with = "de_u256")]
    pub amount0_in: U256,
    #[serde(default, rename = "amount1In", deserialize_with = "de_u256")]
    pub amount1_in: U256,
    #[serde(default, rename = "amount0Out", deserialize_with = "de_u256")]
    pub amount0_out: U256,
    #[serde(default, rename = "amount1Out", deserialize_with = "de_u256")]
    pub amount1_out: U256,
    #[serde(default, deserialize_with = "de_u256")]
    pub reserve0: U256,
    #[serde(default, deserialize_with = "de_u256")]
    pub reserve1: U256,
    #[serde(default, deserialize_with = "de_u256")]
    pub fee0: U256,
    #[serde(default, deserialize_with = "de_u256")]
    pub fee1: U256,
}

/// Cursor pagination block shared by the list queries
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    #[serde(default)]
    pub has_next_page: bool,
    #[serde(default)]
    pub end_cursor: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    #[serde(default)]
    pub page_info: PageInfo,
}

// ============================================
// LENIENT NUMBER DESERIALIZERS
// ============================================

fn default_decimals() -> u8 {
    18
}

/// `Ok(None)` for null and empty strings, `Err` for arrays and objects
fn value_to_string(v: &Value) -> Result<Option<String>, String> {
    match v {
        Value::Null => Ok(None),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                Ok(None)
            } else {
                Ok(Some(s.to_string()))
            }
        }
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(if *b { "1".to_string() } else { "0".to_string() })),
        other => Err(format!("expected a number, got {}", other)),
    }
}

pub fn parse_u256(s: &str) -> Option<U256> {
    let s = s.trim();
    if let Ok(v) = s.parse::<U256>() {
        return Some(v);
    }
    // "1.5e21" or "123.0" style numbers
    let f: f64 = s.parse().ok()?;
    if !f.is_finite() || f < 0.0 {
        return None;
    }
    format!("{:.0}", f.trunc()).parse::<U256>().ok()
}

pub fn parse_i128(s: &str) -> Option<i128> {
    let s = s.trim();
    if let Ok(v) = s.parse::<i128>() {
        return Some(v);
    }
    let f: f64 = s.parse().ok()?;
    f.is_finite().then(|| f.trunc() as i128)
}

fn parse_u64(s: &str) -> Option<u64> {
    if let Some(hex) = s.strip_prefix("0x") {
        return u64::from_str_radix(hex, 16).ok();
    }
    s.parse::<u64>().ok().or_else(|| {
        s.parse::<f64>()
            .ok()
            .filter(|f| f.is_finite() && *f >= 0.0)
            .map(|f| f as u64)
    })
}

/// Absent value → `None`; present but unparseable → error naming `what`
fn parse_present<'de, D, T>(d: D, what: &str, parse: impl Fn(&str) -> Option<T>) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(d)?;
    match value_to_string(&v).map_err(D::Error::custom)? {
        None => Ok(None),
        Some(s) => parse(&s)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("invalid {}: {:?}", what, s))),
    }
}

fn de_u256<'de, D: Deserializer<'de>>(d: D) -> Result<U256, D::Error> {
    Ok(parse_present(d, "uint256", parse_u256)?.unwrap_or(U256::ZERO))
}

fn de_i128<'de, D: Deserializer<'de>>(d: D) -> Result<i128, D::Error> {
    Ok(parse_present(d, "int", parse_i128)?.unwrap_or(0))
}

fn de_f64<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    Ok(parse_present(d, "number", |s| s.parse::<f64>().ok())?.unwrap_or(0.0))
}

fn de_opt_u64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
    parse_present(d, "u64", parse_u64)
}

fn de_u64<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    de_opt_u64(d).map(|v| v.unwrap_or(0))
}

fn de_u8<'de, D: Deserializer<'de>>(d: D) -> Result<u8, D::Error> {
    Ok(parse_present(d, "decimals", |s| s.parse::<u8>().ok())?.unwrap_or_else(default_decimals))
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn v1_pool() -> Value {
        json!({
            "pool": "0xAbC0000000000000000000000000000000000001",
            "active": true,
            "blockNumber": "23000000",
            "blockTimestamp": 1754000000,
            "vault0": {
                "asset": "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48",
                "decimals": 6,
                "reserves": "1000000000",
                "accountNav": { "assets": "2500000000", "borrowed": "0" }
            },
            "vault1": {
                "asset": "0xdac17f958d2ee523a2206206994597c13d831ec7",
                "decimals": "6",
                "reserves": 500000000,
                "accountNav": { "assets": null, "borrowed": "1000000000" }
            }
        })
    }

    #[test]
    fn test_v1_snapshot_lenient_numbers() {
        let pool: PoolSnapshot = serde_json::from_value(v1_pool()).unwrap();
        assert!(pool.active);
        assert_eq!(pool.block_number, Some(23_000_000));
        assert_eq!(pool.block_timestamp, Some(1_754_000_000));
        assert_eq!(pool.vault0.decimals, 6);
        assert_eq!(pool.vault1.decimals, 6);
        assert_eq!(pool.vault1.reserves, U256::from(500_000_000u64));

        let nav1 = pool.vault1.account_nav.unwrap();
        assert_eq!(nav1.assets, U256::ZERO);
        assert_eq!(nav1.borrowed, U256::from(1_000_000_000u64));
    }

    #[test]
    fn test_v2_snapshot_fields() {
        let pool: PoolSnapshot = serde_json::from_value(json!({
            "pool": "0x01",
            "account": "0xBEEF",
            "createdAt": "1750000000",
            "blockTimestamp": "1751728000",
            "accountNav": {
                "nav": "-12345678900",
                "totalAssets": "500000000000",
                "totalBorrowed": "512345678900",
                "breakdown": {
                    "0xvault": { "asset": "0xa0b8", "shares": "10", "assets": "11", "borrowed": "0", "price": "100000000" }
                }
            },
            "apr": { "total1d": "798049266657973740", "total180d": "50000000000000000" },
            "volume": { "total30d": "250000000000" },
            "interestEarned": { "total30d": "300000000" },
            "interestPaid": { "total30d": "100000000" },
            "swapFeesAPR": { "total1d": "1000000000000000" }
        }))
        .unwrap();

        assert!(pool.is_owned_by("0xbeef"));
        assert_eq!(pool.age_days(), Some(20.0));
        assert!((pool.nav_usd() + 123.456789).abs() < 1e-9);
        assert!((apr_to_percent(pool.apr.total1d) - 79.8049266657973740).abs() < 1e-9);
        assert!((apr_to_percent(pool.apr.total180d) - 5.0).abs() < 1e-12);
        assert!((usd_from_e8(pool.volume.total30d) - 2500.0).abs() < 1e-9);
        assert!((pool.net_interest_30d() - 2.0).abs() < 1e-9);
        assert_eq!(pool.vault0.decimals, 18);

        let nav = pool.account_nav.unwrap();
        assert_eq!(nav.breakdown.len(), 1);
        assert_eq!(nav.breakdown["0xvault"].assets, U256::from(11u64));
        assert!((nav.breakdown["0xvault"].price - 1e8).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_pool_list_shapes() {
        let bare = normalize_pool_list(json!([v1_pool()])).unwrap();
        assert_eq!(bare.len(), 1);

        let wrapped = normalize_pool_list(json!({ "data": [v1_pool(), v1_pool()] })).unwrap();
        assert_eq!(wrapped.len(), 2);

        let single = normalize_pool_list(v1_pool()).unwrap();
        assert_eq!(single.len(), 1);
        assert!(single[0].matches("0xabc0000000000000000000000000000000000001"));

        assert!(normalize_pool_list(json!("nope")).is_err());
    }

    #[test]
    fn test_fee_units() {
        let cfg: PoolConfig = serde_json::from_value(json!({ "fee": "50000000000000" })).unwrap();
        assert!((cfg.fee_fraction() - 0.00005).abs() < 1e-15);
        assert!((cfg.fee_bps() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_parse_helpers() {
        assert_eq!(parse_u256("1e21"), Some(U256::from(10u128.pow(21))));
        assert_eq!(parse_u256("-1"), None);
        assert_eq!(parse_i128("-42"), Some(-42));
        assert_eq!(parse_i128("12.9"), Some(12));
    }

    #[test]
    fn test_garbage_numbers_reject_the_entry() {
        let mut bad = v1_pool();
        bad["vault0"]["accountNav"]["assets"] = json!("12abc000000");
        assert!(serde_json::from_value::<PoolSnapshot>(bad.clone()).is_err());

        let mut bad_decimals = v1_pool();
        bad_decimals["vault1"]["decimals"] = json!("eighteen");
        assert!(serde_json::from_value::<PoolSnapshot>(bad_decimals.clone()).is_err());

        let pools = normalize_pool_list(json!([bad, bad_decimals, v1_pool()])).unwrap();
        assert_eq!(pools.len(), 1);
        assert_eq!(pools[0].vault0.decimals, 6);

        // null and empty strings still mean "not set"
        let mut empty = v1_pool();
        empty["vault0"]["reserves"] = json!("");
        empty["vault1"]["decimals"] = Value::Null;
        let pool: PoolSnapshot = serde_json::from_value(empty).unwrap();
        assert_eq!(pool.vault0.reserves, U256::ZERO);
        assert_eq!(pool.vault1.decimals, 18);
    }

    #[test]
    fn test_swap_event() {
        let swap: SwapEvent = serde_json::from_value(json!({
            "blockNumber": "100",
            "timestamp": "1755000000",
            "amount0In": "1000000",
            "amount1Out": "999000"
        }))
        .unwrap();
        assert_eq!(swap.block_number, 100);
        assert_eq!(swap.amount0_in, U256::from(1_000_000u64));
        assert_eq!(swap.amount1_in, U256::ZERO);
    }
}
