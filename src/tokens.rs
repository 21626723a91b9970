//! Well-known mainnet tokens
//!
//! Used before any RPC or cache lookup so the common assets never cost a
//! network round trip, and as the source of truth for decimals that some
//! indexers report wrong.

use alloy_primitives::{Address, U256};
use std::collections::HashMap;
use std::str::FromStr;

/// A token whose metadata is known ahead of time
#[derive(Debug, Clone)]
pub struct KnownToken {
    pub symbol: &'static str,
    pub address: Address,
    pub decimals: u8,
}

// ============================================
// KNOWN TOKENS
// ============================================

const KNOWN: &[(&str, &str, u8)] = &[
    ("USDC", "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48", 6),
    ("USDT", "0xdAC17F958D2ee523a2206206994597C13D831ec7", 6),
    ("WETH", "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2", 18),
    ("DAI", "0x6B175474E89094C44Da98b954EedcdeCB5BE3830", 18),
    ("WBTC", "0x2260FAC5E5542a773Aa44fBCfeDf7C193bc2C599", 8),
    ("PYUSD", "0x6c3ea9036406852006290770BEdFcAbA0e23A0e8", 6),
    ("RLUSD", "0xc139190F447e929f090Edeb554D95AbB8b18aC1C", 18),
    ("USR", "0x66a1E37c9b0eAddca17d3662D6c05F4DECf3e110", 18),
    ("USDe", "0x4c9EDD5852cd905f086C759E8383e09bff1E68B3", 18),
    ("stETH", "0xae7ab96520DE3A18E5e111B5EaAb095312D7fE84", 18),
    ("wstETH", "0x7f39C581F595B53c5cb19bD0b3f8dA6c935E2Ca0", 18),
];

lazy_static::lazy_static! {
    static ref BY_ADDRESS: HashMap<Address, KnownToken> = KNOWN
        .iter()
        .filter_map(|(symbol, addr, decimals)| {
            Address::from_str(addr).ok().map(|address| {
                (address, KnownToken { symbol: *symbol, address, decimals: *decimals })
            })
        })
        .collect();
}

/// Look up a token by address string (any case)
pub fn lookup(address: &str) -> Option<&'static KnownToken> {
    let addr = Address::from_str(address.trim()).ok()?;
    BY_ADDRESS.get(&addr)
}

/// Look up a token by symbol (case-insensitive)
pub fn lookup_symbol(symbol: &str) -> Option<&'static KnownToken> {
    BY_ADDRESS
        .values()
        .find(|t| t.symbol.eq_ignore_ascii_case(symbol))
}

pub fn known_symbol(address: &str) -> Option<&'static str> {
    lookup(address).map(|t| t.symbol)
}

pub fn known_decimals(address: &str) -> Option<u8> {
    lookup(address).map(|t| t.decimals)
}

/// Fallback label for tokens we cannot resolve: `0x` + first four hex
/// digits, uppercased (`0xA0B8`)
pub fn short_address(address: &str) -> String {
    let hex: String = address
        .trim()
        .trim_start_matches("0x")
        .trim_start_matches("0X")
        .chars()
        .take(4)
        .collect();
    format!("0x{}", hex.to_uppercase())
}

/// `0xa0b869…eb48` style abbreviation for tables
pub fn abbreviate(address: &str) -> String {
    if address.len() <= 14 {
        return address.to_string();
    }
    format!("{}…{}", &address[..8], &address[address.len() - 4..])
}

/// Raw integer amount → human units
pub fn format_units(raw: U256, decimals: u8) -> f64 {
    u256_to_f64(raw) / 10f64.powi(decimals as i32)
}

/// Lossy U256 → f64 (amounts here are far below f64's range)
pub fn u256_to_f64(value: U256) -> f64 {
    value.to_string().parse::<f64>().unwrap_or(0.0)
}

/// Native ETH placeholders used by some indexers
pub fn is_native_eth(address: &str) -> bool {
    let lower = address.to_lowercase();
    lower == "0x0000000000000000000000000000000000000000"
        || lower == "0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee"
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_token_lookup_is_case_insensitive() {
        assert_eq!(known_symbol("0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"), Some("USDC"));
        assert_eq!(known_symbol("0xA0B86991C6218B36C1D19D4A2E9EB0CE3606EB48"), Some("USDC"));
        assert_eq!(known_decimals("0x2260fac5e5542a773aa44fbcfedf7c193bc2c599"), Some(8));
        assert_eq!(known_decimals("0xdac17f958d2ee523a2206206994597c13d831ec7"), Some(6));
        assert_eq!(known_symbol("0x0000000000000000000000000000000000000001"), None);
    }

    #[test]
    fn test_lookup_symbol() {
        let weth = lookup_symbol("weth").unwrap();
        assert_eq!(weth.decimals, 18);
        assert!(lookup_symbol("NOPE").is_none());
    }

    #[test]
    fn test_short_address() {
        assert_eq!(short_address("0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"), "0xA0B8");
    }

    #[test]
    fn test_abbreviate() {
        assert_eq!(
            abbreviate("0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"),
            "0xa0b869…eb48"
        );
        assert_eq!(abbreviate("0x1234"), "0x1234");
    }

    #[test]
    fn test_format_units() {
        let raw = U256::from(1_500_000u64);
        assert!((format_units(raw, 6) - 1.5).abs() < 1e-12);
        let wei = U256::from(2_000_000_000_000_000_000u128);
        assert!((format_units(wei, 18) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_native_eth() {
        assert!(is_native_eth("0xEeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE"));
        assert!(!is_native_eth("0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"));
    }
}
