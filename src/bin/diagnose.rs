//! Diagnostic tool - Check configuration
//!
//! Run with: cargo run --bin diagnose

use std::env;

/// (key, default, description)
const CHECKS: &[(&str, &str, &str)] = &[
    ("REST_API_V1", "https://index-dev.eul.dev/v1/swap/pools", "REST pools endpoint (v1)"),
    ("REST_API_V2", "https://index-dev.eul.dev/v2/swap/pools", "REST pools endpoint (v2, accountNav + APR)"),
    ("GRAPHQL_URL", "https://index-dev.euler.finance/graphql", "GraphQL endpoint (prices, deployments, swaps)"),
    ("RPC_URL", "https://ethereum.publicnode.com", "Ethereum JSON-RPC node"),
    ("CHAIN_ID", "1", "Chain id"),
    ("PRICE_SOURCE", "oracle", "Oracle price source name"),
    ("ETHERSCAN_API_URL", "https://api.etherscan.io/api", "Etherscan API"),
    ("COINGECKO_API_URL", "https://api.coingecko.com/api/v3", "CoinGecko API"),
    ("DEFILLAMA_API_URL", "https://coins.llama.fi", "DeFiLlama API"),
    ("POOL_CACHE_PATH", "pool_creation_blocks.csv", "Pool creation block cache"),
    ("TOKEN_CACHE_PATH", "token_metadata.csv", "Token metadata cache"),
    ("DATA_DIR", "data", "Output directory"),
    ("HTTP_TIMEOUT_SECS", "30", "HTTP timeout"),
    ("MAX_RETRIES", "10", "Attempts per request"),
    ("INITIAL_RETRY_DELAY_SECS", "1", "First backoff delay"),
    ("MAX_RETRY_DELAY_SECS", "30", "Backoff cap"),
    ("DASHBOARD_PORT", "5001", "Dashboard port"),
    ("DASHBOARD_CACHE_TTL_SECS", "60", "Dashboard cache TTL"),
    ("DASHBOARD_MAX_POOLS", "100", "Pools shown in the dashboard"),
];

fn shorten(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() > 60 {
        let head: String = chars[..40].iter().collect();
        let tail: String = chars[chars.len() - 15..].iter().collect();
        format!("{}...{}", head, tail)
    } else {
        value.to_string()
    }
}

fn main() {
    println!("🔍 NETNAV DIAGNOSTIC CHECK\n");

    // Load .env
    let dotenv = dotenvy::dotenv();

    println!("═══════════════════════════════════════════════════");
    println!("                  CONFIGURATION                     ");
    println!("═══════════════════════════════════════════════════\n");

    match dotenv {
        Ok(path) => println!("  .env loaded from {}\n", path.display()),
        Err(_) => println!("  No .env file found, using process environment\n"),
    }

    let mut overridden = 0;
    for (key, default, desc) in CHECKS {
        let (value, marker) = match env::var(key) {
            Ok(v) => {
                overridden += 1;
                (v, "(from env)")
            }
            Err(_) => (default.to_string(), "(default)"),
        };
        println!("  {}: {} {}", key, shorten(&value), marker);
        println!("    └─ {}\n", desc);
    }

    println!("═══════════════════════════════════════════════════");
    println!("                    API KEYS                        ");
    println!("═══════════════════════════════════════════════════\n");

    let etherscan = env::var("ETHERSCAN_API_KEY")
        .map(|k| !k.trim().is_empty())
        .unwrap_or(false);
    println!(
        "  ETHERSCAN_API_KEY: {}",
        if etherscan { "✅ Set" } else { "❌ Not set" }
    );
    if !etherscan {
        println!("     → Creation blocks are estimated from timestamps (~12s blocks)");
    }

    println!(
        "\n  {} of {} settings overridden",
        overridden,
        CHECKS.len()
    );
    println!("\n✅ Diagnostic complete!\n");
}
