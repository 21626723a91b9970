//! Ethereum JSON-RPC access
//!
//! Block numbers, block timestamps, and ERC20 `symbol()`/`decimals()`.

use alloy_eips::BlockNumberOrTag;
use alloy_primitives::{Address, Bytes};
use alloy_provider::{Provider, ProviderBuilder};
use alloy_rpc_types::TransactionRequest;
use alloy_sol_types::{sol, SolCall};
use eyre::{eyre, Result};
use std::future::Future;
use std::str::FromStr;
use tracing::{debug, trace};

use super::retry::RetryPolicy;

sol! {
    interface IERC20Metadata {
        function symbol() external view returns (string);
        function decimals() external view returns (uint8);
    }
}

/// Largest decimals value we accept from a token contract
const MAX_DECIMALS: u8 = 77;

/// On-chain metadata of an ERC20 token
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenMetadata {
    pub symbol: Option<String>,
    pub decimals: Option<u8>,
}

#[derive(Debug, Clone)]
pub struct ChainRpc {
    rpc_url: String,
    retry: RetryPolicy,
}

impl ChainRpc {
    pub fn new(rpc_url: String, retry: RetryPolicy) -> Self {
        Self { rpc_url, retry }
    }

    fn provider(&self) -> Result<impl Provider> {
        Ok(ProviderBuilder::new().connect_http(self.rpc_url.parse()?))
    }

    /// Latest block number
    pub async fn head_block(&self) -> Result<u64> {
        let provider = self.provider()?;
        self.retry
            .run("eth_blockNumber", || {
                let provider = &provider;
                async move {
                    provider
                        .get_block_number()
                        .await
                        .map_err(|e| eyre!("eth_blockNumber failed: {}", e))
                }
            })
            .await
    }

    /// Timestamp of block `number`
    pub async fn block_timestamp(&self, number: u64) -> Result<u64> {
        let provider = self.provider()?;
        let block = self
            .retry
            .run("eth_getBlockByNumber", || {
                let provider = &provider;
                async move {
                    provider
                        .get_block_by_number(BlockNumberOrTag::Number(number))
                        .await
                        .map_err(|e| eyre!("eth_getBlockByNumber failed: {}", e))
                }
            })
            .await?
            .ok_or_else(|| eyre!("eth_getBlockByNumber returned null for {}", number))?;

        Ok(block.header.inner.timestamp)
    }

    /// First block whose timestamp is >= `ts` (head when none is)
    pub async fn block_at_or_after_timestamp(&self, ts: u64) -> Result<u64> {
        let head = self.head_block().await?;
        let block = first_block_at_or_after(head, ts, |n| self.block_timestamp(n)).await?;
        debug!("🔎 block {} is first at/after ts {}", block, ts);
        Ok(block)
    }

    async fn eth_call(&self, to: Address, data: Vec<u8>) -> Result<Bytes> {
        let provider = self.provider()?;
        let tx = TransactionRequest::default().to(to).input(data.into());
        provider
            .call(tx)
            .await
            .map_err(|e| eyre!("eth_call to {} failed: {}", to, e))
    }

    /// `symbol()` and `decimals()` of a token; either may be missing
    pub async fn token_metadata(&self, address: &str) -> Result<TokenMetadata> {
        let token = Address::from_str(address.trim())
            .map_err(|e| eyre!("Invalid token address {}: {}", address, e))?;

        let symbol = match self
            .eth_call(token, IERC20Metadata::symbolCall {}.abi_encode())
            .await
        {
            Ok(bytes) => decode_symbol(&bytes),
            Err(e) => {
                trace!("symbol() failed for {}: {}", address, e);
                None
            }
        };

        let decimals = match self
            .eth_call(token, IERC20Metadata::decimalsCall {}.abi_encode())
            .await
        {
            Ok(bytes) => IERC20Metadata::decimalsCall::abi_decode_returns(&bytes)
                .ok()
                .and_then(validate_decimals),
            Err(e) => {
                trace!("decimals() failed for {}: {}", address, e);
                None
            }
        };

        Ok(TokenMetadata { symbol, decimals })
    }
}

/// ABI `string`, or a NUL-padded `bytes32` for older tokens (MKR style)
pub fn decode_symbol(bytes: &[u8]) -> Option<String> {
    if bytes.is_empty() {
        return None;
    }
    if let Ok(symbol) = IERC20Metadata::symbolCall::abi_decode_returns(bytes) {
        let symbol = symbol.trim().to_string();
        return (!symbol.is_empty()).then_some(symbol);
    }
    if bytes.len() == 32 {
        let trimmed: Vec<u8> = bytes.iter().copied().take_while(|b| *b != 0).collect();
        let symbol = String::from_utf8(trimmed).ok()?.trim().to_string();
        return (!symbol.is_empty()).then_some(symbol);
    }
    None
}

pub fn validate_decimals(decimals: u8) -> Option<u8> {
    (decimals > 0 && decimals <= MAX_DECIMALS).then_some(decimals)
}

/// Binary search over `[0, head]` for the first block with timestamp >= `ts`
pub async fn first_block_at_or_after<F, Fut>(head: u64, ts: u64, mut timestamp_of: F) -> Result<u64>
where
    F: FnMut(u64) -> Fut,
    Fut: Future<Output = Result<u64>>,
{
    let mut left: u64 = 0;
    let mut right: u64 = head;
    let mut result = head;

    while left <= right {
        let mid = left + (right - left) / 2;
        if timestamp_of(mid).await? >= ts {
            result = mid;
            if mid == 0 {
                break;
            }
            right = mid - 1;
        } else {
            left = mid + 1;
        }
    }

    Ok(result)
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_block_at_or_after() {
        // genesis at t=1000, 12s blocks
        let ts_of = |n: u64| async move { Ok::<u64, eyre::Report>(1000 + n * 12) };

        assert_eq!(first_block_at_or_after(100, 1000, ts_of).await.unwrap(), 0);
        assert_eq!(first_block_at_or_after(100, 1012, ts_of).await.unwrap(), 1);
        assert_eq!(first_block_at_or_after(100, 1013, ts_of).await.unwrap(), 2);
        assert_eq!(first_block_at_or_after(100, 1600, ts_of).await.unwrap(), 50);
        // nothing qualifies: head
        assert_eq!(first_block_at_or_after(100, 99_999, ts_of).await.unwrap(), 100);
    }

    #[tokio::test]
    async fn test_first_block_propagates_errors() {
        let result = first_block_at_or_after(10, 5, |_| async { Err::<u64, _>(eyre!("rpc down")) }).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_symbol_string_and_bytes32() {
        // offset, length, padded data
        let mut encoded = vec![0u8; 96];
        encoded[31] = 0x20;
        encoded[63] = 4;
        encoded[64..68].copy_from_slice(b"USDC");
        assert_eq!(decode_symbol(&encoded), Some("USDC".to_string()));

        let mut bytes32 = [0u8; 32];
        bytes32[..3].copy_from_slice(b"MKR");
        assert_eq!(decode_symbol(&bytes32), Some("MKR".to_string()));

        assert_eq!(decode_symbol(&[]), None);
    }

    #[test]
    fn test_validate_decimals() {
        assert_eq!(validate_decimals(6), Some(6));
        assert_eq!(validate_decimals(18), Some(18));
        assert_eq!(validate_decimals(0), None);
        assert_eq!(validate_decimals(78), None);
    }
}
