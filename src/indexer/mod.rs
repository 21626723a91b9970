//! Indexer - every remote data source
//!
//! - `rest`: v1/v2 pools endpoints
//! - `graphql`: prices, deployments, swaps, token symbols
//! - `rpc`: block numbers/timestamps and ERC20 metadata
//! - `etherscan`: block-by-timestamp oracle
//! - `external`: CoinGecko / DeFiLlama price feeds
//! - `retry`: shared exponential backoff

pub mod etherscan;
pub mod external;
pub mod graphql;
pub mod rest;
pub mod retry;
pub mod rpc;
pub mod types;

use eyre::Result;

use crate::config::Config;
use etherscan::BlockOracle;
use external::ExternalPrices;
use graphql::GraphqlClient;
use rest::RestClient;
use rpc::ChainRpc;

/// All clients built from one config, sharing one HTTP connection pool
#[derive(Debug, Clone)]
pub struct Clients {
    pub rest: RestClient,
    pub graphql: GraphqlClient,
    pub rpc: ChainRpc,
    pub oracle: BlockOracle,
    pub external: ExternalPrices,
}

impl Clients {
    pub fn from_config(config: &Config) -> Result<Self> {
        let http = config.http_client()?;
        Ok(Self {
            rest: RestClient::from_config(config, http.clone()),
            graphql: GraphqlClient::from_config(config, http.clone()),
            rpc: ChainRpc::new(config.rpc_url.clone(), config.retry_policy()),
            oracle: BlockOracle::from_config(config, http.clone()),
            external: ExternalPrices::from_config(config, http),
        })
    }
}
