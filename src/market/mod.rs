// Market data is an external collaborator: the orchestrators only consume
// this contract and treat every failure as "no sample this round".
pub mod http;

pub use http::HttpMarketData;

use async_trait::async_trait;

use crate::models::{FreshnessContext, PoolDescriptor, PoolState, TokenMetadata};
use crate::Result;

/// Read-only view of the network needed by the core
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Value a base-token holding back in quote units
    async fn fetch_current_value(&self, pool: &PoolDescriptor, amount_in: f64) -> Result<f64>;

    /// Live reserves for the pool
    async fn fetch_pool_info(&self, pool: &PoolDescriptor) -> Result<PoolState>;

    /// Metadata for the pool's base token, consumed by the filter predicates
    async fn fetch_token_metadata(&self, pool: &PoolDescriptor) -> Result<TokenMetadata>;

    /// Blockhash-equivalent context, fetched fresh before every attempt
    async fn latest_freshness(&self) -> Result<FreshnessContext>;
}
