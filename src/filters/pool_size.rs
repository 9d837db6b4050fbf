use std::sync::Arc;

use async_trait::async_trait;

use super::{FilterOutcome, PoolFilter};
use crate::market::MarketDataProvider;
use crate::models::PoolDescriptor;

/// Rejects pools whose quote-side reserve falls outside the configured
/// bounds; a zero bound disables that side of the check
pub struct PoolSizeFilter {
    market: Arc<dyn MarketDataProvider>,
    min_pool_size: f64,
    max_pool_size: f64,
}

impl PoolSizeFilter {
    pub fn new(market: Arc<dyn MarketDataProvider>, min_pool_size: f64, max_pool_size: f64) -> Self {
        Self {
            market,
            min_pool_size,
            max_pool_size,
        }
    }
}

#[async_trait]
impl PoolFilter for PoolSizeFilter {
    fn name(&self) -> &str {
        "pool-size"
    }

    async fn check(&self, pool: &PoolDescriptor) -> FilterOutcome {
        let state = match self.market.fetch_pool_info(pool).await {
            Ok(state) => state,
            Err(e) => return FilterOutcome::fail(format!("failed to fetch pool state: {}", e)),
        };

        if self.max_pool_size > 0.0 && state.quote_reserve > self.max_pool_size {
            return FilterOutcome::fail(format!(
                "pool size {} is above the {} maximum",
                state.quote_reserve, self.max_pool_size
            ));
        }

        if self.min_pool_size > 0.0 && state.quote_reserve < self.min_pool_size {
            return FilterOutcome::fail(format!(
                "pool size {} is below the {} minimum",
                state.quote_reserve, self.min_pool_size
            ));
        }

        FilterOutcome::pass()
    }
}
