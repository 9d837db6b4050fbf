// Pool filtering: independent predicates plus the consecutive-match
// acceptance loop that rejects transient false positives.
pub mod deny_list;
pub mod metadata;
pub mod pool_size;

pub use deny_list::DenyListFilter;
pub use metadata::MutableSocialsFilter;
pub use pool_size::PoolSizeFilter;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::{sleep, Duration};

use crate::config::BotConfig;
use crate::market::MarketDataProvider;
use crate::models::PoolDescriptor;

/// Result of one predicate evaluation
#[derive(Debug, Clone)]
pub struct FilterOutcome {
    pub ok: bool,
    pub message: Option<String>,
}

impl FilterOutcome {
    pub fn pass() -> Self {
        Self {
            ok: true,
            message: None,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: Some(message.into()),
        }
    }
}

/// One independent acceptance check against a pool
///
/// Predicates are agnostic to each other; a failed or erroring check is
/// just a negative sample, never an escalated error.
#[async_trait]
pub trait PoolFilter: Send + Sync {
    fn name(&self) -> &str;

    async fn check(&self, pool: &PoolDescriptor) -> FilterOutcome;
}

/// The registered predicate set; all must pass for a positive sample
pub struct PoolFilters {
    filters: Vec<Box<dyn PoolFilter>>,
}

impl PoolFilters {
    pub fn new(filters: Vec<Box<dyn PoolFilter>>) -> Self {
        Self { filters }
    }

    /// Standard predicate set for a config + market-data pair
    pub fn from_config(config: &BotConfig, market: Arc<dyn MarketDataProvider>) -> Self {
        let mut filters: Vec<Box<dyn PoolFilter>> = Vec::new();

        if config.min_pool_size > 0.0 || config.max_pool_size > 0.0 {
            filters.push(Box::new(PoolSizeFilter::new(
                market.clone(),
                config.min_pool_size,
                config.max_pool_size,
            )));
        }

        if config.check_metadata_mutable || config.check_socials {
            filters.push(Box::new(MutableSocialsFilter::new(
                market.clone(),
                config.check_metadata_mutable,
                config.check_socials,
            )));
        }

        if let Ok(deny) = DenyListFilter::load(market, &config.deny_list_path) {
            filters.push(Box::new(deny));
        }

        Self { filters }
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Run every predicate; one sample is positive only if all pass
    pub async fn execute(&self, pool: &PoolDescriptor) -> bool {
        for filter in &self.filters {
            let outcome = filter.check(pool).await;

            if !outcome.ok {
                tracing::trace!(
                    mint = %pool.base_mint,
                    filter = filter.name(),
                    reason = outcome.message.as_deref().unwrap_or("no reason given"),
                    "Pool rejected by filter"
                );
                return false;
            }
        }

        true
    }
}

/// Consecutive-match acceptance over the predicate set
///
/// Single-sample evaluation is noisy while metadata propagates, so a pool is
/// accepted only after `consecutive_filter_matches` positive samples in a
/// row; any negative sample resets the streak. The sample budget is
/// `duration / interval` using floor division, so a trailing partial
/// interval is never sampled.
pub struct FilterEvaluator {
    filters: PoolFilters,
    check_interval_ms: u64,
    check_duration_ms: u64,
    consecutive_matches: u32,
}

impl FilterEvaluator {
    pub fn new(filters: PoolFilters, config: &BotConfig) -> Self {
        Self {
            filters,
            check_interval_ms: config.filter_check_interval_ms,
            check_duration_ms: config.filter_check_duration_ms,
            consecutive_matches: config.consecutive_filter_matches,
        }
    }

    /// Decide whether to enter a pool; `true` is returned as soon as the
    /// streak target is met, `false` once the budget runs out
    pub async fn evaluate(&self, pool: &PoolDescriptor) -> bool {
        if self.check_interval_ms == 0 || self.check_duration_ms == 0 {
            return true;
        }

        let times_to_check = self.check_duration_ms / self.check_interval_ms;
        let mut times_checked = 0u64;
        let mut match_count = 0u32;

        loop {
            if self.filters.execute(pool).await {
                match_count += 1;

                if match_count >= self.consecutive_matches {
                    tracing::debug!(
                        mint = %pool.base_mint,
                        "Filter match {}/{}",
                        match_count,
                        self.consecutive_matches
                    );
                    return true;
                }
            } else {
                match_count = 0;
            }

            times_checked += 1;
            if times_checked >= times_to_check {
                return false;
            }

            sleep(Duration::from_millis(self.check_interval_ms)).await;
        }
    }
}
