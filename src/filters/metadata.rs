use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{FilterOutcome, PoolFilter};
use crate::market::MarketDataProvider;
use crate::models::PoolDescriptor;

/// Rejects tokens with mutable metadata and/or without social links
///
/// Metadata mutability is permanent once renounced, so a verdict computed
/// from immutable metadata is cached and reused for the rest of the
/// consecutive-match loop.
pub struct MutableSocialsFilter {
    market: Arc<dyn MarketDataProvider>,
    check_mutable: bool,
    check_socials: bool,
    cached: Mutex<Option<FilterOutcome>>,
}

impl MutableSocialsFilter {
    pub fn new(market: Arc<dyn MarketDataProvider>, check_mutable: bool, check_socials: bool) -> Self {
        Self {
            market,
            check_mutable,
            check_socials,
            cached: Mutex::new(None),
        }
    }
}

#[async_trait]
impl PoolFilter for MutableSocialsFilter {
    fn name(&self) -> &str {
        "mutable-socials"
    }

    async fn check(&self, pool: &PoolDescriptor) -> FilterOutcome {
        if let Some(cached) = self.cached.lock().unwrap().clone() {
            return cached;
        }

        let metadata = match self.market.fetch_token_metadata(pool).await {
            Ok(metadata) => metadata,
            Err(e) => return FilterOutcome::fail(format!("failed to fetch metadata: {}", e)),
        };

        let mutable_ok = !self.check_mutable || !metadata.mutable;
        let socials_ok = !self.check_socials || !metadata.socials.is_empty();

        let outcome = if mutable_ok && socials_ok {
            FilterOutcome::pass()
        } else {
            let mut reasons = Vec::new();
            if !mutable_ok {
                reasons.push("metadata can be changed".to_string());
            }
            if !socials_ok {
                reasons.push("token has no socials".to_string());
            }
            FilterOutcome::fail(reasons.join(" and "))
        };

        // Socials may still appear later; only an immutable token gives a
        // verdict that cannot change under us
        if !metadata.mutable {
            *self.cached.lock().unwrap() = Some(outcome.clone());
        }

        outcome
    }
}
