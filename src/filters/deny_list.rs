use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;

use super::{FilterOutcome, PoolFilter};
use crate::market::MarketDataProvider;
use crate::models::PoolDescriptor;

/// Rejects pools whose metadata update authority appears in a deny list
///
/// The list is read once at construction, one authority per line.
pub struct DenyListFilter {
    market: Arc<dyn MarketDataProvider>,
    denied: HashSet<String>,
}

impl DenyListFilter {
    pub fn load(market: Arc<dyn MarketDataProvider>, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read deny list at {}", path.display()))?;

        let denied: HashSet<String> = raw
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect();

        tracing::info!("Loaded {} denied authorities from {}", denied.len(), path.display());

        Ok(Self { market, denied })
    }

    #[cfg(test)]
    fn with_entries(market: Arc<dyn MarketDataProvider>, entries: &[&str]) -> Self {
        Self {
            market,
            denied: entries.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[async_trait]
impl PoolFilter for DenyListFilter {
    fn name(&self) -> &str {
        "deny-list"
    }

    async fn check(&self, pool: &PoolDescriptor) -> FilterOutcome {
        if self.denied.is_empty() {
            return FilterOutcome::pass();
        }

        let metadata = match self.market.fetch_token_metadata(pool).await {
            Ok(metadata) => metadata,
            Err(e) => return FilterOutcome::fail(format!("failed to fetch metadata: {}", e)),
        };

        if self.denied.contains(&metadata.update_authority) {
            return FilterOutcome::fail(format!(
                "update authority {} is denied",
                metadata.update_authority
            ));
        }

        FilterOutcome::pass()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FreshnessContext, PoolState, TokenMetadata};
    use crate::Result;

    struct FixedAuthority(&'static str);

    #[async_trait]
    impl MarketDataProvider for FixedAuthority {
        async fn fetch_current_value(&self, _pool: &PoolDescriptor, _amount_in: f64) -> Result<f64> {
            Err("not used".into())
        }

        async fn fetch_pool_info(&self, _pool: &PoolDescriptor) -> Result<PoolState> {
            Err("not used".into())
        }

        async fn fetch_token_metadata(&self, _pool: &PoolDescriptor) -> Result<TokenMetadata> {
            Ok(TokenMetadata {
                mutable: false,
                socials: vec![],
                update_authority: self.0.to_string(),
            })
        }

        async fn latest_freshness(&self) -> Result<FreshnessContext> {
            Err("not used".into())
        }
    }

    fn pool() -> PoolDescriptor {
        PoolDescriptor {
            base_mint: "MintAaa111".to_string(),
            quote_mint: "So11111111111111111111111111111111111111112".to_string(),
            pool_id: "PoolBbb222".to_string(),
            market_id: "MarketCcc333".to_string(),
        }
    }

    #[tokio::test]
    async fn test_denied_authority_rejected() {
        let market = Arc::new(FixedAuthority("AuthBad666"));
        let filter = DenyListFilter::with_entries(market, &["AuthBad666"]);

        let outcome = filter.check(&pool()).await;
        assert!(!outcome.ok);
        assert!(outcome.message.unwrap().contains("denied"));
    }

    #[tokio::test]
    async fn test_unknown_authority_passes() {
        let market = Arc::new(FixedAuthority("AuthDdd444"));
        let filter = DenyListFilter::with_entries(market, &["AuthBad666"]);

        assert!(filter.check(&pool()).await.ok);
    }

    #[tokio::test]
    async fn test_empty_list_skips_lookup() {
        let market = Arc::new(FixedAuthority("AuthDdd444"));
        let filter = DenyListFilter::with_entries(market, &[]);

        assert!(filter.check(&pool()).await.ok);
    }
}
