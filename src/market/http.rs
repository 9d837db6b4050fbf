use std::num::NonZeroU32;
use std::sync::Arc;

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::Deserialize;
use tokio::time::{sleep, Duration};

use super::MarketDataProvider;
use crate::models::{FreshnessContext, PoolDescriptor, PoolState, TokenMetadata};
use crate::Result;

const RATE_LIMIT_RPS: u32 = 10;
const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 500;

// Type alias for the rate limiter to simplify signatures
type QuoteApiRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Quote-API backed market data client
///
/// This struct is cloneable to allow sharing across pipeline tasks; all
/// clones share the same rate limiter.
#[derive(Clone)]
pub struct HttpMarketData {
    client: Client,
    base_url: String,
    rate_limiter: Arc<QuoteApiRateLimiter>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteResponse {
    out_amount: String,
    #[serde(default)]
    #[allow(dead_code)]
    price_impact_pct: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PoolInfoResponse {
    base_reserve: f64,
    quote_reserve: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenMetadataResponse {
    mutable: bool,
    #[serde(default)]
    socials: Vec<String>,
    update_authority: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockhashResponse {
    blockhash: String,
    last_valid_block_height: u64,
}

impl HttpMarketData {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        let quota = Quota::per_second(NonZeroU32::new(RATE_LIMIT_RPS).unwrap());

        Self {
            client,
            base_url: base_url.into(),
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    /// Make a rate-limited request, retrying transient failures with backoff
    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        for attempt in 1..=MAX_RETRIES {
            self.rate_limiter.until_ready().await;

            match self.client.get(url).send().await {
                Ok(response) if response.status().is_success() => {
                    return Ok(response.json::<T>().await?);
                }
                Ok(response) => {
                    let status = response.status();
                    if attempt == MAX_RETRIES {
                        return Err(format!("{} returned {}", url, status).into());
                    }
                    tracing::debug!(url, %status, attempt, "Retrying quote API request");
                }
                Err(e) => {
                    if attempt == MAX_RETRIES {
                        return Err(e.into());
                    }
                    tracing::debug!(url, error = %e, attempt, "Retrying quote API request");
                }
            }

            sleep(Duration::from_millis(backoff_ms)).await;
            backoff_ms *= 2;
        }

        Err(format!("{} exhausted retries", url).into())
    }
}

#[async_trait]
impl MarketDataProvider for HttpMarketData {
    async fn fetch_current_value(&self, pool: &PoolDescriptor, amount_in: f64) -> Result<f64> {
        let url = format!(
            "{}/quote?inputMint={}&outputMint={}&amount={}&slippageBps=0",
            self.base_url, pool.base_mint, pool.quote_mint, amount_in
        );

        let response: QuoteResponse = self.get_json(&url).await?;
        let out_amount: f64 = response.out_amount.parse()?;

        Ok(out_amount)
    }

    async fn fetch_pool_info(&self, pool: &PoolDescriptor) -> Result<PoolState> {
        let url = format!("{}/pools/{}", self.base_url, pool.pool_id);
        let response: PoolInfoResponse = self.get_json(&url).await?;

        Ok(PoolState {
            base_reserve: response.base_reserve,
            quote_reserve: response.quote_reserve,
        })
    }

    async fn fetch_token_metadata(&self, pool: &PoolDescriptor) -> Result<TokenMetadata> {
        let url = format!("{}/tokens/{}/metadata", self.base_url, pool.base_mint);
        let response: TokenMetadataResponse = self.get_json(&url).await?;

        Ok(TokenMetadata {
            mutable: response.mutable,
            socials: response.socials,
            update_authority: response.update_authority,
        })
    }

    async fn latest_freshness(&self) -> Result<FreshnessContext> {
        let url = format!("{}/blockhash", self.base_url);
        let response: BlockhashResponse = self.get_json(&url).await?;

        Ok(FreshnessContext {
            recent_blockhash: response.blockhash,
            last_valid_height: response.last_valid_block_height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_pool() -> PoolDescriptor {
        PoolDescriptor {
            base_mint: "MintAaa111".to_string(),
            quote_mint: "So11111111111111111111111111111111111111112".to_string(),
            pool_id: "PoolBbb222".to_string(),
            market_id: "MarketCcc333".to_string(),
        }
    }

    #[tokio::test]
    async fn test_fetch_current_value() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", mockito::Matcher::Regex("^/quote".to_string()))
            .with_status(200)
            .with_body(r#"{"outAmount": "1.25", "priceImpactPct": "0.01"}"#)
            .create_async()
            .await;

        let market = HttpMarketData::new(server.url());
        let value = market
            .fetch_current_value(&test_pool(), 1000.0)
            .await
            .unwrap();

        assert_eq!(value, 1.25);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_pool_info() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/pools/PoolBbb222")
            .with_status(200)
            .with_body(r#"{"baseReserve": 1000000.0, "quoteReserve": 80.5}"#)
            .create_async()
            .await;

        let market = HttpMarketData::new(server.url());
        let state = market.fetch_pool_info(&test_pool()).await.unwrap();

        assert_eq!(state.quote_reserve, 80.5);
        assert_eq!(state.base_reserve, 1_000_000.0);
    }

    #[tokio::test]
    async fn test_fetch_token_metadata() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/tokens/MintAaa111/metadata")
            .with_status(200)
            .with_body(
                r#"{"mutable": false, "socials": ["web", "twitter"], "updateAuthority": "AuthDdd444"}"#,
            )
            .create_async()
            .await;

        let market = HttpMarketData::new(server.url());
        let metadata = market.fetch_token_metadata(&test_pool()).await.unwrap();

        assert!(!metadata.mutable);
        assert_eq!(metadata.socials, vec!["web", "twitter"]);
        assert_eq!(metadata.update_authority, "AuthDdd444");
    }

    #[tokio::test]
    async fn test_server_error_is_retried_then_surfaced() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/blockhash")
            .with_status(500)
            .expect(MAX_RETRIES as usize)
            .create_async()
            .await;

        let market = HttpMarketData::new(server.url());
        let result = market.latest_freshness().await;

        assert!(result.is_err());
        mock.assert_async().await;
    }
}
