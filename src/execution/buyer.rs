use std::sync::Arc;

use tokio::time::{sleep, Duration, Instant};

use super::backend::{ExecutionBackend, FeeHandling};
use super::gate::ConcurrencyGate;
use crate::allowlist::AllowList;
use crate::config::BotConfig;
use crate::filters::FilterEvaluator;
use crate::market::MarketDataProvider;
use crate::models::{
    PoolDescriptor, Position, PositionStatus, PriorityFee, SignerContext, SwapDirection,
    SwapIntent,
};
use crate::notify::NotificationSink;

/// Wall-clock ceiling for one buy attempt chain; once exceeded the pool is
/// stale and the position is abandoned even with retries remaining
const MAX_BUY_TIME: Duration = Duration::from_secs(10);

/// Opens positions on newly observed pools
pub struct Buyer {
    market: Arc<dyn MarketDataProvider>,
    backend: Arc<dyn ExecutionBackend>,
    gate: Arc<ConcurrencyGate>,
    filter_evaluator: Arc<FilterEvaluator>,
    allow_list: Arc<AllowList>,
    notifier: Arc<dyn NotificationSink>,
    signer: SignerContext,
    config: Arc<BotConfig>,
    buy_deadline: Duration,
}

impl Buyer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        market: Arc<dyn MarketDataProvider>,
        backend: Arc<dyn ExecutionBackend>,
        gate: Arc<ConcurrencyGate>,
        filter_evaluator: Arc<FilterEvaluator>,
        allow_list: Arc<AllowList>,
        notifier: Arc<dyn NotificationSink>,
        config: Arc<BotConfig>,
    ) -> Self {
        let signer = SignerContext {
            wallet_pubkey: config.wallet_pubkey.clone(),
        };

        Self {
            market,
            backend,
            gate,
            filter_evaluator,
            allow_list,
            notifier,
            signer,
            config,
            buy_deadline: MAX_BUY_TIME,
        }
    }

    #[cfg(test)]
    fn with_deadline(mut self, deadline: Duration) -> Self {
        self.buy_deadline = deadline;
        self
    }

    /// Priority fees are only attached when the backend leaves
    /// prioritization to us
    fn priority_fee(&self) -> Option<PriorityFee> {
        match self.backend.fee_handling() {
            FeeHandling::Caller => Some(PriorityFee {
                unit_limit: self.config.compute_unit_limit,
                unit_price: self.config.compute_unit_price,
            }),
            FeeHandling::Backend => None,
        }
    }

    /// Attempt to open a position; `None` means the pool was skipped or the
    /// buy was abandoned
    pub async fn buy(&self, pool: &PoolDescriptor) -> Option<Position> {
        tracing::trace!(mint = %pool.base_mint, "Processing new pool...");

        if self.config.use_allow_list && !self.allow_list.contains(&pool.base_mint) {
            tracing::debug!(
                mint = %pool.base_mint,
                "Skipping buy because token is not in the allow list"
            );
            return None;
        }

        if self.config.pre_buy_delay_ms > 0 {
            tracing::debug!(
                mint = %pool.base_mint,
                "Waiting for {} ms before buy",
                self.config.pre_buy_delay_ms
            );
            sleep(Duration::from_millis(self.config.pre_buy_delay_ms)).await;
        }

        // Fail-fast admission; the permit is held for the rest of the buy
        let _permit = self.gate.admit().await?;

        if !self.config.use_allow_list && !self.filter_evaluator.evaluate(pool).await {
            tracing::trace!(
                mint = %pool.base_mint,
                "Skipping buy because pool doesn't match filters"
            );
            return None;
        }

        let mut position = Position::opening(pool.clone(), self.config.quote_amount);
        let intent = SwapIntent {
            pool: pool.clone(),
            direction: SwapDirection::Buy,
            amount_in: self.config.quote_amount,
            slippage_pct: self.config.buy_slippage_pct,
            priority_fee: self.priority_fee(),
        };

        let started = Instant::now();

        for attempt in 1..=self.config.max_buy_retries {
            if started.elapsed() > self.buy_deadline {
                tracing::info!(
                    mint = %pool.base_mint,
                    "Not buying, max buy timer of {:?} exceeded",
                    self.buy_deadline
                );
                break;
            }

            tracing::info!(
                mint = %pool.base_mint,
                "Send buy transaction attempt: {}/{}",
                attempt,
                self.config.max_buy_retries
            );

            let freshness = match self.market.latest_freshness().await {
                Ok(freshness) => freshness,
                Err(e) => {
                    tracing::debug!(mint = %pool.base_mint, error = %e, "Failed to fetch fresh context");
                    continue;
                }
            };

            match self
                .backend
                .submit_and_confirm(&intent, &self.signer, &freshness)
                .await
            {
                Ok(result) if result.confirmed => {
                    tracing::info!(
                        mint = %pool.base_mint,
                        signature = result.signature.as_deref().unwrap_or("unknown"),
                        "Confirmed buy tx"
                    );

                    position.base_amount = result.amount_out.unwrap_or_default();
                    position.status = PositionStatus::Open;

                    self.notifier.notify(
                        &format!(
                            "Confirmed buy\nMint {}\nSignature {}",
                            pool.base_mint,
                            result.signature.as_deref().unwrap_or("unknown")
                        ),
                        &pool.base_mint,
                    );

                    return Some(position);
                }
                Ok(result) => {
                    tracing::info!(
                        mint = %pool.base_mint,
                        signature = result.signature.as_deref().unwrap_or("none"),
                        error = result.error.as_deref().unwrap_or("not confirmed"),
                        "Error confirming buy tx"
                    );
                }
                Err(e) => {
                    tracing::debug!(mint = %pool.base_mint, error = %e, "Error sending buy transaction");
                }
            }
        }

        position.status = PositionStatus::Abandoned;
        tracing::debug!(mint = %pool.base_mint, "Buy abandoned after retries");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::backend::BackendError;
    use crate::filters::{FilterOutcome, PoolFilter, PoolFilters};
    use crate::models::{ExecutionResult, FreshnessContext, PoolState, TokenMetadata};
    use crate::notify::LogSink;
    use crate::Result;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct StubMarket;

    #[async_trait]
    impl MarketDataProvider for StubMarket {
        async fn fetch_current_value(&self, _pool: &PoolDescriptor, _amount_in: f64) -> Result<f64> {
            Err("not used".into())
        }

        async fn fetch_pool_info(&self, _pool: &PoolDescriptor) -> Result<PoolState> {
            Ok(PoolState {
                base_reserve: 1000.0,
                quote_reserve: 10.0,
            })
        }

        async fn fetch_token_metadata(&self, _pool: &PoolDescriptor) -> Result<TokenMetadata> {
            Err("not used".into())
        }

        async fn latest_freshness(&self) -> Result<FreshnessContext> {
            Ok(FreshnessContext {
                recent_blockhash: "hash".to_string(),
                last_valid_height: 100,
            })
        }
    }

    /// Backend replaying scripted attempt outcomes, with optional per-call
    /// latency
    struct ScriptedBackend {
        outcomes: Mutex<VecDeque<std::result::Result<ExecutionResult, BackendError>>>,
        attempts: AtomicUsize,
        latency: Duration,
    }

    impl ScriptedBackend {
        fn new(outcomes: Vec<std::result::Result<ExecutionResult, BackendError>>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into_iter().collect()),
                attempts: AtomicUsize::new(0),
                latency: Duration::ZERO,
            }
        }

        fn with_latency(mut self, latency: Duration) -> Self {
            self.latency = latency;
            self
        }

        fn attempts(&self) -> usize {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ExecutionBackend for ScriptedBackend {
        async fn submit_and_confirm(
            &self,
            _intent: &SwapIntent,
            _signer: &SignerContext,
            _freshness: &FreshnessContext,
        ) -> std::result::Result<ExecutionResult, BackendError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if !self.latency.is_zero() {
                sleep(self.latency).await;
            }

            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(BackendError::ConfirmationTimeout))
        }
    }

    struct RejectAll;

    #[async_trait]
    impl PoolFilter for RejectAll {
        fn name(&self) -> &str {
            "reject-all"
        }

        async fn check(&self, _pool: &PoolDescriptor) -> FilterOutcome {
            FilterOutcome::fail("always rejected")
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

    fn config() -> BotConfig {
        BotConfig {
            quote_amount: 1.0,
            max_buy_retries: 5,
            // Filter loop disabled unless a test turns it on
            filter_check_interval_ms: 0,
            ..Default::default()
        }
    }

    fn buyer_with(
        backend: Arc<ScriptedBackend>,
        gate: Arc<ConcurrencyGate>,
        config: BotConfig,
        filters: PoolFilters,
        allow_list: AllowList,
    ) -> Buyer {
        let config = Arc::new(config);
        Buyer::new(
            Arc::new(StubMarket),
            backend,
            gate,
            Arc::new(FilterEvaluator::new(filters, &config)),
            Arc::new(allow_list),
            Arc::new(LogSink),
            config,
        )
    }

    fn confirmed() -> std::result::Result<ExecutionResult, BackendError> {
        Ok(ExecutionResult::filled("sig", 100.0))
    }

    fn unconfirmed() -> std::result::Result<ExecutionResult, BackendError> {
        Ok(ExecutionResult::not_confirmed(None, "dropped"))
    }

    #[tokio::test]
    async fn test_buy_confirms_on_first_attempt() {
        let backend = Arc::new(ScriptedBackend::new(vec![confirmed()]));
        let gate = Arc::new(ConcurrencyGate::new(2));
        let buyer = buyer_with(
            backend.clone(),
            gate.clone(),
            config(),
            PoolFilters::new(vec![]),
            AllowList::empty(),
        );

        let position = buyer.buy(&pool()).await.unwrap();

        assert_eq!(position.status, PositionStatus::Open);
        assert_eq!(position.base_amount, 100.0);
        assert_eq!(position.entry_amount, 1.0);
        assert_eq!(backend.attempts(), 1);

        // Token returned once the buy finished
        assert_eq!(gate.available_permits(), 2);
    }

    #[tokio::test]
    async fn test_retries_until_confirmed() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            unconfirmed(),
            Err(BackendError::ConfirmationTimeout),
            confirmed(),
        ]));
        let gate = Arc::new(ConcurrencyGate::new(1));
        let buyer = buyer_with(
            backend.clone(),
            gate,
            config(),
            PoolFilters::new(vec![]),
            AllowList::empty(),
        );

        let position = buyer.buy(&pool()).await;

        assert!(position.is_some());
        assert_eq!(backend.attempts(), 3);
    }

    #[tokio::test]
    async fn test_retry_exhaustion_abandons() {
        let backend = Arc::new(ScriptedBackend::new(vec![]));
        let gate = Arc::new(ConcurrencyGate::new(1));
        let buyer = buyer_with(
            backend.clone(),
            gate.clone(),
            config(),
            PoolFilters::new(vec![]),
            AllowList::empty(),
        );

        let position = buyer.buy(&pool()).await;

        assert!(position.is_none());
        assert_eq!(backend.attempts(), 5);
        assert_eq!(gate.available_permits(), 1);
    }

    #[tokio::test]
    async fn test_deadline_cuts_retry_loop() {
        let backend = Arc::new(
            ScriptedBackend::new(vec![]).with_latency(Duration::from_millis(60)),
        );
        let gate = Arc::new(ConcurrencyGate::new(1));
        let buyer = buyer_with(
            backend.clone(),
            gate.clone(),
            BotConfig {
                max_buy_retries: 100,
                ..config()
            },
            PoolFilters::new(vec![]),
            AllowList::empty(),
        )
        .with_deadline(Duration::from_millis(50));

        let position = buyer.buy(&pool()).await;

        assert!(position.is_none());
        // First attempt starts inside the window; its 60 ms latency pushes
        // every later attempt past the deadline
        assert_eq!(backend.attempts(), 1);
        assert_eq!(gate.available_permits(), 1);
    }

    #[tokio::test]
    async fn test_busy_gate_skips_without_queuing() {
        let backend = Arc::new(ScriptedBackend::new(vec![confirmed()]));
        let gate = Arc::new(ConcurrencyGate::new(1));
        let _held = gate.admit().await.unwrap();

        let buyer = buyer_with(
            backend.clone(),
            gate.clone(),
            config(),
            PoolFilters::new(vec![]),
            AllowList::empty(),
        );

        let position = buyer.buy(&pool()).await;

        assert!(position.is_none());
        assert_eq!(backend.attempts(), 0);
    }

    #[tokio::test]
    async fn test_allow_list_blocks_unlisted_mint() {
        let backend = Arc::new(ScriptedBackend::new(vec![confirmed()]));
        let gate = Arc::new(ConcurrencyGate::new(1));
        let buyer = buyer_with(
            backend.clone(),
            gate,
            BotConfig {
                use_allow_list: true,
                ..config()
            },
            PoolFilters::new(vec![]),
            AllowList::empty(),
        );

        let position = buyer.buy(&pool()).await;

        assert!(position.is_none());
        assert_eq!(backend.attempts(), 0);
    }

    #[tokio::test]
    async fn test_allow_list_mode_bypasses_filters() {
        let backend = Arc::new(ScriptedBackend::new(vec![confirmed()]));
        let gate = Arc::new(ConcurrencyGate::new(1));
        let buyer = buyer_with(
            backend.clone(),
            gate,
            BotConfig {
                use_allow_list: true,
                // Filtering would reject everything if it ran
                filter_check_interval_ms: 10,
                filter_check_duration_ms: 30,
                consecutive_filter_matches: 1,
                ..config()
            },
            PoolFilters::new(vec![Box::new(RejectAll)]),
            AllowList::from_entries(&["MintAaa111"]),
        );

        let position = buyer.buy(&pool()).await;

        assert!(position.is_some());
        assert_eq!(backend.attempts(), 1);
    }

    #[tokio::test]
    async fn test_filter_rejection_blocks_buy() {
        let backend = Arc::new(ScriptedBackend::new(vec![confirmed()]));
        let gate = Arc::new(ConcurrencyGate::new(1));
        let buyer = buyer_with(
            backend.clone(),
            gate.clone(),
            BotConfig {
                filter_check_interval_ms: 10,
                filter_check_duration_ms: 30,
                consecutive_filter_matches: 1,
                ..config()
            },
            PoolFilters::new(vec![Box::new(RejectAll)]),
            AllowList::empty(),
        );

        let position = buyer.buy(&pool()).await;

        assert!(position.is_none());
        assert_eq!(backend.attempts(), 0);
        assert_eq!(gate.available_permits(), 1);
    }
}
