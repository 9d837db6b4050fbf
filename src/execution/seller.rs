use std::sync::Arc;

use tokio::time::{sleep, Duration};

use super::backend::{ExecutionBackend, FeeHandling};
use super::gate::ConcurrencyGate;
use super::monitor::PositionMonitor;
use crate::config::BotConfig;
use crate::market::MarketDataProvider;
use crate::models::{
    ExitSignal, Position, PositionStatus, PriorityFee, SignerContext, SwapDirection, SwapIntent,
};
use crate::notify::NotificationSink;

/// Closes positions once the monitor signals an exit
pub struct Seller {
    market: Arc<dyn MarketDataProvider>,
    backend: Arc<dyn ExecutionBackend>,
    gate: Arc<ConcurrencyGate>,
    monitor: Arc<PositionMonitor>,
    notifier: Arc<dyn NotificationSink>,
    signer: SignerContext,
    config: Arc<BotConfig>,
}

impl Seller {
    pub fn new(
        market: Arc<dyn MarketDataProvider>,
        backend: Arc<dyn ExecutionBackend>,
        gate: Arc<ConcurrencyGate>,
        monitor: Arc<PositionMonitor>,
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
            monitor,
            notifier,
            signer,
            config,
        }
    }

    fn priority_fee(&self) -> Option<PriorityFee> {
        match self.backend.fee_handling() {
            FeeHandling::Caller => Some(PriorityFee {
                unit_limit: self.config.compute_unit_limit,
                unit_price: self.config.compute_unit_price,
            }),
            FeeHandling::Backend => None,
        }
    }

    /// Run the exit side of the pipeline to a terminal status
    ///
    /// The monitor is consulted exactly once per position; retries after a
    /// failed submit go straight back to execution because the decision to
    /// exit has already been made. Exhausted retries still close the
    /// position rather than leaving it stuck open.
    pub async fn sell(&self, mut position: Position) -> Position {
        let _guard = self.gate.sell_guard();
        let mint = position.pool.base_mint.clone();

        tracing::trace!(mint = %mint, "Processing sell...");

        if position.base_amount <= 0.0 {
            tracing::info!(mint = %mint, "Empty balance, can't sell");
            position.status = PositionStatus::Closed;
            return position;
        }

        if self.config.pre_sell_delay_ms > 0 {
            tracing::debug!(
                mint = %mint,
                "Waiting for {} ms before sell",
                self.config.pre_sell_delay_ms
            );
            sleep(Duration::from_millis(self.config.pre_sell_delay_ms)).await;
        }

        let intent = SwapIntent {
            pool: position.pool.clone(),
            direction: SwapDirection::Sell,
            amount_in: position.base_amount,
            slippage_pct: self.config.sell_slippage_pct,
            priority_fee: self.priority_fee(),
        };

        for attempt in 1..=self.config.max_sell_retries {
            if attempt == 1 {
                // Only consult the exit decision once; it must not be
                // re-litigated while a transaction may be in flight
                let signal = self.monitor.wait_for_exit_signal(&position).await;
                position.exit_signal = Some(signal);

                if !signal.should_sell() {
                    position.status = PositionStatus::Abandoned;
                    return position;
                }

                position.status = PositionStatus::Closing;
            }

            tracing::info!(
                mint = %mint,
                "Send sell transaction attempt: {}/{}",
                attempt,
                self.config.max_sell_retries
            );

            let freshness = match self.market.latest_freshness().await {
                Ok(freshness) => freshness,
                Err(e) => {
                    tracing::debug!(mint = %mint, error = %e, "Failed to fetch fresh context");
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
                        mint = %mint,
                        signature = result.signature.as_deref().unwrap_or("unknown"),
                        "Confirmed sell tx"
                    );

                    if let Some(signature) = result.signature {
                        self.spawn_pnl_report(signature, position.entry_amount, mint.clone(), attempt);
                    }

                    position.status = PositionStatus::Closed;
                    return position;
                }
                Ok(result) => {
                    tracing::info!(
                        mint = %mint,
                        signature = result.signature.as_deref().unwrap_or("none"),
                        error = result.error.as_deref().unwrap_or("not confirmed"),
                        "Error confirming sell tx"
                    );
                }
                Err(e) => {
                    tracing::debug!(mint = %mint, error = %e, "Error sending sell transaction");
                }
            }
        }

        tracing::warn!(mint = %mint, "Sell retries exhausted, closing position anyway");
        position.status = PositionStatus::Closed;
        position
    }

    /// Best-effort realized P&L, detached so it can never stall or fail the
    /// lifecycle
    fn spawn_pnl_report(&self, signature: String, entry_amount: f64, mint: String, attempt: u32) {
        let backend = self.backend.clone();
        let notifier = self.notifier.clone();
        let max_retries = self.config.max_sell_retries;

        tokio::spawn(async move {
            match backend.quote_balance_delta(&signature).await {
                Ok(proceeds) => {
                    let pnl = proceeds - entry_amount;
                    let label = if pnl < 0.0 { "Loss" } else { "Profit" };

                    notifier.notify(
                        &format!(
                            "Confirmed sale at {:.5}\n{} {:.5}\nRetries {}/{}",
                            proceeds, label, pnl, attempt, max_retries
                        ),
                        &mint,
                    );
                }
                Err(e) => {
                    tracing::debug!(mint = %mint, error = %e, "Could not compute realized P&L");
                }
            }
        });
    }
}
