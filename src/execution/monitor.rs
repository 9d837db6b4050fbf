use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::time::{sleep, Duration};

use crate::config::BotConfig;
use crate::market::MarketDataProvider;
use crate::models::{ExitSignal, Position};
use crate::notify::NotificationSink;

/// Per-position risk record, keyed by base mint in the shared store
#[derive(Debug, Clone)]
pub struct RiskState {
    pub stop_loss: f64,
    pub trailing: bool,
}

/// Concurrency-safe stop-loss store
///
/// At most one entry per in-flight position; every terminal transition
/// removes its key so the map stays bounded by the admission cap.
#[derive(Default)]
pub struct StopLossStore {
    inner: Mutex<HashMap<String, RiskState>>,
}

impl StopLossStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(&self, mint: &str) -> Option<f64> {
        self.inner.lock().unwrap().get(mint).map(|s| s.stop_loss)
    }

    /// Store the initial threshold unless the position already has one
    pub fn init_if_absent(&self, mint: &str, stop_loss: f64, trailing: bool) -> f64 {
        let mut map = self.inner.lock().unwrap();
        map.entry(mint.to_string())
            .or_insert(RiskState {
                stop_loss,
                trailing,
            })
            .stop_loss
    }

    /// Ratchet the threshold upward on trailing entries; lower candidates
    /// are ignored so the stored level never decreases over a position's
    /// lifetime
    pub fn raise(&self, mint: &str, candidate: f64) -> bool {
        let mut map = self.inner.lock().unwrap();
        match map.get_mut(mint) {
            Some(state) if state.trailing && candidate > state.stop_loss => {
                state.stop_loss = candidate;
                true
            }
            _ => false,
        }
    }

    pub fn remove(&self, mint: &str) {
        self.inner.lock().unwrap().remove(mint);
    }

    pub fn contains(&self, mint: &str) -> bool {
        self.inner.lock().unwrap().contains_key(mint)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }
}

/// Polls a position's current value and decides the exit
///
/// Sample budget is `duration / interval` with floor division; at least one
/// sample is always taken. Failed samples consume budget instead of being
/// retried, the next scheduled sample is the retry.
pub struct PositionMonitor {
    market: Arc<dyn MarketDataProvider>,
    store: Arc<StopLossStore>,
    notifier: Arc<dyn NotificationSink>,
    config: Arc<BotConfig>,
}

impl PositionMonitor {
    pub fn new(
        market: Arc<dyn MarketDataProvider>,
        store: Arc<StopLossStore>,
        notifier: Arc<dyn NotificationSink>,
        config: Arc<BotConfig>,
    ) -> Self {
        Self {
            market,
            store,
            notifier,
            config,
        }
    }

    pub fn store(&self) -> &Arc<StopLossStore> {
        &self.store
    }

    /// Block until the position should exit (or be written off)
    pub async fn wait_for_exit_signal(&self, position: &Position) -> ExitSignal {
        let interval_ms = self.config.price_check_interval_ms;
        let duration_ms = self.config.price_check_duration_ms;

        if interval_ms == 0 || duration_ms == 0 {
            return ExitSignal::Immediate;
        }

        let times_to_check = duration_ms / interval_ms;
        let mint = position.pool.base_mint.as_str();
        let entry = position.entry_amount;

        let take_profit = entry * (1.0 + self.config.take_profit_pct / 100.0);
        let base_stop = entry * (1.0 - self.config.stop_loss_pct / 100.0);
        self.store
            .init_if_absent(mint, base_stop, self.config.trailing_stop_loss);

        let mut times_checked = 0u64;

        loop {
            match self
                .market
                .fetch_current_value(&position.pool, position.base_amount)
                .await
            {
                Ok(current) => {
                    let mut stop_loss = self.store.level(mint).unwrap_or(base_stop);

                    // The store only moves trailing entries, and only upward
                    let candidate = current * (1.0 - self.config.stop_loss_pct / 100.0);
                    if self.store.raise(mint, candidate) {
                        tracing::trace!(
                            mint = %mint,
                            "Raising trailing stop loss from {} to {}",
                            stop_loss,
                            candidate
                        );
                        stop_loss = candidate;
                    }

                    if self.config.hard_abandon_loss_pct > 0.0 {
                        let floor = entry * (100.0 - self.config.hard_abandon_loss_pct) / 100.0;

                        if current < floor {
                            tracing::info!(
                                mint = %mint,
                                "Dropped more than {}%, writing position off. Initial: {} | Current: {}",
                                self.config.hard_abandon_loss_pct,
                                entry,
                                current
                            );
                            self.notifier.notify(
                                &format!(
                                    "Rug detected, position written off without selling\nInitial: {}\nCurrent: {}",
                                    entry, current
                                ),
                                mint,
                            );
                            self.store.remove(mint);
                            return ExitSignal::Abandoned;
                        }
                    }

                    tracing::debug!(
                        mint = %mint,
                        "{}/{} Take profit: {} | Stop loss: {} | Current: {}",
                        times_checked,
                        times_to_check,
                        take_profit,
                        stop_loss,
                        current
                    );

                    if current < stop_loss {
                        self.store.remove(mint);
                        self.notifier.notify(
                            &format!("Stop loss triggered at {} (threshold {})", current, stop_loss),
                            mint,
                        );
                        return ExitSignal::StoppedOut;
                    }

                    if current > take_profit {
                        self.store.remove(mint);
                        self.notifier.notify(
                            &format!("Take profit reached at {} (threshold {})", current, take_profit),
                            mint,
                        );
                        return ExitSignal::TookProfit;
                    }
                }
                Err(e) => {
                    tracing::trace!(mint = %mint, error = %e, "Failed to check position value");
                }
            }

            times_checked += 1;
            if times_checked >= times_to_check {
                break;
            }

            sleep(Duration::from_millis(interval_ms)).await;
        }

        self.store.remove(mint);
        ExitSignal::Expired
    }
}
