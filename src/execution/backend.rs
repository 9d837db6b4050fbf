use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::market::MarketDataProvider;
use crate::models::{
    ExecutionResult, FreshnessContext, SignerContext, SwapDirection, SwapIntent,
};

/// Who attaches priority-fee instructions to an intent
///
/// Relay-style backends price their own inclusion; everyone else expects
/// the orchestrator to attach compute-budget instructions itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeHandling {
    Caller,
    Backend,
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("failed to submit transaction: {0}")]
    Submit(String),
    #[error("transaction was not confirmed in time")]
    ConfirmationTimeout,
    #[error("balance lookup not supported by this backend")]
    BalanceLookupUnsupported,
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

/// Submits signed transfer intents and reports confirmation
///
/// Implementations must not block indefinitely; the orchestrators impose
/// their own deadlines around each attempt.
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    fn fee_handling(&self) -> FeeHandling {
        FeeHandling::Caller
    }

    async fn submit_and_confirm(
        &self,
        intent: &SwapIntent,
        signer: &SignerContext,
        freshness: &FreshnessContext,
    ) -> Result<ExecutionResult, BackendError>;

    /// Quote-balance delta produced by a confirmed transaction, for
    /// best-effort P&L reporting
    async fn quote_balance_delta(&self, _signature: &str) -> Result<f64, BackendError> {
        Err(BackendError::BalanceLookupUnsupported)
    }
}

/// Paper backend that fills instantly at the pool's spot price
///
/// Used by `--dry-run` and the integration tests; nothing leaves the
/// process.
pub struct DryRunBackend {
    market: Arc<dyn MarketDataProvider>,
    sequence: AtomicU64,
    sell_proceeds: Mutex<HashMap<String, f64>>,
}

impl DryRunBackend {
    pub fn new(market: Arc<dyn MarketDataProvider>) -> Self {
        Self {
            market,
            sequence: AtomicU64::new(0),
            sell_proceeds: Mutex::new(HashMap::new()),
        }
    }

    fn next_signature(&self) -> String {
        let n = self.sequence.fetch_add(1, Ordering::SeqCst);
        format!("dry-run-{}", n)
    }
}

#[async_trait]
impl ExecutionBackend for DryRunBackend {
    async fn submit_and_confirm(
        &self,
        intent: &SwapIntent,
        _signer: &SignerContext,
        _freshness: &FreshnessContext,
    ) -> Result<ExecutionResult, BackendError> {
        let state = self
            .market
            .fetch_pool_info(&intent.pool)
            .await
            .map_err(|e| BackendError::Submit(e.to_string()))?;

        if state.base_reserve <= 0.0 || state.quote_reserve <= 0.0 {
            return Ok(ExecutionResult::not_confirmed(
                None,
                "pool has no liquidity",
            ));
        }

        let amount_out = match intent.direction {
            SwapDirection::Buy => intent.amount_in * state.base_reserve / state.quote_reserve,
            SwapDirection::Sell => intent.amount_in * state.quote_reserve / state.base_reserve,
        };

        let signature = self.next_signature();

        if intent.direction == SwapDirection::Sell {
            self.sell_proceeds
                .lock()
                .unwrap()
                .insert(signature.clone(), amount_out);
        }

        Ok(ExecutionResult::filled(signature, amount_out))
    }

    async fn quote_balance_delta(&self, signature: &str) -> Result<f64, BackendError> {
        self.sell_proceeds
            .lock()
            .unwrap()
            .get(signature)
            .copied()
            .ok_or(BackendError::BalanceLookupUnsupported)
    }
}

/// Relay-routed backend: ships the intent to an HTTP relay that handles
/// inclusion and prioritization itself
pub struct HttpRelayBackend {
    client: reqwest::Client,
    relay_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RelayResponse {
    confirmed: bool,
    signature: Option<String>,
    #[serde(default)]
    amount_out: Option<f64>,
    error: Option<String>,
}

impl HttpRelayBackend {
    pub fn new(relay_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(8))
            .build()
            .unwrap_or_default();

        Self {
            client,
            relay_url: relay_url.into(),
        }
    }
}

#[async_trait]
impl ExecutionBackend for HttpRelayBackend {
    fn fee_handling(&self) -> FeeHandling {
        FeeHandling::Backend
    }

    async fn submit_and_confirm(
        &self,
        intent: &SwapIntent,
        signer: &SignerContext,
        freshness: &FreshnessContext,
    ) -> Result<ExecutionResult, BackendError> {
        let body = json!({
            "pool": intent.pool,
            "direction": match intent.direction {
                SwapDirection::Buy => "buy",
                SwapDirection::Sell => "sell",
            },
            "amountIn": intent.amount_in,
            "slippagePct": intent.slippage_pct,
            "wallet": signer.wallet_pubkey,
            "recentBlockhash": freshness.recent_blockhash,
            "lastValidHeight": freshness.last_valid_height,
        });

        let url = format!("{}/transactions", self.relay_url);
        let response = self.client.post(&url).json(&body).send().await?;

        if !response.status().is_success() {
            return Err(BackendError::Submit(format!(
                "relay returned {}",
                response.status()
            )));
        }

        let relay: RelayResponse = response.json().await?;

        Ok(ExecutionResult {
            confirmed: relay.confirmed,
            signature: relay.signature,
            amount_out: relay.amount_out,
            error: relay.error,
        })
    }
}
