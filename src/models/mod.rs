use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies a tradable pair on the network
///
/// Immutable once observed; new-pool events arrive as JSON with exactly
/// these fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolDescriptor {
    pub base_mint: String,
    pub quote_mint: String,
    pub pool_id: String,
    pub market_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionStatus {
    Opening,
    Open,
    Closing,
    Closed,
    Abandoned,
}

/// A position over one pool, owned exclusively by its pipeline task
#[derive(Debug, Clone)]
pub struct Position {
    pub id: Uuid,
    pub pool: PoolDescriptor,
    /// Quote units spent to open the position
    pub entry_amount: f64,
    /// Base tokens received on the confirmed buy
    pub base_amount: f64,
    pub entry_time: DateTime<Utc>,
    pub status: PositionStatus,
    pub exit_signal: Option<ExitSignal>,
}

impl Position {
    /// Create a position in `Opening` status for a buy attempt
    pub fn opening(pool: PoolDescriptor, entry_amount: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            pool,
            entry_amount,
            base_amount: 0.0,
            entry_time: Utc::now(),
            status: PositionStatus::Opening,
            exit_signal: None,
        }
    }
}

/// Outcome of the price-monitoring state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitSignal {
    /// Monitoring disabled, sell without waiting
    Immediate,
    TookProfit,
    StoppedOut,
    /// Sample budget exhausted with no trigger; still take the exit
    Expired,
    /// Hard-loss floor breached, position is written off and never sold
    Abandoned,
}

impl ExitSignal {
    pub fn should_sell(&self) -> bool {
        !matches!(self, ExitSignal::Abandoned)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapDirection {
    Buy,
    Sell,
}

/// Compute-budget style prioritization attached by the caller when the
/// backend does not handle fees itself
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriorityFee {
    pub unit_limit: u32,
    pub unit_price: u64,
}

/// One submit-and-confirm request, opaque to the orchestrators beyond
/// direction and amounts
#[derive(Debug, Clone)]
pub struct SwapIntent {
    pub pool: PoolDescriptor,
    pub direction: SwapDirection,
    /// Quote units for buys, base tokens for sells
    pub amount_in: f64,
    pub slippage_pct: f64,
    pub priority_fee: Option<PriorityFee>,
}

/// Wallet identity for the signing collaborator; custody stays external
#[derive(Debug, Clone)]
pub struct SignerContext {
    pub wallet_pubkey: String,
}

/// Blockhash-equivalent context fetched fresh for every attempt
#[derive(Debug, Clone)]
pub struct FreshnessContext {
    pub recent_blockhash: String,
    pub last_valid_height: u64,
}

/// Outcome of one submit-and-confirm attempt, consumed immediately by the
/// retry loop that produced it
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub confirmed: bool,
    pub signature: Option<String>,
    /// Base tokens received (buys) or quote units received (sells); set on
    /// confirmed fills so the monitor can price the position
    pub amount_out: Option<f64>,
    pub error: Option<String>,
}

impl ExecutionResult {
    pub fn filled(signature: impl Into<String>, amount_out: f64) -> Self {
        Self {
            confirmed: true,
            signature: Some(signature.into()),
            amount_out: Some(amount_out),
            error: None,
        }
    }

    pub fn not_confirmed(signature: Option<String>, error: impl Into<String>) -> Self {
        Self {
            confirmed: false,
            signature,
            amount_out: None,
            error: Some(error.into()),
        }
    }
}

/// Live pool reserves; the quote side feeds the pool-size filter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolState {
    pub base_reserve: f64,
    pub quote_reserve: f64,
}

/// Token metadata surfaced to the filter predicates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub mutable: bool,
    pub socials: Vec<String>,
    pub update_authority: String,
}
