// Position lifecycle: admission -> buy -> monitor -> sell. One pipeline
// task per observed pool; nothing here is shared across pipelines except
// the gate counters and the stop-loss store.
pub mod backend;
pub mod buyer;
pub mod gate;
pub mod monitor;
pub mod seller;

pub use backend::{BackendError, DryRunBackend, ExecutionBackend, FeeHandling, HttpRelayBackend};
pub use buyer::Buyer;
pub use gate::{ConcurrencyGate, GatePermit, SellGuard};
pub use monitor::{PositionMonitor, StopLossStore};
pub use seller::Seller;
