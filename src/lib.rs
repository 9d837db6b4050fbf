// Core modules
pub mod allowlist;
pub mod config;
pub mod execution;
pub mod filters;
pub mod market;
pub mod models;
pub mod notify;

// Re-export commonly used types
pub use config::BotConfig;
pub use models::*;

// Error handling
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;
