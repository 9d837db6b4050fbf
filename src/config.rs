use anyhow::{bail, Result};

/// Runtime configuration, read once at startup from the environment
///
/// Every knob has a default so a `.env` file only needs to override what it
/// cares about. Percentages are whole numbers (20 = 20%), intervals and
/// durations are milliseconds. A zero interval or duration disables the
/// corresponding polling loop entirely.
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub wallet_pubkey: String,
    /// Quote units committed per position
    pub quote_amount: f64,
    pub max_concurrent_positions: usize,
    pub use_allow_list: bool,
    pub auto_sell_enabled: bool,
    pub pre_buy_delay_ms: u64,
    pub pre_sell_delay_ms: u64,
    pub max_buy_retries: u32,
    pub max_sell_retries: u32,
    pub take_profit_pct: f64,
    pub stop_loss_pct: f64,
    pub trailing_stop_loss: bool,
    /// Zero disables rug detection; otherwise a drop below
    /// `entry * (100 - pct) / 100` writes the position off without selling
    pub hard_abandon_loss_pct: f64,
    pub buy_slippage_pct: f64,
    pub sell_slippage_pct: f64,
    pub price_check_interval_ms: u64,
    pub price_check_duration_ms: u64,
    pub filter_check_interval_ms: u64,
    pub filter_check_duration_ms: u64,
    pub consecutive_filter_matches: u32,
    pub min_pool_size: f64,
    pub max_pool_size: f64,
    pub check_metadata_mutable: bool,
    pub check_socials: bool,
    pub compute_unit_limit: u32,
    pub compute_unit_price: u64,
    pub allow_list_path: String,
    pub deny_list_path: String,
}

impl BotConfig {
    pub fn from_env() -> Self {
        Self {
            wallet_pubkey: env_str("WALLET_PUBKEY", "11111111111111111111111111111111"),
            quote_amount: env_f64("QUOTE_AMOUNT", 0.1),
            max_concurrent_positions: env_u64("MAX_CONCURRENT_POSITIONS", 5) as usize,
            use_allow_list: env_bool("USE_ALLOW_LIST", false),
            auto_sell_enabled: env_bool("AUTO_SELL_ENABLED", true),
            pre_buy_delay_ms: env_u64("PRE_BUY_DELAY_MS", 0),
            pre_sell_delay_ms: env_u64("PRE_SELL_DELAY_MS", 0),
            max_buy_retries: env_u64("MAX_BUY_RETRIES", 5) as u32,
            max_sell_retries: env_u64("MAX_SELL_RETRIES", 5) as u32,
            take_profit_pct: env_f64("TAKE_PROFIT_PCT", 40.0),
            stop_loss_pct: env_f64("STOP_LOSS_PCT", 20.0),
            trailing_stop_loss: env_bool("TRAILING_STOP_LOSS", false),
            hard_abandon_loss_pct: env_f64("HARD_ABANDON_LOSS_PCT", 0.0),
            buy_slippage_pct: env_f64("BUY_SLIPPAGE_PCT", 10.0),
            sell_slippage_pct: env_f64("SELL_SLIPPAGE_PCT", 10.0),
            price_check_interval_ms: env_u64("PRICE_CHECK_INTERVAL_MS", 2_000),
            price_check_duration_ms: env_u64("PRICE_CHECK_DURATION_MS", 600_000),
            filter_check_interval_ms: env_u64("FILTER_CHECK_INTERVAL_MS", 2_000),
            filter_check_duration_ms: env_u64("FILTER_CHECK_DURATION_MS", 60_000),
            consecutive_filter_matches: env_u64("CONSECUTIVE_FILTER_MATCHES", 3) as u32,
            min_pool_size: env_f64("MIN_POOL_SIZE", 0.0),
            max_pool_size: env_f64("MAX_POOL_SIZE", 0.0),
            check_metadata_mutable: env_bool("CHECK_METADATA_MUTABLE", true),
            check_socials: env_bool("CHECK_SOCIALS", true),
            compute_unit_limit: env_u64("COMPUTE_UNIT_LIMIT", 101_337) as u32,
            compute_unit_price: env_u64("COMPUTE_UNIT_PRICE", 421_197),
            allow_list_path: env_str("ALLOW_LIST_PATH", "snipe-list.txt"),
            deny_list_path: env_str("DENY_LIST_PATH", "deny-list.txt"),
        }
    }

    /// Reject configurations that cannot produce a sane pipeline
    pub fn validate(&self) -> Result<()> {
        if self.quote_amount <= 0.0 {
            bail!("QUOTE_AMOUNT must be positive, got {}", self.quote_amount);
        }

        if self.max_concurrent_positions == 0 {
            bail!("MAX_CONCURRENT_POSITIONS must be at least 1");
        }

        if self.max_buy_retries == 0 || self.max_sell_retries == 0 {
            bail!("MAX_BUY_RETRIES and MAX_SELL_RETRIES must be at least 1");
        }

        for (name, pct) in [
            ("BUY_SLIPPAGE_PCT", self.buy_slippage_pct),
            ("SELL_SLIPPAGE_PCT", self.sell_slippage_pct),
            ("STOP_LOSS_PCT", self.stop_loss_pct),
            ("HARD_ABANDON_LOSS_PCT", self.hard_abandon_loss_pct),
        ] {
            if !(0.0..=100.0).contains(&pct) {
                bail!("{} must be within 0-100, got {}", name, pct);
            }
        }

        if self.take_profit_pct < 0.0 {
            bail!("TAKE_PROFIT_PCT must not be negative");
        }

        let filtering_enabled =
            self.filter_check_interval_ms > 0 && self.filter_check_duration_ms > 0;
        if filtering_enabled && self.consecutive_filter_matches == 0 {
            bail!("CONSECUTIVE_FILTER_MATCHES must be at least 1 when filtering is enabled");
        }

        if self.max_pool_size > 0.0 && self.min_pool_size > self.max_pool_size {
            bail!(
                "MIN_POOL_SIZE ({}) exceeds MAX_POOL_SIZE ({})",
                self.min_pool_size,
                self.max_pool_size
            );
        }

        Ok(())
    }
}

impl Default for BotConfig {
    /// Defaults only; used by tests that override individual fields
    fn default() -> Self {
        Self {
            wallet_pubkey: "11111111111111111111111111111111".to_string(),
            quote_amount: 0.1,
            max_concurrent_positions: 5,
            use_allow_list: false,
            auto_sell_enabled: true,
            pre_buy_delay_ms: 0,
            pre_sell_delay_ms: 0,
            max_buy_retries: 5,
            max_sell_retries: 5,
            take_profit_pct: 40.0,
            stop_loss_pct: 20.0,
            trailing_stop_loss: false,
            hard_abandon_loss_pct: 0.0,
            buy_slippage_pct: 10.0,
            sell_slippage_pct: 10.0,
            price_check_interval_ms: 2_000,
            price_check_duration_ms: 600_000,
            filter_check_interval_ms: 2_000,
            filter_check_duration_ms: 60_000,
            consecutive_filter_matches: 3,
            min_pool_size: 0.0,
            max_pool_size: 0.0,
            check_metadata_mutable: true,
            check_socials: true,
            compute_unit_limit: 101_337,
            compute_unit_price: 421_197,
            allow_list_path: "snipe-list.txt".to_string(),
            deny_list_path: "deny-list.txt".to_string(),
        }
    }
}

fn env_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = BotConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_quote_amount_rejected() {
        let config = BotConfig {
            quote_amount: 0.0,
            ..Default::default()
        };

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("QUOTE_AMOUNT"));
    }

    #[test]
    fn test_slippage_out_of_range_rejected() {
        let config = BotConfig {
            buy_slippage_pct: 150.0,
            ..Default::default()
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_consecutive_matches_rejected_when_filtering() {
        let config = BotConfig {
            consecutive_filter_matches: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        // Disabling the filter loop makes the same value acceptable
        let config = BotConfig {
            consecutive_filter_matches: 0,
            filter_check_duration_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_pool_size_bounds_checked() {
        let config = BotConfig {
            min_pool_size: 10.0,
            max_pool_size: 5.0,
            ..Default::default()
        };

        assert!(config.validate().is_err());
    }
}
