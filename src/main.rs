use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use snipebot::allowlist::AllowList;
use snipebot::config::BotConfig;
use snipebot::execution::{
    Buyer, ConcurrencyGate, DryRunBackend, ExecutionBackend, HttpRelayBackend, PositionMonitor,
    Seller, StopLossStore,
};
use snipebot::filters::{FilterEvaluator, PoolFilters};
use snipebot::market::{HttpMarketData, MarketDataProvider};
use snipebot::models::PoolDescriptor;
use snipebot::notify::{LogSink, NotificationSink, TelegramSink};

const DEFAULT_QUOTE_API_URL: &str = "https://lite-api.jup.ag/swap/v1";

#[derive(Parser)]
#[command(
    name = "snipebot",
    about = "Watches new-pool events and manages position lifecycles"
)]
struct Cli {
    /// Fill orders against the in-process paper backend instead of
    /// submitting them anywhere
    #[arg(long)]
    dry_run: bool,

    /// Alternative .env file
    #[arg(long)]
    env_file: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match &cli.env_file {
        Some(path) => {
            dotenvy::from_path(path).ok();
        }
        None => {
            dotenvy::dotenv().ok();
        }
    }
    setup_logging();

    let config = Arc::new(BotConfig::from_env());
    config.validate()?;

    tracing::info!("🚀 Snipebot starting");

    // ========================================================================
    // Collaborators
    // ========================================================================

    let quote_api_url =
        std::env::var("QUOTE_API_URL").unwrap_or_else(|_| DEFAULT_QUOTE_API_URL.to_string());
    let market: Arc<dyn MarketDataProvider> = Arc::new(HttpMarketData::new(quote_api_url.clone()));

    let backend = create_backend(cli.dry_run, market.clone())?;
    let notifier = create_notifier();
    let allow_list = load_allow_list(&config)?;

    let gate = Arc::new(ConcurrencyGate::new(config.max_concurrent_positions));
    let stop_loss_store = Arc::new(StopLossStore::new());

    let filter_evaluator = Arc::new(FilterEvaluator::new(
        PoolFilters::from_config(&config, market.clone()),
        &config,
    ));

    let monitor = Arc::new(PositionMonitor::new(
        market.clone(),
        stop_loss_store,
        notifier.clone(),
        config.clone(),
    ));

    let buyer = Arc::new(Buyer::new(
        market.clone(),
        backend.clone(),
        gate.clone(),
        filter_evaluator,
        allow_list,
        notifier.clone(),
        config.clone(),
    ));

    let seller = Arc::new(Seller::new(
        market,
        backend,
        gate,
        monitor,
        notifier,
        config.clone(),
    ));

    tracing::info!("\n📊 Configuration:");
    tracing::info!("  Quote API: {}", quote_api_url);
    tracing::info!("  Quote amount: {}", config.quote_amount);
    tracing::info!("  Max concurrent positions: {}", config.max_concurrent_positions);
    tracing::info!("  Allow list mode: {}", config.use_allow_list);
    tracing::info!("  Auto sell: {}", config.auto_sell_enabled);
    tracing::info!(
        "  Take profit / stop loss: {}% / {}% (trailing: {})",
        config.take_profit_pct,
        config.stop_loss_pct,
        config.trailing_stop_loss
    );
    if cli.dry_run {
        tracing::info!("  Dry run: orders are filled in-process");
    }

    // ========================================================================
    // Pool event loop
    // ========================================================================

    tracing::info!("Reading pool events from stdin (one JSON object per line)...");
    tracing::info!("Press Ctrl+C to stop...\n");

    let event_task = {
        let buyer = buyer.clone();
        let seller = seller.clone();
        let config = config.clone();

        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();

            while let Ok(Some(line)) = lines.next_line().await {
                let line = line.trim().to_string();
                if line.is_empty() {
                    continue;
                }

                let pool: PoolDescriptor = match serde_json::from_str(&line) {
                    Ok(pool) => pool,
                    Err(e) => {
                        tracing::warn!(error = %e, "Ignoring malformed pool event");
                        continue;
                    }
                };

                // One independent pipeline per observed pool
                let buyer = buyer.clone();
                let seller = seller.clone();
                let auto_sell = config.auto_sell_enabled;

                tokio::spawn(async move {
                    if let Some(position) = buyer.buy(&pool).await {
                        if auto_sell {
                            let position = seller.sell(position).await;
                            tracing::info!(
                                mint = %position.pool.base_mint,
                                "Position reached terminal status: {:?}",
                                position.status
                            );
                        }
                    }
                });
            }
        })
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("\n⚠️  Received Ctrl+C, shutting down...");
        }
        result = event_task => {
            tracing::error!("Pool event loop exited: {:?}", result);
        }
    }

    tracing::info!("👋 Snipebot stopped");
    Ok(())
}

// ============================================================================
// Initialization
// ============================================================================

fn setup_logging() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "snipebot=info".to_string());
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn create_backend(
    dry_run: bool,
    market: Arc<dyn MarketDataProvider>,
) -> anyhow::Result<Arc<dyn ExecutionBackend>> {
    if dry_run {
        return Ok(Arc::new(DryRunBackend::new(market)));
    }

    let executor = std::env::var("EXECUTOR").unwrap_or_else(|_| "dry-run".to_string());
    match executor.as_str() {
        "dry-run" => Ok(Arc::new(DryRunBackend::new(market))),
        "relay" => {
            let relay_url = std::env::var("RELAY_URL")
                .context("EXECUTOR=relay requires RELAY_URL to be set")?;
            tracing::info!("Routing transactions through relay at {}", relay_url);
            Ok(Arc::new(HttpRelayBackend::new(relay_url)))
        }
        other => bail!("Unknown EXECUTOR '{}', expected 'dry-run' or 'relay'", other),
    }
}

fn create_notifier() -> Arc<dyn NotificationSink> {
    let token = std::env::var("TELEGRAM_BOT_TOKEN").ok();
    let chat_id = std::env::var("TELEGRAM_CHAT_ID")
        .ok()
        .and_then(|v| v.parse::<i64>().ok());

    match (token, chat_id) {
        (Some(token), Some(chat_id)) => {
            tracing::info!("Telegram notifications enabled for chat {}", chat_id);
            Arc::new(TelegramSink::new(token, chat_id))
        }
        _ => Arc::new(LogSink),
    }
}

fn load_allow_list(config: &BotConfig) -> anyhow::Result<Arc<AllowList>> {
    if !config.use_allow_list {
        return Ok(Arc::new(AllowList::empty()));
    }

    let list = AllowList::load(&config.allow_list_path)?;
    if list.is_empty() {
        bail!(
            "Allow list mode is enabled but {} has no entries",
            config.allow_list_path
        );
    }

    Ok(Arc::new(list))
}
