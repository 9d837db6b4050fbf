use reqwest::Client;
use serde_json::json;

use super::NotificationSink;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Telegram Bot API sink
///
/// Delivery happens on a detached task so a slow or unreachable API never
/// stalls a position pipeline. Every message carries dexscreener/rugcheck
/// links for the mint it concerns.
pub struct TelegramSink {
    client: Client,
    bot_token: String,
    chat_id: i64,
}

impl TelegramSink {
    pub fn new(bot_token: String, chat_id: i64) -> Self {
        Self {
            client: Client::new(),
            bot_token,
            chat_id,
        }
    }

    fn send_message_url(&self) -> String {
        format!("{}/bot{}/sendMessage", TELEGRAM_API_BASE, self.bot_token)
    }
}

impl NotificationSink for TelegramSink {
    fn notify(&self, message: &str, context_key: &str) {
        let url = self.send_message_url();
        let client = self.client.clone();
        let mint = context_key.to_string();

        let body = json!({
            "chat_id": self.chat_id,
            "text": message,
            "parse_mode": "HTML",
            "reply_markup": {
                "inline_keyboard": [[
                    {
                        "text": "Dexscreener",
                        "url": format!("https://dexscreener.com/solana/{}", mint),
                    },
                    {
                        "text": "Rugcheck",
                        "url": format!("https://rugcheck.xyz/tokens/{}", mint),
                    },
                ]]
            },
        });

        tokio::spawn(async move {
            match client.post(&url).json(&body).send().await {
                Ok(response) if !response.status().is_success() => {
                    tracing::debug!(
                        mint = %mint,
                        status = %response.status(),
                        "Telegram rejected notification"
                    );
                }
                Err(e) => {
                    tracing::debug!(mint = %mint, error = %e, "Failed to deliver notification");
                }
                _ => {}
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_notify_survives_unreachable_api() {
        // Bad token, nothing listening; notify must neither block nor panic
        let sink = TelegramSink::new("invalid-token".to_string(), 42);
        sink.notify("Confirmed buy", "MintAaa111");

        // Give the detached task a moment to run its failure path
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
    }
}
