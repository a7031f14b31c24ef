//! Message delivery

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{info, warn};

use crate::report::{split_message, TELEGRAM_MESSAGE_LIMIT};

/// Somewhere a rendered report can be sent
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one Markdown message, returning how many recipients got it
    async fn send(&self, text: &str) -> Result<usize>;
}

/// Telegram Bot API sender, one message per chat
pub struct TelegramNotifier {
    client: Client,
    token: String,
    chat_ids: Vec<String>,
    base_url: String,
}

impl TelegramNotifier {
    pub fn new(token: &str, chat_ids: Vec<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client"),
            token: token.to_string(),
            chat_ids,
            base_url: "https://api.telegram.org".to_string(),
        }
    }

    async fn send_to(&self, chat_id: &str, text: &str) -> Result<()> {
        let url = format!("{}/bot{}/sendMessage", self.base_url, self.token);
        let response = self
            .client
            .post(&url)
            .json(&json!({
                "chat_id": chat_id,
                "text": text,
                "parse_mode": "Markdown",
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Telegram error {}: {}", status, body);
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str) -> Result<usize> {
        let chunks = split_message(text, TELEGRAM_MESSAGE_LIMIT);
        let mut delivered = 0;

        // A failing chat must not stop delivery to the others
        for chat_id in &self.chat_ids {
            let mut ok = true;
            for chunk in &chunks {
                if let Err(e) = self.send_to(chat_id, chunk).await {
                    warn!(chat_id = %chat_id, error = %e, "Failed to send message");
                    ok = false;
                    break;
                }
            }
            if ok {
                info!(chat_id = %chat_id, parts = chunks.len(), "Message sent");
                delivered += 1;
            }
        }
        Ok(delivered)
    }
}

/// Prints messages instead of sending them
#[derive(Debug, Default)]
pub struct StdoutNotifier;

#[async_trait]
impl Notifier for StdoutNotifier {
    async fn send(&self, text: &str) -> Result<usize> {
        println!("{text}");
        Ok(1)
    }
}
