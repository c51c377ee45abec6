//! Telegram Bot notifier — messages via Bot API `sendMessage`.

use async_trait::async_trait;
use newsrelay_core::error::DeliveryError;
use newsrelay_core::traits::Notifier;
use newsrelay_core::types::{DeliveryTarget, DisplayItem};
use serde::Deserialize;

pub struct TelegramNotifier {
    bot_token: String,
    client: reqwest::Client,
}

impl TelegramNotifier {
    pub fn new(bot_token: &str) -> Self {
        Self {
            bot_token: bot_token.to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!("https://api.telegram.org/bot{}/{}", self.bot_token, method)
    }

    /// Send a Markdown message. `silent` suppresses the notification sound.
    pub async fn send_message(&self, chat_id: &str, text: &str, silent: bool) -> Result<(), DeliveryError> {
        let body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "Markdown",
            "disable_web_page_preview": true,
            "disable_notification": silent,
        });

        let response = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&body)
            .timeout(std::time::Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| DeliveryError::new("telegram", format!("sendMessage failed: {e}")))?;

        let result: TelegramApiResponse = response
            .json()
            .await
            .map_err(|e| DeliveryError::new("telegram", format!("Invalid send response: {e}")))?;

        if !result.ok {
            return Err(DeliveryError::new(
                "telegram",
                format!("Send failed: {}", result.description.unwrap_or_default()),
            ));
        }
        tracing::debug!("✅ Telegram message sent to {}", chat_id);
        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send_broadcast(&self, target: &DeliveryTarget, text: &str) -> Result<(), DeliveryError> {
        self.send_message(&target.channel, &escape_markdown(text), false).await
    }

    async fn send_private(&self, target: &DeliveryTarget, text: &str) -> Result<(), DeliveryError> {
        match &target.recipient {
            Some(user) => self.send_message(user, &escape_markdown(text), false).await,
            None => self.send_message(&target.channel, &escape_markdown(text), true).await,
        }
    }

    async fn send_page(&self, target: &DeliveryTarget, items: &[DisplayItem]) -> Result<(), DeliveryError> {
        self.send_message(&target.channel, &render_page(items), false).await
    }
}

#[derive(Debug, Deserialize)]
struct TelegramApiResponse {
    ok: bool,
    description: Option<String>,
}

/// One line per item: `3. [Title](url)`.
pub fn render_page(items: &[DisplayItem]) -> String {
    items
        .iter()
        .map(|item| {
            format!(
                "{}. [{}]({})",
                item.position,
                escape_link_text(&item.title),
                item.url.replace(')', "%29")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Escape Telegram MarkdownV1 special characters.
fn escape_markdown(s: &str) -> String {
    s.replace('_', "\\_")
        .replace('*', "\\*")
        .replace('[', "\\[")
        .replace('`', "\\`")
}

/// Link text cannot contain an unescaped closing bracket either.
fn escape_link_text(s: &str) -> String {
    escape_markdown(s).replace(']', "\\]")
}
