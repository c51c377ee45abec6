//! Discord bot notifier — REST API v10, pages rendered as embeds.

use async_trait::async_trait;
use newsrelay_core::error::DeliveryError;
use newsrelay_core::traits::Notifier;
use newsrelay_core::types::{DeliveryTarget, DisplayItem};
use serde::Deserialize;

const API_BASE: &str = "https://discord.com/api/v10";
/// Embed accent colour.
pub const EMBED_COLOR: u32 = 0x00AE86;
/// Discord rejects more embeds than this in one message.
pub const MAX_EMBEDS: usize = 10;
const MAX_TITLE_CHARS: usize = 256;
/// Message flag: deliver without pinging anyone.
const SUPPRESS_NOTIFICATIONS: u32 = 1 << 12;

pub struct DiscordNotifier {
    bot_token: String,
    client: reqwest::Client,
}

impl DiscordNotifier {
    pub fn new(bot_token: &str) -> Self {
        Self {
            bot_token: bot_token.to_string(),
            client: reqwest::Client::new(),
        }
    }

    async fn post(&self, path: &str, body: &serde_json::Value) -> Result<reqwest::Response, DeliveryError> {
        let resp = self
            .client
            .post(format!("{API_BASE}{path}"))
            .header("Authorization", format!("Bot {}", self.bot_token))
            .json(body)
            .timeout(std::time::Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| DeliveryError::new("discord", format!("send failed: {e}")))?;

        if resp.status().is_success() {
            Ok(resp)
        } else {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            Err(DeliveryError::new("discord", format!("API error {status}: {body}")))
        }
    }

    /// Post a message to a channel.
    pub async fn create_message(&self, channel_id: &str, body: &serde_json::Value) -> Result<(), DeliveryError> {
        self.post(&format!("/channels/{channel_id}/messages"), body).await?;
        tracing::debug!("✅ Discord message sent to channel {}", channel_id);
        Ok(())
    }

    /// Open (or reuse) the DM channel with a user.
    async fn dm_channel(&self, user_id: &str) -> Result<String, DeliveryError> {
        let resp = self
            .post("/users/@me/channels", &serde_json::json!({ "recipient_id": user_id }))
            .await?;
        let channel: DiscordChannel = resp
            .json()
            .await
            .map_err(|e| DeliveryError::new("discord", format!("Invalid DM channel response: {e}")))?;
        Ok(channel.id)
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    fn name(&self) -> &str {
        "discord"
    }

    async fn send_broadcast(&self, target: &DeliveryTarget, text: &str) -> Result<(), DeliveryError> {
        self.create_message(&target.channel, &serde_json::json!({ "content": text }))
            .await
    }

    async fn send_private(&self, target: &DeliveryTarget, text: &str) -> Result<(), DeliveryError> {
        match &target.recipient {
            Some(user) => {
                let dm = self.dm_channel(user).await?;
                self.create_message(&dm, &serde_json::json!({ "content": text }))
                    .await
            }
            None => {
                let body = serde_json::json!({ "content": text, "flags": SUPPRESS_NOTIFICATIONS });
                self.create_message(&target.channel, &body).await
            }
        }
    }

    /// Pages larger than [`MAX_EMBEDS`] go out as several messages, in order.
    async fn send_page(&self, target: &DeliveryTarget, items: &[DisplayItem]) -> Result<(), DeliveryError> {
        for payload in page_payloads(items) {
            self.create_message(&target.channel, &payload).await?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct DiscordChannel {
    id: String,
}

/// Message body with one embed per item.
pub fn page_payload(items: &[DisplayItem]) -> serde_json::Value {
    let embeds: Vec<serde_json::Value> = items
        .iter()
        .map(|item| {
            serde_json::json!({
                "title": truncate(&item.heading(), MAX_TITLE_CHARS),
                "url": item.url,
                "color": EMBED_COLOR,
            })
        })
        .collect();
    serde_json::json!({ "embeds": embeds })
}

/// One message body per group of at most [`MAX_EMBEDS`] items.
pub fn page_payloads(items: &[DisplayItem]) -> Vec<serde_json::Value> {
    items.chunks(MAX_EMBEDS).map(page_payload).collect()
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max_chars - 1).collect();
    out.push('…');
    out
}
