//! # NewsRelay Channels
//! Chat platform notifiers.

pub mod cli;
pub mod discord;
pub mod telegram;

use std::sync::Arc;

use newsrelay_core::config::RelayConfig;
use newsrelay_core::error::{RelayError, Result};
use newsrelay_core::traits::Notifier;

/// Create the configured notifier. Discord wins when both are configured.
pub fn create_notifier(config: &RelayConfig) -> Result<Arc<dyn Notifier>> {
    if let Some(discord) = &config.discord
        && !discord.bot_token.is_empty()
    {
        return Ok(Arc::new(discord::DiscordNotifier::new(&discord.bot_token)));
    }
    if let Some(telegram) = &config.telegram
        && !telegram.bot_token.is_empty()
    {
        return Ok(Arc::new(telegram::TelegramNotifier::new(&telegram.bot_token)));
    }
    Err(RelayError::Config(
        "no notifier configured (set DISCORD_TOKEN or TELEGRAM_BOT_TOKEN)".into(),
    ))
}
