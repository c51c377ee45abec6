//! Console notifier — prints to stdout. Used for dry runs.

use async_trait::async_trait;
use newsrelay_core::error::DeliveryError;
use newsrelay_core::traits::Notifier;
use newsrelay_core::types::{DeliveryTarget, DisplayItem};

#[derive(Debug, Default)]
pub struct ConsoleNotifier;

impl ConsoleNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for ConsoleNotifier {
    fn name(&self) -> &str {
        "console"
    }

    async fn send_broadcast(&self, target: &DeliveryTarget, text: &str) -> Result<(), DeliveryError> {
        println!("📢 [#{}] {}", target.channel, text);
        Ok(())
    }

    async fn send_private(&self, target: &DeliveryTarget, text: &str) -> Result<(), DeliveryError> {
        let to = target.recipient.as_deref().unwrap_or(&target.channel);
        println!("🔒 [@{}] {}", to, text);
        Ok(())
    }

    async fn send_page(&self, target: &DeliveryTarget, items: &[DisplayItem]) -> Result<(), DeliveryError> {
        println!("📰 [#{}] {} item(s)", target.channel, items.len());
        for item in items {
            println!("   {}\n      {}", item.heading(), item.url);
        }
        Ok(())
    }
}
