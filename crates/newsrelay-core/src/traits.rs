//! Seams between the polling pipeline and the outside world.

use async_trait::async_trait;

use crate::error::{DeliveryError, FetchError};
use crate::types::{DeliveryTarget, DisplayItem, EntityKey, NotificationItem};

/// Source of notifications for a tracked entity.
///
/// Returns the full list currently visible upstream, in source order.
/// Session handling, navigation and extraction are the fetcher's concern.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    /// Fetcher name (for logs).
    fn name(&self) -> &str;

    async fn fetch(&self, entity: &EntityKey) -> Result<Vec<NotificationItem>, FetchError>;
}

/// Delivery sink on a chat platform.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Channel name (for logs).
    fn name(&self) -> &str;

    /// Message visible to everyone watching the target channel.
    async fn send_broadcast(&self, target: &DeliveryTarget, text: &str) -> Result<(), DeliveryError>;

    /// Low-visibility message for the recipient.
    async fn send_private(&self, target: &DeliveryTarget, text: &str) -> Result<(), DeliveryError>;

    /// One page of items as a single transport message.
    async fn send_page(&self, target: &DeliveryTarget, items: &[DisplayItem]) -> Result<(), DeliveryError>;
}
