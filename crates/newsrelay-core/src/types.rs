//! Core data model — notifications, tracked entities, delivery targets.

use serde::{Deserialize, Serialize};

/// Key of a tracked entity (a department code on the portal, e.g. "5").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityKey(String);

impl EntityKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the key is safe to embed in a file name.
    pub fn is_path_safe(&self) -> bool {
        !self.0.is_empty()
            && self
                .0
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }
}

impl std::fmt::Display for EntityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A single notification as seen on the upstream feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationItem {
    /// Stable identifier, unique within one entity's feed.
    pub id: String,
    /// Human-readable title.
    pub title: String,
    /// Locator of the full item, derived from `id`.
    pub detail_ref: String,
}

/// Where a cycle's output goes.
///
/// Holds durable identifiers only (channel id, user id), never a
/// short-lived interaction handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeliveryTarget {
    /// Channel (or chat) that receives broadcasts and pages.
    pub channel: String,
    /// User that receives private messages. Falls back to `channel`.
    #[serde(default)]
    pub recipient: Option<String>,
}

impl DeliveryTarget {
    pub fn channel(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            recipient: None,
        }
    }

    pub fn with_recipient(mut self, recipient: impl Into<String>) -> Self {
        self.recipient = Some(recipient.into());
        self
    }
}

/// One rendered entry in a delivered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayItem {
    /// 1-based position across the whole cycle.
    pub position: usize,
    pub title: String,
    pub url: String,
}

impl DisplayItem {
    /// Numbered heading, e.g. "3. Exam schedule".
    pub fn heading(&self) -> String {
        format!("{}. {}", self.position, self.title)
    }
}

/// Summary of a successful cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleResult {
    pub entity: EntityKey,
    /// Items returned by the fetcher.
    pub fetched: usize,
    /// New items delivered (0 means the "no new notifications" ack was sent).
    pub delivered: usize,
}
