//! # NewsRelay Core
//! Shared types, traits, errors and configuration.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::RelayConfig;
pub use error::{RelayError, Result};
pub use traits::{FeedFetcher, Notifier};
pub use types::{CycleResult, DeliveryTarget, DisplayItem, EntityKey, NotificationItem};
