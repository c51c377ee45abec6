//! # NewsRelay Sources
//!
//! Feed fetchers. The student news portal is the only upstream today: it
//! needs a logged-in session and lists notifications per department.

pub mod html;
pub mod portal;

use std::sync::Arc;

use newsrelay_core::config::RelayConfig;
use newsrelay_core::error::{RelayError, Result};
use newsrelay_core::traits::FeedFetcher;

pub use portal::PortalFetcher;

/// Create the configured fetcher.
pub fn create_fetcher(config: &RelayConfig) -> Result<Arc<dyn FeedFetcher>> {
    let fetcher = PortalFetcher::new(config.portal.clone())
        .map_err(|e| RelayError::Config(format!("portal client: {e}")))?;
    Ok(Arc::new(fetcher))
}
