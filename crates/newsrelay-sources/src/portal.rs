//! Student news portal fetcher — login, then walk the department listing.
//!
//! Every fetch starts a fresh cookie session: log in on the portal, visit
//! the news home page so the session carries over, then request listing
//! pages until one adds nothing new.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use newsrelay_core::config::PortalConfig;
use newsrelay_core::error::FetchError;
use newsrelay_core::traits::FeedFetcher;
use newsrelay_core::types::{EntityKey, NotificationItem};

use crate::html;

const USER_AGENT: &str = concat!("newsrelay/", env!("CARGO_PKG_VERSION"));

pub struct PortalFetcher {
    config: PortalConfig,
    request_timeout: Duration,
}

impl PortalFetcher {
    pub fn new(config: PortalConfig) -> Result<Self, FetchError> {
        if !config.detail_url.contains("{id}") {
            return Err(FetchError::Parse("detail_url must contain {id}".into()));
        }
        if !config.listing_url.contains("{key}") {
            return Err(FetchError::Parse("listing_url must contain {key}".into()));
        }
        let request_timeout = Duration::from_secs(config.request_timeout_secs.max(1));
        Ok(Self {
            config,
            request_timeout,
        })
    }

    /// Fresh client with its own cookie jar.
    fn session(&self) -> Result<reqwest::Client, FetchError> {
        reqwest::Client::builder()
            .cookie_store(true)
            .user_agent(USER_AGENT)
            .timeout(self.request_timeout)
            .danger_accept_invalid_certs(self.config.accept_invalid_certs)
            .build()
            .map_err(|e| FetchError::Network(format!("client setup: {e}")))
    }

    fn listing_url(&self, entity: &EntityKey, page: u32) -> String {
        self.config
            .listing_url
            .replace("{key}", entity.as_str())
            .replace("{page}", &page.to_string())
    }

    fn paginated(&self) -> bool {
        self.config.listing_url.contains("{page}")
    }

    async fn get_text(&self, client: &reqwest::Client, url: &str) -> Result<String, FetchError> {
        let resp = client.get(url).send().await.map_err(|e| self.request_error(url, e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Network(format!("GET {url}: HTTP {status}")));
        }
        resp.text().await.map_err(|e| self.request_error(url, e))
    }

    fn request_error(&self, url: &str, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout(self.request_timeout)
        } else {
            FetchError::Network(format!("{url}: {e}"))
        }
    }

    /// Post the login form, echoing any hidden fields the page carries.
    async fn login(&self, client: &reqwest::Client) -> Result<(), FetchError> {
        let cfg = &self.config;
        if cfg.username.is_empty() || cfg.password.is_empty() {
            return Err(FetchError::Auth("portal credentials are not configured".into()));
        }

        let login_page = self.get_text(client, &cfg.login_url).await?;
        let mut form = html::hidden_inputs(&login_page);
        form.push((cfg.user_field.clone(), cfg.username.clone()));
        form.push((cfg.password_field.clone(), cfg.password.clone()));

        let resp = client
            .post(&cfg.login_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| self.request_error(&cfg.login_url, e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Auth(format!("login returned HTTP {status}")));
        }
        let body = resp.text().await.map_err(|e| self.request_error(&cfg.login_url, e))?;
        if html::has_input(&body, &cfg.password_field) {
            return Err(FetchError::Auth("portal rejected the credentials".into()));
        }
        tracing::debug!("🔑 Logged in to {}", cfg.login_url);
        Ok(())
    }
}

#[async_trait]
impl FeedFetcher for PortalFetcher {
    fn name(&self) -> &str {
        "portal"
    }

    async fn fetch(&self, entity: &EntityKey) -> Result<Vec<NotificationItem>, FetchError> {
        let client = self.session()?;
        self.login(&client).await?;
        self.get_text(&client, &self.config.home_url).await?;

        let mut items = Vec::new();
        let mut ids = HashSet::new();
        for page in 1..=self.config.max_pages.max(1) {
            let url = self.listing_url(entity, page);
            let body = self.get_text(&client, &url).await?;
            if page > 1 && !html::has_listing(&body) {
                break;
            }
            let page_items = html::parse_listing(&body, &self.config.detail_url)?;

            let before = items.len();
            for item in page_items {
                if ids.insert(item.id.clone()) {
                    items.push(item);
                }
            }
            tracing::debug!("📄 '{}' page {}: {} new item(s)", entity, page, items.len() - before);
            if items.len() == before || !self.paginated() {
                break;
            }
        }

        tracing::info!("📥 Fetched {} notification(s) for '{}'", items.len(), entity);
        Ok(items)
    }
}
