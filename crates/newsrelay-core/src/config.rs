//! NewsRelay configuration system.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{RelayError, Result};
use crate::types::{DeliveryTarget, EntityKey};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Directory holding seen records and the failure log.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Max items per delivered message.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Upper bound on one fetch, login and pagination included.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub portal: PortalConfig,
    #[serde(default)]
    pub discord: Option<DiscordConfig>,
    #[serde(default)]
    pub telegram: Option<TelegramConfig>,
    #[serde(default)]
    pub entities: Vec<EntityConfig>,
}

fn default_data_dir() -> String { "~/.newsrelay".into() }
fn default_page_size() -> usize { 10 }
fn default_fetch_timeout_secs() -> u64 { 60 }

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            page_size: default_page_size(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            schedule: ScheduleConfig::default(),
            store: StoreConfig::default(),
            portal: PortalConfig::default(),
            discord: None,
            telegram: None,
            entities: Vec::new(),
        }
    }
}

impl RelayConfig {
    /// Load config from the default path (~/.newsrelay/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            Self::default()
        };
        config.apply_env();
        Ok(config)
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RelayError::Config(format!("Failed to read config: {e}")))?;
        let mut config: Self = toml::from_str(&content)
            .map_err(|e| RelayError::Config(format!("Failed to parse config: {e}")))?;
        config.apply_env();
        Ok(config)
    }

    /// Credentials from the environment win over the file.
    fn apply_env(&mut self) {
        if let Ok(user) = std::env::var("NEWSRELAY_PORTAL_USER") {
            self.portal.username = user;
        }
        if let Ok(password) = std::env::var("NEWSRELAY_PORTAL_PASSWORD") {
            self.portal.password = password;
        }
        if let Ok(token) = std::env::var("DISCORD_TOKEN") {
            self.discord.get_or_insert_with(DiscordConfig::default).bot_token = token;
        }
        if let Ok(token) = std::env::var("TELEGRAM_BOT_TOKEN") {
            self.telegram.get_or_insert_with(TelegramConfig::default).bot_token = token;
        }
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the NewsRelay home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".newsrelay")
    }

    /// Data directory with `~` expanded.
    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.data_dir).to_string())
    }

    pub fn page_size(&self) -> Result<NonZeroUsize> {
        NonZeroUsize::new(self.page_size)
            .ok_or_else(|| RelayError::Config("page_size must be at least 1".into()))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Look up a configured entity by key.
    pub fn entity(&self, key: &str) -> Option<&EntityConfig> {
        self.entities.iter().find(|e| e.key == key)
    }

    /// Check everything that would otherwise fail later at runtime.
    pub fn validate(&self) -> Result<()> {
        self.page_size()?;
        if self.fetch_timeout_secs == 0 {
            return Err(RelayError::Config("fetch_timeout_secs must be at least 1".into()));
        }
        self.schedule.times()?;
        for entity in &self.entities {
            if !EntityKey::new(entity.key.as_str()).is_path_safe() {
                return Err(RelayError::Config(format!(
                    "entity key '{}' may only contain letters, digits, '-' and '_'",
                    entity.key
                )));
            }
        }
        match self.store.backend.as_str() {
            "file" | "sqlite" => Ok(()),
            other => Err(RelayError::Config(format!("unknown store backend '{other}'"))),
        }
    }
}

/// Recurring trigger times.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Local wall-clock times, "HH:MM".
    #[serde(default = "default_times")]
    pub times: Vec<String>,
}

fn default_times() -> Vec<String> {
    vec!["09:00".into(), "18:00".into()]
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self { times: default_times() }
    }
}

impl ScheduleConfig {
    /// Parsed, sorted and de-duplicated trigger times.
    pub fn times(&self) -> Result<Vec<NaiveTime>> {
        let mut parsed = self
            .times
            .iter()
            .map(|t| parse_time_of_day(t))
            .collect::<Result<Vec<_>>>()?;
        parsed.sort();
        parsed.dedup();
        Ok(parsed)
    }
}

/// Parse "HH:MM" (or "HH:MM:SS").
pub fn parse_time_of_day(s: &str) -> Result<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|_| RelayError::Config(format!("invalid time of day '{s}' (expected HH:MM)")))
}

/// Seen-record storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// "file" (newline-delimited record per entity) or "sqlite".
    #[serde(default = "default_store_backend")]
    pub backend: String,
}

fn default_store_backend() -> String { "file".into() }

impl Default for StoreConfig {
    fn default() -> Self {
        Self { backend: default_store_backend() }
    }
}

/// Upstream news portal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    #[serde(default = "default_login_url")]
    pub login_url: String,
    /// Visited after login so the news site picks up the session.
    #[serde(default = "default_home_url")]
    pub home_url: String,
    /// Listing page; `{key}` and `{page}` are substituted.
    #[serde(default = "default_listing_url")]
    pub listing_url: String,
    /// Detail page; `{id}` is substituted.
    #[serde(default = "default_detail_url")]
    pub detail_url: String,
    #[serde(default = "default_user_field")]
    pub user_field: String,
    #[serde(default = "default_password_field")]
    pub password_field: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Stop paginating after this many listing pages.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Some portals serve self-signed certificates.
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

fn default_login_url() -> String { "https://stdportal.tdtu.edu.vn/".into() }
fn default_home_url() -> String { "https://studentnews.tdtu.edu.vn/Home/Index".into() }
fn default_listing_url() -> String {
    "https://studentnews.tdtu.edu.vn/PhongBan/ThongBaoPhongBan?MaDonVi={key}&page={page}".into()
}
fn default_detail_url() -> String { "https://studentnews.tdtu.edu.vn/ThongBao/Detail/{id}".into() }
fn default_user_field() -> String { "txtUser".into() }
fn default_password_field() -> String { "txtPass".into() }
fn default_max_pages() -> u32 { 20 }
fn default_request_timeout_secs() -> u64 { 10 }

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            login_url: default_login_url(),
            home_url: default_home_url(),
            listing_url: default_listing_url(),
            detail_url: default_detail_url(),
            user_field: default_user_field(),
            password_field: default_password_field(),
            username: String::new(),
            password: String::new(),
            max_pages: default_max_pages(),
            request_timeout_secs: default_request_timeout_secs(),
            accept_invalid_certs: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscordConfig {
    #[serde(default)]
    pub bot_token: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
}

/// A tracked entity and where its notifications go.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityConfig {
    /// Department code on the portal.
    pub key: String,
    #[serde(default)]
    pub label: String,
    /// Channel / chat id receiving broadcasts and pages.
    pub channel: String,
    /// User id for private acknowledgments.
    #[serde(default)]
    pub recipient: Option<String>,
}

impl EntityConfig {
    pub fn entity_key(&self) -> EntityKey {
        EntityKey::new(self.key.as_str())
    }

    pub fn target(&self) -> DeliveryTarget {
        DeliveryTarget {
            channel: self.channel.clone(),
            recipient: self.recipient.clone(),
        }
    }

    pub fn display_name(&self) -> &str {
        if self.label.is_empty() { &self.key } else { &self.label }
    }
}
