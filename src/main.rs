//! # NewsRelay — department news relay
//!
//! Polls the student news portal and relays unseen notifications to a chat
//! channel, on demand and every day at the configured times.
//!
//! Usage:
//!   newsrelay check 5                # One check for department 5, now
//!   newsrelay check 5 --dry-run      # Same, printing instead of sending
//!   newsrelay run                    # Check every entity, then daily at 09:00/18:00
//!   newsrelay seen 5                 # How many ids are recorded as delivered

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use newsrelay_channels::cli::ConsoleNotifier;
use newsrelay_core::config::RelayConfig;
use newsrelay_core::traits::Notifier;
use newsrelay_core::types::{DeliveryTarget, EntityKey};
use newsrelay_scheduler::{
    Dispatcher, DryRunSeenStore, FailureLog, FileSeenStore, Scheduler, SeenStore, SqliteSeenStore,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "newsrelay",
    version,
    about = "📰 NewsRelay — relays new department notifications to chat"
)]
struct Cli {
    /// Config file (default: ~/.newsrelay/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one check for an entity now
    Check {
        /// Entity key (department code)
        entity: String,
        /// Print to the console instead of sending
        #[arg(long)]
        dry_run: bool,
        /// Channel override (required for entities missing from the config)
        #[arg(long)]
        channel: Option<String>,
        /// Recipient of private acknowledgments
        #[arg(long)]
        recipient: Option<String>,
    },
    /// Check every configured entity, then keep checking on schedule until Ctrl-C
    Run,
    /// Show how many notifications are recorded as delivered for an entity
    Seen {
        entity: String,
    },
}

fn build_store(config: &RelayConfig) -> Result<Arc<dyn SeenStore>> {
    let data_dir = config.data_path();
    let store: Arc<dyn SeenStore> = match config.store.backend.as_str() {
        "sqlite" => Arc::new(SqliteSeenStore::open(&data_dir.join("seen.db"))?),
        _ => Arc::new(FileSeenStore::new(&data_dir.join("seen"))),
    };
    Ok(store)
}

/// `dry_run` keeps the real seen record untouched.
fn build_scheduler(config: &RelayConfig, dry_run: bool) -> Result<Scheduler> {
    let fetcher = newsrelay_sources::create_fetcher(config)?;
    let mut store = build_store(config)?;
    if dry_run {
        store = Arc::new(DryRunSeenStore::new(store));
    }
    let dispatcher = Dispatcher::new(
        fetcher,
        store,
        config.page_size()?,
        config.fetch_timeout(),
    );
    let log = FailureLog::new(&config.data_path().join("log.txt"));
    Ok(Scheduler::new(Arc::new(dispatcher)).with_failure_log(log))
}

async fn check(
    config: &RelayConfig,
    entity: &str,
    dry_run: bool,
    channel: Option<String>,
    recipient: Option<String>,
) -> Result<()> {
    let configured = config.entity(entity);
    let mut target = match (channel, configured) {
        (Some(channel), _) => DeliveryTarget::channel(channel),
        (None, Some(e)) => e.target(),
        (None, None) if dry_run => DeliveryTarget::channel("console"),
        (None, None) => anyhow::bail!("entity '{entity}' is not configured; pass --channel"),
    };
    if let Some(recipient) = recipient {
        target = target.with_recipient(recipient);
    }

    let notifier: Arc<dyn Notifier> = if dry_run {
        Arc::new(ConsoleNotifier::new())
    } else {
        newsrelay_channels::create_notifier(config)?
    };

    let scheduler = build_scheduler(config, dry_run)?;
    let key = EntityKey::new(entity);
    let result = scheduler
        .trigger_once(&key, notifier.as_ref(), &target)
        .await
        .with_context(|| format!("check for '{entity}' failed"))?;

    if result.delivered == 0 {
        println!("📭 No new notifications for '{}' ({} on the feed)", entity, result.fetched);
    } else {
        println!("📬 Delivered {} new notification(s) for '{}'", result.delivered, entity);
    }
    Ok(())
}

async fn run(config: &RelayConfig) -> Result<()> {
    if config.entities.is_empty() {
        anyhow::bail!("no [[entities]] configured");
    }
    let notifier = newsrelay_channels::create_notifier(config)?;
    let times = config.schedule.times()?;
    let scheduler = build_scheduler(config, false)?;

    println!("📰 NewsRelay v{}", env!("CARGO_PKG_VERSION"));
    println!("   📂 Data Dir:  {}", config.data_path().display());
    println!("   🔔 Notifier:  {}", notifier.name());
    println!(
        "   ⏰ Schedule:  {}",
        times.iter().map(|t| t.format("%H:%M").to_string()).collect::<Vec<_>>().join(", ")
    );
    println!();

    for entity in &config.entities {
        let key = entity.entity_key();
        let target = entity.target();
        tracing::info!("Tracking '{}' ({})", entity.display_name(), key);
        if let Err(e) = scheduler.trigger_once(&key, notifier.as_ref(), &target).await {
            tracing::warn!("⚠️ Initial check for '{}' failed: {e}", key);
        }
        scheduler.register_recurring(&key, notifier.clone(), target, &times);
    }

    tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
    println!("\n👋 Shutting down");
    scheduler.shutdown();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "newsrelay=debug,newsrelay_scheduler=debug,newsrelay_sources=debug,newsrelay_channels=debug"
    } else {
        "newsrelay=info,newsrelay_scheduler=info,newsrelay_sources=info,newsrelay_channels=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let config = match &cli.config {
        Some(path) => RelayConfig::load_from(path)?,
        None => RelayConfig::load()?,
    };
    config.validate()?;

    match cli.command {
        Command::Check {
            entity,
            dry_run,
            channel,
            recipient,
        } => check(&config, &entity, dry_run, channel, recipient).await,
        Command::Run => run(&config).await,
        Command::Seen { entity } => {
            let store = build_store(&config)?;
            let seen = store.load(&EntityKey::new(entity.as_str())).await?;
            println!("{} notification(s) recorded for '{}' ({} store)", seen.len(), entity, store.name());
            Ok(())
        }
    }
}
