//! Cycle dispatch — one full fetch → diff → persist → deliver pass.
//!
//! Seen ids are persisted *before* delivery: a broken channel loses the
//! undelivered items instead of redelivering them forever, while a crash
//! before persistence simply redelivers them on the next cycle.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use newsrelay_core::error::{CycleError, DeliveryError, FetchError};
use newsrelay_core::traits::{FeedFetcher, Notifier};
use newsrelay_core::types::{CycleResult, DeliveryTarget, DisplayItem, EntityKey, NotificationItem};

use crate::chunk::chunk;
use crate::diff::diff;
use crate::lanes::EntityLanes;
use crate::store::SeenStore;

/// Private acknowledgment when nothing is new.
pub const NO_NEW_NOTIFICATIONS: &str = "No new notifications found.";
/// Broadcast sent ahead of the pages.
pub const PREAMBLE: &str = "Here are the latest notifications:";

/// Drives polling cycles for any number of entities.
pub struct Dispatcher {
    fetcher: Arc<dyn FeedFetcher>,
    store: Arc<dyn SeenStore>,
    page_size: NonZeroUsize,
    fetch_timeout: Duration,
    lanes: EntityLanes,
}

impl Dispatcher {
    pub fn new(
        fetcher: Arc<dyn FeedFetcher>,
        store: Arc<dyn SeenStore>,
        page_size: NonZeroUsize,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            fetcher,
            store,
            page_size,
            fetch_timeout,
            lanes: EntityLanes::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn SeenStore> {
        &self.store
    }

    pub fn lanes(&self) -> &EntityLanes {
        &self.lanes
    }

    /// Run one cycle for `entity`, delivering through `notifier` to `target`.
    ///
    /// Cycles for the same entity are serialised; the lane is held from the
    /// fetch until the last page is sent.
    pub async fn run_cycle(
        &self,
        entity: &EntityKey,
        notifier: &dyn Notifier,
        target: &DeliveryTarget,
    ) -> Result<CycleResult, CycleError> {
        let _lane = self.lanes.acquire(entity).await;
        tracing::info!(
            "🔎 Checking '{}' via {} (store: {})",
            entity,
            self.fetcher.name(),
            self.store.name()
        );

        let fetched = match tokio::time::timeout(self.fetch_timeout, self.fetcher.fetch(entity)).await {
            Ok(result) => result?,
            Err(_) => return Err(FetchError::Timeout(self.fetch_timeout).into()),
        };

        let seen = self.store.load(entity).await?;
        let new_items = diff(&fetched, &seen);

        if new_items.is_empty() {
            tracing::info!("📭 '{}': {} fetched, nothing new", entity, fetched.len());
            notifier
                .send_private(target, NO_NEW_NOTIFICATIONS)
                .await
                .map_err(|source| delivery_failed(source, 0))?;
            return Ok(CycleResult {
                entity: entity.clone(),
                fetched: fetched.len(),
                delivered: 0,
            });
        }

        let ids: Vec<String> = new_items.iter().map(|item| item.id.clone()).collect();
        self.store.append(entity, &ids).await?;

        let pages = chunk(&display_items(&new_items), self.page_size);
        tracing::info!(
            "📬 '{}': {} new of {} fetched, {} page(s) to {}",
            entity,
            new_items.len(),
            fetched.len(),
            pages.len(),
            notifier.name()
        );

        notifier
            .send_broadcast(target, PREAMBLE)
            .await
            .map_err(|source| delivery_failed(source, ids.len()))?;
        for page in &pages {
            notifier
                .send_page(target, page)
                .await
                .map_err(|source| delivery_failed(source, ids.len()))?;
        }

        Ok(CycleResult {
            entity: entity.clone(),
            fetched: fetched.len(),
            delivered: new_items.len(),
        })
    }
}

fn delivery_failed(source: DeliveryError, persisted: usize) -> CycleError {
    CycleError::Delivery { source, persisted }
}

/// Numbered display records, positions running across all pages.
pub fn display_items(items: &[NotificationItem]) -> Vec<DisplayItem> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| DisplayItem {
            position: i + 1,
            title: item.title.clone(),
            url: item.detail_ref.clone(),
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::store::{DryRunSeenStore, FileSeenStore};
    use async_trait::async_trait;
    use newsrelay_core::error::StorageError;
    use std::collections::HashSet;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// Fetcher returning a scripted feed (or failure).
    pub(crate) struct FakeFetcher {
        pub feed: Mutex<Result<Vec<NotificationItem>, String>>,
        pub delay: Duration,
    }

    impl FakeFetcher {
        pub(crate) fn with(items: Vec<NotificationItem>) -> Self {
            Self {
                feed: Mutex::new(Ok(items)),
                delay: Duration::ZERO,
            }
        }

        pub(crate) fn failing(message: &str) -> Self {
            Self {
                feed: Mutex::new(Err(message.to_string())),
                delay: Duration::ZERO,
            }
        }

        pub(crate) fn set(&self, items: Vec<NotificationItem>) {
            *self.feed.lock().unwrap() = Ok(items);
        }
    }

    #[async_trait]
    impl FeedFetcher for FakeFetcher {
        fn name(&self) -> &str {
            "fake"
        }

        async fn fetch(&self, _entity: &EntityKey) -> Result<Vec<NotificationItem>, FetchError> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.feed.lock().unwrap().clone().map_err(FetchError::Network)
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum Sent {
        Broadcast(String),
        Private(String),
        Page(Vec<DisplayItem>),
    }

    /// Notifier recording everything it is asked to send.
    #[derive(Default)]
    pub(crate) struct RecordingNotifier {
        pub sent: Mutex<Vec<Sent>>,
        pub fail_pages: bool,
    }

    impl RecordingNotifier {
        pub(crate) fn sent(&self) -> Vec<Sent> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        fn name(&self) -> &str {
            "recording"
        }

        async fn send_broadcast(&self, _target: &DeliveryTarget, text: &str) -> Result<(), DeliveryError> {
            self.sent.lock().unwrap().push(Sent::Broadcast(text.into()));
            Ok(())
        }

        async fn send_private(&self, _target: &DeliveryTarget, text: &str) -> Result<(), DeliveryError> {
            self.sent.lock().unwrap().push(Sent::Private(text.into()));
            Ok(())
        }

        async fn send_page(&self, _target: &DeliveryTarget, items: &[DisplayItem]) -> Result<(), DeliveryError> {
            if self.fail_pages {
                return Err(DeliveryError::new("recording", "rejected"));
            }
            self.sent.lock().unwrap().push(Sent::Page(items.to_vec()));
            Ok(())
        }
    }

    pub(crate) fn item(id: &str, title: &str) -> NotificationItem {
        NotificationItem {
            id: id.into(),
            title: title.into(),
            detail_ref: format!("https://studentnews.example/ThongBao/Detail/{id}"),
        }
    }

    pub(crate) fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("newsrelay-test-{name}-{}", std::process::id()));
        std::fs::remove_dir_all(&dir).ok();
        dir
    }

    fn dispatcher(fetcher: Arc<FakeFetcher>, dir: &std::path::Path, page_size: usize) -> Dispatcher {
        Dispatcher::new(
            fetcher,
            Arc::new(FileSeenStore::new(dir)),
            NonZeroUsize::new(page_size).unwrap(),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_end_to_end_scenario() {
        let dir = scratch("dispatch-e2e");
        let fetcher = Arc::new(FakeFetcher::with(vec![item("101", "A"), item("102", "B")]));
        let dispatcher = dispatcher(fetcher, &dir, 10);
        let notifier = RecordingNotifier::default();
        let target = DeliveryTarget::channel("general");
        let entity = EntityKey::from("5");

        let result = dispatcher.run_cycle(&entity, &notifier, &target).await.unwrap();
        assert_eq!(result.delivered, 2);
        let sent = notifier.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0], Sent::Broadcast(PREAMBLE.into()));
        match &sent[1] {
            Sent::Page(items) => {
                assert_eq!(items.len(), 2);
                assert_eq!(items[0].heading(), "1. A");
                assert_eq!(items[1].heading(), "2. B");
                assert!(items[1].url.ends_with("/Detail/102"));
            }
            other => panic!("expected a page, got {other:?}"),
        }
        assert_eq!(std::fs::read_to_string(dir.join("5.txt")).unwrap(), "101\n102");

        let notifier = RecordingNotifier::default();
        let result = dispatcher.run_cycle(&entity, &notifier, &target).await.unwrap();
        assert_eq!(result.delivered, 0);
        assert_eq!(notifier.sent(), vec![Sent::Private(NO_NEW_NOTIFICATIONS.into())]);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_pages_follow_feed_order() {
        let dir = scratch("dispatch-pages");
        let items: Vec<_> = (1..=23).map(|i| item(&i.to_string(), &format!("N{i}"))).collect();
        let dispatcher = dispatcher(Arc::new(FakeFetcher::with(items)), &dir, 10);
        let notifier = RecordingNotifier::default();

        let result = dispatcher
            .run_cycle(&EntityKey::from("5"), &notifier, &DeliveryTarget::channel("c"))
            .await
            .unwrap();
        assert_eq!(result.delivered, 23);

        let pages: Vec<Vec<DisplayItem>> = notifier
            .sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Page(p) => Some(p),
                _ => None,
            })
            .collect();
        assert_eq!(pages.iter().map(Vec::len).collect::<Vec<_>>(), vec![10, 10, 3]);
        assert_eq!(pages[1][0].position, 11);
        assert_eq!(pages[2][2].title, "N23");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_only_new_items_after_feed_grows() {
        let dir = scratch("dispatch-grow");
        let fetcher = Arc::new(FakeFetcher::with(vec![item("1", "one")]));
        let dispatcher = dispatcher(fetcher.clone(), &dir, 10);
        let entity = EntityKey::from("5");
        let target = DeliveryTarget::channel("c");

        dispatcher
            .run_cycle(&entity, &RecordingNotifier::default(), &target)
            .await
            .unwrap();
        fetcher.set(vec![item("2", "two"), item("1", "one")]);

        let notifier = RecordingNotifier::default();
        let result = dispatcher.run_cycle(&entity, &notifier, &target).await.unwrap();
        assert_eq!(result.delivered, 1);
        assert_eq!(result.fetched, 2);

        let seen = dispatcher.store().load(&entity).await.unwrap();
        assert!(seen.contains("1") && seen.contains("2"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_fetch_failure_changes_nothing() {
        let dir = scratch("dispatch-fetch-fail");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("5.txt"), "1\n2").unwrap();
        let dispatcher = dispatcher(Arc::new(FakeFetcher::failing("connection reset")), &dir, 10);
        let notifier = RecordingNotifier::default();

        let err = dispatcher
            .run_cycle(&EntityKey::from("5"), &notifier, &DeliveryTarget::channel("c"))
            .await
            .unwrap_err();
        assert!(matches!(err, CycleError::Fetch(FetchError::Network(_))));
        assert!(notifier.sent().is_empty());
        assert_eq!(std::fs::read(dir.join("5.txt")).unwrap(), b"1\n2");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_fetch_timeout() {
        let dir = scratch("dispatch-timeout");
        let fetcher = Arc::new(FakeFetcher {
            feed: Mutex::new(Ok(vec![item("1", "slow")])),
            delay: Duration::from_secs(30),
        });
        let dispatcher = Dispatcher::new(
            fetcher,
            Arc::new(FileSeenStore::new(&dir)),
            NonZeroUsize::new(10).unwrap(),
            Duration::from_millis(50),
        );
        let notifier = RecordingNotifier::default();

        let err = dispatcher
            .run_cycle(&EntityKey::from("5"), &notifier, &DeliveryTarget::channel("c"))
            .await
            .unwrap_err();
        assert!(matches!(err, CycleError::Fetch(FetchError::Timeout(_))));
        assert!(notifier.sent().is_empty());
        assert!(!dir.join("5.txt").exists());
    }

    #[tokio::test]
    async fn test_delivery_failure_keeps_seen_ids() {
        let dir = scratch("dispatch-deliver-fail");
        let dispatcher = dispatcher(Arc::new(FakeFetcher::with(vec![item("7", "x")])), &dir, 10);
        let notifier = RecordingNotifier {
            fail_pages: true,
            ..Default::default()
        };
        let entity = EntityKey::from("5");

        let err = dispatcher
            .run_cycle(&entity, &notifier, &DeliveryTarget::channel("c"))
            .await
            .unwrap_err();
        assert!(matches!(err, CycleError::Delivery { persisted: 1, .. }));
        assert!(dispatcher.store().load(&entity).await.unwrap().contains("7"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_concurrent_cycles_deliver_once() {
        let dir = scratch("dispatch-concurrent");
        let fetcher = Arc::new(FakeFetcher {
            feed: Mutex::new(Ok(vec![item("1", "a"), item("2", "b")])),
            delay: Duration::from_millis(30),
        });
        let dispatcher = Arc::new(dispatcher(fetcher, &dir, 10));
        let notifier = Arc::new(RecordingNotifier::default());
        let entity = EntityKey::from("5");
        let target = DeliveryTarget::channel("c");

        let (a, b) = tokio::join!(
            dispatcher.run_cycle(&entity, notifier.as_ref(), &target),
            dispatcher.run_cycle(&entity, notifier.as_ref(), &target),
        );
        let mut delivered = vec![a.unwrap().delivered, b.unwrap().delivered];
        delivered.sort();
        assert_eq!(delivered, vec![0, 2]);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_storage_error_aborts_cycle() {
        let dir = scratch("dispatch-load-fail");
        // A directory where the record file should be.
        std::fs::create_dir_all(dir.join("5.txt")).unwrap();
        let dispatcher = dispatcher(Arc::new(FakeFetcher::with(vec![item("1", "a")])), &dir, 10);
        let notifier = RecordingNotifier::default();

        let err = dispatcher
            .run_cycle(&EntityKey::from("5"), &notifier, &DeliveryTarget::channel("c"))
            .await
            .unwrap_err();
        assert!(matches!(err, CycleError::Storage(_)));
        assert_eq!(err.kind(), "storage");
        assert!(notifier.sent().is_empty());
        std::fs::remove_dir_all(&dir).ok();
    }

    /// Store whose reads succeed and whose writes always fail.
    struct ReadOnlyStore;

    #[async_trait]
    impl SeenStore for ReadOnlyStore {
        fn name(&self) -> &str {
            "read-only"
        }

        async fn load(&self, _entity: &EntityKey) -> Result<HashSet<String>, StorageError> {
            Ok(HashSet::new())
        }

        async fn append(&self, entity: &EntityKey, _new_ids: &[String]) -> Result<(), StorageError> {
            Err(StorageError::new(entity.as_str(), "disk full"))
        }
    }

    #[tokio::test]
    async fn test_append_failure_aborts_before_delivery() {
        let dispatcher = Dispatcher::new(
            Arc::new(FakeFetcher::with(vec![item("1", "a"), item("2", "b")])),
            Arc::new(ReadOnlyStore),
            NonZeroUsize::new(10).unwrap(),
            Duration::from_secs(5),
        );
        let notifier = RecordingNotifier::default();

        let err = dispatcher
            .run_cycle(&EntityKey::from("5"), &notifier, &DeliveryTarget::channel("c"))
            .await
            .unwrap_err();
        assert!(matches!(err, CycleError::Storage(_)));
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_delivers_without_touching_record() {
        let dir = scratch("dispatch-dry-run");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("5.txt"), "1").unwrap();
        let real: Arc<dyn SeenStore> = Arc::new(FileSeenStore::new(&dir));
        let dispatcher = Dispatcher::new(
            Arc::new(FakeFetcher::with(vec![item("2", "new"), item("1", "old")])),
            Arc::new(DryRunSeenStore::new(real.clone())),
            NonZeroUsize::new(10).unwrap(),
            Duration::from_secs(5),
        );
        let entity = EntityKey::from("5");
        let target = DeliveryTarget::channel("c");

        let notifier = RecordingNotifier::default();
        let result = dispatcher.run_cycle(&entity, &notifier, &target).await.unwrap();
        assert_eq!(result.delivered, 1);
        assert_eq!(notifier.sent()[0], Sent::Broadcast(PREAMBLE.into()));
        assert_eq!(std::fs::read(dir.join("5.txt")).unwrap(), b"1");
        assert!(!real.load(&entity).await.unwrap().contains("2"));
        std::fs::remove_dir_all(&dir).ok();
    }
}
