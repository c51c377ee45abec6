//! Scheduler Engine — owns every trigger for the lifetime of the process.
//!
//! Each recurring trigger is a tokio task sleeping until its next wall-clock
//! time; every firing runs its cycle in a separate task so a slow fetch
//! never delays the timer. Triggers are keyed by (entity, time of day), so
//! re-registering an entity does not arm duplicates.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{Local, NaiveTime};
use newsrelay_core::error::CycleError;
use newsrelay_core::traits::Notifier;
use newsrelay_core::types::{CycleResult, DeliveryTarget, EntityKey};
use tokio::task::JoinHandle;

use crate::cron;
use crate::dispatch::Dispatcher;
use crate::failure_log::FailureLog;

/// Private message for a failed on-demand check.
pub const CHECK_FAILED: &str = "There was an error fetching notifications.";

/// Everything a recurring trigger captures at registration time.
struct TriggerBinding {
    dispatcher: Arc<Dispatcher>,
    failure_log: Option<Arc<FailureLog>>,
    entity: EntityKey,
    notifier: Arc<dyn Notifier>,
    target: DeliveryTarget,
}

impl TriggerBinding {
    /// One scheduled firing. Errors are logged, never propagated.
    async fn fire(&self, slot: NaiveTime) {
        let label = slot.format("%H:%M").to_string();
        tracing::info!("🔔 Scheduled check for '{}' ({})", self.entity, label);
        match self
            .dispatcher
            .run_cycle(&self.entity, self.notifier.as_ref(), &self.target)
            .await
        {
            Ok(result) => {
                tracing::info!(
                    "✅ Scheduled check for '{}' done: {} delivered",
                    self.entity,
                    result.delivered
                );
            }
            Err(e) => {
                tracing::warn!("⚠️ Scheduled check for '{}' failed: {e}", self.entity);
                if let Some(log) = &self.failure_log {
                    log.record(&self.entity, &label, &e).await;
                }
            }
        }
    }
}

/// Trigger loop: Armed → Firing → Armed, until aborted.
async fn run_trigger(binding: Arc<TriggerBinding>, slot: NaiveTime) {
    let mut after = Local::now();
    loop {
        let Some(next) = cron::next_daily_run(slot, &after) else {
            tracing::warn!("⚠️ No next run for '{}' at {}, trigger stopped", binding.entity, slot);
            return;
        };
        tracing::debug!("⏰ '{}' next check at {}", binding.entity, next.format("%Y-%m-%d %H:%M"));
        tokio::time::sleep(cron::duration_until(&next, &Local::now())).await;

        let firing = binding.clone();
        tokio::spawn(async move { firing.fire(slot).await });
        after = next;
    }
}

type TriggerMap = BTreeMap<EntityKey, BTreeMap<NaiveTime, JoinHandle<()>>>;

/// The scheduler — on-demand checks plus daily recurring triggers.
pub struct Scheduler {
    dispatcher: Arc<Dispatcher>,
    failure_log: Option<Arc<FailureLog>>,
    triggers: Mutex<TriggerMap>,
}

impl Scheduler {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            dispatcher,
            failure_log: None,
            triggers: Mutex::new(BTreeMap::new()),
        }
    }

    /// Record cycle failures to an append-only log file.
    pub fn with_failure_log(mut self, log: FailureLog) -> Self {
        self.failure_log = Some(Arc::new(log));
        self
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    fn triggers(&self) -> std::sync::MutexGuard<'_, TriggerMap> {
        self.triggers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run one cycle now (on-demand path).
    ///
    /// On failure the recipient is told privately, and the error is logged
    /// and returned.
    pub async fn trigger_once(
        &self,
        entity: &EntityKey,
        notifier: &dyn Notifier,
        target: &DeliveryTarget,
    ) -> Result<CycleResult, CycleError> {
        match self.dispatcher.run_cycle(entity, notifier, target).await {
            Ok(result) => {
                tracing::info!(
                    "✅ On-demand check for '{}': {} new of {} fetched",
                    entity,
                    result.delivered,
                    result.fetched
                );
                Ok(result)
            }
            Err(e) => {
                tracing::warn!("⚠️ On-demand check for '{}' failed: {e}", entity);
                if let Some(log) = &self.failure_log {
                    log.record(entity, "on-demand", &e).await;
                }
                if let Err(send_err) = notifier.send_private(target, CHECK_FAILED).await {
                    tracing::warn!("⚠️ Could not report failure for '{}': {send_err}", entity);
                }
                Err(e)
            }
        }
    }

    /// Arm a daily trigger for each of `times`. Slots already armed for
    /// `entity` keep their original binding. Returns how many were armed.
    pub fn register_recurring(
        &self,
        entity: &EntityKey,
        notifier: Arc<dyn Notifier>,
        target: DeliveryTarget,
        times: &[NaiveTime],
    ) -> usize {
        let binding = Arc::new(TriggerBinding {
            dispatcher: self.dispatcher.clone(),
            failure_log: self.failure_log.clone(),
            entity: entity.clone(),
            notifier,
            target,
        });

        let mut triggers = self.triggers();
        let slots = triggers.entry(entity.clone()).or_default();
        let mut armed = 0;
        for &slot in times {
            if slots.get(&slot).is_some_and(|handle| !handle.is_finished()) {
                tracing::debug!("'{}' already has a trigger at {}", entity, slot.format("%H:%M"));
                continue;
            }
            let handle = tokio::spawn(run_trigger(binding.clone(), slot));
            slots.insert(slot, handle);
            armed += 1;
            tracing::info!("📅 Daily check armed for '{}' at {}", entity, slot.format("%H:%M"));
        }
        armed
    }

    /// Disarm every trigger of `entity`. Cycles already running finish.
    pub fn stop(&self, entity: &EntityKey) -> usize {
        let Some(slots) = self.triggers().remove(entity) else {
            return 0;
        };
        for handle in slots.values() {
            handle.abort();
        }
        tracing::info!("🛑 Stopped {} trigger(s) for '{}'", slots.len(), entity);
        slots.len()
    }

    /// Disarm everything.
    pub fn shutdown(&self) {
        let triggers = std::mem::take(&mut *self.triggers());
        let count: usize = triggers.values().map(BTreeMap::len).sum();
        for handle in triggers.values().flat_map(BTreeMap::values) {
            handle.abort();
        }
        if count > 0 {
            tracing::info!("🛑 Scheduler shut down ({} trigger(s) disarmed)", count);
        }
    }

    /// Armed (entity, time of day) pairs.
    pub fn registrations(&self) -> Vec<(EntityKey, NaiveTime)> {
        self.triggers()
            .iter()
            .flat_map(|(entity, slots)| {
                slots
                    .iter()
                    .filter(|(_, handle)| !handle.is_finished())
                    .map(move |(slot, _)| (entity.clone(), *slot))
            })
            .collect()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
