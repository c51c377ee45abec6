//! Per-entity lanes — at most one cycle per tracked entity at a time.
//!
//! An on-demand check and a recurring firing for the same entity would
//! otherwise both diff against the same stale seen set and deliver twice.
//! Different entities never wait on each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use newsrelay_core::types::EntityKey;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Registry of per-entity async locks.
#[derive(Default)]
pub struct EntityLanes {
    lanes: Mutex<HashMap<EntityKey, Arc<AsyncMutex<()>>>>,
}

impl EntityLanes {
    pub fn new() -> Self {
        Self::default()
    }

    fn lane(&self, entity: &EntityKey) -> Arc<AsyncMutex<()>> {
        let mut lanes = self.lanes.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        lanes
            .entry(entity.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Wait for the entity's lane. The lane is held until the guard drops.
    pub async fn acquire(&self, entity: &EntityKey) -> OwnedMutexGuard<()> {
        let lane = self.lane(entity);
        if let Ok(guard) = lane.clone().try_lock_owned() {
            return guard;
        }
        tracing::debug!("⏳ Cycle for '{}' waiting for the running one to finish", entity);
        lane.lock_owned().await
    }

    /// Whether a cycle currently holds the entity's lane.
    pub fn is_busy(&self, entity: &EntityKey) -> bool {
        self.lane(entity).try_lock().is_err()
    }
}
