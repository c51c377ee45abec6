//! Which fetched notifications are new.

use newsrelay_core::types::NotificationItem;
use std::collections::HashSet;

/// Items of `fetched` whose id is not in `seen`, in source order.
///
/// A repeated id within one fetch is kept only at its first occurrence so
/// the seen record never receives the same id twice.
pub fn diff(fetched: &[NotificationItem], seen: &HashSet<String>) -> Vec<NotificationItem> {
    let mut taken: HashSet<&str> = HashSet::new();
    fetched
        .iter()
        .filter(|item| !seen.contains(&item.id) && taken.insert(item.id.as_str()))
        .cloned()
        .collect()
}
