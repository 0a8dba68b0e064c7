//! Tuning knobs for the sync core.

use std::time::Duration;

/// Configuration for the cache-and-sync core.
///
/// Every field has a production default; tests shrink the intervals to keep
/// wall-clock time down.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Interval between timer-triggered full refreshes.
    pub periodic_interval: Duration,
    /// Minimum interval between successive refreshes of the same search.
    pub refresh_cooldown: Duration,
    /// Maximum work-item ids per batched fetch request.
    pub work_item_batch_size: usize,
    /// Build rows older than this are pruned.
    pub build_retention: Duration,
    /// Saved-query join rows older than this are pruned.
    pub query_work_item_ttl: Duration,
    /// My-work-items join rows older than this are pruned. Much tighter than
    /// the saved-query TTL: the result set is user-local and volatile.
    pub my_work_items_ttl: Duration,
    /// An existing build-definition row is overwritten only after this much
    /// time has passed since its last update.
    pub definition_update_threshold: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            periodic_interval: Duration::from_secs(10 * 60),
            refresh_cooldown: Duration::from_secs(3 * 60),
            work_item_batch_size: 200,
            build_retention: Duration::from_secs(7 * 24 * 60 * 60),
            query_work_item_ttl: Duration::from_secs(7 * 24 * 60 * 60),
            my_work_items_ttl: Duration::from_secs(2 * 60),
            definition_update_threshold: Duration::from_secs(4 * 60 * 60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_knobs() {
        let c = SyncConfig::default();
        assert_eq!(c.periodic_interval, Duration::from_secs(600));
        assert_eq!(c.refresh_cooldown, Duration::from_secs(180));
        assert_eq!(c.work_item_batch_size, 200);
        assert_eq!(c.build_retention, Duration::from_secs(604_800));
        assert_eq!(c.query_work_item_ttl, Duration::from_secs(604_800));
        assert_eq!(c.my_work_items_ttl, Duration::from_secs(120));
        assert_eq!(c.definition_update_threshold, Duration::from_secs(14_400));
    }
}
