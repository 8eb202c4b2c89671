//! Boundary toward the distributed cache-synchronization facility.
//!
//! The refresher only decides which calls to make. Propagation to other
//! nodes, retries and acknowledgement all live behind [`DistributedCache`].

use std::sync::{Arc, Mutex};

use metrics::counter;
use tracing::info;

use crate::domain::entities::{ContentTypeChange, TreeChange};
use crate::domain::types::EntityId;
use crate::util::lock::{Guarded, mutex_lock};

use super::region::{CacheRegion, InvalidationAction};

const RECORDED_CALLS: Guarded = Guarded {
    owner: "cache::facility",
    state: "recorded calls",
};
const METRIC_INVALIDATION_TOTAL: &str = "cache_refresher_invalidation_total";

/// Named invalidation operations exposed by the cache facility.
///
/// Every operation is idempotent and fire-and-forget: callers never wait for
/// remote acknowledgement and never inspect an outcome.
pub trait DistributedCache: Send + Sync {
    fn refresh_by_ids(&self, region: CacheRegion, ids: &[EntityId]);

    fn remove_by_ids(&self, region: CacheRegion, ids: &[EntityId]);

    fn refresh_all(&self, region: CacheRegion);

    fn remove_all(&self, region: CacheRegion);

    /// Forward an ordered content tree change set as a single batch.
    fn refresh_content_cache(&self, changes: &[TreeChange]);

    /// Forward an ordered media tree change set as a single batch.
    fn refresh_media_cache(&self, changes: &[TreeChange]);

    fn refresh_content_type_cache(&self, changes: &[ContentTypeChange]);

    /// Issue the call an [`InvalidationAction`] describes.
    fn apply(&self, action: &InvalidationAction) {
        match action {
            InvalidationAction::Refresh { region, ids } => self.refresh_by_ids(*region, ids),
            InvalidationAction::Remove { region, ids } => self.remove_by_ids(*region, ids),
            InvalidationAction::RefreshAll { region } => self.refresh_all(*region),
            InvalidationAction::RemoveAll { region } => self.remove_all(*region),
            InvalidationAction::RefreshContent { changes } => self.refresh_content_cache(changes),
            InvalidationAction::RefreshMedia { changes } => self.refresh_media_cache(changes),
            InvalidationAction::RefreshContentTypes { changes } => {
                self.refresh_content_type_cache(changes)
            }
        }
    }
}

impl<C: DistributedCache + ?Sized> DistributedCache for Arc<C> {
    fn refresh_by_ids(&self, region: CacheRegion, ids: &[EntityId]) {
        (**self).refresh_by_ids(region, ids)
    }

    fn remove_by_ids(&self, region: CacheRegion, ids: &[EntityId]) {
        (**self).remove_by_ids(region, ids)
    }

    fn refresh_all(&self, region: CacheRegion) {
        (**self).refresh_all(region)
    }

    fn remove_all(&self, region: CacheRegion) {
        (**self).remove_all(region)
    }

    fn refresh_content_cache(&self, changes: &[TreeChange]) {
        (**self).refresh_content_cache(changes)
    }

    fn refresh_media_cache(&self, changes: &[TreeChange]) {
        (**self).refresh_media_cache(changes)
    }

    fn refresh_content_type_cache(&self, changes: &[ContentTypeChange]) {
        (**self).refresh_content_type_cache(changes)
    }
}

/// Facility that records every call instead of propagating it.
#[derive(Debug, Default)]
pub struct RecordingCache {
    actions: Mutex<Vec<InvalidationAction>>,
}

impl RecordingCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, action: InvalidationAction) {
        mutex_lock(&self.actions, &RECORDED_CALLS, "record").push(action);
    }

    /// Calls recorded so far, in call order.
    pub fn actions(&self) -> Vec<InvalidationAction> {
        mutex_lock(&self.actions, &RECORDED_CALLS, "actions").clone()
    }

    /// Drain the recorded calls.
    pub fn take(&self) -> Vec<InvalidationAction> {
        std::mem::take(&mut *mutex_lock(&self.actions, &RECORDED_CALLS, "take"))
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.actions, &RECORDED_CALLS, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of recorded calls targeting `region`.
    pub fn calls_for(&self, region: CacheRegion) -> usize {
        mutex_lock(&self.actions, &RECORDED_CALLS, "calls_for")
            .iter()
            .filter(|action| action.region() == region)
            .count()
    }
}

impl DistributedCache for RecordingCache {
    fn refresh_by_ids(&self, region: CacheRegion, ids: &[EntityId]) {
        self.record(InvalidationAction::Refresh {
            region,
            ids: ids.to_vec(),
        });
    }

    fn remove_by_ids(&self, region: CacheRegion, ids: &[EntityId]) {
        self.record(InvalidationAction::Remove {
            region,
            ids: ids.to_vec(),
        });
    }

    fn refresh_all(&self, region: CacheRegion) {
        self.record(InvalidationAction::RefreshAll { region });
    }

    fn remove_all(&self, region: CacheRegion) {
        self.record(InvalidationAction::RemoveAll { region });
    }

    fn refresh_content_cache(&self, changes: &[TreeChange]) {
        self.record(InvalidationAction::RefreshContent {
            changes: changes.to_vec(),
        });
    }

    fn refresh_media_cache(&self, changes: &[TreeChange]) {
        self.record(InvalidationAction::RefreshMedia {
            changes: changes.to_vec(),
        });
    }

    fn refresh_content_type_cache(&self, changes: &[ContentTypeChange]) {
        self.record(InvalidationAction::RefreshContentTypes {
            changes: changes.to_vec(),
        });
    }
}

/// Decorator that logs and counts every call before forwarding it.
#[derive(Debug)]
pub struct LoggingCache<C> {
    inner: C,
}

impl<C: DistributedCache> LoggingCache<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    fn observe(&self, action: &InvalidationAction) {
        info!(
            action = action.verb(),
            region = %action.region(),
            detail = %action,
            "Cache invalidation issued"
        );
        counter!(METRIC_INVALIDATION_TOTAL, "action" => action.verb()).increment(1);
    }
}

impl<C: DistributedCache> DistributedCache for LoggingCache<C> {
    fn refresh_by_ids(&self, region: CacheRegion, ids: &[EntityId]) {
        self.observe(&InvalidationAction::Refresh {
            region,
            ids: ids.to_vec(),
        });
        self.inner.refresh_by_ids(region, ids);
    }

    fn remove_by_ids(&self, region: CacheRegion, ids: &[EntityId]) {
        self.observe(&InvalidationAction::Remove {
            region,
            ids: ids.to_vec(),
        });
        self.inner.remove_by_ids(region, ids);
    }

    fn refresh_all(&self, region: CacheRegion) {
        self.observe(&InvalidationAction::RefreshAll { region });
        self.inner.refresh_all(region);
    }

    fn remove_all(&self, region: CacheRegion) {
        self.observe(&InvalidationAction::RemoveAll { region });
        self.inner.remove_all(region);
    }

    fn refresh_content_cache(&self, changes: &[TreeChange]) {
        self.observe(&InvalidationAction::RefreshContent {
            changes: changes.to_vec(),
        });
        self.inner.refresh_content_cache(changes);
    }

    fn refresh_media_cache(&self, changes: &[TreeChange]) {
        self.observe(&InvalidationAction::RefreshMedia {
            changes: changes.to_vec(),
        });
        self.inner.refresh_media_cache(changes);
    }

    fn refresh_content_type_cache(&self, changes: &[ContentTypeChange]) {
        self.observe(&InvalidationAction::RefreshContentTypes {
            changes: changes.to_vec(),
        });
        self.inner.refresh_content_type_cache(changes);
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use super::*;
    use crate::domain::types::TreeChangeKind;

    #[test]
    fn recording_cache_keeps_call_order() {
        let cache = RecordingCache::new();
        cache.refresh_all(CacheRegion::PublicAccess);
        cache.remove_by_ids(CacheRegion::Domain, &[EntityId(3)]);

        assert_eq!(
            cache.actions(),
            vec![
                InvalidationAction::RefreshAll {
                    region: CacheRegion::PublicAccess
                },
                InvalidationAction::Remove {
                    region: CacheRegion::Domain,
                    ids: vec![EntityId(3)]
                },
            ]
        );
        assert_eq!(cache.calls_for(CacheRegion::Domain), 1);
    }

    #[test]
    fn apply_replays_an_action() {
        let cache = RecordingCache::new();
        let action = InvalidationAction::RefreshContent {
            changes: vec![
                TreeChange::new(1, TreeChangeKind::RefreshBranch),
                TreeChange::new(2, TreeChangeKind::Remove),
            ],
        };

        cache.apply(&action);
        assert_eq!(cache.take(), vec![action]);
        assert!(cache.is_empty());
    }

    #[test]
    fn logging_cache_forwards_to_inner() {
        let cache = LoggingCache::new(RecordingCache::new());
        cache.refresh_by_ids(CacheRegion::User, &[EntityId(1), EntityId(2)]);
        cache.remove_all(CacheRegion::Macro);

        assert_eq!(cache.inner().len(), 2);
        assert_eq!(cache.inner().calls_for(CacheRegion::User), 1);
    }

    #[test]
    fn recording_cache_recovers_from_poisoned_lock() {
        let cache = RecordingCache::new();

        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = cache.actions.lock().expect("lock should be acquired");
            panic!("poison recording lock");
        }));

        cache.refresh_all(CacheRegion::ApplicationTree);
        assert_eq!(cache.len(), 1);
    }
}
