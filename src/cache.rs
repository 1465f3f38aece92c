//! Per-bundle memory cache
//! Each bundle gets a lazily-loaded bucket; a bucket is only ever reset by
//! an explicit refresh, never implicitly

use crate::model::MemoryItem;
use std::collections::HashMap;
use uuid::Uuid;

/// Load state of one bundle's memory collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BucketState {
    #[default]
    Unloaded,
    Loading,
    Loaded,
    Failed,
}

/// One bundle's cached memories plus load state
///
/// `load_token` identifies the fetch that put the bucket into `Loading`;
/// completion events carrying any other token are stale and must not apply.
#[derive(Debug, Clone, Default)]
pub struct Bucket {
    pub state: BucketState,
    pub load_token: u64,
    pub items: Vec<MemoryItem>,
}

/// Cache of memory buckets keyed by bundle id
#[derive(Debug, Clone, Default)]
pub struct ItemCache {
    buckets: HashMap<Uuid, Bucket>,
}

impl ItemCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bucket(&self, bundle_id: Uuid) -> Option<&Bucket> {
        self.buckets.get(&bundle_id)
    }

    /// Load state, treating an absent bucket as unloaded
    pub fn state(&self, bundle_id: Uuid) -> BucketState {
        self.buckets
            .get(&bundle_id)
            .map(|b| b.state)
            .unwrap_or_default()
    }

    pub fn is_loaded(&self, bundle_id: Uuid) -> bool {
        self.state(bundle_id) == BucketState::Loaded
    }

    pub fn mark_loading(&mut self, bundle_id: Uuid, token: u64) {
        let bucket = self.buckets.entry(bundle_id).or_default();
        bucket.state = BucketState::Loading;
        bucket.load_token = token;
    }

    /// True while the bucket is waiting on exactly this fetch
    pub fn is_awaiting(&self, bundle_id: Uuid, token: u64) -> bool {
        self.buckets
            .get(&bundle_id)
            .map(|b| b.state == BucketState::Loading && b.load_token == token)
            .unwrap_or(false)
    }

    pub fn mark_loaded(&mut self, bundle_id: Uuid, items: Vec<MemoryItem>) {
        self.buckets.insert(
            bundle_id,
            Bucket {
                state: BucketState::Loaded,
                load_token: 0,
                items,
            },
        );
    }

    pub fn mark_failed(&mut self, bundle_id: Uuid) {
        let bucket = self.buckets.entry(bundle_id).or_default();
        bucket.state = BucketState::Failed;
        bucket.items.clear();
    }

    /// Drop a bundle's bucket entirely
    pub fn remove(&mut self, bundle_id: Uuid) -> Option<Bucket> {
        self.buckets.remove(&bundle_id)
    }

    /// Keep only buckets whose bundle still exists
    pub fn retain_bundles(&mut self, keep: impl Fn(Uuid) -> bool) {
        self.buckets.retain(|id, _| keep(*id));
    }

    /// Append an item to its bundle's bucket if that bucket is loaded.
    /// An unloaded bucket picks the item up on its first real load.
    pub fn insert_item(&mut self, item: MemoryItem) -> bool {
        match self.buckets.get_mut(&item.bundle_id) {
            Some(bucket) if bucket.state == BucketState::Loaded => {
                bucket.items.push(item);
                true
            }
            _ => false,
        }
    }

    /// Remove a memory from whichever loaded bucket holds it
    pub fn remove_item(&mut self, memory_id: Uuid) -> Option<(Uuid, MemoryItem)> {
        for (bundle_id, bucket) in self.buckets.iter_mut() {
            if let Some(pos) = bucket.items.iter().position(|m| m.id == memory_id) {
                return Some((*bundle_id, bucket.items.remove(pos)));
            }
        }
        None
    }

    /// The bundle currently holding a memory, if any loaded bucket has it
    pub fn bundle_of(&self, memory_id: Uuid) -> Option<Uuid> {
        self.buckets
            .iter()
            .find(|(_, bucket)| bucket.items.iter().any(|m| m.id == memory_id))
            .map(|(id, _)| *id)
    }

    /// Ids of all memories cached for one bundle
    pub fn item_ids(&self, bundle_id: Uuid) -> Vec<Uuid> {
        self.buckets
            .get(&bundle_id)
            .map(|b| b.items.iter().map(|m| m.id).collect())
            .unwrap_or_default()
    }

    /// All loaded items across every bucket
    pub fn loaded_items(&self) -> impl Iterator<Item = &MemoryItem> {
        self.buckets
            .values()
            .filter(|b| b.state == BucketState::Loaded)
            .flat_map(|b| b.items.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn memory(bundle_id: Uuid) -> MemoryItem {
        MemoryItem {
            id: Uuid::new_v4(),
            bundle_id,
            title: None,
            summary: None,
            original_text: Some("text".to_string()),
            source_type: "chat".to_string(),
            source_id: None,
            is_pinned: false,
            usage_count: 0,
            last_used_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_absent_bucket_is_unloaded() {
        let cache = ItemCache::new();
        assert_eq!(cache.state(Uuid::new_v4()), BucketState::Unloaded);
    }

    #[test]
    fn test_insert_into_unloaded_bucket_is_deferred() {
        let mut cache = ItemCache::new();
        let bundle_id = Uuid::new_v4();
        assert!(!cache.insert_item(memory(bundle_id)));
        assert_eq!(cache.state(bundle_id), BucketState::Unloaded);

        cache.mark_loaded(bundle_id, Vec::new());
        assert!(cache.insert_item(memory(bundle_id)));
        assert_eq!(cache.item_ids(bundle_id).len(), 1);
    }

    #[test]
    fn test_remove_item_reports_owning_bundle() {
        let mut cache = ItemCache::new();
        let bundle_id = Uuid::new_v4();
        let item = memory(bundle_id);
        let item_id = item.id;
        cache.mark_loaded(bundle_id, vec![item]);

        let (owner, removed) = cache.remove_item(item_id).unwrap();
        assert_eq!(owner, bundle_id);
        assert_eq!(removed.id, item_id);
        assert!(cache.remove_item(item_id).is_none());
    }

    #[test]
    fn test_awaiting_tracks_the_current_fetch() {
        let mut cache = ItemCache::new();
        let bundle_id = Uuid::new_v4();
        cache.mark_loading(bundle_id, 1);
        assert!(cache.is_awaiting(bundle_id, 1));
        assert!(!cache.is_awaiting(bundle_id, 2));

        cache.mark_loading(bundle_id, 2);
        assert!(!cache.is_awaiting(bundle_id, 1));

        cache.mark_loaded(bundle_id, Vec::new());
        assert!(!cache.is_awaiting(bundle_id, 2));
    }

    #[test]
    fn test_failed_clears_items() {
        let mut cache = ItemCache::new();
        let bundle_id = Uuid::new_v4();
        cache.mark_loaded(bundle_id, vec![memory(bundle_id)]);
        cache.mark_failed(bundle_id);
        assert_eq!(cache.state(bundle_id), BucketState::Failed);
        assert!(cache.item_ids(bundle_id).is_empty());
    }
}
