//! Workspace snapshot and reducer
//! Every state transition is a pure function from (old snapshot, event) to a
//! new snapshot, dispatched through the single controller. A suspended task
//! resuming with stale closures can therefore never partially overwrite a
//! newer snapshot; its event is either applied in order or discarded whole.

use crate::cache::ItemCache;
use crate::model::{Bundle, MemoryItem};
use crate::selection::{ExpansionSet, SelectionSet};
use crate::tree::BundleTree;
use uuid::Uuid;

/// Immutable snapshot of all four client-state stores
#[derive(Debug, Clone, Default)]
pub struct WorkspaceState {
    pub(crate) tree: BundleTree,
    pub(crate) cache: ItemCache,
    pub(crate) expansion: ExpansionSet,
    pub(crate) selection: SelectionSet,
}

/// A confirmed transition to fold into the snapshot
#[derive(Debug, Clone)]
pub enum WorkspaceEvent {
    /// Full bundle listing arrived; replaces the tree and prunes state for
    /// bundles that disappeared
    BundlesRefreshed { bundles: Vec<Bundle> },
    LoadStarted { bundle_id: Uuid, token: u64 },
    LoadCompleted {
        bundle_id: Uuid,
        token: u64,
        items: Vec<MemoryItem>,
    },
    LoadFailed { bundle_id: Uuid, token: u64 },
    ExpansionToggled { bundle_id: Uuid },
    MemoryToggled { memory_id: Uuid },
    /// Resolved bulk selection over an already-loaded scope
    BulkSelection {
        memory_ids: Vec<Uuid>,
        select: bool,
    },
    MemoryCreated { memory: MemoryItem },
    /// Server-confirmed update; a changed bundle_id doubles as a move
    MemoryUpdated { memory: MemoryItem },
    MemoryDeleted { memory_id: Uuid },
    BundleCreated { bundle: Bundle },
    BundleUpdated { bundle: Bundle },
    BundleDeleted { bundle_id: Uuid },
}

/// Fold one event into a snapshot, producing the next snapshot
pub fn reduce(state: &WorkspaceState, event: WorkspaceEvent) -> WorkspaceState {
    let mut next = state.clone();
    match event {
        WorkspaceEvent::BundlesRefreshed { bundles } => {
            next.tree = BundleTree::from_listing(bundles);
            let tree = &next.tree;

            let mut vanished_items: Vec<Uuid> = Vec::new();
            for id in state.tree.ids().filter(|id| !tree.contains(*id)) {
                vanished_items.extend(state.cache.item_ids(id));
            }
            next.cache.retain_bundles(|id| tree.contains(id));
            next.expansion.retain(|id| tree.contains(id));
            next.selection.remove_all(vanished_items);
            tracing::info!("Refreshed bundle tree: {} bundles", next.tree.len());
        }

        WorkspaceEvent::LoadStarted { bundle_id, token } => {
            if next.tree.contains(bundle_id) {
                next.cache.mark_loading(bundle_id, token);
                tracing::debug!("Loading memories for bundle {}", bundle_id);
            }
        }

        WorkspaceEvent::LoadCompleted {
            bundle_id,
            token,
            items,
        } => {
            // A result for a since-deleted bucket, or for any fetch other
            // than the one the bucket is currently waiting on, is stale
            if !next.tree.contains(bundle_id) {
                tracing::debug!("Discarding load result for deleted bundle {}", bundle_id);
            } else if !next.cache.is_awaiting(bundle_id, token) {
                tracing::debug!("Discarding stale load result for bundle {}", bundle_id);
            } else {
                tracing::debug!("Loaded {} memories for bundle {}", items.len(), bundle_id);
                next.cache.mark_loaded(bundle_id, items);
            }
        }

        WorkspaceEvent::LoadFailed { bundle_id, token } => {
            if next.tree.contains(bundle_id) && next.cache.is_awaiting(bundle_id, token) {
                tracing::warn!("Memory load failed for bundle {}", bundle_id);
                next.cache.mark_failed(bundle_id);
            }
        }

        WorkspaceEvent::ExpansionToggled { bundle_id } => {
            next.expansion.toggle(bundle_id);
        }

        WorkspaceEvent::MemoryToggled { memory_id } => {
            next.selection.toggle(memory_id);
        }

        WorkspaceEvent::BulkSelection { memory_ids, select } => {
            tracing::debug!(
                "Bulk {} of {} memories",
                if select { "select" } else { "deselect" },
                memory_ids.len()
            );
            if select {
                next.selection.insert_all(memory_ids);
            } else {
                next.selection.remove_all(memory_ids);
            }
        }

        WorkspaceEvent::MemoryCreated { memory } => {
            // If the target bucket is not loaded the item stays absent until
            // that bundle's next load; creation must not force-load a closed
            // bundle
            next.cache.insert_item(memory);
        }

        WorkspaceEvent::MemoryUpdated { memory } => {
            match next.cache.remove_item(memory.id) {
                Some((old_bundle, _)) => {
                    if old_bundle != memory.bundle_id {
                        // A move deselects
                        next.selection.remove_all([memory.id]);
                        tracing::debug!(
                            "Memory {} moved from bundle {} to {}",
                            memory.id,
                            old_bundle,
                            memory.bundle_id
                        );
                    }
                    next.cache.insert_item(memory);
                }
                None => {
                    // Target vanished from every loaded bucket while the call
                    // was in flight; insert only lands if the destination is
                    // loaded
                    tracing::debug!("Update for memory {} found no loaded bucket", memory.id);
                    next.cache.insert_item(memory);
                }
            }
        }

        WorkspaceEvent::MemoryDeleted { memory_id } => {
            next.cache.remove_item(memory_id);
            next.selection.remove_all([memory_id]);
        }

        WorkspaceEvent::BundleCreated { bundle } | WorkspaceEvent::BundleUpdated { bundle } => {
            next.tree.upsert(bundle);
        }

        WorkspaceEvent::BundleDeleted { bundle_id } => {
            if let Some(bucket) = next.cache.remove(bundle_id) {
                next.selection
                    .remove_all(bucket.items.iter().map(|m| m.id));
            }
            next.expansion.remove(bundle_id);
            next.tree.remove(bundle_id);
            tracing::debug!("Removed bundle {} from workspace state", bundle_id);
        }
    }
    next
}
