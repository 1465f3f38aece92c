//! Workspace controller
//! Owns the single state snapshot, the in-flight load map and the bulk
//! generation counter; every UI entry point goes through here

use crate::cache::{Bucket, BucketState};
use crate::config::ServiceConfig;
use crate::error::{LoadError, ServiceError, WorkspaceError, WorkspaceResult};
use crate::model::{Bundle, BundleCreate, BundlePatch, MemoryCreate, MemoryItem, MemoryPatch};
use crate::service::{HttpMemoryService, MemoryService};
use crate::state::{reduce, WorkspaceEvent, WorkspaceState};
use futures::future::{join_all, BoxFuture, Shared};
use futures::FutureExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

type SharedLoad = Shared<BoxFuture<'static, Result<Vec<MemoryItem>, LoadError>>>;

/// Recover from a poisoned lock; the state is a plain snapshot swap, so the
/// value is still coherent even if a holder panicked
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Client-state controller for the bundle/memory workspace
///
/// All four stores (tree, cache, expansion, selection) live in one immutable
/// snapshot swapped atomically per event. Locks are never held across an
/// await.
pub struct MemoryWorkspace {
    service: Arc<dyn MemoryService>,
    state: Mutex<Arc<WorkspaceState>>,
    /// One entry per bundle with a fetch in flight, keyed by its load token
    in_flight: Mutex<HashMap<Uuid, (u64, SharedLoad)>>,
    load_epoch: AtomicU64,
    bulk_generation: AtomicU64,
}

impl MemoryWorkspace {
    pub fn new(service: Arc<dyn MemoryService>) -> Self {
        Self {
            service,
            state: Mutex::new(Arc::new(WorkspaceState::default())),
            in_flight: Mutex::new(HashMap::new()),
            load_epoch: AtomicU64::new(0),
            bulk_generation: AtomicU64::new(0),
        }
    }

    /// Construct against the real REST backend
    pub fn from_config(config: &ServiceConfig) -> Result<Self, ServiceError> {
        let service = HttpMemoryService::new(config)?;
        Ok(Self::new(Arc::new(service)))
    }

    fn snapshot(&self) -> Arc<WorkspaceState> {
        let guard = lock(&self.state);
        Arc::clone(&*guard)
    }

    fn dispatch(&self, event: WorkspaceEvent) {
        let mut guard = lock(&self.state);
        *guard = Arc::new(reduce(&guard, event));
    }

    // ========================================================================
    // Loading and expansion
    // ========================================================================

    /// Make sure a bundle's memories are cached
    ///
    /// Already-loaded buckets return immediately; a bucket mid-load hands
    /// back the same in-flight fetch, so two near-simultaneous expands issue
    /// exactly one request. Unloaded and failed buckets start a fresh fetch.
    pub async fn ensure_loaded(&self, bundle_id: Uuid) -> WorkspaceResult<()> {
        let (token, load) = {
            let mut in_flight = lock(&self.in_flight);
            if let Some((token, existing)) = in_flight.get(&bundle_id) {
                (*token, existing.clone())
            } else {
                let snapshot = self.snapshot();
                if snapshot.cache.is_loaded(bundle_id) {
                    return Ok(());
                }
                if !snapshot.tree.contains(bundle_id) {
                    return Err(WorkspaceError::UnknownBundle { bundle_id });
                }
                let token = self.load_epoch.fetch_add(1, Ordering::SeqCst) + 1;
                self.dispatch(WorkspaceEvent::LoadStarted { bundle_id, token });
                let service = Arc::clone(&self.service);
                let load = async move {
                    service.list_memories(bundle_id).await.map_err(|e| LoadError {
                        bundle_id,
                        message: e.to_string(),
                    })
                }
                .boxed()
                .shared();
                in_flight.insert(bundle_id, (token, load.clone()));
                (token, load)
            }
        };

        let result = load.await;
        {
            // A second awaiter resumes after the first has already settled
            // this fetch; it must not evict a newer fetch's entry
            let mut in_flight = lock(&self.in_flight);
            if in_flight.get(&bundle_id).map(|(t, _)| *t) == Some(token) {
                in_flight.remove(&bundle_id);
            }
        }

        // Every awaiter of a shared load dispatches; the reducer applies the
        // event only while the bucket is still waiting on this exact fetch,
        // so duplicates, results for deleted bundles and results racing a
        // newer fetch are all discarded
        match result {
            Ok(items) => {
                self.dispatch(WorkspaceEvent::LoadCompleted {
                    bundle_id,
                    token,
                    items,
                });
                Ok(())
            }
            Err(err) => {
                self.dispatch(WorkspaceEvent::LoadFailed { bundle_id, token });
                Err(err.into())
            }
        }
    }

    /// Open or close a bundle in the interface
    ///
    /// Opening triggers a load when the bucket is not yet loaded; closing
    /// leaves the cache alone. Returns true when the bundle is now open.
    pub async fn toggle_expanded(&self, bundle_id: Uuid) -> WorkspaceResult<bool> {
        let snapshot = self.snapshot();
        if !snapshot.tree.contains(bundle_id) {
            return Err(WorkspaceError::UnknownBundle { bundle_id });
        }
        let was_open = snapshot.expansion.contains(bundle_id);
        self.dispatch(WorkspaceEvent::ExpansionToggled { bundle_id });
        if was_open {
            return Ok(false);
        }
        self.ensure_loaded(bundle_id).await?;
        Ok(true)
    }

    // ========================================================================
    // Selection
    // ========================================================================

    /// Flip one memory's membership in the selection, regardless of which
    /// bundle holds it or whether that bundle is open
    pub fn toggle_memory(&self, memory_id: Uuid) {
        self.dispatch(WorkspaceEvent::MemoryToggled { memory_id });
    }

    /// Select or deselect every memory under a bundle, optionally including
    /// all of its descendants
    ///
    /// Any not-yet-loaded bucket in scope is loaded first. The scope, its
    /// item ids and the all-selected check are all recomputed against the
    /// post-load snapshot; evaluating them before the awaits would see empty
    /// buckets and vacuously flip a deselect into a select. A newer
    /// toggle_scope supersedes this one: the older call discards its result
    /// when the generation no longer matches.
    pub async fn toggle_scope(
        &self,
        bundle_id: Uuid,
        include_descendants: bool,
    ) -> WorkspaceResult<()> {
        let snapshot = self.snapshot();
        if !snapshot.tree.contains(bundle_id) {
            return Err(WorkspaceError::UnknownBundle { bundle_id });
        }
        // Consume a generation only for a valid request; a call that fails
        // validation must not supersede an in-flight bulk toggle
        let generation = self.bulk_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let scope = self.scope_of(&snapshot, bundle_id, include_descendants);
        let pending: Vec<Uuid> = scope
            .iter()
            .copied()
            .filter(|id| !snapshot.cache.is_loaded(*id))
            .collect();

        let results = join_all(pending.iter().map(|id| self.ensure_loaded(*id))).await;

        if self.bulk_generation.load(Ordering::SeqCst) != generation {
            tracing::debug!("Bulk toggle for bundle {} superseded, discarding", bundle_id);
            return Ok(());
        }
        for result in results {
            match result {
                // A scope member deleted mid-await is stale, not a failure;
                // the recompute below no longer sees it
                Err(WorkspaceError::UnknownBundle { bundle_id }) => {
                    tracing::debug!("Scope member {} vanished during bulk toggle", bundle_id);
                }
                other => other?,
            }
        }

        // Fresh snapshot: memories may have moved in or out of scope while
        // the loads were in flight
        let snapshot = self.snapshot();
        if !snapshot.tree.contains(bundle_id) {
            tracing::debug!(
                "Bulk toggle target {} deleted during load, discarding",
                bundle_id
            );
            return Ok(());
        }
        let scope = self.scope_of(&snapshot, bundle_id, include_descendants);
        let memory_ids: Vec<Uuid> = scope
            .iter()
            .flat_map(|id| snapshot.cache.item_ids(*id))
            .collect();
        if memory_ids.is_empty() {
            // Nothing in scope: a no-op, not a vacuous select-all
            return Ok(());
        }

        let all_selected = memory_ids
            .iter()
            .all(|id| snapshot.selection.contains(*id));
        self.dispatch(WorkspaceEvent::BulkSelection {
            memory_ids,
            select: !all_selected,
        });
        Ok(())
    }

    fn scope_of(
        &self,
        snapshot: &WorkspaceState,
        bundle_id: Uuid,
        include_descendants: bool,
    ) -> Vec<Uuid> {
        let mut scope = vec![bundle_id];
        if include_descendants {
            scope.extend(snapshot.tree.descendants(bundle_id));
        }
        scope
    }

    // ========================================================================
    // Mutations (confirmed by the service, then reconciled)
    // ========================================================================

    /// Fetch the full bundle listing and rebuild the tree, pruning cache,
    /// expansion and selection state of bundles that no longer exist
    pub async fn refresh_bundles(&self, owner_id: Uuid) -> WorkspaceResult<()> {
        let bundles = self
            .service
            .list_bundles(owner_id)
            .await
            .map_err(|source| WorkspaceError::Mutation {
                op: "refresh bundles",
                source,
            })?;
        self.dispatch(WorkspaceEvent::BundlesRefreshed { bundles });
        Ok(())
    }

    pub async fn create_bundle(&self, payload: BundleCreate) -> WorkspaceResult<Bundle> {
        if let Some(parent_id) = payload.parent_id {
            if !self.snapshot().tree.contains(parent_id) {
                return Err(WorkspaceError::UnknownBundle { bundle_id: parent_id });
            }
        }
        let bundle = self
            .service
            .create_bundle(&payload)
            .await
            .map_err(|source| WorkspaceError::Mutation {
                op: "create bundle",
                source,
            })?;
        self.dispatch(WorkspaceEvent::BundleCreated {
            bundle: bundle.clone(),
        });
        Ok(bundle)
    }

    /// Update a bundle's attributes; a patch carrying `parent_id` is a move
    /// and goes through the same cycle check as [`Self::move_bundle`]
    pub async fn update_bundle(
        &self,
        bundle_id: Uuid,
        patch: BundlePatch,
    ) -> WorkspaceResult<Bundle> {
        let snapshot = self.snapshot();
        if !snapshot.tree.contains(bundle_id) {
            return Err(WorkspaceError::UnknownBundle { bundle_id });
        }
        if let Some(Some(parent)) = patch.parent_id {
            // The backend does not reject cycles, so this check must happen
            // before the call
            if snapshot.tree.would_cycle(bundle_id, Some(parent)) {
                return Err(WorkspaceError::Cycle {
                    bundle_id,
                    new_parent_id: parent,
                });
            }
            if !snapshot.tree.contains(parent) {
                return Err(WorkspaceError::UnknownBundle { bundle_id: parent });
            }
        }
        let bundle = self
            .service
            .update_bundle(bundle_id, &patch)
            .await
            .map_err(|source| WorkspaceError::Mutation {
                op: "update bundle",
                source,
            })?;
        self.dispatch(WorkspaceEvent::BundleUpdated {
            bundle: bundle.clone(),
        });
        Ok(bundle)
    }

    /// Re-parent a bundle; cache and selection are untouched
    pub async fn move_bundle(
        &self,
        bundle_id: Uuid,
        new_parent: Option<Uuid>,
    ) -> WorkspaceResult<Bundle> {
        self.update_bundle(
            bundle_id,
            BundlePatch {
                parent_id: Some(new_parent),
                ..Default::default()
            },
        )
        .await
    }

    /// Delete a bundle, dropping its bucket, its expansion entry and the
    /// selection entries of its cached memories
    pub async fn delete_bundle(&self, bundle_id: Uuid) -> WorkspaceResult<()> {
        if !self.snapshot().tree.contains(bundle_id) {
            return Err(WorkspaceError::UnknownBundle { bundle_id });
        }
        self.service
            .delete_bundle(bundle_id)
            .await
            .map_err(|source| WorkspaceError::Mutation {
                op: "delete bundle",
                source,
            })?;
        self.dispatch(WorkspaceEvent::BundleDeleted { bundle_id });
        Ok(())
    }

    pub async fn create_memory(
        &self,
        bundle_id: Uuid,
        payload: MemoryCreate,
    ) -> WorkspaceResult<MemoryItem> {
        if !self.snapshot().tree.contains(bundle_id) {
            return Err(WorkspaceError::UnknownBundle { bundle_id });
        }
        let memory = self
            .service
            .create_memory(bundle_id, &payload)
            .await
            .map_err(|source| WorkspaceError::Mutation {
                op: "create memory",
                source,
            })?;
        self.dispatch(WorkspaceEvent::MemoryCreated {
            memory: memory.clone(),
        });
        Ok(memory)
    }

    /// Update a memory; a patch carrying a different `bundle_id` moves it,
    /// which also deselects it
    pub async fn update_memory(
        &self,
        memory_id: Uuid,
        patch: MemoryPatch,
    ) -> WorkspaceResult<MemoryItem> {
        let bundle_id = self
            .snapshot()
            .cache
            .bundle_of(memory_id)
            .ok_or(WorkspaceError::UnknownMemory { memory_id })?;
        let memory = self
            .service
            .update_memory(bundle_id, memory_id, &patch)
            .await
            .map_err(|source| WorkspaceError::Mutation {
                op: "update memory",
                source,
            })?;
        self.dispatch(WorkspaceEvent::MemoryUpdated {
            memory: memory.clone(),
        });
        Ok(memory)
    }

    pub async fn delete_memory(&self, memory_id: Uuid) -> WorkspaceResult<()> {
        let bundle_id = self
            .snapshot()
            .cache
            .bundle_of(memory_id)
            .ok_or(WorkspaceError::UnknownMemory { memory_id })?;
        self.service
            .delete_memory(bundle_id, memory_id)
            .await
            .map_err(|source| WorkspaceError::Mutation {
                op: "delete memory",
                source,
            })?;
        self.dispatch(WorkspaceEvent::MemoryDeleted { memory_id });
        Ok(())
    }

    // ========================================================================
    // Snapshot reads
    // ========================================================================

    /// Direct children of a bundle, or the roots for `None`
    pub fn children(&self, parent: Option<Uuid>) -> Vec<Bundle> {
        self.snapshot()
            .tree
            .children(parent)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn bundle(&self, bundle_id: Uuid) -> Option<Bundle> {
        self.snapshot().tree.get(bundle_id).cloned()
    }

    pub fn bundle_count(&self) -> usize {
        self.snapshot().tree.len()
    }

    pub fn bucket(&self, bundle_id: Uuid) -> Option<Bucket> {
        self.snapshot().cache.bucket(bundle_id).cloned()
    }

    pub fn bucket_state(&self, bundle_id: Uuid) -> BucketState {
        self.snapshot().cache.state(bundle_id)
    }

    pub fn is_expanded(&self, bundle_id: Uuid) -> bool {
        self.snapshot().expansion.contains(bundle_id)
    }

    pub fn is_selected(&self, memory_id: Uuid) -> bool {
        self.snapshot().selection.contains(memory_id)
    }

    pub fn selection_len(&self) -> usize {
        self.snapshot().selection.len()
    }

    /// Resolve the selection against the loaded buckets, for handing to the
    /// chat request builder
    pub fn selected_memories(&self) -> Vec<MemoryItem> {
        let snapshot = self.snapshot();
        snapshot
            .cache
            .loaded_items()
            .filter(|m| snapshot.selection.contains(m.id))
            .cloned()
            .collect()
    }
}
