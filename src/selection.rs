//! Selection and expansion sets
//! Selection is a single global set of memory ids, independent of which
//! bundle each memory lives in; expansion tracks which bundles are open

use std::collections::HashSet;
use uuid::Uuid;

/// Global set of selected memory ids
#[derive(Debug, Clone, Default)]
pub struct SelectionSet {
    ids: HashSet<Uuid>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, memory_id: Uuid) -> bool {
        self.ids.contains(&memory_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.ids.iter().copied()
    }

    /// Flip membership of one memory id
    pub fn toggle(&mut self, memory_id: Uuid) -> bool {
        if self.ids.remove(&memory_id) {
            false
        } else {
            self.ids.insert(memory_id);
            true
        }
    }

    /// Union semantics: ids outside the given set stay selected
    pub fn insert_all(&mut self, memory_ids: impl IntoIterator<Item = Uuid>) {
        self.ids.extend(memory_ids);
    }

    pub fn remove_all(&mut self, memory_ids: impl IntoIterator<Item = Uuid>) {
        for id in memory_ids {
            self.ids.remove(&id);
        }
    }
}

/// Set of bundles whose contents are currently open in the interface
#[derive(Debug, Clone, Default)]
pub struct ExpansionSet {
    open: HashSet<Uuid>,
}

impl ExpansionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, bundle_id: Uuid) -> bool {
        self.open.contains(&bundle_id)
    }

    /// Flip open state; returns true when the bundle is now open
    pub fn toggle(&mut self, bundle_id: Uuid) -> bool {
        if self.open.remove(&bundle_id) {
            false
        } else {
            self.open.insert(bundle_id);
            true
        }
    }

    pub fn remove(&mut self, bundle_id: Uuid) {
        self.open.remove(&bundle_id);
    }

    pub fn retain(&mut self, keep: impl Fn(Uuid) -> bool) {
        self.open.retain(|id| keep(*id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_flips_membership() {
        let mut selection = SelectionSet::new();
        let id = Uuid::new_v4();
        assert!(selection.toggle(id));
        assert!(selection.contains(id));
        assert!(!selection.toggle(id));
        assert!(selection.is_empty());
    }

    #[test]
    fn test_bulk_ops_leave_outside_ids_alone() {
        let mut selection = SelectionSet::new();
        let outside = Uuid::new_v4();
        let inside = Uuid::new_v4();
        selection.toggle(outside);

        selection.insert_all([inside]);
        assert_eq!(selection.len(), 2);

        selection.remove_all([inside]);
        assert!(selection.contains(outside));
        assert!(!selection.contains(inside));
    }
}
