//! Bundle tree queries
//! Bundles are kept in a flat id-keyed map with parent back-references;
//! child lists and descendant sets are derived by scanning, never stored

use crate::model::Bundle;
use std::collections::HashMap;
use uuid::Uuid;

/// Flat arena of bundles forming a forest
#[derive(Debug, Clone, Default)]
pub struct BundleTree {
    bundles: HashMap<Uuid, Bundle>,
}

impl BundleTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the tree from a full server listing
    pub fn from_listing(bundles: Vec<Bundle>) -> Self {
        Self {
            bundles: bundles.into_iter().map(|b| (b.id, b)).collect(),
        }
    }

    pub fn get(&self, id: Uuid) -> Option<&Bundle> {
        self.bundles.get(&id)
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.bundles.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.bundles.keys().copied()
    }

    /// Insert or replace a bundle
    pub fn upsert(&mut self, bundle: Bundle) {
        self.bundles.insert(bundle.id, bundle);
    }

    /// Remove a bundle. Its children are left in place with a dangling
    /// parent_id; the backend owns the cascade policy and a later refresh
    /// reflects it.
    pub fn remove(&mut self, id: Uuid) -> Option<Bundle> {
        self.bundles.remove(&id)
    }

    /// Direct children of `parent` (None for roots), newest first to match
    /// the server's listing order
    pub fn children(&self, parent: Option<Uuid>) -> Vec<&Bundle> {
        let mut children: Vec<&Bundle> = self
            .bundles
            .values()
            .filter(|b| b.parent_id == parent)
            .collect();
        children.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        children
    }

    /// All transitive descendants of `id`, not including `id` itself
    ///
    /// Iterative worklist traversal over a child index built from the current
    /// snapshot, so structural edits during an await elsewhere cannot corrupt
    /// the walk.
    pub fn descendants(&self, id: Uuid) -> Vec<Uuid> {
        let mut by_parent: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for bundle in self.bundles.values() {
            if let Some(parent) = bundle.parent_id {
                by_parent.entry(parent).or_default().push(bundle.id);
            }
        }

        let mut found = Vec::new();
        let mut pending = vec![id];
        while let Some(next) = pending.pop() {
            if let Some(children) = by_parent.get(&next) {
                for child in children {
                    found.push(*child);
                    pending.push(*child);
                }
            }
        }
        found
    }

    /// True when re-parenting `id` under `new_parent` would create a cycle,
    /// i.e. the new parent is `id` itself or one of its descendants
    pub fn would_cycle(&self, id: Uuid, new_parent: Option<Uuid>) -> bool {
        match new_parent {
            None => false,
            Some(parent) => parent == id || self.descendants(id).contains(&parent),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn bundle(name: &str, parent: Option<Uuid>) -> Bundle {
        Bundle {
            id: Uuid::new_v4(),
            parent_id: parent,
            name: name.to_string(),
            description: None,
            color: None,
            icon: None,
            is_archived: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_descendants_transitive() {
        let mut tree = BundleTree::new();
        let root = bundle("root", None);
        let child = bundle("child", Some(root.id));
        let grandchild = bundle("grandchild", Some(child.id));
        let other = bundle("other", None);
        let (root_id, child_id, grandchild_id) = (root.id, child.id, grandchild.id);
        for b in [root, child, grandchild, other] {
            tree.upsert(b);
        }

        let mut found = tree.descendants(root_id);
        found.sort();
        let mut expected = vec![child_id, grandchild_id];
        expected.sort();
        assert_eq!(found, expected);
        assert!(tree.descendants(grandchild_id).is_empty());
    }

    #[test]
    fn test_cycle_detection() {
        let mut tree = BundleTree::new();
        let root = bundle("root", None);
        let child = bundle("child", Some(root.id));
        let (root_id, child_id) = (root.id, child.id);
        tree.upsert(root);
        tree.upsert(child);

        assert!(tree.would_cycle(root_id, Some(root_id)));
        assert!(tree.would_cycle(root_id, Some(child_id)));
        assert!(!tree.would_cycle(child_id, None));
        assert!(!tree.would_cycle(child_id, Some(root_id)));
    }

    #[test]
    fn test_children_of_root() {
        let mut tree = BundleTree::new();
        let a = bundle("a", None);
        let b = bundle("b", Some(a.id));
        let a_id = a.id;
        tree.upsert(a);
        tree.upsert(b);

        let roots = tree.children(None);
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].id, a_id);
        assert_eq!(tree.children(Some(a_id)).len(), 1);
    }
}
