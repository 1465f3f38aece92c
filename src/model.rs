//! Core data types mirrored from the backend API
//! Bundles form a forest via `parent_id`; each memory belongs to exactly one bundle

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A hierarchical container for memories
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bundle {
    pub id: Uuid,
    pub parent_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
    #[serde(default)]
    pub is_archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single saved memory, owned by one bundle at a time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryItem {
    pub id: Uuid,
    pub bundle_id: Uuid,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub original_text: Option<String>,
    pub source_type: String,
    pub source_id: Option<String>,
    #[serde(default)]
    pub is_pinned: bool,
    #[serde(default)]
    pub usage_count: i64,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Request payloads
// ============================================================================

/// Payload for creating a bundle
#[derive(Debug, Clone, Serialize)]
pub struct BundleCreate {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Uuid>,
}

impl BundleCreate {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            color: None,
            icon: None,
            parent_id: None,
        }
    }
}

/// Partial update for a bundle
///
/// `parent_id` is doubly optional: omitted means "leave the parent alone",
/// `Some(None)` re-roots the bundle, `Some(Some(id))` moves it under `id`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BundlePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_archived: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Option<Uuid>>,
}

/// Payload for saving a new memory into a bundle
#[derive(Debug, Clone, Serialize)]
pub struct MemoryCreate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub original_text: String,
    pub source_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
}

impl MemoryCreate {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            title: None,
            original_text: text.into(),
            source_type: "chat".to_string(),
            source_id: None,
        }
    }
}

/// Partial update for a memory
///
/// A `bundle_id` that differs from the memory's current bundle turns the
/// update into a move.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MemoryPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_pinned: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundle_id: Option<Uuid>,
}

impl MemoryPatch {
    /// Patch that only moves the memory to another bundle
    pub fn move_to(bundle_id: Uuid) -> Self {
        Self {
            bundle_id: Some(bundle_id),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_skips_unset_fields() {
        let patch = MemoryPatch {
            title: Some("renamed".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json, serde_json::json!({ "title": "renamed" }));
    }

    #[test]
    fn test_bundle_patch_reroot_serializes_null_parent() {
        let patch = BundlePatch {
            parent_id: Some(None),
            ..Default::default()
        };
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json, serde_json::json!({ "parent_id": null }));
    }
}
