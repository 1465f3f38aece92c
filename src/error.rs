//! Error types for the workspace core
//! Load and mutation failures are reportable to the UI; stale async results
//! are discarded internally and never surface here

use uuid::Uuid;

/// A failed memory fetch for one bundle
///
/// Kept `Clone` so it can flow through the shared in-flight load future to
/// every caller awaiting the same fetch.
#[derive(Debug, Clone, thiserror::Error)]
#[error("loading memories for bundle {bundle_id} failed: {message}")]
pub struct LoadError {
    pub bundle_id: Uuid,
    pub message: String,
}

/// Errors from the remote data service
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid service configuration: {0}")]
    Config(String),
}

/// Errors surfaced to workspace callers
#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    /// A bundle's memory fetch failed; the bucket is marked failed and is
    /// only retried by a later explicit expand/retry
    #[error(transparent)]
    Load(#[from] LoadError),

    /// The service rejected a create/update/delete; local state is untouched
    #[error("{op} rejected: {source}")]
    Mutation {
        op: &'static str,
        source: ServiceError,
    },

    /// Moving the bundle under the requested parent would create a cycle.
    /// Checked before any network call; the backend does not guarantee it.
    #[error("moving bundle {bundle_id} under {new_parent_id} would create a cycle")]
    Cycle { bundle_id: Uuid, new_parent_id: Uuid },

    #[error("bundle {bundle_id} no longer exists")]
    UnknownBundle { bundle_id: Uuid },

    #[error("memory {memory_id} is not present in any loaded bundle")]
    UnknownMemory { memory_id: Uuid },
}

pub type WorkspaceResult<T> = Result<T, WorkspaceError>;
