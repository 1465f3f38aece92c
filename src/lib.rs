//! memdeck - client-state core for the memory deck
//! Keeps the bundle tree, per-bundle memory cache, expansion set and the
//! cross-bundle selection consistent while loads and mutations are in flight

pub mod cache;
pub mod config;
pub mod error;
pub mod model;
pub mod selection;
pub mod service;
pub mod state;
pub mod tree;
pub mod workspace;

pub use cache::{Bucket, BucketState};
pub use config::ServiceConfig;
pub use error::{LoadError, ServiceError, WorkspaceError, WorkspaceResult};
pub use model::{Bundle, BundleCreate, BundlePatch, MemoryCreate, MemoryItem, MemoryPatch};
pub use service::{HttpMemoryService, MemoryService};
pub use workspace::MemoryWorkspace;

/// Install the global tracing subscriber, honoring RUST_LOG when set
pub fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("memdeck=debug"));

    let _ = tracing_subscriber::fmt().with_env_filter(env_filter).try_init();
}
