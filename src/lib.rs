//! orgsync - declarative org config sync
//!
//! Reconciles a tenant's desired security-platform configuration, written as
//! a set of YAML documents, against the tenant's live state. The engine
//! computes per-category add/remove operations and applies them through a
//! [`provider::RemoteStateProvider`].

pub mod logging;
pub mod mock;
pub mod provider;
pub mod settings;
pub mod sync;

pub use orgsync_config::{
    load_effective_config, merge, ConfigError, EffectiveConfig, FsIncludeLoader, IncludeLoader, MapIncludeLoader,
    OrgConfig,
};
pub use provider::{ProviderError, RemoteStateProvider};
pub use sync::{push_from_root, sync_push, DriftPolicy, ElementType, SyncError, SyncOperation, SyncOptions};
