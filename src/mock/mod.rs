//! In-memory platform for tests and offline pushes.
//!
//! [`InMemoryProvider`] implements the full provider interface over a
//! serializable [`RemoteState`], stamps server metadata on created elements
//! and supports per-call failure injection for exercising error paths.

mod failure;
mod provider;
mod state;

pub use failure::{FailureConfig, FailureInjector, ProviderCall};
pub use provider::{InMemoryProvider, SnapshotError};
pub use state::{RemoteState, BUILTIN_NAMESPACES};
