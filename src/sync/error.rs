//! Sync error types.

use orgsync_config::ConfigError;
use thiserror::Error;

use super::operation::{ElementType, SyncOperation};
use crate::provider::ProviderError;

/// Mutation that was attempted and failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationFailure {
    pub element_type: ElementType,
    pub element_name: String,
    pub action: MutationAction,
    pub error: ProviderError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationAction {
    Create,
    Delete,
    Replace,
}

impl std::fmt::Display for MutationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:?} {} '{}': {}",
            self.action, self.element_type, self.element_name, self.error
        )
    }
}

/// Errors returned by a push.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Config could not be parsed or an include could not be loaded.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Config parsed but is not acceptable for a push.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("no categories selected for sync")]
    NoCategoriesSelected,

    /// Listing the current remote state failed; this and later categories
    /// were not reconciled.
    #[error("failed to fetch remote {element_type} state: {source}")]
    RemoteFetch {
        element_type: ElementType,
        #[source]
        source: ProviderError,
    },

    /// Some mutations failed. `operations` holds everything computed up to
    /// and including the failing category; the apply is partial.
    #[error("{} remote mutation(s) failed: {}", failures.len(), describe(failures))]
    RemoteMutation {
        failures: Vec<MutationFailure>,
        operations: Vec<SyncOperation>,
    },
}

impl SyncError {
    /// Exit code for the CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            SyncError::Config(_) | SyncError::InvalidConfig(_) | SyncError::NoCategoriesSelected => 1,
            SyncError::RemoteFetch { .. } => 2,
            SyncError::RemoteMutation { .. } => 3,
        }
    }
}

fn describe(failures: &[MutationFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
