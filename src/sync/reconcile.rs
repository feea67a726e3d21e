//! Generic category reconciliation.
//!
//! Every category is diffed the same way; what differs between categories
//! is captured by an [`ElementStore`]: how to list the remote elements, how
//! to create and delete one, how elements are identified and when two bodies
//! count as the same content.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use super::error::{MutationAction, MutationFailure, SyncError};
use super::operation::{ElementType, SyncOperation};
use super::options::DriftPolicy;
use crate::provider::{ProviderResult, Remote};

/// Per-category access to remote state.
pub trait ElementStore {
    type Body;

    fn element_type(&self) -> ElementType;

    /// Identity used to match a desired element with a remote one. The
    /// mapping key by default.
    fn identity(&self, name: &str, _body: &Self::Body) -> String {
        name.to_string()
    }

    /// Current remote elements keyed by identity.
    fn fetch(&self) -> ProviderResult<BTreeMap<String, Remote<Self::Body>>>;

    fn create(&mut self, name: &str, body: &Self::Body) -> ProviderResult<()>;

    fn delete(&mut self, name: &str, remote: &Remote<Self::Body>) -> ProviderResult<()>;

    /// Bring a drifted element back to the desired content.
    fn replace(&mut self, name: &str, desired: &Self::Body, remote: &Remote<Self::Body>) -> ProviderResult<()> {
        self.delete(name, remote)?;
        self.create(name, desired)
    }

    /// Compare user-meaningful content, ignoring server metadata.
    fn content_equals(&self, desired: &Self::Body, remote: &Self::Body) -> bool;
}

/// How a reconcile pass may touch remote state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncMode {
    pub dry_run: bool,
    pub force: bool,
    pub drift: DriftPolicy,
}

/// Result of reconciling one category (or one partition of it).
#[derive(Debug, Default)]
pub struct CategoryOutcome {
    pub operations: Vec<SyncOperation>,
    pub failures: Vec<MutationFailure>,
}

impl CategoryOutcome {
    pub fn extend(&mut self, other: CategoryOutcome) {
        self.operations.extend(other.operations);
        self.failures.extend(other.failures);
    }
}

/// Diff `desired` against the store's remote state and apply the result
/// unless the mode is a dry run.
///
/// Returns an error only when the remote state cannot be fetched. Mutation
/// failures are collected in the outcome and do not stop the pass.
pub fn reconcile<S>(store: &mut S, desired: &BTreeMap<String, S::Body>, mode: SyncMode) -> Result<CategoryOutcome, SyncError>
where
    S: ElementStore + ?Sized,
{
    let element_type = store.element_type();
    let mut remote = store.fetch().map_err(|source| SyncError::RemoteFetch { element_type, source })?;

    let mut outcome = CategoryOutcome::default();

    for (name, body) in desired {
        let identity = store.identity(name, body);
        match remote.remove(&identity) {
            None => {
                debug!(%element_type, name = %identity, "missing remotely");
                outcome.operations.push(SyncOperation::added(element_type, identity.as_str()));
                if !mode.dry_run {
                    let result = store.create(&identity, body);
                    record(&mut outcome, element_type, &identity, MutationAction::Create, result);
                }
            }
            Some(current) if store.content_equals(body, &current.body) => {
                debug!(%element_type, name = %identity, "in sync");
                outcome.operations.push(SyncOperation::unchanged(element_type, identity.as_str()));
            }
            Some(current) => {
                if mode.force && mode.drift == DriftPolicy::Replace {
                    debug!(%element_type, name = %identity, "content drifted, replacing");
                    outcome.operations.push(SyncOperation::replaced(element_type, identity.as_str()));
                    if !mode.dry_run {
                        let result = store.replace(&identity, body, &current);
                        record(&mut outcome, element_type, &identity, MutationAction::Replace, result);
                    }
                } else {
                    debug!(%element_type, name = %identity, "content drifted, keeping remote");
                    outcome.operations.push(SyncOperation::unchanged(element_type, identity.as_str()));
                }
            }
        }
    }

    // Whatever is left exists only remotely.
    for (identity, current) in &remote {
        if !mode.force {
            debug!(%element_type, name = %identity, "remote only, kept");
            outcome.operations.push(SyncOperation::unchanged(element_type, identity.as_str()));
            continue;
        }
        debug!(%element_type, name = %identity, "remote only, removing");
        outcome.operations.push(SyncOperation::removed(element_type, identity.as_str()));
        if !mode.dry_run {
            let result = store.delete(identity, current);
            record(&mut outcome, element_type, identity, MutationAction::Delete, result);
        }
    }

    Ok(outcome)
}

fn record(
    outcome: &mut CategoryOutcome,
    element_type: ElementType,
    name: &str,
    action: MutationAction,
    result: ProviderResult<()>,
) {
    match result {
        Ok(()) => info!(%element_type, name, ?action, "applied"),
        Err(error) => {
            warn!(%element_type, name, ?action, %error, "mutation failed");
            outcome.failures.push(MutationFailure {
                element_type,
                element_name: name.to_string(),
                action,
                error,
            });
        }
    }
}
