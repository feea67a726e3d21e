//! Remote state provider interface.
//!
//! The platform API is an external collaborator: this module only defines
//! what the sync engine needs from it. [`adapters`] wraps a provider into one
//! [`ElementStore`](crate::sync::ElementStore) per category.

pub mod adapters;

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use orgsync_config::{
    ArtifactRule, DrRule, ExfilEvent, ExfilWatch, FpRule, InstallationKey, IntegrityRule, Output,
    YaraRule, YaraSource,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors reported by a provider call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The element or setting does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The platform refused the request.
    #[error("rejected: {0}")]
    Rejected(String),

    /// The platform could not be reached or failed internally.
    #[error("unavailable: {0}")]
    Unavailable(String),
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Server-assigned metadata. Never part of content comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// One element as held by the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Remote<T> {
    pub body: T,

    #[serde(default)]
    pub meta: RemoteMeta,
}

impl<T> Remote<T> {
    /// Element without any server metadata.
    pub fn new(body: T) -> Self {
        Self {
            body,
            meta: RemoteMeta::default(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.meta.id = Some(id.into());
        self
    }

    /// Remote identifier, if the platform assigned one.
    pub fn id(&self) -> Option<&str> {
        self.meta.id.as_deref()
    }
}

/// Access to one tenant's live configuration.
///
/// Calls are blocking. Listing calls return the full current set for the
/// category; mutating calls act on a single element.
pub trait RemoteStateProvider {
    /// Subscribed resources, by resource category.
    fn resources(&self) -> ProviderResult<BTreeMap<String, BTreeSet<String>>>;
    fn resource_subscribe(&mut self, category: &str, name: &str) -> ProviderResult<()>;
    fn resource_unsubscribe(&mut self, category: &str, name: &str) -> ProviderResult<()>;

    /// Every detection rule namespace the tenant has.
    fn dr_rule_namespaces(&self) -> ProviderResult<Vec<String>>;
    fn dr_rules(&self, namespace: &str) -> ProviderResult<BTreeMap<String, Remote<DrRule>>>;
    fn dr_rule_add(&mut self, namespace: &str, name: &str, rule: &DrRule) -> ProviderResult<()>;
    fn dr_rule_delete(&mut self, namespace: &str, name: &str) -> ProviderResult<()>;

    fn fp_rules(&self) -> ProviderResult<BTreeMap<String, Remote<FpRule>>>;
    fn fp_rule_add(&mut self, name: &str, rule: &FpRule) -> ProviderResult<()>;
    fn fp_rule_delete(&mut self, name: &str) -> ProviderResult<()>;

    fn outputs(&self) -> ProviderResult<BTreeMap<String, Remote<Output>>>;
    fn output_add(&mut self, name: &str, output: &Output) -> ProviderResult<()>;
    fn output_delete(&mut self, name: &str) -> ProviderResult<()>;

    fn integrity_rules(&self) -> ProviderResult<BTreeMap<String, Remote<IntegrityRule>>>;
    fn integrity_rule_add(&mut self, name: &str, rule: &IntegrityRule) -> ProviderResult<()>;
    fn integrity_rule_delete(&mut self, name: &str) -> ProviderResult<()>;

    fn exfil_watches(&self) -> ProviderResult<BTreeMap<String, Remote<ExfilWatch>>>;
    fn exfil_watch_add(&mut self, name: &str, watch: &ExfilWatch) -> ProviderResult<()>;
    fn exfil_watch_delete(&mut self, name: &str) -> ProviderResult<()>;

    fn exfil_events(&self) -> ProviderResult<BTreeMap<String, Remote<ExfilEvent>>>;
    fn exfil_event_add(&mut self, name: &str, event: &ExfilEvent) -> ProviderResult<()>;
    fn exfil_event_delete(&mut self, name: &str) -> ProviderResult<()>;

    fn artifact_rules(&self) -> ProviderResult<BTreeMap<String, Remote<ArtifactRule>>>;
    fn artifact_rule_add(&mut self, name: &str, rule: &ArtifactRule) -> ProviderResult<()>;
    fn artifact_rule_delete(&mut self, name: &str) -> ProviderResult<()>;

    fn yara_sources(&self) -> ProviderResult<BTreeMap<String, Remote<YaraSource>>>;
    fn yara_source_add(&mut self, name: &str, source: &YaraSource) -> ProviderResult<()>;
    fn yara_source_delete(&mut self, name: &str) -> ProviderResult<()>;

    fn yara_rules(&self) -> ProviderResult<BTreeMap<String, Remote<YaraRule>>>;
    fn yara_rule_add(&mut self, name: &str, rule: &YaraRule) -> ProviderResult<()>;
    fn yara_rule_delete(&mut self, name: &str) -> ProviderResult<()>;

    /// All installation keys; `meta.id` carries the key identifier.
    fn installation_keys(&self) -> ProviderResult<Vec<Remote<InstallationKey>>>;
    /// Create a key and return its identifier.
    fn installation_key_create(&mut self, key: &InstallationKey) -> ProviderResult<String>;
    fn installation_key_delete(&mut self, id: &str) -> ProviderResult<()>;

    /// Current value of an org setting; empty when unset.
    fn org_value_get(&self, name: &str) -> ProviderResult<String>;
    fn org_value_set(&mut self, name: &str, value: &str) -> ProviderResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_id() {
        let remote = Remote::new(InstallationKey::default()).with_id("k-1");
        assert_eq!(remote.id(), Some("k-1"));
        assert_eq!(Remote::new(()).id(), None);
    }

    #[test]
    fn test_meta_skipped_when_empty() {
        let json = serde_json::to_value(Remote::new(YaraSource {
            source: "https://example.com/x.yar".to_string(),
        }))
        .unwrap();
        assert_eq!(json["meta"], serde_json::json!({}));
        let back: Remote<YaraSource> = serde_json::from_value(json).unwrap();
        assert!(back.meta.id.is_none());
    }
}
