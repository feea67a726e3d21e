//! In-memory [`RemoteStateProvider`].

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use orgsync_config::{
    ArtifactRule, DrRule, ExfilEvent, ExfilWatch, FpRule, InstallationKey, IntegrityRule, Output, YaraRule,
    YaraSource,
};
use thiserror::Error;

use super::failure::{FailureConfig, FailureInjector, ProviderCall};
use super::state::RemoteState;
use crate::provider::{ProviderError, ProviderResult, Remote, RemoteStateProvider};
use crate::sync::ElementType;

type Section<T> = fn(&mut RemoteState) -> &mut BTreeMap<String, Remote<T>>;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to access state snapshot {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid state snapshot {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Provider backed by a [`RemoteState`] held in memory.
///
/// Clones share the same state, so a test can keep a handle for inspection
/// while the engine holds another.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProvider {
    state: Arc<Mutex<RemoteState>>,
    failures: Arc<Mutex<FailureInjector>>,
    /// Successful mutations, in call order.
    mutations: Arc<Mutex<Vec<String>>>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(state: RemoteState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
            ..Default::default()
        }
    }

    /// Load a JSON snapshot. A missing file yields an empty tenant.
    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(source) => {
                return Err(SnapshotError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let state = serde_json::from_str(&text).map_err(|source| SnapshotError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_state(state))
    }

    /// Write the current state as a JSON snapshot.
    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        let json = serde_json::to_string_pretty(&*self.state()).map_err(|source| SnapshotError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json + "\n").map_err(|source| SnapshotError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> RemoteState {
        self.state().clone()
    }

    /// Modify the state directly, bypassing failure injection and the
    /// mutation log.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut RemoteState) -> R) -> R {
        f(&mut self.state())
    }

    pub fn inject_failure(&self, call: ProviderCall, config: FailureConfig) {
        lock(&self.failures).inject(call, config);
    }

    pub fn clear_failures(&self) {
        lock(&self.failures).clear();
    }

    /// Successful mutation calls so far, as `"<action> <type> <name>"`.
    pub fn mutations(&self) -> Vec<String> {
        lock(&self.mutations).clone()
    }

    fn state(&self) -> MutexGuard<'_, RemoteState> {
        lock(&self.state)
    }

    fn check(&self, call: ProviderCall) -> ProviderResult<()> {
        lock(&self.failures).check(&call)
    }

    fn record(&self, action: &str, element_type: ElementType, name: &str) {
        lock(&self.mutations).push(format!("{} {} {}", action, element_type, name));
    }

    fn list<T: Clone>(&self, element_type: ElementType, section: Section<T>) -> ProviderResult<BTreeMap<String, Remote<T>>> {
        self.check(ProviderCall::List(element_type))?;
        Ok(section(&mut self.state()).clone())
    }

    fn add<T: Clone>(&self, element_type: ElementType, section: Section<T>, name: &str, body: &T) -> ProviderResult<()> {
        self.check(ProviderCall::Create(element_type))?;
        {
            let mut state = self.state();
            let remote = state.stamp(element_type.as_str(), body.clone());
            section(&mut state).insert(name.to_string(), remote);
        }
        self.record("create", element_type, name);
        Ok(())
    }

    fn delete<T>(&self, element_type: ElementType, section: Section<T>, name: &str) -> ProviderResult<()> {
        self.check(ProviderCall::Delete(element_type))?;
        if section(&mut self.state()).remove(name).is_none() {
            return Err(ProviderError::NotFound(format!("{} '{}'", element_type, name)));
        }
        self.record("delete", element_type, name);
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RemoteStateProvider for InMemoryProvider {
    fn resources(&self) -> ProviderResult<BTreeMap<String, BTreeSet<String>>> {
        self.check(ProviderCall::List(ElementType::Resource))?;
        Ok(self.state().resources.clone())
    }

    fn resource_subscribe(&mut self, category: &str, name: &str) -> ProviderResult<()> {
        self.check(ProviderCall::Create(ElementType::Resource))?;
        self.state()
            .resources
            .entry(category.to_string())
            .or_default()
            .insert(name.to_string());
        self.record("create", ElementType::Resource, &format!("{}/{}", category, name));
        Ok(())
    }

    fn resource_unsubscribe(&mut self, category: &str, name: &str) -> ProviderResult<()> {
        self.check(ProviderCall::Delete(ElementType::Resource))?;
        {
            let mut state = self.state();
            let names = state
                .resources
                .get_mut(category)
                .ok_or_else(|| ProviderError::NotFound(format!("resource category '{}'", category)))?;
            if !names.remove(name) {
                return Err(ProviderError::NotFound(format!("resource '{}/{}'", category, name)));
            }
            if names.is_empty() {
                state.resources.remove(category);
            }
        }
        self.record("delete", ElementType::Resource, &format!("{}/{}", category, name));
        Ok(())
    }

    fn dr_rule_namespaces(&self) -> ProviderResult<Vec<String>> {
        self.check(ProviderCall::List(ElementType::DrRule))?;
        Ok(self.state().dr_rules.keys().cloned().collect())
    }

    fn dr_rules(&self, namespace: &str) -> ProviderResult<BTreeMap<String, Remote<DrRule>>> {
        self.check(ProviderCall::List(ElementType::DrRule))?;
        Ok(self.state().dr_rules.get(namespace).cloned().unwrap_or_default())
    }

    fn dr_rule_add(&mut self, namespace: &str, name: &str, rule: &DrRule) -> ProviderResult<()> {
        self.check(ProviderCall::Create(ElementType::DrRule))?;
        {
            let mut state = self.state();
            if !state.dr_rules.contains_key(namespace) {
                return Err(ProviderError::Rejected(format!("unknown namespace '{}'", namespace)));
            }
            let stored = DrRule {
                name: name.to_string(),
                namespace: namespace.to_string(),
                ..rule.clone()
            };
            let remote = state.stamp("dr_rule", stored);
            if let Some(rules) = state.dr_rules.get_mut(namespace) {
                rules.insert(name.to_string(), remote);
            }
        }
        self.record("create", ElementType::DrRule, &format!("{}/{}", namespace, name));
        Ok(())
    }

    fn dr_rule_delete(&mut self, namespace: &str, name: &str) -> ProviderResult<()> {
        self.check(ProviderCall::Delete(ElementType::DrRule))?;
        let removed = self
            .state()
            .dr_rules
            .get_mut(namespace)
            .and_then(|rules| rules.remove(name));
        if removed.is_none() {
            return Err(ProviderError::NotFound(format!("rule '{}' in namespace '{}'", name, namespace)));
        }
        self.record("delete", ElementType::DrRule, &format!("{}/{}", namespace, name));
        Ok(())
    }

    fn fp_rules(&self) -> ProviderResult<BTreeMap<String, Remote<FpRule>>> {
        self.list(ElementType::FpRule, |s| &mut s.fp_rules)
    }

    fn fp_rule_add(&mut self, name: &str, rule: &FpRule) -> ProviderResult<()> {
        self.add(ElementType::FpRule, |s| &mut s.fp_rules, name, rule)
    }

    fn fp_rule_delete(&mut self, name: &str) -> ProviderResult<()> {
        self.delete(ElementType::FpRule, |s| &mut s.fp_rules, name)
    }

    fn outputs(&self) -> ProviderResult<BTreeMap<String, Remote<Output>>> {
        self.list(ElementType::Output, |s| &mut s.outputs)
    }

    fn output_add(&mut self, name: &str, output: &Output) -> ProviderResult<()> {
        self.add(ElementType::Output, |s| &mut s.outputs, name, output)
    }

    fn output_delete(&mut self, name: &str) -> ProviderResult<()> {
        self.delete(ElementType::Output, |s| &mut s.outputs, name)
    }

    fn integrity_rules(&self) -> ProviderResult<BTreeMap<String, Remote<IntegrityRule>>> {
        self.list(ElementType::Integrity, |s| &mut s.integrity)
    }

    fn integrity_rule_add(&mut self, name: &str, rule: &IntegrityRule) -> ProviderResult<()> {
        self.add(ElementType::Integrity, |s| &mut s.integrity, name, rule)
    }

    fn integrity_rule_delete(&mut self, name: &str) -> ProviderResult<()> {
        self.delete(ElementType::Integrity, |s| &mut s.integrity, name)
    }

    fn exfil_watches(&self) -> ProviderResult<BTreeMap<String, Remote<ExfilWatch>>> {
        self.list(ElementType::ExfilWatch, |s| &mut s.exfil_watches)
    }

    fn exfil_watch_add(&mut self, name: &str, watch: &ExfilWatch) -> ProviderResult<()> {
        self.add(ElementType::ExfilWatch, |s| &mut s.exfil_watches, name, watch)
    }

    fn exfil_watch_delete(&mut self, name: &str) -> ProviderResult<()> {
        self.delete(ElementType::ExfilWatch, |s| &mut s.exfil_watches, name)
    }

    fn exfil_events(&self) -> ProviderResult<BTreeMap<String, Remote<ExfilEvent>>> {
        self.list(ElementType::ExfilEvent, |s| &mut s.exfil_events)
    }

    fn exfil_event_add(&mut self, name: &str, event: &ExfilEvent) -> ProviderResult<()> {
        self.add(ElementType::ExfilEvent, |s| &mut s.exfil_events, name, event)
    }

    fn exfil_event_delete(&mut self, name: &str) -> ProviderResult<()> {
        self.delete(ElementType::ExfilEvent, |s| &mut s.exfil_events, name)
    }

    fn artifact_rules(&self) -> ProviderResult<BTreeMap<String, Remote<ArtifactRule>>> {
        self.list(ElementType::Artifact, |s| &mut s.artifacts)
    }

    fn artifact_rule_add(&mut self, name: &str, rule: &ArtifactRule) -> ProviderResult<()> {
        self.add(ElementType::Artifact, |s| &mut s.artifacts, name, rule)
    }

    fn artifact_rule_delete(&mut self, name: &str) -> ProviderResult<()> {
        self.delete(ElementType::Artifact, |s| &mut s.artifacts, name)
    }

    fn yara_sources(&self) -> ProviderResult<BTreeMap<String, Remote<YaraSource>>> {
        self.list(ElementType::YaraSource, |s| &mut s.yara_sources)
    }

    fn yara_source_add(&mut self, name: &str, source: &YaraSource) -> ProviderResult<()> {
        self.add(ElementType::YaraSource, |s| &mut s.yara_sources, name, source)
    }

    fn yara_source_delete(&mut self, name: &str) -> ProviderResult<()> {
        self.delete(ElementType::YaraSource, |s| &mut s.yara_sources, name)
    }

    fn yara_rules(&self) -> ProviderResult<BTreeMap<String, Remote<YaraRule>>> {
        self.list(ElementType::YaraRule, |s| &mut s.yara_rules)
    }

    fn yara_rule_add(&mut self, name: &str, rule: &YaraRule) -> ProviderResult<()> {
        self.add(ElementType::YaraRule, |s| &mut s.yara_rules, name, rule)
    }

    fn yara_rule_delete(&mut self, name: &str) -> ProviderResult<()> {
        self.delete(ElementType::YaraRule, |s| &mut s.yara_rules, name)
    }

    fn installation_keys(&self) -> ProviderResult<Vec<Remote<InstallationKey>>> {
        self.check(ProviderCall::List(ElementType::InstallationKey))?;
        Ok(self.state().installation_keys.values().cloned().collect())
    }

    fn installation_key_create(&mut self, key: &InstallationKey) -> ProviderResult<String> {
        self.check(ProviderCall::Create(ElementType::InstallationKey))?;
        let id = {
            let mut state = self.state();
            let remote = state.stamp("key", key.clone());
            let id = remote.id().unwrap_or_default().to_string();
            state.installation_keys.insert(id.clone(), remote);
            id
        };
        self.record("create", ElementType::InstallationKey, &key.desc);
        Ok(id)
    }

    fn installation_key_delete(&mut self, id: &str) -> ProviderResult<()> {
        self.check(ProviderCall::Delete(ElementType::InstallationKey))?;
        let removed = self
            .state()
            .installation_keys
            .remove(id)
            .ok_or_else(|| ProviderError::NotFound(format!("installation key '{}'", id)))?;
        self.record("delete", ElementType::InstallationKey, &removed.body.desc);
        Ok(())
    }

    fn org_value_get(&self, name: &str) -> ProviderResult<String> {
        self.check(ProviderCall::List(ElementType::OrgValue))?;
        Ok(self.state().org_values.get(name).cloned().unwrap_or_default())
    }

    fn org_value_set(&mut self, name: &str, value: &str) -> ProviderResult<()> {
        let (call, action) = if value.is_empty() {
            (ProviderCall::Delete(ElementType::OrgValue), "delete")
        } else {
            (ProviderCall::Create(ElementType::OrgValue), "create")
        };
        self.check(call)?;
        self.state().org_values.insert(name.to_string(), value.to_string());
        self.record(action, ElementType::OrgValue, name);
        Ok(())
    }
}
