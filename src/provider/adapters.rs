//! [`ElementStore`] implementations over a [`RemoteStateProvider`].

use std::collections::BTreeMap;

use orgsync_config::{
    ArtifactRule, DrRule, ExfilEvent, ExfilWatch, FpRule, InstallationKey, IntegrityRule, Output,
    YaraRule, YaraSource,
};
use tracing::debug;

use super::{ProviderError, ProviderResult, Remote, RemoteStateProvider};
use crate::sync::{ElementStore, ElementType};

/// Org settings the platform recognises. Only these keys are fetched,
/// compared and cleared.
pub const SUPPORTED_ORG_VALUES: &[&str] = &["otx", "pagerduty", "shodan", "twilio", "virustotal"];

type ListFn<T> = fn(&dyn RemoteStateProvider) -> ProviderResult<BTreeMap<String, Remote<T>>>;
type AddFn<T> = fn(&mut dyn RemoteStateProvider, &str, &T) -> ProviderResult<()>;
type DeleteFn = fn(&mut dyn RemoteStateProvider, &str) -> ProviderResult<()>;

/// Store for the categories the provider exposes as a plain name mapping.
pub struct MapStore<'a, T> {
    provider: &'a mut dyn RemoteStateProvider,
    element_type: ElementType,
    list: ListFn<T>,
    add: AddFn<T>,
    delete: DeleteFn,
    equals: fn(&T, &T) -> bool,
}

impl<T> ElementStore for MapStore<'_, T> {
    type Body = T;

    fn element_type(&self) -> ElementType {
        self.element_type
    }

    fn fetch(&self) -> ProviderResult<BTreeMap<String, Remote<T>>> {
        (self.list)(&*self.provider)
    }

    fn create(&mut self, name: &str, body: &T) -> ProviderResult<()> {
        (self.add)(&mut *self.provider, name, body)
    }

    fn delete(&mut self, name: &str, _remote: &Remote<T>) -> ProviderResult<()> {
        (self.delete)(&mut *self.provider, name)
    }

    fn content_equals(&self, desired: &T, remote: &T) -> bool {
        (self.equals)(desired, remote)
    }
}

impl<'a> MapStore<'a, FpRule> {
    pub fn fp_rules(provider: &'a mut dyn RemoteStateProvider) -> Self {
        MapStore {
            provider,
            element_type: ElementType::FpRule,
            list: |p| p.fp_rules(),
            add: |p, name, body| p.fp_rule_add(name, body),
            delete: |p, name| p.fp_rule_delete(name),
            equals: FpRule::equals_content,
        }
    }
}

impl<'a> MapStore<'a, Output> {
    pub fn outputs(provider: &'a mut dyn RemoteStateProvider) -> Self {
        MapStore {
            provider,
            element_type: ElementType::Output,
            list: |p| p.outputs(),
            add: |p, name, body| p.output_add(name, body),
            delete: |p, name| p.output_delete(name),
            equals: Output::equals_content,
        }
    }
}

impl<'a> MapStore<'a, IntegrityRule> {
    pub fn integrity(provider: &'a mut dyn RemoteStateProvider) -> Self {
        MapStore {
            provider,
            element_type: ElementType::Integrity,
            list: |p| p.integrity_rules(),
            add: |p, name, body| p.integrity_rule_add(name, body),
            delete: |p, name| p.integrity_rule_delete(name),
            equals: IntegrityRule::equals_content,
        }
    }
}

impl<'a> MapStore<'a, ExfilWatch> {
    pub fn exfil_watches(provider: &'a mut dyn RemoteStateProvider) -> Self {
        MapStore {
            provider,
            element_type: ElementType::ExfilWatch,
            list: |p| p.exfil_watches(),
            add: |p, name, body| p.exfil_watch_add(name, body),
            delete: |p, name| p.exfil_watch_delete(name),
            equals: ExfilWatch::equals_content,
        }
    }
}

impl<'a> MapStore<'a, ExfilEvent> {
    pub fn exfil_events(provider: &'a mut dyn RemoteStateProvider) -> Self {
        MapStore {
            provider,
            element_type: ElementType::ExfilEvent,
            list: |p| p.exfil_events(),
            add: |p, name, body| p.exfil_event_add(name, body),
            delete: |p, name| p.exfil_event_delete(name),
            equals: ExfilEvent::equals_content,
        }
    }
}

impl<'a> MapStore<'a, ArtifactRule> {
    pub fn artifacts(provider: &'a mut dyn RemoteStateProvider) -> Self {
        MapStore {
            provider,
            element_type: ElementType::Artifact,
            list: |p| p.artifact_rules(),
            add: |p, name, body| p.artifact_rule_add(name, body),
            delete: |p, name| p.artifact_rule_delete(name),
            equals: ArtifactRule::equals_content,
        }
    }
}

impl<'a> MapStore<'a, YaraSource> {
    pub fn yara_sources(provider: &'a mut dyn RemoteStateProvider) -> Self {
        MapStore {
            provider,
            element_type: ElementType::YaraSource,
            list: |p| p.yara_sources(),
            add: |p, name, body| p.yara_source_add(name, body),
            delete: |p, name| p.yara_source_delete(name),
            equals: YaraSource::equals_content,
        }
    }
}

impl<'a> MapStore<'a, YaraRule> {
    pub fn yara_rules(provider: &'a mut dyn RemoteStateProvider) -> Self {
        MapStore {
            provider,
            element_type: ElementType::YaraRule,
            list: |p| p.yara_rules(),
            add: |p, name, body| p.yara_rule_add(name, body),
            delete: |p, name| p.yara_rule_delete(name),
            equals: YaraRule::equals_content,
        }
    }
}

/// Resource subscriptions. Elements are named `<category>/<name>` and carry
/// no body.
pub struct ResourceStore<'a> {
    provider: &'a mut dyn RemoteStateProvider,
}

impl<'a> ResourceStore<'a> {
    pub fn new(provider: &'a mut dyn RemoteStateProvider) -> Self {
        Self { provider }
    }

    /// Composite element name for a subscription.
    pub fn element_name(category: &str, name: &str) -> String {
        format!("{}/{}", category, name)
    }

    fn split(element: &str) -> ProviderResult<(&str, &str)> {
        element
            .split_once('/')
            .ok_or_else(|| ProviderError::Rejected(format!("malformed resource name '{}'", element)))
    }
}

impl ElementStore for ResourceStore<'_> {
    type Body = ();

    fn element_type(&self) -> ElementType {
        ElementType::Resource
    }

    fn fetch(&self) -> ProviderResult<BTreeMap<String, Remote<()>>> {
        let subscribed = self.provider.resources()?;
        Ok(subscribed
            .iter()
            .flat_map(|(category, names)| {
                names
                    .iter()
                    .map(move |name| (Self::element_name(category, name), Remote::new(())))
            })
            .collect())
    }

    fn create(&mut self, name: &str, _body: &()) -> ProviderResult<()> {
        let (category, resource) = Self::split(name)?;
        self.provider.resource_subscribe(category, resource)
    }

    fn delete(&mut self, name: &str, _remote: &Remote<()>) -> ProviderResult<()> {
        let (category, resource) = Self::split(name)?;
        self.provider.resource_unsubscribe(category, resource)
    }

    fn content_equals(&self, _desired: &(), _remote: &()) -> bool {
        true
    }
}

/// Detection rules of one namespace. Elements are named
/// `<namespace>/<rule>` so operations from different namespaces stay
/// distinguishable.
pub struct DrRuleStore<'a> {
    provider: &'a mut dyn RemoteStateProvider,
    namespace: String,
}

impl<'a> DrRuleStore<'a> {
    pub fn new(provider: &'a mut dyn RemoteStateProvider, namespace: impl Into<String>) -> Self {
        Self {
            provider,
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Composite element name for a rule.
    pub fn element_name(namespace: &str, rule: &str) -> String {
        format!("{}/{}", namespace, rule)
    }

    fn rule_name<'n>(&self, element: &'n str) -> ProviderResult<&'n str> {
        element
            .strip_prefix(self.namespace.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(|| {
                ProviderError::Rejected(format!("rule '{}' is outside namespace '{}'", element, self.namespace))
            })
    }
}

impl ElementStore for DrRuleStore<'_> {
    type Body = DrRule;

    fn element_type(&self) -> ElementType {
        ElementType::DrRule
    }

    fn identity(&self, name: &str, _body: &DrRule) -> String {
        Self::element_name(&self.namespace, name)
    }

    fn fetch(&self) -> ProviderResult<BTreeMap<String, Remote<DrRule>>> {
        Ok(self
            .provider
            .dr_rules(&self.namespace)?
            .into_iter()
            .map(|(name, rule)| (Self::element_name(&self.namespace, &name), rule))
            .collect())
    }

    fn create(&mut self, name: &str, body: &DrRule) -> ProviderResult<()> {
        let rule = self.rule_name(name)?;
        self.provider.dr_rule_add(&self.namespace, rule, body)
    }

    fn delete(&mut self, name: &str, _remote: &Remote<DrRule>) -> ProviderResult<()> {
        let rule = self.rule_name(name)?;
        self.provider.dr_rule_delete(&self.namespace, rule)
    }

    fn content_equals(&self, desired: &DrRule, remote: &DrRule) -> bool {
        desired.equals_content(remote)
    }
}

/// Installation keys, matched by description.
pub struct InstallationKeyStore<'a> {
    provider: &'a mut dyn RemoteStateProvider,
}

impl<'a> InstallationKeyStore<'a> {
    pub fn new(provider: &'a mut dyn RemoteStateProvider) -> Self {
        Self { provider }
    }

    /// Identity of a configured key: its description, or the mapping key
    /// when the description is empty.
    pub fn key_identity(name: &str, key: &InstallationKey) -> String {
        if key.desc.is_empty() {
            name.to_string()
        } else {
            key.desc.clone()
        }
    }
}

impl ElementStore for InstallationKeyStore<'_> {
    type Body = InstallationKey;

    fn element_type(&self) -> ElementType {
        ElementType::InstallationKey
    }

    fn identity(&self, name: &str, body: &InstallationKey) -> String {
        Self::key_identity(name, body)
    }

    fn fetch(&self) -> ProviderResult<BTreeMap<String, Remote<InstallationKey>>> {
        let mut keys = BTreeMap::new();
        for key in self.provider.installation_keys()? {
            let identity = match (key.body.desc.as_str(), key.id()) {
                ("", Some(id)) => id.to_string(),
                ("", None) => continue,
                (desc, _) => desc.to_string(),
            };
            // Later keys sharing a description stay visible under their id
            // so a force push can remove them.
            let identity = match key.id() {
                Some(id) if keys.contains_key(&identity) => {
                    debug!(desc = %identity, %id, "duplicate installation key description");
                    format!("{}#{}", identity, id)
                }
                None if keys.contains_key(&identity) => continue,
                _ => identity,
            };
            keys.insert(identity, key);
        }
        Ok(keys)
    }

    fn create(&mut self, name: &str, body: &InstallationKey) -> ProviderResult<()> {
        let key = InstallationKey {
            desc: name.to_string(),
            ..body.clone()
        };
        let id = self.provider.installation_key_create(&key)?;
        debug!(desc = %name, %id, "installation key created");
        Ok(())
    }

    fn delete(&mut self, name: &str, remote: &Remote<InstallationKey>) -> ProviderResult<()> {
        let id = remote
            .id()
            .ok_or_else(|| ProviderError::NotFound(format!("no identifier for installation key '{}'", name)))?;
        self.provider.installation_key_delete(id)
    }

    fn content_equals(&self, desired: &InstallationKey, remote: &InstallationKey) -> bool {
        desired.equals_content(remote)
    }
}

/// Org settings restricted to a fixed key table. A key is present when its
/// value is non-empty; removing it clears the value.
pub struct OrgValueStore<'a> {
    provider: &'a mut dyn RemoteStateProvider,
    keys: &'a [&'a str],
}

impl<'a> OrgValueStore<'a> {
    pub fn new(provider: &'a mut dyn RemoteStateProvider, keys: &'a [&'a str]) -> Self {
        Self { provider, keys }
    }
}

impl ElementStore for OrgValueStore<'_> {
    type Body = String;

    fn element_type(&self) -> ElementType {
        ElementType::OrgValue
    }

    fn fetch(&self) -> ProviderResult<BTreeMap<String, Remote<String>>> {
        let mut values = BTreeMap::new();
        for key in self.keys {
            match self.provider.org_value_get(key) {
                Ok(value) if !value.is_empty() => {
                    values.insert(key.to_string(), Remote::new(value));
                }
                Ok(_) | Err(ProviderError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(values)
    }

    fn create(&mut self, name: &str, body: &String) -> ProviderResult<()> {
        self.provider.org_value_set(name, body)
    }

    fn delete(&mut self, name: &str, _remote: &Remote<String>) -> ProviderResult<()> {
        self.provider.org_value_set(name, "")
    }

    fn replace(&mut self, name: &str, desired: &String, _remote: &Remote<String>) -> ProviderResult<()> {
        self.provider.org_value_set(name, desired)
    }

    fn content_equals(&self, desired: &String, remote: &String) -> bool {
        desired == remote
    }
}
