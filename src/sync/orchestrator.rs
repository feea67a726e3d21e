//! Push orchestration across categories.

use std::collections::BTreeMap;

use orgsync_config::{load_effective_config, FsIncludeLoader, OrgConfig};
use tracing::{debug, info};

use super::error::SyncError;
use super::operation::{ElementType, SyncOperation, SyncSummary};
use super::options::{Category, SyncOptions};
use super::reconcile::{reconcile, CategoryOutcome, ElementStore, SyncMode};
use crate::provider::adapters::{
    DrRuleStore, InstallationKeyStore, MapStore, OrgValueStore, ResourceStore, SUPPORTED_ORG_VALUES,
};
use crate::provider::RemoteStateProvider;

/// Push `config` to the provider with the default org-value key table.
pub fn sync_push(
    provider: &mut dyn RemoteStateProvider,
    config: &OrgConfig,
    options: &SyncOptions,
) -> Result<Vec<SyncOperation>, SyncError> {
    Orchestrator::new(provider).push(config, options)
}

/// Resolve `root` and its includes, then push the effective config.
///
/// Includes are loaded with the options' loader, or from the filesystem
/// relative to the working directory.
pub fn push_from_root(
    provider: &mut dyn RemoteStateProvider,
    root: &str,
    options: &SyncOptions,
) -> Result<Vec<SyncOperation>, SyncError> {
    let effective = match &options.include_loader {
        Some(loader) => load_effective_config(root, loader.as_ref())?,
        None => load_effective_config(root, &FsIncludeLoader::current_dir())?,
    };
    for source in &effective.sources {
        debug!(document = %source.id, digest = %source.digest, "config source");
    }
    sync_push(provider, &effective.config, options)
}

/// Runs the per-category reconcilers against one provider.
pub struct Orchestrator<'a> {
    provider: &'a mut dyn RemoteStateProvider,
    org_value_keys: &'a [&'a str],
}

impl<'a> Orchestrator<'a> {
    pub fn new(provider: &'a mut dyn RemoteStateProvider) -> Self {
        Self {
            provider,
            org_value_keys: SUPPORTED_ORG_VALUES,
        }
    }

    /// Use a different table of recognised org-value keys.
    pub fn with_org_value_keys(mut self, keys: &'a [&'a str]) -> Self {
        self.org_value_keys = keys;
        self
    }

    /// Reconcile every selected category in turn.
    ///
    /// Stops at the first category whose remote state cannot be fetched or
    /// whose mutations partly failed. Categories already processed stay
    /// applied.
    pub fn push(&mut self, config: &OrgConfig, options: &SyncOptions) -> Result<Vec<SyncOperation>, SyncError> {
        let categories = options.categories();
        if categories.is_empty() {
            return Err(SyncError::NoCategoriesSelected);
        }
        if options.is_enabled(Category::OrgValues) {
            self.validate_org_values(config)?;
        }
        if options.is_enabled(Category::InstallationKeys) {
            validate_installation_keys(config)?;
        }

        let mode = SyncMode {
            dry_run: options.dry_run,
            force: options.force,
            drift: options.drift,
        };
        info!(?categories, dry_run = mode.dry_run, force = mode.force, drift = ?mode.drift, "starting push");

        let mut operations = Vec::new();
        for category in categories {
            let outcome = self.push_category(category, config, mode)?;
            let summary = SyncSummary::from_operations(&outcome.operations);
            info!(%category, %summary, failures = outcome.failures.len(), "category reconciled");

            operations.extend(outcome.operations);
            if !outcome.failures.is_empty() {
                return Err(SyncError::RemoteMutation {
                    failures: outcome.failures,
                    operations,
                });
            }
        }
        Ok(operations)
    }

    fn validate_org_values(&self, config: &OrgConfig) -> Result<(), SyncError> {
        let unknown: Vec<&str> = config
            .org_values
            .keys()
            .map(String::as_str)
            .filter(|key| !self.org_value_keys.contains(key))
            .collect();
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(SyncError::InvalidConfig(format!(
                "unsupported org-value key(s): {}",
                unknown.join(", ")
            )))
        }
    }

    /// Exfil and yara run two passes and detection rules one pass per
    /// namespace. A pass only runs when the previous one applied cleanly.
    fn push_category(&mut self, category: Category, config: &OrgConfig, mode: SyncMode) -> Result<CategoryOutcome, SyncError> {
        let provider = &mut *self.provider;
        match category {
            Category::Resources => {
                let desired: BTreeMap<String, ()> = config
                    .resource_pairs()
                    .into_iter()
                    .map(|(category, name)| (ResourceStore::element_name(&category, &name), ()))
                    .collect();
                reconcile(&mut ResourceStore::new(provider), &desired, mode)
            }
            Category::DrRules => self.push_dr_rules(config, mode),
            Category::FpRules => reconcile(&mut MapStore::fp_rules(provider), &config.fp_rules, mode),
            Category::Outputs => reconcile(&mut MapStore::outputs(provider), &config.outputs, mode),
            Category::Integrity => reconcile(&mut MapStore::integrity(provider), &config.integrity, mode),
            Category::Exfil => {
                let mut outcome = reconcile(&mut MapStore::exfil_watches(&mut *provider), &config.exfil.watches, mode)?;
                if outcome.failures.is_empty() {
                    outcome.extend(reconcile(&mut MapStore::exfil_events(provider), &config.exfil.events, mode)?);
                }
                Ok(outcome)
            }
            Category::Artifacts => reconcile(&mut MapStore::artifacts(provider), &config.artifacts, mode),
            Category::Yara => {
                let mut outcome = reconcile(&mut MapStore::yara_sources(&mut *provider), &config.yara.sources, mode)?;
                if outcome.failures.is_empty() {
                    outcome.extend(reconcile(&mut MapStore::yara_rules(provider), &config.yara.rules, mode)?);
                }
                Ok(outcome)
            }
            Category::InstallationKeys => {
                reconcile(&mut InstallationKeyStore::new(provider), &config.installation_keys, mode)
            }
            Category::OrgValues => {
                let desired: BTreeMap<String, String> = config
                    .org_values
                    .iter()
                    .filter(|(_, value)| !value.is_empty())
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect();
                let keys = self.org_value_keys;
                reconcile(&mut OrgValueStore::new(provider, keys), &desired, mode)
            }
        }
    }

    /// Detection rules are reconciled one namespace at a time, limited to
    /// the namespaces the config addresses. A config without rules
    /// addresses every namespace the provider reports.
    fn push_dr_rules(&mut self, config: &OrgConfig, mode: SyncMode) -> Result<CategoryOutcome, SyncError> {
        let namespaces: Vec<String> = if config.dr_rules.is_empty() {
            self.provider
                .dr_rule_namespaces()
                .map_err(|source| SyncError::RemoteFetch {
                    element_type: ElementType::DrRule,
                    source,
                })?
        } else {
            config.dr_namespaces().into_iter().collect()
        };

        let mut outcome = CategoryOutcome::default();
        for namespace in namespaces {
            if !outcome.failures.is_empty() {
                break;
            }
            let desired: BTreeMap<String, _> = config
                .dr_rules
                .iter()
                .filter(|(_, rule)| rule.effective_namespace() == namespace)
                .map(|(name, rule)| (name.clone(), rule.clone()))
                .collect();
            let mut store = DrRuleStore::new(&mut *self.provider, namespace);
            debug!(namespace = store.namespace(), desired = desired.len(), element_type = %store.element_type(), "reconciling namespace");
            outcome.extend(reconcile(&mut store, &desired, mode)?);
        }
        Ok(outcome)
    }
}

/// Configured installation keys must resolve to distinct identities;
/// otherwise every push would create the later ones again.
fn validate_installation_keys(config: &OrgConfig) -> Result<(), SyncError> {
    let mut seen: BTreeMap<String, &str> = BTreeMap::new();
    for (name, key) in &config.installation_keys {
        let identity = InstallationKeyStore::key_identity(name, key);
        if let Some(first) = seen.insert(identity.clone(), name.as_str()) {
            return Err(SyncError::InvalidConfig(format!(
                "installation keys '{}' and '{}' share the description '{}'",
                first, name, identity
            )));
        }
    }
    Ok(())
}
