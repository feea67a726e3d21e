//! Typed model of an organization config document.
//!
//! A document is a YAML mapping with a `version`, an optional `include`
//! list and one section per category. Mapping keys are kept in `BTreeMap`s
//! so that serialization is canonical: keys come out sorted, struct fields
//! come out in declaration order and empty sections are omitted.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Namespace assumed for detection rules that do not name one.
pub const DEFAULT_NAMESPACE: &str = "general";

/// One organization config document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrgConfig {
    #[serde(default, skip_serializing_if = "is_zero")]
    pub version: u32,

    /// Paths of documents to merge underneath this one, relative to this
    /// document's directory.
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,

    /// Resource category -> resource names to subscribe.
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "BTreeMap::is_empty")]
    pub resources: BTreeMap<String, Vec<String>>,

    #[serde(
        rename = "rules",
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub dr_rules: BTreeMap<String, DrRule>,

    #[serde(
        rename = "fps",
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub fp_rules: BTreeMap<String, FpRule>,

    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, Output>,

    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "BTreeMap::is_empty")]
    pub integrity: BTreeMap<String, IntegrityRule>,

    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "ExfilConfig::is_empty")]
    pub exfil: ExfilConfig,

    #[serde(
        rename = "artifact",
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub artifacts: BTreeMap<String, ArtifactRule>,

    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "YaraConfig::is_empty")]
    pub yara: YaraConfig,

    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "BTreeMap::is_empty")]
    pub installation_keys: BTreeMap<String, InstallationKey>,

    #[serde(
        rename = "org-value",
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub org_values: BTreeMap<String, String>,
}

impl OrgConfig {
    /// Parse a document from YAML text.
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    /// Parse a document from raw bytes.
    pub fn from_yaml_slice(bytes: &[u8]) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_slice(bytes)
    }

    /// Serialize to canonical YAML.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Resource subscriptions flattened to `(category, name)` pairs.
    pub fn resource_pairs(&self) -> Vec<(String, String)> {
        self.resources
            .iter()
            .flat_map(|(category, names)| {
                names.iter().map(move |name| (category.clone(), name.clone()))
            })
            .collect()
    }

    /// Namespaces referenced by the detection rules of this document.
    pub fn dr_namespaces(&self) -> BTreeSet<String> {
        self.dr_rules
            .values()
            .map(|rule| rule.effective_namespace().to_string())
            .collect()
    }

    /// True when no category carries any element.
    pub fn is_empty(&self) -> bool {
        self.resources.values().all(Vec::is_empty)
            && self.dr_rules.is_empty()
            && self.fp_rules.is_empty()
            && self.outputs.is_empty()
            && self.integrity.is_empty()
            && self.exfil.is_empty()
            && self.artifacts.is_empty()
            && self.yara.is_empty()
            && self.installation_keys.is_empty()
            && self.org_values.is_empty()
    }
}

/// Detection & response rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DrRule {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,

    #[serde(default)]
    pub detect: Value,

    #[serde(default)]
    pub respond: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_enabled: Option<bool>,
}

impl DrRule {
    /// Namespace the rule lives in, [`DEFAULT_NAMESPACE`] when unset.
    pub fn effective_namespace(&self) -> &str {
        if self.namespace.is_empty() {
            DEFAULT_NAMESPACE
        } else {
            &self.namespace
        }
    }

    /// Rules are enabled unless they say otherwise.
    pub fn enabled(&self) -> bool {
        self.is_enabled.unwrap_or(true)
    }

    pub fn equals_content(&self, other: &DrRule) -> bool {
        self.detect == other.detect && self.respond == other.respond && self.enabled() == other.enabled()
    }
}

/// False positive filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FpRule {
    #[serde(default)]
    pub data: Value,
}

impl FpRule {
    pub fn equals_content(&self, other: &FpRule) -> bool {
        self.data == other.data
    }
}

/// Output destination. Everything besides `module` and `type` is
/// module-specific and kept as free-form parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Output {
    #[serde(default)]
    pub module: String,

    #[serde(rename = "type", default)]
    pub stream: String,

    #[serde(flatten)]
    pub params: BTreeMap<String, Value>,
}

impl Output {
    pub fn equals_content(&self, other: &Output) -> bool {
        self.module == other.module && self.stream == other.stream && self.params == other.params
    }
}

/// File integrity monitoring rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntegrityRule {
    #[serde(default, deserialize_with = "null_as_default")]
    pub patterns: Vec<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub platforms: Vec<String>,
}

impl IntegrityRule {
    pub fn equals_content(&self, other: &IntegrityRule) -> bool {
        same_set(&self.patterns, &other.patterns)
            && same_set(&self.tags, &other.tags)
            && same_set(&self.platforms, &other.platforms)
    }
}

/// The `exfil` section: watch rules and event-list rules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExfilConfig {
    #[serde(
        rename = "watch",
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub watches: BTreeMap<String, ExfilWatch>,

    #[serde(
        rename = "list",
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub events: BTreeMap<String, ExfilEvent>,
}

impl ExfilConfig {
    pub fn is_empty(&self) -> bool {
        self.watches.is_empty() && self.events.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExfilWatch {
    #[serde(default)]
    pub event: String,

    #[serde(default)]
    pub operator: String,

    #[serde(default)]
    pub value: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub path: Vec<String>,

    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub platforms: Vec<String>,
}

impl ExfilWatch {
    pub fn equals_content(&self, other: &ExfilWatch) -> bool {
        // Path components are ordered.
        self.event == other.event
            && self.operator == other.operator
            && self.value == other.value
            && self.path == other.path
            && same_set(&self.tags, &other.tags)
            && same_set(&self.platforms, &other.platforms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExfilEvent {
    #[serde(default, deserialize_with = "null_as_default")]
    pub events: Vec<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub filters: Filters,
}

impl ExfilEvent {
    pub fn equals_content(&self, other: &ExfilEvent) -> bool {
        same_set(&self.events, &other.events) && self.filters.equals_content(&other.filters)
    }
}

/// Sensor filters shared by event-list and YARA rules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filters {
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub platforms: Vec<String>,
}

impl Filters {
    pub fn equals_content(&self, other: &Filters) -> bool {
        same_set(&self.tags, &other.tags) && same_set(&self.platforms, &other.platforms)
    }
}

/// Artifact collection rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactRule {
    #[serde(default)]
    pub is_ignore_cert: bool,

    #[serde(default)]
    pub is_delete_after: bool,

    #[serde(default)]
    pub days_retention: u32,

    #[serde(default, deserialize_with = "null_as_default")]
    pub patterns: Vec<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub platforms: Vec<String>,
}

impl ArtifactRule {
    pub fn equals_content(&self, other: &ArtifactRule) -> bool {
        self.is_ignore_cert == other.is_ignore_cert
            && self.is_delete_after == other.is_delete_after
            && self.days_retention == other.days_retention
            && same_set(&self.patterns, &other.patterns)
            && same_set(&self.tags, &other.tags)
            && same_set(&self.platforms, &other.platforms)
    }
}

/// The `yara` section: signature rules and the sources they pull from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct YaraConfig {
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "BTreeMap::is_empty")]
    pub rules: BTreeMap<String, YaraRule>,

    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "BTreeMap::is_empty")]
    pub sources: BTreeMap<String, YaraSource>,
}

impl YaraConfig {
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty() && self.sources.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct YaraRule {
    /// Names of entries under `yara.sources`.
    #[serde(default, deserialize_with = "null_as_default")]
    pub sources: Vec<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub filters: Filters,
}

impl YaraRule {
    pub fn equals_content(&self, other: &YaraRule) -> bool {
        same_set(&self.sources, &other.sources) && self.filters.equals_content(&other.filters)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct YaraSource {
    #[serde(default)]
    pub source: String,
}

impl YaraSource {
    pub fn equals_content(&self, other: &YaraSource) -> bool {
        self.source == other.source
    }
}

/// Sensor installation key. The platform identifies keys by an opaque id;
/// configs identify them by `desc`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstallationKey {
    #[serde(default)]
    pub desc: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub use_public_root_ca: bool,
}

impl InstallationKey {
    /// `desc` is the key's identity, not content, and is not compared.
    pub fn equals_content(&self, other: &InstallationKey) -> bool {
        same_set(&self.tags, &other.tags) && self.use_public_root_ca == other.use_public_root_ca
    }
}

/// Order-insensitive comparison of string lists.
pub fn same_set(a: &[String], b: &[String]) -> bool {
    let a: BTreeSet<&String> = a.iter().collect();
    let b: BTreeSet<&String> = b.iter().collect();
    a == b
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn is_zero(value: &u32) -> bool {
    *value == 0
}

fn is_false(value: &bool) -> bool {
    !*value
}
