//! In-memory tenant state.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use orgsync_config::{
    ArtifactRule, DrRule, ExfilEvent, ExfilWatch, FpRule, InstallationKey, IntegrityRule, Output, YaraRule,
    YaraSource, DEFAULT_NAMESPACE,
};
use serde::{Deserialize, Serialize};

use crate::provider::{Remote, RemoteMeta};

/// Detection rule namespaces every tenant starts with.
pub const BUILTIN_NAMESPACES: &[&str] = &[DEFAULT_NAMESPACE, "managed", "service"];

/// Everything one tenant holds. Serializes to the JSON snapshot format used
/// by the CLI's offline mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteState {
    pub resources: BTreeMap<String, BTreeSet<String>>,
    /// Namespace -> rule name -> rule.
    pub dr_rules: BTreeMap<String, BTreeMap<String, Remote<DrRule>>>,
    pub fp_rules: BTreeMap<String, Remote<FpRule>>,
    pub outputs: BTreeMap<String, Remote<Output>>,
    pub integrity: BTreeMap<String, Remote<IntegrityRule>>,
    pub exfil_watches: BTreeMap<String, Remote<ExfilWatch>>,
    pub exfil_events: BTreeMap<String, Remote<ExfilEvent>>,
    pub artifacts: BTreeMap<String, Remote<ArtifactRule>>,
    pub yara_sources: BTreeMap<String, Remote<YaraSource>>,
    pub yara_rules: BTreeMap<String, Remote<YaraRule>>,
    /// Key id -> key.
    pub installation_keys: BTreeMap<String, Remote<InstallationKey>>,
    pub org_values: BTreeMap<String, String>,
    id_counter: u64,
}

impl Default for RemoteState {
    fn default() -> Self {
        Self {
            resources: BTreeMap::new(),
            dr_rules: BUILTIN_NAMESPACES
                .iter()
                .map(|ns| (ns.to_string(), BTreeMap::new()))
                .collect(),
            fp_rules: BTreeMap::new(),
            outputs: BTreeMap::new(),
            integrity: BTreeMap::new(),
            exfil_watches: BTreeMap::new(),
            exfil_events: BTreeMap::new(),
            artifacts: BTreeMap::new(),
            yara_sources: BTreeMap::new(),
            yara_rules: BTreeMap::new(),
            installation_keys: BTreeMap::new(),
            org_values: BTreeMap::new(),
            id_counter: 0,
        }
    }
}

impl RemoteState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate a unique ID
    pub fn next_id(&mut self, prefix: &str) -> String {
        self.id_counter += 1;
        format!("{}-{:08x}", prefix, self.id_counter)
    }

    /// Wrap a body the way the platform stores it: with an id, author and
    /// timestamps.
    pub fn stamp<T>(&mut self, prefix: &str, body: T) -> Remote<T> {
        let now = Utc::now();
        Remote {
            body,
            meta: RemoteMeta {
                id: Some(self.next_id(prefix)),
                created_by: Some("orgsync".to_string()),
                created_at: Some(now),
                updated_at: Some(now),
            },
        }
    }

    /// Number of elements across all categories, counting only non-empty
    /// org values.
    pub fn element_count(&self) -> usize {
        self.resources.values().map(BTreeSet::len).sum::<usize>()
            + self.dr_rules.values().map(BTreeMap::len).sum::<usize>()
            + self.fp_rules.len()
            + self.outputs.len()
            + self.integrity.len()
            + self.exfil_watches.len()
            + self.exfil_events.len()
            + self.artifacts.len()
            + self.yara_sources.len()
            + self.yara_rules.len()
            + self.installation_keys.len()
            + self.org_values.values().filter(|v| !v.is_empty()).count()
    }
}
