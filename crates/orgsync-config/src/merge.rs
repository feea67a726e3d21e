//! Document merge logic
//!
//! Merge semantics (overlay has precedence):
//! - `version`: overlay wins when set
//! - Category mappings: merge by element name, an overlay element replaces
//!   the base element wholesale
//! - Resource name lists: ordered union, base order first, duplicates dropped
//! - Nested sections (`exfil`, `yara`): merged per sub-mapping
//! - `include`: never carried into the result

use std::collections::{BTreeMap, HashSet};

use crate::document::{ExfilConfig, OrgConfig, YaraConfig};

/// Merge `overlay` on top of `base`.
pub fn merge(base: OrgConfig, overlay: OrgConfig) -> OrgConfig {
    OrgConfig {
        version: if overlay.version != 0 {
            overlay.version
        } else {
            base.version
        },
        include: Vec::new(),
        resources: merge_resources(base.resources, overlay.resources),
        dr_rules: override_entries(base.dr_rules, overlay.dr_rules),
        fp_rules: override_entries(base.fp_rules, overlay.fp_rules),
        outputs: override_entries(base.outputs, overlay.outputs),
        integrity: override_entries(base.integrity, overlay.integrity),
        exfil: ExfilConfig {
            watches: override_entries(base.exfil.watches, overlay.exfil.watches),
            events: override_entries(base.exfil.events, overlay.exfil.events),
        },
        artifacts: override_entries(base.artifacts, overlay.artifacts),
        yara: YaraConfig {
            rules: override_entries(base.yara.rules, overlay.yara.rules),
            sources: override_entries(base.yara.sources, overlay.yara.sources),
        },
        installation_keys: override_entries(base.installation_keys, overlay.installation_keys),
        org_values: override_entries(base.org_values, overlay.org_values),
    }
}

/// Merge documents in order (first is base, last has highest precedence).
pub fn merge_all<I>(documents: I) -> OrgConfig
where
    I: IntoIterator<Item = OrgConfig>,
{
    documents.into_iter().fold(OrgConfig::default(), merge)
}

impl OrgConfig {
    /// Method form of [`merge`].
    pub fn merge(self, overlay: OrgConfig) -> OrgConfig {
        merge(self, overlay)
    }
}

fn override_entries<V>(mut base: BTreeMap<String, V>, overlay: BTreeMap<String, V>) -> BTreeMap<String, V> {
    base.extend(overlay);
    base
}

fn merge_resources(
    mut base: BTreeMap<String, Vec<String>>,
    overlay: BTreeMap<String, Vec<String>>,
) -> BTreeMap<String, Vec<String>> {
    for (category, names) in overlay {
        let merged = match base.remove(&category) {
            Some(existing) => union_ordered(existing, names),
            None => union_ordered(Vec::new(), names),
        };
        base.insert(category, merged);
    }
    base
}

/// Ordered union of two lists: items of `base` in order, then the items of
/// `overlay` not seen yet. Duplicates are dropped from both.
pub fn union_ordered(base: Vec<String>, overlay: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    base.into_iter()
        .chain(overlay)
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DrRule, YaraSource};
    use serde_json::json;

    fn rule(name: &str, namespace: &str, detect: serde_json::Value) -> DrRule {
        DrRule {
            name: name.to_string(),
            namespace: namespace.to_string(),
            detect,
            respond: json!(["l1"]),
            is_enabled: None,
        }
    }

    #[test]
    fn test_resource_union_preserves_base_order() {
        let mut base = OrgConfig::default();
        base.resources
            .insert("replicant".to_string(), vec!["a1".to_string(), "a2".to_string()]);
        let mut overlay = OrgConfig::default();
        overlay
            .resources
            .insert("replicant".to_string(), vec!["a3".to_string(), "a1".to_string()]);

        let merged = merge(base, overlay);
        assert_eq!(merged.resources["replicant"], vec!["a1", "a2", "a3"]);
    }

    #[test]
    fn test_overlay_rule_replaces_whole_element() {
        let mut base = OrgConfig {
            version: 3,
            ..Default::default()
        };
        base.dr_rules
            .insert("r1".to_string(), rule("r1", "managed", json!({"t": "v", "extra": 1})));
        base.dr_rules.insert("r2".to_string(), rule("r2", "managed", json!({"t": "v"})));

        let mut overlay = OrgConfig::default();
        overlay
            .dr_rules
            .insert("r1".to_string(), rule("r1", "general", json!({"t": "v1"})));

        let merged = merge(base, overlay);
        assert_eq!(merged.version, 3);
        assert_eq!(merged.dr_rules["r1"].namespace, "general");
        // Replaced, not deep-merged.
        assert_eq!(merged.dr_rules["r1"].detect, json!({"t": "v1"}));
        assert_eq!(merged.dr_rules["r2"].namespace, "managed");
    }

    #[test]
    fn test_version_overlay_wins_when_set() {
        let base = OrgConfig {
            version: 2,
            ..Default::default()
        };
        let overlay = OrgConfig {
            version: 3,
            ..Default::default()
        };
        assert_eq!(merge(base, overlay).version, 3);
    }

    #[test]
    fn test_nested_sections_merge_per_submapping() {
        let mut base = OrgConfig::default();
        base.yara.sources.insert(
            "s1".to_string(),
            YaraSource {
                source: "https://a".to_string(),
            },
        );
        let mut overlay = OrgConfig::default();
        overlay.yara.sources.insert(
            "s2".to_string(),
            YaraSource {
                source: "https://b".to_string(),
            },
        );
        overlay.org_values.insert("otx".to_string(), "k".to_string());

        let merged = merge(base, overlay);
        assert_eq!(merged.yara.sources.len(), 2);
        assert_eq!(merged.org_values["otx"], "k");
    }

    #[test]
    fn test_include_not_carried() {
        let base = OrgConfig {
            include: vec!["a".to_string()],
            ..Default::default()
        };
        let overlay = OrgConfig {
            include: vec!["b".to_string()],
            ..Default::default()
        };
        assert!(merge(base, overlay).include.is_empty());
    }

    #[test]
    fn test_merge_all_last_wins() {
        let docs = (1..=3).map(|v| {
            let mut doc = OrgConfig::default();
            doc.org_values.insert("otx".to_string(), format!("v{}", v));
            doc
        });
        assert_eq!(merge_all(docs).org_values["otx"], "v3");
    }

    #[test]
    fn test_union_drops_duplicates_within_base() {
        let merged = union_ordered(
            vec!["a".to_string(), "a".to_string(), "b".to_string()],
            vec!["b".to_string(), "c".to_string()],
        );
        assert_eq!(merged, vec!["a", "b", "c"]);
    }
}
