//! Per-category push behavior against the in-memory provider.

mod fixtures;

use fixtures::*;
use orgsync::mock::RemoteState;
use orgsync::provider::Remote;
use orgsync::sync::{sync_push, Category, DriftPolicy, ElementType, SyncError, SyncOptions};
use orgsync_config::{DrRule, FpRule, InstallationKey};
use serde_json::json;

// === Resources ===

#[test]
fn test_push_new_resources() {
    let config = parse("resources:\n  api: [ip-geo, vt]\n  replicant: [exfil]\n");
    let mut provider = provider();

    let ops = sync_push(&mut provider, &config, &only(&[Category::Resources])).unwrap();
    assert_ops(
        ops,
        vec![
            added(ElementType::Resource, "api/ip-geo"),
            added(ElementType::Resource, "api/vt"),
            added(ElementType::Resource, "replicant/exfil"),
        ],
    );

    let state = provider.snapshot();
    assert_eq!(state.resources.len(), 2);
    assert_eq!(state.resources["api"].iter().collect::<Vec<_>>(), vec!["ip-geo", "vt"]);
    assert_eq!(state.resources["replicant"].iter().collect::<Vec<_>>(), vec!["exfil"]);
}

#[test]
fn test_force_unsubscribes_unlisted_resources() {
    let mut provider = provider();
    provider.with_state(|s| {
        s.resources.entry("api".to_string()).or_default().insert("vt".to_string());
        s.resources.entry("api".to_string()).or_default().insert("shodan".to_string());
    });
    let config = parse("resources:\n  api: [vt]\n");

    let ops = sync_push(&mut provider, &config, &only(&[Category::Resources]).force(true)).unwrap();
    assert_ops(
        ops,
        vec![
            unchanged(ElementType::Resource, "api/vt"),
            removed(ElementType::Resource, "api/shodan"),
        ],
    );
    assert_eq!(provider.mutations(), vec!["delete resource api/shodan"]);
}

// === Detection Rules ===

fn seed_rule(state: &mut RemoteState, namespace: &str, name: &str, event: &str) {
    let rule = DrRule {
        name: name.to_string(),
        namespace: namespace.to_string(),
        detect: json!({"event": event, "op": "is"}),
        respond: json!([{"action": "report", "name": name}]),
        is_enabled: None,
    };
    state
        .dr_rules
        .entry(namespace.to_string())
        .or_default()
        .insert(name.to_string(), Remote::new(rule).with_id(format!("{}-{}", namespace, name)));
}

#[test]
fn test_same_name_in_other_namespace_does_not_collide() {
    let mut provider = provider();
    provider.with_state(|s| seed_rule(s, "general", "r", "DNS_REQUEST"));

    let config = parse("rules:\n  r:\n    namespace: managed\n    detect: {event: NEW_PROCESS, op: is}\n    respond: []\n");
    let ops = sync_push(&mut provider, &config, &only(&[Category::DrRules]).force(true)).unwrap();

    // Only the managed namespace is in scope; the general rule is neither
    // reported nor removed.
    assert_ops(ops, vec![added(ElementType::DrRule, "managed/r")]);
    let state = provider.snapshot();
    assert!(state.dr_rules["general"].contains_key("r"));
    assert_eq!(state.dr_rules["managed"]["r"].body.detect["event"], "NEW_PROCESS");
}

#[test]
fn test_force_only_removes_within_addressed_namespaces() {
    let mut provider = provider();
    provider.with_state(|s| {
        seed_rule(s, "general", "old", "DNS_REQUEST");
        seed_rule(s, "managed", "keep-me", "NEW_PROCESS");
    });

    let config = parse("rules:\n  fresh:\n    detect: {event: CODE_IDENTITY, op: is}\n    respond: []\n");
    let ops = sync_push(&mut provider, &config, &only(&[Category::DrRules]).force(true)).unwrap();

    assert_ops(
        ops,
        vec![added(ElementType::DrRule, "general/fresh"), removed(ElementType::DrRule, "general/old")],
    );
    let state = provider.snapshot();
    assert!(state.dr_rules["managed"].contains_key("keep-me"));
    assert!(!state.dr_rules["general"].contains_key("old"));
}

#[test]
fn test_force_without_rules_addresses_every_namespace() {
    let mut provider = provider();
    provider.with_state(|s| {
        seed_rule(s, "general", "r", "DNS_REQUEST");
        seed_rule(s, "managed", "r", "NEW_PROCESS");
    });

    let ops = sync_push(&mut provider, &parse("version: 3\n"), &only(&[Category::DrRules]).force(true)).unwrap();
    assert_ops(
        ops,
        vec![removed(ElementType::DrRule, "general/r"), removed(ElementType::DrRule, "managed/r")],
    );
    let state = provider.snapshot();
    assert!(state.dr_rules.values().all(|rules| rules.is_empty()));
}

#[test]
fn test_rule_in_unknown_namespace_fails_mutation() {
    let mut provider = provider();
    let config = parse("rules:\n  r:\n    namespace: custom\n    detect: {op: is}\n    respond: []\n");

    let err = sync_push(&mut provider, &config, &only(&[Category::DrRules])).unwrap_err();
    match err {
        SyncError::RemoteMutation { failures, operations } => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].element_name, "custom/r");
            assert_eq!(operations, vec![added(ElementType::DrRule, "custom/r")]);
        }
        other => panic!("unexpected error: {}", other),
    }
}

// === Map Categories ===

#[test]
fn test_fp_outputs_integrity_artifacts() {
    let config = full_config();
    let mut provider = provider();
    let options = only(&[
        Category::FpRules,
        Category::Outputs,
        Category::Integrity,
        Category::Artifacts,
    ]);

    let ops = sync_push(&mut provider, &config, &options).unwrap();
    assert_ops(
        ops,
        vec![
            added(ElementType::FpRule, "noisy-domain"),
            added(ElementType::Output, "detections"),
            added(ElementType::Integrity, "linux-key"),
            added(ElementType::Artifact, "linux-logs"),
        ],
    );

    let state = provider.snapshot();
    assert_eq!(state.outputs["detections"].body.module, "s3");
    assert_eq!(state.outputs["detections"].body.params["bucket"], "tenant-detections");
    assert_eq!(state.artifacts["linux-logs"].body.days_retention, 30);
    assert!(state.integrity["linux-key"].id().is_some());
}

#[test]
fn test_exfil_reports_two_element_types() {
    let mut provider = provider();
    provider.with_state(|s| {
        s.exfil_watches.insert("stale".to_string(), Remote::new(Default::default()));
    });

    let ops = sync_push(&mut provider, &full_config(), &only(&[Category::Exfil]).force(true)).unwrap();
    assert_ops(
        ops,
        vec![
            added(ElementType::ExfilWatch, "procs"),
            removed(ElementType::ExfilWatch, "stale"),
            added(ElementType::ExfilEvent, "default"),
        ],
    );
    let state = provider.snapshot();
    assert_eq!(state.exfil_watches["procs"].body.path, vec!["event", "FILE_PATH"]);
    assert_eq!(state.exfil_events["default"].body.events.len(), 2);
}

#[test]
fn test_yara_sources_and_rules() {
    let mut provider = provider();
    let ops = sync_push(&mut provider, &full_config(), &only(&[Category::Yara])).unwrap();

    assert_ops(
        ops.clone(),
        vec![
            added(ElementType::YaraSource, "community"),
            added(ElementType::YaraRule, "malware"),
        ],
    );
    // Sources are pushed before the rules that reference them.
    assert_eq!(ops[0].element_type, ElementType::YaraSource);
    assert_eq!(
        provider.mutations(),
        vec!["create yara_source community", "create yara_rule malware"]
    );
}

#[test]
fn test_list_order_does_not_count_as_drift() {
    let mut provider = provider();
    let categories = [Category::Yara, Category::Integrity, Category::Artifacts];
    sync_push(&mut provider, &full_config(), &only(&categories)).unwrap();
    let applied = provider.mutations().len();

    let reordered = parse(
        r#"integrity:
  linux-key:
    patterns: ['/home/*/.ssh/*']
    platforms: [linux]
artifact:
  linux-logs:
    days_retention: 30
    patterns: [/var/log/auth.log.1, /var/log/syslog.1]
    platforms: [linux]
yara:
  sources:
    community:
      source: https://github.com/Yara-Rules/rules/blob/master/malware/APT_Sofacy.yar
  rules:
    malware:
      sources: [community]
      filters:
        platforms: [windows]
        tags: [server]
"#,
    );
    let options = only(&categories).force(true).with_drift(DriftPolicy::Replace);
    let ops = sync_push(&mut provider, &reordered, &options).unwrap();

    assert_ops(
        ops,
        vec![
            unchanged(ElementType::Integrity, "linux-key"),
            unchanged(ElementType::Artifact, "linux-logs"),
            unchanged(ElementType::YaraRule, "malware"),
            unchanged(ElementType::YaraSource, "community"),
        ],
    );
    assert_eq!(provider.mutations().len(), applied);
}

// === Installation Keys ===

const KEYS: &str = r#"installation_keys:
  testk1:
    desc: testk1
    tags: [t1, t2]
  testk2:
    desc: testk2
    tags: [t1]
    use_public_root_ca: true
"#;

#[test]
fn test_installation_keys_matched_by_description() {
    let mut provider = provider();
    let options = only(&[Category::InstallationKeys]).force(true);

    let ops = sync_push(&mut provider, &parse(KEYS), &options).unwrap();
    assert_ops(
        ops,
        vec![
            added(ElementType::InstallationKey, "testk1"),
            added(ElementType::InstallationKey, "testk2"),
        ],
    );

    let one_key = parse("installation_keys:\n  testk1:\n    desc: testk1\n    tags: [t2, t1]\n");
    let ops = sync_push(&mut provider, &one_key, &options).unwrap();
    assert_ops(
        ops,
        vec![
            unchanged(ElementType::InstallationKey, "testk1"),
            removed(ElementType::InstallationKey, "testk2"),
        ],
    );

    let keys: Vec<String> = provider
        .snapshot()
        .installation_keys
        .values()
        .map(|k| k.body.desc.clone())
        .collect();
    assert_eq!(keys, vec!["testk1"]);
}

#[test]
fn test_installation_key_without_desc_uses_mapping_key() {
    let mut provider = provider();
    let config = parse("installation_keys:\n  edge:\n    tags: [edge]\n");
    let options = only(&[Category::InstallationKeys]);

    sync_push(&mut provider, &config, &options).unwrap();
    let ops = sync_push(&mut provider, &config, &options).unwrap();
    assert_ops(ops, vec![unchanged(ElementType::InstallationKey, "edge")]);

    let state = provider.snapshot();
    assert_eq!(state.installation_keys.len(), 1);
    assert!(state.installation_keys.values().all(|k| k.body.desc == "edge"));
}

#[test]
fn test_duplicate_remote_key_descriptions_removed_under_force() {
    let mut provider = provider();
    provider.with_state(|s| {
        for id in ["key-a", "key-b"] {
            let key = InstallationKey {
                desc: "servers".to_string(),
                ..Default::default()
            };
            s.installation_keys.insert(id.to_string(), Remote::new(key).with_id(id));
        }
    });
    let config = parse("installation_keys:\n  servers:\n    desc: servers\n");
    let options = only(&[Category::InstallationKeys]).force(true);

    let ops = sync_push(&mut provider, &config, &options).unwrap();
    assert_ops(
        ops,
        vec![
            unchanged(ElementType::InstallationKey, "servers"),
            removed(ElementType::InstallationKey, "servers#key-b"),
        ],
    );
    let ids: Vec<String> = provider.snapshot().installation_keys.keys().cloned().collect();
    assert_eq!(ids, vec!["key-a"]);

    let ops = sync_push(&mut provider, &config, &options).unwrap();
    assert_ops(ops, vec![unchanged(ElementType::InstallationKey, "servers")]);
}

#[test]
fn test_shared_key_description_rejected_before_any_category() {
    let mut provider = provider();
    let config = parse(
        "fps:\n  f1:\n    data: {}\ninstallation_keys:\n  a:\n    desc: shared\n  b:\n    desc: shared\n",
    );
    let options = only(&[Category::FpRules, Category::InstallationKeys]).force(true);

    let err = sync_push(&mut provider, &config, &options).unwrap_err();
    assert!(matches!(err, SyncError::InvalidConfig(_)));
    assert_eq!(err.exit_code(), 1);
    assert!(provider.mutations().is_empty());
    assert!(provider.snapshot().installation_keys.is_empty());
}

// === Org Values ===

#[test]
fn test_org_values_cleared_under_force() {
    let mut provider = provider();
    let options = only(&[Category::OrgValues]).force(true);

    let both = parse("org-value:\n  otx: v1\n  twilio: v2\n");
    let ops = sync_push(&mut provider, &both, &options).unwrap();
    assert_ops(
        ops,
        vec![added(ElementType::OrgValue, "otx"), added(ElementType::OrgValue, "twilio")],
    );

    let ops = sync_push(&mut provider, &parse("org-value:\n  otx: v1\n"), &options).unwrap();
    assert_ops(
        ops,
        vec![unchanged(ElementType::OrgValue, "otx"), removed(ElementType::OrgValue, "twilio")],
    );

    let state = provider.snapshot();
    assert_eq!(state.org_values["otx"], "v1");
    assert_eq!(state.org_values["twilio"], "");
}

#[test]
fn test_unsupported_org_value_rejected_before_any_category() {
    let mut provider = provider();
    let config = parse("resources:\n  api: [vt]\norg-value:\n  bogus: x\n");
    let options = only(&[Category::Resources, Category::OrgValues]);

    let err = sync_push(&mut provider, &config, &options).unwrap_err();
    assert!(matches!(err, SyncError::InvalidConfig(ref msg) if msg.contains("bogus")));
    assert!(provider.mutations().is_empty());
}

#[test]
fn test_org_value_drift_replaced_in_place() {
    let mut provider = provider();
    provider.with_state(|s| {
        s.org_values.insert("otx".to_string(), "old".to_string());
    });
    let options = only(&[Category::OrgValues])
        .force(true)
        .with_drift(DriftPolicy::Replace);

    let ops = sync_push(&mut provider, &parse("org-value:\n  otx: new\n"), &options).unwrap();
    assert_ops(ops, vec![replaced(ElementType::OrgValue, "otx")]);
    assert_eq!(provider.mutations(), vec!["create org_value otx"]);
    assert_eq!(provider.snapshot().org_values["otx"], "new");
}

// === Options ===

#[test]
fn test_no_categories_selected() {
    let mut provider = provider();
    let err = sync_push(&mut provider, &full_config(), &SyncOptions::new()).unwrap_err();
    assert!(matches!(err, SyncError::NoCategoriesSelected));
}

#[test]
fn test_unselected_categories_untouched() {
    let mut provider = provider();
    provider.with_state(|s| {
        s.fp_rules.insert("extra".to_string(), Remote::new(FpRule::default()));
    });

    sync_push(&mut provider, &full_config(), &only(&[Category::Outputs]).force(true)).unwrap();
    let state = provider.snapshot();
    assert!(state.fp_rules.contains_key("extra"));
    assert!(state.resources.is_empty());
}
