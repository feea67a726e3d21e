//! Shared helpers for sync integration tests.

#![allow(dead_code)]

use orgsync::mock::InMemoryProvider;
use orgsync::sync::{sort_operations, Category, ElementType, SyncOperation, SyncOptions};
use orgsync::OrgConfig;

/// A config touching every category.
pub const FULL_CONFIG: &str = r#"version: 3
resources:
  api:
  - vt
  - insight
  replicant:
  - integrity
  - yara
rules:
  vt-domains:
    namespace: general
    detect:
      event: DNS_REQUEST
      op: lookup
      path: event/DOMAIN_NAME
      resource: lcr://api/vt
    respond:
    - action: report
      name: vt-bad-domain
  ssh-keys:
    namespace: managed
    detect:
      event: FILE_MODIFIED
      op: contains
      path: event/FILE_PATH
      value: .ssh
    respond:
    - action: report
      name: ssh-key-change
fps:
  noisy-domain:
    data:
      op: is
      path: detect/event/DOMAIN_NAME
      value: example.com
outputs:
  detections:
    module: s3
    type: detect
    bucket: tenant-detections
    is_indexing: "true"
integrity:
  linux-key:
    patterns:
    - /home/*/.ssh/*
    tags: []
    platforms:
    - linux
exfil:
  watch:
    procs:
      event: NEW_PROCESS
      operator: ends with
      value: wininit.exe
      path:
      - event
      - FILE_PATH
  list:
    default:
      events:
      - NEW_PROCESS
      - DNS_REQUEST
      filters:
        tags: []
        platforms: []
artifact:
  linux-logs:
    is_ignore_cert: false
    is_delete_after: false
    days_retention: 30
    patterns:
    - /var/log/syslog.1
    - /var/log/auth.log.1
    tags: []
    platforms:
    - linux
yara:
  rules:
    malware:
      sources:
      - community
      filters:
        tags:
        - server
        platforms:
        - windows
  sources:
    community:
      source: https://github.com/Yara-Rules/rules/blob/master/malware/APT_Sofacy.yar
installation_keys:
  servers:
    desc: servers
    tags:
    - server
    - prod
org-value:
  otx: otx-api-key
"#;

pub fn parse(yaml: &str) -> OrgConfig {
    OrgConfig::from_yaml(yaml).unwrap()
}

pub fn full_config() -> OrgConfig {
    parse(FULL_CONFIG)
}

pub fn provider() -> InMemoryProvider {
    InMemoryProvider::new()
}

/// Options enabling only `categories`.
pub fn only(categories: &[Category]) -> SyncOptions {
    categories
        .iter()
        .fold(SyncOptions::new(), |options, category| options.with_category(*category))
}

pub fn added(element_type: ElementType, name: &str) -> SyncOperation {
    SyncOperation::added(element_type, name)
}

pub fn removed(element_type: ElementType, name: &str) -> SyncOperation {
    SyncOperation::removed(element_type, name)
}

pub fn unchanged(element_type: ElementType, name: &str) -> SyncOperation {
    SyncOperation::unchanged(element_type, name)
}

pub fn replaced(element_type: ElementType, name: &str) -> SyncOperation {
    SyncOperation::replaced(element_type, name)
}

pub fn sorted(mut operations: Vec<SyncOperation>) -> Vec<SyncOperation> {
    sort_operations(&mut operations);
    operations
}

/// Assert two operation lists are equal ignoring order.
pub fn assert_ops(actual: Vec<SyncOperation>, expected: Vec<SyncOperation>) {
    assert_eq!(sorted(actual), sorted(expected));
}
