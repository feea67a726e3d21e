//! Sync operation records.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of remote element an operation refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementType {
    Resource,
    DrRule,
    FpRule,
    Output,
    Integrity,
    ExfilWatch,
    ExfilEvent,
    Artifact,
    YaraSource,
    YaraRule,
    InstallationKey,
    OrgValue,
}

impl ElementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resource => "resource",
            Self::DrRule => "dr_rule",
            Self::FpRule => "fp_rule",
            Self::Output => "output",
            Self::Integrity => "integrity",
            Self::ExfilWatch => "exfil_watch",
            Self::ExfilEvent => "exfil_event",
            Self::Artifact => "artifact",
            Self::YaraSource => "yara_source",
            Self::YaraRule => "yara_rule",
            Self::InstallationKey => "installation_key",
            Self::OrgValue => "org_value",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome for one reconciled element.
///
/// Neither flag set means the element is present and left alone. Both set
/// means it was replaced (removed, then added back with the desired content).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SyncOperation {
    pub element_type: ElementType,
    pub element_name: String,
    pub is_added: bool,
    pub is_removed: bool,
}

impl SyncOperation {
    pub fn added(element_type: ElementType, name: impl Into<String>) -> Self {
        Self::new(element_type, name, true, false)
    }

    pub fn removed(element_type: ElementType, name: impl Into<String>) -> Self {
        Self::new(element_type, name, false, true)
    }

    pub fn unchanged(element_type: ElementType, name: impl Into<String>) -> Self {
        Self::new(element_type, name, false, false)
    }

    pub fn replaced(element_type: ElementType, name: impl Into<String>) -> Self {
        Self::new(element_type, name, true, true)
    }

    fn new(element_type: ElementType, name: impl Into<String>, is_added: bool, is_removed: bool) -> Self {
        Self {
            element_type,
            element_name: name.into(),
            is_added,
            is_removed,
        }
    }

    pub fn is_noop(&self) -> bool {
        !self.is_added && !self.is_removed
    }
}

impl fmt::Display for SyncOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = match (self.is_added, self.is_removed) {
            (true, true) => "~",
            (true, false) => "+",
            (false, true) => "-",
            (false, false) => "=",
        };
        write!(f, "{} {} {}", marker, self.element_type, self.element_name)
    }
}

/// Sort operations into a stable order for display and comparison.
pub fn sort_operations(operations: &mut [SyncOperation]) {
    operations.sort();
}

/// Counts per outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSummary {
    pub added: usize,
    pub removed: usize,
    pub replaced: usize,
    pub unchanged: usize,
}

impl SyncSummary {
    pub fn from_operations(operations: &[SyncOperation]) -> Self {
        operations.iter().fold(Self::default(), |mut summary, op| {
            match (op.is_added, op.is_removed) {
                (true, true) => summary.replaced += 1,
                (true, false) => summary.added += 1,
                (false, true) => summary.removed += 1,
                (false, false) => summary.unchanged += 1,
            }
            summary
        })
    }

    /// True when applying the operations would change nothing.
    pub fn is_converged(&self) -> bool {
        self.added == 0 && self.removed == 0 && self.replaced == 0
    }
}

impl fmt::Display for SyncSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} added, {} removed, {} replaced, {} unchanged",
            self.added, self.removed, self.replaced, self.unchanged
        )
    }
}
