//! Push options.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use orgsync_config::IncludeLoader;
use serde::{Deserialize, Serialize};

/// Config sections a push can reconcile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "resources")]
    Resources,
    #[serde(rename = "rules")]
    DrRules,
    #[serde(rename = "fps")]
    FpRules,
    #[serde(rename = "outputs")]
    Outputs,
    #[serde(rename = "integrity")]
    Integrity,
    #[serde(rename = "exfil")]
    Exfil,
    #[serde(rename = "artifact")]
    Artifacts,
    #[serde(rename = "yara")]
    Yara,
    #[serde(rename = "installation_keys")]
    InstallationKeys,
    #[serde(rename = "org-value")]
    OrgValues,
}

impl Category {
    /// Every category, in the order a push processes them.
    pub const ALL: [Category; 10] = [
        Category::Resources,
        Category::DrRules,
        Category::FpRules,
        Category::Outputs,
        Category::Integrity,
        Category::Exfil,
        Category::Artifacts,
        Category::Yara,
        Category::InstallationKeys,
        Category::OrgValues,
    ];

    /// Name of the category's section in a config document.
    pub fn section(&self) -> &'static str {
        match self {
            Self::Resources => "resources",
            Self::DrRules => "rules",
            Self::FpRules => "fps",
            Self::Outputs => "outputs",
            Self::Integrity => "integrity",
            Self::Exfil => "exfil",
            Self::Artifacts => "artifact",
            Self::Yara => "yara",
            Self::InstallationKeys => "installation_keys",
            Self::OrgValues => "org-value",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.section())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.section() == s)
            .ok_or_else(|| {
                let known: Vec<&str> = Category::ALL.iter().map(|c| c.section()).collect();
                format!("unknown category '{}' (expected one of: {})", s, known.join(", "))
            })
    }
}

/// What to do with an element whose name matches but whose content differs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriftPolicy {
    /// Leave the remote element as is and report it unchanged.
    #[default]
    Keep,
    /// Under force, replace the remote element with the desired content.
    Replace,
}

impl FromStr for DriftPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "keep" => Ok(Self::Keep),
            "replace" => Ok(Self::Replace),
            other => Err(format!("unknown drift policy '{}' (expected keep or replace)", other)),
        }
    }
}

/// Flags controlling one push.
#[derive(Clone, Default)]
pub struct SyncOptions {
    /// Compute operations without applying them.
    pub dry_run: bool,
    /// Remove remote elements missing from the config.
    pub force: bool,
    pub drift: DriftPolicy,

    pub sync_resources: bool,
    pub sync_dr_rules: bool,
    pub sync_fp_rules: bool,
    pub sync_outputs: bool,
    pub sync_integrity: bool,
    pub sync_exfil: bool,
    pub sync_artifacts: bool,
    pub sync_yara: bool,
    pub sync_installation_keys: bool,
    pub sync_org_values: bool,

    /// Loader used to resolve includes; the filesystem relative to the
    /// working directory when unset.
    pub include_loader: Option<Arc<dyn IncludeLoader + Send + Sync>>,
}

impl SyncOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options with every category enabled.
    pub fn all_categories() -> Self {
        Category::ALL
            .iter()
            .fold(Self::default(), |options, category| options.with_category(*category))
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.set_category(category, true);
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_drift(mut self, drift: DriftPolicy) -> Self {
        self.drift = drift;
        self
    }

    pub fn with_include_loader(mut self, loader: impl IncludeLoader + Send + Sync + 'static) -> Self {
        self.include_loader = Some(Arc::new(loader));
        self
    }

    pub fn set_category(&mut self, category: Category, enabled: bool) {
        *self.flag_mut(category) = enabled;
    }

    pub fn is_enabled(&self, category: Category) -> bool {
        match category {
            Category::Resources => self.sync_resources,
            Category::DrRules => self.sync_dr_rules,
            Category::FpRules => self.sync_fp_rules,
            Category::Outputs => self.sync_outputs,
            Category::Integrity => self.sync_integrity,
            Category::Exfil => self.sync_exfil,
            Category::Artifacts => self.sync_artifacts,
            Category::Yara => self.sync_yara,
            Category::InstallationKeys => self.sync_installation_keys,
            Category::OrgValues => self.sync_org_values,
        }
    }

    /// Enabled categories in processing order.
    pub fn categories(&self) -> Vec<Category> {
        Category::ALL
            .iter()
            .copied()
            .filter(|c| self.is_enabled(*c))
            .collect()
    }

    fn flag_mut(&mut self, category: Category) -> &mut bool {
        match category {
            Category::Resources => &mut self.sync_resources,
            Category::DrRules => &mut self.sync_dr_rules,
            Category::FpRules => &mut self.sync_fp_rules,
            Category::Outputs => &mut self.sync_outputs,
            Category::Integrity => &mut self.sync_integrity,
            Category::Exfil => &mut self.sync_exfil,
            Category::Artifacts => &mut self.sync_artifacts,
            Category::Yara => &mut self.sync_yara,
            Category::InstallationKeys => &mut self.sync_installation_keys,
            Category::OrgValues => &mut self.sync_org_values,
        }
    }
}

impl fmt::Debug for SyncOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncOptions")
            .field("dry_run", &self.dry_run)
            .field("force", &self.force)
            .field("drift", &self.drift)
            .field("categories", &self.categories())
            .field("include_loader", &self.include_loader.is_some())
            .finish()
    }
}
