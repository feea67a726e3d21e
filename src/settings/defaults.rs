//! Built-in settings (lowest layer).

use serde::{Deserialize, Serialize};

use crate::sync::{Category, DriftPolicy};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsDefaults {
    /// Log filter when `RUST_LOG` is unset (default: "info")
    pub log_level: String,

    /// Remote state snapshot used by offline pushes
    pub state_file: String,

    pub drift: DriftPolicy,

    /// Categories pushed when none are named on the command line (default: all)
    pub categories: Vec<Category>,
}

impl Default for SettingsDefaults {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            state_file: "orgsync-state.json".to_string(),
            drift: DriftPolicy::Keep,
            categories: Category::ALL.to_vec(),
        }
    }
}

impl SettingsDefaults {
    /// Convert to JSON Value for merging
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "log_level": self.log_level,
            "state_file": self.state_file,
            "drift": self.drift,
            "categories": self.categories,
        })
    }
}
