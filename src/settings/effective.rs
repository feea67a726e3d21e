//! Effective tool settings with provenance
//!
//! Settings are the merge of the built-in defaults, the user's settings
//! file and command-line overrides, in that order.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::defaults::SettingsDefaults;
use super::merge::merge_layers;
use crate::sync::{Category, DriftPolicy};

/// Environment variable naming the settings file.
pub const SETTINGS_ENV: &str = "ORGSYNC_SETTINGS";

/// Where a settings layer came from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum SettingsOrigin {
    Builtin,
    User,
    Cli,
}

/// A contributing settings layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsSource {
    pub origin: SettingsOrigin,

    /// File path (None for builtin/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// SHA-256 digest of raw file bytes (None for builtin/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// Typed view of the merged settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedSettings {
    pub log_level: String,
    pub state_file: PathBuf,
    pub drift: DriftPolicy,
    pub categories: Vec<Category>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Settings {
    /// The merged settings object
    pub values: Value,

    /// Contributing layers in precedence order
    pub sources: Vec<SettingsSource>,

    #[serde(skip)]
    pub resolved: ResolvedSettings,
}

impl Settings {
    /// Build settings from the layers that exist.
    pub fn build(user_path: Option<&Path>, cli_overrides: Option<Value>) -> Result<Self, SettingsError> {
        let mut layers = vec![SettingsDefaults::default().to_value()];
        let mut sources = vec![SettingsSource {
            origin: SettingsOrigin::Builtin,
            path: None,
            digest: None,
        }];

        if let Some(path) = user_path {
            if path.exists() {
                let (value, digest) = load_toml_file(path)?;
                layers.push(value);
                sources.push(SettingsSource {
                    origin: SettingsOrigin::User,
                    path: Some(path.to_string_lossy().to_string()),
                    digest: Some(digest),
                });
            }
        }

        if let Some(cli) = cli_overrides {
            layers.push(cli);
            sources.push(SettingsSource {
                origin: SettingsOrigin::Cli,
                path: None,
                digest: None,
            });
        }

        let values = merge_layers(layers);
        let resolved = validate(&values)?;

        Ok(Self {
            values,
            sources,
            resolved,
        })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Settings file location: `$ORGSYNC_SETTINGS`, else
/// `~/.config/orgsync/settings.toml`.
pub fn default_settings_path() -> Option<PathBuf> {
    if let Some(path) = env::var_os(SETTINGS_ENV) {
        return Some(PathBuf::from(path));
    }
    env::var_os("HOME").map(|home| PathBuf::from(home).join(".config/orgsync/settings.toml"))
}

/// Load and parse a TOML file, returning the value and digest
fn load_toml_file(path: &Path) -> Result<(Value, String), SettingsError> {
    let bytes = fs::read(path).map_err(|e| SettingsError::Io(format!("{}: {}", path.display(), e)))?;
    let digest = hex::encode(Sha256::digest(&bytes));

    let contents = String::from_utf8(bytes)
        .map_err(|e| SettingsError::Parse(format!("{}: invalid UTF-8: {}", path.display(), e)))?;
    let table: toml::Value = toml::from_str(&contents)
        .map_err(|e| SettingsError::Parse(format!("{}: {}", path.display(), e)))?;

    Ok((toml_to_json(table), digest))
}

fn toml_to_json(toml: toml::Value) -> Value {
    match toml {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::Number(i.into()),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(arr) => Value::Array(arr.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(table.into_iter().map(|(k, v)| (k, toml_to_json(v))).collect()),
    }
}

fn validate(values: &Value) -> Result<ResolvedSettings, SettingsError> {
    let field = |key: &str| values.get(key).cloned().unwrap_or(Value::Null);

    let log_level = field("log_level")
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| SettingsError::Validation("log_level must be a non-empty string".to_string()))?;

    let state_file = field("state_file")
        .as_str()
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .ok_or_else(|| SettingsError::Validation("state_file must be a non-empty path".to_string()))?;

    let drift = match field("drift") {
        Value::String(s) => s.parse::<DriftPolicy>().map_err(SettingsError::Validation)?,
        _ => return Err(SettingsError::Validation("drift must be a string".to_string())),
    };

    let categories = match field("categories") {
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .ok_or_else(|| SettingsError::Validation("categories must be strings".to_string()))?
                    .parse::<Category>()
                    .map_err(SettingsError::Validation)
            })
            .collect::<Result<Vec<_>, _>>()?,
        _ => return Err(SettingsError::Validation("categories must be a list".to_string())),
    };

    Ok(ResolvedSettings {
        log_level,
        state_file,
        drift,
        categories,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_build_with_defaults_only() {
        let settings = Settings::build(None, None).unwrap();
        assert_eq!(settings.resolved.log_level, "info");
        assert_eq!(settings.resolved.drift, DriftPolicy::Keep);
        assert_eq!(settings.resolved.categories, Category::ALL.to_vec());
        assert_eq!(settings.sources.len(), 1);
        assert_eq!(settings.resolved.state_file, PathBuf::from("orgsync-state.json"));
    }

    #[test]
    fn test_user_file_layer() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "drift = \"replace\"\ncategories = [\"rules\", \"org-value\"]").unwrap();

        let settings = Settings::build(Some(file.path()), None).unwrap();
        assert_eq!(settings.resolved.drift, DriftPolicy::Replace);
        assert_eq!(settings.resolved.categories, vec![Category::DrRules, Category::OrgValues]);
        assert_eq!(settings.sources[1].origin, SettingsOrigin::User);
        assert_eq!(settings.sources[1].digest.as_ref().map(String::len), Some(64));
    }

    #[test]
    fn test_missing_user_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::build(Some(&dir.path().join("absent.toml")), None).unwrap();
        assert_eq!(settings.sources.len(), 1);
    }

    #[test]
    fn test_cli_overrides_user_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "log_level = \"warn\"\nstate_file = \"tenant.json\"").unwrap();

        let cli = serde_json::json!({"log_level": "debug"});
        let settings = Settings::build(Some(file.path()), Some(cli)).unwrap();
        assert_eq!(settings.resolved.log_level, "debug");
        assert_eq!(settings.resolved.state_file, PathBuf::from("tenant.json"));
        assert_eq!(settings.sources.last().map(|s| &s.origin), Some(&SettingsOrigin::Cli));
    }

    #[test]
    fn test_unknown_category_rejected() {
        let cli = serde_json::json!({"categories": ["rules", "widgets"]});
        let err = Settings::build(None, Some(cli)).unwrap_err();
        assert!(err.to_string().contains("unknown category 'widgets'"));
    }

    #[test]
    fn test_bad_drift_rejected() {
        let cli = serde_json::json!({"drift": "sometimes"});
        let err = Settings::build(None, Some(cli)).unwrap_err();
        assert!(matches!(err, SettingsError::Validation(_)));
    }

    #[test]
    fn test_invalid_toml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "log_level = ").unwrap();
        let err = Settings::build(Some(file.path()), None).unwrap_err();
        assert!(matches!(err, SettingsError::Parse(_)));
    }

    #[test]
    fn test_json_shows_provenance() {
        let settings = Settings::build(None, Some(serde_json::json!({"drift": "replace"}))).unwrap();
        let json = settings.to_json().unwrap();
        assert!(json.contains("\"origin\": \"builtin\""));
        assert!(json.contains("\"origin\": \"cli\""));
        assert!(!json.contains("resolved"));
    }
}
