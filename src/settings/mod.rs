//! Tool settings
//!
//! Layered merge, lowest precedence first:
//! 1. Built-in defaults
//! 2. User settings file (`$ORGSYNC_SETTINGS` or ~/.config/orgsync/settings.toml)
//! 3. CLI flags

mod defaults;
mod effective;
mod merge;

pub use defaults::SettingsDefaults;
pub use effective::{
    default_settings_path, ResolvedSettings, Settings, SettingsError, SettingsOrigin, SettingsSource,
    SETTINGS_ENV,
};
pub use merge::{deep_merge, merge_layers};
