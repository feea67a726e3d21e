//! Organization config documents.
//!
//! Parses the YAML document format, resolves `include` chains and merges
//! documents into one effective configuration.

mod document;
mod error;
mod include;
mod merge;

pub use document::{
    same_set, ArtifactRule, DrRule, ExfilConfig, ExfilEvent, ExfilWatch, Filters, FpRule,
    InstallationKey, IntegrityRule, OrgConfig, Output, YaraConfig, YaraRule, YaraSource,
    DEFAULT_NAMESPACE,
};
pub use error::{ConfigError, LoadError};
pub use include::{
    include_id, load_effective_config, parse_document, ConfigSource, EffectiveConfig,
    FsIncludeLoader, IncludeLoader, MapIncludeLoader,
};
pub use merge::{merge, merge_all, union_ordered};
