//! Error types for loading and parsing config documents.

use thiserror::Error;

/// Failure reported by an [`IncludeLoader`](crate::IncludeLoader).
#[derive(Debug, Error)]
pub enum LoadError {
    /// The referenced document does not exist.
    #[error("document not found: {0}")]
    NotFound(String),

    /// The document exists but could not be read.
    #[error("cannot read {path}: {message}")]
    Io { path: String, message: String },
}

/// Errors raised while building an effective configuration.
///
/// Any of these aborts a push before reconciliation starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A document is not valid YAML or does not match the document model.
    #[error("failed to parse {document}: {source}")]
    Parse {
        document: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// An included document could not be loaded.
    #[error("failed to load {document}: {source}")]
    Load {
        document: String,
        #[source]
        source: LoadError,
    },

    /// A document includes itself, directly or transitively.
    #[error("include cycle detected: {}", chain.join(" -> "))]
    IncludeCycle { chain: Vec<String> },
}

impl ConfigError {
    /// True for the parse class of errors.
    pub fn is_parse_error(&self) -> bool {
        matches!(self, ConfigError::Parse { .. })
    }

    /// True for the load class of errors (missing include or include cycle).
    pub fn is_load_error(&self) -> bool {
        matches!(self, ConfigError::Load { .. } | ConfigError::IncludeCycle { .. })
    }

    /// Identifier of the document the error refers to.
    pub fn document(&self) -> &str {
        match self {
            ConfigError::Parse { document, .. } | ConfigError::Load { document, .. } => document,
            ConfigError::IncludeCycle { chain } => chain.last().map(String::as_str).unwrap_or(""),
        }
    }
}
