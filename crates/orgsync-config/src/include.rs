//! Include resolution.
//!
//! A root document and everything it transitively includes are loaded
//! depth-first. Each document's includes are resolved in the order listed,
//! then the document's own content is laid on top, so a document always
//! overrides what it includes and later includes override earlier ones.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::document::OrgConfig;
use crate::error::{ConfigError, LoadError};
use crate::merge::merge;

/// Source of document bytes.
///
/// `parent` is the identifier of the including document (empty for the
/// root), `reference` the include path exactly as written.
pub trait IncludeLoader {
    fn load(&self, parent: &str, reference: &str) -> Result<Vec<u8>, LoadError>;
}

impl<F> IncludeLoader for F
where
    F: Fn(&str, &str) -> Result<Vec<u8>, LoadError>,
{
    fn load(&self, parent: &str, reference: &str) -> Result<Vec<u8>, LoadError> {
        self(parent, reference)
    }
}

/// Identifier of `reference` as included from `parent`: the reference joined
/// to the parent's directory, lexically normalized, `/`-separated.
pub fn include_id(parent: &str, reference: &str) -> String {
    if reference.starts_with('/') {
        return normalize(reference);
    }
    let dir = match parent.rfind('/') {
        Some(idx) => &parent[..idx],
        None => "",
    };
    if dir.is_empty() {
        normalize(reference)
    } else {
        normalize(&format!("{}/{}", dir, reference))
    }
}

fn normalize(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                if matches!(parts.last(), Some(last) if *last != "..") {
                    parts.pop();
                } else if !absolute {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }
    let joined = parts.join("/");
    if absolute {
        format!("/{}", joined)
    } else {
        joined
    }
}

/// A document that contributed to an effective configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSource {
    /// Document identifier as computed by [`include_id`].
    pub id: String,
    /// SHA-256 of the raw document bytes.
    pub digest: String,
}

/// Fully resolved configuration together with its provenance.
#[derive(Debug, Clone)]
pub struct EffectiveConfig {
    /// The merged document, free of `include` references.
    pub config: OrgConfig,
    /// Contributing documents in load order.
    pub sources: Vec<ConfigSource>,
}

/// Load `root` and everything it includes into one effective configuration.
pub fn load_effective_config(root: &str, loader: &dyn IncludeLoader) -> Result<EffectiveConfig, ConfigError> {
    let mut resolver = IncludeResolver {
        loader,
        stack: Vec::new(),
        sources: Vec::new(),
    };
    let config = resolver.resolve("", root)?;
    Ok(EffectiveConfig {
        config,
        sources: resolver.sources,
    })
}

/// Parse one document, attributing failures to `document`.
pub fn parse_document(document: &str, bytes: &[u8]) -> Result<OrgConfig, ConfigError> {
    OrgConfig::from_yaml_slice(bytes).map_err(|source| ConfigError::Parse {
        document: document.to_string(),
        source,
    })
}

struct IncludeResolver<'a> {
    loader: &'a dyn IncludeLoader,
    /// Documents currently being resolved, outermost first.
    stack: Vec<String>,
    sources: Vec<ConfigSource>,
}

impl IncludeResolver<'_> {
    fn resolve(&mut self, parent: &str, reference: &str) -> Result<OrgConfig, ConfigError> {
        let id = include_id(parent, reference);
        if self.stack.contains(&id) {
            let mut chain = self.stack.clone();
            chain.push(id);
            return Err(ConfigError::IncludeCycle { chain });
        }

        let bytes = self
            .loader
            .load(parent, reference)
            .map_err(|source| ConfigError::Load {
                document: id.clone(),
                source,
            })?;
        let mut document = parse_document(&id, &bytes)?;

        let digest = hex::encode(Sha256::digest(&bytes));
        debug!(document = %id, digest = %digest, includes = document.include.len(), "loaded config document");
        self.sources.push(ConfigSource {
            id: id.clone(),
            digest,
        });

        let includes = std::mem::take(&mut document.include);
        self.stack.push(id.clone());
        let mut accumulated = OrgConfig::default();
        for include in &includes {
            let included = self.resolve(&id, include)?;
            accumulated = merge(accumulated, included);
        }
        self.stack.pop();

        Ok(merge(accumulated, document))
    }
}

/// Loads documents from the filesystem. Identifiers are resolved against
/// `base_dir` unless absolute.
#[derive(Debug, Clone)]
pub struct FsIncludeLoader {
    base_dir: PathBuf,
}

impl FsIncludeLoader {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Loader rooted at the current working directory.
    pub fn current_dir() -> Self {
        Self::new(".")
    }

    fn path_for(&self, id: &str) -> PathBuf {
        let path = Path::new(id);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}

impl IncludeLoader for FsIncludeLoader {
    fn load(&self, parent: &str, reference: &str) -> Result<Vec<u8>, LoadError> {
        let id = include_id(parent, reference);
        let path = self.path_for(&id);
        fs::read(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => LoadError::NotFound(path.display().to_string()),
            _ => LoadError::Io {
                path: path.display().to_string(),
                message: e.to_string(),
            },
        })
    }
}

/// In-memory loader keyed by document identifier.
#[derive(Debug, Clone, Default)]
pub struct MapIncludeLoader {
    documents: HashMap<String, Vec<u8>>,
}

impl MapIncludeLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document, builder style.
    pub fn with(mut self, id: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.insert(id, content);
        self
    }

    pub fn insert(&mut self, id: impl Into<String>, content: impl Into<Vec<u8>>) {
        self.documents.insert(id.into(), content.into());
    }
}

impl IncludeLoader for MapIncludeLoader {
    fn load(&self, parent: &str, reference: &str) -> Result<Vec<u8>, LoadError> {
        let id = include_id(parent, reference);
        self.documents
            .get(&id)
            .cloned()
            .ok_or(LoadError::NotFound(id))
    }
}
