//! Repository seal document and its aggregator
//!
//! A [`SealDocument`] is a point-in-time snapshot of digests over the runtime
//! registry and every path named by the [`SealManifest`]. Its `masterHash`
//! is a SHA-256 over the canonical JSON of the document with `masterHash`
//! and `timestamp` replaced by empty placeholders, so two seals of an
//! unchanged tree carry the same master hash.
//!
//! The timestamp is therefore unauthenticated: it can be edited without
//! failing [`SealDocument::verify_master_hash`] and must not be relied on
//! as evidence of when the seal was taken.

use crate::canonicalize::canonical_digest;
use crate::content_hasher::{hash_concatenated, hash_directory, ContentHasher, DirectoryHashMode, HashValue};
use crate::errors::{IntegrityError, SealError, SealResult};
use crate::manifest::SealManifest;
use crate::registry::RuntimeRegistry;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const SEAL_SCHEMA_VERSION: &str = "2.0.0";
pub const SEAL_STATUS: &str = "HARDENED";
pub const DEFAULT_REPO_NAME: &str = "DEMIURGE";
pub const DEFAULT_PHASE: &str = "OMEGA_PART_II";

/// Stands in for self-referential fields while the master hash is computed.
pub const HASH_PLACEHOLDER: &str = "";

/// Separator between dependency manifests in the `dependencies.graph` input.
pub const DEPENDENCY_SEPARATOR: &[u8] = b"|";

/// Runtime section of the seal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeSeal {
    pub modules: BTreeMap<String, HashValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_hash: Option<String>,
    pub version: u32,
    /// Deprecated alias once read as a baseline. Never written; only
    /// detected so it can be refused.
    #[serde(default, rename = "masterHash", skip_serializing_if = "Option::is_none")]
    pub legacy_master_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SealDocument {
    pub timestamp: String,
    pub schema_version: String,
    pub repo: String,
    pub phase: String,
    pub status: String,
    pub directories: BTreeMap<String, HashValue>,
    pub files: BTreeMap<String, HashValue>,
    pub runtime: RuntimeSeal,
    pub dependencies: BTreeMap<String, HashValue>,
    #[serde(flatten)]
    pub categories: BTreeMap<String, BTreeMap<String, HashValue>>,
    pub master_hash: String,
}

impl SealDocument {
    /// Recompute the master hash from the document's current contents.
    pub fn compute_master_hash(&self) -> SealResult<String> {
        let mut unsealed = self.clone();
        unsealed.master_hash = HASH_PLACEHOLDER.to_string();
        unsealed.timestamp = HASH_PLACEHOLDER.to_string();
        canonical_digest(&unsealed)
    }

    /// Fails with `SealDigestMismatch` when the recorded master hash does not
    /// describe the document it sits in.
    pub fn verify_master_hash(&self) -> SealResult<()> {
        let computed = self.compute_master_hash()?;
        if computed != self.master_hash {
            return Err(IntegrityError::SealDigestMismatch {
                recorded: self.master_hash.clone(),
                computed,
            }
            .into());
        }
        Ok(())
    }

    /// The baseline registry hash. Only `runtime.registryHash` qualifies;
    /// a document carrying just the legacy `runtime.masterHash` is refused.
    pub fn sealed_registry_hash(&self, seal_path: &Path) -> SealResult<&str> {
        match (&self.runtime.registry_hash, &self.runtime.legacy_master_hash) {
            (Some(hash), _) => Ok(hash),
            (None, Some(_)) => Err(SealError::LegacySealField {
                path: seal_path.to_path_buf(),
            }),
            (None, None) => Err(SealError::config(format!(
                "seal at {} has no runtime.registryHash",
                seal_path.display()
            ))),
        }
    }

    pub fn category(&self, name: &str) -> Option<&BTreeMap<String, HashValue>> {
        self.categories.get(name)
    }
}

/// Builds a [`SealDocument`] by hashing everything the manifest names.
pub struct SealAggregator<'a> {
    repo_root: &'a Path,
    manifest: &'a SealManifest,
    hasher: ContentHasher,
    directory_mode: DirectoryHashMode,
    repo_name: String,
    phase: String,
}

impl<'a> SealAggregator<'a> {
    pub fn new(repo_root: &'a Path, manifest: &'a SealManifest) -> Self {
        Self {
            repo_root,
            manifest,
            hasher: ContentHasher::default(),
            directory_mode: DirectoryHashMode::default(),
            repo_name: DEFAULT_REPO_NAME.to_string(),
            phase: DEFAULT_PHASE.to_string(),
        }
    }

    pub fn with_hasher(mut self, hasher: ContentHasher) -> Self {
        self.hasher = hasher;
        self
    }

    pub fn with_directory_mode(mut self, mode: DirectoryHashMode) -> Self {
        self.directory_mode = mode;
        self
    }

    pub fn with_metadata(mut self, repo_name: impl Into<String>, phase: impl Into<String>) -> Self {
        self.repo_name = repo_name.into();
        self.phase = phase.into();
        self
    }

    /// Seal the current tree, stamping it with the current time.
    pub fn build(&self, registry: &RuntimeRegistry) -> SealResult<SealDocument> {
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        self.build_at(registry, timestamp)
    }

    pub fn build_at(&self, registry: &RuntimeRegistry, timestamp: String) -> SealResult<SealDocument> {
        info!(root = %self.repo_root.display(), mode = ?self.directory_mode, "building seal");

        let mut directories = BTreeMap::new();
        for dir in &self.manifest.directories {
            let value = hash_directory(&self.resolve(dir), self.directory_mode)?;
            directories.insert(dir.clone(), value);
        }

        let files = self.hash_labelled(self.manifest.files.iter().map(|f| (f.clone(), f.as_str())))?;

        let mut categories: BTreeMap<String, BTreeMap<String, HashValue>> = BTreeMap::new();
        let entry_paths: Vec<PathBuf> = self
            .manifest
            .entries
            .iter()
            .map(|e| self.resolve(&e.path))
            .collect();
        let entry_hashes = self.hasher.hash_all(&entry_paths)?;
        for (entry, value) in self.manifest.entries.iter().zip(entry_hashes) {
            if value.is_missing() {
                warn!(category = %entry.category, label = %entry.label, path = %entry.path, "sealed path missing");
            }
            categories
                .entry(entry.category.clone())
                .or_default()
                .insert(entry.label.clone(), value);
        }

        let dependency_paths: Vec<PathBuf> = self
            .manifest
            .dependency_files
            .iter()
            .map(|f| self.resolve(f))
            .collect();
        let graph = hash_concatenated(&dependency_paths, DEPENDENCY_SEPARATOR)?;
        let mut dependencies = BTreeMap::new();
        dependencies.insert("graph".to_string(), HashValue::Digest(graph));

        let runtime = RuntimeSeal {
            modules: registry.module_hashes.clone(),
            registry_hash: Some(registry.registry_hash.clone()),
            version: registry.version,
            legacy_master_hash: None,
        };

        let mut doc = SealDocument {
            timestamp,
            schema_version: SEAL_SCHEMA_VERSION.to_string(),
            repo: self.repo_name.clone(),
            phase: self.phase.clone(),
            status: SEAL_STATUS.to_string(),
            directories,
            files,
            runtime,
            dependencies,
            categories,
            master_hash: HASH_PLACEHOLDER.to_string(),
        };
        doc.master_hash = doc.compute_master_hash()?;
        debug!(master_hash = %doc.master_hash, "seal built");
        Ok(doc)
    }

    fn hash_labelled<'s, I>(&self, items: I) -> SealResult<BTreeMap<String, HashValue>>
    where
        I: Iterator<Item = (String, &'s str)>,
    {
        let (labels, paths): (Vec<String>, Vec<PathBuf>) =
            items.map(|(label, rel)| (label, self.resolve(rel))).unzip();
        let hashes = self.hasher.hash_all(&paths)?;
        Ok(labels.into_iter().zip(hashes).collect())
    }

    fn resolve(&self, rel: &str) -> PathBuf {
        self.repo_root.join(rel)
    }
}
