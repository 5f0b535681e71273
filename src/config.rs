// Layered configuration for the runtime seal gate
// Order of precedence: built-in defaults < runtime_seal.toml < RUNTIME_SEAL_* env < CLI flags

use crate::content_hasher::{ContentHasher, DirectoryHashMode};
use crate::errors::{SealError, SealResult};
use crate::expected_schema::ExpectedRegistrySchema;
use crate::manifest::SealManifest;
use crate::seal::{DEFAULT_PHASE, DEFAULT_REPO_NAME};
use crate::seal_store::{SealStore, DEFAULT_SEAL_FILE};
use crate::source_parser::{is_identifier, SourceParser, DEFAULT_RESERVED_MODULE};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const CONFIG_FILE: &str = "runtime_seal.toml";
pub const ENV_PREFIX: &str = "RUNTIME_SEAL_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealConfig {
    pub repo_root: PathBuf,
    pub runtime_source: PathBuf,
    pub module_root: PathBuf,
    pub seal_path: PathBuf,
    pub reserved_module: String,
    pub repo_name: String,
    pub phase: String,
    pub directory_hash_mode: DirectoryHashMode,
    /// 0 means one worker per available core.
    pub hash_workers: usize,
    pub require_seal: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_schema_file: Option<PathBuf>,
}

impl Default for SealConfig {
    fn default() -> Self {
        Self {
            repo_root: PathBuf::from("."),
            runtime_source: PathBuf::from("chain/src/runtime/mod.rs"),
            module_root: PathBuf::from("chain/src/runtime"),
            seal_path: PathBuf::from(DEFAULT_SEAL_FILE),
            reserved_module: DEFAULT_RESERVED_MODULE.to_string(),
            repo_name: DEFAULT_REPO_NAME.to_string(),
            phase: DEFAULT_PHASE.to_string(),
            directory_hash_mode: DirectoryHashMode::default(),
            hash_workers: 0,
            require_seal: false,
            manifest_file: None,
            expected_schema_file: None,
        }
    }
}

/// Values supplied on the command line. Unset fields leave lower layers alone.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo_root: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seal_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory_hash_mode: Option<DirectoryHashMode>,
    /// Explicit config file; defaults to `<repo_root>/runtime_seal.toml`.
    #[serde(skip)]
    pub config_file: Option<PathBuf>,
}

pub fn load_config(overrides: &ConfigOverrides) -> SealResult<SealConfig> {
    let config_file = match &overrides.config_file {
        Some(file) => file.clone(),
        None => locate_root(overrides).join(CONFIG_FILE),
    };
    debug!(config_file = %config_file.display(), "loading configuration");

    let figment = Figment::from(Serialized::defaults(SealConfig::default()))
        .merge(Toml::file(&config_file))
        .merge(Env::prefixed(ENV_PREFIX))
        .merge(Serialized::defaults(overrides));

    let config: SealConfig = figment
        .extract()
        .map_err(|e| SealError::config(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

/// The root decides where the TOML layer lives, so it is resolved from the
/// CLI and environment before the full figment is built.
fn locate_root(overrides: &ConfigOverrides) -> PathBuf {
    if let Some(root) = &overrides.repo_root {
        return root.clone();
    }
    Figment::from(Env::prefixed(ENV_PREFIX))
        .extract_inner::<PathBuf>("repo_root")
        .unwrap_or_else(|_| PathBuf::from("."))
}

impl SealConfig {
    pub fn validate(&self) -> SealResult<()> {
        let paths: [(&str, &Path); 4] = [
            ("repo_root", self.repo_root.as_path()),
            ("runtime_source", self.runtime_source.as_path()),
            ("module_root", self.module_root.as_path()),
            ("seal_path", self.seal_path.as_path()),
        ];
        for (key, path) in paths {
            if path.as_os_str().is_empty() {
                return Err(SealError::config(format!("{key} must not be empty")));
            }
        }
        if !is_identifier(&self.reserved_module) {
            return Err(SealError::config(format!(
                "reserved_module '{}' is not a module identifier",
                self.reserved_module
            )));
        }
        if self.repo_name.trim().is_empty() || self.phase.trim().is_empty() {
            return Err(SealError::config("repo_name and phase must be set"));
        }
        Ok(())
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        self.repo_root.join(path)
    }

    pub fn runtime_source_path(&self) -> PathBuf {
        self.resolve(&self.runtime_source)
    }

    pub fn module_root_path(&self) -> PathBuf {
        self.resolve(&self.module_root)
    }

    pub fn seal_file(&self) -> PathBuf {
        self.resolve(&self.seal_path)
    }

    pub fn hasher(&self) -> ContentHasher {
        ContentHasher::new(self.hash_workers)
    }

    pub fn parser(&self) -> SourceParser {
        SourceParser::new(self.reserved_module.clone())
    }

    pub fn seal_store(&self) -> SealStore {
        SealStore::new(self.seal_file())
    }

    pub fn load_schema(&self) -> SealResult<ExpectedRegistrySchema> {
        match &self.expected_schema_file {
            Some(file) => ExpectedRegistrySchema::from_toml_file(&self.resolve(file)),
            None => Ok(ExpectedRegistrySchema::canonical()),
        }
    }

    pub fn load_manifest(&self) -> SealResult<SealManifest> {
        match &self.manifest_file {
            Some(file) => SealManifest::from_toml_file(&self.resolve(file)),
            None => Ok(SealManifest::default()),
        }
    }
}
