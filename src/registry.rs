//! Runtime registry composition
//!
//! Resolves every parsed module id to `<module_root>/<id>.rs`, hashes it and
//! folds the result into a [`RuntimeRegistry`] with a single `registryHash`.

use crate::canonicalize::canonical_digest;
use crate::content_hasher::{ContentHasher, HashValue};
use crate::errors::{SealError, SealResult};
use crate::source_parser::ParsedSource;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Number of hex characters shown when a hash is printed for humans.
pub const SHORT_HASH_LEN: usize = 16;

/// One declared module and the digest of its implementation file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleDescriptor {
    pub id: String,
    pub hash: HashValue,
    #[serde(skip)]
    pub path: PathBuf,
}

/// The ordered, versioned catalog of modules wired into the runtime.
///
/// Recomputed on every invocation and never persisted on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeRegistry {
    pub version: u32,
    pub declared_module_count: usize,
    pub module_order: Vec<String>,
    pub module_hashes: BTreeMap<String, HashValue>,
    pub registry_hash: String,
    #[serde(skip)]
    pub modules: Vec<ModuleDescriptor>,
}

/// Exact shape fed to the registry digest. The module order is sorted so
/// that membership and position are judged separately: reordering alone
/// leaves this value untouched and is caught by the order check instead.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RegistryDigestInput<'a> {
    version: u32,
    declared_module_count: usize,
    module_order: Vec<&'a str>,
    module_hashes: &'a BTreeMap<String, HashValue>,
}

impl RuntimeRegistry {
    /// Assemble a registry from its descriptors and compute `registryHash`.
    pub fn from_descriptors(
        version: u32,
        declared_module_count: usize,
        modules: Vec<ModuleDescriptor>,
    ) -> SealResult<Self> {
        let module_order: Vec<String> = modules.iter().map(|m| m.id.clone()).collect();
        let module_hashes: BTreeMap<String, HashValue> = modules
            .iter()
            .map(|m| (m.id.clone(), m.hash.clone()))
            .collect();
        let registry_hash =
            compute_registry_hash(version, declared_module_count, &module_order, &module_hashes)?;

        Ok(Self {
            version,
            declared_module_count,
            module_order,
            module_hashes,
            registry_hash,
            modules,
        })
    }

    pub fn module_count(&self) -> usize {
        self.module_order.len()
    }

    pub fn hash_of(&self, id: &str) -> Option<&HashValue> {
        self.module_hashes.get(id)
    }

    pub fn path_of(&self, id: &str) -> Option<&Path> {
        self.modules
            .iter()
            .find(|m| m.id == id)
            .map(|m| m.path.as_path())
    }

    pub fn short_hash(&self) -> &str {
        short_hash(&self.registry_hash)
    }

    /// Fails with `ModuleFileNotFound` for the first declared module whose
    /// implementation file is absent.
    pub fn ensure_complete(&self) -> SealResult<()> {
        match self.modules.iter().find(|m| m.hash.is_missing()) {
            Some(m) => Err(SealError::ModuleFileNotFound {
                module: m.id.clone(),
                path: m.path.clone(),
            }),
            None => Ok(()),
        }
    }
}

pub fn short_hash(hash: &str) -> &str {
    hash.get(..SHORT_HASH_LEN).unwrap_or(hash)
}

/// Digest over `{version, declaredModuleCount, sorted(moduleOrder), moduleHashes}`
/// in canonical JSON.
pub fn compute_registry_hash(
    version: u32,
    declared_module_count: usize,
    module_order: &[String],
    module_hashes: &BTreeMap<String, HashValue>,
) -> SealResult<String> {
    let mut sorted: Vec<&str> = module_order.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    canonical_digest(&RegistryDigestInput {
        version,
        declared_module_count,
        module_order: sorted,
        module_hashes,
    })
}

/// Fixed path convention for a module implementation file.
pub fn module_path(module_root: &Path, id: &str) -> PathBuf {
    module_root.join(format!("{id}.rs"))
}

#[derive(Debug, Clone, Default)]
pub struct RegistryComposer {
    hasher: ContentHasher,
}

impl RegistryComposer {
    pub fn new(hasher: ContentHasher) -> Self {
        Self { hasher }
    }

    /// Hash every declared module and build the registry.
    ///
    /// Absent module files are recorded as `missing`; the enforcer turns that
    /// into `MissingModuleHash` and the seal path into `ModuleFileNotFound`.
    pub fn compose(&self, parsed: &ParsedSource, module_root: &Path) -> SealResult<RuntimeRegistry> {
        let paths: Vec<PathBuf> = parsed
            .module_order
            .iter()
            .map(|id| module_path(module_root, id))
            .collect();
        let hashes = self.hasher.hash_all(&paths)?;

        let modules: Vec<ModuleDescriptor> = parsed
            .module_order
            .iter()
            .zip(paths)
            .zip(hashes)
            .map(|((id, path), hash)| {
                if hash.is_missing() {
                    warn!(module = %id, path = %path.display(), "module file not found");
                }
                ModuleDescriptor {
                    id: id.clone(),
                    hash,
                    path,
                }
            })
            .collect();

        let registry =
            RuntimeRegistry::from_descriptors(parsed.version, parsed.declared_module_count, modules)?;
        info!(
            version = registry.version,
            modules = registry.module_count(),
            registry_hash = %registry.registry_hash,
            "composed runtime registry"
        );
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content_hasher::digest_bytes;
    use std::fs;
    use tempfile::tempdir;

    fn parsed(ids: &[&str]) -> ParsedSource {
        ParsedSource {
            version: 1,
            declared_module_count: ids.len(),
            module_order: ids.iter().map(|s| s.to_string()).collect(),
            count_declared: false,
        }
    }

    fn write_modules(root: &Path, ids: &[&str]) {
        for id in ids {
            fs::write(module_path(root, id), format!("// module {id}\n")).unwrap();
        }
    }

    #[test]
    fn test_compose_hashes_each_module() {
        let dir = tempdir().unwrap();
        write_modules(dir.path(), &["bank_cgt", "nft_dgen"]);

        let registry = RegistryComposer::default()
            .compose(&parsed(&["bank_cgt", "nft_dgen"]), dir.path())
            .unwrap();

        assert_eq!(registry.module_order, vec!["bank_cgt", "nft_dgen"]);
        assert_eq!(
            registry.hash_of("bank_cgt"),
            Some(&HashValue::Digest(digest_bytes(b"// module bank_cgt\n")))
        );
        assert_eq!(registry.registry_hash.len(), 64);
        assert!(registry.ensure_complete().is_ok());
    }

    #[test]
    fn test_single_byte_change_is_local() {
        let dir = tempdir().unwrap();
        let ids = ["bank_cgt", "nft_dgen", "work_claim"];
        write_modules(dir.path(), &ids);
        let composer = RegistryComposer::new(ContentHasher::new(2));

        let before = composer.compose(&parsed(&ids), dir.path()).unwrap();
        fs::write(module_path(dir.path(), "nft_dgen"), "// module nft_dgen!\n").unwrap();
        let after = composer.compose(&parsed(&ids), dir.path()).unwrap();

        assert_ne!(before.hash_of("nft_dgen"), after.hash_of("nft_dgen"));
        assert_eq!(before.hash_of("bank_cgt"), after.hash_of("bank_cgt"));
        assert_eq!(before.hash_of("work_claim"), after.hash_of("work_claim"));
        assert_ne!(before.registry_hash, after.registry_hash);
    }

    #[test]
    fn test_registry_hash_ignores_declaration_order() {
        let dir = tempdir().unwrap();
        write_modules(dir.path(), &["a", "b", "c"]);
        let composer = RegistryComposer::default();

        let abc = composer.compose(&parsed(&["a", "b", "c"]), dir.path()).unwrap();
        let acb = composer.compose(&parsed(&["a", "c", "b"]), dir.path()).unwrap();
        assert_eq!(abc.registry_hash, acb.registry_hash);
        assert_ne!(abc.module_order, acb.module_order);
    }

    #[test]
    fn test_registry_hash_covers_version_and_count() {
        let mut hashes = BTreeMap::new();
        hashes.insert("a".to_string(), HashValue::Digest(digest_bytes(b"a")));
        let order = vec!["a".to_string()];

        let base = compute_registry_hash(1, 1, &order, &hashes).unwrap();
        assert_ne!(base, compute_registry_hash(2, 1, &order, &hashes).unwrap());
        assert_ne!(base, compute_registry_hash(1, 2, &order, &hashes).unwrap());
    }

    #[test]
    fn test_missing_module_is_recorded_then_rejected() {
        let dir = tempdir().unwrap();
        write_modules(dir.path(), &["bank_cgt"]);

        let registry = RegistryComposer::default()
            .compose(&parsed(&["bank_cgt", "work_claim"]), dir.path())
            .unwrap();
        assert_eq!(registry.hash_of("work_claim"), Some(&HashValue::Missing));

        match registry.ensure_complete() {
            Err(SealError::ModuleFileNotFound { module, path }) => {
                assert_eq!(module, "work_claim");
                assert!(path.ends_with("work_claim.rs"));
            }
            other => panic!("expected ModuleFileNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_serialized_shape() {
        let dir = tempdir().unwrap();
        write_modules(dir.path(), &["bank_cgt"]);
        let registry = RegistryComposer::default()
            .compose(&parsed(&["bank_cgt"]), dir.path())
            .unwrap();

        let value = serde_json::to_value(&registry).unwrap();
        assert_eq!(value["declaredModuleCount"], 1);
        assert_eq!(value["moduleOrder"][0], "bank_cgt");
        assert!(value["registryHash"].is_string());
        assert!(value.get("modules").is_none());
    }
}
