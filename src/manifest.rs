//! Declarative manifest of security-relevant paths
//!
//! The seal is a pure function of this data plus the file system. Adding a
//! subsystem to the seal means adding rows here (or to a manifest TOML
//! file), never new hashing code.

use crate::errors::{SealError, SealResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path};

/// Top-level seal keys a category may not shadow.
pub const RESERVED_KEYS: &[&str] = &[
    "timestamp",
    "schemaVersion",
    "repo",
    "phase",
    "status",
    "directories",
    "files",
    "runtime",
    "dependencies",
    "masterHash",
];

const DEFAULT_DIRECTORIES: &[&str] = &[
    "apps", "chain", "runtime", "indexer", "sdk", "engine", "deploy", "scripts", "templates",
    "docs",
];

const DEFAULT_FILES: &[&str] = &[
    "Cargo.toml",
    "package.json",
    "pnpm-workspace.yaml",
    "turbo.json",
    "chain/src/runtime/mod.rs",
    "chain/src/runtime/work_claim.rs",
    "chain/src/runtime/version.rs",
];

const DEFAULT_DEPENDENCY_FILES: &[&str] = &["Cargo.toml", "package.json", "pnpm-workspace.yaml"];

// (category, label, path)
const DEFAULT_ENTRIES: &[(&str, &str, &str)] = &[
    ("sdk", "schemas.drc369", "sdk/schema/drc369.json"),
    ("sdk", "schemas.abyssid", "sdk/schema/abyssid.json"),
    ("sdk", "schemas.fractal1", "sdk/schema/fractal1.json"),
    ("sdk", "schemas.wallet", "sdk/schema/wallet.json"),
    ("sdk", "compatibilityMap", "sdk/CONTRACT_COMPATIBILITY_MAP.json"),
    ("sdk", "tsSdk.index", "sdk/ts-sdk/src/index.ts"),
    ("sdk", "tsSdk.sdk", "sdk/ts-sdk/src/sdk.ts"),
    ("sdk", "rustSdk.lib", "sdk/rust-sdk/src/lib.rs"),
    ("abyssos", "security.hypervisorGuard", "apps/abyssos-portal/src/core/security/HypervisorGuard.ts"),
    ("abyssos", "security.memoryCage", "apps/abyssos-portal/src/core/security/MemoryCage.ts"),
    ("abyssos", "security.taskSandbox", "apps/abyssos-portal/src/core/security/TaskSandbox.ts"),
    ("abyssos", "fractall.codec", "apps/abyssos-portal/src/fractall/codec.ts"),
    ("abyssos", "fractall.verifier", "apps/abyssos-portal/src/fractall/fractall_verifier.ts"),
    ("abyssos", "fractall.benchmark", "apps/abyssos-portal/src/fractall/fractall_benchmark.ts"),
    ("chain", "invariants", "chain/src/invariants.rs"),
    ("chain", "stateSentinel", "chain/src/state_root_sentinel.rs"),
    ("chain", "signatureGuard", "chain/src/signature_guard.rs"),
    ("indexer", "integrity", "indexer/ingestor-rs/src/error.rs"),
    ("indexer", "recoveryMode", "indexer/ingestor-rs/src/recovery_mode.rs"),
    ("indexer", "driftDetector", "indexer/ingestor-rs/src/block_drift_detector.rs"),
    ("indexer", "canonicalEnforcer", "indexer/ingestor-rs/src/canonical_chain_enforcer.rs"),
    ("dns", "stateGuard", "apps/dns-service/src/security/dns_state_guard.ts"),
    ("dns", "updateVerifier", "apps/dns-service/src/security/dns_update_verifier.ts"),
    ("dns", "mutationShield", "apps/dns-service/src/security/dns_mutation_shield.ts"),
    ("wallet", "keyDerivationGuard", "apps/abyssid-service/src/security/key_derivation_guard.ts"),
    ("wallet", "signatureAnomalyDetector", "apps/abyssid-service/src/security/signature_anomaly_detector.ts"),
    ("wallet", "walletStateSentinel", "apps/abyssid-service/src/security/wallet_state_sentinel.ts"),
    ("ci", "guardian", "scripts/ci-guardian.ps1"),
    ("ci", "runtimeIntegrity", "scripts/enforce-runtime-integrity.ts"),
    ("ci", "checkRegistry", "scripts/check-runtime-registry.ts"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub category: String,
    pub label: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealManifest {
    #[serde(default)]
    pub directories: Vec<String>,
    #[serde(default)]
    pub files: Vec<String>,
    /// Files concatenated (in this order) into `dependencies.graph`.
    #[serde(default)]
    pub dependency_files: Vec<String>,
    #[serde(default, rename = "entry")]
    pub entries: Vec<ManifestEntry>,
}

impl Default for SealManifest {
    fn default() -> Self {
        Self {
            directories: to_strings(DEFAULT_DIRECTORIES),
            files: to_strings(DEFAULT_FILES),
            dependency_files: to_strings(DEFAULT_DEPENDENCY_FILES),
            entries: DEFAULT_ENTRIES
                .iter()
                .map(|(category, label, path)| ManifestEntry {
                    category: category.to_string(),
                    label: label.to_string(),
                    path: path.to_string(),
                })
                .collect(),
        }
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl SealManifest {
    pub fn from_toml_file(path: &Path) -> SealResult<Self> {
        let text =
            fs::read_to_string(path).map_err(|e| SealError::io("reading seal manifest", path, e))?;
        Self::from_toml_str(&text)
            .map_err(|e| SealError::manifest(format!("{}: {e}", path.display())))
    }

    pub fn from_toml_str(text: &str) -> SealResult<Self> {
        let manifest: Self = toml::from_str(text)
            .map_err(|e| SealError::manifest(format!("invalid manifest: {e}")))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Distinct categories in first-appearance order.
    pub fn categories(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.entries
            .iter()
            .map(|e| e.category.as_str())
            .filter(|c| seen.insert(*c))
            .collect()
    }

    pub fn validate(&self) -> SealResult<()> {
        for path in self
            .directories
            .iter()
            .chain(&self.files)
            .chain(&self.dependency_files)
            .chain(self.entries.iter().map(|e| &e.path))
        {
            validate_relative(path)?;
        }

        let mut labels = HashSet::new();
        for entry in &self.entries {
            if entry.category.is_empty() || entry.label.is_empty() {
                return Err(SealError::manifest(format!(
                    "entry for '{}' needs both category and label",
                    entry.path
                )));
            }
            if RESERVED_KEYS.contains(&entry.category.as_str()) {
                return Err(SealError::manifest(format!(
                    "category '{}' collides with a reserved seal field",
                    entry.category
                )));
            }
            if !labels.insert((entry.category.as_str(), entry.label.as_str())) {
                return Err(SealError::manifest(format!(
                    "duplicate manifest label {}.{}",
                    entry.category, entry.label
                )));
            }
        }
        Ok(())
    }
}

/// Manifest paths are repository-relative and may not climb out of the root.
fn validate_relative(path: &str) -> SealResult<()> {
    let p = Path::new(path);
    let escapes = p
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if path.is_empty() || escapes {
        return Err(SealError::manifest(format!(
            "manifest path '{path}' must be relative to the repository root"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_manifest_is_valid() {
        let manifest = SealManifest::default();
        manifest.validate().unwrap();
        assert_eq!(
            manifest.categories(),
            vec!["sdk", "abyssos", "chain", "indexer", "dns", "wallet", "ci"]
        );
        assert_eq!(manifest.directories.len(), 10);
        assert_eq!(manifest.dependency_files[0], "Cargo.toml");
    }

    #[test]
    fn test_toml_manifest() {
        let manifest = SealManifest::from_toml_str(
            r#"
files = ["Cargo.toml"]
dependency_files = ["Cargo.toml"]

[[entry]]
category = "ledger"
label = "invariants"
path = "chain/src/invariants.rs"
"#,
        )
        .unwrap();
        assert!(manifest.directories.is_empty());
        assert_eq!(manifest.entries[0].category, "ledger");
    }

    #[test]
    fn test_rejects_escaping_paths() {
        for bad in ["../secrets.rs", "/etc/passwd", ""] {
            let text = format!("files = [\"{bad}\"]\n");
            assert!(SealManifest::from_toml_str(&text).is_err(), "{bad}");
        }
    }

    #[test]
    fn test_rejects_reserved_and_duplicate_labels() {
        let reserved = r#"
[[entry]]
category = "runtime"
label = "x"
path = "a.rs"
"#;
        assert!(SealManifest::from_toml_str(reserved).is_err());

        let duplicate = r#"
[[entry]]
category = "ci"
label = "guardian"
path = "a.ps1"

[[entry]]
category = "ci"
label = "guardian"
path = "b.ps1"
"#;
        assert!(SealManifest::from_toml_str(duplicate).is_err());
    }
}
