//! Fail-closed validation of a composed registry
//!
//! Checks run in a fixed order and stop at the first failure:
//! count, then order against the canonical contract, then hash presence,
//! then (when a baseline exists) the sealed registry hash.

use crate::content_hasher::HashValue;
use crate::errors::IntegrityError;
use crate::expected_schema::ExpectedRegistrySchema;
use crate::registry::{module_path, short_hash, RuntimeRegistry};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, info};

/// How the registry hash was judged against the persisted seal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SealComparison {
    /// Baseline present and equal.
    Matched,
    /// No baseline was available (first run or unreadable seal).
    NoBaseline,
    /// The command does not compare against a seal.
    Skipped,
}

/// Audit summary of a passing check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnforcementReport {
    pub version: u32,
    pub module_count: usize,
    pub module_order: Vec<String>,
    pub registry_hash: String,
    pub seal: SealComparison,
}

impl EnforcementReport {
    pub fn summary_lines(&self) -> Vec<String> {
        let seal = match self.seal {
            SealComparison::Matched => "matches sealed baseline",
            SealComparison::NoBaseline => "no sealed baseline (bootstrap)",
            SealComparison::Skipped => "not compared",
        };
        vec![
            format!("Runtime Version: {}", self.version),
            format!("Module Count: {}", self.module_count),
            format!("Modules: {}", self.module_order.join(", ")),
            format!("Registry Hash: {}...", short_hash(&self.registry_hash)),
            format!("Seal: {seal}"),
        ]
    }
}

pub struct IntegrityEnforcer<'a> {
    schema: &'a ExpectedRegistrySchema,
}

impl<'a> IntegrityEnforcer<'a> {
    pub fn new(schema: &'a ExpectedRegistrySchema) -> Self {
        Self { schema }
    }

    /// Ordering and completeness checks only.
    pub fn check_registry(&self, registry: &RuntimeRegistry) -> Result<EnforcementReport, IntegrityError> {
        self.check_count(registry)?;
        self.check_order(registry)?;
        self.check_hashes(registry)?;
        Ok(self.report(registry, SealComparison::Skipped))
    }

    /// Full check, including the sealed registry hash when one is supplied.
    pub fn enforce(
        &self,
        registry: &RuntimeRegistry,
        sealed_registry_hash: Option<&str>,
    ) -> Result<EnforcementReport, IntegrityError> {
        self.check_count(registry)?;
        self.check_order(registry)?;
        self.check_hashes(registry)?;

        let seal = match sealed_registry_hash {
            Some(sealed) if sealed != registry.registry_hash => {
                return Err(IntegrityError::TamperDetected {
                    sealed: sealed.to_string(),
                    current: registry.registry_hash.clone(),
                });
            }
            Some(_) => SealComparison::Matched,
            None => SealComparison::NoBaseline,
        };

        let report = self.report(registry, seal);
        info!(
            version = report.version,
            modules = report.module_count,
            registry_hash = %report.registry_hash,
            "runtime integrity verified"
        );
        Ok(report)
    }

    fn check_count(&self, registry: &RuntimeRegistry) -> Result<(), IntegrityError> {
        let actual = registry.module_order.len();
        if registry.declared_module_count != actual {
            return Err(IntegrityError::CountMismatch {
                declared: registry.declared_module_count,
                actual,
            });
        }
        Ok(())
    }

    /// Position-by-position comparison; enforces membership and order at once.
    fn check_order(&self, registry: &RuntimeRegistry) -> Result<(), IntegrityError> {
        let expected = &self.schema.canonical_order;
        let actual = &registry.module_order;
        for index in 0..expected.len().max(actual.len()) {
            let want = expected.get(index);
            let got = actual.get(index);
            if want != got {
                return Err(IntegrityError::OrderMismatch {
                    index,
                    expected: want.cloned(),
                    actual: got.cloned(),
                });
            }
        }
        debug!(modules = actual.len(), "module order matches canonical contract");
        Ok(())
    }

    fn check_hashes(&self, registry: &RuntimeRegistry) -> Result<(), IntegrityError> {
        for id in &self.schema.canonical_order {
            match registry.hash_of(id) {
                Some(HashValue::Digest(_)) => {}
                _ => {
                    let path = registry
                        .path_of(id)
                        .map(PathBuf::from)
                        .unwrap_or_else(|| module_path(std::path::Path::new(""), id));
                    return Err(IntegrityError::MissingModuleHash {
                        module: id.clone(),
                        path,
                    });
                }
            }
        }
        Ok(())
    }

    fn report(&self, registry: &RuntimeRegistry, seal: SealComparison) -> EnforcementReport {
        EnforcementReport {
            version: registry.version,
            module_count: registry.module_count(),
            module_order: registry.module_order.clone(),
            registry_hash: registry.registry_hash.clone(),
            seal,
        }
    }
}
