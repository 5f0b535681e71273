//! Entry-point pipelines
//!
//! Every command recomputes the runtime registry from scratch. Only
//! [`run_update_seal`] writes; the other pipelines never touch the seal file.

use crate::audit::{AuditAction, AuditEvent};
use crate::config::SealConfig;
use crate::enforcer::{EnforcementReport, IntegrityEnforcer};
use crate::errors::{ExitStatus, SealError, SealResult};
use crate::registry::{RegistryComposer, RuntimeRegistry};
use crate::seal::{SealAggregator, SealDocument};
use crate::seal_store::SealState;
use std::error::Error as _;
use tracing::{info, warn};

/// Parse the runtime description source and hash every declared module.
pub fn compose_registry(config: &SealConfig) -> SealResult<RuntimeRegistry> {
    let parsed = config.parser().parse_file(&config.runtime_source_path())?;
    info!(
        version = parsed.version,
        modules = parsed.module_order.len(),
        "parsed runtime description"
    );
    RegistryComposer::new(config.hasher()).compose(&parsed, &config.module_root_path())
}

/// Full gate: ordering, completeness and the sealed registry hash.
pub fn run_enforce(config: &SealConfig) -> SealResult<EnforcementReport> {
    let schema = config.load_schema()?;
    let registry = compose_registry(config)?;
    let baseline = sealed_baseline(config)?;
    let report = IntegrityEnforcer::new(&schema).enforce(&registry, baseline.as_deref())?;
    Ok(report)
}

/// Ordering and completeness only. The seal is not read.
pub fn run_check_registry(config: &SealConfig) -> SealResult<EnforcementReport> {
    let schema = config.load_schema()?;
    let registry = compose_registry(config)?;
    let report = IntegrityEnforcer::new(&schema).check_registry(&registry)?;
    Ok(report)
}

/// Build a fresh seal and atomically replace the persisted one.
pub fn run_update_seal(config: &SealConfig) -> SealResult<SealDocument> {
    let registry = compose_registry(config)?;
    registry.ensure_complete()?;

    let schema = config.load_schema()?;
    if let Err(violation) = IntegrityEnforcer::new(&schema).check_registry(&registry) {
        warn!(error = %violation, "sealing a registry that does not satisfy the canonical order");
    }

    let manifest = config.load_manifest()?;
    let doc = SealAggregator::new(&config.repo_root, &manifest)
        .with_hasher(config.hasher())
        .with_directory_mode(config.directory_hash_mode)
        .with_metadata(config.repo_name.clone(), config.phase.clone())
        .build(&registry)?;
    config.seal_store().save(&doc)?;
    Ok(doc)
}

pub fn run_show_registry(config: &SealConfig) -> SealResult<RuntimeRegistry> {
    compose_registry(config)
}

/// Registry hash of the persisted seal, if any.
///
/// The seal's own master hash is verified before its registry hash is
/// trusted. An absent or unreadable seal is the bootstrap case unless the
/// configuration requires one. A seal in an older layout is refused.
fn sealed_baseline(config: &SealConfig) -> SealResult<Option<String>> {
    let store = config.seal_store();
    let doc = match store.inspect() {
        SealState::Current(doc) => doc,
        SealState::Legacy => {
            return Err(SealError::LegacySealField {
                path: store.path().to_path_buf(),
            })
        }
        SealState::Absent | SealState::Corrupt if config.require_seal => {
            return Err(SealError::SealMissing {
                path: store.path().to_path_buf(),
            })
        }
        SealState::Absent | SealState::Corrupt => {
            warn!(path = %store.path().display(), "no sealed baseline; skipping tamper comparison");
            return Ok(None);
        }
    };
    let sealed = doc.sealed_registry_hash(store.path())?.to_string();
    doc.verify_master_hash()?;
    Ok(Some(sealed))
}

/// Multi-line diagnostic for a failed run.
pub fn render_failure(err: &SealError) -> Vec<String> {
    let heading = match err.exit_status() {
        ExitStatus::IntegrityViolation => "RUNTIME INTEGRITY VIOLATION",
        _ => "RUNTIME SEAL SETUP FAILURE",
    };
    let mut lines = vec![format!("{heading}: {}", err.category()), format!("  {err}")];
    match err {
        SealError::Integrity(violation) => {
            lines.extend(violation.detail_lines().into_iter().map(|l| format!("  {l}")));
        }
        SealError::ModuleFileNotFound { module, path } => {
            lines.push(format!("  Module: {module}"));
            lines.push(format!("  Path: {}", path.display()));
        }
        _ => {
            let mut source = err.source();
            while let Some(cause) = source {
                lines.push(format!("  caused by: {cause}"));
                source = cause.source();
            }
        }
    }
    lines
}

pub fn render_pass(action: AuditAction, report: &EnforcementReport) -> Vec<String> {
    let mut lines = vec![format!("RUNTIME INTEGRITY VERIFIED ({})", action.as_str())];
    lines.extend(report.summary_lines().into_iter().map(|l| format!("  {l}")));
    lines
}

pub fn render_sealed(doc: &SealDocument) -> Vec<String> {
    let registry_hash = doc.runtime.registry_hash.as_deref().unwrap_or("");
    vec![
        "SEAL UPDATED".to_string(),
        format!("  Repo: {} ({})", doc.repo, doc.phase),
        format!("  Timestamp: {} (not covered by masterHash)", doc.timestamp),
        format!("  Runtime Version: {}", doc.runtime.version),
        format!("  Registry Hash: {registry_hash}"),
        format!("  Master Hash: {}", doc.master_hash),
    ]
}

/// Record the outcome of a gate run and map it to an exit status.
pub fn conclude<T>(action: AuditAction, result: &SealResult<T>) -> ExitStatus {
    match result {
        Ok(_) => ExitStatus::Pass,
        Err(err) => {
            AuditEvent::gate_failed(action, err).emit();
            err.exit_status()
        }
    }
}
