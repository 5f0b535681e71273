// End-to-end pipeline scenarios against a fixture repository

use super::fixtures::FixtureRepo;
use crate::commands::{run_check_registry, run_enforce, run_show_registry, run_update_seal};
use crate::enforcer::SealComparison;
use crate::errors::{ExitStatus, IntegrityError, ParseError, SealError};
use crate::expected_schema::CANONICAL_MODULE_ORDER;
use crate::seal_store::render;
use std::fs;

#[test]
fn canonical_runtime_passes_enforce() {
    let repo = FixtureRepo::canonical();
    let report = run_enforce(&repo.config()).unwrap();

    assert_eq!(report.version, 1);
    assert_eq!(report.module_count, 9);
    assert_eq!(report.seal, SealComparison::NoBaseline);
    assert!(report.summary_lines()[3].starts_with("Registry Hash: "));
}

#[test]
fn deleted_module_is_missing_hash() {
    let repo = FixtureRepo::canonical();
    repo.remove_module("work_claim");

    match run_enforce(&repo.config()).unwrap_err() {
        SealError::Integrity(IntegrityError::MissingModuleHash { module, path }) => {
            assert_eq!(module, "work_claim");
            assert_eq!(path, repo.module_path("work_claim"));
        }
        other => panic!("expected MissingModuleHash, got {other:?}"),
    }
}

#[test]
fn swapped_declarations_fail_check_registry() {
    let repo = FixtureRepo::canonical();
    let mut order = CANONICAL_MODULE_ORDER.to_vec();
    order.swap(3, 4);
    repo.write_source(&order, 1, Some(9));

    let err = run_check_registry(&repo.config()).unwrap_err();
    assert_eq!(err.exit_status(), ExitStatus::IntegrityViolation);
    match err {
        SealError::Integrity(IntegrityError::OrderMismatch { index, expected, actual }) => {
            assert_eq!(index, 3);
            assert_eq!(expected.as_deref(), Some("fabric_manager"));
            assert_eq!(actual.as_deref(), Some("abyss_registry"));
        }
        other => panic!("expected OrderMismatch, got {other:?}"),
    }
}

#[test]
fn reseal_cycle() {
    let repo = FixtureRepo::canonical();
    let config = repo.config();

    let first = run_update_seal(&config).unwrap();
    assert_eq!(run_enforce(&config).unwrap().seal, SealComparison::Matched);

    repo.mutate_module("nft_dgen");
    match run_enforce(&config).unwrap_err() {
        SealError::Integrity(IntegrityError::TamperDetected { sealed, current }) => {
            assert_eq!(Some(sealed), first.runtime.registry_hash);
            assert_ne!(current, first.runtime.registry_hash.clone().unwrap());
        }
        other => panic!("expected TamperDetected, got {other:?}"),
    }
    // check-registry never consults the seal
    assert!(run_check_registry(&config).is_ok());

    let second = run_update_seal(&config).unwrap();
    assert_ne!(first.master_hash, second.master_hash);
    assert_eq!(run_enforce(&config).unwrap().seal, SealComparison::Matched);
}

#[test]
fn count_mismatch_precedes_hashing_checks() {
    let repo = FixtureRepo::canonical();
    repo.write_source(CANONICAL_MODULE_ORDER, 1, Some(10));
    repo.remove_module("bank_cgt");

    match run_check_registry(&repo.config()).unwrap_err() {
        SealError::Integrity(IntegrityError::CountMismatch { declared, actual }) => {
            assert_eq!((declared, actual), (10, 9));
        }
        other => panic!("expected CountMismatch, got {other:?}"),
    }
}

#[test]
fn absent_source_is_setup_failure() {
    let repo = FixtureRepo::canonical();
    fs::remove_file(repo.source_path()).unwrap();

    let err = run_enforce(&repo.config()).unwrap_err();
    assert!(matches!(err, SealError::SourceMissing { .. }));
    assert_eq!(err.exit_status(), ExitStatus::Environment);
}

#[test]
fn duplicate_declaration_is_parse_error() {
    let repo = FixtureRepo::canonical();
    let mut order = CANONICAL_MODULE_ORDER.to_vec();
    order.push("bank_cgt");
    repo.write_source(&order, 1, None);

    match run_check_registry(&repo.config()).unwrap_err() {
        SealError::Parse {
            source: ParseError::DuplicateModule { id, .. },
            ..
        } => assert_eq!(id, "bank_cgt"),
        other => panic!("expected DuplicateModule, got {other:?}"),
    }
}

#[test]
fn update_seal_refuses_missing_module() {
    let repo = FixtureRepo::canonical();
    repo.remove_module("dev_capsules");
    let config = repo.config();

    let err = run_update_seal(&config).unwrap_err();
    assert!(matches!(err, SealError::ModuleFileNotFound { ref module, .. } if module == "dev_capsules"));
    assert!(!config.seal_file().exists());
}

#[test]
fn hand_edited_seal_is_rejected() {
    let repo = FixtureRepo::canonical();
    let config = repo.config();
    let mut doc = run_update_seal(&config).unwrap();

    doc.phase = "EDITED".into();
    fs::write(config.seal_file(), render(&doc).unwrap()).unwrap();

    let err = run_enforce(&config).unwrap_err();
    assert!(matches!(
        err,
        SealError::Integrity(IntegrityError::SealDigestMismatch { .. })
    ));
}

#[test]
fn legacy_seal_field_is_setup_failure() {
    let repo = FixtureRepo::canonical();
    let config = repo.config();
    let mut doc = run_update_seal(&config).unwrap();

    doc.runtime.legacy_master_hash = doc.runtime.registry_hash.take();
    doc.master_hash = doc.compute_master_hash().unwrap();
    fs::write(config.seal_file(), render(&doc).unwrap()).unwrap();

    let err = run_enforce(&config).unwrap_err();
    assert!(matches!(err, SealError::LegacySealField { .. }));
    assert_eq!(err.exit_status(), ExitStatus::Environment);
}

#[test]
fn script_era_seal_is_setup_failure() {
    let repo = FixtureRepo::canonical();
    let config = repo.config();
    let registry_hash = run_show_registry(&config).unwrap().registry_hash;
    let seal = serde_json::json!({
        "timestamp": "2025-11-02T10:00:00.000Z",
        "version": "2.0.0",
        "repo": "DEMIURGE",
        "phase": "OMEGA_PART_II",
        "directories": { "chain": "computed" },
        "runtime": { "modules": {}, "registryHash": registry_hash, "version": 1 },
        "sdk": { "ts": "computed" },
        "guardian": "ACTIVE",
        "seal": "GENERATED",
        "masterHash": "computed"
    });
    fs::write(config.seal_file(), seal.to_string()).unwrap();

    let err = run_enforce(&config).unwrap_err();
    assert!(matches!(err, SealError::LegacySealField { .. }));
    assert_eq!(err.exit_status(), ExitStatus::Environment);

    // resealing migrates it
    run_update_seal(&config).unwrap();
    run_enforce(&config).unwrap();
}

#[test]
fn required_seal_must_exist() {
    let repo = FixtureRepo::canonical();
    let mut config = repo.config();
    config.require_seal = true;

    assert!(matches!(
        run_enforce(&config).unwrap_err(),
        SealError::SealMissing { .. }
    ));

    fs::write(config.seal_file(), "not a seal").unwrap();
    assert!(matches!(
        run_enforce(&config).unwrap_err(),
        SealError::SealMissing { .. }
    ));
}

#[test]
fn show_registry_is_read_only() {
    let repo = FixtureRepo::canonical();
    let config = repo.config();
    let registry = run_show_registry(&config).unwrap();

    assert_eq!(registry.module_order.len(), 9);
    assert!(registry.module_order.iter().all(|id| id != "version"));
    assert!(!config.seal_file().exists());
}
