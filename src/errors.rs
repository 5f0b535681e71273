//! Error taxonomy for the runtime seal gate
//!
//! Three families live here. `ParseError` covers the runtime description
//! source, `IntegrityError` covers every composition check, and `SealError`
//! wraps both together with the environment/setup failures that keep the
//! gate from running at all. Each family maps onto one exit-status group so
//! CI can tell "tool misconfigured" from "integrity violated".

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Process exit status groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Pass,
    IntegrityViolation,
    Environment,
}

impl ExitStatus {
    pub fn code(self) -> u8 {
        match self {
            ExitStatus::Pass => 0,
            ExitStatus::IntegrityViolation => 1,
            ExitStatus::Environment => 2,
        }
    }
}

/// Malformed or ambiguous runtime description source.
///
/// Line numbers are 1-based and refer to the source text as read from disk.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("duplicate module declaration '{id}' at line {line} (first declared at line {first_line})")]
    DuplicateModule {
        id: String,
        line: usize,
        first_line: usize,
    },

    #[error("malformed module declaration at line {line}: `{text}`")]
    MalformedDeclaration { line: usize, text: String },

    #[error("malformed {name} declaration at line {line}: `{text}`")]
    MalformedConstant {
        name: &'static str,
        line: usize,
        text: String,
    },

    #[error("duplicate {name} declaration at line {line} (first declared at line {first_line})")]
    DuplicateConstant {
        name: &'static str,
        line: usize,
        first_line: usize,
    },

    #[error("RUNTIME_VERSION constant not found")]
    MissingVersion,
}

/// A composition check that failed. All variants are fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntegrityError {
    #[error("module count mismatch: declared {declared}, parsed {actual}")]
    CountMismatch { declared: usize, actual: usize },

    #[error(
        "module order mismatch at index {index}: expected {}, got {}",
        display_slot(.expected),
        display_slot(.actual)
    )]
    OrderMismatch {
        index: usize,
        expected: Option<String>,
        actual: Option<String>,
    },

    #[error("missing module hash for '{module}': module file not found at {}", .path.display())]
    MissingModuleHash { module: String, path: PathBuf },

    #[error("runtime registry hash differs from sealed baseline")]
    TamperDetected { sealed: String, current: String },

    #[error("seal document master hash does not match its contents")]
    SealDigestMismatch { recorded: String, computed: String },
}

fn display_slot(slot: &Option<String>) -> String {
    match slot {
        Some(id) => format!("'{id}'"),
        None => "<no module>".to_string(),
    }
}

impl IntegrityError {
    /// Stable category name printed in diagnostics.
    pub fn category(&self) -> &'static str {
        match self {
            IntegrityError::CountMismatch { .. } => "CountMismatch",
            IntegrityError::OrderMismatch { .. } => "OrderMismatch",
            IntegrityError::MissingModuleHash { .. } => "MissingModuleHash",
            IntegrityError::TamperDetected { .. } => "TamperDetected",
            IntegrityError::SealDigestMismatch { .. } => "SealDigestMismatch",
        }
    }

    /// Expected-vs-actual detail lines for the multi-line diagnostic.
    pub fn detail_lines(&self) -> Vec<String> {
        match self {
            IntegrityError::CountMismatch { declared, actual } => vec![
                format!("Declared (EXPECTED_MODULE_COUNT): {declared}"),
                format!("Parsed module declarations: {actual}"),
            ],
            IntegrityError::OrderMismatch {
                index,
                expected,
                actual,
            } => vec![
                format!("Index: {index}"),
                format!("Expected: {}", display_slot(expected)),
                format!("Actual: {}", display_slot(actual)),
            ],
            IntegrityError::MissingModuleHash { module, path } => vec![
                format!("Module: {module}"),
                format!("Path: {}", path.display()),
            ],
            IntegrityError::TamperDetected { sealed, current } => vec![
                format!("Seal Hash: {sealed}"),
                format!("Current Hash: {current}"),
                "Runtime mutation detected without an authorized re-seal".to_string(),
            ],
            IntegrityError::SealDigestMismatch { recorded, computed } => vec![
                format!("Recorded masterHash: {recorded}"),
                format!("Computed masterHash: {computed}"),
                "The seal document was modified outside update-seal".to_string(),
            ],
        }
    }
}

/// Main error type for the seal tooling
#[derive(Error, Debug)]
pub enum SealError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("I/O operation failed: {operation} ({})", .path.display())]
    Io {
        operation: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization failed: {context}")]
    Serialization {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("runtime description source not found: {}", .path.display())]
    SourceMissing { path: PathBuf },

    #[error("parse error in {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    #[error("module file not found for '{module}': {}", .path.display())]
    ModuleFileNotFound { module: String, path: PathBuf },

    #[error("manifest error: {message}")]
    Manifest { message: String },

    #[error("seal document required but not available at {}", .path.display())]
    SealMissing { path: PathBuf },

    #[error("seal at {} predates the current seal layout (no usable runtime.registryHash); run update-seal to migrate", .path.display())]
    LegacySealField { path: PathBuf },

    #[error("integrity violation: {0}")]
    Integrity(#[from] IntegrityError),
}

/// Type alias for Result with SealError
pub type SealResult<T> = Result<T, SealError>;

impl SealError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an I/O error bound to the path it concerns
    pub fn io(operation: impl Into<String>, path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            path: path.to_path_buf(),
            source,
        }
    }

    /// Create a serialization error
    pub fn serialization(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Serialization {
            context: context.into(),
            source,
        }
    }

    /// Create a manifest error
    pub fn manifest(message: impl Into<String>) -> Self {
        Self::Manifest {
            message: message.into(),
        }
    }

    /// Exit-status group this error belongs to.
    pub fn exit_status(&self) -> ExitStatus {
        match self {
            SealError::Parse { .. }
            | SealError::ModuleFileNotFound { .. }
            | SealError::Integrity(_) => ExitStatus::IntegrityViolation,
            SealError::Config { .. }
            | SealError::Io { .. }
            | SealError::Serialization { .. }
            | SealError::SourceMissing { .. }
            | SealError::Manifest { .. }
            | SealError::SealMissing { .. }
            | SealError::LegacySealField { .. } => ExitStatus::Environment,
        }
    }

    /// Category name printed in diagnostics.
    pub fn category(&self) -> &'static str {
        match self {
            SealError::Integrity(err) => err.category(),
            SealError::Parse { .. } => "ParseError",
            SealError::Config { .. } => "ConfigError",
            SealError::Io { .. } => "IoError",
            SealError::Serialization { .. } => "SerializationError",
            SealError::SourceMissing { .. } => "SourceMissing",
            SealError::ModuleFileNotFound { .. } => "ModuleFileNotFound",
            SealError::Manifest { .. } => "ManifestError",
            SealError::SealMissing { .. } => "SealMissing",
            SealError::LegacySealField { .. } => "LegacySealField",
        }
    }
}
