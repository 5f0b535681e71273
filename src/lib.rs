//! Library root for the `runtime_seal` crate
//! Tamper evidence for a modular runtime's composition

// Core error handling
pub mod errors;

// Hashing & canonical serialization
pub mod canonicalize;
pub mod content_hasher;

// Registry extraction & enforcement
pub mod enforcer;
pub mod expected_schema;
pub mod registry;
pub mod source_parser;

// Seal
pub mod manifest;
pub mod seal;
pub mod seal_store;

// Audit trail
pub mod audit;

// Configuration & CLI
pub mod cli;
pub mod commands;
pub mod config;


pub use content_hasher::{ContentHasher, DirectoryHashMode, HashValue};
pub use enforcer::{EnforcementReport, IntegrityEnforcer, SealComparison};
pub use errors::{ExitStatus, IntegrityError, ParseError, SealError, SealResult};
pub use expected_schema::ExpectedRegistrySchema;
pub use registry::{RegistryComposer, RuntimeRegistry};
pub use seal::{SealAggregator, SealDocument};
pub use seal_store::{SealState, SealStore};
pub use source_parser::{ParsedSource, SourceParser};
