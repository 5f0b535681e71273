//! Frozen canonical module order
//!
//! Changing this list is only legitimate together with a `RUNTIME_VERSION`
//! bump in the runtime description source.

use crate::errors::{SealError, SealResult};
use crate::source_parser::is_identifier;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Bundled canonical registration order.
pub const CANONICAL_MODULE_ORDER: &[&str] = &[
    "bank_cgt",
    "urgeid_registry",
    "nft_dgen",
    "fabric_manager",
    "abyss_registry",
    "developer_registry",
    "dev_capsules",
    "recursion_registry",
    "work_claim",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedRegistrySchema {
    pub canonical_order: Vec<String>,
}

impl Default for ExpectedRegistrySchema {
    fn default() -> Self {
        Self::canonical()
    }
}

impl ExpectedRegistrySchema {
    /// The bundled contract.
    pub fn canonical() -> Self {
        Self {
            canonical_order: CANONICAL_MODULE_ORDER.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn new<I, S>(order: I) -> SealResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let schema = Self {
            canonical_order: order.into_iter().map(Into::into).collect(),
        };
        schema.validate()?;
        Ok(schema)
    }

    /// Load a replacement contract from a TOML file with a single
    /// `canonical_order = [...]` array.
    pub fn from_toml_file(path: &Path) -> SealResult<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| SealError::io("reading expected schema", path, e))?;
        Self::from_toml_str(&text)
            .map_err(|e| SealError::config(format!("{}: {e}", path.display())))
    }

    pub fn from_toml_str(text: &str) -> SealResult<Self> {
        let schema: Self = toml::from_str(text)
            .map_err(|e| SealError::config(format!("invalid expected schema: {e}")))?;
        schema.validate()?;
        Ok(schema)
    }

    pub fn len(&self) -> usize {
        self.canonical_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.canonical_order.is_empty()
    }

    fn validate(&self) -> SealResult<()> {
        if self.canonical_order.is_empty() {
            return Err(SealError::config("expected schema lists no modules"));
        }
        let mut seen = HashSet::new();
        for id in &self.canonical_order {
            if !is_identifier(id) {
                return Err(SealError::config(format!(
                    "expected schema entry '{id}' is not a module identifier"
                )));
            }
            if !seen.insert(id.as_str()) {
                return Err(SealError::config(format!(
                    "expected schema lists '{id}' more than once"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_order() {
        let schema = ExpectedRegistrySchema::canonical();
        assert_eq!(schema.len(), 9);
        assert_eq!(schema.canonical_order[0], "bank_cgt");
        assert_eq!(schema.canonical_order[8], "work_claim");
    }

    #[test]
    fn test_toml_override() {
        let schema =
            ExpectedRegistrySchema::from_toml_str("canonical_order = [\"a\", \"b\", \"c\"]\n")
                .unwrap();
        assert_eq!(schema.canonical_order, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_invalid_contracts_rejected() {
        assert!(ExpectedRegistrySchema::from_toml_str("canonical_order = []").is_err());
        assert!(ExpectedRegistrySchema::from_toml_str("canonical_order = [\"a\", \"a\"]").is_err());
        assert!(ExpectedRegistrySchema::new(["bank-cgt"]).is_err());
        assert!(ExpectedRegistrySchema::from_toml_str("order = [\"a\"]").is_err());
    }
}
