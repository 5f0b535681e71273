//! Persistence of the seal document
//!
//! Reads are tolerant: an absent or unreadable seal is the bootstrap case and
//! yields `None`. A file that is JSON with a `runtime` hash but not in the
//! current layout is a seal from an older writer and is reported as
//! [`SealState::Legacy`] so the gate can refuse it instead of bootstrapping.
//! Writes are atomic: the document goes to a temporary file in
//! the destination directory and is renamed over the old seal, so a crash
//! never leaves a half-written baseline behind.

use crate::errors::{SealError, SealResult};
use crate::seal::SealDocument;
use serde_json::Value;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{info, warn};

pub const DEFAULT_SEAL_FILE: &str = "REPO_STATE_SEAL.json";

/// What the seal path holds.
#[derive(Debug, Clone, PartialEq)]
pub enum SealState {
    Absent,
    /// Unreadable, or not a seal of any known layout.
    Corrupt,
    /// An older layout whose runtime hash cannot serve as a baseline.
    Legacy,
    Current(SealDocument),
}

#[derive(Debug, Clone)]
pub struct SealStore {
    path: PathBuf,
}

impl SealStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Load the persisted seal. `None` unless the file parses as a seal
    /// document in the current layout.
    pub fn load(&self) -> Option<SealDocument> {
        match self.inspect() {
            SealState::Current(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn inspect(&self) -> SealState {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %self.path.display(), "no seal on disk");
                return SealState::Absent;
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "seal unreadable, treating as absent");
                return SealState::Corrupt;
            }
        };
        let err = match serde_json::from_str::<SealDocument>(&text) {
            Ok(doc) => return SealState::Current(doc),
            Err(e) => e,
        };
        match serde_json::from_str::<Value>(&text) {
            Ok(value) if has_runtime_hash(&value) => {
                warn!(path = %self.path.display(), error = %err, "seal uses an older layout");
                SealState::Legacy
            }
            _ => {
                warn!(path = %self.path.display(), error = %err, "seal corrupt, treating as absent");
                SealState::Corrupt
            }
        }
    }

    /// Atomically replace the seal with `doc`.
    pub fn save(&self, doc: &SealDocument) -> SealResult<()> {
        let text = render(doc)?;
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|e| SealError::io("creating seal directory", &dir, e))?;

        let mut tmp = NamedTempFile::new_in(&dir)
            .map_err(|e| SealError::io("creating temporary seal file", &dir, e))?;
        tmp.write_all(text.as_bytes())
            .map_err(|e| SealError::io("writing temporary seal file", tmp.path(), e))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| SealError::io("syncing temporary seal file", &self.path, e))?;
        tmp.persist(&self.path)
            .map_err(|e| SealError::io("replacing seal file", &self.path, e.error))?;

        info!(path = %self.path.display(), master_hash = %doc.master_hash, "seal written");
        Ok(())
    }
}

fn has_runtime_hash(value: &Value) -> bool {
    let Some(runtime) = value.get("runtime").and_then(Value::as_object) else {
        return false;
    };
    ["registryHash", "masterHash"]
        .iter()
        .any(|key| runtime.get(*key).is_some_and(Value::is_string))
}

/// Pretty JSON with lexicographically sorted keys and a trailing newline.
pub fn render(doc: &SealDocument) -> SealResult<String> {
    // Value's object map is ordered, which sorts the flattened categories
    // in among the fixed fields.
    let value = serde_json::to_value(doc)
        .map_err(|e| SealError::serialization("converting seal document", e))?;
    let mut text = serde_json::to_string_pretty(&value)
        .map_err(|e| SealError::serialization("rendering seal document", e))?;
    text.push('\n');
    Ok(text)
}
