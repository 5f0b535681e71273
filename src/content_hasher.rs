//! Content-addressable hashing of files and directories
//!
//! Every digest in the seal is a lowercase hex SHA-256 over raw file bytes.
//! File metadata (mtime, permissions) never contributes. An absent file is
//! not an error at this layer: it becomes [`HashValue::Missing`] and the
//! caller decides whether that absence is fatal.

use crate::errors::{SealError, SealResult};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::thread;
use tracing::debug;
use walkdir::WalkDir;

/// Sentinel recorded for a path that does not exist.
pub const MISSING: &str = "missing";

/// Value recorded for an existing directory under [`DirectoryHashMode::Placeholder`].
/// Deliberately not digest-shaped so it can never be mistaken for a real hash.
pub const DIRECTORY_PLACEHOLDER: &str = "placeholder:not-hashed";

/// Length of a hex SHA-256 digest.
pub const DIGEST_HEX_LEN: usize = 64;

/// Outcome of hashing one path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HashValue {
    Digest(String),
    Missing,
    Placeholder,
}

impl HashValue {
    pub fn as_str(&self) -> &str {
        match self {
            HashValue::Digest(hex) => hex,
            HashValue::Missing => MISSING,
            HashValue::Placeholder => DIRECTORY_PLACEHOLDER,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, HashValue::Missing)
    }

    pub fn digest(&self) -> Option<&str> {
        match self {
            HashValue::Digest(hex) => Some(hex),
            _ => None,
        }
    }

    /// Parse a recorded value, rejecting anything that is neither a sentinel
    /// nor a well-formed lowercase hex digest.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            MISSING => Some(HashValue::Missing),
            DIRECTORY_PLACEHOLDER => Some(HashValue::Placeholder),
            hex if is_digest_hex(hex) => Some(HashValue::Digest(hex.to_string())),
            _ => None,
        }
    }
}

impl fmt::Display for HashValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for HashValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for HashValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        HashValue::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid hash value: {raw}")))
    }
}

pub fn is_digest_hex(s: &str) -> bool {
    s.len() == DIGEST_HEX_LEN && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// SHA-256 of a byte slice, lowercase hex.
pub fn digest_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Hash the exact bytes of `path`. A missing file yields [`HashValue::Missing`];
/// any other read failure is an I/O error.
pub fn hash_file(path: &Path) -> SealResult<HashValue> {
    match fs::read(path) {
        Ok(bytes) => {
            let hex = digest_bytes(&bytes);
            debug!(path = %path.display(), digest = %hex, "hashed file");
            Ok(HashValue::Digest(hex))
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "file missing");
            Ok(HashValue::Missing)
        }
        Err(e) => Err(SealError::io("reading file for hashing", path, e)),
    }
}

/// Hash the concatenation of several files' raw contents joined by
/// `separator`. Absent files contribute an empty segment.
pub fn hash_concatenated(paths: &[PathBuf], separator: &[u8]) -> SealResult<String> {
    let mut hasher = Sha256::new();
    for (i, path) in paths.iter().enumerate() {
        if i > 0 {
            hasher.update(separator);
        }
        match fs::read(path) {
            Ok(bytes) => hasher.update(&bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "absent from concatenation");
            }
            Err(e) => return Err(SealError::io("reading file for concatenation", path, e)),
        }
    }
    Ok(hex::encode(hasher.finalize()))
}

/// How directory-level seal entries are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DirectoryHashMode {
    /// Record [`DIRECTORY_PLACEHOLDER`] for any existing directory.
    #[default]
    Placeholder,
    /// Walk the tree and hash every regular file and symlink.
    Recursive,
}

/// Hash a directory according to `mode`.
///
/// Recursive mode walks without following symlinks, orders entries by their
/// `/`-separated relative path and digests the lines `<path>\0<digest>\n`.
/// A symlink contributes `<path>\0link:<target>\n` with its target as
/// written, so retargeting a link or swapping a file for one changes the
/// digest. An empty directory hashes to the digest of the empty string.
pub fn hash_directory(path: &Path, mode: DirectoryHashMode) -> SealResult<HashValue> {
    if !path.is_dir() {
        return Ok(HashValue::Missing);
    }
    if mode == DirectoryHashMode::Placeholder {
        return Ok(HashValue::Placeholder);
    }

    let mut entries: Vec<(String, String)> = Vec::new();
    for entry in WalkDir::new(path).follow_links(false) {
        let entry = entry.map_err(|e| {
            let io = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("directory walk failed"));
            SealError::io("walking directory", path, io)
        })?;
        let file_type = entry.file_type();
        if !file_type.is_file() && !file_type.is_symlink() {
            continue;
        }
        let rel = entry.path().strip_prefix(path).unwrap_or(entry.path());
        let rel_posix = rel.to_string_lossy().replace('\\', "/");
        if file_type.is_symlink() {
            let target = fs::read_link(entry.path())
                .map_err(|e| SealError::io("reading symlink", entry.path(), e))?;
            let target = target.to_string_lossy().replace('\\', "/");
            entries.push((rel_posix, format!("link:{target}")));
            continue;
        }
        let bytes =
            fs::read(entry.path()).map_err(|e| SealError::io("reading file", entry.path(), e))?;
        entries.push((rel_posix, digest_bytes(&bytes)));
    }
    entries.sort();

    let mut hasher = Sha256::new();
    for (rel, digest) in &entries {
        hasher.update(rel.as_bytes());
        hasher.update([0u8]);
        hasher.update(digest.as_bytes());
        hasher.update(b"\n");
    }
    let hex = hex::encode(hasher.finalize());
    debug!(path = %path.display(), entries = entries.len(), digest = %hex, "hashed directory");
    Ok(HashValue::Digest(hex))
}

/// Batch file hasher with a bounded worker count.
///
/// Results always come back in input order, so callers reduce them
/// deterministically no matter how the work was split.
#[derive(Debug, Clone)]
pub struct ContentHasher {
    workers: usize,
}

impl ContentHasher {
    /// `workers == 0` means one worker per available core.
    pub fn new(workers: usize) -> Self {
        let workers = if workers == 0 {
            thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        } else {
            workers
        };
        Self { workers }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn hash(&self, path: &Path) -> SealResult<HashValue> {
        hash_file(path)
    }

    /// Hash many files, preserving input order in the output.
    pub fn hash_all(&self, paths: &[PathBuf]) -> SealResult<Vec<HashValue>> {
        if self.workers <= 1 || paths.len() <= 1 {
            return paths.iter().map(|p| hash_file(p)).collect();
        }

        let chunk_size = paths.len().div_ceil(self.workers);
        let chunk_results: Vec<SealResult<Vec<HashValue>>> = thread::scope(|scope| {
            let handles: Vec<_> = paths
                .chunks(chunk_size)
                .map(|chunk| {
                    scope.spawn(move || -> SealResult<Vec<HashValue>> {
                        chunk.iter().map(|p| hash_file(p)).collect()
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| {
                    h.join().unwrap_or_else(|_| {
                        Err(SealError::config("hashing worker thread panicked"))
                    })
                })
                .collect()
        });

        let mut out = Vec::with_capacity(paths.len());
        for chunk in chunk_results {
            out.extend(chunk?);
        }
        Ok(out)
    }
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::new(0)
    }
}
