//! Narrow structural extraction from the runtime description source
//!
//! This is a line-oriented pattern matcher, not a Rust parser. It recognizes
//! exactly three shapes:
//!
//! ```text
//! pub mod <ident>;
//! pub const RUNTIME_VERSION: u32 = <digits>;
//! pub const EXPECTED_MODULE_COUNT: usize = <digits>;
//! ```
//!
//! Comments (`//`, nested `/* */`) and outer attributes (`#[...]`) are
//! removed before matching, so a declaration behind an attribute or an
//! inline comment is still seen. After that, any line that mentions
//! `mod` but is not exactly `pub mod <ident>;` is rejected with the
//! offending line, never skipped.

use crate::errors::{ParseError, SealError, SealResult};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

/// Bookkeeping module declared alongside the runtime modules but not part of
/// the registry.
pub const DEFAULT_RESERVED_MODULE: &str = "version";

const RUNTIME_VERSION: &str = "RUNTIME_VERSION";
const EXPECTED_MODULE_COUNT: &str = "EXPECTED_MODULE_COUNT";

lazy_static! {
    static ref MOD_KEYWORD: Regex = Regex::new(r"\bmod\b").unwrap();
    static ref DECL: Regex = Regex::new(r"^pub\s+mod\s+([A-Za-z_][A-Za-z0-9_]*)\s*;$").unwrap();
    static ref VERSION_START: Regex = Regex::new(r"\bconst\s+RUNTIME_VERSION\b").unwrap();
    static ref VERSION: Regex =
        Regex::new(r"^pub\s+const\s+RUNTIME_VERSION\s*:\s*u32\s*=\s*([0-9]+)\s*;\s*(?://.*)?$")
            .unwrap();
    static ref COUNT_START: Regex = Regex::new(r"\bconst\s+EXPECTED_MODULE_COUNT\b").unwrap();
    static ref COUNT: Regex = Regex::new(
        r"^pub\s+const\s+EXPECTED_MODULE_COUNT\s*:\s*usize\s*=\s*([0-9]+)\s*;\s*(?://.*)?$"
    )
    .unwrap();
    static ref IDENT: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
}

/// What the parser extracted from one runtime description source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedSource {
    pub version: u32,
    pub declared_module_count: usize,
    pub module_order: Vec<String>,
    /// Whether `EXPECTED_MODULE_COUNT` was present in the source.
    pub count_declared: bool,
}

pub fn is_identifier(s: &str) -> bool {
    IDENT.is_match(s)
}

#[derive(Debug, Clone)]
pub struct SourceParser {
    reserved_module: String,
}

impl Default for SourceParser {
    fn default() -> Self {
        Self::new(DEFAULT_RESERVED_MODULE)
    }
}

impl SourceParser {
    pub fn new(reserved_module: impl Into<String>) -> Self {
        Self {
            reserved_module: reserved_module.into(),
        }
    }

    pub fn reserved_module(&self) -> &str {
        &self.reserved_module
    }

    /// Read and parse the source at `path`. An absent file is a setup failure.
    pub fn parse_file(&self, path: &Path) -> SealResult<ParsedSource> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(SealError::SourceMissing {
                    path: path.to_path_buf(),
                })
            }
            Err(e) => return Err(SealError::io("reading runtime description", path, e)),
        };
        self.parse(&text).map_err(|source| SealError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(&self, source: &str) -> Result<ParsedSource, ParseError> {
        let mut module_order: Vec<String> = Vec::new();
        let mut first_seen: HashMap<String, usize> = HashMap::new();
        let mut version: Option<(u32, usize)> = None;
        let mut count: Option<(usize, usize)> = None;
        let mut comment_depth = 0usize;

        for (idx, raw_line) in source.lines().enumerate() {
            let line_no = idx + 1;
            let code = strip_comments(raw_line, &mut comment_depth);
            let line = strip_attributes(code.trim());
            if line.is_empty() {
                continue;
            }

            if MOD_KEYWORD.is_match(line) {
                let caps = DECL
                    .captures(line)
                    .ok_or_else(|| ParseError::MalformedDeclaration {
                        line: line_no,
                        text: raw_line.trim().to_string(),
                    })?;
                let id = caps[1].to_string();
                if let Some(&first_line) = first_seen.get(&id) {
                    return Err(ParseError::DuplicateModule {
                        id,
                        line: line_no,
                        first_line,
                    });
                }
                first_seen.insert(id.clone(), line_no);
                if id == self.reserved_module {
                    debug!(line = line_no, id = %id, "skipping reserved module");
                    continue;
                }
                module_order.push(id);
                continue;
            }

            if VERSION_START.is_match(line) {
                let value = parse_constant::<u32>(&VERSION, RUNTIME_VERSION, line, line_no)?;
                if let Some((_, first_line)) = version {
                    return Err(ParseError::DuplicateConstant {
                        name: RUNTIME_VERSION,
                        line: line_no,
                        first_line,
                    });
                }
                version = Some((value, line_no));
                continue;
            }

            if COUNT_START.is_match(line) {
                let value =
                    parse_constant::<usize>(&COUNT, EXPECTED_MODULE_COUNT, line, line_no)?;
                if let Some((_, first_line)) = count {
                    return Err(ParseError::DuplicateConstant {
                        name: EXPECTED_MODULE_COUNT,
                        line: line_no,
                        first_line,
                    });
                }
                count = Some((value, line_no));
            }
        }

        let (version, _) = version.ok_or(ParseError::MissingVersion)?;
        let declared_module_count = count.map(|(n, _)| n).unwrap_or(module_order.len());

        Ok(ParsedSource {
            version,
            declared_module_count,
            count_declared: count.is_some(),
            module_order,
        })
    }
}

/// Remove `//` and (possibly nested, possibly multi-line) `/* */` comments
/// from one line. `depth` carries the block-comment nesting across lines.
fn strip_comments(line: &str, depth: &mut usize) -> String {
    let mut out = String::with_capacity(line.len());
    let mut rest = line;
    loop {
        let open = rest.find("/*");
        if *depth > 0 {
            let close = rest.find("*/");
            match (open, close) {
                (Some(o), Some(c)) if o < c => {
                    *depth += 1;
                    rest = &rest[o + 2..];
                }
                (_, Some(c)) => {
                    *depth -= 1;
                    rest = &rest[c + 2..];
                    if *depth == 0 {
                        out.push(' ');
                    }
                }
                (_, None) => return out,
            }
            continue;
        }
        match (open, rest.find("//")) {
            (Some(o), Some(l)) if l < o => {
                out.push_str(&rest[..l]);
                return out;
            }
            (Some(o), _) => {
                out.push_str(&rest[..o]);
                *depth = 1;
                rest = &rest[o + 2..];
            }
            (None, Some(l)) => {
                out.push_str(&rest[..l]);
                return out;
            }
            (None, None) => {
                out.push_str(rest);
                return out;
            }
        }
    }
}

/// Drop leading `#[...]` / `#![...]` attributes. An attribute left open at the
/// end of the line consumes the rest of it.
fn strip_attributes(mut line: &str) -> &str {
    loop {
        let body = match line.strip_prefix("#!").or_else(|| line.strip_prefix('#')) {
            Some(body) if body.trim_start().starts_with('[') => body.trim_start(),
            _ => return line,
        };
        let mut depth = 0usize;
        let mut end = None;
        for (i, c) in body.char_indices() {
            match c {
                '[' => depth += 1,
                ']' => {
                    depth -= 1;
                    if depth == 0 {
                        end = Some(i);
                        break;
                    }
                }
                _ => {}
            }
        }
        match end {
            Some(i) => line = body[i + 1..].trim_start(),
            None => return "",
        }
    }
}

fn parse_constant<T: std::str::FromStr>(
    pattern: &Regex,
    name: &'static str,
    line: &str,
    line_no: usize,
) -> Result<T, ParseError> {
    let malformed = || ParseError::MalformedConstant {
        name,
        line: line_no,
        text: line.to_string(),
    };
    let caps = pattern.captures(line).ok_or_else(malformed)?;
    caps[1].parse::<T>().map_err(|_| malformed())
}
