//! Upload-time checks for SQL dump files.
//!
//! Gives quick feedback before a full read or import is attempted:
//! - file type detection (schema vs data)
//! - empty / comment-only content
//! - presence of at least one recognizable SQL keyword
//!
//! Files above [`LARGE_FILE_THRESHOLD`] are only sampled; their content is
//! read in full later, at import time.

use crate::cleaner::clean_dump;
use crate::input::{self, Compression};
use once_cell::sync::Lazy;
use regex::Regex;
use schemars::JsonSchema;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Files larger than this are validated from a sample only.
pub const LARGE_FILE_THRESHOLD: u64 = 10 * 1024 * 1024;

/// Sample size used for large files.
pub const SAMPLE_SIZE: usize = 10 * 1024;

static SQL_KEYWORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:CREATE|INSERT|UPDATE|DELETE|SELECT|ALTER|DROP)\b").unwrap());

static CREATE_TABLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bCREATE\s+TABLE\b").unwrap());

static INSERT_INTO_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bINSERT\s+INTO\b").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Schema,
    Data,
    Unknown,
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileType::Schema => write!(f, "schema"),
            FileType::Data => write!(f, "data"),
            FileType::Unknown => write!(f, "unknown"),
        }
    }
}

/// Outcome of [`validate_sql_content`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct ContentValidation {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ContentValidation {
    fn ok() -> Self {
        Self {
            valid: true,
            error: None,
        }
    }

    fn invalid(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(error.into()),
        }
    }
}

/// Clean the content and check that something executable is left.
pub fn validate_sql_content(content: &str) -> ContentValidation {
    let cleaned = clean_dump(content);

    if cleaned.trim().is_empty() {
        return ContentValidation::invalid("File is empty or contains only comments and metadata");
    }

    if !SQL_KEYWORD_RE.is_match(&cleaned) {
        return ContentValidation::invalid(
            "No SQL statements found (expected CREATE, INSERT, UPDATE, DELETE, SELECT, ALTER or DROP)",
        );
    }

    ContentValidation::ok()
}

/// Infer the file type from its name first, then from its content.
pub fn detect_file_type(file_name: &str, content: &str) -> FileType {
    let name = file_name.to_lowercase();
    if name.contains("schema") {
        return FileType::Schema;
    }
    if name.contains("data") {
        return FileType::Data;
    }
    if CREATE_TABLE_RE.is_match(content) {
        FileType::Schema
    } else if INSERT_INTO_RE.is_match(content) {
        FileType::Data
    } else {
        FileType::Unknown
    }
}

/// A dump file selected for import.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
    pub compression: Compression,
    pub file_type: FileType,
    pub valid: bool,
    pub error: Option<String>,
    /// `None` for large files, which are read on demand.
    pub content: Option<String>,
}

impl UploadedFile {
    /// Inspect a file on disk. IO failures are errors; content problems are
    /// recorded in `valid`/`error`.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let size = std::fs::metadata(path)?.len();
        let compression = Compression::from_path(path);
        let name = input::logical_name(path);

        let mut file = Self {
            path: path.to_path_buf(),
            name: name.clone(),
            size,
            compression,
            file_type: FileType::Unknown,
            valid: false,
            error: None,
            content: None,
        };

        if !name.to_lowercase().ends_with(".sql") {
            file.error = Some(format!("{} is not a .sql file", name));
            return Ok(file);
        }

        let large = file.is_large();
        let text = if large {
            input::read_sample(path, SAMPLE_SIZE)?
        } else {
            input::read_sql_file(path, None)?
        };

        file.file_type = detect_file_type(&name, &text);
        let check = validate_sql_content(&text);
        file.valid = check.valid;
        file.error = check.error;
        debug!(file = %name, size, large, valid = file.valid, file_type = %file.file_type, "inspected file");

        if !large {
            file.content = Some(text);
        }
        Ok(file)
    }

    pub fn is_large(&self) -> bool {
        self.size > LARGE_FILE_THRESHOLD
    }

    /// Full content, reading from disk if it was not kept in memory.
    pub fn read_content<'a>(&self, progress: Option<Box<dyn FnMut(u64) + 'a>>) -> anyhow::Result<String> {
        match &self.content {
            Some(content) => Ok(content.clone()),
            None => input::read_sql_file(&self.path, progress),
        }
    }
}
