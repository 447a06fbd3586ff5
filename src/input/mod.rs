//! Reading dump files from disk, optionally compressed.

use crate::progress::ProgressReader;
use anyhow::Context;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Compression format detected from file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    Bzip2,
    Xz,
    Zstd,
}

impl Compression {
    /// Detect compression format from file extension
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match ext.as_deref() {
            Some("gz" | "gzip") => Compression::Gzip,
            Some("bz2" | "bzip2") => Compression::Bzip2,
            Some("xz" | "lzma") => Compression::Xz,
            Some("zst" | "zstd") => Compression::Zstd,
            _ => Compression::None,
        }
    }

    /// Wrap a reader with the appropriate decompressor
    pub fn wrap_reader<'a>(&self, reader: Box<dyn Read + 'a>) -> std::io::Result<Box<dyn Read + 'a>> {
        Ok(match self {
            Compression::None => reader,
            Compression::Gzip => Box::new(flate2::read::GzDecoder::new(reader)),
            Compression::Bzip2 => Box::new(bzip2::read::BzDecoder::new(reader)),
            Compression::Xz => Box::new(xz2::read::XzDecoder::new(reader)),
            Compression::Zstd => Box::new(zstd::stream::read::Decoder::new(reader)?),
        })
    }
}

impl std::fmt::Display for Compression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Compression::None => write!(f, "none"),
            Compression::Gzip => write!(f, "gzip"),
            Compression::Bzip2 => write!(f, "bzip2"),
            Compression::Xz => write!(f, "xz"),
            Compression::Zstd => write!(f, "zstd"),
        }
    }
}

/// File name with any compression extension removed (`dump.sql.gz` -> `dump.sql`).
pub fn logical_name(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if Compression::from_path(path) == Compression::None {
        return name;
    }
    match name.rfind('.') {
        Some(p) => name[..p].to_string(),
        None => name,
    }
}

fn open<'a>(path: &Path, progress: Option<Box<dyn FnMut(u64) + 'a>>) -> anyhow::Result<Box<dyn Read + 'a>> {
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    let compression = Compression::from_path(path);

    // Progress counts compressed bytes so it lines up with the file size
    let raw: Box<dyn Read + 'a> = match progress {
        Some(cb) => Box::new(ProgressReader::new(file, cb)),
        None => Box::new(file),
    };
    Ok(compression.wrap_reader(raw)?)
}

/// Read a whole dump into memory. Invalid UTF-8 is replaced, not rejected.
pub fn read_sql_file<'a>(path: &Path, progress: Option<Box<dyn FnMut(u64) + 'a>>) -> anyhow::Result<String> {
    let mut reader = open(path, progress)?;
    let mut buf = Vec::new();
    reader
        .read_to_end(&mut buf)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(String::from_utf8(buf).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned()))
}

/// Read at most `limit` decompressed bytes from the start of a dump.
pub fn read_sample(path: &Path, limit: usize) -> anyhow::Result<String> {
    let reader = open(path, None)?;
    let mut buf = Vec::with_capacity(limit);
    reader
        .take(limit as u64)
        .read_to_end(&mut buf)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
