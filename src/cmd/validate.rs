use crate::validate::{FileType, UploadedFile};
use schemars::JsonSchema;
use serde::Serialize;
use std::path::PathBuf;

use super::glob_util::{expand_file_patterns, MultiFileResult};

/// JSON output for the validate command
#[derive(Serialize, JsonSchema)]
pub(crate) struct ValidateJsonOutput {
    total_files: usize,
    valid: usize,
    invalid: usize,
    files: Vec<FileValidation>,
}

#[derive(Serialize, JsonSchema)]
pub(crate) struct FileValidation {
    file: String,
    size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    compression: Option<String>,
    file_type: FileType,
    /// Only a sample was checked
    sampled: bool,
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<&UploadedFile> for FileValidation {
    fn from(file: &UploadedFile) -> Self {
        Self {
            file: file.path.display().to_string(),
            size_bytes: file.size,
            compression: (file.compression != crate::input::Compression::None).then(|| file.compression.to_string()),
            file_type: file.file_type,
            sampled: file.is_large(),
            valid: file.valid,
            error: file.error.clone(),
        }
    }
}

pub fn run(patterns: Vec<PathBuf>, fail_fast: bool, json: bool) -> anyhow::Result<()> {
    let files = expand_file_patterns(&patterns)?;
    let mut result = MultiFileResult::new(files.len());
    let mut reports = Vec::with_capacity(files.len());

    for path in files {
        let report = match UploadedFile::open(&path) {
            Ok(file) => FileValidation::from(&file),
            Err(e) => FileValidation {
                file: path.display().to_string(),
                size_bytes: 0,
                compression: None,
                file_type: FileType::Unknown,
                sampled: false,
                valid: false,
                error: Some(format!("{:#}", e)),
            },
        };

        if report.valid {
            result.record_success();
        } else {
            result.record_failure(path.clone(), report.error.clone().unwrap_or_default());
        }

        if !json {
            let size_mb = report.size_bytes as f64 / (1024.0 * 1024.0);
            let status = if report.valid { "OK" } else { "INVALID" };
            eprintln!(
                "{:<8} {} ({:.2} MB, {}{})",
                status,
                report.file,
                size_mb,
                report.file_type,
                if report.sampled { ", sampled" } else { "" }
            );
            if let Some(error) = &report.error {
                eprintln!("         {}", error);
            }
        }

        let stop = fail_fast && !report.valid;
        reports.push(report);
        if stop {
            break;
        }
    }

    if json {
        let output = ValidateJsonOutput {
            total_files: result.total_files,
            valid: result.succeeded,
            invalid: result.failed,
            files: reports,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        eprintln!();
        eprintln!("{} of {} files valid", result.succeeded, result.total_files);
        if fail_fast && result.succeeded + result.failed < result.total_files {
            eprintln!("Stopped after first failure (--fail-fast)");
        }
        for (path, error) in &result.errors {
            eprintln!("  {}: {}", path.display(), error);
        }
    }

    if result.has_failures() {
        std::process::exit(1);
    }
    Ok(())
}
