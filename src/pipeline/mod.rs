//! End-to-end import: read, validate, clean, split, transform, execute.
//!
//! Progress bands of the overall 0-100 scale:
//! - reading files: 0-10
//! - validating and parsing: 10-35
//! - schema import: 40-65
//! - data import: 70-95

pub mod status;

use crate::cleaner::clean_dump;
use crate::executor::{remote_error_matches, truncate_chars, Executor, ImportResult, SqlEndpoint, DEFAULT_TOLERATED_ERRORS};
use crate::config::ImportConfig;
use crate::parser::{classify, is_executable, split_statements, split_statements_lenient, SplitError};
use crate::progress::band_percent;
use crate::transform::{IdentifierTransformer, TransformMode, DEFAULT_SUFFIX};
use crate::validate::{validate_sql_content, FileType, UploadedFile};
use ahash::AHashSet;
use anyhow::{anyhow, bail, Context};
use schemars::JsonSchema;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::info;

pub use crate::transform::quote_ident;
pub use status::{ImportStatus, ImportStep, StatusError};

pub const SCHEMA_BAND: (u8, u8) = (40, 65);
pub const DATA_BAND: (u8, u8) = (70, 95);

/// Statements shown in a parse report.
const PREVIEW_STATEMENTS: usize = 5;
const PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub suffix: String,
    pub transform: TransformMode,
    pub batch_size: usize,
    pub delay: Duration,
    pub lenient_quotes: bool,
    /// Import into this schema, tolerating expected errors
    pub isolated_schema: Option<String>,
    pub tolerated_errors: Vec<String>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            suffix: DEFAULT_SUFFIX.to_string(),
            transform: TransformMode::Full,
            batch_size: 1,
            delay: Duration::ZERO,
            lenient_quotes: false,
            isolated_schema: None,
            tolerated_errors: DEFAULT_TOLERATED_ERRORS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl From<&ImportConfig> for PipelineOptions {
    fn from(config: &ImportConfig) -> Self {
        Self {
            suffix: config.suffix.clone(),
            transform: config.transform,
            batch_size: config.batch_size.max(1),
            delay: Duration::from_millis(config.delay_ms),
            lenient_quotes: config.lenient_quotes,
            isolated_schema: config.isolated_schema.clone(),
            tolerated_errors: config.tolerated_errors.clone(),
        }
    }
}

/// Cleaned, split and transformed statements ready for execution.
#[derive(Debug, Clone, Default)]
pub struct PreparedStatements {
    pub statements: Vec<String>,
    pub renamed: Vec<String>,
}

/// Run the dump through cleaner, splitter and transformer.
pub fn prepare_statements(content: &str, options: &PipelineOptions) -> Result<PreparedStatements, SplitError> {
    let cleaned = clean_dump(content);
    let mut raw = if options.lenient_quotes {
        split_statements_lenient(&cleaned)
    } else {
        split_statements(&cleaned)?
    };
    if options.isolated_schema.is_some() {
        raw.retain(|stmt| is_executable(stmt));
    }

    let transformer = IdentifierTransformer::new(options.suffix.clone())
        .with_mode(options.transform)
        .with_target_schema(options.isolated_schema.clone());
    let mut seen = AHashSet::new();
    let mut prepared = PreparedStatements::default();
    for stmt in raw {
        let (rewritten, report) = transformer.transform_with_report(&stmt);
        for name in report.renamed {
            if seen.insert(name.clone()) {
                prepared.renamed.push(name);
            }
        }
        prepared.statements.push(rewritten);
    }
    Ok(prepared)
}

/// Dry-run summary of one file.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct FileParseReport {
    pub file: String,
    pub file_type: FileType,
    pub statements: usize,
    /// Statement count per kind, e.g. `"CREATE TABLE": 12`
    pub kinds: BTreeMap<String, usize>,
    pub renamed: Vec<String>,
    pub preview: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ImportOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<ImportResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ImportResult>,
    pub status: ImportStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Part {
    Schema,
    Data,
}

impl Part {
    fn label(&self) -> &'static str {
        match self {
            Part::Schema => "schema",
            Part::Data => "data",
        }
    }

    fn step(&self) -> ImportStep {
        match self {
            Part::Schema => ImportStep::ImportingSchema,
            Part::Data => ImportStep::ImportingData,
        }
    }

    fn band(&self) -> (u8, u8) {
        match self {
            Part::Schema => SCHEMA_BAND,
            Part::Data => DATA_BAND,
        }
    }
}

pub struct ImportPipeline<'a, E: SqlEndpoint> {
    endpoint: E,
    options: PipelineOptions,
    status: ImportStatus,
    on_status: Option<Box<dyn FnMut(&ImportStatus) + 'a>>,
}

impl<'a, E: SqlEndpoint> ImportPipeline<'a, E> {
    pub fn new(endpoint: E, options: PipelineOptions) -> Self {
        Self {
            endpoint,
            options,
            status: ImportStatus::idle(),
            on_status: None,
        }
    }

    /// Called on every status change.
    pub fn with_status_callback<F: FnMut(&ImportStatus) + 'a>(mut self, f: F) -> Self {
        self.on_status = Some(Box::new(f));
        self
    }

    pub fn status(&self) -> &ImportStatus {
        &self.status
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn into_endpoint(self) -> E {
        self.endpoint
    }

    /// Parse and transform files without touching the remote endpoint.
    pub fn test_parsing(&mut self, files: &[&UploadedFile]) -> anyhow::Result<Vec<FileParseReport>> {
        self.reset();
        let contents = self.guarded(|p| p.read_files(files))?;
        self.guarded(|p| p.set(ImportStep::Validating, 10, "Parsing statements"))?;

        let mut reports = Vec::with_capacity(files.len());
        for (i, (file, content)) in files.iter().zip(&contents).enumerate() {
            reports.push(self.parse_report(file, content));
            let pct = band_percent((i + 1) as u64, files.len() as u64, 10, 35);
            self.guarded(|p| p.set(ImportStep::Validating, pct, format!("Parsed {}", file.name)))?;
        }

        let failed = reports.iter().filter(|r| r.error.is_some()).count();
        let message = format!("Parsed {} file(s), {} with errors", reports.len(), failed);
        self.guarded(|p| p.set(ImportStep::Complete, 100, message))?;
        Ok(reports)
    }

    pub fn import_schema(&mut self, schema: &UploadedFile) -> anyhow::Result<ImportOutcome> {
        self.run(&[(Part::Schema, schema)])
    }

    pub fn import_data(&mut self, data: &UploadedFile) -> anyhow::Result<ImportOutcome> {
        self.run(&[(Part::Data, data)])
    }

    /// Schema first, then data; data is skipped if the schema import fails.
    pub fn import_both(&mut self, schema: &UploadedFile, data: &UploadedFile) -> anyhow::Result<ImportOutcome> {
        self.run(&[(Part::Schema, schema), (Part::Data, data)])
    }

    fn run(&mut self, parts: &[(Part, &UploadedFile)]) -> anyhow::Result<ImportOutcome> {
        self.reset();
        let files: Vec<&UploadedFile> = parts.iter().map(|(_, f)| *f).collect();
        self.guarded(|_| files.iter().try_for_each(|f| ensure_valid(f)))?;
        let contents = self.guarded(|p| p.read_files(&files))?;

        self.guarded(|p| p.set(ImportStep::Validating, 10, "Validating SQL content"))?;
        let mut prepared = Vec::with_capacity(parts.len());
        for (i, ((part, file), content)) in parts.iter().zip(&contents).enumerate() {
            let statements = self.guarded(|p| {
                let check = validate_sql_content(content);
                if let Some(error) = check.error {
                    bail!("{}: {}", file.name, error);
                }
                let stmts = prepare_statements(content, &p.options).map_err(|e| anyhow!("{}: {}", file.name, e))?;
                let pct = band_percent((i + 1) as u64, parts.len() as u64, 10, 35);
                p.set(
                    ImportStep::Validating,
                    pct,
                    format!("Parsed {} {} statements", stmts.statements.len(), part.label()),
                )?;
                Ok(stmts.statements)
            })?;
            prepared.push((*part, statements));
        }

        if let Some(schema) = self.options.isolated_schema.clone() {
            self.guarded(|p| p.ensure_schema(&schema))?;
        }

        let mut outcome = ImportOutcome {
            success: false,
            schema: None,
            data: None,
            status: self.status.clone(),
        };

        for (part, statements) in &prepared {
            let (start, _) = part.band();
            let message = format!("Importing {} ({} statements)", part.label(), statements.len());
            self.guarded(|p| p.set(part.step(), start, message))?;

            let result = self.execute(*part, statements);
            let failure = (!result.success).then(|| describe_failure(part.label(), &result));
            match part {
                Part::Schema => outcome.schema = Some(result),
                Part::Data => outcome.data = Some(result),
            }

            if let Some(failure) = failure {
                self.fail(&failure);
                outcome.status = self.status.clone();
                return Ok(outcome);
            }
        }

        self.guarded(|p| p.set(ImportStep::Complete, 100, "Import complete"))?;
        outcome.success = true;
        outcome.status = self.status.clone();
        info!("import complete");
        Ok(outcome)
    }

    fn executor(&self, part: Part) -> Executor {
        let (start, end) = part.band();
        let mut executor = Executor::new()
            .with_batch_size(self.options.batch_size)
            .with_delay(self.options.delay)
            .with_band(start, end);
        if let Some(schema) = &self.options.isolated_schema {
            executor = executor
                .with_tolerated_errors(self.options.tolerated_errors.iter().cloned())
                .with_statement_prefix(format!("SET search_path TO {};", quote_ident(schema)));
        }
        executor
    }

    fn execute(&mut self, part: Part, statements: &[String]) -> ImportResult {
        let executor = self.executor(part);
        let step = part.step();
        let label = part.label();
        let status = &mut self.status;
        let on_status = &mut self.on_status;

        executor.run(&mut self.endpoint, statements, |p| {
            let message = format!("Executing {} statement {}/{}", label, p.executed, p.total);
            if status.advance(step, p.percent, message).is_ok() {
                if let Some(cb) = on_status.as_mut() {
                    cb(status);
                }
            }
        })
    }

    fn ensure_schema(&mut self, schema: &str) -> anyhow::Result<()> {
        let sql = format!("CREATE SCHEMA IF NOT EXISTS {}", quote_ident(schema));
        match self.endpoint.execute(&sql) {
            Ok(()) => Ok(()),
            Err(e) if remote_error_matches(&e, &["already exists"]) => Ok(()),
            Err(e) => Err(anyhow!(e)).with_context(|| format!("cannot create schema {}", schema)),
        }
    }

    fn read_files(&mut self, files: &[&UploadedFile]) -> anyhow::Result<Vec<String>> {
        let n = files.len().max(1) as u64;
        let mut contents = Vec::with_capacity(files.len());

        for (i, file) in files.iter().enumerate() {
            let start = band_percent(i as u64, n, 0, 10);
            let end = band_percent(i as u64 + 1, n, 0, 10);
            self.set(ImportStep::ReadingFiles, start, format!("Reading {}", file.name))?;

            let size = file.size;
            let status = &mut self.status;
            let on_status = &mut self.on_status;
            let progress: Box<dyn FnMut(u64) + '_> = Box::new(move |bytes: u64| {
                let pct = band_percent(bytes, size, start, end);
                if pct > status.progress {
                    status.progress = pct;
                    if let Some(cb) = on_status.as_mut() {
                        cb(status);
                    }
                }
            });

            let content = file
                .read_content(Some(progress))
                .with_context(|| format!("failed to read {}", file.name))?;
            contents.push(content);
        }

        self.set(ImportStep::ReadingFiles, 10, "Files read")?;
        Ok(contents)
    }

    fn parse_report(&self, file: &UploadedFile, content: &str) -> FileParseReport {
        let mut report = FileParseReport {
            file: file.name.clone(),
            file_type: file.file_type,
            statements: 0,
            kinds: BTreeMap::new(),
            renamed: Vec::new(),
            preview: Vec::new(),
            error: ensure_valid(file)
                .err()
                .map(|e| e.to_string())
                .or_else(|| validate_sql_content(content).error),
        };
        if report.error.is_some() {
            return report;
        }

        match prepare_statements(content, &self.options) {
            Ok(prepared) => {
                report.statements = prepared.statements.len();
                for stmt in &prepared.statements {
                    *report.kinds.entry(classify(stmt).to_string()).or_default() += 1;
                }
                report.preview = prepared
                    .statements
                    .iter()
                    .take(PREVIEW_STATEMENTS)
                    .map(|s| truncate_chars(s, PREVIEW_CHARS))
                    .collect();
                report.renamed = prepared.renamed;
            }
            Err(e) => report.error = Some(e.to_string()),
        }
        report
    }

    /// Run `f`; on error mark the status failed before propagating.
    fn guarded<T>(&mut self, f: impl FnOnce(&mut Self) -> anyhow::Result<T>) -> anyhow::Result<T> {
        match f(self) {
            Ok(value) => Ok(value),
            Err(err) => {
                self.fail(&format!("{:#}", err));
                Err(err)
            }
        }
    }

    fn set(&mut self, step: ImportStep, progress: u8, message: impl Into<String>) -> anyhow::Result<()> {
        self.status.advance(step, progress, message)?;
        self.notify();
        Ok(())
    }

    fn fail(&mut self, error: &str) {
        self.status.fail(error);
        self.notify();
    }

    fn reset(&mut self) {
        self.status.reset();
        self.notify();
    }

    fn notify(&mut self) {
        if let Some(cb) = self.on_status.as_mut() {
            cb(&self.status);
        }
    }
}

/// Reject a file that failed inspection at upload time.
fn ensure_valid(file: &UploadedFile) -> anyhow::Result<()> {
    if file.valid {
        return Ok(());
    }
    match file.error.as_deref() {
        Some(error) if error.contains(&file.name) => bail!("{}", error),
        Some(error) => bail!("{}: {}", file.name, error),
        None => bail!("{}: invalid file", file.name),
    }
}

fn describe_failure(label: &str, result: &ImportResult) -> String {
    format!(
        "{} statement {} of {} failed after {} succeeded: {}",
        label,
        result.failed_index.unwrap_or(0),
        result.total_statements,
        result.statements_executed,
        result.error.as_deref().unwrap_or("unknown error")
    )
}
