use crate::config::Config;
use crate::executor::{ImportResult, RemoteSqlEndpoint, SqlEndpoint};
use crate::pipeline::{FileParseReport, ImportOutcome, ImportPipeline, ImportStatus, PipelineOptions};
use crate::remote::EndpointError;
use crate::validate::UploadedFile;
use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use schemars::JsonSchema;
use serde::Serialize;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// JSON output for test-parse (and import --dry-run)
#[derive(Serialize, JsonSchema)]
pub(crate) struct TestParseJsonOutput {
    files: Vec<FileParseReport>,
    elapsed_secs: f64,
}

/// Endpoint for runs that never execute anything.
struct Offline;

impl SqlEndpoint for Offline {
    fn execute(&mut self, _sql: &str) -> Result<(), EndpointError> {
        Err(EndpointError::Client("parse-only run cannot execute statements".to_string()))
    }
}

fn open_inputs(schema: Option<PathBuf>, data: Option<PathBuf>) -> anyhow::Result<(Option<UploadedFile>, Option<UploadedFile>)> {
    if schema.is_none() && data.is_none() {
        anyhow::bail!("nothing to do: pass --schema and/or --data");
    }
    let open = |path: Option<PathBuf>| -> anyhow::Result<Option<UploadedFile>> {
        path.map(|p| UploadedFile::open(&p).with_context(|| format!("cannot open {}", p.display())))
            .transpose()
    };
    Ok((open(schema)?, open(data)?))
}

pub fn run_test_parse(config: &Config, schema: Option<PathBuf>, data: Option<PathBuf>, json: bool) -> anyhow::Result<()> {
    let start_time = Instant::now();
    let (schema, data) = open_inputs(schema, data)?;
    let files: Vec<&UploadedFile> = schema.iter().chain(data.iter()).collect();

    let mut pipeline = ImportPipeline::new(Offline, PipelineOptions::from(&config.import));
    let reports = pipeline.test_parsing(&files)?;

    if json {
        let output = TestParseJsonOutput {
            files: reports,
            elapsed_secs: start_time.elapsed().as_secs_f64(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    for report in &reports {
        eprintln!("{} ({})", report.file, report.file_type);
        if let Some(error) = &report.error {
            eprintln!("  ERROR: {}", error);
            eprintln!();
            continue;
        }
        eprintln!("  Statements: {}", report.statements);
        for (kind, count) in &report.kinds {
            eprintln!("    {:<18} {}", kind, count);
        }
        if !report.renamed.is_empty() {
            eprintln!("  Renamed: {}", report.renamed.join(", "));
        }
        if !report.preview.is_empty() {
            eprintln!("  First statements:");
            for (i, stmt) in report.preview.iter().enumerate() {
                eprintln!("    {}. {}", i + 1, stmt.replace('\n', " "));
            }
        }
        eprintln!();
    }
    eprintln!("Time: {:.3?}", start_time.elapsed());

    if reports.iter().any(|r| r.error.is_some()) {
        std::process::exit(1);
    }
    Ok(())
}

pub fn run_import(
    config: &Config,
    schema: Option<PathBuf>,
    data: Option<PathBuf>,
    progress: bool,
    json: bool,
) -> anyhow::Result<()> {
    let url = config
        .endpoint
        .url
        .clone()
        .context("no SQL endpoint configured: pass --url or set endpoint.url")?;
    let (schema, data) = open_inputs(schema, data)?;

    let endpoint = RemoteSqlEndpoint::new(
        url,
        config.endpoint.api_key.clone(),
        Duration::from_secs(config.endpoint.timeout_secs),
    )?;

    let options = PipelineOptions::from(&config.import);
    if !json {
        eprintln!(
            "Importing into {} (batch size {}, {} transform, suffix {}{})",
            endpoint.url(),
            options.batch_size,
            options.transform,
            options.suffix,
            options
                .isolated_schema
                .as_deref()
                .map(|s| format!(", schema {}", s))
                .unwrap_or_default()
        );
    }

    let pb = if progress && !json {
        let pb = ProgressBar::new(100);
        pb.set_style(
            ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}")?
                .progress_chars("█▓▒░  "),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        Some(pb)
    } else {
        None
    };

    let start_time = Instant::now();
    let mut pipeline = ImportPipeline::new(endpoint, options);
    if let Some(pb) = pb.clone() {
        pipeline = pipeline.with_status_callback(move |status: &ImportStatus| {
            pb.set_position(status.progress as u64);
            pb.set_message(status.message.clone());
        });
    }

    let outcome = match (&schema, &data) {
        (Some(schema), Some(data)) => pipeline.import_both(schema, data),
        (Some(schema), None) => pipeline.import_schema(schema),
        (None, Some(data)) => pipeline.import_data(data),
        (None, None) => Err(anyhow::anyhow!("nothing to import")),
    };

    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(e) => {
            if let Some(pb) = &pb {
                pb.abandon_with_message("failed");
            }
            return Err(e);
        }
    };

    if let Some(pb) = &pb {
        if outcome.success {
            pb.finish_with_message("done");
        } else {
            pb.abandon_with_message("failed");
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&outcome, start_time.elapsed());
    }

    if !outcome.success {
        std::process::exit(1);
    }
    Ok(())
}

fn print_outcome(outcome: &ImportOutcome, elapsed: Duration) {
    eprintln!();
    if let Some(result) = &outcome.schema {
        print_result("Schema", result);
    }
    if let Some(result) = &outcome.data {
        print_result("Data", result);
    }
    eprintln!("Time: {:.3?}", elapsed);
    eprintln!();
    if outcome.success {
        eprintln!("Result: SUCCESS");
    } else {
        eprintln!("Result: FAILED");
        if let Some(error) = &outcome.status.error {
            eprintln!("  {}", error);
        }
    }
}

fn print_result(label: &str, result: &ImportResult) {
    eprintln!(
        "{}: {}/{} statements executed",
        label, result.statements_executed, result.total_statements
    );
    if !result.tolerated.is_empty() {
        eprintln!("  {} tolerated errors:", result.tolerated.len());
        for tolerated in &result.tolerated {
            eprintln!("    #{}: {}", tolerated.index, tolerated.message);
        }
    }
    if result.success {
        return;
    }
    if let Some(index) = result.failed_index {
        eprintln!("  Failed at statement {}", index);
    }
    if let Some(batch) = &result.failed_batch {
        eprintln!("  Batch: {}", batch);
    }
    if let Some(error) = &result.error {
        eprintln!("  Error: {}", error);
    }
    if let Some(sql) = result.display_failed_statement() {
        eprintln!("  Statement:");
        for line in sql.lines() {
            eprintln!("    {}", line);
        }
    }
    if result.is_partial() {
        eprintln!(
            "  Note: {} statements were applied before the failure and were not rolled back",
            result.statements_executed
        );
    }
}
