//! Integration tests for the import pipeline
//!
//! The remote endpoint is replaced by an in-memory recorder, so these tests
//! cover reading, validation, cleaning, splitting, transformation, execution
//! and status reporting end to end without a network.

use pcrm_import::executor::SqlEndpoint;
use pcrm_import::pipeline::{ImportPipeline, ImportStatus, ImportStep, PipelineOptions};
use pcrm_import::remote::EndpointError;
use pcrm_import::transform::TransformMode;
use pcrm_import::validate::UploadedFile;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

#[derive(Default)]
struct RecordingEndpoint {
    calls: Vec<String>,
    fail_on: Option<(&'static str, &'static str)>,
}

impl RecordingEndpoint {
    fn failing_on(needle: &'static str, message: &'static str) -> Self {
        Self {
            calls: Vec::new(),
            fail_on: Some((needle, message)),
        }
    }
}

impl SqlEndpoint for RecordingEndpoint {
    fn execute(&mut self, sql: &str) -> Result<(), EndpointError> {
        self.calls.push(sql.to_string());
        match self.fail_on {
            Some((needle, message)) if sql.contains(needle) => Err(EndpointError::Remote(message.to_string())),
            _ => Ok(()),
        }
    }
}

const SCHEMA_DUMP: &str = r#"--
-- PostgreSQL database dump
--

SET statement_timeout = 0;
SET client_encoding = 'UTF8';
SELECT pg_catalog.set_config('search_path', '', false);

CREATE TABLE public.t1 (id integer NOT NULL);
CREATE TABLE public.t2 (id integer NOT NULL, t1_id integer REFERENCES public.t1(id));
CREATE TABLE public.t3 (id integer NOT NULL, note text DEFAULT 'a;b');
CREATE TABLE public.t4 (id integer NOT NULL);
CREATE TABLE public.t5 (id integer NOT NULL);
"#;

const DATA_DUMP: &str = r#"--
-- Data for Name: t1; Type: TABLE DATA; Schema: public; Owner: postgres
--

INSERT INTO public.t1 VALUES (1);
INSERT INTO public.t2 VALUES (1, 1);
INSERT INTO public.t3 VALUES (1, 'it''s; fine');
"#;

fn write_file(dir: &Path, name: &str, content: &str) -> UploadedFile {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    UploadedFile::open(&path).unwrap()
}

fn options() -> PipelineOptions {
    PipelineOptions::default()
}

#[test]
fn test_schema_import_executes_transformed_statements() {
    let dir = TempDir::new().unwrap();
    let schema = write_file(dir.path(), "schema.sql", SCHEMA_DUMP);
    let mut endpoint = RecordingEndpoint::default();

    let outcome = {
        let mut pipeline = ImportPipeline::new(&mut endpoint, options());
        let outcome = pipeline.import_schema(&schema).unwrap();
        assert_eq!(pipeline.status().step, ImportStep::Complete);
        assert_eq!(pipeline.status().progress, 100);
        outcome
    };

    assert!(outcome.success);
    let result = outcome.schema.unwrap();
    assert_eq!(result.statements_executed, 5);
    assert_eq!(result.total_statements, 5);
    assert_eq!(endpoint.calls.len(), 5);
    assert_eq!(
        endpoint.calls[1],
        "CREATE TABLE public.t2_PCRM (id integer NOT NULL, t1_id integer REFERENCES public.t1_PCRM(id))"
    );
    assert!(endpoint.calls.iter().all(|c| !c.starts_with("SET ") && !c.starts_with("SELECT ")));
    assert_eq!(endpoint.calls[2], "CREATE TABLE public.t3_PCRM (id integer NOT NULL, note text DEFAULT 'a;b')");
}

#[test]
fn test_failure_at_statement_three_of_five() {
    let dir = TempDir::new().unwrap();
    let schema = write_file(dir.path(), "schema.sql", SCHEMA_DUMP);
    let mut endpoint = RecordingEndpoint::failing_on("public.t3_PCRM", "syntax error at or near \"DEFAULT\"");

    let (outcome, status) = {
        let mut pipeline = ImportPipeline::new(&mut endpoint, options());
        let outcome = pipeline.import_schema(&schema).unwrap();
        (outcome, pipeline.status().clone())
    };

    assert!(!outcome.success);
    let result = outcome.schema.unwrap();
    assert!(!result.success);
    assert_eq!(result.statements_executed, 2);
    assert_eq!(result.total_statements, 5);
    assert_eq!(result.failed_index, Some(3));
    assert!(result.failed_statement.unwrap().contains("public.t3_PCRM"));
    assert_eq!(result.error.as_deref(), Some("syntax error at or near \"DEFAULT\""));

    assert_eq!(status.step, ImportStep::Error);
    assert!(status.error.unwrap().contains("statement 3 of 5"));
    // Nothing after the failing statement is sent.
    assert_eq!(endpoint.calls.len(), 3);
}

#[test]
fn test_import_both_skips_data_after_schema_failure() {
    let dir = TempDir::new().unwrap();
    let schema = write_file(dir.path(), "schema.sql", SCHEMA_DUMP);
    let data = write_file(dir.path(), "data.sql", DATA_DUMP);
    let mut endpoint = RecordingEndpoint::failing_on("public.t1_PCRM", "relation already there");

    let outcome = ImportPipeline::new(&mut endpoint, options())
        .import_both(&schema, &data)
        .unwrap();

    assert!(!outcome.success);
    assert!(outcome.schema.is_some());
    assert!(outcome.data.is_none());
    assert!(endpoint.calls.iter().all(|c| !c.starts_with("INSERT")));
}

#[test]
fn test_import_both_runs_schema_then_data() {
    let dir = TempDir::new().unwrap();
    let schema = write_file(dir.path(), "schema.sql", SCHEMA_DUMP);
    let data = write_file(dir.path(), "data.sql", DATA_DUMP);
    let mut endpoint = RecordingEndpoint::default();
    let mut seen: Vec<(ImportStep, u8)> = Vec::new();

    let outcome = {
        let mut pipeline = ImportPipeline::new(&mut endpoint, options())
            .with_status_callback(|s: &ImportStatus| seen.push((s.step, s.progress)));
        pipeline.import_both(&schema, &data).unwrap()
    };

    assert!(outcome.success);
    assert_eq!(outcome.data.as_ref().unwrap().statements_executed, 3);
    assert_eq!(endpoint.calls.len(), 8);
    assert_eq!(endpoint.calls[7], "INSERT INTO public.t3_PCRM VALUES (1, 'it''s; fine')");

    // First event is the reset; after that step and progress only move forward.
    assert_eq!(seen[0], (ImportStep::Idle, 0));
    for pair in seen[1..].windows(2) {
        assert!(pair[0].0 <= pair[1].0, "step went backwards: {:?}", pair);
        assert!(pair[0].1 <= pair[1].1, "progress went backwards: {:?}", pair);
    }
    assert!(seen.contains(&(ImportStep::ImportingSchema, 65)));
    assert!(seen.contains(&(ImportStep::ImportingData, 95)));
    assert_eq!(seen.last(), Some(&(ImportStep::Complete, 100)));
}

#[test]
fn test_invalid_file_fails_validation_without_remote_calls() {
    let dir = TempDir::new().unwrap();
    let data = write_file(dir.path(), "data.sql", "-- nothing here\n\n(0 rows)\n");
    assert!(!data.valid);
    let mut endpoint = RecordingEndpoint::default();

    let status = {
        let mut pipeline = ImportPipeline::new(&mut endpoint, options());
        let err = pipeline.import_data(&data).unwrap_err();
        assert!(err.to_string().contains("data.sql"));
        pipeline.status().clone()
    };

    assert_eq!(status.step, ImportStep::Error);
    assert!(endpoint.calls.is_empty());
}

#[test]
fn test_unterminated_quote_is_reported_before_import() {
    let dir = TempDir::new().unwrap();
    let data = write_file(dir.path(), "data.sql", "INSERT INTO t VALUES ('oops);\n");
    let mut endpoint = RecordingEndpoint::default();

    let err = ImportPipeline::new(&mut endpoint, options())
        .import_data(&data)
        .unwrap_err();
    assert!(err.to_string().contains("unterminated"));
    assert!(endpoint.calls.is_empty());
}

#[test]
fn test_isolated_schema_prefixes_calls_and_tolerates_expected_errors() {
    let dir = TempDir::new().unwrap();
    let schema = write_file(
        dir.path(),
        "schema.sql",
        "CREATE TABLE jobs (id int);\nALTER TABLE jobs OWNER TO postgres;\nGRANT ALL ON jobs TO web;\nCREATE TABLE shifts (id int);\n",
    );
    let mut endpoint = RecordingEndpoint::failing_on("jobs", "relation \"jobs\" already exists");
    let opts = PipelineOptions {
        isolated_schema: Some("legacy".to_string()),
        transform: TransformMode::None,
        ..options()
    };

    let outcome = ImportPipeline::new(&mut endpoint, opts)
        .import_schema(&schema)
        .unwrap();

    assert!(outcome.success);
    let result = outcome.schema.unwrap();
    assert_eq!(result.total_statements, 2);
    assert_eq!(result.statements_executed, 2);
    assert_eq!(result.tolerated.len(), 1);
    assert_eq!(result.tolerated[0].index, 1);

    assert_eq!(endpoint.calls[0], "CREATE SCHEMA IF NOT EXISTS \"legacy\"");
    assert_eq!(endpoint.calls[1], "SET search_path TO \"legacy\";\nCREATE TABLE jobs (id int)");
    assert_eq!(endpoint.calls[2], "SET search_path TO \"legacy\";\nCREATE TABLE shifts (id int)");
}

#[test]
fn test_isolated_schema_moves_public_objects() {
    let dir = TempDir::new().unwrap();
    let schema = write_file(
        dir.path(),
        "schema.sql",
        "CREATE TABLE public.jobs (id int);\nALTER TABLE ONLY public.jobs ADD CONSTRAINT jobs_pkey PRIMARY KEY (id);\n",
    );
    let data = write_file(dir.path(), "data.sql", "INSERT INTO public.jobs VALUES (1);\n");
    let mut endpoint = RecordingEndpoint::default();
    let opts = PipelineOptions {
        isolated_schema: Some("legacy".to_string()),
        ..options()
    };

    let outcome = ImportPipeline::new(&mut endpoint, opts)
        .import_both(&schema, &data)
        .unwrap();

    assert!(outcome.success);
    assert_eq!(
        endpoint.calls,
        vec![
            "CREATE SCHEMA IF NOT EXISTS \"legacy\"",
            "SET search_path TO \"legacy\";\nCREATE TABLE \"legacy\".jobs_PCRM (id int)",
            "SET search_path TO \"legacy\";\nALTER TABLE ONLY \"legacy\".jobs_PCRM ADD CONSTRAINT jobs_pkey PRIMARY KEY (id)",
            "SET search_path TO \"legacy\";\nINSERT INTO \"legacy\".jobs_PCRM VALUES (1)",
        ]
    );
    assert!(endpoint.calls.iter().all(|c| !c.contains("public.")));
}

#[test]
fn test_non_sql_upload_is_rejected_before_any_call() {
    let dir = TempDir::new().unwrap();
    let schema = write_file(dir.path(), "schema.txt", "CREATE TABLE a (id int);\n");
    assert!(!schema.valid);
    let mut endpoint = RecordingEndpoint::default();

    let (status, reports) = {
        let mut pipeline = ImportPipeline::new(&mut endpoint, options());
        let err = pipeline.import_schema(&schema).unwrap_err();
        assert!(err.to_string().contains(".sql"));
        let status = pipeline.status().clone();
        let reports = pipeline.test_parsing(&[&schema]).unwrap();
        (status, reports)
    };

    assert_eq!(status.step, ImportStep::Error);
    assert!(reports[0].error.as_deref().unwrap().contains(".sql"));
    assert_eq!(reports[0].statements, 0);
    assert!(endpoint.calls.is_empty());
}

#[test]
fn test_batched_import_reports_failed_batch() {
    let dir = TempDir::new().unwrap();
    let data = write_file(
        dir.path(),
        "data.sql",
        &(1..=5).map(|i| format!("INSERT INTO t VALUES ({});\n", i)).collect::<String>(),
    );
    let mut endpoint = RecordingEndpoint::failing_on("(4)", "duplicate key value");
    let opts = PipelineOptions {
        batch_size: 2,
        ..options()
    };

    let outcome = ImportPipeline::new(&mut endpoint, opts).import_data(&data).unwrap();
    let result = outcome.data.unwrap();
    assert_eq!(result.statements_executed, 2);
    assert_eq!(result.failed_index, Some(3));
    assert_eq!(result.failed_batch.as_deref(), Some("batch 2/3 (statements 3-4)"));
    assert_eq!(endpoint.calls.len(), 2);
}

#[test]
fn test_parsing_reports_without_remote_calls() {
    let dir = TempDir::new().unwrap();
    let schema = write_file(dir.path(), "schema.sql", SCHEMA_DUMP);
    let broken = write_file(dir.path(), "data.sql", "INSERT INTO t VALUES ('x);\n");
    let mut endpoint = RecordingEndpoint::default();

    let reports = {
        let mut pipeline = ImportPipeline::new(&mut endpoint, options());
        let reports = pipeline.test_parsing(&[&schema, &broken]).unwrap();
        assert_eq!(pipeline.status().step, ImportStep::Complete);
        reports
    };

    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].statements, 5);
    assert_eq!(reports[0].kinds.get("CREATE TABLE"), Some(&5));
    assert_eq!(reports[0].renamed, vec!["t1", "t2", "t3", "t4", "t5"]);
    assert_eq!(reports[0].preview.len(), 5);
    assert!(reports[0].error.is_none());
    assert!(reports[1].error.as_deref().unwrap().contains("unterminated"));
    assert!(endpoint.calls.is_empty());
}

#[test]
fn test_status_is_reset_between_runs() {
    let dir = TempDir::new().unwrap();
    let bad = write_file(dir.path(), "data.sql", "-- empty\n");
    let good = write_file(dir.path(), "schema.sql", SCHEMA_DUMP);
    let mut endpoint = RecordingEndpoint::default();

    let mut pipeline = ImportPipeline::new(&mut endpoint, options());
    assert!(pipeline.import_data(&bad).is_err());
    assert_eq!(pipeline.status().step, ImportStep::Error);

    let outcome = pipeline.import_schema(&good).unwrap();
    assert!(outcome.success);
    assert_eq!(pipeline.status().step, ImportStep::Complete);
    assert!(pipeline.status().error.is_none());
}
