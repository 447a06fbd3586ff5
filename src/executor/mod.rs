//! Sequential statement execution against a remote SQL endpoint.
//!
//! Statements run strictly in order, one call in flight at a time, so a
//! failure always points at one statement (or one batch). There is no
//! rollback: a failed run leaves earlier statements applied.

pub mod http;

use crate::progress::band_percent;
use crate::remote::EndpointError;
use schemars::JsonSchema;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

pub use http::RemoteSqlEndpoint;

/// Errors containing one of these substrings are expected on repeated
/// imports into a persistent schema.
pub const DEFAULT_TOLERATED_ERRORS: &[&str] = &["already exists", "does not exist", "permission denied"];

/// Maximum characters of a failed statement shown to users.
pub const DISPLAY_STATEMENT_CHARS: usize = 500;

/// Something that can execute a chunk of SQL.
pub trait SqlEndpoint {
    fn execute(&mut self, sql: &str) -> Result<(), EndpointError>;
}

impl<T: SqlEndpoint + ?Sized> SqlEndpoint for &mut T {
    fn execute(&mut self, sql: &str) -> Result<(), EndpointError> {
        (**self).execute(sql)
    }
}

impl<T: SqlEndpoint + ?Sized> SqlEndpoint for Box<T> {
    fn execute(&mut self, sql: &str) -> Result<(), EndpointError> {
        (**self).execute(sql)
    }
}

/// Progress after each completed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecProgress {
    pub executed: usize,
    pub total: usize,
    /// Overall percentage, mapped into the executor's band
    pub percent: u8,
}

/// An error that was suppressed because it matched the tolerated list.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ToleratedError {
    /// 1-based index of the (first) statement of the call
    pub index: usize,
    pub message: String,
}

/// Outcome of one executor run.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ImportResult {
    pub success: bool,
    pub statements_executed: usize,
    pub total_statements: usize,
    /// 1-based index of the failing statement (first statement of the batch in batch mode)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_index: Option<usize>,
    /// Literal SQL that failed; the whole batch in batch mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_statement: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_batch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tolerated: Vec<ToleratedError>,
}

impl ImportResult {
    fn new(total: usize) -> Self {
        Self {
            success: true,
            statements_executed: 0,
            total_statements: total,
            failed_index: None,
            failed_statement: None,
            failed_batch: None,
            error: None,
            tolerated: Vec::new(),
        }
    }

    pub fn is_partial(&self) -> bool {
        !self.success && self.statements_executed > 0
    }

    /// Failed SQL cut down for display.
    pub fn display_failed_statement(&self) -> Option<String> {
        self.failed_statement
            .as_deref()
            .map(|sql| truncate_chars(sql, DISPLAY_STATEMENT_CHARS))
    }
}

/// Whether a remote error message contains any of `patterns`, ignoring case.
/// Transport errors never match.
pub fn remote_error_matches<S: AsRef<str>>(err: &EndpointError, patterns: &[S]) -> bool {
    if !err.is_remote() {
        return false;
    }
    let message = err.to_string().to_lowercase();
    patterns.iter().any(|p| message.contains(&p.as_ref().to_lowercase()))
}

pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct Executor {
    batch_size: usize,
    delay: Duration,
    tolerated_errors: Vec<String>,
    band: (u8, u8),
    statement_prefix: Option<String>,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor {
    /// Per-statement mode, no delay, no tolerated errors, full 0-100 band.
    pub fn new() -> Self {
        Self {
            batch_size: 1,
            delay: Duration::ZERO,
            tolerated_errors: Vec::new(),
            band: (0, 100),
            statement_prefix: None,
        }
    }

    /// Statements per remote call; 1 reproduces per-statement mode.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Pause between calls to avoid overwhelming the endpoint.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_tolerated_errors<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tolerated_errors = patterns.into_iter().map(|p| p.into().to_lowercase()).collect();
        self
    }

    /// Progress sub-range this run occupies in the overall import.
    pub fn with_band(mut self, start: u8, end: u8) -> Self {
        self.band = (start.min(end), end);
        self
    }

    /// SQL sent ahead of every call, e.g. a `SET search_path`.
    pub fn with_statement_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.statement_prefix = Some(prefix.into());
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn is_tolerated(&self, err: &EndpointError) -> bool {
        remote_error_matches(err, &self.tolerated_errors)
    }

    pub fn run<E, F>(&self, endpoint: &mut E, statements: &[String], mut progress: F) -> ImportResult
    where
        E: SqlEndpoint + ?Sized,
        F: FnMut(ExecProgress),
    {
        let total = statements.len();
        let batches = total.div_ceil(self.batch_size);
        let mut result = ImportResult::new(total);
        info!(total, batch_size = self.batch_size, "executing statements");

        for (batch_idx, chunk) in statements.chunks(self.batch_size).enumerate() {
            let first = batch_idx * self.batch_size + 1;
            let sql = if chunk.len() == 1 {
                chunk[0].clone()
            } else {
                chunk.iter().map(|s| format!("{};", s)).collect::<Vec<_>>().join("\n")
            };
            let call = match &self.statement_prefix {
                Some(prefix) => format!("{}\n{}", prefix, sql),
                None => sql.clone(),
            };

            debug!(index = first, len = chunk.len(), "executing");
            match endpoint.execute(&call) {
                Ok(()) => result.statements_executed += chunk.len(),
                Err(err) if self.is_tolerated(&err) => {
                    warn!(index = first, error = %err, "ignoring expected error");
                    result.tolerated.push(ToleratedError {
                        index: first,
                        message: err.to_string(),
                    });
                    result.statements_executed += chunk.len();
                }
                Err(err) => {
                    warn!(index = first, total, error = %err, "statement failed");
                    result.success = false;
                    result.failed_index = Some(first);
                    result.failed_statement = Some(sql);
                    result.error = Some(err.to_string());
                    if self.batch_size > 1 {
                        result.failed_batch = Some(format!(
                            "batch {}/{} (statements {}-{})",
                            batch_idx + 1,
                            batches,
                            first,
                            first + chunk.len() - 1
                        ));
                    }
                    return result;
                }
            }

            progress(ExecProgress {
                executed: result.statements_executed,
                total,
                percent: band_percent(result.statements_executed as u64, total as u64, self.band.0, self.band.1),
            });

            if !self.delay.is_zero() && batch_idx + 1 < batches {
                std::thread::sleep(self.delay);
            }
        }

        result
    }
}
