//! Import progress state.

use schemars::JsonSchema;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Pipeline steps in the order a run moves through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ImportStep {
    Idle,
    ReadingFiles,
    Validating,
    ImportingSchema,
    ImportingData,
    Complete,
    Error,
}

impl fmt::Display for ImportStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ImportStep::Idle => "idle",
            ImportStep::ReadingFiles => "reading-files",
            ImportStep::Validating => "validating",
            ImportStep::ImportingSchema => "importing-schema",
            ImportStep::ImportingData => "importing-data",
            ImportStep::Complete => "complete",
            ImportStep::Error => "error",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatusError {
    #[error("cannot move from {from} back to {to}")]
    Backward { from: ImportStep, to: ImportStep },
    #[error("import failed; reset before starting again")]
    Failed,
    #[error("use fail() to enter the error step")]
    ErrorStep,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct ImportStatus {
    pub step: ImportStep,
    /// 0-100
    pub progress: u8,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Default for ImportStatus {
    fn default() -> Self {
        Self::idle()
    }
}

impl ImportStatus {
    pub fn idle() -> Self {
        Self {
            step: ImportStep::Idle,
            progress: 0,
            message: String::new(),
            error: None,
        }
    }

    /// Move forward (or stay on the current step). Progress never decreases.
    pub fn advance(&mut self, step: ImportStep, progress: u8, message: impl Into<String>) -> Result<(), StatusError> {
        if self.step == ImportStep::Error {
            return Err(StatusError::Failed);
        }
        if step == ImportStep::Error {
            return Err(StatusError::ErrorStep);
        }
        if step < self.step {
            return Err(StatusError::Backward { from: self.step, to: step });
        }
        self.step = step;
        self.progress = progress.min(100).max(self.progress);
        self.message = message.into();
        Ok(())
    }

    /// Enter the terminal error step; progress is kept where it stopped.
    pub fn fail(&mut self, error: impl Into<String>) {
        let error = error.into();
        self.step = ImportStep::Error;
        self.message = format!("Import failed: {}", error);
        self.error = Some(error);
    }

    pub fn reset(&mut self) {
        *self = Self::idle();
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.step, ImportStep::Complete | ImportStep::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_only() {
        let mut status = ImportStatus::idle();
        status.advance(ImportStep::ReadingFiles, 5, "Reading").unwrap();
        status.advance(ImportStep::ImportingData, 70, "Data").unwrap();
        let err = status.advance(ImportStep::ImportingSchema, 40, "Schema").unwrap_err();
        assert_eq!(
            err,
            StatusError::Backward {
                from: ImportStep::ImportingData,
                to: ImportStep::ImportingSchema
            }
        );
    }

    #[test]
    fn test_progress_never_decreases() {
        let mut status = ImportStatus::idle();
        status.advance(ImportStep::Validating, 30, "a").unwrap();
        status.advance(ImportStep::Validating, 20, "b").unwrap();
        assert_eq!(status.progress, 30);
        assert_eq!(status.message, "b");
    }

    #[test]
    fn test_error_is_terminal_until_reset() {
        let mut status = ImportStatus::idle();
        status.advance(ImportStep::ImportingSchema, 50, "x").unwrap();
        status.fail("boom");
        assert!(status.is_finished());
        assert_eq!(status.advance(ImportStep::Complete, 100, "done"), Err(StatusError::Failed));
        status.reset();
        assert_eq!(status.step, ImportStep::Idle);
        assert!(status.error.is_none());
    }
}
