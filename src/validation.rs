//! Handling of malformed rows.
//!
//! Conversion failures are recoverable at row granularity: one bad line should
//! not abort an otherwise valid file. [`ErrorMode`] decides what a stage does
//! with a rejected row, and [`RowErrorCollector`] accumulates the rejects for
//! reporting at the end of a run.
//!
//! # Example
//!
//! ```
//! use rowpipe::validation::{ErrorMode, RowErrorCollector};
//! use rowpipe::error::ConversionError;
//!
//! let collector = RowErrorCollector::new();
//! collector.add("csv-in", &ConversionError {
//!     line: 4,
//!     field_index: 1,
//!     field: "amount".into(),
//!     value: "12,x".into(),
//!     reason: "invalid float literal".into(),
//! });
//!
//! assert_eq!(collector.error_count(), 1);
//! assert_eq!(ErrorMode::default(), ErrorMode::LogAndContinue);
//! ```

use crate::error::ConversionError;
use anyhow::Context;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// What a stage does with a row that fails conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorMode {
    /// Drop the row silently; only the rejected-row counter moves.
    SkipInvalid,
    /// Drop the row, log a warning and record it in the collector.
    #[default]
    LogAndContinue,
    /// Fail the stage on the first bad row.
    FailFast,
}

/// One rejected row with its position in the input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    /// Stage that rejected the row.
    pub stage: String,
    pub line: u64,
    pub field_index: usize,
    pub field: String,
    pub value: String,
    pub message: String,
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] line {}, field #{} ({}): {:?}: {}",
            self.stage, self.line, self.field_index, self.field, self.value, self.message
        )
    }
}

/// Shared, thread-safe list of rejected rows. Clones share the same list.
#[derive(Debug, Clone, Default)]
pub struct RowErrorCollector {
    errors: Arc<Mutex<Vec<RowError>>>,
}

impl RowErrorCollector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a conversion failure reported by `stage`.
    pub fn add(&self, stage: &str, err: &ConversionError) {
        self.errors.lock().push(RowError {
            stage: stage.to_string(),
            line: err.line,
            field_index: err.field_index,
            field: err.field.clone(),
            value: err.value.clone(),
            message: err.reason.clone(),
        });
    }

    pub fn push(&self, error: RowError) {
        self.errors.lock().push(error);
    }

    #[must_use]
    pub fn error_count(&self) -> usize {
        self.errors.lock().len()
    }

    /// Copy of all collected errors, in arrival order.
    #[must_use]
    pub fn errors(&self) -> Vec<RowError> {
        self.errors.lock().clone()
    }

    pub fn clear(&self) {
        self.errors.lock().clear();
    }

    /// Export errors as a pretty-printed JSON array.
    ///
    /// # Errors
    /// Propagates serialization failures.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&*self.errors.lock())
    }

    /// Write errors to `path` as JSON.
    ///
    /// # Errors
    /// Returns an error if serialization or the write fails.
    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        let json = self.to_json()?;
        std::fs::write(path, json)
            .with_context(|| format!("write row errors to {}", path.display()))
    }
}

impl fmt::Display for RowErrorCollector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RowErrorCollector({} errors)", self.error_count())
    }
}
