//! Helpers for testing pipelines and stages.
//!
//! Fixtures on disk live in a [`TempDirPath`] that is removed when dropped;
//! in-memory helpers build rows, tokenize text and drain queues.
//!
//! ```
//! use rowpipe::testing::{TempDirPath, write_temp_file, text_row};
//!
//! let dir = TempDirPath::new()?;
//! let path = write_temp_file(&dir, "in.csv", "a;b\n")?;
//! assert!(path.exists());
//! assert_eq!(text_row(&["a", "b"]).len(), 2);
//! # Ok::<(), anyhow::Error>(())
//! ```

use crate::error::QueueError;
use crate::queue::RowQueue;
use crate::row::{Row, Value};
use crate::tokenizer::{DelimitedLineTokenizer, TokenizedRow, TokenizerConfig};
use anyhow::{Context, Result};
use std::fmt::Debug;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temporary directory that is deleted when dropped.
pub struct TempDirPath {
    temp_dir: TempDir,
}

impl TempDirPath {
    /// # Errors
    /// Returns an error if the directory cannot be created.
    pub fn new() -> std::io::Result<Self> {
        Ok(Self {
            temp_dir: TempDir::new()?,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// A path for `filename` inside this directory.
    #[must_use]
    pub fn file_path(&self, filename: &str) -> PathBuf {
        self.path().join(filename)
    }
}

/// Write `contents` to `filename` inside `dir` and return its path.
///
/// # Errors
/// Returns an error if the file cannot be written.
pub fn write_temp_file(dir: &TempDirPath, filename: &str, contents: impl AsRef<[u8]>) -> Result<PathBuf> {
    let path = dir.file_path(filename);
    fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
    Ok(path)
}

/// A row of string values.
#[must_use]
pub fn text_row(values: &[&str]) -> Row {
    values.iter().map(|v| Value::text(*v)).collect()
}

/// Tokenize all of `text`, returning the field lists.
///
/// # Errors
/// The first tokenizer error.
pub fn tokenize_all(text: &str, config: &TokenizerConfig) -> Result<Vec<Vec<String>>> {
    Ok(DelimitedLineTokenizer::from_str(text, config)?
        .map(|r| r.map(|r: TokenizedRow| r.fields))
        .collect::<Result<_, _>>()?)
}

/// Drain `queue` with blocking reads until it is empty and done.
///
/// # Errors
/// [`QueueError::Cancelled`] if the queue's stop signal fires.
pub fn collect_rows(queue: &RowQueue) -> Result<Vec<Row>, QueueError> {
    let mut rows = Vec::new();
    while let Some(row) = queue.get_blocking()? {
        rows.push(row);
    }
    Ok(rows)
}

/// Assert that two row lists are equal, reporting the first differing index.
///
/// # Panics
/// If the lists differ in length or content.
pub fn assert_rows_equal<T: Debug + PartialEq>(actual: &[T], expected: &[T]) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "row count mismatch:\n  expected: {expected:?}\n  actual: {actual:?}"
    );
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert_eq!(a, e, "row mismatch at index {i}");
    }
}
