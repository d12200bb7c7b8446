//! Resolution of input file specifications.
//!
//! An input stage names its files with either a plain path or a glob pattern
//! such as `landing/orders-*.csv.gz`. Patterns expand to regular files only,
//! sorted lexicographically so a rerun reads files in the same order.

use anyhow::{Context, Result, bail};
use glob::glob;
use std::path::{Path, PathBuf};

/// Whether `spec` contains glob metacharacters.
#[must_use]
pub fn is_glob_pattern(spec: &str) -> bool {
    spec.contains(['*', '?', '['])
}

/// Expand a glob pattern into a sorted list of matching files.
///
/// Zero matches yields an empty vector.
///
/// # Errors
/// Returns an error for an invalid pattern or an unreadable directory entry.
pub fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>> {
    let paths = glob(pattern).with_context(|| format!("invalid glob pattern: {pattern}"))?;
    let mut result = Vec::new();
    for entry in paths {
        let path =
            entry.with_context(|| format!("error reading glob entry for pattern: {pattern}"))?;
        if path.is_file() {
            result.push(path);
        }
    }
    result.sort();
    Ok(result)
}

/// Resolve an input specification to the files it names.
///
/// A plain path must exist. A pattern must match at least one file.
///
/// # Errors
/// Returns an error when nothing matches or the path does not exist.
pub fn resolve_inputs(spec: &str) -> Result<Vec<PathBuf>> {
    if !is_glob_pattern(spec) {
        let path = Path::new(spec);
        if !path.is_file() {
            bail!("input file not found: {spec}");
        }
        return Ok(vec![path.to_path_buf()]);
    }
    let files = expand_glob(spec)?;
    if files.is_empty() {
        bail!("no files found matching pattern: {spec}");
    }
    Ok(files)
}
