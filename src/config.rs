//! Pipeline-level configuration and JSON loading.
//!
//! Configuration is always passed in at construction time. Stage-specific
//! settings live next to their stages (for example
//! [`CsvInputConfig`](crate::stages::csv_input::CsvInputConfig)); any of them
//! can be read from a JSON file with [`load_json_config`].

use crate::queue::Capacity;
use crate::router::DEFAULT_MAX_BACKOFF;
use anyhow::{Context, Result, ensure};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings shared by every connection and stage of a pipeline.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Capacity of queues created by `connect`.
    pub queue_capacity: Capacity,
    /// Cap of the fan-in backoff, in milliseconds.
    pub max_backoff_ms: u64,
    /// Write rejected rows as JSON here when the run ends.
    pub error_file: Option<PathBuf>,
    /// Write stage metrics as JSON here when the run ends.
    pub metrics_file: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: Capacity::default(),
            max_backoff_ms: DEFAULT_MAX_BACKOFF.as_millis() as u64,
            error_file: None,
            metrics_file: None,
        }
    }
}

impl PipelineConfig {
    /// Check values that deserialize fine but cannot be used.
    ///
    /// # Errors
    /// If the queue capacity is `Bounded(0)`.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.queue_capacity != Capacity::Bounded(0),
            "queue capacity must be at least 1"
        );
        Ok(())
    }

    /// Read and validate a pipeline configuration from a JSON file.
    ///
    /// # Errors
    /// See [`load_json_config`] and [`validate`](Self::validate).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config: Self = load_json_config(path)?;
        config
            .validate()
            .with_context(|| format!("invalid configuration {}", path.display()))?;
        Ok(config)
    }

    #[must_use]
    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms.max(1))
    }
}

/// Read a configuration value of type `T` from a JSON file.
///
/// # Errors
/// Returns an error if the file cannot be opened or does not deserialize
/// into `T`.
pub fn load_json_config<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(f))
        .with_context(|| format!("parse configuration {}", path.display()))
}
