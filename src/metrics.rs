//! Per-stage row counters and run-level reporting.
//!
//! Every stage gets a [`StageMetrics`] handle of lock-free counters that its
//! processing loop bumps as rows move. The runner registers those handles
//! with a [`MetricsCollector`], which snapshots them into JSON, prints a
//! summary or saves it to a file when the run ends.
//!
//! # Example
//!
//! ```no_run
//! use rowpipe::metrics::MetricsCollector;
//!
//! let metrics = MetricsCollector::new();
//! let input = metrics.stage("csv-in");
//! input.add_read(3);
//! input.add_written(3);
//!
//! metrics.record_start();
//! metrics.record_end();
//! metrics.print();
//! metrics.save_to_file("metrics.json")?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Value, json};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Row counters of one stage. Cheap to clone; clones share counters.
#[derive(Debug, Clone, Default)]
pub struct StageMetrics {
    inner: Arc<Counters>,
}

#[derive(Debug, Default)]
struct Counters {
    /// Records read from an external source (file lines, records).
    read: AtomicU64,
    /// Rows taken from inbound queues.
    input: AtomicU64,
    /// Rows sent downstream.
    output: AtomicU64,
    /// Rows written to an external sink.
    written: AtomicU64,
    /// Rows dropped because they failed conversion.
    rejected: AtomicU64,
}

impl StageMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_read(&self, n: u64) {
        self.inner.read.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_input(&self, n: u64) {
        self.inner.input.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_output(&self, n: u64) {
        self.inner.output.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_written(&self, n: u64) {
        self.inner.written.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_rejected(&self, n: u64) {
        self.inner.rejected.fetch_add(n, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> StageSnapshot {
        StageSnapshot {
            read: self.inner.read.load(Ordering::Relaxed),
            input: self.inner.input.load(Ordering::Relaxed),
            output: self.inner.output.load(Ordering::Relaxed),
            written: self.inner.written.load(Ordering::Relaxed),
            rejected: self.inner.rejected.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of a stage's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StageSnapshot {
    pub read: u64,
    pub input: u64,
    pub output: u64,
    pub written: u64,
    pub rejected: u64,
}

/// Collects the counters of every stage in a run.
#[derive(Clone, Default)]
pub struct MetricsCollector {
    inner: Arc<Mutex<CollectorInner>>,
}

#[derive(Default)]
struct CollectorInner {
    stages: Vec<(String, StageMetrics)>,
    start_time: Option<Instant>,
    end_time: Option<Instant>,
}

impl MetricsCollector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Counters for the stage called `name`, created on first use.
    pub fn stage(&self, name: &str) -> StageMetrics {
        let mut inner = self.inner.lock();
        if let Some((_, m)) = inner.stages.iter().find(|(n, _)| n == name) {
            return m.clone();
        }
        let m = StageMetrics::new();
        inner.stages.push((name.to_string(), m.clone()));
        m
    }

    pub fn record_start(&self) {
        self.inner.lock().start_time = Some(Instant::now());
    }

    pub fn record_end(&self) {
        self.inner.lock().end_time = Some(Instant::now());
    }

    #[must_use]
    pub fn elapsed(&self) -> Option<Duration> {
        let inner = self.inner.lock();
        match (inner.start_time, inner.end_time) {
            (Some(start), Some(end)) => Some(end.duration_since(start)),
            _ => None,
        }
    }

    /// Snapshots of every stage in registration order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(String, StageSnapshot)> {
        self.inner
            .lock()
            .stages
            .iter()
            .map(|(name, m)| (name.clone(), m.snapshot()))
            .collect()
    }

    /// All counters as a JSON object keyed by stage name, plus
    /// `execution_time_ms` once the run has ended.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut stages = serde_json::Map::new();
        for (name, snap) in self.snapshot() {
            stages.insert(name, json!(snap));
        }
        let mut out = serde_json::Map::new();
        out.insert("stages".to_string(), Value::Object(stages));
        if let Some(elapsed) = self.elapsed() {
            out.insert(
                "execution_time_ms".to_string(),
                json!(elapsed.as_millis() as u64),
            );
        }
        Value::Object(out)
    }

    /// Print a human-readable summary to stdout.
    pub fn print(&self) {
        println!("\n========== Pipeline Metrics ==========");
        if let Some(elapsed) = self.elapsed() {
            println!(
                "Execution Time: {:.3}s ({} ms)",
                elapsed.as_secs_f64(),
                elapsed.as_millis()
            );
            println!("--------------------------------------");
        }
        for (name, s) in self.snapshot() {
            println!(
                "{name}: R={} I={} O={} W={} E={}",
                s.read, s.input, s.output, s.written, s.rejected
            );
        }
        println!("======================================\n");
    }

    /// Save [`to_json`](Self::to_json) output to `path`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or written.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let formatted = serde_json::to_string_pretty(&self.to_json())?;
        let mut file = File::create(path).with_context(|| format!("create {}", path.display()))?;
        file.write_all(formatted.as_bytes())
            .with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }
}
