//! Thread-per-stage execution of a [`Pipeline`].
//!
//! The runner initializes stages in insertion order, threading each stage's
//! output shape into the stages it feeds, then gives every stage its own
//! named OS thread. A stage thread ticks [`Stage::process`] until the stage
//! finishes, fails or is cancelled, disposes it, marks its outputs done and
//! abandons its inputs. A failed stage therefore lets downstream stages drain
//! what it already emitted, while upstream producers see their next `put`
//! cancelled and shut down cleanly. Only the pipeline's stop signal cancels
//! every stage at once.

use crate::error::{QueueError, is_cancelled};
use crate::metrics::StageSnapshot;
use crate::pipeline::{Pipeline, StageEntry};
use crate::row::RowShape;
use crate::stage::{Stage, StageContext, StageStatus};
use crate::validation::RowError;
use anyhow::{Context, Result, anyhow, bail};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// How one stage's thread ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StageOutcome {
    Completed,
    Cancelled,
    Failed(String),
}

#[derive(Clone, Debug)]
pub struct StageReport {
    pub name: String,
    pub outcome: StageOutcome,
    pub metrics: StageSnapshot,
}

/// Row traffic through one queue between two stages.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionReport {
    pub from: String,
    pub to: String,
    pub rows_put: u64,
    pub rows_taken: u64,
}

impl ConnectionReport {
    /// Rows enqueued but never read, e.g. after the consumer failed.
    #[must_use]
    pub fn rows_dropped(&self) -> u64 {
        self.rows_put.saturating_sub(self.rows_taken)
    }
}

/// Summary of a run that did not fail.
#[derive(Clone, Debug)]
pub struct RunReport {
    pub stages: Vec<StageReport>,
    pub connections: Vec<ConnectionReport>,
    pub row_errors: Vec<RowError>,
    pub elapsed: Duration,
}

impl RunReport {
    #[must_use]
    pub fn stage(&self, name: &str) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// `true` if any stage stopped on a cancellation instead of finishing.
    #[must_use]
    pub fn was_cancelled(&self) -> bool {
        self.stages
            .iter()
            .any(|s| s.outcome == StageOutcome::Cancelled)
    }
}

/// Executes pipelines.
#[derive(Clone, Debug)]
pub struct Runner {
    /// Prefix of every stage thread name.
    pub thread_prefix: String,
}

impl Default for Runner {
    fn default() -> Self {
        Self {
            thread_prefix: "stage-".to_string(),
        }
    }
}

impl Runner {
    /// Run `pipeline` until every stage has ended.
    ///
    /// A cancelled run is not an error; check [`RunReport::was_cancelled`].
    /// Configured error and metrics files are written in every case once the
    /// stages have started.
    ///
    /// # Errors
    /// If a stage fails to initialize, or any stage fails or panics while
    /// running. The error names the first failing stage.
    pub fn run(&self, pipeline: Pipeline) -> Result<RunReport> {
        let Pipeline {
            config,
            mut stages,
            stop,
            metrics,
            errors,
            connections,
            ..
        } = pipeline;

        init_stages(&mut stages)?;
        let names: Vec<String> = stages.iter().map(|s| s.name.clone()).collect();

        info!(stages = stages.len(), "pipeline starting");
        metrics.record_start();
        let outcomes: Vec<(String, StageOutcome)> = thread::scope(|scope| {
            let mut handles = Vec::with_capacity(stages.len());
            for entry in stages {
                let StageEntry {
                    name,
                    mut stage,
                    router,
                    ..
                } = entry;
                let ctx = StageContext::new(
                    name.clone(),
                    router,
                    metrics.stage(&name),
                    errors.clone(),
                    stop.clone(),
                );
                let spawned = thread::Builder::new()
                    .name(format!("{}{name}", self.thread_prefix))
                    .spawn_scoped(scope, move || run_stage(stage.as_mut(), ctx));
                match spawned {
                    Ok(handle) => handles.push((name, Ok(handle))),
                    Err(e) => {
                        error!(stage = %name, "cannot spawn stage thread: {e}");
                        stop.stop();
                        handles.push((name, Err(e)));
                    }
                }
            }
            handles
                .into_iter()
                .map(|(name, handle)| {
                    let outcome = match handle {
                        Ok(h) => h
                            .join()
                            .unwrap_or_else(|p| StageOutcome::Failed(panic_message(p.as_ref()))),
                        Err(e) => StageOutcome::Failed(format!("spawn failed: {e}")),
                    };
                    (name, outcome)
                })
                .collect()
        });
        metrics.record_end();

        let snapshots = metrics.snapshot();
        let report = RunReport {
            stages: outcomes
                .into_iter()
                .map(|(name, outcome)| {
                    let metrics = snapshots
                        .iter()
                        .find(|(n, _)| *n == name)
                        .map(|(_, s)| *s)
                        .unwrap_or_default();
                    StageReport {
                        name,
                        outcome,
                        metrics,
                    }
                })
                .collect(),
            connections: connections
                .iter()
                .map(|(from, to, queue)| ConnectionReport {
                    from: names[from.index()].clone(),
                    to: names[to.index()].clone(),
                    rows_put: queue.rows_put(),
                    rows_taken: queue.rows_taken(),
                })
                .collect(),
            row_errors: errors.errors(),
            elapsed: metrics.elapsed().unwrap_or_default(),
        };

        for c in report.connections.iter().filter(|c| c.rows_dropped() > 0) {
            debug!(from = %c.from, to = %c.to, dropped = c.rows_dropped(), "rows left unread");
        }

        if let Some(path) = &config.error_file {
            errors.write_to_file(path)?;
        }
        if let Some(path) = &config.metrics_file {
            metrics.save_to_file(path)?;
        }

        if let Some(failed) = report.stages.iter().find_map(|s| match &s.outcome {
            StageOutcome::Failed(msg) => Some((s.name.as_str(), msg)),
            _ => None,
        }) {
            bail!("stage {} failed: {}", failed.0, failed.1);
        }
        info!(
            elapsed_ms = report.elapsed.as_millis() as u64,
            rejected = report.row_errors.len(),
            cancelled = report.was_cancelled(),
            "pipeline finished"
        );
        Ok(report)
    }
}

fn init_stages(stages: &mut [StageEntry]) -> Result<()> {
    let mut shapes: Vec<RowShape> = Vec::with_capacity(stages.len());
    for entry in stages.iter_mut() {
        let input = input_shape(entry, &shapes)?;
        let output = entry
            .stage
            .init(&input)
            .with_context(|| format!("initialize stage {}", entry.name))?;
        debug!(stage = %entry.name, fields = output.len(), "stage initialized");
        shapes.push(output);
    }
    Ok(())
}

fn input_shape(entry: &StageEntry, shapes: &[RowShape]) -> Result<RowShape> {
    let mut inputs = entry.inputs.iter().map(|id| &shapes[id.index()]);
    let Some(first) = inputs.next() else {
        return Ok(RowShape::default());
    };
    if inputs.any(|s| s != first) {
        return Err(anyhow!(
            "stage {} receives rows of different shapes",
            entry.name
        ));
    }
    Ok(first.clone())
}

fn run_stage(stage: &mut dyn Stage, mut ctx: StageContext) -> StageOutcome {
    debug!(stage = %ctx.name(), "stage started");
    let ticked = panic::catch_unwind(AssertUnwindSafe(|| tick(stage, &mut ctx)));
    let mut outcome = match ticked {
        Ok(Ok(())) => StageOutcome::Completed,
        Ok(Err(e)) if is_cancelled(&e) => StageOutcome::Cancelled,
        Ok(Err(e)) => StageOutcome::Failed(format!("{e:#}")),
        Err(p) => StageOutcome::Failed(panic_message(p.as_ref())),
    };
    if let StageOutcome::Failed(msg) = &outcome {
        error!(stage = %ctx.name(), "stage failed: {msg}");
    }

    match panic::catch_unwind(AssertUnwindSafe(|| stage.dispose(&mut ctx))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            warn!(stage = %ctx.name(), "dispose failed: {e:#}");
            if outcome == StageOutcome::Completed {
                outcome = StageOutcome::Failed(format!("dispose: {e:#}"));
            }
        }
        Err(p) => {
            outcome = StageOutcome::Failed(panic_message(p.as_ref()));
        }
    }
    ctx.mark_outputs_done();
    ctx.abandon_inputs();
    debug!(stage = %ctx.name(), ?outcome, "stage ended");
    outcome
}

fn tick(stage: &mut dyn Stage, ctx: &mut StageContext) -> Result<()> {
    loop {
        if ctx.is_stopped() {
            return Err(QueueError::Cancelled.into());
        }
        match stage.process(ctx)? {
            StageStatus::Continue => {}
            StageStatus::Finished => return Ok(()),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}
