//! The stage contract between the runner and processing logic.
//!
//! A [`Stage`] is an independently scheduled processing unit. The runner gives
//! each stage its own thread and a [`StageContext`] holding the stage's queue
//! wiring, counters and error sink, then calls [`Stage::process`] once per
//! tick until the stage reports [`StageStatus::Finished`]. When a stage
//! finishes (or fails, or is cancelled) the runner marks every output queue
//! done exactly once and abandons the input queues it no longer reads.

use crate::error::{ConversionError, QueueError, TokenizeError};
use crate::metrics::StageMetrics;
use crate::queue::StopSignal;
use crate::row::{Row, RowShape};
use crate::router::RowRouter;
use crate::validation::{ErrorMode, RowError, RowErrorCollector};
use anyhow::Result;

/// What a stage wants after one tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StageStatus {
    /// Call `process` again.
    Continue,
    /// No more work; outputs will be marked done.
    Finished,
}

/// A pipeline processing unit.
pub trait Stage: Send {
    /// Prepare for a run and return the shape of the rows this stage emits.
    ///
    /// `input` is the shape arriving on the inbound queues (empty for source
    /// stages). The default passes it through unchanged.
    ///
    /// # Errors
    /// Configuration problems that make the stage unusable.
    fn init(&mut self, input: &RowShape) -> Result<RowShape> {
        Ok(input.clone())
    }

    /// Do one unit of work.
    ///
    /// # Errors
    /// Any error fails the stage and the run, except a wrapped
    /// [`QueueError::Cancelled`], which is a clean shutdown. Rows already
    /// emitted still reach downstream stages.
    fn process(&mut self, ctx: &mut StageContext) -> Result<StageStatus>;

    /// Release resources after the last tick, whether or not the run succeeded.
    ///
    /// # Errors
    /// Failures flushing or closing outputs.
    fn dispose(&mut self, _ctx: &mut StageContext) -> Result<()> {
        Ok(())
    }
}

/// Per-stage runtime state handed to [`Stage::process`].
pub struct StageContext {
    name: String,
    router: RowRouter,
    metrics: StageMetrics,
    errors: RowErrorCollector,
    stop: StopSignal,
}

impl StageContext {
    pub fn new(
        name: impl Into<String>,
        router: RowRouter,
        metrics: StageMetrics,
        errors: RowErrorCollector,
        stop: StopSignal,
    ) -> Self {
        Self {
            name: name.into(),
            router,
            metrics,
            errors,
            stop,
        }
    }

    /// A context with no queues, fresh counters and a private stop signal.
    pub fn detached(name: impl Into<String>) -> Self {
        Self::new(
            name,
            RowRouter::new(),
            StageMetrics::new(),
            RowErrorCollector::new(),
            StopSignal::new(),
        )
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn metrics(&self) -> &StageMetrics {
        &self.metrics
    }

    #[must_use]
    pub fn errors(&self) -> &RowErrorCollector {
        &self.errors
    }

    #[must_use]
    pub fn router(&self) -> &RowRouter {
        &self.router
    }

    pub fn router_mut(&mut self) -> &mut RowRouter {
        &mut self.router
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stop.is_stopped()
    }

    /// Next inbound row, or `None` once every input is exhausted.
    ///
    /// # Errors
    /// [`QueueError::Cancelled`] on a stop request.
    pub fn get_row(&mut self) -> Result<Option<Row>, QueueError> {
        let row = self.router.receive()?;
        if row.is_some() {
            self.metrics.add_input(1);
        }
        Ok(row)
    }

    /// Send a row to every output.
    ///
    /// # Errors
    /// Propagates the destination queue's error.
    pub fn put_row(&mut self, row: Row) -> Result<(), QueueError> {
        self.router.send(row)?;
        self.metrics.add_output(1);
        Ok(())
    }

    /// Apply `mode` to a row that failed conversion.
    ///
    /// # Errors
    /// Under [`ErrorMode::FailFast`], the conversion error itself.
    pub fn reject(&self, mode: ErrorMode, err: ConversionError) -> Result<()> {
        self.metrics.add_rejected(1);
        match mode {
            ErrorMode::SkipInvalid => Ok(()),
            ErrorMode::LogAndContinue => {
                tracing::warn!(stage = %self.name, line = err.line, field = %err.field, "rejected row: {}", err.reason);
                self.errors.add(&self.name, &err);
                Ok(())
            }
            ErrorMode::FailFast => Err(err.into()),
        }
    }

    /// Handle an input that cannot be read past `err`.
    ///
    /// Counts one rejected row and, like [`reject`](Self::reject), drops,
    /// logs or fails according to `mode`.
    ///
    /// # Errors
    /// `err` itself under [`ErrorMode::FailFast`].
    pub fn reject_input(&self, mode: ErrorMode, input: &str, err: TokenizeError) -> Result<()> {
        self.metrics.add_rejected(1);
        match mode {
            ErrorMode::SkipInvalid => Ok(()),
            ErrorMode::LogAndContinue => {
                tracing::warn!(stage = %self.name, input = %input, "rest of input skipped: {err}");
                self.errors.push(RowError {
                    stage: self.name.clone(),
                    line: err.line(),
                    field_index: 0,
                    field: String::new(),
                    value: input.to_string(),
                    message: err.to_string(),
                });
                Ok(())
            }
            ErrorMode::FailFast => {
                Err(anyhow::Error::new(err).context(format!("read {input}")))
            }
        }
    }

    pub(crate) fn mark_outputs_done(&self) {
        self.router.mark_outputs_done();
    }

    pub(crate) fn abandon_inputs(&self) {
        self.router.abandon_inputs();
    }
}
