//! Pipeline wiring: named stages connected by row queues.
//!
//! Stages are added in order and connected with explicit
//! [`Pipeline::connect`] calls from an earlier stage to a later one, so the
//! insertion order is always a valid start-up order. There is no graph
//! compiler; what you wire is what runs.

use crate::changed::{ChangeFlag, ListenerId};
use crate::config::PipelineConfig;
use crate::metrics::MetricsCollector;
use crate::queue::{Capacity, RowQueue, StopSignal};
use crate::router::{Distribution, RowRouter};
use crate::runner::{RunReport, Runner};
use crate::stage::Stage;
use crate::validation::RowErrorCollector;
use anyhow::{Result, bail, ensure};

/// Handle of a stage within one [`Pipeline`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct StageId(usize);

impl StageId {
    /// Position of the stage in insertion order.
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Wiring change announced to [`Pipeline::on_change`] listeners.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PipelineEvent {
    StageAdded { id: StageId, name: String },
    Connected { from: StageId, to: StageId },
}

pub(crate) struct StageEntry {
    pub(crate) name: String,
    pub(crate) stage: Box<dyn Stage>,
    pub(crate) router: RowRouter,
    pub(crate) inputs: Vec<StageId>,
}

/// A set of stages and the queues between them, ready to [`run`](Self::run).
pub struct Pipeline {
    pub(crate) config: PipelineConfig,
    pub(crate) stages: Vec<StageEntry>,
    pub(crate) stop: StopSignal,
    pub(crate) metrics: MetricsCollector,
    pub(crate) errors: RowErrorCollector,
    pub(crate) connections: Vec<(StageId, StageId, RowQueue)>,
    changed: ChangeFlag<PipelineEvent>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            stages: Vec::new(),
            stop: StopSignal::new(),
            metrics: MetricsCollector::new(),
            errors: RowErrorCollector::new(),
            connections: Vec::new(),
            changed: ChangeFlag::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Add a stage under a unique name.
    ///
    /// # Errors
    /// If the name is empty, contains a NUL byte or is already taken.
    pub fn add_stage(&mut self, name: impl Into<String>, stage: Box<dyn Stage>) -> Result<StageId> {
        let name = name.into();
        ensure!(
            !name.is_empty() && !name.contains('\0'),
            "invalid stage name {name:?}"
        );
        if self.stages.iter().any(|s| s.name == name) {
            bail!("duplicate stage name {name:?}");
        }
        let id = StageId(self.stages.len());
        self.stages.push(StageEntry {
            name: name.clone(),
            stage,
            router: RowRouter::new().with_max_backoff(self.config.max_backoff()),
            inputs: Vec::new(),
        });
        tracing::debug!(stage = %name, "stage added");
        self.announce(PipelineEvent::StageAdded { id, name });
        Ok(id)
    }

    /// Connect `from` to `to` with a queue of the configured default capacity.
    ///
    /// # Errors
    /// See [`connect_with_capacity`](Self::connect_with_capacity).
    pub fn connect(&mut self, from: StageId, to: StageId) -> Result<RowQueue> {
        self.connect_with_capacity(from, to, self.config.queue_capacity)
    }

    /// Connect `from` to `to` with a queue of the given capacity and return
    /// a handle to that queue.
    ///
    /// # Errors
    /// If either id is unknown, `from` was not added before `to`, or the
    /// capacity is `Bounded(0)`.
    pub fn connect_with_capacity(
        &mut self,
        from: StageId,
        to: StageId,
        capacity: Capacity,
    ) -> Result<RowQueue> {
        self.check(from)?;
        self.check(to)?;
        ensure!(
            capacity != Capacity::Bounded(0),
            "queue capacity must be at least 1"
        );
        ensure!(
            from < to,
            "cannot connect {} to {}: stages must be connected in insertion order",
            self.stages[from.0].name,
            self.stages[to.0].name
        );
        let queue = RowQueue::with_stop(capacity, &self.stop);
        self.stages[from.0].router.add_output(queue.clone());
        let target = &mut self.stages[to.0];
        target.router.add_input(queue.clone());
        target.inputs.push(from);
        self.connections.push((from, to, queue.clone()));
        tracing::debug!(
            from = %self.stages[from.0].name,
            to = %self.stages[to.0].name,
            ?capacity,
            "stages connected"
        );
        self.announce(PipelineEvent::Connected { from, to });
        Ok(queue)
    }

    /// How `id` spreads rows over its outputs.
    ///
    /// # Errors
    /// If `id` is unknown.
    pub fn set_distribution(&mut self, id: StageId, distribution: Distribution) -> Result<()> {
        self.check(id)?;
        let router = &mut self.stages[id.0].router;
        *router = std::mem::take(router).with_distribution(distribution);
        Ok(())
    }

    /// Register a listener for wiring changes; the latest listener runs first.
    pub fn on_change<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&PipelineEvent) + Send + Sync + 'static,
    {
        self.changed.add_listener(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.changed.remove_listener(id)
    }

    /// Signal that cancels a running pipeline when fired.
    #[must_use]
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    #[must_use]
    pub fn metrics(&self) -> MetricsCollector {
        self.metrics.clone()
    }

    /// Rows rejected under [`ErrorMode::LogAndContinue`](crate::validation::ErrorMode).
    #[must_use]
    pub fn errors(&self) -> RowErrorCollector {
        self.errors.clone()
    }

    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    #[must_use]
    pub fn stage_name(&self, id: StageId) -> Option<&str> {
        self.stages.get(id.0).map(|s| s.name.as_str())
    }

    /// Run every stage to completion with the default [`Runner`].
    ///
    /// # Errors
    /// See [`Runner::run`].
    pub fn run(self) -> Result<RunReport> {
        Runner::default().run(self)
    }

    fn check(&self, id: StageId) -> Result<()> {
        ensure!(id.0 < self.stages.len(), "unknown stage {id:?}");
        Ok(())
    }

    fn announce(&self, event: PipelineEvent) {
        self.changed.set_changed();
        self.changed.notify(&event);
    }
}
