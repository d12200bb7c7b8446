//! Fan-out and fan-in of rows between a stage and its queues.
//!
//! On the producer side a [`RowRouter`] delivers each row to its destination
//! queues; on the consumer side it multiplexes several source queues into one
//! stream without dedicating a thread per input.
//!
//! ```
//! use rowpipe::queue::RowQueue;
//! use rowpipe::router::RowRouter;
//! use rowpipe::row::Value;
//!
//! let a = RowQueue::unbounded();
//! let b = RowQueue::unbounded();
//! let mut producer = RowRouter::new();
//! producer.add_output(a.clone());
//! producer.add_output(b.clone());
//!
//! producer.send(vec![Value::from("x")])?;
//! producer.mark_outputs_done();
//!
//! assert_eq!(a.size(), 1);
//! assert_eq!(b.size(), 1);
//! # Ok::<(), rowpipe::error::QueueError>(())
//! ```

use crate::error::QueueError;
use crate::queue::{Recv, RowQueue};
use crate::row::Row;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upper bound of the fan-in backoff when every source is empty.
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_millis(50);

const MIN_BACKOFF: Duration = Duration::from_millis(1);

/// How a router with several destinations spreads rows across them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Distribution {
    /// Every destination receives every row.
    #[default]
    Broadcast,
    /// Each row goes to exactly one destination, in turn.
    RoundRobin,
}

/// Producer-side and consumer-side queue wiring of one stage.
#[derive(Debug)]
pub struct RowRouter {
    outputs: Vec<RowQueue>,
    distribution: Distribution,
    next_output: usize,

    inputs: Vec<RowQueue>,
    next_input: usize,
    backoff: Duration,
    max_backoff: Duration,
}

impl Default for RowRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl RowRouter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            outputs: Vec::new(),
            distribution: Distribution::Broadcast,
            next_output: 0,
            inputs: Vec::new(),
            next_input: 0,
            backoff: MIN_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
        }
    }

    #[must_use]
    pub fn with_distribution(mut self, distribution: Distribution) -> Self {
        self.distribution = distribution;
        self
    }

    /// Cap for the incremental wait used when all sources are empty.
    #[must_use]
    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff.max(MIN_BACKOFF);
        self
    }

    pub fn add_output(&mut self, queue: RowQueue) {
        self.outputs.push(queue);
    }

    pub fn add_input(&mut self, queue: RowQueue) {
        self.inputs.push(queue);
    }

    #[must_use]
    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }

    /// Number of source queues that have not yet reported end of stream.
    #[must_use]
    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    #[must_use]
    pub fn outputs(&self) -> &[RowQueue] {
        &self.outputs
    }

    /// Deliver `row` downstream.
    ///
    /// With no destinations the row is discarded. With several, `send` only
    /// returns once every destination accepted the row, so one slow branch
    /// throttles the producer.
    ///
    /// # Errors
    /// Propagates [`QueueError`] from the destination's `put`.
    pub fn send(&mut self, row: Row) -> Result<(), QueueError> {
        let fanout = self.outputs.len();
        if fanout > 1 && self.distribution == Distribution::RoundRobin {
            let idx = self.next_output % fanout;
            self.next_output = (idx + 1) % fanout;
            return self.outputs[idx].put(row);
        }
        match self.outputs.as_slice() {
            [] => Ok(()),
            [rest @ .., last] => {
                for queue in rest {
                    queue.put(row.clone())?;
                }
                last.put(row)
            }
        }
    }

    /// Mark every destination queue done. Safe to call more than once.
    pub fn mark_outputs_done(&self) {
        for queue in &self.outputs {
            queue.mark_done();
        }
    }

    /// Tell every source still open that this stage reads no more rows.
    pub fn abandon_inputs(&self) {
        for queue in &self.inputs {
            queue.abandon();
        }
    }

    /// Next row from any source queue; `Ok(None)` once every source is
    /// exhausted (empty and done).
    ///
    /// A single open source is read with a blocking wait. Several sources are
    /// polled round robin; when a whole pass finds nothing, the router waits on
    /// the current source with a doubling timeout capped at the max backoff.
    ///
    /// # Errors
    /// [`QueueError::Cancelled`] if a stop was requested while waiting.
    pub fn receive(&mut self) -> Result<Option<Row>, QueueError> {
        loop {
            match self.inputs.len() {
                0 => return Ok(None),
                1 => {
                    let row = self.inputs[0].get_blocking()?;
                    if row.is_none() {
                        self.inputs.clear();
                    }
                    return Ok(row);
                }
                _ => {}
            }

            if let Some(row) = self.poll_inputs_once() {
                self.backoff = MIN_BACKOFF;
                return Ok(Some(row));
            }
            if self.inputs.len() < 2 {
                continue;
            }

            let idx = self.next_input % self.inputs.len();
            match self.inputs[idx].get_timeout(self.backoff)? {
                Recv::Row(row) => {
                    self.next_input = (idx + 1) % self.inputs.len();
                    self.backoff = MIN_BACKOFF;
                    return Ok(Some(row));
                }
                Recv::Done => self.drop_input(idx),
                Recv::Empty | Recv::TimedOut => {
                    self.backoff = (self.backoff * 2).min(self.max_backoff);
                    self.next_input = (idx + 1) % self.inputs.len();
                }
            }
        }
    }

    /// One round-robin pass of immediate reads over all open sources.
    fn poll_inputs_once(&mut self) -> Option<Row> {
        let mut checked = 0;
        while checked < self.inputs.len() && !self.inputs.is_empty() {
            let idx = self.next_input % self.inputs.len();
            match self.inputs[idx].get_immediate() {
                Recv::Row(row) => {
                    self.next_input = (idx + 1) % self.inputs.len();
                    return Some(row);
                }
                Recv::Done => {
                    self.drop_input(idx);
                    checked = 0;
                    if self.inputs.len() < 2 {
                        return None;
                    }
                }
                Recv::Empty | Recv::TimedOut => {
                    self.next_input = (idx + 1) % self.inputs.len();
                    checked += 1;
                }
            }
        }
        None
    }

    fn drop_input(&mut self, idx: usize) {
        self.inputs.remove(idx);
        if self.inputs.is_empty() {
            self.next_input = 0;
        } else {
            self.next_input = idx % self.inputs.len();
        }
    }
}
