//! Bounded row transport between pipeline stages.
//!
//! A [`RowQueue`] connects exactly one producing stage to one or more consuming
//! stages. It is the only shared-memory surface between stages, and its
//! capacity is the pipeline's backpressure mechanism: a fast producer blocks in
//! [`RowQueue::put`] instead of growing memory without bound.
//!
//! # Reads
//!
//! - [`get_blocking`](RowQueue::get_blocking) waits for a row or end of stream.
//! - [`get_timeout`](RowQueue::get_timeout) waits at most a bounded duration.
//! - [`get_immediate`](RowQueue::get_immediate) never waits.
//!
//! A consumer must only treat "empty **and** done" as end of stream. Rows queued
//! before [`mark_done`](RowQueue::mark_done) stay drainable.
//!
//! # Cancellation
//!
//! Every queue is registered with a [`StopSignal`]. Firing the signal wakes all
//! blocked `put`/`get_*` calls on every registered queue, which then return
//! [`QueueError::Cancelled`]. No lock is held across a wait, so a full queue and
//! a shutdown request cannot deadlock each other.

use crate::error::QueueError;
use crate::row::Row;
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

/// Default number of rows a pipeline connection buffers.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

/// How many rows a [`RowQueue`] may hold before `put` blocks.
///
/// `Unbounded` disables backpressure entirely; it exists for small synchronous
/// tests and single-threaded embedding, and must be chosen explicitly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capacity {
    Bounded(usize),
    Unbounded,
}

impl Default for Capacity {
    fn default() -> Self {
        Capacity::Bounded(DEFAULT_QUEUE_CAPACITY)
    }
}

impl Capacity {
    fn limit(self) -> Option<usize> {
        match self {
            // Pipelines reject zero; a standalone zero-sized queue holds one row.
            Capacity::Bounded(n) => Some(n.max(1)),
            Capacity::Unbounded => None,
        }
    }
}

/// Outcome of a non-blocking or timed read.
#[derive(Clone, Debug, PartialEq)]
pub enum Recv {
    /// A row was dequeued.
    Row(Row),
    /// Nothing queued yet; the producer has not finished.
    Empty,
    /// The timed wait elapsed without a row or end of stream.
    TimedOut,
    /// The queue is empty and the producer marked it done.
    Done,
}

impl Recv {
    /// Take the row out, if this is [`Recv::Row`].
    #[must_use]
    pub fn into_row(self) -> Option<Row> {
        match self {
            Recv::Row(r) => Some(r),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        matches!(self, Recv::Done)
    }
}

/// Pipeline-wide stop request shared by all queues of one run.
///
/// Cloning yields another handle to the same signal.
#[derive(Clone, Default)]
pub struct StopSignal {
    inner: Arc<StopInner>,
}

#[derive(Default)]
struct StopInner {
    stopped: AtomicBool,
    queues: Mutex<Vec<Weak<Shared>>>,
}

impl StopSignal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop and wake every waiter on every registered queue.
    pub fn stop(&self) {
        self.inner.stopped.store(true, Ordering::SeqCst);
        let live: Vec<Arc<Shared>> = {
            let mut queues = self.inner.queues.lock();
            queues.retain(|q| q.strong_count() > 0);
            queues.iter().filter_map(Weak::upgrade).collect()
        };
        for shared in live {
            // Taking the queue lock orders this wake-up after any waiter's flag check.
            let _state = shared.state.lock();
            shared.not_empty.notify_all();
            shared.not_full.notify_all();
        }
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    fn register(&self, shared: &Arc<Shared>) {
        let mut queues = self.inner.queues.lock();
        queues.retain(|q| q.strong_count() > 0);
        queues.push(Arc::downgrade(shared));
    }
}

impl fmt::Debug for StopSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StopSignal")
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

struct State {
    rows: VecDeque<Row>,
    done: bool,
    /// The consumer stopped reading; further rows are dropped.
    abandoned: bool,
}

struct Shared {
    state: Mutex<State>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: Capacity,
    stop: StopSignal,
    rows_put: AtomicU64,
    rows_taken: AtomicU64,
}

impl Shared {
    fn full(&self, state: &State) -> bool {
        self.capacity
            .limit()
            .is_some_and(|limit| state.rows.len() >= limit)
    }

    fn pop(&self, state: &mut State) -> Option<Row> {
        let row = state.rows.pop_front()?;
        self.rows_taken.fetch_add(1, Ordering::Relaxed);
        self.not_full.notify_one();
        Some(row)
    }
}

/// Thread-safe FIFO of rows with a done flag. Cheap to clone; clones share
/// the same queue.
#[derive(Clone)]
pub struct RowQueue {
    shared: Arc<Shared>,
}

impl RowQueue {
    /// Create a queue with its own, private stop signal.
    #[must_use]
    pub fn new(capacity: Capacity) -> Self {
        Self::with_stop(capacity, &StopSignal::new())
    }

    /// Create a bounded queue holding at most `capacity` rows (minimum 1).
    #[must_use]
    pub fn bounded(capacity: usize) -> Self {
        Self::new(Capacity::Bounded(capacity))
    }

    #[must_use]
    pub fn unbounded() -> Self {
        Self::new(Capacity::Unbounded)
    }

    /// Create a queue whose blocking waits are interrupted by `stop`.
    #[must_use]
    pub fn with_stop(capacity: Capacity, stop: &StopSignal) -> Self {
        let initial = capacity.limit().unwrap_or(0).min(1024);
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                rows: VecDeque::with_capacity(initial),
                done: false,
                abandoned: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
            stop: stop.clone(),
            rows_put: AtomicU64::new(0),
            rows_taken: AtomicU64::new(0),
        });
        stop.register(&shared);
        Self { shared }
    }

    /// Enqueue `row`, blocking while the queue is full.
    ///
    /// # Errors
    /// [`QueueError::Closed`] if the queue was already marked done;
    /// [`QueueError::Cancelled`] if a stop was requested while waiting for room
    /// or the consumer [abandoned](Self::abandon) the queue.
    pub fn put(&self, row: Row) -> Result<(), QueueError> {
        let shared = &*self.shared;
        let mut state = shared.state.lock();
        if state.done {
            return Err(QueueError::Closed);
        }
        loop {
            if state.abandoned {
                return Err(QueueError::Cancelled);
            }
            if !shared.full(&state) {
                break;
            }
            if shared.stop.is_stopped() {
                return Err(QueueError::Cancelled);
            }
            shared.not_full.wait(&mut state);
            if state.done {
                return Err(QueueError::Closed);
            }
        }
        state.rows.push_back(row);
        shared.rows_put.fetch_add(1, Ordering::Relaxed);
        shared.not_empty.notify_one();
        Ok(())
    }

    /// Wait for the next row. `Ok(None)` means end of stream.
    ///
    /// # Errors
    /// [`QueueError::Cancelled`] if a stop was requested while waiting.
    pub fn get_blocking(&self) -> Result<Option<Row>, QueueError> {
        let shared = &*self.shared;
        let mut state = shared.state.lock();
        loop {
            if let Some(row) = shared.pop(&mut state) {
                return Ok(Some(row));
            }
            if state.done {
                return Ok(None);
            }
            if shared.stop.is_stopped() {
                return Err(QueueError::Cancelled);
            }
            shared.not_empty.wait(&mut state);
        }
    }

    /// Wait at most `timeout` for the next row.
    ///
    /// A zero timeout behaves exactly like [`get_immediate`](Self::get_immediate).
    ///
    /// # Errors
    /// [`QueueError::Cancelled`] if a stop was requested while waiting.
    pub fn get_timeout(&self, timeout: Duration) -> Result<Recv, QueueError> {
        if timeout.is_zero() {
            return Ok(self.get_immediate());
        }
        let deadline = Instant::now() + timeout;
        let shared = &*self.shared;
        let mut state = shared.state.lock();
        loop {
            if let Some(row) = shared.pop(&mut state) {
                return Ok(Recv::Row(row));
            }
            if state.done {
                return Ok(Recv::Done);
            }
            if shared.stop.is_stopped() {
                return Err(QueueError::Cancelled);
            }
            if shared
                .not_empty
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                return Ok(match shared.pop(&mut state) {
                    Some(row) => Recv::Row(row),
                    None if state.done => Recv::Done,
                    None => Recv::TimedOut,
                });
            }
        }
    }

    /// Dequeue a row if one is available; never blocks.
    #[must_use]
    pub fn get_immediate(&self) -> Recv {
        let shared = &*self.shared;
        let mut state = shared.state.lock();
        match shared.pop(&mut state) {
            Some(row) => Recv::Row(row),
            None if state.done => Recv::Done,
            None => Recv::Empty,
        }
    }

    /// Signal that no further rows will be enqueued. Repeated calls are no-ops.
    pub fn mark_done(&self) {
        let shared = &*self.shared;
        let mut state = shared.state.lock();
        if state.done {
            return;
        }
        state.done = true;
        shared.not_empty.notify_all();
        shared.not_full.notify_all();
    }

    /// Called by the consumer when it will read no more rows: queued rows are
    /// dropped and every current or later `put` returns
    /// [`QueueError::Cancelled`]. Repeated calls are no-ops.
    pub fn abandon(&self) {
        let shared = &*self.shared;
        let mut state = shared.state.lock();
        if state.abandoned {
            return;
        }
        state.abandoned = true;
        state.rows.clear();
        shared.not_full.notify_all();
    }

    #[must_use]
    pub fn is_abandoned(&self) -> bool {
        self.shared.state.lock().abandoned
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.shared.state.lock().done
    }

    /// Number of rows currently queued. A snapshot; may be stale on return.
    #[must_use]
    pub fn size(&self) -> usize {
        self.shared.state.lock().rows.len()
    }

    /// Whether the queue is at capacity. A snapshot; may be stale on return.
    #[must_use]
    pub fn is_full(&self) -> bool {
        let state = self.shared.state.lock();
        self.shared.full(&state)
    }

    #[must_use]
    pub fn capacity(&self) -> Capacity {
        self.shared.capacity
    }

    /// Total rows ever enqueued.
    #[must_use]
    pub fn rows_put(&self) -> u64 {
        self.shared.rows_put.load(Ordering::Relaxed)
    }

    /// Total rows ever dequeued.
    #[must_use]
    pub fn rows_taken(&self) -> u64 {
        self.shared.rows_taken.load(Ordering::Relaxed)
    }

    /// The stop signal this queue listens to.
    #[must_use]
    pub fn stop_signal(&self) -> &StopSignal {
        &self.shared.stop
    }

    /// Whether two handles refer to the same queue.
    #[must_use]
    pub fn same_queue(&self, other: &RowQueue) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl fmt::Debug for RowQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("RowQueue")
            .field("capacity", &self.shared.capacity)
            .field("size", &state.rows.len())
            .field("done", &state.done)
            .finish()
    }
}
