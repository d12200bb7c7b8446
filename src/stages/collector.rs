//! Sink stage that keeps every row it receives in memory.

use crate::row::{Row, RowShape};
use crate::stage::{Stage, StageContext, StageStatus};
use anyhow::Result;
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Default)]
struct Collected {
    shape: RowShape,
    rows: Vec<Row>,
}

/// Read side of a [`RowCollector`], usable after (or during) a run.
#[derive(Clone, Default)]
pub struct CollectedRows {
    inner: Arc<Mutex<Collected>>,
}

impl CollectedRows {
    /// Copy of the rows collected so far, in arrival order.
    #[must_use]
    pub fn rows(&self) -> Vec<Row> {
        self.inner.lock().rows.clone()
    }

    /// Take the collected rows, leaving the handle empty.
    pub fn take(&self) -> Vec<Row> {
        std::mem::take(&mut self.inner.lock().rows)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Shape of the inbound rows, known once the pipeline has initialized.
    #[must_use]
    pub fn shape(&self) -> RowShape {
        self.inner.lock().shape.clone()
    }
}

/// Drains its inputs into a [`CollectedRows`] handle.
pub struct RowCollector {
    sink: CollectedRows,
}

impl RowCollector {
    /// A collector and the handle that reads what it gathers.
    pub fn new() -> (Self, CollectedRows) {
        let sink = CollectedRows::default();
        (Self { sink: sink.clone() }, sink)
    }
}

impl Stage for RowCollector {
    fn init(&mut self, input: &RowShape) -> Result<RowShape> {
        self.sink.inner.lock().shape = input.clone();
        Ok(input.clone())
    }

    fn process(&mut self, ctx: &mut StageContext) -> Result<StageStatus> {
        match ctx.get_row()? {
            Some(row) => {
                self.sink.inner.lock().rows.push(row.clone());
                ctx.put_row(row)?;
                Ok(StageStatus::Continue)
            }
            None => Ok(StageStatus::Finished),
        }
    }
}
