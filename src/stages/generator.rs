//! Source stage emitting a fixed list of rows.

use crate::row::{Row, RowShape};
use crate::stage::{Stage, StageContext, StageStatus};
use anyhow::{Result, ensure};
use std::collections::VecDeque;

/// Emits the given rows in order, one per tick, then finishes.
pub struct RowsInput {
    shape: RowShape,
    rows: VecDeque<Row>,
}

impl RowsInput {
    pub fn new(shape: RowShape, rows: Vec<Row>) -> Self {
        Self {
            shape,
            rows: rows.into(),
        }
    }
}

impl Stage for RowsInput {
    fn init(&mut self, _input: &RowShape) -> Result<RowShape> {
        let width = self.shape.len();
        ensure!(
            self.rows.iter().all(|r| r.len() == width),
            "every row must have {width} values"
        );
        Ok(self.shape.clone())
    }

    fn process(&mut self, ctx: &mut StageContext) -> Result<StageStatus> {
        match self.rows.pop_front() {
            Some(row) => {
                ctx.put_row(row)?;
                Ok(StageStatus::Continue)
            }
            None => Ok(StageStatus::Finished),
        }
    }
}
