//! # rowpipe
//!
//! A **row-oriented data-integration engine**: pipelines of independently
//! scheduled stages that exchange rows of typed values through bounded
//! queues.
//!
//! ## Key Features
//!
//! - **Bounded row queues** with blocking, timed and non-blocking reads, an
//!   end-of-stream signal and pipeline-wide cancellation
//! - **Fan-out and fan-in routing**: broadcast or round-robin distribution,
//!   round-robin merging with capped backoff
//! - **Delimited text tokenizer** with multi-character delimiters and
//!   enclosures, embedded delimiters and newlines, and doubled-enclosure escapes
//! - **Typed row assembly** with trimming, number/date/boolean conversion and
//!   per-row error handling
//! - **Thread-per-stage runner** with metrics, error collection and structured
//!   logging via `tracing`
//! - **CSV input/output stages** with glob patterns and gzip/zstd compression
//!   (optional via feature flags)
//!
//! ## Quick Start
//!
//! ```no_run
//! use rowpipe::*;
//! use rowpipe::assembler::FieldSpec;
//! use rowpipe::row::ValueType;
//! use rowpipe::stages::{CsvInput, CsvInputConfig, RowCollector};
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut p = Pipeline::default();
//! let input = p.add_stage(
//!     "read",
//!     Box::new(CsvInput::new(CsvInputConfig {
//!         path: "data/*.csv".into(),
//!         header: true,
//!         fields: vec![
//!             FieldSpec::string("name"),
//!             FieldSpec::new("amount", ValueType::Integer),
//!         ],
//!         ..Default::default()
//!     })),
//! )?;
//! let (collector, rows) = RowCollector::new();
//! let sink = p.add_stage("collect", Box::new(collector))?;
//! p.connect(input, sink)?;
//!
//! let report = p.run()?;
//! println!("{} rows in {:?}", rows.len(), report.elapsed);
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Concepts
//!
//! ### Rows and shapes
//!
//! A [`Row`] is a fixed-length vector of [`Value`]s, addressed by position.
//! Its layout is described by a shared [`RowShape`] that each stage computes
//! in [`Stage::init`].
//!
//! ### Queues
//!
//! A [`RowQueue`] connects one producer stage to one consumer. `put` blocks
//! while the queue is full, which throttles fast producers. The producer marks
//! the queue done when it finishes; consumers treat "empty and done" as the
//! end of the stream.
//!
//! ### Stages and the runner
//!
//! A [`Stage`] is ticked by the [`Runner`] on its own thread until it reports
//! [`StageStatus::Finished`]. The runner then marks the stage's outputs done,
//! so downstream stages drain what it emitted, and abandons its inputs, so
//! upstream producers stop. Firing the pipeline's [`StopSignal`] wakes every
//! blocked queue operation with [`QueueError::Cancelled`].
//!
//! ## Feature Flags
//!
//! - `io-csv` (default): [`stages::CsvOutput`] via the `csv` crate
//! - `compression-gzip` (default): `.gz` input and output via `flate2`
//! - `compression-zstd` (default): `.zst` input and output via `zstd`

pub mod assembler;
pub mod changed;
pub mod config;
pub mod error;
pub mod io;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod queue;
pub mod router;
pub mod row;
pub mod runner;
pub mod stage;
pub mod stages;
pub mod testing;
pub mod tokenizer;
pub mod validation;

pub use assembler::{FieldSpec, RowAssembler, TrimType};
pub use config::{PipelineConfig, load_json_config};
pub use error::{AssembleError, ConversionError, QueueError, TokenizeError};
pub use pipeline::{Pipeline, PipelineEvent, StageId};
pub use queue::{Capacity, Recv, RowQueue, StopSignal};
pub use router::{Distribution, RowRouter};
pub use row::{FieldMeta, Row, RowShape, Value, ValueType};
pub use runner::{ConnectionReport, RunReport, Runner, StageOutcome, StageReport};
pub use stage::{Stage, StageContext, StageStatus};
pub use tokenizer::{DelimitedLineTokenizer, TokenizedRow, TokenizerConfig};
pub use validation::{ErrorMode, RowError, RowErrorCollector};
