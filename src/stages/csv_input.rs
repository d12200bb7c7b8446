//! Delimited text input stage.
//!
//! Reads one or more files (a path or a glob pattern, optionally compressed),
//! or an in-memory text, through a [`DelimitedLineTokenizer`] and a
//! [`RowAssembler`], emitting one row per tick. An input that ends inside an
//! open enclosure is rejected from that point on, like a bad row, and the
//! stage moves on to the next file.

use crate::assembler::{FieldSpec, RowAssembler};
use crate::error::TokenizeError;
use crate::io::compression::{InputStream, open_input};
use crate::io::glob::resolve_inputs;
use crate::row::RowShape;
use crate::stage::{Stage, StageContext, StageStatus};
use crate::tokenizer::{DelimitedLineTokenizer, ReaderChars, TokenizerConfig};
use crate::validation::ErrorMode;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::io::Cursor;
use std::path::PathBuf;

/// Settings of a [`CsvInput`] stage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvInputConfig {
    /// File path or glob pattern.
    pub path: String,
    #[serde(flatten)]
    pub tokens: TokenizerConfig,
    /// Skip the first record of every file.
    pub header: bool,
    pub fields: Vec<FieldSpec>,
    pub filename_field: Option<String>,
    pub row_number_field: Option<String>,
    pub error_mode: ErrorMode,
}

impl Default for CsvInputConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            tokens: TokenizerConfig::default(),
            header: false,
            fields: Vec::new(),
            filename_field: None,
            row_number_field: None,
            error_mode: ErrorMode::default(),
        }
    }
}

enum Source {
    Files,
    Text(Option<String>),
}

type Scanner = DelimitedLineTokenizer<ReaderChars<InputStream>>;

/// Source stage turning delimited text into typed rows.
pub struct CsvInput {
    config: CsvInputConfig,
    source: Source,
    pending: VecDeque<PathBuf>,
    assembler: RowAssembler,
    scanner: Option<Scanner>,
    current_name: String,
    skip_header: bool,
}

impl CsvInput {
    /// Read the files named by `config.path`.
    pub fn new(config: CsvInputConfig) -> Self {
        Self::build(config, Source::Files)
    }

    /// Read `text` instead of files; `config.path` is only used as the
    /// filename field value.
    pub fn from_text(text: impl Into<String>, config: CsvInputConfig) -> Self {
        Self::build(config, Source::Text(Some(text.into())))
    }

    fn build(config: CsvInputConfig, source: Source) -> Self {
        let mut assembler = RowAssembler::new(config.fields.clone());
        if let Some(name) = &config.filename_field {
            assembler = assembler.with_filename_field(name.clone());
        }
        if let Some(name) = &config.row_number_field {
            assembler = assembler.with_row_number_field(name.clone());
        }
        Self {
            config,
            source,
            pending: VecDeque::new(),
            assembler,
            scanner: None,
            current_name: String::new(),
            skip_header: false,
        }
    }

    /// Start scanning the next input; `false` when none is left.
    fn open_next(&mut self) -> Result<bool> {
        let (name, stream): (String, InputStream) = match &mut self.source {
            Source::Text(text) => match text.take() {
                Some(t) => (
                    self.config.path.clone(),
                    Box::new(Cursor::new(t.into_bytes())) as InputStream,
                ),
                None => return Ok(false),
            },
            Source::Files => match self.pending.pop_front() {
                Some(path) => {
                    let stream = open_input(&path)?;
                    (path.display().to_string(), stream)
                }
                None => return Ok(false),
            },
        };
        tracing::debug!(input = %name, "opening input");
        self.scanner = Some(DelimitedLineTokenizer::from_reader(stream, &self.config.tokens)?);
        self.assembler.set_filename(name.clone());
        self.current_name = name;
        self.skip_header = self.config.header;
        Ok(true)
    }
}

impl Stage for CsvInput {
    fn init(&mut self, _input: &RowShape) -> Result<RowShape> {
        self.config.tokens.validate()?;
        if let Source::Files = self.source {
            self.pending = resolve_inputs(&self.config.path)?.into();
        }
        Ok(self.assembler.shape().clone())
    }

    fn process(&mut self, ctx: &mut StageContext) -> Result<StageStatus> {
        loop {
            let Some(scanner) = self.scanner.as_mut() else {
                if !self.open_next()? {
                    return Ok(StageStatus::Finished);
                }
                continue;
            };
            let record = match scanner.next() {
                None => {
                    self.scanner = None;
                    continue;
                }
                Some(Ok(record)) => record,
                Some(Err(err @ TokenizeError::UnterminatedEnclosure { .. })) => {
                    // The rest of this input is unusable; rows before it stand.
                    self.scanner = None;
                    ctx.reject_input(self.config.error_mode, &self.current_name, err)?;
                    continue;
                }
                Some(Err(err)) => {
                    return Err(err).with_context(|| format!("read {}", self.current_name));
                }
            };
            ctx.metrics().add_read(1);
            if self.skip_header {
                self.skip_header = false;
                continue;
            }
            match self.assembler.assemble(&record) {
                Ok(row) => ctx.put_row(row)?,
                Err(err) => ctx.reject(self.config.error_mode, err)?,
            }
            return Ok(StageStatus::Continue);
        }
    }
}
