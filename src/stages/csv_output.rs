//! Delimited text output stage.
//!
//! Writes every incoming row to a file through the `csv` crate, compressing by
//! extension (`.gz`, `.zst`) when the codec feature is enabled, and passes the
//! row on to any downstream stage.

use crate::io::compression::{OutputStream, create_output};
use crate::row::RowShape;
use crate::stage::{Stage, StageContext, StageStatus};
use anyhow::{Context, Result, bail};
use csv::{QuoteStyle, Writer, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Settings of a [`CsvOutput`] stage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvOutputConfig {
    pub path: PathBuf,
    /// Single-byte field separator.
    pub delimiter: String,
    /// Single-byte quote; empty disables quoting.
    pub enclosure: String,
    /// Write field names as the first record.
    pub header: bool,
}

impl Default for CsvOutputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            delimiter: ";".to_string(),
            enclosure: "\"".to_string(),
            header: true,
        }
    }
}

fn single_byte(what: &str, token: &str) -> Result<u8> {
    match token.as_bytes() {
        [b] if b.is_ascii() => Ok(*b),
        _ => bail!("{what} must be a single ASCII character, got {token:?}"),
    }
}

/// Sink stage writing rows as delimited text.
pub struct CsvOutput {
    config: CsvOutputConfig,
    writer: Option<Writer<OutputStream>>,
}

impl CsvOutput {
    pub fn new(config: CsvOutputConfig) -> Self {
        Self {
            config,
            writer: None,
        }
    }
}

impl Stage for CsvOutput {
    fn init(&mut self, input: &RowShape) -> Result<RowShape> {
        let delimiter = single_byte("delimiter", &self.config.delimiter)?;
        let mut builder = WriterBuilder::new();
        builder.has_headers(false).delimiter(delimiter);
        if self.config.enclosure.is_empty() {
            builder.quote_style(QuoteStyle::Never);
        } else {
            builder.quote(single_byte("enclosure", &self.config.enclosure)?);
        }

        let path = &self.config.path;
        let mut writer = builder.from_writer(create_output(path)?);
        if self.config.header {
            writer
                .write_record(input.names())
                .with_context(|| format!("write header to {}", path.display()))?;
        }
        self.writer = Some(writer);
        Ok(input.clone())
    }

    fn process(&mut self, ctx: &mut StageContext) -> Result<StageStatus> {
        let Some(row) = ctx.get_row()? else {
            return Ok(StageStatus::Finished);
        };
        let Some(writer) = self.writer.as_mut() else {
            bail!("output {} used before init", self.config.path.display());
        };
        writer
            .write_record(row.iter().map(ToString::to_string))
            .with_context(|| format!("write row to {}", self.config.path.display()))?;
        ctx.metrics().add_written(1);
        ctx.put_row(row)?;
        Ok(StageStatus::Continue)
    }

    fn dispose(&mut self, _ctx: &mut StageContext) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer
                .flush()
                .with_context(|| format!("flush {}", self.config.path.display()))?;
        }
        Ok(())
    }
}
