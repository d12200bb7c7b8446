//! Conversion of tokenized records into typed rows.
//!
//! A [`RowAssembler`] owns an ordered list of [`FieldSpec`]s that defines the
//! output [`RowShape`]. Input fields are matched positionally: missing trailing
//! fields take their type's empty value and surplus fields are ignored, so the
//! configuration, not the input, decides the shape.

use crate::error::{AssembleError, ConversionError};
use crate::row::{FieldMeta, Row, RowShape, Value, ValueType};
use crate::router::RowRouter;
use crate::tokenizer::TokenizedRow;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Date patterns tried in order when a date field has no explicit format.
const DEFAULT_DATE_FORMATS: &[&str] = &[
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d",
];

/// Which ends of a raw field to strip of whitespace before conversion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrimType {
    #[default]
    None,
    Left,
    Right,
    Both,
}

impl TrimType {
    #[must_use]
    pub fn apply(self, s: &str) -> &str {
        match self {
            TrimType::None => s,
            TrimType::Left => s.trim_start(),
            TrimType::Right => s.trim_end(),
            TrimType::Both => s.trim(),
        }
    }
}

/// Name, type and conversion rules of one output field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type", default)]
    pub value_type: ValueType,
    #[serde(default)]
    pub trim: TrimType,
    /// chrono pattern for date fields.
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub decimal_symbol: Option<char>,
    #[serde(default)]
    pub grouping_symbol: Option<char>,
    /// Text substituted for an empty or missing field before conversion.
    #[serde(default)]
    pub if_null: Option<String>,
}

impl FieldSpec {
    pub fn new<S: Into<String>>(name: S, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            trim: TrimType::None,
            format: None,
            decimal_symbol: None,
            grouping_symbol: None,
            if_null: None,
        }
    }

    /// A string field with no trimming.
    pub fn string<S: Into<String>>(name: S) -> Self {
        Self::new(name, ValueType::String)
    }

    #[must_use]
    pub fn with_trim(mut self, trim: TrimType) -> Self {
        self.trim = trim;
        self
    }

    #[must_use]
    pub fn with_format<S: Into<String>>(mut self, format: S) -> Self {
        self.format = Some(format.into());
        self
    }

    #[must_use]
    pub fn with_symbols(mut self, decimal: Option<char>, grouping: Option<char>) -> Self {
        self.decimal_symbol = decimal;
        self.grouping_symbol = grouping;
        self
    }

    #[must_use]
    pub fn with_if_null<S: Into<String>>(mut self, default: S) -> Self {
        self.if_null = Some(default.into());
        self
    }

    /// Convert raw field text according to this spec.
    ///
    /// # Errors
    /// Returns a human-readable reason when the text does not parse as the
    /// configured type.
    pub fn convert(&self, raw: &str) -> Result<Value, String> {
        let text = self.trim.apply(raw);
        if text.is_empty() {
            return match &self.if_null {
                Some(default) if !default.is_empty() => self.parse(default),
                _ => Ok(self.value_type.empty_value()),
            };
        }
        self.parse(text)
    }

    fn parse(&self, text: &str) -> Result<Value, String> {
        match self.value_type {
            ValueType::String => Ok(Value::String(text.to_string())),
            ValueType::Integer => {
                self.strip_grouping(text)
                    .parse::<i64>()
                    .map(Value::Integer)
                    .map_err(|e| e.to_string())
            }
            ValueType::Number => {
                let mut digits = self.strip_grouping(text);
                if let Some(dec) = self.decimal_symbol
                    && dec != '.'
                {
                    digits = digits.replace(dec, ".");
                }
                digits
                    .parse::<f64>()
                    .map(Value::from)
                    .map_err(|e| e.to_string())
            }
            ValueType::Boolean => match text.to_ascii_lowercase().as_str() {
                "y" | "yes" | "true" | "1" => Ok(Value::Boolean(true)),
                "n" | "no" | "false" | "0" => Ok(Value::Boolean(false)),
                _ => Err("not a boolean".to_string()),
            },
            ValueType::Date => match &self.format {
                Some(format) => parse_date(text, format)
                    .ok_or_else(|| format!("does not match date format {format:?}")),
                None => DEFAULT_DATE_FORMATS
                    .iter()
                    .find_map(|format| parse_date(text, format))
                    .ok_or_else(|| "not a recognized date".to_string()),
            },
        }
    }

    fn strip_grouping(&self, text: &str) -> String {
        match self.grouping_symbol {
            Some(g) => text.chars().filter(|c| *c != g).collect(),
            None => text.to_string(),
        }
    }
}

fn parse_date(text: &str, format: &str) -> Option<Value> {
    NaiveDateTime::parse_from_str(text, format)
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(text, format)
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
        .map(Value::Date)
}

/// Maps [`TokenizedRow`]s onto a fixed row shape.
#[derive(Clone, Debug)]
pub struct RowAssembler {
    specs: Vec<FieldSpec>,
    shape: RowShape,
    filename_field: bool,
    row_number_field: bool,
    filename: Option<String>,
    rows_assembled: i64,
}

impl RowAssembler {
    pub fn new(specs: Vec<FieldSpec>) -> Self {
        let shape = RowShape::new(
            specs
                .iter()
                .map(|s| FieldMeta::new(s.name.clone(), s.value_type))
                .collect(),
        );
        Self {
            specs,
            shape,
            filename_field: false,
            row_number_field: false,
            filename: None,
            rows_assembled: 0,
        }
    }

    /// Append a string field holding the name of the current source file.
    #[must_use]
    pub fn with_filename_field<S: Into<String>>(mut self, name: S) -> Self {
        self.shape = self
            .shape
            .extended([FieldMeta::new(name, ValueType::String)]);
        self.filename_field = true;
        self
    }

    /// Append an integer field numbering assembled rows from 1.
    ///
    /// Added after the filename field when both are configured.
    #[must_use]
    pub fn with_row_number_field<S: Into<String>>(mut self, name: S) -> Self {
        self.shape = self
            .shape
            .extended([FieldMeta::new(name, ValueType::Integer)]);
        self.row_number_field = true;
        self
    }

    /// Set the value written to the filename field for subsequent rows.
    pub fn set_filename<S: Into<String>>(&mut self, filename: S) {
        self.filename = Some(filename.into());
    }

    /// Shape of the rows this assembler produces.
    #[must_use]
    pub fn shape(&self) -> &RowShape {
        &self.shape
    }

    #[must_use]
    pub fn specs(&self) -> &[FieldSpec] {
        &self.specs
    }

    #[must_use]
    pub fn rows_assembled(&self) -> i64 {
        self.rows_assembled
    }

    /// Build a row from `tokenized`.
    ///
    /// # Errors
    /// [`ConversionError`] for the first field that fails to convert; the
    /// assembler stays usable for the next record.
    pub fn assemble(&mut self, tokenized: &TokenizedRow) -> Result<Row, ConversionError> {
        let mut row = Vec::with_capacity(self.shape.len());
        for (idx, spec) in self.specs.iter().enumerate() {
            let raw = tokenized.fields.get(idx).map_or("", String::as_str);
            let value = spec.convert(raw).map_err(|reason| ConversionError {
                line: tokenized.line,
                field_index: idx,
                field: spec.name.clone(),
                value: spec.trim.apply(raw).to_string(),
                reason,
            })?;
            row.push(value);
        }
        self.rows_assembled += 1;
        if self.filename_field {
            row.push(
                self.filename
                    .as_deref()
                    .map_or_else(|| ValueType::String.empty_value(), Value::from),
            );
        }
        if self.row_number_field {
            row.push(Value::Integer(self.rows_assembled));
        }
        Ok(row)
    }

    /// Assemble `tokenized` and send the row through `router`.
    ///
    /// # Errors
    /// [`AssembleError::Conversion`] if the record is malformed (nothing is
    /// sent), [`AssembleError::Queue`] if delivery fails.
    pub fn assemble_into(
        &mut self,
        tokenized: &TokenizedRow,
        router: &mut RowRouter,
    ) -> Result<(), AssembleError> {
        let row = self.assemble(tokenized)?;
        router.send(row)?;
        Ok(())
    }
}
