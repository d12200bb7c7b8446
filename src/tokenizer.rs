//! Delimited text tokenizer with multi-character delimiters and enclosures.
//!
//! [`DelimitedLineTokenizer`] scans a decoded character stream and yields one
//! [`TokenizedRow`] per logical record. A record normally ends at a line
//! terminator (`\n`, `\r\n` or a lone `\r`), but inside an enclosed field the
//! delimiter and line terminators are ordinary content.
//!
//! # Scanning rules
//!
//! - At the start of a field, a full match of the enclosure token opens an
//!   enclosed field. The token itself is not part of the value. When the
//!   delimiter is longer than the enclosure, the delimiter is tried first.
//! - An enclosed field runs until the next enclosure token. Two enclosure tokens
//!   in a row stand for one literal enclosure token (`"a""b"` reads `a"b`).
//! - Text between a closing enclosure and the next delimiter is kept literally.
//! - A multi-character enclosure only counts when it matches in full; partial
//!   matches are literal content.
//! - Lines with no characters at all produce no record.
//! - The last record does not need a trailing line terminator.
//! - Input ending inside an enclosed field is reported as
//!   [`TokenizeError::UnterminatedEnclosure`] and ends the scan.
//!
//! # Example
//!
//! ```
//! use rowpipe::tokenizer::{DelimitedLineTokenizer, TokenizerConfig};
//!
//! let config = TokenizerConfig::new(";", "\"!");
//! let rows: Vec<Vec<String>> = DelimitedLineTokenizer::from_str("\"!a;b\"!;c\n", &config)?
//!     .map(|r| r.map(|r| r.fields))
//!     .collect::<Result<_, _>>()?;
//! assert_eq!(rows, vec![vec!["a;b".to_string(), "c".to_string()]]);
//! # Ok::<(), rowpipe::error::TokenizeError>(())
//! ```

use crate::error::TokenizeError;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::io::{self, BufRead};
use std::iter::FusedIterator;
use std::str::Chars;

/// Delimiter and enclosure tokens for a [`DelimitedLineTokenizer`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenizerConfig {
    /// Field separator; must not be empty.
    pub delimiter: String,
    /// Field enclosure; an empty string means fields are never enclosed.
    pub enclosure: String,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            delimiter: ";".to_string(),
            enclosure: "\"".to_string(),
        }
    }
}

impl TokenizerConfig {
    pub fn new<D: Into<String>, E: Into<String>>(delimiter: D, enclosure: E) -> Self {
        Self {
            delimiter: delimiter.into(),
            enclosure: enclosure.into(),
        }
    }

    /// Check the tokens can drive a scan.
    ///
    /// # Errors
    /// [`TokenizeError::InvalidConfig`] if the delimiter is empty.
    pub fn validate(&self) -> Result<(), TokenizeError> {
        if self.delimiter.is_empty() {
            return Err(TokenizeError::InvalidConfig(
                "delimiter must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// One record's raw field values plus the line it started on (1-based).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenizedRow {
    pub line: u64,
    pub fields: Vec<String>,
}

/// Character source over a string slice.
pub type StrChars<'a> = std::iter::Map<Chars<'a>, fn(char) -> io::Result<char>>;

/// Decodes a [`BufRead`] as UTF-8, one line at a time, into characters.
pub struct ReaderChars<R> {
    reader: R,
    buf: String,
    pos: usize,
}

impl<R: BufRead> ReaderChars<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: String::new(),
            pos: 0,
        }
    }
}

impl<R: BufRead> Iterator for ReaderChars<R> {
    type Item = io::Result<char>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.buf.len() {
            self.buf.clear();
            self.pos = 0;
            match self.reader.read_line(&mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => return Some(Err(e)),
            }
        }
        let c = self.buf[self.pos..].chars().next()?;
        self.pos += c.len_utf8();
        Some(Ok(c))
    }
}

/// Lookahead buffer over a fallible character source, tracking line numbers.
struct Cursor<I> {
    chars: I,
    lookahead: VecDeque<char>,
    line: u64,
    after_cr: bool,
}

impl<I: Iterator<Item = io::Result<char>>> Cursor<I> {
    /// Ensure at least `n` characters are buffered; `false` if input ends first.
    fn fill(&mut self, n: usize) -> Result<bool, TokenizeError> {
        while self.lookahead.len() < n {
            match self.chars.next() {
                Some(Ok(c)) => self.lookahead.push_back(c),
                Some(Err(source)) => {
                    return Err(TokenizeError::Io {
                        line: self.line,
                        source,
                    });
                }
                None => return Ok(false),
            }
        }
        Ok(true)
    }

    fn starts_with(&mut self, token: &[char]) -> Result<bool, TokenizeError> {
        if !self.fill(token.len())? {
            return Ok(false);
        }
        Ok(self.lookahead.iter().zip(token).all(|(a, b)| a == b))
    }

    /// Length of the line terminator at the cursor, if one is there.
    fn line_end(&mut self) -> Result<Option<usize>, TokenizeError> {
        if !self.fill(1)? {
            return Ok(None);
        }
        match self.lookahead[0] {
            '\n' => Ok(Some(1)),
            '\r' => {
                if self.fill(2)? && self.lookahead[1] == '\n' {
                    Ok(Some(2))
                } else {
                    Ok(Some(1))
                }
            }
            _ => Ok(None),
        }
    }

    fn next_char(&mut self) -> Result<Option<char>, TokenizeError> {
        if !self.fill(1)? {
            return Ok(None);
        }
        let c = self.lookahead.pop_front();
        if let Some(c) = c {
            match c {
                '\r' => self.line += 1,
                '\n' if !self.after_cr => self.line += 1,
                _ => {}
            }
            self.after_cr = c == '\r';
        }
        Ok(c)
    }

    fn skip(&mut self, n: usize) -> Result<(), TokenizeError> {
        for _ in 0..n {
            self.next_char()?;
        }
        Ok(())
    }
}

enum FieldEnd {
    Delimiter,
    Row,
}

/// Lazy, fused iterator of records over a character stream.
///
/// Each item is either a [`TokenizedRow`] or the error that ended the scan;
/// after an error the iterator yields nothing more.
pub struct DelimitedLineTokenizer<I> {
    cursor: Cursor<I>,
    delimiter: Box<[char]>,
    enclosure: Option<Box<[char]>>,
    finished: bool,
}

impl<'a> DelimitedLineTokenizer<StrChars<'a>> {
    /// Tokenize an in-memory string.
    ///
    /// # Errors
    /// See [`TokenizerConfig::validate`].
    pub fn from_str(input: &'a str, config: &TokenizerConfig) -> Result<Self, TokenizeError> {
        let chars: StrChars<'a> = input.chars().map(Ok as fn(char) -> io::Result<char>);
        Self::new(chars, config)
    }
}

impl<R: BufRead> DelimitedLineTokenizer<ReaderChars<R>> {
    /// Tokenize UTF-8 text from a buffered reader.
    ///
    /// # Errors
    /// See [`TokenizerConfig::validate`].
    pub fn from_reader(reader: R, config: &TokenizerConfig) -> Result<Self, TokenizeError> {
        Self::new(ReaderChars::new(reader), config)
    }
}

impl<I: Iterator<Item = io::Result<char>>> DelimitedLineTokenizer<I> {
    /// Tokenize an arbitrary character source.
    ///
    /// # Errors
    /// See [`TokenizerConfig::validate`].
    pub fn new(chars: I, config: &TokenizerConfig) -> Result<Self, TokenizeError> {
        config.validate()?;
        let enclosure = if config.enclosure.is_empty() {
            None
        } else {
            Some(config.enclosure.chars().collect())
        };
        Ok(Self {
            cursor: Cursor {
                chars,
                lookahead: VecDeque::new(),
                line: 1,
                after_cr: false,
            },
            delimiter: config.delimiter.chars().collect(),
            enclosure,
            finished: false,
        })
    }

    /// Current 1-based line of the scan position.
    #[must_use]
    pub fn line(&self) -> u64 {
        self.cursor.line
    }

    fn next_row(&mut self) -> Result<Option<TokenizedRow>, TokenizeError> {
        loop {
            if !self.cursor.fill(1)? {
                return Ok(None);
            }
            match self.cursor.line_end()? {
                Some(n) => self.cursor.skip(n)?,
                None => break,
            }
        }

        let line = self.cursor.line;
        let mut fields = Vec::new();
        loop {
            let (value, end) = self.scan_field()?;
            fields.push(value);
            if let FieldEnd::Row = end {
                break;
            }
        }
        Ok(Some(TokenizedRow { line, fields }))
    }

    fn scan_field(&mut self) -> Result<(String, FieldEnd), TokenizeError> {
        let mut value = String::new();

        if let Some(enclosure) = &self.enclosure {
            if enclosure.len() < self.delimiter.len() && self.cursor.starts_with(&self.delimiter)? {
                self.cursor.skip(self.delimiter.len())?;
                return Ok((value, FieldEnd::Delimiter));
            }
            if self.cursor.starts_with(enclosure)? {
                let opened_on = self.cursor.line;
                self.cursor.skip(enclosure.len())?;
                loop {
                    if self.cursor.starts_with(enclosure)? {
                        self.cursor.skip(enclosure.len())?;
                        if !self.cursor.starts_with(enclosure)? {
                            break;
                        }
                        self.cursor.skip(enclosure.len())?;
                        value.extend(enclosure.iter());
                        continue;
                    }
                    match self.cursor.next_char()? {
                        Some(c) => value.push(c),
                        None => return Err(TokenizeError::UnterminatedEnclosure { line: opened_on }),
                    }
                }
            }
        }

        loop {
            if self.cursor.starts_with(&self.delimiter)? {
                self.cursor.skip(self.delimiter.len())?;
                return Ok((value, FieldEnd::Delimiter));
            }
            if let Some(n) = self.cursor.line_end()? {
                self.cursor.skip(n)?;
                return Ok((value, FieldEnd::Row));
            }
            match self.cursor.next_char()? {
                Some(c) => value.push(c),
                None => return Ok((value, FieldEnd::Row)),
            }
        }
    }
}

impl<I: Iterator<Item = io::Result<char>>> Iterator for DelimitedLineTokenizer<I> {
    type Item = Result<TokenizedRow, TokenizeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.next_row() {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

impl<I: Iterator<Item = io::Result<char>>> FusedIterator for DelimitedLineTokenizer<I> {}
