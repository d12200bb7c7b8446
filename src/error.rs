//! Error taxonomy for the row transport, tokenizer and assembler.
//!
//! Queue mechanics and tokenizing use typed errors so callers can tell a
//! clean shutdown ([`QueueError::Cancelled`]) apart from a wiring defect
//! ([`QueueError::Closed`]) or a malformed input stream. Stage and runner
//! plumbing wrap these in [`anyhow::Error`] with context.

use std::io;

/// Errors produced by [`RowQueue`](crate::queue::RowQueue) operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// `put` was called after the producer already marked the queue done.
    #[error("row queue closed: put after mark_done")]
    Closed,

    /// A blocking wait was interrupted by a pipeline stop request.
    #[error("row queue wait cancelled by stop request")]
    Cancelled,
}

/// Errors produced while scanning delimited text.
#[derive(Debug, thiserror::Error)]
pub enum TokenizeError {
    /// Input ended while an enclosed field was still open.
    #[error("unterminated enclosure in field starting on line {line}")]
    UnterminatedEnclosure { line: u64 },

    /// The underlying character source failed.
    #[error("i/o error near line {line}: {source}")]
    Io {
        line: u64,
        #[source]
        source: io::Error,
    },

    /// The delimiter/enclosure configuration cannot be used.
    #[error("invalid tokenizer configuration: {0}")]
    InvalidConfig(String),
}

impl TokenizeError {
    /// Source line the error refers to; 0 for configuration errors.
    #[must_use]
    pub fn line(&self) -> u64 {
        match self {
            TokenizeError::UnterminatedEnclosure { line } | TokenizeError::Io { line, .. } => *line,
            TokenizeError::InvalidConfig(_) => 0,
        }
    }
}

/// A tokenized field that could not be converted to its configured type.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("line {line}, field #{field_index} ({field}): cannot convert {value:?}: {reason}")]
pub struct ConversionError {
    /// 1-based source line the row started on.
    pub line: u64,
    /// 0-based position of the field in the row shape.
    pub field_index: usize,
    /// Name of the field.
    pub field: String,
    /// Raw text after trimming.
    pub value: String,
    /// Why conversion failed.
    pub reason: String,
}

/// Failure to turn one tokenized record into a row and hand it downstream.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AssembleError {
    /// The record is malformed; the stream may continue with the next one.
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// The row could not be delivered.
    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// Returns `true` if `err` is, or wraps, a [`QueueError::Cancelled`].
///
/// Stage loops use this to treat a stop request as a clean shutdown.
pub fn is_cancelled(err: &anyhow::Error) -> bool {
    err.chain()
        .any(|cause| matches!(cause.downcast_ref::<QueueError>(), Some(QueueError::Cancelled)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn cancelled_is_detected_through_context() {
        let err: anyhow::Result<()> = Err(QueueError::Cancelled).context("reading input");
        assert!(is_cancelled(&err.unwrap_err()));
    }

    #[test]
    fn closed_is_not_cancelled() {
        let err = anyhow::Error::from(QueueError::Closed);
        assert!(!is_cancelled(&err));
    }

    #[test]
    fn conversion_error_displays_position() {
        let err = ConversionError {
            line: 7,
            field_index: 2,
            field: "age".into(),
            value: "x1".into(),
            reason: "invalid digit".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("line 7"), "got: {msg}");
        assert!(msg.contains("#2 (age)"), "got: {msg}");
    }

    #[test]
    fn unterminated_enclosure_displays_line() {
        let err = TokenizeError::UnterminatedEnclosure { line: 3 };
        assert_eq!(
            err.to_string(),
            "unterminated enclosure in field starting on line 3"
        );
    }
}
