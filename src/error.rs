//! # Error Categories
//!
//! Every fallible operation in sqlsnap returns `eyre::Result`. Failures that a
//! caller may want to branch on are raised as a [`SnapError`] inside the report,
//! so they can be recovered with `report.downcast_ref::<SnapError>()` even after
//! context has been attached with `wrap_err`.
//!
//! | Category | Variants |
//! |----------|----------|
//! | Format / protocol | `ProtocolVersion`, `UnexpectedEof`, `Format`, `UnknownKind` |
//! | Invalid state | `NoData`, `Closed`, `InvalidState`, `ColumnOutOfRange`, `UnknownColumn`, `DuplicateColumn`, `NullValue`, `InvalidCast` |
//! | Unimplemented | `NotImplemented` |
//! | Cancellation | `Cancelled` |
//!
//! Format errors are fatal for the stream: there is no retry and no resync.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SnapError {
    #[error("unsupported protocol version {found} (this build reads version {expected})")]
    ProtocolVersion { expected: u8, found: u8 },

    #[error("unexpected end of stream while reading {context}")]
    UnexpectedEof { context: &'static str },

    #[error("malformed snapshot stream: {0}")]
    Format(String),

    #[error("unknown value kind discriminant: {0}")]
    UnknownKind(u8),

    #[error("invalid attempt to read when no data is present")]
    NoData,

    #[error("invalid attempt to use a closed reader")]
    Closed,

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("column ordinal {ordinal} is out of range (field count {field_count})")]
    ColumnOutOfRange { ordinal: usize, field_count: usize },

    #[error("no column named '{0}'")]
    UnknownColumn(String),

    #[error("duplicate column name '{0}'")]
    DuplicateColumn(String),

    #[error("data is null; this method cannot be called on null values")]
    NullValue,

    #[error("cannot read {actual} value as {requested}")]
    InvalidCast {
        requested: &'static str,
        actual: &'static str,
    },

    #[error("{0} is not implemented")]
    NotImplemented(&'static str),

    #[error("operation cancelled")]
    Cancelled,
}

impl SnapError {
    /// Returns true for errors that mean the stream itself is unusable.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            SnapError::ProtocolVersion { .. }
                | SnapError::UnexpectedEof { .. }
                | SnapError::Format(_)
                | SnapError::UnknownKind(_)
        )
    }

    /// Returns true for caller misuse (wrong state, wrong column, wrong type).
    pub fn is_invalid_state(&self) -> bool {
        matches!(
            self,
            SnapError::NoData
                | SnapError::Closed
                | SnapError::InvalidState(_)
                | SnapError::ColumnOutOfRange { .. }
                | SnapError::UnknownColumn(_)
                | SnapError::DuplicateColumn(_)
                | SnapError::NullValue
                | SnapError::InvalidCast { .. }
        )
    }
}

/// Finds the [`SnapError`] carried by a report, if any.
pub fn snap_error(report: &eyre::Report) -> Option<&SnapError> {
    report.downcast_ref::<SnapError>()
}

/// Maps an I/O error to `UnexpectedEof` when the stream ran dry, keeping
/// every other I/O failure as-is.
pub(crate) fn map_io(err: std::io::Error, context: &'static str) -> eyre::Report {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        eyre::Report::new(SnapError::UnexpectedEof { context })
    } else {
        eyre::Report::new(err).wrap_err(format!("I/O error while reading {}", context))
    }
}
