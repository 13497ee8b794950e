// 🧯 Error Taxonomy
// Closed set of failures the import pipeline can report

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ============================================================================
// PARSE ERRORS (call-level, fatal)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ParseError {
    /// Input is empty or contains only blank lines
    #[error("input has no header line")]
    MissingHeader,

    /// Header is present but no data line follows it
    #[error("input has a header but no data rows")]
    NoDataRows,
}

// ============================================================================
// FIELD ERRORS (per-row, non-fatal)
// ============================================================================

/// One rule violation on one field of one row
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{field}: {message}")]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        FieldError {
            field: field.into(),
            message: message.into(),
        }
    }
}

// ============================================================================
// STORE ERRORS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreErrorKind {
    /// Connectivity or storage failure: every later call will fail too
    Unavailable,
    /// Constraint violation other than the natural-key collision
    Constraint,
    /// Record payload could not be encoded or decoded
    Serialization,
    Other,
}

impl StoreErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreErrorKind::Unavailable => "unavailable",
            StoreErrorKind::Constraint => "constraint",
            StoreErrorKind::Serialization => "serialization",
            StoreErrorKind::Other => "other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("store {} error: {message}", .kind.as_str())]
pub struct StoreError {
    pub kind: StoreErrorKind,
    pub message: String,
}

impl StoreError {
    pub fn new(kind: StoreErrorKind, message: impl Into<String>) -> Self {
        StoreError {
            kind,
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Unavailable, message)
    }

    /// True when the store cannot serve the rest of the batch
    pub fn is_fatal(&self) -> bool {
        self.kind == StoreErrorKind::Unavailable
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        use rusqlite::ErrorCode;

        let kind = match &err {
            rusqlite::Error::SqliteFailure(failure, _) => match failure.code {
                ErrorCode::CannotOpen
                | ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::DatabaseCorrupt
                | ErrorCode::NotADatabase
                | ErrorCode::DiskFull
                | ErrorCode::SystemIoFailure
                | ErrorCode::ReadOnly
                | ErrorCode::PermissionDenied
                | ErrorCode::OutOfMemory => StoreErrorKind::Unavailable,
                ErrorCode::ConstraintViolation => StoreErrorKind::Constraint,
                _ => StoreErrorKind::Other,
            },
            _ => StoreErrorKind::Other,
        };

        StoreError::new(kind, err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::new(StoreErrorKind::Serialization, err.to_string())
    }
}

/// Outcome of a failed insert: the natural key collided, or the store failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InsertError {
    #[error("duplicate natural key: {key}")]
    DuplicateKey { key: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

// ============================================================================
// IMPORT ERRORS (the only thing bulk_import raises)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImportError {
    #[error("cannot import: {0}")]
    Parse(#[from] ParseError),
}

// ============================================================================
// CONFIG ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid value for {var}: {value}")]
    InvalidValue { var: String, value: String },
}

/// Joins field errors into the single report line shown for a failed row
pub fn join_messages(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Display helper for optional natural keys in reports
pub struct KeyDisplay<'a>(pub Option<&'a str>);

impl fmt::Display for KeyDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(key) => write!(f, "{}", key),
            None => write!(f, "-"),
        }
    }
}
