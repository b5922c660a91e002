//! Tessera Core - Shared Types
//!
//! Pure data structures shared by every other crate: the canonical schema
//! model, the wire envelope, and the error taxonomy. No I/O lives here.

pub mod envelope;
pub mod error;
pub mod schema;

pub use envelope::{
    batch_failure_message, parse_batch_failure, BatchRequest, Bookmark, Envelope, Meta,
    QueryRequest, Statement, HEADER_BOOKMARK, HEADER_DB_NAME, HEADER_DB_TOKEN, PATH_BATCH,
    PATH_EXEC, PATH_FIRST, PATH_RAW, PATH_RUN,
};
pub use error::{
    MigrationError, ProvisionError, StorageError, TesseraError, TesseraResult, TokenRejection,
    ValidationError,
};
pub use schema::{
    CanonicalSchema, Column, ColumnMode, ColumnType, DefaultValue, Index, OnDelete, Reference,
    Table,
};

/// Timestamp in Unix epoch milliseconds.
pub type EpochMillis = i64;

/// Current wall-clock time in Unix epoch milliseconds.
pub fn now_millis() -> EpochMillis {
    chrono::Utc::now().timestamp_millis()
}

/// SQL identifier in double quotes, embedded quotes doubled.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Validate a logical database name: 1-63 characters of `[A-Za-z0-9_-]`.
///
/// Dots are excluded so a capability token always splits into exactly four
/// parts.
pub fn validate_db_name(name: &str) -> Result<(), ValidationError> {
    let invalid = |reason: &str| ValidationError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() {
        return Err(invalid("name is empty"));
    }
    if name.len() > 63 {
        return Err(invalid("name is longer than 63 characters"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(invalid("only ASCII letters, digits, '_' and '-' are allowed"));
    }
    Ok(())
}
