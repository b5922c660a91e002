//! Errors raised while compiling a query, before anything is sent.
//!
//! They never cross the client boundary as `Err`: terminal operations turn
//! them into failure envelopes.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryBuildError {
    #[error("no such column: {table}.{column}")]
    UnknownColumn { table: String, column: String },

    #[error("invalid predicate for '{column}': {reason}")]
    InvalidPredicate { column: String, reason: String },

    #[error("{what} must be a JSON object")]
    NotAnObject { what: &'static str },

    #[error("invalid value for {table}.{column}: {reason}")]
    InvalidValue {
        table: String,
        column: String,
        reason: String,
    },

    #[error("update patch is empty")]
    EmptyPatch,
}
