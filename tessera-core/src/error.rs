//! Error types for Tessera operations

use thiserror::Error;

/// Why a capability token was refused.
///
/// The string form of each variant is part of the wire contract: the gateway
/// reports it verbatim in the `reason` field of a 401 response.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq, Hash)]
pub enum TokenRejection {
    #[error("malformed")]
    Malformed,

    #[error("dbname_mismatch")]
    DbnameMismatch,

    #[error("expired")]
    Expired,

    #[error("bad_sig")]
    BadSig,
}

impl TokenRejection {
    /// Wire reason string.
    pub fn reason(&self) -> &'static str {
        match self {
            TokenRejection::Malformed => "malformed",
            TokenRejection::DbnameMismatch => "dbname_mismatch",
            TokenRejection::Expired => "expired",
            TokenRejection::BadSig => "bad_sig",
        }
    }
}

/// Schema-load time errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Unknown mixin '{mixin}' referenced by table '{table}'")]
    UnknownMixin { table: String, mixin: String },

    #[error("Index '{index}' references unknown table '{table}'")]
    UnknownTable { index: String, table: String },

    #[error("Index '{index}' on '{table}' references unknown column '{column}'")]
    UnknownColumn {
        index: String,
        table: String,
        column: String,
    },

    #[error("Schema '{schema}' has no migration bundle and no canonical schema for fallback")]
    MissingSchema { schema: String },

    #[error("Invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("Failed to parse schema source: {reason}")]
    Source { reason: String },
}

/// Setup-time migration errors. These always halt progress.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MigrationError {
    #[error("Migration '{tag}' failed at statement {index}: {reason}")]
    StatementFailed {
        tag: String,
        index: usize,
        reason: String,
    },

    #[error("Migration '{tag}' failed: {reason}")]
    BatchFailed { tag: String, reason: String },

    #[error("Migration '{tag}' has no SQL loader")]
    MissingLoader { tag: String },

    #[error(
        "Refusing to apply fallback migration '{tag}' over non-empty history ({applied} applied); \
         is the migration bundle for '{schema}' missing?"
    )]
    FallbackOverHistory {
        schema: String,
        tag: String,
        applied: usize,
    },

    #[error("Migration history unavailable: {reason}")]
    History { reason: String },

    #[error("Failed to record migration '{tag}': {reason}")]
    RecordFailed { tag: String, reason: String },

    #[error("Failed to load migration bundle: {reason}")]
    Bundle { reason: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Logical database '{name}' is not bound")]
    InstanceNotFound { name: String },

    #[error("Logical database '{name}' already exists")]
    InstanceExists { name: String },

    #[error("SQLite error: {reason}")]
    Sqlite { reason: String },

    #[error("IO error: {reason}")]
    Io { reason: String },

    #[error("Bookmark {requested} is ahead of instance bookmark {current}")]
    BookmarkAhead { requested: String, current: String },

    #[error("Invalid bookmark: {value}")]
    InvalidBookmark { value: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Provisioning errors raised by the orchestrator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProvisionError {
    #[error("Token minting failed: {reason}")]
    Token { reason: String },

    #[error("Transport setup failed: {reason}")]
    Transport { reason: String },
}

/// Master error type for all Tessera errors.
#[derive(Debug, Clone, Error)]
pub enum TesseraError {
    #[error("Token rejected: {0}")]
    Token(#[from] TokenRejection),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Migration error: {0}")]
    Migration(#[from] MigrationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Provision error: {0}")]
    Provision(#[from] ProvisionError),
}

/// Result type alias for Tessera operations.
pub type TesseraResult<T> = Result<T, TesseraError>;

// =============================================================================
// TESTS
// =============================================================================
