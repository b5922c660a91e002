//! Wire protocol types shared by the gateway and the HTTP transport.
//!
//! Every operation answers with the same [`Envelope`]:
//! `{success:true, results|data, meta:{rowsRead, rowsWritten}}` or
//! `{success:false, error}`.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::StorageError;

// ============================================================================
// PATHS AND HEADERS
// ============================================================================

pub const PATH_RUN: &str = "/api/run";
pub const PATH_EXEC: &str = "/api/exec";
pub const PATH_BATCH: &str = "/api/batch";
pub const PATH_RAW: &str = "/api/raw";
pub const PATH_FIRST: &str = "/api/first";

pub const HEADER_DB_NAME: &str = "x-db-name";
pub const HEADER_DB_TOKEN: &str = "x-db-token";
pub const HEADER_BOOKMARK: &str = "x-d1-bookmark";

// ============================================================================
// REQUESTS
// ============================================================================

/// A single parameterized statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    pub query: String,
    #[serde(default)]
    pub params: Vec<Value>,
}

impl Statement {
    pub fn new(query: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            query: query.into(),
            params,
        }
    }

    pub fn bare(query: impl Into<String>) -> Self {
        Self::new(query, Vec::new())
    }
}

/// Body of `run`, `exec`, `raw` and `first`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub query: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<Value>,
    /// `raw` only: prepend a header row of column names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_names: Option<bool>,
    /// `first` only: project a single column as a scalar.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_name: Option<String>,
}

impl QueryRequest {
    pub fn new(query: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            query: query.into(),
            params,
            column_names: None,
            column_name: None,
        }
    }

    pub fn statement(&self) -> Statement {
        Statement::new(self.query.clone(), self.params.clone())
    }
}

/// Body of `batch`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub batch: Vec<Statement>,
}

// ============================================================================
// RESPONSES
// ============================================================================

/// Row accounting attached to every successful response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    #[serde(default)]
    pub rows_read: u64,
    #[serde(default)]
    pub rows_written: u64,
}

impl Meta {
    pub fn new(rows_read: u64, rows_written: u64) -> Self {
        Self {
            rows_read,
            rows_written,
        }
    }

    pub fn merge(self, other: Meta) -> Meta {
        Meta {
            rows_read: self.rows_read + other.rows_read,
            rows_written: self.rows_written + other.rows_written,
        }
    }
}

/// Uniform result envelope.
///
/// `data` distinguishes "absent" (`None`) from "present and null"
/// (`Some(Value::Null)`), so `first()` on zero rows serializes as `data: null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Value>,
    #[serde(
        default,
        deserialize_with = "present_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn present_value<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl Envelope {
    /// Successful response carrying `results`.
    pub fn results(results: Vec<Value>, meta: Meta) -> Self {
        Self {
            success: true,
            results: Some(Value::Array(results)),
            data: None,
            meta: Some(meta),
            error: None,
        }
    }

    /// Successful response carrying `data` (which may be `null`).
    pub fn data(data: Value, meta: Meta) -> Self {
        Self {
            success: true,
            results: None,
            data: Some(data),
            meta: Some(meta),
            error: None,
        }
    }

    /// Successful response with nothing but row accounting.
    pub fn meta_only(meta: Meta) -> Self {
        Self::results(Vec::new(), meta)
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            results: None,
            data: None,
            meta: None,
            error: Some(error.into()),
        }
    }

    /// Rows of a `results` envelope; empty when absent.
    pub fn rows(&self) -> &[Value] {
        match &self.results {
            Some(Value::Array(rows)) => rows,
            _ => &[],
        }
    }

    /// `data` of the envelope; `Null` when absent.
    pub fn data_value(&self) -> &Value {
        self.data.as_ref().unwrap_or(&Value::Null)
    }

    pub fn meta(&self) -> Meta {
        self.meta.unwrap_or_default()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

/// Error text of a failed batch: `statement <index>: <reason>` (1-based).
pub fn batch_failure_message(index: usize, reason: &str) -> String {
    format!("statement {}: {}", index, reason)
}

/// Inverse of [`batch_failure_message`].
pub fn parse_batch_failure(message: &str) -> Option<(usize, &str)> {
    let rest = message.strip_prefix("statement ")?;
    let (index, reason) = rest.split_once(": ")?;
    Some((index.parse().ok()?, reason))
}

// ============================================================================
// BOOKMARK
// ============================================================================

/// Storage consistency point.
///
/// Encoded on the wire as 16 lowercase hex digits of the instance's commit
/// sequence. Callers must treat the string as opaque.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Bookmark(pub u64);

impl fmt::Display for Bookmark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl FromStr for Bookmark {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.len() != 16 {
            return Err(StorageError::InvalidBookmark {
                value: s.to_string(),
            });
        }
        u64::from_str_radix(trimmed, 16)
            .map(Bookmark)
            .map_err(|_| StorageError::InvalidBookmark {
                value: s.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_first_on_zero_rows_serializes_data_null() -> Result<(), serde_json::Error> {
        let envelope = Envelope::data(Value::Null, Meta::default());
        let wire = serde_json::to_value(&envelope)?;
        assert_eq!(
            wire,
            json!({"success": true, "data": null, "meta": {"rowsRead": 0, "rowsWritten": 0}})
        );

        let back: Envelope = serde_json::from_value(wire)?;
        assert_eq!(back.data, Some(Value::Null));
        Ok(())
    }

    #[test]
    fn test_absent_data_stays_absent() -> Result<(), serde_json::Error> {
        let back: Envelope = serde_json::from_value(json!({"success": false, "error": "boom"}))?;
        assert_eq!(back.data, None);
        assert_eq!(back.error_message(), Some("boom"));
        assert!(back.rows().is_empty());
        Ok(())
    }

    #[test]
    fn test_query_request_accepts_camel_case_options() -> Result<(), serde_json::Error> {
        let req: QueryRequest = serde_json::from_value(json!({
            "query": "SELECT 1",
            "columnNames": true,
            "columnName": "x"
        }))?;
        assert_eq!(req.column_names, Some(true));
        assert_eq!(req.column_name.as_deref(), Some("x"));
        assert!(req.params.is_empty());
        Ok(())
    }

    #[test]
    fn test_batch_failure_message_parses_back() {
        let message = batch_failure_message(2, "no such table: not_a_table");
        assert_eq!(
            parse_batch_failure(&message),
            Some((2, "no such table: not_a_table"))
        );
        assert_eq!(parse_batch_failure("SQLite error: boom"), None);
    }

    #[test]
    fn test_bookmark_parse_and_display() {
        let bookmark = Bookmark(42);
        let text = bookmark.to_string();
        assert_eq!(text, "000000000000002a");
        assert_eq!(text.parse::<Bookmark>(), Ok(bookmark));
        assert!("nope".parse::<Bookmark>().is_err());
        assert!(Bookmark(3) > Bookmark(2));
    }
}
