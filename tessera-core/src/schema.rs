//! Canonical schema model
//!
//! The canonical schema is produced once by the DSL normalizer and is the only
//! input to migration SQL generation and ORM typing. Declaration order of
//! tables and columns is preserved everywhere.

use serde::{Deserialize, Serialize};

// ============================================================================
// COLUMN TYPES
// ============================================================================

/// SQLite storage class of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    #[default]
    Text,
    Integer,
    Real,
    Blob,
    /// Stored as TEXT, exchanged as structured JSON.
    Json,
}

impl ColumnType {
    /// SQL type name used in `CREATE TABLE`.
    pub fn sql_name(&self) -> &'static str {
        match self {
            ColumnType::Text | ColumnType::Json => "TEXT",
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Blob => "BLOB",
        }
    }
}

/// Interpretation layered on top of an INTEGER column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnMode {
    Boolean,
    TimestampMs,
}

/// Column default value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DefaultValue {
    /// Current time; rendering depends on the column type.
    Now,
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    /// Raw SQL expression, rendered inside parentheses.
    Sql(String),
}

/// `ON DELETE` action of a foreign key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnDelete {
    Cascade,
    Restrict,
    SetNull,
    SetDefault,
    NoAction,
}

impl OnDelete {
    pub fn sql(&self) -> &'static str {
        match self {
            OnDelete::Cascade => "CASCADE",
            OnDelete::Restrict => "RESTRICT",
            OnDelete::SetNull => "SET NULL",
            OnDelete::SetDefault => "SET DEFAULT",
            OnDelete::NoAction => "NO ACTION",
        }
    }

    /// Parse a DSL action token (`cascade`, `set-null`, `set_null`, ...).
    pub fn parse(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().replace('-', "_").as_str() {
            "cascade" => Some(OnDelete::Cascade),
            "restrict" => Some(OnDelete::Restrict),
            "set_null" => Some(OnDelete::SetNull),
            "set_default" => Some(OnDelete::SetDefault),
            "no_action" => Some(OnDelete::NoAction),
            _ => None,
        }
    }
}

/// Foreign key target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    pub table: String,
    pub column: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_delete: Option<OnDelete>,
}

// ============================================================================
// COLUMNS / TABLES / SCHEMA
// ============================================================================

/// A single column of the canonical model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<ColumnMode>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub not_null: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub primary_key: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub unique: bool,
    #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<DefaultValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<Reference>,
}

impl Column {
    /// Create an unconstrained column.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            mode: None,
            not_null: false,
            primary_key: false,
            unique: false,
            enum_values: None,
            default: None,
            references: None,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn with_mode(mut self, mode: ColumnMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn is_json(&self) -> bool {
        self.column_type == ColumnType::Json
    }

    pub fn is_boolean(&self) -> bool {
        self.mode == Some(ColumnMode::Boolean)
    }

    pub fn is_blob(&self) -> bool {
        self.column_type == ColumnType::Blob
    }
}

/// Named index over one or more columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    pub name: String,
    pub columns: Vec<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub unique: bool,
}

/// A table of the canonical model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    #[serde(default)]
    pub indexes: Vec<Index>,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            name: name.into(),
            columns,
            indexes: Vec::new(),
        }
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}

/// The canonical schema: the normalized output of the DSL compiler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalSchema {
    pub name: String,
    pub version: u32,
    pub tables: Vec<Table>,
}

impl CanonicalSchema {
    pub fn new(name: impl Into<String>, version: u32, tables: Vec<Table>) -> Self {
        Self {
            name: name.into(),
            version,
            tables,
        }
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }
}
