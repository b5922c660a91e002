//! Schema source documents
//!
//! The authored form of a schema: tables of compact column definition strings,
//! reusable mixins and named indexes. Loadable from JSON, YAML or TOML; every
//! map is an [`IndexMap`] so declaration order survives deserialization.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tessera_core::ValidationError;

/// Column name -> definition.
pub type ColumnMap = IndexMap<String, ColumnSpec>;

/// One column entry of a table or mixin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnSpec {
    /// `true` declares a plain text column, `false` removes the column.
    Flag(bool),
    /// Compact definition, e.g. `"integer primary key"`.
    Definition(String),
}

impl From<&str> for ColumnSpec {
    fn from(definition: &str) -> Self {
        ColumnSpec::Definition(definition.to_string())
    }
}

/// The authored schema document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaSource {
    pub tables: IndexMap<String, ColumnMap>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub mixins: IndexMap<String, ColumnMap>,
    /// Table -> index name -> `"a, b"` or `"unique(a, b)"`.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub indexes: IndexMap<String, IndexMap<String, String>>,
}

/// Supported on-disk formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Json,
    Yaml,
    Toml,
}

impl SourceFormat {
    /// Guess the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "json" => Some(SourceFormat::Json),
            "yaml" | "yml" => Some(SourceFormat::Yaml),
            "toml" => Some(SourceFormat::Toml),
            _ => None,
        }
    }
}

fn source_error(format: &str, err: impl std::fmt::Display) -> ValidationError {
    ValidationError::Source {
        reason: format!("invalid {} schema source: {}", format, err),
    }
}

impl SchemaSource {
    pub fn from_json(text: &str) -> Result<Self, ValidationError> {
        serde_json::from_str(text).map_err(|e| source_error("json", e))
    }

    pub fn from_yaml(text: &str) -> Result<Self, ValidationError> {
        serde_yaml::from_str(text).map_err(|e| source_error("yaml", e))
    }

    pub fn from_toml(text: &str) -> Result<Self, ValidationError> {
        toml::from_str(text).map_err(|e| source_error("toml", e))
    }

    pub fn parse(text: &str, format: SourceFormat) -> Result<Self, ValidationError> {
        match format {
            SourceFormat::Json => Self::from_json(text),
            SourceFormat::Yaml => Self::from_yaml(text),
            SourceFormat::Toml => Self::from_toml(text),
        }
    }

    /// Load a schema source file, picking the format from its extension.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ValidationError> {
        let path = path.as_ref();
        let format = SourceFormat::from_path(path).ok_or_else(|| ValidationError::Source {
            reason: format!("unrecognized schema source extension: {}", path.display()),
        })?;
        let text = fs::read_to_string(path).map_err(|e| ValidationError::Source {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;
        Self::parse(&text, format)
    }

    /// Builder used by tests and embedders.
    pub fn table<I, K, V>(mut self, name: &str, columns: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<ColumnSpec>,
    {
        self.tables.insert(
            name.to_string(),
            columns
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    pub fn mixin<I, K, V>(mut self, name: &str, columns: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<ColumnSpec>,
    {
        self.mixins.insert(
            name.to_string(),
            columns
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    pub fn index(mut self, table: &str, name: &str, definition: &str) -> Self {
        self.indexes
            .entry(table.to_string())
            .or_default()
            .insert(name.to_string(), definition.to_string());
        self
    }
}

impl From<bool> for ColumnSpec {
    fn from(flag: bool) -> Self {
        ColumnSpec::Flag(flag)
    }
}
