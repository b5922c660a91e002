//! Migration journals, bundles and the per-schema catalog.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tessera_core::{CanonicalSchema, MigrationError};

use crate::ddl::schema_statements;

/// Journal file inside a migrations directory.
pub const JOURNAL_PATH: &str = "meta/_journal.json";

/// One ordered journal entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub idx: u32,
    pub tag: String,
    /// Authoring time in epoch milliseconds, informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct JournalFile {
    #[serde(default)]
    entries: Vec<JournalEntry>,
}

/// Ordered journal plus the SQL text for every tag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationBundle {
    journal: Vec<JournalEntry>,
    sql: HashMap<String, String>,
}

impl MigrationBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a migration at the end of the journal. Indexes start at 1.
    pub fn with_migration(mut self, tag: impl Into<String>, sql: impl Into<String>) -> Self {
        let tag = tag.into();
        let idx = self.journal.last().map_or(1, |e| e.idx.saturating_add(1));
        self.journal.push(JournalEntry {
            idx,
            tag: tag.clone(),
            when: None,
        });
        self.sql.insert(tag, sql.into());
        self
    }

    /// Build from an explicit journal and SQL map. Entries are ordered by
    /// `idx`; a tag without SQL is reported when it is applied.
    pub fn from_parts(mut journal: Vec<JournalEntry>, sql: HashMap<String, String>) -> Self {
        journal.sort_by_key(|e| e.idx);
        Self { journal, sql }
    }

    /// Load a migrations directory: `meta/_journal.json` plus `<tag>.sql`.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, MigrationError> {
        let dir = dir.as_ref();
        let journal_path = dir.join(JOURNAL_PATH);
        let text = fs::read_to_string(&journal_path).map_err(|e| MigrationError::Bundle {
            reason: format!("failed to read {}: {}", journal_path.display(), e),
        })?;
        let journal: JournalFile =
            serde_json::from_str(&text).map_err(|e| MigrationError::Bundle {
                reason: format!("invalid journal {}: {}", journal_path.display(), e),
            })?;

        let mut sql = HashMap::with_capacity(journal.entries.len());
        for entry in &journal.entries {
            let path = dir.join(format!("{}.sql", entry.tag));
            // Missing files surface as MissingLoader when the entry is applied.
            if let Ok(text) = fs::read_to_string(&path) {
                sql.insert(entry.tag.clone(), text);
            }
        }

        Ok(Self::from_parts(journal.entries, sql))
    }

    /// Single-entry bundle that creates `schema` from nothing.
    pub fn fallback(schema_name: &str, schema: &CanonicalSchema) -> Self {
        let mut script = schema_statements(schema).join(";\n");
        script.push(';');
        Self::new().with_migration(fallback_tag(schema_name), script)
    }

    pub fn journal(&self) -> &[JournalEntry] {
        &self.journal
    }

    pub fn sql_for(&self, tag: &str) -> Option<&str> {
        self.sql.get(tag).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.journal.is_empty()
    }

    pub fn len(&self) -> usize {
        self.journal.len()
    }
}

/// Tag of the synthesized initial migration.
pub fn fallback_tag(schema_name: &str) -> String {
    format!("0000_initial_{}", schema_name)
}

/// Bundles registered by schema name.
#[derive(Debug, Clone, Default)]
pub struct MigrationCatalog {
    bundles: HashMap<String, MigrationBundle>,
}

impl MigrationCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, schema_name: impl Into<String>, bundle: MigrationBundle) {
        self.bundles.insert(schema_name.into(), bundle);
    }

    pub fn with_bundle(mut self, schema_name: impl Into<String>, bundle: MigrationBundle) -> Self {
        self.register(schema_name, bundle);
        self
    }

    /// Non-empty bundle for `schema_name`.
    pub fn get(&self, schema_name: &str) -> Option<&MigrationBundle> {
        self.bundles.get(schema_name).filter(|b| !b.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::{Column, ColumnType, Table};

    #[test]
    fn test_from_dir_reads_journal_in_index_order() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        fs::create_dir_all(dir.path().join("meta"))?;
        fs::write(
            dir.path().join(JOURNAL_PATH),
            r#"{"version":"7","dialect":"sqlite","entries":[
                {"idx":1,"version":"6","when":1700000001000,"tag":"0001_posts","breakpoints":true},
                {"idx":0,"version":"6","when":1700000000000,"tag":"0000_users","breakpoints":true}
            ]}"#,
        )?;
        fs::write(dir.path().join("0000_users.sql"), "CREATE TABLE users (id TEXT);")?;

        let bundle = MigrationBundle::from_dir(dir.path())?;
        let tags: Vec<&str> = bundle.journal().iter().map(|e| e.tag.as_str()).collect();
        assert_eq!(tags, vec!["0000_users", "0001_posts"]);
        assert!(bundle.sql_for("0000_users").is_some());
        assert!(bundle.sql_for("0001_posts").is_none());
        Ok(())
    }

    #[test]
    fn test_from_dir_without_journal_is_bundle_error() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        assert!(matches!(
            MigrationBundle::from_dir(dir.path()),
            Err(MigrationError::Bundle { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_fallback_bundle() {
        let schema = CanonicalSchema::new(
            "app",
            1,
            vec![Table::new("users", vec![Column::new("id", ColumnType::Text).primary_key()])],
        );
        let bundle = MigrationBundle::fallback("app", &schema);
        assert_eq!(bundle.len(), 1);
        assert_eq!(bundle.journal()[0].tag, "0000_initial_app");
        assert_eq!(bundle.journal()[0].idx, 1);
        assert_eq!(
            bundle.sql_for("0000_initial_app"),
            Some("CREATE TABLE IF NOT EXISTS \"users\" (\"id\" TEXT PRIMARY KEY);")
        );
    }

    #[test]
    fn test_catalog_ignores_empty_bundles() {
        let catalog = MigrationCatalog::new()
            .with_bundle("empty", MigrationBundle::new())
            .with_bundle("app", MigrationBundle::new().with_migration("0000_a", "SELECT 1"));
        assert!(catalog.get("empty").is_none());
        assert!(catalog.get("app").is_some());
        assert!(catalog.get("missing").is_none());
    }

    #[test]
    fn test_appended_entries_are_numbered_from_one() {
        let bundle = MigrationBundle::new()
            .with_migration("0000_users", "CREATE TABLE users (id TEXT)")
            .with_migration("0001_posts", "CREATE TABLE posts (id TEXT)");
        let indexes: Vec<u32> = bundle.journal().iter().map(|e| e.idx).collect();
        assert_eq!(indexes, vec![1, 2]);
    }
}
