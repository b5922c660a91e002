//! A single SQLite-backed logical database.
//!
//! One connection per instance behind a mutex; every operation runs to
//! completion while holding it. A commit sequence counter advances on every
//! successful write and is exposed as the instance [`Bookmark`].

use rusqlite::{params_from_iter, Connection};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use tessera_core::{batch_failure_message, Bookmark, Envelope, Meta, Statement, StorageError};
use tracing::{debug, warn};

use crate::value::{from_sql, to_sql};

/// Map a rusqlite error into the storage taxonomy.
pub(crate) fn to_storage_err(e: rusqlite::Error) -> StorageError {
    StorageError::Sqlite {
        reason: e.to_string(),
    }
}

/// Pragmas applied to every connection.
const PRAGMAS: &str = "
    PRAGMA journal_mode = WAL;
    PRAGMA synchronous = NORMAL;
    PRAGMA busy_timeout = 5000;
    PRAGMA foreign_keys = ON;
";

/// Column names plus rows of one executed statement.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutput {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub meta: Meta,
    /// False when the statement may have modified the database.
    pub readonly: bool,
}

impl QueryOutput {
    /// Rows as `{column: value}` objects in column order.
    pub fn objects(&self) -> Vec<Value> {
        self.rows.iter().map(|row| self.object(row)).collect()
    }

    fn object(&self, row: &[Value]) -> Value {
        let map: Map<String, Value> = self
            .columns
            .iter()
            .cloned()
            .zip(row.iter().cloned())
            .collect();
        Value::Object(map)
    }
}

/// Execute one statement and collect every row.
fn query_rows(conn: &Connection, statement: &Statement) -> Result<QueryOutput, StorageError> {
    let mut stmt = conn.prepare(&statement.query).map_err(to_storage_err)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let readonly = stmt.readonly();

    let params: Vec<_> = statement.params.iter().map(to_sql).collect();
    let mut rows = stmt
        .query(params_from_iter(params.iter()))
        .map_err(to_storage_err)?;

    let mut out = Vec::new();
    while let Some(row) = rows.next().map_err(to_storage_err)? {
        let mut values = Vec::with_capacity(columns.len());
        for i in 0..columns.len() {
            values.push(from_sql(row.get_ref(i).map_err(to_storage_err)?));
        }
        out.push(values);
    }
    drop(rows);

    // changes() only tracks INSERT/UPDATE/DELETE; after DDL it is stale.
    let rows_written = if !readonly && is_dml(&statement.query) {
        conn.changes() as u64
    } else {
        0
    };
    let meta = Meta::new(out.len() as u64, rows_written);
    Ok(QueryOutput {
        columns,
        rows: out,
        meta,
        readonly,
    })
}

fn is_dml(sql: &str) -> bool {
    let keyword: String = sql
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    matches!(
        keyword.to_ascii_uppercase().as_str(),
        "INSERT" | "UPDATE" | "DELETE" | "REPLACE" | "WITH"
    )
}

/// A logical database backed by one SQLite connection.
pub struct SqliteInstance {
    name: String,
    path: Option<PathBuf>,
    conn: Mutex<Connection>,
    commit_seq: AtomicU64,
}

impl std::fmt::Debug for SqliteInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteInstance")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("commit_seq", &self.commit_seq.load(Ordering::Acquire))
            .finish()
    }
}

impl SqliteInstance {
    /// Open an in-memory instance.
    pub fn open_in_memory(name: impl Into<String>) -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory().map_err(to_storage_err)?;
        Self::from_connection(name.into(), None, conn)
    }

    /// Open (or create) a file-backed instance.
    pub fn open(name: impl Into<String>, path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path).map_err(to_storage_err)?;
        Self::from_connection(name.into(), Some(path), conn)
    }

    fn from_connection(
        name: String,
        path: Option<PathBuf>,
        conn: Connection,
    ) -> Result<Self, StorageError> {
        conn.execute_batch(PRAGMAS).map_err(to_storage_err)?;
        Ok(Self {
            name,
            path,
            conn: Mutex::new(conn),
            commit_seq: AtomicU64::new(0),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// On-disk location, `None` for in-memory instances.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Current consistency point.
    pub fn bookmark(&self) -> Bookmark {
        Bookmark(self.commit_seq.load(Ordering::Acquire))
    }

    /// Check that this instance has caught up with a caller-held bookmark.
    ///
    /// A single authoritative instance always has; a bookmark from the
    /// future means the caller talked to a different lineage of this name.
    pub fn observe(&self, requested: Bookmark) -> Result<(), StorageError> {
        let current = self.bookmark();
        if requested > current {
            return Err(StorageError::BookmarkAhead {
                requested: requested.to_string(),
                current: current.to_string(),
            });
        }
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }

    fn advance(&self) {
        self.commit_seq.fetch_add(1, Ordering::AcqRel);
    }

    /// Execute one statement, collecting rows and row accounting.
    pub fn execute(&self, statement: &Statement) -> Result<QueryOutput, StorageError> {
        let conn = self.lock()?;
        let output = query_rows(&conn, statement)?;
        if !output.readonly {
            self.advance();
        }
        Ok(output)
    }

    /// `run`: parameterized execute-and-collect.
    pub fn run(&self, statement: &Statement) -> Envelope {
        match self.execute(statement) {
            Ok(output) => Envelope::results(output.objects(), output.meta),
            Err(e) => self.failure(e),
        }
    }

    /// `exec`: raw (possibly multi-statement) DDL without parameters.
    pub fn exec(&self, sql: &str) -> Envelope {
        let result = self.lock().and_then(|conn| {
            conn.execute_batch(sql).map_err(to_storage_err)?;
            Ok(())
        });
        match result {
            Ok(()) => {
                self.advance();
                Envelope::meta_only(Meta::default())
            }
            Err(e) => self.failure(e),
        }
    }

    /// `batch`: all statements in one transaction, then a durability flush.
    ///
    /// On failure nothing is committed and the error names the 1-based index
    /// of the failing statement.
    pub fn batch(&self, statements: &[Statement]) -> Envelope {
        match self.try_batch(statements) {
            Ok(results) => {
                let meta = results.iter().fold(Meta::default(), |acc, (_, m)| acc.merge(*m));
                let results = results
                    .into_iter()
                    .map(|(rows, meta)| {
                        serde_json::json!({"success": true, "results": rows, "meta": meta})
                    })
                    .collect();
                Envelope::results(results, meta)
            }
            Err(e) => {
                warn!(db = %self.name, error = %e, "Batch rolled back");
                Envelope::failure(e)
            }
        }
    }

    fn try_batch(&self, statements: &[Statement]) -> Result<Vec<(Vec<Value>, Meta)>, String> {
        let mut conn = self.lock().map_err(|e| e.to_string())?;
        let tx = conn.transaction().map_err(|e| e.to_string())?;

        let mut results = Vec::with_capacity(statements.len());
        for (i, statement) in statements.iter().enumerate() {
            match query_rows(&tx, statement) {
                Ok(output) => results.push((output.objects(), output.meta)),
                Err(e) => return Err(batch_failure_message(i + 1, &reason(&e))),
            }
        }

        tx.commit().map_err(|e| e.to_string())?;
        self.flush(&conn).map_err(|e| e.to_string())?;
        self.advance();
        debug!(db = %self.name, statements = statements.len(), "Batch committed");
        Ok(results)
    }

    /// Checkpoint the WAL so acknowledged writes are in the main file.
    fn flush(&self, conn: &Connection) -> Result<(), StorageError> {
        if self.path.is_some() {
            conn.query_row("PRAGMA wal_checkpoint(PASSIVE)", [], |_| Ok(()))
                .map_err(to_storage_err)?;
        }
        Ok(())
    }

    /// `raw`: rows as arrays, optionally headed by a row of column names.
    pub fn raw(&self, statement: &Statement, column_names: bool) -> Envelope {
        match self.execute(statement) {
            Ok(output) => {
                let mut results = Vec::with_capacity(output.rows.len() + 1);
                if column_names {
                    results.push(Value::Array(
                        output.columns.iter().cloned().map(Value::String).collect(),
                    ));
                }
                results.extend(output.rows.into_iter().map(Value::Array));
                Envelope::results(results, output.meta)
            }
            Err(e) => self.failure(e),
        }
    }

    /// `first`: zero rows is `data: null`, more than one is a failure.
    pub fn first(&self, statement: &Statement, column_name: Option<&str>) -> Envelope {
        let output = match self.execute(statement) {
            Ok(output) => output,
            Err(e) => return self.failure(e),
        };

        match output.rows.len() {
            0 => Envelope::data(Value::Null, output.meta),
            1 => {
                let row = &output.rows[0];
                let data = match column_name {
                    None => output.object(row),
                    Some(column) => match output.columns.iter().position(|c| c == column) {
                        Some(i) => row[i].clone(),
                        None => {
                            return Envelope::failure(format!("no such column: {}", column));
                        }
                    },
                };
                Envelope::data(data, output.meta)
            }
            n => Envelope::failure(format!("expected at most one row, found {}", n)),
        }
    }

    fn failure(&self, error: StorageError) -> Envelope {
        debug!(db = %self.name, error = %error, "Statement failed");
        Envelope::failure(reason(&error))
    }
}

/// Engine message without the taxonomy prefix.
fn reason(error: &StorageError) -> String {
    match error {
        StorageError::Sqlite { reason } => reason.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn users() -> Result<SqliteInstance, StorageError> {
        let db = SqliteInstance::open_in_memory("t")?;
        let setup = db.exec(
            "CREATE TABLE users (id TEXT PRIMARY KEY, email TEXT NOT NULL UNIQUE, n INTEGER, blob BLOB)",
        );
        assert!(setup.success, "{:?}", setup.error);
        Ok(db)
    }

    fn insert(db: &SqliteInstance, id: &str, email: &str) -> Envelope {
        db.run(&Statement::new(
            "INSERT INTO users (id, email) VALUES (?, ?)",
            vec![json!(id), json!(email)],
        ))
    }

    #[test]
    fn test_run_reports_rows_written_and_read() -> Result<(), StorageError> {
        let db = users()?;
        let written = insert(&db, "u1", "a@b.com");
        assert!(written.success);
        assert_eq!(written.meta(), Meta::new(0, 1));

        let read = db.run(&Statement::bare("SELECT id, email FROM users"));
        assert_eq!(read.rows(), &[json!({"id": "u1", "email": "a@b.com"})]);
        assert_eq!(read.meta().rows_read, 1);
        Ok(())
    }

    #[test]
    fn test_constraint_violation_is_failure_envelope() -> Result<(), StorageError> {
        let db = users()?;
        assert!(insert(&db, "u1", "a@b.com").success);
        let dup = insert(&db, "u2", "a@b.com");
        assert!(!dup.success);
        assert!(dup
            .error_message()
            .map(|e| e.contains("UNIQUE"))
            .unwrap_or(false));
        Ok(())
    }

    #[test]
    fn test_first_zero_one_many() -> Result<(), StorageError> {
        let db = users()?;
        let none = db.first(&Statement::bare("SELECT * FROM users"), None);
        assert!(none.success);
        assert_eq!(none.data, Some(Value::Null));

        insert(&db, "u1", "a@b.com");
        let one = db.first(&Statement::bare("SELECT email FROM users"), Some("email"));
        assert_eq!(one.data_value(), &json!("a@b.com"));

        insert(&db, "u2", "c@d.com");
        let many = db.first(&Statement::bare("SELECT * FROM users"), None);
        assert!(!many.success);
        assert_eq!(
            many.error_message(),
            Some("expected at most one row, found 2")
        );
        Ok(())
    }

    #[test]
    fn test_raw_with_header_row() -> Result<(), StorageError> {
        let db = users()?;
        insert(&db, "u1", "a@b.com");
        let raw = db.raw(&Statement::bare("SELECT id, email FROM users"), true);
        assert_eq!(raw.rows(), &[json!(["id", "email"]), json!(["u1", "a@b.com"])]);
        Ok(())
    }

    #[test]
    fn test_batch_is_atomic() -> Result<(), StorageError> {
        let db = users()?;
        let before = db.bookmark();
        let result = db.batch(&[
            Statement::new(
                "INSERT INTO users (id, email) VALUES (?, ?)",
                vec![json!("u3"), json!("c@d.com")],
            ),
            Statement::bare("INSERT INTO not_a_table VALUES (1)"),
        ]);
        assert!(!result.success);
        assert!(result
            .error_message()
            .map(|e| e.starts_with("statement 2: "))
            .unwrap_or(false));

        let count = db.first(&Statement::bare("SELECT COUNT(*) AS n FROM users"), Some("n"));
        assert_eq!(count.data_value(), &json!(0));
        assert_eq!(db.bookmark(), before);
        Ok(())
    }

    #[test]
    fn test_batch_success_advances_bookmark() -> Result<(), StorageError> {
        let db = users()?;
        let before = db.bookmark();
        let result = db.batch(&[
            Statement::new(
                "INSERT INTO users (id, email) VALUES (?, ?)",
                vec![json!("u1"), json!("a@b.com")],
            ),
            Statement::bare("SELECT id FROM users"),
        ]);
        assert!(result.success);
        assert_eq!(result.rows().len(), 2);
        assert_eq!(result.rows()[1]["results"], json!([{"id": "u1"}]));
        assert_eq!(result.meta(), Meta::new(1, 1));
        assert!(db.bookmark() > before);
        Ok(())
    }

    #[test]
    fn test_observe_rejects_future_bookmark() -> Result<(), StorageError> {
        let db = users()?;
        assert!(db.observe(db.bookmark()).is_ok());
        let future = Bookmark(db.bookmark().0 + 10);
        assert!(matches!(
            db.observe(future),
            Err(StorageError::BookmarkAhead { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_bool_and_blob_values() -> Result<(), StorageError> {
        let db = users()?;
        db.run(&Statement::new(
            "INSERT INTO users (id, email, n, blob) VALUES (?, ?, ?, x'0102')",
            vec![json!("u1"), json!("a@b.com"), json!(true)],
        ));
        let row = db.first(&Statement::bare("SELECT n, blob FROM users"), None);
        assert_eq!(row.data_value(), &json!({"n": 1, "blob": [1, 2]}));
        Ok(())
    }

    #[test]
    fn test_ddl_does_not_report_stale_changes() -> Result<(), StorageError> {
        let db = users()?;
        insert(&db, "u1", "a@b.com");
        let ddl = db.run(&Statement::bare("CREATE TABLE posts (id INTEGER)"));
        assert!(ddl.success);
        assert_eq!(ddl.meta().rows_written, 0);
        Ok(())
    }

    #[test]
    fn test_file_backed_instance_uses_wal() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let db = SqliteInstance::open("f", dir.path().join("f.sqlite"))?;
        let mode = db.first(&Statement::bare("PRAGMA journal_mode"), Some("journal_mode"));
        assert_eq!(mode.data_value(), &json!("wal"));
        assert!(db.batch(&[Statement::bare("CREATE TABLE t (x INTEGER)")]).success);
        Ok(())
    }
}
