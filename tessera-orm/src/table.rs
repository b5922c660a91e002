//! Table accessors and the chainable query builder.
//!
//! Every terminal operation compiles to exactly one parameterized statement.
//! Build errors (unknown columns, bad predicates) come back as failure
//! envelopes and nothing is sent.

use serde_json::{Map, Value};
use std::sync::Arc;
use tessera_core::{quote_ident, Envelope, Statement, Table};
use tessera_storage::SqlClient;
use tracing::debug;

use crate::codec::{check, decode_row, encode};
use crate::error::QueryBuildError;
use crate::predicate::{compile_predicate, resolve_column, where_clause, Condition};

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Order {
    #[default]
    Asc,
    Desc,
}

impl Order {
    pub fn sql(&self) -> &'static str {
        match self {
            Order::Asc => "ASC",
            Order::Desc => "DESC",
        }
    }
}

/// Accessor for one table of the canonical schema.
#[derive(Clone)]
pub struct TableAccessor {
    table: Arc<Table>,
    client: Arc<dyn SqlClient>,
}

impl std::fmt::Debug for TableAccessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableAccessor")
            .field("table", &self.table.name)
            .field("db", &self.client.db_name())
            .finish()
    }
}

impl TableAccessor {
    pub fn new(table: Arc<Table>, client: Arc<dyn SqlClient>) -> Self {
        Self { table, client }
    }

    pub fn name(&self) -> &str {
        &self.table.name
    }

    pub fn schema(&self) -> &Table {
        &self.table
    }

    /// Query over every row.
    pub fn query(&self) -> Query<'_> {
        Query {
            accessor: self,
            predicates: Vec::new(),
            order: Vec::new(),
            limit: None,
        }
    }

    pub fn filter(&self, predicate: Value) -> Query<'_> {
        self.query().filter(predicate)
    }

    pub fn order_by(&self, column: &str, order: Order) -> Query<'_> {
        self.query().order_by(column, order)
    }

    pub fn limit(&self, n: u64) -> Query<'_> {
        self.query().limit(n)
    }

    pub async fn many(&self) -> Envelope {
        self.query().many().await
    }

    pub async fn first(&self) -> Envelope {
        self.query().first().await
    }

    pub async fn count(&self) -> Envelope {
        self.query().count().await
    }

    /// `INSERT ... RETURNING *` for one row object.
    pub fn insert_statement(&self, row: &Value) -> Result<Statement, QueryBuildError> {
        let map = row
            .as_object()
            .ok_or(QueryBuildError::NotAnObject { what: "row" })?;
        let table = quote_ident(&self.table.name);
        if map.is_empty() {
            return Ok(Statement::bare(format!(
                "INSERT INTO {} DEFAULT VALUES RETURNING *",
                table
            )));
        }

        let mut columns = Vec::with_capacity(map.len());
        let mut params = Vec::with_capacity(map.len());
        for (name, value) in map {
            let column = resolve_column(&self.table, name)?;
            check(&self.table, column, value)?;
            columns.push(quote_ident(name));
            params.push(encode(column, value));
        }
        let marks = vec!["?"; params.len()].join(", ");
        Ok(Statement::new(
            format!(
                "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
                table,
                columns.join(", "),
                marks
            ),
            params,
        ))
    }

    /// Insert one row; `data` is the row as written, defaults included.
    pub async fn insert(&self, row: Value) -> Envelope {
        let statement = match self.insert_statement(&row) {
            Ok(statement) => statement,
            Err(e) => return Envelope::failure(e.to_string()),
        };
        let envelope = self.send(statement).await;
        if !envelope.success {
            return envelope;
        }
        let written = envelope
            .rows()
            .first()
            .cloned()
            .map(|row| decode_row(&self.table, row))
            .unwrap_or(Value::Null);
        Envelope::data(written, envelope.meta())
    }

    async fn send(&self, statement: Statement) -> Envelope {
        debug!(
            db = self.client.db_name(),
            table = %self.table.name,
            sql = %statement.query,
            "ORM statement"
        );
        self.client.query(&statement.query, statement.params).await
    }
}

/// Chainable query over one table.
#[derive(Debug, Clone)]
pub struct Query<'a> {
    accessor: &'a TableAccessor,
    predicates: Vec<Value>,
    order: Vec<(String, Order)>,
    limit: Option<u64>,
}

impl<'a> Query<'a> {
    /// Add a predicate; repeated calls AND together.
    pub fn filter(mut self, predicate: Value) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn order_by(mut self, column: &str, order: Order) -> Self {
        self.order.push((column.to_string(), order));
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    fn table(&self) -> &Table {
        &self.accessor.table
    }

    fn conditions(&self) -> Result<Vec<Condition>, QueryBuildError> {
        let mut conditions = Vec::new();
        for predicate in &self.predicates {
            conditions.extend(compile_predicate(self.table(), predicate)?);
        }
        Ok(conditions)
    }

    /// `SELECT *` with an optional cap applied on top of `limit`.
    pub fn select_statement(&self, cap: Option<u64>) -> Result<Statement, QueryBuildError> {
        let mut params = Vec::new();
        let mut sql = format!("SELECT * FROM {}", quote_ident(&self.table().name));
        sql.push_str(&where_clause(&self.conditions()?, &mut params));

        if !self.order.is_empty() {
            let mut terms = Vec::with_capacity(self.order.len());
            for (column, order) in &self.order {
                resolve_column(self.table(), column)?;
                terms.push(format!("{} {}", quote_ident(column), order.sql()));
            }
            sql.push_str(" ORDER BY ");
            sql.push_str(&terms.join(", "));
        }

        let limit = match (self.limit, cap) {
            (Some(l), Some(c)) => Some(l.min(c)),
            (l, c) => l.or(c),
        };
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        Ok(Statement::new(sql, params))
    }

    pub fn count_statement(&self) -> Result<Statement, QueryBuildError> {
        let mut params = Vec::new();
        let mut sql = format!(
            "SELECT COUNT(*) AS count FROM {}",
            quote_ident(&self.table().name)
        );
        sql.push_str(&where_clause(&self.conditions()?, &mut params));
        Ok(Statement::new(sql, params))
    }

    pub fn update_statement(&self, patch: &Value) -> Result<Statement, QueryBuildError> {
        let map: &Map<String, Value> = patch
            .as_object()
            .ok_or(QueryBuildError::NotAnObject { what: "patch" })?;
        if map.is_empty() {
            return Err(QueryBuildError::EmptyPatch);
        }

        let mut params = Vec::with_capacity(map.len());
        let mut assignments = Vec::with_capacity(map.len());
        for (name, value) in map {
            let column = resolve_column(self.table(), name)?;
            check(self.table(), column, value)?;
            assignments.push(format!("{} = ?", quote_ident(name)));
            params.push(encode(column, value));
        }
        let mut sql = format!(
            "UPDATE {} SET {}",
            quote_ident(&self.table().name),
            assignments.join(", ")
        );
        sql.push_str(&where_clause(&self.conditions()?, &mut params));
        Ok(Statement::new(sql, params))
    }

    pub fn delete_statement(&self) -> Result<Statement, QueryBuildError> {
        let mut params = Vec::new();
        let mut sql = format!("DELETE FROM {}", quote_ident(&self.table().name));
        sql.push_str(&where_clause(&self.conditions()?, &mut params));
        Ok(Statement::new(sql, params))
    }

    async fn fetch(&self, cap: Option<u64>) -> Result<(Vec<Value>, Envelope), Envelope> {
        let statement = self
            .select_statement(cap)
            .map_err(|e| Envelope::failure(e.to_string()))?;
        let envelope = self.accessor.send(statement).await;
        if !envelope.success {
            return Err(envelope);
        }
        let rows = envelope
            .rows()
            .iter()
            .cloned()
            .map(|row| decode_row(self.table(), row))
            .collect();
        Ok((rows, envelope))
    }

    /// All matching rows, decoded.
    pub async fn many(&self) -> Envelope {
        match self.fetch(None).await {
            Ok((rows, envelope)) => Envelope::results(rows, envelope.meta()),
            Err(failure) => failure,
        }
    }

    /// First matching row, or `data: null` when nothing matches.
    pub async fn first(&self) -> Envelope {
        match self.fetch(Some(1)).await {
            Ok((rows, envelope)) => {
                let row = rows.into_iter().next().unwrap_or(Value::Null);
                Envelope::data(row, envelope.meta())
            }
            Err(failure) => failure,
        }
    }

    /// The single matching row; zero or several matches are a failure.
    ///
    /// A caller `limit` is ignored so a second match is always seen.
    pub async fn one(&self) -> Envelope {
        let unlimited = Query {
            limit: None,
            ..self.clone()
        };
        match unlimited.fetch(Some(2)).await {
            Ok((mut rows, envelope)) if rows.len() == 1 => {
                Envelope::data(rows.remove(0), envelope.meta())
            }
            Ok((rows, _)) => Envelope::failure(format!(
                "expected exactly one row, found {}",
                rows.len()
            )),
            Err(failure) => failure,
        }
    }

    pub async fn count(&self) -> Envelope {
        let statement = match self.count_statement() {
            Ok(statement) => statement,
            Err(e) => return Envelope::failure(e.to_string()),
        };
        let envelope = self.accessor.send(statement).await;
        if !envelope.success {
            return envelope;
        }
        let count = envelope
            .rows()
            .first()
            .and_then(|row| row.get("count"))
            .cloned()
            .unwrap_or(Value::from(0));
        Envelope::data(count, envelope.meta())
    }

    /// Apply `patch` to every matching row; `meta.rowsWritten` is the count.
    pub async fn update(&self, patch: Value) -> Envelope {
        match self.update_statement(&patch) {
            Ok(statement) => self.write(statement).await,
            Err(e) => Envelope::failure(e.to_string()),
        }
    }

    /// Delete every matching row; `meta.rowsWritten` is the count.
    pub async fn delete(&self) -> Envelope {
        match self.delete_statement() {
            Ok(statement) => self.write(statement).await,
            Err(e) => Envelope::failure(e.to_string()),
        }
    }

    async fn write(&self, statement: Statement) -> Envelope {
        let envelope = self.accessor.send(statement).await;
        if envelope.success {
            Envelope::meta_only(envelope.meta())
        } else {
            envelope
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tessera_core::{Column, ColumnType, StorageError};
    use tessera_storage::{DirectClient, SqliteInstance};

    fn accessor() -> Result<TableAccessor, StorageError> {
        let table = Table::new(
            "users",
            vec![
                Column::new("id", ColumnType::Text).primary_key(),
                Column::new("age", ColumnType::Integer),
                Column::new("profile", ColumnType::Json),
            ],
        );
        let instance = Arc::new(SqliteInstance::open_in_memory("orm")?);
        Ok(TableAccessor::new(
            Arc::new(table),
            Arc::new(DirectClient::new(instance)),
        ))
    }

    #[test]
    fn test_select_composition() -> Result<(), Box<dyn std::error::Error>> {
        let users = accessor()?;
        let statement = users
            .filter(json!({"age": {"gt": 18}}))
            .filter(json!({"id": {"in": ["a", "b"]}}))
            .order_by("age", Order::Desc)
            .limit(10)
            .select_statement(Some(2))?;
        assert_eq!(
            statement.query,
            "SELECT * FROM \"users\" WHERE \"age\" > ? AND \"id\" IN (?, ?) ORDER BY \"age\" DESC LIMIT 2"
        );
        assert_eq!(statement.params, vec![json!(18), json!("a"), json!("b")]);
        Ok(())
    }

    #[test]
    fn test_write_statements() -> Result<(), Box<dyn std::error::Error>> {
        let users = accessor()?;
        let insert = users.insert_statement(&json!({"id": "u1", "profile": {"a": 1}}))?;
        assert_eq!(
            insert.query,
            "INSERT INTO \"users\" (\"id\", \"profile\") VALUES (?, ?) RETURNING *"
        );
        assert_eq!(insert.params, vec![json!("u1"), json!("{\"a\":1}")]);

        let update = users
            .filter(json!({"id": "u1"}))
            .update_statement(&json!({"age": 30}))?;
        assert_eq!(update.query, "UPDATE \"users\" SET \"age\" = ? WHERE \"id\" = ?");
        assert_eq!(update.params, vec![json!(30), json!("u1")]);

        let delete = users.query().delete_statement()?;
        assert_eq!(delete.query, "DELETE FROM \"users\"");
        Ok(())
    }

    #[test]
    fn test_unknown_identifiers_are_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let users = accessor()?;
        assert!(matches!(
            users.order_by("age; DROP TABLE users", Order::Asc).select_statement(None),
            Err(QueryBuildError::UnknownColumn { .. })
        ));
        assert!(matches!(
            users.insert_statement(&json!({"nope": 1})),
            Err(QueryBuildError::UnknownColumn { .. })
        ));
        assert_eq!(
            users.query().update_statement(&json!({})),
            Err(QueryBuildError::EmptyPatch)
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_build_errors_surface_as_failures() -> Result<(), StorageError> {
        let users = accessor()?;
        let envelope = users.filter(json!({"nope": 1})).many().await;
        assert!(!envelope.success);
        assert_eq!(envelope.error_message(), Some("no such column: users.nope"));
        Ok(())
    }
}
