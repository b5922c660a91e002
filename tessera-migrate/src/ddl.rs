//! DDL generation from the canonical schema.
//!
//! Used to synthesize the initial migration when a schema has no bundled
//! journal. Tables come first in declaration order, then their indexes.

pub use tessera_core::quote_ident;

use tessera_core::{CanonicalSchema, Column, ColumnMode, ColumnType, DefaultValue, Index, Table};

/// `'text'` with embedded quotes doubled.
pub fn quote_literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

fn render_default(column: &Column, default: &DefaultValue) -> String {
    match default {
        DefaultValue::Now => match (column.column_type, column.mode) {
            (ColumnType::Integer, Some(ColumnMode::TimestampMs)) => {
                "(unixepoch() * 1000)".to_string()
            }
            (ColumnType::Integer, _) => "(unixepoch())".to_string(),
            (ColumnType::Real, _) => "(unixepoch('subsec'))".to_string(),
            _ => "CURRENT_TIMESTAMP".to_string(),
        },
        DefaultValue::Null => "NULL".to_string(),
        DefaultValue::Integer(n) => n.to_string(),
        DefaultValue::Real(f) => f.to_string(),
        DefaultValue::Text(s) => quote_literal(s),
        DefaultValue::Sql(sql) => format!("({})", sql),
    }
}

/// Column clause of a `CREATE TABLE`.
pub fn column_definition(column: &Column) -> String {
    let name = quote_ident(&column.name);
    let mut parts = vec![name.clone(), column.column_type.sql_name().to_string()];

    if column.primary_key {
        parts.push("PRIMARY KEY".to_string());
    }
    if column.not_null {
        parts.push("NOT NULL".to_string());
    }
    if column.unique {
        parts.push("UNIQUE".to_string());
    }
    if let Some(default) = &column.default {
        parts.push(format!("DEFAULT {}", render_default(column, default)));
    }
    if let Some(values) = &column.enum_values {
        let list: Vec<String> = values.iter().map(|v| quote_literal(v)).collect();
        parts.push(format!("CHECK ({} IN ({}))", name, list.join(", ")));
    }
    if let Some(reference) = &column.references {
        let mut clause = format!(
            "REFERENCES {}({})",
            quote_ident(&reference.table),
            quote_ident(&reference.column)
        );
        if let Some(action) = reference.on_delete {
            clause.push_str(" ON DELETE ");
            clause.push_str(action.sql());
        }
        parts.push(clause);
    }

    parts.join(" ")
}

pub fn create_table_sql(table: &Table) -> String {
    let columns: Vec<String> = table.columns.iter().map(column_definition).collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote_ident(&table.name),
        columns.join(", ")
    )
}

pub fn create_index_sql(table: &Table, index: &Index) -> String {
    let columns: Vec<String> = index.columns.iter().map(|c| quote_ident(c)).collect();
    format!(
        "CREATE {}INDEX IF NOT EXISTS {} ON {} ({})",
        if index.unique { "UNIQUE " } else { "" },
        quote_ident(&index.name),
        quote_ident(&table.name),
        columns.join(", ")
    )
}

/// Every statement needed to create `schema` from nothing.
pub fn schema_statements(schema: &CanonicalSchema) -> Vec<String> {
    let tables = schema.tables.iter().map(create_table_sql);
    let indexes = schema
        .tables
        .iter()
        .flat_map(|t| t.indexes.iter().map(move |i| create_index_sql(t, i)));
    tables.chain(indexes).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::{OnDelete, Reference};

    #[test]
    fn test_users_table() {
        let table = Table::new(
            "users",
            vec![
                Column::new("id", ColumnType::Text).primary_key(),
                Column::new("email", ColumnType::Text).not_null().unique(),
            ],
        );
        assert_eq!(
            create_table_sql(&table),
            "CREATE TABLE IF NOT EXISTS \"users\" (\"id\" TEXT PRIMARY KEY, \"email\" TEXT NOT NULL UNIQUE)"
        );
    }

    #[test]
    fn test_enum_default_and_reference() {
        let mut role = Column::new("role", ColumnType::Text).not_null();
        role.enum_values = Some(vec!["admin".to_string(), "o'neil".to_string()]);
        role.default = Some(DefaultValue::Text("admin".to_string()));
        assert_eq!(
            column_definition(&role),
            "\"role\" TEXT NOT NULL DEFAULT 'admin' CHECK (\"role\" IN ('admin', 'o''neil'))"
        );

        let mut owner = Column::new("owner", ColumnType::Text);
        owner.references = Some(Reference {
            table: "users".to_string(),
            column: "id".to_string(),
            on_delete: Some(OnDelete::SetNull),
        });
        assert_eq!(
            column_definition(&owner),
            "\"owner\" TEXT REFERENCES \"users\"(\"id\") ON DELETE SET NULL"
        );
    }

    #[test]
    fn test_default_now_depends_on_type() {
        let mut created = Column::new("created_at", ColumnType::Integer)
            .with_mode(ColumnMode::TimestampMs);
        created.default = Some(DefaultValue::Now);
        assert!(column_definition(&created).ends_with("DEFAULT (unixepoch() * 1000)"));

        let mut stamp = Column::new("stamp", ColumnType::Text);
        stamp.default = Some(DefaultValue::Now);
        assert!(column_definition(&stamp).ends_with("DEFAULT CURRENT_TIMESTAMP"));

        let mut raw = Column::new("slug", ColumnType::Text);
        raw.default = Some(DefaultValue::Sql("lower('X')".to_string()));
        assert!(column_definition(&raw).ends_with("DEFAULT (lower('X'))"));
    }

    #[test]
    fn test_indexes_follow_tables() {
        let mut posts = Table::new("posts", vec![Column::new("author", ColumnType::Text)]);
        posts.indexes.push(Index {
            name: "posts_author_idx".to_string(),
            columns: vec!["author".to_string()],
            unique: true,
        });
        let schema = CanonicalSchema::new(
            "app",
            1,
            vec![posts, Table::new("tags", vec![Column::new("t", ColumnType::Text)])],
        );
        let statements = schema_statements(&schema);
        assert_eq!(statements.len(), 3);
        assert!(statements[1].starts_with("CREATE TABLE IF NOT EXISTS \"tags\""));
        assert_eq!(
            statements[2],
            "CREATE UNIQUE INDEX IF NOT EXISTS \"posts_author_idx\" ON \"posts\" (\"author\")"
        );
    }
}
