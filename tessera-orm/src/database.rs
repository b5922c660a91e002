//! Schema-bound database handle.

use indexmap::IndexMap;
use std::sync::Arc;
use tessera_core::CanonicalSchema;
use tessera_storage::SqlClient;

use crate::table::TableAccessor;

/// One accessor per table of a canonical schema, over one client.
///
/// The map is built once from the schema, in declaration order.
#[derive(Clone)]
pub struct Database {
    schema: Arc<CanonicalSchema>,
    tables: IndexMap<String, TableAccessor>,
    client: Arc<dyn SqlClient>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("db", &self.client.db_name())
            .field("schema", &self.schema.name)
            .field("tables", &self.tables.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Database {
    pub fn new(schema: Arc<CanonicalSchema>, client: Arc<dyn SqlClient>) -> Self {
        let tables = schema
            .tables
            .iter()
            .map(|table| {
                let accessor = TableAccessor::new(Arc::new(table.clone()), Arc::clone(&client));
                (table.name.clone(), accessor)
            })
            .collect();
        Self {
            schema,
            tables,
            client,
        }
    }

    pub fn table(&self, name: &str) -> Option<&TableAccessor> {
        self.tables.get(name)
    }

    pub fn tables(&self) -> impl Iterator<Item = &TableAccessor> {
        self.tables.values()
    }

    pub fn schema(&self) -> &CanonicalSchema {
        &self.schema
    }

    /// Underlying client, for raw SQL.
    pub fn client(&self) -> &Arc<dyn SqlClient> {
        &self.client
    }

    pub fn db_name(&self) -> &str {
        self.client.db_name()
    }
}
