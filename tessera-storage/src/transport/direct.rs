//! In-process transport.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tessera_core::{Envelope, Statement};

use super::{SqlClient, TransportKind};
use crate::instance::SqliteInstance;

/// Calls the instance directly and synchronously.
#[derive(Debug, Clone)]
pub struct DirectClient {
    instance: Arc<SqliteInstance>,
}

impl DirectClient {
    pub fn new(instance: Arc<SqliteInstance>) -> Self {
        Self { instance }
    }

    pub fn instance(&self) -> &Arc<SqliteInstance> {
        &self.instance
    }
}

#[async_trait]
impl SqlClient for DirectClient {
    async fn query(&self, sql: &str, params: Vec<Value>) -> Envelope {
        self.instance.run(&Statement::new(sql, params))
    }

    async fn exec(&self, sql: &str) -> Envelope {
        self.instance.exec(sql)
    }

    async fn batch(&self, statements: Vec<Statement>) -> Envelope {
        self.instance.batch(&statements)
    }

    async fn raw(&self, sql: &str, params: Vec<Value>, column_names: bool) -> Envelope {
        self.instance.raw(&Statement::new(sql, params), column_names)
    }

    async fn first(&self, sql: &str, params: Vec<Value>, column_name: Option<&str>) -> Envelope {
        self.instance.first(&Statement::new(sql, params), column_name)
    }

    fn bookmark(&self) -> Option<String> {
        Some(self.instance.bookmark().to_string())
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Direct
    }

    fn db_name(&self) -> &str {
        self.instance.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tessera_core::StorageError;

    #[tokio::test]
    async fn test_direct_client_round_trip() -> Result<(), StorageError> {
        let client = DirectClient::new(Arc::new(SqliteInstance::open_in_memory("d")?));
        assert!(client.exec("CREATE TABLE kv (k TEXT PRIMARY KEY, v TEXT)").await.success);

        let before = client.bookmark();
        let put = client
            .query("INSERT INTO kv VALUES (?, ?)", vec![json!("a"), json!("1")])
            .await;
        assert!(put.success);
        assert_ne!(client.bookmark(), before);

        let got = client
            .first("SELECT v FROM kv WHERE k = ?", vec![json!("a")], Some("v"))
            .await;
        assert_eq!(got.data_value(), &json!("1"));
        assert_eq!(client.db_name(), "d");
        assert_eq!(client.kind(), TransportKind::Direct);
        Ok(())
    }
}
