//! Direct-transport behaviour through the `SqlClient` trait object.

use serde_json::json;
use std::sync::Arc;
use tessera_core::{Statement, StorageError};
use tessera_storage::{connect, InstanceRegistry, SqlClient, TransportStrategy};

async fn users_client(registry: &InstanceRegistry) -> Result<Arc<dyn SqlClient>, StorageError> {
    registry.create("tenant-42")?;
    let client = connect(&TransportStrategy::Direct, registry, "tenant-42", "unused")?;
    let ddl = client
        .exec("CREATE TABLE users (id TEXT PRIMARY KEY, email TEXT NOT NULL UNIQUE)")
        .await;
    assert!(ddl.success, "{:?}", ddl.error);
    Ok(client)
}

#[tokio::test]
async fn test_batch_failure_leaves_no_partial_writes() -> Result<(), StorageError> {
    let registry = InstanceRegistry::in_memory();
    let client = users_client(&registry).await?;

    let batch = client
        .batch(vec![
            Statement::new(
                "INSERT INTO users(id,email) VALUES(?,?)",
                vec![json!("u3"), json!("c@d.com")],
            ),
            Statement::bare("INSERT INTO not_a_table VALUES (1)"),
        ])
        .await;
    assert!(!batch.success);

    let read = client
        .first("SELECT * FROM users WHERE id = ?", vec![json!("u3")], None)
        .await;
    assert!(read.success);
    assert_eq!(read.data, Some(serde_json::Value::Null));
    Ok(())
}

#[tokio::test]
async fn test_clients_share_the_bound_instance() -> Result<(), StorageError> {
    let registry = InstanceRegistry::in_memory();
    let writer = users_client(&registry).await?;
    let reader = connect(&TransportStrategy::Direct, &registry, "tenant-42", "unused")?;

    let put = writer
        .query(
            "INSERT INTO users(id,email) VALUES(?,?)",
            vec![json!("u1"), json!("a@b.com")],
        )
        .await;
    assert!(put.success);
    assert_eq!(put.meta().rows_written, 1);

    let raw = reader
        .raw("SELECT id, email FROM users", Vec::new(), false)
        .await;
    assert_eq!(raw.rows(), &[json!(["u1", "a@b.com"])]);
    assert_eq!(writer.bookmark(), reader.bookmark());
    Ok(())
}
