//! Tessera Test Utilities
//!
//! Centralized test infrastructure for the Tessera workspace:
//! - Proptest generators for names, secrets and column definitions
//! - Test fixtures for schemas and bound in-memory databases
//! - Custom assertions for result envelopes

// Re-export core types for convenience
pub use tessera_core::{
    CanonicalSchema, Column, ColumnType, Envelope, Meta, Statement, StorageError, Table,
    TesseraError, TesseraResult,
};
pub use tessera_dsl::{compile, SchemaSource};
pub use tessera_storage::{connect, InstanceRegistry, SqlClient, TransportStrategy};

use std::sync::Arc;

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for generating Tessera inputs.

    use proptest::prelude::*;

    /// Generate a valid logical database name.
    pub fn arb_db_name() -> impl Strategy<Value = String> {
        "[A-Za-z0-9_-]{1,63}"
    }

    /// Generate a tenant id as an external identity layer would hand it out.
    pub fn arb_tenant_id() -> impl Strategy<Value = String> {
        "[a-z0-9]{1,16}"
    }

    /// Generate a non-empty signing secret.
    pub fn arb_secret() -> impl Strategy<Value = String> {
        "[ -~]{16,64}"
    }

    /// Generate a positive token TTL in milliseconds.
    pub fn arb_ttl_ms() -> impl Strategy<Value = i64> {
        1i64..=86_400_000
    }

    /// Generate a base column type word.
    pub fn arb_type_word() -> impl Strategy<Value = &'static str> {
        prop_oneof![
            Just("text"),
            Just("integer"),
            Just("real"),
            Just("blob"),
            Just("json"),
            Just("boolean"),
            Just("timestamp_ms"),
        ]
    }

    /// Generate a well-formed column definition string.
    pub fn arb_column_definition() -> impl Strategy<Value = String> {
        (
            arb_type_word(),
            any::<bool>(),
            any::<bool>(),
            any::<bool>(),
        )
            .prop_map(|(ty, pk, not_null, unique)| {
                let mut parts = vec![ty.to_string()];
                if pk {
                    parts.push("primary key".to_string());
                }
                if not_null {
                    parts.push("not null".to_string());
                }
                if unique {
                    parts.push("unique".to_string());
                }
                parts.join(" ")
            })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built test fixtures for common testing scenarios.

    use super::*;

    /// `users(id text primary key, email text not null unique)`.
    pub fn users_schema() -> CanonicalSchema {
        CanonicalSchema::new(
            "app",
            1,
            vec![Table::new(
                "users",
                vec![
                    Column::new("id", ColumnType::Text).primary_key(),
                    Column::new("email", ColumnType::Text).not_null().unique(),
                ],
            )],
        )
    }

    /// Source text of a schema exercising json, boolean and reference columns.
    pub const APP_SCHEMA_YAML: &str = r#"
mixins:
  timestamps:
    created_at: timestamp_ms not null default now
tables:
  users:
    id: text primary key
    email: text not null unique
    profile: json
    active: boolean not null default true
    "...timestamps": true
  posts:
    id: integer primary key
    author_id: text not null -> users.id cascade
    title: text not null
    views: integer not null default 0
indexes:
  posts:
    posts_author_idx: author_id
"#;

    pub fn app_source() -> Result<SchemaSource, TesseraError> {
        Ok(SchemaSource::from_yaml(APP_SCHEMA_YAML)?)
    }

    pub fn app_schema() -> Result<CanonicalSchema, TesseraError> {
        Ok(compile(&app_source()?, "app", 1)?)
    }

    /// Registry holding one in-memory instance, plus a direct client to it.
    pub fn direct_database(
        name: &str,
    ) -> Result<(InstanceRegistry, Arc<dyn SqlClient>), StorageError> {
        let registry = InstanceRegistry::in_memory();
        registry.create(name)?;
        let client = connect(&TransportStrategy::Direct, &registry, name, "")?;
        Ok((registry, client))
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions over result envelopes.

    use super::*;

    /// Assert that an envelope reports success.
    #[track_caller]
    pub fn assert_success(envelope: &Envelope) {
        assert!(
            envelope.success,
            "Expected success, got error: {:?}",
            envelope.error
        );
    }

    /// Assert that an envelope reports failure with an error containing `needle`.
    #[track_caller]
    pub fn assert_failure_contains(envelope: &Envelope, needle: &str) {
        assert!(!envelope.success, "Expected failure, got: {:?}", envelope);
        let error = envelope.error_message().unwrap_or_default();
        assert!(
            error.contains(needle),
            "Expected error containing {:?}, got {:?}",
            needle,
            error
        );
    }

    /// Assert the `first()` zero-row shape: success with `data: null`.
    #[track_caller]
    pub fn assert_data_null(envelope: &Envelope) {
        assert_success(envelope);
        assert_eq!(
            envelope.data,
            Some(serde_json::Value::Null),
            "Expected data: null"
        );
    }
}

// ============================================================================
// TESTS
// ============================================================================
