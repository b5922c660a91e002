//! End-to-end normalizer tests: authored source text in, canonical schema out.

use serde_json::json;
use tessera_core::{ColumnMode, ColumnType, DefaultValue, OnDelete, ValidationError};
use tessera_dsl::{compile, SchemaSource};

const APP_YAML: &str = r#"
mixins:
  base:
    id: text primary key
    email: text
    created_at: timestamp_ms not null default now
tables:
  users:
    "...base": true
    email: text unique
    role: enum(admin, member) not null default 'member'
    profile: json
  memberships:
    id: integer primary key
    user_id: text not null -> users.id cascade
    active: boolean not null default true
indexes:
  memberships:
    memberships_user_idx: user_id
    memberships_unique_idx: unique(user_id, active)
"#;

#[test]
fn test_yaml_schema_compiles_to_canonical_model() -> Result<(), ValidationError> {
    let source = SchemaSource::from_yaml(APP_YAML)?;
    let schema = compile(&source, "app", 2)?;

    assert_eq!(schema.name, "app");
    assert_eq!(schema.version, 2);
    let table_names: Vec<&str> = schema.tables.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(table_names, vec!["users", "memberships"]);

    let users = &schema.tables[0];
    let columns: Vec<&str> = users.column_names().collect();
    assert_eq!(columns, vec!["id", "email", "created_at", "role", "profile"]);

    let email = users.column("email");
    assert_eq!(email.map(|c| c.unique), Some(true));
    assert_eq!(
        users.column("profile").map(|c| c.column_type),
        Some(ColumnType::Json)
    );
    assert_eq!(
        users.column("created_at").and_then(|c| c.mode),
        Some(ColumnMode::TimestampMs)
    );

    let memberships = &schema.tables[1];
    let user_id = memberships.column("user_id");
    assert_eq!(
        user_id.and_then(|c| c.references.as_ref()).and_then(|r| r.on_delete),
        Some(OnDelete::Cascade)
    );
    assert_eq!(
        memberships.column("active").and_then(|c| c.default.clone()),
        Some(DefaultValue::Integer(1))
    );
    assert_eq!(memberships.indexes.len(), 2);
    assert!(memberships.indexes[1].unique);
    assert_eq!(memberships.indexes[1].columns, vec!["user_id", "active"]);
    Ok(())
}

#[test]
fn test_canonical_json_shape() -> Result<(), Box<dyn std::error::Error>> {
    let source = SchemaSource::from_json(
        r#"{"tables": {"users": {"id": "integer primary key", "role": "enum(a,b)"}}}"#,
    )?;
    let schema = compile(&source, "app", 1)?;
    let wire = serde_json::to_value(&schema)?;

    assert_eq!(
        wire["tables"][0]["columns"],
        json!([
            {"name": "id", "type": "integer", "primaryKey": true},
            {"name": "role", "type": "text", "enum": ["a", "b"]}
        ])
    );
    Ok(())
}

#[test]
fn test_same_schema_from_every_format() -> Result<(), ValidationError> {
    let json = SchemaSource::from_json(
        r#"{"tables": {"notes": {"id": "text primary key", "body": "text not null"}}}"#,
    )?;
    let yaml = SchemaSource::from_yaml("tables:\n  notes:\n    id: text primary key\n    body: text not null\n")?;
    let toml = SchemaSource::from_toml(
        "[tables.notes]\nid = \"text primary key\"\nbody = \"text not null\"\n",
    )?;

    let a = compile(&json, "n", 1)?;
    assert_eq!(a, compile(&yaml, "n", 1)?);
    assert_eq!(a, compile(&toml, "n", 1)?);
    Ok(())
}

#[test]
fn test_unknown_mixin_fails_at_load() -> Result<(), ValidationError> {
    let source = SchemaSource::from_yaml("tables:\n  users:\n    \"...audit\": true\n")?;
    let err = compile(&source, "app", 1).err();
    assert_eq!(
        err.map(|e| e.to_string()),
        Some("Unknown mixin 'audit' referenced by table 'users'".to_string())
    );
    Ok(())
}

#[test]
fn test_source_from_path() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("schema.yaml");
    std::fs::write(&path, APP_YAML)?;

    let source = SchemaSource::from_path(&path)?;
    assert_eq!(source.tables.len(), 2);

    let bad = dir.path().join("schema.ini");
    std::fs::write(&bad, "")?;
    assert!(SchemaSource::from_path(&bad).is_err());
    Ok(())
}
