//! Tessera ORM - Schema-Driven Table Accessors
//!
//! A [`Database`] exposes one [`TableAccessor`] per table of a canonical
//! schema. Queries compose predicates, ordering and limits, then compile to a
//! single parameterized statement sent through a
//! [`SqlClient`](tessera_storage::SqlClient). Values are always bound, never
//! interpolated, and identifiers must be declared by the schema.
//!
//! ```ignore
//! let users = db.table("users").ok_or("no users table")?;
//! users.insert(json!({"id": "u1", "profile": {"theme": "dark"}})).await;
//! let row = users.filter(json!({"id": "u1"})).first().await;
//! ```

pub mod codec;
pub mod database;
pub mod error;
pub mod predicate;
pub mod table;
pub mod tenant;

pub use database::Database;
pub use error::QueryBuildError;
pub use predicate::{compile_predicate, Condition, OPERATORS};
pub use table::{Order, Query, TableAccessor};
pub use tenant::{TenantRouter, DEFAULT_TENANT_PREFIX};
