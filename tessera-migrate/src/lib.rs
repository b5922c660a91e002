//! Tessera Migrate - Journal-Based Schema Migrations
//!
//! A [`MigrationBundle`] is an ordered journal of tagged SQL scripts. The
//! [`Migrator`] compares it with the `__tessera_migrations` history table of
//! a database and applies what is missing through any [`SqlClient`], so the
//! same run works in-process and through the gateway.
//!
//! When no bundle is registered for a schema, an initial migration is
//! synthesized from the canonical schema instead.
//!
//! [`SqlClient`]: tessera_storage::SqlClient

pub mod ddl;
pub mod engine;
pub mod journal;
pub mod splitter;

pub use ddl::{create_index_sql, create_table_sql, quote_ident, schema_statements};
pub use engine::{ApplyMode, MigrationReport, Migrator, HISTORY_TABLE};
pub use journal::{fallback_tag, JournalEntry, MigrationBundle, MigrationCatalog, JOURNAL_PATH};
pub use splitter::{split_statements, STATEMENT_BREAKPOINT};
