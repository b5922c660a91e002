//! Migration engine.
//!
//! Diffs a bundle's journal against the history table and applies what is
//! missing, in journal order. Concurrent runs against the same database are
//! not coordinated; callers must serialize them.

use serde::Serialize;
use serde_json::{json, Value};
use std::borrow::Cow;
use std::collections::HashSet;
use tessera_core::{
    now_millis, parse_batch_failure, CanonicalSchema, Envelope, MigrationError, Statement,
    ValidationError,
};
use tessera_storage::SqlClient;
use tracing::{debug, info, warn};

use crate::journal::{fallback_tag, MigrationBundle, MigrationCatalog};
use crate::splitter::split_statements;

/// History table recording applied migration tags.
pub const HISTORY_TABLE: &str = "__tessera_migrations";

const CREATE_HISTORY_SQL: &str = "CREATE TABLE IF NOT EXISTS __tessera_migrations (\
    id INTEGER PRIMARY KEY AUTOINCREMENT, \
    tag TEXT UNIQUE NOT NULL, \
    created_at INTEGER)";

const SELECT_HISTORY_SQL: &str = "SELECT tag FROM __tessera_migrations ORDER BY id";

const INSERT_HISTORY_SQL: &str = "INSERT INTO __tessera_migrations (tag, created_at) VALUES (?, ?)";

/// How the statements of one migration are sent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ApplyMode {
    /// One call per statement, then the history insert. A failure can leave
    /// earlier statements of the migration applied.
    PerStatement,
    /// Statements plus the history insert in a single `batch`.
    #[default]
    Atomic,
}

/// What a run did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub applied: Vec<String>,
    pub skipped: Vec<String>,
}

struct Plan<'a> {
    bundle: Cow<'a, MigrationBundle>,
    applied: HashSet<String>,
}

impl Plan<'_> {
    fn pending(&self) -> impl Iterator<Item = &str> {
        self.bundle
            .journal()
            .iter()
            .map(|e| e.tag.as_str())
            .filter(|tag| !self.applied.contains(*tag))
    }
}

/// Applies bundles from a catalog.
#[derive(Debug, Clone, Default)]
pub struct Migrator {
    catalog: MigrationCatalog,
    mode: ApplyMode,
}

impl Migrator {
    pub fn new(catalog: MigrationCatalog) -> Self {
        Self {
            catalog,
            mode: ApplyMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: ApplyMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> ApplyMode {
        self.mode
    }

    pub fn catalog(&self) -> &MigrationCatalog {
        &self.catalog
    }

    /// Bring `client`'s database up to date with the bundle registered for
    /// `schema_name`, or with a synthesized initial migration for `schema`
    /// when no bundle is registered.
    pub async fn apply(
        &self,
        client: &dyn SqlClient,
        schema_name: &str,
        schema: Option<&CanonicalSchema>,
    ) -> Result<MigrationReport, MigrationError> {
        let plan = self.plan(client, schema_name, schema).await?;

        let mut report = MigrationReport::default();
        for entry in plan.bundle.journal() {
            if plan.applied.contains(&entry.tag) {
                report.skipped.push(entry.tag.clone());
                continue;
            }

            let sql = plan
                .bundle
                .sql_for(&entry.tag)
                .ok_or_else(|| MigrationError::MissingLoader {
                    tag: entry.tag.clone(),
                })?;
            let statements = split_statements(sql);

            match self.mode {
                ApplyMode::PerStatement => {
                    apply_per_statement(client, &entry.tag, &statements).await?
                }
                ApplyMode::Atomic => apply_atomic(client, &entry.tag, &statements).await?,
            }

            info!(
                db = client.db_name(),
                schema = schema_name,
                tag = %entry.tag,
                statements = statements.len(),
                "Migration applied"
            );
            report.applied.push(entry.tag.clone());
        }

        info!(
            db = client.db_name(),
            schema = schema_name,
            applied = report.applied.len(),
            skipped = report.skipped.len(),
            "Migrations complete"
        );
        Ok(report)
    }

    /// Whether `apply` would do anything. Any setup failure reads as
    /// `false`, so this is only suitable for gating optional work.
    pub async fn has_pending(
        &self,
        client: &dyn SqlClient,
        schema_name: &str,
        schema: Option<&CanonicalSchema>,
    ) -> bool {
        match self.plan(client, schema_name, schema).await {
            Ok(plan) => plan.pending().next().is_some(),
            Err(e) => {
                debug!(db = client.db_name(), schema = schema_name, error = %e, "Pending check failed");
                false
            }
        }
    }

    async fn plan<'a>(
        &'a self,
        client: &dyn SqlClient,
        schema_name: &str,
        schema: Option<&CanonicalSchema>,
    ) -> Result<Plan<'a>, MigrationError> {
        ensure_history(client).await?;
        let applied = applied_tags(client).await?;

        let bundle = match self.catalog.get(schema_name) {
            Some(bundle) => Cow::Borrowed(bundle),
            None => {
                let schema = schema.ok_or_else(|| ValidationError::MissingSchema {
                    schema: schema_name.to_string(),
                })?;
                let tag = fallback_tag(schema_name);
                // The fallback only ever initializes an empty database.
                if !applied.is_empty() && !applied.contains(&tag) {
                    warn!(
                        db = client.db_name(),
                        schema = schema_name,
                        applied = applied.len(),
                        "Refusing fallback migration over existing history"
                    );
                    return Err(MigrationError::FallbackOverHistory {
                        schema: schema_name.to_string(),
                        tag,
                        applied: applied.len(),
                    });
                }
                Cow::Owned(MigrationBundle::fallback(schema_name, schema))
            }
        };

        Ok(Plan { bundle, applied })
    }
}

async fn ensure_history(client: &dyn SqlClient) -> Result<(), MigrationError> {
    let envelope = client.query(CREATE_HISTORY_SQL, Vec::new()).await;
    check(&envelope).map_err(|reason| MigrationError::History { reason })
}

async fn applied_tags(client: &dyn SqlClient) -> Result<HashSet<String>, MigrationError> {
    let envelope = client.query(SELECT_HISTORY_SQL, Vec::new()).await;
    check(&envelope).map_err(|reason| MigrationError::History { reason })?;
    Ok(envelope
        .rows()
        .iter()
        .filter_map(|row| row.get("tag").and_then(Value::as_str))
        .map(str::to_string)
        .collect())
}

fn history_insert(tag: &str) -> Statement {
    Statement::new(INSERT_HISTORY_SQL, vec![json!(tag), json!(now_millis())])
}

async fn apply_per_statement(
    client: &dyn SqlClient,
    tag: &str,
    statements: &[String],
) -> Result<(), MigrationError> {
    for (i, statement) in statements.iter().enumerate() {
        let envelope = client.query(statement, Vec::new()).await;
        check(&envelope).map_err(|reason| MigrationError::StatementFailed {
            tag: tag.to_string(),
            index: i + 1,
            reason,
        })?;
    }

    let record = history_insert(tag);
    let envelope = client.query(&record.query, record.params).await;
    check(&envelope).map_err(|reason| MigrationError::RecordFailed {
        tag: tag.to_string(),
        reason,
    })
}

async fn apply_atomic(
    client: &dyn SqlClient,
    tag: &str,
    statements: &[String],
) -> Result<(), MigrationError> {
    let mut batch: Vec<Statement> = statements.iter().map(Statement::bare).collect();
    batch.push(history_insert(tag));

    let envelope = client.batch(batch).await;
    let message = match check(&envelope) {
        Ok(()) => return Ok(()),
        Err(message) => message,
    };

    Err(match parse_batch_failure(&message) {
        Some((index, reason)) if index <= statements.len() => MigrationError::StatementFailed {
            tag: tag.to_string(),
            index,
            reason: reason.to_string(),
        },
        Some((_, reason)) => MigrationError::RecordFailed {
            tag: tag.to_string(),
            reason: reason.to_string(),
        },
        None => MigrationError::BatchFailed {
            tag: tag.to_string(),
            reason: message,
        },
    })
}

fn check(envelope: &Envelope) -> Result<(), String> {
    if envelope.success {
        Ok(())
    } else {
        Err(envelope
            .error_message()
            .unwrap_or("unknown error")
            .to_string())
    }
}
