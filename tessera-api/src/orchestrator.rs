//! Database Orchestrator
//!
//! Top-level provisioning: bind a new logical database, mint its capability
//! token and optionally bring its schema up to date.
//!
//! With the direct strategy migrations run immediately. With the HTTP
//! strategy the orchestrator first polls the database through the gateway
//! until it answers or the deadline passes; on timeout the database is
//! reported as created but not yet migrated.
//!
//! Neither the signing secret nor minted tokens are ever logged.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tessera_core::{validate_db_name, CanonicalSchema, StorageError, TesseraError};
use tessera_migrate::{ApplyMode, MigrationCatalog, MigrationReport, Migrator};
use tessera_storage::{connect, InstanceRegistry, SqlClient, TransportStrategy};
use tracing::{info, warn};

use crate::token::{mint, SigningSecret};

const TEN_YEARS: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Orchestrator configuration.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// The platform's own database; its token is effectively permanent.
    pub admin_db_name: String,
    pub admin_token_ttl: Duration,
    /// TTL of every tenant token. Renewal is the caller's concern.
    pub tenant_token_ttl: Duration,
    /// Delay between reachability checks.
    pub poll_interval: Duration,
    /// Give up waiting for reachability after this long.
    pub poll_deadline: Duration,
    /// Where file-backed instances live; in-memory when unset.
    pub data_dir: Option<PathBuf>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            admin_db_name: "platform".to_string(),
            admin_token_ttl: TEN_YEARS,
            tenant_token_ttl: Duration::from_secs(60 * 60),
            poll_interval: Duration::from_millis(500),
            poll_deadline: Duration::from_secs(30),
            data_dir: None,
        }
    }
}

impl OrchestratorConfig {
    /// Create OrchestratorConfig from environment variables.
    ///
    /// Environment variables:
    /// - `TESSERA_ADMIN_DB`: Administrative database name (default: platform)
    /// - `TESSERA_TENANT_TOKEN_TTL_SECS`: Tenant token lifetime (default: 3600)
    /// - `TESSERA_POLL_DEADLINE_SECS`: Reachability deadline (default: 30)
    /// - `TESSERA_DATA_DIR`: Directory for file-backed instances (default: in-memory)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let tenant_token_ttl = std::env::var("TESSERA_TENANT_TOKEN_TTL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.tenant_token_ttl);

        let poll_deadline = std::env::var("TESSERA_POLL_DEADLINE_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.poll_deadline);

        Self {
            admin_db_name: std::env::var("TESSERA_ADMIN_DB").unwrap_or(defaults.admin_db_name),
            tenant_token_ttl,
            poll_deadline,
            data_dir: std::env::var("TESSERA_DATA_DIR").ok().map(PathBuf::from),
            ..defaults
        }
    }

    /// Token lifetime for `name`.
    pub fn token_ttl(&self, name: &str) -> Duration {
        if name == self.admin_db_name {
            self.admin_token_ttl
        } else {
            self.tenant_token_ttl
        }
    }

    /// Registry matching `data_dir`.
    pub fn registry(&self) -> Result<InstanceRegistry, StorageError> {
        match &self.data_dir {
            Some(dir) => InstanceRegistry::with_data_dir(dir),
            None => Ok(InstanceRegistry::in_memory()),
        }
    }
}

// ============================================================================
// TYPES
// ============================================================================

/// Where a provisioned database is reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendRef {
    /// In-process binding under `name`.
    Direct { name: String },
    /// Through the gateway at `base_url`.
    Http { base_url: String, name: String },
}

/// Outcome of the initial migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationStatus {
    NotRequested,
    Applied(MigrationReport),
    /// The database did not answer before the deadline.
    Pending,
}

/// What to do after binding.
#[derive(Debug, Clone, Default)]
pub struct ProvisionOptions {
    /// Schema to migrate to, `None` to skip migrations.
    pub schema_name: Option<String>,
    /// Canonical schema used when no bundle is registered.
    pub schema: Option<CanonicalSchema>,
}

impl ProvisionOptions {
    /// Migrate to the bundle registered for `schema_name`.
    pub fn migrate(schema_name: impl Into<String>) -> Self {
        Self {
            schema_name: Some(schema_name.into()),
            schema: None,
        }
    }

    /// Migrate to `schema`, falling back to its DDL when no bundle exists.
    pub fn with_schema(schema: CanonicalSchema) -> Self {
        Self {
            schema_name: Some(schema.name.clone()),
            schema: Some(schema),
        }
    }
}

/// A newly provisioned logical database.
#[derive(Clone)]
pub struct ProvisionedDatabase {
    pub name: String,
    pub token: String,
    pub backend: BackendRef,
    pub migration: MigrationStatus,
}

impl std::fmt::Debug for ProvisionedDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvisionedDatabase")
            .field("name", &self.name)
            .field("token", &"[REDACTED]")
            .field("backend", &self.backend)
            .field("migration", &self.migration)
            .finish()
    }
}

/// How far deprovisioning goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeprovisionMode {
    /// Unbind the name; files stay and the name can be re-bound.
    Soft,
    /// Unbind and delete the instance's files.
    Hard,
}

// ============================================================================
// ORCHESTRATOR
// ============================================================================

/// Provisions logical databases.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    config: OrchestratorConfig,
    registry: InstanceRegistry,
    migrator: Migrator,
    strategy: TransportStrategy,
}

impl Orchestrator {
    pub fn new(
        config: OrchestratorConfig,
        registry: InstanceRegistry,
        catalog: MigrationCatalog,
        strategy: TransportStrategy,
    ) -> Self {
        Self {
            config,
            registry,
            migrator: Migrator::new(catalog),
            strategy,
        }
    }

    pub fn with_apply_mode(mut self, mode: ApplyMode) -> Self {
        self.migrator = self.migrator.with_mode(mode);
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn registry(&self) -> &InstanceRegistry {
        &self.registry
    }

    pub fn strategy(&self) -> &TransportStrategy {
        &self.strategy
    }

    /// Client for an existing database, using the configured strategy.
    pub fn connect(&self, name: &str, token: &str) -> Result<Arc<dyn SqlClient>, StorageError> {
        connect(&self.strategy, &self.registry, name, token)
    }

    /// Bind `name`, mint its token and run the requested migration.
    ///
    /// # Errors
    /// Invalid or taken names and token failures leave nothing bound.
    /// A migration failure is returned as an error; the database stays bound.
    pub async fn create_database(
        &self,
        name: &str,
        secret: &SigningSecret,
        options: ProvisionOptions,
    ) -> Result<ProvisionedDatabase, TesseraError> {
        validate_db_name(name)?;
        self.registry.create(name)?;

        let ttl = self.config.token_ttl(name);
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let prepared = mint(name, secret, ttl_ms)
            .map_err(TesseraError::from)
            .and_then(|token| {
                let client = self.connect(name, &token)?;
                Ok((token, client))
            });
        let (token, client) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                self.unbind_after_failure(name);
                return Err(e);
            }
        };

        let migration = match options.schema_name.as_deref() {
            None => MigrationStatus::NotRequested,
            Some(schema_name) => {
                self.migrate(client.as_ref(), schema_name, options.schema.as_ref())
                    .await?
            }
        };

        let backend = match &self.strategy {
            TransportStrategy::Direct => BackendRef::Direct {
                name: name.to_string(),
            },
            TransportStrategy::Http { base_url, .. } => BackendRef::Http {
                base_url: base_url.clone(),
                name: name.to_string(),
            },
        };

        info!(
            db = %name,
            transport = ?self.strategy.kind(),
            ttl_secs = ttl.as_secs(),
            migration = ?migration,
            "Database provisioned"
        );

        Ok(ProvisionedDatabase {
            name: name.to_string(),
            token,
            backend,
            migration,
        })
    }

    async fn migrate(
        &self,
        client: &dyn SqlClient,
        schema_name: &str,
        schema: Option<&CanonicalSchema>,
    ) -> Result<MigrationStatus, TesseraError> {
        if let TransportStrategy::Http { .. } = self.strategy {
            if !self.wait_until_reachable(client).await {
                warn!(
                    db = client.db_name(),
                    deadline_secs = self.config.poll_deadline.as_secs(),
                    "Database not reachable before deadline; migration pending"
                );
                return Ok(MigrationStatus::Pending);
            }
        }

        let report = self.migrator.apply(client, schema_name, schema).await?;
        Ok(MigrationStatus::Applied(report))
    }

    /// Poll with `SELECT 1` until it succeeds or the deadline passes.
    async fn wait_until_reachable(&self, client: &dyn SqlClient) -> bool {
        let deadline = tokio::time::Instant::now() + self.config.poll_deadline;
        loop {
            if client.first("SELECT 1", Vec::new(), None).await.success {
                return true;
            }
            if tokio::time::Instant::now() + self.config.poll_interval > deadline {
                return false;
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    fn unbind_after_failure(&self, name: &str) {
        if let Err(e) = self.registry.destroy(name) {
            warn!(db = %name, error = %e, "Failed to clean up after provisioning error");
        }
    }

    /// Remove a database.
    ///
    /// Files of an unbound name are left on disk in either mode.
    ///
    /// # Errors
    /// `InstanceNotFound` when `name` is not bound.
    pub fn deprovision(&self, name: &str, mode: DeprovisionMode) -> Result<(), StorageError> {
        let was_bound = match mode {
            DeprovisionMode::Soft => self.registry.remove(name).is_some(),
            DeprovisionMode::Hard => self.registry.destroy(name)?,
        };
        if !was_bound {
            return Err(StorageError::InstanceNotFound {
                name: name.to_string(),
            });
        }
        info!(db = %name, mode = ?mode, "Database deprovisioned");
        Ok(())
    }
}
