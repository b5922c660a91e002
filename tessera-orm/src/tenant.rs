//! Routing from an opaque tenant id to that tenant's logical database.

use std::sync::Arc;
use tessera_core::{validate_db_name, CanonicalSchema, TesseraError, ValidationError};
use tessera_storage::{connect, InstanceRegistry, TransportStrategy};

use crate::database::Database;

pub const DEFAULT_TENANT_PREFIX: &str = "tenant-";

/// Maps the current tenant id, supplied by the session layer, to a
/// [`Database`] bound to `<prefix><id>`.
#[derive(Debug, Clone)]
pub struct TenantRouter {
    schema: Arc<CanonicalSchema>,
    strategy: TransportStrategy,
    registry: InstanceRegistry,
    prefix: String,
}

impl TenantRouter {
    pub fn new(
        schema: Arc<CanonicalSchema>,
        strategy: TransportStrategy,
        registry: InstanceRegistry,
    ) -> Self {
        Self {
            schema,
            strategy,
            registry,
            prefix: DEFAULT_TENANT_PREFIX.to_string(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Logical database name for `tenant_id`.
    pub fn db_name(&self, tenant_id: &str) -> Result<String, ValidationError> {
        let name = format!("{}{}", self.prefix, tenant_id);
        validate_db_name(&name)?;
        Ok(name)
    }

    /// Database handle for `tenant_id`. `token` is only used over HTTP.
    pub fn database(&self, tenant_id: &str, token: &str) -> Result<Database, TesseraError> {
        let name = self.db_name(tenant_id)?;
        let client = connect(&self.strategy, &self.registry, &name, token)?;
        Ok(Database::new(Arc::clone(&self.schema), client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::StorageError;

    #[test]
    fn test_tenant_names() -> Result<(), ValidationError> {
        let router = TenantRouter::new(
            Arc::new(CanonicalSchema::new("app", 1, Vec::new())),
            TransportStrategy::Direct,
            InstanceRegistry::in_memory(),
        );
        assert_eq!(router.db_name("42")?, "tenant-42");
        assert!(router.db_name("a.b").is_err());
        assert_eq!(router.clone().with_prefix("org_").db_name("7")?, "org_7");
        Ok(())
    }

    #[test]
    fn test_unbound_tenant_is_not_found() {
        let router = TenantRouter::new(
            Arc::new(CanonicalSchema::new("app", 1, Vec::new())),
            TransportStrategy::Direct,
            InstanceRegistry::in_memory(),
        );
        assert!(matches!(
            router.database("9", ""),
            Err(TesseraError::Storage(StorageError::InstanceNotFound { .. }))
        ));
    }
}
