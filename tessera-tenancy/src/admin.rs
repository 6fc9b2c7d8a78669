//! Administrative tenant operations.
//!
//! Every mutation runs inside a unit of work: conflict checks first, then
//! staged writes plus an audit entry, then commit, then the event fabric
//! reacts. Cache entries for the mutated tenant are invalidated after the
//! commit so readers never observe a stale copy past the mutation.

use crate::directory::TenantDirectory;
use crate::fabric::EventFabric;
use crate::store::TenantStore;
use crate::uow::UnitOfWork;
use std::collections::HashMap;
use std::sync::Arc;
use tessera_core::{Tenant, TenantAuditLog, TenantError, TenantResult};
use tracing::info;
use uuid::Uuid;

/// Request payload for [`TenantAdmin::create_tenant`].
#[derive(Debug, Clone)]
pub struct CreateTenant {
    pub name: String,
    pub identifier: String,
    pub connection_string: Option<String>,
    pub use_shared_database: bool,
    pub domain: Option<String>,
    pub settings: HashMap<String, String>,
}

impl CreateTenant {
    pub fn new(name: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            identifier: identifier.into(),
            connection_string: None,
            use_shared_database: false,
            domain: None,
            settings: HashMap::new(),
        }
    }

    pub fn with_connection_string(mut self, connection_string: impl Into<String>) -> Self {
        self.connection_string = Some(connection_string.into());
        self
    }

    pub fn with_shared_database(mut self) -> Self {
        self.use_shared_database = true;
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }
}

pub struct TenantAdmin {
    store: Arc<dyn TenantStore>,
    directory: Arc<TenantDirectory>,
    fabric: Arc<EventFabric>,
}

impl TenantAdmin {
    pub fn new(
        store: Arc<dyn TenantStore>,
        directory: Arc<TenantDirectory>,
        fabric: Arc<EventFabric>,
    ) -> Self {
        Self {
            store,
            directory,
            fabric,
        }
    }

    /// Register a new tenant.
    ///
    /// Identifier and domain uniqueness are checked up front; a losing race
    /// still surfaces at commit as `TransactionAborted`.
    pub async fn create_tenant(&self, request: CreateTenant) -> TenantResult<Tenant> {
        if request.identifier.trim().is_empty() {
            return Err(TenantError::Conflict(
                "tenant identifier must not be empty".to_string(),
            ));
        }
        if self.store.identifier_exists(&request.identifier).await? {
            return Err(TenantError::Conflict(format!(
                "tenant identifier '{}' is already in use",
                request.identifier
            )));
        }
        if let Some(domain) = &request.domain {
            if self.store.domain_exists(domain).await? {
                return Err(TenantError::Conflict(format!(
                    "domain '{domain}' is already in use"
                )));
            }
        }

        let mut tenant = Tenant::create(
            &request.name,
            &request.identifier,
            request.use_shared_database,
        );
        if let Some(connection_string) = request
            .connection_string
            .as_deref()
            .filter(|c| !c.is_empty())
        {
            tenant.update_connection_string(connection_string);
        }
        if let Some(domain) = &request.domain {
            tenant.add_domain(domain, true);
        }
        if !request.settings.is_empty() {
            tenant.update_settings(request.settings.clone());
        }

        let mut uow = self.uow();
        uow.begin().await?;
        uow.insert_tenant(&mut tenant)?;
        uow.append_audit(TenantAuditLog::new(
            tenant.id,
            "TenantCreated",
            format!("Created tenant '{}'", tenant.identifier),
        ))?;
        uow.commit().await?;

        self.directory.invalidate_id(tenant.id).await;
        self.directory
            .invalidate_identifier(&tenant.identifier)
            .await;

        info!(tenant_id = %tenant.id, identifier = %tenant.identifier, "tenant created");
        Ok(tenant)
    }

    /// Rename a tenant and/or flip its active flag.
    pub async fn update_tenant(
        &self,
        id: Uuid,
        name: Option<String>,
        is_active: Option<bool>,
    ) -> TenantResult<Tenant> {
        let mut tenant = self.load(id).await?;

        if let Some(name) = name {
            tenant.update_details(name);
        }
        if let Some(active) = is_active {
            tenant.set_active(active);
        }

        let mut uow = self.uow();
        uow.begin().await?;
        uow.update_tenant(&mut tenant)?;
        uow.append_audit(TenantAuditLog::new(
            id,
            "TenantUpdated",
            format!("Updated tenant '{}'", tenant.identifier),
        ))?;
        uow.commit().await?;

        self.invalidate_lookups(&tenant).await;
        info!(tenant_id = %id, "tenant updated");
        Ok(tenant)
    }

    /// Upsert a batch of settings. Writes a single audit entry for the batch.
    pub async fn update_settings(
        &self,
        id: Uuid,
        settings: HashMap<String, String>,
    ) -> TenantResult<Tenant> {
        let mut tenant = self.load(id).await?;
        let count = settings.len();
        tenant.update_settings(settings);

        let mut uow = self.uow();
        uow.begin().await?;
        uow.update_tenant(&mut tenant)?;
        uow.append_audit(TenantAuditLog::new(
            id,
            "SettingsUpdated",
            format!("Updated {count} settings"),
        ))?;
        uow.commit().await?;

        self.invalidate_lookups(&tenant).await;
        info!(tenant_id = %id, count, "tenant settings updated");
        Ok(tenant)
    }

    /// Attach a domain to a tenant. Domains are unique across all tenants.
    pub async fn add_domain(
        &self,
        id: Uuid,
        domain: impl Into<String>,
        is_primary: bool,
    ) -> TenantResult<Tenant> {
        let domain = domain.into();
        if self.store.domain_exists(&domain).await? {
            return Err(TenantError::Conflict(format!(
                "domain '{domain}' is already in use"
            )));
        }

        let mut tenant = self.load(id).await?;
        tenant.add_domain(&domain, is_primary);

        let mut uow = self.uow();
        uow.begin().await?;
        uow.update_tenant(&mut tenant)?;
        uow.append_audit(TenantAuditLog::new(
            id,
            "DomainAdded",
            format!("Added domain '{domain}'"),
        ))?;
        uow.commit().await?;

        self.invalidate_lookups(&tenant).await;
        info!(tenant_id = %id, %domain, "domain added");
        Ok(tenant)
    }

    /// Replace a tenant's database connection string.
    pub async fn update_connection_string(
        &self,
        id: Uuid,
        connection_string: impl Into<String>,
    ) -> TenantResult<Tenant> {
        let connection_string = connection_string.into();
        if connection_string.trim().is_empty() {
            return Err(TenantError::ConnectionInvalid(
                "connection string must not be empty".to_string(),
            ));
        }

        let mut tenant = self.load(id).await?;
        tenant.update_connection_string(connection_string);

        let mut uow = self.uow();
        uow.begin().await?;
        uow.update_tenant(&mut tenant)?;
        uow.append_audit(TenantAuditLog::new(
            id,
            "ConnectionStringUpdated",
            "Connection string updated",
        ))?;
        uow.commit().await?;

        self.invalidate_lookups(&tenant).await;
        info!(tenant_id = %id, "connection string updated");
        Ok(tenant)
    }

    /// Deactivate a tenant. Idempotent.
    pub async fn deactivate(&self, id: Uuid) -> TenantResult<Tenant> {
        let mut tenant = self.load(id).await?;
        tenant.deactivate();

        let mut uow = self.uow();
        uow.begin().await?;
        uow.update_tenant(&mut tenant)?;
        uow.append_audit(TenantAuditLog::new(
            id,
            "TenantDeactivated",
            format!("Deactivated tenant '{}'", tenant.identifier),
        ))?;
        uow.commit().await?;

        self.invalidate_lookups(&tenant).await;
        info!(tenant_id = %id, "tenant deactivated");
        Ok(tenant)
    }

    /// Remove a tenant from the registry. The audit trail is retained.
    pub async fn delete_tenant(&self, id: Uuid) -> TenantResult<()> {
        let tenant = self.load(id).await?;

        let mut uow = self.uow();
        uow.begin().await?;
        uow.delete_tenant(id)?;
        uow.append_audit(TenantAuditLog::new(
            id,
            "TenantDeleted",
            format!("Deleted tenant '{}'", tenant.identifier),
        ))?;
        uow.commit().await?;

        // Deletion produces no outbox event, so every lookup key is
        // invalidated here.
        self.directory.invalidate_tenant(&tenant).await;

        info!(tenant_id = %id, identifier = %tenant.identifier, "tenant deleted");
        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> TenantResult<Tenant> {
        self.load(id).await
    }

    pub async fn get_by_identifier(&self, identifier: &str) -> TenantResult<Tenant> {
        self.store
            .find_by_identifier(identifier)
            .await?
            .ok_or_else(|| TenantError::NotFound(identifier.to_string()))
    }

    pub async fn list(&self) -> TenantResult<Vec<Tenant>> {
        self.store.list_all().await
    }

    pub async fn audit_trail(&self, id: Uuid) -> TenantResult<Vec<TenantAuditLog>> {
        self.store.audit_trail(id).await
    }

    // Admin reads go straight to the store so stale cache entries never
    // feed a mutation.
    async fn load(&self, id: Uuid) -> TenantResult<Tenant> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| TenantError::NotFound(id.to_string()))
    }

    async fn invalidate_lookups(&self, tenant: &Tenant) {
        self.directory.invalidate_id(tenant.id).await;
        self.directory
            .invalidate_identifier(&tenant.identifier)
            .await;
    }

    fn uow(&self) -> UnitOfWork {
        UnitOfWork::new(self.store.clone(), self.fabric.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TenancyConfig;
    use crate::lifecycle::{BackupEngine, DatabaseAdmin, LifecycleManager, MigrationRunner};
    use crate::store::InMemoryTenantStore;
    use async_trait::async_trait;
    use std::path::Path;
    use tessera_cache::MemoryCache;
    use tessera_core::DatabaseStatus;

    struct NoopAdmin;

    #[async_trait]
    impl DatabaseAdmin for NoopAdmin {
        async fn database_exists(&self, _name: &str) -> TenantResult<bool> {
            Ok(false)
        }

        async fn create_database(&self, _name: &str) -> TenantResult<()> {
            Ok(())
        }

        async fn can_connect(&self, _connection_string: &str) -> TenantResult<bool> {
            Ok(true)
        }
    }

    struct NoopRunner;

    #[async_trait]
    impl MigrationRunner for NoopRunner {
        async fn apply_migrations(&self, _connection_string: &str) -> TenantResult<()> {
            Ok(())
        }

        async fn pending_migrations(&self, _connection_string: &str) -> TenantResult<Vec<String>> {
            Ok(Vec::new())
        }
    }

    struct NoopBackup;

    #[async_trait]
    impl BackupEngine for NoopBackup {
        async fn backup(
            &self,
            _connection_string: &str,
            _database: &str,
            _target: &Path,
        ) -> TenantResult<()> {
            Ok(())
        }

        async fn restore(&self, _connection_string: &str, _source: &Path) -> TenantResult<()> {
            Ok(())
        }
    }

    struct Fixture {
        directory: Arc<TenantDirectory>,
        admin: TenantAdmin,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryTenantStore::new());
        let cache = Arc::new(MemoryCache::new());
        let config = TenancyConfig::default();
        let directory = Arc::new(TenantDirectory::new(
            store.clone(),
            cache,
            config.clone(),
        ));
        let lifecycle = Arc::new(LifecycleManager::new(
            store.clone(),
            Arc::new(NoopAdmin),
            Arc::new(NoopRunner),
            Arc::new(NoopBackup),
            config,
        ));
        let fabric = Arc::new(EventFabric::new(directory.clone(), lifecycle));
        let admin = TenantAdmin::new(store, directory.clone(), fabric);
        Fixture { directory, admin }
    }

    #[tokio::test]
    async fn test_create_tenant_provisions_dedicated_database() {
        let fx = fixture();
        let tenant = fx
            .admin
            .create_tenant(
                CreateTenant::new("Acme", "acme")
                    .with_connection_string("host=db;database=tessera_acme"),
            )
            .await
            .unwrap();

        let stored = fx.admin.get(tenant.id).await.unwrap();
        assert_eq!(stored.database_status, DatabaseStatus::Active);
        assert!(stored.is_active);

        let trail = fx.admin.audit_trail(tenant.id).await.unwrap();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].action, "TenantCreated");
    }

    #[tokio::test]
    async fn test_create_tenant_shared_stays_pending() {
        let fx = fixture();
        let tenant = fx
            .admin
            .create_tenant(CreateTenant::new("Acme", "acme").with_shared_database())
            .await
            .unwrap();

        let stored = fx.admin.get(tenant.id).await.unwrap();
        assert_eq!(stored.database_status, DatabaseStatus::Pending);
    }

    #[tokio::test]
    async fn test_create_tenant_rejects_duplicate_identifier() {
        let fx = fixture();
        fx.admin
            .create_tenant(CreateTenant::new("Acme", "acme").with_shared_database())
            .await
            .unwrap();

        let err = fx
            .admin
            .create_tenant(CreateTenant::new("Acme Two", "acme").with_shared_database())
            .await
            .unwrap_err();
        assert!(matches!(err, TenantError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_create_tenant_rejects_duplicate_domain() {
        let fx = fixture();
        fx.admin
            .create_tenant(
                CreateTenant::new("Acme", "acme")
                    .with_shared_database()
                    .with_domain("acme.example.com"),
            )
            .await
            .unwrap();

        let err = fx
            .admin
            .create_tenant(
                CreateTenant::new("Globex", "globex")
                    .with_shared_database()
                    .with_domain("acme.example.com"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TenantError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_create_tenant_with_domain_resolvable() {
        let fx = fixture();
        let tenant = fx
            .admin
            .create_tenant(
                CreateTenant::new("Acme", "acme")
                    .with_shared_database()
                    .with_domain("acme.example.com")
                    .with_setting("theme", "dark"),
            )
            .await
            .unwrap();

        let found = fx
            .directory
            .get_by_domain("acme.example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, tenant.id);
        assert_eq!(found.setting("theme"), Some("dark"));
    }

    #[tokio::test]
    async fn test_update_connection_string_rejects_empty() {
        let fx = fixture();
        let tenant = fx
            .admin
            .create_tenant(CreateTenant::new("Acme", "acme").with_shared_database())
            .await
            .unwrap();

        let err = fx
            .admin
            .update_connection_string(tenant.id, "   ")
            .await
            .unwrap_err();
        assert!(matches!(err, TenantError::ConnectionInvalid(_)));
    }

    #[tokio::test]
    async fn test_update_connection_string_refreshes_cache() {
        let fx = fixture();
        let tenant = fx
            .admin
            .create_tenant(
                CreateTenant::new("Acme", "acme").with_connection_string("host=db;database=old"),
            )
            .await
            .unwrap();

        // Warm the connection cache, then mutate.
        let old = fx.directory.get_connection_string(tenant.id).await.unwrap();
        assert_eq!(old, "host=db;database=old");

        fx.admin
            .update_connection_string(tenant.id, "host=db;database=new")
            .await
            .unwrap();

        let fresh = fx.directory.get_connection_string(tenant.id).await.unwrap();
        assert_eq!(fresh, "host=db;database=new");
    }

    #[tokio::test]
    async fn test_update_settings_audits_batch_size() {
        let fx = fixture();
        let tenant = fx
            .admin
            .create_tenant(CreateTenant::new("Acme", "acme").with_shared_database())
            .await
            .unwrap();

        let mut settings = HashMap::new();
        settings.insert("theme".to_string(), "dark".to_string());
        settings.insert("locale".to_string(), "en-US".to_string());
        fx.admin.update_settings(tenant.id, settings).await.unwrap();

        let trail = fx.admin.audit_trail(tenant.id).await.unwrap();
        let entry = trail
            .iter()
            .find(|e| e.action == "SettingsUpdated")
            .unwrap();
        assert_eq!(entry.details, "Updated 2 settings");
    }

    #[tokio::test]
    async fn test_deactivate_invalidates_cached_lookup() {
        let fx = fixture();
        let tenant = fx
            .admin
            .create_tenant(CreateTenant::new("Acme", "acme").with_shared_database())
            .await
            .unwrap();

        // Warm the id cache with the active copy.
        assert!(
            fx.directory
                .get_by_id(tenant.id)
                .await
                .unwrap()
                .unwrap()
                .is_active
        );

        fx.admin.deactivate(tenant.id).await.unwrap();

        let cached = fx.directory.get_by_id(tenant.id).await.unwrap().unwrap();
        assert!(!cached.is_active);
    }

    #[tokio::test]
    async fn test_delete_tenant_keeps_audit_trail() {
        let fx = fixture();
        let tenant = fx
            .admin
            .create_tenant(
                CreateTenant::new("Acme", "acme")
                    .with_shared_database()
                    .with_domain("acme.example.com"),
            )
            .await
            .unwrap();

        fx.admin.delete_tenant(tenant.id).await.unwrap();

        assert!(matches!(
            fx.admin.get(tenant.id).await,
            Err(TenantError::NotFound(_))
        ));
        assert!(
            fx.directory
                .get_by_domain("acme.example.com")
                .await
                .unwrap()
                .is_none()
        );

        let trail = fx.admin.audit_trail(tenant.id).await.unwrap();
        assert_eq!(trail.len(), 2);
        assert_eq!(trail[1].action, "TenantDeleted");
    }

    #[tokio::test]
    async fn test_update_tenant_renames() {
        let fx = fixture();
        let tenant = fx
            .admin
            .create_tenant(CreateTenant::new("Acme", "acme").with_shared_database())
            .await
            .unwrap();

        let updated = fx
            .admin
            .update_tenant(tenant.id, Some("Acme Corp".to_string()), None)
            .await
            .unwrap();
        assert_eq!(updated.name, "Acme Corp");
        assert_eq!(fx.admin.get(tenant.id).await.unwrap().name, "Acme Corp");
    }
}
