//! Unit of work over the tenant registry.
//!
//! Owns at most one open transaction. Mutations stage writes on the
//! transaction and collect the mutated tenants' outbox events; the events
//! reach the fabric strictly after the commit succeeds, so a rolled-back
//! change never triggers invalidation or provisioning.

use crate::fabric::EventFabric;
use crate::store::{StoreTransaction, TenantStore};
use std::sync::Arc;
use tessera_core::{Tenant, TenantAuditLog, TenantError, TenantEvent, TenantResult};
use tracing::{debug, warn};
use uuid::Uuid;

pub struct UnitOfWork {
    store: Arc<dyn TenantStore>,
    fabric: Arc<EventFabric>,
    txn: Option<Box<dyn StoreTransaction>>,
    pending_events: Vec<TenantEvent>,
}

impl UnitOfWork {
    pub fn new(store: Arc<dyn TenantStore>, fabric: Arc<EventFabric>) -> Self {
        Self {
            store,
            fabric,
            txn: None,
            pending_events: Vec::new(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.txn.is_some()
    }

    /// Open a transaction. Calling `begin` while one is open is tolerated:
    /// the open transaction is reused, never nested.
    pub async fn begin(&mut self) -> TenantResult<()> {
        if self.txn.is_some() {
            warn!("transaction already open, reusing it");
            return Ok(());
        }
        self.txn = Some(self.store.begin().await?);
        debug!("transaction opened");
        Ok(())
    }

    /// Stage a tenant insert and collect its outbox events.
    pub fn insert_tenant(&mut self, tenant: &mut Tenant) -> TenantResult<()> {
        let events = tenant.take_events();
        self.open_txn()?.insert_tenant(tenant.clone());
        self.pending_events.extend(events);
        Ok(())
    }

    /// Stage a tenant update and collect its outbox events.
    pub fn update_tenant(&mut self, tenant: &mut Tenant) -> TenantResult<()> {
        let events = tenant.take_events();
        self.open_txn()?.update_tenant(tenant.clone());
        self.pending_events.extend(events);
        Ok(())
    }

    pub fn delete_tenant(&mut self, id: Uuid) -> TenantResult<()> {
        self.open_txn()?.delete_tenant(id);
        Ok(())
    }

    pub fn append_audit(&mut self, entry: TenantAuditLog) -> TenantResult<()> {
        self.open_txn()?.append_audit(entry);
        Ok(())
    }

    /// Commit the transaction, then dispatch the collected events through
    /// the fabric in recorded order.
    ///
    /// A failed commit discards the staged writes and events and maps to
    /// `TransactionAborted`. A failed dispatch surfaces as the fabric's
    /// error; the commit itself stands.
    pub async fn commit(&mut self) -> TenantResult<()> {
        let txn = self
            .txn
            .take()
            .ok_or_else(|| TenantError::Storage("no open transaction to commit".to_string()))?;

        if let Err(error) = txn.commit().await {
            self.pending_events.clear();
            warn!(%error, "commit failed, transaction rolled back");
            return Err(TenantError::TransactionAborted(error.to_string()));
        }
        debug!("transaction committed");

        let events = std::mem::take(&mut self.pending_events);
        if !events.is_empty() {
            self.fabric.dispatch(&events).await?;
        }
        Ok(())
    }

    /// Discard the open transaction and its collected events.
    pub async fn rollback(&mut self) -> TenantResult<()> {
        self.pending_events.clear();
        if let Some(txn) = self.txn.take() {
            txn.rollback().await?;
            debug!("transaction rolled back");
        }
        Ok(())
    }

    fn open_txn(&mut self) -> TenantResult<&mut Box<dyn StoreTransaction>> {
        self.txn
            .as_mut()
            .ok_or_else(|| TenantError::Storage("no open transaction".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TenancyConfig;
    use crate::directory::TenantDirectory;
    use crate::lifecycle::{BackupEngine, DatabaseAdmin, LifecycleManager, MigrationRunner};
    use crate::store::InMemoryTenantStore;
    use async_trait::async_trait;
    use std::path::Path;
    use tessera_cache::{CacheStore, MemoryCache};
    use tessera_core::{DatabaseStatus, cache_keys};

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
        store: Arc<InMemoryTenantStore>,
        cache: Arc<MemoryCache>,
        fabric: Arc<EventFabric>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryTenantStore::new());
        let cache = Arc::new(MemoryCache::new());
        let config = TenancyConfig::default();
        let directory = Arc::new(TenantDirectory::new(
            store.clone(),
            cache.clone(),
            config.clone(),
        ));
        let lifecycle = Arc::new(LifecycleManager::new(
            store.clone(),
            Arc::new(NoopAdmin),
            Arc::new(NoopRunner),
            Arc::new(NoopBackup),
            config,
        ));
        let fabric = Arc::new(EventFabric::new(directory, lifecycle));
        Fixture {
            store,
            cache,
            fabric,
        }
    }

    #[tokio::test]
    async fn test_commit_persists_and_dispatches() {
        let fx = fixture();
        let mut uow = UnitOfWork::new(fx.store.clone(), fx.fabric.clone());

        let mut tenant = Tenant::create("Acme", "acme", false);
        tenant.update_connection_string("host=db;database=tessera_acme");

        uow.begin().await.unwrap();
        uow.insert_tenant(&mut tenant).unwrap();
        uow.append_audit(TenantAuditLog::new(tenant.id, "TenantCreated", "created"))
            .unwrap();
        uow.commit().await.unwrap();

        // Persisted, and the Created reaction provisioned the database.
        let stored = fx.store.find_by_id(tenant.id).await.unwrap().unwrap();
        assert_eq!(stored.database_status, DatabaseStatus::Active);
        assert_eq!(fx.store.audit_trail(tenant.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_double_begin_reuses_open_transaction() {
        let fx = fixture();
        let mut uow = UnitOfWork::new(fx.store.clone(), fx.fabric.clone());

        let mut tenant = Tenant::create("Acme", "acme", true);

        uow.begin().await.unwrap();
        uow.insert_tenant(&mut tenant).unwrap();
        // Second begin must not discard the staged insert.
        uow.begin().await.unwrap();
        uow.commit().await.unwrap();

        assert!(fx.store.find_by_id(tenant.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_staging_without_begin_errors() {
        let fx = fixture();
        let mut uow = UnitOfWork::new(fx.store.clone(), fx.fabric.clone());

        let mut tenant = Tenant::create("Acme", "acme", true);
        assert!(uow.insert_tenant(&mut tenant).is_err());
        assert!(uow.commit().await.is_err());
    }

    #[tokio::test]
    async fn test_rollback_discards_writes_and_events() {
        let fx = fixture();
        let mut uow = UnitOfWork::new(fx.store.clone(), fx.fabric.clone());

        let mut tenant = Tenant::create("Acme", "acme", false);
        tenant.add_domain("acme.example.com", true);

        uow.begin().await.unwrap();
        uow.insert_tenant(&mut tenant).unwrap();
        uow.rollback().await.unwrap();

        assert!(fx.store.find_by_id(tenant.id).await.unwrap().is_none());
        assert!(!uow.is_open());

        // A later commit of a fresh transaction must not replay the
        // discarded events.
        uow.begin().await.unwrap();
        uow.commit().await.unwrap();
        assert!(fx.store.find_by_id(tenant.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_commit_failure_maps_to_transaction_aborted() {
        let fx = fixture();

        let mut existing = Tenant::create("Acme", "acme", true);
        existing.take_events();
        let mut txn = fx.store.begin().await.unwrap();
        txn.insert_tenant(existing.clone());
        txn.commit().await.unwrap();

        let mut uow = UnitOfWork::new(fx.store.clone(), fx.fabric.clone());
        let mut dup = Tenant::create("Acme Again", "acme", false);
        dup.update_connection_string("host=db;database=dup");

        uow.begin().await.unwrap();
        uow.insert_tenant(&mut dup).unwrap();
        let err = uow.commit().await.unwrap_err();
        assert!(matches!(err, TenantError::TransactionAborted(_)));
        assert!(!uow.is_open());

        // Events of the aborted transaction never reached the fabric: the
        // identifier key was not invalidated (it was never cached either,
        // but the tenant must not exist and no provisioning ran).
        assert!(fx.store.find_by_id(dup.id).await.unwrap().is_none());
        assert!(
            !fx.cache
                .exists(&cache_keys::tenant_by_id(dup.id))
                .await
                .unwrap()
        );
    }
}
