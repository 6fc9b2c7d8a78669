//! Per-tenant database lifecycle.
//!
//! Provisioning, migration, validation and backup of tenant databases. All
//! infrastructure access goes through injected ports; deployments implement
//! them against their database tooling of choice.
//!
//! Every status transition is persisted through the registry before the
//! next phase starts, so a crash mid-provisioning leaves a truthful status
//! behind. Lifecycle runs for one tenant are serialized: a second run while
//! one is underway answers `ProvisioningInProgress` instead of racing.

use crate::config::TenancyConfig;
use crate::store::TenantStore;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tessera_core::{
    DatabaseStatus, Tenant, TenantError, TenantResult, mask_connection_string,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Privileged database administration port.
#[async_trait]
pub trait DatabaseAdmin: Send + Sync {
    async fn database_exists(&self, name: &str) -> TenantResult<bool>;

    async fn create_database(&self, name: &str) -> TenantResult<()>;

    /// Create a database as a copy of a template. Defaults to a plain create
    /// for backends without template support.
    async fn create_from_template(&self, name: &str, template: &str) -> TenantResult<()> {
        let _ = template;
        self.create_database(name).await
    }

    async fn can_connect(&self, connection_string: &str) -> TenantResult<bool>;
}

/// Schema migration port.
#[async_trait]
pub trait MigrationRunner: Send + Sync {
    async fn apply_migrations(&self, connection_string: &str) -> TenantResult<()>;

    /// Names of migrations not yet applied.
    async fn pending_migrations(&self, connection_string: &str) -> TenantResult<Vec<String>>;
}

/// Backup/restore port.
///
/// Implementations must hand `target`/`source` and database names to their
/// tooling as discrete arguments, never via an assembled shell string.
#[async_trait]
pub trait BackupEngine: Send + Sync {
    async fn backup(
        &self,
        connection_string: &str,
        database: &str,
        target: &Path,
    ) -> TenantResult<()>;

    async fn restore(&self, connection_string: &str, source: &Path) -> TenantResult<()>;
}

/// Outcome of a fleet-wide migration run.
#[derive(Debug, Default)]
pub struct MigrationReport {
    /// Central registry migrations applied.
    pub central_updated: bool,
    /// Tenants migrated successfully.
    pub updated: Vec<Uuid>,
    /// Tenants whose migration failed; the run continues past them.
    pub failures: Vec<MigrationFailure>,
}

#[derive(Debug)]
pub struct MigrationFailure {
    pub tenant_id: Uuid,
    pub identifier: String,
    /// Failure detail with secrets masked.
    pub error: String,
}

/// Pending-migration summary across the fleet.
#[derive(Debug, Default)]
pub struct MigrationStatus {
    pub central_pending: Vec<String>,
    pub tenants: Vec<TenantMigrationStatus>,
}

#[derive(Debug)]
pub struct TenantMigrationStatus {
    pub tenant_id: Uuid,
    pub identifier: String,
    pub database_status: DatabaseStatus,
    pub pending: Vec<String>,
}

/// Drives tenant databases through their lifecycle.
pub struct LifecycleManager {
    store: Arc<dyn TenantStore>,
    admin: Arc<dyn DatabaseAdmin>,
    migrations: Arc<dyn MigrationRunner>,
    backups: Arc<dyn BackupEngine>,
    config: TenancyConfig,
    busy: Arc<DashMap<Uuid, ()>>,
}

/// Occupancy marker for one tenant's lifecycle run. Released on drop.
struct BusyGuard {
    busy: Arc<DashMap<Uuid, ()>>,
    id: Uuid,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.busy.remove(&self.id);
    }
}

impl LifecycleManager {
    pub fn new(
        store: Arc<dyn TenantStore>,
        admin: Arc<dyn DatabaseAdmin>,
        migrations: Arc<dyn MigrationRunner>,
        backups: Arc<dyn BackupEngine>,
        config: TenancyConfig,
    ) -> Self {
        Self {
            store,
            admin,
            migrations,
            backups,
            config,
            busy: Arc::new(DashMap::new()),
        }
    }

    fn acquire(&self, id: Uuid) -> TenantResult<BusyGuard> {
        match self.busy.entry(id) {
            Entry::Occupied(_) => Err(TenantError::ProvisioningInProgress(id)),
            Entry::Vacant(slot) => {
                slot.insert(());
                Ok(BusyGuard {
                    busy: Arc::clone(&self.busy),
                    id,
                })
            }
        }
    }

    async fn load(&self, id: Uuid) -> TenantResult<Tenant> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| TenantError::NotFound(id.to_string()))
    }

    /// Persist a status transition before the next phase runs.
    async fn persist_status(
        &self,
        tenant: &mut Tenant,
        status: DatabaseStatus,
        error: Option<String>,
    ) -> TenantResult<()> {
        tenant.set_database_status(status, error)?;
        let mut txn = self.store.begin().await?;
        txn.update_tenant(tenant.clone());
        txn.commit().await?;
        info!(tenant_id = %tenant.id, %status, "tenant database status persisted");
        Ok(())
    }

    /// Create the tenant's database if it does not exist yet.
    ///
    /// Returns whether the database ended up usable. Infrastructure failures
    /// are recorded on the tenant (`Failed` + masked detail) and reported as
    /// `false`, never propagated.
    pub async fn create_database(&self, tenant_id: Uuid) -> TenantResult<bool> {
        let _guard = self.acquire(tenant_id)?;
        let mut tenant = self.load(tenant_id).await?;

        let Some(conn) = tenant.connection_string.clone().filter(|c| !c.is_empty()) else {
            warn!(tenant_id = %tenant.id, "no connection string configured, skipping database creation");
            return Ok(false);
        };
        let Some(database) = tenant.database_name() else {
            warn!(tenant_id = %tenant.id, "no database name in connection string, skipping creation");
            return Ok(false);
        };

        self.persist_status(&mut tenant, DatabaseStatus::Creating, None)
            .await?;

        match self.admin.database_exists(&database).await {
            Ok(true) => {
                debug!(tenant_id = %tenant.id, database, "database already exists");
                self.persist_status(&mut tenant, DatabaseStatus::Active, None)
                    .await?;
                return Ok(true);
            }
            Ok(false) => {}
            Err(error) => {
                let detail = mask_connection_string(&error.to_string());
                warn!(tenant_id = %tenant.id, error = %detail, "existence check failed");
                self.persist_status(&mut tenant, DatabaseStatus::Failed, Some(detail))
                    .await?;
                return Ok(false);
            }
        }

        if let Err(error) = self.admin.create_database(&database).await {
            let detail = mask_connection_string(&error.to_string());
            warn!(tenant_id = %tenant.id, database, error = %detail, "database creation failed");
            self.persist_status(&mut tenant, DatabaseStatus::Failed, Some(detail))
                .await?;
            return Ok(false);
        }

        // Connectivity only: a freshly created database has every migration
        // pending, so the full validation would reject it.
        match self.admin.can_connect(&conn).await {
            Ok(true) => {
                self.persist_status(&mut tenant, DatabaseStatus::Active, None)
                    .await?;
                info!(tenant_id = %tenant.id, database, "tenant database created");
                Ok(true)
            }
            Ok(false) => {
                self.persist_status(
                    &mut tenant,
                    DatabaseStatus::Failed,
                    Some("database is not connectable after creation".to_string()),
                )
                .await?;
                Ok(false)
            }
            Err(error) => {
                let detail = mask_connection_string(&error.to_string());
                warn!(tenant_id = %tenant.id, error = %detail, "connectivity check failed");
                self.persist_status(&mut tenant, DatabaseStatus::Failed, Some(detail))
                    .await?;
                Ok(false)
            }
        }
    }

    /// Provision a tenant database end to end: create (from the template
    /// when one is configured), migrate, activate.
    ///
    /// Shared-database tenants skip creation and migration; their rows live
    /// in the already-migrated central database.
    pub async fn initialize_database(&self, tenant_id: Uuid) -> TenantResult<()> {
        let _guard = self.acquire(tenant_id)?;
        let mut tenant = self.load(tenant_id).await?;

        if tenant.use_shared_database {
            self.persist_status(&mut tenant, DatabaseStatus::Creating, None)
                .await?;
            self.persist_status(&mut tenant, DatabaseStatus::Active, None)
                .await?;
            return Ok(());
        }

        let conn = tenant
            .connection_string
            .clone()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| {
                TenantError::ConnectionInvalid(format!(
                    "tenant {} has no connection string configured",
                    tenant.identifier
                ))
            })?;
        let database = tenant.database_name().ok_or_else(|| {
            TenantError::ConnectionInvalid(format!(
                "connection string of tenant {} names no database",
                tenant.identifier
            ))
        })?;

        self.persist_status(&mut tenant, DatabaseStatus::Creating, None)
            .await?;

        let created = async {
            if self.admin.database_exists(&database).await? {
                debug!(tenant_id = %tenant.id, database, "database already exists");
                return Ok(());
            }
            match &self.config.database_template {
                Some(template) => self.admin.create_from_template(&database, template).await,
                None => self.admin.create_database(&database).await,
            }
        }
        .await;

        if let Err(error) = created {
            let detail = mask_connection_string(&error.to_string());
            self.persist_status(&mut tenant, DatabaseStatus::Failed, Some(detail.clone()))
                .await?;
            return Err(TenantError::ProvisioningFailed(detail));
        }

        if let Err(error) = self.migrations.apply_migrations(&conn).await {
            let detail = mask_connection_string(&error.to_string());
            self.persist_status(&mut tenant, DatabaseStatus::Failed, Some(detail.clone()))
                .await?;
            return Err(TenantError::MigrationFailed(detail));
        }

        self.persist_status(&mut tenant, DatabaseStatus::Active, None)
            .await?;
        info!(tenant_id = %tenant.id, database, "tenant database initialized");
        Ok(())
    }

    /// Apply pending migrations to one connection string.
    pub async fn apply_migrations(&self, connection_string: &str) -> bool {
        match self.migrations.apply_migrations(connection_string).await {
            Ok(()) => true,
            Err(error) => {
                warn!(error = %mask_connection_string(&error.to_string()), "migration run failed");
                false
            }
        }
    }

    /// A database is valid when it is connectable and has no pending
    /// migrations.
    pub async fn validate_database(&self, connection_string: &str) -> bool {
        let connectable = match self.admin.can_connect(connection_string).await {
            Ok(ok) => ok,
            Err(error) => {
                warn!(error = %mask_connection_string(&error.to_string()), "connectivity check failed");
                false
            }
        };
        if !connectable {
            return false;
        }

        match self.migrations.pending_migrations(connection_string).await {
            Ok(pending) => pending.is_empty(),
            Err(error) => {
                warn!(error = %mask_connection_string(&error.to_string()), "pending-migrations check failed");
                false
            }
        }
    }

    /// Dump a tenant database into the configured backup directory.
    ///
    /// Artifacts are named `{database}_{yyyyMMddHHmmss}.dump`. Failures are
    /// logged and reported as `None`, never fatal.
    pub async fn backup(&self, tenant_id: Uuid) -> TenantResult<Option<PathBuf>> {
        let tenant = self.load(tenant_id).await?;

        let Some(conn) = tenant.connection_string.clone().filter(|c| !c.is_empty()) else {
            warn!(tenant_id = %tenant.id, "no connection string configured, nothing to back up");
            return Ok(None);
        };
        let Some(database) = tenant.database_name() else {
            warn!(tenant_id = %tenant.id, "no database name in connection string, nothing to back up");
            return Ok(None);
        };

        let stamp = Utc::now().format("%Y%m%d%H%M%S");
        let target = self.config.backup_dir.join(format!("{database}_{stamp}.dump"));

        match self.backups.backup(&conn, &database, &target).await {
            Ok(()) => {
                info!(tenant_id = %tenant.id, target = %target.display(), "tenant database backed up");
                Ok(Some(target))
            }
            Err(error) => {
                warn!(
                    tenant_id = %tenant.id,
                    error = %mask_connection_string(&error.to_string()),
                    "backup failed"
                );
                Ok(None)
            }
        }
    }

    /// Restore a tenant database from a dump artifact.
    pub async fn restore(&self, tenant_id: Uuid, source: &Path) -> TenantResult<bool> {
        let tenant = self.load(tenant_id).await?;

        let Some(conn) = tenant.connection_string.clone().filter(|c| !c.is_empty()) else {
            warn!(tenant_id = %tenant.id, "no connection string configured, cannot restore");
            return Ok(false);
        };

        match self.backups.restore(&conn, source).await {
            Ok(()) => {
                info!(tenant_id = %tenant.id, source = %source.display(), "tenant database restored");
                Ok(true)
            }
            Err(error) => {
                warn!(
                    tenant_id = %tenant.id,
                    error = %mask_connection_string(&error.to_string()),
                    "restore failed"
                );
                Ok(false)
            }
        }
    }

    /// Migrate the central registry, then every active dedicated-database
    /// tenant.
    ///
    /// A central failure aborts the whole run. Per-tenant failures are
    /// recorded in the report and the run continues with the next tenant.
    pub async fn update_all_databases(&self) -> TenantResult<MigrationReport> {
        let mut report = MigrationReport::default();

        if let Err(error) = self
            .migrations
            .apply_migrations(&self.config.central_connection_string)
            .await
        {
            let detail = mask_connection_string(&error.to_string());
            warn!(error = %detail, "central registry migration failed, aborting run");
            return Err(TenantError::MigrationFailed(detail));
        }
        report.central_updated = true;
        info!("central registry migrated");

        for tenant in self.store.list_active().await? {
            if tenant.use_shared_database {
                continue;
            }
            match self.migrate_tenant(&tenant).await {
                Ok(()) => report.updated.push(tenant.id),
                Err(error) => {
                    let detail = mask_connection_string(&error.to_string());
                    warn!(tenant_id = %tenant.id, error = %detail, "tenant migration failed");
                    report.failures.push(MigrationFailure {
                        tenant_id: tenant.id,
                        identifier: tenant.identifier.clone(),
                        error: detail,
                    });
                }
            }
        }

        info!(
            updated = report.updated.len(),
            failed = report.failures.len(),
            "fleet migration run finished"
        );
        Ok(report)
    }

    async fn migrate_tenant(&self, tenant: &Tenant) -> TenantResult<()> {
        let _guard = self.acquire(tenant.id)?;
        let mut tenant = self.load(tenant.id).await?;

        // Only databases that finished provisioning can be migrated.
        if !matches!(
            tenant.database_status,
            DatabaseStatus::Active | DatabaseStatus::MigrationFailed
        ) {
            return Err(TenantError::Conflict(format!(
                "tenant {} database is {} and cannot be migrated",
                tenant.identifier, tenant.database_status
            )));
        }

        let conn = tenant
            .connection_string
            .clone()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| {
                TenantError::ConnectionInvalid(format!(
                    "tenant {} has no connection string configured",
                    tenant.identifier
                ))
            })?;

        self.persist_status(&mut tenant, DatabaseStatus::Migrating, None)
            .await?;

        match self.migrations.apply_migrations(&conn).await {
            Ok(()) => {
                self.persist_status(&mut tenant, DatabaseStatus::Active, None)
                    .await?;
                Ok(())
            }
            Err(error) => {
                let detail = mask_connection_string(&error.to_string());
                self.persist_status(
                    &mut tenant,
                    DatabaseStatus::MigrationFailed,
                    Some(detail.clone()),
                )
                .await?;
                Err(TenantError::MigrationFailed(detail))
            }
        }
    }

    /// Pending-migration summary for the central registry and every active
    /// dedicated-database tenant.
    pub async fn migration_status(&self) -> TenantResult<MigrationStatus> {
        let mut status = MigrationStatus::default();

        match self
            .migrations
            .pending_migrations(&self.config.central_connection_string)
            .await
        {
            Ok(pending) => status.central_pending = pending,
            Err(error) => {
                warn!(error = %mask_connection_string(&error.to_string()), "central pending-migrations check failed");
            }
        }

        for tenant in self.store.list_active().await? {
            if tenant.use_shared_database {
                continue;
            }
            let pending = match tenant.connection_string.as_deref().filter(|c| !c.is_empty()) {
                Some(conn) => match self.migrations.pending_migrations(conn).await {
                    Ok(pending) => pending,
                    Err(error) => {
                        warn!(
                            tenant_id = %tenant.id,
                            error = %mask_connection_string(&error.to_string()),
                            "pending-migrations check failed"
                        );
                        Vec::new()
                    }
                },
                None => Vec::new(),
            };
            status.tenants.push(TenantMigrationStatus {
                tenant_id: tenant.id,
                identifier: tenant.identifier.clone(),
                database_status: tenant.database_status,
                pending,
            });
        }

        Ok(status)
    }
}
