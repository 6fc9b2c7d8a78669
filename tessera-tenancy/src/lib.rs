//! Multi-Tenancy for Tessera
//!
//! Tenant resolution, cached directory lookups, per-tenant database
//! lifecycle, task-local tenant context, and the event fabric that keeps
//! caches and databases in step with registry mutations.
//!
//! # Features
//!
//! - 🏢 **Tenant Resolution** - Header and host-based resolution
//! - 🔍 **Tenant Directory** - Cache-aside lookups with per-kind TTLs
//! - 🗄️ **Database Per Tenant** - Provisioning, migrations, backup/restore
//! - 🧵 **Tenant Context** - Task-local ambient tenant
//! - 📣 **Event Fabric** - Outbox events drive invalidation and provisioning
//! - 📝 **Tenant Administration** - Transactional CRUD with an audit trail
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tessera_cache::MemoryCache;
//! use tessera_tenancy::*;
//!
//! let config = TenancyConfig::default();
//! let store = Arc::new(InMemoryTenantStore::new());
//! let cache = Arc::new(MemoryCache::new());
//! let directory = Arc::new(TenantDirectory::new(store.clone(), cache, config.clone()));
//! let lifecycle = Arc::new(LifecycleManager::new(
//!     store.clone(),
//!     admin_port,
//!     migration_port,
//!     backup_port,
//!     config.clone(),
//! ));
//! let fabric = Arc::new(EventFabric::new(directory.clone(), lifecycle));
//! let admin = TenantAdmin::new(store, directory.clone(), fabric);
//!
//! let tenant = admin
//!     .create_tenant(
//!         CreateTenant::new("Acme", "acme")
//!             .with_connection_string("host=db;database=tessera_acme")
//!             .with_domain("acme.example.com"),
//!     )
//!     .await?;
//!
//! let resolver = TenantResolver::new(directory, config);
//! let request = ResolutionRequest::new().with_host("acme.example.com");
//! let resolved = resolver.resolve(&request).await?;
//! assert_eq!(resolved.id, tenant.id);
//! ```

pub mod admin;
pub mod config;
pub mod context;
pub mod directory;
pub mod fabric;
pub mod lifecycle;
pub mod resolver;
pub mod store;
pub mod uow;

pub use admin::{CreateTenant, TenantAdmin};
pub use config::TenancyConfig;
pub use context::{TenantContext, TenantScoped, scoped_filter};
pub use directory::TenantDirectory;
pub use fabric::EventFabric;
pub use lifecycle::{
    BackupEngine, DatabaseAdmin, LifecycleManager, MigrationFailure, MigrationReport,
    MigrationRunner, MigrationStatus, TenantMigrationStatus,
};
pub use resolver::{ResolutionRequest, TenantResolver};
pub use store::{InMemoryTenantStore, StoreTransaction, TenantStore};
pub use uow::UnitOfWork;

pub use tessera_core::{
    DatabaseStatus, Tenant, TenantAuditLog, TenantDomain, TenantError, TenantEvent,
    TenantEventKind, TenantResult, TenantSetting, cache_keys, mask_connection_string,
};
