// Tessera - Multi-tenant application core for Rust
//
// This library bundles the tenant registry, the cache layer, and the
// tenancy services (resolution, directory, lifecycle, administration)
// behind a single dependency.

// Re-export core types
pub use tessera_core::*;

// Re-export the member crates
pub use tessera_cache;
pub use tessera_tenancy;

// Prelude for common imports
pub mod prelude {
    pub use tessera_cache::{CacheConfig, CacheError, CacheResult, CacheStore, MemoryCache};

    #[cfg(feature = "redis")]
    pub use tessera_cache::RedisCache;

    pub use tessera_core::{
        DatabaseStatus, Tenant, TenantAuditLog, TenantDomain, TenantError, TenantEvent,
        TenantEventKind, TenantResult, TenantSetting, cache_keys, mask_connection_string,
    };

    pub use tessera_tenancy::{
        BackupEngine, CreateTenant, DatabaseAdmin, EventFabric, InMemoryTenantStore,
        LifecycleManager, MigrationReport, MigrationRunner, MigrationStatus, ResolutionRequest,
        StoreTransaction, TenancyConfig, TenantAdmin, TenantContext, TenantDirectory,
        TenantResolver, TenantScoped, TenantStore, UnitOfWork, scoped_filter,
    };
}
