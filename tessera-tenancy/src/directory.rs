//! Tenant directory: cache-accelerated reads over the central registry.
//!
//! Every read goes cache-first. The cache is strictly a side effect: a
//! failing read is logged and treated as a miss, a failing write is logged
//! and dropped, and the lookup still answers from the registry.

use crate::config::TenancyConfig;
use crate::store::TenantStore;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tessera_cache::{CacheStore, helpers};
use tessera_core::{Tenant, TenantDomain, TenantError, TenantResult, cache_keys};
use tracing::{debug, warn};
use uuid::Uuid;

/// Cache-backed tenant lookups.
pub struct TenantDirectory {
    store: Arc<dyn TenantStore>,
    cache: Arc<dyn CacheStore>,
    config: TenancyConfig,
}

impl TenantDirectory {
    pub fn new(
        store: Arc<dyn TenantStore>,
        cache: Arc<dyn CacheStore>,
        config: TenancyConfig,
    ) -> Self {
        Self {
            store,
            cache,
            config,
        }
    }

    /// Look up a tenant by id. Inactive tenants are returned; enforcement
    /// belongs to the caller.
    pub async fn get_by_id(&self, id: Uuid) -> TenantResult<Option<Tenant>> {
        let key = cache_keys::tenant_by_id(id);
        if let Some(tenant) = self.cache_get::<Tenant>(&key).await {
            return Ok(Some(tenant));
        }

        let tenant = self.store.find_by_id(id).await?;
        if let Some(tenant) = &tenant {
            self.cache_put(&key, tenant, self.config.tenant_cache_ttl)
                .await;
        }
        Ok(tenant)
    }

    /// Look up a tenant by identifier slug. Inactive tenants are returned.
    pub async fn get_by_identifier(&self, identifier: &str) -> TenantResult<Option<Tenant>> {
        let key = cache_keys::tenant_by_identifier(identifier);
        if let Some(tenant) = self.cache_get::<Tenant>(&key).await {
            return Ok(Some(tenant));
        }

        let tenant = self.store.find_by_identifier(identifier).await?;
        if let Some(tenant) = &tenant {
            self.cache_put(&key, tenant, self.config.tenant_cache_ttl)
                .await;
        }
        Ok(tenant)
    }

    /// Look up the active tenant owning an active domain.
    pub async fn get_by_domain(&self, domain: &str) -> TenantResult<Option<Tenant>> {
        let key = cache_keys::tenant_by_domain(domain);
        if let Some(tenant) = self.cache_get::<Tenant>(&key).await {
            return Ok(Some(tenant));
        }

        let tenant = self.store.find_by_domain(domain).await?;
        if let Some(tenant) = &tenant {
            self.cache_put(&key, tenant, self.config.tenant_cache_ttl)
                .await;
        }
        Ok(tenant)
    }

    /// All active domains of active tenants, straight from the registry.
    pub async fn list_active_domains(&self) -> TenantResult<Vec<TenantDomain>> {
        self.store.list_active_domains().await
    }

    /// The connection string of an active tenant.
    ///
    /// Errors distinguish a missing tenant (`NotFound`), a deactivated one
    /// (`Inactive`) and a tenant without a usable connection string
    /// (`ConnectionInvalid`).
    pub async fn get_connection_string(&self, id: Uuid) -> TenantResult<String> {
        let key = cache_keys::tenant_connection_string(id);
        if let Some(conn) = self.cache_get::<String>(&key).await {
            return Ok(conn);
        }

        let tenant = self
            .store
            .find_by_id(id)
            .await?
            .ok_or_else(|| TenantError::NotFound(id.to_string()))?;

        if !tenant.is_active {
            return Err(TenantError::Inactive(tenant.identifier.clone()));
        }

        let conn = tenant
            .connection_string
            .filter(|c| !c.is_empty())
            .ok_or_else(|| {
                TenantError::ConnectionInvalid(format!(
                    "tenant {} has no connection string configured",
                    tenant.identifier
                ))
            })?;

        self.cache_put(&key, &conn, self.config.connection_cache_ttl)
            .await;
        Ok(conn)
    }

    /// The settings map of a tenant.
    pub async fn get_settings(&self, id: Uuid) -> TenantResult<HashMap<String, String>> {
        let key = cache_keys::tenant_settings(id);
        if let Some(settings) = self.cache_get::<HashMap<String, String>>(&key).await {
            return Ok(settings);
        }

        let tenant = self
            .store
            .find_by_id(id)
            .await?
            .ok_or_else(|| TenantError::NotFound(id.to_string()))?;

        let settings: HashMap<String, String> = tenant
            .settings
            .iter()
            .map(|s| (s.key.clone(), s.value.clone()))
            .collect();

        self.cache_put(&key, &settings, self.config.tenant_cache_ttl)
            .await;
        Ok(settings)
    }

    pub async fn invalidate_id(&self, id: Uuid) {
        self.cache_forget(&cache_keys::tenant_by_id(id)).await;
    }

    pub async fn invalidate_identifier(&self, identifier: &str) {
        self.cache_forget(&cache_keys::tenant_by_identifier(identifier))
            .await;
    }

    pub async fn invalidate_domain(&self, domain: &str) {
        self.cache_forget(&cache_keys::tenant_by_domain(domain)).await;
    }

    pub async fn invalidate_connection_string(&self, id: Uuid) {
        self.cache_forget(&cache_keys::tenant_connection_string(id))
            .await;
    }

    pub async fn invalidate_settings(&self, id: Uuid) {
        self.cache_forget(&cache_keys::tenant_settings(id)).await;
    }

    /// Drop every cache entry referring to a tenant: the id, identifier,
    /// connection-string and settings keys plus one key per domain.
    pub async fn invalidate_tenant(&self, tenant: &Tenant) {
        let mut keys = vec![
            cache_keys::tenant_by_id(tenant.id),
            cache_keys::tenant_by_identifier(&tenant.identifier),
            cache_keys::tenant_connection_string(tenant.id),
            cache_keys::tenant_settings(tenant.id),
        ];
        keys.extend(
            tenant
                .domains
                .iter()
                .map(|d| cache_keys::tenant_by_domain(&d.domain)),
        );

        let refs: Vec<&str> = keys.iter().map(String::as_str).collect();
        match self.cache.delete_many(&refs).await {
            Ok(()) => debug!(tenant_id = %tenant.id, count = refs.len(), "tenant cache entries invalidated"),
            Err(error) => warn!(tenant_id = %tenant.id, %error, "tenant cache invalidation failed"),
        }
    }

    async fn cache_get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match helpers::get(self.cache.as_ref(), key).await {
            Ok(value) => value,
            Err(error) => {
                warn!(key, %error, "cache read failed, treating as miss");
                None
            }
        }
    }

    async fn cache_put<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        if let Err(error) = helpers::set(self.cache.as_ref(), key, value, Some(ttl)).await {
            warn!(key, %error, "cache write failed, entry not cached");
        }
    }

    async fn cache_forget(&self, key: &str) {
        match self.cache.delete(key).await {
            Ok(()) => debug!(key, "cache entry invalidated"),
            Err(error) => warn!(key, %error, "cache invalidation failed"),
        }
    }
}
