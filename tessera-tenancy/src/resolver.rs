//! Tenant resolution.
//!
//! Resolves the requesting tenant from transport metadata, trying three
//! strategies in order: the tenant-id header, the tenant-identifier header,
//! then the request host against registered domains. The first strategy that
//! produces a tenant wins; a strategy whose input is absent or unusable
//! falls through to the next.
//!
//! Resolution deliberately returns inactive tenants. Rejecting them (403)
//! is the caller's concern, so it can distinguish "unknown tenant" from
//! "known but disabled".

use crate::config::TenancyConfig;
use crate::directory::TenantDirectory;
use std::collections::HashMap;
use std::sync::Arc;
use tessera_core::{Tenant, TenantError, TenantResult};
use tracing::debug;
use uuid::Uuid;

/// Transport-level facts resolution works from.
#[derive(Debug, Clone, Default)]
pub struct ResolutionRequest {
    /// Request host, with or without a port.
    pub host: Option<String>,
    /// Header map with lowercase names.
    pub headers: HashMap<String, String>,
}

impl ResolutionRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into().to_lowercase(), value.into());
        self
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

/// Resolves tenants through the directory.
pub struct TenantResolver {
    directory: Arc<TenantDirectory>,
    config: TenancyConfig,
}

impl TenantResolver {
    pub fn new(directory: Arc<TenantDirectory>, config: TenancyConfig) -> Self {
        Self { directory, config }
    }

    /// Resolve the tenant for a request.
    ///
    /// Returns `NotFound` when no strategy produced a tenant.
    pub async fn resolve(&self, request: &ResolutionRequest) -> TenantResult<Tenant> {
        // Strategy 1: explicit tenant id header. A value that is not a UUID
        // is ignored, not an error.
        if let Some(raw) = request.header(&self.config.tenant_id_header) {
            if let Ok(id) = Uuid::parse_str(raw) {
                if let Some(tenant) = self.directory.get_by_id(id).await? {
                    debug!(tenant_id = %id, "tenant resolved from id header");
                    return Ok(tenant);
                }
            }
        }

        // Strategy 2: identifier slug header.
        if let Some(identifier) = request.header(&self.config.tenant_identifier_header) {
            if let Some(tenant) = self.directory.get_by_identifier(identifier).await? {
                debug!(identifier, "tenant resolved from identifier header");
                return Ok(tenant);
            }
        }

        // Strategy 3: request host against registered domains.
        if let Some(host) = &request.host {
            let domain = host.split(':').next().unwrap_or(host);
            if let Some(tenant) = self.directory.get_by_domain(domain).await? {
                debug!(domain, "tenant resolved from host");
                return Ok(tenant);
            }
        }

        Err(TenantError::NotFound(
            "no tenant matched the request headers or host".to_string(),
        ))
    }

    /// True when a path is exempt from tenant resolution.
    pub fn is_exempt_path(&self, path: &str) -> bool {
        self.config
            .exempt_paths
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }
}
