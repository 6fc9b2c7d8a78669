//! Tenancy configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Configuration shared by the resolver, directory and lifecycle manager.
#[derive(Debug, Clone)]
pub struct TenancyConfig {
    /// Header carrying the tenant id (UUID). Compared case-insensitively.
    pub tenant_id_header: String,

    /// Header carrying the tenant identifier slug.
    pub tenant_identifier_header: String,

    /// Path prefixes that bypass tenant resolution (health checks,
    /// tenant-management endpoints).
    pub exempt_paths: Vec<String>,

    /// TTL for cached tenant lookups (by id, identifier or domain).
    pub tenant_cache_ttl: Duration,

    /// TTL for cached connection strings.
    pub connection_cache_ttl: Duration,

    /// Connection string of the central tenant registry database.
    pub central_connection_string: String,

    /// Template database cloned when provisioning dedicated tenant databases.
    pub database_template: Option<String>,

    /// Directory where backup artifacts are written.
    pub backup_dir: PathBuf,
}

impl Default for TenancyConfig {
    fn default() -> Self {
        Self {
            tenant_id_header: "x-tenant-id".to_string(),
            tenant_identifier_header: "x-tenant-identifier".to_string(),
            exempt_paths: vec![
                "/health".to_string(),
                "/healthz".to_string(),
                "/swagger".to_string(),
                "/.well-known".to_string(),
                "/api/tenants".to_string(),
                "/api/tenant-migrations".to_string(),
            ],
            tenant_cache_ttl: Duration::from_secs(30 * 60),
            connection_cache_ttl: Duration::from_secs(60 * 60),
            central_connection_string: String::new(),
            database_template: None,
            backup_dir: PathBuf::from("Backups"),
        }
    }
}

impl TenancyConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the tenant id header name.
    pub fn with_tenant_id_header(mut self, header: impl Into<String>) -> Self {
        self.tenant_id_header = header.into().to_lowercase();
        self
    }

    /// Set the tenant identifier header name.
    pub fn with_tenant_identifier_header(mut self, header: impl Into<String>) -> Self {
        self.tenant_identifier_header = header.into().to_lowercase();
        self
    }

    /// Replace the exempt path prefixes.
    pub fn with_exempt_paths(mut self, paths: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.exempt_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Add one exempt path prefix.
    pub fn with_exempt_path(mut self, path: impl Into<String>) -> Self {
        self.exempt_paths.push(path.into());
        self
    }

    /// Set the tenant lookup cache TTL.
    pub fn with_tenant_cache_ttl(mut self, ttl: Duration) -> Self {
        self.tenant_cache_ttl = ttl;
        self
    }

    /// Set the connection string cache TTL.
    pub fn with_connection_cache_ttl(mut self, ttl: Duration) -> Self {
        self.connection_cache_ttl = ttl;
        self
    }

    /// Set the central registry connection string.
    pub fn with_central_connection_string(mut self, conn: impl Into<String>) -> Self {
        self.central_connection_string = conn.into();
        self
    }

    /// Set the template database for dedicated tenant provisioning.
    pub fn with_database_template(mut self, template: impl Into<String>) -> Self {
        self.database_template = Some(template.into());
        self
    }

    /// Set the backup directory.
    pub fn with_backup_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.backup_dir = dir.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TenancyConfig::default();
        assert_eq!(config.tenant_id_header, "x-tenant-id");
        assert_eq!(config.tenant_identifier_header, "x-tenant-identifier");
        assert_eq!(config.tenant_cache_ttl, Duration::from_secs(1800));
        assert_eq!(config.connection_cache_ttl, Duration::from_secs(3600));
        assert!(config.exempt_paths.iter().any(|p| p == "/health"));
    }

    #[test]
    fn test_builder_lowercases_headers() {
        let config = TenancyConfig::new()
            .with_tenant_id_header("X-Org-ID")
            .with_tenant_identifier_header("X-Org-Slug");

        assert_eq!(config.tenant_id_header, "x-org-id");
        assert_eq!(config.tenant_identifier_header, "x-org-slug");
    }
}
