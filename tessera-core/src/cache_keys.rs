//! Cache key catalogue for tenant lookups.
//!
//! Every component that reads or invalidates tenant cache entries goes
//! through these constructors so a key is never assembled twice.

use uuid::Uuid;

/// Key for a lookup by tenant id.
pub fn tenant_by_id(id: Uuid) -> String {
    format!("tenant_id_{id}")
}

/// Key for a lookup by identifier slug.
pub fn tenant_by_identifier(identifier: &str) -> String {
    format!("tenant_identifier_{identifier}")
}

/// Key for a host-based domain lookup.
pub fn tenant_by_domain(domain: &str) -> String {
    format!("tenant_domain_{domain}")
}

/// Key for a tenant's connection string.
pub fn tenant_connection_string(id: Uuid) -> String {
    format!("tenant_connection_{id}")
}

/// Key for a tenant's settings map.
pub fn tenant_settings(id: Uuid) -> String {
    format!("tenant_settings_{id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_formats() {
        let id = Uuid::nil();
        assert_eq!(
            tenant_by_id(id),
            "tenant_id_00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(tenant_by_identifier("acme"), "tenant_identifier_acme");
        assert_eq!(
            tenant_by_domain("acme.example.com"),
            "tenant_domain_acme.example.com"
        );
        assert_eq!(
            tenant_connection_string(id),
            "tenant_connection_00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(
            tenant_settings(id),
            "tenant_settings_00000000-0000-0000-0000-000000000000"
        );
    }
}
