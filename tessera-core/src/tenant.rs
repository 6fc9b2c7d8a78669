//! Tenant aggregate and its owned records.

use crate::error::{TenantError, TenantResult};
use crate::event::{TenantEvent, TenantEventKind};
use crate::masking::mask_connection_string;
use crate::status::DatabaseStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A hostname mapped to a tenant. Domain strings are globally unique across
/// tenants; exactly one domain per tenant is primary once any exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantDomain {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub domain: String,
    pub is_primary: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl TenantDomain {
    pub fn new(tenant_id: Uuid, domain: impl Into<String>, is_primary: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            domain: domain.into(),
            is_primary,
            is_active: true,
            created_at: Utc::now(),
        }
    }
}

/// A per-tenant key/value setting. Keys are unique within a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantSetting {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub key: String,
    pub value: String,
}

impl TenantSetting {
    pub fn new(tenant_id: Uuid, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Append-only audit record written on every mutating operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantAuditLog {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub action: String,
    pub details: String,
    pub timestamp: DateTime<Utc>,
}

impl TenantAuditLog {
    pub fn new(tenant_id: Uuid, action: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            action: action.into(),
            details: details.into(),
            timestamp: Utc::now(),
        }
    }
}

/// An isolated customer/org context.
///
/// Mutating methods record exactly one [`TenantEvent`] each on the tenant's
/// outbox and bump `last_updated_at`. The outbox is drained by the unit of
/// work after its transaction commits.
#[derive(Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    /// Human-readable unique slug.
    pub identifier: String,
    /// Opaque locator for the tenant's data store; empty until provisioned.
    pub connection_string: Option<String>,
    /// Inactive tenants reject all tenant-scoped requests.
    pub is_active: bool,
    /// True: rows partitioned in a shared store. False: dedicated store.
    pub use_shared_database: bool,
    pub database_status: DatabaseStatus,
    /// Last provisioning/migration failure detail (masked).
    pub database_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: Option<DateTime<Utc>>,
    pub database_created_at: Option<DateTime<Utc>>,
    pub domains: Vec<TenantDomain>,
    pub settings: Vec<TenantSetting>,

    /// Outbox of events recorded since the last drain. Not serialized: cached
    /// copies of a tenant must never replay events.
    #[serde(skip)]
    pending_events: Vec<TenantEvent>,
}

impl Tenant {
    /// Create a new tenant in `Pending` state and record `TenantCreated`.
    pub fn create(
        name: impl Into<String>,
        identifier: impl Into<String>,
        use_shared_database: bool,
    ) -> Self {
        let name = name.into();
        let identifier = identifier.into();
        let mut tenant = Self {
            id: Uuid::new_v4(),
            name: name.clone(),
            identifier: identifier.clone(),
            connection_string: None,
            is_active: true,
            use_shared_database,
            database_status: DatabaseStatus::Pending,
            database_error: None,
            created_at: Utc::now(),
            last_updated_at: None,
            database_created_at: None,
            domains: Vec::new(),
            settings: Vec::new(),
            pending_events: Vec::new(),
        };

        tenant.record(TenantEventKind::Created {
            tenant_id: tenant.id,
            name,
            identifier,
            use_shared_database,
        });
        tenant
    }

    /// Replace the connection string and record the update.
    pub fn update_connection_string(&mut self, connection_string: impl Into<String>) {
        self.connection_string = Some(connection_string.into());
        self.touch();
        self.record(TenantEventKind::ConnectionStringUpdated { tenant_id: self.id });
    }

    /// Attach a domain. The first domain always becomes primary; adding a new
    /// primary demotes the previous one so at most one stays primary.
    pub fn add_domain(&mut self, domain: impl Into<String>, is_primary: bool) {
        let domain = domain.into();
        let is_primary = is_primary || self.domains.is_empty();

        if is_primary {
            for existing in &mut self.domains {
                existing.is_primary = false;
            }
        }

        self.domains
            .push(TenantDomain::new(self.id, domain.clone(), is_primary));
        self.touch();
        self.record(TenantEventKind::DomainAdded {
            tenant_id: self.id,
            domain,
            is_primary,
        });
    }

    /// Upsert settings; last write wins per key. Records one
    /// `SettingsUpdated` event for the whole batch.
    pub fn update_settings<K, V>(&mut self, entries: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut keys = Vec::new();
        for (key, value) in entries {
            let key = key.into();
            let value = value.into();
            match self.settings.iter_mut().find(|s| s.key == key) {
                Some(setting) => setting.value = value,
                None => self.settings.push(TenantSetting::new(self.id, &key, value)),
            }
            keys.push(key);
        }

        if keys.is_empty() {
            return;
        }

        self.touch();
        self.record(TenantEventKind::SettingsUpdated {
            tenant_id: self.id,
            keys,
        });
    }

    /// Soft-disable the tenant. Idempotent: deactivating an inactive tenant
    /// records nothing.
    pub fn deactivate(&mut self) {
        if !self.is_active {
            return;
        }

        self.is_active = false;
        self.touch();
        self.record(TenantEventKind::Deactivated {
            tenant_id: self.id,
            name: self.name.clone(),
        });
    }

    /// Flip the active flag; deactivation goes through [`Self::deactivate`]
    /// so the event is recorded exactly once.
    pub fn set_active(&mut self, is_active: bool) {
        if self.is_active == is_active {
            return;
        }
        if is_active {
            self.is_active = true;
            self.touch();
        } else {
            self.deactivate();
        }
    }

    /// Rename the tenant. No event: display names are not cached by name.
    pub fn update_details(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.touch();
    }

    /// Move the database status along the lifecycle state machine.
    ///
    /// Stamps `database_created_at` on the first transition to `Active`.
    /// Rejects transitions the state machine does not permit.
    pub fn set_database_status(
        &mut self,
        status: DatabaseStatus,
        error: Option<String>,
    ) -> TenantResult<()> {
        if !self.database_status.can_transition_to(status) {
            return Err(TenantError::Conflict(format!(
                "illegal database status transition {} -> {} for tenant {}",
                self.database_status, status, self.id
            )));
        }

        self.database_status = status;
        self.database_error = error.map(|e| mask_connection_string(&e));
        self.touch();

        if status == DatabaseStatus::Active && self.database_created_at.is_none() {
            self.database_created_at = Some(Utc::now());
        }
        Ok(())
    }

    /// The primary domain, if any domain has been added.
    pub fn primary_domain(&self) -> Option<&TenantDomain> {
        self.domains.iter().find(|d| d.is_primary)
    }

    /// Setting value by key.
    pub fn setting(&self, key: &str) -> Option<&str> {
        self.settings
            .iter()
            .find(|s| s.key == key)
            .map(|s| s.value.as_str())
    }

    /// Database name parsed out of the connection string. Understands both
    /// `key=value;` pairs (`database=` / `dbname=`) and URL-style locators.
    pub fn database_name(&self) -> Option<String> {
        let conn = self.connection_string.as_deref()?;

        for pair in conn.split(';') {
            let mut parts = pair.splitn(2, '=');
            let key = parts.next()?.trim().to_ascii_lowercase();
            if key == "database" || key == "dbname" {
                if let Some(value) = parts.next() {
                    let value = value.trim();
                    if !value.is_empty() {
                        return Some(value.to_string());
                    }
                }
            }
        }

        if let Some(rest) = conn.split("://").nth(1) {
            let path = rest.splitn(2, '/').nth(1)?;
            let name = path.split(['?', '#']).next()?.trim();
            if !name.is_empty() {
                return Some(name.to_string());
            }
        }

        None
    }

    /// Drain the outbox, oldest first.
    pub fn take_events(&mut self) -> Vec<TenantEvent> {
        std::mem::take(&mut self.pending_events)
    }

    /// Peek at the outbox without draining.
    pub fn pending_events(&self) -> &[TenantEvent] {
        &self.pending_events
    }

    fn record(&mut self, kind: TenantEventKind) {
        self.pending_events.push(TenantEvent::new(kind));
    }

    fn touch(&mut self) {
        self.last_updated_at = Some(Utc::now());
    }
}

impl std::fmt::Debug for Tenant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tenant")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("identifier", &self.identifier)
            .field(
                "connection_string",
                &self
                    .connection_string
                    .as_deref()
                    .map(mask_connection_string),
            )
            .field("is_active", &self.is_active)
            .field("use_shared_database", &self.use_shared_database)
            .field("database_status", &self.database_status)
            .field("database_error", &self.database_error)
            .field("domains", &self.domains.len())
            .field("settings", &self.settings.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_records_event() {
        let tenant = Tenant::create("Acme", "acme", false);
        assert!(tenant.is_active);
        assert_eq!(tenant.database_status, DatabaseStatus::Pending);
        assert_eq!(tenant.pending_events().len(), 1);
        assert_eq!(tenant.pending_events()[0].name(), "tenant_created");
    }

    #[test]
    fn test_first_domain_is_primary() {
        let mut tenant = Tenant::create("Acme", "acme", false);
        tenant.add_domain("acme.example.com", false);
        assert!(tenant.primary_domain().is_some());
        assert_eq!(tenant.primary_domain().unwrap().domain, "acme.example.com");
    }

    #[test]
    fn test_single_primary_domain() {
        let mut tenant = Tenant::create("Acme", "acme", false);
        tenant.add_domain("acme.example.com", true);
        tenant.add_domain("acme.example.org", true);

        let primaries: Vec<_> = tenant.domains.iter().filter(|d| d.is_primary).collect();
        assert_eq!(primaries.len(), 1);
        assert_eq!(primaries[0].domain, "acme.example.org");
    }

    #[test]
    fn test_settings_last_write_wins() {
        let mut tenant = Tenant::create("Acme", "acme", true);
        tenant.update_settings([("theme", "light")]);
        tenant.update_settings([("theme", "dark")]);

        assert_eq!(tenant.setting("theme"), Some("dark"));
        assert_eq!(tenant.settings.len(), 1);
        // One event per update call.
        assert_eq!(
            tenant
                .pending_events()
                .iter()
                .filter(|e| e.name() == "tenant_settings_updated")
                .count(),
            2
        );
    }

    #[test]
    fn test_deactivate_idempotent() {
        let mut tenant = Tenant::create("Acme", "acme", false);
        tenant.take_events();

        tenant.deactivate();
        tenant.deactivate();

        assert!(!tenant.is_active);
        assert_eq!(tenant.pending_events().len(), 1);
    }

    #[test]
    fn test_database_created_at_stamped_once() {
        let mut tenant = Tenant::create("Acme", "acme", false);
        tenant
            .set_database_status(DatabaseStatus::Creating, None)
            .unwrap();
        tenant
            .set_database_status(DatabaseStatus::Active, None)
            .unwrap();
        let first = tenant.database_created_at.unwrap();

        tenant
            .set_database_status(DatabaseStatus::Migrating, None)
            .unwrap();
        tenant
            .set_database_status(DatabaseStatus::Active, None)
            .unwrap();
        assert_eq!(tenant.database_created_at, Some(first));
    }

    #[test]
    fn test_illegal_transition_rejected() {
        let mut tenant = Tenant::create("Acme", "acme", false);
        let err = tenant
            .set_database_status(DatabaseStatus::Migrating, None)
            .unwrap_err();
        assert!(matches!(err, TenantError::Conflict(_)));
    }

    #[test]
    fn test_status_error_is_masked() {
        let mut tenant = Tenant::create("Acme", "acme", false);
        tenant
            .set_database_status(DatabaseStatus::Creating, None)
            .unwrap();
        tenant
            .set_database_status(
                DatabaseStatus::Failed,
                Some("connect failed: host=db;password=hunter2".into()),
            )
            .unwrap();
        assert!(!tenant.database_error.as_deref().unwrap().contains("hunter2"));
    }

    #[test]
    fn test_database_name_from_kv_pairs() {
        let mut tenant = Tenant::create("Acme", "acme", false);
        tenant.update_connection_string("Host=db;Database=tessera_acme;Password=x");
        assert_eq!(tenant.database_name().as_deref(), Some("tessera_acme"));
    }

    #[test]
    fn test_database_name_from_url() {
        let mut tenant = Tenant::create("Acme", "acme", false);
        tenant.update_connection_string("postgres://app:x@db:5432/tessera_acme?sslmode=require");
        assert_eq!(tenant.database_name().as_deref(), Some("tessera_acme"));
    }

    #[test]
    fn test_serialized_tenant_drops_outbox() {
        let tenant = Tenant::create("Acme", "acme", false);
        let json = serde_json::to_string(&tenant).unwrap();
        let restored: Tenant = serde_json::from_str(&json).unwrap();
        assert!(restored.pending_events().is_empty());
        assert_eq!(restored.id, tenant.id);
    }

    #[test]
    fn test_debug_masks_connection_string() {
        let mut tenant = Tenant::create("Acme", "acme", false);
        tenant.update_connection_string("host=db;password=hunter2");
        let debug = format!("{tenant:?}");
        assert!(!debug.contains("hunter2"));
    }
}
