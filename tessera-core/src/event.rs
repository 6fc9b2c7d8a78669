//! Domain events recorded by tenant mutations.
//!
//! Events are accumulated on the mutated `Tenant` as an outbox and drained by
//! the unit of work only after its transaction commits, so a rolled-back
//! change never triggers cache invalidation or provisioning.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What changed on a tenant.
///
/// Connection string contents are deliberately absent: reactions only need
/// the tenant id, and event payloads may end up in logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TenantEventKind {
    Created {
        tenant_id: Uuid,
        name: String,
        identifier: String,
        use_shared_database: bool,
    },
    ConnectionStringUpdated {
        tenant_id: Uuid,
    },
    Deactivated {
        tenant_id: Uuid,
        name: String,
    },
    DomainAdded {
        tenant_id: Uuid,
        domain: String,
        is_primary: bool,
    },
    SettingsUpdated {
        tenant_id: Uuid,
        keys: Vec<String>,
    },
}

/// A recorded domain event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantEvent {
    /// Unique event id.
    pub id: Uuid,
    /// When the mutation recorded this event; dispatch preserves this order.
    pub recorded_at: DateTime<Utc>,
    /// The change that happened.
    pub kind: TenantEventKind,
}

impl TenantEvent {
    pub fn new(kind: TenantEventKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            recorded_at: Utc::now(),
            kind,
        }
    }

    /// Stable event name for logging.
    pub fn name(&self) -> &'static str {
        match self.kind {
            TenantEventKind::Created { .. } => "tenant_created",
            TenantEventKind::ConnectionStringUpdated { .. } => "tenant_connection_string_updated",
            TenantEventKind::Deactivated { .. } => "tenant_deactivated",
            TenantEventKind::DomainAdded { .. } => "tenant_domain_added",
            TenantEventKind::SettingsUpdated { .. } => "tenant_settings_updated",
        }
    }

    /// The tenant this event belongs to.
    pub fn tenant_id(&self) -> Uuid {
        match &self.kind {
            TenantEventKind::Created { tenant_id, .. }
            | TenantEventKind::ConnectionStringUpdated { tenant_id }
            | TenantEventKind::Deactivated { tenant_id, .. }
            | TenantEventKind::DomainAdded { tenant_id, .. }
            | TenantEventKind::SettingsUpdated { tenant_id, .. } => *tenant_id,
        }
    }
}
