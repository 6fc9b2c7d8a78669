//! Post-commit event reactions.
//!
//! The unit of work hands committed events to the fabric, which runs exactly
//! one reaction per event in recorded order: cache invalidation through the
//! directory, and database provisioning for newly created dedicated-database
//! tenants. A failing reaction is logged and returned to the committer; the
//! commit itself already happened and is not undone.

use crate::directory::TenantDirectory;
use crate::lifecycle::LifecycleManager;
use std::sync::Arc;
use tessera_core::{TenantError, TenantEvent, TenantEventKind, TenantResult};
use tracing::{debug, error, warn};

/// Dispatches committed tenant events to their reactions.
pub struct EventFabric {
    directory: Arc<TenantDirectory>,
    lifecycle: Arc<LifecycleManager>,
}

impl EventFabric {
    pub fn new(directory: Arc<TenantDirectory>, lifecycle: Arc<LifecycleManager>) -> Self {
        Self {
            directory,
            lifecycle,
        }
    }

    /// Run the reactions for a batch of committed events, oldest first.
    pub async fn dispatch(&self, events: &[TenantEvent]) -> TenantResult<()> {
        let mut ordered: Vec<&TenantEvent> = events.iter().collect();
        ordered.sort_by_key(|e| e.recorded_at);

        for event in ordered {
            debug!(event = event.name(), tenant_id = %event.tenant_id(), "dispatching event");
            if let Err(err) = self.react(event).await {
                error!(
                    event = event.name(),
                    tenant_id = %event.tenant_id(),
                    error = %err,
                    "event reaction failed"
                );
                return Err(err);
            }
        }
        Ok(())
    }

    async fn react(&self, event: &TenantEvent) -> TenantResult<()> {
        match &event.kind {
            TenantEventKind::Created {
                tenant_id,
                identifier,
                use_shared_database,
                ..
            } => {
                self.directory.invalidate_identifier(identifier).await;
                if !*use_shared_database {
                    // Provisioning is deferred until a connection string is
                    // configured; that is not a dispatch failure.
                    match self.lifecycle.initialize_database(*tenant_id).await {
                        Ok(()) => {}
                        Err(TenantError::ConnectionInvalid(reason)) => {
                            warn!(tenant_id = %tenant_id, %reason, "provisioning deferred");
                        }
                        Err(err) => return Err(err),
                    }
                }
                Ok(())
            }
            TenantEventKind::ConnectionStringUpdated { tenant_id } => {
                self.directory.invalidate_connection_string(*tenant_id).await;
                Ok(())
            }
            TenantEventKind::Deactivated { tenant_id, .. } => {
                self.directory.invalidate_id(*tenant_id).await;
                self.directory.invalidate_connection_string(*tenant_id).await;
                Ok(())
            }
            TenantEventKind::DomainAdded { domain, .. } => {
                self.directory.invalidate_domain(domain).await;
                Ok(())
            }
            TenantEventKind::SettingsUpdated { tenant_id, .. } => {
                self.directory.invalidate_settings(*tenant_id).await;
                Ok(())
            }
        }
    }
}
