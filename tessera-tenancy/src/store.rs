//! Central tenant registry port.
//!
//! The registry holding all tenants lives in a central database; this module
//! defines the port a deployment implements against its database of choice,
//! plus an in-memory reference implementation used by tests and embedded
//! deployments.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tessera_core::{Tenant, TenantAuditLog, TenantDomain, TenantError, TenantResult};
use uuid::Uuid;

/// Read side of the central tenant registry.
///
/// Lookups by id and identifier return inactive tenants as well; activity
/// enforcement belongs to the caller. Domain lookups only match active
/// tenants with an active domain.
#[async_trait]
pub trait TenantStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> TenantResult<Option<Tenant>>;

    async fn find_by_identifier(&self, identifier: &str) -> TenantResult<Option<Tenant>>;

    /// Find the active tenant owning an active domain.
    async fn find_by_domain(&self, domain: &str) -> TenantResult<Option<Tenant>>;

    async fn list_all(&self) -> TenantResult<Vec<Tenant>>;

    async fn list_active(&self) -> TenantResult<Vec<Tenant>>;

    /// All active domains of active tenants.
    async fn list_active_domains(&self) -> TenantResult<Vec<TenantDomain>>;

    async fn identifier_exists(&self, identifier: &str) -> TenantResult<bool>;

    async fn domain_exists(&self, domain: &str) -> TenantResult<bool>;

    /// Audit entries for a tenant, oldest first. Survives tenant deletion.
    async fn audit_trail(&self, tenant_id: Uuid) -> TenantResult<Vec<TenantAuditLog>>;

    /// Open a write transaction.
    async fn begin(&self) -> TenantResult<Box<dyn StoreTransaction>>;
}

/// A staged write transaction against the registry.
///
/// Staged writes become visible only on `commit`. Uniqueness of identifiers
/// and domains and the one-primary-domain rule are checked at commit and
/// reported as [`TenantError::Conflict`]. Dropping an uncommitted
/// transaction must discard its staged writes.
#[async_trait]
pub trait StoreTransaction: Send {
    fn insert_tenant(&mut self, tenant: Tenant);

    fn update_tenant(&mut self, tenant: Tenant);

    /// Delete a tenant and its domains and settings. Audit entries stay.
    fn delete_tenant(&mut self, id: Uuid);

    fn append_audit(&mut self, entry: TenantAuditLog);

    async fn commit(self: Box<Self>) -> TenantResult<()>;

    async fn rollback(self: Box<Self>) -> TenantResult<()>;
}

#[derive(Default)]
struct StoreState {
    tenants: HashMap<Uuid, Tenant>,
    audit: HashMap<Uuid, Vec<TenantAuditLog>>,
}

/// In-memory tenant registry.
///
/// Reference implementation of [`TenantStore`] backed by a `parking_lot`
/// lock. Commit applies all staged writes under one write lock, so readers
/// never observe a half-applied transaction.
#[derive(Default)]
pub struct InMemoryTenantStore {
    state: Arc<RwLock<StoreState>>,
}

impl InMemoryTenantStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TenantStore for InMemoryTenantStore {
    async fn find_by_id(&self, id: Uuid) -> TenantResult<Option<Tenant>> {
        Ok(self.state.read().tenants.get(&id).cloned())
    }

    async fn find_by_identifier(&self, identifier: &str) -> TenantResult<Option<Tenant>> {
        Ok(self
            .state
            .read()
            .tenants
            .values()
            .find(|t| t.identifier == identifier)
            .cloned())
    }

    async fn find_by_domain(&self, domain: &str) -> TenantResult<Option<Tenant>> {
        Ok(self
            .state
            .read()
            .tenants
            .values()
            .find(|t| {
                t.is_active
                    && t.domains
                        .iter()
                        .any(|d| d.is_active && d.domain == domain)
            })
            .cloned())
    }

    async fn list_all(&self) -> TenantResult<Vec<Tenant>> {
        let mut tenants: Vec<_> = self.state.read().tenants.values().cloned().collect();
        tenants.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(tenants)
    }

    async fn list_active(&self) -> TenantResult<Vec<Tenant>> {
        let mut tenants: Vec<_> = self
            .state
            .read()
            .tenants
            .values()
            .filter(|t| t.is_active)
            .cloned()
            .collect();
        tenants.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(tenants)
    }

    async fn list_active_domains(&self) -> TenantResult<Vec<TenantDomain>> {
        Ok(self
            .state
            .read()
            .tenants
            .values()
            .filter(|t| t.is_active)
            .flat_map(|t| t.domains.iter().filter(|d| d.is_active).cloned())
            .collect())
    }

    async fn identifier_exists(&self, identifier: &str) -> TenantResult<bool> {
        Ok(self
            .state
            .read()
            .tenants
            .values()
            .any(|t| t.identifier == identifier))
    }

    async fn domain_exists(&self, domain: &str) -> TenantResult<bool> {
        Ok(self
            .state
            .read()
            .tenants
            .values()
            .any(|t| t.domains.iter().any(|d| d.domain == domain)))
    }

    async fn audit_trail(&self, tenant_id: Uuid) -> TenantResult<Vec<TenantAuditLog>> {
        Ok(self
            .state
            .read()
            .audit
            .get(&tenant_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn begin(&self) -> TenantResult<Box<dyn StoreTransaction>> {
        Ok(Box::new(InMemoryTransaction {
            state: Arc::clone(&self.state),
            ops: Vec::new(),
        }))
    }
}

enum StagedOp {
    Insert(Tenant),
    Update(Tenant),
    Delete(Uuid),
    Audit(TenantAuditLog),
}

struct InMemoryTransaction {
    state: Arc<RwLock<StoreState>>,
    ops: Vec<StagedOp>,
}

impl InMemoryTransaction {
    /// Uniqueness and primary-domain checks for an insert or update.
    fn check_constraints(state: &StoreState, tenant: &Tenant) -> TenantResult<()> {
        if state
            .tenants
            .values()
            .any(|t| t.id != tenant.id && t.identifier == tenant.identifier)
        {
            return Err(TenantError::Conflict(format!(
                "identifier '{}' is already taken",
                tenant.identifier
            )));
        }

        for domain in &tenant.domains {
            let taken = state.tenants.values().any(|t| {
                t.id != tenant.id && t.domains.iter().any(|d| d.domain == domain.domain)
            });
            if taken {
                return Err(TenantError::Conflict(format!(
                    "domain '{}' is already taken",
                    domain.domain
                )));
            }
        }

        if tenant.domains.iter().filter(|d| d.is_primary).count() > 1 {
            return Err(TenantError::Conflict(format!(
                "tenant {} has more than one primary domain",
                tenant.id
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    fn insert_tenant(&mut self, tenant: Tenant) {
        self.ops.push(StagedOp::Insert(tenant));
    }

    fn update_tenant(&mut self, tenant: Tenant) {
        self.ops.push(StagedOp::Update(tenant));
    }

    fn delete_tenant(&mut self, id: Uuid) {
        self.ops.push(StagedOp::Delete(id));
    }

    fn append_audit(&mut self, entry: TenantAuditLog) {
        self.ops.push(StagedOp::Audit(entry));
    }

    async fn commit(self: Box<Self>) -> TenantResult<()> {
        let mut state = self.state.write();

        // Validate everything before applying anything.
        for op in &self.ops {
            match op {
                StagedOp::Insert(tenant) => {
                    if state.tenants.contains_key(&tenant.id) {
                        return Err(TenantError::Conflict(format!(
                            "tenant {} already exists",
                            tenant.id
                        )));
                    }
                    Self::check_constraints(&state, tenant)?;
                }
                StagedOp::Update(tenant) => {
                    if !state.tenants.contains_key(&tenant.id) {
                        return Err(TenantError::NotFound(tenant.id.to_string()));
                    }
                    Self::check_constraints(&state, tenant)?;
                }
                StagedOp::Delete(_) | StagedOp::Audit(_) => {}
            }
        }

        for op in self.ops {
            match op {
                StagedOp::Insert(tenant) | StagedOp::Update(tenant) => {
                    state.tenants.insert(tenant.id, tenant);
                }
                StagedOp::Delete(id) => {
                    state.tenants.remove(&id);
                }
                StagedOp::Audit(entry) => {
                    state.audit.entry(entry.tenant_id).or_default().push(entry);
                }
            }
        }

        Ok(())
    }

    async fn rollback(self: Box<Self>) -> TenantResult<()> {
        // Nothing was applied; dropping the staged ops is the rollback.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn insert(store: &InMemoryTenantStore, tenant: &mut Tenant) {
        tenant.take_events();
        let mut txn = store.begin().await.unwrap();
        txn.insert_tenant(tenant.clone());
        txn.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let store = InMemoryTenantStore::new();
        let mut tenant = Tenant::create("Acme", "acme", false);
        tenant.add_domain("acme.example.com", true);
        insert(&store, &mut tenant).await;

        assert!(store.find_by_id(tenant.id).await.unwrap().is_some());
        assert!(store.find_by_identifier("acme").await.unwrap().is_some());
        assert!(
            store
                .find_by_domain("acme.example.com")
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_duplicate_identifier_conflicts() {
        let store = InMemoryTenantStore::new();
        let mut first = Tenant::create("Acme", "acme", false);
        insert(&store, &mut first).await;

        let second = Tenant::create("Acme Two", "acme", false);
        let mut txn = store.begin().await.unwrap();
        txn.insert_tenant(second);
        let err = txn.commit().await.unwrap_err();
        assert!(matches!(err, TenantError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_duplicate_domain_conflicts() {
        let store = InMemoryTenantStore::new();
        let mut first = Tenant::create("Acme", "acme", false);
        first.add_domain("shared.example.com", true);
        insert(&store, &mut first).await;

        let mut second = Tenant::create("Globex", "globex", false);
        second.add_domain("shared.example.com", true);
        let mut txn = store.begin().await.unwrap();
        txn.insert_tenant(second);
        let err = txn.commit().await.unwrap_err();
        assert!(matches!(err, TenantError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_failed_commit_applies_nothing() {
        let store = InMemoryTenantStore::new();
        let mut existing = Tenant::create("Acme", "acme", false);
        insert(&store, &mut existing).await;

        // The first staged tenant is fine, the second conflicts; neither may
        // land.
        let fresh = Tenant::create("Globex", "globex", false);
        let fresh_id = fresh.id;
        let dup = Tenant::create("Acme Again", "acme", false);

        let mut txn = store.begin().await.unwrap();
        txn.insert_tenant(fresh);
        txn.insert_tenant(dup);
        assert!(txn.commit().await.is_err());

        assert!(store.find_by_id(fresh_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_domain_lookup_skips_inactive_tenant() {
        let store = InMemoryTenantStore::new();
        let mut tenant = Tenant::create("Acme", "acme", false);
        tenant.add_domain("acme.example.com", true);
        tenant.deactivate();
        insert(&store, &mut tenant).await;

        assert!(
            store
                .find_by_domain("acme.example.com")
                .await
                .unwrap()
                .is_none()
        );
        // Id lookup still returns the inactive tenant.
        assert!(store.find_by_id(tenant.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_audit_survives_delete() {
        let store = InMemoryTenantStore::new();
        let mut tenant = Tenant::create("Acme", "acme", false);
        insert(&store, &mut tenant).await;

        let mut txn = store.begin().await.unwrap();
        txn.append_audit(TenantAuditLog::new(tenant.id, "TenantDeleted", "gone"));
        txn.delete_tenant(tenant.id);
        txn.commit().await.unwrap();

        assert!(store.find_by_id(tenant.id).await.unwrap().is_none());
        let trail = store.audit_trail(tenant.id).await.unwrap();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].action, "TenantDeleted");
    }

    #[tokio::test]
    async fn test_rollback_discards_staged_writes() {
        let store = InMemoryTenantStore::new();
        let tenant = Tenant::create("Acme", "acme", false);
        let id = tenant.id;

        let mut txn = store.begin().await.unwrap();
        txn.insert_tenant(tenant);
        txn.rollback().await.unwrap();

        assert!(store.find_by_id(id).await.unwrap().is_none());
    }
}
