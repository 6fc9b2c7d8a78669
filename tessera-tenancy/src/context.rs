//! Task-local tenant context.
//!
//! The resolved tenant travels with the task handling its request, not in a
//! global. Concurrent requests on the same runtime therefore never observe
//! each other's tenant, and nested scopes shadow the outer tenant for the
//! duration of the inner future.

use std::future::Future;
use std::sync::Arc;
use tessera_core::{Tenant, TenantError, TenantResult};
use uuid::Uuid;

tokio::task_local! {
    static CURRENT_TENANT: Arc<Tenant>;
}

/// Accessor for the tenant bound to the current task.
pub struct TenantContext;

impl TenantContext {
    /// Run a future with `tenant` installed as the current tenant.
    ///
    /// # Examples
    ///
    /// ```
    /// use tessera_core::Tenant;
    /// use tessera_tenancy::TenantContext;
    ///
    /// # #[tokio::main]
    /// # async fn main() {
    /// let tenant = Tenant::create("Acme", "acme", false);
    /// let id = tenant.id;
    ///
    /// TenantContext::scope(tenant, async move {
    ///     assert_eq!(TenantContext::current_id(), Some(id));
    /// })
    /// .await;
    ///
    /// assert_eq!(TenantContext::current_id(), None);
    /// # }
    /// ```
    pub async fn scope<F>(tenant: Tenant, fut: F) -> F::Output
    where
        F: Future,
    {
        CURRENT_TENANT.scope(Arc::new(tenant), fut).await
    }

    /// The tenant bound to the current task, if any.
    pub fn current() -> Option<Arc<Tenant>> {
        CURRENT_TENANT.try_with(Arc::clone).ok()
    }

    /// The current tenant's id.
    pub fn current_id() -> Option<Uuid> {
        Self::current().map(|t| t.id)
    }

    /// The current tenant, or `NotFound` when the task has none installed.
    pub fn require() -> TenantResult<Arc<Tenant>> {
        Self::current()
            .ok_or_else(|| TenantError::NotFound("no tenant bound to this task".to_string()))
    }

    pub fn is_set() -> bool {
        Self::current().is_some()
    }
}

/// A record carrying its owning tenant's id.
///
/// Tenant-scoped repositories implement their queries over types with this
/// trait and call [`scoped_filter`] first, so shared-database rows are
/// always filtered by the current tenant explicitly.
pub trait TenantScoped {
    fn tenant_id(&self) -> Uuid;
}

/// Keep only the rows belonging to the current tenant.
///
/// Errors when no tenant is bound to the task, so a scoping bug surfaces as
/// an error instead of returning another tenant's rows.
pub fn scoped_filter<T: TenantScoped>(rows: Vec<T>) -> TenantResult<Vec<T>> {
    let tenant = TenantContext::require()?;
    Ok(rows
        .into_iter()
        .filter(|row| row.tenant_id() == tenant.id)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Order {
        tenant_id: Uuid,
        total: u32,
    }

    impl TenantScoped for Order {
        fn tenant_id(&self) -> Uuid {
            self.tenant_id
        }
    }

    #[tokio::test]
    async fn test_scope_installs_and_clears() {
        let tenant = Tenant::create("Acme", "acme", false);
        let id = tenant.id;

        assert!(!TenantContext::is_set());
        TenantContext::scope(tenant, async move {
            assert_eq!(TenantContext::current_id(), Some(id));
            assert_eq!(TenantContext::current().unwrap().identifier, "acme");
        })
        .await;
        assert!(!TenantContext::is_set());
    }

    #[tokio::test]
    async fn test_concurrent_tasks_are_isolated() {
        let acme = Tenant::create("Acme", "acme", false);
        let globex = Tenant::create("Globex", "globex", false);
        let acme_id = acme.id;
        let globex_id = globex.id;

        let a = tokio::spawn(TenantContext::scope(acme, async move {
            tokio::task::yield_now().await;
            TenantContext::current_id()
        }));
        let b = tokio::spawn(TenantContext::scope(globex, async move {
            tokio::task::yield_now().await;
            TenantContext::current_id()
        }));

        assert_eq!(a.await.unwrap(), Some(acme_id));
        assert_eq!(b.await.unwrap(), Some(globex_id));
    }

    #[tokio::test]
    async fn test_nested_scope_shadows() {
        let outer = Tenant::create("Outer", "outer", false);
        let inner = Tenant::create("Inner", "inner", false);
        let outer_id = outer.id;
        let inner_id = inner.id;

        TenantContext::scope(outer, async move {
            assert_eq!(TenantContext::current_id(), Some(outer_id));
            TenantContext::scope(inner, async move {
                assert_eq!(TenantContext::current_id(), Some(inner_id));
            })
            .await;
            assert_eq!(TenantContext::current_id(), Some(outer_id));
        })
        .await;
    }

    #[tokio::test]
    async fn test_scoped_filter() {
        let tenant = Tenant::create("Acme", "acme", true);
        let mine = tenant.id;
        let other = Uuid::new_v4();

        let rows = vec![
            Order {
                tenant_id: mine,
                total: 10,
            },
            Order {
                tenant_id: other,
                total: 20,
            },
            Order {
                tenant_id: mine,
                total: 30,
            },
        ];

        let filtered = TenantContext::scope(tenant, async move { scoped_filter(rows) })
            .await
            .unwrap();

        assert_eq!(filtered.len(), 2);
        assert!(filtered.iter().all(|o| o.tenant_id == mine));
        assert_eq!(filtered.iter().map(|o| o.total).sum::<u32>(), 40);
    }

    #[tokio::test]
    async fn test_scoped_filter_without_context_errors() {
        let rows = vec![Order {
            tenant_id: Uuid::new_v4(),
            total: 10,
        }];
        assert!(scoped_filter(rows).is_err());
    }
}
