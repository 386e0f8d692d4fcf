//! Per-adapter cache of tenant contexts.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::OnceCell;
use tracing::info;

use kgraph_core::{KgResult, PartitionHandle, TenantIsolationResolver};

/// Lazily created tenant contexts, one cell per tenant.
///
/// The map lock is only held to fetch a tenant's cell; the cell itself
/// serialises creation, so two first requests for the same tenant wait on one
/// provisioning call while other tenants proceed independently.
pub struct TenantRegistry {
    resolver: TenantIsolationResolver,
    contexts: Mutex<HashMap<String, Arc<OnceCell<PartitionHandle>>>>,
}

impl TenantRegistry {
    pub fn new(resolver: TenantIsolationResolver) -> Self {
        Self { resolver, contexts: Mutex::new(HashMap::new()) }
    }

    pub fn resolver(&self) -> &TenantIsolationResolver {
        &self.resolver
    }

    /// A context already created for `tenant_id`, if any.
    pub fn cached(&self, tenant_id: &str) -> Option<PartitionHandle> {
        self.contexts.lock().get(tenant_id).and_then(|cell| cell.get().cloned())
    }

    /// Return the tenant's context, running `provision` once if it does not
    /// exist yet. A failed provisioning leaves the cell empty so a later call
    /// retries.
    pub async fn get_or_create<F, Fut>(
        &self,
        tenant_id: &str,
        provision: F,
    ) -> KgResult<PartitionHandle>
    where
        F: FnOnce(PartitionHandle) -> Fut,
        Fut: Future<Output = KgResult<PartitionHandle>>,
    {
        let cell = {
            let mut contexts = self.contexts.lock();
            contexts.entry(tenant_id.to_string()).or_default().clone()
        };

        let handle = cell
            .get_or_try_init(|| async {
                let handle = self.resolver.resolve(tenant_id)?;
                let handle = provision(handle).await?;
                info!(tenant_id, partition = %handle.partition, "Created tenant context");
                Ok::<_, kgraph_core::KgError>(handle)
            })
            .await?;
        Ok(handle.clone())
    }

    /// Number of tenants with a live context.
    pub fn len(&self) -> usize {
        self.contexts.lock().values().filter(|cell| cell.initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every cached context (used on close).
    pub fn clear(&self) {
        self.contexts.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use kgraph_core::{IsolationConfig, KgError};

    fn registry() -> Arc<TenantRegistry> {
        let resolver = TenantIsolationResolver::new(IsolationConfig::default()).unwrap();
        Arc::new(TenantRegistry::new(resolver))
    }

    #[tokio::test]
    async fn concurrent_first_access_provisions_once() {
        let registry = registry();
        let provisioned = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let registry = registry.clone();
            let provisioned = provisioned.clone();
            tasks.push(tokio::spawn(async move {
                registry
                    .get_or_create("tenant-a", |handle| async move {
                        provisioned.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok(handle)
                    })
                    .await
            }));
        }

        let mut partitions = Vec::new();
        for task in tasks {
            partitions.push(task.await.unwrap().unwrap().partition);
        }
        assert_eq!(provisioned.load(Ordering::SeqCst), 1);
        assert!(partitions.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn failed_provisioning_is_retried() {
        let registry = registry();
        let first = registry
            .get_or_create("t1", |_| async { Err(KgError::unavailable("down")) })
            .await;
        assert!(first.is_err());
        assert!(registry.cached("t1").is_none());

        let second = registry.get_or_create("t1", |h| async move { Ok(h) }).await.unwrap();
        assert_eq!(registry.cached("t1"), Some(second));
    }

    #[tokio::test]
    async fn tenants_get_distinct_partitions() {
        let registry = registry();
        let a = registry.get_or_create("a", |h| async move { Ok(h) }).await.unwrap();
        let b = registry.get_or_create("b", |h| async move { Ok(h) }).await.unwrap();
        assert_ne!(a.partition, b.partition);
        registry.clear();
        assert!(registry.is_empty());
    }
}
