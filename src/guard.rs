//! RAII handle for acquired resources

use std::fmt;
use std::ops::{Deref, DerefMut};

use crate::factory::Factory;
use crate::key::PoolKey;
use crate::pool::Pool;

/// RAII handle pairing an acquired resource with its release path.
///
/// Dropping the guard returns the resource to the pool on a spawned task;
/// use [`PoolGuard::release`] to run the release protocol (validation,
/// storage or destruction, pending-request servicing) deterministically.
pub struct PoolGuard<K: PoolKey, F: Factory<K>> {
    pool: Pool<K, F>,
    key: K,
    resource: Option<F::Resource>,
}

impl<K: PoolKey, F: Factory<K>> PoolGuard<K, F> {
    pub(crate) fn new(pool: Pool<K, F>, key: K, resource: F::Resource) -> Self {
        Self {
            pool,
            key,
            resource: Some(resource),
        }
    }

    /// The key this resource was acquired under.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Return the resource to the pool, waiting for the release protocol to
    /// finish.
    pub async fn release(mut self) {
        if let Some(resource) = self.resource.take() {
            self.pool.release(&self.key, resource).await;
        }
    }
}

impl<K: PoolKey, F: Factory<K>> Deref for PoolGuard<K, F> {
    type Target = F::Resource;

    fn deref(&self) -> &F::Resource {
        self.resource.as_ref().expect("guard used after release")
    }
}

impl<K: PoolKey, F: Factory<K>> DerefMut for PoolGuard<K, F> {
    fn deref_mut(&mut self) -> &mut F::Resource {
        self.resource.as_mut().expect("guard used after release")
    }
}

impl<K: PoolKey, F: Factory<K>> Drop for PoolGuard<K, F> {
    fn drop(&mut self) {
        let Some(resource) = self.resource.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let pool = self.pool.clone();
                let key = self.key.clone();
                handle.spawn(async move {
                    pool.release(&key, resource).await;
                });
            }
            Err(_) => {
                // No runtime on this thread: the release protocol cannot run.
                // Free the slot so the accounting stays correct and drop the
                // resource in place; the destroy hook is skipped.
                self.pool.discard(&self.key);
                drop(resource);
                tracing::warn!(
                    key = ?self.key,
                    "guard dropped outside a runtime; resource dropped without destroy"
                );
            }
        }
    }
}

impl<K: PoolKey, F: Factory<K>> fmt::Debug for PoolGuard<K, F>
where
    F::Resource: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolGuard")
            .field("key", &self.key)
            .field("resource", &self.resource)
            .finish()
    }
}
