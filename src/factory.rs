//! Resource factory trait (bb8-style)
//!
//! The [`Factory`] trait bundles the three lifecycle hooks the pool consumes:
//! create, validate, and destroy. Only `create` is mandatory; validation
//! defaults to "always valid" and destruction defaults to dropping.

use async_trait::async_trait;

use crate::error::Result;
use crate::key::PoolKey;

/// Creates, validates and tears down pooled resources for a key.
///
/// The pool treats resources as opaque: it only moves them between the idle
/// stack, callers, and this factory's hooks.
#[async_trait]
pub trait Factory<K: PoolKey>: Send + Sync + 'static {
    /// The resource type produced by this factory.
    type Resource: Send + 'static;

    /// Create a new resource for `key`.
    ///
    /// # Errors
    /// A creation failure is propagated verbatim to the acquiring caller;
    /// no pool state is retained for the failed attempt.
    async fn create(&self, key: &K) -> Result<Self::Resource>;

    /// Check whether a resource is still usable.
    ///
    /// Run before an idle resource is handed to a caller and before a
    /// released resource is stored. Returning `false` destroys the resource.
    async fn validate(&self, _resource: &Self::Resource) -> bool {
        true
    }

    /// Tear down a resource that is permanently leaving the pool.
    ///
    /// Fire-and-forget from the pool's point of view: errors are absorbed and
    /// never affect the acquisition or release that triggered the teardown.
    async fn destroy(&self, resource: Self::Resource) -> Result<()> {
        drop(resource);
        Ok(())
    }
}
