//! Keyed resource pool — acquire/release protocol and per-key bookkeeping.
//!
//! All per-key state (idle stack, active counter, pending queue) lives in one
//! record behind a single mutex, so the three pieces stay atomically
//! consistent. The lock is never held across an `.await`; slots for
//! asynchronous steps (creation, validation of a popped idle resource) are
//! reserved in the active counter first and rolled back on failure, keeping
//! `active <= max_size` true at every instant. The decision to queue and the
//! enqueue itself happen in one critical section, so a concurrent release can
//! never observe an empty queue after a caller has decided to wait.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::time;
use tracing::debug;

use crate::config::PoolConfig;
use crate::error::{Error, Result};
use crate::factory::Factory;
use crate::guard::PoolGuard;
use crate::key::PoolKey;
use crate::pending::PendingAcquire;

/// Per-key state: idle stack, active counter and pending queue in one record.
struct KeyState<T> {
    /// Idle resources, most recently released last (reused first).
    /// `None` means the key was purged: returning resources are destroyed
    /// until an acquisition re-initializes tracking.
    idle: Option<Vec<T>>,
    /// Checked-out resources, plus reservations for in-flight creations and
    /// validations of popped idle resources.
    active: usize,
    /// Callers blocked on capacity, oldest first.
    pending: VecDeque<PendingAcquire<T>>,
}

impl<T> KeyState<T> {
    fn tracked() -> Self {
        Self {
            idle: Some(Vec::new()),
            active: 0,
            pending: VecDeque::new(),
        }
    }

    /// An untracked key with nothing checked out and nobody waiting retains
    /// no state at all.
    fn is_dead(&self) -> bool {
        self.idle.is_none() && self.active == 0 && self.pending.is_empty()
    }
}

/// Snapshot of one key's bookkeeping.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyStats {
    /// Idle resources held for the key.
    pub idle: usize,
    /// Active resources (including in-flight creations).
    pub active: usize,
    /// Callers queued behind capacity.
    pub pending: usize,
}

/// Outcome of one planning pass under the state lock.
enum Plan<T> {
    /// Popped an idle resource; validate it outside the lock.
    Reuse(T),
    /// Under capacity; a creation slot has been reserved.
    Create,
    /// At capacity; a pending request was enqueued in the same critical
    /// section that observed the capacity.
    Enqueued(u64, oneshot::Receiver<Result<T>>),
    /// At capacity and queueing was not requested.
    Busy,
}

/// Result of a full acquisition attempt.
enum Attempt<T> {
    /// A resource was obtained and is counted active.
    Resource(T),
    /// The caller was queued behind capacity.
    Queued(u64, oneshot::Receiver<Result<T>>),
    /// At capacity, and the attempt was not allowed to queue.
    AtCapacity,
}

struct PoolInner<K: PoolKey, F: Factory<K>> {
    factory: F,
    config: PoolConfig,
    keys: Mutex<HashMap<K, KeyState<F::Resource>>>,
    next_request_id: AtomicU64,
}

/// Key-partitioned resource pool.
///
/// Cheap to clone; all clones share the same state. See the crate docs for
/// the acquisition and release protocol.
pub struct Pool<K: PoolKey, F: Factory<K>> {
    inner: Arc<PoolInner<K, F>>,
}

impl<K: PoolKey, F: Factory<K>> Clone for Pool<K, F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K: PoolKey, F: Factory<K>> fmt::Debug for Pool<K, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys = self.inner.keys.lock();
        f.debug_struct("Pool").field("keys", &keys.len()).finish()
    }
}

impl<K: PoolKey, F: Factory<K>> Pool<K, F> {
    /// Create a pool around `factory` with the given configuration.
    pub fn new(factory: F, config: PoolConfig) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                factory,
                config,
                keys: Mutex::new(HashMap::new()),
                next_request_id: AtomicU64::new(0),
            }),
        }
    }

    /// Acquire a resource for `key`.
    ///
    /// Reuses the most recently released idle resource that passes
    /// validation, creates a new one when under the capacity ceiling, or
    /// queues behind earlier callers until a release frees a slot.
    ///
    /// # Errors
    /// [`Error::Factory`] when creation fails, [`Error::AcquireTimeout`] when
    /// a queued acquisition is not served within the configured timeout.
    pub async fn acquire(&self, key: K) -> Result<PoolGuard<K, F>> {
        match self.try_acquire(&key, true).await? {
            Attempt::Resource(resource) => Ok(PoolGuard::new(self.clone(), key, resource)),
            Attempt::Queued(id, rx) => self.wait_queued(key, id, rx).await,
            Attempt::AtCapacity => unreachable!("direct acquisition always queues at capacity"),
        }
    }

    /// Return a resource to the pool.
    ///
    /// Normally invoked by [`PoolGuard`]'s disposal path. A resource returned
    /// under a purged or never-seen key is destroyed rather than stored; this
    /// is defined behavior, not an error. Afterwards the oldest pending
    /// request for the key, if any, is offered the freed slot.
    pub async fn release(&self, key: &K, resource: F::Resource) {
        let mut returning = Some(resource);
        while let Some(resource) = returning.take() {
            // A purged key accepts no returning resources, so skip the
            // validation round-trip entirely.
            let tracked = {
                let keys = self.inner.keys.lock();
                keys.get(key).is_some_and(|state| state.idle.is_some())
            };
            let valid = tracked && self.inner.factory.validate(&resource).await;
            let rejected = {
                let mut keys = self.inner.keys.lock();
                // Re-check tracking: a purge may have landed while validating.
                let rejected = match keys.get_mut(key).filter(|_| valid) {
                    Some(state) => match state.idle.as_mut() {
                        Some(idle) => {
                            idle.push(resource);
                            None
                        }
                        None => Some(resource),
                    },
                    None => Some(resource),
                };
                if let Some(state) = keys.get_mut(key) {
                    state.active = state.active.saturating_sub(1);
                    if state.is_dead() {
                        keys.remove(key);
                    }
                }
                rejected
            };
            match rejected {
                Some(resource) => {
                    debug!(key = ?key, valid, "destroying released resource");
                    let _ = self.inner.factory.destroy(resource).await;
                }
                None => debug!(key = ?key, "returned resource to idle stack"),
            }
            // Offer the freed slot to the oldest waiter; an undeliverable
            // resource comes back and goes through the protocol again.
            returning = self.service_pending(key).await;
        }
    }

    /// Destroy every idle resource for `key` and stop tracking its idle list.
    ///
    /// Active resources and pending requests are untouched: later releases
    /// for the key destroy their resources, and waiters are still served by
    /// the creation path or fail by timeout.
    pub async fn purge(&self, key: &K) {
        let drained = {
            let mut keys = self.inner.keys.lock();
            match keys.get_mut(key) {
                Some(state) => {
                    let drained = state.idle.take().unwrap_or_default();
                    if state.is_dead() {
                        keys.remove(key);
                    }
                    drained
                }
                None => return,
            }
        };
        debug!(key = ?key, count = drained.len(), "purging idle resources");
        for resource in drained {
            let _ = self.inner.factory.destroy(resource).await;
        }
    }

    /// Purge every known key.
    pub async fn purge_all(&self) {
        let tracked: Vec<K> = self.inner.keys.lock().keys().cloned().collect();
        for key in tracked {
            self.purge(&key).await;
        }
    }

    /// Whether `key` has a tracked idle list (true from the first acquisition
    /// attempt until a purge, even while the list is empty).
    pub fn has(&self, key: &K) -> bool {
        let keys = self.inner.keys.lock();
        keys.get(key).is_some_and(|state| state.idle.is_some())
    }

    /// Number of active resources for `key`; 0 when untracked.
    pub fn active_resource_count(&self, key: &K) -> usize {
        let keys = self.inner.keys.lock();
        keys.get(key).map_or(0, |state| state.active)
    }

    /// Snapshot of the key's bookkeeping.
    pub fn stats(&self, key: &K) -> KeyStats {
        let keys = self.inner.keys.lock();
        keys.get(key).map_or_else(KeyStats::default, |state| KeyStats {
            idle: state.idle.as_ref().map_or(0, Vec::len),
            active: state.active,
            pending: state.pending.len(),
        })
    }

    /// One acquisition attempt: idle reuse, creation under capacity, or — for
    /// direct callers — enqueueing.
    ///
    /// The capacity check and the enqueue are a single mutation under the
    /// state lock. On success the resource is already counted active.
    /// `queue_at_capacity` is false when running on behalf of an
    /// already-dequeued pending request, which must not re-enter the queue
    /// here.
    async fn try_acquire(&self, key: &K, queue_at_capacity: bool) -> Result<Attempt<F::Resource>> {
        loop {
            let plan = {
                let mut keys = self.inner.keys.lock();
                let state = keys.entry(key.clone()).or_insert_with(KeyState::tracked);
                if state.idle.is_none() {
                    // Acquisition re-initializes tracking after a purge.
                    state.idle = Some(Vec::new());
                }
                if let Some(resource) = state.idle.as_mut().and_then(|idle| idle.pop()) {
                    state.active += 1;
                    Plan::Reuse(resource)
                } else if self.inner.config.max_size == 0
                    || state.active < self.inner.config.max_size
                {
                    state.active += 1;
                    Plan::Create
                } else if queue_at_capacity {
                    let id = self.inner.next_request_id.fetch_add(1, Ordering::Relaxed);
                    let (request, rx) = PendingAcquire::new(id);
                    state.pending.push_back(request);
                    Plan::Enqueued(id, rx)
                } else {
                    Plan::Busy
                }
            };
            match plan {
                Plan::Reuse(resource) => {
                    if self.inner.factory.validate(&resource).await {
                        debug!(key = ?key, "reusing idle resource");
                        return Ok(Attempt::Resource(resource));
                    }
                    debug!(key = ?key, "idle resource failed validation, destroying");
                    let _ = self.inner.factory.destroy(resource).await;
                    self.unreserve(key);
                }
                Plan::Create => match self.inner.factory.create(key).await {
                    Ok(resource) => {
                        debug!(key = ?key, "created resource");
                        return Ok(Attempt::Resource(resource));
                    }
                    Err(err) => {
                        self.unreserve(key);
                        return Err(err);
                    }
                },
                Plan::Enqueued(id, rx) => {
                    debug!(key = ?key, id, "at capacity, queued acquisition");
                    return Ok(Attempt::Queued(id, rx));
                }
                Plan::Busy => return Ok(Attempt::AtCapacity),
            }
        }
    }

    /// Wait for a queued request to be completed by a release, or fail it on
    /// timeout.
    async fn wait_queued(
        &self,
        key: K,
        id: u64,
        mut rx: oneshot::Receiver<Result<F::Resource>>,
    ) -> Result<PoolGuard<K, F>> {
        let timeout = self.inner.config.acquire_timeout;
        let completed = loop {
            match time::timeout(timeout, &mut rx).await {
                Ok(completed) => break completed,
                Err(_elapsed) => {
                    if self.withdraw(&key, id) {
                        debug!(key = ?key, id, "queued acquisition timed out");
                        return Err(Error::timeout(&key, timeout));
                    }
                    // A release dequeued this request around the expiry
                    // instant; its completion is authoritative if it lands.
                    // Re-arm the timer so a request that was put back in the
                    // queue instead still fails in bounded time.
                }
            }
        };
        match completed {
            Ok(Ok(resource)) => Ok(PoolGuard::new(self.clone(), key, resource)),
            Ok(Err(err)) => Err(err),
            // The sender only drops uncompleted if the pool state was torn
            // down mid-wait; report it as the timeout it behaves like.
            Err(_closed) => Err(Error::timeout(&key, timeout)),
        }
    }

    /// Remove a timed-out request from the queue. `false` means a release
    /// dequeued it and currently owns its completion.
    fn withdraw(&self, key: &K, id: u64) -> bool {
        let mut keys = self.inner.keys.lock();
        let Some(state) = keys.get_mut(key) else {
            return false;
        };
        let Some(pos) = state.pending.iter().position(|request| request.id() == id) else {
            return false;
        };
        state.pending.remove(pos);
        if state.is_dead() {
            keys.remove(key);
        }
        true
    }

    /// Roll back a slot reservation after a failed creation or validation.
    fn unreserve(&self, key: &K) {
        let mut keys = self.inner.keys.lock();
        if let Some(state) = keys.get_mut(key) {
            state.active = state.active.saturating_sub(1);
            if state.is_dead() {
                keys.remove(key);
            }
        }
    }

    /// Free the slot of a resource that leaves the pool without going through
    /// the release protocol. Pending requests are not serviced here; their
    /// own timeouts bound the wait.
    pub(crate) fn discard(&self, key: &K) {
        self.unreserve(key);
    }

    /// Serve the oldest pending request for `key` by re-running the
    /// acquisition logic on its behalf.
    ///
    /// Returns a resource that could not be delivered (the waiter timed out
    /// or went away after being dequeued) so the caller can cycle it back
    /// through the release protocol.
    async fn service_pending(&self, key: &K) -> Option<F::Resource> {
        let mut request = {
            let mut keys = self.inner.keys.lock();
            let state = keys.get_mut(key)?;
            match state.pending.pop_front() {
                Some(request) => request,
                None => {
                    if state.is_dead() {
                        keys.remove(key);
                    }
                    return None;
                }
            }
        };
        match self.try_acquire(key, false).await {
            Ok(Attempt::Resource(resource)) => match request.resolve(resource) {
                None => {
                    debug!(key = ?key, id = request.id(), "handed resource to pending acquisition");
                    None
                }
                Some(resource) => {
                    debug!(key = ?key, id = request.id(), "waiter gone, recycling resource");
                    Some(resource)
                }
            },
            Ok(Attempt::Queued(..)) => unreachable!("pending service never queues"),
            Ok(Attempt::AtCapacity) => {
                // The freed slot was taken by a concurrent direct acquire.
                // The request is still the oldest; put it back at the front.
                let mut keys = self.inner.keys.lock();
                keys.entry(key.clone())
                    .or_insert_with(KeyState::tracked)
                    .pending
                    .push_front(request);
                None
            }
            Err(err) => {
                debug!(key = ?key, id = request.id(), "creation for pending acquisition failed");
                request.reject(err);
                None
            }
        }
    }
}
