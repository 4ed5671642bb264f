//! Shared test factory.
#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use keyed_pool::{Error, Factory, PoolConfig, Result};
use parking_lot::Mutex;

/// Instrumented factory producing `"{key}-{n}"` strings, where `n` counts
/// create calls (failed calls burn a number too). Creation failure and
/// validation outcomes are scriptable per test. Clones share state, so a
/// test can keep a handle while the pool owns another.
#[derive(Clone, Default)]
pub struct TestFactory {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    calls: AtomicU32,
    destroyed: AtomicU32,
    fail_create: AtomicBool,
    all_invalid: AtomicBool,
    invalid: Mutex<HashSet<String>>,
    destroyed_values: Mutex<Vec<String>>,
    create_delay: Mutex<Duration>,
    destroy_delay: Mutex<Duration>,
}

impl TestFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total create calls, successful or not.
    pub fn creates(&self) -> u32 {
        self.inner.calls.load(Ordering::SeqCst)
    }

    pub fn destroyed(&self) -> u32 {
        self.inner.destroyed.load(Ordering::SeqCst)
    }

    pub fn destroyed_values(&self) -> Vec<String> {
        self.inner.destroyed_values.lock().clone()
    }

    /// Make every subsequent create call fail.
    pub fn fail_creates(&self, fail: bool) {
        self.inner.fail_create.store(fail, Ordering::SeqCst);
    }

    /// Make every resource fail validation.
    pub fn invalidate_all(&self, invalid: bool) {
        self.inner.all_invalid.store(invalid, Ordering::SeqCst);
    }

    /// Make one specific resource fail validation.
    pub fn invalidate(&self, value: &str) {
        self.inner.invalid.lock().insert(value.to_string());
    }

    /// Make every subsequent create call sleep first.
    pub fn delay_creates(&self, delay: Duration) {
        *self.inner.create_delay.lock() = delay;
    }

    /// Make every subsequent destroy call sleep first.
    pub fn delay_destroys(&self, delay: Duration) {
        *self.inner.destroy_delay.lock() = delay;
    }
}

#[async_trait]
impl Factory<String> for TestFactory {
    type Resource = String;

    async fn create(&self, key: &String) -> Result<String> {
        let delay = *self.inner.create_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let n = self.inner.calls.fetch_add(1, Ordering::SeqCst);
        if self.inner.fail_create.load(Ordering::SeqCst) {
            return Err(Error::factory(
                key,
                format!("intentional failure on call {n}"),
            ));
        }
        Ok(format!("{key}-{n}"))
    }

    async fn validate(&self, resource: &String) -> bool {
        !self.inner.all_invalid.load(Ordering::SeqCst)
            && !self.inner.invalid.lock().contains(resource)
    }

    async fn destroy(&self, resource: String) -> Result<()> {
        let delay = *self.inner.destroy_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.inner.destroyed.fetch_add(1, Ordering::SeqCst);
        self.inner.destroyed_values.lock().push(resource);
        Ok(())
    }
}

pub fn config(max_size: usize, timeout_ms: u64) -> PoolConfig {
    PoolConfig {
        max_size,
        acquire_timeout: Duration::from_millis(timeout_ms),
    }
}
