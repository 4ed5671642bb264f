//! Pool configuration types

use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration for a keyed pool.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PoolConfig {
    /// Per-key ceiling on concurrently active resources. `0` means unbounded.
    pub max_size: usize,
    /// How long a queued acquisition waits for a freed slot before failing
    /// with [`crate::Error::AcquireTimeout`].
    pub acquire_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 0,
            acquire_timeout: Duration::from_secs(30),
        }
    }
}
