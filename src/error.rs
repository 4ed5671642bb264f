//! Error types for pool operations
use std::time::Duration;

use thiserror::Error;

/// Result type for pool operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to callers of [`crate::Pool::acquire`].
///
/// Validation failures are never surfaced: an invalid resource is destroyed
/// and the acquisition continues with the next idle resource or a fresh
/// creation. Destroy failures are absorbed by the pool.
#[derive(Error, Debug)]
pub enum Error {
    /// A queued acquisition was not served within the configured timeout.
    #[error("acquisition timed out after {timeout:?} for key {key}")]
    AcquireTimeout {
        /// The key the acquisition was issued for
        key: String,
        /// The configured acquisition timeout
        timeout: Duration,
    },

    /// Resource creation failed; the factory's error is carried verbatim.
    #[error("resource creation failed for key {key}: {reason}")]
    Factory {
        /// The key the resource was created for
        key: String,
        /// The failure reason
        reason: String,
        /// The underlying error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

/// Keys only guarantee `Debug`; strip the quotes that string-ish keys pick
/// up from it so messages read `for key db-1`, not `for key "db-1"`.
fn render_key(key: impl std::fmt::Debug) -> String {
    let rendered = format!("{key:?}");
    rendered.trim_matches('"').to_string()
}

impl Error {
    /// Create an acquisition timeout error.
    pub fn timeout(key: impl std::fmt::Debug, timeout: Duration) -> Self {
        Self::AcquireTimeout {
            key: render_key(key),
            timeout,
        }
    }

    /// Create a factory error with a reason only.
    pub fn factory(key: impl std::fmt::Debug, reason: impl Into<String>) -> Self {
        Self::Factory {
            key: render_key(key),
            reason: reason.into(),
            source: None,
        }
    }

    /// Create a factory error wrapping an underlying cause.
    pub fn factory_with(
        key: impl std::fmt::Debug,
        reason: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Factory {
            key: render_key(key),
            reason: reason.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Check whether this is an acquisition timeout.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::AcquireTimeout { .. })
    }
}
