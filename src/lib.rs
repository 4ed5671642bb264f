//! # Keyed resource pool
//!
//! A key-partitioned pool of expensive, asynchronously created resources
//! (typically network connections, one sub-pool per server address). Each key
//! has its own idle stack, active counter and FIFO waiter queue; a per-key
//! capacity ceiling bounds concurrently checked-out resources, and callers
//! arriving at capacity are queued until a release frees a slot or the
//! acquisition timeout fires.
//!
//! Resource lifecycle (creation, validation, teardown) is delegated to a
//! [`Factory`] implementation; the pool itself never inspects resources.
//!
//! ```no_run
//! use keyed_pool::{Factory, Pool, PoolConfig, Result};
//!
//! struct Connector;
//!
//! #[async_trait::async_trait]
//! impl Factory<String> for Connector {
//!     type Resource = String;
//!
//!     async fn create(&self, key: &String) -> Result<String> {
//!         Ok(format!("connection to {key}"))
//!     }
//! }
//!
//! # async fn example() -> Result<()> {
//! let pool = Pool::new(Connector, PoolConfig::default());
//! let conn = pool.acquire("db-1:5432".to_string()).await?;
//! println!("{}", *conn);
//! // Dropping the guard returns the connection to the pool.
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod factory;
pub mod guard;
pub mod key;
mod pending;
pub mod pool;

pub use config::PoolConfig;
pub use error::{Error, Result};
pub use factory::Factory;
pub use guard::PoolGuard;
pub use key::PoolKey;
pub use pool::{KeyStats, Pool};
