//! Pool key marker trait.

use std::fmt::Debug;
use std::hash::Hash;

/// Identifier partitioning the pool into independent sub-pools.
///
/// Blanket-implemented for anything hashable, cloneable and debuggable, e.g.
/// `String` server addresses or custom address structs. No per-type
/// implementation is ever needed.
pub trait PoolKey: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

impl<T> PoolKey for T where T: Clone + Eq + Hash + Debug + Send + Sync + 'static {}
