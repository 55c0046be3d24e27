//! Cache key trait.

use std::fmt::Debug;
use std::hash::Hash;

/// Trait for query cache keys.
///
/// A key is an ordered tuple of (collection namespace, parameter values);
/// two reads with an identical key share one cache entry. Implementors are
/// plain data enums deriving `Hash`/`Eq`.
pub trait CacheKey: Clone + Eq + Hash + Debug + Send + Sync + 'static {
  /// Collection namespace this key belongs to (e.g., "products").
  ///
  /// Invalidation operates at this granularity: invalidating a namespace
  /// marks every entry whose key reports it as stale.
  fn namespace(&self) -> &'static str;

  /// Human-readable description for logs.
  fn description(&self) -> String;
}
