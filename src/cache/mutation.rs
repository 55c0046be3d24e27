//! Mutation execution with namespace invalidation.

use std::future::Future;
use tracing::debug;

use super::client::QueryClient;
use super::key::CacheKey;
use crate::error::StoreError;

/// Runs write operations against one collection and keeps cached reads
/// honest about them.
///
/// Each `execute` performs exactly one write call. On success the owning
/// namespace is invalidated in its entirety - page composition and counts
/// may have shifted, so every cached page under the collection is suspect.
/// On failure the error is returned verbatim and the cache is left alone:
/// it only ever reflects confirmed server state (no optimistic updates).
pub struct MutationExecutor<K: CacheKey, V> {
  client: QueryClient<K, V>,
  namespace: &'static str,
}

impl<K: CacheKey, V: Clone + Send + 'static> MutationExecutor<K, V> {
  pub fn new(client: QueryClient<K, V>, namespace: &'static str) -> Self {
    Self { client, namespace }
  }

  /// Perform one write and invalidate the owning namespace on success.
  ///
  /// Concurrent executions are independent; invalidation just marks
  /// entries stale, so the order of overlapping invalidations of the same
  /// namespace has no observable effect.
  pub async fn execute<T, F, Fut>(&self, operation: F) -> Result<T, StoreError>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
  {
    let confirmed = operation().await?;
    debug!(namespace = self.namespace, "mutation confirmed, invalidating");
    self.client.invalidate_namespace(self.namespace);
    Ok(confirmed)
  }
}

impl<K: CacheKey, V> Clone for MutationExecutor<K, V> {
  fn clone(&self) -> Self {
    Self {
      client: self.client.clone(),
      namespace: self.namespace,
    }
  }
}
