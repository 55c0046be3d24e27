//! Shared query cache with request de-duplication and subscriptions.
//!
//! Inspired by TanStack Query: each read is identified by a cache key, and
//! the client tracks one entry per key with its loading/success/error state.
//! Concurrent reads for an identical key collapse into a single backend
//! call, and mutations mark whole namespaces stale so subscribed views
//! refetch.
//!
//! # Example
//!
//! ```ignore
//! let queries: QueryClient<CatalogKey, CatalogValue> = QueryClient::new();
//!
//! let key = CatalogKey::Categories;
//! let sub = queries.subscribe(&key, move |snapshot| {
//!     // notify the event loop that this key changed
//! });
//!
//! let store = store.clone();
//! let snapshot = queries.read(&key, move || {
//!     let store = store.clone();
//!     async move { store.list_categories().await.map(CatalogValue::Categories) }
//! });
//!
//! // later, when the view goes away
//! queries.unsubscribe(sub);
//! ```

use futures::future::BoxFuture;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

use super::key::CacheKey;
use crate::error::StoreError;

/// The lifecycle state of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
  /// No fetch has been started yet
  Idle,
  /// A fetch is in flight
  Loading,
  /// The last fetch completed successfully
  Success,
  /// The last fetch failed; retried only by an explicit `read`
  Error,
}

/// A point-in-time view of one cache entry.
///
/// While a refetch is in flight, `status` is `Loading` but `data` still
/// holds the previous successful result so views don't flicker. A previous
/// result is never reported as `Success` - only `status` decides that.
#[derive(Debug, Clone)]
pub struct QuerySnapshot<V> {
  pub status: QueryStatus,
  pub data: Option<V>,
  pub error: Option<StoreError>,
  pub is_stale: bool,
}

impl<V> QuerySnapshot<V> {
  pub fn is_loading(&self) -> bool {
    self.status == QueryStatus::Loading
  }

  pub fn is_success(&self) -> bool {
    self.status == QueryStatus::Success
  }

  pub fn is_error(&self) -> bool {
    self.status == QueryStatus::Error
  }
}

/// A boxed, reusable fetch function. Retained per entry so invalidation can
/// refetch without the caller re-supplying it.
type Fetcher<V> = Arc<dyn Fn() -> BoxFuture<'static, Result<V, StoreError>> + Send + Sync>;

/// Subscriber callback, invoked on every status transition of its key.
type Callback<V> = Arc<dyn Fn(&QuerySnapshot<V>) + Send + Sync>;

/// Handle returned by `subscribe`; pass back to `unsubscribe` to tear down.
#[must_use = "dropping the handle without unsubscribing leaks the callback"]
#[derive(Debug)]
pub struct Subscription<K> {
  key: K,
  id: u64,
}

struct Entry<V> {
  status: QueryStatus,
  data: Option<V>,
  error: Option<StoreError>,
  fetched_at: Option<Instant>,
  stale: bool,
  /// Fetch generation. A completing fetch only applies its result if the
  /// entry still carries the epoch it was spawned with; invalidation and
  /// refetches bump it, which discards superseded results.
  epoch: u64,
  fetcher: Fetcher<V>,
}

impl<V: Clone> Entry<V> {
  fn idle(fetcher: Fetcher<V>) -> Self {
    Self {
      status: QueryStatus::Idle,
      data: None,
      error: None,
      fetched_at: None,
      stale: false,
      epoch: 0,
      fetcher,
    }
  }

  /// Transition to `Loading`, keeping previous data for flicker-free
  /// refetches. Bumps the epoch so any older in-flight fetch is discarded.
  fn begin_loading(&mut self) {
    self.status = QueryStatus::Loading;
    self.error = None;
    self.epoch += 1;
  }

  fn snapshot(&self) -> QuerySnapshot<V> {
    QuerySnapshot {
      status: self.status,
      data: self.data.clone(),
      error: self.error.clone(),
      is_stale: self.stale,
    }
  }
}

struct Inner<K, V> {
  entries: HashMap<K, Entry<V>>,
  subscribers: HashMap<K, Vec<(u64, Callback<V>)>>,
  next_subscription: u64,
}

impl<K: CacheKey, V> Inner<K, V> {
  fn callbacks_for(&self, key: &K) -> Vec<Callback<V>> {
    self
      .subscribers
      .get(key)
      .map(|subs| subs.iter().map(|(_, cb)| Arc::clone(cb)).collect())
      .unwrap_or_default()
  }

  fn has_subscribers(&self, key: &K) -> bool {
    self.subscribers.get(key).is_some_and(|subs| !subs.is_empty())
  }
}

/// Process-wide query cache.
///
/// Cheap to clone; all clones share the same entry map. Entries are mutated
/// only through these methods, and subscriber callbacks are invoked after
/// the internal lock is released, so callbacks may call back into the
/// client.
pub struct QueryClient<K: CacheKey, V> {
  inner: Arc<Mutex<Inner<K, V>>>,
  stale_time: Duration,
}

impl<K: CacheKey, V> Clone for QueryClient<K, V> {
  fn clone(&self) -> Self {
    Self {
      inner: Arc::clone(&self.inner),
      stale_time: self.stale_time,
    }
  }
}

impl<K: CacheKey, V: Clone + Send + 'static> QueryClient<K, V> {
  pub fn new() -> Self {
    Self {
      inner: Arc::new(Mutex::new(Inner {
        entries: HashMap::new(),
        subscribers: HashMap::new(),
        next_subscription: 0,
      })),
      stale_time: Duration::from_secs(60),
    }
  }

  /// Set how long a successful result stays fresh before a `read` triggers
  /// a background refetch. Explicit invalidation ignores this entirely.
  pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
    self.stale_time = stale_time;
    self
  }

  fn lock(&self) -> MutexGuard<'_, Inner<K, V>> {
    // A poisoned lock only means a fetch task panicked mid-update; the map
    // itself is still consistent, so keep serving it.
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Read the entry for `key`, fetching if needed.
  ///
  /// Starts a fetch when there is no entry, the entry is stale or expired,
  /// or the previous fetch failed (manual retry). An entry that is already
  /// `Loading` is returned as-is: concurrent reads for the same key share
  /// one backend call.
  ///
  /// The returned snapshot may be `Loading` with the previous data still
  /// present when this read triggered a refetch.
  pub fn read<F, Fut>(&self, key: &K, fetcher: F) -> QuerySnapshot<V>
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<V, StoreError>> + Send + 'static,
  {
    let fetcher: Fetcher<V> = Arc::new(move || Box::pin(fetcher()));
    let stale_time = self.stale_time;

    let mut inner = self.lock();
    let (snapshot, pending) = {
      let entry = inner
        .entries
        .entry(key.clone())
        .or_insert_with(|| Entry::idle(Arc::clone(&fetcher)));
      // Keep the most recent fetcher: parameters are captured in the
      // closure, and invalidation refetches with whatever was stored last.
      entry.fetcher = fetcher;

      let should_fetch = match entry.status {
        QueryStatus::Loading => false,
        QueryStatus::Idle | QueryStatus::Error => true,
        QueryStatus::Success => {
          entry.stale
            || entry
              .fetched_at
              .map(|at| at.elapsed() > stale_time)
              .unwrap_or(true)
        }
      };

      if should_fetch {
        entry.begin_loading();
        let future = (entry.fetcher)();
        (entry.snapshot(), Some((entry.epoch, future)))
      } else {
        (entry.snapshot(), None)
      }
    };

    if let Some((epoch, future)) = pending {
      debug!(key = %key.description(), "starting fetch");
      Self::spawn_fetch(Arc::clone(&self.inner), key.clone(), epoch, future);
      let callbacks = inner.callbacks_for(key);
      drop(inner);
      for callback in callbacks {
        callback(&snapshot);
      }
    }

    snapshot
  }

  /// Peek at the entry for `key` without triggering a fetch.
  pub fn get(&self, key: &K) -> Option<QuerySnapshot<V>> {
    self.lock().entries.get(key).map(Entry::snapshot)
  }

  /// Register interest in `key`. The callback runs on every status
  /// transition for that key until `unsubscribe` is called.
  pub fn subscribe<F>(&self, key: &K, callback: F) -> Subscription<K>
  where
    F: Fn(&QuerySnapshot<V>) + Send + Sync + 'static,
  {
    let mut inner = self.lock();
    let id = inner.next_subscription;
    inner.next_subscription += 1;
    inner
      .subscribers
      .entry(key.clone())
      .or_default()
      .push((id, Arc::new(callback)));
    Subscription {
      key: key.clone(),
      id,
    }
  }

  /// Tear down a subscription.
  ///
  /// If this was the last subscriber for the key and a fetch is still in
  /// flight, the entry is dropped: the fetch completes but its result is
  /// discarded rather than applied to state no view observes.
  pub fn unsubscribe(&self, subscription: Subscription<K>) {
    let mut inner = self.lock();
    let Subscription { key, id } = subscription;

    if let Some(subs) = inner.subscribers.get_mut(&key) {
      subs.retain(|(sub_id, _)| *sub_id != id);
      if subs.is_empty() {
        inner.subscribers.remove(&key);
      }
    }

    if !inner.has_subscribers(&key) {
      let loading = inner
        .entries
        .get(&key)
        .is_some_and(|entry| entry.status == QueryStatus::Loading);
      if loading {
        inner.entries.remove(&key);
      }
    }
  }

  /// Mark the entry for `key` stale.
  ///
  /// With active subscribers the entry refetches immediately (previous data
  /// retained while `Loading`); without subscribers it is discarded, so the
  /// next `read` fetches fresh. Any fetch already in flight for the key is
  /// superseded and its result discarded.
  pub fn invalidate(&self, key: &K) {
    let mut inner = self.lock();
    let notification = Self::invalidate_entry(&mut inner, &self.inner, key);
    drop(inner);
    if let Some((callbacks, snapshot)) = notification {
      for callback in callbacks {
        callback(&snapshot);
      }
    }
  }

  /// Mark every entry under `namespace` stale. Order of repeated
  /// invalidations is irrelevant: each just marks-stale and (for subscribed
  /// entries) restarts the fetch.
  pub fn invalidate_namespace(&self, namespace: &str) {
    let mut inner = self.lock();
    let keys: Vec<K> = inner
      .entries
      .keys()
      .filter(|key| key.namespace() == namespace)
      .cloned()
      .collect();
    debug!(namespace, entries = keys.len(), "invalidating namespace");

    let mut notifications = Vec::new();
    for key in &keys {
      if let Some(notification) = Self::invalidate_entry(&mut inner, &self.inner, key) {
        notifications.push(notification);
      }
    }
    drop(inner);

    for (callbacks, snapshot) in notifications {
      for callback in callbacks {
        callback(&snapshot);
      }
    }
  }

  fn invalidate_entry(
    inner: &mut Inner<K, V>,
    shared: &Arc<Mutex<Inner<K, V>>>,
    key: &K,
  ) -> Option<(Vec<Callback<V>>, QuerySnapshot<V>)> {
    if !inner.has_subscribers(key) {
      // Nobody is watching: discard instead of refetching.
      inner.entries.remove(key);
      return None;
    }

    let (snapshot, epoch, future) = {
      let entry = inner.entries.get_mut(key)?;
      entry.stale = true;
      entry.begin_loading();
      let future = (entry.fetcher)();
      (entry.snapshot(), entry.epoch, future)
    };

    Self::spawn_fetch(Arc::clone(shared), key.clone(), epoch, future);
    Some((inner.callbacks_for(key), snapshot))
  }

  /// Drive one fetch to completion on the runtime and apply its result,
  /// unless the entry was dropped or superseded in the meantime.
  fn spawn_fetch(
    shared: Arc<Mutex<Inner<K, V>>>,
    key: K,
    epoch: u64,
    future: BoxFuture<'static, Result<V, StoreError>>,
  ) {
    tokio::spawn(async move {
      let result = future.await;

      let (callbacks, snapshot) = {
        let mut inner = shared.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = match inner.entries.get_mut(&key) {
          Some(entry) if entry.epoch == epoch => entry,
          // Entry dropped (last subscriber left, or invalidated while
          // unobserved) or superseded by a newer fetch: discard.
          _ => return,
        };

        match result {
          Ok(data) => {
            entry.status = QueryStatus::Success;
            entry.data = Some(data);
            entry.error = None;
            entry.fetched_at = Some(Instant::now());
            entry.stale = false;
          }
          Err(error) => {
            debug!(key = %key.description(), %error, "fetch failed");
            entry.status = QueryStatus::Error;
            entry.data = None;
            entry.error = Some(error);
          }
        }

        let snapshot = entry.snapshot();
        (inner.callbacks_for(&key), snapshot)
      };

      for callback in callbacks {
        callback(&snapshot);
      }
    });
  }
}

impl<K: CacheKey, V: Clone + Send + 'static> Default for QueryClient<K, V> {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicU32, Ordering};

  #[derive(Debug, Clone, PartialEq, Eq, Hash)]
  enum TestKey {
    Page(u32),
    Detail(i64),
    Other,
  }

  impl CacheKey for TestKey {
    fn namespace(&self) -> &'static str {
      match self {
        TestKey::Page(_) | TestKey::Detail(_) => "widgets",
        TestKey::Other => "gadgets",
      }
    }

    fn description(&self) -> String {
      format!("{:?}", self)
    }
  }

  fn counting_fetcher(
    counter: Arc<AtomicU32>,
    value: u32,
  ) -> impl Fn() -> BoxFuture<'static, Result<u32, StoreError>> + Send + Sync + 'static {
    move || {
      counter.fetch_add(1, Ordering::SeqCst);
      Box::pin(async move { Ok(value) })
    }
  }

  async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
  }

  #[tokio::test]
  async fn test_read_fetches_and_succeeds() {
    let client: QueryClient<TestKey, u32> = QueryClient::new();
    let key = TestKey::Page(1);

    let snapshot = client.read(&key, || async { Ok(7) });
    assert_eq!(snapshot.status, QueryStatus::Loading);
    assert_eq!(snapshot.data, None);

    settle().await;
    let snapshot = client.get(&key).unwrap();
    assert_eq!(snapshot.status, QueryStatus::Success);
    assert_eq!(snapshot.data, Some(7));
    assert!(snapshot.error.is_none());
  }

  #[tokio::test]
  async fn test_concurrent_reads_share_one_fetch() {
    let client: QueryClient<TestKey, u32> = QueryClient::new();
    let key = TestKey::Page(1);
    let calls = Arc::new(AtomicU32::new(0));

    let fetcher = counting_fetcher(calls.clone(), 1);
    client.read(&key, fetcher);
    let fetcher = counting_fetcher(calls.clone(), 1);
    client.read(&key, fetcher);

    settle().await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Fresh success: another read is served from cache without a call.
    let fetcher = counting_fetcher(calls.clone(), 1);
    let snapshot = client.read(&key, fetcher);
    assert_eq!(snapshot.status, QueryStatus::Success);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_distinct_keys_are_independent() {
    let client: QueryClient<TestKey, u32> = QueryClient::new();
    let calls_a = Arc::new(AtomicU32::new(0));
    let calls_b = Arc::new(AtomicU32::new(0));

    client.read(&TestKey::Page(1), counting_fetcher(calls_a.clone(), 1));
    client.read(&TestKey::Page(2), counting_fetcher(calls_b.clone(), 2));
    settle().await;

    assert_eq!(calls_a.load(Ordering::SeqCst), 1);
    assert_eq!(calls_b.load(Ordering::SeqCst), 1);
    assert_eq!(client.get(&TestKey::Page(1)).unwrap().data, Some(1));
    assert_eq!(client.get(&TestKey::Page(2)).unwrap().data, Some(2));

    // Per-key invalidation must not touch the sibling key.
    client.invalidate(&TestKey::Page(1));
    assert!(client.get(&TestKey::Page(1)).is_none());
    assert_eq!(
      client.get(&TestKey::Page(2)).unwrap().status,
      QueryStatus::Success
    );
  }

  #[tokio::test]
  async fn test_namespace_invalidation_spares_other_namespaces() {
    let client: QueryClient<TestKey, u32> = QueryClient::new();
    client.read(&TestKey::Page(1), || async { Ok(1) });
    client.read(&TestKey::Detail(5), || async { Ok(5) });
    client.read(&TestKey::Other, || async { Ok(9) });
    settle().await;

    client.invalidate_namespace("widgets");

    // Unobserved widget entries are discarded; the gadget entry survives.
    assert!(client.get(&TestKey::Page(1)).is_none());
    assert!(client.get(&TestKey::Detail(5)).is_none());
    assert_eq!(
      client.get(&TestKey::Other).unwrap().status,
      QueryStatus::Success
    );
  }

  #[tokio::test]
  async fn test_invalidation_refetches_subscribed_entries() {
    let client: QueryClient<TestKey, u32> = QueryClient::new();
    let key = TestKey::Page(1);
    let calls = Arc::new(AtomicU32::new(0));

    let subscription = client.subscribe(&key, |_| {});
    client.read(&key, counting_fetcher(calls.clone(), 10));
    settle().await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    client.invalidate_namespace("widgets");

    // Refetch started immediately, previous data retained while loading.
    let snapshot = client.get(&key).unwrap();
    assert_eq!(snapshot.status, QueryStatus::Loading);
    assert_eq!(snapshot.data, Some(10));
    assert!(snapshot.is_stale);

    settle().await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    let snapshot = client.get(&key).unwrap();
    assert_eq!(snapshot.status, QueryStatus::Success);
    assert!(!snapshot.is_stale);

    client.unsubscribe(subscription);
  }

  #[tokio::test]
  async fn test_subscribers_see_every_transition() {
    let client: QueryClient<TestKey, u32> = QueryClient::new();
    let key = TestKey::Page(1);
    let seen: Arc<Mutex<Vec<QueryStatus>>> = Arc::new(Mutex::new(Vec::new()));

    let seen_by_callback = seen.clone();
    let subscription = client.subscribe(&key, move |snapshot| {
      seen_by_callback.lock().unwrap().push(snapshot.status);
    });

    client.read(&key, || async { Ok(1) });
    settle().await;

    let transitions = seen.lock().unwrap().clone();
    assert_eq!(transitions, vec![QueryStatus::Loading, QueryStatus::Success]);

    client.unsubscribe(subscription);
  }

  #[tokio::test]
  async fn test_unsubscribe_discards_in_flight_result() {
    let client: QueryClient<TestKey, u32> = QueryClient::new();
    let key = TestKey::Page(1);

    let subscription = client.subscribe(&key, |_| {});
    client.read(&key, || async {
      tokio::time::sleep(Duration::from_millis(30)).await;
      Ok(1)
    });
    client.unsubscribe(subscription);

    tokio::time::sleep(Duration::from_millis(60)).await;
    // The fetch completed but nobody was watching: nothing was applied.
    assert!(client.get(&key).is_none());
  }

  #[tokio::test]
  async fn test_error_is_not_retried_until_next_read() {
    let client: QueryClient<TestKey, u32> = QueryClient::new();
    let key = TestKey::Page(1);
    let calls = Arc::new(AtomicU32::new(0));

    let counter = calls.clone();
    client.read(&key, move || {
      counter.fetch_add(1, Ordering::SeqCst);
      async { Err(StoreError::backend("boom")) }
    });
    settle().await;

    let snapshot = client.get(&key).unwrap();
    assert_eq!(snapshot.status, QueryStatus::Error);
    assert_eq!(snapshot.data, None);
    assert_eq!(snapshot.error, Some(StoreError::backend("boom")));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // No background retry happens on its own.
    settle().await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // An explicit read retries.
    client.read(&key, counting_fetcher(calls.clone(), 3));
    settle().await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(client.get(&key).unwrap().data, Some(3));
  }

  #[tokio::test]
  async fn test_expired_entry_refetches_but_keeps_previous_data() {
    let client: QueryClient<TestKey, u32> = QueryClient::new().with_stale_time(Duration::ZERO);
    let key = TestKey::Page(1);

    client.read(&key, || async { Ok(1) });
    settle().await;

    let snapshot = client.read(&key, || async { Ok(2) });
    assert_eq!(snapshot.status, QueryStatus::Loading);
    assert_eq!(snapshot.data, Some(1));

    settle().await;
    assert_eq!(client.get(&key).unwrap().data, Some(2));
  }

  #[tokio::test]
  async fn test_invalidation_supersedes_in_flight_fetch() {
    let client: QueryClient<TestKey, u32> = QueryClient::new();
    let key = TestKey::Page(1);
    let calls = Arc::new(AtomicU32::new(0));

    let subscription = client.subscribe(&key, |_| {});

    // Each call resolves to its own sequence number after a delay.
    let counter = calls.clone();
    client.read(&key, move || {
      let call = counter.fetch_add(1, Ordering::SeqCst) + 1;
      async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(call)
      }
    });

    // Invalidate while the first fetch is still in flight.
    tokio::time::sleep(Duration::from_millis(10)).await;
    client.invalidate(&key);

    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    let snapshot = client.get(&key).unwrap();
    assert_eq!(snapshot.status, QueryStatus::Success);
    // Only the post-invalidation fetch was applied; the first result was
    // superseded and discarded.
    assert_eq!(snapshot.data, Some(2));

    client.unsubscribe(subscription);
  }
}
