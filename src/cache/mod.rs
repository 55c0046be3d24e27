//! Keyed query/mutation cache coordinating remote reads and writes.
//!
//! This module decides when remote data is fetched, how results are keyed,
//! how mutations invalidate cached reads, and how loading/error states are
//! derived:
//! - One cache entry per key; concurrent reads for the same key share a
//!   single in-flight fetch
//! - Subscribers are notified on every status transition and can always be
//!   torn down deterministically
//! - Mutations invalidate the owning collection namespace on success

mod client;
mod key;
mod mutation;

pub use client::{QueryClient, QuerySnapshot, QueryStatus, Subscription};
pub use key::CacheKey;
pub use mutation::MutationExecutor;
