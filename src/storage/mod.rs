//! In-process caches.
//!
//! Everything the gateway remembers between requests lives here: raw backend
//! listings and per-user allow-sets, each partitioned by resource kind and held
//! in a `TtlCache`. Nothing is persisted.

mod pools;
pub mod ttl_cache;

pub use pools::{CachePools, Partition, PartitionStats};
pub use ttl_cache::{CacheStats, TtlCache};
