//! Caching layer.
//!
//! Two flavors live here:
//! - [`TypedCache`]/[`CacheRegistry`]: Moka-backed LRU caches for derived
//!   data that is cheap to refetch (group admin sets, metadata).
//! - [`TtlMap`]: an explicit TTL map with an `evict_expired` sweep, used
//!   by the stateful trackers (message snapshots, presence, sliding
//!   windows) where eviction timing is part of the contract.

mod config;
mod registry;
mod ttl;
mod typed;

pub use config::CacheConfig;
pub use registry::CacheRegistry;
pub use ttl::TtlMap;
pub use typed::TypedCache;
