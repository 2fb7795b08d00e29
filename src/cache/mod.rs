//! Bounded TTL caching for remote reads.
//!
//! - `ttl`: the generic `TtlCache`, keyed by a caller-chosen projection of the arguments.
//! - `cached`: `CachedLedgerApi`, which applies one `TtlCache` per `LedgerApi` endpoint.

/// Per-endpoint decorator over `LedgerApi`
pub mod cached;
/// Generic TTL + capacity bounded cache with request coalescing
pub mod ttl;

pub use cached::{CachedApiConfig, CachedLedgerApi, cached};
pub use ttl::{CachePolicy, CacheStats, TtlCache, unordered_key};
