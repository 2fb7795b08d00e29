//! Incremental account synchronization against a ledger indexer.
//!
//! - `indexer`: the remote read API (`LedgerApi`), its types and an HTTP client
//! - `cache`: bounded TTL caching, per endpoint, in front of any `LedgerApi`
//! - `account`: the operation model and the synchronization engine

pub mod account;
pub mod cache;
pub mod indexer;
