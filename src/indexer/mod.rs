//! Indexer integration module
//!
//! This module provides the remote read API used by synchronization, the types returned by a
//! TzKT-style REST indexer, and an HTTP client implementing that API.

/// The `LedgerApi` trait consumed by the sync engine
mod api;
/// REST client for the indexer
mod client;
/// Type definitions for indexer data structures
mod types;

pub use api::LedgerApi;
#[cfg(test)]
pub use api::MockLedgerApi;
pub use client::{IndexerConfig, TzktClient};
pub use types::*;
