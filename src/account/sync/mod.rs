//! Account Synchronization Module
//!
//! This module provides the core logic for synchronizing an account's operation history with a
//! remote ledger indexer. It is composed of several submodules, each responsible for one step of
//! a sync pass:
//!
//! - `orchestrator`: The main entry point. `AccountSynchronizer` wires the steps below together.
//! - `classifier`: Maps raw indexer records to canonical operations.
//! - `pagination`: Walks the operations endpoint page by page behind a resumable cursor.
//! - `merge`: Combines the previously stable history with freshly classified operations.
//! - `strategies`: Finality policies, sync configuration and the incremental/full rescan decision.
//! - `progress_tracker`: Counts what a pass fetched and merged, and logs a summary.
//! - `repositories`: Snapshot persistence between passes.
//!
//! The orchestrator never persists anything itself; callers load the previous snapshot from a
//! repository and save the returned one.

/// Raw record to operation classification
pub mod classifier;
/// Deduplicating, ordering merge of operation histories
pub mod merge;
/// Main coordinator for one sync pass
pub mod orchestrator;
/// Cursor driven pagination
pub mod pagination;
/// Tracks synchronization progress and statistics
pub mod progress_tracker;
/// Snapshot persistence
pub mod repositories;
/// Finality policies and catch-up planning
pub mod strategies;

pub use classifier::TransactionClassifier;
pub use merge::merge_operations;
pub use orchestrator::*;
pub use pagination::{PaginationDriver, PaginationOutcome, PaginationStop};
pub use progress_tracker::{SyncProgressTracker, SyncStats};
pub use repositories::{FileSnapshotRepository, SnapshotRepository};
pub use strategies::{
	AlwaysFinal, CatchUpPlan, ConfirmationDepth, FinalityPolicy, NeverFinal, SyncConfig,
	plan_catch_up,
};
