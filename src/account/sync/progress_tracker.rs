//! Progress tracking for account synchronization.
//!
//! The `SyncProgressTracker` counts what one sync pass fetched, classified, skipped and merged,
//! and turns that into a `SyncStats` summary logged by the orchestrator when the pass finishes.

use super::pagination::{PaginationOutcome, PaginationStop};
use super::strategies::CatchUpPlan;
use tracing::{info, warn};

/// Service for tracking synchronization progress of one account
#[derive(Debug, Clone)]
pub struct SyncProgressTracker {
    /// Account being synchronized
    account_id: String,
    /// Chain height observed when the pass started
    chain_height: u64,
    /// Cursor the pass resumed from, if incremental
    start_cursor: Option<u64>,
    /// Pages requested from the remote
    pages_fetched: u32,
    /// Raw records received
    transactions_fetched: usize,
    /// Records that produced an operation
    operations_classified: usize,
    /// Records dropped by the classifier
    transactions_skipped: usize,
    /// Operations kept from the previous snapshot
    stable_operations: usize,
    /// Size of the merged history
    merged_operations: usize,
    /// Why pagination stopped
    stop: Option<PaginationStop>,
}

impl SyncProgressTracker {
    /// Create a new progress tracker for a sync pass.
    pub fn new(account_id: impl Into<String>, chain_height: u64, plan: CatchUpPlan) -> Self {
        Self {
            account_id: account_id.into(),
            chain_height,
            start_cursor: plan.cursor(),
            pages_fetched: 0,
            transactions_fetched: 0,
            operations_classified: 0,
            transactions_skipped: 0,
            stable_operations: 0,
            merged_operations: 0,
            stop: None,
        }
    }

    /// Record the result of the pagination run
    pub fn record_pagination(&mut self, outcome: &PaginationOutcome) {
        self.pages_fetched += outcome.pages;
        self.transactions_fetched += outcome.transactions.len();
        self.stop = Some(outcome.stop);
    }

    /// Record how many of the fetched records were classified into operations
    pub fn record_classified(&mut self, operations: usize) {
        self.operations_classified += operations;
        self.transactions_skipped = self
            .transactions_fetched
            .saturating_sub(self.operations_classified);
    }

    /// Record the merge of `stable` previous operations into a history of `merged` operations
    pub fn record_merge(&mut self, stable: usize, merged: usize) {
        self.stable_operations = stable;
        self.merged_operations = merged;
    }

    /// Log the summary of the pass
    pub fn log_completion(&self) {
        let stats = self.get_stats();
        if stats.stop == Some(PaginationStop::IterationLimit) {
            warn!(
                "Sync of {} hit the page limit, another pass may fetch more",
                self.account_id
            );
        }
        info!("{}", stats.summary());
    }

    /// Get sync statistics as a SyncStats struct
    pub fn get_stats(&self) -> SyncStats {
        SyncStats {
            account_id: self.account_id.clone(),
            chain_height: self.chain_height,
            start_cursor: self.start_cursor,
            pages_fetched: self.pages_fetched,
            transactions_fetched: self.transactions_fetched,
            operations_classified: self.operations_classified,
            transactions_skipped: self.transactions_skipped,
            stable_operations: self.stable_operations,
            merged_operations: self.merged_operations,
            stop: self.stop,
        }
    }
}

/// Statistics about one synchronization pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStats {
    pub account_id: String,
    pub chain_height: u64,
    pub start_cursor: Option<u64>,
    pub pages_fetched: u32,
    pub transactions_fetched: usize,
    pub operations_classified: usize,
    pub transactions_skipped: usize,
    pub stable_operations: usize,
    pub merged_operations: usize,
    pub stop: Option<PaginationStop>,
}

impl SyncStats {
    /// Get a human-readable summary of the sync statistics
    pub fn summary(&self) -> String {
        format!(
            "Sync of {} at height {} ({}): {} pages, {} records, {} operations, {} skipped, {} total operations{}",
            self.account_id,
            self.chain_height,
            match self.start_cursor {
                Some(cursor) => format!("after id {}", cursor),
                None => "full rescan".to_string(),
            },
            self.pages_fetched,
            self.transactions_fetched,
            self.operations_classified,
            self.transactions_skipped,
            self.merged_operations,
            match self.stop {
                Some(stop) => format!(", stopped: {:?}", stop),
                None => String::new(),
            }
        )
    }
}
