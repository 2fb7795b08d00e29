//! Account sync orchestrator and integration point for all sync services.
//!
//! This module defines the `AccountSynchronizer`, which runs one synchronization pass for an
//! account against a `LedgerApi`:
//! - Fetches the account summary and the chain height concurrently
//! - Returns an empty snapshot for addresses with no on-chain presence
//! - Chooses between incremental catch-up and a full rescan using the configured finality policy
//! - Drives pagination, classifies the fetched records and merges them with the stable history
//! - Assembles a new snapshot, with balance and resources taken from the remote summary
//!
//! A pass either produces a complete snapshot or fails; partial pages are never returned.

use crate::account::id::encode_account_id;
use crate::account::sync::{
    classifier::TransactionClassifier,
    merge::merge_operations,
    pagination::PaginationDriver,
    progress_tracker::SyncProgressTracker,
    strategies::{FinalityPolicy, SyncConfig, plan_catch_up, stable_operations},
};
use crate::account::types::{AccountResources, AccountSnapshot, Operation, SyncError};
use crate::indexer::{AccountSummary, IndexerError, LedgerApi};

use chrono::Utc;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Undecodable summaries are reported apart from transport failures
fn summary_error(error: IndexerError) -> SyncError {
    match error {
        IndexerError::JsonError(_) | IndexerError::MalformedResponse(_) => {
            SyncError::MalformedSummary(error.to_string())
        }
        other => SyncError::Indexer(other),
    }
}

/// Synchronizes accounts against a shared remote API.
///
/// The API is handed in by the caller and may be wrapped in a `CachedLedgerApi`; the synchronizer
/// never owns a global client.
pub struct AccountSynchronizer<A: LedgerApi + ?Sized> {
    api: Arc<A>,
    config: SyncConfig,
}

impl<A: LedgerApi + ?Sized> AccountSynchronizer<A> {
    pub fn new(api: Arc<A>, config: SyncConfig) -> Self {
        Self { api, config }
    }

    /// Replace the finality policy deciding between incremental catch-up and full rescan.
    pub fn with_finality_policy(mut self, policy: impl FinalityPolicy + 'static) -> Self {
        self.config.finality = Arc::new(policy);
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Identifier of the account synchronized for `address`
    pub fn account_id(&self, address: &str) -> String {
        encode_account_id(
            &self.config.currency_id,
            address,
            &self.config.derivation_mode,
        )
    }

    /// Run one synchronization pass for `address`.
    ///
    /// `previous` is only read; a new snapshot is returned.
    pub async fn synchronize(
        &self,
        address: &str,
        previous: Option<&AccountSnapshot>,
    ) -> Result<AccountSnapshot, SyncError> {
        self.synchronize_with_cancellation(address, previous, &CancellationToken::new())
            .await
    }

    /// Like `synchronize`, but stops with `SyncError::Cancelled` once `cancellation` fires.
    ///
    /// The token is checked before the first remote call and before every page.
    pub async fn synchronize_with_cancellation(
        &self,
        address: &str,
        previous: Option<&AccountSnapshot>,
        cancellation: &CancellationToken,
    ) -> Result<AccountSnapshot, SyncError> {
        let account_id = self.account_id(address);
        if cancellation.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        info!("Starting synchronization of {}", account_id);

        let (summary, chain_height) = tokio::try_join!(
            async {
                self.api
                    .get_account_summary(address)
                    .await
                    .map_err(summary_error)
            },
            async { self.api.get_chain_height().await.map_err(SyncError::from) },
        )?;

        if !summary.kind.exists() {
            info!(
                "Account {} has no on-chain presence at height {}",
                address, chain_height
            );
            return Ok(AccountSnapshot::empty(
                account_id,
                address.to_string(),
                chain_height,
            ));
        }

        let previous = previous.filter(|snapshot| snapshot.id == account_id);
        let stable = stable_operations(previous, &account_id);

        let operations = if summary.kind.has_history() {
            let plan = plan_catch_up(stable, self.config.finality.as_ref(), chain_height);
            let mut tracker = SyncProgressTracker::new(account_id.as_str(), chain_height, plan);

            let outcome = PaginationDriver::new(&*self.api, self.config.max_iterations)
                .fetch_all(address, plan.start(), cancellation)
                .await?;
            tracker.record_pagination(&outcome);

            let fresh = TransactionClassifier::new(address, account_id.as_str())
                .classify_batch(&outcome.transactions);
            tracker.record_classified(fresh.len());

            let merged = merge_operations(stable, &fresh);
            tracker.record_merge(stable.len(), merged.len());
            tracker.log_completion();
            merged
        } else {
            debug!(
                "Account kind {:?} has no synchronized history, keeping {} operations",
                summary.kind,
                stable.len()
            );
            merge_operations(stable, &[])
        };

        if cancellation.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        Ok(Self::assemble(
            account_id,
            address,
            summary,
            chain_height,
            operations,
            previous,
        ))
    }

    fn assemble(
        account_id: String,
        address: &str,
        summary: AccountSummary,
        chain_height: u64,
        operations: Vec<Operation>,
        previous: Option<&AccountSnapshot>,
    ) -> AccountSnapshot {
        let public_key = summary
            .public_key
            .filter(|key| !key.is_empty())
            .or_else(|| previous.map(|snapshot| snapshot.resources.public_key.clone()))
            .unwrap_or_default();

        AccountSnapshot {
            id: account_id,
            address: address.to_string(),
            balance: summary.balance,
            spendable_balance: summary.balance,
            operations,
            block_height: chain_height,
            last_sync_date: Utc::now(),
            resources: AccountResources {
                revealed: summary.revealed,
                counter: summary.counter,
                public_key,
            },
        }
    }
}
