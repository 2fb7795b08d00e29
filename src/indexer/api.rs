//! Remote ledger read API consumed by the synchronization engine.

use super::types::{AccountSummary, IndexerError, PageCursor, RawTransaction};

/// Read access to a remote ledger indexer.
///
/// Implementations are shared by reference (`Arc`) between the synchronizer and any cache
/// layered on top of them, so every method takes `&self`.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait LedgerApi: Send + Sync {
	/// Fetch balance, counter and reveal state for an address.
	async fn get_account_summary(&self, address: &str) -> Result<AccountSummary, IndexerError>;

	/// Current height of the chain as seen by the indexer.
	async fn get_chain_height(&self) -> Result<u64, IndexerError>;

	/// One page of raw operations for `address` positioned at `cursor`.
	///
	/// Pages are ordered in the cursor's direction. An empty page signals exhaustion.
	async fn list_transactions(
		&self,
		address: &str,
		cursor: PageCursor,
	) -> Result<Vec<RawTransaction>, IndexerError>;

	/// Look up operations by their group hashes.
	async fn get_transactions_by_hash(
		&self,
		hashes: &[String],
	) -> Result<Vec<RawTransaction>, IndexerError>;

	/// Inject a signed operation and return its hash.
	async fn broadcast(&self, signed_operation: &str) -> Result<String, IndexerError>;
}
