//! Per-endpoint caching decorator for a `LedgerApi`.
//!
//! Each endpoint gets its own `TtlCache` (or none at all, in which case calls pass straight
//! through), so the freshness and capacity of one endpoint never affect another.

use super::ttl::{CachePolicy, CacheStats, TtlCache, unordered_key};
use crate::indexer::{AccountSummary, IndexerError, LedgerApi, PageCursor, RawTransaction};
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

/// Cache settings per endpoint. `None` disables caching for that endpoint.
#[derive(Debug, Clone)]
pub struct CachedApiConfig {
	pub account_summary: Option<CachePolicy>,
	pub chain_height: Option<CachePolicy>,
	pub transactions: Option<CachePolicy>,
	pub transactions_by_hash: Option<CachePolicy>,
	pub broadcast: Option<CachePolicy>,
}

impl Default for CachedApiConfig {
	fn default() -> Self {
		Self {
			account_summary: Some(CachePolicy::seconds(30)),
			chain_height: Some(CachePolicy::seconds(5)),
			transactions: Some(CachePolicy::seconds(30)),
			transactions_by_hash: Some(CachePolicy::seconds(30)),
			// mutations are not cached
			broadcast: None,
		}
	}
}

/// A single endpoint, either memoized or passed through.
struct Endpoint<K: Hash + Eq, V> {
	cache: Option<TtlCache<K, V, IndexerError>>,
}

impl<K, V> Endpoint<K, V>
where
	K: Hash + Eq + Clone + Send + 'static,
	V: Clone + Send + Sync + 'static,
{
	fn new(name: &'static str, policy: Option<CachePolicy>) -> Self {
		Self {
			cache: policy.map(|policy| TtlCache::new(name, policy)),
		}
	}

	async fn call<F, Fut>(&self, key: K, fetch: F) -> Result<V, IndexerError>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<V, IndexerError>> + Send + 'static,
	{
		match &self.cache {
			Some(cache) => cache.get_or_fetch(key, fetch).await,
			None => fetch().await,
		}
	}

	fn stats(&self) -> Option<(&'static str, CacheStats)> {
		self.cache.as_ref().map(|cache| (cache.name(), cache.stats()))
	}
}

/// `LedgerApi` decorator memoizing remote reads.
///
/// The wrapped client is shared by reference so the same instance can also be used directly.
pub struct CachedLedgerApi<A: ?Sized> {
	inner: Arc<A>,
	account_summary: Endpoint<String, AccountSummary>,
	chain_height: Endpoint<(), u64>,
	transactions: Endpoint<(String, PageCursor), Vec<RawTransaction>>,
	transactions_by_hash: Endpoint<Vec<String>, Vec<RawTransaction>>,
	broadcast: Endpoint<String, String>,
}

/// Wrap `api` with the given per-endpoint cache configuration.
pub fn cached<A>(api: Arc<A>, config: CachedApiConfig) -> CachedLedgerApi<A>
where
	A: LedgerApi + ?Sized + 'static,
{
	CachedLedgerApi::new(api, config)
}

impl<A> CachedLedgerApi<A>
where
	A: LedgerApi + ?Sized + 'static,
{
	pub fn new(inner: Arc<A>, config: CachedApiConfig) -> Self {
		Self {
			inner,
			account_summary: Endpoint::new("account_summary", config.account_summary),
			chain_height: Endpoint::new("chain_height", config.chain_height),
			transactions: Endpoint::new("transactions", config.transactions),
			transactions_by_hash: Endpoint::new(
				"transactions_by_hash",
				config.transactions_by_hash,
			),
			broadcast: Endpoint::new("broadcast", config.broadcast),
		}
	}

	pub fn inner(&self) -> &Arc<A> {
		&self.inner
	}

	/// Statistics for every endpoint that has caching enabled
	pub fn stats(&self) -> Vec<(&'static str, CacheStats)> {
		[
			self.account_summary.stats(),
			self.chain_height.stats(),
			self.transactions.stats(),
			self.transactions_by_hash.stats(),
			self.broadcast.stats(),
		]
		.into_iter()
		.flatten()
		.collect()
	}
}

#[async_trait::async_trait]
impl<A> LedgerApi for CachedLedgerApi<A>
where
	A: LedgerApi + ?Sized + 'static,
{
	async fn get_account_summary(&self, address: &str) -> Result<AccountSummary, IndexerError> {
		let inner = self.inner.clone();
		let address = address.to_string();
		self.account_summary
			.call(address.clone(), move || async move {
				inner.get_account_summary(&address).await
			})
			.await
	}

	async fn get_chain_height(&self) -> Result<u64, IndexerError> {
		let inner = self.inner.clone();
		self.chain_height
			.call((), move || async move { inner.get_chain_height().await })
			.await
	}

	async fn list_transactions(
		&self,
		address: &str,
		cursor: PageCursor,
	) -> Result<Vec<RawTransaction>, IndexerError> {
		let inner = self.inner.clone();
		let address = address.to_string();
		self.transactions
			.call((address.clone(), cursor), move || async move {
				inner.list_transactions(&address, cursor).await
			})
			.await
	}

	async fn get_transactions_by_hash(
		&self,
		hashes: &[String],
	) -> Result<Vec<RawTransaction>, IndexerError> {
		let inner = self.inner.clone();
		let hashes = hashes.to_vec();
		self.transactions_by_hash
			.call(unordered_key(&hashes), move || async move {
				inner.get_transactions_by_hash(&hashes).await
			})
			.await
	}

	async fn broadcast(&self, signed_operation: &str) -> Result<String, IndexerError> {
		let inner = self.inner.clone();
		let signed_operation = signed_operation.to_string();
		self.broadcast
			.call(signed_operation.clone(), move || async move {
				inner.broadcast(&signed_operation).await
			})
			.await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::indexer::{AccountKind, MockLedgerApi};
	use mockall::predicate::eq;

	fn summary(balance: u64) -> AccountSummary {
		AccountSummary {
			kind: AccountKind::User,
			balance,
			revealed: true,
			counter: 1,
			public_key: None,
		}
	}

	#[tokio::test]
	async fn caches_per_argument() {
		let mut mock = MockLedgerApi::new();
		mock.expect_get_account_summary()
			.withf(|address| address == "tz1a")
			.times(1)
			.returning(|_| Ok(summary(10)));
		mock.expect_get_account_summary()
			.withf(|address| address == "tz1b")
			.times(1)
			.returning(|_| Ok(summary(20)));

		let api = cached(Arc::new(mock), CachedApiConfig::default());
		for _ in 0..3 {
			assert_eq!(api.get_account_summary("tz1a").await.unwrap().balance, 10);
			assert_eq!(api.get_account_summary("tz1b").await.unwrap().balance, 20);
		}
	}

	#[tokio::test]
	async fn cursor_is_part_of_the_key() {
		let mut mock = MockLedgerApi::new();
		mock.expect_list_transactions()
			.with(eq("tz1a"), eq(PageCursor::Newest))
			.times(1)
			.returning(|_, _| Ok(vec![]));
		mock.expect_list_transactions()
			.with(eq("tz1a"), eq(PageCursor::Before(5)))
			.times(1)
			.returning(|_, _| Ok(vec![]));

		let api = cached(Arc::new(mock), CachedApiConfig::default());
		api.list_transactions("tz1a", PageCursor::Newest).await.unwrap();
		api.list_transactions("tz1a", PageCursor::Before(5)).await.unwrap();
		api.list_transactions("tz1a", PageCursor::Newest).await.unwrap();
		api.list_transactions("tz1a", PageCursor::Before(5)).await.unwrap();
	}

	#[tokio::test]
	async fn hash_lookups_ignore_argument_order() {
		let mut mock = MockLedgerApi::new();
		mock.expect_get_transactions_by_hash()
			.times(1)
			.returning(|_| Ok(vec![]));

		let api = cached(Arc::new(mock), CachedApiConfig::default());
		api.get_transactions_by_hash(&["oo1".to_string(), "oo2".to_string()])
			.await
			.unwrap();
		api.get_transactions_by_hash(&["oo2".to_string(), "oo1".to_string()])
			.await
			.unwrap();
	}

	#[tokio::test]
	async fn uncached_endpoints_pass_through() {
		let mut mock = MockLedgerApi::new();
		mock.expect_broadcast()
			.times(2)
			.returning(|_| Ok("ooHash".to_string()));
		mock.expect_get_chain_height().times(2).returning(|| Ok(100));

		let config = CachedApiConfig {
			chain_height: None,
			..CachedApiConfig::default()
		};
		let api = cached(Arc::new(mock), config);
		api.broadcast("signed").await.unwrap();
		api.broadcast("signed").await.unwrap();
		api.get_chain_height().await.unwrap();
		api.get_chain_height().await.unwrap();

		let names: Vec<_> = api.stats().into_iter().map(|(name, _)| name).collect();
		assert!(!names.contains(&"broadcast"));
		assert!(!names.contains(&"chain_height"));
	}

	#[tokio::test]
	async fn endpoints_are_independent() {
		let mut mock = MockLedgerApi::new();
		mock.expect_get_chain_height().times(1).returning(|| Ok(100));
		mock.expect_get_account_summary()
			.times(2)
			.returning(|_| Ok(summary(1)));

		let config = CachedApiConfig {
			account_summary: Some(
				CachePolicy::seconds(30)
					.with_max_entries(std::num::NonZeroUsize::new(1).unwrap()),
			),
			..CachedApiConfig::default()
		};
		let api = cached(Arc::new(mock), config);
		api.get_chain_height().await.unwrap();
		// Filling the one-slot summary cache evicts only summaries.
		api.get_account_summary("tz1a").await.unwrap();
		api.get_account_summary("tz1b").await.unwrap();
		api.get_chain_height().await.unwrap();
	}

	#[tokio::test]
	async fn failures_are_not_cached() {
		let mut mock = MockLedgerApi::new();
		let mut seq = mockall::Sequence::new();
		mock.expect_get_chain_height()
			.times(1)
			.in_sequence(&mut seq)
			.returning(|| {
				Err(IndexerError::StatusError {
					status: 502,
					url: "https://api.tzkt.io/v1/blocks/count".to_string(),
				})
			});
		mock.expect_get_chain_height()
			.times(1)
			.in_sequence(&mut seq)
			.returning(|| Ok(7));

		let api = cached(Arc::new(mock), CachedApiConfig::default());
		assert!(api.get_chain_height().await.unwrap_err().is_transient());
		assert_eq!(api.get_chain_height().await.unwrap(), 7);
	}
}
