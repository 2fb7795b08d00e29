//!
//! REST client for a TzKT-style ledger indexer.
//!
//! This module provides an async client for the indexer's account, block and operation
//! endpoints. Transient failures (timeouts, connection errors, 5xx and 429 responses) are retried
//! with exponential backoff inside a bounded time budget; everything else is returned to the
//! caller immediately.

use super::api::LedgerApi;
use super::types::*;
use backoff::ExponentialBackoffBuilder;
use futures::future::try_join_all;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Connection settings for the indexer client
#[derive(Debug, Clone)]
pub struct IndexerConfig {
	/// Base URL of the indexer REST API, without the `/v1` suffix.
	pub base_url: String,
	/// Base URL of a node RPC used for injecting operations.
	pub rpc_url: Option<String>,
	/// Timeout applied to each HTTP request.
	pub request_timeout: Duration,
	/// Number of operations requested per page.
	pub page_size: u32,
	/// Total time spent retrying one request before giving up.
	pub max_retry_elapsed: Duration,
}

impl Default for IndexerConfig {
	fn default() -> Self {
		Self {
			base_url: "https://api.tzkt.io".to_string(),
			rpc_url: None,
			request_timeout: Duration::from_secs(30),
			page_size: 100,
			max_retry_elapsed: Duration::from_secs(10),
		}
	}
}

/// TzKT indexer client
#[derive(Clone)]
pub struct TzktClient {
	/// The underlying HTTP client.
	http_client: Client,
	config: IndexerConfig,
}

impl TzktClient {
	/// Create a new indexer client.
	///
	/// # Errors
	/// Returns `IndexerError::HttpError` if the HTTP client cannot be built.
	pub fn new(config: IndexerConfig) -> Result<Self, IndexerError> {
		let http_client = Client::builder().timeout(config.request_timeout).build()?;

		info!("Created indexer client for {}", config.base_url);
		Ok(Self {
			http_client,
			config,
		})
	}

	fn url(&self, path: &str) -> String {
		format!("{}/v1/{}", self.config.base_url.trim_end_matches('/'), path)
	}

	/// Execute a GET request, retrying transient failures.
	async fn get_json<T: DeserializeOwned>(
		&self,
		url: &str,
		query: &[(&str, String)],
	) -> Result<T, IndexerError> {
		let policy = ExponentialBackoffBuilder::new()
			.with_max_elapsed_time(Some(self.config.max_retry_elapsed))
			.build();
		let this = self;

		backoff::future::retry(policy, move || async move {
			this.fetch_json(url, query).await.map_err(|e| {
				if e.is_transient() {
					warn!("Transient indexer failure for {}: {}", url, e);
					backoff::Error::transient(e)
				} else {
					backoff::Error::permanent(e)
				}
			})
		})
		.await
	}

	/// `sort=1` pages newest first and `lastId` is the id the previous page ended on.
	fn page_query(&self, cursor: PageCursor) -> Vec<(&'static str, String)> {
		let sort = if cursor.is_descending() { "1" } else { "0" };
		let mut query = vec![
			("sort", sort.to_string()),
			("limit", self.config.page_size.to_string()),
		];
		if let Some(last_id) = cursor.id() {
			query.push(("lastId", last_id.to_string()));
		}
		query
	}

	async fn fetch_json<T: DeserializeOwned>(
		&self,
		url: &str,
		query: &[(&str, String)],
	) -> Result<T, IndexerError> {
		debug!("GET {} {:?}", url, query);

		let response = self.http_client.get(url).query(query).send().await?;

		if !response.status().is_success() {
			return Err(IndexerError::StatusError {
				status: response.status().as_u16(),
				url: url.to_string(),
			});
		}

		let body = response.text().await?;
		Ok(serde_json::from_str(&body)?)
	}
}

#[async_trait::async_trait]
impl LedgerApi for TzktClient {
	async fn get_account_summary(&self, address: &str) -> Result<AccountSummary, IndexerError> {
		self.get_json(&self.url(&format!("accounts/{}", address)), &[])
			.await
	}

	async fn get_chain_height(&self) -> Result<u64, IndexerError> {
		self.get_json(&self.url("blocks/count"), &[]).await
	}

	async fn list_transactions(
		&self,
		address: &str,
		cursor: PageCursor,
	) -> Result<Vec<RawTransaction>, IndexerError> {
		let page: Vec<RawTransaction> = self
			.get_json(
				&self.url(&format!("accounts/{}/operations", address)),
				&self.page_query(cursor),
			)
			.await?;

		debug!(
			"Fetched {} operations for {} at {:?}",
			page.len(),
			address,
			cursor
		);
		Ok(page)
	}

	async fn get_transactions_by_hash(
		&self,
		hashes: &[String],
	) -> Result<Vec<RawTransaction>, IndexerError> {
		let groups = try_join_all(hashes.iter().map(|hash| {
			let url = self.url(&format!("operations/{}", hash));
			async move { self.get_json::<Vec<RawTransaction>>(&url, &[]).await }
		}))
		.await?;

		Ok(groups.into_iter().flatten().collect())
	}

	async fn broadcast(&self, signed_operation: &str) -> Result<String, IndexerError> {
		let rpc_url = self.config.rpc_url.as_deref().ok_or_else(|| {
			IndexerError::Unsupported("broadcast requires a node RPC url".to_string())
		})?;
		let url = format!(
			"{}/injection/operation",
			rpc_url.trim_end_matches('/')
		);

		// Never retried: a repeated injection is not idempotent from the caller's view.
		let response = self
			.http_client
			.post(&url)
			.json(&signed_operation)
			.send()
			.await?;

		if !response.status().is_success() {
			return Err(IndexerError::StatusError {
				status: response.status().as_u16(),
				url,
			});
		}

		let hash: String = serde_json::from_str(&response.text().await?)?;
		info!("Injected operation {}", hash);
		Ok(hash)
	}
}
