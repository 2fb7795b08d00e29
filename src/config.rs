//! Command line and environment settings for the sync binary.

use clap::Parser;
use ledger_account_sync::account::sync::{ConfirmationDepth, SyncConfig};
use ledger_account_sync::cache::CachedApiConfig;
use ledger_account_sync::indexer::IndexerConfig;
use std::path::PathBuf;
use std::sync::Arc;

/// Synchronize one account against a TzKT indexer and store its snapshot
#[derive(Debug, Clone, Parser)]
#[clap(name = "ledger-account-sync", version)]
pub struct Settings {
	/// Address of the account to synchronize
	pub address: String,

	/// Base URL of the indexer REST API, without the `/v1` suffix
	#[clap(long, env = "LEDGER_SYNC_API_URL", default_value = "https://api.tzkt.io")]
	pub api_url: String,

	/// Node RPC used for broadcasting signed operations
	#[clap(long, env = "LEDGER_SYNC_RPC_URL")]
	pub rpc_url: Option<String>,

	/// Directory holding snapshot files
	#[clap(long, env = "LEDGER_SYNC_DATA_DIR", default_value = "data")]
	pub data_dir: PathBuf,

	/// Safety bound on the number of pages fetched in one sync
	#[clap(
		long,
		env = "LEDGER_SYNC_MAX_ITERATIONS",
		default_value = "20",
		value_parser = clap::value_parser!(u32).range(1..)
	)]
	pub max_iterations: u32,

	/// Operations requested per page
	#[clap(
		long,
		env = "LEDGER_SYNC_PAGE_SIZE",
		default_value = "100",
		value_parser = clap::value_parser!(u32).range(1..=10_000)
	)]
	pub page_size: u32,

	/// Blocks an operation must be buried under before a sync may resume after it
	#[clap(long, env = "LEDGER_SYNC_CONFIRMATIONS", default_value = "2")]
	pub confirmations: u64,
}

impl Settings {
	pub fn indexer_config(&self) -> IndexerConfig {
		IndexerConfig {
			base_url: self.api_url.trim_end_matches('/').to_string(),
			rpc_url: self.rpc_url.clone(),
			page_size: self.page_size,
			..IndexerConfig::default()
		}
	}

	pub fn sync_config(&self) -> SyncConfig {
		SyncConfig {
			max_iterations: self.max_iterations,
			finality: Arc::new(ConfirmationDepth(self.confirmations)),
			..SyncConfig::default()
		}
	}

	pub fn cache_config(&self) -> CachedApiConfig {
		CachedApiConfig::default()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_without_flags() {
		let settings = Settings::try_parse_from(["ledger-account-sync", "tz1me"]).unwrap();
		assert_eq!(settings.address, "tz1me");
		assert_eq!(settings.indexer_config().base_url, "https://api.tzkt.io");
		assert_eq!(settings.indexer_config().page_size, 100);
		assert_eq!(settings.sync_config().max_iterations, 20);
		assert_eq!(settings.data_dir, PathBuf::from("data"));
		assert_eq!(settings.confirmations, 2);
	}

	#[test]
	fn applies_flags() {
		let settings = Settings::try_parse_from([
			"ledger-account-sync",
			"tz1me",
			"--api-url",
			"http://localhost:5000/",
			"--data-dir",
			"/tmp/ledger",
			"--max-iterations",
			"5",
		])
		.unwrap();
		assert_eq!(settings.indexer_config().base_url, "http://localhost:5000");
		assert_eq!(settings.data_dir, PathBuf::from("/tmp/ledger"));
		assert_eq!(settings.sync_config().max_iterations, 5);
	}

	#[test]
	fn rejects_out_of_range_values() {
		let parse = |flag: &str, value: &str| {
			Settings::try_parse_from(["ledger-account-sync", "tz1me", flag, value])
		};
		assert!(parse("--max-iterations", "many").is_err());
		assert!(parse("--max-iterations", "0").is_err());
		assert!(parse("--page-size", "10001").is_err());
		assert!(parse("--confirmations", "-1").is_err());
	}

	#[test]
	fn address_is_required() {
		assert!(Settings::try_parse_from(["ledger-account-sync"]).is_err());
	}
}
