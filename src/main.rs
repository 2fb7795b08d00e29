mod config;
mod utils;

use config::Settings;
use utils::{TEZ_DECIMALS, format_token_amount};

use clap::Parser;
use ledger_account_sync::account::AccountSynchronizer;
use ledger_account_sync::account::sync::{FileSnapshotRepository, SnapshotRepository};
use ledger_account_sync::cache::cached;
use ledger_account_sync::indexer::TzktClient;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
	// Debug logging for this crate unless RUST_LOG says otherwise
	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| EnvFilter::new("info,ledger_account_sync=debug")),
		)
		.with_target(false)
		.with_thread_ids(false)
		.with_thread_names(false)
		.with_file(false)
		.with_line_number(false)
		.with_timer(tracing_subscriber::fmt::time::time())
		.init();

	// Exits with usage on missing or out of range arguments
	let settings = Settings::parse();
	let address = settings.address.as_str();

	info!("Starting account sync for {}", address);

	let client = match TzktClient::new(settings.indexer_config()) {
		Ok(client) => client,
		Err(e) => {
			error!("Failed to create indexer client: {}", e);
			return ExitCode::FAILURE;
		}
	};
	let api = Arc::new(cached(Arc::new(client), settings.cache_config()));
	let synchronizer = AccountSynchronizer::new(api.clone(), settings.sync_config());

	if let Err(e) = tokio::fs::create_dir_all(&settings.data_dir).await {
		error!("Failed to create data directory {:?}: {}", settings.data_dir, e);
		return ExitCode::FAILURE;
	}
	let repository = FileSnapshotRepository::new(settings.data_dir.clone());

	let account_id = synchronizer.account_id(address);
	let previous = match repository.load(&account_id).await {
		Ok(previous) => previous,
		Err(e) => {
			error!("Ignoring unreadable snapshot for {}: {}", account_id, e);
			None
		}
	};

	let snapshot = match synchronizer.synchronize(address, previous.as_ref()).await {
		Ok(snapshot) => snapshot,
		Err(e) => {
			error!(
				"Failed to synchronize {} (retryable: {}): {}",
				account_id,
				e.is_retryable(),
				e
			);
			return ExitCode::FAILURE;
		}
	};

	info!(
		"Balance of {}: {} tez at height {}",
		address,
		format_token_amount(snapshot.balance, TEZ_DECIMALS),
		snapshot.block_height
	);
	for op in snapshot.operations.iter().take(10) {
		info!(
			"{} {:>10} {} tez (fee {}){}",
			op.date.format("%Y-%m-%d %H:%M"),
			op.kind,
			format_token_amount(op.value, TEZ_DECIMALS),
			format_token_amount(op.fee, TEZ_DECIMALS),
			if op.has_failed { " [failed]" } else { "" }
		);
	}
	for (name, stats) in api.stats() {
		info!("Cache {}: {:?}", name, stats);
	}

	if let Err(e) = repository.save(&snapshot).await {
		error!("Failed to save snapshot: {}", e);
		return ExitCode::FAILURE;
	}

	ExitCode::SUCCESS
}
