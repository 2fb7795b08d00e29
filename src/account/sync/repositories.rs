use crate::account::types::{AccountSnapshot, SyncError};
use std::path::PathBuf;
use tracing::{info, warn};

/// Repository for account snapshot persistence
#[async_trait::async_trait]
pub trait SnapshotRepository: Send + Sync {
	async fn save(&self, snapshot: &AccountSnapshot) -> Result<(), SyncError>;
	async fn load(&self, account_id: &str) -> Result<Option<AccountSnapshot>, SyncError>;
}

/// File-based implementation of SnapshotRepository
pub struct FileSnapshotRepository {
	data_dir: PathBuf,
}

impl FileSnapshotRepository {
	pub fn new(data_dir: PathBuf) -> Self {
		Self { data_dir }
	}

	/// Account ids contain `:`, which is not portable in file names
	fn file_stem(account_id: &str) -> String {
		account_id
			.chars()
			.map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
			.collect()
	}

	fn get_snapshot_filename(&self, account_id: &str) -> PathBuf {
		self.data_dir
			.join(format!("account_{}.json", Self::file_stem(account_id)))
	}

	fn get_metadata_filename(&self, account_id: &str) -> PathBuf {
		self.data_dir
			.join(format!("account_{}.meta.json", Self::file_stem(account_id)))
	}
}

#[async_trait::async_trait]
impl SnapshotRepository for FileSnapshotRepository {
	/// The snapshot is replaced atomically before its metadata is written, so metadata never
	/// describes a snapshot that is not on disk.
	async fn save(&self, snapshot: &AccountSnapshot) -> Result<(), SyncError> {
		let state = serde_json::to_vec(snapshot).map_err(|e| {
			SyncError::Persistence(format!("Failed to serialize account snapshot: {}", e))
		})?;
		let filename = self.get_snapshot_filename(&snapshot.id);
		let staging = filename.with_extension("json.tmp");
		tokio::fs::write(&staging, &state).await?;
		tokio::fs::rename(&staging, &filename).await?;

		let metadata = serde_json::json!({
			"account_id": snapshot.id,
			"sync_height": snapshot.block_height,
			"operations": snapshot.operations.len(),
			"timestamp": snapshot.last_sync_date.to_rfc3339(),
		});
		let metadata = serde_json::to_string_pretty(&metadata).map_err(|e| {
			SyncError::Persistence(format!("Failed to serialize snapshot metadata: {}", e))
		})?;
		tokio::fs::write(self.get_metadata_filename(&snapshot.id), metadata).await?;

		info!(
			"Saved account snapshot to {:?} at height {}",
			filename, snapshot.block_height
		);
		Ok(())
	}

	async fn load(&self, account_id: &str) -> Result<Option<AccountSnapshot>, SyncError> {
		let filename = self.get_snapshot_filename(account_id);
		let state = match tokio::fs::read(&filename).await {
			Ok(state) => state,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
			Err(e) => return Err(e.into()),
		};

		let snapshot: AccountSnapshot = serde_json::from_slice(&state).map_err(|e| {
			SyncError::Persistence(format!("Failed to deserialize account snapshot: {}", e))
		})?;

		if snapshot.id != account_id {
			warn!(
				"Snapshot in {:?} belongs to {}, ignoring it",
				filename, snapshot.id
			);
			return Ok(None);
		}

		info!(
			"Loaded account snapshot from {:?} at height {} with {} operations",
			filename,
			snapshot.block_height,
			snapshot.operations.len()
		);
		Ok(Some(snapshot))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn snapshot(height: u64) -> AccountSnapshot {
		AccountSnapshot {
			balance: 42,
			spendable_balance: 42,
			..AccountSnapshot::empty(
				"js:2:tezos:tz1me:tezbox".to_string(),
				"tz1me".to_string(),
				height,
			)
		}
	}

	#[tokio::test]
	async fn saves_and_loads_snapshots() {
		let dir = tempfile::tempdir().unwrap();
		let repository = FileSnapshotRepository::new(dir.path().to_path_buf());
		let snapshot = snapshot(100);

		assert!(repository.load(&snapshot.id).await.unwrap().is_none());
		repository.save(&snapshot).await.unwrap();
		assert_eq!(repository.load(&snapshot.id).await.unwrap(), Some(snapshot));
		assert!(dir.path().join("account_js_2_tezos_tz1me_tezbox.meta.json").exists());
	}

	#[tokio::test]
	async fn save_replaces_snapshot_and_leaves_no_staging_file() {
		let dir = tempfile::tempdir().unwrap();
		let repository = FileSnapshotRepository::new(dir.path().to_path_buf());

		repository.save(&snapshot(100)).await.unwrap();
		repository.save(&snapshot(150)).await.unwrap();

		let loaded = repository.load("js:2:tezos:tz1me:tezbox").await.unwrap().unwrap();
		assert_eq!(loaded.block_height, 150);

		let metadata: serde_json::Value = serde_json::from_slice(
			&std::fs::read(dir.path().join("account_js_2_tezos_tz1me_tezbox.meta.json")).unwrap(),
		)
		.unwrap();
		assert_eq!(metadata["sync_height"], 150);

		let names: Vec<_> = std::fs::read_dir(dir.path())
			.unwrap()
			.map(|entry| entry.unwrap().file_name().into_string().unwrap())
			.collect();
		assert_eq!(names.len(), 2);
		assert!(names.iter().all(|name| !name.ends_with(".tmp")));
	}

	#[tokio::test]
	async fn failed_save_writes_no_metadata() {
		let dir = tempfile::tempdir().unwrap();
		let missing = dir.path().join("missing");
		let repository = FileSnapshotRepository::new(missing.clone());

		assert!(repository.save(&snapshot(100)).await.is_err());
		assert!(!missing.join("account_js_2_tezos_tz1me_tezbox.meta.json").exists());
	}

	#[tokio::test]
	async fn corrupt_snapshot_is_a_persistence_error() {
		let dir = tempfile::tempdir().unwrap();
		let repository = FileSnapshotRepository::new(dir.path().to_path_buf());
		std::fs::write(dir.path().join("account_acc.json"), b"{ not json").unwrap();

		let err = repository.load("acc").await.unwrap_err();
		assert!(matches!(err, SyncError::Persistence(_)));
	}
}
