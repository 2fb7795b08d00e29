use crate::indexer::IndexerError;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a canonical operation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationType {
	In,
	Out,
	Fees,
	Delegate,
	Undelegate,
	Reveal,
	Create,
}

impl OperationType {
	pub fn as_str(&self) -> &'static str {
		match self {
			OperationType::In => "IN",
			OperationType::Out => "OUT",
			OperationType::Fees => "FEES",
			OperationType::Delegate => "DELEGATE",
			OperationType::Undelegate => "UNDELEGATE",
			OperationType::Reveal => "REVEAL",
			OperationType::Create => "CREATE",
		}
	}

	/// Whether the fee is part of the debited value
	pub fn debits_fee(&self) -> bool {
		!matches!(self, OperationType::In | OperationType::Fees)
	}
}

impl fmt::Display for OperationType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.pad(self.as_str())
	}
}

/// Chain-specific side data carried by an operation
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct OperationExtra {
	pub gas_limit: Option<u64>,
	pub storage_limit: Option<u64>,
	/// The indexer's native id, used as pagination cursor on the next sync
	pub id: Option<u64>,
}

/// Canonical record of one historical account event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Operation {
	/// Identity key, stable across re-fetches of the same event
	pub id: String,
	pub hash: String,
	pub account_id: String,
	#[serde(rename = "type")]
	pub kind: OperationType,
	/// Magnitude in the ledger's smallest unit
	pub value: u64,
	pub fee: u64,
	pub senders: Vec<String>,
	pub recipients: Vec<String>,
	pub block_height: u64,
	pub block_hash: Option<String>,
	pub date: DateTime<Utc>,
	pub has_failed: bool,
	pub extra: OperationExtra,
}

/// Chain-specific account resources
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountResources {
	pub revealed: bool,
	pub counter: u64,
	pub public_key: String,
}

/// Full synchronized state of one account at a point in time
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountSnapshot {
	pub id: String,
	pub address: String,
	pub balance: u64,
	pub spendable_balance: u64,
	/// Newest first
	pub operations: Vec<Operation>,
	pub block_height: u64,
	pub last_sync_date: DateTime<Utc>,
	pub resources: AccountResources,
}

impl AccountSnapshot {
	/// Snapshot of an account with no on-chain presence
	pub fn empty(id: String, address: String, block_height: u64) -> Self {
		Self {
			id,
			address,
			balance: 0,
			spendable_balance: 0,
			operations: Vec::new(),
			block_height,
			last_sync_date: Utc::now(),
			resources: AccountResources::default(),
		}
	}
}

/// Error types for account synchronization
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
	#[error("Indexer error: {0}")]
	Indexer(#[from] IndexerError),

	#[error("Malformed account summary: {0}")]
	MalformedSummary(String),

	#[error("Synchronization cancelled")]
	Cancelled,

	#[error("Persistence error: {0}")]
	Persistence(String),

	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
}

impl SyncError {
	/// Whether the caller should try the whole synchronization again later
	pub fn is_retryable(&self) -> bool {
		match self {
			SyncError::Indexer(e) => e.is_transient(),
			SyncError::Io(_) => true,
			SyncError::MalformedSummary(_) | SyncError::Cancelled | SyncError::Persistence(_) => {
				false
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn operation_type_serializes_upper_case() {
		assert_eq!(
			serde_json::to_string(&OperationType::Undelegate).unwrap(),
			"\"UNDELEGATE\""
		);
		assert_eq!(OperationType::Fees.to_string(), "FEES");
		assert!(OperationType::Out.debits_fee());
		assert!(!OperationType::In.debits_fee());
	}

	#[test]
	fn retryable_errors() {
		let transient = SyncError::from(IndexerError::StatusError {
			status: 503,
			url: "https://api.tzkt.io/v1/blocks/count".to_string(),
		});
		assert!(transient.is_retryable());

		let permanent = SyncError::from(IndexerError::StatusError {
			status: 404,
			url: "https://api.tzkt.io/v1/accounts/nope".to_string(),
		});
		assert!(!permanent.is_retryable());
		assert!(!SyncError::Cancelled.is_retryable());
	}
}
