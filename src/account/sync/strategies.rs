use crate::account::types::{AccountSnapshot, Operation};
use crate::indexer::PageCursor;
use std::sync::Arc;
use tracing::{debug, info};

/// Decides whether an operation can no longer change on the remote side
pub trait FinalityPolicy: Send + Sync {
	fn is_final(&self, operation: &Operation, chain_height: u64) -> bool;
}

/// Final once the including block is buried under `n` further blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationDepth(pub u64);

impl Default for ConfirmationDepth {
	fn default() -> Self {
		Self(2)
	}
}

impl FinalityPolicy for ConfirmationDepth {
	fn is_final(&self, operation: &Operation, chain_height: u64) -> bool {
		operation.block_height.saturating_add(self.0) <= chain_height
	}
}

/// Every operation is final as soon as it is seen
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysFinal;

impl FinalityPolicy for AlwaysFinal {
	fn is_final(&self, _operation: &Operation, _chain_height: u64) -> bool {
		true
	}
}

/// Nothing is ever final, so every sync rescans the full history
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverFinal;

impl FinalityPolicy for NeverFinal {
	fn is_final(&self, _operation: &Operation, _chain_height: u64) -> bool {
		false
	}
}

impl<F> FinalityPolicy for F
where
	F: Fn(&Operation, u64) -> bool + Send + Sync,
{
	fn is_final(&self, operation: &Operation, chain_height: u64) -> bool {
		self(operation, chain_height)
	}
}

/// Configuration for account synchronization
#[derive(Clone)]
pub struct SyncConfig {
	/// Safety bound on the number of pages fetched in one sync
	pub max_iterations: u32,
	/// Currency part of the account identifier
	pub currency_id: String,
	/// Derivation mode part of the account identifier
	pub derivation_mode: String,
	pub finality: Arc<dyn FinalityPolicy>,
}

impl Default for SyncConfig {
	fn default() -> Self {
		Self {
			max_iterations: 20,
			currency_id: "tezos".to_string(),
			derivation_mode: "tezbox".to_string(),
			finality: Arc::new(ConfirmationDepth::default()),
		}
	}
}

impl std::fmt::Debug for SyncConfig {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SyncConfig")
			.field("max_iterations", &self.max_iterations)
			.field("currency_id", &self.currency_id)
			.field("derivation_mode", &self.derivation_mode)
			.finish_non_exhaustive()
	}
}

/// How much of the history a sync has to fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatchUpPlan {
	/// Fetch everything, newest page first
	FullRescan,
	/// Fetch only records after the given native id
	Incremental { cursor: u64 },
}

impl CatchUpPlan {
	pub fn cursor(&self) -> Option<u64> {
		match self {
			CatchUpPlan::FullRescan => None,
			CatchUpPlan::Incremental { cursor } => Some(*cursor),
		}
	}

	/// Where pagination starts for this plan
	pub fn start(&self) -> PageCursor {
		match self {
			CatchUpPlan::FullRescan => PageCursor::Newest,
			CatchUpPlan::Incremental { cursor } => PageCursor::After(*cursor),
		}
	}
}

/// Choose between incremental catch-up and a full rescan.
///
/// Resuming is only safe when every previously known operation is final; otherwise a pending
/// operation could still change and would be missed.
pub fn plan_catch_up(
	stable: &[Operation],
	finality: &dyn FinalityPolicy,
	chain_height: u64,
) -> CatchUpPlan {
	if stable.is_empty() {
		debug!("No previous operations, full rescan");
		return CatchUpPlan::FullRescan;
	}

	if let Some(pending) = stable
		.iter()
		.find(|op| !finality.is_final(op, chain_height))
	{
		info!(
			"Operation {} at height {} is not final at {}, full rescan",
			pending.id, pending.block_height, chain_height
		);
		return CatchUpPlan::FullRescan;
	}

	match stable.iter().filter_map(|op| op.extra.id).max() {
		Some(cursor) => CatchUpPlan::Incremental { cursor },
		None => CatchUpPlan::FullRescan,
	}
}

/// Operations of `previous` that may be merged into a new sync of `account_id`
pub fn stable_operations<'a>(
	previous: Option<&'a AccountSnapshot>,
	account_id: &str,
) -> &'a [Operation] {
	match previous {
		Some(snapshot) if snapshot.id == account_id => &snapshot.operations,
		_ => &[],
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::account::types::{OperationExtra, OperationType};
	use chrono::Utc;

	fn op(height: u64, native_id: Option<u64>) -> Operation {
		Operation {
			id: format!("acc-oo{}-IN", height),
			hash: format!("oo{}", height),
			account_id: "acc".to_string(),
			kind: OperationType::In,
			value: 1,
			fee: 0,
			senders: vec![],
			recipients: vec![],
			block_height: height,
			block_hash: None,
			date: Utc::now(),
			has_failed: false,
			extra: OperationExtra {
				id: native_id,
				..OperationExtra::default()
			},
		}
	}

	#[test]
	fn empty_history_rescans() {
		assert_eq!(
			plan_catch_up(&[], &AlwaysFinal, 100),
			CatchUpPlan::FullRescan
		);
	}

	#[test]
	fn resumes_after_newest_native_id_when_final() {
		let stable = vec![op(90, Some(12)), op(80, Some(30)), op(70, None)];
		let plan = plan_catch_up(&stable, &ConfirmationDepth(2), 100);
		assert_eq!(plan, CatchUpPlan::Incremental { cursor: 30 });
		assert_eq!(plan.cursor(), Some(30));
		assert_eq!(plan.start(), PageCursor::After(30));
		assert_eq!(CatchUpPlan::FullRescan.start(), PageCursor::Newest);
	}

	#[test]
	fn pending_operation_forces_rescan() {
		let stable = vec![op(99, Some(12)), op(80, Some(11))];
		assert_eq!(
			plan_catch_up(&stable, &ConfirmationDepth(2), 100),
			CatchUpPlan::FullRescan
		);
		assert_eq!(
			plan_catch_up(&stable, &ConfirmationDepth(1), 100),
			CatchUpPlan::Incremental { cursor: 12 }
		);
		assert_eq!(
			plan_catch_up(&stable, &NeverFinal, 100),
			CatchUpPlan::FullRescan
		);
	}

	#[test]
	fn closures_are_policies() {
		let stable = vec![op(10, Some(1))];
		let not_failed = |op: &Operation, _height: u64| !op.has_failed;
		assert_eq!(
			plan_catch_up(&stable, &not_failed, 0),
			CatchUpPlan::Incremental { cursor: 1 }
		);
	}

	#[test]
	fn missing_native_ids_rescan() {
		let stable = vec![op(10, None)];
		assert_eq!(
			plan_catch_up(&stable, &AlwaysFinal, 100),
			CatchUpPlan::FullRescan
		);
	}

	#[test]
	fn snapshot_of_other_account_is_ignored() {
		let snapshot = AccountSnapshot {
			operations: vec![op(10, Some(1))],
			..AccountSnapshot::empty("acc".to_string(), "tz1me".to_string(), 10)
		};
		assert_eq!(stable_operations(Some(&snapshot), "acc").len(), 1);
		assert!(stable_operations(Some(&snapshot), "other").is_empty());
		assert!(stable_operations(None, "acc").is_empty());
	}
}
