//! Classification of raw indexer records into canonical operations.
//!
//! Every supported record kind maps to at most one `Operation`. Records that turn out to be
//! unrelated to the account, or that carry a kind this client does not know, are skipped with a
//! warning and never fail the batch.

use crate::account::id::encode_operation_id;
use crate::account::types::{Operation, OperationExtra, OperationType};
use crate::indexer::{
	ActivationOperation, DelegationOperation, MigrationOperation, OperationHeader,
	OriginationOperation, RawTransaction, TransferOperation,
};
use tracing::{debug, warn};

/// Kind-specific part of an operation, before fees and identity are applied
struct Classified {
	kind: OperationType,
	/// Moved funds, excluding fees
	principal: u64,
	senders: Vec<String>,
	recipients: Vec<String>,
}

/// Maps raw records of one account to canonical operations
#[derive(Debug, Clone)]
pub struct TransactionClassifier {
	address: String,
	account_id: String,
}

impl TransactionClassifier {
	pub fn new(address: impl Into<String>, account_id: impl Into<String>) -> Self {
		Self {
			address: address.into(),
			account_id: account_id.into(),
		}
	}

	/// Classify a page of records, dropping the ones that produce no operation.
	pub fn classify_batch(&self, transactions: &[RawTransaction]) -> Vec<Operation> {
		transactions.iter().filter_map(|tx| self.classify(tx)).collect()
	}

	/// Classify one record. Returns `None` for irrelevant or unknown records.
	pub fn classify(&self, tx: &RawTransaction) -> Option<Operation> {
		let (header, classified) = match tx {
			RawTransaction::Transaction(op) => (&op.header, self.transfer(op)?),
			RawTransaction::Delegation(op) => (&op.header, self.delegation(op)),
			RawTransaction::Reveal(op) => (&op.header, self.reveal()),
			RawTransaction::Migration(op) => (&op.header, self.migration(op)),
			RawTransaction::Origination(op) => (&op.header, self.origination(op)),
			RawTransaction::Activation(op) => (&op.header, self.activation(op)),
			RawTransaction::Unsupported(op) => {
				warn!(
					"Skipping unsupported operation kind '{}' (id {:?})",
					op.kind, op.id
				);
				return None;
			}
		};

		if classified.kind == OperationType::In && classified.principal == 0 {
			debug!(
				"Dropping zero value incoming operation {:?}",
				header.hash.as_deref().unwrap_or_default()
			);
			return None;
		}

		Some(self.finish(header, classified))
	}

	fn finish(&self, header: &OperationHeader, classified: Classified) -> Operation {
		let has_failed = header.has_failed();
		let mut fee = header.baker_fee;
		if !has_failed {
			fee = fee
				.saturating_add(header.allocation_fee)
				.saturating_add(header.storage_fee);
		}

		let value = if classified.kind.debits_fee() {
			classified.principal.saturating_add(fee)
		} else {
			classified.principal
		};

		let hash = header.hash.clone().unwrap_or_default();
		Operation {
			id: encode_operation_id(&self.account_id, &hash, header.id, classified.kind),
			hash,
			account_id: self.account_id.clone(),
			kind: classified.kind,
			value,
			fee,
			senders: classified.senders,
			recipients: classified.recipients,
			block_height: header.level,
			block_hash: header.block.clone(),
			date: header.timestamp,
			has_failed,
			extra: OperationExtra {
				gas_limit: header.gas_limit,
				storage_limit: header.storage_limit,
				id: header.id,
			},
		}
	}

	fn transfer(&self, op: &TransferOperation) -> Option<Classified> {
		let address = Some(self.address.as_str());
		let initiator = op.initiator.as_ref().map(|a| a.address.as_str());
		let from = op.sender.as_ref().map(|a| a.address.as_str());
		let to = op.target.as_ref().map(|a| a.address.as_str());

		if from != address && to != address && initiator != address {
			warn!(
				"Operation {:?} is unrelated to account {}",
				op.header.hash, self.address
			);
			return None;
		}

		let senders = vec![from.or(initiator).unwrap_or_default().to_string()];
		let recipients = vec![to.unwrap_or_default().to_string()];

		let self_transfer = from == address && to == address;
		let initiated_only = from != address && to != address;
		let (kind, principal) = if self_transfer || initiated_only {
			(OperationType::Fees, 0)
		} else {
			let kind = if to == address {
				OperationType::In
			} else {
				OperationType::Out
			};
			match (op.header.has_failed(), op.amount) {
				// failed transfers move no funds but keep their identity
				(true, _) => (kind, 0),
				(false, 0) if kind == OperationType::Out => (OperationType::Fees, 0),
				(false, amount) => (kind, amount),
			}
		};

		Some(Classified {
			kind,
			principal,
			senders,
			recipients,
		})
	}

	fn delegation(&self, op: &DelegationOperation) -> Classified {
		let (kind, recipient) = match &op.new_delegate {
			Some(delegate) => (OperationType::Delegate, delegate.address.clone()),
			None => (OperationType::Undelegate, String::new()),
		};
		Classified {
			kind,
			principal: 0,
			senders: vec![self.address.clone()],
			recipients: vec![recipient],
		}
	}

	fn reveal(&self) -> Classified {
		Classified {
			kind: OperationType::Reveal,
			principal: 0,
			senders: vec![self.address.clone()],
			recipients: vec![self.address.clone()],
		}
	}

	fn migration(&self, op: &MigrationOperation) -> Classified {
		let kind = if op.balance_change < 0 {
			OperationType::Out
		} else {
			OperationType::In
		};
		Classified {
			kind,
			principal: op.balance_change.unsigned_abs(),
			senders: vec![self.address.clone()],
			recipients: vec![self.address.clone()],
		}
	}

	fn origination(&self, op: &OriginationOperation) -> Classified {
		let contract = op
			.originated_contract
			.as_ref()
			.map(|c| c.address.clone())
			.unwrap_or_default();
		Classified {
			kind: OperationType::Create,
			principal: op.contract_balance,
			senders: vec![self.address.clone()],
			recipients: vec![contract],
		}
	}

	fn activation(&self, op: &ActivationOperation) -> Classified {
		Classified {
			kind: OperationType::In,
			principal: op.balance,
			senders: vec![self.address.clone()],
			recipients: vec![self.address.clone()],
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::{Value, json};

	const ME: &str = "tz1me";
	const ACCOUNT_ID: &str = "js:2:tezos:tz1me:tezbox";

	fn classifier() -> TransactionClassifier {
		TransactionClassifier::new(ME, ACCOUNT_ID)
	}

	fn raw(value: Value) -> RawTransaction {
		serde_json::from_value(value).unwrap()
	}

	fn transfer(sender: &str, target: &str, amount: u64, status: &str) -> RawTransaction {
		raw(json!({
			"type": "transaction",
			"id": 10,
			"level": 100,
			"block": "BLock",
			"timestamp": "2021-06-01T10:00:00Z",
			"hash": "oo1",
			"status": status,
			"bakerFee": 400,
			"storageFee": 250,
			"allocationFee": 60,
			"gasLimit": 1520,
			"storageLimit": 300,
			"sender": { "address": sender },
			"target": { "address": target },
			"amount": amount
		}))
	}

	#[test]
	fn outgoing_value_includes_fee() {
		let op = classifier()
			.classify(&transfer(ME, "tz1other", 5000, "applied"))
			.unwrap();
		assert_eq!(op.kind, OperationType::Out);
		assert_eq!(op.fee, 710);
		assert_eq!(op.value, 5710);
		assert_eq!(op.senders, vec![ME.to_string()]);
		assert_eq!(op.recipients, vec!["tz1other".to_string()]);
		assert_eq!(op.id, "js:2:tezos:tz1me:tezbox-oo110-OUT");
		assert_eq!(op.block_height, 100);
		assert_eq!(op.extra.id, Some(10));
		assert_eq!(op.extra.gas_limit, Some(1520));
		assert!(!op.has_failed);
	}

	#[test]
	fn incoming_value_excludes_fee() {
		let op = classifier()
			.classify(&transfer("tz1other", ME, 5000, "applied"))
			.unwrap();
		assert_eq!(op.kind, OperationType::In);
		assert_eq!(op.value, 5000);
		assert_eq!(op.fee, 710);
	}

	#[test]
	fn failed_outgoing_only_pays_baker_fee() {
		let op = classifier()
			.classify(&transfer(ME, "tz1other", 5000, "failed"))
			.unwrap();
		assert_eq!(op.kind, OperationType::Out);
		assert!(op.has_failed);
		assert_eq!(op.fee, 400);
		assert_eq!(op.value, 400);
	}

	#[test]
	fn zero_value_incoming_is_dropped() {
		let classifier = classifier();
		assert!(
			classifier
				.classify(&transfer("tz1other", ME, 0, "applied"))
				.is_none()
		);
		assert!(
			classifier
				.classify(&transfer("tz1other", ME, 5000, "backtracked"))
				.is_none()
		);
	}

	#[test]
	fn self_transfer_is_fees() {
		let op = classifier()
			.classify(&transfer(ME, ME, 5000, "applied"))
			.unwrap();
		assert_eq!(op.kind, OperationType::Fees);
		assert_eq!(op.value, 0);
		assert_eq!(op.fee, 710);
	}

	#[test]
	fn zero_amount_outgoing_is_fees() {
		let op = classifier()
			.classify(&transfer(ME, "KT1contract", 0, "applied"))
			.unwrap();
		assert_eq!(op.kind, OperationType::Fees);
		assert_eq!(op.value, 0);
	}

	#[test]
	fn initiator_only_is_fees() {
		let op = classifier()
			.classify(&raw(json!({
				"type": "transaction",
				"id": 11,
				"level": 100,
				"timestamp": "2021-06-01T10:00:00Z",
				"hash": "oo2",
				"bakerFee": 100,
				"initiator": { "address": ME },
				"sender": { "address": "KT1a" },
				"target": { "address": "KT1b" },
				"amount": 9
			})))
			.unwrap();
		assert_eq!(op.kind, OperationType::Fees);
		assert_eq!(op.value, 0);
		assert_eq!(op.senders, vec!["KT1a".to_string()]);
	}

	#[test]
	fn unrelated_and_unsupported_are_skipped() {
		let classifier = classifier();
		assert!(
			classifier
				.classify(&transfer("tz1a", "tz1b", 5000, "applied"))
				.is_none()
		);
		assert!(
			classifier
				.classify(&raw(json!({ "type": "sr_execute", "id": 3 })))
				.is_none()
		);
	}

	#[test]
	fn non_transfer_kinds() {
		let classifier = classifier();
		let header = json!({
			"id": 20,
			"level": 200,
			"timestamp": "2021-06-02T10:00:00Z",
			"hash": "oo3",
			"bakerFee": 300
		});
		let with = |extra: Value| {
			let mut value = header.clone();
			value
				.as_object_mut()
				.unwrap()
				.extend(extra.as_object().unwrap().clone());
			raw(value)
		};

		let delegate = classifier
			.classify(&with(json!({
				"type": "delegation",
				"newDelegate": { "address": "tz1baker" }
			})))
			.unwrap();
		assert_eq!(delegate.kind, OperationType::Delegate);
		assert_eq!(delegate.value, 300);
		assert_eq!(delegate.recipients, vec!["tz1baker".to_string()]);

		let undelegate = classifier
			.classify(&with(json!({ "type": "delegation" })))
			.unwrap();
		assert_eq!(undelegate.kind, OperationType::Undelegate);
		assert_eq!(undelegate.recipients, vec![String::new()]);

		let reveal = classifier
			.classify(&with(json!({ "type": "reveal" })))
			.unwrap();
		assert_eq!(reveal.kind, OperationType::Reveal);
		assert_eq!(reveal.senders, reveal.recipients);

		let origination = classifier
			.classify(&with(json!({
				"type": "origination",
				"contractBalance": 1000,
				"originatedContract": { "address": "KT1new" }
			})))
			.unwrap();
		assert_eq!(origination.kind, OperationType::Create);
		assert_eq!(origination.value, 1300);
		assert_eq!(origination.recipients, vec!["KT1new".to_string()]);

		let activation = classifier
			.classify(&with(json!({ "type": "activation", "balance": 77 })))
			.unwrap();
		assert_eq!(activation.kind, OperationType::In);
		assert_eq!(activation.value, 77);
	}

	#[test]
	fn migration_without_hash() {
		let op = classifier()
			.classify(&raw(json!({
				"type": "migration",
				"id": 30,
				"level": 300,
				"timestamp": "2021-06-03T10:00:00Z",
				"balanceChange": -250
			})))
			.unwrap();
		assert_eq!(op.kind, OperationType::Out);
		assert_eq!(op.value, 250);
		assert_eq!(op.hash, "");
		assert_eq!(op.id, "js:2:tezos:tz1me:tezbox-30-OUT");
	}

	#[test]
	fn batch_discards_skipped_records() {
		let ops = classifier().classify_batch(&[
			transfer(ME, "tz1other", 5000, "applied"),
			transfer("tz1a", "tz1b", 1, "applied"),
			transfer("tz1other", ME, 0, "applied"),
		]);
		assert_eq!(ops.len(), 1);
	}
}
