//! Account and operation identifiers.

use super::types::OperationType;

/// `js:2:{currency}:{address}:{derivation_mode}`
pub fn encode_account_id(currency_id: &str, address: &str, derivation_mode: &str) -> String {
	format!("js:2:{}:{}:{}", currency_id, address, derivation_mode)
}

/// Identity of an operation: `{account_id}-{hash}{native_id}-{TYPE}`.
///
/// The native id keeps several operations of one group (same hash) apart. Either part may be
/// empty when the indexer does not provide it.
pub fn encode_operation_id(
	account_id: &str,
	hash: &str,
	native_id: Option<u64>,
	kind: OperationType,
) -> String {
	let native = native_id.map(|id| id.to_string()).unwrap_or_default();
	format!("{}-{}{}-{}", account_id, hash, native, kind)
}
