//! Merging of a previously stable operation history with freshly classified operations.

use crate::account::types::Operation;
use itertools::Itertools;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Newest first, ties broken by identity
fn history_order(a: &Operation, b: &Operation) -> Ordering {
	b.block_height
		.cmp(&a.block_height)
		.then_with(|| a.id.cmp(&b.id))
}

/// Combine `stable` and `fresh` into one deduplicated, newest-first history.
///
/// When an identity appears in both inputs the fresh operation replaces the stable one. Within
/// `fresh` the last occurrence of an identity wins. The output order depends only on the
/// surviving operations, so merging the same inputs again gives the same result.
pub fn merge_operations(stable: &[Operation], fresh: &[Operation]) -> Vec<Operation> {
	let mut by_id: HashMap<&str, &Operation> = HashMap::with_capacity(stable.len() + fresh.len());
	for op in stable.iter().chain(fresh) {
		by_id.insert(op.id.as_str(), op);
	}

	by_id
		.into_values()
		.sorted_by(|a, b| history_order(a, b))
		.cloned()
		.collect()
}
