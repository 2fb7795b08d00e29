//! Cursor driven pagination over the account operations endpoint.

use crate::account::types::SyncError;
use crate::indexer::{LedgerApi, PageCursor, RawTransaction};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Why pagination stopped. None of these is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationStop {
	/// The remote returned an empty page
	Exhausted,
	/// The safety bound on the number of pages was reached
	IterationLimit,
	/// The last record of a page carried the cursor that requested it
	CursorStalled,
	/// The last record of a page carried no native id
	CursorMissing,
}

/// Records accumulated by one pagination run
#[derive(Debug, Clone)]
pub struct PaginationOutcome {
	pub transactions: Vec<RawTransaction>,
	pub pages: u32,
	pub stop: PaginationStop,
}

/// Repeatedly lists operations from a cursor until the remote runs dry.
pub struct PaginationDriver<'a, A: LedgerApi + ?Sized> {
	api: &'a A,
	max_iterations: u32,
}

impl<'a, A: LedgerApi + ?Sized> PaginationDriver<'a, A> {
	pub fn new(api: &'a A, max_iterations: u32) -> Self {
		Self {
			api,
			max_iterations,
		}
	}

	/// Fetch every page for `address` starting at `cursor`, following its direction.
	///
	/// `PageCursor::Newest` walks the history backwards from the newest record, so a run cut
	/// short by the iteration limit still holds the most recent operations.
	///
	/// Any remote failure discards what was accumulated so far. The token is checked before each
	/// page request.
	pub async fn fetch_all(
		&self,
		address: &str,
		mut cursor: PageCursor,
		cancellation: &CancellationToken,
	) -> Result<PaginationOutcome, SyncError> {
		let mut transactions = Vec::new();
		let mut pages = 0;

		let stop = loop {
			if pages >= self.max_iterations {
				info!(
					"Stopping pagination for {} after {} pages (safety limit)",
					address, pages
				);
				break PaginationStop::IterationLimit;
			}
			if cancellation.is_cancelled() {
				return Err(SyncError::Cancelled);
			}

			let page = self.api.list_transactions(address, cursor).await?;
			pages += 1;

			let Some(last) = page.last() else {
				break PaginationStop::Exhausted;
			};
			let next = last.native_id();
			debug!(
				"Page {} for {}: {} records, next cursor {:?}",
				pages,
				address,
				page.len(),
				next
			);
			transactions.extend(page);

			match next {
				None => {
					warn!("Last record of page {} for {} has no id", pages, address);
					break PaginationStop::CursorMissing;
				}
				Some(id) if Some(id) == cursor.id() => {
					warn!("Cursor {} did not advance for {}", id, address);
					break PaginationStop::CursorStalled;
				}
				Some(id) => cursor = cursor.advance(id),
			}
		};

		Ok(PaginationOutcome {
			transactions,
			pages,
			stop,
		})
	}
}
