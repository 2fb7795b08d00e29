//!
//! Utility module for the account sync client.
//!
//! Re-exports formatting helpers for display of ledger amounts.
/// Utility functions for formatting and display
pub mod index;

pub use index::{TEZ_DECIMALS, format_token_amount};
