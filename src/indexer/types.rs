//! Types for the ledger indexer REST API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use tracing::warn;

/// Kind of on-chain account as reported by the indexer
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    /// Implicit account controlled by a key
    User,
    /// Implicit account registered as a baker
    Delegate,
    /// Originated smart contract
    Contract,
    /// Address that has never appeared on chain
    Empty,
    /// Any kind this client does not know yet
    #[serde(other)]
    Other,
}

impl AccountKind {
    /// Whether the address has any on-chain presence
    pub fn exists(&self) -> bool {
        !matches!(self, AccountKind::Empty)
    }

    /// Whether the operation history of this kind of account is synchronized
    pub fn has_history(&self) -> bool {
        matches!(self, AccountKind::User | AccountKind::Delegate)
    }
}

/// Account summary returned by the indexer.
///
/// The remote is authoritative for balance and counters; nothing here is derived from the
/// operation history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    /// The account kind (`user`, `delegate`, `contract`, `empty`).
    #[serde(rename = "type")]
    pub kind: AccountKind,
    /// Balance in the ledger's smallest unit.
    #[serde(default)]
    pub balance: u64,
    /// Whether the account's public key has been revealed on chain.
    #[serde(default)]
    pub revealed: bool,
    /// Current operation counter of the account.
    #[serde(default)]
    pub counter: u64,
    /// Revealed public key, when known to the indexer.
    #[serde(default)]
    pub public_key: Option<String>,
}

/// Reference to an address inside an indexer record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AddressRef {
    pub address: String,
    #[serde(default)]
    pub alias: Option<String>,
}

/// Fields shared by every operation kind returned by the indexer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OperationHeader {
    /// The indexer's own id for the record, used as the pagination cursor.
    #[serde(default)]
    pub id: Option<u64>,
    /// Block level the operation was included at.
    pub level: u64,
    /// Hash of the including block.
    #[serde(default)]
    pub block: Option<String>,
    /// Timestamp of the including block.
    pub timestamp: DateTime<Utc>,
    /// Operation group hash. Protocol migrations have none.
    #[serde(default)]
    pub hash: Option<String>,
    /// Application status (`applied`, `failed`, `backtracked`, `skipped`).
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub baker_fee: u64,
    #[serde(default)]
    pub storage_fee: u64,
    #[serde(default)]
    pub allocation_fee: u64,
    #[serde(default)]
    pub gas_limit: Option<u64>,
    #[serde(default)]
    pub storage_limit: Option<u64>,
}

impl OperationHeader {
    /// An operation without a status is treated as applied
    pub fn has_failed(&self) -> bool {
        self.status.as_deref().is_some_and(|status| status != "applied")
    }
}

/// A value transfer, possibly initiated by a contract on behalf of the account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TransferOperation {
    #[serde(flatten)]
    pub header: OperationHeader,
    #[serde(default)]
    pub initiator: Option<AddressRef>,
    #[serde(default)]
    pub sender: Option<AddressRef>,
    #[serde(default)]
    pub target: Option<AddressRef>,
    #[serde(default)]
    pub amount: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DelegationOperation {
    #[serde(flatten)]
    pub header: OperationHeader,
    /// Absent when the operation removes the delegate.
    #[serde(default)]
    pub new_delegate: Option<AddressRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RevealOperation {
    #[serde(flatten)]
    pub header: OperationHeader,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MigrationOperation {
    #[serde(flatten)]
    pub header: OperationHeader,
    /// Signed balance change applied by the protocol.
    #[serde(default)]
    pub balance_change: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OriginationOperation {
    #[serde(flatten)]
    pub header: OperationHeader,
    #[serde(default)]
    pub contract_balance: u64,
    /// Missing when the origination failed.
    #[serde(default)]
    pub originated_contract: Option<AddressRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ActivationOperation {
    #[serde(flatten)]
    pub header: OperationHeader,
    #[serde(default)]
    pub balance: u64,
}

/// Operation kind the client does not understand. Only the cursor id is kept so pagination
/// can move past it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnsupportedOperation {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub id: Option<u64>,
}

/// One raw record from the account operations endpoint, tagged on its `type` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawTransaction {
    Transaction(TransferOperation),
    Delegation(DelegationOperation),
    Reveal(RevealOperation),
    Migration(MigrationOperation),
    Origination(OriginationOperation),
    Activation(ActivationOperation),
    Unsupported(UnsupportedOperation),
}

impl RawTransaction {
    /// Shared header, `None` for unsupported kinds
    pub fn header(&self) -> Option<&OperationHeader> {
        match self {
            RawTransaction::Transaction(op) => Some(&op.header),
            RawTransaction::Delegation(op) => Some(&op.header),
            RawTransaction::Reveal(op) => Some(&op.header),
            RawTransaction::Migration(op) => Some(&op.header),
            RawTransaction::Origination(op) => Some(&op.header),
            RawTransaction::Activation(op) => Some(&op.header),
            RawTransaction::Unsupported(_) => None,
        }
    }

    /// The indexer id of the record, used to advance the pagination cursor
    pub fn native_id(&self) -> Option<u64> {
        match self {
            RawTransaction::Unsupported(op) => op.id,
            other => other.header().and_then(|header| header.id),
        }
    }

    pub fn kind(&self) -> &str {
        match self {
            RawTransaction::Transaction(_) => "transaction",
            RawTransaction::Delegation(_) => "delegation",
            RawTransaction::Reveal(_) => "reveal",
            RawTransaction::Migration(_) => "migration",
            RawTransaction::Origination(_) => "origination",
            RawTransaction::Activation(_) => "activation",
            RawTransaction::Unsupported(op) => &op.kind,
        }
    }
}

/// Position and direction of one page request on the account operations endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageCursor {
    /// The newest records, newest first
    Newest,
    /// Records older than the given id, newest first
    Before(u64),
    /// Records newer than the given id, oldest first
    After(u64),
}

impl PageCursor {
    /// The native id the page is positioned on, if any
    pub fn id(&self) -> Option<u64> {
        match self {
            PageCursor::Newest => None,
            PageCursor::Before(id) | PageCursor::After(id) => Some(*id),
        }
    }

    /// Cursor for the page following one that ended on `id`, in the same direction
    pub fn advance(&self, id: u64) -> PageCursor {
        match self {
            PageCursor::Newest | PageCursor::Before(_) => PageCursor::Before(id),
            PageCursor::After(_) => PageCursor::After(id),
        }
    }

    pub fn is_descending(&self) -> bool {
        !matches!(self, PageCursor::After(_))
    }
}

impl<'de> Deserialize<'de> for RawTransaction {
    /// Never fails on a single record: unknown tags and known tags whose body does not decode
    /// both become `Unsupported`, keeping the id so pagination can move past them.
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        let kind = value
            .get("type")
            .and_then(|kind| kind.as_str())
            .unwrap_or_default()
            .to_owned();
        let id = value.get("id").and_then(|id| id.as_u64());

        let parsed = match kind.as_str() {
            "transaction" => serde_json::from_value(value).map(RawTransaction::Transaction),
            "delegation" => serde_json::from_value(value).map(RawTransaction::Delegation),
            "reveal" => serde_json::from_value(value).map(RawTransaction::Reveal),
            "migration" => serde_json::from_value(value).map(RawTransaction::Migration),
            "origination" => serde_json::from_value(value).map(RawTransaction::Origination),
            "activation" => serde_json::from_value(value).map(RawTransaction::Activation),
            _ => {
                return Ok(RawTransaction::Unsupported(UnsupportedOperation {
                    kind: kind.clone(),
                    id,
                }));
            }
        };

        Ok(parsed.unwrap_or_else(|e| {
            warn!("Undecodable '{}' record (id {:?}): {}", kind, id, e);
            RawTransaction::Unsupported(UnsupportedOperation { kind, id })
        }))
    }
}

/// Error types for indexer requests.
///
/// Cloneable so a single failed request can be handed to every caller waiting on it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum IndexerError {
    #[error("HTTP error: {0}")]
    HttpError(Arc<reqwest::Error>),

    #[error("HTTP status {status} from {url}")]
    StatusError { status: u16, url: String },

    #[error("JSON parse error: {0}")]
    JsonError(Arc<serde_json::Error>),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Unsupported request: {0}")]
    Unsupported(String),
}

impl IndexerError {
    /// Whether retrying the same request later may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            IndexerError::HttpError(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            IndexerError::StatusError { status, .. } => *status == 429 || *status >= 500,
            IndexerError::JsonError(_)
            | IndexerError::MalformedResponse(_)
            | IndexerError::Unsupported(_) => false,
        }
    }
}

impl From<reqwest::Error> for IndexerError {
    fn from(e: reqwest::Error) -> Self {
        IndexerError::HttpError(Arc::new(e))
    }
}

impl From<serde_json::Error> for IndexerError {
    fn from(e: serde_json::Error) -> Self {
        IndexerError::JsonError(Arc::new(e))
    }
}
