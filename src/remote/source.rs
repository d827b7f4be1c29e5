use chrono::NaiveDate;

use crate::model::row::RowFields;

/// Remote-assigned identifier for an item.
pub type RemoteId = String;

/// One item as the remote reports it. Mapping from any concrete wire format
/// happens inside the `RemoteSource` implementation.
#[derive(Debug, Clone)]
pub struct RawItem {
    pub remote_id: RemoteId,
    pub group: String,
    pub order: f64,
    pub fields: RowFields,
}

/// A mutation expressed generically; each source interprets it for its own
/// wire shape.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteOp {
    Complete,
    Reopen,
    SetDue { date: Option<NaiveDate> },
    Delete,
    SetState { state: String },
    Assign { assignee: Option<String> },
    SetOrder { order: f64 },
    Abandon,
    Restore,
}

/// Error type for remote calls. Both variants roll back local state; the
/// core never retries.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RemoteError {
    /// Network failure or timeout; the remote may not have seen the request.
    #[error("remote unavailable: {0}")]
    Unavailable(String),
    /// The remote understood and refused (validation failure, unknown id).
    #[error("remote rejected request: {0}")]
    Rejected(String),
}

/// Capability interface one panel consumes. Implementations own transport,
/// field mapping, and timeouts; the core only ever sees success or failure.
pub trait RemoteSource: Send + Sync {
    fn fetch_all(&self) -> Result<Vec<RawItem>, RemoteError>;

    fn create(&self, fields: &RowFields, group: &str, order: f64) -> Result<RemoteId, RemoteError>;

    fn mutate(&self, id: &RemoteId, op: &RemoteOp) -> Result<(), RemoteError>;
}
