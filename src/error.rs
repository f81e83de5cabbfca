//! Error types for the mandi price sync.
//!
//! `UpstreamUnavailable` is the only error that aborts a run. Row-level
//! problems surface as `RecordRejection` and are counted, never thrown past
//! the sync service.

use rust_decimal::Decimal;
use sea_orm::DbErr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("malformed record: {0}")]
    MalformedRecord(#[from] RecordRejection),

    #[error("persistence failure: {0}")]
    PersistenceFailure(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl From<DbErr> for SyncError {
    fn from(err: DbErr) -> Self {
        SyncError::PersistenceFailure(err.to_string())
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        SyncError::UpstreamUnavailable(err.to_string())
    }
}

/// Why a single feed row was dropped during ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordRejection {
    #[error("row is not a JSON object")]
    NotAnObject,

    #[error("row could not be decoded: {0}")]
    Undecodable(String),

    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("field '{field}' is not a number: {value}")]
    InvalidPrice { field: &'static str, value: String },

    #[error("field '{field}' is negative")]
    NegativePrice { field: &'static str },

    #[error("unrecognised date '{0}'")]
    InvalidDate(String),

    #[error("state '{0}' is not in the priority list")]
    OutsideAllowList(String),

    #[error("price ordering violated: min={min:?} modal={modal} max={max:?}")]
    PriceOrder {
        min: Option<Decimal>,
        modal: Decimal,
        max: Option<Decimal>,
    },
}

impl RecordRejection {
    /// Bucket used by the run summary.
    pub fn kind(&self) -> RejectionKind {
        match self {
            RecordRejection::OutsideAllowList(_) => RejectionKind::OutsideAllowList,
            RecordRejection::PriceOrder { .. } => RejectionKind::PriceOrder,
            _ => RejectionKind::Malformed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionKind {
    Malformed,
    OutsideAllowList,
    PriceOrder,
}
