use std::time::Duration;
use thiserror::Error;

use super::types::{Status, TransactionId};

/// Failure of a remote ledger call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Ledger unavailable: {0}")]
    Unavailable(String),
    #[error("Transaction {transaction_id} rejected with {status}")]
    Rejected {
        transaction_id: TransactionId,
        status: Status,
    },
    #[error("Precheck failed with {0}")]
    PrecheckFailed(Status),
    #[error("Invalid token spec: {0}")]
    InvalidSpec(Status),
}

impl LedgerError {
    /// Transport failures worth retrying for idempotent reads
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Timeout(_) | LedgerError::Unavailable(_))
    }

    /// For a mutation, the network may or may not have applied it
    pub fn is_indeterminate(&self) -> bool {
        self.is_retryable()
    }

    /// Status code reported by the network, if any
    pub fn status(&self) -> Option<Status> {
        match self {
            LedgerError::Rejected { status, .. } => Some(*status),
            LedgerError::PrecheckFailed(status) | LedgerError::InvalidSpec(status) => {
                Some(*status)
            }
            LedgerError::Timeout(_) | LedgerError::Unavailable(_) => None,
        }
    }
}
