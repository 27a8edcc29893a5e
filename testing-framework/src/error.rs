use std::time::Duration;
use thiserror::Error;

use crate::accounts::AccountError;
use crate::assertions::AssertionFailure;
use crate::ledger::{AmountOutOfRange, LedgerError, Status};

/// Why a step did not pass
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StepError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Assertion(#[from] AssertionFailure),
    #[error("Step is pending: {0}")]
    Pending(String),
    #[error("Step timed out after {0:?}")]
    Timeout(Duration),
    #[error("Invalid step argument: {0}")]
    Argument(String),
    #[error("Invalid scenario state: {0}")]
    State(String),
    #[error(transparent)]
    Account(#[from] AccountError),
}

impl From<AmountOutOfRange> for StepError {
    fn from(error: AmountOutOfRange) -> Self {
        StepError::Argument(error.to_string())
    }
}

impl StepError {
    pub fn argument(message: impl Into<String>) -> Self {
        StepError::Argument(message.into())
    }

    pub fn state(message: impl Into<String>) -> Self {
        StepError::State(message.into())
    }

    /// Network status behind a ledger failure
    pub fn status(&self) -> Option<Status> {
        match self {
            StepError::Ledger(e) => e.status(),
            _ => None,
        }
    }
}
