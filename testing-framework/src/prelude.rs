//! Prelude module for convenient imports
//!
//! Import everything you need with:
//! ```rust,ignore
//! use hts_testing_framework::prelude::*;
//! ```

// Re-export orchestrator types
pub use crate::orchestrator::{Clock, PausedClock, SystemClock};

pub use crate::accounts::{AccountContext, AccountId, Ordinal, PrivateKey, TestAccount};
pub use crate::assertions::{assert_at_least, assert_equal, assert_greater, assert_true};
pub use crate::config::HarnessConfig;
pub use crate::error::StepError;

pub use crate::ledger::{
    Hbar, InMemoryLedger, LedgerClient, LedgerError, RetryPolicy, RetryingClient, Status,
    Submission, TokenId, TokenSpec, TokenTransfer, TransactionIdGenerator,
};

pub use crate::scenarios::{
    parse_feature, token_service_steps, RunReport, RunnerSettings, ScenarioRunner, StepRegistry,
    StepStatus,
};

// Re-export commonly used external types
pub use anyhow::{anyhow, Context, Result};
pub use std::path::Path;
pub use std::sync::Arc;
pub use tokio::time::Duration;
