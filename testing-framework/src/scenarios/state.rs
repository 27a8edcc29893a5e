//! Per-scenario mutable state
//!
//! Created empty when a scenario starts and dropped when it ends. Nothing
//! here is shared with another scenario.

use crate::accounts::{AccountId, PrivateKey};
use crate::error::StepError;
use crate::ledger::{
    AccountBalance, Hbar, LedgerError, TokenId, TokenInfo, TokenTransfer, TransactionReceipt,
};

/// Transfer built by a `When` step, waiting for signatures and submission
#[derive(Debug, Clone)]
pub struct PendingTransfer {
    pub token: TokenId,
    pub transfers: Vec<TokenTransfer>,
    /// Keys of accounts that signed so far
    pub signatures: Vec<PrivateKey>,
}

impl PendingTransfer {
    pub fn new(token: TokenId, transfers: Vec<TokenTransfer>) -> Self {
        Self {
            token,
            transfers,
            signatures: Vec::new(),
        }
    }

    pub fn sign(&mut self, key: &PrivateKey) {
        if !self.signatures.contains(key) {
            self.signatures.push(key.clone());
        }
    }
}

/// Hbar balance of the payer just before it submitted a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeSnapshot {
    pub payer: AccountId,
    pub hbars_before: Hbar,
}

#[derive(Debug, Default)]
pub struct ScenarioState {
    token: Option<TokenId>,
    pub token_info: Option<TokenInfo>,
    pub last_result: Option<Result<TransactionReceipt, LedgerError>>,
    pub last_balance: Option<AccountBalance>,
    pub pending_transfer: Option<PendingTransfer>,
    pub fee_snapshot: Option<FeeSnapshot>,
}

impl ScenarioState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token created by this scenario
    pub fn token(&self) -> Result<TokenId, StepError> {
        self.token
            .ok_or_else(|| StepError::state("no token has been created in this scenario"))
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Record the scenario's token; it can be set once
    pub fn set_token(&mut self, token: TokenId) -> Result<(), StepError> {
        match self.token {
            Some(existing) if existing != token => Err(StepError::state(format!(
                "scenario already uses token {}, cannot switch to {}",
                existing, token
            ))),
            _ => {
                self.token = Some(token);
                Ok(())
            }
        }
    }

    pub fn token_info(&self) -> Result<&TokenInfo, StepError> {
        self.token_info
            .as_ref()
            .ok_or_else(|| StepError::state("no token info has been fetched in this scenario"))
    }

    pub fn pending_transfer_mut(&mut self) -> Result<&mut PendingTransfer, StepError> {
        self.pending_transfer
            .as_mut()
            .ok_or_else(|| StepError::state("no transaction has been created"))
    }

    pub fn take_pending_transfer(&mut self) -> Result<PendingTransfer, StepError> {
        self.pending_transfer
            .take()
            .ok_or_else(|| StepError::state("no transaction has been created"))
    }

    pub fn last_result(&self) -> Result<&Result<TransactionReceipt, LedgerError>, StepError> {
        self.last_result
            .as_ref()
            .ok_or_else(|| StepError::state("no transaction has been submitted"))
    }
}
