// File: testing-framework/src/ledger/mod.rs
//
// Ledger Client Adapter
//
// The harness talks to the ledger network only through the `LedgerClient`
// trait, so scenarios are not hard-wired to one SDK or transport.

pub mod error;
pub mod in_memory;
pub mod reconcile;
pub mod retry;
pub mod types;

pub use error::LedgerError;
pub use in_memory::{FeeSchedule, InMemoryLedger, InMemoryLedgerBuilder};
pub use reconcile::submit_reconciled;
pub use retry::{RetryPolicy, RetryingClient};
pub use types::{
    AccountBalance, AmountOutOfRange, Hbar, Status, TokenId, TokenInfo, TokenSpec, TokenSupplyType, TokenTransfer,
    TransactionId, TransactionIdGenerator, TransactionReceipt,
};

use crate::accounts::{AccountId, KeyFingerprint, PrivateKey};
use async_trait::async_trait;
use std::sync::Arc;

/// Everything the network needs to authorize a mutation
///
/// The payer is the account of the transaction id; every key that signed
/// the transaction is listed in `signers`.
#[derive(Debug, Clone)]
pub struct Submission {
    pub transaction_id: TransactionId,
    pub signers: Vec<PrivateKey>,
}

impl Submission {
    pub fn new(transaction_id: TransactionId, signers: Vec<PrivateKey>) -> Self {
        Self {
            transaction_id,
            signers,
        }
    }

    pub fn payer(&self) -> AccountId {
        self.transaction_id.payer
    }

    /// Whether a key with this fingerprint signed the transaction
    pub fn is_signed_by(&self, key: &KeyFingerprint) -> bool {
        self.signers.iter().any(|k| k.fingerprint() == *key)
    }
}

/// Remote operations of the token service.
///
/// Mutations are never idempotent: implementations must not retry them and
/// callers must not resubmit the same transaction id.
///
/// # Errors
///
/// Every method fails with [`LedgerError`]. A mutation the network refused
/// after consensus is [`LedgerError::Rejected`] and carries its status.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Hbar and token balances of an account
    async fn query_balance(&self, account: &AccountId) -> Result<AccountBalance, LedgerError>;

    /// Create a fungible token; the receipt carries the new token id
    async fn create_token(
        &self,
        submission: &Submission,
        spec: &TokenSpec,
    ) -> Result<TransactionReceipt, LedgerError>;

    /// Mint `amount` units; the receipt carries the new total supply
    async fn mint_token(
        &self,
        submission: &Submission,
        token: &TokenId,
        amount: u64,
    ) -> Result<TransactionReceipt, LedgerError>;

    /// Associate `account` with each of `tokens`
    async fn associate_token(
        &self,
        submission: &Submission,
        account: &AccountId,
        tokens: &[TokenId],
    ) -> Result<TransactionReceipt, LedgerError>;

    /// Move `token` between accounts; amounts must net to zero
    async fn transfer_token(
        &self,
        submission: &Submission,
        token: &TokenId,
        transfers: &[TokenTransfer],
    ) -> Result<TransactionReceipt, LedgerError>;

    async fn get_token_info(&self, token: &TokenId) -> Result<TokenInfo, LedgerError>;

    /// Receipt of a previously submitted transaction, whatever its status
    async fn get_receipt(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<TransactionReceipt, LedgerError>;
}

#[async_trait]
impl<T: LedgerClient + ?Sized> LedgerClient for Arc<T> {
    async fn query_balance(&self, account: &AccountId) -> Result<AccountBalance, LedgerError> {
        (**self).query_balance(account).await
    }

    async fn create_token(
        &self,
        submission: &Submission,
        spec: &TokenSpec,
    ) -> Result<TransactionReceipt, LedgerError> {
        (**self).create_token(submission, spec).await
    }

    async fn mint_token(
        &self,
        submission: &Submission,
        token: &TokenId,
        amount: u64,
    ) -> Result<TransactionReceipt, LedgerError> {
        (**self).mint_token(submission, token, amount).await
    }

    async fn associate_token(
        &self,
        submission: &Submission,
        account: &AccountId,
        tokens: &[TokenId],
    ) -> Result<TransactionReceipt, LedgerError> {
        (**self).associate_token(submission, account, tokens).await
    }

    async fn transfer_token(
        &self,
        submission: &Submission,
        token: &TokenId,
        transfers: &[TokenTransfer],
    ) -> Result<TransactionReceipt, LedgerError> {
        (**self).transfer_token(submission, token, transfers).await
    }

    async fn get_token_info(&self, token: &TokenId) -> Result<TokenInfo, LedgerError> {
        (**self).get_token_info(token).await
    }

    async fn get_receipt(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<TransactionReceipt, LedgerError> {
        (**self).get_receipt(transaction_id).await
    }
}
