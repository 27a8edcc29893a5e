//! Retry decorator for idempotent ledger reads
//!
//! Balance, token info and receipt queries are safe to repeat, so transport
//! failures on them are retried with exponential backoff. Mutations are
//! forwarded untouched: resubmitting one could apply it twice.

use async_trait::async_trait;
use log::{debug, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::{
    AccountBalance, LedgerClient, LedgerError, Submission, TokenId, TokenInfo, TokenSpec,
    TokenTransfer, TransactionId, TransactionReceipt,
};
use crate::accounts::AccountId;
use crate::orchestrator::Clock;

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    200
}

fn default_max_backoff_ms() -> u64 {
    2_000
}

fn default_jitter() -> bool {
    true
}

/// Backoff configuration for read retries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Add up to 10% random delay to each backoff
    #[serde(default = "default_jitter")]
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            jitter: default_jitter(),
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (1-based), without jitter
    pub fn base_backoff(&self, retry: u32) -> Duration {
        let factor = 1u64.checked_shl(retry.saturating_sub(1)).unwrap_or(u64::MAX);
        let ms = self
            .initial_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }

    fn backoff(&self, retry: u32) -> Duration {
        let base = self.base_backoff(retry);
        if !self.jitter {
            return base;
        }

        let max_jitter = base.as_millis() as u64 / 10;
        if max_jitter == 0 {
            return base;
        }
        base + Duration::from_millis(rand::thread_rng().gen_range(0..=max_jitter))
    }
}

/// Wraps a client and retries its idempotent reads
pub struct RetryingClient<C> {
    inner: C,
    policy: RetryPolicy,
    clock: Arc<dyn Clock>,
}

impl<C: LedgerClient> RetryingClient<C> {
    pub fn new(inner: C, policy: RetryPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner,
            policy,
            clock,
        }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    async fn with_retry<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, LedgerError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LedgerError>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(value) => {
                    if attempt > 1 && log::log_enabled!(log::Level::Debug) {
                        debug!("{} succeeded on attempt {}", operation, attempt);
                    }
                    return Ok(value);
                }
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = self.policy.backoff(attempt);
                    warn!(
                        "{} failed on attempt {}/{}: {}, retrying in {:?}",
                        operation, attempt, max_attempts, e, delay
                    );
                    self.clock.sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl<C: LedgerClient> LedgerClient for RetryingClient<C> {
    async fn query_balance(&self, account: &AccountId) -> Result<AccountBalance, LedgerError> {
        self.with_retry("query_balance", || self.inner.query_balance(account))
            .await
    }

    async fn create_token(
        &self,
        submission: &Submission,
        spec: &TokenSpec,
    ) -> Result<TransactionReceipt, LedgerError> {
        self.inner.create_token(submission, spec).await
    }

    async fn mint_token(
        &self,
        submission: &Submission,
        token: &TokenId,
        amount: u64,
    ) -> Result<TransactionReceipt, LedgerError> {
        self.inner.mint_token(submission, token, amount).await
    }

    async fn associate_token(
        &self,
        submission: &Submission,
        account: &AccountId,
        tokens: &[TokenId],
    ) -> Result<TransactionReceipt, LedgerError> {
        self.inner.associate_token(submission, account, tokens).await
    }

    async fn transfer_token(
        &self,
        submission: &Submission,
        token: &TokenId,
        transfers: &[TokenTransfer],
    ) -> Result<TransactionReceipt, LedgerError> {
        self.inner.transfer_token(submission, token, transfers).await
    }

    async fn get_token_info(&self, token: &TokenId) -> Result<TokenInfo, LedgerError> {
        self.with_retry("get_token_info", || self.inner.get_token_info(token))
            .await
    }

    async fn get_receipt(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<TransactionReceipt, LedgerError> {
        self.with_retry("get_receipt", || self.inner.get_receipt(transaction_id))
            .await
    }
}
