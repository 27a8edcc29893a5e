//! Harness configuration
//!
//! Loaded from a JSON file, then a few settings can be overridden from the
//! environment:
//!
//! - `HTS_TCK_STEP_TIMEOUT_SECS`
//! - `HTS_TCK_MAX_CONCURRENT`

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::accounts::{AccountContext, AccountError, TestAccount};
use crate::ledger::{Hbar, InMemoryLedger, RetryPolicy};
use crate::orchestrator::Clock;

pub const STEP_TIMEOUT_ENV: &str = "HTS_TCK_STEP_TIMEOUT_SECS";
pub const MAX_CONCURRENT_ENV: &str = "HTS_TCK_MAX_CONCURRENT";

/// Only network the bundled binary can run against
pub const LOCAL_NETWORK: &str = "local";

fn default_network() -> String {
    LOCAL_NETWORK.to_owned()
}

fn default_initial_hbar() -> u64 {
    100
}

fn default_step_timeout_secs() -> u64 {
    30
}

fn default_max_concurrent_scenarios() -> usize {
    1
}

fn default_initial_supply() -> u64 {
    1000
}

fn default_decimals() -> u32 {
    2
}

#[derive(Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    pub id: String,
    pub private_key: String,
    /// Hbar the local ledger seeds the account with
    #[serde(default = "default_initial_hbar")]
    pub initial_hbar: u64,
}

impl AccountConfig {
    pub fn to_account(&self) -> Result<TestAccount, AccountError> {
        TestAccount::parse(&self.id, &self.private_key)
    }
}

impl fmt::Debug for AccountConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountConfig")
            .field("id", &self.id)
            .field("private_key", &"<redacted>")
            .field("initial_hbar", &self.initial_hbar)
            .finish()
    }
}

/// Parameters of tokens created without explicit supply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDefaults {
    #[serde(default = "default_initial_supply")]
    pub initial_supply: u64,
    #[serde(default = "default_decimals")]
    pub decimals: u32,
}

impl Default for TokenDefaults {
    fn default() -> Self {
        Self {
            initial_supply: default_initial_supply(),
            decimals: default_decimals(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessConfig {
    #[serde(default = "default_network")]
    pub network: String,
    /// Payer and token treasury; the first account when absent
    #[serde(default)]
    pub operator: Option<AccountConfig>,
    /// Participants in ordinal order
    pub accounts: Vec<AccountConfig>,
    #[serde(default = "default_step_timeout_secs")]
    pub step_timeout_secs: u64,
    #[serde(default = "default_max_concurrent_scenarios")]
    pub max_concurrent_scenarios: usize,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub token_defaults: TokenDefaults,
}

impl HarnessConfig {
    /// Load, apply environment overrides and validate
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config = Self::from_json(&raw)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse without overrides or validation
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("Failed to parse config JSON")
    }

    /// Apply overrides read through `lookup` (the process environment in [`load`](Self::load))
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(value) = lookup(STEP_TIMEOUT_ENV) {
            self.step_timeout_secs = value
                .trim()
                .parse()
                .with_context(|| format!("{} must be a number of seconds", STEP_TIMEOUT_ENV))?;
        }
        if let Some(value) = lookup(MAX_CONCURRENT_ENV) {
            self.max_concurrent_scenarios = value
                .trim()
                .parse()
                .with_context(|| format!("{} must be a positive integer", MAX_CONCURRENT_ENV))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.step_timeout_secs > 0, "step_timeout_secs must be greater than 0");
        ensure!(
            self.max_concurrent_scenarios >= 1,
            "max_concurrent_scenarios must be at least 1"
        );
        ensure!(self.retry.max_attempts >= 1, "retry.max_attempts must be at least 1");
        self.to_account_context()
            .context("Invalid account configuration")?;
        Ok(())
    }

    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs)
    }

    pub fn to_account_context(&self) -> Result<AccountContext, AccountError> {
        let operator = self
            .operator
            .as_ref()
            .map(AccountConfig::to_account)
            .transpose()?;
        let participants = self
            .accounts
            .iter()
            .map(AccountConfig::to_account)
            .collect::<Result<Vec<_>, _>>()?;
        AccountContext::new(operator, participants)
    }

    /// Ledger double seeded with every configured account
    pub fn local_ledger(&self, clock: Arc<dyn Clock>) -> Result<InMemoryLedger> {
        let mut builder = InMemoryLedger::builder().with_clock(clock);
        for entry in self.operator.iter().chain(self.accounts.iter()) {
            let account = entry.to_account()?;
            builder = builder.with_account(&account, Hbar::from_hbars(entry.initial_hbar));
        }
        Ok(builder.build())
    }
}
