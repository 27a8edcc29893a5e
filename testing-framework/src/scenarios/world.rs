//! ScenarioWorld - everything one running scenario can reach
//!
//! Holds the scenario's own [`ScenarioState`] plus shared, read-only handles
//! to the ledger client, the account context and the clock.

use log::debug;
use std::sync::Arc;

use super::state::ScenarioState;
use crate::accounts::{AccountContext, AccountId, Ordinal, PrivateKey, TestAccount};
use crate::assertions::AssertContext;
use crate::config::TokenDefaults;
use crate::error::StepError;
use crate::ledger::{
    submit_reconciled, LedgerClient, LedgerError, Submission, TokenId, TokenSpec, TokenTransfer,
    TransactionId, TransactionIdGenerator, TransactionReceipt,
};
use crate::orchestrator::Clock;

/// A state-changing ledger call
#[derive(Debug, Clone)]
pub enum Mutation {
    CreateToken(TokenSpec),
    Mint {
        token: TokenId,
        amount: u64,
    },
    Associate {
        account: AccountId,
        tokens: Vec<TokenId>,
    },
    Transfer {
        token: TokenId,
        transfers: Vec<TokenTransfer>,
    },
}

impl Mutation {
    fn name(&self) -> &'static str {
        match self {
            Mutation::CreateToken(_) => "create_token",
            Mutation::Mint { .. } => "mint_token",
            Mutation::Associate { .. } => "associate_token",
            Mutation::Transfer { .. } => "transfer_token",
        }
    }
}

/// Handles a scenario shares with every other scenario of the run
#[derive(Clone)]
pub struct WorldHandles {
    pub ledger: Arc<dyn LedgerClient>,
    pub accounts: Arc<AccountContext>,
    pub clock: Arc<dyn Clock>,
    pub transaction_ids: Arc<TransactionIdGenerator>,
    pub token_defaults: TokenDefaults,
}

pub struct ScenarioWorld {
    pub state: ScenarioState,
    handles: WorldHandles,
    scenario: String,
    step: String,
    /// Mutation submitted but not yet answered
    in_flight: Option<TransactionId>,
}

impl ScenarioWorld {
    pub fn new(handles: WorldHandles, scenario: impl Into<String>) -> Self {
        Self {
            state: ScenarioState::new(),
            handles,
            scenario: scenario.into(),
            step: String::new(),
            in_flight: None,
        }
    }

    pub fn ledger(&self) -> &dyn LedgerClient {
        self.handles.ledger.as_ref()
    }

    pub fn accounts(&self) -> &AccountContext {
        &self.handles.accounts
    }

    pub fn operator(&self) -> TestAccount {
        self.handles.accounts.operator().clone()
    }

    pub fn participant(&self, ordinal: Ordinal) -> Result<TestAccount, StepError> {
        Ok(self.handles.accounts.participant(ordinal)?.clone())
    }

    pub fn token_defaults(&self) -> TokenDefaults {
        self.handles.token_defaults
    }

    pub fn scenario_name(&self) -> &str {
        &self.scenario
    }

    pub fn begin_step(&mut self, step: impl Into<String>) {
        self.step = step.into();
    }

    /// Assertion context naming the current scenario and step
    pub fn ctx<'a>(&'a self, subject: &'a str) -> AssertContext<'a> {
        AssertContext::new(&self.scenario, &self.step, subject)
    }

    /// Transaction left unanswered by an interrupted step
    pub fn take_in_flight(&mut self) -> Option<TransactionId> {
        self.in_flight.take()
    }

    /// Sign and submit a mutation paid by `payer`, reconciling lost responses
    ///
    /// The outcome is recorded as the scenario's last transaction result.
    pub async fn execute(
        &mut self,
        payer: &TestAccount,
        signers: &[PrivateKey],
        mutation: Mutation,
    ) -> Result<TransactionReceipt, LedgerError> {
        let transaction_id = self
            .handles
            .transaction_ids
            .generate(payer.id, self.handles.clock.as_ref());

        let mut keys = vec![payer.key.clone()];
        for key in signers {
            if !keys.contains(key) {
                keys.push(key.clone());
            }
        }
        let submission = Submission::new(transaction_id, keys);
        let ledger = self.handles.ledger.clone();

        if log::log_enabled!(log::Level::Debug) {
            debug!(
                "[{}] submitting {} as {}",
                self.scenario,
                mutation.name(),
                transaction_id
            );
        }

        self.in_flight = Some(transaction_id);
        let call = async {
            match &mutation {
                Mutation::CreateToken(spec) => ledger.create_token(&submission, spec).await,
                Mutation::Mint { token, amount } => {
                    ledger.mint_token(&submission, token, *amount).await
                }
                Mutation::Associate { account, tokens } => {
                    ledger.associate_token(&submission, account, tokens).await
                }
                Mutation::Transfer { token, transfers } => {
                    ledger.transfer_token(&submission, token, transfers).await
                }
            }
        };
        let result = submit_reconciled(ledger.as_ref(), transaction_id, call).await;
        self.in_flight = None;

        if let Err(e) = &result {
            debug!("[{}] {} failed: {}", self.scenario, transaction_id, e);
        }
        self.state.last_result = Some(result.clone());
        result
    }
}
