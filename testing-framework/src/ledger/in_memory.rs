//! InMemoryLedger - in-process ledger double for harness testing
//!
//! Implements [`LedgerClient`] with the token service's business rules so
//! scenarios can run without a live network: treasury and supply keys,
//! association, finite supply caps, zero-sum and atomic transfers, payer
//! fees, duplicate transaction detection and receipts.
//!
//! Keys are never verified cryptographically. A submission is considered
//! signed by an account when one of its keys has the account's fingerprint.
//!
//! # Example
//!
//! ```rust,ignore
//! use hts_testing_framework::ledger::{Hbar, InMemoryLedger};
//!
//! let ledger = InMemoryLedger::builder()
//!     .with_clock(clock)
//!     .with_account(&operator, Hbar::from_hbars(1_000))
//!     .with_account(&alice, Hbar::from_hbars(100))
//!     .build();
//!
//! let balance = ledger.query_balance(&alice.id).await?;
//! ```

use async_trait::async_trait;
use indexmap::IndexMap;
use log::{debug, trace};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use super::types::net_amount;
use super::{
    AccountBalance, Hbar, LedgerClient, LedgerError, Status, Submission, TokenId, TokenInfo,
    TokenSpec, TokenSupplyType, TokenTransfer, TransactionId, TransactionReceipt,
};
use crate::accounts::{AccountId, KeyFingerprint, TestAccount};
use crate::orchestrator::{Clock, SystemClock};

/// Account credited with every transaction fee
pub const FEE_COLLECTOR: AccountId = AccountId::from_num(98);

/// Highest supply the network accepts for any token
pub const MAX_TOKEN_SUPPLY: u64 = i64::MAX as u64;

/// First entity number handed out to created tokens
const FIRST_TOKEN_NUM: u64 = 1_001;

/// Timeout reported when a response is dropped by fault injection
const DROPPED_RESPONSE_TIMEOUT: Duration = Duration::from_secs(10);

/// Transaction fees charged to the payer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeSchedule {
    pub token_create: Hbar,
    pub token_mint: Hbar,
    pub token_associate: Hbar,
    pub token_transfer: Hbar,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            token_create: Hbar::from_hbars(1),
            token_mint: Hbar::from_tinybars(100_000),
            token_associate: Hbar::from_tinybars(5_000_000),
            token_transfer: Hbar::from_tinybars(100_000),
        }
    }
}

struct AccountRecord {
    key: KeyFingerprint,
    hbars: Hbar,
    /// Associated tokens and balances
    tokens: IndexMap<TokenId, u64>,
}

struct TokenRecord {
    info: TokenInfo,
    supply_key: Option<KeyFingerprint>,
}

#[derive(Default)]
struct Faults {
    failing_reads: u32,
    drop_next_response: bool,
    latency: Option<Duration>,
}

/// Extra receipt fields set by a successful mutation
#[derive(Default)]
struct Applied {
    token_id: Option<TokenId>,
    total_supply: Option<u64>,
}

struct LedgerState {
    accounts: HashMap<AccountId, AccountRecord>,
    tokens: HashMap<TokenId, TokenRecord>,
    receipts: HashMap<TransactionId, TransactionReceipt>,
    next_token_num: u64,
    faults: Faults,
}

impl LedgerState {
    fn account(&self, id: &AccountId) -> Result<&AccountRecord, Status> {
        self.accounts.get(id).ok_or(Status::InvalidAccountId)
    }

    fn account_mut(&mut self, id: &AccountId) -> Result<&mut AccountRecord, Status> {
        self.accounts.get_mut(id).ok_or(Status::InvalidAccountId)
    }

    fn token(&self, id: &TokenId) -> Result<&TokenRecord, Status> {
        self.tokens.get(id).ok_or(Status::InvalidTokenId)
    }

    fn create_token(&mut self, submission: &Submission, spec: &TokenSpec) -> Result<Applied, Status> {
        let treasury_key = self.account(&spec.treasury)?.key;
        if !submission.is_signed_by(&treasury_key) {
            return Err(Status::InvalidSignature);
        }

        let token_id = TokenId::from_num(self.next_token_num);
        self.next_token_num += 1;

        let info = TokenInfo {
            token_id,
            name: spec.name.clone(),
            symbol: spec.symbol.clone(),
            decimals: spec.decimals,
            treasury: spec.treasury,
            supply_type: spec.supply_type,
            max_supply: spec.max_supply,
            total_supply: spec.initial_supply,
        };
        self.tokens.insert(
            token_id,
            TokenRecord {
                info,
                supply_key: spec.supply_key,
            },
        );
        self.account_mut(&spec.treasury)?
            .tokens
            .insert(token_id, spec.initial_supply);

        Ok(Applied {
            token_id: Some(token_id),
            ..Applied::default()
        })
    }

    fn mint_token(
        &mut self,
        submission: &Submission,
        token_id: &TokenId,
        amount: u64,
    ) -> Result<Applied, Status> {
        let record = self.token(token_id)?;
        let supply_key = record.supply_key.ok_or(Status::TokenHasNoSupplyKey)?;
        if !submission.is_signed_by(&supply_key) {
            return Err(Status::InvalidSignature);
        }

        let ceiling = match record.info.supply_type {
            TokenSupplyType::Finite => record.info.max_supply.unwrap_or(0),
            TokenSupplyType::Infinite => MAX_TOKEN_SUPPLY,
        };
        let new_supply = record
            .info
            .total_supply
            .checked_add(amount)
            .filter(|supply| *supply <= ceiling)
            .ok_or(Status::TokenMaxSupplyReached)?;
        let treasury = record.info.treasury;

        if let Some(record) = self.tokens.get_mut(token_id) {
            record.info.total_supply = new_supply;
        }
        let treasury_balance = self
            .account_mut(&treasury)?
            .tokens
            .entry(*token_id)
            .or_insert(0);
        *treasury_balance += amount;

        Ok(Applied {
            total_supply: Some(new_supply),
            ..Applied::default()
        })
    }

    fn associate_token(
        &mut self,
        submission: &Submission,
        account_id: &AccountId,
        tokens: &[TokenId],
    ) -> Result<Applied, Status> {
        let account = self.account(account_id)?;
        if !submission.is_signed_by(&account.key) {
            return Err(Status::InvalidSignature);
        }
        for token in tokens {
            self.token(token)?;
            if account.tokens.contains_key(token) {
                return Err(Status::TokenAlreadyAssociatedToAccount);
            }
        }

        let account = self.account_mut(account_id)?;
        for token in tokens {
            account.tokens.insert(*token, 0);
        }
        Ok(Applied::default())
    }

    fn transfer_token(
        &mut self,
        submission: &Submission,
        token_id: &TokenId,
        transfers: &[TokenTransfer],
    ) -> Result<Applied, Status> {
        self.token(token_id)?;

        // Validate every leg before touching any balance
        for leg in transfers {
            let account = self.account(&leg.account)?;
            let balance = *account
                .tokens
                .get(token_id)
                .ok_or(Status::TokenNotAssociatedToAccount)?;

            if leg.amount < 0 {
                if !submission.is_signed_by(&account.key) {
                    return Err(Status::InvalidSignature);
                }
                if balance < leg.amount.unsigned_abs() {
                    return Err(Status::InsufficientTokenBalance);
                }
            }
        }

        for leg in transfers {
            let balance = self
                .account_mut(&leg.account)?
                .tokens
                .entry(*token_id)
                .or_insert(0);
            if leg.amount < 0 {
                *balance -= leg.amount.unsigned_abs();
            } else {
                *balance += leg.amount as u64;
            }
        }
        Ok(Applied::default())
    }
}

/// In-process ledger double
pub struct InMemoryLedger {
    state: Mutex<LedgerState>,
    fees: FeeSchedule,
    clock: Arc<dyn Clock>,
}

impl InMemoryLedger {
    pub fn builder() -> InMemoryLedgerBuilder {
        InMemoryLedgerBuilder::new()
    }

    /// Fail the next `count` reads with a retryable `Unavailable` error
    pub fn fail_next_reads(&self, count: u32) {
        self.state.lock().faults.failing_reads = count;
    }

    /// Apply the next mutation but report a timeout instead of its receipt
    pub fn drop_next_response(&self) {
        self.state.lock().faults.drop_next_response = true;
    }

    /// Delay every response by `latency`
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.state.lock().faults.latency = latency;
    }

    pub fn fee_schedule(&self) -> &FeeSchedule {
        &self.fees
    }

    /// Sum of all account balances of a token
    pub fn circulating_supply(&self, token: &TokenId) -> u64 {
        self.state
            .lock()
            .accounts
            .values()
            .filter_map(|a| a.tokens.get(token))
            .sum()
    }

    async fn simulate_latency(&self) {
        let latency = self.state.lock().faults.latency;
        if let Some(latency) = latency {
            self.clock.sleep(latency).await;
        }
    }

    async fn read<T>(
        &self,
        operation: &str,
        query: impl FnOnce(&LedgerState) -> Result<T, Status>,
    ) -> Result<T, LedgerError> {
        self.simulate_latency().await;

        let mut state = self.state.lock();
        if state.faults.failing_reads > 0 {
            state.faults.failing_reads -= 1;
            return Err(LedgerError::Unavailable(format!(
                "injected failure for {}",
                operation
            )));
        }
        if log::log_enabled!(log::Level::Trace) {
            trace!("{}", operation);
        }
        query(&*state).map_err(LedgerError::PrecheckFailed)
    }

    async fn execute(
        &self,
        submission: &Submission,
        fee: Hbar,
        apply: impl FnOnce(&mut LedgerState) -> Result<Applied, Status>,
    ) -> Result<TransactionReceipt, LedgerError> {
        let transaction_id = submission.transaction_id;
        let (receipt, dropped) = {
            let mut state = self.state.lock();
            if state.receipts.contains_key(&transaction_id) {
                return Err(LedgerError::PrecheckFailed(Status::DuplicateTransaction));
            }

            let payer = state
                .accounts
                .get_mut(&transaction_id.payer)
                .ok_or(LedgerError::PrecheckFailed(Status::InvalidAccountId))?;
            if !submission.is_signed_by(&payer.key) {
                return Err(LedgerError::PrecheckFailed(Status::InvalidSignature));
            }
            payer.hbars = payer
                .hbars
                .checked_sub(fee)
                .ok_or(LedgerError::PrecheckFailed(Status::InsufficientPayerBalance))?;
            if let Some(collector) = state.accounts.get_mut(&FEE_COLLECTOR) {
                collector.hbars = collector.hbars.saturating_add(fee);
            }

            let receipt = match apply(&mut *state) {
                Ok(applied) => TransactionReceipt {
                    transaction_id,
                    status: Status::Success,
                    token_id: applied.token_id,
                    total_supply: applied.total_supply,
                },
                Err(status) => TransactionReceipt::new(transaction_id, status),
            };
            state.receipts.insert(transaction_id, receipt.clone());
            let dropped = std::mem::take(&mut state.faults.drop_next_response);
            (receipt, dropped)
        };

        // The mutation is applied before the response travels back
        self.simulate_latency().await;

        if log::log_enabled!(log::Level::Debug) {
            debug!(
                "Transaction {} reached consensus with {} (fee {})",
                transaction_id, receipt.status, fee
            );
        }

        if dropped {
            return Err(LedgerError::Timeout(DROPPED_RESPONSE_TIMEOUT));
        }
        if receipt.status.is_success() {
            Ok(receipt)
        } else {
            Err(LedgerError::Rejected {
                transaction_id,
                status: receipt.status,
            })
        }
    }
}

#[async_trait]
impl LedgerClient for InMemoryLedger {
    async fn query_balance(&self, account: &AccountId) -> Result<AccountBalance, LedgerError> {
        self.read("query_balance", |state| {
            let record = state.account(account)?;
            Ok(AccountBalance {
                account: *account,
                hbars: record.hbars,
                tokens: record.tokens.clone(),
            })
        })
        .await
    }

    async fn create_token(
        &self,
        submission: &Submission,
        spec: &TokenSpec,
    ) -> Result<TransactionReceipt, LedgerError> {
        spec.validate().map_err(LedgerError::InvalidSpec)?;
        self.execute(submission, self.fees.token_create, |state| {
            state.create_token(submission, spec)
        })
        .await
    }

    async fn mint_token(
        &self,
        submission: &Submission,
        token: &TokenId,
        amount: u64,
    ) -> Result<TransactionReceipt, LedgerError> {
        if amount == 0 {
            return Err(LedgerError::PrecheckFailed(Status::InvalidTokenMintAmount));
        }
        self.execute(submission, self.fees.token_mint, |state| {
            state.mint_token(submission, token, amount)
        })
        .await
    }

    async fn associate_token(
        &self,
        submission: &Submission,
        account: &AccountId,
        tokens: &[TokenId],
    ) -> Result<TransactionReceipt, LedgerError> {
        self.execute(submission, self.fees.token_associate, |state| {
            state.associate_token(submission, account, tokens)
        })
        .await
    }

    async fn transfer_token(
        &self,
        submission: &Submission,
        token: &TokenId,
        transfers: &[TokenTransfer],
    ) -> Result<TransactionReceipt, LedgerError> {
        if transfers.is_empty() {
            return Err(LedgerError::PrecheckFailed(
                Status::EmptyTokenTransferAccountAmounts,
            ));
        }
        let mut seen = HashSet::new();
        if !transfers.iter().all(|leg| seen.insert(leg.account)) {
            return Err(LedgerError::PrecheckFailed(
                Status::AccountRepeatedInAccountAmounts,
            ));
        }
        if net_amount(transfers) != 0 {
            return Err(LedgerError::PrecheckFailed(
                Status::TransfersNotZeroSumForToken,
            ));
        }

        self.execute(submission, self.fees.token_transfer, |state| {
            state.transfer_token(submission, token, transfers)
        })
        .await
    }

    async fn get_token_info(&self, token: &TokenId) -> Result<TokenInfo, LedgerError> {
        self.read("get_token_info", |state| Ok(state.token(token)?.info.clone()))
            .await
    }

    async fn get_receipt(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<TransactionReceipt, LedgerError> {
        self.read("get_receipt", |state| {
            state
                .receipts
                .get(transaction_id)
                .cloned()
                .ok_or(Status::ReceiptNotFound)
        })
        .await
    }
}

/// Builder for [`InMemoryLedger`]
///
/// Default configuration:
/// - SystemClock (real time)
/// - default fee schedule
/// - no accounts besides the fee collector
pub struct InMemoryLedgerBuilder {
    clock: Option<Arc<dyn Clock>>,
    accounts: Vec<(AccountId, KeyFingerprint, Hbar)>,
    fees: FeeSchedule,
}

impl InMemoryLedgerBuilder {
    pub fn new() -> Self {
        Self {
            clock: None,
            accounts: Vec::new(),
            fees: FeeSchedule::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Register an account holding `hbars`
    pub fn with_account(mut self, account: &TestAccount, hbars: Hbar) -> Self {
        self.accounts
            .push((account.id, account.key.fingerprint(), hbars));
        self
    }

    pub fn build(self) -> InMemoryLedger {
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let mut accounts = HashMap::new();
        // No key hashes to the all-zero fingerprint
        accounts.insert(
            FEE_COLLECTOR,
            AccountRecord {
                key: KeyFingerprint::from_bytes([0; 32]),
                hbars: Hbar::ZERO,
                tokens: IndexMap::new(),
            },
        );

        let mut highest_num = 0;
        for (id, key, hbars) in self.accounts {
            highest_num = highest_num.max(id.num);
            accounts.insert(
                id,
                AccountRecord {
                    key,
                    hbars,
                    tokens: IndexMap::new(),
                },
            );
        }

        InMemoryLedger {
            state: Mutex::new(LedgerState {
                accounts,
                tokens: HashMap::new(),
                receipts: HashMap::new(),
                next_token_num: FIRST_TOKEN_NUM.max(highest_num + 1),
                faults: Faults::default(),
            }),
            fees: self.fees,
            clock,
        }
    }
}

impl Default for InMemoryLedgerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::TransactionIdGenerator;
    use crate::orchestrator::PausedClock;

    struct Fixture {
        clock: Arc<PausedClock>,
        ids: TransactionIdGenerator,
        ledger: InMemoryLedger,
        operator: TestAccount,
        alice: TestAccount,
        bob: TestAccount,
    }

    fn account(num: u64, byte: u8) -> TestAccount {
        TestAccount::parse(&format!("0.0.{}", num), &hex::encode([byte; 32])).unwrap()
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(PausedClock::new());
        let operator = account(2, 2);
        let alice = account(1001, 11);
        let bob = account(1002, 12);
        let ledger = InMemoryLedger::builder()
            .with_clock(clock.clone())
            .with_account(&operator, Hbar::from_hbars(1_000))
            .with_account(&alice, Hbar::from_hbars(100))
            .with_account(&bob, Hbar::from_hbars(100))
            .build();

        Fixture {
            clock,
            ids: TransactionIdGenerator::new(),
            ledger,
            operator,
            alice,
            bob,
        }
    }

    impl Fixture {
        fn submission(&self, payer: &TestAccount, extra: &[&TestAccount]) -> Submission {
            let mut signers = vec![payer.key.clone()];
            signers.extend(extra.iter().map(|a| a.key.clone()));
            Submission::new(self.ids.generate(payer.id, self.clock.as_ref()), signers)
        }

        async fn create_htt(&self, max_supply: Option<u64>) -> TokenId {
            let mut builder = TokenSpec::builder("Test Token", "HTT", self.operator.id)
                .decimals(2)
                .initial_supply(1000)
                .supply_key(self.operator.key.fingerprint());
            if let Some(max) = max_supply {
                builder = builder.finite(max);
            }
            let spec = builder.build().unwrap();
            let receipt = self
                .ledger
                .create_token(&self.submission(&self.operator, &[]), &spec)
                .await
                .unwrap();
            receipt.token_id.unwrap()
        }

        async fn associate(&self, account: &TestAccount, token: TokenId) -> Result<TransactionReceipt, LedgerError> {
            self.ledger
                .associate_token(&self.submission(&self.operator, &[account]), &account.id, &[token])
                .await
        }

        async fn balance(&self, account: &TestAccount, token: &TokenId) -> u64 {
            self.ledger.query_balance(&account.id).await.unwrap().token(token)
        }
    }

    #[tokio::test]
    async fn test_create_token_reports_spec_in_info() {
        let f = fixture();
        let token = f.create_htt(Some(1000)).await;

        let info = f.ledger.get_token_info(&token).await.unwrap();
        assert_eq!(info.name, "Test Token");
        assert_eq!(info.symbol, "HTT");
        assert_eq!(info.decimals, 2);
        assert_eq!(info.total_supply, 1000);
        assert_eq!(info.treasury, f.operator.id);
        assert_eq!(info.supply_type, TokenSupplyType::Finite);
        assert_eq!(f.balance(&f.operator, &token).await, 1000);
    }

    #[tokio::test]
    async fn test_token_ids_are_distinct() {
        let f = fixture();
        let first = f.create_htt(None).await;
        let second = f.create_htt(None).await;
        assert_ne!(first, second);
        assert!(first.num > f.bob.id.num);
    }

    #[tokio::test]
    async fn test_mint_beyond_max_supply_fails() {
        let f = fixture();
        let token = f.create_htt(Some(1000)).await;

        let err = f
            .ledger
            .mint_token(&f.submission(&f.operator, &[]), &token, 1)
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(Status::TokenMaxSupplyReached));

        let info = f.ledger.get_token_info(&token).await.unwrap();
        assert_eq!(info.total_supply, 1000);
    }

    #[tokio::test]
    async fn test_mint_infinite_token_grows_supply() {
        let f = fixture();
        let token = f.create_htt(None).await;

        let receipt = f
            .ledger
            .mint_token(&f.submission(&f.operator, &[]), &token, 500)
            .await
            .unwrap();
        assert_eq!(receipt.total_supply, Some(1500));
        assert_eq!(f.balance(&f.operator, &token).await, 1500);
    }

    #[tokio::test]
    async fn test_mint_requires_supply_key_signature() {
        let f = fixture();
        let token = f.create_htt(None).await;

        // Alice pays and signs, but does not hold the supply key
        let err = f
            .ledger
            .mint_token(&f.submission(&f.alice, &[]), &token, 1)
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(Status::InvalidSignature));
    }

    #[tokio::test]
    async fn test_association_is_not_duplicated() {
        let f = fixture();
        let token = f.create_htt(None).await;

        f.associate(&f.alice, token).await.unwrap();
        let err = f.associate(&f.alice, token).await.unwrap_err();
        assert_eq!(err.status(), Some(Status::TokenAlreadyAssociatedToAccount));

        let balance = f.ledger.query_balance(&f.alice.id).await.unwrap();
        assert_eq!(balance.tokens.len(), 1);
        assert_eq!(balance.token(&token), 0);
    }

    #[tokio::test]
    async fn test_association_requires_account_signature() {
        let f = fixture();
        let token = f.create_htt(None).await;

        let err = f
            .ledger
            .associate_token(&f.submission(&f.operator, &[]), &f.alice.id, &[token])
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(Status::InvalidSignature));
    }

    #[tokio::test]
    async fn test_transfer_moves_exact_amounts() {
        let f = fixture();
        let token = f.create_htt(Some(1000)).await;
        f.associate(&f.alice, token).await.unwrap();

        let legs = [
            TokenTransfer::debit(f.operator.id, 10).unwrap(),
            TokenTransfer::credit(f.alice.id, 10).unwrap(),
        ];
        let receipt = f
            .ledger
            .transfer_token(&f.submission(&f.operator, &[]), &token, &legs)
            .await
            .unwrap();

        assert_eq!(receipt.status, Status::Success);
        assert_eq!(f.balance(&f.operator, &token).await, 990);
        assert_eq!(f.balance(&f.alice, &token).await, 10);
        assert_eq!(f.ledger.circulating_supply(&token), 1000);
    }

    #[tokio::test]
    async fn test_transfer_to_unassociated_account_fails() {
        let f = fixture();
        let token = f.create_htt(None).await;

        let legs = [
            TokenTransfer::debit(f.operator.id, 10).unwrap(),
            TokenTransfer::credit(f.bob.id, 10).unwrap(),
        ];
        let err = f
            .ledger
            .transfer_token(&f.submission(&f.operator, &[]), &token, &legs)
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(Status::TokenNotAssociatedToAccount));
        assert_eq!(f.balance(&f.operator, &token).await, 1000);
    }

    #[tokio::test]
    async fn test_insufficient_balance_leaves_balances_unchanged() {
        let f = fixture();
        let token = f.create_htt(None).await;
        f.associate(&f.alice, token).await.unwrap();
        f.associate(&f.bob, token).await.unwrap();

        let legs = [
            TokenTransfer::debit(f.alice.id, 5).unwrap(),
            TokenTransfer::debit(f.operator.id, 5).unwrap(),
            TokenTransfer::credit(f.bob.id, 10).unwrap(),
        ];
        let err = f
            .ledger
            .transfer_token(&f.submission(&f.operator, &[&f.alice]), &token, &legs)
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(Status::InsufficientTokenBalance));
        assert_eq!(f.balance(&f.operator, &token).await, 1000);
        assert_eq!(f.balance(&f.alice, &token).await, 0);
        assert_eq!(f.balance(&f.bob, &token).await, 0);
    }

    #[tokio::test]
    async fn test_transfer_prechecks() {
        let f = fixture();
        let token = f.create_htt(None).await;
        let sub = f.submission(&f.operator, &[]);

        let err = f
            .ledger
            .transfer_token(&sub, &token, &[TokenTransfer::debit(f.operator.id, 900).unwrap()])
            .await
            .unwrap_err();
        assert_eq!(err, LedgerError::PrecheckFailed(Status::TransfersNotZeroSumForToken));

        let err = f.ledger.transfer_token(&sub, &token, &[]).await.unwrap_err();
        assert_eq!(
            err,
            LedgerError::PrecheckFailed(Status::EmptyTokenTransferAccountAmounts)
        );
    }

    #[tokio::test]
    async fn test_debited_accounts_must_sign() {
        let f = fixture();
        let token = f.create_htt(None).await;
        f.associate(&f.alice, token).await.unwrap();

        let legs = [
            TokenTransfer::debit(f.operator.id, 10).unwrap(),
            TokenTransfer::credit(f.alice.id, 10).unwrap(),
        ];
        // Alice pays but the treasury never signs
        let err = f
            .ledger
            .transfer_token(&f.submission(&f.alice, &[]), &token, &legs)
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(Status::InvalidSignature));
    }

    #[tokio::test]
    async fn test_payer_is_charged_even_when_rejected() {
        let f = fixture();
        let token = f.create_htt(Some(1000)).await;
        let before = f.ledger.query_balance(&f.operator.id).await.unwrap().hbars;

        let _ = f
            .ledger
            .mint_token(&f.submission(&f.operator, &[]), &token, 1)
            .await;

        let after = f.ledger.query_balance(&f.operator.id).await.unwrap().hbars;
        assert_eq!(
            before.checked_sub(after),
            Some(f.ledger.fee_schedule().token_mint)
        );
    }

    #[tokio::test]
    async fn test_duplicate_transaction_is_rejected() {
        let f = fixture();
        let token = f.create_htt(None).await;
        let sub = f.submission(&f.operator, &[]);

        f.ledger.mint_token(&sub, &token, 1).await.unwrap();
        let err = f.ledger.mint_token(&sub, &token, 1).await.unwrap_err();
        assert_eq!(err, LedgerError::PrecheckFailed(Status::DuplicateTransaction));

        let info = f.ledger.get_token_info(&token).await.unwrap();
        assert_eq!(info.total_supply, 1001);
    }

    #[tokio::test]
    async fn test_receipts_record_rejections() {
        let f = fixture();
        let token = f.create_htt(Some(1000)).await;
        let sub = f.submission(&f.operator, &[]);

        let _ = f.ledger.mint_token(&sub, &token, 1).await;
        let receipt = f.ledger.get_receipt(&sub.transaction_id).await.unwrap();
        assert_eq!(receipt.status, Status::TokenMaxSupplyReached);

        let unknown = f.submission(&f.operator, &[]);
        let err = f.ledger.get_receipt(&unknown.transaction_id).await.unwrap_err();
        assert_eq!(err, LedgerError::PrecheckFailed(Status::ReceiptNotFound));
    }

    #[tokio::test]
    async fn test_latency_uses_injected_clock() {
        let f = fixture();
        f.ledger.set_latency(Some(Duration::from_secs(2)));

        let start = f.clock.now();
        f.ledger.query_balance(&f.alice.id).await.unwrap();

        // Paused timers fire on the next millisecond tick
        let elapsed = f.clock.now() - start;
        assert!(
            elapsed >= Duration::from_secs(2) && elapsed < Duration::from_millis(2_010),
            "elapsed {:?}",
            elapsed
        );
    }

    mod conservation {
        use super::*;
        use proptest::prelude::*;

        fn run<F: std::future::Future>(fut: F) -> F::Output {
            tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .unwrap()
                .block_on(fut)
        }

        proptest! {
            #[test]
            fn test_transfers_conserve_supply(
                legs in prop::collection::vec((0usize..3, 0usize..3, 0u64..600), 1..12)
            ) {
                run(async {
                    let operator = account(2, 2);
                    let alice = account(1001, 11);
                    let bob = account(1002, 12);
                    let accounts = [&operator, &alice, &bob];
                    let ledger = InMemoryLedger::builder()
                        .with_account(&operator, Hbar::from_hbars(1_000))
                        .with_account(&alice, Hbar::from_hbars(1_000))
                        .with_account(&bob, Hbar::from_hbars(1_000))
                        .build();
                    let ids = TransactionIdGenerator::new();
                    let clock = SystemClock;
                    let sign_all = || accounts.iter().map(|a| a.key.clone()).collect::<Vec<_>>();

                    let spec = TokenSpec::builder("Test Token", "HTT", operator.id)
                        .initial_supply(1000)
                        .build()
                        .unwrap();
                    let token = ledger
                        .create_token(&Submission::new(ids.generate(operator.id, &clock), sign_all()), &spec)
                        .await
                        .unwrap()
                        .token_id
                        .unwrap();
                    for a in [&alice, &bob] {
                        ledger
                            .associate_token(&Submission::new(ids.generate(operator.id, &clock), sign_all()), &a.id, &[token])
                            .await
                            .unwrap();
                    }

                    for (from, to, amount) in legs {
                        if from == to || amount == 0 {
                            continue;
                        }
                        let before: Vec<u64> = {
                            let mut v = Vec::new();
                            for a in accounts {
                                v.push(ledger.query_balance(&a.id).await.unwrap().token(&token));
                            }
                            v
                        };
                        let transfers = [
                            TokenTransfer::debit(accounts[from].id, amount).unwrap(),
                            TokenTransfer::credit(accounts[to].id, amount).unwrap(),
                        ];
                        let result = ledger
                            .transfer_token(&Submission::new(ids.generate(operator.id, &clock), sign_all()), &token, &transfers)
                            .await;

                        let mut after = Vec::new();
                        for a in accounts {
                            after.push(ledger.query_balance(&a.id).await.unwrap().token(&token));
                        }

                        if before[from] >= amount {
                            assert!(result.is_ok());
                            assert_eq!(after[from], before[from] - amount);
                            assert_eq!(after[to], before[to] + amount);
                        } else {
                            assert_eq!(result.unwrap_err().status(), Some(Status::InsufficientTokenBalance));
                            assert_eq!(after, before);
                        }
                        assert_eq!(ledger.circulating_supply(&token), 1000);
                    }
                });
            }
        }
    }
}
