//! Ledger value types shared by every client implementation

use crate::accounts::{AccountError, AccountId, KeyFingerprint};
use crate::orchestrator::Clock;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use strum::{Display, EnumString};
use thiserror::Error;

/// Tinybars per hbar
pub const TINYBARS_PER_HBAR: u64 = 100_000_000;

/// Token entity identifier, same `<shard>.<realm>.<num>` form as accounts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TokenId {
    pub shard: u64,
    pub realm: u64,
    pub num: u64,
}

impl TokenId {
    pub const fn from_num(num: u64) -> Self {
        Self {
            shard: 0,
            realm: 0,
            num,
        }
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.shard, self.realm, self.num)
    }
}

impl FromStr for TokenId {
    type Err = AccountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id: AccountId = s.parse()?;
        Ok(Self {
            shard: id.shard,
            realm: id.realm,
            num: id.num,
        })
    }
}

impl TryFrom<String> for TokenId {
    type Error = AccountError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TokenId> for String {
    fn from(id: TokenId) -> Self {
        id.to_string()
    }
}

/// Hbar amount held in tinybars
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Hbar(u64);

impl Hbar {
    pub const ZERO: Hbar = Hbar(0);

    pub const fn from_tinybars(tinybars: u64) -> Self {
        Self(tinybars)
    }

    pub const fn from_hbars(hbars: u64) -> Self {
        Self(hbars.saturating_mul(TINYBARS_PER_HBAR))
    }

    pub const fn tinybars(self) -> u64 {
        self.0
    }

    pub fn checked_sub(self, other: Hbar) -> Option<Hbar> {
        self.0.checked_sub(other.0).map(Hbar)
    }

    pub fn saturating_add(self, other: Hbar) -> Hbar {
        Hbar(self.0.saturating_add(other.0))
    }
}

impl fmt::Display for Hbar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:08} ℏ",
            self.0 / TINYBARS_PER_HBAR,
            self.0 % TINYBARS_PER_HBAR
        )
    }
}

/// Network response codes the harness understands
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Success,
    InvalidSignature,
    InvalidAccountId,
    InvalidTokenId,
    InsufficientPayerBalance,
    InsufficientTokenBalance,
    DuplicateTransaction,
    ReceiptNotFound,
    MissingTokenName,
    MissingTokenSymbol,
    InvalidTokenMaxSupply,
    InvalidTokenInitialSupply,
    InvalidTokenMintAmount,
    TokenMaxSupplyReached,
    TokenHasNoSupplyKey,
    TokenNotAssociatedToAccount,
    TokenAlreadyAssociatedToAccount,
    TransfersNotZeroSumForToken,
    EmptyTokenTransferAccountAmounts,
    AccountRepeatedInAccountAmounts,
}

impl Status {
    pub fn is_success(self) -> bool {
        self == Status::Success
    }
}

/// Whether a token's supply is capped
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize, Default,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenSupplyType {
    #[default]
    Infinite,
    Finite,
}

/// Parameters of a fungible token creation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSpec {
    pub name: String,
    pub symbol: String,
    pub decimals: u32,
    pub treasury: AccountId,
    pub initial_supply: u64,
    pub supply_type: TokenSupplyType,
    pub max_supply: Option<u64>,
    pub supply_key: Option<KeyFingerprint>,
}

impl TokenSpec {
    /// Start a spec for an infinite-supply token with no initial supply
    pub fn builder(
        name: impl Into<String>,
        symbol: impl Into<String>,
        treasury: AccountId,
    ) -> TokenSpecBuilder {
        TokenSpecBuilder {
            spec: TokenSpec {
                name: name.into(),
                symbol: symbol.into(),
                decimals: 0,
                treasury,
                initial_supply: 0,
                supply_type: TokenSupplyType::Infinite,
                max_supply: None,
                supply_key: None,
            },
        }
    }

    /// Check the creation constraints, returning the status the network would report
    pub fn validate(&self) -> Result<(), Status> {
        if self.name.trim().is_empty() {
            return Err(Status::MissingTokenName);
        }
        if self.symbol.trim().is_empty() {
            return Err(Status::MissingTokenSymbol);
        }

        match (self.supply_type, self.max_supply) {
            (TokenSupplyType::Infinite, Some(_)) => Err(Status::InvalidTokenMaxSupply),
            (TokenSupplyType::Finite, None) | (TokenSupplyType::Finite, Some(0)) => {
                Err(Status::InvalidTokenMaxSupply)
            }
            (TokenSupplyType::Finite, Some(max)) if self.initial_supply > max => {
                Err(Status::InvalidTokenInitialSupply)
            }
            _ => Ok(()),
        }
    }
}

/// Fluent builder for [`TokenSpec`]
#[derive(Debug, Clone)]
pub struct TokenSpecBuilder {
    spec: TokenSpec,
}

impl TokenSpecBuilder {
    pub fn decimals(mut self, decimals: u32) -> Self {
        self.spec.decimals = decimals;
        self
    }

    pub fn initial_supply(mut self, supply: u64) -> Self {
        self.spec.initial_supply = supply;
        self
    }

    /// Cap the supply at `max_supply`
    pub fn finite(mut self, max_supply: u64) -> Self {
        self.spec.supply_type = TokenSupplyType::Finite;
        self.spec.max_supply = Some(max_supply);
        self
    }

    pub fn infinite(mut self) -> Self {
        self.spec.supply_type = TokenSupplyType::Infinite;
        self.spec.max_supply = None;
        self
    }

    pub fn supply_key(mut self, key: KeyFingerprint) -> Self {
        self.spec.supply_key = Some(key);
        self
    }

    /// Validate and return the spec
    pub fn build(self) -> Result<TokenSpec, Status> {
        self.spec.validate()?;
        Ok(self.spec)
    }
}

/// Token metadata as reported by the network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub token_id: TokenId,
    pub name: String,
    pub symbol: String,
    pub decimals: u32,
    pub treasury: AccountId,
    pub supply_type: TokenSupplyType,
    pub max_supply: Option<u64>,
    pub total_supply: u64,
}

/// Balances of one account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBalance {
    pub account: AccountId,
    pub hbars: Hbar,
    /// Associated tokens and their balances
    pub tokens: IndexMap<TokenId, u64>,
}

impl AccountBalance {
    /// Token balance, zero when the token is not associated
    pub fn token(&self, token: &TokenId) -> u64 {
        self.tokens.get(token).copied().unwrap_or(0)
    }

    pub fn is_associated(&self, token: &TokenId) -> bool {
        self.tokens.contains_key(token)
    }
}

/// One signed leg of a token transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenTransfer {
    pub account: AccountId,
    pub amount: i64,
}

impl TokenTransfer {
    pub fn debit(account: AccountId, amount: u64) -> Result<Self, AmountOutOfRange> {
        Ok(Self {
            account,
            amount: -signed(amount)?,
        })
    }

    pub fn credit(account: AccountId, amount: u64) -> Result<Self, AmountOutOfRange> {
        Ok(Self {
            account,
            amount: signed(amount)?,
        })
    }
}

/// A transfer leg larger than the network's signed 64-bit amounts
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("transfer amount {0} exceeds the largest transferable amount {max}", max = i64::MAX)]
pub struct AmountOutOfRange(pub u64);

fn signed(amount: u64) -> Result<i64, AmountOutOfRange> {
    i64::try_from(amount).map_err(|_| AmountOutOfRange(amount))
}

/// Sum of the signed amounts of a transfer list
pub fn net_amount(transfers: &[TokenTransfer]) -> i128 {
    transfers.iter().map(|t| t.amount as i128).sum()
}

/// Client-generated transaction identifier `payer@seconds.nanos`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId {
    pub payer: AccountId,
    pub valid_start: Duration,
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}.{:09}",
            self.payer,
            self.valid_start.as_secs(),
            self.valid_start.subsec_nanos()
        )
    }
}

/// Produces strictly increasing valid-start timestamps
///
/// Two transactions from the same process never share an id, even when the
/// clock does not move between them.
#[derive(Debug, Default)]
pub struct TransactionIdGenerator {
    last: Mutex<Duration>,
}

impl TransactionIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generate(&self, payer: AccountId, clock: &dyn Clock) -> TransactionId {
        let mut last = self.last.lock();
        let now = clock.unix_time();
        let valid_start = if now > *last {
            now
        } else {
            *last + Duration::from_nanos(1)
        };
        *last = valid_start;

        TransactionId { payer, valid_start }
    }
}

/// Final outcome of a transaction as recorded by the network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub transaction_id: TransactionId,
    pub status: Status,
    /// Set for token creation
    pub token_id: Option<TokenId>,
    /// Set for mint: total supply after the mint
    pub total_supply: Option<u64>,
}

impl TransactionReceipt {
    pub fn new(transaction_id: TransactionId, status: Status) -> Self {
        Self {
            transaction_id,
            status,
            token_id: None,
            total_supply: None,
        }
    }
}
