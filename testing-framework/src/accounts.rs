//! Account context: identifiers and key material of the test accounts
//!
//! Accounts are loaded once from configuration and never change during a
//! run. Scenarios address them by ordinal ("first", "second", ...) while the
//! operator pays for transactions and acts as token treasury.

use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// DER prefix of a PKCS#8-wrapped ED25519 private key
const ED25519_DER_PREFIX: &str = "302e020100300506032b657004220420";

/// Raw ED25519 seed length in bytes
const ED25519_SEED_LEN: usize = 32;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccountError {
    #[error("Invalid account id '{0}', expected <shard>.<realm>.<num>")]
    InvalidId(String),
    #[error("Invalid private key for account {0}: {1}")]
    InvalidKey(String, String),
    #[error("The {0} account is not configured")]
    NotConfigured(Ordinal),
    #[error("At least {required} participant accounts are required, got {got}")]
    TooFewAccounts { required: usize, got: usize },
    #[error("Account {0} is configured more than once")]
    Duplicate(AccountId),
    #[error("Unknown ordinal '{0}'")]
    UnknownOrdinal(String),
}

/// Ledger entity identifier `<shard>.<realm>.<num>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountId {
    pub shard: u64,
    pub realm: u64,
    pub num: u64,
}

impl AccountId {
    pub const fn new(shard: u64, realm: u64, num: u64) -> Self {
        Self { shard, realm, num }
    }

    /// Account in the default shard and realm
    pub const fn from_num(num: u64) -> Self {
        Self::new(0, 0, num)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.shard, self.realm, self.num)
    }
}

impl FromStr for AccountId {
    type Err = AccountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('.').collect();
        if parts.len() != 3 {
            return Err(AccountError::InvalidId(s.to_owned()));
        }

        let parse = |p: &str| {
            p.parse::<u64>()
                .map_err(|_| AccountError::InvalidId(s.to_owned()))
        };
        Ok(Self::new(parse(parts[0])?, parse(parts[1])?, parse(parts[2])?))
    }
}

impl TryFrom<String> for AccountId {
    type Error = AccountError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AccountId> for String {
    fn from(id: AccountId) -> Self {
        id.to_string()
    }
}

/// Stand-in for a public key: SHA3-256 of the raw key seed
///
/// The ledger double stores fingerprints and compares them with the
/// fingerprint of every key attached to a submission.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyFingerprint([u8; 32]);

impl KeyFingerprint {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for KeyFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0[..8]))
    }
}

impl fmt::Debug for KeyFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyFingerprint({})", self)
    }
}

/// ED25519 private key material, hex encoded (raw seed or DER)
///
/// Never printed: `Debug` is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey {
    seed: Vec<u8>,
}

impl PrivateKey {
    /// Parse a hex key, accepting an optional `0x` and the DER prefix
    pub fn from_hex(input: &str) -> Result<Self, String> {
        let trimmed = input.trim();
        let hex_str = trimmed
            .strip_prefix("0x")
            .unwrap_or(trimmed)
            .to_ascii_lowercase();
        let hex_str = hex_str
            .strip_prefix(ED25519_DER_PREFIX)
            .unwrap_or(&hex_str);

        let seed = hex::decode(hex_str).map_err(|e| format!("not hex: {}", e))?;
        if seed.len() != ED25519_SEED_LEN {
            return Err(format!(
                "expected {} key bytes, got {}",
                ED25519_SEED_LEN,
                seed.len()
            ));
        }

        Ok(Self { seed })
    }

    pub fn fingerprint(&self) -> KeyFingerprint {
        let digest = Sha3_256::digest(&self.seed);
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        KeyFingerprint(bytes)
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey(<redacted> {})", self.fingerprint())
    }
}

/// A participating account: identifier and signing key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestAccount {
    pub id: AccountId,
    pub key: PrivateKey,
}

impl TestAccount {
    pub fn new(id: AccountId, key: PrivateKey) -> Self {
        Self { id, key }
    }

    /// Parse an account from its textual id and hex key
    pub fn parse(id: &str, private_key: &str) -> Result<Self, AccountError> {
        let id: AccountId = id.parse()?;
        let key = PrivateKey::from_hex(private_key)
            .map_err(|e| AccountError::InvalidKey(id.to_string(), e))?;
        Ok(Self { id, key })
    }
}

/// Position of a participant account as written in scenario text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Ordinal {
    First,
    Second,
    Third,
    Fourth,
}

impl Ordinal {
    pub fn index(self) -> usize {
        match self {
            Ordinal::First => 0,
            Ordinal::Second => 1,
            Ordinal::Third => 2,
            Ordinal::Fourth => 3,
        }
    }
}

impl fmt::Display for Ordinal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Ordinal::First => "first",
            Ordinal::Second => "second",
            Ordinal::Third => "third",
            Ordinal::Fourth => "fourth",
        };
        f.write_str(name)
    }
}

impl FromStr for Ordinal {
    type Err = AccountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "first" => Ok(Ordinal::First),
            "second" => Ok(Ordinal::Second),
            "third" => Ok(Ordinal::Third),
            "fourth" => Ok(Ordinal::Fourth),
            _ => Err(AccountError::UnknownOrdinal(s.to_owned())),
        }
    }
}

/// Operator plus ordered participant accounts
#[derive(Debug, Clone)]
pub struct AccountContext {
    operator: TestAccount,
    participants: Vec<TestAccount>,
}

impl AccountContext {
    /// Minimum number of participants every token-service scenario needs
    pub const MIN_PARTICIPANTS: usize = 2;

    /// Build the context; without an explicit operator the first participant operates
    pub fn new(
        operator: Option<TestAccount>,
        participants: Vec<TestAccount>,
    ) -> Result<Self, AccountError> {
        if participants.len() < Self::MIN_PARTICIPANTS {
            return Err(AccountError::TooFewAccounts {
                required: Self::MIN_PARTICIPANTS,
                got: participants.len(),
            });
        }

        let mut seen = std::collections::HashSet::new();
        for account in &participants {
            if !seen.insert(account.id) {
                return Err(AccountError::Duplicate(account.id));
            }
        }

        let operator = match operator {
            Some(op) => op,
            None => participants[0].clone(),
        };

        Ok(Self {
            operator,
            participants,
        })
    }

    pub fn operator(&self) -> &TestAccount {
        &self.operator
    }

    pub fn participant(&self, ordinal: Ordinal) -> Result<&TestAccount, AccountError> {
        self.participants
            .get(ordinal.index())
            .ok_or(AccountError::NotConfigured(ordinal))
    }

    pub fn participants(&self) -> &[TestAccount] {
        &self.participants
    }

    /// Whether the operator is one of the participants
    pub fn operator_is_participant(&self) -> bool {
        self.participants.iter().any(|a| a.id == self.operator.id)
    }

    /// Every distinct account (operator first)
    pub fn all(&self) -> Vec<&TestAccount> {
        let mut all = vec![&self.operator];
        all.extend(self.participants.iter().filter(|a| a.id != self.operator.id));
        all
    }
}
