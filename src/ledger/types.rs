use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::types::{Identity, Micro};

pub type LedgerEntryId = String;

const WALLET_PREFIX: &str = "wallet:";

/// Addressable balance holder. Pools are held by the system on behalf of
/// the participants that paid into them.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Account {
    Wallet(Identity),
    AirlineFunding,
    PremiumEscrow,
    OracleFees,
}

impl Account {
    pub fn wallet(identity: impl Into<Identity>) -> Self {
        Account::Wallet(identity.into())
    }

    pub fn is_pool(&self) -> bool {
        !matches!(self, Account::Wallet(_))
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Account::Wallet(identity) => write!(f, "{WALLET_PREFIX}{identity}"),
            Account::AirlineFunding => write!(f, "pool:airline_funding"),
            Account::PremiumEscrow => write!(f, "pool:premium_escrow"),
            Account::OracleFees => write!(f, "pool:oracle_fees"),
        }
    }
}

impl FromStr for Account {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "pool:airline_funding" => Ok(Account::AirlineFunding),
            "pool:premium_escrow" => Ok(Account::PremiumEscrow),
            "pool:oracle_fees" => Ok(Account::OracleFees),
            other => match other.strip_prefix(WALLET_PREFIX) {
                Some(identity) if !identity.trim().is_empty() => {
                    Ok(Account::Wallet(identity.to_string()))
                }
                _ => Err(format!("unknown ledger account '{other}'")),
            },
        }
    }
}

impl From<Account> for String {
    fn from(account: Account) -> Self {
        account.to_string()
    }
}

impl TryFrom<String> for Account {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        raw.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEntryKind {
    Deposit { to: Account },
    Transfer { from: Account, to: Account },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub entry_id: LedgerEntryId,
    pub seq_no: u64,
    pub kind: LedgerEntryKind,
    pub amount_micro: Micro,
    pub reference_id: String,
}
