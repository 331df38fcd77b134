use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    error::{SuretyError, arithmetic_error, insufficient_funds, invalid_amount},
    ledger::types::{Account, LedgerEntry, LedgerEntryId, LedgerEntryKind},
    types::Micro,
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    balances: BTreeMap<Account, Micro>,
    next_sequence: u64,
    entries: Vec<LedgerEntry>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance(&self, account: &Account) -> Micro {
        self.balances.get(account).copied().unwrap_or(0)
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn balances(&self) -> impl Iterator<Item = (&Account, Micro)> {
        self.balances.iter().map(|(account, amount)| (account, *amount))
    }

    /// Sum of every balance, wallets and pools alike.
    pub fn total_supply(&self) -> Result<Micro, SuretyError> {
        self.balances.values().try_fold(0u64, |acc, amount| {
            acc.checked_add(*amount)
                .ok_or_else(|| arithmetic_error("ledger total supply overflow"))
        })
    }

    /// Inflow from the external payment rail.
    pub fn deposit(
        &mut self,
        to: &Account,
        amount_micro: Micro,
        reference_id: &str,
    ) -> Result<LedgerEntryId, SuretyError> {
        if amount_micro == 0 {
            return Err(invalid_amount("deposit amount must be positive"));
        }

        let next_balance = self
            .balance(to)
            .checked_add(amount_micro)
            .ok_or_else(|| arithmetic_error(format!("balance overflow on deposit to {to}")))?;
        let entry_id = self.append_entry(
            LedgerEntryKind::Deposit { to: to.clone() },
            amount_micro,
            reference_id,
        )?;
        self.balances.insert(to.clone(), next_balance);
        Ok(entry_id)
    }

    pub fn transfer(
        &mut self,
        from: &Account,
        to: &Account,
        amount_micro: Micro,
        reference_id: &str,
    ) -> Result<LedgerEntryId, SuretyError> {
        if amount_micro == 0 {
            return Err(invalid_amount("transfer amount must be positive"));
        }

        let available = self.balance(from);
        if available < amount_micro {
            return Err(insufficient_funds(format!(
                "insufficient balance in {from}: required={amount_micro}, available={available}"
            )));
        }

        let debited = available - amount_micro;
        let credited = if from == to {
            available
        } else {
            self.balance(to)
                .checked_add(amount_micro)
                .ok_or_else(|| arithmetic_error(format!("balance overflow on credit to {to}")))?
        };

        let entry_id = self.append_entry(
            LedgerEntryKind::Transfer {
                from: from.clone(),
                to: to.clone(),
            },
            amount_micro,
            reference_id,
        )?;
        if from != to {
            self.balances.insert(from.clone(), debited);
            self.balances.insert(to.clone(), credited);
        }
        Ok(entry_id)
    }

    /// Pays `amount_micro` into `to`, drawing from `sources` in order. Either
    /// the whole amount moves or nothing does.
    pub fn payout(
        &mut self,
        sources: &[Account],
        to: &Account,
        amount_micro: Micro,
        reference_id: &str,
    ) -> Result<Vec<LedgerEntryId>, SuretyError> {
        if amount_micro == 0 {
            return Err(invalid_amount("payout amount must be positive"));
        }

        let mut plan = Vec::new();
        let mut remaining = amount_micro;
        for source in sources {
            if remaining == 0 {
                break;
            }
            let draw = self.balance(source).min(remaining);
            if draw > 0 {
                plan.push((source.clone(), draw));
                remaining -= draw;
            }
        }

        if remaining > 0 {
            return Err(insufficient_funds(format!(
                "payout of {amount_micro} to {to} short by {remaining}"
            )));
        }
        self.balance(to)
            .checked_add(amount_micro)
            .ok_or_else(|| arithmetic_error(format!("balance overflow on payout to {to}")))?;

        let mut entry_ids = Vec::with_capacity(plan.len());
        for (source, draw) in plan {
            entry_ids.push(self.transfer(&source, to, draw, reference_id)?);
        }
        Ok(entry_ids)
    }

    fn append_entry(
        &mut self,
        kind: LedgerEntryKind,
        amount_micro: Micro,
        reference_id: &str,
    ) -> Result<LedgerEntryId, SuretyError> {
        self.next_sequence = self
            .next_sequence
            .checked_add(1)
            .ok_or_else(|| arithmetic_error("ledger sequence overflow"))?;

        let entry_id = format!("led:{:016}", self.next_sequence);
        self.entries.push(LedgerEntry {
            entry_id: entry_id.clone(),
            seq_no: self.next_sequence,
            kind,
            amount_micro,
            reference_id: reference_id.to_string(),
        });
        Ok(entry_id)
    }
}
