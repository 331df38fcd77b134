use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    error::{
        SuretyError, already_finalized, arithmetic_error, duplicate_purchase, invalid_amount,
        no_credit, not_found,
    },
    flight::FlightRegistry,
    insurance::types::{InsurancePurchase, PassengerCredit},
    ledger::{Account, Ledger, LedgerEntryId},
    types::{FlightCode, FlightKey, FlightStatusCode, Identity, Micro},
};

/// Payouts drain premiums first, then the airlines' funding pool.
const PAYOUT_SOURCES: [Account; 2] = [Account::PremiumEscrow, Account::AirlineFunding];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsuranceTerms {
    pub max_insurance_micro: Micro,
    pub payout_ratio_milli: u32,
}

impl InsuranceTerms {
    pub fn credit_for(&self, amount_paid_micro: Micro) -> Result<Micro, SuretyError> {
        let scaled = u128::from(amount_paid_micro)
            .checked_mul(u128::from(self.payout_ratio_milli))
            .ok_or_else(|| arithmetic_error("credit computation overflow"))?
            / 1_000;
        Micro::try_from(scaled).map_err(|_| arithmetic_error("credit conversion overflow"))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<InsurancePurchase>", into = "Vec<InsurancePurchase>")]
pub struct InsurancePolicy {
    purchases: Vec<InsurancePurchase>,
    index: BTreeMap<(Identity, FlightCode), usize>,
}

impl From<Vec<InsurancePurchase>> for InsurancePolicy {
    fn from(purchases: Vec<InsurancePurchase>) -> Self {
        let index = purchases
            .iter()
            .enumerate()
            .map(|(slot, purchase)| {
                (
                    (purchase.passenger.clone(), purchase.flight_code.clone()),
                    slot,
                )
            })
            .collect();
        Self { purchases, index }
    }
}

impl From<InsurancePolicy> for Vec<InsurancePurchase> {
    fn from(policy: InsurancePolicy) -> Self {
        policy.purchases
    }
}

impl InsurancePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn purchases(&self) -> &[InsurancePurchase] {
        &self.purchases
    }

    pub fn purchase(&self, passenger: &str, flight_code: &str) -> Option<&InsurancePurchase> {
        self.index
            .get(&(passenger.to_string(), flight_code.to_string()))
            .map(|slot| &self.purchases[*slot])
    }

    pub fn is_passenger(&self, passenger: &str) -> bool {
        self.purchases
            .iter()
            .any(|purchase| purchase.passenger == passenger)
    }

    pub fn credit_of(&self, passenger: &str) -> Micro {
        self.purchases
            .iter()
            .filter(|purchase| purchase.passenger == passenger)
            .map(|purchase| purchase.credit_owed_micro)
            .sum()
    }

    pub fn buy(
        &mut self,
        passenger: &str,
        flight_code: &str,
        amount_micro: Micro,
        terms: &InsuranceTerms,
        flights: &FlightRegistry,
        ledger: &mut Ledger,
    ) -> Result<LedgerEntryId, SuretyError> {
        if amount_micro == 0 || amount_micro > terms.max_insurance_micro {
            return Err(invalid_amount(format!(
                "insurance amount must be within 1..={}, got {amount_micro}",
                terms.max_insurance_micro
            )));
        }
        if !flights.has_flight_code(flight_code) {
            return Err(not_found(format!("flight '{flight_code}' is not registered")));
        }
        if flights.is_flight_code_settled(flight_code) {
            return Err(already_finalized(format!(
                "flight '{flight_code}' has already been resolved"
            )));
        }
        let key = (passenger.to_string(), flight_code.to_string());
        if self.index.contains_key(&key) {
            return Err(duplicate_purchase(format!(
                "'{passenger}' already insured flight '{flight_code}'"
            )));
        }

        let airline = flights.sole_open_airline(flight_code).map(str::to_string);
        let entry_id = ledger.transfer(
            &Account::wallet(passenger),
            &Account::PremiumEscrow,
            amount_micro,
            &format!("premium:{passenger}:{flight_code}"),
        )?;

        self.index.insert(key, self.purchases.len());
        self.purchases.push(InsurancePurchase {
            passenger: passenger.to_string(),
            flight_code: flight_code.to_string(),
            airline,
            amount_paid_micro: amount_micro,
            credit_owed_micro: 0,
            settled: false,
        });
        Ok(entry_id)
    }

    /// Settles every open purchase covering the flight. Purchases settled
    /// earlier are left alone, so a repeated notification credits nobody twice.
    pub fn on_flight_finalized(
        &mut self,
        flight: &FlightKey,
        status_code: FlightStatusCode,
        terms: &InsuranceTerms,
    ) -> Result<Vec<PassengerCredit>, SuretyError> {
        let mut pending = Vec::new();
        for (slot, purchase) in self.purchases.iter().enumerate() {
            if !purchase.covers(flight) || purchase.settled {
                continue;
            }
            let credit_micro = if status_code.is_insured_delay() {
                terms.credit_for(purchase.amount_paid_micro)?
            } else {
                0
            };
            pending.push((slot, credit_micro));
        }

        let mut credited = Vec::new();
        for (slot, credit_micro) in pending {
            let purchase = &mut self.purchases[slot];
            purchase.settled = true;
            purchase.credit_owed_micro = credit_micro;
            if credit_micro > 0 {
                credited.push(PassengerCredit {
                    passenger: purchase.passenger.clone(),
                    flight_code: purchase.flight_code.clone(),
                    credit_micro,
                });
            }
        }
        Ok(credited)
    }

    /// Pays out all credit owed to `passenger`. Credit is zeroed before the
    /// transfer runs and restored if the transfer fails.
    pub fn pay(&mut self, passenger: &str, ledger: &mut Ledger) -> Result<Micro, SuretyError> {
        let owed: Vec<(usize, Micro)> = self
            .purchases
            .iter()
            .enumerate()
            .filter(|(_, purchase)| {
                purchase.passenger == passenger && purchase.credit_owed_micro > 0
            })
            .map(|(slot, purchase)| (slot, purchase.credit_owed_micro))
            .collect();

        let total_micro = owed.iter().try_fold(0u64, |acc, (_, credit)| {
            acc.checked_add(*credit)
                .ok_or_else(|| arithmetic_error("credit total overflow"))
        })?;
        if total_micro == 0 {
            return Err(no_credit(format!("'{passenger}' has no credit to withdraw")));
        }

        for (slot, _) in &owed {
            self.purchases[*slot].credit_owed_micro = 0;
        }

        if let Err(err) = ledger.payout(
            &PAYOUT_SOURCES,
            &Account::wallet(passenger),
            total_micro,
            &format!("payout:{passenger}"),
        ) {
            for (slot, credit) in owed {
                self.purchases[slot].credit_owed_micro = credit;
            }
            return Err(err);
        }

        Ok(total_micro)
    }
}
