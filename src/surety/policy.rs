use serde::{Deserialize, Serialize};

use crate::{
    error::{SuretyError, invalid_request},
    insurance::InsuranceTerms,
    oracle::{ConsensusRules, IndexGenerator, INDEXES_PER_ORACLE},
    types::{Micro, UNIT_MICRO},
};

fn default_bootstrap_airline_limit() -> usize {
    4
}

fn default_min_funds_micro() -> Micro {
    10 * UNIT_MICRO
}

fn default_max_insurance_micro() -> Micro {
    UNIT_MICRO
}

fn default_payout_ratio_milli() -> u32 {
    1_500
}

fn default_registration_fee_micro() -> Micro {
    UNIT_MICRO
}

fn default_min_responses() -> usize {
    3
}

fn default_index_range() -> u8 {
    10
}

fn default_index_seed() -> String {
    "flightsurety".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EconomicTerms {
    /// Airlines admitted without a vote while fewer than this many are in.
    #[serde(default = "default_bootstrap_airline_limit")]
    pub bootstrap_airline_limit: usize,
    #[serde(default = "default_min_funds_micro")]
    pub min_funds_micro: Micro,
    #[serde(default = "default_max_insurance_micro")]
    pub max_insurance_micro: Micro,
    #[serde(default = "default_payout_ratio_milli")]
    pub payout_ratio_milli: u32,
    #[serde(default = "default_registration_fee_micro")]
    pub registration_fee_micro: Micro,
}

impl Default for EconomicTerms {
    fn default() -> Self {
        Self {
            bootstrap_airline_limit: default_bootstrap_airline_limit(),
            min_funds_micro: default_min_funds_micro(),
            max_insurance_micro: default_max_insurance_micro(),
            payout_ratio_milli: default_payout_ratio_milli(),
            registration_fee_micro: default_registration_fee_micro(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConsensusSettings {
    #[serde(default = "default_min_responses")]
    pub min_responses: usize,
    #[serde(default = "default_index_range")]
    pub index_range: u8,
    #[serde(default = "default_index_seed")]
    pub seed: String,
}

impl Default for ConsensusSettings {
    fn default() -> Self {
        Self {
            min_responses: default_min_responses(),
            index_range: default_index_range(),
            seed: default_index_seed(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuretyPolicy {
    #[serde(default)]
    pub economics: EconomicTerms,
    #[serde(default)]
    pub consensus: ConsensusSettings,
}

impl SuretyPolicy {
    pub fn validate(&self) -> Result<(), SuretyError> {
        if self.economics.max_insurance_micro == 0 {
            return Err(invalid_request("max_insurance_micro must be positive"));
        }
        if self.economics.min_funds_micro == 0 {
            return Err(invalid_request("min_funds_micro must be positive"));
        }
        if self.economics.registration_fee_micro == 0 {
            return Err(invalid_request("registration_fee_micro must be positive"));
        }
        if self.consensus.min_responses == 0 {
            return Err(invalid_request("min_responses must be at least 1"));
        }
        if usize::from(self.consensus.index_range) < INDEXES_PER_ORACLE {
            return Err(invalid_request(format!(
                "index_range must be at least {INDEXES_PER_ORACLE}"
            )));
        }
        // The largest possible credit must fit, so crediting never fails
        // halfway through a finalization.
        self.insurance_terms()
            .credit_for(self.economics.max_insurance_micro)
            .map(|_| ())
    }

    pub fn insurance_terms(&self) -> InsuranceTerms {
        InsuranceTerms {
            max_insurance_micro: self.economics.max_insurance_micro,
            payout_ratio_milli: self.economics.payout_ratio_milli,
        }
    }

    pub fn consensus_rules(&self) -> ConsensusRules {
        ConsensusRules {
            registration_fee_micro: self.economics.registration_fee_micro,
            min_responses: self.consensus.min_responses,
        }
    }

    pub fn index_generator(&self) -> Result<IndexGenerator, SuretyError> {
        IndexGenerator::new(self.consensus.seed.clone(), self.consensus.index_range)
    }
}
