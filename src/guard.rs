use serde::{Deserialize, Serialize};

use crate::{
    error::{SuretyError, system_paused, unauthorized},
    types::Identity,
};

/// Process-wide switch that pauses every mutating call when cleared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationalGuard {
    owner: Identity,
    operational: bool,
}

impl OperationalGuard {
    pub fn new(owner: impl Into<Identity>) -> Self {
        Self {
            owner: owner.into(),
            operational: true,
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn is_operational(&self) -> bool {
        self.operational
    }

    pub fn is_owner(&self, caller: &str) -> bool {
        self.owner == caller
    }

    pub fn require_owner(&self, caller: &str) -> Result<(), SuretyError> {
        if !self.is_owner(caller) {
            return Err(unauthorized(format!(
                "caller '{caller}' is not the contract owner"
            )));
        }
        Ok(())
    }

    pub fn require_operational(&self) -> Result<(), SuretyError> {
        if !self.operational {
            return Err(system_paused());
        }
        Ok(())
    }

    /// Returns whether the flag actually changed.
    pub fn set_operational_status(
        &mut self,
        caller: &str,
        operational: bool,
    ) -> Result<bool, SuretyError> {
        self.require_owner(caller)?;
        let changed = self.operational != operational;
        self.operational = operational;
        Ok(changed)
    }
}
