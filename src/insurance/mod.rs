pub mod policy;
pub mod types;

pub use policy::{InsurancePolicy, InsuranceTerms};
pub use types::{InsurancePurchase, PassengerCredit};
