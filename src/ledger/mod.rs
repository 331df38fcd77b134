pub mod ledger;
pub mod types;

pub use ledger::Ledger;
pub use types::{Account, LedgerEntry, LedgerEntryId, LedgerEntryKind};
