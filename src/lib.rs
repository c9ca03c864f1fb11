//! Time-locked savings ledger.
//!
//! Accounts lock a principal for a whole number of months (converted to a
//! block count). Once the host's block height reaches the maturity height the
//! principal plus a fixed-rate reward can be withdrawn exactly once.
//!
//! * [`ledger`] — the per-account lock state machine, event log and snapshots.
//! * [`rewards`] — the integer reward formula and its constants.
//! * [`host`] — block clock and custody capabilities supplied by the host.
//! * [`contracts`] — the caller-facing contract surface over a host.

pub mod config;
pub mod contracts;
pub mod host;
pub mod ledger;
pub mod rewards;

mod error;

pub use contracts::{ContractError, LockReceipt, SavingsContract, SharedContract};
pub use error::SavingsError;
pub use host::{BlockClock, Custody, CustodyError, MemoryHost};
pub use ledger::{AccountId, Amount, BlockHeight, LedgerEvent, LedgerSnapshot, LockRecord, SavingsLedger};
pub use rewards::{RewardCalculator, RewardParams};
