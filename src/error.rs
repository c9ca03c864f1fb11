use thiserror::Error;

use crate::ledger::BlockHeight;

/// Canonical error type shared by the ledger and the reward calculator.
///
/// Every variant carries a stable numeric code (see [`SavingsError::code`]) so
/// callers outside the crate can match on it without depending on the enum.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SavingsError {
    /// The account already holds an active lock.
    #[error("account already has an active lock")]
    AlreadyLocked,

    /// Withdrawal requested for an account with no lock record.
    #[error("no active lock for account")]
    NoActiveLock,

    /// Withdrawal requested before the lock matured.
    #[error("lock not expired: matures at {lock_until}, current height {current_height}")]
    LockNotExpired {
        lock_until: BlockHeight,
        current_height: BlockHeight,
    },

    /// Locked amount must be strictly positive.
    #[error("invalid amount")]
    InvalidAmount,

    /// Lock period falls outside the permitted month range.
    #[error("invalid lock period of {months} months")]
    InvalidLockPeriod { months: u32 },

    /// The record was already settled.
    #[error("reward already claimed")]
    RewardAlreadyClaimed,

    /// Maturity height or payout does not fit the amount domain.
    #[error("arithmetic overflow")]
    Overflow,

    /// A restored snapshot does not hash to its recorded state root.
    #[error("state root mismatch: expected {expected}, computed {computed}")]
    StateRootMismatch { expected: String, computed: String },
}

impl SavingsError {
    pub fn code(&self) -> u32 {
        match self {
            SavingsError::AlreadyLocked => 101,
            SavingsError::NoActiveLock => 102,
            SavingsError::LockNotExpired { .. } => 103,
            SavingsError::InvalidAmount => 104,
            SavingsError::InvalidLockPeriod { .. } => 105,
            SavingsError::RewardAlreadyClaimed => 106,
            SavingsError::Overflow => 107,
            SavingsError::StateRootMismatch { .. } => 108,
        }
    }
}
