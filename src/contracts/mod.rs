use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::SavingsError;
use crate::host::{BlockClock, Custody, CustodyError};
use crate::ledger::{AccountId, Amount, BlockHeight, LedgerSnapshot, SavingsLedger};
use crate::rewards::RewardParams;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContractError {
    #[error(transparent)]
    Ledger(#[from] SavingsError),
    #[error(transparent)]
    Custody(#[from] CustodyError),
}

impl ContractError {
    pub fn code(&self) -> u32 {
        match self {
            ContractError::Ledger(err) => err.code(),
            ContractError::Custody(err) => err.code(),
        }
    }
}

/// Acknowledgment for a successful lock.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LockReceipt {
    pub amount: Amount,
    pub start_height: BlockHeight,
    pub lock_until: BlockHeight,
}

/// Savings contract bound to a host environment.
///
/// Mutating calls take the acting account explicitly and read the block
/// height from the host at the start of the call. Ledger validation runs
/// before any funds move, and the ledger is only committed once the transfer
/// has succeeded.
#[derive(Debug)]
pub struct SavingsContract<H> {
    ledger: SavingsLedger,
    host: H,
}

impl<H: BlockClock + Custody> SavingsContract<H> {
    pub fn new(host: H) -> Self {
        Self::with_ledger(SavingsLedger::new(), host)
    }

    pub fn with_params(host: H, params: RewardParams) -> Self {
        Self::with_ledger(SavingsLedger::with_params(params), host)
    }

    pub fn with_ledger(ledger: SavingsLedger, host: H) -> Self {
        Self { ledger, host }
    }

    pub fn ledger(&self) -> &SavingsLedger {
        &self.ledger
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn into_parts(self) -> (SavingsLedger, H) {
        (self.ledger, self.host)
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        self.ledger.snapshot()
    }

    pub fn lock(
        &mut self,
        caller: &AccountId,
        amount: Amount,
        lock_period_months: u32,
    ) -> Result<LockReceipt, ContractError> {
        let height = self.host.block_height();
        self.ledger
            .validate_lock(caller, amount, lock_period_months, height)?;
        self.host.deposit(caller, amount).inspect_err(|err| {
            warn!(account = %caller, amount, "custody deposit failed: {err}")
        })?;
        let record = self.ledger.lock(caller, amount, lock_period_months, height)?;
        Ok(LockReceipt {
            amount,
            start_height: record.start_height,
            lock_until: record.lock_until,
        })
    }

    pub fn withdraw(&mut self, caller: &AccountId) -> Result<Amount, ContractError> {
        let height = self.host.block_height();
        let settlement = self.ledger.quote_withdrawal(caller, height)?;
        self.host.release(caller, settlement.payout).inspect_err(|err| {
            warn!(account = %caller, payout = settlement.payout, "custody release failed: {err}")
        })?;
        Ok(self.ledger.withdraw(caller, height)?)
    }

    pub fn get_balance(&self, account: &AccountId) -> Amount {
        self.ledger.balance_of(account)
    }

    pub fn get_lock_time(&self, account: &AccountId) -> BlockHeight {
        self.ledger.lock_maturity_of(account)
    }

    pub fn get_reward_rate(&self) -> u64 {
        self.ledger.calculator().get_reward_rate()
    }

    pub fn get_annual_blocks(&self) -> u64 {
        self.ledger.calculator().get_annual_blocks()
    }

    pub fn calculate_reward(&self, amount: Amount, duration: u64) -> Result<Amount, SavingsError> {
        self.ledger.calculator().calculate_reward(amount, duration)
    }
}

/// Cloneable handle serializing every call through one mutex, so each
/// validate-transfer-commit sequence runs alone.
#[derive(Debug)]
pub struct SharedContract<H> {
    inner: Arc<Mutex<SavingsContract<H>>>,
}

impl<H> Clone for SharedContract<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<H: BlockClock + Custody> SharedContract<H> {
    pub fn new(contract: SavingsContract<H>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(contract)),
        }
    }

    fn guard(&self) -> MutexGuard<'_, SavingsContract<H>> {
        // State is only written after all checks pass, so a poisoned guard
        // still holds a consistent ledger.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn lock(
        &self,
        caller: &AccountId,
        amount: Amount,
        lock_period_months: u32,
    ) -> Result<LockReceipt, ContractError> {
        self.guard().lock(caller, amount, lock_period_months)
    }

    pub fn withdraw(&self, caller: &AccountId) -> Result<Amount, ContractError> {
        self.guard().withdraw(caller)
    }

    pub fn get_balance(&self, account: &AccountId) -> Amount {
        self.guard().get_balance(account)
    }

    pub fn get_lock_time(&self, account: &AccountId) -> BlockHeight {
        self.guard().get_lock_time(account)
    }

    /// Run `f` against the contract with the lock held.
    pub fn with<R>(&self, f: impl FnOnce(&mut SavingsContract<H>) -> R) -> R {
        f(&mut self.guard())
    }
}
