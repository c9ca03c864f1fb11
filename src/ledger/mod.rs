use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::SavingsError;
use crate::rewards::{RewardCalculator, RewardParams};

pub type AccountId = String;
pub type Amount = u64;
pub type BlockHeight = u64;

/// The single active lock an account may hold.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LockRecord {
    pub principal: Amount,
    pub lock_until: BlockHeight,
    pub start_height: BlockHeight,
    pub reward_claimed: bool,
}

impl LockRecord {
    pub fn is_matured(&self, current_height: BlockHeight) -> bool {
        current_height >= self.lock_until
    }

    /// Configured lock length in blocks; the reward is driven by this, not by
    /// how long after maturity the withdrawal happens.
    pub fn duration_blocks(&self) -> u64 {
        self.lock_until.saturating_sub(self.start_height)
    }
}

/// Payout preview for a matured lock.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Settlement {
    pub principal: Amount,
    pub reward: Amount,
    pub payout: Amount,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    Locked {
        account: AccountId,
        amount: Amount,
        lock_period_months: u32,
        start_height: BlockHeight,
        lock_until: BlockHeight,
    },
    Withdrawn {
        account: AccountId,
        principal: Amount,
        reward: Amount,
        height: BlockHeight,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub height: BlockHeight,
    pub records: BTreeMap<AccountId, LockRecord>,
    pub events: Vec<LedgerEvent>,
    pub state_root: [u8; 32],
}

/// Account ledger: at most one [`LockRecord`] per account, deleted on
/// successful withdrawal.
///
/// Failed operations never touch `records` or `events`.
#[derive(Clone, Debug, Default)]
pub struct SavingsLedger {
    records: BTreeMap<AccountId, LockRecord>,
    events: Vec<LedgerEvent>,
    calculator: RewardCalculator,
    last_height: BlockHeight,
}

impl SavingsLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(params: RewardParams) -> Self {
        Self {
            calculator: RewardCalculator::new(params),
            ..Self::default()
        }
    }

    pub fn calculator(&self) -> &RewardCalculator {
        &self.calculator
    }

    pub fn record(&self, account: &AccountId) -> Option<&LockRecord> {
        self.records.get(account)
    }

    pub fn records(&self) -> &BTreeMap<AccountId, LockRecord> {
        &self.records
    }

    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    pub fn balance_of(&self, account: &AccountId) -> Amount {
        self.records.get(account).map_or(0, |r| r.principal)
    }

    pub fn lock_maturity_of(&self, account: &AccountId) -> BlockHeight {
        self.records.get(account).map_or(0, |r| r.lock_until)
    }

    /// Run every lock check without mutating, returning the record that
    /// [`SavingsLedger::lock`] would insert.
    pub fn validate_lock(
        &self,
        account: &AccountId,
        amount: Amount,
        lock_period_months: u32,
        current_height: BlockHeight,
    ) -> Result<LockRecord, SavingsError> {
        if amount == 0 {
            return Err(SavingsError::InvalidAmount);
        }
        let params = self.calculator.params();
        if !params.lock_period_allowed(lock_period_months) {
            return Err(SavingsError::InvalidLockPeriod {
                months: lock_period_months,
            });
        }
        if self.records.contains_key(account) {
            return Err(SavingsError::AlreadyLocked);
        }
        let lock_until = params
            .months_to_blocks(lock_period_months)?
            .checked_add(current_height)
            .ok_or(SavingsError::Overflow)?;
        // settlement must fit in an Amount
        let reward = self.calculator.reward_for_months(amount, lock_period_months)?;
        amount.checked_add(reward).ok_or(SavingsError::Overflow)?;
        Ok(LockRecord {
            principal: amount,
            lock_until,
            start_height: current_height,
            reward_claimed: false,
        })
    }

    pub fn lock(
        &mut self,
        account: &AccountId,
        amount: Amount,
        lock_period_months: u32,
        current_height: BlockHeight,
    ) -> Result<LockRecord, SavingsError> {
        let record = self
            .validate_lock(account, amount, lock_period_months, current_height)
            .inspect_err(|err| debug!(%account, code = err.code(), "lock rejected: {err}"))?;
        info!(
            %account,
            amount,
            lock_period_months,
            lock_until = record.lock_until,
            "funds locked"
        );
        self.records.insert(account.clone(), record.clone());
        self.events.push(LedgerEvent::Locked {
            account: account.clone(),
            amount,
            lock_period_months,
            start_height: current_height,
            lock_until: record.lock_until,
        });
        self.observe(current_height);
        Ok(record)
    }

    pub fn quote_withdrawal(
        &self,
        account: &AccountId,
        current_height: BlockHeight,
    ) -> Result<Settlement, SavingsError> {
        let record = self
            .records
            .get(account)
            .ok_or(SavingsError::NoActiveLock)?;
        if !record.is_matured(current_height) {
            return Err(SavingsError::LockNotExpired {
                lock_until: record.lock_until,
                current_height,
            });
        }
        if record.reward_claimed {
            return Err(SavingsError::RewardAlreadyClaimed);
        }
        let reward = self
            .calculator
            .calculate_reward(record.principal, record.duration_blocks())?;
        let payout = record
            .principal
            .checked_add(reward)
            .ok_or(SavingsError::Overflow)?;
        Ok(Settlement {
            principal: record.principal,
            reward,
            payout,
        })
    }

    /// Settle a matured lock, returning `principal + reward`. The record is
    /// removed so the account may lock again.
    pub fn withdraw(
        &mut self,
        account: &AccountId,
        current_height: BlockHeight,
    ) -> Result<Amount, SavingsError> {
        let settlement = self
            .quote_withdrawal(account, current_height)
            .inspect_err(|err| debug!(%account, code = err.code(), "withdraw rejected: {err}"))?;
        if let Some(record) = self.records.get_mut(account) {
            record.reward_claimed = true;
        }
        self.records.remove(account);
        self.events.push(LedgerEvent::Withdrawn {
            account: account.clone(),
            principal: settlement.principal,
            reward: settlement.reward,
            height: current_height,
        });
        self.observe(current_height);
        info!(
            %account,
            principal = settlement.principal,
            reward = settlement.reward,
            "lock settled"
        );
        Ok(settlement.payout)
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            height: self.last_height,
            records: self.records.clone(),
            events: self.events.clone(),
            state_root: compute_state_root(&self.records, &self.events),
        }
    }

    /// Rebuild a ledger from a snapshot, refusing one whose records or event
    /// log do not hash to the recorded root.
    pub fn restore(snapshot: LedgerSnapshot, params: RewardParams) -> Result<Self, SavingsError> {
        let computed = compute_state_root(&snapshot.records, &snapshot.events);
        if computed != snapshot.state_root {
            return Err(SavingsError::StateRootMismatch {
                expected: hex::encode(snapshot.state_root),
                computed: hex::encode(computed),
            });
        }
        Ok(Self {
            records: snapshot.records,
            events: snapshot.events,
            calculator: RewardCalculator::new(params),
            last_height: snapshot.height,
        })
    }

    fn observe(&mut self, height: BlockHeight) {
        self.last_height = self.last_height.max(height);
    }
}

/// Root over the lock records and the event log.
pub fn compute_state_root(
    records: &BTreeMap<AccountId, LockRecord>,
    events: &[LedgerEvent],
) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"root");
    hasher.update(records_root(records));
    hasher.update(events_digest(events));
    hasher.finalize().into()
}

fn records_root(records: &BTreeMap<AccountId, LockRecord>) -> [u8; 32] {
    let leaves = records
        .iter()
        .map(|(account, record)| -> [u8; 32] {
            let mut hasher = Sha256::new();
            hasher.update(b"lock");
            hasher.update((account.len() as u64).to_le_bytes());
            hasher.update(account.as_bytes());
            hasher.update(record.principal.to_le_bytes());
            hasher.update(record.lock_until.to_le_bytes());
            hasher.update(record.start_height.to_le_bytes());
            hasher.update([record.reward_claimed as u8]);
            hasher.finalize().into()
        })
        .collect();
    build_merkle(leaves)
}

fn events_digest(events: &[LedgerEvent]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update((events.len() as u64).to_le_bytes());
    for event in events {
        match event {
            LedgerEvent::Locked {
                account,
                amount,
                lock_period_months,
                start_height,
                lock_until,
            } => {
                hasher.update(b"locked");
                hasher.update((account.len() as u64).to_le_bytes());
                hasher.update(account.as_bytes());
                hasher.update(amount.to_le_bytes());
                hasher.update(lock_period_months.to_le_bytes());
                hasher.update(start_height.to_le_bytes());
                hasher.update(lock_until.to_le_bytes());
            }
            LedgerEvent::Withdrawn {
                account,
                principal,
                reward,
                height,
            } => {
                hasher.update(b"withdrawn");
                hasher.update((account.len() as u64).to_le_bytes());
                hasher.update(account.as_bytes());
                hasher.update(principal.to_le_bytes());
                hasher.update(reward.to_le_bytes());
                hasher.update(height.to_le_bytes());
            }
        }
    }
    hasher.finalize().into()
}

fn build_merkle(mut leaves: Vec<[u8; 32]>) -> [u8; 32] {
    if leaves.is_empty() {
        return Sha256::digest(b"savings-ledger-empty").into();
    }
    while leaves.len() > 1 {
        let mut next = Vec::with_capacity(leaves.len().div_ceil(2));
        for chunk in leaves.chunks(2) {
            let mut hasher = Sha256::new();
            hasher.update(b"node");
            hasher.update(chunk[0]);
            hasher.update(chunk.get(1).unwrap_or(&chunk[0]));
            next.push(hasher.finalize().into());
        }
        leaves = next;
    }
    leaves[0]
}
