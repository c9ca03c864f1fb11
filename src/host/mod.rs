use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ledger::{AccountId, Amount, BlockHeight};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CustodyError {
    #[error("insufficient funds in account {account}: needed {needed}, available {available}")]
    InsufficientFunds {
        account: AccountId,
        needed: Amount,
        available: Amount,
    },
    #[error("vault reserve too low: needed {needed}, available {available}")]
    InsufficientReserve { needed: Amount, available: Amount },
    #[error("crediting {amount} would overflow the balance of {holder}")]
    BalanceOverflow { holder: String, amount: Amount },
}

impl CustodyError {
    pub fn code(&self) -> u32 {
        match self {
            CustodyError::InsufficientFunds { .. } => 201,
            CustodyError::InsufficientReserve { .. } => 202,
            CustodyError::BalanceOverflow { .. } => 203,
        }
    }
}

const VAULT_HOLDER: &str = "vault";

/// Source of the current block height.
pub trait BlockClock {
    fn block_height(&self) -> BlockHeight;
}

/// Value-transfer primitive moving funds into and out of the vault.
///
/// A failed call must not move anything.
pub trait Custody {
    fn deposit(&mut self, from: &AccountId, amount: Amount) -> Result<(), CustodyError>;
    fn release(&mut self, to: &AccountId, amount: Amount) -> Result<(), CustodyError>;
}

/// In-process host: a block counter, wallet balances, and the vault that holds
/// locked principal plus the reward reserve.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MemoryHost {
    height: BlockHeight,
    wallets: BTreeMap<AccountId, Amount>,
    vault: Amount,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at_height(height: BlockHeight) -> Self {
        Self {
            height,
            ..Self::default()
        }
    }

    pub fn advance(&mut self, blocks: u64) -> BlockHeight {
        self.height = self.height.saturating_add(blocks);
        self.height
    }

    /// Move the clock forward to `height`; earlier heights are ignored so the
    /// counter never decreases.
    pub fn set_height(&mut self, height: BlockHeight) -> BlockHeight {
        self.height = self.height.max(height);
        self.height
    }

    pub fn credit(&mut self, account: &AccountId, amount: Amount) -> Result<(), CustodyError> {
        let balance = self.credited_wallet(account, amount)?;
        self.wallets.insert(account.clone(), balance);
        Ok(())
    }

    pub fn fund_vault(&mut self, amount: Amount) -> Result<(), CustodyError> {
        self.vault = self.credited_vault(amount)?;
        Ok(())
    }

    fn credited_wallet(&self, account: &AccountId, amount: Amount) -> Result<Amount, CustodyError> {
        self.wallet_balance(account)
            .checked_add(amount)
            .ok_or_else(|| CustodyError::BalanceOverflow {
                holder: account.clone(),
                amount,
            })
    }

    fn credited_vault(&self, amount: Amount) -> Result<Amount, CustodyError> {
        self.vault
            .checked_add(amount)
            .ok_or_else(|| CustodyError::BalanceOverflow {
                holder: VAULT_HOLDER.to_string(),
                amount,
            })
    }

    pub fn wallet_balance(&self, account: &AccountId) -> Amount {
        self.wallets.get(account).copied().unwrap_or(0)
    }

    pub fn vault_balance(&self) -> Amount {
        self.vault
    }
}

impl BlockClock for MemoryHost {
    fn block_height(&self) -> BlockHeight {
        self.height
    }
}

impl Custody for MemoryHost {
    fn deposit(&mut self, from: &AccountId, amount: Amount) -> Result<(), CustodyError> {
        let available = self.wallet_balance(from);
        if available < amount {
            return Err(CustodyError::InsufficientFunds {
                account: from.clone(),
                needed: amount,
                available,
            });
        }
        let vault = self.credited_vault(amount)?;
        self.wallets.insert(from.clone(), available - amount);
        self.vault = vault;
        Ok(())
    }

    fn release(&mut self, to: &AccountId, amount: Amount) -> Result<(), CustodyError> {
        if self.vault < amount {
            return Err(CustodyError::InsufficientReserve {
                needed: amount,
                available: self.vault,
            });
        }
        let balance = self.credited_wallet(to, amount)?;
        self.vault -= amount;
        self.wallets.insert(to.clone(), balance);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn height_never_moves_backwards() {
        let mut host = MemoryHost::at_height(100);
        assert_eq!(host.set_height(50), 100);
        assert_eq!(host.advance(10), 110);
        assert_eq!(host.block_height(), 110);
    }

    #[test]
    fn deposit_moves_funds_into_vault() {
        let mut host = MemoryHost::new();
        host.credit(&"alice".to_string(), 1_500).unwrap();
        host.deposit(&"alice".to_string(), 1_000).unwrap();
        assert_eq!(host.wallet_balance(&"alice".to_string()), 500);
        assert_eq!(host.vault_balance(), 1_000);
    }

    #[test]
    fn failed_transfers_move_nothing() {
        let mut host = MemoryHost::new();
        host.credit(&"alice".to_string(), 10).unwrap();
        let err = host.deposit(&"alice".to_string(), 11).unwrap_err();
        assert_eq!(err.code(), 201);
        let err = host.release(&"alice".to_string(), 1).unwrap_err();
        match err {
            CustodyError::InsufficientReserve { needed, available } => {
                assert_eq!(needed, 1);
                assert_eq!(available, 0);
            }
            _ => panic!("unexpected error"),
        }
        assert_eq!(host.wallet_balance(&"alice".to_string()), 10);
        assert_eq!(host.vault_balance(), 0);
    }

    #[test]
    fn overflowing_credits_move_nothing() {
        let alice = "alice".to_string();
        let mut host = MemoryHost::new();
        host.credit(&alice, 1_000).unwrap();
        host.fund_vault(u64::MAX - 10).unwrap();

        let err = host.deposit(&alice, 1_000).unwrap_err();
        assert_eq!(err.code(), 203);
        assert_eq!(host.wallet_balance(&alice), 1_000);
        assert_eq!(host.vault_balance(), u64::MAX - 10);
        assert!(host.fund_vault(11).is_err());
        assert_eq!(host.vault_balance(), u64::MAX - 10);

        let bob = "bob".to_string();
        host.credit(&bob, u64::MAX).unwrap();
        match host.release(&bob, 500).unwrap_err() {
            CustodyError::BalanceOverflow { holder, amount } => {
                assert_eq!(holder, "bob");
                assert_eq!(amount, 500);
            }
            _ => panic!("unexpected error"),
        }
        assert_eq!(host.wallet_balance(&bob), u64::MAX);
        assert_eq!(host.vault_balance(), u64::MAX - 10);
        assert!(host.credit(&bob, 1).is_err());
    }
}
