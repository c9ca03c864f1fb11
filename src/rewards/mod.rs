use serde::{Deserialize, Serialize};

use crate::error::SavingsError;
use crate::ledger::Amount;

pub const REWARD_RATE_PERCENT: u64 = 5;
pub const ANNUAL_BLOCKS: u64 = 52_560; // ~10 minute blocks
pub const BLOCKS_PER_MONTH: u64 = 4_320;
pub const MIN_LOCK_MONTHS: u32 = 3;
pub const MAX_LOCK_MONTHS: u32 = 36;

/// Process-wide reward and lock-duration constants.
///
/// `blocks_per_month` only converts lock periods into maturity heights and is
/// independent of `annual_blocks` (12 * 4320 != 52560).
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RewardParams {
    pub reward_rate_percent: u64,
    pub annual_blocks: u64,
    pub blocks_per_month: u64,
    pub min_lock_months: u32,
    pub max_lock_months: u32,
}

impl Default for RewardParams {
    fn default() -> Self {
        Self {
            reward_rate_percent: REWARD_RATE_PERCENT,
            annual_blocks: ANNUAL_BLOCKS,
            blocks_per_month: BLOCKS_PER_MONTH,
            min_lock_months: MIN_LOCK_MONTHS,
            max_lock_months: MAX_LOCK_MONTHS,
        }
    }
}

impl RewardParams {
    pub fn lock_period_allowed(&self, months: u32) -> bool {
        (self.min_lock_months..=self.max_lock_months).contains(&months)
    }

    /// Convert a lock period into a block count.
    pub fn months_to_blocks(&self, months: u32) -> Result<u64, SavingsError> {
        u64::from(months)
            .checked_mul(self.blocks_per_month)
            .ok_or(SavingsError::Overflow)
    }
}

/// Pure reward formula over a fixed annual rate.
///
/// `reward = floor(amount * rate * duration / (annual_blocks * 100))`, with the
/// numerator widened to `u128` so no intermediate product can wrap.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RewardCalculator {
    params: RewardParams,
}

impl RewardCalculator {
    pub fn new(params: RewardParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &RewardParams {
        &self.params
    }

    pub fn get_reward_rate(&self) -> u64 {
        self.params.reward_rate_percent
    }

    pub fn get_annual_blocks(&self) -> u64 {
        self.params.annual_blocks
    }

    pub fn calculate_reward(
        &self,
        amount: Amount,
        duration_in_blocks: u64,
    ) -> Result<Amount, SavingsError> {
        let numerator = u128::from(amount)
            .checked_mul(u128::from(self.params.reward_rate_percent))
            .and_then(|v| v.checked_mul(u128::from(duration_in_blocks)))
            .ok_or(SavingsError::Overflow)?;
        let denominator = u128::from(self.params.annual_blocks) * 100;
        let reward = numerator
            .checked_div(denominator)
            .ok_or(SavingsError::Overflow)?;
        Amount::try_from(reward).map_err(|_| SavingsError::Overflow)
    }

    pub fn reward_for_months(&self, amount: Amount, months: u32) -> Result<Amount, SavingsError> {
        let duration = self.params.months_to_blocks(months)?;
        self.calculate_reward(amount, duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_year_lock_pays_five_percent() {
        let calc = RewardCalculator::default();
        assert_eq!(calc.calculate_reward(1_000, 52_560).unwrap(), 50);
    }

    #[test]
    fn accessors_return_fixed_constants() {
        let calc = RewardCalculator::default();
        assert_eq!(calc.get_reward_rate(), 5);
        assert_eq!(calc.get_annual_blocks(), 52_560);
    }

    #[test]
    fn partial_year_truncates_toward_zero() {
        let calc = RewardCalculator::default();
        // 1000 * 5 * 51840 / 5_256_000 = 49.31...
        assert_eq!(calc.calculate_reward(1_000, 12 * BLOCKS_PER_MONTH).unwrap(), 49);
        // 19 * 5 * 52560 / 5_256_000 = 0.95
        assert_eq!(calc.calculate_reward(19, ANNUAL_BLOCKS).unwrap(), 0);
        assert_eq!(calc.calculate_reward(20, ANNUAL_BLOCKS).unwrap(), 1);
    }

    #[test]
    fn zero_inputs_yield_zero() {
        let calc = RewardCalculator::default();
        assert_eq!(calc.calculate_reward(0, ANNUAL_BLOCKS).unwrap(), 0);
        assert_eq!(calc.calculate_reward(1_000, 0).unwrap(), 0);
    }

    #[test]
    fn large_principal_does_not_wrap() {
        let calc = RewardCalculator::default();
        let reward = calc
            .calculate_reward(u64::MAX, 36 * BLOCKS_PER_MONTH)
            .unwrap();
        let expected = u128::from(u64::MAX) * 5 * 155_520 / 5_256_000;
        assert_eq!(u128::from(reward), expected);
    }

    #[test]
    fn reward_exceeding_amount_domain_is_overflow() {
        let calc = RewardCalculator::default();
        let err = calc.calculate_reward(u64::MAX, u64::MAX).unwrap_err();
        assert_eq!(err, SavingsError::Overflow);
    }

    #[test]
    fn zero_annual_blocks_is_rejected_not_panicking() {
        let calc = RewardCalculator::new(RewardParams {
            annual_blocks: 0,
            ..RewardParams::default()
        });
        assert_eq!(
            calc.calculate_reward(1_000, 10).unwrap_err(),
            SavingsError::Overflow
        );
    }

    #[test]
    fn month_helper_uses_blocks_per_month() {
        let calc = RewardCalculator::default();
        assert_eq!(
            calc.reward_for_months(1_000, 12).unwrap(),
            calc.calculate_reward(1_000, 51_840).unwrap()
        );
    }

    #[test]
    fn lock_period_bounds_are_inclusive() {
        let params = RewardParams::default();
        assert!(!params.lock_period_allowed(2));
        assert!(params.lock_period_allowed(3));
        assert!(params.lock_period_allowed(36));
        assert!(!params.lock_period_allowed(37));
    }
}
