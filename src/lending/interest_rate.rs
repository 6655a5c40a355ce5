//! Interest Rate Model - Jump rate model driven by market utilization
//!
//! - Base rate: borrow rate at zero utilization
//! - Multiplier: slope of the rate up to the kink
//! - Jump multiplier: slope of the rate above the kink
//!
//! Rates are per accrual period (one second), scaled by 1e18.

use odra::prelude::*;
use odra::casper_types::U256;
use super::errors::LendingError;
use super::events::InterestRateParamsUpdated;
use crate::math::{exp_scale, Exp, SafeMath};

/// Seconds in a year (365 days)
pub const SECONDS_PER_YEAR: u64 = 31_536_000;

/// Block time units in one accrual period (block time is in milliseconds)
pub const BLOCK_TIME_PER_PERIOD: u64 = 1_000;

/// Jump rate parameters, all per second and scaled by 1e18
#[odra::odra_type]
pub struct JumpRateParams {
    /// Borrow rate at zero utilization
    pub base_rate_per_second: U256,
    /// Rate increase per unit of utilization below the kink
    pub multiplier_per_second: U256,
    /// Rate increase per unit of utilization above the kink
    pub jump_multiplier_per_second: U256,
    /// Utilization at which the jump multiplier applies
    pub kink: U256,
}

impl JumpRateParams {
    /// Build per-second parameters from yearly ones
    pub fn from_yearly(
        base_rate_per_year: U256,
        multiplier_per_year: U256,
        jump_multiplier_per_year: U256,
        kink: U256,
    ) -> Self {
        let seconds = U256::from(SECONDS_PER_YEAR);
        Self {
            base_rate_per_second: base_rate_per_year / seconds,
            multiplier_per_second: multiplier_per_year / seconds,
            jump_multiplier_per_second: jump_multiplier_per_year / seconds,
            kink,
        }
    }

    pub fn validate(&self) -> Result<(), LendingError> {
        if self.kink > exp_scale() {
            return Err(LendingError::InvalidInterestRateParams);
        }
        Ok(())
    }

    /// Borrow rate per second
    ///
    /// - utilization <= kink: `base + utilization * multiplier`
    /// - utilization > kink: `base + kink * multiplier + (utilization - kink) * jump`
    pub fn borrow_rate(&self, cash: U256, borrows: U256, reserves: U256) -> Result<U256, LendingError> {
        let utilization = utilization_rate(cash, borrows, reserves)?;

        if utilization <= self.kink {
            let slope = Exp::mul(utilization, self.multiplier_per_second)?;
            return SafeMath::add(self.base_rate_per_second, slope);
        }

        let normal_rate = SafeMath::add(
            self.base_rate_per_second,
            Exp::mul(self.kink, self.multiplier_per_second)?,
        )?;
        let excess_utilization = SafeMath::sub(utilization, self.kink)?;
        SafeMath::add(normal_rate, Exp::mul(excess_utilization, self.jump_multiplier_per_second)?)
    }

    /// Supply rate per second: `borrow_rate * utilization * (1 - reserve_factor)`
    pub fn supply_rate(
        &self,
        cash: U256,
        borrows: U256,
        reserves: U256,
        reserve_factor: U256,
    ) -> Result<U256, LendingError> {
        if reserve_factor > exp_scale() {
            return Err(LendingError::InvalidFactor);
        }
        let utilization = utilization_rate(cash, borrows, reserves)?;
        let borrow_rate = self.borrow_rate(cash, borrows, reserves)?;
        let rate_to_pool = Exp::mul(borrow_rate, exp_scale() - reserve_factor)?;
        Exp::mul(utilization, rate_to_pool)
    }
}

/// Utilization: `borrows / (cash + borrows - reserves)`, clamped to [0, 1]
///
/// Zero when there are no borrows or the denominator is zero. Reserves larger
/// than `cash + borrows` are rejected.
pub fn utilization_rate(cash: U256, borrows: U256, reserves: U256) -> Result<U256, LendingError> {
    if borrows.is_zero() {
        return Ok(U256::zero());
    }

    let gross = SafeMath::add(cash, borrows)?;
    let denominator = SafeMath::sub(gross, reserves)?;
    if denominator.is_zero() {
        return Ok(U256::zero());
    }

    let utilization = Exp::fraction(borrows, denominator)?;
    Ok(SafeMath::min(utilization, exp_scale()))
}

/// Interest Rate Model contract
#[odra::module]
pub struct InterestRateModel {
    /// Interest rate parameters
    params: Var<JumpRateParams>,
    /// Admin address
    admin: Var<Address>,
}

#[odra::module]
impl InterestRateModel {
    /// Initialize the model from yearly parameters (scaled by 1e18)
    ///
    /// # Arguments
    /// * `base_rate_per_year` - Borrow rate at zero utilization
    /// * `multiplier_per_year` - Slope below the kink
    /// * `jump_multiplier_per_year` - Slope above the kink
    /// * `kink` - Utilization where the jump multiplier starts
    pub fn init(
        &mut self,
        base_rate_per_year: U256,
        multiplier_per_year: U256,
        jump_multiplier_per_year: U256,
        kink: U256,
    ) {
        self.admin.set(self.env().caller());
        self.store_params(base_rate_per_year, multiplier_per_year, jump_multiplier_per_year, kink);
    }

    /// Borrow rate per second for the given market balances
    pub fn get_borrow_rate(&self, cash: U256, borrows: U256, reserves: U256) -> U256 {
        self.params()
            .borrow_rate(cash, borrows, reserves)
            .unwrap_or_else(|e| self.env().revert(e))
    }

    /// Supply rate per second for the given market balances
    pub fn get_supply_rate(&self, cash: U256, borrows: U256, reserves: U256, reserve_factor: U256) -> U256 {
        self.params()
            .supply_rate(cash, borrows, reserves, reserve_factor)
            .unwrap_or_else(|e| self.env().revert(e))
    }

    /// Utilization rate (scaled by 1e18)
    pub fn utilization_rate(&self, cash: U256, borrows: U256, reserves: U256) -> U256 {
        utilization_rate(cash, borrows, reserves).unwrap_or_else(|e| self.env().revert(e))
    }

    /// Get current interest rate parameters
    pub fn get_params(&self) -> JumpRateParams {
        self.params()
    }

    /// Update interest rate parameters (admin only)
    pub fn update_params(
        &mut self,
        base_rate_per_year: U256,
        multiplier_per_year: U256,
        jump_multiplier_per_year: U256,
        kink: U256,
    ) {
        self.only_admin();
        self.store_params(base_rate_per_year, multiplier_per_year, jump_multiplier_per_year, kink);
    }

    fn store_params(
        &mut self,
        base_rate_per_year: U256,
        multiplier_per_year: U256,
        jump_multiplier_per_year: U256,
        kink: U256,
    ) {
        let params = JumpRateParams::from_yearly(
            base_rate_per_year,
            multiplier_per_year,
            jump_multiplier_per_year,
            kink,
        );
        if let Err(e) = params.validate() {
            self.env().revert(e);
        }

        self.env().emit_event(InterestRateParamsUpdated {
            base_rate_per_second: params.base_rate_per_second,
            multiplier_per_second: params.multiplier_per_second,
            jump_multiplier_per_second: params.jump_multiplier_per_second,
            kink: params.kink,
        });
        self.params.set(params);
    }

    fn params(&self) -> JumpRateParams {
        self.params.get_or_revert_with(LendingError::InvalidConfiguration)
    }

    fn only_admin(&self) {
        let caller = self.env().caller();
        let admin = self.admin.get_or_revert_with(LendingError::Unauthorized);
        if caller != admin {
            self.env().revert(LendingError::Unauthorized);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::EXP_SCALE;

    fn exp(numerator: u128, denominator: u128) -> U256 {
        U256::from(EXP_SCALE) * U256::from(numerator) / U256::from(denominator)
    }

    /// base 2%, multiplier 10%, jump 100%, kink 80% (per second for easy numbers)
    fn params() -> JumpRateParams {
        JumpRateParams {
            base_rate_per_second: exp(2, 100),
            multiplier_per_second: exp(10, 100),
            jump_multiplier_per_second: exp(1, 1),
            kink: exp(80, 100),
        }
    }

    #[test]
    fn test_utilization_calculation() {
        // borrows = 500, cash = 500 -> 50%
        let u = utilization_rate(U256::from(500), U256::from(500), U256::zero()).unwrap();
        assert_eq!(u, exp(1, 2));

        // reserves shrink the denominator: 500 / (600 + 500 - 100) = 50%
        let u = utilization_rate(U256::from(600), U256::from(500), U256::from(100)).unwrap();
        assert_eq!(u, exp(1, 2));
    }

    #[test]
    fn test_utilization_edge_cases() {
        assert_eq!(utilization_rate(U256::from(1000), U256::zero(), U256::zero()).unwrap(), U256::zero());
        // denominator == 0
        assert_eq!(utilization_rate(U256::zero(), U256::from(100), U256::from(100)).unwrap(), U256::zero());
        // denominator below borrows clamps to 1
        assert_eq!(utilization_rate(U256::zero(), U256::from(100), U256::from(50)).unwrap(), exp(1, 1));
        // reserves larger than everything are rejected
        assert!(matches!(
            utilization_rate(U256::from(10), U256::from(10), U256::from(30)),
            Err(LendingError::MathUnderflow)
        ));
    }

    #[test]
    fn test_borrow_rate_before_kink() {
        // utilization 50% -> 2% + 0.5 * 10% = 7%
        let rate = params().borrow_rate(U256::from(500), U256::from(500), U256::zero()).unwrap();
        assert_eq!(rate, exp(7, 100));
    }

    #[test]
    fn test_borrow_rate_after_kink() {
        // utilization 90% -> 2% + 0.8 * 10% + 0.1 * 100% = 20%
        let rate = params().borrow_rate(U256::from(100), U256::from(900), U256::zero()).unwrap();
        assert_eq!(rate, exp(20, 100));
    }

    #[test]
    fn test_supply_rate() {
        // 7% * 50% * (1 - 20%) = 2.8%
        let rate = params()
            .supply_rate(U256::from(500), U256::from(500), U256::zero(), exp(20, 100))
            .unwrap();
        assert_eq!(rate, exp(28, 1000));
    }

    #[test]
    fn test_supply_rate_rejects_bad_reserve_factor() {
        let result = params().supply_rate(U256::from(500), U256::from(500), U256::zero(), exp(2, 1));
        assert!(matches!(result, Err(LendingError::InvalidFactor)));
    }

    #[test]
    fn test_from_yearly() {
        let p = JumpRateParams::from_yearly(
            U256::from(SECONDS_PER_YEAR) * U256::from(3),
            U256::from(SECONDS_PER_YEAR) * U256::from(5),
            U256::from(SECONDS_PER_YEAR),
            exp(9, 10),
        );
        assert_eq!(p.base_rate_per_second, U256::from(3));
        assert_eq!(p.multiplier_per_second, U256::from(5));
        assert_eq!(p.jump_multiplier_per_second, U256::one());
        assert!(p.validate().is_ok());

        let bad_kink = JumpRateParams { kink: exp(3, 2), ..p };
        assert!(matches!(bad_kink.validate(), Err(LendingError::InvalidInterestRateParams)));
    }
}
