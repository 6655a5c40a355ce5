//! Fixed-point arithmetic for the lending contracts
//! Fractions are mantissas scaled by 1e18 (exchange rates, factors, rates, prices, indexes)
use odra::casper_types::{U256, U512};
use crate::lending::errors::LendingError;

/// Scale of every mantissa (1.0 == 1e18)
pub const EXP_SCALE: u128 = 1_000_000_000_000_000_000;

/// `EXP_SCALE` as a U256
pub fn exp_scale() -> U256 {
    U256::from(EXP_SCALE)
}

/// Checked operations for U256
pub struct SafeMath;

impl SafeMath {
    /// Safe addition with overflow check
    pub fn add(a: U256, b: U256) -> Result<U256, LendingError> {
        a.checked_add(b).ok_or(LendingError::MathOverflow)
    }

    /// Safe subtraction with underflow check
    pub fn sub(a: U256, b: U256) -> Result<U256, LendingError> {
        a.checked_sub(b).ok_or(LendingError::MathUnderflow)
    }

    /// Safe multiplication with overflow check
    pub fn mul(a: U256, b: U256) -> Result<U256, LendingError> {
        a.checked_mul(b).ok_or(LendingError::MathOverflow)
    }

    /// Safe division with zero check
    pub fn div(a: U256, b: U256) -> Result<U256, LendingError> {
        if b.is_zero() {
            return Err(LendingError::DivisionByZero);
        }
        Ok(a / b)
    }

    /// Returns the minimum of two U256 values
    pub fn min(a: U256, b: U256) -> U256 {
        if a < b { a } else { b }
    }
}

/// Mantissa arithmetic
pub struct Exp;

impl Exp {
    /// `value * mantissa / 1e18`, truncated
    pub fn mul(value: U256, mantissa: U256) -> Result<U256, LendingError> {
        SafeMath::div(SafeMath::mul(value, mantissa)?, exp_scale())
    }

    /// `value * 1e18 / mantissa`, truncated
    pub fn div(value: U256, mantissa: U256) -> Result<U256, LendingError> {
        SafeMath::div(SafeMath::mul(value, exp_scale())?, mantissa)
    }

    /// `value * 1e18 / mantissa`, rounded up
    pub fn div_ceil(value: U256, mantissa: U256) -> Result<U256, LendingError> {
        let numerator = SafeMath::mul(value, exp_scale())?;
        let quotient = SafeMath::div(numerator, mantissa)?;
        if quotient * mantissa == numerator {
            Ok(quotient)
        } else {
            SafeMath::add(quotient, U256::one())
        }
    }

    /// Mantissa of `numerator / denominator`
    pub fn fraction(numerator: U256, denominator: U256) -> Result<U256, LendingError> {
        SafeMath::div(SafeMath::mul(numerator, exp_scale())?, denominator)
    }
}

/// Narrow a native amount to U256. Fails if the value does not fit.
pub fn u512_to_u256(value: U512) -> Result<U256, LendingError> {
    let mut bytes = [0u8; 64];
    value.to_little_endian(&mut bytes);
    if bytes[32..].iter().any(|b| *b != 0) {
        return Err(LendingError::MathOverflow);
    }
    Ok(U256::from_little_endian(&bytes[..32]))
}

/// Widen a U256 amount to a native amount
pub fn u256_to_u512(value: U256) -> U512 {
    let mut bytes = [0u8; 32];
    value.to_little_endian(&mut bytes);
    U512::from_little_endian(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exp(numerator: u128, denominator: u128) -> U256 {
        U256::from(EXP_SCALE) * U256::from(numerator) / U256::from(denominator)
    }

    #[test]
    fn test_mul_truncates() {
        // 7 * 0.5 = 3.5 -> 3
        assert_eq!(Exp::mul(U256::from(7), exp(1, 2)).unwrap(), U256::from(3));
        assert_eq!(Exp::mul(U256::from(100), exp(3, 1)).unwrap(), U256::from(300));
    }

    #[test]
    fn test_div_and_div_ceil() {
        // 0.1e18 underlying at 0.02 -> 5e18 shares
        let amount = U256::from(100_000_000_000_000_000u128);
        let rate = exp(2, 100);
        assert_eq!(Exp::div(amount, rate).unwrap(), U256::from(5_000_000_000_000_000_000u128));
        assert_eq!(Exp::div_ceil(amount, rate).unwrap(), U256::from(5_000_000_000_000_000_000u128));

        // 10 / 3 -> 3 truncated, 4 rounded up
        assert_eq!(Exp::div(U256::from(10), exp(3, 1)).unwrap(), U256::from(3));
        assert_eq!(Exp::div_ceil(U256::from(10), exp(3, 1)).unwrap(), U256::from(4));
    }

    #[test]
    fn test_division_by_zero() {
        assert!(matches!(Exp::div(U256::from(1), U256::zero()), Err(LendingError::DivisionByZero)));
        assert!(matches!(SafeMath::div(U256::from(1), U256::zero()), Err(LendingError::DivisionByZero)));
    }

    #[test]
    fn test_checked_bounds() {
        assert!(matches!(SafeMath::add(U256::MAX, U256::one()), Err(LendingError::MathOverflow)));
        assert!(matches!(SafeMath::sub(U256::zero(), U256::one()), Err(LendingError::MathUnderflow)));
        assert_eq!(SafeMath::min(U256::from(4), U256::from(9)), U256::from(4));
    }

    #[test]
    fn test_fraction() {
        assert_eq!(Exp::fraction(U256::from(1), U256::from(4)).unwrap(), exp(1, 4));
    }

    #[test]
    fn test_native_amount_conversion() {
        let amount = U256::from(123_456_789u64);
        assert_eq!(u512_to_u256(u256_to_u512(amount)).unwrap(), amount);

        let too_large = U512::one() << 300;
        assert!(matches!(u512_to_u256(too_large), Err(LendingError::MathOverflow)));
    }
}
