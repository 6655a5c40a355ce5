//! Error types for the lending protocol
//!
//! Every lending contract reverts with this enum, so a failure raised inside a
//! cross-contract call reaches the original caller with the same code.

use odra::prelude::*;

/// Errors that can occur in the lending protocol
#[odra::odra_error]
pub enum LendingError {
    // Authorization
    /// Caller is not the admin
    Unauthorized = 1,

    // Validation
    /// Zero amount not allowed (or the amount is worth zero shares)
    ZeroAmount = 10,
    /// Collateral or reserve factor outside [0, 1]
    InvalidFactor = 11,
    /// Interest rate model parameters out of range
    InvalidInterestRateParams = 12,
    /// Invalid configuration parameter
    InvalidConfiguration = 13,

    // Liquidity
    /// Account holds fewer shares than the operation burns
    InsufficientShares = 20,
    /// Market does not hold enough underlying cash
    InsufficientCash = 21,
    /// Operation would leave the account under-collateralized
    InsufficientLiquidity = 22,
    /// Account has no outstanding borrow in this market
    NoBorrowBalance = 23,
    /// Account still holds shares or debt in the market it tries to exit
    NonzeroPosition = 24,
    /// Reserve reduction larger than the market's reserves
    InsufficientReserves = 25,

    // Oracle
    /// Price oracle has not been activated
    OracleInactive = 30,
    /// Price oracle is already active
    AlreadyActive = 31,
    /// Attached fee is below the quoted price cost
    InsufficientFee = 32,
    /// Feed returned no usable price
    PriceUnavailable = 33,
    /// Feed price is older than the allowed age
    StalePrice = 34,
    /// Risk manager has no price oracle configured
    PriceOracleNotSet = 35,
    /// Fee withdrawal larger than the fees collected
    InsufficientFees = 36,

    // State
    /// Market is not listed in the risk manager
    MarketNotListed = 40,
    /// Market is already listed
    AlreadyListed = 41,
    /// Nested call into a market that is mid-operation
    Reentrant = 42,
    /// Native entry point called on a token market or vice versa
    WrongUnderlying = 43,

    // Transfer
    /// Underlying token transfer returned false
    TransferFailed = 50,

    // Math
    /// Math overflow occurred
    MathOverflow = 60,
    /// Math underflow occurred
    MathUnderflow = 61,
    /// Division by zero
    DivisionByZero = 62,
}
