//! Error definitions for the development underlying token
use odra::prelude::*;

/// Custom errors for the underlying token contract
#[odra::odra_error]
pub enum TokenError {
    /// Insufficient allowance for transfer
    InsufficientAllowance = 100,

    /// Insufficient balance for operation
    InsufficientBalance = 101,

    /// Caller may not mint
    Unauthorized = 102,
}
