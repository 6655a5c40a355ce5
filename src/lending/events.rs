//! Events for the lending protocol

use odra::prelude::*;
use odra::casper_types::{U256, U512};

// ============================================================================
// Market Events
// ============================================================================

/// Event emitted when underlying is supplied and shares are minted
#[odra::event]
pub struct Mint {
    /// Supplier
    pub minter: Address,
    /// Underlying supplied
    pub amount: U256,
    /// Shares minted
    pub shares: U256,
}

/// Event emitted when shares are burned for underlying
#[odra::event]
pub struct Redeem {
    /// Redeemer
    pub redeemer: Address,
    /// Underlying paid out
    pub amount: U256,
    /// Shares burned
    pub shares: U256,
}

/// Event emitted when underlying is borrowed
#[odra::event]
pub struct Borrow {
    /// Borrower
    pub borrower: Address,
    /// Amount borrowed
    pub amount: U256,
    /// Borrower's debt after the borrow
    pub account_borrows: U256,
    /// Market total borrows after the borrow
    pub total_borrows: U256,
}

/// Event emitted when a borrow is repaid
#[odra::event]
pub struct RepayBorrow {
    /// Payer (also the borrower)
    pub borrower: Address,
    /// Amount actually repaid
    pub amount: U256,
    /// Borrower's debt after the repayment
    pub account_borrows: U256,
    /// Market total borrows after the repayment
    pub total_borrows: U256,
}

/// Event emitted when interest is accrued
#[odra::event]
pub struct AccrueInterest {
    /// Cash at accrual time
    pub cash: U256,
    /// Interest added to total borrows
    pub interest_accumulated: U256,
    /// New borrow index
    pub borrow_index: U256,
    /// New total borrows
    pub total_borrows: U256,
}

/// Event emitted when the reserve factor changes
#[odra::event]
pub struct ReserveFactorUpdated {
    /// Old reserve factor
    pub old_factor: U256,
    /// New reserve factor
    pub new_factor: U256,
}

/// Event emitted when the market switches interest rate model
#[odra::event]
pub struct InterestRateModelUpdated {
    /// Previous model
    pub old_model: Address,
    /// New model
    pub new_model: Address,
}

/// Event emitted when reserves are paid out to the admin
#[odra::event]
pub struct ReservesReduced {
    /// Recipient
    pub admin: Address,
    /// Amount paid out
    pub amount: U256,
    /// Reserves left
    pub total_reserves: U256,
}

// ============================================================================
// Risk Manager Events
// ============================================================================

/// Event emitted when a market is listed
#[odra::event]
pub struct MarketListed {
    /// Market address
    pub market: Address,
}

/// Event emitted when a market's collateral factor changes
#[odra::event]
pub struct CollateralFactorUpdated {
    /// Market address
    pub market: Address,
    /// Old collateral factor
    pub old_factor: U256,
    /// New collateral factor
    pub new_factor: U256,
}

/// Event emitted when the risk manager switches price oracle
#[odra::event]
pub struct PriceOracleUpdated {
    /// Previous oracle, if any
    pub old_oracle: Option<Address>,
    /// New oracle
    pub new_oracle: Address,
}

/// Event emitted when an account enters a market
#[odra::event]
pub struct MarketEntered {
    /// Market address
    pub market: Address,
    /// Account
    pub account: Address,
}

/// Event emitted when an account exits a market
#[odra::event]
pub struct MarketExited {
    /// Market address
    pub market: Address,
    /// Account
    pub account: Address,
}

// ============================================================================
// Interest Rate Events
// ============================================================================

/// Event emitted when interest rate parameters are updated
#[odra::event]
pub struct InterestRateParamsUpdated {
    /// Base rate per second
    pub base_rate_per_second: U256,
    /// Multiplier per second
    pub multiplier_per_second: U256,
    /// Jump multiplier per second
    pub jump_multiplier_per_second: U256,
    /// Utilization kink
    pub kink: U256,
}

// ============================================================================
// Oracle Events
// ============================================================================

/// Event emitted when the oracle gateway is switched on
#[odra::event]
pub struct OracleActivated {
    /// Admin that activated it
    pub activated_by: Address,
}

/// Event emitted when a market's price cost changes
#[odra::event]
pub struct PriceCostUpdated {
    /// Market, or None for the default cost
    pub market: Option<Address>,
    /// New cost
    pub cost: U512,
}

/// Event emitted when a paid price pull happens
#[odra::event]
pub struct PricePulled {
    /// Market priced
    pub market: Address,
    /// Price (scaled by 1e18)
    pub price: U256,
    /// Feed timestamp
    pub timestamp: u64,
}

/// Event emitted when the accepted feed price age changes
#[odra::event]
pub struct MaxPriceAgeUpdated {
    /// Previous maximum age
    pub old_age: u64,
    /// New maximum age, 0 disables the check
    pub new_age: u64,
}

/// Event emitted when the gateway switches to another feed
#[odra::event]
pub struct FeedUpdated {
    /// Previous feed
    pub old_feed: Address,
    /// New feed
    pub new_feed: Address,
}

/// Event emitted when collected fees are withdrawn
#[odra::event]
pub struct FeesWithdrawn {
    /// Recipient
    pub recipient: Address,
    /// Amount withdrawn
    pub amount: U512,
}

/// Event emitted when a price is posted to the manual feed
#[odra::event]
pub struct FeedPricePosted {
    /// Market priced
    pub market: Address,
    /// Price (scaled by 1e18)
    pub price: U256,
    /// Post time
    pub timestamp: u64,
}
