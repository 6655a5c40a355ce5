//! Lending Protocol - Pooled lending markets with a shared risk manager
//!
//! Each listed asset gets its own `Market` holding supplier shares and
//! borrower debt. The `RiskManager` lists markets, tracks which markets an
//! account uses as collateral, and authorizes redeems and borrows against
//! prices from the fee-gated `PriceOracleGateway`.

pub mod interest_rate;
pub mod price_feed;
pub mod price_oracle;
pub mod market;
pub mod risk_manager;
pub mod errors;
pub mod events;


pub use interest_rate::InterestRateModel;
pub use price_feed::ManualPriceFeed;
pub use price_oracle::PriceOracleGateway;
pub use market::Market;
pub use risk_manager::RiskManager;
pub use errors::LendingError;
pub use events::*;
