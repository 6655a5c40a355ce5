//! Price feed sources behind the oracle gateway
//!
//! The gateway only depends on the `PriceFeed` interface. `ManualPriceFeed` is
//! an admin-posted source used on test networks and in tests.

use odra::prelude::*;
use odra::casper_types::U256;
use super::errors::LendingError;
use super::events::FeedPricePosted;
use super::price_oracle::PriceQuote;

/// External price source queried by the gateway
#[odra::external_contract]
pub trait PriceFeed {
    /// Latest price for a market's underlying (scaled by 1e18)
    fn latest_price(&self, market: Address) -> PriceQuote;
}

/// Price feed with admin-posted prices
#[odra::module]
pub struct ManualPriceFeed {
    /// Latest posted quote per market
    quotes: Mapping<Address, PriceQuote>,
    /// Admin address
    admin: Var<Address>,
}

#[odra::module]
impl ManualPriceFeed {
    pub fn init(&mut self) {
        self.admin.set(self.env().caller());
    }

    /// Post a price for a market (admin only)
    ///
    /// # Arguments
    /// * `market` - Market address
    /// * `price` - Value of one unit of underlying (scaled by 1e18)
    pub fn post_price(&mut self, market: Address, price: U256) {
        self.only_admin();

        if price.is_zero() {
            self.env().revert(LendingError::PriceUnavailable);
        }

        let timestamp = self.env().get_block_time();
        self.quotes.set(&market, PriceQuote { price, timestamp });
        self.env().emit_event(FeedPricePosted {
            market,
            price,
            timestamp,
        });
    }

    /// Latest posted price; zero if none was posted
    pub fn latest_price(&self, market: Address) -> PriceQuote {
        self.quotes.get(&market).unwrap_or(PriceQuote {
            price: U256::zero(),
            timestamp: 0,
        })
    }

    fn only_admin(&self) {
        let caller = self.env().caller();
        let admin = self.admin.get_or_revert_with(LendingError::Unauthorized);
        if caller != admin {
            self.env().revert(LendingError::Unauthorized);
        }
    }
}
