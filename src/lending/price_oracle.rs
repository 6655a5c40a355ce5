//! Price Oracle Gateway - Fee-gated access to an external price feed
//!
//! A price pull costs native tokens. Callers read the quote with
//! `get_price_cost` and attach at least that much to the pulling call.
//! The gateway keeps everything it is paid, surplus included; the admin can
//! withdraw collected fees.
//!
//! The gateway starts inactive and must be switched on once by the admin.

use odra::prelude::*;
use odra::casper_types::{U256, U512};
use odra::ContractRef;
use super::errors::LendingError;
use super::events::*;
use super::price_feed::PriceFeedContractRef;

/// A price and the feed time it was observed at
#[odra::odra_type]
pub struct PriceQuote {
    /// Value of one unit of underlying (scaled by 1e18)
    pub price: U256,
    /// Feed timestamp (block time)
    pub timestamp: u64,
}

/// Oracle interface used by the risk manager
#[odra::external_contract]
pub trait PriceOracle {
    /// Native fee required to pull a fresh price for `market`
    fn get_price_cost(&self, market: Address) -> U512;

    /// Pull fresh prices for all `markets` in one paid call
    fn get_underlying_prices(&mut self, markets: Vec<Address>) -> Vec<PriceQuote>;
}

/// Price Oracle Gateway contract
#[odra::module]
pub struct PriceOracleGateway {
    /// External feed address
    feed: Var<Address>,
    /// Admin address
    admin: Var<Address>,
    /// Whether price pulls are enabled
    active: Var<bool>,
    /// Cost for markets without an explicit cost
    default_price_cost: Var<U512>,
    /// Per-market cost overrides
    price_costs: Mapping<Address, U512>,
    /// Maximum feed price age in block time units (0 disables the check)
    max_price_age: Var<u64>,
    /// Fees received and not yet withdrawn
    collected_fees: Var<U512>,
    /// Last pulled quote per market
    last_quotes: Mapping<Address, PriceQuote>,
}

#[odra::module]
impl PriceOracleGateway {
    /// Initialize the gateway (inactive)
    ///
    /// # Arguments
    /// * `feed` - Price feed contract address
    /// * `default_price_cost` - Fee per market price pull
    pub fn init(&mut self, feed: Address, default_price_cost: U512) {
        self.admin.set(self.env().caller());
        self.feed.set(feed);
        self.default_price_cost.set(default_price_cost);
        self.active.set(false);
        self.max_price_age.set(0);
        self.collected_fees.set(U512::zero());
    }

    /// Switch price pulls on (admin only, one way)
    pub fn activate(&mut self) {
        self.only_admin();
        if self.active.get_or_default() {
            self.env().revert(LendingError::AlreadyActive);
        }
        self.active.set(true);
        self.env().emit_event(OracleActivated {
            activated_by: self.env().caller(),
        });
    }

    pub fn is_active(&self) -> bool {
        self.active.get_or_default()
    }

    // ========================================
    // Quotes
    // ========================================

    /// Native fee required to pull a fresh price for `market`
    pub fn get_price_cost(&self, market: Address) -> U512 {
        self.price_costs
            .get(&market)
            .unwrap_or_else(|| self.default_price_cost.get_or_default())
    }

    /// Sum of the price costs of `markets`
    pub fn get_total_price_cost(&self, markets: Vec<Address>) -> U512 {
        markets
            .iter()
            .try_fold(U512::zero(), |total, market| total.checked_add(self.get_price_cost(*market)))
            .unwrap_or_revert_with(&self.env(), LendingError::MathOverflow)
    }

    /// Pull a fresh price for one market
    ///
    /// Requires the gateway to be active and an attached fee of at least
    /// `get_price_cost(market)`.
    #[odra(payable)]
    pub fn get_underlying_price(&mut self, market: Address) -> PriceQuote {
        self.ensure_active();
        self.charge(self.get_price_cost(market));
        self.pull(market)
    }

    /// Pull fresh prices for several markets, in order
    ///
    /// The attached fee must cover the summed cost. An empty batch keeps the
    /// attached value and returns no quotes without requiring activation.
    #[odra(payable)]
    pub fn get_underlying_prices(&mut self, markets: Vec<Address>) -> Vec<PriceQuote> {
        if markets.is_empty() {
            self.charge(U512::zero());
            return Vec::new();
        }

        self.ensure_active();
        self.charge(self.get_total_price_cost(markets.clone()));
        markets.into_iter().map(|market| self.pull(market)).collect()
    }

    /// Last pulled quote for a market, free of charge
    pub fn last_price(&self, market: Address) -> Option<PriceQuote> {
        self.last_quotes.get(&market)
    }

    // ========================================
    // Admin Functions
    // ========================================

    /// Set the price cost of one market (admin only)
    pub fn set_price_cost(&mut self, market: Address, cost: U512) {
        self.only_admin();
        self.price_costs.set(&market, cost);
        self.env().emit_event(PriceCostUpdated {
            market: Some(market),
            cost,
        });
    }

    /// Set the cost for markets without an override (admin only)
    pub fn set_default_price_cost(&mut self, cost: U512) {
        self.only_admin();
        self.default_price_cost.set(cost);
        self.env().emit_event(PriceCostUpdated { market: None, cost });
    }

    /// Set the maximum accepted feed price age, 0 to disable (admin only)
    pub fn set_max_price_age(&mut self, max_age: u64) {
        self.only_admin();
        let old_age = self.max_price_age.get_or_default();
        self.max_price_age.set(max_age);
        self.env().emit_event(MaxPriceAgeUpdated {
            old_age,
            new_age: max_age,
        });
    }

    pub fn get_max_price_age(&self) -> u64 {
        self.max_price_age.get_or_default()
    }

    /// Replace the feed (admin only)
    pub fn set_feed(&mut self, feed: Address) {
        self.only_admin();
        let old_feed = self.get_feed();
        self.feed.set(feed);
        self.env().emit_event(FeedUpdated {
            old_feed,
            new_feed: feed,
        });
    }

    pub fn get_feed(&self) -> Address {
        self.feed.get_or_revert_with(LendingError::InvalidConfiguration)
    }

    pub fn get_admin(&self) -> Address {
        self.admin.get_or_revert_with(LendingError::Unauthorized)
    }

    /// Fees received and not yet withdrawn
    pub fn collected_fees(&self) -> U512 {
        self.collected_fees.get_or_default()
    }

    /// Withdraw collected fees (admin only)
    pub fn withdraw_fees(&mut self, recipient: Address, amount: U512) {
        self.only_admin();

        let collected = self.collected_fees.get_or_default();
        if amount > collected {
            self.env().revert(LendingError::InsufficientFees);
        }
        self.collected_fees.set(collected - amount);
        self.env().transfer_tokens(&recipient, &amount);

        self.env().emit_event(FeesWithdrawn { recipient, amount });
    }

    // ========================================
    // Internal
    // ========================================

    fn ensure_active(&self) {
        if !self.active.get_or_default() {
            self.env().revert(LendingError::OracleInactive);
        }
    }

    /// Accept the attached value if it covers `cost`
    fn charge(&mut self, cost: U512) {
        let attached = self.env().attached_value();
        if attached < cost {
            self.env().revert(LendingError::InsufficientFee);
        }
        let collected = self
            .collected_fees
            .get_or_default()
            .checked_add(attached)
            .unwrap_or_revert_with(&self.env(), LendingError::MathOverflow);
        self.collected_fees.set(collected);
    }

    fn pull(&mut self, market: Address) -> PriceQuote {
        let feed_address = self.feed.get_or_revert_with(LendingError::InvalidConfiguration);
        let quote = PriceFeedContractRef::new(self.env(), feed_address).latest_price(market);

        if quote.price.is_zero() {
            self.env().revert(LendingError::PriceUnavailable);
        }

        let max_age = self.max_price_age.get_or_default();
        let age = self.env().get_block_time().saturating_sub(quote.timestamp);
        if max_age > 0 && age > max_age {
            self.env().revert(LendingError::StalePrice);
        }

        self.last_quotes.set(&market, quote.clone());
        self.env().emit_event(PricePulled {
            market,
            price: quote.price,
            timestamp: quote.timestamp,
        });
        quote
    }
}
