//! Risk Manager - Market registry and account liquidity checks
//!
//! Handles:
//! - Market listing and collateral factors (admin)
//! - Per-account entered markets
//! - Redeem and borrow authorization for markets
//!
//! A liquidity check prices every entered market in one paid oracle batch,
//! so all markets are valued against the same quotes.

use odra::prelude::*;
use odra::casper_types::{U256, U512};
use odra::ContractRef;
use super::errors::LendingError;
use super::events::*;
use super::market::{AccountSnapshot, MarketContractRef};
use super::price_oracle::PriceOracleContractRef;
use crate::math::{exp_scale, Exp, SafeMath};

/// Risk parameters of a market
#[odra::odra_type]
pub struct MarketConfig {
    /// Whether the market is listed
    pub is_listed: bool,
    /// Share of collateral value usable as borrowing power (scaled by 1e18)
    pub collateral_factor: U256,
}

/// Result of a liquidity check, in price units (scaled by 1e18)
///
/// At most one of the two fields is nonzero.
#[odra::odra_type]
pub struct AccountLiquidity {
    /// Borrowing power left
    pub liquidity: U256,
    /// Debt value above borrowing power
    pub shortfall: U256,
}

/// One entered market's inputs to a liquidity check
#[derive(Clone)]
pub struct PositionValuation {
    pub snapshot: AccountSnapshot,
    /// Price of one unit of underlying (scaled by 1e18)
    pub price: U256,
    pub collateral_factor: U256,
    /// Shares the pending operation redeems from this market
    pub redeem_shares: U256,
    /// Amount the pending operation borrows from this market
    pub borrow_amount: U256,
}

/// Sum collateral and debt value over an account's positions
///
/// Per market:
/// - collateral value = `shares * exchange_rate * price * collateral_factor`
/// - debt value = `borrow_balance * price`
///
/// A pending redeem adds the collateral value of the redeemed shares to the
/// debt side; a pending borrow adds the borrowed value.
pub fn account_liquidity(positions: &[PositionValuation]) -> Result<AccountLiquidity, LendingError> {
    let mut collateral = U256::zero();
    let mut debt = U256::zero();

    for position in positions {
        let share_value = Exp::mul(position.snapshot.exchange_rate, position.price)?;
        let share_power = Exp::mul(share_value, position.collateral_factor)?;

        collateral = SafeMath::add(collateral, Exp::mul(share_power, position.snapshot.shares)?)?;
        debt = SafeMath::add(debt, Exp::mul(position.price, position.snapshot.borrow_balance)?)?;

        debt = SafeMath::add(debt, Exp::mul(share_power, position.redeem_shares)?)?;
        debt = SafeMath::add(debt, Exp::mul(position.price, position.borrow_amount)?)?;
    }

    if collateral >= debt {
        Ok(AccountLiquidity {
            liquidity: collateral - debt,
            shortfall: U256::zero(),
        })
    } else {
        Ok(AccountLiquidity {
            liquidity: U256::zero(),
            shortfall: debt - collateral,
        })
    }
}

/// Risk Manager contract
#[odra::module]
pub struct RiskManager {
    /// Price oracle gateway address
    price_oracle: Var<Address>,
    /// Market risk parameters
    markets: Mapping<Address, MarketConfig>,
    /// Listed markets in listing order
    all_markets: Var<Vec<Address>>,
    /// Markets each account has entered, in entry order
    account_assets: Mapping<Address, Vec<Address>>,
    /// Membership lookup: (market, account) -> entered
    membership: Mapping<(Address, Address), bool>,
    /// Admin address
    admin: Var<Address>,
}

#[odra::module]
impl RiskManager {
    /// Initialize the risk manager; the price oracle is set separately
    pub fn init(&mut self) {
        self.admin.set(self.env().caller());
        self.all_markets.set(Vec::new());
    }

    // ========================================
    // Market Configuration (Admin)
    // ========================================

    /// List a market with a zero collateral factor
    pub fn support_market(&mut self, market: Address) {
        self.only_admin();

        if self.is_listed(market) {
            self.env().revert(LendingError::AlreadyListed);
        }

        self.markets.set(&market, MarketConfig {
            is_listed: true,
            collateral_factor: U256::zero(),
        });
        let mut all_markets = self.all_markets.get_or_default();
        all_markets.push(market);
        self.all_markets.set(all_markets);

        self.env().emit_event(MarketListed { market });
    }

    /// Set a market's collateral factor
    ///
    /// Pulls a live price for the market, so the oracle must be active and
    /// the attached value must cover `get_price_cost(market)` on the oracle.
    ///
    /// # Arguments
    /// * `market` - Listed market
    /// * `new_factor` - Collateral factor in [0, 1] (scaled by 1e18)
    #[odra(payable)]
    pub fn set_collateral_factor(&mut self, market: Address, new_factor: U256) {
        self.only_admin();

        let mut config = self.listed_config(market);
        if new_factor > exp_scale() {
            self.env().revert(LendingError::InvalidFactor);
        }

        let fee = self.env().attached_value();
        self.oracle_ref()
            .with_tokens(fee)
            .get_underlying_prices(vec![market]);

        let old_factor = config.collateral_factor;
        config.collateral_factor = new_factor;
        self.markets.set(&market, config);

        self.env().emit_event(CollateralFactorUpdated {
            market,
            old_factor,
            new_factor,
        });
    }

    /// Replace the price oracle gateway
    pub fn set_price_oracle(&mut self, new_oracle: Address) {
        self.only_admin();

        let old_oracle = self.price_oracle.get();
        self.price_oracle.set(new_oracle);

        self.env().emit_event(PriceOracleUpdated {
            old_oracle,
            new_oracle,
        });
    }

    // ========================================
    // Membership
    // ========================================

    /// Enter the caller into `markets`
    ///
    /// Fails without entering any market if one of them is not listed.
    /// Markets already entered are skipped.
    pub fn enter_markets(&mut self, markets: Vec<Address>) {
        let account = self.env().caller();

        for market in markets.iter() {
            if !self.is_listed(*market) {
                self.env().revert(LendingError::MarketNotListed);
            }
        }

        for market in markets {
            self.add_membership(account, market);
        }
    }

    /// Remove `market` from the caller's entered markets
    ///
    /// The caller must hold no shares and no debt in the market. Exiting a
    /// market that was not entered does nothing.
    pub fn exit_market(&mut self, market: Address) {
        let account = self.env().caller();
        if !self.check_membership(account, market) {
            return;
        }

        let snapshot = MarketContractRef::new(self.env(), market).get_account_snapshot(account);
        if !snapshot.shares.is_zero() || !snapshot.borrow_balance.is_zero() {
            self.env().revert(LendingError::NonzeroPosition);
        }

        self.membership.set(&(market, account), false);
        let mut assets = self.get_assets_in(account);
        assets.retain(|entered| *entered != market);
        self.account_assets.set(&account, assets);

        self.env().emit_event(MarketExited { market, account });
    }

    // ========================================
    // Liquidity
    // ========================================

    /// Oracle fee for pricing every market the account has entered
    ///
    /// This is the value to attach to a redeem or borrow by `account`.
    pub fn get_price_cost(&self, account: Address) -> U512 {
        let assets = self.get_assets_in(account);
        if assets.is_empty() {
            return U512::zero();
        }

        let oracle = self.oracle_ref();
        assets
            .iter()
            .try_fold(U512::zero(), |total, market| total.checked_add(oracle.get_price_cost(*market)))
            .unwrap_or_revert_with(&self.env(), LendingError::MathOverflow)
    }

    /// Current liquidity of an account across its entered markets
    ///
    /// The attached value pays the oracle fee (`get_price_cost(account)`).
    #[odra(payable)]
    pub fn get_account_liquidity(&mut self, account: Address) -> AccountLiquidity {
        self.hypothetical_liquidity(account, None, U256::zero(), U256::zero())
    }

    // ========================================
    // Market Hooks (caller is the market)
    // ========================================

    /// Authorize a mint in the calling market
    pub fn mint_allowed(&self) {
        self.listed_config(self.env().caller());
    }

    /// Authorize a repayment in the calling market
    pub fn repay_allowed(&self) {
        self.listed_config(self.env().caller());
    }

    /// Authorize burning `redeem_shares` of `account` in the calling market
    ///
    /// `snapshot` is the account's position in the calling market before the
    /// redeem. Accounts that have not entered the market are not priced.
    #[odra(payable)]
    pub fn redeem_allowed(&mut self, account: Address, redeem_shares: U256, snapshot: AccountSnapshot) {
        let market = self.env().caller();
        self.listed_config(market);

        if !self.check_membership(account, market) {
            let fee = self.env().attached_value();
            if !fee.is_zero() {
                self.oracle_ref().with_tokens(fee).get_underlying_prices(Vec::new());
            }
            return;
        }

        let result = self.hypothetical_liquidity(account, Some((market, snapshot)), redeem_shares, U256::zero());
        if !result.shortfall.is_zero() {
            self.env().revert(LendingError::InsufficientLiquidity);
        }
    }

    /// Authorize `account` borrowing `borrow_amount` from the calling market
    ///
    /// Enters the account into the market if needed.
    #[odra(payable)]
    pub fn borrow_allowed(&mut self, account: Address, borrow_amount: U256, snapshot: AccountSnapshot) {
        let market = self.env().caller();
        self.listed_config(market);

        self.add_membership(account, market);

        let result = self.hypothetical_liquidity(account, Some((market, snapshot)), U256::zero(), borrow_amount);
        if !result.shortfall.is_zero() {
            self.env().revert(LendingError::InsufficientLiquidity);
        }
    }

    // ========================================
    // View Functions
    // ========================================

    /// Listed markets in listing order
    pub fn get_all_markets(&self) -> Vec<Address> {
        self.all_markets.get_or_default()
    }

    /// Markets the account has entered, in entry order
    pub fn get_assets_in(&self, account: Address) -> Vec<Address> {
        self.account_assets.get(&account).unwrap_or_default()
    }

    pub fn check_membership(&self, account: Address, market: Address) -> bool {
        self.membership.get(&(market, account)).unwrap_or_default()
    }

    pub fn is_listed(&self, market: Address) -> bool {
        self.markets
            .get(&market)
            .map(|config| config.is_listed)
            .unwrap_or_default()
    }

    pub fn get_collateral_factor(&self, market: Address) -> U256 {
        self.markets
            .get(&market)
            .map(|config| config.collateral_factor)
            .unwrap_or_default()
    }

    pub fn get_price_oracle(&self) -> Option<Address> {
        self.price_oracle.get()
    }

    pub fn get_admin(&self) -> Address {
        self.admin.get_or_revert_with(LendingError::Unauthorized)
    }

    // ========================================
    // Internal
    // ========================================

    /// Liquidity after a pending operation in `operating` market
    ///
    /// The operating market's position comes from the passed snapshot; the
    /// others are read from their markets.
    fn hypothetical_liquidity(
        &mut self,
        account: Address,
        operating: Option<(Address, AccountSnapshot)>,
        redeem_shares: U256,
        borrow_amount: U256,
    ) -> AccountLiquidity {
        let assets = self.get_assets_in(account);
        let fee = self.env().attached_value();
        let quotes = self
            .oracle_ref()
            .with_tokens(fee)
            .get_underlying_prices(assets.clone());

        let mut positions = Vec::with_capacity(assets.len());
        for (market, quote) in assets.into_iter().zip(quotes.into_iter()) {
            let position = match &operating {
                Some((operating_market, snapshot)) if *operating_market == market => PositionValuation {
                    snapshot: snapshot.clone(),
                    price: quote.price,
                    collateral_factor: self.get_collateral_factor(market),
                    redeem_shares,
                    borrow_amount,
                },
                _ => PositionValuation {
                    snapshot: MarketContractRef::new(self.env(), market).get_account_snapshot(account),
                    price: quote.price,
                    collateral_factor: self.get_collateral_factor(market),
                    redeem_shares: U256::zero(),
                    borrow_amount: U256::zero(),
                },
            };
            positions.push(position);
        }

        account_liquidity(&positions).unwrap_or_else(|e| self.env().revert(e))
    }

    fn add_membership(&mut self, account: Address, market: Address) {
        if self.check_membership(account, market) {
            return;
        }

        self.membership.set(&(market, account), true);
        let mut assets = self.get_assets_in(account);
        assets.push(market);
        self.account_assets.set(&account, assets);

        self.env().emit_event(MarketEntered { market, account });
    }

    fn listed_config(&self, market: Address) -> MarketConfig {
        match self.markets.get(&market) {
            Some(config) if config.is_listed => config,
            _ => self.env().revert(LendingError::MarketNotListed),
        }
    }

    fn oracle_ref(&self) -> PriceOracleContractRef {
        let oracle = self.price_oracle.get_or_revert_with(LendingError::PriceOracleNotSet);
        PriceOracleContractRef::new(self.env(), oracle)
    }

    fn only_admin(&self) {
        let caller = self.env().caller();
        let admin = self.admin.get_or_revert_with(LendingError::Unauthorized);
        if caller != admin {
            self.env().revert(LendingError::Unauthorized);
        }
    }
}
