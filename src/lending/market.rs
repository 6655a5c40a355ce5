//! Market - Share ledger for one listed asset
//!
//! Suppliers deposit underlying and receive shares at the market's exchange
//! rate. Borrowers take underlying against collateral checked by the risk
//! manager. Debt is stored as principal plus the borrow index at the last
//! touch, so accrual only updates market totals.
//!
//! The underlying is either the native currency (`underlying == None`) or a
//! CEP-18 token.

use odra::prelude::*;
use odra::casper_types::{U256, U512};
use odra::ContractRef;
use super::errors::LendingError;
use super::events::*;
use super::interest_rate::{InterestRateModelContractRef, BLOCK_TIME_PER_PERIOD};
use super::risk_manager::RiskManagerContractRef;
use crate::math::{exp_scale, u256_to_u512, u512_to_u256, Exp, SafeMath};
use crate::token::Cep18TokenContractRef;

/// Account debt as of the last interaction
#[odra::odra_type]
pub struct BorrowSnapshot {
    /// Debt right after the last interaction
    pub principal: U256,
    /// Market borrow index at the last interaction
    pub interest_index: U256,
}

/// Account position used by the risk manager's liquidity check
#[odra::odra_type]
pub struct AccountSnapshot {
    /// Share balance
    pub shares: U256,
    /// Current debt
    pub borrow_balance: U256,
    /// Current exchange rate (scaled by 1e18)
    pub exchange_rate: U256,
}

/// Market totals after accruing interest up to a point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccrualResult {
    pub total_borrows: U256,
    pub total_reserves: U256,
    pub borrow_index: U256,
    pub interest_accumulated: U256,
}

/// Apply `periods` of linear interest at `borrow_rate` per period
///
/// `interest = borrows * rate * periods`; the index grows by the same factor
/// and `reserve_factor` of the interest goes to reserves.
pub fn accrue_totals(
    total_borrows: U256,
    total_reserves: U256,
    borrow_index: U256,
    borrow_rate: U256,
    periods: u64,
    reserve_factor: U256,
) -> Result<AccrualResult, LendingError> {
    let factor = SafeMath::mul(borrow_rate, U256::from(periods))?;
    let interest_accumulated = Exp::mul(total_borrows, factor)?;
    let reserves_added = Exp::mul(interest_accumulated, reserve_factor)?;
    let index_growth = Exp::mul(borrow_index, factor)?;

    Ok(AccrualResult {
        total_borrows: SafeMath::add(total_borrows, interest_accumulated)?,
        total_reserves: SafeMath::add(total_reserves, reserves_added)?,
        borrow_index: SafeMath::add(borrow_index, index_growth)?,
        interest_accumulated,
    })
}

/// `(cash + borrows - reserves) / supply`, or `initial_rate` before the first mint
pub fn exchange_rate(
    cash: U256,
    total_borrows: U256,
    total_reserves: U256,
    total_supply: U256,
    initial_rate: U256,
) -> Result<U256, LendingError> {
    if total_supply.is_zero() {
        return Ok(initial_rate);
    }
    let gross = SafeMath::add(cash, total_borrows)?;
    let net = SafeMath::sub(gross, total_reserves)?;
    Exp::fraction(net, total_supply)
}

/// Market contract
#[odra::module]
pub struct Market {
    /// Risk manager address
    risk_manager: Var<Address>,
    /// Interest rate model address
    interest_rate_model: Var<Address>,
    /// Underlying token, None for the native currency
    underlying: Var<Option<Address>>,
    /// Share token name
    name: Var<String>,
    /// Share token symbol
    symbol: Var<String>,
    /// Share token decimals
    decimals: Var<u8>,
    /// Exchange rate used while no shares exist (scaled by 1e18)
    initial_exchange_rate: Var<U256>,
    /// Share of interest set aside as reserves (scaled by 1e18)
    reserve_factor: Var<U256>,
    /// Admin address
    admin: Var<Address>,
    /// Underlying held by the market
    total_cash: Var<U256>,
    /// Shares outstanding
    total_supply: Var<U256>,
    /// Debt outstanding, interest included
    total_borrows: Var<U256>,
    /// Reserves owned by the protocol
    total_reserves: Var<U256>,
    /// Cumulative interest multiplier (scaled by 1e18)
    borrow_index: Var<U256>,
    /// Block time interest was last accrued to
    accrual_timestamp: Var<u64>,
    /// Share balances
    share_balances: Mapping<Address, U256>,
    /// Borrow snapshots
    borrow_snapshots: Mapping<Address, BorrowSnapshot>,
    /// Reentrancy lock
    locked: Var<bool>,
}

#[odra::module]
impl Market {
    /// Initialize the market
    ///
    /// # Arguments
    /// * `risk_manager` - Risk manager address
    /// * `interest_rate_model` - Interest rate model address
    /// * `underlying` - CEP-18 token, or None for the native currency
    /// * `initial_exchange_rate` - Underlying per share before the first mint (scaled by 1e18)
    /// * `name`, `symbol`, `decimals` - Share token metadata
    pub fn init(
        &mut self,
        risk_manager: Address,
        interest_rate_model: Address,
        underlying: Option<Address>,
        initial_exchange_rate: U256,
        name: String,
        symbol: String,
        decimals: u8,
    ) {
        if initial_exchange_rate.is_zero() {
            self.env().revert(LendingError::InvalidConfiguration);
        }

        self.admin.set(self.env().caller());
        self.risk_manager.set(risk_manager);
        self.interest_rate_model.set(interest_rate_model);
        self.underlying.set(underlying);
        self.initial_exchange_rate.set(initial_exchange_rate);
        self.name.set(name);
        self.symbol.set(symbol);
        self.decimals.set(decimals);

        self.reserve_factor.set(U256::zero());
        self.total_cash.set(U256::zero());
        self.total_supply.set(U256::zero());
        self.total_borrows.set(U256::zero());
        self.total_reserves.set(U256::zero());
        self.borrow_index.set(exp_scale());
        self.accrual_timestamp.set(self.env().get_block_time());
        self.locked.set(false);
    }

    // ========================================
    // Supply
    // ========================================

    /// Supply `amount` of the underlying token and receive shares
    ///
    /// The caller must have approved the market for `amount`.
    pub fn mint(&mut self, amount: U256) -> U256 {
        self.lock();
        let token = self.token_underlying();
        let minter = self.env().caller();

        let shares = self.mint_fresh(minter, amount);

        let mut underlying = Cep18TokenContractRef::new(self.env(), token);
        if !underlying.transfer_from(minter, self.env().self_address(), amount) {
            self.env().revert(LendingError::TransferFailed);
        }

        self.unlock();
        shares
    }

    /// Supply the attached native amount and receive shares
    #[odra(payable)]
    pub fn mint_native(&mut self) -> U256 {
        self.lock();
        self.ensure_native();
        let minter = self.env().caller();
        let amount = self.native_amount(self.env().attached_value());

        let shares = self.mint_fresh(minter, amount);

        self.unlock();
        shares
    }

    /// Burn shares worth `amount` of underlying and pay it out
    ///
    /// The attached value pays the oracle fee of the liquidity check
    /// (`RiskManager::get_price_cost(caller)`).
    #[odra(payable)]
    pub fn redeem_underlying(&mut self, amount: U256) -> U256 {
        self.lock();
        self.accrue_interest_internal();

        if amount.is_zero() {
            self.env().revert(LendingError::ZeroAmount);
        }
        let shares = self.math(Exp::div_ceil(amount, self.exchange_rate_stored()));

        self.redeem_fresh(shares, amount);
        self.unlock();
        shares
    }

    /// Burn `shares` and pay out their underlying value
    ///
    /// Fee handling as in `redeem_underlying`.
    #[odra(payable)]
    pub fn redeem(&mut self, shares: U256) -> U256 {
        self.lock();
        self.accrue_interest_internal();

        if shares.is_zero() {
            self.env().revert(LendingError::ZeroAmount);
        }
        let amount = self.math(Exp::mul(shares, self.exchange_rate_stored()));
        if amount.is_zero() {
            self.env().revert(LendingError::ZeroAmount);
        }

        self.redeem_fresh(shares, amount);
        self.unlock();
        amount
    }

    // ========================================
    // Borrowing
    // ========================================

    /// Borrow `amount` of underlying
    ///
    /// The attached value pays the oracle fee of the liquidity check. The
    /// borrower is entered into this market first, so the fee must also
    /// cover this market's price when it was not entered yet.
    #[odra(payable)]
    pub fn borrow(&mut self, amount: U256) {
        self.lock();
        self.accrue_interest_internal();

        let borrower = self.env().caller();
        if amount.is_zero() {
            self.env().revert(LendingError::ZeroAmount);
        }
        let cash = self.total_cash.get_or_default();
        if amount > cash {
            self.env().revert(LendingError::InsufficientCash);
        }

        let snapshot = self.account_snapshot_stored(borrower);
        let fee = self.env().attached_value();
        self.risk_manager_ref()
            .with_tokens(fee)
            .borrow_allowed(borrower, amount, snapshot.clone());

        let account_borrows = self.math(SafeMath::add(snapshot.borrow_balance, amount));
        let total_borrows = self.math(SafeMath::add(self.total_borrows.get_or_default(), amount));
        self.borrow_snapshots.set(&borrower, BorrowSnapshot {
            principal: account_borrows,
            interest_index: self.borrow_index.get_or_default(),
        });
        self.total_borrows.set(total_borrows);
        self.total_cash.set(cash - amount);

        self.transfer_out(borrower, amount);

        self.env().emit_event(Borrow {
            borrower,
            amount,
            account_borrows,
            total_borrows,
        });
        self.unlock();
    }

    /// Repay up to `amount` of the caller's debt in the underlying token
    ///
    /// Only the outstanding debt is pulled when `amount` exceeds it.
    /// Returns the amount repaid.
    pub fn repay_borrow(&mut self, amount: U256) -> U256 {
        self.lock();
        let token = self.token_underlying();
        let payer = self.env().caller();

        let repaid = self.repay_fresh(payer, amount);

        let mut underlying = Cep18TokenContractRef::new(self.env(), token);
        if !underlying.transfer_from(payer, self.env().self_address(), repaid) {
            self.env().revert(LendingError::TransferFailed);
        }

        self.unlock();
        repaid
    }

    /// Repay the caller's debt with the attached native amount
    ///
    /// Any value above the outstanding debt is refunded. Returns the amount
    /// repaid.
    #[odra(payable)]
    pub fn repay_borrow_native(&mut self) -> U256 {
        self.lock();
        self.ensure_native();
        let payer = self.env().caller();
        let attached = self.native_amount(self.env().attached_value());

        let repaid = self.repay_fresh(payer, attached);

        let excess = attached - repaid;
        if !excess.is_zero() {
            self.env().transfer_tokens(&payer, &u256_to_u512(excess));
        }

        self.unlock();
        repaid
    }

    // ========================================
    // Interest
    // ========================================

    /// Accrue interest up to the current block time
    pub fn accrue_interest(&mut self) {
        self.lock();
        self.accrue_interest_internal();
        self.unlock();
    }

    /// Borrow rate per second at the stored balances
    pub fn borrow_rate_per_second(&self) -> U256 {
        self.interest_rate_model_ref().get_borrow_rate(
            self.total_cash.get_or_default(),
            self.total_borrows.get_or_default(),
            self.total_reserves.get_or_default(),
        )
    }

    /// Supply rate per second at the stored balances
    pub fn supply_rate_per_second(&self) -> U256 {
        self.interest_rate_model_ref().get_supply_rate(
            self.total_cash.get_or_default(),
            self.total_borrows.get_or_default(),
            self.total_reserves.get_or_default(),
            self.reserve_factor.get_or_default(),
        )
    }

    // ========================================
    // View Functions
    // ========================================

    pub fn get_cash(&self) -> U256 {
        self.total_cash.get_or_default()
    }

    pub fn balance_of(&self, account: Address) -> U256 {
        self.share_balances.get(&account).unwrap_or_default()
    }

    /// Underlying value of the account's shares at the current exchange rate
    pub fn balance_of_underlying(&self, account: Address) -> U256 {
        self.math(Exp::mul(self.balance_of(account), self.exchange_rate_current()))
    }

    /// Debt including interest up to the current block time
    pub fn borrow_balance_current(&self, account: Address) -> U256 {
        let accrual = self.projected_accrual();
        self.math(self.borrow_balance_at(account, accrual.borrow_index))
    }

    /// Debt as of the last accrual
    pub fn borrow_balance_stored(&self, account: Address) -> U256 {
        self.math(self.borrow_balance_at(account, self.borrow_index.get_or_default()))
    }

    /// Exchange rate including interest up to the current block time
    pub fn exchange_rate_current(&self) -> U256 {
        let accrual = self.projected_accrual();
        self.math(exchange_rate(
            self.total_cash.get_or_default(),
            accrual.total_borrows,
            accrual.total_reserves,
            self.total_supply.get_or_default(),
            self.initial_exchange_rate.get_or_default(),
        ))
    }

    /// Exchange rate as of the last accrual
    pub fn exchange_rate_stored(&self) -> U256 {
        self.math(exchange_rate(
            self.total_cash.get_or_default(),
            self.total_borrows.get_or_default(),
            self.total_reserves.get_or_default(),
            self.total_supply.get_or_default(),
            self.initial_exchange_rate.get_or_default(),
        ))
    }

    /// Shares, current debt and current exchange rate of an account
    pub fn get_account_snapshot(&self, account: Address) -> AccountSnapshot {
        let accrual = self.projected_accrual();
        let exchange_rate = self.math(exchange_rate(
            self.total_cash.get_or_default(),
            accrual.total_borrows,
            accrual.total_reserves,
            self.total_supply.get_or_default(),
            self.initial_exchange_rate.get_or_default(),
        ));
        AccountSnapshot {
            shares: self.balance_of(account),
            borrow_balance: self.math(self.borrow_balance_at(account, accrual.borrow_index)),
            exchange_rate,
        }
    }

    pub fn total_supply(&self) -> U256 {
        self.total_supply.get_or_default()
    }

    /// Total borrows as of the last accrual
    pub fn total_borrows(&self) -> U256 {
        self.total_borrows.get_or_default()
    }

    /// Total borrows including interest up to the current block time
    pub fn total_borrows_current(&self) -> U256 {
        self.projected_accrual().total_borrows
    }

    pub fn total_reserves(&self) -> U256 {
        self.total_reserves.get_or_default()
    }

    pub fn borrow_index(&self) -> U256 {
        self.borrow_index.get_or_default()
    }

    pub fn accrual_timestamp(&self) -> u64 {
        self.accrual_timestamp.get_or_default()
    }

    pub fn reserve_factor(&self) -> U256 {
        self.reserve_factor.get_or_default()
    }

    pub fn underlying(&self) -> Option<Address> {
        self.underlying.get_or_default()
    }

    pub fn risk_manager(&self) -> Address {
        self.risk_manager.get_or_revert_with(LendingError::InvalidConfiguration)
    }

    pub fn interest_rate_model(&self) -> Address {
        self.interest_rate_model.get_or_revert_with(LendingError::InvalidConfiguration)
    }

    pub fn name(&self) -> String {
        self.name.get_or_default()
    }

    pub fn symbol(&self) -> String {
        self.symbol.get_or_default()
    }

    pub fn decimals(&self) -> u8 {
        self.decimals.get_or_default()
    }

    pub fn get_admin(&self) -> Address {
        self.admin.get_or_revert_with(LendingError::Unauthorized)
    }

    // ========================================
    // Admin Functions
    // ========================================

    /// Set the share of interest kept as reserves (admin only)
    pub fn set_reserve_factor(&mut self, new_factor: U256) {
        self.only_admin();
        if new_factor > exp_scale() {
            self.env().revert(LendingError::InvalidFactor);
        }

        self.lock();
        self.accrue_interest_internal();
        let old_factor = self.reserve_factor.get_or_default();
        self.reserve_factor.set(new_factor);
        self.unlock();

        self.env().emit_event(ReserveFactorUpdated {
            old_factor,
            new_factor,
        });
    }

    /// Switch to another interest rate model (admin only)
    ///
    /// Interest up to now accrues under the old model.
    pub fn set_interest_rate_model(&mut self, new_model: Address) {
        self.only_admin();

        self.lock();
        self.accrue_interest_internal();
        let old_model = self.interest_rate_model();
        self.interest_rate_model.set(new_model);
        self.unlock();

        self.env().emit_event(InterestRateModelUpdated {
            old_model,
            new_model,
        });
    }

    /// Pay `amount` of reserves out to the admin (admin only)
    pub fn reduce_reserves(&mut self, amount: U256) {
        self.only_admin();

        self.lock();
        self.accrue_interest_internal();

        if amount.is_zero() {
            self.env().revert(LendingError::ZeroAmount);
        }
        let reserves = self.total_reserves.get_or_default();
        if amount > reserves {
            self.env().revert(LendingError::InsufficientReserves);
        }
        let cash = self.total_cash.get_or_default();
        if amount > cash {
            self.env().revert(LendingError::InsufficientCash);
        }

        let total_reserves = reserves - amount;
        self.total_reserves.set(total_reserves);
        self.total_cash.set(cash - amount);

        let admin = self.get_admin();
        self.transfer_out(admin, amount);

        self.env().emit_event(ReservesReduced {
            admin,
            amount,
            total_reserves,
        });
        self.unlock();
    }

    // ========================================
    // Internal
    // ========================================

    fn mint_fresh(&mut self, minter: Address, amount: U256) -> U256 {
        if amount.is_zero() {
            self.env().revert(LendingError::ZeroAmount);
        }
        self.accrue_interest_internal();
        self.risk_manager_ref().mint_allowed();

        let shares = self.math(Exp::div(amount, self.exchange_rate_stored()));
        if shares.is_zero() {
            self.env().revert(LendingError::ZeroAmount);
        }

        let cash = self.math(SafeMath::add(self.total_cash.get_or_default(), amount));
        let supply = self.math(SafeMath::add(self.total_supply.get_or_default(), shares));
        let balance = self.math(SafeMath::add(self.balance_of(minter), shares));
        self.total_cash.set(cash);
        self.total_supply.set(supply);
        self.share_balances.set(&minter, balance);

        self.env().emit_event(Mint {
            minter,
            amount,
            shares,
        });
        shares
    }

    /// Burn `shares` for `amount` of underlying; interest must already be accrued
    fn redeem_fresh(&mut self, shares: U256, amount: U256) {
        let redeemer = self.env().caller();

        let balance = self.balance_of(redeemer);
        if shares > balance {
            self.env().revert(LendingError::InsufficientShares);
        }
        let cash = self.total_cash.get_or_default();
        if amount > cash {
            self.env().revert(LendingError::InsufficientCash);
        }

        let snapshot = self.account_snapshot_stored(redeemer);
        let fee = self.env().attached_value();
        self.risk_manager_ref()
            .with_tokens(fee)
            .redeem_allowed(redeemer, shares, snapshot);

        self.share_balances.set(&redeemer, balance - shares);
        self.total_supply.set(self.math(SafeMath::sub(self.total_supply.get_or_default(), shares)));
        self.total_cash.set(cash - amount);

        self.transfer_out(redeemer, amount);

        self.env().emit_event(Redeem {
            redeemer,
            amount,
            shares,
        });
    }

    /// Book a repayment of up to `amount`; returns the amount applied
    fn repay_fresh(&mut self, payer: Address, amount: U256) -> U256 {
        if amount.is_zero() {
            self.env().revert(LendingError::ZeroAmount);
        }
        self.accrue_interest_internal();
        self.risk_manager_ref().repay_allowed();

        let debt = self.borrow_balance_stored(payer);
        if debt.is_zero() {
            self.env().revert(LendingError::NoBorrowBalance);
        }
        let repaid = SafeMath::min(amount, debt);

        let account_borrows = debt - repaid;
        let total_borrows = self.total_borrows.get_or_default().saturating_sub(repaid);
        self.borrow_snapshots.set(&payer, BorrowSnapshot {
            principal: account_borrows,
            interest_index: self.borrow_index.get_or_default(),
        });
        self.total_borrows.set(total_borrows);
        self.total_cash.set(self.math(SafeMath::add(self.total_cash.get_or_default(), repaid)));

        self.env().emit_event(RepayBorrow {
            borrower: payer,
            amount: repaid,
            account_borrows,
            total_borrows,
        });
        repaid
    }

    fn accrue_interest_internal(&mut self) {
        let now = self.env().get_block_time();
        let last = self.accrual_timestamp.get_or_default();
        let periods = now.saturating_sub(last) / BLOCK_TIME_PER_PERIOD;
        if periods == 0 {
            return;
        }

        let accrual = self.accrue_over(periods);
        self.total_borrows.set(accrual.total_borrows);
        self.total_reserves.set(accrual.total_reserves);
        self.borrow_index.set(accrual.borrow_index);
        self.accrual_timestamp.set(last + periods * BLOCK_TIME_PER_PERIOD);

        self.env().emit_event(AccrueInterest {
            cash: self.total_cash.get_or_default(),
            interest_accumulated: accrual.interest_accumulated,
            borrow_index: accrual.borrow_index,
            total_borrows: accrual.total_borrows,
        });
    }

    /// Totals as they would be after accruing now, without writing them
    fn projected_accrual(&self) -> AccrualResult {
        let now = self.env().get_block_time();
        let last = self.accrual_timestamp.get_or_default();
        let periods = now.saturating_sub(last) / BLOCK_TIME_PER_PERIOD;
        if periods == 0 {
            return AccrualResult {
                total_borrows: self.total_borrows.get_or_default(),
                total_reserves: self.total_reserves.get_or_default(),
                borrow_index: self.borrow_index.get_or_default(),
                interest_accumulated: U256::zero(),
            };
        }
        self.accrue_over(periods)
    }

    fn accrue_over(&self, periods: u64) -> AccrualResult {
        let total_borrows = self.total_borrows.get_or_default();
        let total_reserves = self.total_reserves.get_or_default();
        let borrow_rate = self.interest_rate_model_ref().get_borrow_rate(
            self.total_cash.get_or_default(),
            total_borrows,
            total_reserves,
        );
        self.math(accrue_totals(
            total_borrows,
            total_reserves,
            self.borrow_index.get_or_default(),
            borrow_rate,
            periods,
            self.reserve_factor.get_or_default(),
        ))
    }

    fn borrow_balance_at(&self, account: Address, index: U256) -> Result<U256, LendingError> {
        let snapshot = match self.borrow_snapshots.get(&account) {
            Some(snapshot) if !snapshot.principal.is_zero() => snapshot,
            _ => return Ok(U256::zero()),
        };
        let scaled = SafeMath::mul(snapshot.principal, index)?;
        SafeMath::div(scaled, snapshot.interest_index)
    }

    /// Snapshot from stored state; interest must already be accrued
    fn account_snapshot_stored(&self, account: Address) -> AccountSnapshot {
        AccountSnapshot {
            shares: self.balance_of(account),
            borrow_balance: self.borrow_balance_stored(account),
            exchange_rate: self.exchange_rate_stored(),
        }
    }

    fn transfer_out(&mut self, to: Address, amount: U256) {
        match self.underlying.get_or_default() {
            Some(token) => {
                let mut underlying = Cep18TokenContractRef::new(self.env(), token);
                if !underlying.transfer(to, amount) {
                    self.env().revert(LendingError::TransferFailed);
                }
            }
            None => self.env().transfer_tokens(&to, &u256_to_u512(amount)),
        }
    }

    fn token_underlying(&self) -> Address {
        self.underlying
            .get_or_default()
            .unwrap_or_revert_with(&self.env(), LendingError::WrongUnderlying)
    }

    fn ensure_native(&self) {
        if self.underlying.get_or_default().is_some() {
            self.env().revert(LendingError::WrongUnderlying);
        }
    }

    fn native_amount(&self, value: U512) -> U256 {
        self.math(u512_to_u256(value))
    }

    fn risk_manager_ref(&self) -> RiskManagerContractRef {
        RiskManagerContractRef::new(self.env(), self.risk_manager())
    }

    fn interest_rate_model_ref(&self) -> InterestRateModelContractRef {
        InterestRateModelContractRef::new(self.env(), self.interest_rate_model())
    }

    fn only_admin(&self) {
        let caller = self.env().caller();
        let admin = self.admin.get_or_revert_with(LendingError::Unauthorized);
        if caller != admin {
            self.env().revert(LendingError::Unauthorized);
        }
    }

    /// Reentrancy lock
    fn lock(&mut self) {
        if self.locked.get_or_default() {
            self.env().revert(LendingError::Reentrant);
        }
        self.locked.set(true);
    }

    /// Reentrancy unlock
    fn unlock(&mut self) {
        self.locked.set(false);
    }
}

impl Market {
    /// Revert with the error of a failed calculation
    fn math<T>(&self, result: Result<T, LendingError>) -> T {
        result.unwrap_or_else(|e| self.env().revert(e))
    }
}
