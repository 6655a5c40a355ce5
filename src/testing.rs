//! Test-only contracts

use odra::prelude::*;
use odra::casper_types::U256;
use odra::ContractRef;
use crate::lending::market::MarketContractRef;

/// Token whose `transfer_from` calls back into a market's `mint`
///
/// Until a target is set it accepts every transfer without moving balances.
#[odra::module]
pub struct ReentrantToken {
    target: Var<Address>,
}

#[odra::module]
impl ReentrantToken {
    pub fn set_target(&mut self, market: Address) {
        self.target.set(market);
    }

    pub fn transfer_from(&mut self, _from: Address, _to: Address, amount: U256) -> bool {
        if let Some(market) = self.target.get() {
            MarketContractRef::new(self.env(), market).mint(amount);
        }
        true
    }

    pub fn transfer(&mut self, _to: Address, _amount: U256) -> bool {
        true
    }
}
