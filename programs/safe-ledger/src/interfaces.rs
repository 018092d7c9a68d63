//! Seams between the ledger and the systems it calls out to.

use crate::errors::AssetError;
use crate::state::{Address, CollateralType};

/// Price feed for collateral, quoted in synthetic units per collateral unit.
pub trait PriceSource {
    /// `None` when no usable price exists. A zero price is treated the same way by the ledger.
    fn price(&self, collateral: &CollateralType) -> Option<u128>;
}

/// Mint/burn authority over the synthetic asset. Only the registered minter may call either.
pub trait SyntheticIssuer {
    fn mint(&mut self, minter: Address, to: Address, amount: u128) -> Result<(), AssetError>;

    /// Burn `amount` held by `from`, spending the allowance `from` granted to `minter`.
    fn burn_from(&mut self, minter: Address, from: Address, amount: u128)
        -> Result<(), AssetError>;

    fn balance_of(&self, account: &Address) -> u128;

    fn total_supply(&self) -> u128;
}

/// Movement of collateral: native value and fungible collateral tokens.
pub trait CollateralAssets {
    fn transfer_native(&mut self, from: Address, to: Address, amount: u128)
        -> Result<(), AssetError>;

    /// Transfer-on-behalf: `spender` moves `amount` of `token` from `from` using its allowance.
    fn transfer_from(
        &mut self,
        token: Address,
        spender: Address,
        from: Address,
        to: Address,
        amount: u128,
    ) -> Result<(), AssetError>;

    fn transfer(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        amount: u128,
    ) -> Result<(), AssetError>;

    fn balance_of(&self, collateral: &CollateralType, account: &Address) -> u128;
}
