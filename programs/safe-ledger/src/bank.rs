use std::collections::HashMap;

use crate::errors::AssetError;
use crate::interfaces::CollateralAssets;
use crate::state::{Address, CollateralType};
use crate::token::FungibleToken;

/// Native balances plus every fungible token accepted as collateral.
#[derive(Debug, Clone, Default)]
pub struct AssetBank {
    native: HashMap<Address, u128>,
    tokens: HashMap<Address, FungibleToken>,
}

impl AssetBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// The zero address stands for native value and is refused.
    pub fn register_token(&mut self, address: Address, token: FungibleToken) -> Result<(), AssetError> {
        if address.is_zero() {
            return Err(AssetError::ZeroAddressToken);
        }
        self.tokens.insert(address, token);
        Ok(())
    }

    pub fn token(&self, address: &Address) -> Option<&FungibleToken> {
        self.tokens.get(address)
    }

    pub fn token_mut(&mut self, address: &Address) -> Result<&mut FungibleToken, AssetError> {
        self.tokens
            .get_mut(address)
            .ok_or(AssetError::UnknownToken(*address))
    }

    pub fn tokens(&self) -> impl Iterator<Item = (&Address, &FungibleToken)> {
        self.tokens.iter()
    }

    pub fn native_balance(&self, account: &Address) -> u128 {
        self.native.get(account).copied().unwrap_or(0)
    }

    /// Create native value out of thin air for `account` (genesis/faucet funding).
    pub fn credit_native(&mut self, account: Address, amount: u128) -> Result<(), AssetError> {
        let balance = self
            .native_balance(&account)
            .checked_add(amount)
            .ok_or(AssetError::Overflow)?;
        self.native.insert(account, balance);
        Ok(())
    }
}

impl CollateralAssets for AssetBank {
    fn transfer_native(&mut self, from: Address, to: Address, amount: u128) -> Result<(), AssetError> {
        let from_balance = self.native_balance(&from);
        if from_balance < amount {
            return Err(AssetError::InsufficientBalance {
                account: from,
                needed: amount,
                available: from_balance,
            });
        }
        if from == to {
            return Ok(());
        }

        let to_balance = self
            .native_balance(&to)
            .checked_add(amount)
            .ok_or(AssetError::Overflow)?;

        self.native.insert(from, from_balance - amount);
        self.native.insert(to, to_balance);
        Ok(())
    }

    fn transfer_from(
        &mut self,
        token: Address,
        spender: Address,
        from: Address,
        to: Address,
        amount: u128,
    ) -> Result<(), AssetError> {
        self.token_mut(&token)?
            .transfer_from(spender, from, to, amount)
    }

    fn transfer(&mut self, token: Address, from: Address, to: Address, amount: u128) -> Result<(), AssetError> {
        self.token_mut(&token)?.transfer(from, to, amount)
    }

    fn balance_of(&self, collateral: &CollateralType, account: &Address) -> u128 {
        match collateral {
            CollateralType::Native => self.native_balance(account),
            CollateralType::Token(token) => self
                .tokens
                .get(token)
                .map(|t| t.balance_of(account))
                .unwrap_or(0),
        }
    }
}
