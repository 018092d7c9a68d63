use std::collections::HashMap;

use tracing::debug;

use crate::errors::AssetError;
use crate::interfaces::SyntheticIssuer;
use crate::state::Address;

/// Balances and allowances of a fungible token.
#[derive(Debug, Clone, Default)]
pub struct FungibleToken {
    pub name: String,
    pub symbol: String,
    balances: HashMap<Address, u128>,
    allowances: HashMap<(Address, Address), u128>, // (owner, spender)
    total_supply: u128,
}

impl FungibleToken {
    pub fn new(name: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            ..Self::default()
        }
    }

    pub fn balance_of(&self, account: &Address) -> u128 {
        self.balances.get(account).copied().unwrap_or(0)
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> u128 {
        self.allowances
            .get(&(*owner, *spender))
            .copied()
            .unwrap_or(0)
    }

    pub fn total_supply(&self) -> u128 {
        self.total_supply
    }

    pub fn mint(&mut self, to: Address, amount: u128) -> Result<(), AssetError> {
        let supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(AssetError::Overflow)?;
        let balance = self
            .balance_of(&to)
            .checked_add(amount)
            .ok_or(AssetError::Overflow)?;

        self.total_supply = supply;
        self.balances.insert(to, balance);
        Ok(())
    }

    pub fn approve(&mut self, owner: Address, spender: Address, amount: u128) {
        self.allowances.insert((owner, spender), amount);
    }

    pub fn transfer(&mut self, from: Address, to: Address, amount: u128) -> Result<(), AssetError> {
        let from_balance = self.balance_of(&from);
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
            .balance_of(&to)
            .checked_add(amount)
            .ok_or(AssetError::Overflow)?;

        self.balances.insert(from, from_balance - amount);
        self.balances.insert(to, to_balance);
        Ok(())
    }

    pub fn transfer_from(
        &mut self,
        spender: Address,
        from: Address,
        to: Address,
        amount: u128,
    ) -> Result<(), AssetError> {
        let allowance = self.spendable_allowance(&from, &spender, amount)?;
        self.transfer(from, to, amount)?;
        self.allowances.insert((from, spender), allowance - amount);
        Ok(())
    }

    /// Destroy `amount` held by `from`, spending the allowance granted to `spender`.
    pub fn burn_from(&mut self, spender: Address, from: Address, amount: u128) -> Result<(), AssetError> {
        let allowance = self.spendable_allowance(&from, &spender, amount)?;
        let balance = self.balance_of(&from);
        if balance < amount {
            return Err(AssetError::InsufficientBalance {
                account: from,
                needed: amount,
                available: balance,
            });
        }

        self.balances.insert(from, balance - amount);
        self.allowances.insert((from, spender), allowance - amount);
        // supply always covers any single balance
        self.total_supply -= amount;
        Ok(())
    }

    fn spendable_allowance(
        &self,
        owner: &Address,
        spender: &Address,
        amount: u128,
    ) -> Result<u128, AssetError> {
        let allowance = self.allowance(owner, spender);
        if allowance < amount {
            return Err(AssetError::InsufficientAllowance {
                owner: *owner,
                spender: *spender,
                needed: amount,
                available: allowance,
            });
        }
        Ok(allowance)
    }
}

/// The pegged synthetic asset. Minting and burning belong to a single registered minter.
#[derive(Debug, Clone)]
pub struct SyntheticToken {
    token: FungibleToken,
    owner: Address,
    minter: Option<Address>,
}

impl SyntheticToken {
    pub fn new(name: impl Into<String>, symbol: impl Into<String>, owner: Address) -> Self {
        Self {
            token: FungibleToken::new(name, symbol),
            owner,
            minter: None,
        }
    }

    /// Hand mint authority to `minter`. Only the token owner may do this.
    pub fn set_minter(&mut self, caller: Address, minter: Address) -> Result<(), AssetError> {
        if caller != self.owner {
            return Err(AssetError::Unauthorized(caller));
        }
        debug!("Synthetic minter set to {}", minter);
        self.minter = Some(minter);
        Ok(())
    }

    pub fn minter(&self) -> Option<Address> {
        self.minter
    }

    pub fn token(&self) -> &FungibleToken {
        &self.token
    }

    pub fn approve(&mut self, owner: Address, spender: Address, amount: u128) {
        self.token.approve(owner, spender, amount);
    }

    pub fn transfer(&mut self, from: Address, to: Address, amount: u128) -> Result<(), AssetError> {
        self.token.transfer(from, to, amount)
    }

    fn ensure_minter(&self, caller: Address) -> Result<(), AssetError> {
        match self.minter {
            Some(minter) if minter == caller => Ok(()),
            _ => Err(AssetError::Unauthorized(caller)),
        }
    }
}

impl SyntheticIssuer for SyntheticToken {
    fn mint(&mut self, minter: Address, to: Address, amount: u128) -> Result<(), AssetError> {
        self.ensure_minter(minter)?;
        self.token.mint(to, amount)
    }

    fn burn_from(&mut self, minter: Address, from: Address, amount: u128) -> Result<(), AssetError> {
        self.ensure_minter(minter)?;
        self.token.burn_from(minter, from, amount)
    }

    fn balance_of(&self, account: &Address) -> u128 {
        self.token.balance_of(account)
    }

    fn total_supply(&self) -> u128 {
        self.token.total_supply()
    }
}
