use std::collections::HashMap;

use crate::constants::DEFAULT_PRICE;
use crate::interfaces::PriceSource;
use crate::state::CollateralType;

/// Last known price per collateral type, with an optional fallback for unlisted collateral.
#[derive(Debug, Clone, Default)]
pub struct PriceBook {
    prices: HashMap<CollateralType, u128>,
    fallback: Option<u128>,
}

impl PriceBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every collateral type quotes the same price.
    pub fn fixed(price: u128) -> Self {
        Self {
            prices: HashMap::new(),
            fallback: Some(price),
        }
    }

    /// Quotes `DEFAULT_PRICE` for everything until real prices are set.
    pub fn placeholder() -> Self {
        Self::fixed(DEFAULT_PRICE)
    }

    pub fn with_price(mut self, collateral: CollateralType, price: u128) -> Self {
        self.set_price(collateral, price);
        self
    }

    pub fn set_price(&mut self, collateral: CollateralType, price: u128) {
        self.prices.insert(collateral, price);
    }

    pub fn remove_price(&mut self, collateral: &CollateralType) -> Option<u128> {
        self.prices.remove(collateral)
    }

    pub fn set_fallback(&mut self, price: Option<u128>) {
        self.fallback = price;
    }

    pub fn listed(&self) -> impl Iterator<Item = (&CollateralType, &u128)> {
        self.prices.iter()
    }
}

impl PriceSource for PriceBook {
    fn price(&self, collateral: &CollateralType) -> Option<u128> {
        self.prices
            .get(collateral)
            .copied()
            .or(self.fallback)
            .filter(|price| *price > 0)
    }
}
