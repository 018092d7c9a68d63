use crate::domain::SafeHealth;
use anyhow::{anyhow, Result};
use rust_decimal::Decimal;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

pub struct RatioCalculator;

impl RatioCalculator {
    /// Lift a ledger amount into a `Decimal` for presentation.
    pub fn to_decimal(amount: u128) -> Result<Decimal> {
        let amount = i128::try_from(amount)
            .map_err(|_| anyhow!("Amount {} does not fit a decimal", amount))?;

        Decimal::try_from_i128_with_scale(amount, 0)
            .map_err(|e| anyhow!("Amount {} does not fit a decimal: {}", amount, e))
    }

    /// Collateral Value = deposited × price
    pub fn calculate_collateral_value(deposited: u128, price: u128) -> Result<Decimal> {
        Self::to_decimal(deposited)?
            .checked_mul(Self::to_decimal(price)?)
            .ok_or_else(|| anyhow!("Collateral value overflow"))
    }

    /// Collateral Ratio = deposited × price × 100 / borrowed
    /// Returns percent (e.g. 200 = 200%), `None` without debt
    pub fn calculate_collateral_ratio(
        deposited: u128,
        price: u128,
        borrowed: u128,
    ) -> Result<Option<Decimal>> {
        if borrowed == 0 {
            return Ok(None);
        }

        let ratio = Self::calculate_collateral_value(deposited, price)?
            .checked_mul(HUNDRED)
            .ok_or_else(|| anyhow!("Collateral ratio overflow"))?
            .checked_div(Self::to_decimal(borrowed)?)
            .ok_or_else(|| anyhow!("Collateral ratio division failed"))?;

        Ok(Some(ratio.round_dp(4)))
    }

    /// Health Factor = collateral ratio / liquidation ratio
    /// Below 1 the safe could not borrow what it already owes.
    pub fn calculate_health_factor(collateral_ratio: Decimal, liquidation_ratio: u128) -> Result<Decimal> {
        if liquidation_ratio == 0 {
            return Err(anyhow!("Liquidation ratio cannot be zero"));
        }

        collateral_ratio
            .checked_div(Self::to_decimal(liquidation_ratio)?)
            .map(|factor| factor.round_dp(4))
            .ok_or_else(|| anyhow!("Health factor division failed"))
    }

    /// Price at which the debt is exactly covered.
    /// Formula: borrowed × liquidation_ratio / (deposited × 100)
    pub fn calculate_liquidation_price(
        deposited: u128,
        borrowed: u128,
        liquidation_ratio: u128,
    ) -> Result<Option<Decimal>> {
        if borrowed == 0 || deposited == 0 {
            return Ok(None);
        }

        let required = Self::to_decimal(borrowed)?
            .checked_mul(Self::to_decimal(liquidation_ratio)?)
            .ok_or_else(|| anyhow!("Required cover overflow"))?;

        let cover_per_unit = Self::to_decimal(deposited)?
            .checked_mul(HUNDRED)
            .ok_or_else(|| anyhow!("Cover overflow"))?;

        let price = required
            .checked_div(cover_per_unit)
            .ok_or_else(|| anyhow!("Liquidation price division failed"))?;

        Ok(Some(price.round_dp(8)))
    }

    /// Distance from the current price down to the liquidation price, in percent.
    pub fn distance_to_liquidation(current_price: Decimal, liquidation_price: Decimal) -> Result<Decimal> {
        if current_price.is_zero() {
            return Err(anyhow!("Current price is zero"));
        }

        let distance = current_price
            .checked_sub(liquidation_price)
            .ok_or_else(|| anyhow!("Price difference overflow"))?
            .checked_div(current_price)
            .ok_or_else(|| anyhow!("Distance division failed"))?
            .checked_mul(HUNDRED)
            .ok_or_else(|| anyhow!("Distance overflow"))?;

        Ok(distance.round_dp(4))
    }

    /// Classify a safe by how far its ratio sits above the liquidation ratio.
    /// `alert_threshold_pct` widens the floor: 10 flags anything under 110% of it.
    pub fn classify(
        collateral_ratio: Option<Decimal>,
        liquidation_ratio: u128,
        alert_threshold_pct: u32,
    ) -> Result<SafeHealth> {
        let ratio = match collateral_ratio {
            Some(ratio) => ratio,
            None => return Ok(SafeHealth::Unborrowed),
        };

        let floor = Self::to_decimal(liquidation_ratio)?;
        if ratio < floor {
            return Ok(SafeHealth::Undercollateralized);
        }

        let alert_bound = floor
            .checked_mul(HUNDRED + Decimal::from(alert_threshold_pct))
            .ok_or_else(|| anyhow!("Alert bound overflow"))?
            / HUNDRED;

        if ratio < alert_bound {
            Ok(SafeHealth::AtRisk)
        } else {
            Ok(SafeHealth::Healthy)
        }
    }

    /// Integer ledger price from an oracle quote. Fractions are dropped;
    /// a quote below one unit is rejected since the ledger treats zero as unavailable.
    pub fn to_ledger_price(price: Decimal) -> Result<u128> {
        use rust_decimal::prelude::ToPrimitive;

        if price.is_sign_negative() {
            return Err(anyhow!("Negative price {}", price));
        }

        let whole = price
            .trunc()
            .to_u128()
            .ok_or_else(|| anyhow!("Price {} out of range", price))?;

        if whole == 0 {
            return Err(anyhow!("Price {} rounds to zero", price));
        }

        Ok(whole)
    }
}
