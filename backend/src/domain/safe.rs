use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use safe_ledger::{Address, CollateralType, SafeId};
use serde::{Deserialize, Serialize};

/// A safe as seen at one moment, priced with the ledger's current quote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafeSnapshot {
    pub safe_id: SafeId,
    pub owner: Address,
    pub collateral: CollateralType,
    pub deposited_amount: u128,
    pub borrowed_amount: u128,
    pub reserve_ratio: u128,
    pub price: Option<u128>,
    pub collateral_value: Option<Decimal>,
    pub collateral_ratio: Option<Decimal>,
    pub health_factor: Option<Decimal>,
    pub max_borrowable: Option<u128>,
    pub liquidation_price: Option<Decimal>,
    pub health: SafeHealth,
    pub updated_at: DateTime<Utc>,
}

impl SafeSnapshot {
    pub fn has_debt(&self) -> bool {
        self.borrowed_amount > 0
    }

    pub fn needs_attention(&self) -> bool {
        matches!(
            self.health,
            SafeHealth::AtRisk | SafeHealth::Undercollateralized
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SafeHealth {
    /// No debt against the collateral.
    Unborrowed,
    Healthy,
    /// Within the alert threshold of the liquidation ratio.
    AtRisk,
    /// Below the liquidation ratio at the current price.
    Undercollateralized,
    /// No price to evaluate against.
    Unpriced,
    /// Amounts too large to evaluate.
    Unmeasurable,
}

/// Totals across the whole ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerStatistics {
    pub total_safes: usize,
    pub safes_with_debt: usize,
    pub total_debt: u128,
    pub synthetic_supply: u128,
    pub custody: Vec<(CollateralType, u128)>,
}
