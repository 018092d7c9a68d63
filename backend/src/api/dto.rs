use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use safe_ledger::LedgerEvent;
use serde::{Deserialize, Serialize};

use crate::domain::{LedgerStatistics, SafeHealth, SafeSnapshot};
use crate::services::{AccountBalances, HealthAlert, PriceUpdate};

/// Amounts travel as decimal strings; plain JSON integers are accepted on input.
pub mod amount {
    use serde::de::{self, Visitor};
    use serde::Deserializer;
    use std::fmt;

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        deserializer.deserialize_any(AmountVisitor)
    }

    struct AmountVisitor;

    impl<'de> Visitor<'de> for AmountVisitor {
        type Value = u128;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a non-negative integer or a string holding one")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<u128, E> {
            Ok(v.into())
        }

        fn visit_u128<E: de::Error>(self, v: u128) -> Result<u128, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<u128, E> {
            u128::try_from(v).map_err(|_| E::custom(format!("negative amount {}", v)))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<u128, E> {
            v.trim()
                .parse()
                .map_err(|_| E::custom(format!("invalid amount {:?}", v)))
        }
    }
}

fn default_reserve_ratio() -> u128 {
    100
}

// Request DTOs
#[derive(Debug, Deserialize)]
pub struct OpenSafeRequest {
    pub owner: String,
    /// Token address, or `native` / the zero address
    pub collateral: String,
    #[serde(deserialize_with = "amount::deserialize")]
    pub amount: u128,
    /// Native value sent with the call; must equal `amount` for native collateral
    #[serde(default, deserialize_with = "amount::deserialize")]
    pub value: u128,
    #[serde(default = "default_reserve_ratio")]
    pub reserve_ratio: u128,
}

#[derive(Debug, Deserialize)]
pub struct SafeAmountRequest {
    pub owner: String,
    pub collateral: String,
    #[serde(deserialize_with = "amount::deserialize")]
    pub amount: u128,
}

#[derive(Debug, Deserialize)]
pub struct CloseSafeRequest {
    pub owner: String,
    pub collateral: String,
}

#[derive(Debug, Deserialize)]
pub struct SetPriceRequest {
    #[serde(deserialize_with = "amount::deserialize")]
    pub price: u128,
}

#[derive(Debug, Deserialize)]
pub struct FaucetRequest {
    pub account: String,
    pub collateral: String,
    #[serde(deserialize_with = "amount::deserialize")]
    pub amount: u128,
}

#[derive(Debug, Deserialize)]
pub struct ApproveRequest {
    pub owner: String,
    /// `synthetic`, or a collateral token address
    pub asset: String,
    #[serde(deserialize_with = "amount::deserialize")]
    pub amount: u128,
}

/// List safes query parameters
#[derive(Debug, Default, Deserialize)]
pub struct ListSafesQuery {
    pub owner: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

// Response DTOs
#[derive(Debug, Serialize, Deserialize)]
pub struct SafeDto {
    pub safe_id: String,
    pub owner: String,
    pub collateral: String,
    pub deposited_amount: String,
    pub borrowed_amount: String,
    pub reserve_ratio: u128,
    pub price: Option<String>,
    pub collateral_value: Option<Decimal>,
    pub collateral_ratio: Option<Decimal>,
    pub health_factor: Option<Decimal>,
    pub max_borrowable: Option<String>,
    pub liquidation_price: Option<Decimal>,
    pub health: SafeHealth,
    pub updated_at: DateTime<Utc>,
}

impl From<SafeSnapshot> for SafeDto {
    fn from(safe: SafeSnapshot) -> Self {
        Self {
            safe_id: safe.safe_id.to_string(),
            owner: safe.owner.to_string(),
            collateral: safe.collateral.to_string(),
            deposited_amount: safe.deposited_amount.to_string(),
            borrowed_amount: safe.borrowed_amount.to_string(),
            reserve_ratio: safe.reserve_ratio,
            price: safe.price.map(|p| p.to_string()),
            collateral_value: safe.collateral_value,
            collateral_ratio: safe.collateral_ratio,
            health_factor: safe.health_factor,
            max_borrowable: safe.max_borrowable.map(|m| m.to_string()),
            liquidation_price: safe.liquidation_price,
            health: safe.health,
            updated_at: safe.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SafeActionResponse {
    pub safe: SafeDto,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct CloseSafeResponse {
    pub safe_id: String,
    pub returned_amount: String,
    pub message: String,
}

/// Statistics response
#[derive(Debug, Serialize)]
pub struct StatisticsDto {
    pub total_safes: usize,
    pub safes_with_debt: usize,
    pub total_debt: String,
    pub synthetic_supply: String,
    pub custody: Vec<CustodyDto>,
}

#[derive(Debug, Serialize)]
pub struct CustodyDto {
    pub collateral: String,
    pub amount: String,
}

impl From<LedgerStatistics> for StatisticsDto {
    fn from(stats: LedgerStatistics) -> Self {
        Self {
            total_safes: stats.total_safes,
            safes_with_debt: stats.safes_with_debt,
            total_debt: stats.total_debt.to_string(),
            synthetic_supply: stats.synthetic_supply.to_string(),
            custody: stats
                .custody
                .into_iter()
                .map(|(collateral, amount)| CustodyDto {
                    collateral: collateral.to_string(),
                    amount: amount.to_string(),
                })
                .collect(),
        }
    }
}

/// Price DTO, also pushed over the websocket
#[derive(Debug, Serialize)]
pub struct PriceDto {
    pub collateral: String,
    pub price: Option<String>,
    pub oracle_price: Option<Decimal>,
    pub timestamp: DateTime<Utc>,
}

impl From<PriceUpdate> for PriceDto {
    fn from(update: PriceUpdate) -> Self {
        Self {
            collateral: update.collateral.to_string(),
            price: Some(update.ledger_price.to_string()),
            oracle_price: Some(update.oracle_price),
            timestamp: update.timestamp,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TokenBalanceDto {
    pub symbol: String,
    pub token: String,
    pub balance: String,
}

#[derive(Debug, Serialize)]
pub struct BalancesDto {
    pub address: String,
    pub native: String,
    pub synthetic: String,
    pub synthetic_allowance: String,
    pub tokens: Vec<TokenBalanceDto>,
}

impl From<AccountBalances> for BalancesDto {
    fn from(balances: AccountBalances) -> Self {
        Self {
            address: balances.address.to_string(),
            native: balances.native.to_string(),
            synthetic: balances.synthetic.to_string(),
            synthetic_allowance: balances.synthetic_allowance.to_string(),
            tokens: balances
                .tokens
                .into_iter()
                .map(|t| TokenBalanceDto {
                    symbol: t.symbol,
                    token: t.token.to_string(),
                    balance: t.balance.to_string(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Health alert DTO (for WebSocket)
#[derive(Debug, Serialize)]
pub struct HealthAlertDto {
    pub safe_id: String,
    pub owner: String,
    pub collateral: String,
    pub health: SafeHealth,
    pub collateral_ratio: Option<Decimal>,
    pub liquidation_price: Option<Decimal>,
    pub current_price: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl From<HealthAlert> for HealthAlertDto {
    fn from(alert: HealthAlert) -> Self {
        Self {
            safe_id: alert.safe_id.to_string(),
            owner: alert.owner.to_string(),
            collateral: alert.collateral.to_string(),
            health: alert.health,
            collateral_ratio: alert.collateral_ratio,
            liquidation_price: alert.liquidation_price,
            current_price: alert.current_price.map(|p| p.to_string()),
            timestamp: alert.timestamp,
        }
    }
}

/// Ledger event DTO (for WebSocket)
#[derive(Debug, Serialize)]
pub struct LedgerEventDto {
    pub owner: String,
    pub event: serde_json::Value,
}

impl LedgerEventDto {
    pub fn from_event(event: &LedgerEvent) -> serde_json::Result<Self> {
        let owner = match event {
            LedgerEvent::SafeOpened(e) => e.owner,
            LedgerEvent::CollateralAdded(e) => e.owner,
            LedgerEvent::Borrowed(e) => e.owner,
            LedgerEvent::Repaid(e) => e.owner,
            LedgerEvent::SafeClosed(e) => e.owner,
        };

        Ok(Self {
            owner: owner.to_string(),
            event: serde_json::to_value(event)?,
        })
    }
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amounts_accept_strings_and_numbers() {
        let req: SafeAmountRequest = serde_json::from_value(serde_json::json!({
            "owner": "0x70997970c51812dc3a010c7d01b50e0d17dc79c8",
            "collateral": "native",
            "amount": "909090909090909090909"
        }))
        .unwrap();
        assert_eq!(req.amount, 909_090_909_090_909_090_909);

        let req: SetPriceRequest = serde_json::from_value(serde_json::json!({ "price": 1000 })).unwrap();
        assert_eq!(req.price, 1000);

        assert!(serde_json::from_value::<SetPriceRequest>(serde_json::json!({ "price": -1 })).is_err());
        assert!(serde_json::from_value::<SetPriceRequest>(serde_json::json!({ "price": "1e3" })).is_err());
    }

    #[test]
    fn test_open_request_defaults() {
        let req: OpenSafeRequest = serde_json::from_value(serde_json::json!({
            "owner": "0x70997970c51812dc3a010c7d01b50e0d17dc79c8",
            "collateral": "0x0000000000000000000000000000000000000000",
            "amount": "1"
        }))
        .unwrap();

        assert_eq!(req.value, 0);
        assert_eq!(req.reserve_ratio, 100);
    }
}
