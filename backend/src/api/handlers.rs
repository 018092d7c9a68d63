use axum::{
    extract::{Path, Query, State},
    Json,
};
use safe_ledger::{Address, CollateralType};

use crate::api::{dto::*, errors::ApiError};
use crate::services::{HealthMonitor, LedgerService, SYNTHETIC_SYMBOL};
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<LedgerService>,
    pub monitor: Arc<HealthMonitor>,
}

fn parse_address(raw: &str, field: &str) -> Result<Address, ApiError> {
    raw.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid {} address {}: {}", field, raw, e)))
}

fn parse_collateral(raw: &str) -> Result<CollateralType, ApiError> {
    raw.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid collateral {}: {}", raw, e)))
}

/// GET /health - Health check
pub async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "safe-ledger-backend",
        "monitor_running": state.monitor.is_running().await,
    }))
}

/// POST /safes/open - Lock collateral into a safe
pub async fn open_safe(
    State(state): State<AppState>,
    Json(payload): Json<OpenSafeRequest>,
) -> Result<Json<SafeActionResponse>, ApiError> {
    let owner = parse_address(&payload.owner, "owner")?;
    let collateral = parse_collateral(&payload.collateral)?;

    let safe = state
        .service
        .open_safe(
            owner,
            collateral,
            payload.amount,
            payload.value,
            payload.reserve_ratio,
        )
        .await?;

    Ok(Json(SafeActionResponse {
        message: format!("Deposited {} of {}", payload.amount, collateral),
        safe: SafeDto::from(safe),
    }))
}

/// POST /safes/borrow - Mint the synthetic asset against a safe
pub async fn borrow(
    State(state): State<AppState>,
    Json(payload): Json<SafeAmountRequest>,
) -> Result<Json<SafeActionResponse>, ApiError> {
    let owner = parse_address(&payload.owner, "owner")?;
    let collateral = parse_collateral(&payload.collateral)?;

    let safe = state
        .service
        .borrow(owner, collateral, payload.amount)
        .await?;

    Ok(Json(SafeActionResponse {
        message: format!("Borrowed {} {}", payload.amount, SYNTHETIC_SYMBOL),
        safe: SafeDto::from(safe),
    }))
}

/// POST /safes/repay - Burn the synthetic asset to reduce debt
pub async fn repay(
    State(state): State<AppState>,
    Json(payload): Json<SafeAmountRequest>,
) -> Result<Json<SafeActionResponse>, ApiError> {
    let owner = parse_address(&payload.owner, "owner")?;
    let collateral = parse_collateral(&payload.collateral)?;

    let safe = state
        .service
        .repay(owner, collateral, payload.amount)
        .await?;

    Ok(Json(SafeActionResponse {
        message: format!("Repaid {} {}", payload.amount, SYNTHETIC_SYMBOL),
        safe: SafeDto::from(safe),
    }))
}

/// POST /safes/close - Return the collateral of a debt-free safe
pub async fn close_safe(
    State(state): State<AppState>,
    Json(payload): Json<CloseSafeRequest>,
) -> Result<Json<CloseSafeResponse>, ApiError> {
    let owner = parse_address(&payload.owner, "owner")?;
    let collateral = parse_collateral(&payload.collateral)?;

    let (safe_id, returned) = state.service.close_safe(owner, collateral).await?;

    Ok(Json(CloseSafeResponse {
        safe_id: safe_id.to_string(),
        returned_amount: returned.to_string(),
        message: "Safe closed successfully".to_string(),
    }))
}

/// GET /safes - List safes
pub async fn list_safes(
    State(state): State<AppState>,
    Query(query): Query<ListSafesQuery>,
) -> Result<Json<Vec<SafeDto>>, ApiError> {
    let owner = query
        .owner
        .as_deref()
        .map(|owner| parse_address(owner, "owner"))
        .transpose()?;

    let safes = state.service.list_safes(owner).await;

    // Apply pagination
    let offset = query.offset.unwrap_or(0);
    let limit = query.limit.unwrap_or(100).min(1000); // Max 1000

    let paginated: Vec<SafeDto> = safes
        .into_iter()
        .skip(offset)
        .take(limit)
        .map(SafeDto::from)
        .collect();

    Ok(Json(paginated))
}

/// GET /safes/:owner/:collateral - Get one safe with live ratio and health
pub async fn get_safe(
    State(state): State<AppState>,
    Path((owner, collateral)): Path<(String, String)>,
) -> Result<Json<SafeDto>, ApiError> {
    let owner = parse_address(&owner, "owner")?;
    let collateral = parse_collateral(&collateral)?;

    let safe = state.service.get_safe(&owner, &collateral).await?;

    Ok(Json(SafeDto::from(safe)))
}

/// GET /statistics - Ledger totals
pub async fn get_statistics(State(state): State<AppState>) -> Json<StatisticsDto> {
    Json(StatisticsDto::from(state.service.statistics().await))
}

/// GET /prices - Current ledger price for every known collateral type
pub async fn get_prices(State(state): State<AppState>) -> Json<Vec<PriceDto>> {
    let prices = state
        .service
        .prices()
        .await
        .into_iter()
        .map(|(collateral, price)| PriceDto {
            collateral: collateral.to_string(),
            price: price.map(|p| p.to_string()),
            oracle_price: None,
            timestamp: chrono::Utc::now(),
        })
        .collect();

    Json(prices)
}

/// PUT /prices/:collateral - Set a ledger price by hand
pub async fn set_price(
    State(state): State<AppState>,
    Path(collateral): Path<String>,
    Json(payload): Json<SetPriceRequest>,
) -> Result<Json<PriceDto>, ApiError> {
    let collateral = parse_collateral(&collateral)?;
    if payload.price == 0 {
        return Err(ApiError::BadRequest("Price must be greater than 0".to_string()));
    }

    state.service.set_price(collateral, payload.price).await;

    Ok(Json(PriceDto {
        collateral: collateral.to_string(),
        price: Some(payload.price.to_string()),
        oracle_price: None,
        timestamp: chrono::Utc::now(),
    }))
}

/// POST /accounts/faucet - Fund an account with native value or collateral tokens
pub async fn faucet(
    State(state): State<AppState>,
    Json(payload): Json<FaucetRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let account = parse_address(&payload.account, "account")?;
    let collateral = parse_collateral(&payload.collateral)?;

    state
        .service
        .faucet(account, collateral, payload.amount)
        .await?;

    Ok(Json(MessageResponse {
        message: format!("Credited {} of {} to {}", payload.amount, collateral, account),
    }))
}

/// POST /accounts/approve - Approve the ledger to pull collateral or burn the synthetic asset
pub async fn approve(
    State(state): State<AppState>,
    Json(payload): Json<ApproveRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let owner = parse_address(&payload.owner, "owner")?;

    let asset = if payload.asset.eq_ignore_ascii_case("synthetic")
        || payload.asset.eq_ignore_ascii_case(SYNTHETIC_SYMBOL)
    {
        state.service.approve_synthetic(owner, payload.amount).await;
        SYNTHETIC_SYMBOL.to_string()
    } else {
        match parse_collateral(&payload.asset)? {
            CollateralType::Native => {
                return Err(ApiError::BadRequest(
                    "Native collateral is sent as call value, not approved".to_string(),
                ))
            }
            CollateralType::Token(token) => {
                state
                    .service
                    .approve_collateral(owner, token, payload.amount)
                    .await?;
                token.to_string()
            }
        }
    };

    Ok(Json(MessageResponse {
        message: format!("Ledger approved for {} of {}", payload.amount, asset),
    }))
}

/// GET /accounts/:address/balances - Native, synthetic and collateral token balances
pub async fn get_balances(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<BalancesDto>, ApiError> {
    let address = parse_address(&address, "account")?;

    Ok(Json(BalancesDto::from(state.service.balances(address).await)))
}
